//! # Scheduling passes
//!
//! Lowering passes that turn the concurrent processes of a design into
//! statically ordered evaluation regions plus a small set of coroutines for
//! the genuinely dynamic behavior (delays, event waits, forks, and
//! synchronization primitives).
//!
//! Passes are registered with a [pass_manager::PassManager]; the default
//! pipeline is available through
//! [PassManager::default_passes](pass_manager::PassManager::default_passes).
pub mod analysis;
pub mod default_passes;
pub mod pass_manager;
pub mod passes;
pub mod traversal;
