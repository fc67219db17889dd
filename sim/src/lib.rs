//! Execution of scheduled strobe designs.
//!
//! The [Simulator] runs the region schedule computed by the lowering
//! pipeline. Statically scheduled blocks run to completion inside their
//! region; `initial` processes and everything that can suspend run as
//! coroutines on the [interp::Machine], resumed from the `act` region.
pub mod configuration;
pub mod errors;
pub mod interp;
pub mod runtime;
mod simulator;

pub use configuration::RuntimeConfig;
pub use errors::{BoxedSimError, SimError, SimResult};
pub use simulator::Simulator;
