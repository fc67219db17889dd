//! # The strobe compiler
//!
//! This crate plumbs together the strobe crates and provides a command-line
//! interface that lowers and schedules a design, and optionally simulates
//! it. Depend on [`strobe_ir`], [`strobe_opt`], and [`strobe_sim`] directly
//! to build designs from a front end of your own.
pub mod cmdline;
pub mod demos;
pub mod driver;

pub use driver::{init_logging, lower, run_compiler, simulate};
pub use strobe_ir as ir;
pub use strobe_opt as opt;
pub use strobe_sim as sim;
