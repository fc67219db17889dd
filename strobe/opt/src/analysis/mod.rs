//! Analyses for strobe programs.
//!
//! The analyses construct data-structures that make answering certain
//! queries about processes and tasks easier.

mod call_graph;
mod read_write_set;
mod suspendability;

pub use call_graph::{blocking_stmts, static_class, CallGraph, UnitKey, UnitKind};
pub use read_write_set::ReadWriteSet;
pub use suspendability::Suspendability;
