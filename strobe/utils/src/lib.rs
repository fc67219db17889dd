//! Shared utilities for the strobe compiler.
mod errors;
mod id;
mod namegenerator;
mod position;

pub use errors::{Error, MultiError, StrobeResult};
pub use id::{GSym, GetName, Id};
pub use namegenerator::NameGenerator;
pub use position::{FileIdx, GPosIdx, GlobalPositionTable, PosIdx, WithPos};
