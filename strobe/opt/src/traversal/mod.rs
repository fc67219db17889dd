//! Helpers for traversing the processes and tasks of a program
mod action;
mod construct;
mod diagnostics;
mod post_order;
mod visitor;

pub use action::{Action, VisResult};
pub use construct::{ConstructVisitor, Named, ParseVal, PassOpt};
pub use diagnostics::{DiagnosticContext, DiagnosticPass};
pub use post_order::{CompTraversal, Order};
pub use visitor::{Visitable, Visitor};
