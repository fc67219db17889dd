//! Internal representation for the strobe scheduling compiler.
//!
//! A [`Context`] holds modules, interfaces, and classes. Each [`Module`]
//! owns its variables, processes, and tasks through [`RRC`] pointers so that
//! passes can hold on to one node while mutating another. Statements and
//! expressions are plain trees owned by their process or task.

// Modules defining internal structures.
mod attribute;
mod builder;
mod common;
mod context;
mod control;
mod expr;
mod module;
mod printer;
mod schedule;
mod structure;
mod unit;

/// Modules to rewrite the IR
pub mod rewriter;

// Re-export types at the module level.
pub use attribute::{Attributes, BoolAttr, GetAttributes};
pub use builder::Builder;
pub use common::{rrc, RRC};
pub use context::{
    all_fields, class_chain, find_field, find_module, resolve_method,
    subclasses, Context,
};
pub use control::{
    Assign, AssignKind, Call, Callee, Delay, Empty, Finish, Fire, Force, Fork,
    If, JoinType, Release, Seq, Stmt, Sync, SyncOp, Timing, Wait, While,
};
pub use expr::{
    mask, BinOp, Expr, LvalueTarget, Query, UnOp, VarRef, STATUS_WIDTH,
};
pub use module::{IdList, Module, ModuleKind};
pub use printer::Printer;
pub use rewriter::Rewriter;
pub use schedule::{
    Block, Region, RegionKind, Schedule, ScheduledBlock, Trigger,
    VIRT_IFACE_TRIGGER_VAR,
};
pub use strobe_utils::{GetName, Id};
pub use structure::{
    Direction, Edge, HANDLE_WIDTH, Scope, SenItem, SenTree, VarType, Variable,
};
pub use unit::{
    Alias, Constraint, ConstraintItem, Process, ProcessKind, Task, TaskKind,
};
