//! Procedures: processes and tasks.
use super::{
    Attributes, BoolAttr, Expr, GetAttributes, Id, SenTree, Stmt, Variable,
    RRC,
};
use strobe_utils::{GPosIdx, GetName};

#[derive(Debug, Clone)]
pub enum ProcessKind {
    /// Runs once at time zero.
    Initial,
    /// Runs once at the end of the simulation.
    Final,
    /// Re-runs its body whenever the sensitivity list fires. Without a
    /// sensitivity list the body loops forever.
    Always(Option<SenTree>),
    /// `always_comb`: re-evaluated whenever something it reads changes.
    Comb,
    /// Continuous assignment.
    Continuous,
}

/// A process of a module.
#[derive(Debug)]
pub struct Process {
    pub name: Id,
    pub kind: ProcessKind,
    pub body: Stmt,
    pub attributes: Attributes,
    pub pos: GPosIdx,
}

impl Process {
    pub fn new<S: Into<Id>>(name: S, kind: ProcessKind, body: Stmt) -> Self {
        Self {
            name: name.into(),
            kind,
            body,
            attributes: Attributes::default(),
            pos: GPosIdx::UNKNOWN,
        }
    }

    /// Sensitivity list of an `always` with one.
    pub fn sens(&self) -> Option<&SenTree> {
        match &self.kind {
            ProcessKind::Always(Some(sens)) => Some(sens),
            _ => None,
        }
    }

    /// Combinational logic that reruns whenever an input changes.
    pub fn is_combinational(&self) -> bool {
        matches!(self.kind, ProcessKind::Comb | ProcessKind::Continuous)
    }

    pub fn is_suspendable(&self) -> bool {
        self.attributes.has(BoolAttr::Suspendable)
    }

    pub fn is_dynamic(&self) -> bool {
        self.attributes.has(BoolAttr::Dynamic)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Task,
    Function,
}

/// A task or function. In a class these are the methods.
#[derive(Debug)]
pub struct Task {
    pub name: Id,
    pub kind: TaskKind,
    /// Formal arguments, in order. These are local variables of the task.
    pub args: Vec<RRC<Variable>>,
    /// Return value of a function.
    pub ret: Option<RRC<Variable>>,
    pub body: Stmt,
    /// Calls through a class handle dispatch on the dynamic class.
    pub is_virtual: bool,
    pub attributes: Attributes,
    pub pos: GPosIdx,
}

impl Task {
    pub fn new<S: Into<Id>>(name: S, kind: TaskKind, body: Stmt) -> Self {
        Self {
            name: name.into(),
            kind,
            args: vec![],
            ret: None,
            body,
            is_virtual: false,
            attributes: Attributes::default(),
            pos: GPosIdx::UNKNOWN,
        }
    }

    pub fn is_suspendable(&self) -> bool {
        self.attributes.has(BoolAttr::Suspendable)
    }

    pub fn is_dynamic(&self) -> bool {
        self.attributes.has(BoolAttr::Dynamic)
    }
}

/// One element of a constraint block.
#[derive(Debug, Clone)]
pub struct ConstraintItem {
    pub cond: Expr,
    /// Soft constraints are dropped when they cannot be satisfied together
    /// with the hard ones.
    pub soft: bool,
}

/// A named class constraint block.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub name: Id,
    pub items: Vec<ConstraintItem>,
}

/// `alias lhs = rhs;` where both sides are nets of the module.
#[derive(Debug, Clone)]
pub struct Alias {
    pub lhs: RRC<Variable>,
    pub rhs: RRC<Variable>,
    pub pos: GPosIdx,
}

macro_rules! impl_unit {
    ($($t:ty),*) => {
        $(
            impl GetName for $t {
                fn name(&self) -> Id {
                    self.name
                }
            }
            impl GetAttributes for $t {
                fn get_attributes(&self) -> &Attributes {
                    &self.attributes
                }
                fn get_mut_attributes(&mut self) -> &mut Attributes {
                    &mut self.attributes
                }
            }
        )*
    };
}

impl_unit!(Process, Task);
