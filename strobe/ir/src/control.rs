use super::{Attributes, Expr, GetAttributes, Id, SenTree};
use strobe_utils::GPosIdx;

macro_rules! impl_get_attributes {
    ($($t:ty),* $(,)?) => {
        $(
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

/// Statements run one after another.
#[derive(Debug, Clone)]
pub struct Seq {
    pub stmts: Vec<Stmt>,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignKind {
    /// `lhs = rhs`
    Blocking,
    /// `lhs <= rhs`, committed in the NBA region.
    NonBlocking,
}

/// An assignment, optionally with an intra-assignment delay
/// (`lhs = #d rhs`).
#[derive(Debug, Clone)]
pub struct Assign {
    pub lhs: Expr,
    pub rhs: Expr,
    pub kind: AssignKind,
    pub delay: Option<Expr>,
    pub attributes: Attributes,
    pub pos: GPosIdx,
}

#[derive(Debug, Clone)]
pub struct If {
    pub cond: Expr,
    pub tbranch: Box<Stmt>,
    pub fbranch: Box<Stmt>,
    pub attributes: Attributes,
}

#[derive(Debug, Clone)]
pub struct While {
    pub cond: Expr,
    pub body: Box<Stmt>,
    pub attributes: Attributes,
}

/// `#amount`
#[derive(Debug, Clone)]
pub struct Delay {
    pub amount: Expr,
    pub attributes: Attributes,
}

/// `@(sens) body`
#[derive(Debug, Clone)]
pub struct Timing {
    pub sens: SenTree,
    pub body: Box<Stmt>,
    pub attributes: Attributes,
}

/// `wait (cond) body`
#[derive(Debug, Clone)]
pub struct Wait {
    pub cond: Expr,
    pub body: Box<Stmt>,
    pub attributes: Attributes,
    pub pos: GPosIdx,
}

/// How long the parent of a fork blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    /// Until every branch finished.
    All,
    /// Until the first branch finished.
    Any,
    /// Not at all.
    None,
}

impl JoinType {
    pub fn keyword(&self) -> &'static str {
        match self {
            JoinType::All => "join",
            JoinType::Any => "join_any",
            JoinType::None => "join_none",
        }
    }
}

/// Concurrent branches.
#[derive(Debug, Clone)]
pub struct Fork {
    pub branches: Vec<Stmt>,
    pub join: JoinType,
    pub attributes: Attributes,
}

#[derive(Debug, Clone)]
pub enum Callee {
    /// Task or function of the enclosing module.
    Task(Id),
    /// Method of the object `obj` points to. Virtual methods dispatch on
    /// the dynamic class.
    Method { obj: Expr, name: Id },
}

/// Task or function call. `ret` receives the return value of a function.
#[derive(Debug, Clone)]
pub struct Call {
    pub callee: Callee,
    pub args: Vec<Expr>,
    pub ret: Option<Expr>,
    pub attributes: Attributes,
}

/// `-> event`
#[derive(Debug, Clone)]
pub struct Fire {
    pub event: Expr,
    pub attributes: Attributes,
}

/// `force lhs = rhs`
#[derive(Debug, Clone)]
pub struct Force {
    pub lhs: Expr,
    pub rhs: Expr,
    pub attributes: Attributes,
    pub pos: GPosIdx,
}

/// `release lhs`
#[derive(Debug, Clone)]
pub struct Release {
    pub lhs: Expr,
    pub attributes: Attributes,
    pub pos: GPosIdx,
}

/// Operations on semaphores and process handles.
#[derive(Debug, Clone)]
pub enum SyncOp {
    /// Block until `keys` keys are available, then take them.
    SemGet { sem: Expr, keys: Expr },
    /// Return `keys` keys.
    SemPut { sem: Expr, keys: Expr },
    /// Store the handle of the running process into `target`.
    ProcSelf { target: Expr },
    /// Kill the process `handle` refers to.
    ProcKill(Expr),
    /// Block until the process `handle` refers to finished or was killed.
    ProcAwait(Expr),
}

#[derive(Debug, Clone)]
pub struct Sync {
    pub op: SyncOp,
    pub attributes: Attributes,
}

/// Ends the simulation.
#[derive(Debug, Clone, Default)]
pub struct Finish {
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Default)]
pub struct Empty {
    pub attributes: Attributes,
}

impl_get_attributes!(
    Seq, Assign, If, While, Delay, Timing, Wait, Fork, Call, Fire, Force,
    Release, Sync, Finish, Empty
);

/// Procedural statements.
#[derive(Debug, Clone)]
pub enum Stmt {
    Seq(Seq),
    Assign(Assign),
    If(If),
    While(While),
    Delay(Delay),
    Timing(Timing),
    Wait(Wait),
    Fork(Fork),
    Call(Call),
    Fire(Fire),
    Force(Force),
    Release(Release),
    Sync(Sync),
    Finish(Finish),
    Empty(Empty),
}

impl Default for Stmt {
    fn default() -> Self {
        Stmt::empty()
    }
}

/// Convenience constructors.
impl Stmt {
    pub fn empty() -> Self {
        Stmt::Empty(Empty::default())
    }

    pub fn seq(stmts: Vec<Stmt>) -> Self {
        Stmt::Seq(Seq {
            stmts,
            attributes: Attributes::default(),
        })
    }

    fn assign_kind(lhs: Expr, rhs: Expr, kind: AssignKind) -> Self {
        Stmt::Assign(Assign {
            lhs,
            rhs,
            kind,
            delay: None,
            attributes: Attributes::default(),
            pos: GPosIdx::UNKNOWN,
        })
    }

    /// Blocking assignment.
    pub fn assign(lhs: Expr, rhs: Expr) -> Self {
        Stmt::assign_kind(lhs, rhs, AssignKind::Blocking)
    }

    /// Nonblocking assignment.
    pub fn nba(lhs: Expr, rhs: Expr) -> Self {
        Stmt::assign_kind(lhs, rhs, AssignKind::NonBlocking)
    }

    /// Assignment with an intra-assignment delay.
    pub fn delayed_assign(
        lhs: Expr,
        rhs: Expr,
        kind: AssignKind,
        delay: Expr,
    ) -> Self {
        let mut stmt = Stmt::assign_kind(lhs, rhs, kind);
        if let Stmt::Assign(a) = &mut stmt {
            a.delay = Some(delay);
        }
        stmt
    }

    pub fn if_(cond: Expr, tbranch: Stmt, fbranch: Stmt) -> Self {
        Stmt::If(If {
            cond,
            tbranch: Box::new(tbranch),
            fbranch: Box::new(fbranch),
            attributes: Attributes::default(),
        })
    }

    pub fn while_(cond: Expr, body: Stmt) -> Self {
        Stmt::While(While {
            cond,
            body: Box::new(body),
            attributes: Attributes::default(),
        })
    }

    /// `forever body`
    pub fn forever(body: Stmt) -> Self {
        Stmt::while_(Expr::one(), body)
    }

    pub fn delay(amount: Expr) -> Self {
        Stmt::Delay(Delay {
            amount,
            attributes: Attributes::default(),
        })
    }

    pub fn timing(sens: SenTree, body: Stmt) -> Self {
        Stmt::Timing(Timing {
            sens,
            body: Box::new(body),
            attributes: Attributes::default(),
        })
    }

    pub fn wait(cond: Expr, body: Stmt) -> Self {
        Stmt::Wait(Wait {
            cond,
            body: Box::new(body),
            attributes: Attributes::default(),
            pos: GPosIdx::UNKNOWN,
        })
    }

    pub fn fork(branches: Vec<Stmt>, join: JoinType) -> Self {
        Stmt::Fork(Fork {
            branches,
            join,
            attributes: Attributes::default(),
        })
    }

    pub fn call<S: Into<Id>>(task: S, args: Vec<Expr>) -> Self {
        Stmt::Call(Call {
            callee: Callee::Task(task.into()),
            args,
            ret: None,
            attributes: Attributes::default(),
        })
    }

    pub fn method_call<S: Into<Id>>(obj: Expr, name: S, args: Vec<Expr>) -> Self {
        Stmt::Call(Call {
            callee: Callee::Method {
                obj,
                name: name.into(),
            },
            args,
            ret: None,
            attributes: Attributes::default(),
        })
    }

    pub fn fire(event: Expr) -> Self {
        Stmt::Fire(Fire {
            event,
            attributes: Attributes::default(),
        })
    }

    pub fn force(lhs: Expr, rhs: Expr) -> Self {
        Stmt::Force(Force {
            lhs,
            rhs,
            attributes: Attributes::default(),
            pos: GPosIdx::UNKNOWN,
        })
    }

    pub fn release(lhs: Expr) -> Self {
        Stmt::Release(Release {
            lhs,
            attributes: Attributes::default(),
            pos: GPosIdx::UNKNOWN,
        })
    }

    pub fn sync(op: SyncOp) -> Self {
        Stmt::Sync(Sync {
            op,
            attributes: Attributes::default(),
        })
    }

    pub fn finish() -> Self {
        Stmt::Finish(Finish::default())
    }
}

impl Stmt {
    pub fn is_empty(&self) -> bool {
        matches!(self, Stmt::Empty(_))
    }

    /// Append `stmt` after `self`, flattening sequences.
    pub fn then(self, stmt: Stmt) -> Stmt {
        match (self, stmt) {
            (Stmt::Empty(_), s) | (s, Stmt::Empty(_)) => s,
            (Stmt::Seq(mut a), Stmt::Seq(b)) => {
                a.stmts.extend(b.stmts);
                Stmt::Seq(a)
            }
            (Stmt::Seq(mut a), s) => {
                a.stmts.push(s);
                Stmt::Seq(a)
            }
            (s, t) => Stmt::seq(vec![s, t]),
        }
    }

    /// Immediate child statements.
    pub fn children(&self) -> Vec<&Stmt> {
        match self {
            Stmt::Seq(s) => s.stmts.iter().collect(),
            Stmt::If(i) => vec![i.tbranch.as_ref(), i.fbranch.as_ref()],
            Stmt::While(w) => vec![w.body.as_ref()],
            Stmt::Timing(t) => vec![t.body.as_ref()],
            Stmt::Wait(w) => vec![w.body.as_ref()],
            Stmt::Fork(f) => f.branches.iter().collect(),
            Stmt::Assign(_)
            | Stmt::Delay(_)
            | Stmt::Call(_)
            | Stmt::Fire(_)
            | Stmt::Force(_)
            | Stmt::Release(_)
            | Stmt::Sync(_)
            | Stmt::Finish(_)
            | Stmt::Empty(_) => vec![],
        }
    }

    pub fn children_mut(&mut self) -> Vec<&mut Stmt> {
        match self {
            Stmt::Seq(s) => s.stmts.iter_mut().collect(),
            Stmt::If(i) => vec![i.tbranch.as_mut(), i.fbranch.as_mut()],
            Stmt::While(w) => vec![w.body.as_mut()],
            Stmt::Timing(t) => vec![t.body.as_mut()],
            Stmt::Wait(w) => vec![w.body.as_mut()],
            Stmt::Fork(f) => f.branches.iter_mut().collect(),
            Stmt::Assign(_)
            | Stmt::Delay(_)
            | Stmt::Call(_)
            | Stmt::Fire(_)
            | Stmt::Force(_)
            | Stmt::Release(_)
            | Stmt::Sync(_)
            | Stmt::Finish(_)
            | Stmt::Empty(_) => vec![],
        }
    }

    /// Expressions owned directly by this statement.
    pub fn exprs(&self) -> Vec<&Expr> {
        match self {
            Stmt::Assign(a) => {
                let mut v = vec![&a.lhs, &a.rhs];
                v.extend(a.delay.iter());
                v
            }
            Stmt::If(i) => vec![&i.cond],
            Stmt::While(w) => vec![&w.cond],
            Stmt::Delay(d) => vec![&d.amount],
            Stmt::Timing(t) => t.sens.iter().map(|s| &s.expr).collect(),
            Stmt::Wait(w) => vec![&w.cond],
            Stmt::Call(c) => {
                let mut v: Vec<&Expr> = c.args.iter().collect();
                if let Callee::Method { obj, .. } = &c.callee {
                    v.push(obj);
                }
                v.extend(c.ret.iter());
                v
            }
            Stmt::Fire(f) => vec![&f.event],
            Stmt::Force(f) => vec![&f.lhs, &f.rhs],
            Stmt::Release(r) => vec![&r.lhs],
            Stmt::Sync(s) => match &s.op {
                SyncOp::SemGet { sem, keys } | SyncOp::SemPut { sem, keys } => {
                    vec![sem, keys]
                }
                SyncOp::ProcSelf { target } => vec![target],
                SyncOp::ProcKill(h) | SyncOp::ProcAwait(h) => vec![h],
            },
            Stmt::Seq(_)
            | Stmt::Fork(_)
            | Stmt::Finish(_)
            | Stmt::Empty(_) => vec![],
        }
    }

    pub fn exprs_mut(&mut self) -> Vec<&mut Expr> {
        match self {
            Stmt::Assign(a) => {
                let mut v = vec![&mut a.lhs, &mut a.rhs];
                v.extend(a.delay.iter_mut());
                v
            }
            Stmt::If(i) => vec![&mut i.cond],
            Stmt::While(w) => vec![&mut w.cond],
            Stmt::Delay(d) => vec![&mut d.amount],
            Stmt::Timing(t) => t.sens.iter_mut().map(|s| &mut s.expr).collect(),
            Stmt::Wait(w) => vec![&mut w.cond],
            Stmt::Call(c) => {
                let mut v: Vec<&mut Expr> = c.args.iter_mut().collect();
                if let Callee::Method { obj, .. } = &mut c.callee {
                    v.push(obj);
                }
                v.extend(c.ret.iter_mut());
                v
            }
            Stmt::Fire(f) => vec![&mut f.event],
            Stmt::Force(f) => vec![&mut f.lhs, &mut f.rhs],
            Stmt::Release(r) => vec![&mut r.lhs],
            Stmt::Sync(s) => match &mut s.op {
                SyncOp::SemGet { sem, keys } | SyncOp::SemPut { sem, keys } => {
                    vec![sem, keys]
                }
                SyncOp::ProcSelf { target } => vec![target],
                SyncOp::ProcKill(h) | SyncOp::ProcAwait(h) => vec![h],
            },
            Stmt::Seq(_)
            | Stmt::Fork(_)
            | Stmt::Finish(_)
            | Stmt::Empty(_) => vec![],
        }
    }

    /// Pre-order walk over this statement and all nested statements.
    pub fn walk<F: FnMut(&Stmt)>(&self, f: &mut F) {
        f(self);
        for c in self.children() {
            c.walk(f);
        }
    }

    /// Mutable pre-order walk.
    pub fn walk_mut<F: FnMut(&mut Stmt)>(&mut self, f: &mut F) {
        f(self);
        for c in self.children_mut() {
            c.walk_mut(f);
        }
    }

    /// Apply `f` to every expression in this statement tree.
    pub fn for_each_expr_mut<F: FnMut(&mut Expr)>(&mut self, f: &mut F) {
        self.walk_mut(&mut |s| {
            for e in s.exprs_mut() {
                f(e)
            }
        })
    }

    /// Any statement in the tree satisfies `pred`.
    pub fn any<F: FnMut(&Stmt) -> bool>(&self, pred: &mut F) -> bool {
        let mut found = false;
        self.walk(&mut |s| found = found || pred(s));
        found
    }
}

impl GetAttributes for Stmt {
    fn get_attributes(&self) -> &Attributes {
        match self {
            Stmt::Seq(s) => s.get_attributes(),
            Stmt::Assign(s) => s.get_attributes(),
            Stmt::If(s) => s.get_attributes(),
            Stmt::While(s) => s.get_attributes(),
            Stmt::Delay(s) => s.get_attributes(),
            Stmt::Timing(s) => s.get_attributes(),
            Stmt::Wait(s) => s.get_attributes(),
            Stmt::Fork(s) => s.get_attributes(),
            Stmt::Call(s) => s.get_attributes(),
            Stmt::Fire(s) => s.get_attributes(),
            Stmt::Force(s) => s.get_attributes(),
            Stmt::Release(s) => s.get_attributes(),
            Stmt::Sync(s) => s.get_attributes(),
            Stmt::Finish(s) => s.get_attributes(),
            Stmt::Empty(s) => s.get_attributes(),
        }
    }

    fn get_mut_attributes(&mut self) -> &mut Attributes {
        match self {
            Stmt::Seq(s) => s.get_mut_attributes(),
            Stmt::Assign(s) => s.get_mut_attributes(),
            Stmt::If(s) => s.get_mut_attributes(),
            Stmt::While(s) => s.get_mut_attributes(),
            Stmt::Delay(s) => s.get_mut_attributes(),
            Stmt::Timing(s) => s.get_mut_attributes(),
            Stmt::Wait(s) => s.get_mut_attributes(),
            Stmt::Fork(s) => s.get_mut_attributes(),
            Stmt::Call(s) => s.get_mut_attributes(),
            Stmt::Fire(s) => s.get_mut_attributes(),
            Stmt::Force(s) => s.get_mut_attributes(),
            Stmt::Release(s) => s.get_mut_attributes(),
            Stmt::Sync(s) => s.get_mut_attributes(),
            Stmt::Finish(s) => s.get_mut_attributes(),
            Stmt::Empty(s) => s.get_mut_attributes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{rrc, Variable};

    #[test]
    fn then_flattens() {
        let a = rrc(Variable::logic("a", 1));
        let s = Stmt::empty()
            .then(Stmt::assign(Expr::var(&a), Expr::one()))
            .then(Stmt::assign(Expr::var(&a), Expr::zero()))
            .then(Stmt::empty());
        match s {
            Stmt::Seq(seq) => assert_eq!(seq.stmts.len(), 2),
            _ => panic!("expected a sequence"),
        }
    }

    #[test]
    fn walk_reaches_nested() {
        let body = Stmt::forever(Stmt::seq(vec![
            Stmt::delay(Expr::constant(1, 32)),
            Stmt::fork(vec![Stmt::finish()], JoinType::None),
        ]));
        let mut delays = 0;
        body.walk(&mut |s| {
            if matches!(s, Stmt::Delay(_) | Stmt::Finish(_)) {
                delays += 1
            }
        });
        assert_eq!(delays, 2);
    }
}
