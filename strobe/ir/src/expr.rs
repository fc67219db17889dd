//! Expressions over variables.
use super::{Id, Variable, RRC};
use std::rc::Rc;

/// Reference to a variable from an expression.
#[derive(Clone)]
pub struct VarRef {
    pub var: RRC<Variable>,
    /// Reads through this reference see the underlying value even while the
    /// variable is forced.
    pub no_force: bool,
}

impl VarRef {
    pub fn new(var: &RRC<Variable>) -> Self {
        Self {
            var: Rc::clone(var),
            no_force: false,
        }
    }

    pub fn name(&self) -> Id {
        self.var.borrow().name
    }

    pub fn width(&self) -> u64 {
        self.var.borrow().width()
    }

    /// Both references point to the same variable.
    pub fn same_var(&self, other: &VarRef) -> bool {
        Rc::ptr_eq(&self.var, &other.var)
    }
}

impl std::fmt::Debug for VarRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VarRef({})", self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
    /// Bitwise negation.
    Not,
    /// Logical negation.
    LogNot,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    LogAnd,
    LogOr,
}

impl BinOp {
    /// The operator produces a single-bit result.
    pub fn is_predicate(&self) -> bool {
        matches!(
            self,
            BinOp::Eq
                | BinOp::Neq
                | BinOp::Lt
                | BinOp::Le
                | BinOp::Gt
                | BinOp::Ge
                | BinOp::LogAnd
                | BinOp::LogOr
        )
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::And => "&",
            BinOp::Or => "|",
            BinOp::Xor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Eq => "==",
            BinOp::Neq => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::LogAnd => "&&",
            BinOp::LogOr => "||",
        }
    }
}

/// Runtime queries on synchronization objects.
#[derive(Clone, Debug)]
pub enum Query {
    /// `sem.try_get(keys)`: takes the keys if available, yields 1 on success.
    SemTryGet { sem: Box<Expr>, keys: Box<Expr> },
    /// `handle.status()` of a process handle.
    ProcStatus(Box<Expr>),
}

/// Width of a process status value.
pub const STATUS_WIDTH: u64 = 32;

#[derive(Clone, Debug)]
pub enum Expr {
    Const { value: u64, width: u64 },
    Var(VarRef),
    /// Member `field` of the object `obj` points to.
    Member { obj: Box<Expr>, field: VarRef },
    /// Part select with a runtime offset.
    Sel {
        base: Box<Expr>,
        lsb: Box<Expr>,
        width: u64,
    },
    /// Part select with a constant offset.
    Slice { base: Box<Expr>, lsb: u64, width: u64 },
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// Concatenation, most significant operand first.
    Concat(Vec<Expr>),
    /// Uniform random value. When `choices` is present the value is drawn
    /// from it instead.
    Random { width: u64, choices: Option<Vec<u64>> },
    /// Fresh instance of the named class.
    New(Id),
    Query(Query),
}

/// Target of a write.
pub enum LvalueTarget<'a> {
    Var(&'a VarRef),
    Field { obj: &'a Expr, field: &'a VarRef },
}

impl Expr {
    pub fn constant(value: u64, width: u64) -> Self {
        Expr::Const {
            value: mask(value, width),
            width,
        }
    }

    pub fn one() -> Self {
        Expr::constant(1, 1)
    }

    pub fn zero() -> Self {
        Expr::constant(0, 1)
    }

    pub fn var(var: &RRC<Variable>) -> Self {
        Expr::Var(VarRef::new(var))
    }

    pub fn member(obj: Expr, field: &RRC<Variable>) -> Self {
        Expr::Member {
            obj: Box::new(obj),
            field: VarRef::new(field),
        }
    }

    pub fn slice(base: Expr, lsb: u64, width: u64) -> Self {
        Expr::Slice {
            base: Box::new(base),
            lsb,
            width,
        }
    }

    pub fn sel(base: Expr, lsb: Expr, width: u64) -> Self {
        Expr::Sel {
            base: Box::new(base),
            lsb: Box::new(lsb),
            width,
        }
    }

    pub fn unary(op: UnOp, e: Expr) -> Self {
        Expr::Unary(op, Box::new(e))
    }

    pub fn binary(op: BinOp, l: Expr, r: Expr) -> Self {
        Expr::Binary(op, Box::new(l), Box::new(r))
    }

    pub fn not(e: Expr) -> Self {
        Expr::unary(UnOp::Not, e)
    }

    pub fn lognot(e: Expr) -> Self {
        Expr::unary(UnOp::LogNot, e)
    }

    pub fn and(l: Expr, r: Expr) -> Self {
        Expr::binary(BinOp::And, l, r)
    }

    pub fn or(l: Expr, r: Expr) -> Self {
        Expr::binary(BinOp::Or, l, r)
    }

    pub fn eq(l: Expr, r: Expr) -> Self {
        Expr::binary(BinOp::Eq, l, r)
    }

    pub fn neq(l: Expr, r: Expr) -> Self {
        Expr::binary(BinOp::Neq, l, r)
    }

    pub fn log_and(l: Expr, r: Expr) -> Self {
        Expr::binary(BinOp::LogAnd, l, r)
    }

    pub fn log_or(l: Expr, r: Expr) -> Self {
        Expr::binary(BinOp::LogOr, l, r)
    }

    /// Value of a constant expression.
    pub fn as_const(&self) -> Option<u64> {
        match self {
            Expr::Const { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Bit width of the value this expression produces.
    pub fn width(&self) -> u64 {
        match self {
            Expr::Const { width, .. }
            | Expr::Sel { width, .. }
            | Expr::Slice { width, .. }
            | Expr::Random { width, .. } => *width,
            Expr::Var(vr) => vr.width(),
            Expr::Member { field, .. } => field.width(),
            Expr::Unary(UnOp::Not, e) => e.width(),
            Expr::Unary(UnOp::LogNot, _) => 1,
            Expr::Binary(op, l, r) => {
                if op.is_predicate() {
                    1
                } else if matches!(op, BinOp::Shl | BinOp::Shr) {
                    l.width()
                } else {
                    l.width().max(r.width())
                }
            }
            Expr::Concat(es) => es.iter().map(Expr::width).sum(),
            Expr::New(_) => super::HANDLE_WIDTH,
            Expr::Query(Query::SemTryGet { .. }) => 1,
            Expr::Query(Query::ProcStatus(_)) => STATUS_WIDTH,
        }
    }

    /// Immediate subexpressions.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Const { .. }
            | Expr::Var(_)
            | Expr::Random { .. }
            | Expr::New(_) => vec![],
            Expr::Member { obj, .. } => vec![obj.as_ref()],
            Expr::Sel { base, lsb, .. } => vec![base.as_ref(), lsb.as_ref()],
            Expr::Slice { base, .. } => vec![base.as_ref()],
            Expr::Unary(_, e) => vec![e.as_ref()],
            Expr::Binary(_, l, r) => vec![l.as_ref(), r.as_ref()],
            Expr::Concat(es) => es.iter().collect(),
            Expr::Query(Query::SemTryGet { sem, keys }) => {
                vec![sem.as_ref(), keys.as_ref()]
            }
            Expr::Query(Query::ProcStatus(h)) => vec![h.as_ref()],
        }
    }

    fn children_mut(&mut self) -> Vec<&mut Expr> {
        match self {
            Expr::Const { .. }
            | Expr::Var(_)
            | Expr::Random { .. }
            | Expr::New(_) => vec![],
            Expr::Member { obj, .. } => vec![obj.as_mut()],
            Expr::Sel { base, lsb, .. } => vec![base.as_mut(), lsb.as_mut()],
            Expr::Slice { base, .. } => vec![base.as_mut()],
            Expr::Unary(_, e) => vec![e.as_mut()],
            Expr::Binary(_, l, r) => vec![l.as_mut(), r.as_mut()],
            Expr::Concat(es) => es.iter_mut().collect(),
            Expr::Query(Query::SemTryGet { sem, keys }) => {
                vec![sem.as_mut(), keys.as_mut()]
            }
            Expr::Query(Query::ProcStatus(h)) => vec![h.as_mut()],
        }
    }

    /// Pre-order walk over this expression and all of its subexpressions.
    pub fn visit<F: FnMut(&Expr)>(&self, f: &mut F) {
        f(self);
        for c in self.children() {
            c.visit(f);
        }
    }

    /// Replace subexpressions. `f` is called pre-order; when it returns a
    /// replacement the subtree is swapped out and not descended into.
    pub fn replace<F>(&mut self, f: &mut F)
    where
        F: FnMut(&Expr) -> Option<Expr>,
    {
        if let Some(new) = f(self) {
            *self = new;
            return;
        }
        for c in self.children_mut() {
            c.replace(f);
        }
    }

    /// Mutable pre-order walk over all subexpressions.
    pub fn visit_mut<F: FnMut(&mut Expr)>(&mut self, f: &mut F) {
        f(self);
        for c in self.children_mut() {
            c.visit_mut(f);
        }
    }

    /// All variable references that appear directly in this expression.
    /// Member fields are not included, only the handles they go through.
    pub fn vars(&self) -> Vec<VarRef> {
        let mut out = vec![];
        self.visit(&mut |e| {
            if let Expr::Var(vr) = e {
                out.push(vr.clone())
            }
        });
        out
    }

    /// The expression mentions a class member.
    pub fn has_member(&self) -> bool {
        let mut found = false;
        self.visit(&mut |e| found |= matches!(e, Expr::Member { .. }));
        found
    }

    /// Storage written when this expression is used on the left-hand side of
    /// an assignment. Part selects are looked through.
    pub fn target(&self) -> Option<LvalueTarget<'_>> {
        match self {
            Expr::Var(vr) => Some(LvalueTarget::Var(vr)),
            Expr::Member { obj, field } => {
                Some(LvalueTarget::Field {
                    obj: obj.as_ref(),
                    field,
                })
            }
            Expr::Sel { base, .. } | Expr::Slice { base, .. } => base.target(),
            _ => None,
        }
    }

    /// Variable written when used as an lvalue, if the target is a plain
    /// variable.
    pub fn target_var(&self) -> Option<&VarRef> {
        match self.target()? {
            LvalueTarget::Var(vr) => Some(vr),
            LvalueTarget::Field { .. } => None,
        }
    }

    /// Variable or member field written when used as an lvalue.
    pub fn target_storage(&self) -> Option<&VarRef> {
        match self.target()? {
            LvalueTarget::Var(vr) => Some(vr),
            LvalueTarget::Field { field, .. } => Some(field),
        }
    }
}

/// Truncate `value` to its lowest `width` bits.
pub fn mask(value: u64, width: u64) -> u64 {
    if width >= 64 {
        value
    } else {
        value & ((1u64 << width) - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rrc;

    #[test]
    fn widths() {
        let a = rrc(Variable::logic("a", 8));
        let b = rrc(Variable::logic("b", 4));
        let sum = Expr::binary(BinOp::Add, Expr::var(&a), Expr::var(&b));
        assert_eq!(sum.width(), 8);
        assert_eq!(Expr::eq(Expr::var(&a), Expr::var(&b)).width(), 1);
        let cat = Expr::Concat(vec![Expr::var(&a), Expr::var(&b)]);
        assert_eq!(cat.width(), 12);
        assert_eq!(Expr::constant(0x1ff, 8).as_const(), Some(0xff));
    }

    #[test]
    fn target_looks_through_selects() {
        let a = rrc(Variable::logic("a", 8));
        let e = Expr::slice(Expr::var(&a), 2, 3);
        assert_eq!(e.target_var().map(|v| v.name()), Some(Id::new("a")));
        assert!(Expr::one().target().is_none());
    }

    #[test]
    fn replace_stops_at_replacement() {
        let a = rrc(Variable::logic("a", 8));
        let b = rrc(Variable::logic("b", 8));
        let mut e = Expr::and(Expr::var(&a), Expr::not(Expr::var(&a)));
        e.replace(&mut |e| match e {
            Expr::Var(vr) if vr.name() == "a" => Some(Expr::var(&b)),
            _ => None,
        });
        let names: Vec<_> = e.vars().iter().map(|v| v.name()).collect();
        assert_eq!(names, vec![Id::new("b"), Id::new("b")]);
    }
}
