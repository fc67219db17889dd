use itertools::Itertools;
use std::rc::Rc;
use strobe_ir::{self as ir, Expr, Stmt, SyncOp, RRC};

/// Calculate the reads-from and writes-to set for statement trees.
pub struct ReadWriteSet;

impl ReadWriteSet {
    /// Storage read when `expr` is evaluated as a value: plain variables
    /// and member fields, including the handles members are reached through.
    pub fn expr_reads(expr: &Expr) -> Vec<RRC<ir::Variable>> {
        let mut out = vec![];
        expr.visit(&mut |e| match e {
            Expr::Var(vr) => out.push(Rc::clone(&vr.var)),
            Expr::Member { field, .. } => out.push(Rc::clone(&field.var)),
            _ => (),
        });
        out
    }

    /// Reads performed while computing where the lvalue `expr` points to.
    fn lvalue_reads(expr: &Expr, out: &mut Vec<RRC<ir::Variable>>) {
        match expr {
            Expr::Var(_) => (),
            Expr::Member { obj, .. } => out.extend(Self::expr_reads(obj)),
            Expr::Slice { base, .. } => Self::lvalue_reads(base, out),
            Expr::Sel { base, lsb, .. } => {
                Self::lvalue_reads(base, out);
                out.extend(Self::expr_reads(lsb));
            }
            Expr::Concat(es) => {
                es.iter().for_each(|e| Self::lvalue_reads(e, out))
            }
            e => out.extend(Self::expr_reads(e)),
        }
    }

    fn lvalue_writes(expr: &Expr, out: &mut Vec<RRC<ir::Variable>>) {
        match expr {
            Expr::Var(vr) => out.push(Rc::clone(&vr.var)),
            Expr::Member { field, .. } => out.push(Rc::clone(&field.var)),
            Expr::Slice { base, .. } | Expr::Sel { base, .. } => {
                Self::lvalue_writes(base, out)
            }
            Expr::Concat(es) => {
                es.iter().for_each(|e| Self::lvalue_writes(e, out))
            }
            _ => (),
        }
    }

    /// Expressions of `stmt` that are used as lvalues.
    pub fn lvalues(stmt: &Stmt) -> Vec<&Expr> {
        match stmt {
            Stmt::Assign(a) => vec![&a.lhs],
            Stmt::Call(c) => c.ret.iter().collect(),
            Stmt::Force(f) => vec![&f.lhs],
            Stmt::Release(r) => vec![&r.lhs],
            Stmt::Sync(s) => match &s.op {
                SyncOp::ProcSelf { target } => vec![target],
                _ => vec![],
            },
            _ => vec![],
        }
    }

    /// Reads of a single statement, not including nested statements.
    pub fn stmt_reads(stmt: &Stmt) -> Vec<RRC<ir::Variable>> {
        let lvals = Self::lvalues(stmt);
        let mut out = vec![];
        for e in stmt.exprs() {
            if lvals.iter().any(|l| std::ptr::eq(*l, e)) {
                Self::lvalue_reads(e, &mut out)
            } else {
                out.extend(Self::expr_reads(e))
            }
        }
        out
    }

    /// Writes of a single statement, not including nested statements.
    pub fn stmt_writes(stmt: &Stmt) -> Vec<RRC<ir::Variable>> {
        let mut out = vec![];
        for e in Self::lvalues(stmt) {
            Self::lvalue_writes(e, &mut out)
        }
        out
    }

    /// Variables read anywhere in the statement tree.
    pub fn read_set(stmt: &Stmt) -> Vec<RRC<ir::Variable>> {
        let mut out = vec![];
        stmt.walk(&mut |s| out.extend(Self::stmt_reads(s)));
        out.into_iter().unique_by(|v| Rc::as_ptr(v)).collect()
    }

    /// Variables written anywhere in the statement tree.
    pub fn write_set(stmt: &Stmt) -> Vec<RRC<ir::Variable>> {
        let mut out = vec![];
        stmt.walk(&mut |s| out.extend(Self::stmt_writes(s)));
        out.into_iter().unique_by(|v| Rc::as_ptr(v)).collect()
    }

    /// Variables read or written in the statement tree, in order of first
    /// use.
    pub fn uses(stmt: &Stmt) -> Vec<RRC<ir::Variable>> {
        let mut out = vec![];
        stmt.walk(&mut |s| {
            out.extend(Self::stmt_reads(s));
            out.extend(Self::stmt_writes(s));
        });
        out.into_iter().unique_by(|v| Rc::as_ptr(v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir::{rrc, Variable};

    fn names(vars: &[RRC<ir::Variable>]) -> Vec<String> {
        vars.iter().map(|v| v.borrow().name.to_string()).collect()
    }

    #[test]
    fn index_of_lhs_is_a_read() {
        let a = rrc(Variable::logic("a", 8));
        let i = rrc(Variable::logic("i", 3));
        let b = rrc(Variable::logic("b", 1));
        let s = Stmt::assign(
            Expr::sel(Expr::var(&a), Expr::var(&i), 1),
            Expr::var(&b),
        );
        assert_eq!(names(&ReadWriteSet::read_set(&s)), vec!["i", "b"]);
        assert_eq!(names(&ReadWriteSet::write_set(&s)), vec!["a"]);
    }

    #[test]
    fn member_writes_name_the_field() {
        let h = rrc(Variable::new("h", ir::VarType::Class("C".into())));
        let f = rrc(Variable::logic("f", 4));
        let s = Stmt::seq(vec![
            Stmt::assign(Expr::member(Expr::var(&h), &f), Expr::zero()),
            Stmt::assign(Expr::member(Expr::var(&h), &f), Expr::one()),
        ]);
        assert_eq!(names(&ReadWriteSet::read_set(&s)), vec!["h"]);
        assert_eq!(names(&ReadWriteSet::write_set(&s)), vec!["f"]);
        assert_eq!(names(&ReadWriteSet::uses(&s)), vec!["h", "f"]);
    }
}
