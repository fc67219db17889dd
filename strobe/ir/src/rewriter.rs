use crate::{self as ir, Expr, Stmt, RRC};
use std::collections::HashMap;
use std::rc::Rc;

/// A rewrite map from [ir::Id] to [T].
pub type RewriteMap<T> = HashMap<ir::Id, RRC<T>>;

/// Rewrites uses of variables. References through a class handle
/// (`obj.field`) name members of another module and are left alone; their
/// handles are rewritten.
#[derive(Default)]
pub struct Rewriter {
    /// Mapping from names of variables to the replacement variable.
    pub var_map: RewriteMap<ir::Variable>,
}

impl Rewriter {
    pub fn new(var_map: RewriteMap<ir::Variable>) -> Self {
        Self { var_map }
    }

    pub fn is_empty(&self) -> bool {
        self.var_map.is_empty()
    }

    /// Return the rewrite for a variable.
    pub fn get(&self, var: &RRC<ir::Variable>) -> Option<RRC<ir::Variable>> {
        self.var_map.get(&var.borrow().name).map(Rc::clone)
    }

    pub fn rewrite_expr(&self, expr: &mut Expr) {
        if self.is_empty() {
            return;
        }
        expr.visit_mut(&mut |e| {
            if let Expr::Var(vr) = e {
                if let Some(new) = self.get(&vr.var) {
                    vr.var = new;
                }
            }
        });
    }

    /// Rewrite every expression in the statement tree.
    pub fn rewrite_stmt(&self, stmt: &mut Stmt) {
        if self.is_empty() {
            return;
        }
        stmt.for_each_expr_mut(&mut |e| self.rewrite_expr(e));
    }
}
