use crate::traversal::{Action, Named, VisResult, Visitor};
use strobe_ir::{self as ir, Expr, Module, Stmt};

/// Rewrites bit selects with a constant offset into constant slices:
/// `x[2 +: 4]` becomes `x[5:2]`.
#[derive(Default)]
pub struct SelOpt {
    /// Number of rewritten selects in the current module.
    rewritten: u64,
}

impl Named for SelOpt {
    fn name() -> &'static str {
        "sel-opt"
    }

    fn description() -> &'static str {
        "Turn selects with a constant offset into constant slices"
    }
}

impl SelOpt {
    fn rewrite(&mut self, expr: &mut Expr) {
        expr.visit_mut(&mut |e| {
            let Expr::Sel { base, lsb, width } = e else {
                return;
            };
            let Some(lsb) = lsb.as_const() else {
                return;
            };
            let width = *width;
            let base = std::mem::replace(base.as_mut(), Expr::zero());
            *e = Expr::slice(base, lsb, width);
            self.rewritten += 1;
        });
    }

    fn rewrite_stmt(&mut self, stmt: &mut Stmt) {
        stmt.for_each_expr_mut(&mut |e| self.rewrite(e));
    }
}

impl Visitor for SelOpt {
    fn start_task(
        &mut self,
        task: &mut ir::Task,
        _module: &mut Module,
        _comps: &[Module],
    ) -> VisResult {
        self.rewrite_stmt(&mut task.body);
        Ok(Action::SkipChildren)
    }

    fn start_process(
        &mut self,
        proc: &mut ir::Process,
        _module: &mut Module,
        _comps: &[Module],
    ) -> VisResult {
        if let ir::ProcessKind::Always(Some(sens)) = &mut proc.kind {
            sens.iter_mut().for_each(|item| self.rewrite(&mut item.expr));
        }
        self.rewrite_stmt(&mut proc.body);
        Ok(Action::SkipChildren)
    }

    fn finish(&mut self, module: &mut Module, _comps: &[Module]) -> VisResult {
        if self.rewritten > 0 {
            log::info!(
                "{}: {} constant selects rewritten",
                module.name,
                self.rewritten
            );
        }
        Ok(Action::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir::{ModuleKind, Process, ProcessKind, Variable};

    #[test]
    fn constant_selects_become_slices() {
        let mut top = Module::new("top", ModuleKind::Design);
        let x = top.add_var(Variable::logic("x", 8));
        let i = top.add_var(Variable::logic("i", 3));
        let y = top.add_var(Variable::logic("y", 4));
        top.add_process(Process::new(
            "p",
            ProcessKind::Comb,
            Stmt::seq(vec![
                Stmt::assign(
                    Expr::var(&y),
                    Expr::sel(Expr::var(&x), Expr::constant(2, 3), 4),
                ),
                Stmt::assign(
                    Expr::sel(Expr::var(&y), Expr::var(&i), 1),
                    Expr::sel(
                        Expr::sel(Expr::var(&x), Expr::constant(4, 3), 4),
                        Expr::constant(1, 2),
                        2,
                    ),
                ),
            ]),
        ));
        let mut ctx = ir::Context::new(vec![top], "top");
        let pass = SelOpt::do_pass_default(&mut ctx).unwrap();
        // The count is reset after every module.
        assert_eq!(pass.rewritten, 0);
        let p = ctx.entrypoint().unwrap().find_process("p").unwrap();
        assert_eq!(
            ir::Printer::stmt_to_str(&p.borrow().body),
            "begin\n  y = x[5:2];\n  y[i +: 1] = x[7:4][2:1];\nend\n"
        );
    }
}
