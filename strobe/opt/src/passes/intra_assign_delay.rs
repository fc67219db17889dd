use crate::traversal::{Action, Named, VisResult, Visitor};
use strobe_ir::{
    self as ir, AssignKind, Builder, Expr, JoinType, Module, Stmt, VarType,
};

/// Lowers intra-assignment delays.
///
/// The right-hand side is evaluated into a fresh temporary when the
/// statement executes and the assignment happens after the delay:
/// ```text
/// lhs = #d rhs;       =>  tmp = rhs; #d; lhs = tmp;
/// lhs <= #d rhs;      =>  tmp = rhs; fork begin #d; lhs <= tmp; end join_none
/// ```
/// The nonblocking form must not block the process, so the delayed
/// assignment runs in a forked thread that is never joined.
#[derive(Default)]
pub struct IntraAssignDelay {
    /// Process or task whose body is being visited.
    unit: ir::Id,
}

impl Named for IntraAssignDelay {
    fn name() -> &'static str {
        "intra-assign-delay"
    }

    fn description() -> &'static str {
        "Lower `lhs = #d rhs` into a captured temporary and a delayed assignment"
    }
}

impl Visitor for IntraAssignDelay {
    fn start_task(
        &mut self,
        task: &mut ir::Task,
        _module: &mut Module,
        _comps: &[Module],
    ) -> VisResult {
        self.unit = task.name;
        Ok(Action::Continue)
    }

    fn start_process(
        &mut self,
        proc: &mut ir::Process,
        _module: &mut Module,
        _comps: &[Module],
    ) -> VisResult {
        self.unit = proc.name;
        Ok(Action::Continue)
    }

    fn assign(
        &mut self,
        s: &mut ir::Assign,
        module: &mut Module,
        _comps: &[Module],
    ) -> VisResult {
        let Some(delay) = s.delay.take() else {
            return Ok(Action::Continue);
        };
        let target = s
            .lhs
            .target_storage()
            .map(|v| v.name().to_string())
            .unwrap_or_else(|| "lhs".to_string());
        let name = module.generate_numbered("__Vintraval", format!("__{target}"));
        let tmp = Builder::new(module).add_named_local(
            name,
            VarType::Logic {
                width: s.lhs.width(),
            },
            self.unit,
        );

        let capture = Stmt::assign(
            Expr::var(&tmp),
            std::mem::replace(&mut s.rhs, Expr::var(&tmp)),
        );
        let delayed = Stmt::Assign(s.clone());
        let lowered = match s.kind {
            AssignKind::Blocking => {
                Stmt::seq(vec![capture, Stmt::delay(delay), delayed])
            }
            AssignKind::NonBlocking => Stmt::seq(vec![
                capture,
                Stmt::fork(
                    vec![Stmt::seq(vec![Stmt::delay(delay), delayed])],
                    JoinType::None,
                ),
            ]),
        };
        Ok(Action::change(lowered))
    }
}
