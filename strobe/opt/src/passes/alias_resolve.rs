use crate::traversal::{
    Action, ConstructVisitor, DiagnosticContext, DiagnosticPass, Named,
    VisResult, Visitor,
};
use std::collections::HashMap;
use std::rc::Rc;
use strobe_ir::{self as ir, Module, Rewriter, RRC};
use strobe_utils::{Error, StrobeResult};

/// Resolves net aliases. For every `alias a = b;` all references to `a` are
/// redirected to `b` and `a` is removed from the module.
///
/// Chains of aliases are followed, so that after
/// ```text
/// alias a = b;
/// alias b = c;
/// ```
/// both `a` and `b` refer to `c`. Ports cannot be aliased.
pub struct AliasResolve {
    diag: DiagnosticContext,
}

impl ConstructVisitor for AliasResolve {
    fn from(_ctx: &ir::Context) -> StrobeResult<Self> {
        Ok(AliasResolve {
            diag: DiagnosticContext::default(),
        })
    }

    fn clear_data(&mut self) {
        // Diagnostics are collected across modules.
    }
}

impl Named for AliasResolve {
    fn name() -> &'static str {
        "alias-resolve"
    }

    fn description() -> &'static str {
        "Redirect references of aliased nets to their target"
    }
}

impl DiagnosticPass for AliasResolve {
    fn diagnostics(&self) -> &DiagnosticContext {
        &self.diag
    }
}

/// Follow `var` through `map` until a variable that is not aliased.
fn target(
    map: &HashMap<ir::Id, RRC<ir::Variable>>,
    var: &RRC<ir::Variable>,
) -> RRC<ir::Variable> {
    let mut cur = Rc::clone(var);
    let mut steps = 0;
    loop {
        let name = cur.borrow().name;
        let Some(next) = map.get(&name) else {
            return cur;
        };
        // Cyclic aliases.
        if steps > map.len() {
            return cur;
        }
        cur = Rc::clone(next);
        steps += 1;
    }
}

impl Visitor for AliasResolve {
    fn start(&mut self, module: &mut Module, _comps: &[Module]) -> VisResult {
        if module.aliases.is_empty() {
            return Ok(Action::Stop);
        }

        let mut direct: HashMap<ir::Id, RRC<ir::Variable>> = HashMap::new();
        for alias in std::mem::take(&mut module.aliases) {
            let (lhs, rhs) = (alias.lhs.borrow(), alias.rhs.borrow());
            if lhs.is_port() || rhs.is_port() {
                let port = if lhs.is_port() { lhs.name } else { rhs.name };
                self.diag.err(
                    Error::unsupported(format!(
                        "Aliased port reference `{port}`"
                    ))
                    .with_pos(&alias.pos),
                );
                continue;
            }
            if lhs.name == rhs.name {
                continue;
            }
            direct.insert(lhs.name, Rc::clone(&alias.rhs));
        }

        let resolved: HashMap<ir::Id, RRC<ir::Variable>> = direct
            .iter()
            .map(|(name, rhs)| (*name, target(&direct, rhs)))
            .collect();
        let rewriter = Rewriter::new(resolved);

        for task in module.tasks.iter() {
            rewriter.rewrite_stmt(&mut task.borrow_mut().body);
        }
        for proc in module.processes.iter() {
            let mut proc = proc.borrow_mut();
            rewriter.rewrite_stmt(&mut proc.body);
            if let ir::ProcessKind::Always(Some(sens)) = &mut proc.kind {
                for item in sens.iter_mut() {
                    rewriter.rewrite_expr(&mut item.expr);
                }
            }
        }
        for c in module.constraints.iter_mut() {
            for item in c.items.iter_mut() {
                rewriter.rewrite_expr(&mut item.cond);
            }
        }

        let removed = module
            .vars
            .retain(|v| !rewriter.var_map.contains_key(&v.borrow().name));
        log::debug!("{}: removed {removed} aliased nets", module.name);

        // Bodies were rewritten above.
        Ok(Action::Stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir::{Alias, Expr, ModuleKind, Process, ProcessKind, Stmt, Variable};
    use strobe_utils::GPosIdx;

    fn alias(lhs: &RRC<ir::Variable>, rhs: &RRC<ir::Variable>) -> Alias {
        Alias {
            lhs: Rc::clone(lhs),
            rhs: Rc::clone(rhs),
            pos: GPosIdx::UNKNOWN,
        }
    }

    #[test]
    fn chains_are_followed() {
        let mut top = Module::new("top", ModuleKind::Design);
        let a = top.add_var(Variable::logic("a", 1));
        let b = top.add_var(Variable::logic("b", 1));
        let c = top.add_var(Variable::logic("c", 1));
        top.aliases = vec![alias(&a, &b), alias(&b, &c)];
        top.add_process(Process::new(
            "p",
            ProcessKind::Initial,
            Stmt::assign(Expr::var(&a), Expr::var(&b)),
        ));
        let mut ctx = ir::Context::new(vec![top], "top");
        let pass = AliasResolve::do_pass_default(&mut ctx).unwrap();
        assert!(!pass.diagnostics().has_errors());
        let top = ctx.entrypoint().unwrap();
        assert!(top.find_var("a").is_none() && top.find_var("b").is_none());
        let p = top.find_process("p").unwrap();
        let text = ir::Printer::stmt_to_str(&p.borrow().body);
        assert_eq!(text, "c = c;\n");
    }

    #[test]
    fn cyclic_aliases_terminate() {
        let a = ir::rrc(Variable::logic("a", 1));
        let b = ir::rrc(Variable::logic("b", 1));
        let map: HashMap<_, _> = [
            (ir::Id::new("a"), Rc::clone(&b)),
            (ir::Id::new("b"), Rc::clone(&a)),
        ]
        .into_iter()
        .collect();
        let end = target(&map, &a);
        assert!(Rc::ptr_eq(&end, &a) || Rc::ptr_eq(&end, &b));
        let c = ir::rrc(Variable::logic("c", 1));
        assert!(Rc::ptr_eq(&target(&map, &c), &c));
    }

    #[test]
    fn ports_cannot_be_aliased() {
        let mut top = Module::new("top", ModuleKind::Design);
        let a = top.add_var(
            Variable::logic("a", 1).with_direction(ir::Direction::Input),
        );
        let b = top.add_var(Variable::logic("b", 1));
        top.aliases = vec![alias(&b, &a)];
        let mut ctx = ir::Context::new(vec![top], "top");
        let mut pass = <AliasResolve as ConstructVisitor>::from(&ctx).unwrap();
        pass.do_pass(&mut ctx).unwrap();
        let errs: Vec<_> = pass.diagnostics().errors_iter().collect();
        assert_eq!(errs.len(), 1);
        assert!(errs[0].is_unsupported());
    }
}
