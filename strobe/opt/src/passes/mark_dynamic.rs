use crate::analysis::{CallGraph, ReadWriteSet, Suspendability, UnitKey};
use crate::traversal::{
    Action, ConstructVisitor, Named, ParseVal, PassOpt, VisResult, Visitor,
};
use strobe_ir::{
    self as ir, AssignKind, BoolAttr, Edge, Expr, GetAttributes, Module,
    ProcessKind, SenItem, Stmt,
};
use strobe_utils::StrobeResult;

/// Classifies every process and task as suspendable and/or dynamically
/// scheduled, and marks the variables they write.
///
/// The classification is the least fixed point computed by
/// [Suspendability]. Afterwards, processes that cannot stay static are
/// rewritten:
/// - `always body` that can suspend becomes `initial forever body`.
/// - `always @(sens) body` that can suspend, or whose sensitivity list reads
///   a variable written by a dynamically scheduled unit, becomes
///   `initial forever @(sens) body`.
///
/// Rewriting a process changes what it writes, so the analysis is repeated
/// until no process is rewritten.
pub struct MarkDynamic {
    /// Rewrite `@(anyedge x)` on a single bit into `@(edge x)`.
    normalize_anyedge: bool,
}

impl Named for MarkDynamic {
    fn name() -> &'static str {
        "mark-dynamic"
    }

    fn description() -> &'static str {
        "Classify units as suspendable or dynamically scheduled"
    }

    fn opts() -> Vec<PassOpt> {
        vec![PassOpt::new(
            "normalize-anyedge",
            "Rewrite a lone anyedge item on a one-bit signal into bothedge",
            ParseVal::Bool(true),
            PassOpt::parse_bool,
        )]
    }
}

impl ConstructVisitor for MarkDynamic {
    fn from(ctx: &ir::Context) -> StrobeResult<Self> {
        let opts = Self::get_opts(ctx);
        Ok(MarkDynamic {
            normalize_anyedge: opts["normalize-anyedge"].as_bool().unwrap_or(true),
        })
    }

    fn clear_data(&mut self) {}
}

impl MarkDynamic {
    /// Set the write flags of every variable written by a suspendable or
    /// dynamically scheduled unit. Writes from fork branches and delayed
    /// nonblocking assignments happen in threads of their own and count as
    /// dynamic.
    fn mark_vars(modules: &[Module], status: &Suspendability) {
        let mark = |body: &Stmt, susp: bool, dynamic: bool| {
            for v in ReadWriteSet::write_set(body) {
                let mut v = v.borrow_mut();
                v.written_by_suspendable |= susp;
                v.written_by_dynamic |= dynamic;
            }
            body.walk(&mut |s| match s {
                Stmt::Fork(fork) => {
                    for b in &fork.branches {
                        for v in ReadWriteSet::write_set(b) {
                            let mut v = v.borrow_mut();
                            v.written_by_suspendable = true;
                            v.written_by_dynamic = true;
                        }
                    }
                }
                Stmt::Assign(a)
                    if a.kind == AssignKind::NonBlocking
                        && a.delay.is_some() =>
                {
                    for v in ReadWriteSet::stmt_writes(s) {
                        let mut v = v.borrow_mut();
                        v.written_by_suspendable = true;
                        v.written_by_dynamic = true;
                    }
                }
                _ => (),
            });
        };
        for m in modules {
            for t in m.tasks.iter() {
                let t = t.borrow();
                let key = UnitKey::task(m.name, t.name);
                mark(&t.body, status.is_suspendable(key), status.is_dynamic(key));
            }
            for p in m.processes.iter() {
                let p = p.borrow();
                let key = UnitKey::process(m.name, p.name);
                mark(&p.body, status.is_suspendable(key), status.is_dynamic(key));
            }
        }
    }

    /// Rewrite `always` processes that cannot be scheduled statically.
    /// Returns the number of rewritten processes.
    fn rewrite_always(modules: &mut [Module], status: &Suspendability) -> usize {
        let mut rewritten = 0;
        for m in modules.iter_mut() {
            for proc in m.processes.iter() {
                let mut guard = proc.borrow_mut();
                let proc = &mut *guard;
                let key = UnitKey::process(m.name, proc.name);
                let suspendable = status.is_suspendable(key);
                let new_body = match &proc.kind {
                    ProcessKind::Always(None) if suspendable => {
                        Stmt::forever(std::mem::take(&mut proc.body))
                    }
                    ProcessKind::Always(Some(sens)) => {
                        let dynamic_sens = sens.iter().any(|item| {
                            ReadWriteSet::expr_reads(&item.expr)
                                .iter()
                                .any(|v| v.borrow().written_by_dynamic)
                        });
                        if !suspendable && !dynamic_sens {
                            continue;
                        }
                        let sens = sens.clone();
                        let body = std::mem::take(&mut proc.body);
                        Stmt::forever(Stmt::timing(sens, body))
                    }
                    _ => continue,
                };
                log::debug!(
                    "{}.{}: rewriting always block into a loop",
                    m.name,
                    proc.name
                );
                proc.body = new_body;
                proc.kind = ProcessKind::Initial;
                proc.attributes.insert(BoolAttr::FromAlways);
                rewritten += 1;
            }
        }
        rewritten
    }

    /// Record the classification as attributes of the units.
    fn apply_attributes(modules: &[Module], status: &Suspendability) {
        let apply = |key: UnitKey, attrs: &mut ir::Attributes| {
            if status.is_suspendable(key) && attrs.insert(BoolAttr::Suspendable)
            {
                log::debug!("{key}: suspendable");
            }
            if status.is_dynamic(key) && attrs.insert(BoolAttr::Dynamic) {
                log::debug!("{key}: dynamically scheduled");
            }
        };
        for m in modules {
            for t in m.tasks.iter() {
                let mut t = t.borrow_mut();
                apply(UnitKey::task(m.name, t.name), t.get_mut_attributes());
            }
            for p in m.processes.iter() {
                let mut p = p.borrow_mut();
                apply(UnitKey::process(m.name, p.name), p.get_mut_attributes());
            }
        }
    }

    /// `@(anyedge x)` on a one-bit `x` that only static code writes wakes on
    /// exactly the same changes as `@(edge x)`.
    fn normalize(module: &Module) {
        for proc in module.processes.iter() {
            let mut proc = proc.borrow_mut();
            let ProcessKind::Always(Some(sens)) = &mut proc.kind else {
                continue;
            };
            let [SenItem { edge, expr: Expr::Var(vr) }] = sens.as_mut_slice()
            else {
                continue;
            };
            let var = vr.var.borrow();
            if *edge == Edge::Any && var.width() == 1 && !var.written_by_dynamic
            {
                *edge = Edge::Both;
            }
        }
    }
}

impl Visitor for MarkDynamic {
    fn start_context(&mut self, ctx: &mut ir::Context) -> StrobeResult<()> {
        let mut rounds = 0;
        let status = loop {
            rounds += 1;
            let graph = CallGraph::new(&ctx.modules)?;
            let status = Suspendability::compute(&ctx.modules, &graph);
            Self::mark_vars(&ctx.modules, &status);
            if Self::rewrite_always(&mut ctx.modules, &status) == 0 {
                break status;
            }
        };
        log::debug!("{}: fixed point after {rounds} rounds", Self::name());
        Self::apply_attributes(&ctx.modules, &status);
        if self.normalize_anyedge {
            ctx.modules.iter().for_each(Self::normalize);
        }
        Ok(())
    }

    fn start(&mut self, _module: &mut Module, _comps: &[Module]) -> VisResult {
        // All of the work happens on the whole context.
        Ok(Action::Stop)
    }
}
