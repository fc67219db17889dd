use super::{blocking_stmts, CallGraph, ReadWriteSet, UnitKey};
use std::collections::{HashSet, VecDeque};
use strobe_ir::{AssignKind, JoinType, Module, Stmt, SyncOp};

/// Least fixed point of the suspendable and dynamically scheduled
/// properties over the call graph.
///
/// A unit is suspendable when it can block and dynamically scheduled when it
/// can block on a condition that depends on runtime values. Both properties
/// flow from callees to callers and are shared by every method of an
/// override family.
#[derive(Default, Debug)]
pub struct Suspendability {
    suspendable: HashSet<UnitKey>,
    dynamic: HashSet<UnitKey>,
}

impl Suspendability {
    /// Compute the properties of every unit of `modules`.
    pub fn compute(modules: &[Module], graph: &CallGraph) -> Self {
        let mut status = Self::default();
        let mut worklist: VecDeque<UnitKey> = VecDeque::new();

        let mut seed = |key: UnitKey, body: &Stmt| {
            let (susp, dynamic) = Self::seed(body);
            if susp {
                status.suspendable.insert(key);
            }
            if dynamic {
                status.dynamic.insert(key);
            }
            if susp || dynamic {
                worklist.push_back(key);
            }
        };
        for m in modules {
            for t in m.tasks.iter() {
                let t = t.borrow();
                seed(UnitKey::task(m.name, t.name), &t.body);
            }
            for p in m.processes.iter() {
                let p = p.borrow();
                seed(UnitKey::process(m.name, p.name), &p.body);
            }
        }

        while let Some(key) = worklist.pop_front() {
            let susp = status.is_suspendable(key);
            let dynamic = status.is_dynamic(key);
            let related: Vec<UnitKey> = graph
                .callers(key)
                .chain(graph.family(key).iter().copied())
                .collect();
            for other in related {
                let mut changed = false;
                if susp {
                    changed |= status.suspendable.insert(other);
                }
                if dynamic {
                    changed |= status.dynamic.insert(other);
                }
                if changed {
                    worklist.push_back(other);
                }
            }
        }
        status
    }

    /// Suspension points a unit contains directly, as
    /// `(suspendable, dynamic)`.
    pub fn seed(body: &Stmt) -> (bool, bool) {
        let mut stmts = vec![];
        blocking_stmts(body, &mut stmts);
        let mut out = (false, false);
        for s in stmts {
            let (susp, dynamic) = match s {
                Stmt::Delay(_) => (true, false),
                Stmt::Assign(a) => (
                    a.kind == AssignKind::Blocking && a.delay.is_some(),
                    false,
                ),
                Stmt::Timing(_) => (true, true),
                Stmt::Wait(w) => {
                    let reads = !ReadWriteSet::expr_reads(&w.cond).is_empty();
                    (reads, reads)
                }
                Stmt::Fork(f) => {
                    let waits =
                        f.join != JoinType::None && !f.branches.is_empty();
                    (waits, waits)
                }
                Stmt::Sync(sync) => {
                    let blocks = matches!(
                        sync.op,
                        SyncOp::SemGet { .. } | SyncOp::ProcAwait(_)
                    );
                    (blocks, blocks)
                }
                _ => (false, false),
            };
            out.0 |= susp;
            out.1 |= dynamic;
        }
        out
    }

    pub fn is_suspendable(&self, key: UnitKey) -> bool {
        self.suspendable.contains(&key)
    }

    pub fn is_dynamic(&self, key: UnitKey) -> bool {
        self.dynamic.contains(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strobe_ir::{
        self as ir, Expr, ModuleKind, Process, ProcessKind, Task, TaskKind,
        Variable,
    };

    #[test]
    fn calls_propagate_to_callers() {
        let mut top = Module::new("top", ModuleKind::Design);
        let go = top.add_var(Variable::logic("go", 1));
        top.add_task(Task::new(
            "waiter",
            TaskKind::Task,
            Stmt::wait(Expr::var(&go), Stmt::empty()),
        ));
        top.add_task(Task::new(
            "middle",
            TaskKind::Task,
            Stmt::call("waiter", vec![]),
        ));
        top.add_task(Task::new(
            "sleeper",
            TaskKind::Task,
            Stmt::delay(Expr::constant(5, 32)),
        ));
        top.add_process(Process::new(
            "p",
            ProcessKind::Initial,
            Stmt::call("middle", vec![]),
        ));
        top.add_process(Process::new(
            "q",
            ProcessKind::Initial,
            Stmt::call("sleeper", vec![]),
        ));
        top.add_process(Process::new(
            "r",
            ProcessKind::Comb,
            Stmt::assign(Expr::var(&go), Expr::one()),
        ));
        let modules = vec![top];
        let cg = CallGraph::new(&modules).unwrap();
        let st = Suspendability::compute(&modules, &cg);
        let key = |n: &str| UnitKey::process("top".into(), n.into());
        assert!(st.is_suspendable(key("p")) && st.is_dynamic(key("p")));
        assert!(st.is_suspendable(key("q")) && !st.is_dynamic(key("q")));
        assert!(!st.is_suspendable(key("r")) && !st.is_dynamic(key("r")));
    }

    #[test]
    fn override_families_share_status() {
        let mut base = Module::new("Base", ModuleKind::Class { extends: None });
        let mut run = Task::new("run", TaskKind::Task, Stmt::empty());
        run.is_virtual = true;
        base.add_task(run);
        let mut derived = Module::new(
            "Derived",
            ModuleKind::Class {
                extends: Some("Base".into()),
            },
        );
        derived.add_task(Task::new(
            "run",
            TaskKind::Task,
            Stmt::delay(Expr::constant(1, 32)),
        ));
        let modules = vec![base, derived];
        let cg = CallGraph::new(&modules).unwrap();
        let st = Suspendability::compute(&modules, &cg);
        assert!(st.is_suspendable(UnitKey::task(
            ir::Id::new("Base"),
            ir::Id::new("run")
        )));
    }

    #[test]
    fn join_none_does_not_block() {
        let body = Stmt::fork(
            vec![Stmt::delay(Expr::constant(1, 32))],
            JoinType::None,
        );
        assert_eq!(Suspendability::seed(&body), (false, false));
        let body = Stmt::fork(vec![Stmt::empty()], JoinType::Any);
        assert_eq!(Suspendability::seed(&body), (true, true));
    }
}
