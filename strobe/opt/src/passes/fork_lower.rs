use crate::analysis::ReadWriteSet;
use crate::traversal::{
    Action, ConstructVisitor, Named, VisResult, Visitor,
};
use std::collections::HashMap;
use std::rc::Rc;
use strobe_ir::{
    self as ir, BinOp, BoolAttr, Builder, Direction, Edge, Expr, JoinType,
    Module, ModuleKind, Scope, SenItem, Stmt, TaskKind, VarType, Variable,
    RRC,
};
use strobe_utils::{Error, StrobeResult};

/// Name of the synthesized join handle class.
pub const JOIN_CLASS: &str = "__VforkJoin";

/// Lowers `fork ... join` statements into calls of synthesized tasks.
///
/// Every branch is moved into a task of its own whose arguments are the
/// local variables the branch uses, copied when the branch is spawned.
/// Forks that join are synchronized through an instance of the join handle
/// class, which holds a `wake` event and a `counter`:
/// ```text
/// fork A; B; join          j = new __VforkJoin;
///                          j.counter = 2;
///                    =>    fork __Vfork__0(..); __Vfork__1(..); join_none
///                          while (j.counter > 0) @(anyedge j.wake);
/// ```
/// Each task decrements the counter and fires `wake` when its branch
/// completes. `join_any` starts the counter at 1. Forks that do not join
/// only spawn the tasks.
pub struct ForkLower {
    /// Task or process whose body is being visited.
    unit: ir::Id,
    /// `wake` field of the join class.
    wake: RRC<Variable>,
    /// `counter` field of the join class.
    counter: RRC<Variable>,
    /// The join class has to be added to the context.
    add_class: bool,
    /// Number of forks lowered.
    lowered: u64,
}

impl Named for ForkLower {
    fn name() -> &'static str {
        "fork-lower"
    }

    fn description() -> &'static str {
        "Move fork branches into tasks and synchronize joins through a counter"
    }
}

impl ConstructVisitor for ForkLower {
    fn from(ctx: &ir::Context) -> StrobeResult<Self> {
        let (wake, counter) = match ctx.find_module(JOIN_CLASS) {
            Some(class) => {
                let field = |name: &str| {
                    class.find_var(name).ok_or_else(|| {
                        Error::malformed_structure(format!(
                            "Class `{JOIN_CLASS}` has no field `{name}`"
                        ))
                    })
                };
                (field("wake")?, field("counter")?)
            }
            None => (
                ir::rrc(Variable::new("wake", VarType::Event)),
                ir::rrc(Variable::logic("counter", 32)),
            ),
        };
        Ok(ForkLower {
            unit: ir::Id::default(),
            wake,
            counter,
            add_class: false,
            lowered: 0,
        })
    }

    fn clear_data(&mut self) {
        self.unit = ir::Id::default();
    }
}

impl ForkLower {
    fn counter_of(&self, handle: &RRC<Variable>) -> Expr {
        Expr::member(Expr::var(handle), &self.counter)
    }

    fn wake_of(&self, handle: &RRC<Variable>) -> Expr {
        Expr::member(Expr::var(handle), &self.wake)
    }

    /// `if (j.counter != 0) j.counter = j.counter - 1; -> j.wake;`
    fn completion(&self, handle: &RRC<Variable>) -> Stmt {
        let counter = self.counter_of(handle);
        Stmt::seq(vec![
            Stmt::if_(
                Expr::neq(counter.clone(), Expr::constant(0, 32)),
                Stmt::assign(
                    counter.clone(),
                    Expr::binary(BinOp::Sub, counter, Expr::constant(1, 32)),
                ),
                Stmt::empty(),
            ),
            Stmt::fire(self.wake_of(handle)),
        ])
    }

    /// Move `body` into a new task and return the statement that calls it.
    fn outline(&self, mut body: Stmt, module: &mut Module) -> Stmt {
        let task_name =
            module.generate_numbered("__Vfork__", format!("__{}", self.unit));

        let captured: Vec<RRC<Variable>> = ReadWriteSet::uses(&body)
            .into_iter()
            .filter(|v| v.borrow().scope == Scope::Local(self.unit))
            .collect();
        let written = ReadWriteSet::write_set(&body);
        for v in &captured {
            let v = v.borrow();
            if !v.attributes.has(BoolAttr::Generated)
                && written.iter().any(|w| w.borrow().name == v.name)
            {
                log::warn!(
                    "{}.{}: fork branch writes `{}`, which it captured by value; \
                     the write is not visible outside of the branch",
                    module.name,
                    self.unit,
                    v.name
                );
            }
        }

        let mut rename = HashMap::new();
        let mut args = Vec::with_capacity(captured.len());
        for v in &captured {
            let (name, typ) = {
                let v = v.borrow();
                (v.name, v.typ.clone())
            };
            let arg_name = module.generate_name(name);
            let arg = module.add_var(
                Variable::new(arg_name, typ)
                    .with_direction(Direction::Input)
                    .with_scope(Scope::Local(task_name))
                    .with_attr(BoolAttr::Generated),
            );
            rename.insert(name, Rc::clone(&arg));
            args.push(arg);
        }
        ir::Rewriter::new(rename).rewrite_stmt(&mut body);

        let task =
            Builder::new(module).add_task(task_name, TaskKind::Task, args, body);
        {
            let mut task = task.borrow_mut();
            task.attributes.insert(BoolAttr::Suspendable);
            task.attributes.insert(BoolAttr::Dynamic);
        }
        log::debug!(
            "{}.{}: fork branch outlined into `{task_name}` capturing {} locals",
            module.name,
            self.unit,
            captured.len()
        );
        Stmt::call(task_name, captured.iter().map(Expr::var).collect())
    }
}

impl Visitor for ForkLower {
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

    fn finish_fork(
        &mut self,
        s: &mut ir::Fork,
        module: &mut Module,
        _comps: &[Module],
    ) -> VisResult {
        if s.attributes.has(BoolAttr::Lowered) {
            return Ok(Action::Continue);
        }
        if s.branches.is_empty() {
            return Ok(Action::change(Stmt::empty()));
        }
        let count = match s.join {
            JoinType::All => Some(s.branches.len() as u64),
            JoinType::Any => Some(1),
            JoinType::None => None,
        };
        let handle = count.map(|_| {
            let name = module.generate_numbered("__Vfork", "__join");
            Builder::new(module).add_named_local(
                name,
                VarType::Class(JOIN_CLASS.into()),
                self.unit,
            )
        });

        let mut calls = Vec::with_capacity(s.branches.len());
        for branch in std::mem::take(&mut s.branches) {
            let body = match &handle {
                Some(j) => branch.then(self.completion(j)),
                None => branch,
            };
            calls.push(self.outline(body, module));
        }
        let mut attributes = s.attributes.clone();
        attributes.insert(BoolAttr::Lowered);
        let spawn = Stmt::Fork(ir::Fork {
            branches: calls,
            join: JoinType::None,
            attributes,
        });
        self.lowered += 1;

        let (Some(j), Some(count)) = (handle, count) else {
            return Ok(Action::change(spawn));
        };
        self.add_class = true;
        Ok(Action::change(Stmt::seq(vec![
            Stmt::assign(Expr::var(&j), Expr::New(JOIN_CLASS.into())),
            Stmt::assign(self.counter_of(&j), Expr::constant(count, 32)),
            spawn,
            Stmt::while_(
                Expr::binary(
                    BinOp::Gt,
                    self.counter_of(&j),
                    Expr::constant(0, 32),
                ),
                Stmt::timing(
                    vec![SenItem::new(Edge::Any, self.wake_of(&j))],
                    Stmt::empty(),
                ),
            ),
        ])))
    }

    fn finish_context(&mut self, ctx: &mut ir::Context) -> StrobeResult<()> {
        if self.add_class && ctx.find_module(JOIN_CLASS).is_none() {
            let mut class =
                Module::new(JOIN_CLASS, ModuleKind::Class { extends: None });
            for field in [&self.wake, &self.counter] {
                class.add_names([field.borrow().name]);
                class.vars.add(Rc::clone(field));
            }
            class.attributes.insert(BoolAttr::Generated);
            ctx.modules.push(class);
        }
        log::info!("{}: lowered {} forks", Self::name(), self.lowered);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir::{Process, ProcessKind};

    fn run(top: Module) -> ir::Context {
        let mut ctx = ir::Context::new(vec![top], "top");
        ForkLower::do_pass_default(&mut ctx).unwrap();
        ctx
    }

    fn body_of(ctx: &ir::Context, proc: &str) -> String {
        let p = ctx.entrypoint().unwrap().find_process(proc).unwrap();
        let text = ir::Printer::stmt_to_str(&p.borrow().body);
        text
    }

    #[test]
    fn join_all_counts_every_branch() {
        let mut top = Module::new("top", ModuleKind::Design);
        let a = top.add_var(Variable::logic("a", 1));
        let b = top.add_var(Variable::logic("b", 1));
        top.add_process(Process::new(
            "p",
            ProcessKind::Initial,
            Stmt::fork(
                vec![
                    Stmt::assign(Expr::var(&a), Expr::one()),
                    Stmt::seq(vec![
                        Stmt::delay(Expr::constant(2, 32)),
                        Stmt::assign(Expr::var(&b), Expr::one()),
                    ]),
                ],
                JoinType::All,
            ),
        ));
        let ctx = run(top);
        let text = body_of(&ctx, "p");
        assert!(text.contains("__Vfork0__join = new __VforkJoin;"));
        assert!(text.contains("__Vfork0__join.counter = 32'd2;"));
        assert!(text.contains("(* lowered *) fork"));
        assert!(text.contains("__Vfork__0__p(__Vfork0__join);"));
        assert!(text.contains("__Vfork__1__p(__Vfork0__join);"));
        assert!(text.contains("while ((__Vfork0__join.counter > 32'd0))"));
        assert!(text.contains("@(anyedge __Vfork0__join.wake)"));

        let top = ctx.entrypoint().unwrap();
        let task = top.find_task("__Vfork__1__p").unwrap();
        let task = task.borrow();
        assert!(task.is_suspendable() && task.is_dynamic());
        assert_eq!(task.args.len(), 1);
        let tbody = ir::Printer::stmt_to_str(&task.body);
        assert!(tbody.contains("-> "));
        assert!(tbody.contains(".counter - 32'd1"));
        assert!(ctx.find_module(JOIN_CLASS).is_some());
    }

    #[test]
    fn join_any_starts_at_one() {
        let mut top = Module::new("top", ModuleKind::Design);
        let a = top.add_var(Variable::logic("a", 1));
        top.add_process(Process::new(
            "p",
            ProcessKind::Initial,
            Stmt::fork(
                vec![
                    Stmt::assign(Expr::var(&a), Expr::one()),
                    Stmt::assign(Expr::var(&a), Expr::zero()),
                    Stmt::assign(Expr::var(&a), Expr::one()),
                ],
                JoinType::Any,
            ),
        ));
        let text = body_of(&run(top), "p");
        assert!(text.contains(".counter = 32'd1;"));
    }

    #[test]
    fn join_none_and_empty_forks() {
        let mut top = Module::new("top", ModuleKind::Design);
        let a = top.add_var(Variable::logic("a", 1));
        top.add_process(Process::new(
            "p",
            ProcessKind::Initial,
            Stmt::seq(vec![
                Stmt::fork(vec![], JoinType::All),
                Stmt::fork(
                    vec![Stmt::assign(Expr::var(&a), Expr::one())],
                    JoinType::None,
                ),
            ]),
        ));
        let ctx = run(top);
        let text = body_of(&ctx, "p");
        assert!(!text.contains("__join"));
        assert!(text.contains("__Vfork__0__p();"));
        assert!(ctx.find_module(JOIN_CLASS).is_none());
    }

    #[test]
    fn locals_are_captured_by_value() {
        let mut top = Module::new("top", ModuleKind::Design);
        let out = top.add_var(Variable::logic("out", 8));
        let x = top.add_var(
            Variable::logic("x", 8).with_scope(Scope::Local("p".into())),
        );
        top.add_process(Process::new(
            "p",
            ProcessKind::Initial,
            Stmt::fork(
                vec![Stmt::assign(Expr::var(&out), Expr::var(&x))],
                JoinType::None,
            ),
        ));
        let ctx = run(top);
        assert!(body_of(&ctx, "p").contains("__Vfork__0__p(x);"));
        let top = ctx.entrypoint().unwrap();
        let task = top.find_task("__Vfork__0__p").unwrap();
        let task = task.borrow();
        let arg = task.args[0].borrow();
        assert_eq!(arg.direction, Direction::Input);
        assert_eq!(arg.scope, Scope::Local(task.name));
        assert_eq!(
            ir::Printer::stmt_to_str(&task.body),
            format!("out = {};\n", arg.name)
        );
    }

    #[test]
    fn nested_forks_are_lowered_once() {
        let mut top = Module::new("top", ModuleKind::Design);
        let a = top.add_var(Variable::logic("a", 1));
        top.add_process(Process::new(
            "p",
            ProcessKind::Initial,
            Stmt::fork(
                vec![Stmt::fork(
                    vec![Stmt::assign(Expr::var(&a), Expr::one())],
                    JoinType::All,
                )],
                JoinType::All,
            ),
        ));
        let ctx = run(top);
        let top = ctx.entrypoint().unwrap();
        assert_eq!(top.tasks.len(), 2);
        let mut forks = 0;
        for t in top.tasks.iter() {
            t.borrow().body.walk(&mut |s| {
                if let Stmt::Fork(f) = s {
                    assert!(f.attributes.has(BoolAttr::Lowered));
                    forks += 1;
                }
            });
        }
        assert_eq!(forks, 1);
    }
}
