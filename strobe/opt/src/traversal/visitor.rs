//! Walks the statement trees of every task and process in a program. Most
//! lowering passes are a [Visitor] that overrides a handful of hooks.
use super::action::{Action, VisResult};
use super::{CompTraversal, ConstructVisitor, Named, Order};
use strobe_ir::{self as ir, Context, Module, Stmt};
use strobe_utils::StrobeResult;

/// Hooks called while walking a module. `start_*` runs before the children
/// of a node are walked and `finish_*` after them; the default of each hook
/// does nothing.
///
/// Tasks are walked before processes. Units added while a module is being
/// walked are left alone.
pub trait Visitor {
    /// Reason to skip the pass for this program, if any.
    fn precondition(_ctx: &ir::Context) -> Option<String>
    where
        Self: Sized,
    {
        None
    }

    /// Order in which modules are walked.
    fn iteration_order() -> Order
    where
        Self: Sized,
    {
        Order::No
    }

    /// Walk one module: [Visitor::start], the body of every task and
    /// process, then [Visitor::finish].
    fn traverse_module(
        &mut self,
        module: &mut Module,
        modules: &[Module],
    ) -> StrobeResult<()>
    where
        Self: Sized,
    {
        self.start(module, modules)?
            .and_then(|| {
                for task in module.tasks.snapshot() {
                    let mut task = task.borrow_mut();
                    let act = self
                        .start_task(&mut task, module, modules)?
                        .and_then(|| {
                            task.body.visit(self, module, modules)
                        })?
                        .pop()
                        .and_then(|| {
                            self.finish_task(&mut task, module, modules)
                        })?;
                    if matches!(act, Action::Stop) {
                        return Ok(Action::Stop);
                    }
                }
                for proc in module.processes.snapshot() {
                    let mut proc = proc.borrow_mut();
                    let act = self
                        .start_process(&mut proc, module, modules)?
                        .and_then(|| {
                            proc.body.visit(self, module, modules)
                        })?
                        .pop()
                        .and_then(|| {
                            self.finish_process(&mut proc, module, modules)
                        })?;
                    if matches!(act, Action::Stop) {
                        return Ok(Action::Stop);
                    }
                }
                Ok(Action::Continue)
            })?
            .and_then(|| self.finish(module, modules))?;
        Ok(())
    }

    /// Walk every module of `context` between [Visitor::start_context] and
    /// [Visitor::finish_context]. Per-module state is reset with
    /// [ConstructVisitor::clear_data] after each module.
    fn do_pass(&mut self, context: &mut Context) -> StrobeResult<()>
    where
        Self: Sized + ConstructVisitor + Named,
    {
        if let Some(msg) = Self::precondition(&*context) {
            log::info!("Skipping `{}': {msg}", Self::name());
            return Ok(());
        }

        self.start_context(context)?;
        let modules = std::mem::take(&mut context.modules);

        let mut po = CompTraversal::new(modules, Self::iteration_order())?;
        let res = po.apply_update(|module, modules| {
            self.traverse_module(module, modules)?;
            self.clear_data();
            Ok(())
        });
        context.modules = po.take();
        res?;

        self.finish_context(context)
    }

    /// Construct the pass from `context` and run it.
    fn do_pass_default(context: &mut Context) -> StrobeResult<Self>
    where
        Self: ConstructVisitor + Sized + Named,
    {
        let mut visitor = Self::from(&*context)?;
        visitor.do_pass(context)?;
        Ok(visitor)
    }

    /// Executed once before any module is visited.
    fn start_context(&mut self, _ctx: &mut Context) -> StrobeResult<()> {
        Ok(())
    }

    /// Executed once after every module was visited.
    fn finish_context(&mut self, _ctx: &mut Context) -> StrobeResult<()> {
        Ok(())
    }

    /// Executed before the traversal begins.
    fn start(&mut self, _module: &mut Module, _modules: &[Module]) -> VisResult {
        Ok(Action::Continue)
    }

    /// Executed after the traversal ends.
    fn finish(&mut self, _module: &mut Module, _modules: &[Module]) -> VisResult {
        Ok(Action::Continue)
    }

    /// Executed before visiting the body of a task.
    fn start_task(
        &mut self,
        _task: &mut ir::Task,
        _module: &mut Module,
        _modules: &[Module],
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// Executed after visiting the body of a task.
    fn finish_task(
        &mut self,
        _task: &mut ir::Task,
        _module: &mut Module,
        _modules: &[Module],
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// Executed before visiting the body of a process.
    fn start_process(
        &mut self,
        _proc: &mut ir::Process,
        _module: &mut Module,
        _modules: &[Module],
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// Executed after visiting the body of a process.
    fn finish_process(
        &mut self,
        _proc: &mut ir::Process,
        _module: &mut Module,
        _modules: &[Module],
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// Before the children of each [ir::Seq].
    fn start_seq(
        &mut self,
        _s: &mut ir::Seq,
        _module: &mut Module,
        _modules: &[Module],
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// After the children of each [ir::Seq].
    fn finish_seq(
        &mut self,
        _s: &mut ir::Seq,
        _module: &mut Module,
        _modules: &[Module],
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// Before the children of each [ir::If].
    fn start_if(
        &mut self,
        _s: &mut ir::If,
        _module: &mut Module,
        _modules: &[Module],
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// After the children of each [ir::If].
    fn finish_if(
        &mut self,
        _s: &mut ir::If,
        _module: &mut Module,
        _modules: &[Module],
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// Before the children of each [ir::While].
    fn start_while(
        &mut self,
        _s: &mut ir::While,
        _module: &mut Module,
        _modules: &[Module],
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// After the children of each [ir::While].
    fn finish_while(
        &mut self,
        _s: &mut ir::While,
        _module: &mut Module,
        _modules: &[Module],
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// Before the children of each [ir::Timing].
    fn start_timing(
        &mut self,
        _s: &mut ir::Timing,
        _module: &mut Module,
        _modules: &[Module],
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// After the children of each [ir::Timing].
    fn finish_timing(
        &mut self,
        _s: &mut ir::Timing,
        _module: &mut Module,
        _modules: &[Module],
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// Before the children of each [ir::Wait].
    fn start_wait(
        &mut self,
        _s: &mut ir::Wait,
        _module: &mut Module,
        _modules: &[Module],
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// After the children of each [ir::Wait].
    fn finish_wait(
        &mut self,
        _s: &mut ir::Wait,
        _module: &mut Module,
        _modules: &[Module],
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// Before the children of each [ir::Fork].
    fn start_fork(
        &mut self,
        _s: &mut ir::Fork,
        _module: &mut Module,
        _modules: &[Module],
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// After the children of each [ir::Fork].
    fn finish_fork(
        &mut self,
        _s: &mut ir::Fork,
        _module: &mut Module,
        _modules: &[Module],
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// At each [ir::Assign].
    fn assign(
        &mut self,
        _s: &mut ir::Assign,
        _module: &mut Module,
        _modules: &[Module],
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// At each [ir::Delay].
    fn delay(
        &mut self,
        _s: &mut ir::Delay,
        _module: &mut Module,
        _modules: &[Module],
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// At each [ir::Call].
    fn call(
        &mut self,
        _s: &mut ir::Call,
        _module: &mut Module,
        _modules: &[Module],
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// At each [ir::Fire].
    fn fire(
        &mut self,
        _s: &mut ir::Fire,
        _module: &mut Module,
        _modules: &[Module],
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// At each [ir::Force].
    fn force(
        &mut self,
        _s: &mut ir::Force,
        _module: &mut Module,
        _modules: &[Module],
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// At each [ir::Release].
    fn release(
        &mut self,
        _s: &mut ir::Release,
        _module: &mut Module,
        _modules: &[Module],
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// At each [ir::Sync].
    fn sync(
        &mut self,
        _s: &mut ir::Sync,
        _module: &mut Module,
        _modules: &[Module],
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// At each [ir::Finish].
    fn finish_stmt(
        &mut self,
        _s: &mut ir::Finish,
        _module: &mut Module,
        _modules: &[Module],
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// At each [ir::Empty].
    fn empty(
        &mut self,
        _s: &mut ir::Empty,
        _module: &mut Module,
        _modules: &[Module],
    ) -> VisResult {
        Ok(Action::Continue)
    }
}

/// Statement trees a [Visitor] can walk.
///
/// It calls `Visitor::start_*` on the way down, and `Visitor::finish_*` on
/// the way up.
pub trait Visitable {
    /// Perform the traversal.
    fn visit(
        &mut self,
        visitor: &mut dyn Visitor,
        module: &mut Module,
        modules: &[Module],
    ) -> VisResult;
}

impl Visitable for Stmt {
    fn visit(
        &mut self,
        visitor: &mut dyn Visitor,
        module: &mut Module,
        modules: &[Module],
    ) -> VisResult {
        let res = match self {
            Stmt::Seq(s) => visitor
                .start_seq(s, module, modules)?
                .and_then(|| s.stmts.visit(visitor, module, modules))?
                .pop()
                .and_then(|| visitor.finish_seq(s, module, modules))?,
            Stmt::If(s) => visitor
                .start_if(s, module, modules)?
                .and_then(|| s.tbranch.visit(visitor, module, modules))?
                .and_then(|| s.fbranch.visit(visitor, module, modules))?
                .pop()
                .and_then(|| visitor.finish_if(s, module, modules))?,
            Stmt::While(s) => visitor
                .start_while(s, module, modules)?
                .and_then(|| s.body.visit(visitor, module, modules))?
                .pop()
                .and_then(|| visitor.finish_while(s, module, modules))?,
            Stmt::Timing(s) => visitor
                .start_timing(s, module, modules)?
                .and_then(|| s.body.visit(visitor, module, modules))?
                .pop()
                .and_then(|| visitor.finish_timing(s, module, modules))?,
            Stmt::Wait(s) => visitor
                .start_wait(s, module, modules)?
                .and_then(|| s.body.visit(visitor, module, modules))?
                .pop()
                .and_then(|| visitor.finish_wait(s, module, modules))?,
            Stmt::Fork(s) => visitor
                .start_fork(s, module, modules)?
                .and_then(|| s.branches.visit(visitor, module, modules))?
                .pop()
                .and_then(|| visitor.finish_fork(s, module, modules))?,
            Stmt::Assign(s) => visitor.assign(s, module, modules)?,
            Stmt::Delay(s) => visitor.delay(s, module, modules)?,
            Stmt::Call(s) => visitor.call(s, module, modules)?,
            Stmt::Fire(s) => visitor.fire(s, module, modules)?,
            Stmt::Force(s) => visitor.force(s, module, modules)?,
            Stmt::Release(s) => visitor.release(s, module, modules)?,
            Stmt::Sync(s) => visitor.sync(s, module, modules)?,
            Stmt::Finish(s) => visitor.finish_stmt(s, module, modules)?,
            Stmt::Empty(s) => visitor.empty(s, module, modules)?,
        };
        Ok(res.apply_change(self))
    }
}

/// Walks the elements in order until one asks to stop.
impl<V: Visitable> Visitable for Vec<V> {
    fn visit(
        &mut self,
        visitor: &mut dyn Visitor,
        module: &mut Module,
        modules: &[Module],
    ) -> VisResult {
        for t in self {
            let res = t.visit(visitor, module, modules)?;
            match res {
                Action::Continue | Action::SkipChildren | Action::Change(_) => {
                    continue;
                }
                Action::Stop => return Ok(Action::Stop),
            };
        }
        Ok(Action::Continue)
    }
}
