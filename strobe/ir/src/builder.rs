//! IR Builder. Provides convience methods to add passes' synthesized
//! variables, processes, and tasks to a module.
use crate::{
    self as ir, BoolAttr, Module, Process, ProcessKind, Scope, Stmt, Task,
    TaskKind, VarType, Variable, RRC,
};

/// IR builder.
/// By default, assumes that the nodes are being added by a pass and marks
/// them with the `generated` attribute.
pub struct Builder<'a> {
    /// Module for which this builder is constructing.
    pub module: &'a mut Module,
    /// Nodes added are generated during a compiler pass.
    generated: bool,
}

impl<'a> Builder<'a> {
    pub fn new(module: &'a mut Module) -> Self {
        Self {
            module,
            generated: true,
        }
    }

    /// Disable the generated flag on the builder
    pub fn not_generated(mut self) -> Self {
        self.generated = false;
        self
    }

    fn mark(&self, attrs: &mut ir::Attributes) {
        if self.generated {
            attrs.insert(BoolAttr::Generated);
        }
    }

    /// Add a module variable whose name starts with `prefix`.
    pub fn add_var<S: Into<ir::Id>>(
        &mut self,
        prefix: S,
        typ: VarType,
    ) -> RRC<Variable> {
        let name = self.module.generate_name(prefix);
        self.add_named_var(name, typ)
    }

    /// Add a variable with exactly `name`. The caller is responsible for
    /// the name being fresh, usually by obtaining it from
    /// [Module::generate_numbered].
    pub fn add_named_var(&mut self, name: ir::Id, typ: VarType) -> RRC<Variable> {
        let mut var = Variable::new(name, typ);
        self.mark(&mut var.attributes);
        self.module.add_var(var)
    }

    /// Add an automatic variable of the task `unit`.
    pub fn add_local<S: Into<ir::Id>>(
        &mut self,
        prefix: S,
        typ: VarType,
        unit: ir::Id,
    ) -> RRC<Variable> {
        let name = self.module.generate_name(prefix);
        let mut var = Variable::new(name, typ).with_scope(Scope::Local(unit));
        self.mark(&mut var.attributes);
        self.module.add_var(var)
    }

    /// Add an automatic variable of `unit` named exactly `name`.
    pub fn add_named_local(
        &mut self,
        name: ir::Id,
        typ: VarType,
        unit: ir::Id,
    ) -> RRC<Variable> {
        let mut var = Variable::new(name, typ).with_scope(Scope::Local(unit));
        self.mark(&mut var.attributes);
        self.module.add_var(var)
    }

    /// Add a process whose name starts with `prefix`.
    pub fn add_process<S: Into<ir::Id>>(
        &mut self,
        prefix: S,
        kind: ProcessKind,
        body: Stmt,
    ) -> RRC<Process> {
        let name = self.module.generate_name(prefix);
        let mut proc = Process::new(name, kind, body);
        self.mark(&mut proc.attributes);
        self.module.add_process(proc)
    }

    /// Add a task named exactly `name` with the given arguments.
    pub fn add_task(
        &mut self,
        name: ir::Id,
        kind: TaskKind,
        args: Vec<RRC<Variable>>,
        body: Stmt,
    ) -> RRC<Task> {
        let mut task = Task::new(name, kind, body);
        task.args = args;
        self.mark(&mut task.attributes);
        self.module.add_task(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ModuleKind;

    #[test]
    fn generated_nodes_are_marked() {
        let mut m = Module::new("top", ModuleKind::Design);
        let mut b = Builder::new(&mut m);
        let v = b.add_var("tmp", VarType::Logic { width: 4 });
        assert!(v.borrow().attributes.has(BoolAttr::Generated));
        let mut b = Builder::new(&mut m).not_generated();
        let w = b.add_var("tmp", VarType::Logic { width: 4 });
        assert!(!w.borrow().attributes.has(BoolAttr::Generated));
        assert_ne!(v.borrow().name, w.borrow().name);
    }
}
