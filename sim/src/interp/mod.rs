//! Interpreter for lowered designs.
//!
//! [Program] collects everything the interpreter needs from an
//! [ir::Context]: the compiled bodies of tasks and processes, the layout
//! of every class and interface, and the variables of the top-level
//! module. [Machine] executes it.
mod code;
mod exec;
mod values;

pub use code::{Code, Instr};
pub use exec::Machine;
pub use values::{edge_fired, Heap, Location, Object, Slot, Store, NULL};

use crate::errors::{SimError, SimResult};
use ahash::{HashMap, HashMapExt};
use std::rc::Rc;
use strobe_ir::{
    self as ir, Direction, Edge, Id, ModuleKind, ProcessKind, Schedule, Scope,
    Stmt, VarType, Variable, RRC,
};

/// A formal argument.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: Id,
    pub direction: Direction,
    pub width: u64,
}

/// Something that can be activated: a task, function, method, or process
/// body.
#[derive(Debug)]
pub struct Routine {
    /// Module, interface, or class that defines the routine.
    pub module: Id,
    pub name: Id,
    pub params: Vec<Param>,
    /// Local that holds the return value of a function.
    pub ret: Option<Id>,
    /// Automatic variables with their initial values.
    locals: Vec<(Id, u64)>,
    pub code: Rc<Code>,
}

impl Routine {
    fn build(
        module: &ir::Module,
        name: Id,
        args: &[RRC<Variable>],
        ret: Option<&RRC<Variable>>,
        body: &Stmt,
    ) -> SimResult<Self> {
        let params = args
            .iter()
            .map(|a| {
                let a = a.borrow();
                Param {
                    name: a.name,
                    direction: a.direction,
                    width: a.width(),
                }
            })
            .collect();
        let locals = module
            .vars
            .iter()
            .filter(|v| v.borrow().scope == Scope::Local(name))
            .map(|v| {
                let v = v.borrow();
                (v.name, ir::mask(v.init.unwrap_or(0), v.width()))
            })
            .collect();
        Ok(Routine {
            module: module.name,
            name,
            params,
            ret: ret.map(|r| r.borrow().name),
            locals,
            code: Rc::new(Code::compile(name, body)?),
        })
    }

    /// Automatic variables of a new activation.
    pub fn fresh_locals(&self) -> HashMap<Id, u64> {
        let mut locals = HashMap::with_capacity(self.locals.len());
        locals.extend(self.locals.iter().copied());
        locals
    }
}

/// A member variable together with its initial value.
#[derive(Debug, Clone)]
pub struct FieldInit {
    pub name: Id,
    pub typ: VarType,
    pub init: u64,
    /// Edge events of the member and the events they fire.
    pub edge_events: Vec<(Edge, Id)>,
}

impl From<&RRC<Variable>> for FieldInit {
    fn from(v: &RRC<Variable>) -> Self {
        let v = v.borrow();
        FieldInit {
            name: v.name,
            typ: v.typ.clone(),
            init: v.init.unwrap_or(0),
            edge_events: v.edge_events.to_vec(),
        }
    }
}

/// A lowered design, ready to be executed.
#[derive(Debug)]
pub struct Program {
    pub top: Id,
    pub schedule: Schedule,
    /// Variables of the top-level module.
    pub globals: Vec<FieldInit>,
    /// Members of every class and interface, inherited ones included.
    layouts: HashMap<Id, Vec<FieldInit>>,
    /// Base class chains, nearest first.
    chains: HashMap<Id, Vec<Id>>,
    /// Tasks and methods keyed by their defining module.
    tasks: HashMap<(Id, Id), Rc<Routine>>,
    /// Processes of the top-level module.
    processes: HashMap<Id, Rc<Routine>>,
    /// `initial` processes in declaration order.
    pub initials: Vec<Id>,
    /// `final` processes in declaration order.
    pub finals: Vec<Id>,
}

impl Program {
    pub fn new(ctx: &ir::Context) -> SimResult<Self> {
        let top = ctx
            .entrypoint()
            .ok_or(SimError::UnknownClass(ctx.entrypoint))?;
        let schedule = top
            .schedule
            .clone()
            .ok_or(SimError::Unscheduled(top.name))?;

        let mut layouts = HashMap::new();
        let mut chains = HashMap::new();
        let mut tasks = HashMap::new();
        for m in &ctx.modules {
            match m.kind {
                ModuleKind::Class { .. } => {
                    let fields = ir::all_fields(&ctx.modules, m.name);
                    layouts.insert(m.name, fields.iter().map(FieldInit::from).collect());
                    chains.insert(m.name, ir::class_chain(&ctx.modules, m.name));
                }
                ModuleKind::Interface => {
                    let fields = m.vars.iter().filter(|v| !v.borrow().is_local());
                    layouts.insert(m.name, fields.map(FieldInit::from).collect());
                    chains.insert(m.name, vec![m.name]);
                }
                ModuleKind::Design => (),
            }
            for t in m.tasks.iter() {
                let t = t.borrow();
                let routine = Routine::build(m, t.name, &t.args, t.ret.as_ref(), &t.body)?;
                tasks.insert((m.name, t.name), Rc::new(routine));
            }
        }

        let mut processes = HashMap::new();
        let mut initials = vec![];
        let mut finals = vec![];
        for p in top.processes.iter() {
            let p = p.borrow();
            match p.kind {
                ProcessKind::Initial => initials.push(p.name),
                ProcessKind::Final => finals.push(p.name),
                _ => (),
            }
            let routine = Routine::build(top, p.name, &[], None, &p.body)?;
            processes.insert(p.name, Rc::new(routine));
        }

        let globals = top
            .vars
            .iter()
            .filter(|v| !v.borrow().is_local())
            .map(FieldInit::from)
            .collect();

        Ok(Program {
            top: top.name,
            schedule,
            globals,
            layouts,
            chains,
            tasks,
            processes,
            initials,
            finals,
        })
    }

    pub fn layout(&self, class: Id) -> Option<&[FieldInit]> {
        self.layouts.get(&class).map(Vec::as_slice)
    }

    /// Task or function `name` of `module`.
    pub fn task(&self, module: Id, name: Id) -> Option<Rc<Routine>> {
        self.tasks.get(&(module, name)).cloned()
    }

    /// Implementation of method `name` for an object of class `class`.
    pub fn method(&self, class: Id, name: Id) -> Option<Rc<Routine>> {
        self.chains
            .get(&class)?
            .iter()
            .find_map(|c| self.task(*c, name))
    }

    pub fn process(&self, name: Id) -> Option<Rc<Routine>> {
        self.processes.get(&name).cloned()
    }
}
