use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use std::collections::HashMap;
use strobe_ir::{self as ir, Callee, Expr, Module, Stmt};
use strobe_utils::{Error, StrobeResult};

/// Methods provided by the runtime. Calls to them are not edges of the call
/// graph until a pass defines them.
const BUILTIN_METHODS: &[&str] = &["randomize"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UnitKind {
    Process,
    Task,
}

/// Identifies a process or task of a module.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitKey {
    pub module: ir::Id,
    pub kind: UnitKind,
    pub name: ir::Id,
}

impl UnitKey {
    pub fn task(module: ir::Id, name: ir::Id) -> Self {
        Self {
            module,
            kind: UnitKind::Task,
            name,
        }
    }

    pub fn process(module: ir::Id, name: ir::Id) -> Self {
        Self {
            module,
            kind: UnitKind::Process,
            name,
        }
    }
}

impl std::fmt::Display for UnitKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.module, self.name)
    }
}

/// Statements executed by the thread of control of `stmt`. The branches of
/// forks run in threads of their own and are not included.
pub fn blocking_stmts<'a>(stmt: &'a Stmt, out: &mut Vec<&'a Stmt>) {
    out.push(stmt);
    if let Stmt::Fork(_) = stmt {
        return;
    }
    for c in stmt.children() {
        blocking_stmts(c, out);
    }
}

/// Static class of the object an expression evaluates to.
pub fn static_class(obj: &Expr) -> Option<ir::Id> {
    match obj {
        Expr::Var(vr) => vr.var.borrow().typ.class_name(),
        Expr::Member { field, .. } => field.var.borrow().typ.class_name(),
        Expr::New(class) => Some(*class),
        _ => None,
    }
}

/// Calls between the units of a program, together with the families of
/// virtual methods that override each other.
///
/// Calls made from inside fork branches are not recorded: the caller does
/// not wait for them.
pub struct CallGraph {
    /// Edge from caller to callee.
    graph: DiGraphMap<UnitKey, ()>,
    /// Virtual methods overriding each other.
    families: Vec<Vec<UnitKey>>,
    family_of: HashMap<UnitKey, usize>,
}

impl CallGraph {
    pub fn new(modules: &[Module]) -> StrobeResult<Self> {
        let mut graph = DiGraphMap::new();
        for m in modules {
            for t in m.tasks.iter() {
                graph.add_node(UnitKey::task(m.name, t.borrow().name));
            }
            for p in m.processes.iter() {
                graph.add_node(UnitKey::process(m.name, p.borrow().name));
            }
        }

        for m in modules {
            for t in m.tasks.iter() {
                let t = t.borrow();
                let caller = UnitKey::task(m.name, t.name);
                for callee in Self::callees_of(modules, m, &t.body)? {
                    graph.add_edge(caller, callee, ());
                }
            }
            for p in m.processes.iter() {
                let p = p.borrow();
                let caller = UnitKey::process(m.name, p.name);
                for callee in Self::callees_of(modules, m, &p.body)? {
                    graph.add_edge(caller, callee, ());
                }
            }
        }

        let (families, family_of) = Self::override_families(modules);
        Ok(Self {
            graph,
            families,
            family_of,
        })
    }

    fn callees_of(
        modules: &[Module],
        module: &Module,
        body: &Stmt,
    ) -> StrobeResult<Vec<UnitKey>> {
        let mut stmts = vec![];
        blocking_stmts(body, &mut stmts);
        let mut out = vec![];
        for s in stmts {
            if let Stmt::Call(call) = s {
                out.extend(Self::resolve(modules, module, &call.callee)?);
            }
        }
        Ok(out)
    }

    /// Units a call may execute. Calls of virtual methods may execute any
    /// override in a class derived from the static class of the receiver.
    pub fn resolve(
        modules: &[Module],
        module: &Module,
        callee: &Callee,
    ) -> StrobeResult<Vec<UnitKey>> {
        let (class, name) = match callee {
            Callee::Task(name) if !module.is_class() => {
                return match module.find_task(*name) {
                    Some(_) => Ok(vec![UnitKey::task(module.name, *name)]),
                    None => Err(Error::undefined(*name, "task")),
                };
            }
            Callee::Task(name) => (module.name, *name),
            Callee::Method { obj, name } => {
                let class = static_class(obj).ok_or_else(|| {
                    Error::malformed_structure(format!(
                        "Receiver of method call `{name}` is not a class handle"
                    ))
                })?;
                (class, *name)
            }
        };

        let Some((owner, task)) = ir::resolve_method(modules, class, name)
        else {
            if BUILTIN_METHODS.iter().any(|b| name == *b) {
                return Ok(vec![]);
            }
            return Err(Error::malformed_structure(format!(
                "Method `{name}` is not defined in `{class}` or its base classes"
            )));
        };

        let mut out = vec![UnitKey::task(owner, name)];
        if task.borrow().is_virtual {
            for sub in ir::subclasses(modules, class) {
                if let Some((o, _)) = ir::resolve_method(modules, sub, name) {
                    let key = UnitKey::task(o, name);
                    if !out.contains(&key) {
                        out.push(key);
                    }
                }
            }
        }
        Ok(out)
    }

    /// Group the methods of every class with the methods they override.
    /// A family is keyed by the topmost class defining the method.
    fn override_families(
        modules: &[Module],
    ) -> (Vec<Vec<UnitKey>>, HashMap<UnitKey, usize>) {
        let mut by_root: HashMap<(ir::Id, ir::Id), usize> = HashMap::new();
        let mut families: Vec<Vec<UnitKey>> = vec![];
        for m in modules.iter().filter(|m| m.is_class()) {
            for t in m.tasks.iter() {
                let name = t.borrow().name;
                let defs: Vec<(ir::Id, bool)> =
                    ir::class_chain(modules, m.name)
                        .into_iter()
                        .filter_map(|c| {
                            let t = ir::find_module(modules, c)?
                                .find_task(name)?;
                            let is_virtual = t.borrow().is_virtual;
                            Some((c, is_virtual))
                        })
                        .collect();
                if !defs.iter().any(|(_, v)| *v) {
                    continue;
                }
                let Some((root, _)) = defs.last() else {
                    continue;
                };
                let idx = *by_root.entry((*root, name)).or_insert_with(|| {
                    families.push(vec![]);
                    families.len() - 1
                });
                families[idx].push(UnitKey::task(m.name, name));
            }
        }

        let family_of = families
            .iter()
            .enumerate()
            .filter(|(_, f)| f.len() > 1)
            .flat_map(|(idx, f)| f.iter().map(move |k| (*k, idx)))
            .collect();
        (families, family_of)
    }

    /// Units that call `key`.
    pub fn callers(&self, key: UnitKey) -> impl Iterator<Item = UnitKey> + '_ {
        self.graph.neighbors_directed(key, Direction::Incoming)
    }

    /// Units called by `key`.
    pub fn callees(&self, key: UnitKey) -> impl Iterator<Item = UnitKey> + '_ {
        self.graph.neighbors_directed(key, Direction::Outgoing)
    }

    /// Methods that override or are overridden by `key`, including `key`
    /// itself. Empty when `key` is not part of an override family.
    pub fn family(&self, key: UnitKey) -> &[UnitKey] {
        match self.family_of.get(&key) {
            Some(idx) => &self.families[*idx],
            None => &[],
        }
    }

    /// Every unit of the program.
    pub fn units(&self) -> impl Iterator<Item = UnitKey> + '_ {
        self.graph.nodes()
    }
}
