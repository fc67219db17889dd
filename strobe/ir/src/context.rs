//! An IR context. This is the top-level object for an IR and contains all
//! the modules, interfaces, and classes of a program.
use super::{Id, Module, Task, Variable, RRC};
use std::collections::HashSet;

/// The IR context that represents an entire program.
#[derive(Debug, Default)]
pub struct Context {
    /// Modules, interfaces, and classes.
    pub modules: Vec<Module>,
    /// Name of the top-level design module.
    pub entrypoint: Id,
    /// Extra options provided to the command line.
    /// Interpreted by individual passes
    pub extra_opts: Vec<String>,
}

impl Context {
    pub fn new<S: Into<Id>>(modules: Vec<Module>, entrypoint: S) -> Self {
        Self {
            modules,
            entrypoint: entrypoint.into(),
            extra_opts: vec![],
        }
    }

    /// Return the entrypoint module.
    pub fn entrypoint(&self) -> Option<&Module> {
        find_module(&self.modules, self.entrypoint)
    }

    /// Return the entrypoint module with mutable access.
    pub fn entrypoint_mut(&mut self) -> Option<&mut Module> {
        let name = self.entrypoint;
        self.modules.iter_mut().find(|m| m.name == name)
    }

    pub fn find_module<S: Into<Id>>(&self, name: S) -> Option<&Module> {
        find_module(&self.modules, name.into())
    }
}

pub fn find_module(modules: &[Module], name: Id) -> Option<&Module> {
    modules.iter().find(|m| m.name == name)
}

/// `class` followed by its base classes, nearest first. Stops at the first
/// name that is not defined in `modules`.
pub fn class_chain(modules: &[Module], class: Id) -> Vec<Id> {
    let mut out = vec![];
    let mut cur = Some(class);
    while let Some(name) = cur {
        if out.contains(&name) {
            break;
        }
        let Some(m) = find_module(modules, name) else {
            break;
        };
        out.push(name);
        cur = m.extends();
    }
    out
}

/// Every class that derives from `class`, directly or transitively.
pub fn subclasses(modules: &[Module], class: Id) -> Vec<Id> {
    let mut found: Vec<Id> = vec![];
    let mut seen: HashSet<Id> = HashSet::from([class]);
    let mut changed = true;
    while changed {
        changed = false;
        for m in modules {
            if let Some(base) = m.extends() {
                if seen.contains(&base) && seen.insert(m.name) {
                    found.push(m.name);
                    changed = true;
                }
            }
        }
    }
    found
}

/// Member `field` of `class`, looking through base classes.
pub fn find_field(
    modules: &[Module],
    class: Id,
    field: Id,
) -> Option<RRC<Variable>> {
    class_chain(modules, class).into_iter().find_map(|c| {
        find_module(modules, c)
            .and_then(|m| m.find_var(field))
            .filter(|v| !v.borrow().is_local())
    })
}

/// Implementation of method `name` used for an object of class `class`,
/// together with the class that defines it.
pub fn resolve_method(
    modules: &[Module],
    class: Id,
    name: Id,
) -> Option<(Id, RRC<Task>)> {
    class_chain(modules, class).into_iter().find_map(|c| {
        find_module(modules, c)
            .and_then(|m| m.find_task(name))
            .map(|t| (c, t))
    })
}

/// Members of `class` including inherited ones, base class members first.
pub fn all_fields(modules: &[Module], class: Id) -> Vec<RRC<Variable>> {
    let mut chain = class_chain(modules, class);
    chain.reverse();
    chain
        .into_iter()
        .filter_map(|c| find_module(modules, c))
        .flat_map(|m| {
            m.vars
                .iter()
                .filter(|v| !v.borrow().is_local())
                .cloned()
                .collect::<Vec<_>>()
        })
        .collect()
}
