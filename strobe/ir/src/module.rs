use super::{
    Alias, Attributes, Constraint, GetAttributes, Id, Process, Schedule,
    Task, Variable, RRC,
};
use linked_hash_map::LinkedHashMap;
use std::rc::Rc;
use strobe_utils::{GetName, NameGenerator};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleKind {
    /// A design module with ports.
    Design,
    /// An interface. Instances live in the object heap and are reached
    /// through interface or virtual interface handles.
    Interface,
    /// A class, possibly derived from `extends`.
    Class { extends: Option<Id> },
}

/// In memory representation of a module, interface, or class.
#[derive(Debug)]
pub struct Module {
    /// Name of the module.
    pub name: Id,
    pub kind: ModuleKind,
    /// All variables: ports, module variables, class members, and task
    /// locals. Names are unique within the module.
    pub vars: IdList<Variable>,
    /// Processes of the module.
    pub processes: IdList<Process>,
    /// Tasks and functions; methods when the module is a class.
    pub tasks: IdList<Task>,
    /// Constraint blocks of a class.
    pub constraints: Vec<Constraint>,
    /// Net aliases.
    pub aliases: Vec<Alias>,
    /// Region schedule, once computed.
    pub schedule: Option<Schedule>,
    pub attributes: Attributes,

    ///// Internal structures
    /// Names currently defined in this module.
    namegen: NameGenerator,
}

/// Builder methods for extracting and construction IR nodes.
/// The naming scheme for methods is consistent:
/// - find_<construct>: Returns a reference to the construct with the given
///   name.
impl Module {
    pub fn new<S: Into<Id>>(name: S, kind: ModuleKind) -> Self {
        Module {
            name: name.into(),
            kind,
            vars: IdList::default(),
            processes: IdList::default(),
            tasks: IdList::default(),
            constraints: vec![],
            aliases: vec![],
            schedule: None,
            attributes: Attributes::default(),
            namegen: NameGenerator::default(),
        }
    }

    /// Register names defined outside of the builder so generated names
    /// never collide with them.
    pub fn add_names(&mut self, names: impl IntoIterator<Item = Id>) {
        self.namegen.add_names(names)
    }

    /// Add a variable and reserve its name.
    pub fn add_var(&mut self, var: Variable) -> RRC<Variable> {
        let var = super::rrc(var);
        self.add_names([var.borrow().name]);
        self.vars.add(Rc::clone(&var));
        var
    }

    pub fn add_process(&mut self, process: Process) -> RRC<Process> {
        let proc = super::rrc(process);
        self.add_names([proc.borrow().name]);
        self.processes.add(Rc::clone(&proc));
        proc
    }

    pub fn add_task(&mut self, task: Task) -> RRC<Task> {
        let task = super::rrc(task);
        self.add_names([task.borrow().name]);
        self.tasks.add(Rc::clone(&task));
        task
    }

    pub fn find_var<S: Into<Id>>(&self, name: S) -> Option<RRC<Variable>> {
        self.vars.find(name)
    }

    pub fn find_task<S: Into<Id>>(&self, name: S) -> Option<RRC<Task>> {
        self.tasks.find(name)
    }

    pub fn find_process<S: Into<Id>>(&self, name: S) -> Option<RRC<Process>> {
        self.processes.find(name)
    }

    /// Generate a name unique within this module, starting with `prefix`.
    pub fn generate_name<S: Into<Id>>(&mut self, prefix: S) -> Id {
        self.namegen.gen_name(prefix)
    }

    /// Generate `{prefix}{n}{suffix}` for the next unused `n`.
    pub fn generate_numbered<S: AsRef<str>>(
        &mut self,
        prefix: &str,
        suffix: S,
    ) -> Id {
        self.namegen.gen_numbered(prefix, suffix)
    }

    pub fn is_class(&self) -> bool {
        matches!(self.kind, ModuleKind::Class { .. })
    }

    /// Direct base class.
    pub fn extends(&self) -> Option<Id> {
        match self.kind {
            ModuleKind::Class { extends } => extends,
            _ => None,
        }
    }

    /// Iterator over the ports of the module.
    pub fn ports(&self) -> impl Iterator<Item = &RRC<Variable>> {
        self.vars.iter().filter(|v| v.borrow().is_port())
    }
}

impl GetName for Module {
    fn name(&self) -> Id {
        self.name
    }
}

impl GetAttributes for Module {
    fn get_attributes(&self) -> &Attributes {
        &self.attributes
    }
    fn get_mut_attributes(&mut self) -> &mut Attributes {
        &mut self.attributes
    }
}

/// A wrapper struct exposing an ordered collection of named entities within an
/// RRC with deterministic iteration and constant-time look-up on names
/// directly. The children of a module are stored in it.
#[derive(Debug)]
pub struct IdList<T: GetName>(LinkedHashMap<Id, RRC<T>>);

impl<'a, T: GetName> IntoIterator for &'a IdList<T> {
    type Item = &'a RRC<T>;

    type IntoIter = linked_hash_map::Values<'a, Id, RRC<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.values()
    }
}

impl<T, F> From<F> for IdList<T>
where
    T: GetName,
    F: IntoIterator<Item = RRC<T>>,
{
    fn from(list: F) -> Self {
        IdList(
            list.into_iter()
                .map(|item| {
                    let name = item.borrow().name();
                    (name, item)
                })
                .collect(),
        )
    }
}

impl<T: GetName> IdList<T> {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Keep the elements that satisfy `f`. Returns the number removed.
    pub fn retain<F>(&mut self, mut f: F) -> u64
    where
        F: FnMut(&RRC<T>) -> bool,
    {
        let mut removed = 0;
        for entry in self.0.entries() {
            if !f(entry.get()) {
                entry.remove();
                removed += 1;
            }
        }
        removed
    }

    pub fn add(&mut self, item: RRC<T>) {
        let name = item.borrow().name();
        self.0.insert(name, item);
    }

    pub fn remove<S: Into<Id>>(&mut self, name: S) -> Option<RRC<T>> {
        self.0.remove(&name.into())
    }

    pub fn iter(&self) -> impl Clone + Iterator<Item = &RRC<T>> {
        self.0.values()
    }

    /// Snapshot of the current elements. Lets callers add elements while
    /// walking the old ones.
    pub fn snapshot(&self) -> Vec<RRC<T>> {
        self.0.values().cloned().collect()
    }

    pub fn find<S: Into<Id>>(&self, name: S) -> Option<RRC<T>> {
        self.0.get(&name.into()).map(Rc::clone)
    }
}

impl<T: GetName> Default for IdList<T> {
    fn default() -> Self {
        IdList(LinkedHashMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_names_avoid_existing() {
        let mut m = Module::new("top", ModuleKind::Design);
        m.add_var(Variable::logic("tmp", 1));
        let n = m.generate_name("tmp");
        assert_ne!(n, "tmp");
        assert!(m.find_var("tmp").is_some());
    }

    #[test]
    fn retain_counts_removed() {
        let mut m = Module::new("top", ModuleKind::Design);
        for n in ["a", "b", "c"] {
            m.add_var(Variable::logic(n, 1));
        }
        assert_eq!(m.vars.retain(|v| v.borrow().name != "b"), 1);
        assert_eq!(m.vars.len(), 2);
    }
}
