//! Representation for variables and sensitivity in a strobe program.

use super::{Attributes, BoolAttr, Expr, GetAttributes, Id};
use strobe_utils::{GPosIdx, GetName, WithPos};
use smallvec::SmallVec;

/// Direction of a port or a task argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    /// Not a port.
    #[default]
    None,
    Input,
    Output,
    Inout,
}

/// Where a variable lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    /// Static storage owned by the module.
    Module,
    /// Automatic storage of the named task, created per call.
    Local(Id),
}

/// Type of a variable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VarType {
    /// Packed bit vector.
    Logic { width: u64 },
    /// Named event.
    Event,
    /// Dynamic string.
    String,
    /// Unpacked array of `len` elements each `width` bits wide.
    Unpacked { width: u64, len: u64 },
    /// Enumeration with the given legal values.
    Enum { width: u64, values: Vec<u64> },
    /// Handle to an instance of a class.
    Class(Id),
    /// Interface instance.
    Iface(Id),
    /// Virtual interface handle.
    VirtIface(Id),
    /// Counting semaphore.
    Semaphore,
    /// Process handle.
    Process,
}

/// Width used for handle values.
pub const HANDLE_WIDTH: u64 = 64;

impl VarType {
    /// Bit width of values of this type.
    pub fn width(&self) -> u64 {
        match self {
            VarType::Logic { width }
            | VarType::Enum { width, .. }
            | VarType::Unpacked { width, .. } => *width,
            VarType::Event => 1,
            VarType::String => 0,
            VarType::Class(_)
            | VarType::Iface(_)
            | VarType::VirtIface(_)
            | VarType::Semaphore
            | VarType::Process => HANDLE_WIDTH,
        }
    }

    /// The type is a handle that points into the object heap.
    pub fn is_handle(&self) -> bool {
        matches!(
            self,
            VarType::Class(_)
                | VarType::Iface(_)
                | VarType::VirtIface(_)
                | VarType::Semaphore
                | VarType::Process
        )
    }

    /// Name of the class or interface the handle refers to.
    pub fn class_name(&self) -> Option<Id> {
        match self {
            VarType::Class(c) | VarType::Iface(c) | VarType::VirtIface(c) => {
                Some(*c)
            }
            _ => None,
        }
    }
}

/// Type of edge a sensitivity item reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Edge {
    /// Rising edge.
    Pos,
    /// Falling edge.
    Neg,
    /// Either a rising or a falling edge.
    Both,
    /// Any change of value.
    Any,
}

impl Edge {
    pub fn keyword(&self) -> &'static str {
        match self {
            Edge::Pos => "posedge",
            Edge::Neg => "negedge",
            Edge::Both => "edge",
            Edge::Any => "anyedge",
        }
    }
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

/// One entry of a sensitivity list.
#[derive(Clone, Debug)]
pub struct SenItem {
    pub edge: Edge,
    pub expr: Expr,
}

impl SenItem {
    pub fn new(edge: Edge, expr: Expr) -> Self {
        Self { edge, expr }
    }
}

/// A sensitivity list; the process wakes when any item fires.
pub type SenTree = Vec<SenItem>;

/// A variable, port, task argument, or class member.
#[derive(Debug, Clone)]
pub struct Variable {
    /// Name of the variable. Unique within its module.
    pub name: Id,
    /// Type of the variable.
    pub typ: VarType,
    /// Port or argument direction.
    pub direction: Direction,
    /// Storage scope.
    pub scope: Scope,
    /// Initial value.
    pub init: Option<u64>,
    /// Some suspendable unit writes this variable.
    pub written_by_suspendable: bool,
    /// Some dynamically scheduled unit writes this variable.
    pub written_by_dynamic: bool,
    /// Edge events materialized for this variable.
    pub edge_events: SmallVec<[(Edge, Id); 3]>,
    /// Attributes attached to this variable.
    pub attributes: Attributes,
    pub pos: GPosIdx,
}

impl Variable {
    pub fn new<S: Into<Id>>(name: S, typ: VarType) -> Self {
        Self {
            name: name.into(),
            typ,
            direction: Direction::None,
            scope: Scope::Module,
            init: None,
            written_by_suspendable: false,
            written_by_dynamic: false,
            edge_events: SmallVec::new(),
            attributes: Attributes::default(),
            pos: GPosIdx::UNKNOWN,
        }
    }

    /// Construct a packed variable with the given width.
    pub fn logic<S: Into<Id>>(name: S, width: u64) -> Self {
        Self::new(name, VarType::Logic { width })
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_init(mut self, init: u64) -> Self {
        self.init = Some(init);
        self
    }

    pub fn with_attr(mut self, attr: BoolAttr) -> Self {
        self.attributes.insert(attr);
        self
    }

    pub fn width(&self) -> u64 {
        self.typ.width()
    }

    /// Port of its module. Arguments of tasks carry a direction too but
    /// are not ports.
    pub fn is_port(&self) -> bool {
        self.direction != Direction::None && !self.is_local()
    }

    pub fn is_local(&self) -> bool {
        matches!(self.scope, Scope::Local(_))
    }

    /// The edge event for `edge`, if one has been created.
    pub fn edge_event(&self, edge: Edge) -> Option<Id> {
        self.edge_events
            .iter()
            .find_map(|(e, id)| if *e == edge { Some(*id) } else { None })
    }

    /// The variable has been given edge events.
    pub fn has_edge_events(&self) -> bool {
        !self.edge_events.is_empty()
    }
}

impl GetName for Variable {
    fn name(&self) -> Id {
        self.name
    }
}

impl GetAttributes for Variable {
    fn get_attributes(&self) -> &Attributes {
        &self.attributes
    }
    fn get_mut_attributes(&mut self) -> &mut Attributes {
        &mut self.attributes
    }
}

impl WithPos for Variable {
    fn copy_span(&self) -> GPosIdx {
        self.pos
    }
}
