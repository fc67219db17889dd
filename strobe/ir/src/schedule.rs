//! Region schedule of a design module.
use super::{Edge, Id};

/// Variable of the top-level module set by writes through a virtual
/// interface handle. Reading it in the trigger computation clears it.
pub const VIRT_IFACE_TRIGGER_VAR: &str = "__VvirtIfaceTrigger";

/// Condition that sets one bit of a region's trigger vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Trigger {
    /// `edge` of the named variable.
    Edge { var: Id, edge: Edge },
    /// The named variable changed value.
    Changed(Id),
    /// A suspended process is ready to resume.
    DynamicResume,
    /// First iteration of the settle loop.
    FirstIteration,
    /// A member of a virtual interface was written.
    VirtIface,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Edge { var, edge } => write!(f, "@({edge} {var})"),
            Trigger::Changed(var) => write!(f, "@(changed {var})"),
            Trigger::DynamicResume => write!(f, "@(resume)"),
            Trigger::FirstIteration => write!(f, "@(first iteration)"),
            Trigger::VirtIface => write!(f, "@(virtual interface)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum RegionKind {
    /// Settle: runs once after initialization until combinational logic is
    /// stable.
    Stl,
    /// Input combinational: reacts to changed top-level inputs.
    Ico,
    /// Active: edge-triggered logic and resumption of suspended processes.
    Act,
    /// Nonblocking assignment commit.
    Nba,
}

impl std::fmt::Display for RegionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RegionKind::Stl => "stl",
            RegionKind::Ico => "ico",
            RegionKind::Act => "act",
            RegionKind::Nba => "nba",
        };
        write!(f, "{s}")
    }
}

/// Code that a region runs.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Block {
    /// Body of the named process of the module.
    Process(Id),
    /// Resume every suspended process whose wait condition fired.
    ResumeDynamic,
}

/// A block together with the trigger bits that enable it. The block runs
/// when any of its bits are set.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct ScheduledBlock {
    pub block: Block,
    pub gate: Vec<usize>,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Region {
    pub kind: RegionKind,
    pub triggers: Vec<Trigger>,
    pub blocks: Vec<ScheduledBlock>,
}

impl Region {
    pub fn new(kind: RegionKind) -> Self {
        Self {
            kind,
            triggers: vec![],
            blocks: vec![],
        }
    }

    /// Index of `trigger`, adding it if it is not present yet.
    pub fn add_trigger(&mut self, trigger: Trigger) -> usize {
        match self.trigger_index(&trigger) {
            Some(idx) => idx,
            None => {
                self.triggers.push(trigger);
                self.triggers.len() - 1
            }
        }
    }

    pub fn trigger_index(&self, trigger: &Trigger) -> Option<usize> {
        self.triggers.iter().position(|t| t == trigger)
    }

    /// Schedule `block` gated on `triggers`.
    pub fn add_block(&mut self, block: Block, triggers: &[Trigger]) {
        let mut gate: Vec<usize> =
            triggers.iter().map(|t| self.add_trigger(*t)).collect();
        gate.sort_unstable();
        gate.dedup();
        self.blocks.push(ScheduledBlock { block, gate });
    }
}

/// Schedule of the top-level design.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Schedule {
    pub stl: Region,
    pub ico: Region,
    pub act: Region,
    /// Gated on the bits of the `act` trigger vector.
    pub nba: Region,
    /// Maximum number of iterations of a region loop before the evaluation
    /// is abandoned.
    pub converge_limit: u32,
}

impl Schedule {
    pub fn new(converge_limit: u32) -> Self {
        Self {
            stl: Region::new(RegionKind::Stl),
            ico: Region::new(RegionKind::Ico),
            act: Region::new(RegionKind::Act),
            nba: Region::new(RegionKind::Nba),
            converge_limit,
        }
    }

    pub fn region(&self, kind: RegionKind) -> &Region {
        match kind {
            RegionKind::Stl => &self.stl,
            RegionKind::Ico => &self.ico,
            RegionKind::Act => &self.act,
            RegionKind::Nba => &self.nba,
        }
    }
}
