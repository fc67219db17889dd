use smallvec::SmallVec;

/// Boolean flags that can be attached to IR nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum BoolAttr {
    /// The unit can block: it contains or transitively calls a delay,
    /// timing control, or wait.
    Suspendable,
    /// The unit blocks on conditions that depend on runtime signal values.
    Dynamic,
    /// The node was synthesized by a pass.
    Generated,
    /// Variable is visible to the outside of the compiled design.
    Public,
    /// Variable is driven as a clock by the outside of the compiled design.
    Clocked,
    /// Variable can be forced from outside of the compiled design.
    Forceable,
    /// Class member randomized by `randomize()`.
    Rand,
    /// Process only bridges external writes of a signal into its edge events.
    EventBridge,
    /// Fork has already been lowered.
    Lowered,
    /// Process was rewritten from a static `always` into a wait loop.
    FromAlways,
}

impl std::fmt::Display for BoolAttr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BoolAttr::Suspendable => "suspendable",
            BoolAttr::Dynamic => "dynamic",
            BoolAttr::Generated => "generated",
            BoolAttr::Public => "public",
            BoolAttr::Clocked => "clocked",
            BoolAttr::Forceable => "forceable",
            BoolAttr::Rand => "rand",
            BoolAttr::EventBridge => "event_bridge",
            BoolAttr::Lowered => "lowered",
            BoolAttr::FromAlways => "from_always",
        };
        write!(f, "{name}")
    }
}

/// Set of flags attached to a node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Attributes {
    flags: SmallVec<[BoolAttr; 4]>,
}

impl Attributes {
    /// Set `attr`. Returns true if it was not set before.
    pub fn insert(&mut self, attr: BoolAttr) -> bool {
        if self.has(attr) {
            false
        } else {
            self.flags.push(attr);
            true
        }
    }

    pub fn has(&self, attr: BoolAttr) -> bool {
        self.flags.contains(&attr)
    }

    pub fn remove(&mut self, attr: BoolAttr) {
        self.flags.retain(|a| *a != attr);
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoolAttr> {
        self.flags.iter()
    }
}

impl<const N: usize> From<[BoolAttr; N]> for Attributes {
    fn from(attrs: [BoolAttr; N]) -> Self {
        let mut out = Attributes::default();
        for a in attrs {
            out.insert(a);
        }
        out
    }
}

/// Structs that can return an [`Attributes`] instance.
pub trait GetAttributes {
    fn get_attributes(&self) -> &Attributes;
    fn get_mut_attributes(&mut self) -> &mut Attributes;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_idempotent() {
        let mut attrs = Attributes::default();
        assert!(attrs.insert(BoolAttr::Suspendable));
        assert!(!attrs.insert(BoolAttr::Suspendable));
        assert!(attrs.has(BoolAttr::Suspendable));
        attrs.remove(BoolAttr::Suspendable);
        assert!(attrs.is_empty());
    }
}
