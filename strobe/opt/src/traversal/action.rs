//! Actions control the traversal of statement trees.
use strobe_ir::Stmt;
use strobe_utils::StrobeResult;

/// Result of performing a visit.
pub type VisResult = StrobeResult<Action>;

/// What the walk does after a hook returns.
pub enum Action {
    /// Keep walking.
    Continue,
    /// Leave the rest of the module alone.
    Stop,
    /// Do not walk into the children of this node; siblings are still
    /// walked.
    SkipChildren,
    /// Put this statement in place of the current one. The replacement is
    /// not walked.
    Change(Box<Stmt>),
}

impl Action {
    /// Walk on with `next` only on [Action::Continue].
    pub(super) fn and_then<F>(self, mut next: F) -> VisResult
    where
        F: FnMut() -> VisResult,
    {
        match self {
            Action::Continue => next(),
            Action::Change(_) | Action::Stop | Action::SkipChildren => Ok(self),
        }
    }

    pub fn change(stmt: Stmt) -> Self {
        Action::Change(Box::new(stmt))
    }

    /// Perform a pending [Action::Change] on `stmt`.
    pub(super) fn apply_change(self, stmt: &mut Stmt) -> Action {
        match self {
            Action::Change(c) => {
                *stmt = *c;
                Action::Continue
            }
            action => action,
        }
    }

    /// Called once the children of a node are done: a skip only applies to
    /// one level.
    pub(super) fn pop(self) -> Self {
        match self {
            Action::SkipChildren => Action::Continue,
            x => x,
        }
    }
}
