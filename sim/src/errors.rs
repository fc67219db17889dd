use strobe_ir::{Id, RegionKind};
use strobe_utils::{Error as CompileError, MultiError};
use thiserror::Error;

/// A type alias for a result with a [BoxedSimError] as the error type
pub type SimResult<T> = Result<T, BoxedSimError>;

/// A wrapper type for [SimError]. This exists to allow a smaller return
/// size for results since the error type is large.
pub struct BoxedSimError(Box<SimError>);

impl BoxedSimError {
    /// Consume the wrapper and return the inner error
    pub fn into_inner(self) -> SimError {
        *self.0
    }
}

impl std::fmt::Display for BoxedSimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&*self.0, f)
    }
}

impl std::fmt::Debug for BoxedSimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self, f)
    }
}

impl std::error::Error for BoxedSimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl std::ops::Deref for BoxedSimError {
    type Target = SimError;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> From<T> for BoxedSimError
where
    T: Into<SimError>,
{
    fn from(e: T) -> Self {
        Self(Box::new(T::into(e)))
    }
}

/// Errors raised while running a scheduled design.
#[derive(Error, Debug)]
pub enum SimError {
    /// A region loop kept finding set triggers.
    #[error(
        "{region} region did not converge after {iterations} iterations; set triggers: {}",
        .triggers.join(", ")
    )]
    ConvergenceLimit {
        region: RegionKind,
        iterations: u32,
        triggers: Vec<String>,
    },

    /// A statically scheduled block tried to wait.
    #[error("statically scheduled `{0}` attempted to suspend")]
    StaticSuspend(Id),

    #[error("no variable named `{0}`")]
    UnknownVariable(Id),

    #[error("no task or method named `{0}`")]
    UnknownTask(Id),

    #[error("no module, class, or interface named `{0}`")]
    UnknownClass(Id),

    #[error("call of `{task}` with {found} arguments, expected {expected}")]
    Arity {
        task: Id,
        expected: usize,
        found: usize,
    },

    /// Dereference of a null handle.
    #[error("null handle dereferenced in `{0}`")]
    NullHandle(String),

    /// A handle points at an object of the wrong kind.
    #[error("handle in `{0}` does not refer to a {1}")]
    BadHandle(String, &'static str),

    /// A coroutine ran too long without suspending.
    #[error("`{unit}` executed {limit} statements without suspending")]
    StepLimit { unit: Id, limit: u64 },

    /// A construct that the lowering passes should have removed.
    #[error("`{unit}` contains an unlowered {construct}")]
    Unlowered { unit: Id, construct: &'static str },

    #[error("`{0}` cannot be assigned")]
    InvalidLvalue(String),

    /// The design has no region schedule.
    #[error("module `{0}` has not been scheduled")]
    Unscheduled(Id),

    #[error(transparent)]
    Compile(Box<MultiError>),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<MultiError> for SimError {
    fn from(e: MultiError) -> Self {
        Self::Compile(Box::new(e))
    }
}

impl From<CompileError> for SimError {
    fn from(e: CompileError) -> Self {
        Self::Compile(Box::new(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convergence_message_lists_triggers() {
        let err: BoxedSimError = SimError::ConvergenceLimit {
            region: RegionKind::Stl,
            iterations: 100,
            triggers: vec!["@(changed a)".into(), "@(changed b)".into()],
        }
        .into();
        assert_eq!(
            err.to_string(),
            "stl region did not converge after 100 iterations; \
             set triggers: @(changed a), @(changed b)"
        );
        assert!(matches!(
            *err,
            SimError::ConvergenceLimit { iterations: 100, .. }
        ));
    }
}
