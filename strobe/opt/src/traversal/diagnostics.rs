use super::{Action, VisResult};
use strobe_utils::{Error, MultiError};

/// Passes that keep going after a malformed statement and report every
/// problem once the whole program has been visited.
pub trait DiagnosticPass {
    fn diagnostics(&self) -> &DiagnosticContext;
}

/// Errors gathered by a [DiagnosticPass].
#[derive(Default, Debug)]
pub struct DiagnosticContext {
    errors: Vec<Error>,
}

impl DiagnosticContext {
    pub fn err(&mut self, error: Error) {
        log::debug!("deferred: {error}");
        self.errors.push(error);
    }

    /// Record `error` and leave the current node as it is.
    pub fn early_return_err(&mut self, error: Error) -> VisResult {
        self.err(error);
        Ok(Action::Continue)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Errors reported so far, oldest first.
    pub fn errors_iter(&self) -> impl Iterator<Item = &Error> {
        self.errors.iter()
    }

    /// `Ok` when nothing was reported.
    pub fn check(&self) -> Result<(), MultiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(MultiError::from(self.errors.clone()))
        }
    }
}
