//! Errors generated by the compiler.
use crate::{GPosIdx, Id, WithPos};

/// Convenience wrapper to represent success or meaningul compiler error.
pub type StrobeResult<T> = std::result::Result<T, Error>;

/// Errors generated by the compiler
#[derive(Clone)]
pub struct Error {
    kind: Box<ErrorKind>,
    pos: GPosIdx,
    post_msg: Option<String>,
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.pos == GPosIdx::UNKNOWN {
            write!(f, "{}", self.kind)?
        } else {
            write!(f, "{}", self.pos.format(self.kind.to_string()))?
        }
        if let Some(post) = &self.post_msg {
            write!(f, "\n{post}")?;
        }
        Ok(())
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

impl Error {
    pub fn with_pos<T: WithPos>(mut self, pos: &T) -> Self {
        self.pos = pos.copy_span();
        self
    }

    pub fn with_post_msg(mut self, msg: Option<String>) -> Self {
        self.post_msg = msg;
        self
    }

    fn new(kind: ErrorKind) -> Self {
        Self {
            kind: Box::new(kind),
            pos: GPosIdx::UNKNOWN,
            post_msg: None,
        }
    }

    /// A construct that cannot be lowered by the scheduling model.
    pub fn unsupported<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::Unsupported(msg.to_string()))
    }

    /// A construct that is legal but almost certainly a mistake.
    pub fn papercut<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::Papercut(msg.to_string()))
    }

    pub fn malformed_structure<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::MalformedStructure(msg.to_string()))
    }

    /// A precondition of `pass` did not hold.
    pub fn pass_assumption<S: ToString, M: ToString>(pass: S, msg: M) -> Self {
        Self::new(ErrorKind::PassAssumption(pass.to_string(), msg.to_string()))
    }

    pub fn undefined<S: ToString>(name: Id, typ: S) -> Self {
        Self::new(ErrorKind::Undefined(name, typ.to_string()))
    }

    pub fn already_bound<S: ToString>(name: Id, typ: S) -> Self {
        Self::new(ErrorKind::AlreadyBound(name, typ.to_string()))
    }

    pub fn misc<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::Misc(msg.to_string()))
    }

    pub fn location(&self) -> (&'static str, u32, u32) {
        self.pos.get_location()
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    /// True if this error reports a construct the lowering cannot handle.
    pub fn is_unsupported(&self) -> bool {
        matches!(*self.kind, ErrorKind::Unsupported(_))
    }

    /// True if this error reports a violated pass precondition.
    pub fn is_pass_assumption(&self) -> bool {
        matches!(*self.kind, ErrorKind::PassAssumption(..))
    }
}

/// Standard error type for the compiler.
#[derive(Clone)]
enum ErrorKind {
    /// A construct the scheduling model cannot express.
    Unsupported(String),
    /// The program is legal but probably wrong.
    Papercut(String),
    /// The IR is not structured the way a pass expects.
    MalformedStructure(String),
    /// Internal consistency failure: a pass precondition was violated.
    PassAssumption(String, String),
    /// Reference to a name that is not defined.
    Undefined(Id, String),
    /// Name is bound twice.
    AlreadyBound(Id, String),
    /// Miscellaneous error message
    Misc(String),
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use ErrorKind::*;
        match self {
            Unsupported(msg) => write!(f, "Unsupported: {msg}"),
            Papercut(msg) => write!(f, "[Papercut] {msg}"),
            MalformedStructure(msg) => write!(f, "Malformed Structure: {msg}"),
            PassAssumption(pass, msg) => {
                write!(f, "Pass `{pass}` assumption violated: {msg}")
            }
            Undefined(name, typ) => write!(f, "Undefined {typ} name: {name}"),
            AlreadyBound(name, typ) => {
                write!(f, "Name `{name}` already bound by {typ}")
            }
            Misc(msg) => write!(f, "{msg}"),
        }
    }
}

impl From<std::fmt::Error> for Error {
    fn from(err: std::fmt::Error) -> Self {
        Error::misc(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::misc(format!("IO Error: {err}"))
    }
}

/// A collection of errors reported together.
#[derive(Clone)]
pub struct MultiError {
    errors: Vec<Error>,
}

impl MultiError {
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<Error> {
        self.errors
    }
}

impl From<Error> for MultiError {
    fn from(err: Error) -> Self {
        Self { errors: vec![err] }
    }
}

impl From<Vec<Error>> for MultiError {
    fn from(errors: Vec<Error>) -> Self {
        Self { errors }
    }
}

impl From<std::io::Error> for MultiError {
    fn from(err: std::io::Error) -> Self {
        Error::from(err).into()
    }
}

impl std::fmt::Debug for MultiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i != 0 {
                writeln!(f)?;
            }
            write!(f, "{err:?}")?;
        }
        Ok(())
    }
}

impl std::fmt::Display for MultiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

impl std::error::Error for Error {}
impl std::error::Error for MultiError {}
