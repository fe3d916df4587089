//! Unified error type.
//!
//! Every failure the kernel can see is a [`Error`]. The variants that carry a
//! status code form the framework taxonomy; everything else is unclassified
//! and rendered with the configured failure status.

use std::fmt;

/// The error type returned by kiln's fallible operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Framework runtime error with an explicit HTTP status.
    #[error("{message}")]
    Runtime { status: u16, message: String },

    /// Access denied. Always `403`.
    #[error("{0}")]
    Forbidden(String),

    /// The route, controller, or container is wired incorrectly.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The post-success transactional commit failed.
    #[error("commit failed: {0}")]
    Commit(String),

    /// Anything raised by application code that is not part of the taxonomy.
    #[error(transparent)]
    Unclassified(#[from] anyhow::Error),

    /// Binding to a port or accepting a connection failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Framework runtime error with an explicit status.
    pub fn runtime(status: u16, message: impl Into<String>) -> Self {
        Self::Runtime { status, message: message.into() }
    }

    /// Raised when a controller has no action named `method`. Status `501`.
    pub fn undefined_method(class: &str, method: &str) -> Self {
        Self::runtime(501, format!("The method `{method}` is not defined on `{class}`"))
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Wraps any error as an unclassified failure.
    pub fn unclassified<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Unclassified(anyhow::Error::new(err))
    }

    /// The status this error declares, if it belongs to the taxonomy.
    ///
    /// `None` means "use the configured default failure status".
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Runtime { status, .. } => Some(*status),
            Self::Forbidden(_) => Some(403),
            _ => None,
        }
    }

    /// Stable snake-case name of the variant, used in rendered error bodies.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Runtime { .. } => ErrorKind::Runtime,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Commit(_) => ErrorKind::Commit,
            Self::Unclassified(_) => ErrorKind::Unclassified,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Messages of the error and every error in its source chain, outermost first.
    pub fn chain(&self) -> Vec<String> {
        match self {
            Self::Unclassified(inner) => inner.chain().map(ToString::to_string).collect(),
            _ => {
                let mut out = vec![self.to_string()];
                let mut source = std::error::Error::source(self);
                while let Some(err) = source {
                    out.push(err.to_string());
                    source = err.source();
                }
                out
            }
        }
    }
}

/// Discriminant of [`Error`] without its payload.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Runtime,
    Forbidden,
    Configuration,
    Commit,
    Unclassified,
    Io,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Runtime => "runtime",
            Self::Forbidden => "forbidden",
            Self::Configuration => "configuration",
            Self::Commit => "commit",
            Self::Unclassified => "unclassified",
            Self::Io => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
