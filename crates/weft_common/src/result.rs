//! Common result and error types for fabric construction and export.

/// The standard result type for fallible fabric operations.
pub type WeftResult<T> = Result<T, WeftError>;

/// Errors raised while building, finalizing, addressing or exporting a fabric.
///
/// None of these are retried internally. A caller that receives one from a
/// build or finalize step must discard the interconnect and rebuild it.
#[derive(Debug, thiserror::Error)]
pub enum WeftError {
    /// Invalid switchbox, topology or bus parameters at construction.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A finalization invariant does not hold.
    #[error("topology error: {0}")]
    Topology(String),

    /// An operation was invoked out of lifecycle order.
    #[error("state error: {0}")]
    State(String),

    /// A node, edge, port or address does not exist.
    #[error("lookup error: {0}")]
    Lookup(String),

    /// Writing an export artifact failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WeftError {
    /// Creates a [`WeftError::Configuration`].
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates a [`WeftError::Topology`].
    pub fn topology(message: impl Into<String>) -> Self {
        Self::Topology(message.into())
    }

    /// Creates a [`WeftError::State`].
    pub fn state(message: impl Into<String>) -> Self {
        Self::State(message.into())
    }

    /// Creates a [`WeftError::Lookup`].
    pub fn lookup(message: impl Into<String>) -> Self {
        Self::Lookup(message.into())
    }
}
