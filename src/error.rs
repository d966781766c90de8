use thiserror::Error;

/// Result alias for `hsne`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by hierarchy construction and embedding sessions.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A parameter is out of range or an input is empty.
    ///
    /// Always reported synchronously, before any state is touched.
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// What was wrong with it.
        message: String,
    },

    /// A scale-dependent operation was invoked before a hierarchy was built.
    #[error("hierarchy has not been built")]
    HierarchyNotBuilt,

    /// The requested scale index does not exist in the hierarchy.
    #[error("scale {index} out of range: hierarchy has {num_scales} scales")]
    ScaleOutOfRange {
        /// Requested scale index.
        index: usize,
        /// Number of scales in the hierarchy.
        num_scales: usize,
    },

    /// `start` was called while a computation is already running.
    ///
    /// The running session is left untouched.
    #[error("an embedding computation is already running")]
    ComputationAlreadyRunning,

    /// `continue_computation` was called while the session cannot be resumed.
    #[error("cannot continue computation: {reason}")]
    ContinuePrecondition {
        /// Why the session is not resumable.
        reason: &'static str,
    },

    /// A failure surfaced from the computation engine.
    #[error("computation engine failed during {stage}: {message}")]
    Engine {
        /// The operation that failed.
        stage: &'static str,
        /// Engine-reported message.
        message: String,
    },
}

impl Error {
    pub(crate) fn invalid(name: &'static str, message: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            message: message.into(),
        }
    }

    pub(crate) fn engine(stage: &'static str, message: impl Into<String>) -> Self {
        Error::Engine {
            stage,
            message: message.into(),
        }
    }
}
