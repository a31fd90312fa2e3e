use thiserror::Error;

pub type BackendResult<T> = Result<T, BackendError>;

/// Recoverable interruptions the loop answers with exactly one
/// rebuild-and-retry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransientKind {
    /// The presentable surface no longer matches the output and must be
    /// rebuilt before the next acquire.
    SurfaceOutdated,
    /// Access to the surface or capture session was lost and must be
    /// re-established.
    SurfaceLost,
    /// The bounded acquire wait expired without a slot or frame.
    AcquireTimeout,
}

/// Failure taxonomy for every backend call. Nothing unwinds past the
/// lifecycle state machine; callers see these as values.
#[derive(Debug, Error)]
pub enum BackendError {
    /// No enumerated device satisfied the hard requirements. Fatal for
    /// this configuration attempt.
    #[error("no suitable device: {0}")]
    NoDevice(String),

    /// A platform or API refusal that ends the current attempt; the
    /// backend remains in its pre-call state.
    #[error("{0}")]
    Fatal(String),

    /// Expected, recoverable condition; handled inside the loop.
    #[error("transient failure: {0:?}")]
    Transient(TransientKind),

    /// A single upload or submit failed. Previous presentable contents
    /// remain valid and will be re-presented.
    #[error("frame error: {0}")]
    Frame(String),

    /// A guarded call arrived in the wrong lifecycle state.
    #[error("invalid state: expected {expected}, currently {actual}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    /// The backend does not handle this event kind.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
}

impl BackendError {
    pub fn fatal(message: impl Into<String>) -> Self {
        BackendError::Fatal(message.into())
    }

    pub fn frame(message: impl Into<String>) -> Self {
        BackendError::Frame(message.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Transient(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_variants_are_transient() {
        assert!(BackendError::Transient(TransientKind::SurfaceLost).is_transient());
        assert!(!BackendError::fatal("refused").is_transient());
        assert!(!BackendError::frame("submit failed").is_transient());
        assert!(!BackendError::NoDevice("empty".into()).is_transient());
    }
}
