use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while loading a remote capability.
///
/// Every variant is recoverable: the load orchestrator turns any of them
/// into a degraded state backed by a local fallback. The type is `Clone`
/// because one in-flight operation may report the same error to many
/// waiters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoaderError {
    /// The configuration document could not be fetched or parsed.
    #[error("Loader config unavailable from {source_name}: {reason}")]
    ConfigUnavailable {
        /// Where the document was fetched from.
        source_name: String,
        /// What went wrong.
        reason: String,
    },

    /// The configuration document has no entry for this remote.
    #[error("Remote '{remote}' is not configured")]
    RemoteNotConfigured {
        /// The requested remote name.
        remote: String,
    },

    /// The remote bundle could not be fetched or activated.
    #[error("Failed to inject bundle {url}: {reason}")]
    InjectionFailed {
        /// Bundle URL.
        url: String,
        /// What went wrong.
        reason: String,
    },

    /// The bundle loaded but published nothing under its scope.
    #[error("Container '{scope}' not found after injection")]
    ContainerNotFound {
        /// The expected registry scope.
        scope: String,
    },

    /// The container was found but its `init` failed.
    #[error("Container '{scope}' failed to initialize: {reason}")]
    ContainerInitFailed {
        /// The container scope.
        scope: String,
        /// What went wrong.
        reason: String,
    },

    /// The container has no usable export for this capability.
    #[error("Capability '{capability}' not found in remote '{remote}'")]
    CapabilityMissing {
        /// Remote name.
        remote: String,
        /// Capability name.
        capability: String,
    },

    /// The load did not finish in time.
    #[error("Loading timed out after {}ms", .elapsed.as_millis())]
    Timeout {
        /// The timeout that elapsed.
        elapsed: Duration,
    },
}

/// Coarse classification of a [`LoaderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`LoaderError::ConfigUnavailable`].
    ConfigUnavailable,
    /// See [`LoaderError::RemoteNotConfigured`].
    RemoteNotConfigured,
    /// See [`LoaderError::InjectionFailed`].
    InjectionFailed,
    /// See [`LoaderError::ContainerNotFound`].
    ContainerNotFound,
    /// See [`LoaderError::ContainerInitFailed`].
    ContainerInitFailed,
    /// See [`LoaderError::CapabilityMissing`].
    CapabilityMissing,
    /// See [`LoaderError::Timeout`].
    Timeout,
}

impl LoaderError {
    /// The variant tag of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigUnavailable { .. } => ErrorKind::ConfigUnavailable,
            Self::RemoteNotConfigured { .. } => ErrorKind::RemoteNotConfigured,
            Self::InjectionFailed { .. } => ErrorKind::InjectionFailed,
            Self::ContainerNotFound { .. } => ErrorKind::ContainerNotFound,
            Self::ContainerInitFailed { .. } => ErrorKind::ContainerInitFailed,
            Self::CapabilityMissing { .. } => ErrorKind::CapabilityMissing,
            Self::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// The config document is memoized, so a remote missing from it stays
    /// missing for every retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::RemoteNotConfigured { .. })
    }

    pub(crate) fn config(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::ConfigUnavailable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn injection(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::InjectionFailed {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

/// A specialized Result type for loader operations.
pub type LoaderResult<T> = Result<T, LoaderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unconfigured_remote_is_permanent() {
        let missing = LoaderError::RemoteNotConfigured {
            remote: "viewer".into(),
        };
        assert!(!missing.is_transient());

        let timeout = LoaderError::Timeout {
            elapsed: Duration::from_millis(10),
        };
        assert!(timeout.is_transient());
        assert_eq!(timeout.kind(), ErrorKind::Timeout);
        assert_eq!(timeout.to_string(), "Loading timed out after 10ms");
    }
}
