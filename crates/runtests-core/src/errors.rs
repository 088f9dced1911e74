//! Error types for configuration transfer and result conduits.

use std::path::PathBuf;

/// Failure to decode a serialized [`RunTests`](crate::RunTests).
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The text is not JSON at all.
    #[error("invalid worker json: {0}")]
    Json(#[from] serde_json::Error),

    /// The top-level value (or a nested record) is not a JSON object.
    #[error("{what} must be a JSON object")]
    NotAnObject { what: &'static str },

    /// The `__runtests__` marker is missing.
    #[error("missing {tag} marker: not a serialized run configuration")]
    MissingTag { tag: &'static str },

    /// A required field is absent.
    #[error("missing field '{field}'")]
    MissingField { field: String },

    /// A field is present but has the wrong shape.
    #[error("invalid field '{field}': expected {expected}")]
    InvalidField {
        field: String,
        expected: &'static str,
    },

    /// A field this version does not know.
    #[error("unknown field '{field}'")]
    UnknownField { field: String },

    /// The decoded fields violate a record invariant.
    #[error("invalid run configuration: {0}")]
    Invalid(#[from] ConfigError),
}

/// Failure to encode a [`RunTests`](crate::RunTests).
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// JSON text is the wire format; paths must be representable in it.
    #[error("field '{field}' holds a non UTF-8 path: {}", path.display())]
    NonUtf8Path { field: String, path: PathBuf },
}

/// Record invariant violations caught by the builder.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("timeout must be a positive duration")]
    ZeroTimeout,

    /// Fractional timeouts travel as f64 seconds and must decode unchanged.
    #[error("timeout {timeout:?} cannot be encoded as f64 seconds without losing precision")]
    UnrepresentableTimeout { timeout: std::time::Duration },

    #[error("python_cmd must contain at least the program to run")]
    EmptyPythonCmd,
}

/// Failures of the result conduit.
#[derive(Debug, thiserror::Error)]
pub enum ConduitError {
    /// The underlying descriptor, handle or path could not be opened or adapted.
    #[error("cannot open {conduit}: {source}")]
    Open {
        conduit: String,
        #[source]
        source: std::io::Error,
    },

    /// The conduit variant has no meaning on this platform.
    #[error("{kind} conduit is not supported on this platform ({platform})")]
    UnsupportedPlatform {
        kind: &'static str,
        platform: &'static str,
    },

    /// The handle inheritance flag could not be changed.
    #[error("cannot change inheritance of handle {handle}: {source}")]
    Inheritance {
        handle: u64,
        #[source]
        source: std::io::Error,
    },

    /// The launcher cannot restrict the child to an explicit handle list.
    #[error("cannot restrict worker inheritance to {count} conduit handle(s); use a path conduit")]
    HandleListUnsupported { count: usize },

    /// Reading back the coordinator side of a result sink failed.
    #[error("cannot read results from {conduit}: {source}")]
    Read {
        conduit: String,
        #[source]
        source: std::io::Error,
    },
}

impl ConduitError {
    pub(crate) fn unsupported(kind: &'static str) -> Self {
        Self::UnsupportedPlatform {
            kind,
            platform: std::env::consts::OS,
        }
    }
}

pub type DecodeResult<T> = Result<T, DecodeError>;
pub type ConduitResult<T> = Result<T, ConduitError>;
