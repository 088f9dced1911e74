use std::fmt;
use tracing::debug;

/// Conduit variant without its resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConduitKind {
    Descriptor,
    Handle,
    Path,
}

impl ConduitKind {
    /// Name used for `file_type` in the serialized configuration.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Descriptor => "DESCRIPTOR",
            Self::Handle => "HANDLE",
            Self::Path => "FILENAME",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "DESCRIPTOR" => Some(Self::Descriptor),
            "HANDLE" => Some(Self::Handle),
            "FILENAME" => Some(Self::Path),
            _ => None,
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Descriptor => "descriptor",
            Self::Handle => "handle",
            Self::Path => "path",
        }
    }
}

impl fmt::Display for ConduitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Whether a worker launched from this target can inherit exactly the
/// conduit's descriptor or handle.
///
/// Windows is excluded: std cannot spawn with an explicit handle list (see
/// [`LaunchOptions::apply`](super::LaunchOptions::apply)). Emscripten reports
/// the unix family but has no process model to inherit into.
pub fn platform_supports_inheritance() -> bool {
    cfg!(unix)
        && !cfg!(any(
            target_os = "emscripten",
            target_os = "wasi",
            target_family = "wasm"
        ))
}

/// Coordinator-side choice of conduit variant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConduitPolicy {
    /// Always use the path variant.
    pub force_filename: bool,
}

impl ConduitPolicy {
    pub const FORCE_FILENAME_ENV: &'static str = "RUNTESTS_JSON_FILE_USE_FILENAME";

    /// Create policy from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `RUNTESTS_JSON_FILE_USE_FILENAME` | `1`/`true` forces the path conduit |
    pub fn from_env() -> Self {
        Self {
            force_filename: std::env::var(Self::FORCE_FILENAME_ENV)
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }

    pub fn with_force_filename(mut self, force: bool) -> Self {
        self.force_filename = force;
        self
    }

    /// Pick the conduit variant for a worker.
    ///
    /// `alternate_command` is true when the worker runs a different program
    /// than the coordinator; such a worker cannot be trusted to map an
    /// inherited descriptor, so it gets a file name.
    pub fn select(&self, alternate_command: bool) -> ConduitKind {
        let kind = if self.force_filename || alternate_command || !platform_supports_inheritance()
        {
            ConduitKind::Path
        } else {
            ConduitKind::Descriptor
        };
        debug!(
            %kind,
            force_filename = self.force_filename,
            alternate_command,
            "selected result conduit"
        );
        kind
    }

    pub fn select_for(&self, runtests: &crate::RunTests) -> ConduitKind {
        self.select(runtests.json_file_use_filename())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_wire_names_round_trip() {
        for kind in [ConduitKind::Descriptor, ConduitKind::Handle, ConduitKind::Path] {
            assert_eq!(ConduitKind::from_wire_name(kind.wire_name()), Some(kind));
        }
        assert_eq!(ConduitKind::from_wire_name("UNIX_FD"), None);
    }

    #[test]
    fn test_alternate_command_forces_path() {
        assert_eq!(ConduitPolicy::default().select(true), ConduitKind::Path);
    }

    #[test]
    fn test_force_filename_wins() {
        let policy = ConduitPolicy::default().with_force_filename(true);
        assert_eq!(policy.select(false), ConduitKind::Path);
    }

    #[cfg(all(unix, not(target_os = "emscripten")))]
    #[test]
    fn test_unix_default_is_descriptor() {
        assert_eq!(ConduitPolicy::default().select(false), ConduitKind::Descriptor);
    }

    #[cfg(windows)]
    #[test]
    fn test_windows_default_is_path() {
        assert_eq!(ConduitPolicy::default().select(false), ConduitKind::Path);
    }

    #[test]
    #[serial]
    fn test_from_env() {
        std::env::set_var(ConduitPolicy::FORCE_FILENAME_ENV, "TRUE");
        assert!(ConduitPolicy::from_env().force_filename);

        std::env::set_var(ConduitPolicy::FORCE_FILENAME_ENV, "0");
        assert!(!ConduitPolicy::from_env().force_filename);

        std::env::remove_var(ConduitPolicy::FORCE_FILENAME_ENV);
        assert!(!ConduitPolicy::from_env().force_filename);
    }
}
