use crate::errors::{ConduitError, ConduitResult};
use tracing::{debug, warn};

/// Primitive that flips the inheritable flag of a platform handle.
pub trait HandleInheritance {
    fn set_inheritable(&self, handle: u64, inheritable: bool) -> std::io::Result<()>;
}

/// The operating system's handle table.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsHandleInheritance;

pub(super) static OS_HANDLE_INHERITANCE: OsHandleInheritance = OsHandleInheritance;

impl HandleInheritance for OsHandleInheritance {
    #[cfg(windows)]
    fn set_inheritable(&self, handle: u64, inheritable: bool) -> std::io::Result<()> {
        super::windows::set_inheritable(handle, inheritable)
    }

    #[cfg(not(windows))]
    fn set_inheritable(&self, _handle: u64, _inheritable: bool) -> std::io::Result<()> {
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "handle inheritance requires windows",
        ))
    }
}

/// Window during which a handle is exposed to child processes.
///
/// Dropping the scope restores the handle to non-inheritable, whether the
/// launch inside it succeeded, returned an error, or unwound.
#[must_use = "the handle stops being inheritable when the scope is dropped"]
pub struct InheritanceScope<'a> {
    restore: Option<(u64, &'a dyn HandleInheritance)>,
}

impl<'a> InheritanceScope<'a> {
    pub(super) fn enter(handle: u64, api: &'a dyn HandleInheritance) -> ConduitResult<Self> {
        api.set_inheritable(handle, true)
            .map_err(|source| ConduitError::Inheritance { handle, source })?;
        debug!(handle, "handle marked inheritable");
        Ok(Self {
            restore: Some((handle, api)),
        })
    }

    pub(super) fn inert() -> Self {
        Self { restore: None }
    }

    /// Whether this scope will restore a handle on drop.
    pub fn is_active(&self) -> bool {
        self.restore.is_some()
    }
}

impl Drop for InheritanceScope<'_> {
    fn drop(&mut self) {
        if let Some((handle, api)) = self.restore.take() {
            match api.set_inheritable(handle, false) {
                Ok(()) => debug!(handle, "handle inheritance revoked"),
                Err(e) => warn!(handle, error = %e, "failed to revoke handle inheritance"),
            }
        }
    }
}
