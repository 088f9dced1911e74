use crate::errors::{ConduitError, ConduitResult};
use std::process::Command;

/// Resources a worker process must inherit from the coordinator.
///
/// Filled by [`ResultConduit::prepare_launch`](super::ResultConduit::prepare_launch)
/// and installed on a [`Command`] with [`apply`](Self::apply).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    descriptors: Vec<i32>,
    handles: Vec<u64>,
}

impl LaunchOptions {
    pub fn inherit_descriptor(&mut self, fd: i32) {
        if !self.descriptors.contains(&fd) {
            self.descriptors.push(fd);
        }
    }

    pub fn inherit_handle(&mut self, handle: u64) {
        if !self.handles.contains(&handle) {
            self.handles.push(handle);
        }
    }

    pub fn inherited_descriptors(&self) -> &[i32] {
        &self.descriptors
    }

    pub fn inherited_handles(&self) -> &[u64] {
        &self.handles
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty() && self.handles.is_empty()
    }

    /// Install the inherited set on `command`.
    ///
    /// On unix the listed descriptors survive exec in the child. Handles are
    /// refused: `std::process::Command` cannot restrict a windows child to an
    /// explicit handle list, and spawning without one would hand the worker
    /// every inheritable handle of the coordinator.
    pub fn apply(&self, command: &mut Command) -> ConduitResult<()> {
        if !self.handles.is_empty() {
            return Err(ConduitError::HandleListUnsupported {
                count: self.handles.len(),
            });
        }

        #[cfg(unix)]
        if !self.descriptors.is_empty() {
            super::unix::keep_descriptors_on_exec(command, self.descriptors.clone());
        }

        #[cfg(not(unix))]
        let _ = command;
        Ok(())
    }
}
