//! Result conduits: how a worker's structured results reach the coordinator.
//!
//! A [`ResultConduit`] names one OS resource shared by exactly two
//! processes. The coordinator reads, the worker writes. Three mechanisms
//! exist and only this module knows which platform supports which:
//!
//! | Variant | Platform | Transfer |
//! |---------|----------|----------|
//! | `Descriptor` | unix | descriptor number kept open across exec |
//! | `Handle` | windows | handle marked inheritable while the worker spawns |
//! | `Path` | any | file name, opened independently by each side |
//!
//! Launching a worker with a `Handle` conduit needs a handle-list spawn that
//! `std::process` does not offer, so [`LaunchOptions::apply`] refuses it and
//! [`ConduitPolicy`] selects `Path` on windows.

mod inherit;
mod launch;
mod policy;
mod sink;

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

pub use inherit::{HandleInheritance, InheritanceScope, OsHandleInheritance};
pub use launch::LaunchOptions;
pub use policy::{platform_supports_inheritance, ConduitKind, ConduitPolicy};
pub use sink::ResultSink;

use crate::errors::{ConduitError, ConduitResult};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, LineWriter};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Direction in which a conduit is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("reading"),
            Self::Write => f.write_str("writing"),
        }
    }
}

/// Where a worker writes its structured results.
///
/// The variant is fixed when the coordinator creates the conduit and travels
/// inside the serialized [`RunTests`](crate::RunTests), so the worker never
/// re-derives platform logic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResultConduit {
    /// Inherited unix file descriptor.
    Descriptor(i32),
    /// Inheritable windows handle, carried as its numeric value.
    Handle(u64),
    /// File opened by name on both sides.
    Path(PathBuf),
}

impl ResultConduit {
    pub fn kind(&self) -> ConduitKind {
        match self {
            Self::Descriptor(_) => ConduitKind::Descriptor,
            Self::Handle(_) => ConduitKind::Handle,
            Self::Path(_) => ConduitKind::Path,
        }
    }

    /// Checked constructor for the inherited descriptor variant (unix only).
    pub fn descriptor(fd: i32) -> ConduitResult<Self> {
        ensure_supported(ConduitKind::Descriptor)?;
        Ok(Self::Descriptor(fd))
    }

    /// Checked constructor for the inheritable handle variant (windows only).
    pub fn handle(handle: u64) -> ConduitResult<Self> {
        ensure_supported(ConduitKind::Handle)?;
        Ok(Self::Handle(handle))
    }

    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    /// Mutate launch options so the worker inherits this conduit's resource.
    ///
    /// The path variant needs nothing: its name already travels inside the
    /// serialized configuration.
    pub fn prepare_launch(&self, options: &mut LaunchOptions) -> ConduitResult<()> {
        match self {
            Self::Descriptor(fd) => {
                ensure_supported(ConduitKind::Descriptor)?;
                options.inherit_descriptor(*fd);
            }
            Self::Handle(handle) => {
                ensure_supported(ConduitKind::Handle)?;
                options.inherit_handle(*handle);
            }
            Self::Path(_) => {}
        }
        debug!(conduit = %self, "prepared worker launch");
        Ok(())
    }

    /// Mark a handle inheritable until the returned scope is dropped.
    ///
    /// Descriptor and path conduits get an inert scope.
    pub fn scoped_inheritance(&self) -> ConduitResult<InheritanceScope<'static>> {
        if let Self::Handle(_) = self {
            ensure_supported(ConduitKind::Handle)?;
        }
        self.scoped_inheritance_with(&inherit::OS_HANDLE_INHERITANCE)
    }

    /// Same as [`scoped_inheritance`](Self::scoped_inheritance) with an
    /// explicit flag-setting primitive.
    pub fn scoped_inheritance_with<'a>(
        &self,
        api: &'a dyn HandleInheritance,
    ) -> ConduitResult<InheritanceScope<'a>> {
        match self {
            Self::Handle(handle) => InheritanceScope::enter(*handle, api),
            Self::Descriptor(_) | Self::Path(_) => Ok(InheritanceScope::inert()),
        }
    }

    /// Run `launch` while the conduit's resource is exposed to children.
    pub fn inherit_during<T, E>(&self, launch: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: From<ConduitError>,
    {
        let _scope = self.scoped_inheritance()?;
        launch()
    }

    /// [`inherit_during`](Self::inherit_during) with an explicit flag-setting primitive.
    pub fn inherit_during_with<T, E>(
        &self,
        api: &dyn HandleInheritance,
        launch: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<ConduitError>,
    {
        let _scope = self.scoped_inheritance_with(api)?;
        launch()
    }

    /// Open the underlying resource.
    ///
    /// Descriptor and handle conduits are duplicated: the returned file owns
    /// the duplicate and the conduit's own resource stays open, so both sides
    /// may open the same conduit repeatedly. Writing through a path creates or
    /// truncates the file.
    pub fn open(&self, mode: OpenMode) -> ConduitResult<File> {
        debug!(conduit = %self, %mode, "opening result conduit");
        let opened = match self {
            Self::Descriptor(fd) => open_descriptor(*fd, mode)?,
            Self::Handle(handle) => open_handle(*handle, mode)?,
            Self::Path(path) => open_path(path, mode),
        };
        opened.map_err(|source| ConduitError::Open {
            conduit: self.to_string(),
            source,
        })
    }

    pub fn open_reader(&self) -> ConduitResult<BufReader<File>> {
        self.open(OpenMode::Read).map(BufReader::new)
    }

    /// Line buffered, so each complete record reaches the coordinator even if
    /// the worker dies afterwards.
    pub fn open_writer(&self) -> ConduitResult<LineWriter<File>> {
        self.open(OpenMode::Write).map(LineWriter::new)
    }
}

impl fmt::Display for ResultConduit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Descriptor(fd) => write!(f, "descriptor {fd}"),
            Self::Handle(handle) => write!(f, "handle {handle:#x}"),
            Self::Path(path) => write!(f, "path {}", path.display()),
        }
    }
}

fn ensure_supported(kind: ConduitKind) -> ConduitResult<()> {
    let supported = match kind {
        ConduitKind::Descriptor => cfg!(unix),
        ConduitKind::Handle => cfg!(windows),
        ConduitKind::Path => true,
    };
    if supported {
        Ok(())
    } else {
        Err(ConduitError::unsupported(kind.label()))
    }
}

fn open_path(path: &Path, mode: OpenMode) -> std::io::Result<File> {
    match mode {
        OpenMode::Read => File::open(path),
        OpenMode::Write => File::create(path),
    }
}

#[cfg(unix)]
fn open_descriptor(fd: i32, mode: OpenMode) -> ConduitResult<std::io::Result<File>> {
    Ok(unix::open_descriptor(fd, mode))
}

#[cfg(not(unix))]
fn open_descriptor(_fd: i32, _mode: OpenMode) -> ConduitResult<std::io::Result<File>> {
    Err(ConduitError::unsupported(ConduitKind::Descriptor.label()))
}

#[cfg(windows)]
fn open_handle(handle: u64, mode: OpenMode) -> ConduitResult<std::io::Result<File>> {
    Ok(windows::open_handle(handle, mode))
}

#[cfg(not(windows))]
fn open_handle(_handle: u64, _mode: OpenMode) -> ConduitResult<std::io::Result<File>> {
    Err(ConduitError::unsupported(ConduitKind::Handle.label()))
}
