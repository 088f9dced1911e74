use super::{ConduitKind, OpenMode, ResultConduit};
use crate::errors::{ConduitError, ConduitResult};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Coordinator end of a result conduit.
///
/// Owns the temporary file the worker writes into. Results are read back
/// through the conduit's read side: a duplicate of the shared descriptor or
/// handle rewound to the start, or the file reopened by name. The file is
/// removed when the sink is dropped.
pub struct ResultSink {
    file: NamedTempFile,
    conduit: ResultConduit,
}

impl ResultSink {
    pub fn create(kind: ConduitKind) -> ConduitResult<Self> {
        Self::create_in(kind, std::env::temp_dir())
    }

    pub fn create_in(kind: ConduitKind, dir: impl AsRef<Path>) -> ConduitResult<Self> {
        let file = tempfile::Builder::new()
            .prefix("runtests-")
            .suffix(".json")
            .tempfile_in(dir.as_ref())
            .map_err(|source| ConduitError::Open {
                conduit: format!("temporary result file in {}", dir.as_ref().display()),
                source,
            })?;

        let conduit = match kind {
            ConduitKind::Descriptor => descriptor_of(file.as_file())?,
            ConduitKind::Handle => handle_of(file.as_file())?,
            ConduitKind::Path => ResultConduit::Path(file.path().to_path_buf()),
        };
        debug!(%conduit, "created result sink");

        Ok(Self { file, conduit })
    }

    /// Conduit to embed in the worker's configuration.
    pub fn conduit(&self) -> &ResultConduit {
        &self.conduit
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Everything the worker wrote so far.
    pub fn read_to_string(&self) -> ConduitResult<String> {
        let mut reader = self.conduit.open(OpenMode::Read)?;
        rewind_and_read(&mut reader).map_err(|source| ConduitError::Read {
            conduit: self.conduit.to_string(),
            source,
        })
    }
}

fn rewind_and_read(file: &mut File) -> std::io::Result<String> {
    file.seek(SeekFrom::Start(0))?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(content)
}

#[cfg(unix)]
fn descriptor_of(file: &File) -> ConduitResult<ResultConduit> {
    use std::os::unix::io::AsRawFd;
    Ok(ResultConduit::Descriptor(file.as_raw_fd()))
}

#[cfg(not(unix))]
fn descriptor_of(_file: &File) -> ConduitResult<ResultConduit> {
    Err(ConduitError::unsupported(ConduitKind::Descriptor.label()))
}

#[cfg(windows)]
fn handle_of(file: &File) -> ConduitResult<ResultConduit> {
    use std::os::windows::io::AsRawHandle;
    Ok(ResultConduit::Handle(file.as_raw_handle() as usize as u64))
}

#[cfg(not(windows))]
fn handle_of(_file: &File) -> ConduitResult<ResultConduit> {
    Err(ConduitError::unsupported(ConduitKind::Handle.label()))
}
