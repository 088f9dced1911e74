//! Coordinator-side launch of one worker process.

use crate::conduit::{ConduitKind, LaunchOptions};
use crate::errors::{ConduitError, EncodeError};
use crate::runtests::RunTests;
use std::ffi::OsString;
use std::process::{Child, Command};
use tracing::{debug, info};

/// Flag preceding the serialized configuration in the worker's arguments.
pub const WORKER_JSON_FLAG: &str = "--worker-json";

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("cannot serialize worker configuration: {0}")]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Conduit(#[from] ConduitError),

    /// Randomized runs must carry the coordinator's seed; see
    /// [`RunTests::with_random_seed`].
    #[error("randomized run has no random seed; resolve it before launching workers")]
    MissingRandomSeed,

    /// An alternate run command cannot resolve a bare descriptor or handle.
    #[error("alternate run command needs a path conduit, got {kind}")]
    ConduitRequiresPath { kind: ConduitKind },

    #[error("failed to spawn worker '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Command line and inherited resources for one worker.
///
/// The argument vector is `<program> [python_cmd args...] [extra args...]
/// --worker-json <JSON>`, where `program` is replaced by `python_cmd[0]`
/// when an alternate command is configured.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    program: OsString,
    args: Vec<OsString>,
    runtests: RunTests,
}

impl WorkerCommand {
    pub fn new(program: impl Into<OsString>, runtests: RunTests) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            runtests,
        }
    }

    /// Extra argument placed before the configuration flag.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn runtests(&self) -> &RunTests {
        &self.runtests
    }

    /// Build the command without spawning it.
    pub fn command(&self) -> Result<Command, WorkerError> {
        if self.runtests.randomize() && self.runtests.random_seed().is_none() {
            return Err(WorkerError::MissingRandomSeed);
        }
        if let Some(conduit) = self.runtests.json_file() {
            if self.runtests.json_file_use_filename() && conduit.kind() != ConduitKind::Path {
                return Err(WorkerError::ConduitRequiresPath {
                    kind: conduit.kind(),
                });
            }
        }
        let json = self.runtests.to_json()?;

        let mut command = match self.runtests.python_cmd() {
            Some([program, rest @ ..]) => {
                let mut command = Command::new(program);
                command.args(rest);
                command
            }
            _ => Command::new(&self.program),
        };
        command.args(&self.args).arg(WORKER_JSON_FLAG).arg(json);

        let mut options = LaunchOptions::default();
        if let Some(conduit) = self.runtests.json_file() {
            conduit.prepare_launch(&mut options)?;
        }
        options.apply(&mut command)?;

        debug!(
            program = ?command.get_program(),
            inherited_fds = ?options.inherited_descriptors(),
            inherited_handles = ?options.inherited_handles(),
            "built worker command"
        );
        Ok(command)
    }

    /// Build and spawn the worker.
    pub fn spawn(&self) -> Result<Child, WorkerError> {
        let mut command = self.command()?;
        self.launch(&mut command)
    }

    /// Spawn an already built command while the conduit is inheritable.
    pub fn launch(&self, command: &mut Command) -> Result<Child, WorkerError> {
        let mut spawn = || {
            command.spawn().map_err(|source| WorkerError::Spawn {
                program: command.get_program().to_string_lossy().into_owned(),
                source,
            })
        };
        let child = match self.runtests.json_file() {
            Some(conduit) => conduit.inherit_during(spawn)?,
            None => spawn()?,
        };
        info!(
            pid = child.id(),
            tests = self.runtests.tests().len(),
            "spawned worker"
        );
        Ok(child)
    }
}
