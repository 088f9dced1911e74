//! Worker run configuration and result conduits for the runtests harness.
//!
//! A coordinator process describes a batch of tests as a [`RunTests`] value,
//! serializes it into the worker's command line and reads structured results
//! back through a [`ResultConduit`]:
//!
//! - [`RunTests`]: immutable run configuration with copy-with-overrides
//! - [`HuntRefleak`]: reference-leak hunting settings carried to the worker
//! - [`ResultConduit`]: inherited descriptor, inheritable handle or file name
//! - [`WorkerCommand`]: spawns a worker with the configuration and conduit wired in
//!
//! # Quick Start
//!
//! ```no_run
//! use runtests_core::{ConduitPolicy, ResultSink, RunTests, WorkerCommand};
//!
//! # fn example() -> anyhow::Result<()> {
//! let base = RunTests::builder(["test_os", "test_sys"]).build()?;
//!
//! // Pick the conduit and create the coordinator's end of it
//! let kind = ConduitPolicy::from_env().select_for(&base);
//! let sink = ResultSink::create(kind)?;
//!
//! let runtests = base.with_overrides(|b| b.json_file(Some(sink.conduit().clone())))?;
//! let status = WorkerCommand::new("runtests-worker", runtests).spawn()?.wait()?;
//!
//! println!("worker exited with {status}: {}", sink.read_to_string()?);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `RUNTESTS_JSON_FILE_USE_FILENAME` | Always pass results through a file name |

pub mod conduit;
pub mod errors;
pub mod refleak;
pub mod runtests;
pub mod worker;

// Re-export main types
pub use conduit::{
    platform_supports_inheritance, ConduitKind, ConduitPolicy, HandleInheritance,
    InheritanceScope, LaunchOptions, OpenMode, OsHandleInheritance, ResultConduit, ResultSink,
};
pub use errors::{
    ConduitError, ConduitResult, ConfigError, DecodeError, DecodeResult, EncodeError,
};
pub use refleak::HuntRefleak;
pub use runtests::{FilterDict, RunTests, RunTestsBuilder, TestIter, RUNTESTS_TAG};
pub use worker::{WorkerCommand, WorkerError, WORKER_JSON_FLAG};
