use super::codec::timeout_round_trips;
use super::{FilterDict, RunTests};
use crate::conduit::ResultConduit;
use crate::errors::ConfigError;
use crate::refleak::HuntRefleak;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Builder for [`RunTests`]; also the override set for copy-with-overrides.
#[derive(Debug, Clone)]
pub struct RunTestsBuilder {
    draft: RunTests,
}

impl RunTestsBuilder {
    /// All flags off, every optional field absent, no resources enabled.
    pub fn new<I, S>(tests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            draft: RunTests {
                tests: tests.into_iter().map(Into::into).collect(),
                fail_fast: false,
                fail_env_changed: false,
                match_tests: None,
                ignore_tests: None,
                match_tests_dict: None,
                rerun: false,
                forever: false,
                pgo: false,
                pgo_extended: false,
                output_on_failure: false,
                timeout: None,
                verbose: 0,
                quiet: false,
                hunt_refleak: None,
                test_dir: None,
                use_junit: false,
                memory_limit: None,
                gc_threshold: None,
                use_resources: Default::default(),
                python_cmd: None,
                randomize: false,
                random_seed: None,
                json_file: None,
            },
        }
    }

    pub(super) fn from_existing(draft: RunTests) -> Self {
        Self { draft }
    }

    pub fn tests<I, S>(mut self, tests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.draft.tests = tests.into_iter().map(Into::into).collect();
        self
    }

    pub fn fail_fast(mut self, enabled: bool) -> Self {
        self.draft.fail_fast = enabled;
        self
    }

    pub fn fail_env_changed(mut self, enabled: bool) -> Self {
        self.draft.fail_env_changed = enabled;
        self
    }

    pub fn match_tests(mut self, filters: Option<Vec<String>>) -> Self {
        self.draft.match_tests = filters;
        self
    }

    pub fn ignore_tests(mut self, filters: Option<Vec<String>>) -> Self {
        self.draft.ignore_tests = filters;
        self
    }

    pub fn match_tests_dict(mut self, filters: Option<FilterDict>) -> Self {
        self.draft.match_tests_dict = filters;
        self
    }

    pub fn rerun(mut self, enabled: bool) -> Self {
        self.draft.rerun = enabled;
        self
    }

    pub fn forever(mut self, enabled: bool) -> Self {
        self.draft.forever = enabled;
        self
    }

    pub fn pgo(mut self, enabled: bool) -> Self {
        self.draft.pgo = enabled;
        self
    }

    pub fn pgo_extended(mut self, enabled: bool) -> Self {
        self.draft.pgo_extended = enabled;
        self
    }

    pub fn output_on_failure(mut self, enabled: bool) -> Self {
        self.draft.output_on_failure = enabled;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.draft.timeout = timeout;
        self
    }

    pub fn verbose(mut self, level: u32) -> Self {
        self.draft.verbose = level;
        self
    }

    pub fn quiet(mut self, enabled: bool) -> Self {
        self.draft.quiet = enabled;
        self
    }

    pub fn hunt_refleak(mut self, hunt: Option<HuntRefleak>) -> Self {
        self.draft.hunt_refleak = hunt.map(Arc::new);
        self
    }

    pub fn test_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.draft.test_dir = dir;
        self
    }

    pub fn use_junit(mut self, enabled: bool) -> Self {
        self.draft.use_junit = enabled;
        self
    }

    pub fn memory_limit(mut self, limit: Option<String>) -> Self {
        self.draft.memory_limit = limit;
        self
    }

    pub fn gc_threshold(mut self, threshold: Option<i64>) -> Self {
        self.draft.gc_threshold = threshold;
        self
    }

    pub fn use_resources<I, S>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.draft.use_resources = resources.into_iter().map(Into::into).collect();
        self
    }

    pub fn python_cmd(mut self, cmd: Option<Vec<String>>) -> Self {
        self.draft.python_cmd = cmd;
        self
    }

    pub fn randomize(mut self, enabled: bool) -> Self {
        self.draft.randomize = enabled;
        self
    }

    pub fn random_seed(mut self, seed: Option<u64>) -> Self {
        self.draft.random_seed = seed;
        self
    }

    pub fn json_file(mut self, conduit: Option<ResultConduit>) -> Self {
        self.draft.json_file = conduit.map(Arc::new);
        self
    }

    pub fn build(self) -> Result<RunTests, ConfigError> {
        if let Some(timeout) = self.draft.timeout {
            if timeout.is_zero() {
                return Err(ConfigError::ZeroTimeout);
            }
            if !timeout_round_trips(timeout) {
                return Err(ConfigError::UnrepresentableTimeout { timeout });
            }
        }
        if self.draft.python_cmd.as_ref().is_some_and(Vec::is_empty) {
            return Err(ConfigError::EmptyPythonCmd);
        }
        Ok(self.draft)
    }
}
