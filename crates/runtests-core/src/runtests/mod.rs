//! The run configuration a coordinator hands to each worker.

mod builder;
mod codec;

pub use builder::RunTestsBuilder;
pub use codec::RUNTESTS_TAG;

use crate::conduit::{platform_supports_inheritance, ResultConduit};
use crate::errors::ConfigError;
use crate::refleak::HuntRefleak;
use std::collections::{BTreeMap, BTreeSet};
use std::iter::Cycle;
use std::path::{Path, PathBuf};
use std::slice;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Per-test filters, keyed by exact test name.
pub type FilterDict = BTreeMap<String, Vec<String>>;

/// Immutable description of one batch of tests for one worker.
///
/// Built with [`RunTestsBuilder`]; changed only by deriving a new value with
/// [`with_overrides`](Self::with_overrides). Nested records are shared
/// between derived values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTests {
    tests: Vec<String>,
    fail_fast: bool,
    fail_env_changed: bool,
    match_tests: Option<Vec<String>>,
    ignore_tests: Option<Vec<String>>,
    match_tests_dict: Option<FilterDict>,
    rerun: bool,
    forever: bool,
    pgo: bool,
    pgo_extended: bool,
    output_on_failure: bool,
    timeout: Option<Duration>,
    verbose: u32,
    quiet: bool,
    hunt_refleak: Option<Arc<HuntRefleak>>,
    test_dir: Option<PathBuf>,
    use_junit: bool,
    memory_limit: Option<String>,
    gc_threshold: Option<i64>,
    use_resources: BTreeSet<String>,
    python_cmd: Option<Vec<String>>,
    randomize: bool,
    random_seed: Option<u64>,
    json_file: Option<Arc<ResultConduit>>,
}

impl RunTests {
    pub fn builder<I, S>(tests: I) -> RunTestsBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RunTestsBuilder::new(tests)
    }

    /// Start a builder seeded with every field of `self`.
    pub fn to_builder(&self) -> RunTestsBuilder {
        RunTestsBuilder::from_existing(self.clone())
    }

    /// Copy with overrides: fields not touched by `apply` are copied
    /// unchanged, nested records by shared reference.
    ///
    /// ```
    /// use runtests_core::RunTests;
    ///
    /// let base = RunTests::builder(["test_os"]).build()?;
    /// let retry = base.with_overrides(|b| b.rerun(true).verbose(2))?;
    /// assert!(retry.rerun() && !base.rerun());
    /// # Ok::<(), runtests_core::ConfigError>(())
    /// ```
    pub fn with_overrides(
        &self,
        apply: impl FnOnce(RunTestsBuilder) -> RunTestsBuilder,
    ) -> Result<RunTests, ConfigError> {
        apply(self.to_builder()).build()
    }

    /// Filters for one test from `match_tests_dict`.
    ///
    /// `None` means no restriction. `Some(&[])` is a present, empty list and
    /// is kept distinct.
    pub fn filters_for(&self, test_name: &str) -> Option<&[String]> {
        self.match_tests_dict
            .as_ref()?
            .get(test_name)
            .map(Vec::as_slice)
    }

    /// Number of single-test runs this configuration implies; `None` when
    /// `forever` makes it unbounded.
    pub fn unit_count(&self) -> Option<usize> {
        if self.forever {
            None
        } else {
            Some(self.tests.len())
        }
    }

    /// Tests in scheduling order.
    ///
    /// With `forever` set the sequence cycles without end; callers bound it
    /// themselves (timeout, interruption, `take`). An empty test list yields
    /// nothing in either mode.
    pub fn iter_tests(&self) -> TestIter<'_> {
        let inner = if self.forever {
            TestIterInner::Forever(self.tests.iter().cycle())
        } else {
            TestIterInner::Once(self.tests.iter())
        };
        TestIter { inner }
    }

    /// Whether the result conduit for this configuration must be a file name.
    ///
    /// An alternate `python_cmd` runs a foreign program that receives only
    /// the file name; restricted targets have no inheritance at all.
    pub fn json_file_use_filename(&self) -> bool {
        self.python_cmd.is_some() || !platform_supports_inheritance()
    }

    /// Resolve the seed before the configuration leaves the coordinator.
    ///
    /// A randomized run without a seed gets a freshly generated one, so every
    /// worker receiving the result shuffles identically and the run can be
    /// replayed from the logged value.
    pub fn with_random_seed(&self) -> RunTests {
        if !self.randomize || self.random_seed.is_some() {
            return self.clone();
        }
        let seed: u64 = rand::random();
        info!(seed, "no random seed provided; using generated seed");
        RunTests {
            random_seed: Some(seed),
            ..self.clone()
        }
    }

    pub fn tests(&self) -> &[String] {
        &self.tests
    }

    pub fn fail_fast(&self) -> bool {
        self.fail_fast
    }

    pub fn fail_env_changed(&self) -> bool {
        self.fail_env_changed
    }

    pub fn match_tests(&self) -> Option<&[String]> {
        self.match_tests.as_deref()
    }

    pub fn ignore_tests(&self) -> Option<&[String]> {
        self.ignore_tests.as_deref()
    }

    pub fn match_tests_dict(&self) -> Option<&FilterDict> {
        self.match_tests_dict.as_ref()
    }

    pub fn rerun(&self) -> bool {
        self.rerun
    }

    pub fn forever(&self) -> bool {
        self.forever
    }

    pub fn pgo(&self) -> bool {
        self.pgo
    }

    pub fn pgo_extended(&self) -> bool {
        self.pgo_extended
    }

    pub fn output_on_failure(&self) -> bool {
        self.output_on_failure
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn verbose(&self) -> u32 {
        self.verbose
    }

    pub fn quiet(&self) -> bool {
        self.quiet
    }

    pub fn hunt_refleak(&self) -> Option<&Arc<HuntRefleak>> {
        self.hunt_refleak.as_ref()
    }

    pub fn test_dir(&self) -> Option<&Path> {
        self.test_dir.as_deref()
    }

    pub fn use_junit(&self) -> bool {
        self.use_junit
    }

    pub fn memory_limit(&self) -> Option<&str> {
        self.memory_limit.as_deref()
    }

    pub fn gc_threshold(&self) -> Option<i64> {
        self.gc_threshold
    }

    pub fn use_resources(&self) -> &BTreeSet<String> {
        &self.use_resources
    }

    pub fn python_cmd(&self) -> Option<&[String]> {
        self.python_cmd.as_deref()
    }

    pub fn randomize(&self) -> bool {
        self.randomize
    }

    pub fn random_seed(&self) -> Option<u64> {
        self.random_seed
    }

    pub fn json_file(&self) -> Option<&Arc<ResultConduit>> {
        self.json_file.as_ref()
    }
}

/// Iterator returned by [`RunTests::iter_tests`].
#[derive(Debug, Clone)]
pub struct TestIter<'a> {
    inner: TestIterInner<'a>,
}

#[derive(Debug, Clone)]
enum TestIterInner<'a> {
    Once(slice::Iter<'a, String>),
    Forever(Cycle<slice::Iter<'a, String>>),
}

impl<'a> Iterator for TestIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let next = match &mut self.inner {
            TestIterInner::Once(iter) => iter.next(),
            TestIterInner::Forever(iter) => iter.next(),
        };
        next.map(String::as_str)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.inner {
            TestIterInner::Once(iter) => iter.size_hint(),
            TestIterInner::Forever(iter) => iter.size_hint(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filters(entries: &[(&str, &[&str])]) -> FilterDict {
        entries
            .iter()
            .map(|(name, pats)| {
                (
                    name.to_string(),
                    pats.iter().map(|p| p.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_filters_for_known_and_unknown_tests() {
        let rt = RunTests::builder(["test_a", "test_b"])
            .match_tests_dict(Some(filters(&[("test_a", &["Foo.*"])])))
            .build()
            .unwrap();

        assert_eq!(rt.filters_for("test_a"), Some(&["Foo.*".to_string()][..]));
        assert_eq!(rt.filters_for("test_b"), None);
    }

    #[test]
    fn test_filters_for_without_dict() {
        let rt = RunTests::builder(["test_a"]).build().unwrap();
        assert_eq!(rt.filters_for("test_a"), None);
    }

    #[test]
    fn test_filters_for_keeps_empty_list_distinct() {
        let rt = RunTests::builder(["test_a"])
            .match_tests_dict(Some(filters(&[("test_a", &[])])))
            .build()
            .unwrap();
        assert_eq!(rt.filters_for("test_a"), Some(&[][..]));
    }

    #[test]
    fn test_unit_count() {
        let rt = RunTests::builder(["t1", "t2", "t3"]).build().unwrap();
        assert_eq!(rt.unit_count(), Some(3));

        let forever = rt.with_overrides(|b| b.forever(true)).unwrap();
        assert_eq!(forever.unit_count(), None);
    }

    #[test]
    fn test_iter_tests_once_in_order() {
        let rt = RunTests::builder(["t1", "t2"]).build().unwrap();
        let seen: Vec<&str> = rt.iter_tests().collect();
        assert_eq!(seen, ["t1", "t2"]);
        assert_eq!(rt.iter_tests().size_hint(), (2, Some(2)));
    }

    #[test]
    fn test_iter_tests_forever_cycles() {
        let rt = RunTests::builder(["t1", "t2"]).forever(true).build().unwrap();
        let seen: Vec<&str> = rt.iter_tests().take(5).collect();
        assert_eq!(seen, ["t1", "t2", "t1", "t2", "t1"]);

        // A new iteration starts over.
        assert_eq!(rt.iter_tests().next(), Some("t1"));
    }

    #[test]
    fn test_iter_tests_forever_empty_terminates() {
        let rt = RunTests::builder(Vec::<String>::new())
            .forever(true)
            .build()
            .unwrap();
        assert_eq!(rt.iter_tests().next(), None);
    }

    #[test]
    fn test_with_overrides_changes_only_named_fields() {
        let base = RunTests::builder(["test_os", "test_sys"])
            .timeout(Some(Duration::from_secs(900)))
            .hunt_refleak(Some(HuntRefleak::new(3, 3, "reflog.txt")))
            .json_file(Some(ResultConduit::path("results.json")))
            .build()
            .unwrap();
        assert!(!base.fail_fast());

        let derived = base.with_overrides(|b| b.fail_fast(true)).unwrap();

        assert!(derived.fail_fast());
        assert_eq!(derived.to_builder().fail_fast(false).build().unwrap(), base);
        assert_eq!(derived.hunt_refleak(), base.hunt_refleak());
        assert!(Arc::ptr_eq(
            derived.json_file().unwrap(),
            base.json_file().unwrap()
        ));
    }

    #[test]
    fn test_with_random_seed_only_fills_missing_seed() {
        let plain = RunTests::builder(["t1"]).build().unwrap();
        assert_eq!(plain.with_random_seed().random_seed(), None);

        let seeded = plain
            .with_overrides(|b| b.randomize(true).random_seed(Some(42)))
            .unwrap();
        assert_eq!(seeded.with_random_seed().random_seed(), Some(42));

        let unseeded = plain.with_overrides(|b| b.randomize(true)).unwrap();
        let resolved = unseeded.with_random_seed();
        assert!(resolved.random_seed().is_some());
        assert_eq!(unseeded.random_seed(), None);
    }

    #[test]
    fn test_python_cmd_requires_filename() {
        let rt = RunTests::builder(["t1"])
            .python_cmd(Some(vec!["python3".into(), "-X".into(), "dev".into()]))
            .build()
            .unwrap();
        assert!(rt.json_file_use_filename());
    }
}
