//! Wire format of [`RunTests`]: one JSON object tagged with `__runtests__`.
//!
//! Every field is written, absent values as `null`, so the decoder never
//! guesses a default. Nested records are plain objects:
//!
//! ```text
//! {"__runtests__": true, "tests": ["test_os"], "timeout": 900.5,
//!  "hunt_refleak": {"warmups": 3, "runs": 3, "filename": "reflog.txt"},
//!  "json_file": {"file": 5, "file_type": "DESCRIPTOR"}, ...}
//! ```
//!
//! Encoding and decoding enumerate fields by name; unknown fields are
//! rejected because both ends always run the same version.

use super::{FilterDict, RunTests, RunTestsBuilder};
use crate::conduit::{ConduitKind, ResultConduit};
use crate::errors::{DecodeError, DecodeResult, EncodeError};
use crate::refleak::HuntRefleak;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Marker key distinguishing a run configuration from any other object.
pub const RUNTESTS_TAG: &str = "__runtests__";

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

impl RunTests {
    /// Serialize for transfer to a worker process.
    pub fn to_json(&self) -> Result<String, EncodeError> {
        Ok(self.to_json_value()?.to_string())
    }

    pub fn to_json_value(&self) -> Result<Value, EncodeError> {
        let mut obj = Map::new();
        obj.insert(RUNTESTS_TAG.into(), Value::Bool(true));
        obj.insert("tests".into(), string_list(&self.tests));
        obj.insert("fail_fast".into(), self.fail_fast.into());
        obj.insert("fail_env_changed".into(), self.fail_env_changed.into());
        obj.insert("match_tests".into(), optional(self.match_tests.as_deref(), string_list));
        obj.insert("ignore_tests".into(), optional(self.ignore_tests.as_deref(), string_list));
        obj.insert(
            "match_tests_dict".into(),
            optional(self.match_tests_dict.as_ref(), filter_dict),
        );
        obj.insert("rerun".into(), self.rerun.into());
        obj.insert("forever".into(), self.forever.into());
        obj.insert("pgo".into(), self.pgo.into());
        obj.insert("pgo_extended".into(), self.pgo_extended.into());
        obj.insert("output_on_failure".into(), self.output_on_failure.into());
        obj.insert("timeout".into(), optional(self.timeout, timeout_secs));
        obj.insert("verbose".into(), self.verbose.into());
        obj.insert("quiet".into(), self.quiet.into());
        obj.insert(
            "hunt_refleak".into(),
            match &self.hunt_refleak {
                Some(hunt) => encode_hunt_refleak(hunt)?,
                None => Value::Null,
            },
        );
        obj.insert(
            "test_dir".into(),
            match &self.test_dir {
                Some(dir) => path_value("test_dir", dir)?,
                None => Value::Null,
            },
        );
        obj.insert("use_junit".into(), self.use_junit.into());
        obj.insert(
            "memory_limit".into(),
            optional(self.memory_limit.clone(), Value::String),
        );
        obj.insert("gc_threshold".into(), optional(self.gc_threshold, Value::from));
        obj.insert(
            "use_resources".into(),
            Value::Array(self.use_resources.iter().cloned().map(Value::String).collect()),
        );
        obj.insert("python_cmd".into(), optional(self.python_cmd.as_deref(), string_list));
        obj.insert("randomize".into(), self.randomize.into());
        obj.insert("random_seed".into(), optional(self.random_seed, Value::from));
        obj.insert(
            "json_file".into(),
            match &self.json_file {
                Some(conduit) => encode_conduit(conduit)?,
                None => Value::Null,
            },
        );
        Ok(Value::Object(obj))
    }

    /// Inverse of [`to_json`](Self::to_json).
    pub fn from_json(text: &str) -> DecodeResult<RunTests> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_json_value(value)
    }

    pub fn from_json_value(value: Value) -> DecodeResult<RunTests> {
        let Value::Object(mut map) = value else {
            return Err(DecodeError::NotAnObject {
                what: "run configuration",
            });
        };
        match map.remove(RUNTESTS_TAG) {
            Some(Value::Bool(true)) => {}
            _ => return Err(DecodeError::MissingTag { tag: RUNTESTS_TAG }),
        }

        let mut fields = Fields::new(map, None);
        // Nested records first.
        let hunt_refleak = fields.optional("hunt_refleak", decode_hunt_refleak)?;
        let json_file = fields.optional("json_file", decode_conduit)?;

        let builder = RunTestsBuilder::new(fields.string_list("tests")?)
            .fail_fast(fields.bool("fail_fast")?)
            .fail_env_changed(fields.bool("fail_env_changed")?)
            .match_tests(fields.optional("match_tests", string_list_from)?)
            .ignore_tests(fields.optional("ignore_tests", string_list_from)?)
            .match_tests_dict(fields.optional("match_tests_dict", filter_dict_from)?)
            .rerun(fields.bool("rerun")?)
            .forever(fields.bool("forever")?)
            .pgo(fields.bool("pgo")?)
            .pgo_extended(fields.bool("pgo_extended")?)
            .output_on_failure(fields.bool("output_on_failure")?)
            .timeout(fields.optional("timeout", timeout_from)?)
            .verbose(fields.u32("verbose")?)
            .quiet(fields.bool("quiet")?)
            .hunt_refleak(hunt_refleak)
            .test_dir(fields.optional("test_dir", path_from)?)
            .use_junit(fields.bool("use_junit")?)
            .memory_limit(fields.optional("memory_limit", string_from)?)
            .gc_threshold(fields.optional("gc_threshold", i64_from)?)
            .use_resources(fields.string_list("use_resources")?)
            .python_cmd(fields.optional("python_cmd", string_list_from)?)
            .randomize(fields.bool("randomize")?)
            .random_seed(fields.optional("random_seed", u64_from)?)
            .json_file(json_file);

        fields.finish()?;
        Ok(builder.build()?)
    }
}

fn optional<T>(value: Option<T>, encode: impl FnOnce(T) -> Value) -> Value {
    value.map_or(Value::Null, encode)
}

fn string_list(items: &[String]) -> Value {
    Value::Array(items.iter().cloned().map(Value::String).collect())
}

fn filter_dict(dict: &FilterDict) -> Value {
    Value::Object(
        dict.iter()
            .map(|(name, filters)| (name.clone(), string_list(filters)))
            .collect(),
    )
}

/// Whole seconds stay integers; fractional ones become floats.
fn timeout_secs(timeout: Duration) -> Value {
    if timeout.subsec_nanos() == 0 {
        Value::from(timeout.as_secs())
    } else {
        Value::from(timeout.as_secs_f64())
    }
}

fn path_value(field: &str, path: &Path) -> Result<Value, EncodeError> {
    path.to_str()
        .map(|s| Value::String(s.to_owned()))
        .ok_or_else(|| EncodeError::NonUtf8Path {
            field: field.to_owned(),
            path: path.to_path_buf(),
        })
}

fn encode_hunt_refleak(hunt: &HuntRefleak) -> Result<Value, EncodeError> {
    let mut obj = Map::new();
    obj.insert("warmups".into(), hunt.warmups().into());
    obj.insert("runs".into(), hunt.runs().into());
    obj.insert(
        "filename".into(),
        path_value("hunt_refleak.filename", hunt.filename())?,
    );
    Ok(Value::Object(obj))
}

fn encode_conduit(conduit: &ResultConduit) -> Result<Value, EncodeError> {
    let file = match conduit {
        ResultConduit::Descriptor(fd) => Value::from(*fd),
        ResultConduit::Handle(handle) => Value::from(*handle),
        ResultConduit::Path(path) => path_value("json_file.file", path)?,
    };
    let mut obj = Map::new();
    obj.insert("file".into(), file);
    obj.insert("file_type".into(), conduit.kind().wire_name().into());
    Ok(Value::Object(obj))
}

/// Decoding cursor over one JSON object; removes fields as they are read.
struct Fields {
    map: Map<String, Value>,
    prefix: Option<&'static str>,
}

impl Fields {
    fn new(map: Map<String, Value>, prefix: Option<&'static str>) -> Self {
        Self { map, prefix }
    }

    fn name(&self, field: &str) -> String {
        match self.prefix {
            Some(prefix) => format!("{prefix}.{field}"),
            None => field.to_owned(),
        }
    }

    fn take(&mut self, field: &str) -> DecodeResult<(String, Value)> {
        let name = self.name(field);
        match self.map.remove(field) {
            Some(value) => Ok((name, value)),
            None => Err(DecodeError::MissingField { field: name }),
        }
    }

    fn required<T>(
        &mut self,
        field: &str,
        decode: impl FnOnce(&str, Value) -> DecodeResult<T>,
    ) -> DecodeResult<T> {
        let (name, value) = self.take(field)?;
        decode(&name, value)
    }

    /// `null` is the explicit absent marker; the key itself must exist.
    fn optional<T>(
        &mut self,
        field: &str,
        decode: impl FnOnce(&str, Value) -> DecodeResult<T>,
    ) -> DecodeResult<Option<T>> {
        match self.take(field)? {
            (_, Value::Null) => Ok(None),
            (name, value) => decode(&name, value).map(Some),
        }
    }

    fn bool(&mut self, field: &str) -> DecodeResult<bool> {
        self.required(field, |name, value| {
            value.as_bool().ok_or_else(|| invalid(name, "a boolean"))
        })
    }

    fn u32(&mut self, field: &str) -> DecodeResult<u32> {
        self.required(field, u32_from)
    }

    fn string_list(&mut self, field: &str) -> DecodeResult<Vec<String>> {
        self.required(field, string_list_from)
    }

    fn finish(self) -> DecodeResult<()> {
        match self.map.keys().next() {
            Some(extra) => Err(DecodeError::UnknownField {
                field: self.name(extra),
            }),
            None => Ok(()),
        }
    }
}

fn invalid(field: &str, expected: &'static str) -> DecodeError {
    DecodeError::InvalidField {
        field: field.to_owned(),
        expected,
    }
}

fn string_from(field: &str, value: Value) -> DecodeResult<String> {
    match value {
        Value::String(s) => Ok(s),
        _ => Err(invalid(field, "a string")),
    }
}

fn string_list_from(field: &str, value: Value) -> DecodeResult<Vec<String>> {
    let Value::Array(items) = value else {
        return Err(invalid(field, "an array of strings"));
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(s) => Ok(s),
            _ => Err(invalid(field, "an array of strings")),
        })
        .collect()
}

fn filter_dict_from(field: &str, value: Value) -> DecodeResult<FilterDict> {
    let Value::Object(map) = value else {
        return Err(invalid(field, "an object of string arrays"));
    };
    map.into_iter()
        .map(|(test, filters)| {
            let filters = string_list_from(&format!("{field}.{test}"), filters)?;
            Ok((test, filters))
        })
        .collect()
}

fn u32_from(field: &str, value: Value) -> DecodeResult<u32> {
    value
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| invalid(field, "an unsigned 32-bit integer"))
}

fn u64_from(field: &str, value: Value) -> DecodeResult<u64> {
    value
        .as_u64()
        .ok_or_else(|| invalid(field, "an unsigned 64-bit integer"))
}

fn i64_from(field: &str, value: Value) -> DecodeResult<i64> {
    value
        .as_i64()
        .ok_or_else(|| invalid(field, "a signed 64-bit integer"))
}

fn path_from(field: &str, value: Value) -> DecodeResult<PathBuf> {
    string_from(field, value).map(PathBuf::from)
}

/// Seconds to a duration, rounded to the nearest nanosecond.
fn timeout_from(field: &str, value: Value) -> DecodeResult<Duration> {
    if let Some(secs) = value.as_u64() {
        return Ok(Duration::from_secs(secs));
    }
    value
        .as_f64()
        .and_then(secs_to_duration)
        .ok_or_else(|| invalid(field, "a non-negative number of seconds"))
}

fn secs_to_duration(secs: f64) -> Option<Duration> {
    if !(secs.is_finite() && secs >= 0.0 && secs < u64::MAX as f64) {
        return None;
    }
    let whole = secs.trunc();
    let nanos = ((secs - whole) * NANOS_PER_SEC).round();
    if nanos >= NANOS_PER_SEC {
        Some(Duration::from_secs(whole as u64 + 1))
    } else {
        Some(Duration::new(whole as u64, nanos as u32))
    }
}

/// Whether `timeout` decodes back to itself after `timeout_secs`.
///
/// Fractional timeouts travel as f64 seconds, which hold about 15
/// significant digits; nanosecond precision is lost past ~10^6 seconds.
pub(super) fn timeout_round_trips(timeout: Duration) -> bool {
    timeout.subsec_nanos() == 0 || secs_to_duration(timeout.as_secs_f64()) == Some(timeout)
}

fn decode_hunt_refleak(field: &str, value: Value) -> DecodeResult<HuntRefleak> {
    let Value::Object(map) = value else {
        return Err(invalid(field, "an object"));
    };
    let mut fields = Fields::new(map, Some("hunt_refleak"));
    let hunt = HuntRefleak::new(
        fields.u32("warmups")?,
        fields.u32("runs")?,
        fields.required("filename", path_from)?,
    );
    fields.finish()?;
    Ok(hunt)
}

fn decode_conduit(field: &str, value: Value) -> DecodeResult<ResultConduit> {
    let Value::Object(map) = value else {
        return Err(invalid(field, "an object"));
    };
    let mut fields = Fields::new(map, Some("json_file"));
    let kind = fields.required("file_type", |name, value| {
        value
            .as_str()
            .and_then(ConduitKind::from_wire_name)
            .ok_or_else(|| invalid(name, "one of DESCRIPTOR, HANDLE, FILENAME"))
    })?;
    let conduit = fields.required("file", |name, value| match kind {
        ConduitKind::Descriptor => value
            .as_i64()
            .and_then(|fd| i32::try_from(fd).ok())
            .filter(|fd| *fd >= 0)
            .map(ResultConduit::Descriptor)
            .ok_or_else(|| invalid(name, "a file descriptor number")),
        ConduitKind::Handle => value
            .as_u64()
            .map(ResultConduit::Handle)
            .ok_or_else(|| invalid(name, "a handle value")),
        ConduitKind::Path => path_from(name, value).map(ResultConduit::Path),
    })?;
    fields.finish()?;
    Ok(conduit)
}
