use std::path::{Path, PathBuf};

/// Reference-leak hunting settings carried to the worker.
///
/// The worker repeats each test `warmups + runs` times and records the
/// measurements of the last `runs` iterations into `filename`. This crate
/// only transports the values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HuntRefleak {
    warmups: u32,
    runs: u32,
    filename: PathBuf,
}

impl HuntRefleak {
    pub fn new(warmups: u32, runs: u32, filename: impl Into<PathBuf>) -> Self {
        Self {
            warmups,
            runs,
            filename: filename.into(),
        }
    }

    pub fn warmups(&self) -> u32 {
        self.warmups
    }

    pub fn runs(&self) -> u32 {
        self.runs
    }

    pub fn filename(&self) -> &Path {
        &self.filename
    }
}
