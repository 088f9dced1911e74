//! Exit codes of the reference worker.
//! The coordinator tells decode and conduit failures apart by these values.

use runtests_core::{ConduitError, DecodeError};

pub const SUCCESS: i32 = 0;
pub const INTERNAL_ERROR: i32 = 1; // Anything not classified below
pub const USAGE_ERROR: i32 = 2; // clap argument errors
pub const DECODE_ERROR: i32 = 3; // --worker-json is not a valid configuration
pub const CONDUIT_ERROR: i32 = 4; // Result conduit could not be opened

pub fn for_error(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<DecodeError>().is_some() {
        DECODE_ERROR
    } else if err.downcast_ref::<ConduitError>().is_some() {
        CONDUIT_ERROR
    } else {
        INTERNAL_ERROR
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use runtests_core::RunTests;

    #[test]
    fn test_decode_error_through_context() {
        let err = RunTests::from_json("{}")
            .context("decoding --worker-json")
            .unwrap_err();
        assert_eq!(for_error(&err), DECODE_ERROR);
    }

    #[test]
    fn test_unclassified_error() {
        assert_eq!(for_error(&anyhow::anyhow!("boom")), INTERNAL_ERROR);
    }
}
