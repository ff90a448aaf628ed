//! Exit codes of the `edgepurge` binary.
//! These codes are part of the public contract.

pub const SUCCESS: i32 = 0;
pub const PURGE_FAILED: i32 = 1; // At least one invalidation ended FAILED
pub const CONFIG_ERROR: i32 = 2; // Bad config file, flags or invalidation URI
#[allow(dead_code)] // only reached through PurgeError::exit_code
pub const DIAGNOSTIC_ERROR: i32 = 3; // A failure diagnostic could not be encoded
