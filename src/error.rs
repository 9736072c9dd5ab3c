//! Failure taxonomy of the gateway.
//!
//! Almost nothing here reaches callers: channel and service failures are
//! handled where they occur and collapse into sentinel return values
//! (0 / `None`). The exceptions are `ScmError`, which splits the expected
//! privilege-denial branch from genuine faults so callers and tests can
//! assert on the right one, and `InitError`, the one structured error the
//! public surface reports.

use std::io;
use thiserror::Error;

/// Outcome of talking to the OS service database.
///
/// `ExpectedDenial` is the normal result for non-elevated callers and is
/// handled silently; anything else means the environment is broken in a way
/// the design does not anticipate.
#[derive(Debug, Error)]
pub enum ScmError {
    #[error("service control unavailable: access denied")]
    ExpectedDenial,

    #[error("service database fault: {0}")]
    UnexpectedFault(#[from] io::Error),
}

/// All the ways `Gateway::init` can fail.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("could not resolve the driver binary location: {0}")]
    DriverLocation(io::Error),

    #[error("driver device unavailable: {0}")]
    DeviceOpen(io::Error),
}
