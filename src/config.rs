// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the worker runtime.
//!
//! `Config` can be passed into `Bridge::builder` to adjust startup behaviour; the defaults are
//! suitable for engines which load within a few seconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default bound on engine startup.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration parameters for the worker runtime.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Maximum time the engine may take to load before the worker gives up.
    ///
    /// When the timeout elapses the readiness gate resolves with a startup error and all pending
    /// and future requests are rejected with it. Requests are never left hanging on an engine
    /// that will not arrive.
    pub startup_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }
}
