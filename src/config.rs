// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::time::Duration;

use nix::sys::signal::Signal;

use crate::Error;

pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Knobs for the supervisor, fixed before it starts
///
/// ```
/// # use std::time::Duration;
/// # use watchdogrc::Config;
/// let config = Config {
///     check_interval: Duration::from_secs(1),
///     footer: Some("bye".to_string()),
///     ..Config::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug)]
pub struct Config {
    /// How often to check that the worker is still alive
    pub check_interval: Duration,
    /// Printed once when the supervisor starts
    pub header: Option<String>,
    /// Printed once when the supervisor exits
    pub footer: Option<String>,
    /// Kill dangling processes of the same binary before the first spawn
    pub kill_old: bool,
    /// Signals which terminate the supervisor, the first is forwarded to the worker
    pub signals: Vec<Signal>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            check_interval: DEFAULT_CHECK_INTERVAL,
            header: None,
            footer: None,
            kill_old: false,
            signals: vec![Signal::SIGINT, Signal::SIGTERM],
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), Error> {
        if self.check_interval == Duration::from_secs(0) {
            return Err(Error::from("check interval must be greater than zero"));
        }

        Ok(())
    }

    /// The signal sent to a live worker when the supervisor is asked to stop
    pub fn forward_signal(&self) -> Signal {
        self.signals.first().copied().unwrap_or(Signal::SIGINT)
    }
}
