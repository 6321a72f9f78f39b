// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A watchdog which keeps a second copy of the current binary running.
//!
//! The first invocation of a program becomes the supervisor. It re-executes the same
//! binary with `--isMain`, and restarts that worker whenever it disappears. On a
//! termination signal the worker is signaled, waited for, and the supervisor exits.
//! Every argument the application accepted is passed on to each worker as it was written.
//!
//! ```no_run
//! use clap::{App, Arg};
//! use watchdogrc::{Config, Router};
//!
//! let router = Router::new(App::new("app").arg(Arg::with_name("port").long("port").takes_value(true)));
//!
//! match watchdogrc::watch(router, Config::default()).expect("watchdog failed") {
//!     Some(args) => println!("worker running on port {:?}", args.value_of("port")),
//!     None => return,
//! }
//! ```

#[cfg(not(target_os = "linux"))]
compile_error!("the supervisor reads the process table from /proc, only linux is supported");

pub mod args;
pub mod config;
mod error;
pub mod fork;
pub mod procs;
pub mod signal;
pub mod supervisor;

pub use args::{ForwardedArgs, Role, Routed, Router};
pub use config::Config;
pub use error::{Error, ErrorKind};
pub use supervisor::Supervisor;

use clap::ArgMatches;
use log::debug;
use tokio::runtime;

use crate::fork::SelfLauncher;
use crate::procs::ProcFs;

/// Route the process arguments and either return them to the worker, or supervise.
///
/// Returns `Some` with the parsed arguments in the worker, the application should carry on.
/// Returns `None` once the supervisor has finished, the application should exit.
pub fn watch<'a>(router: Router<'a, '_>, config: Config) -> Result<Option<ArgMatches<'a>>, Error> {
    watch_routed(router.route()?, config)
}

/// `watch` for arguments which have already been routed
pub fn watch_routed(routed: Routed<'_>, config: Config) -> Result<Option<ArgMatches<'_>>, Error> {
    let Routed {
        role,
        matches,
        forwarded,
    } = routed;

    let exception = match role {
        Role::Worker { supervisor } => {
            debug!("running as worker of {:?}", supervisor);
            return Ok(Some(matches));
        }
        Role::Supervisor { exception } => exception,
    };

    let mut runtime = runtime::Builder::new()
        .basic_scheduler()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let terminations = signal::terminations(&config.signals)?;
        let launcher = SelfLauncher::current()?;

        Supervisor::new(config, ProcFs::new(), launcher, forwarded, exception)
            .run(terminations)
            .await
    })?;

    Ok(None)
}
