// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::path::Path;

use futures::select;
use futures::stream::{Stream, StreamExt};
use futures::FutureExt;
use log::{debug, info, warn};
use nix::sys::signal::Signal;
use nix::unistd::{getpid, Pid};
use tokio::time::{interval_at, Instant};

use crate::args::ForwardedArgs;
use crate::fork::{worker_args, Launcher};
use crate::procs::{self, ProcessTable};
use crate::{Config, Error};

/// Launch and monitor the worker
///
/// Rules:
///   - only ever one worker at a time
///   - restart the worker on the next check after it dies
///   - a termination signal is forwarded to a live worker, then the supervisor exits
///   - never spawns again after a termination signal
pub struct Supervisor<T, L> {
    config: Config,
    table: T,
    launcher: L,
    forwarded: ForwardedArgs,
    exception: Option<Pid>,
    worker: Option<Pid>,
}

impl<T: ProcessTable, L: Launcher> Supervisor<T, L> {
    pub fn new(
        config: Config,
        table: T,
        launcher: L,
        forwarded: ForwardedArgs,
        exception: Option<Pid>,
    ) -> Self {
        Self {
            config,
            table,
            launcher,
            forwarded,
            exception,
            worker: None,
        }
    }

    /// Supervise until a termination arrives.
    ///
    /// Only returns an error if a worker could not be started, the supervisor is unusable after that.
    pub async fn run<S>(mut self, terminations: S) -> Result<(), Error>
    where
        S: Stream<Item = Signal> + Unpin,
    {
        self.config.validate()?;

        if let Some(header) = &self.config.header {
            println!("{}", header);
        }

        if self.config.kill_old {
            self.reap();
        }
        self.spawn()?;

        let period = self.config.check_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        let mut terminations = terminations.fuse();

        loop {
            select! {
                _ = ticker.tick().fuse() => self.check()?,
                sig = terminations.select_next_some() => {
                    info!("received {:?}, stopping", sig);
                    self.stop().await;
                    break;
                }
            }
        }

        if let Some(footer) = &self.config.footer {
            println!("{}", footer);
        }

        Ok(())
    }

    fn reap(&self) {
        let program = Path::new(self.launcher.program());
        let executable = match program.file_name() {
            Some(name) => name.to_string_lossy(),
            None => {
                warn!("can not determine executable name of {:?}", program);
                return;
            }
        };

        let killed = procs::reap_duplicates(&self.table, &executable, getpid(), self.exception);
        debug!("killed {} old instances of {}", killed, executable);
    }

    fn check(&mut self) -> Result<(), Error> {
        if procs::is_running(&self.table, self.worker) {
            return Ok(());
        }

        if let Some(pid) = self.worker {
            info!("worker {} is gone, restarting", pid);
        }
        self.spawn()
    }

    fn spawn(&mut self) -> Result<(), Error> {
        let args = worker_args(getpid(), &self.forwarded);
        let pid = self.launcher.launch(&args)?;

        self.worker = Some(pid);
        Ok(())
    }

    async fn stop(&mut self) {
        let pid = match self.worker {
            Some(pid) if procs::is_running(&self.table, Some(pid)) => pid,
            _ => return,
        };

        let sig = self.config.forward_signal();
        if let Err(e) = self.table.signal(pid, sig) {
            debug!("failed to send {:?} to worker {}: {}", sig, pid, e);
            return;
        }

        self.launcher.wait(pid).await;
    }
}
