// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::ffi::{OsStr, OsString};
use std::process::Stdio;

use async_trait::async_trait;
use log::{debug, info};
use nix::unistd::Pid;
use tokio::process::{Child, Command};

use crate::args::{ForwardedArgs, IS_MAIN, WATCHDOG_PID};
use crate::error::ErrorKind;
use crate::Error;

/// Builds the worker's command line, `--isMain --watchdogPID <pid>` followed by the forwarded args
pub fn worker_args(supervisor: Pid, forwarded: &ForwardedArgs) -> Vec<OsString> {
    let mut args = vec![
        OsString::from(format!("--{}", IS_MAIN)),
        OsString::from(format!("--{}", WATCHDOG_PID)),
        OsString::from(supervisor.to_string()),
    ];
    args.extend(forwarded.to_args());
    args
}

/// The capability to launch a new image of this program
#[async_trait]
pub trait Launcher: Send {
    /// The program being launched, as it was invoked
    fn program(&self) -> &OsStr;

    /// Start a new worker with `args`, this does not retry
    fn launch(&mut self, args: &[OsString]) -> Result<Pid, Error>;

    /// Wait for a previously launched worker to exit, failures are ignored
    async fn wait(&mut self, pid: Pid);
}

/// Re-executes the current binary with its standard streams attached to ours
pub struct SelfLauncher {
    program: OsString,
    child: Option<Child>,
}

impl SelfLauncher {
    pub fn new<P: Into<OsString>>(program: P) -> Self {
        Self {
            program: program.into(),
            child: None,
        }
    }

    /// Launches the binary this process was started from
    pub fn current() -> Result<Self, Error> {
        let program = std::env::args_os()
            .next()
            .ok_or_else(|| "arg0 is not present?")?;

        Ok(Self::new(program))
    }
}

#[async_trait]
impl Launcher for SelfLauncher {
    fn program(&self) -> &OsStr {
        &self.program
    }

    fn launch(&mut self, args: &[OsString]) -> Result<Pid, Error> {
        // FIXME: clear env? set working directory? uid/gid?
        let child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| ErrorKind::SpawnFailure(self.program.clone(), e))?;

        let pid = Pid::from_raw(child.id() as i32);
        info!("started worker {:?}: {}", self.program, pid);

        // dropping the previous child hands it to the runtime to be reaped
        self.child = Some(child);
        Ok(pid)
    }

    async fn wait(&mut self, pid: Pid) {
        let child = match self.child.take() {
            Some(child) if child.id() as i32 == pid.as_raw() => child,
            other => {
                debug!("{} is not our current worker, not waiting", pid);
                self.child = other;
                return;
            }
        };

        match child.await {
            Ok(status) => info!("worker {} exited: {}", pid, status),
            Err(e) => debug!("failed to wait for worker {}: {}", pid, e),
        }
    }
}
