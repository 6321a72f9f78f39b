// Copyright 2019 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Access to the OS process table

#[cfg(target_os = "linux")]
mod procfs;
mod reaper;

#[cfg(target_os = "linux")]
pub use procfs::ProcFs;
pub use reaper::reap_duplicates;

use std::io;

use log::debug;
use nix::sys::signal::Signal;
use nix::unistd::Pid;

/// A single row of the process table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: Pid,
    /// basename of the executable
    pub executable: String,
    /// single letter scheduler state, as in `ps`
    pub state: char,
}

impl ProcessEntry {
    /// Zombies and dead entries are gone, even if the table still lists them
    pub fn is_alive(&self) -> bool {
        match self.state {
            'Z' | 'X' | 'x' => false,
            _ => true,
        }
    }
}

/// A view onto the running processes of the system
pub trait ProcessTable {
    /// Look up a single process, `Ok(None)` if there is no such process
    fn find(&self, pid: Pid) -> io::Result<Option<ProcessEntry>>;

    /// Every process currently in the table
    fn processes(&self) -> io::Result<Vec<ProcessEntry>>;

    /// Deliver `signal` to `pid`
    fn signal(&self, pid: Pid, signal: Signal) -> nix::Result<()>;
}

/// Returns true only if `pid` names a live process.
///
/// Any failure to look the process up is treated as the process being gone.
pub fn is_running<T: ProcessTable + ?Sized>(table: &T, pid: Option<Pid>) -> bool {
    let pid = match pid {
        Some(pid) if pid.as_raw() >= 0 => pid,
        _ => return false,
    };

    match table.find(pid) {
        Ok(Some(entry)) => entry.is_alive(),
        Ok(None) => false,
        Err(e) => {
            debug!("lookup of {} failed, assuming not running: {}", pid, e);
            false
        }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Default)]
    pub struct TableState {
        pub entries: BTreeMap<i32, ProcessEntry>,
        pub signals: Vec<(Pid, Signal)>,
        pub fail_lookups: bool,
    }

    /// In memory process table, clones share state
    #[derive(Clone, Default)]
    pub struct FakeTable(pub Arc<Mutex<TableState>>);

    impl FakeTable {
        pub fn insert(&self, pid: i32, executable: &str) {
            self.insert_state(pid, executable, 'S');
        }

        pub fn insert_state(&self, pid: i32, executable: &str, state: char) {
            self.0.lock().unwrap().entries.insert(
                pid,
                ProcessEntry {
                    pid: Pid::from_raw(pid),
                    executable: executable.to_string(),
                    state,
                },
            );
        }

        pub fn remove(&self, pid: Pid) {
            self.0.lock().unwrap().entries.remove(&pid.as_raw());
        }

        pub fn signals(&self) -> Vec<(Pid, Signal)> {
            self.0.lock().unwrap().signals.clone()
        }
    }

    impl ProcessTable for FakeTable {
        fn find(&self, pid: Pid) -> io::Result<Option<ProcessEntry>> {
            let state = self.0.lock().unwrap();
            if state.fail_lookups {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
            }
            Ok(state.entries.get(&pid.as_raw()).cloned())
        }

        fn processes(&self) -> io::Result<Vec<ProcessEntry>> {
            let state = self.0.lock().unwrap();
            if state.fail_lookups {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
            }
            Ok(state.entries.values().cloned().collect())
        }

        fn signal(&self, pid: Pid, signal: Signal) -> nix::Result<()> {
            let mut state = self.0.lock().unwrap();
            state.signals.push((pid, signal));
            match state.entries.get(&pid.as_raw()) {
                Some(_) => Ok(()),
                None => Err(nix::Error::Sys(nix::errno::Errno::ESRCH)),
            }
        }
    }
}
