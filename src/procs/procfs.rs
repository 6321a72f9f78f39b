// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use crate::procs::{ProcessEntry, ProcessTable};

/// The process table as seen through `/proc`
#[derive(Clone, Debug)]
pub struct ProcFs {
    root: PathBuf,
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcFs {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    /// Reads from an alternate mount point of procfs
    pub fn with_root<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    fn read_entry(&self, pid: Pid) -> io::Result<ProcessEntry> {
        let dir = self.root.join(pid.to_string());
        let stat = fs::read_to_string(dir.join("stat"))?;
        let (comm, state) = parse_stat(&stat).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "malformed stat for process")
        })?;

        // comm is truncated by the kernel, prefer the name it was started with
        let executable = fs::read(dir.join("cmdline"))
            .ok()
            .and_then(|cmdline| argv0_basename(&cmdline))
            .unwrap_or_else(|| comm.to_string());

        Ok(ProcessEntry {
            pid,
            executable,
            state,
        })
    }
}

impl ProcessTable for ProcFs {
    fn find(&self, pid: Pid) -> io::Result<Option<ProcessEntry>> {
        match self.read_entry(pid) {
            Ok(entry) => Ok(Some(entry)),
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn processes(&self) -> io::Result<Vec<ProcessEntry>> {
        let mut entries = Vec::new();

        for dir in fs::read_dir(&self.root)? {
            let dir = dir?;
            let pid = match dir.file_name().to_str().and_then(|n| n.parse::<i32>().ok()) {
                Some(pid) => Pid::from_raw(pid),
                None => continue,
            };

            // processes come and go while we walk the directory
            if let Ok(entry) = self.read_entry(pid) {
                entries.push(entry);
            }
        }

        Ok(entries)
    }

    fn signal(&self, pid: Pid, signal: Signal) -> nix::Result<()> {
        kill(pid, signal)
    }
}

/// Parses `pid (comm) S ...` into the comm and state fields
fn parse_stat(stat: &str) -> Option<(&str, char)> {
    // comm may itself contain spaces and parens
    let open = stat.find('(')?;
    let close = stat.rfind(')')?;
    if close < open {
        return None;
    }

    let comm = &stat[open + 1..close];
    let state = stat[close + 1..].trim_start().chars().next()?;
    Some((comm, state))
}

/// The basename of the first NUL separated word of a cmdline
fn argv0_basename(cmdline: &[u8]) -> Option<String> {
    let argv0 = cmdline.split(|b| *b == 0).next()?;
    if argv0.is_empty() {
        return None;
    }

    let argv0 = String::from_utf8_lossy(argv0);
    Path::new(argv0.as_ref())
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
}
