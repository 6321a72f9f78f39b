// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use log::{debug, info, warn};
use nix::sys::signal::Signal;
use nix::unistd::Pid;

use crate::procs::ProcessTable;

/// Kill leftover instances of `executable`, returning how many were signaled.
///
/// Never touches `own` or `exception`. This is best effort, processes which can't
/// be listed or signaled are skipped.
pub fn reap_duplicates<T: ProcessTable + ?Sized>(
    table: &T,
    executable: &str,
    own: Pid,
    exception: Option<Pid>,
) -> usize {
    let processes = match table.processes() {
        Ok(processes) => processes,
        Err(e) => {
            warn!("could not list processes, not killing old instances: {}", e);
            return 0;
        }
    };

    let mut killed = 0;
    for process in processes {
        if process.pid == own || Some(process.pid) == exception {
            continue;
        }
        if process.executable != executable {
            continue;
        }

        match table.signal(process.pid, Signal::SIGKILL) {
            Ok(()) => {
                info!("killed old instance of {}: {}", executable, process.pid);
                killed += 1;
            }
            Err(e) => debug!("failed to kill old instance {}: {}", process.pid, e),
        }
    }

    killed
}
