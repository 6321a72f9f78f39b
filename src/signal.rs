// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use futures::stream::{self, BoxStream, SelectAll, StreamExt};
use log::{debug, warn};
use nix::sys::signal::Signal;
use tokio::signal::unix::{signal, SignalKind};

use crate::Error;

/// All termination signals merged into one stream
pub type Terminations = SelectAll<BoxStream<'static, Signal>>;

/// Signals which a process can't catch, or which the runtime refuses to handle
pub fn is_catchable(signal: Signal) -> bool {
    match signal {
        Signal::SIGKILL | Signal::SIGSTOP => false,
        Signal::SIGILL | Signal::SIGFPE | Signal::SIGSEGV => false,
        _ => true,
    }
}

/// Subscribe to `signals`, must be called from within the runtime.
///
/// Uncatchable signals are skipped, if none remain the stream never yields.
pub fn terminations(signals: &[Signal]) -> Result<Terminations, Error> {
    let mut subscriptions = Vec::with_capacity(signals.len());

    for &sig in signals {
        if !is_catchable(sig) {
            warn!("{:?} can not be caught, it will not stop the watchdog", sig);
            continue;
        }

        let listener = signal(SignalKind::from_raw(sig as libc::c_int))?;
        debug!("listening for {:?}", sig);

        let subscription = stream::unfold(listener, move |mut listener| async move {
            listener.recv().await.map(|()| (sig, listener))
        });
        subscriptions.push(subscription.boxed());
    }

    Ok(stream::select_all(subscriptions))
}
