// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::ffi::{OsStr, OsString};
use std::thread;
use std::time::Duration;

use clap::{App, Arg, ArgMatches};
use log::info;

use watchdogrc::{Config, Error, Router};

const CHECK_INTERVAL_MS: &str = "check-interval-ms";
const KILL_OLD: &str = "kill-old";
const EXIT_AFTER_MS: &str = "exit-after-ms";
const LABEL: &str = "label";
const ECHO_ARGS: &str = "echo-args";

trait SetupClapApp {
    fn setup_clap_app(self) -> Self;
}

impl<'a, 'b> SetupClapApp for App<'a, 'b> {
    fn setup_clap_app(self) -> Self {
        self.version(env!("CARGO_PKG_VERSION"))
            .author(env!("CARGO_PKG_AUTHORS"))
            .about(env!("CARGO_PKG_DESCRIPTION"))
    }
}

fn number_validator(i: &OsStr) -> Result<(), OsString> {
    i.to_string_lossy()
        .parse::<u64>()
        .map(|_| ())
        .map_err(|_| OsString::from("number was expected"))
}

fn app() -> App<'static, 'static> {
    App::new(env!("CARGO_PKG_NAME"))
        .setup_clap_app()
        .arg(
            Arg::with_name(CHECK_INTERVAL_MS)
                .long(CHECK_INTERVAL_MS)
                .value_name("MILLIS")
                .takes_value(true)
                .validator_os(number_validator)
                .help("how often the watchdog checks that the worker is alive"),
        )
        .arg(
            Arg::with_name(KILL_OLD)
                .long(KILL_OLD)
                .help("kill other running instances of this binary before starting"),
        )
        .arg(
            Arg::with_name(EXIT_AFTER_MS)
                .long(EXIT_AFTER_MS)
                .value_name("MILLIS")
                .takes_value(true)
                .validator_os(number_validator)
                .help("the worker exits on its own after this long, to exercise restarts"),
        )
        .arg(
            Arg::with_name(LABEL)
                .long(LABEL)
                .value_name("TEXT")
                .takes_value(true)
                .help("a label the worker prints when it starts"),
        )
        .arg(
            Arg::with_name(ECHO_ARGS)
                .short("e")
                .help("the worker prints the arguments it was started with"),
        )
}

fn millis(args: &ArgMatches<'_>, name: &str) -> Result<Option<Duration>, Error> {
    Ok(args
        .value_of(name)
        .map(str::parse::<u64>)
        .transpose()?
        .map(Duration::from_millis))
}

fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let routed = Router::new(app()).route()?;

    let mut config = Config {
        header: Some(format!("{} watchdog started", env!("CARGO_PKG_NAME"))),
        footer: Some(format!("{} watchdog exited", env!("CARGO_PKG_NAME"))),
        kill_old: routed.matches.is_present(KILL_OLD),
        ..Config::default()
    };
    if let Some(interval) = millis(&routed.matches, CHECK_INTERVAL_MS)? {
        config.check_interval = interval;
    }

    let args = match watchdogrc::watch_routed(routed, config) {
        Ok(Some(args)) => args,
        Ok(None) => return Ok(()),
        Err(e) => {
            eprintln!("watchdog failed: {}", e);
            std::process::exit(1);
        }
    };

    worker(&args)
}

fn worker(args: &ArgMatches<'_>) -> Result<(), Error> {
    let pid = nix::unistd::getpid();
    println!(
        "worker {} started: {}",
        pid,
        args.value_of(LABEL).unwrap_or("unlabeled")
    );

    if args.is_present(ECHO_ARGS) {
        let argv: Vec<String> = std::env::args().skip(1).collect();
        println!("worker {} args: {}", pid, argv.join(" "));
    }

    if let Some(exit_after) = millis(args, EXIT_AFTER_MS)? {
        thread::sleep(exit_after);
        info!("worker {} exiting", pid);
        return Ok(());
    }

    loop {
        thread::sleep(Duration::from_secs(60));
    }
}
