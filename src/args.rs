// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Splitting the command line into the watchdog's own flags and the application's.

use std::ffi::OsString;

use clap::{App, Arg, ArgMatches};
use nix::unistd::Pid;

use crate::Error;

/// Set on the worker invocation, selects the worker role
pub const IS_MAIN: &str = "isMain";
/// The pid of the supervisor which launched this invocation
pub const WATCHDOG_PID: &str = "watchdogPID";

/// Which half of the re-exec pair this invocation is
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Run the embedding application, `supervisor` is the watchdog which launched us
    Worker { supervisor: Option<Pid> },
    /// Watch a worker; `exception` is never killed as a duplicate
    Supervisor { exception: Option<Pid> },
}

/// The application's command line words, relayed verbatim to every worker
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ForwardedArgs(Vec<OsString>);

impl ForwardedArgs {
    pub fn new<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self(args.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_args(&self) -> Vec<OsString> {
        self.0.clone()
    }
}

/// The outcome of routing a command line
#[derive(Debug)]
pub struct Routed<'a> {
    pub role: Role,
    pub matches: ArgMatches<'a>,
    pub forwarded: ForwardedArgs,
}

/// Wraps the application's clap `App`, adding the reserved watchdog arguments.
///
/// Everything clap accepted, other than the reserved arguments, is relayed to the
/// worker exactly as it was spelled on the command line.
pub struct Router<'a, 'b> {
    app: App<'a, 'b>,
}

impl<'a, 'b> Router<'a, 'b> {
    pub fn new(app: App<'a, 'b>) -> Self {
        let app = app
            .arg(
                Arg::with_name(IS_MAIN)
                    .long(IS_MAIN)
                    .hidden(true)
                    .help("act as the main process instead of the watchdog process"),
            )
            .arg(
                Arg::with_name(WATCHDOG_PID)
                    .long(WATCHDOG_PID)
                    .value_name("PID")
                    .takes_value(true)
                    .allow_hyphen_values(true)
                    .hidden(true)
                    .validator(|i| {
                        i.parse::<i32>()
                            .map(|_| ())
                            .map_err(|_| "number was expected".to_string())
                    })
                    .help("used as the exception when killing old main processes"),
            );

        Self { app }
    }

    /// Routes the arguments of the current process, exiting with usage on bad input
    pub fn route(self) -> Result<Routed<'a>, Error> {
        let argv: Vec<OsString> = std::env::args_os().collect();
        let matches = self.app.get_matches_from(argv.clone());
        routed(matches, &argv)
    }

    /// Routes an explicit argument list, the first item is the binary name
    pub fn route_from<I, T>(self, itr: I) -> Result<Routed<'a>, Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let argv: Vec<OsString> = itr.into_iter().map(Into::into).collect();
        let matches = self.app.get_matches_from_safe(argv.clone())?;
        routed(matches, &argv)
    }
}

fn routed<'a>(matches: ArgMatches<'a>, argv: &[OsString]) -> Result<Routed<'a>, Error> {
    let watchdog_pid = matches
        .value_of(WATCHDOG_PID)
        .map(str::parse::<i32>)
        .transpose()?
        .filter(|pid| *pid >= 0)
        .map(Pid::from_raw);

    let role = if matches.is_present(IS_MAIN) {
        Role::Worker {
            supervisor: watchdog_pid,
        }
    } else {
        Role::Supervisor {
            exception: watchdog_pid,
        }
    };

    // argv[0] is the binary, the launcher supplies its own
    let forwarded = strip_reserved(argv.get(1..).unwrap_or(&[]));

    Ok(Routed {
        role,
        matches,
        forwarded,
    })
}

/// Drops the reserved arguments, and the value of `--watchdogPID`, keeping everything else in order
fn strip_reserved(words: &[OsString]) -> ForwardedArgs {
    let is_main = format!("--{}", IS_MAIN);
    let watchdog_pid = format!("--{}", WATCHDOG_PID);
    let watchdog_pid_eq = format!("--{}=", WATCHDOG_PID);

    let mut forwarded = Vec::with_capacity(words.len());
    let mut words = words.iter();
    while let Some(word) = words.next() {
        let text = word.to_string_lossy();

        // nothing after the terminator is a flag
        if text == "--" {
            forwarded.push(word.clone());
            forwarded.extend(words.by_ref().cloned());
            break;
        }

        if text == is_main || text.starts_with(&watchdog_pid_eq) {
            continue;
        }
        if text == watchdog_pid {
            words.next();
            continue;
        }

        forwarded.push(word.clone());
    }

    ForwardedArgs(forwarded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> App<'static, 'static> {
        App::new("app")
            .arg(
                Arg::with_name("name")
                    .long("name")
                    .takes_value(true)
                    .multiple(true)
                    .number_of_values(1),
            )
            .arg(Arg::with_name("verbose").long("verbose").multiple(true))
            .arg(Arg::with_name("kill-old").long("kill-old"))
            .arg(Arg::with_name("quiet").short("q"))
            .arg(
                Arg::with_name("listen_port")
                    .long("port")
                    .short("p")
                    .takes_value(true)
                    .default_value("80"),
            )
            .arg(Arg::with_name("input").index(1))
    }

    fn router() -> Router<'static, 'static> {
        Router::new(app())
    }

    fn words(words: &[&str]) -> Vec<OsString> {
        words.iter().map(OsString::from).collect()
    }

    #[test]
    fn test_supervisor_by_default() {
        let routed = router().route_from(vec!["app"]).expect("failed to route");

        assert_eq!(routed.role, Role::Supervisor { exception: None });
        assert!(routed.forwarded.is_empty());
    }

    #[test]
    fn test_worker_role() {
        let routed = router()
            .route_from(vec!["app", "--isMain", "--watchdogPID", "42"])
            .expect("failed to route");

        assert_eq!(
            routed.role,
            Role::Worker {
                supervisor: Some(Pid::from_raw(42))
            }
        );
        assert!(routed.forwarded.is_empty());
    }

    #[test]
    fn test_exception_pid_for_nested_supervisor() {
        let routed = router()
            .route_from(vec!["app", "--watchdogPID=7"])
            .expect("failed to route");

        assert_eq!(
            routed.role,
            Role::Supervisor {
                exception: Some(Pid::from_raw(7))
            }
        );
        assert!(routed.forwarded.is_empty());
    }

    #[test]
    fn test_negative_pid_is_none() {
        let routed = router()
            .route_from(vec!["app", "--watchdogPID", "-1"])
            .expect("failed to route");

        assert_eq!(routed.role, Role::Supervisor { exception: None });
        assert!(routed.forwarded.is_empty());
    }

    #[test]
    fn test_bad_pid_rejected() {
        assert!(router()
            .route_from(vec!["app", "--watchdogPID", "abc"])
            .is_err());
    }

    #[test]
    fn test_flag_forwarded() {
        let routed = router()
            .route_from(vec!["app", "--kill-old"])
            .expect("failed to route");

        assert_eq!(
            routed.forwarded.to_args(),
            words(&["--kill-old"])
        );
    }

    #[test]
    fn test_short_and_renamed_args_forwarded_as_spelled() {
        let routed = router()
            .route_from(vec!["app", "-q", "-p", "8080"])
            .expect("failed to route");

        assert_eq!(
            routed.forwarded.to_args(),
            words(&["-q", "-p", "8080"])
        );
        assert!(routed.matches.is_present("quiet"));
        assert_eq!(routed.matches.value_of("listen_port"), Some("8080"));

        let routed = router()
            .route_from(vec!["app", "--port=9090"])
            .expect("failed to route");
        assert_eq!(routed.forwarded.to_args(), words(&["--port=9090"]));
    }

    #[test]
    fn test_forwarded_in_encounter_order() {
        let routed = router()
            .route_from(vec![
                "app",
                "--verbose",
                "--name",
                "b",
                "--isMain",
                "--port",
                "8080",
                "--watchdogPID",
                "3",
                "--name",
                "a",
                "--verbose",
                "input.txt",
            ])
            .expect("failed to route");

        assert_eq!(
            routed.forwarded.to_args(),
            words(&[
                "--verbose",
                "--name",
                "b",
                "--port",
                "8080",
                "--name",
                "a",
                "--verbose",
                "input.txt",
            ])
        );

        // the forwarded words route back to the same application arguments
        let mut again = vec![OsString::from("app")];
        again.extend(routed.forwarded.to_args());
        let reparsed = router().route_from(again).expect("failed to reroute");
        assert_eq!(reparsed.forwarded, routed.forwarded);
        assert_eq!(reparsed.matches.occurrences_of("verbose"), 2);
    }

    #[test]
    fn test_defaults_not_forwarded() {
        let routed = router()
            .route_from(vec!["app", "--name", "x"])
            .expect("failed to route");

        assert_eq!(
            routed.forwarded.to_args(),
            words(&["--name", "x"])
        );
        assert_eq!(routed.matches.value_of("listen_port"), Some("80"));
    }

    #[test]
    fn test_reserved_names_after_terminator_kept() {
        let routed = router()
            .route_from(vec!["app", "--", "--isMain"])
            .expect("failed to route");

        assert_eq!(routed.role, Role::Supervisor { exception: None });
        assert_eq!(
            routed.forwarded.to_args(),
            words(&["--", "--isMain"])
        );
    }
}
