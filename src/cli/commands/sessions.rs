use crate::api::DEFAULT_FRONTEND_BASE_URL;
use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};

pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_SESSION_SWEEP_SECONDS: &str = "session-sweep-seconds";

#[derive(Debug)]
pub struct Options {
    pub frontend_base_url: String,
    pub session_sweep_seconds: u64,
}

impl Options {
    /// # Errors
    /// Returns an error if a defaulted argument is unexpectedly absent.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let frontend_base_url = matches
            .get_one::<String>(ARG_FRONTEND_BASE_URL)
            .cloned()
            .context("missing required argument: --frontend-base-url")?;
        let session_sweep_seconds = matches
            .get_one::<u64>(ARG_SESSION_SWEEP_SECONDS)
            .copied()
            .context("missing required argument: --session-sweep-seconds")?;

        Ok(Self {
            frontend_base_url,
            session_sweep_seconds,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend base URL allowed by CORS")
                .env("BRIGHTMINDS_FRONTEND_BASE_URL")
                .default_value(DEFAULT_FRONTEND_BASE_URL),
        )
        .arg(
            Arg::new(ARG_SESSION_SWEEP_SECONDS)
                .long(ARG_SESSION_SWEEP_SECONDS)
                .help("Interval in seconds between expired session cleanups, 0 disables")
                .env("BRIGHTMINDS_SESSION_SWEEP_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(u64)),
        )
}
