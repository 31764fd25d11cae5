//! Maps validated CLI arguments to the server action.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{sessions, ARG_DB_MAX_CONNECTIONS, ARG_DSN, ARG_PORT};
use anyhow::{anyhow, Context, Result};
use secrecy::SecretString;
use url::Url;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or the DSN is not a `PostgreSQL` URL.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;
    validate_dsn(&dsn)?;

    let db_max_connections = matches
        .get_one::<u32>(ARG_DB_MAX_CONNECTIONS)
        .copied()
        .unwrap_or(5);

    let sessions_opts = sessions::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn: SecretString::from(dsn),
        db_max_connections,
        frontend_base_url: sessions_opts.frontend_base_url,
        session_sweep_seconds: sessions_opts.session_sweep_seconds,
    }))
}

fn validate_dsn(dsn: &str) -> Result<()> {
    // Parse errors from `url` never echo the input, so the password stays out of logs.
    let parsed = Url::parse(dsn).map_err(|err| anyhow!("invalid --dsn: {err}"))?;
    match parsed.scheme() {
        "postgres" | "postgresql" => Ok(()),
        other => Err(anyhow!(
            "invalid --dsn: expected postgres:// or postgresql://, got {other}://"
        )),
    }
}
