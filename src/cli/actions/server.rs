use crate::api::{self, ServerConfig};
use anyhow::Result;
use secrecy::SecretString;
use std::time::Duration;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: SecretString,
    pub db_max_connections: u32,
    pub frontend_base_url: String,
    pub session_sweep_seconds: u64,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        ServerConfig::new(self.port, self.dsn)
            .with_db_max_connections(self.db_max_connections)
            .with_frontend_base_url(self.frontend_base_url)
            .with_session_sweep_interval(Duration::from_secs(self.session_sweep_seconds))
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let config = args.into_config();
    debug!("Server config: {:?}", config);
    api::new(config).await
}
