use crate::credentials::{
    postgres::{PgIdentityStore, PgOwnership},
    sweeper, CredentialManager,
};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{get, post},
    Extension, Router,
};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa_swagger_ui::SwaggerUi;

pub mod handlers;
mod openapi;

pub use openapi::openapi;

pub const DEFAULT_FRONTEND_BASE_URL: &str = "https://brightminds.app";
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_SESSION_SWEEP_SECONDS: u64 = 3600;

/// Server settings resolved from the CLI.
#[derive(Debug)]
pub struct ServerConfig {
    port: u16,
    dsn: SecretString,
    db_max_connections: u32,
    frontend_base_url: String,
    session_sweep_interval: Duration,
}

impl ServerConfig {
    #[must_use]
    pub fn new(port: u16, dsn: SecretString) -> Self {
        Self {
            port,
            dsn,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            frontend_base_url: DEFAULT_FRONTEND_BASE_URL.to_string(),
            session_sweep_interval: Duration::from_secs(DEFAULT_SESSION_SWEEP_SECONDS),
        }
    }

    #[must_use]
    pub fn with_db_max_connections(mut self, max: u32) -> Self {
        self.db_max_connections = max.max(1);
        self
    }

    #[must_use]
    pub fn with_frontend_base_url(mut self, url: impl Into<String>) -> Self {
        self.frontend_base_url = url.into();
        self
    }

    /// Zero disables the expired session sweeper.
    #[must_use]
    pub fn with_session_sweep_interval(mut self, interval: Duration) -> Self {
        self.session_sweep_interval = interval;
        self
    }

    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub const fn db_max_connections(&self) -> u32 {
        self.db_max_connections
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub const fn session_sweep_interval(&self) -> Duration {
        self.session_sweep_interval
    }
}

/// Build the application router around a credential manager.
///
/// CORS is added by [`new`] since it depends on deployment config.
pub fn router(manager: Arc<CredentialManager>) -> Router {
    Router::new()
        .route(
            "/health",
            get(handlers::health::health).options(handlers::health::health),
        )
        .route(handlers::LOOKUP_PATH, post(handlers::lookup::lookup))
        .route(handlers::SET_PIN_PATH, post(handlers::pin::set_pin))
        .route(handlers::LOGIN_PATH, post(handlers::pin::login))
        .route(handlers::SESSION_PATH, get(handlers::session::session))
        .route(handlers::RESET_PIN_PATH, post(handlers::reset::reset_pin))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(manager)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(config: ServerConfig) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(config.db_max_connections())
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(config.dsn.expose_secret())
        .await
        .context("Failed to connect to database")?;

    let store = Arc::new(PgIdentityStore::new(pool.clone()));
    let ownership = Arc::new(PgOwnership::new(pool));
    let manager = Arc::new(CredentialManager::new(store.clone(), ownership));

    // Background worker deletes expired rows from student_sessions.
    let _sweeper = sweeper::spawn_session_sweeper(store, config.session_sweep_interval());

    let frontend_origin = frontend_origin(config.frontend_base_url())?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_origin(AllowOrigin::exact(frontend_origin))
        .allow_credentials(true);

    let app = router(manager).layer(cors);

    let port = config.port();
    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontend_origin_drops_path_and_keeps_port() -> Result<()> {
        assert_eq!(
            frontend_origin("https://brightminds.app/classroom/login")?,
            "https://brightminds.app"
        );
        assert_eq!(
            frontend_origin("http://localhost:5173/")?,
            "http://localhost:5173"
        );
        assert!(frontend_origin("not a url").is_err());
        Ok(())
    }

    #[test]
    fn server_config_defaults_and_overrides() {
        let config = ServerConfig::new(8080, SecretString::from("postgres://localhost/db"));
        assert_eq!(config.db_max_connections(), DEFAULT_DB_MAX_CONNECTIONS);
        assert_eq!(config.frontend_base_url(), DEFAULT_FRONTEND_BASE_URL);
        assert_eq!(
            config.session_sweep_interval(),
            Duration::from_secs(DEFAULT_SESSION_SWEEP_SECONDS)
        );

        let config = config
            .with_db_max_connections(0)
            .with_frontend_base_url("http://localhost:5173")
            .with_session_sweep_interval(Duration::ZERO);
        assert_eq!(config.db_max_connections(), 1);
        assert_eq!(config.frontend_base_url(), "http://localhost:5173");
        assert!(config.session_sweep_interval().is_zero());
    }

    #[test]
    fn server_config_debug_hides_dsn() {
        let config = ServerConfig::new(8080, SecretString::from("postgres://u:hunter2@h/db"));
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
