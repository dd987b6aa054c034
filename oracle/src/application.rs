use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};

use adapter::prelude::*;
use axum::{Extension, Router, Server};
use primitives::{
    chain::ChainReader,
    config::Environment,
    storage::{ContentStore, NamingService},
};
use serde::Deserialize;
use slog::{error, info, Logger};
use tower_http::cors::CorsLayer;

/// an error used when deserializing a [`Config`] instance from environment variables
/// see [`Config::from_env()`]
pub use envy::Error as EnvError;

use crate::{routes::channel_router, Oracle};

pub const DEFAULT_PORT: u16 = 8005;
pub const DEFAULT_IP_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0));

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Config {
    /// Defaults to `Development`: [`Environment::default()`]
    #[serde(default)]
    pub env: Environment,
    /// The port on which the Oracle REST API will be accessible.
    #[serde(default = "default_port")]
    /// Defaults to `8005`: [`DEFAULT_PORT`]
    pub port: u16,
    /// The address on which the Oracle REST API will be accessible.
    /// `0.0.0.0` can be used for Docker.
    /// `127.0.0.1` can be used for locally running servers.
    #[serde(default = "default_ip_addr")]
    /// Defaults to `0.0.0.0`: [`DEFAULT_IP_ADDR`]
    pub ip_addr: IpAddr,
}

impl Config {
    /// Deserialize the application [`Config`] from Environment variables.
    pub fn from_env() -> Result<Self, EnvError> {
        envy::from_env()
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip_addr, self.port)
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_ip_addr() -> IpAddr {
    DEFAULT_IP_ADDR
}

/// The Oracle REST API application.
pub struct Application<C: Unlocked, S, N, R> {
    oracle: Arc<Oracle<C, S, N, R>>,
    logger: Logger,
}

impl<C, S, N, R> Application<C, S, N, R>
where
    C: Unlocked + 'static,
    S: ContentStore + 'static,
    N: NamingService + 'static,
    R: ChainReader + 'static,
{
    pub fn new(oracle: Oracle<C, S, N, R>, logger: Logger) -> Self {
        Self {
            oracle: Arc::new(oracle),
            logger,
        }
    }

    pub fn oracle(&self) -> &Arc<Oracle<C, S, N, R>> {
        &self.oracle
    }

    pub fn routes(&self) -> Router {
        Router::new()
            .nest("/v1/channel", channel_router::<C, S, N, R>())
            .layer(Extension(self.oracle.clone()))
            .layer(CorsLayer::permissive())
    }

    /// Starts the `axum` `Server` and serves until `Ctrl+C` is received.
    pub async fn run(self, socket_addr: SocketAddr) {
        let logger = self.logger.clone();
        info!(&logger, "Listening on socket address: {}!", socket_addr; "oracle" => %self.oracle.whoami());

        let server = Server::bind(&socket_addr)
            .serve(self.routes().into_make_service())
            .with_graceful_shutdown(shutdown_signal(logger.clone()));

        if let Err(e) = server.await {
            error!(&logger, "server error: {}", e; "main" => "run");
        }
    }
}

async fn shutdown_signal(logger: Logger) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!(&logger, "Shutting down"),
        Err(err) => error!(&logger, "Listening for the shutdown signal: {}", err),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::setup_oracle;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use pretty_assertions::assert_eq;
    use primitives::util::logging::discard_logger;
    use serde_json::json;
    use tower::ServiceExt;

    #[test]
    fn environment() {
        let development = serde_json::from_value::<Environment>(json!("development"))
            .expect("Should deserialize");
        let production =
            serde_json::from_value::<Environment>(json!("production")).expect("Should deserialize");

        assert_eq!(Environment::Development, development);
        assert_eq!(Environment::Production, production);
    }

    #[test]
    fn config_from_environment_variables() {
        let defaults: Config = envy::from_iter(Vec::<(String, String)>::new())
            .expect("Should use the defaults");
        assert_eq!(
            Config {
                env: Environment::Development,
                port: DEFAULT_PORT,
                ip_addr: DEFAULT_IP_ADDR,
            },
            defaults
        );

        let config: Config = envy::from_iter(vec![
            ("ENV".to_string(), "production".to_string()),
            ("PORT".to_string(), "9000".to_string()),
            ("IP_ADDR".to_string(), "127.0.0.1".to_string()),
        ])
        .expect("Should deserialize");
        assert_eq!(Environment::Production, config.env);
        assert_eq!(SocketAddr::from(([127, 0, 0, 1], 9000)), config.socket_addr());

        assert!(envy::from_iter::<_, Config>(vec![(
            "PORT".to_string(),
            "not a port".to_string()
        )])
        .is_err());
    }

    #[tokio::test]
    async fn routes_are_nested_under_the_api_version() {
        let setup = setup_oracle();
        let oracle = Arc::try_unwrap(setup.oracle).ok().expect("Single owner");
        let application = Application::new(oracle, discard_logger());

        let response = application
            .routes()
            .oneshot(
                Request::get("/v1/channel/c1/state")
                    .body(Body::empty())
                    .expect("Should build Request"),
            )
            .await
            .expect("Should respond");
        assert_eq!(StatusCode::NOT_FOUND, response.status());
        assert_eq!(
            Some("application/json"),
            response
                .headers()
                .get("content-type")
                .and_then(|value| value.to_str().ok())
        );

        let response = application
            .routes()
            .oneshot(
                Request::get("/channel/c1/state")
                    .body(Body::empty())
                    .expect("Should build Request"),
            )
            .await
            .expect("Should respond");
        assert_eq!(StatusCode::NOT_FOUND, response.status());
    }
}
