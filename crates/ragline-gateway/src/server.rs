use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;

use crate::error::{AnswerError, GatewayError};
use crate::router::{RouterSettings, build_router};

pub type AnswerFuture<'a> = Pin<Box<dyn Future<Output = Result<String, AnswerError>> + Send + 'a>>;

/// Produces the answer returned by `POST /ask`.
pub trait AnswerService: Send + Sync {
    fn answer<'a>(&'a self, question: &'a str) -> AnswerFuture<'a>;
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub answer: Arc<dyn AnswerService>,
    pub started_at: Instant,
}

pub struct GatewayServer {
    addr: SocketAddr,
    auth_token: Option<String>,
    rate_limit: u32,
    max_body_size: usize,
    allowed_origins: Vec<String>,
    answer: Arc<dyn AnswerService>,
    shutdown_rx: watch::Receiver<bool>,
}

impl GatewayServer {
    #[must_use]
    pub fn new(
        bind: &str,
        port: u16,
        answer: Arc<dyn AnswerService>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let addr: SocketAddr = format!("{bind}:{port}").parse().unwrap_or_else(|e| {
            tracing::warn!("invalid bind '{bind}': {e}, falling back to 127.0.0.1:{port}");
            SocketAddr::from(([127, 0, 0, 1], port))
        });

        if bind == "0.0.0.0" {
            tracing::warn!("gateway binding to 0.0.0.0, reachable from other hosts");
        }

        Self {
            addr,
            auth_token: None,
            rate_limit: 60,
            max_body_size: 64 * 1024,
            allowed_origins: vec![
                "http://localhost:5173".into(),
                "http://127.0.0.1:5173".into(),
            ],
            answer,
            shutdown_rx,
        }
    }

    #[must_use]
    pub fn with_auth(mut self, token: Option<String>) -> Self {
        self.auth_token = token;
        self
    }

    #[must_use]
    pub fn with_rate_limit(mut self, limit: u32) -> Self {
        self.rate_limit = limit;
        self
    }

    #[must_use]
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    #[must_use]
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = origins;
        self
    }

    /// Start the HTTP gateway server.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or encounters a fatal I/O error.
    pub async fn serve(self) -> Result<(), GatewayError> {
        let state = AppState {
            answer: self.answer,
            started_at: Instant::now(),
        };

        let router = build_router(
            state,
            RouterSettings {
                auth_token: self.auth_token,
                rate_limit: self.rate_limit,
                max_body_size: self.max_body_size,
                allowed_origins: self.allowed_origins,
            },
        );

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| GatewayError::Bind(self.addr.to_string(), e))?;
        tracing::info!("gateway listening on http://{}", self.addr);

        let mut shutdown_rx = self.shutdown_rx;
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            while !*shutdown_rx.borrow_and_update() {
                if shutdown_rx.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
            tracing::info!("gateway shutting down");
        })
        .await
        .map_err(|e| GatewayError::Server(format!("{e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl AnswerService for Echo {
        fn answer<'a>(&'a self, question: &'a str) -> AnswerFuture<'a> {
            Box::pin(async move { Ok(question.to_owned()) })
        }
    }

    #[test]
    fn server_builder_chain() {
        let (_stx, srx) = watch::channel(false);
        let server = GatewayServer::new("127.0.0.1", 8000, Arc::new(Echo), srx)
            .with_auth(Some("token".into()))
            .with_rate_limit(10)
            .with_max_body_size(512)
            .with_allowed_origins(vec!["https://app.example".into()]);

        assert_eq!(server.rate_limit, 10);
        assert_eq!(server.max_body_size, 512);
        assert!(server.auth_token.is_some());
        assert_eq!(server.allowed_origins, vec!["https://app.example"]);
    }

    #[test]
    fn server_defaults() {
        let (_stx, srx) = watch::channel(false);
        let server = GatewayServer::new("127.0.0.1", 8000, Arc::new(Echo), srx);
        assert_eq!(server.rate_limit, 60);
        assert_eq!(server.max_body_size, 65536);
        assert_eq!(server.allowed_origins.len(), 2);
        assert!(server.auth_token.is_none());
    }

    #[test]
    fn server_invalid_bind_fallback() {
        let (_stx, srx) = watch::channel(false);
        let server = GatewayServer::new("not_an_ip", 9999, Arc::new(Echo), srx);
        assert_eq!(server.addr, SocketAddr::from(([127, 0, 0, 1], 9999)));
    }

    #[tokio::test]
    async fn serve_stops_on_shutdown_signal() {
        let (stx, srx) = watch::channel(false);
        let server = GatewayServer::new("127.0.0.1", 0, Arc::new(Echo), srx);
        let handle = tokio::spawn(server.serve());
        stx.send(true).unwrap();
        let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("server did not stop")
            .unwrap();
        assert!(result.is_ok());
    }
}
