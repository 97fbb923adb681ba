use async_trait::async_trait;
use hyper::service::{make_service_fn, service_fn};
use hyper::Server;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::instrument::WithSubscriber;
use tracing::{debug, error, info, instrument, warn};

use crate::browser::BrowserLauncher;
use crate::common::{Credentials, SamlData};
use crate::error::{AuthError, AuthResult};
use crate::saml::AssertionParser;
use service::CallbackService;

pub mod handlers;
mod service;

/// How long the callback page gets to reach the browser after the outcome
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Turns a parsed, in-window assertion into credentials
#[async_trait]
pub trait AssertionHandler: Send + Sync {
    async fn handle(&self, data: SamlData) -> AuthResult<Credentials>;
}

/// One-shot loopback HTTP endpoint receiving the identity provider's POST
pub struct CallbackEndpoint {
    port: u16,
    profile: String,
    parser: AssertionParser,
    launcher: Arc<dyn BrowserLauncher>,
}

impl CallbackEndpoint {
    pub fn new(
        port: u16,
        profile: impl Into<String>,
        parser: AssertionParser,
        launcher: Arc<dyn BrowserLauncher>,
    ) -> Self {
        Self {
            port,
            profile: profile.into(),
            parser,
            launcher,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], self.port))
    }

    /// Listen, send the user to `launch_url` and wait for the first POST.
    ///
    /// Returns whatever the first assertion POST produced; the listener is
    /// closed before returning.
    #[instrument(skip(self, handler), fields(port = self.port, profile = %self.profile))]
    pub async fn run(
        &self,
        launch_url: &str,
        handler: Arc<dyn AssertionHandler>,
    ) -> AuthResult<Credentials> {
        let addr = self.addr();
        let builder =
            Server::try_bind(&addr).map_err(|source| AuthError::ListenerBind { addr, source })?;

        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let service = CallbackService::new(
            self.profile.clone(),
            self.parser.clone(),
            handler,
            outcome_tx,
        );

        let make_svc = make_service_fn(move |_conn| {
            let service = service.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    let service = service.clone();
                    async move { service.handle_callback_request(req).await }
                }))
            }
        });

        let server = builder
            .serve(make_svc)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
        let server_handle = tokio::spawn(
            async move {
                if let Err(e) = server.await {
                    error!("Callback server error: {}", e);
                }
            }
            .with_current_subscriber(),
        );

        info!("Waiting for the SAML response on http://{}/", addr);
        self.launcher.open(launch_url);

        let outcome = outcome_rx.await.unwrap_or_else(|_| {
            Err(AuthError::server(
                "callback server stopped before a response arrived",
            ))
        });

        let _ = shutdown_tx.send(());
        match tokio::time::timeout(SHUTDOWN_GRACE, server_handle).await {
            Ok(Ok(())) => debug!("Callback server stopped"),
            Ok(Err(e)) => warn!("Callback server task failed: {}", e),
            Err(_) => warn!("Callback server did not stop within {:?}", SHUTDOWN_GRACE),
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::saml::parser::tests::AUDIENCE;
    use hyper::{Body, Client, Method, Request, StatusCode};
    use std::net::TcpListener;
    use std::sync::Mutex;

    struct UnusedHandler;

    #[async_trait]
    impl AssertionHandler for UnusedHandler {
        async fn handle(&self, _data: SamlData) -> AuthResult<Credentials> {
            Err(AuthError::server("not expected"))
        }
    }

    /// Posts a fixed form body to the callback once the browser "opens"
    struct PostingLauncher {
        addr: SocketAddr,
        body: String,
        opened: Mutex<Vec<String>>,
        statuses: Arc<Mutex<Vec<StatusCode>>>,
    }

    impl BrowserLauncher for PostingLauncher {
        fn open(&self, url: &str) {
            self.opened.lock().unwrap().push(url.to_string());
            let uri = format!("http://{}/", self.addr);
            let body = self.body.clone();
            let statuses = self.statuses.clone();
            tokio::spawn(async move {
                let req = Request::builder()
                    .method(Method::POST)
                    .uri(uri)
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body(Body::from(body))
                    .unwrap();
                let response = Client::new().request(req).await.unwrap();
                statuses.lock().unwrap().push(response.status());
            });
        }
    }

    fn free_port() -> u16 {
        TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    #[tokio::test]
    async fn test_run_reports_bad_callback_and_closes_listener() {
        let port = free_port();
        let statuses = Arc::new(Mutex::new(Vec::new()));
        let launcher = Arc::new(PostingLauncher {
            addr: SocketAddr::from(([127, 0, 0, 1], port)),
            body: "RelayState=x".to_string(),
            opened: Mutex::new(Vec::new()),
            statuses: statuses.clone(),
        });
        let endpoint = CallbackEndpoint::new(port, "dev", AssertionParser::new(AUDIENCE), launcher.clone());

        let err = endpoint
            .run("https://idp.example.com/sso", Arc::new(UnusedHandler))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::BadCallback { .. }));
        assert_eq!(
            launcher.opened.lock().unwrap().as_slice(),
            ["https://idp.example.com/sso".to_string()]
        );
        for _ in 0..50 {
            if !statuses.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(statuses.lock().unwrap().as_slice(), [StatusCode::BAD_REQUEST]);
        assert!(TcpListener::bind(("127.0.0.1", port)).is_ok());
    }

    #[tokio::test]
    async fn test_run_fails_when_port_is_taken() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();
        let statuses = Arc::new(Mutex::new(Vec::new()));
        let launcher = Arc::new(PostingLauncher {
            addr: SocketAddr::from(([127, 0, 0, 1], port)),
            body: String::new(),
            opened: Mutex::new(Vec::new()),
            statuses,
        });
        let endpoint = CallbackEndpoint::new(port, "dev", AssertionParser::new(AUDIENCE), launcher.clone());

        let err = endpoint
            .run("https://idp.example.com/sso", Arc::new(UnusedHandler))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::ListenerBind { .. }));
        assert!(launcher.opened.lock().unwrap().is_empty());
    }
}
