//! Axum server setup and router configuration.

use crate::api::{admin, webhook};
use crate::shutdown::shutdown_signal;
use crate::state::AppState;
use axum::{Json, Router, response::IntoResponse, routing::get};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Build the main application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(webhook::router())
        .merge(admin::router())
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Simple health check - returns OK if the server is running.
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Run the server with graceful shutdown support.
///
/// Peer addresses are attached to every request for the webhook allowlist.
pub async fn run_server(router: Router, addr: SocketAddr) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use rust_decimal_macros::dec;
    use serde_json::{Value, json};
    use sigrelay_core::actions::{ActionContext, ActionError, ActionExecutor};
    use sigrelay_core::config::{
        AdminConfig, ExchangeConfig, SecurityConfig, ServerConfig, SharedConfig,
    };
    use sigrelay_core::events::PlainEvent;
    use sigrelay_core::exchange::{ExchangeClient, ExchangeError};
    use sigrelay_core::logs::LogStore;
    use sigrelay_core::registry::{ComponentCatalog, RegisterManager, RegistrationPlan};
    use sigrelay_core::secret::ProcessSecret;
    use sigrelay_sdk::ADMIN_AUTH_HEADER;
    use sigrelay_sdk::objects::{AccountSummary, Order, Position, SymbolRules};
    use std::net::IpAddr;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;
    use url::Url;

    struct NotifyAction {
        runs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ActionExecutor for NotifyAction {
        async fn execute(&self, ctx: &ActionContext<'_>) -> Result<Value, ActionError> {
            let data = ctx.validate_data()?;
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(json!({ "notified": data.get("message") }))
        }
    }

    /// Has no credentials for anything but the account summary.
    struct StubExchange;

    #[async_trait]
    impl ExchangeClient for StubExchange {
        async fn server_time(&self) -> Result<i64, ExchangeError> {
            Ok(0)
        }

        async fn symbol_rules(&self, _symbol: &str) -> Result<SymbolRules, ExchangeError> {
            Err(ExchangeError::MissingCredentials)
        }

        async fn place_order(&self, _order: &Order) -> Result<Order, ExchangeError> {
            Err(ExchangeError::MissingCredentials)
        }

        async fn account_summary(&self) -> Result<AccountSummary, ExchangeError> {
            Ok(AccountSummary {
                environment: "testnet".to_string(),
                wallet_balance: dec!(1000),
                unrealized_pnl: dec!(0),
                margin_balance: dec!(1000),
                available_balance: dec!(900),
                initial_margin: dec!(100),
            })
        }

        async fn open_positions(&self) -> Result<Vec<Position>, ExchangeError> {
            Err(ExchangeError::MissingCredentials)
        }
    }

    struct TestApp {
        router: Router,
        state: AppState,
        runs: Arc<AtomicUsize>,
    }

    impl TestApp {
        fn key(&self) -> String {
            self.state
                .registry
                .events()
                .get("PriceAlert")
                .unwrap()
                .key()
                .to_string()
        }

        async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            (status, body.to_vec())
        }

        async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
            let request = Request::get(uri).body(Body::empty()).unwrap();
            let (status, body) = self.send(request).await;
            (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
        }

        async fn post_webhook(&self, body: impl Into<Body>) -> (StatusCode, Value) {
            let request = Request::post("/webhook").body(body.into()).unwrap();
            let (status, body) = self.send(request).await;
            (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
        }
    }

    fn test_app(admin_secret: Option<&str>, allowed_ips: Vec<IpAddr>) -> TestApp {
        let runs = Arc::new(AtomicUsize::new(0));
        let action_runs = runs.clone();
        let catalog = ComponentCatalog::builtin()
            .with_action("NotifyAction", move |_| {
                Ok(Box::new(NotifyAction {
                    runs: action_runs.clone(),
                }))
            })
            .with_event("PriceAlert", || Box::new(PlainEvent));

        let exchange: Arc<dyn ExchangeClient> = Arc::new(StubExchange);
        let mut manager = RegisterManager::new(
            catalog,
            ProcessSecret::new("router-test"),
            LogStore::in_memory(100),
        )
        .with_exchange(exchange.clone());
        manager
            .apply(RegistrationPlan {
                actions: vec!["NotifyAction".to_string()],
                events: vec!["PriceAlert".to_string()],
                links: vec![("NotifyAction".to_string(), "PriceAlert".to_string())],
                ..Default::default()
            })
            .unwrap();

        let admin_hash = admin_secret.map(|s| crate::config::hash_secret(s).unwrap());
        let config = SharedConfig::new(
            ServerConfig {
                listen: "127.0.0.1:5000".parse().unwrap(),
                public_url: Some(Url::parse("https://relay.example.com/").unwrap()),
            },
            AdminConfig::new(admin_hash),
            SecurityConfig {
                allowed_ips,
                trust_forwarded_for: true,
            },
            ExchangeConfig::default(),
        );

        let state = AppState::new(Arc::new(manager.into_registry()), config, exchange);
        TestApp {
            router: build_router(state.clone()),
            state,
            runs,
        }
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app(None, vec![]);
        let (status, body) = app.get_json("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_webhook_with_matching_key_runs_linked_action() {
        let app = test_app(None, vec![]);
        let payload = json!({ "key": app.key(), "message": "BTC crossed 100k" });

        let (status, body) = app.post_webhook(payload.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["triggered"][0]["event"], "PriceAlert");
        assert_eq!(body["triggered"][0]["status"], "success");
        assert_eq!(body["triggered"][0]["completed_actions"], json!(["NotifyAction"]));
        assert_eq!(app.runs.load(Ordering::SeqCst), 1);

        let stats = app.state.registry.events().stats("PriceAlert").unwrap();
        assert_eq!(stats.trigger_count, 1);
        assert_eq!(stats.success_count, 1);
    }

    #[tokio::test]
    async fn test_webhook_with_wrong_key_runs_nothing() {
        let app = test_app(None, vec![]);
        let payload = json!({ "key": "not-a-key", "message": "ignored" });

        let (status, body) = app.post_webhook(payload.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["triggered"], json!([]));
        assert_eq!(app.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_webhook_rejects_malformed_payloads() {
        let app = test_app(None, vec![]);

        let (status, _) = app.post_webhook("{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app.post_webhook("[1, 2, 3]").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app.post_webhook(json!({ "message": "no key" }).to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert_eq!(app.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_deactivated_event_is_skipped() {
        let app = test_app(None, vec![]);

        let request = Request::post("/event/active?event=PriceAlert&active=false")
            .body(Body::empty())
            .unwrap();
        let (status, body) = app.send(request).await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!({ "event": "PriceAlert", "active": false }));

        let payload = json!({ "key": app.key(), "message": "ignored" });
        let (status, body) = app.post_webhook(payload.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["triggered"][0]["status"], "skipped");
        assert_eq!(app.runs.load(Ordering::SeqCst), 0);

        let request = Request::post("/event/active?event=PriceAlert&active=true")
            .body(Body::empty())
            .unwrap();
        let (status, _) = app.send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(app.state.registry.events().get("PriceAlert").unwrap().is_active());
    }

    #[tokio::test]
    async fn test_unknown_event_is_not_found() {
        let app = test_app(None, vec![]);

        let (status, _) = app.get_json("/events/Missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let request = Request::post("/event/active?event=Missing&active=true")
            .body(Body::empty())
            .unwrap();
        let (status, _) = app.send(request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_admin_endpoints_require_secret() {
        let app = test_app(Some("hunter2"), vec![]);

        let (status, _) = app.get_json("/events").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let request = Request::get("/events")
            .header(ADMIN_AUTH_HEADER, "wrong")
            .body(Body::empty())
            .unwrap();
        let (status, _) = app.send(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let request = Request::get("/events")
            .header(ADMIN_AUTH_HEADER, "hunter2")
            .body(Body::empty())
            .unwrap();
        let (status, body) = app.send(request).await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body[0]["name"], "PriceAlert");
        assert_eq!(body[0]["key"], app.key());
        assert_eq!(body[0]["webhook_url"], "https://relay.example.com/webhook");
        assert_eq!(body[0]["actions"], json!(["NotifyAction"]));

        // The webhook itself is authenticated by its key, not the admin secret.
        let payload = json!({ "key": app.key(), "message": "hi" });
        let (status, _) = app.post_webhook(payload.to_string()).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_dashboard_and_introspection() {
        let app = test_app(None, vec![]);

        let (status, body) = app.get_json("/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(body["log_limit"], 100);
        assert_eq!(body["actions"][0]["name"], "NotifyAction");

        let (_, body) = app.get_json("/registration").await;
        assert_eq!(body["actions"], json!(["NotifyAction"]));
        assert_eq!(body["dependencies"]["PriceAlert"], json!(["NotifyAction"]));

        let (_, body) = app.get_json("/components/NotifyAction").await;
        assert_eq!(body["type"], "action");
        assert_eq!(body["linked_events"], json!(["PriceAlert"]));

        let (_, body) = app.get_json("/components/PriceAlert").await;
        assert_eq!(body["type"], "event");
        assert_eq!(body["active"], true);

        let (status, body) = app.get_json("/components/Nope").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], "unknown");
        assert_eq!(body["registered"], false);
    }

    #[tokio::test]
    async fn test_logs_query_export_and_clear() {
        let app = test_app(None, vec![]);
        let payload = json!({ "key": app.key(), "message": "hi" });
        app.post_webhook(payload.to_string()).await;

        let (status, body) = app.get_json("/logs?category=API").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["parent"], "Webhook");
        assert_eq!(body[0]["event_type"], "webhook_received");

        let (_, body) = app.get_json("/logs?parent=NotifyAction&limit=1").await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["category"], "ACTION");

        let request = Request::get("/logs/export?format=csv")
            .body(Body::empty())
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let csv = String::from_utf8(body.to_vec()).unwrap();
        assert!(csv.starts_with("parent,level,category,event_type,event_time,event_data\n"));
        assert!(csv.contains("webhook_received"));

        let request = Request::delete("/logs").body(Body::empty()).unwrap();
        let (status, _) = app.send(request).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, body) = app.get_json("/logs").await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_exchange_endpoints() {
        let app = test_app(None, vec![]);

        let (status, body) = app.get_json("/exchange/account").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["environment"], "testnet");

        let (status, _) = app.get_json("/exchange/positions").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_webhook_source_allowlist() {
        let app = test_app(None, vec!["52.89.214.238".parse().unwrap()]);
        let payload = json!({ "key": app.key(), "message": "hi" }).to_string();

        let request = Request::post("/webhook")
            .header("x-forwarded-for", "203.0.113.9")
            .body(Body::from(payload.clone()))
            .unwrap();
        let (status, _) = app.send(request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // No peer address and no forwarded header.
        let (status, _) = app.post_webhook(payload.clone()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(app.runs.load(Ordering::SeqCst), 0);

        let request = Request::post("/webhook")
            .header("x-forwarded-for", "52.89.214.238, 10.0.0.1")
            .body(Body::from(payload))
            .unwrap();
        let (status, _) = app.send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(app.runs.load(Ordering::SeqCst), 1);
    }
}
