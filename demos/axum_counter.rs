//! Visit counter backed by sessions.
//!
//! ```bash
//! SESSION_PROVIDER=cookie RUST_LOG=debug cargo run --example axum_counter --features axum
//! curl -c jar -b jar http://127.0.0.1:3000/
//! ```

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use enclave_session::{ProviderRegistry, SessionConfig, SessionError, SessionManager};
use serde_json::json;

fn internal(e: SessionError) -> StatusCode {
    log::error!(target: "axum_counter", "msg=\"session error\" error=\"{e}\"");
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn visit(
    State(manager): State<Arc<SessionManager>>,
    headers: HeaderMap,
) -> Result<(HeaderMap, String), StatusCode> {
    let mut cookies = HeaderMap::new();
    let mut session = manager.start(&headers, &mut cookies).map_err(internal)?;

    let visits = session
        .get("visits")
        .map_err(internal)?
        .and_then(|v| v.as_i64())
        .unwrap_or(0)
        + 1;
    session.set("visits", json!(visits)).map_err(internal)?;
    // must run before the body is produced, the cookie backend writes here
    session.finalize(&mut cookies).map_err(internal)?;

    Ok((cookies, format!("visit #{visits}\n")))
}

async fn logout(
    State(manager): State<Arc<SessionManager>>,
    headers: HeaderMap,
) -> Result<(HeaderMap, StatusCode), StatusCode> {
    let mut cookies = HeaderMap::new();
    manager.destroy(&headers, &mut cookies).map_err(internal)?;
    Ok((cookies, StatusCode::NO_CONTENT))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = SessionConfig {
        provider: std::env::var("SESSION_PROVIDER").unwrap_or_else(|_| "memory".to_owned()),
        ..SessionConfig::development()
    };
    let registry = ProviderRegistry::from_config(&config);
    let manager = Arc::new(SessionManager::from_config(&registry, &config)?);

    let app = Router::new()
        .route("/", get(visit))
        .route("/logout", post(logout))
        .with_state(Arc::clone(&manager));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
    log::info!(target: "axum_counter", "msg=\"listening\" addr=\"127.0.0.1:3000\" provider=\"{}\"", manager.provider_name());

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    manager.shutdown();
    Ok(())
}
