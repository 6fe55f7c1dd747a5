//! End-to-end tests through `SessionManager`, using in-memory cookie carriers.
//!
//! Run with: `cargo test --test e2e_manager`

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::collections::HashMap;
use std::sync::Arc;

use enclave_session::{
    MemoryProvider, ProviderRegistry, SessionConfig, SessionCookie, SessionError, SessionManager,
    SigningKey,
};
use serde_json::json;

/// Turns the cookies a response set into the cookies the next request sends.
fn next_request(previous: HashMap<String, String>, response: &[SessionCookie]) -> HashMap<String, String> {
    let mut cookies = previous;
    for cookie in response {
        if cookie.is_removal() {
            cookies.remove(&cookie.name);
        } else {
            cookies.insert(cookie.name.clone(), cookie.value.clone());
        }
    }
    cookies
}

fn empty() -> HashMap<String, String> {
    HashMap::new()
}

fn sink() -> Vec<SessionCookie> {
    Vec::new()
}

fn manager(provider: &str) -> SessionManager {
    let registry = ProviderRegistry::with_builtin();
    SessionManager::new(&registry, provider, "sid", 3600).unwrap()
}

#[test]
fn memory_session_survives_across_requests() {
    let manager = manager("memory");

    let mut response: Vec<SessionCookie> = Vec::new();
    let mut session = manager.start(&empty(), &mut response).unwrap();
    assert_eq!(session.get("user").unwrap(), None);
    assert_eq!(response.len(), 1);
    assert_eq!(response[0].name, "sid");
    assert_eq!(response[0].value.len(), 64);

    session.set("user", json!("alice")).unwrap();
    session.finalize(&mut response).unwrap();

    let request = next_request(HashMap::new(), &response);
    let mut response: Vec<SessionCookie> = Vec::new();
    let session = manager.start(&request, &mut response).unwrap();

    assert_eq!(session.id(), request["sid"]);
    assert_eq!(session.get("user").unwrap(), Some(json!("alice")));
}

#[test]
fn cookie_session_survives_across_requests() {
    let manager = manager("cookie");

    let mut response: Vec<SessionCookie> = Vec::new();
    let mut session = manager.start(&empty(), &mut response).unwrap();
    session.set("a", json!(1)).unwrap();
    session.set("b", json!("x")).unwrap();
    session.finalize(&mut response).unwrap();

    // identifier cookie plus the payload cookie named after the identifier
    assert_eq!(response.len(), 2);
    assert_eq!(response[0].name, "sid");
    assert_eq!(response[1].name, response[0].value);

    let request = next_request(HashMap::new(), &response);
    let mut response: Vec<SessionCookie> = Vec::new();
    let session = manager.start(&request, &mut response).unwrap();

    assert_eq!(session.id(), request["sid"]);
    assert_eq!(session.get("a").unwrap(), Some(json!(1)));
    assert_eq!(session.get("b").unwrap(), Some(json!("x")));
}

#[test]
fn mangled_cookie_payload_starts_empty_session() {
    let manager = manager("cookie");

    let mut response: Vec<SessionCookie> = Vec::new();
    let mut session = manager.start(&empty(), &mut response).unwrap();
    session.set("a", json!(1)).unwrap();
    session.finalize(&mut response).unwrap();

    let mut request = next_request(HashMap::new(), &response);
    let sid = request["sid"].clone();
    request.insert(sid, "%%%garbage%%%".to_owned());

    let session = manager.start(&request, &mut sink()).unwrap();
    assert_eq!(session.get("a").unwrap(), None);
}

#[test]
fn strict_signed_cookie_rejects_tampering() {
    let config = SessionConfig {
        provider: "cookie".to_owned(),
        cookie_name: "sid".to_owned(),
        signing_key: Some(SigningKey::new("this-is-a-very-long-secret-key-for-testing")),
        ..SessionConfig::strict()
    };
    let registry = ProviderRegistry::from_config(&config);
    let manager = SessionManager::from_config(&registry, &config).unwrap();

    let mut response: Vec<SessionCookie> = Vec::new();
    let mut session = manager.start(&empty(), &mut response).unwrap();
    session.set("role", json!("user")).unwrap();
    session.finalize(&mut response).unwrap();

    let request = next_request(HashMap::new(), &response);
    assert!(manager.start(&request, &mut sink()).is_ok());

    let mut tampered = request.clone();
    let sid = request["sid"].clone();
    let value = tampered.get_mut(&sid).unwrap();
    let replacement = if value.starts_with('A') { "B" } else { "A" };
    value.replace_range(0..1, replacement);

    let result = manager.start(&tampered, &mut sink());
    assert!(matches!(result, Err(SessionError::CorruptCookie(_))));
}

#[test]
fn logout_clears_memory_session() {
    let manager = manager("memory");

    let mut response: Vec<SessionCookie> = Vec::new();
    let mut session = manager.start(&empty(), &mut response).unwrap();
    session.set("user", json!("alice")).unwrap();

    let request = next_request(HashMap::new(), &response);
    let mut response: Vec<SessionCookie> = Vec::new();
    manager.destroy(&request, &mut response).unwrap();

    let request = next_request(request, &response);
    assert!(request.is_empty());

    let mut response: Vec<SessionCookie> = Vec::new();
    let session = manager.start(&request, &mut response).unwrap();
    assert_eq!(session.get("user").unwrap(), None);
}

#[test]
fn logout_clears_cookie_session() {
    let manager = manager("cookie");

    let mut response: Vec<SessionCookie> = Vec::new();
    let mut session = manager.start(&empty(), &mut response).unwrap();
    session.set("user", json!("alice")).unwrap();
    session.finalize(&mut response).unwrap();

    let request = next_request(HashMap::new(), &response);
    assert_eq!(request.len(), 2);

    let mut response: Vec<SessionCookie> = Vec::new();
    manager.destroy(&request, &mut response).unwrap();
    assert!(next_request(request, &response).is_empty());
}

#[test]
fn custom_registration_isolates_stores() {
    let mut registry = ProviderRegistry::with_builtin();
    registry
        .register("admin", Arc::new(MemoryProvider::new()))
        .unwrap();

    let users = SessionManager::new(&registry, "memory", "sid", 60).unwrap();
    let admins = SessionManager::new(&registry, "admin", "admin_sid", 60).unwrap();

    let mut response: Vec<SessionCookie> = Vec::new();
    let mut session = users.start(&empty(), &mut response).unwrap();
    session.set("user", json!("alice")).unwrap();

    let request = HashMap::from([("admin_sid".to_owned(), response[0].value.clone())]);
    let session = admins.start(&request, &mut sink()).unwrap();
    assert_eq!(session.get("user").unwrap(), None);
}

#[test]
fn shared_manager_across_threads() {
    let manager = Arc::new(manager("memory"));

    let mut response: Vec<SessionCookie> = Vec::new();
    manager.start(&empty(), &mut response).unwrap();
    let request = next_request(HashMap::new(), &response);

    std::thread::scope(|scope| {
        for i in 0..8 {
            let manager = Arc::clone(&manager);
            let request = request.clone();
            scope.spawn(move || {
                let mut session = manager.start(&request, &mut sink()).unwrap();
                session.set(&format!("worker{i}"), json!(i)).unwrap();
            });
        }
    });

    let session = manager.start(&request, &mut sink()).unwrap();
    for i in 0..8 {
        assert_eq!(session.get(&format!("worker{i}")).unwrap(), Some(json!(i)));
    }
}
