use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use configs::StoreConfig;
use reqwest::StatusCode as HttpStatusCode;
use serde_json::{json, Value};
use service::store::{MemoryStore, StoreError};
use service::EntryStoreUpdater;
use tokio::net::TcpListener;

use server::routes::{self, LEGACY_SAVE_ENTRY_PATH, SAVE_ENTRY_PATH};
use server::startup::build_cors;
use server::AppState;

struct TestApp {
    base_url: String,
    store: Arc<MemoryStore>,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn complete_config() -> StoreConfig {
    StoreConfig {
        token: Some("test-token".into()),
        repo: Some("acme/board".into()),
        file_path: Some("data/entries.json".into()),
        ..StoreConfig::default()
    }
}

async fn start_server_with(store: MemoryStore, store_config: StoreConfig) -> anyhow::Result<TestApp> {
    let store = Arc::new(store);
    let updater = EntryStoreUpdater::new(store.clone(), "tests");
    let state = AppState::new(store_config, updater);

    let app: Router = routes::build_router(state, build_cors());
    let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
    let addr: SocketAddr = listener.local_addr()?;
    let base_url = format!("http://{}:{}", addr.ip(), addr.port());

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await { eprintln!("server error: {}", e); }
    });

    Ok(TestApp { base_url, store })
}

async fn start_server(initial: &str) -> anyhow::Result<TestApp> {
    start_server_with(MemoryStore::with_content(initial), complete_config()).await
}

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

#[tokio::test]
async fn e2e_public_health() -> anyhow::Result<()> {
    let app = start_server("{}").await?;
    let res = client().get(app.url("/health")).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn e2e_upsert_then_delete_scenario() -> anyhow::Result<()> {
    let app = start_server(r#"{"entries":[{"id":"7"}]}"#).await?;
    let c = client();

    let res = c
        .post(app.url(SAVE_ENTRY_PATH))
        .json(&json!({"action": "upsert", "entry": {"id": "42", "name": "Alice"}}))
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    assert_eq!(res.headers()["access-control-allow-origin"], "*");
    assert_eq!(res.json::<Value>().await?, json!({"ok": true, "action": "upsert"}));
    assert_eq!(
        app.store.content_json(),
        Some(json!({"entries": [{"id": "7"}, {"id": "42", "name": "Alice"}]}))
    );

    let res = c
        .post(app.url(SAVE_ENTRY_PATH))
        .json(&json!({"action": "delete", "id": "7"}))
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    assert_eq!(res.json::<Value>().await?, json!({"ok": true, "action": "delete"}));
    assert_eq!(app.store.content_json(), Some(json!({"entries": [{"id": "42", "name": "Alice"}]})));
    Ok(())
}

#[tokio::test]
async fn e2e_legacy_function_path_and_default_action() -> anyhow::Result<()> {
    let app = start_server(r#"[{"id":1}]"#).await?;
    let res = client()
        .post(app.url(LEGACY_SAVE_ENTRY_PATH))
        .body(r#"{"entry":{"id":1,"done":true}}"#)
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    assert_eq!(res.json::<Value>().await?["action"], "upsert");
    assert_eq!(app.store.content_json(), Some(json!({"entries": [{"id": 1, "done": true}]})));
    Ok(())
}

#[tokio::test]
async fn e2e_preflight_is_answered_with_cors_headers() -> anyhow::Result<()> {
    let app = start_server("{}").await?;
    let res = client()
        .request(reqwest::Method::OPTIONS, app.url(SAVE_ENTRY_PATH))
        .header("Origin", "https://board.example.com")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "content-type")
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let headers = res.headers();
    assert_eq!(headers["access-control-allow-origin"], "*");
    let methods = headers["access-control-allow-methods"].to_str()?.to_ascii_uppercase();
    assert!(methods.contains("POST") && methods.contains("OPTIONS"), "{methods}");
    let allowed = headers["access-control-allow-headers"].to_str()?.to_ascii_lowercase();
    assert!(allowed.contains("content-type"), "{allowed}");
    assert!(res.text().await?.is_empty());
    assert_eq!(app.store.read_count(), 0);
    Ok(())
}

#[tokio::test]
async fn e2e_plain_options_gets_empty_success() -> anyhow::Result<()> {
    let app = start_server("{}").await?;
    let res = client().request(reqwest::Method::OPTIONS, app.url(SAVE_ENTRY_PATH)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    assert_eq!(res.headers()["access-control-allow-origin"], "*");
    assert!(res.text().await?.is_empty());
    assert_eq!(app.store.read_count(), 0);
    Ok(())
}

#[tokio::test]
async fn e2e_other_methods_are_not_allowed() -> anyhow::Result<()> {
    let app = start_server("{}").await?;
    for method in [reqwest::Method::GET, reqwest::Method::PUT, reqwest::Method::DELETE] {
        let res = client().request(method.clone(), app.url(SAVE_ENTRY_PATH)).send().await?;
        assert_eq!(res.status(), HttpStatusCode::METHOD_NOT_ALLOWED, "{method}");
        assert_eq!(res.text().await?, "Method Not Allowed");
    }
    assert_eq!(app.store.read_count(), 0);
    Ok(())
}

#[tokio::test]
async fn e2e_validation_failures_never_touch_the_store() -> anyhow::Result<()> {
    let app = start_server(r#"{"entries":[{"id":"7"}]}"#).await?;
    let c = client();
    let cases = [
        (r#"{"action":"upsert","entry":{"name":"no id"}}"#, "Missing entry or entry.id"),
        ("", "Missing entry or entry.id"),
        (r#"{"action":"delete"}"#, "Missing id for delete"),
        ("{broken", "Invalid JSON body"),
    ];
    for (body, message) in cases {
        let res = c.post(app.url(SAVE_ENTRY_PATH)).body(body).send().await?;
        assert_eq!(res.status(), HttpStatusCode::BAD_REQUEST, "{body}");
        assert_eq!(res.text().await?, message);
    }
    assert_eq!(app.store.read_count(), 0);
    assert_eq!(app.store.write_count(), 0);
    Ok(())
}

#[tokio::test]
async fn e2e_missing_configuration_fails_before_network() -> anyhow::Result<()> {
    let mut cfg = complete_config();
    cfg.token = None;
    let app = start_server_with(MemoryStore::with_content("{}"), cfg).await?;

    let res = client()
        .post(app.url(SAVE_ENTRY_PATH))
        .json(&json!({"entry": {"id": "1"}}))
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.text().await?, "Missing GitHub configuration");
    assert_eq!(app.store.read_count(), 0);
    Ok(())
}

#[tokio::test]
async fn e2e_upstream_read_failure_surfaces_body() -> anyhow::Result<()> {
    let app = start_server("{}").await?;
    app.store.fail_next_read(StoreError::Rejected { status: 404, body: r#"{"message":"Not Found"}"#.into() });

    let res = client()
        .post(app.url(SAVE_ENTRY_PATH))
        .json(&json!({"entry": {"id": "1"}}))
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::BAD_GATEWAY);
    assert_eq!(res.text().await?, r#"Error reading file from GitHub: {"message":"Not Found"}"#);
    assert_eq!(app.store.write_count(), 0);
    Ok(())
}

#[tokio::test]
async fn e2e_concurrent_writer_conflict_is_not_retried() -> anyhow::Result<()> {
    let app = start_server(r#"{"entries":[]}"#).await?;
    app.store.interleave_write_after_next_read(r#"{"entries":[{"id":"theirs"}]}"#);

    let res = client()
        .post(app.url(SAVE_ENTRY_PATH))
        .json(&json!({"entry": {"id": "mine"}}))
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::CONFLICT);
    assert!(res.text().await?.starts_with("Error writing file to GitHub: "));
    assert_eq!(app.store.read_count(), 1);
    assert_eq!(app.store.content_json(), Some(json!({"entries": [{"id": "theirs"}]})));

    // the caller retries the whole cycle
    let res = client()
        .post(app.url(SAVE_ENTRY_PATH))
        .json(&json!({"entry": {"id": "mine"}}))
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    assert_eq!(
        app.store.content_json(),
        Some(json!({"entries": [{"id": "theirs"}, {"id": "mine"}]}))
    );
    Ok(())
}

#[tokio::test]
async fn e2e_metrics_count_saves() -> anyhow::Result<()> {
    let app = start_server("{}").await?;
    let c = client();
    c.post(app.url(SAVE_ENTRY_PATH)).json(&json!({"entry": {"id": "m"}})).send().await?;

    let res = c.get(app.url("/metrics")).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let text = res.text().await?;
    assert!(text.contains("entry_store_saves_total"), "{text}");
    assert!(text.contains("entry_store_save_duration_seconds"), "{text}");
    Ok(())
}

#[tokio::test]
async fn e2e_openapi_document_lists_save_entry() -> anyhow::Result<()> {
    let app = start_server("{}").await?;
    let doc = client().get(app.url("/openapi.json")).send().await?.json::<Value>().await?;
    assert!(doc["paths"].get("/save-entry").is_some());
    Ok(())
}
