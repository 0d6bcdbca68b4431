use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue, Method};
use axum_test::TestServer;
use chrono::Utc;
use devpulse_ai::{GenerationConfig, LLMError, LLMProvider, LLMResponse, LLMResult, Message};
use devpulse_api::{create_router, AppState};
use devpulse_core::{Commit, PulseConfig, Repository, Workflow};
use devpulse_store::MemoryStore;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Returns `reply` when set, otherwise HTTP 503.
struct FixedProvider {
    reply: Option<String>,
    delay: Duration,
    calls: AtomicUsize,
}

impl FixedProvider {
    fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    fn unavailable() -> Self {
        Self {
            reply: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl LLMProvider for FixedProvider {
    async fn generate_chat(
        &self,
        _messages: &[Message],
        _config: &GenerationConfig,
    ) -> LLMResult<LLMResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.reply {
            Some(content) => Ok(LLMResponse {
                content: content.clone(),
                total_tokens: None,
                finish_reason: Some("stop".into()),
                model: "fixed".into(),
            }),
            None => Err(LLMError::Http {
                provider: "fixed".into(),
                status: 503,
                body: "model offline".into(),
            }),
        }
    }

    fn provider_name(&self) -> &str {
        "fixed"
    }

    fn model_name(&self) -> &str {
        "fixed"
    }
}

fn test_config() -> PulseConfig {
    let mut config = PulseConfig::default();
    config.pipeline.batch_delay_ms = 0;
    config
}

fn server_with(store: Arc<MemoryStore>, provider: Arc<FixedProvider>, config: PulseConfig) -> TestServer {
    let state = AppState::new(&config, store.clone(), store, provider);
    TestServer::new(create_router(state)).unwrap()
}

fn seed_commit(store: &MemoryStore) {
    store.add_commit(Commit {
        sha: "0a1b2c3".into(),
        integration_id: "int-1".into(),
        repository_id: "repo-1".into(),
        author_login: Some("octocat".into()),
        message: "Add login rate limiting".into(),
        additions: 120,
        deletions: 8,
        files_changed: 4,
        committed_at: Utc::now(),
    });
}

fn assert_error_envelope(body: &Value, code: &str) {
    assert!(body["error"].is_string());
    assert_eq!(body["code"], code);
    assert!(body["duration_ms"].is_u64());
    let ts = body["timestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
}

#[tokio::test]
async fn health_endpoint_returns_ok() {
    let server = server_with(
        Arc::new(MemoryStore::new()),
        Arc::new(FixedProvider::unavailable()),
        test_config(),
    );

    let resp = server.get("/health").await;
    assert_eq!(resp.status_code(), 200);
    let body: Value = resp.json();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn unknown_action_is_rejected_with_400() {
    let server = server_with(
        Arc::new(MemoryStore::new()),
        Arc::new(FixedProvider::unavailable()),
        test_config(),
    );

    let resp = server
        .post("/generate-insights")
        .json(&json!({"action": "summon_insights", "integration_id": "int-1", "project_id": "p"}))
        .await;
    assert_eq!(resp.status_code(), 400);
    let body: Value = resp.json();
    assert_error_envelope(&body, "INVALID_REQUEST");
    assert!(body["error"].as_str().unwrap().contains("summon_insights"));
}

#[tokio::test]
async fn malformed_body_is_rejected_with_400() {
    let server = server_with(
        Arc::new(MemoryStore::new()),
        Arc::new(FixedProvider::unavailable()),
        test_config(),
    );

    let resp = server.post("/generate-insights").text("action=security").await;
    assert_eq!(resp.status_code(), 400);
    assert_error_envelope(&resp.json::<Value>(), "INVALID_REQUEST");
}

#[tokio::test]
async fn options_returns_empty_ok_with_cors_headers() {
    let server = server_with(
        Arc::new(MemoryStore::new()),
        Arc::new(FixedProvider::unavailable()),
        test_config(),
    );

    let bare = server.method(Method::OPTIONS, "/generate-insights").await;
    assert_eq!(bare.status_code(), 200);

    let preflight = server
        .method(Method::OPTIONS, "/generate-insights")
        .add_header(
            HeaderName::from_static("origin"),
            HeaderValue::from_static("https://app.example.com"),
        )
        .add_header(
            HeaderName::from_static("access-control-request-method"),
            HeaderValue::from_static("POST"),
        )
        .await;
    assert_eq!(preflight.status_code(), 200);
    assert_eq!(
        preflight
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

#[tokio::test]
async fn single_rubric_echoes_insight_data() {
    let store = Arc::new(MemoryStore::new());
    seed_commit(&store);
    store.add_repository(Repository {
        id: "repo-1".into(),
        integration_id: "int-1".into(),
        name: "web".into(),
        full_name: "acme/web".into(),
        language: Some("TypeScript".into()),
        default_branch: Some("main".into()),
        is_private: false,
        open_issues_count: 2,
        updated_at: Utc::now(),
    });
    let provider = Arc::new(FixedProvider::replying(
        "Here you go:\n{\"security_score\": 0.72, \"vulnerabilities\": [{\"severity\": \"HIGH\", \"title\": \"Missing CSRF token\"}], \"confidence\": 0.65}",
    ));
    let server = server_with(store.clone(), provider, test_config());

    let resp = server
        .post("/generate-insights")
        .json(&json!({"action": "security_analysis", "integration_id": "int-1", "project_id": "proj-1"}))
        .await;
    assert_eq!(resp.status_code(), 200);
    let body: Value = resp.json();
    assert_eq!(body["insights"]["security_score"], 0.72);
    assert_eq!(body["insights"]["vulnerabilities"][0]["severity"], "HIGH");
    assert_eq!(body["insights"]["provenance"]["repositories_analyzed"], 1);

    let rows = store.all_insights();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].confidence_score, 0.65);
    assert_eq!(rows[0].expires_at - rows[0].generated_at, chrono::Duration::days(7));
}

#[tokio::test]
async fn model_outage_on_single_rubric_is_a_500() {
    let store = Arc::new(MemoryStore::new());
    seed_commit(&store);
    let server = server_with(store.clone(), Arc::new(FixedProvider::unavailable()), test_config());

    let resp = server
        .post("/generate-insights")
        .json(&json!({"action": "code_quality_assessment", "integration_id": "int-1", "project_id": "proj-1"}))
        .await;
    assert_eq!(resp.status_code(), 500);
    assert_error_envelope(&resp.json::<Value>(), "MODEL_HTTP_ERROR");
    assert!(store.all_insights().is_empty());
}

#[tokio::test]
async fn batch_without_workflows_succeeds_via_pipeline_fallback() {
    let store = Arc::new(MemoryStore::new());
    seed_commit(&store);
    store.register_integration("int-1", "proj-1");
    let provider = Arc::new(FixedProvider::unavailable());
    let server = server_with(store.clone(), provider, test_config());

    let resp = server
        .post("/generate-insights")
        .json(&json!({"action": "generate_github_insights", "integration_id": "int-1"}))
        .await;
    assert_eq!(resp.status_code(), 200);
    let body: Value = resp.json();
    assert_eq!(body["results"]["success"], true);
    let generated = body["results"]["generated"].as_u64().unwrap();
    let failed = body["results"]["failed"].as_u64().unwrap();
    assert!(generated >= 1);
    assert_eq!(generated + failed, 7);

    let listed: Value = server.get("/projects/proj-1/insights").await.json();
    assert_eq!(listed["total"], generated);
    assert_eq!(listed["insights"][0]["insight_type"], "pipeline_health");
    assert_eq!(listed["insights"][0]["alert_category"], "PIPELINE");
}

#[tokio::test]
async fn batch_where_everything_fails_is_a_500() {
    let store = Arc::new(MemoryStore::new());
    store.add_workflow(Workflow {
        id: "wf-1".into(),
        integration_id: "int-1".into(),
        name: "CI".into(),
        path: ".github/workflows/ci.yml".into(),
        state: "active".into(),
    });
    let server = server_with(store, Arc::new(FixedProvider::unavailable()), test_config());

    let resp = server
        .post("/generate-insights")
        .json(&json!({"action": "generate_github_insights", "integration_id": "int-1", "project_id": "proj-1"}))
        .await;
    assert_eq!(resp.status_code(), 500);
    let body: Value = resp.json();
    assert_error_envelope(&body, "BATCH_FAILED");
    assert!(body["error"].as_str().unwrap().contains("pipeline_health=MODEL_HTTP_ERROR"));
}

#[tokio::test(start_paused = true)]
async fn slow_model_hits_the_dispatch_deadline() {
    let store = Arc::new(MemoryStore::new());
    seed_commit(&store);
    let provider = Arc::new(FixedProvider {
        reply: Some("{\"performance_score\": 0.9}".into()),
        delay: Duration::from_secs(20),
        calls: AtomicUsize::new(0),
    });
    let mut config = test_config();
    config.pipeline.single_timeout_secs = 5;
    let server = server_with(store, provider, config);

    let resp = server
        .post("/generate-insights")
        .json(&json!({"action": "performance_insights", "integration_id": "int-1", "project_id": "proj-1"}))
        .await;
    assert_eq!(resp.status_code(), 500);
    assert_error_envelope(&resp.json::<Value>(), "DISPATCH_TIMEOUT");
}

#[tokio::test]
async fn listing_an_unknown_project_is_empty() {
    let server = server_with(
        Arc::new(MemoryStore::new()),
        Arc::new(FixedProvider::unavailable()),
        test_config(),
    );
    let body: Value = server.get("/projects/nobody/insights").await.json();
    assert_eq!(body["total"], 0);
    assert_eq!(body["insights"], json!([]));
}
