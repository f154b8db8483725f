//! Runs the `hf-daily` binary against stub servers and checks exit codes
//! and output.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;

const OVERRIDE_VARS: &[&str] = &[
    "DATABASE_URL",
    "HUGGINGFACE_TOKEN",
    "HF_API_BASE",
    "LLM_BASE_URL",
    "LLM_API_KEY",
    "LLM_MODEL",
    "LLM_TEMPERATURE",
    "LLM_MAX_TOKENS",
];

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn hub_with_one_model() -> Router {
    Router::new()
        .route(
            "/api/models",
            get(|| async {
                Json(json!([{
                    "id": "acme/tiny-llm",
                    "author": "acme",
                    "tags": ["text-generation"],
                    "downloads": 10,
                    "likes": 2
                }]))
            }),
        )
        .route("/api/datasets", get(|| async { Json(json!([])) }))
}

fn good_llm() -> Router {
    let content = json!({
        "title": "Tiny LLM is trending",
        "summary": "A small text-generation model from acme.",
        "ideas": ["one", "two", "three", "four", "five"],
    })
    .to_string();
    Router::new().route(
        "/v1/chat/completions",
        post(move |Json(_body): Json<Value>| {
            let content = content.clone();
            async move {
                Json(json!({
                    "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
                }))
            }
        }),
    )
}

fn setup_test_env(hub_base: &str, llm_base: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
url = "sqlite://{}/data/hf_daily.db"

[catalog]
api_base = "{}/api"
site_base = "{}"
fetch_readme = false
timeout_secs = 5

[llm]
base_url = "{}/v1"
model = "test-model"
timeout_secs = 5
"#,
        root.display(),
        hub_base,
        hub_base,
        llm_base
    );

    let config_path = config_dir.join("hf-daily.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

/// Run the binary off the async runtime so the stub servers keep serving.
async fn run_cli(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let config_path = config_path.to_path_buf();
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();

    tokio::task::spawn_blocking(move || {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_hf-daily"));
        for var in OVERRIDE_VARS {
            cmd.env_remove(var);
        }
        let output = cmd
            .arg("--config")
            .arg(&config_path)
            .args(&args)
            .output()
            .unwrap_or_else(|e| panic!("Failed to run hf-daily: {}", e));

        (
            String::from_utf8_lossy(&output.stdout).to_string(),
            String::from_utf8_lossy(&output.stderr).to_string(),
            output.status.success(),
        )
    })
    .await
    .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_init_is_idempotent() {
    let (tmp, config) = setup_test_env("http://127.0.0.1:9", "http://127.0.0.1:9");

    let (stdout, stderr, success) = run_cli(&config, &["init"]).await;
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.contains("Database initialized successfully"));
    assert!(tmp.path().join("data/hf_daily.db").exists());

    let (_, stderr, success) = run_cli(&config, &["init"]).await;
    assert!(success, "second init failed: {}", stderr);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_list_on_empty_database() {
    let (_tmp, config) = setup_test_env("http://127.0.0.1:9", "http://127.0.0.1:9");
    run_cli(&config, &["init"]).await;

    let (stdout, stderr, success) = run_cli(&config, &["list"]).await;
    assert!(success, "list failed: {}", stderr);
    assert!(stdout.contains("No reports yet."));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_generate_then_exhaust() {
    let hub_base = serve(hub_with_one_model()).await;
    let llm_base = serve(good_llm()).await;
    let (_tmp, config) = setup_test_env(&hub_base, &llm_base);

    let (stdout, stderr, success) = run_cli(&config, &["generate"]).await;
    assert!(success, "generate failed: {}", stderr);
    assert!(stdout.contains("selected: acme/tiny-llm (model)"), "stdout: {}", stdout);
    assert!(stdout.contains("title: Tiny LLM is trending"));

    let (stdout, _, success) = run_cli(&config, &["list"]).await;
    assert!(success);
    assert!(stdout.contains("Tiny LLM is trending  (acme/tiny-llm)"));

    let (stdout, _, success) = run_cli(&config, &["get", "1"]).await;
    assert!(success);
    assert!(stdout.contains("5. five"));

    // Only trending item is now featured: the run is skipped, not failed.
    let (stdout, stderr, success) = run_cli(&config, &["generate"]).await;
    assert!(success, "exhausted run should exit 0: {}", stderr);
    assert!(stdout.contains("skipped: no candidate available"), "stdout: {}", stdout);

    let (stdout, _, _) = run_cli(&config, &["list"]).await;
    assert_eq!(stdout.lines().count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dry_run_prints_without_storing() {
    let hub_base = serve(hub_with_one_model()).await;
    let llm_base = serve(good_llm()).await;
    let (_tmp, config) = setup_test_env(&hub_base, &llm_base);

    let (stdout, stderr, success) = run_cli(&config, &["generate", "--dry-run"]).await;
    assert!(success, "dry run failed: {}", stderr);
    assert!(stdout.contains("generate (dry-run)"));
    assert!(stdout.contains("3. three"));

    let (stdout, _, _) = run_cli(&config, &["list"]).await;
    assert!(stdout.contains("No reports yet."));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_completion_failure_exits_nonzero() {
    let hub_base = serve(hub_with_one_model()).await;
    let llm_base = serve(Router::new().route(
        "/v1/chat/completions",
        post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "overloaded") }),
    ))
    .await;
    let (_tmp, config) = setup_test_env(&hub_base, &llm_base);

    let (_, stderr, success) = run_cli(&config, &["generate"]).await;
    assert!(!success);
    assert!(stderr.contains("generating failed"), "stderr: {}", stderr);

    let (stdout, _, _) = run_cli(&config, &["list"]).await;
    assert!(stdout.contains("No reports yet."));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_get_unknown_report_fails() {
    let (_tmp, config) = setup_test_env("http://127.0.0.1:9", "http://127.0.0.1:9");
    run_cli(&config, &["init"]).await;

    let (_, stderr, success) = run_cli(&config, &["get", "42"]).await;
    assert!(!success);
    assert!(stderr.contains("report not found: 42"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_invalid_config_is_rejected() {
    let (tmp, config) = setup_test_env("http://127.0.0.1:9", "http://127.0.0.1:9");
    let broken = fs::read_to_string(&config)
        .unwrap()
        .replace("[llm]", "[llm]\ntemperature = 7.5");
    let broken_path = tmp.path().join("config/broken.toml");
    fs::write(&broken_path, broken).unwrap();

    let (_, stderr, success) = run_cli(&broken_path, &["list"]).await;
    assert!(!success);
    assert!(stderr.contains("llm.temperature"), "stderr: {}", stderr);
}
