use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use nova_act_api::config::Config;
use nova_act_api::pool::WorkerPool;
use nova_act_api::runner::{AgentJob, AgentRunner};
use nova_act_api::server::{AppState, build_router};
use nova_act_api::types::AgentOutcome;

fn done_outcome() -> AgentOutcome {
    AgentOutcome {
        response: Some("Done".to_string()),
        steps_executed: 2,
        session_id: Some("s1".to_string()),
        act_id: Some("a1".to_string()),
        parsed_response: None,
        valid_json: None,
    }
}

/// Succeeds with a fixed outcome; records how often it ran and the headless
/// flag it was handed.
#[derive(Default)]
struct DoneRunner {
    calls: AtomicUsize,
    saw_headless: AtomicBool,
}

impl AgentRunner for DoneRunner {
    fn run(&self, job: AgentJob) -> Result<AgentOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.saw_headless.store(job.headless, Ordering::SeqCst);
        Ok(done_outcome())
    }
}

struct FailingRunner;

impl AgentRunner for FailingRunner {
    fn run(&self, _job: AgentJob) -> Result<AgentOutcome> {
        Err(anyhow!("navigation timeout"))
    }
}

struct BrokenPayloadRunner;

impl AgentRunner for BrokenPayloadRunner {
    fn run(&self, _job: AgentJob) -> Result<AgentOutcome> {
        Ok(AgentOutcome {
            response: Some("{\"price\": oops".to_string()),
            steps_executed: 5,
            session_id: Some("s2".to_string()),
            act_id: Some("a2".to_string()),
            parsed_response: Some(Value::String("{\"price\": oops".to_string())),
            valid_json: Some(false),
        })
    }
}

struct PanickingRunner;

impl AgentRunner for PanickingRunner {
    fn run(&self, _job: AgentJob) -> Result<AgentOutcome> {
        panic!("engine blew up");
    }
}

/// Tracks how many runs are in flight at once.
#[derive(Default)]
struct CountingRunner {
    calls: AtomicUsize,
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl AgentRunner for CountingRunner {
    fn run(&self, _job: AgentJob) -> Result<AgentOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(60));
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(done_outcome())
    }
}

fn router_with(
    api_key: Option<&str>,
    pool: Arc<WorkerPool>,
    runner: Arc<dyn AgentRunner>,
) -> Router {
    let config = Config {
        api_key: api_key.map(String::from),
        port: 0,
    };
    build_router(AppState::new(Arc::new(config), pool, runner))
}

fn run_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/agent/run")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_the_service_as_up() {
    let router = router_with(
        Some("key"),
        Arc::new(WorkerPool::new(1)),
        Arc::new(DoneRunner::default()),
    );

    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "status": "healthy", "service": "nova-act-api" })
    );
}

#[tokio::test]
async fn successful_run_returns_the_full_wire_shape() {
    let router = router_with(
        Some("key"),
        Arc::new(WorkerPool::new(1)),
        Arc::new(DoneRunner::default()),
    );

    let response = router
        .oneshot(run_request(json!({
            "starting_page": "https://example.com",
            "instructions": "go to page",
            "headless": true,
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({
            "success": true,
            "response": "Done",
            "error": null,
            "steps_executed": 2,
            "session_id": "s1",
            "act_id": "a1",
            "parsed_response": null,
            "valid_json": null,
        })
    );
}

#[tokio::test]
async fn engine_failure_is_a_200_with_the_error_message() {
    let router = router_with(
        Some("key"),
        Arc::new(WorkerPool::new(1)),
        Arc::new(FailingRunner),
    );

    let response = router
        .oneshot(run_request(json!({
            "starting_page": "https://example.com",
            "instructions": "go to page",
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["response"], Value::Null);
    assert_eq!(body["error"], json!("navigation timeout"));
    assert_eq!(body["steps_executed"], json!(0));
    assert_eq!(body["session_id"], Value::Null);
    assert_eq!(body["act_id"], Value::Null);
}

#[tokio::test]
async fn missing_credential_is_a_500_before_any_work_is_scheduled() {
    let pool = Arc::new(WorkerPool::new(1));
    let runner = Arc::new(DoneRunner::default());
    let router = router_with(None, Arc::clone(&pool), runner.clone());

    let response = router
        .oneshot(run_request(json!({
            "starting_page": "https://example.com",
            "instructions": "go to page",
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert!(
        body["detail"]
            .as_str()
            .unwrap()
            .contains("NOVA_ACT_API_KEY")
    );

    assert_eq!(pool.submitted(), 0);
    assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn invalid_structured_payload_does_not_fail_the_run() {
    let router = router_with(
        Some("key"),
        Arc::new(WorkerPool::new(1)),
        Arc::new(BrokenPayloadRunner),
    );

    let response = router
        .oneshot(run_request(json!({
            "starting_page": "https://example.com",
            "instructions": "extract prices as json",
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["parsed_response"], json!("{\"price\": oops"));
    assert_eq!(body["valid_json"], json!(false));
}

#[tokio::test]
async fn headless_defaults_to_true_when_omitted() {
    let runner = Arc::new(DoneRunner::default());
    let router = router_with(Some("key"), Arc::new(WorkerPool::new(1)), runner.clone());

    let response = router
        .oneshot(run_request(json!({
            "starting_page": "https://example.com",
            "instructions": "go to page",
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(runner.calls.load(Ordering::SeqCst), 1);
    assert!(runner.saw_headless.load(Ordering::SeqCst));
}

#[tokio::test]
async fn empty_fields_are_rejected_without_touching_the_pool() {
    let pool = Arc::new(WorkerPool::new(1));
    let router = router_with(
        Some("key"),
        Arc::clone(&pool),
        Arc::new(DoneRunner::default()),
    );

    let response = router
        .oneshot(run_request(json!({
            "starting_page": "",
            "instructions": "go to page",
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["steps_executed"], json!(0));
    assert_eq!(pool.submitted(), 0);
}

#[tokio::test]
async fn a_panicking_engine_folds_into_the_failure_shape() {
    let router = router_with(
        Some("key"),
        Arc::new(WorkerPool::new(1)),
        Arc::new(PanickingRunner),
    );

    let response = router
        .oneshot(run_request(json!({
            "starting_page": "https://example.com",
            "instructions": "go to page",
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(false));
    assert!(body["error"].as_str().unwrap().contains("worker"));
    assert_eq!(body["steps_executed"], json!(0));
}

#[tokio::test]
async fn requests_beyond_pool_capacity_queue_instead_of_failing() {
    let pool = Arc::new(WorkerPool::new(2));
    let runner = Arc::new(CountingRunner::default());
    let router = router_with(Some("key"), pool, runner.clone());

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let router = router.clone();
            tokio::spawn(async move {
                router
                    .oneshot(run_request(json!({
                        "starting_page": "https://example.com",
                        "instructions": "go to page",
                    })))
                    .await
                    .unwrap()
            })
        })
        .collect();

    for handle in handles {
        let response = handle.await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["success"], json!(true));
    }

    assert_eq!(runner.calls.load(Ordering::SeqCst), 6);
    assert!(runner.peak.load(Ordering::SeqCst) <= 2);
}
