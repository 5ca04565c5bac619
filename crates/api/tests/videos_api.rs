//! Integration tests for the `/api/v1/videos` resource, stats and cleanup.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{body_bytes, body_json, delete, get, post_json, submit, wait_terminal, TestOptions};
use serde_json::json;
use vidgen_core::job::JobStatus;

// ---------------------------------------------------------------------------
// Test: POST /videos returns the queued job and its status URL
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_video_returns_queued_job() {
    let app = common::build_test_app(TestOptions {
        synthesis_delay: Duration::from_millis(200),
        ..TestOptions::default()
    });

    let response = post_json(
        &app,
        "/api/v1/videos",
        json!({"prompt": "Explain the water cycle to a ten year old", "duration_limit": 45}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let id = json["data"]["video_id"].as_str().unwrap();
    assert_eq!(json["data"]["status"], "queued");
    assert_eq!(json["data"]["progress"], 0);
    assert_eq!(json["data"]["message"], "Video generation queued");
    assert_eq!(
        json["data"]["video_url"],
        format!("/api/v1/videos/{id}/status")
    );
}

// ---------------------------------------------------------------------------
// Test: a finished job exposes status, script and download
// ---------------------------------------------------------------------------

#[tokio::test]
async fn completed_job_can_be_downloaded() {
    let app = common::build_test_app(TestOptions::default());
    let id = submit(&app).await;
    wait_terminal(&app, id).await;

    let status = body_json(get(&app, &format!("/api/v1/videos/{id}/status")).await).await;
    assert_eq!(status["data"]["status"], "completed");
    assert_eq!(status["data"]["progress"], 100);
    assert_eq!(
        status["data"]["video_url"],
        format!("/api/v1/videos/{id}/download")
    );

    let script = body_json(get(&app, &format!("/api/v1/videos/{id}/script")).await).await;
    assert_eq!(script["data"]["script_content"], common::SCRIPT);

    let download = get(&app, &format!("/api/v1/videos/{id}/download")).await;
    assert_eq!(download.status(), StatusCode::OK);
    assert_eq!(download.headers()["content-type"], "video/mp4");
    assert!(download.headers()["content-disposition"]
        .to_str()
        .unwrap()
        .contains(&format!("educational_video_{id}.mp4")));
    assert_eq!(body_bytes(download).await.len(), common::VIDEO_BYTES);
}

// ---------------------------------------------------------------------------
// Test: download before completion is 400
// ---------------------------------------------------------------------------

#[tokio::test]
async fn download_before_completion_is_bad_request() {
    let app = common::build_test_app(TestOptions {
        synthesis_delay: Duration::from_millis(500),
        ..TestOptions::default()
    });
    let id = submit(&app).await;

    let response = get(&app, &format!("/api/v1/videos/{id}/download")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "NOT_READY");
}

// ---------------------------------------------------------------------------
// Test: a failed job reports its error and has no script
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_job_reports_error() {
    let app = common::build_test_app(TestOptions {
        synthesis_fails: true,
        ..TestOptions::default()
    });
    let id = submit(&app).await;
    wait_terminal(&app, id).await;

    let status = body_json(get(&app, &format!("/api/v1/videos/{id}/status")).await).await;
    assert_eq!(status["data"]["status"], "failed");
    assert_eq!(status["data"]["progress"], 25);
    assert!(status["data"]["video_url"].is_null());
    assert!(status["data"]["error_details"]
        .as_str()
        .unwrap()
        .contains("model unavailable"));

    let script = get(&app, &format!("/api/v1/videos/{id}/script")).await;
    assert_eq!(script.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Test: unknown ids are 404, malformed ids are 400
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_video_returns_404() {
    let app = common::build_test_app(TestOptions::default());
    let id = uuid::Uuid::new_v4();

    let response = get(&app, &format!("/api/v1/videos/{id}/status")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");

    let response = get(&app, "/api/v1/videos/not-a-uuid/status").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Test: request validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn short_prompt_is_rejected() {
    let app = common::build_test_app(TestOptions::default());

    let response = post_json(&app, "/api/v1/videos", json!({"prompt": "too short"})).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    assert!(app.orchestrator.list_jobs(None).await.is_empty());
}

#[tokio::test]
async fn out_of_range_duration_is_rejected() {
    let app = common::build_test_app(TestOptions::default());

    let response = post_json(
        &app,
        "/api/v1/videos",
        json!({"prompt": "Explain the water cycle", "duration_limit": 2}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Test: the admission ceiling maps to 429
// ---------------------------------------------------------------------------

#[tokio::test]
async fn third_concurrent_video_is_rejected() {
    let app = common::build_test_app(TestOptions {
        synthesis_delay: Duration::from_secs(2),
        ..TestOptions::default()
    });
    submit(&app).await;
    submit(&app).await;

    let response = post_json(
        &app,
        "/api/v1/videos",
        json!({"prompt": "Explain how a binary heap keeps its ordering"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body_json(response).await["code"], "TOO_MANY_REQUESTS");
}

// ---------------------------------------------------------------------------
// Test: delete semantics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_finished_video_removes_file() {
    let app = common::build_test_app(TestOptions::default());
    let id = submit(&app).await;
    wait_terminal(&app, id).await;
    let stored = app.dir.path().join("videos").join(format!("{id}.mp4"));
    assert!(stored.exists());

    let response = delete(&app, &format!("/api/v1/videos/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!stored.exists());

    let again = delete(&app, &format!("/api/v1/videos/{id}")).await;
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_running_video_conflicts() {
    let app = common::build_test_app(TestOptions {
        synthesis_delay: Duration::from_millis(500),
        ..TestOptions::default()
    });
    let id = submit(&app).await;

    let response = delete(&app, &format!("/api/v1/videos/{id}")).await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "JOB_ACTIVE");
    assert!(app.orchestrator.get_status(id).await.is_ok());
}

// ---------------------------------------------------------------------------
// Test: listing, filtering and stats
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_filters_by_status() {
    let app = common::build_test_app(TestOptions::default());
    let first = submit(&app).await;
    wait_terminal(&app, first).await;
    let second = submit(&app).await;
    wait_terminal(&app, second).await;

    let all = body_json(get(&app, "/api/v1/videos").await).await;
    assert_eq!(all["data"]["total"], 2);
    // Newest first.
    assert_eq!(all["data"]["videos"][0]["video_id"], second.to_string());
    assert_eq!(
        all["data"]["videos"][0]["download_url"],
        format!("/api/v1/videos/{second}/download")
    );

    let failed = body_json(get(&app, "/api/v1/videos?status=failed").await).await;
    assert_eq!(failed["data"]["total"], 0);

    let bad = get(&app, "/api/v1/videos?status=exploded").await;
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stats_report_every_status() {
    let app = common::build_test_app(TestOptions::default());
    let id = submit(&app).await;
    wait_terminal(&app, id).await;

    let stats = body_json(get(&app, "/api/v1/stats").await).await;

    assert_eq!(stats["data"]["total_videos"], 1);
    assert_eq!(stats["data"]["active_videos"], 0);
    let breakdown = &stats["data"]["status_breakdown"];
    assert_eq!(breakdown["completed"], 1);
    for status in JobStatus::ACTIVE {
        assert_eq!(breakdown[status.name()], 0);
    }
    assert_eq!(breakdown["failed"], 0);
}

// ---------------------------------------------------------------------------
// Test: manual cleanup keeps jobs inside the retention window
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cleanup_keeps_recent_videos() {
    let app = common::build_test_app(TestOptions::default());
    let id = submit(&app).await;
    wait_terminal(&app, id).await;

    let response = post_json(&app, "/api/v1/cleanup", json!({})).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["message"], "Cleanup completed");
    assert_eq!(json["data"]["report"]["scanned"], 1);
    assert_eq!(json["data"]["report"]["deleted"], 0);
    assert!(app.orchestrator.get_status(id).await.is_ok());
}
