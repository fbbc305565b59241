//! End-to-end tests: scan host pipeline against an in-process playback host
//!
//! Tests cover:
//! - Mapped card → dispatch → Idle → Starting → Playing(albums/Blue)
//! - Unmapped card → no play command → playback host unchanged
//! - Character stream through capture, debounce and the worker
//! - POST /scan on the scan host API
//! - Store unavailable is reported, never treated as unmapped
//! - A retry that lands mid-switch is answered AlreadyPlaying

#![cfg(unix)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use rfmp_common::api::{PlayOutcome, StatusResponse};
use rfmp_common::{PlayerEvent, SessionState};
use rfmp_ph::config::PlayerConfig;
use rfmp_ph::PlaybackSupervisor;
use rfmp_sh::config::{DispatchConfig, ScanConfig};
use rfmp_sh::input::capture::{run_capture, Framing, ScanInput};
use rfmp_sh::{
    CardMapping, DispatchClient, DispatchOutcome, HandoffQueue, MappingResolver, Pipeline,
    ScanCapture, ScanEvent, ScanOutcome, SqliteMappingStore,
};
use serde_json::Value;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{broadcast, watch};
use tower::util::ServiceExt; // for `oneshot` method

/// Playback host on an ephemeral port plus a scan host pipeline pointed at it
struct Harness {
    _music: TempDir,
    _db: TempDir,
    supervisor: PlaybackSupervisor,
    store: SqliteMappingStore,
    pipeline: Pipeline<SqliteMappingStore>,
}

impl Harness {
    async fn start() -> Self {
        let player = PlayerConfig {
            program: "/bin/sh".to_string(),
            args: vec!["-c".to_string(), "exec sleep 30".to_string(), "player".to_string()],
            audio_extension: "mp3".to_string(),
            grace_period_ms: 2000,
        };
        let dispatch = DispatchConfig {
            endpoint: String::new(),
            timeout_ms: 3000,
            max_retries: 2,
            backoff_ms: 50,
        };
        Self::start_with(player, dispatch).await
    }

    /// `dispatch.endpoint` is replaced with the playback host's address
    async fn start_with(player: PlayerConfig, mut dispatch: DispatchConfig) -> Self {
        let music = tempfile::tempdir().unwrap();
        for album in ["albums/Blue", "albums/Red"] {
            let dir = music.path().join(album);
            std::fs::create_dir_all(&dir).unwrap();
            for track in ["01.mp3", "02.mp3", "03.mp3"] {
                std::fs::write(dir.join(track), b"").unwrap();
            }
        }

        let supervisor = PlaybackSupervisor::new(music.path().to_path_buf(), player);

        let app = rfmp_ph::api::build_router(rfmp_ph::api::AppContext::new(supervisor.clone()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let db = tempfile::tempdir().unwrap();
        let store = SqliteMappingStore::open(db.path()).await.unwrap();
        let mut blue = CardMapping::new("1234567890", "albums/Blue");
        blue.title = Some("Blue".to_string());
        store.upsert(&blue).await.unwrap();
        store.upsert(&CardMapping::new("2222", "albums/Red")).await.unwrap();

        dispatch.endpoint = format!("http://{}", addr);
        let dispatcher = DispatchClient::new(&dispatch).unwrap();
        let pipeline = Pipeline::new(MappingResolver::new(store.clone()), dispatcher);

        Self {
            _music: music,
            _db: db,
            supervisor,
            store,
            pipeline,
        }
    }
}

async fn wait_for_state(rx: &mut watch::Receiver<StatusResponse>, state: SessionState) -> StatusResponse {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if rx.borrow_and_update().state == state {
                return rx.borrow().clone();
            }
            rx.changed().await.expect("supervisor dropped");
        }
    })
    .await
    .expect("timed out waiting for playback state")
}

async fn drain_events(rx: &mut broadcast::Receiver<PlayerEvent>) -> Vec<PlayerEvent> {
    let mut events = Vec::new();
    while let Ok(Ok(event)) = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_mapped_card_starts_playback() {
    let harness = Harness::start().await;
    let mut events = harness.supervisor.subscribe_events();
    let mut status_rx = harness.supervisor.watch_status();

    let queue = HandoffQueue::new(4);
    let worker = {
        let pipeline = harness.pipeline.clone();
        let queue = queue.clone();
        tokio::spawn(async move { pipeline.run(queue).await })
    };

    queue.push(ScanEvent::new("1234567890")).unwrap();

    let status = wait_for_state(&mut status_rx, SessionState::Playing).await;
    assert_eq!(status.directory.as_deref(), Some("albums/Blue"));
    assert_eq!(status.card_id.as_deref(), Some("1234567890"));

    let query = harness.supervisor.query_status();
    assert_eq!(query.state, SessionState::Playing);
    assert_eq!(query.directory.as_deref(), Some("albums/Blue"));

    let transitions: Vec<_> = drain_events(&mut events)
        .await
        .into_iter()
        .filter_map(|e| match e {
            PlayerEvent::SessionStateChanged { old_state, new_state, .. } => Some((old_state, new_state)),
            _ => None,
        })
        .collect();
    assert_eq!(
        transitions,
        vec![
            (SessionState::Idle, SessionState::Starting),
            (SessionState::Starting, SessionState::Playing),
        ]
    );

    queue.close();
    worker.await.unwrap();
    harness.supervisor.shutdown().await;
}

#[tokio::test]
async fn test_unmapped_card_sends_nothing() {
    let harness = Harness::start().await;
    let mut events = harness.supervisor.subscribe_events();

    let report = harness.pipeline.process(&ScanEvent::new("999")).await;
    assert_eq!(report.outcome, ScanOutcome::Unmapped);
    assert!(report.dispatch.is_none());

    assert!(drain_events(&mut events).await.is_empty());
    assert_eq!(harness.supervisor.query_status(), StatusResponse::default());

    let pending = harness.pipeline.pending().list();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].card_id, "999");
}

#[tokio::test]
async fn test_repeated_scans_through_capture_start_once() {
    let harness = Harness::start().await;
    let mut events = harness.supervisor.subscribe_events();

    let queue = HandoffQueue::new(4);
    let worker = {
        let pipeline = harness.pipeline.clone();
        let queue = queue.clone();
        tokio::spawn(async move { pipeline.run(queue).await })
    };

    // The reader repeats while the card lingers, plus one unmapped card
    let input = ScanInput {
        reader: Box::pin(&b"1234567890\n1234567890\n1234567890\n999\n"[..]),
        framing: Framing::Text,
        description: "test".to_string(),
    };
    run_capture(input, ScanCapture::new(&ScanConfig::default()), queue.clone())
        .await
        .unwrap();

    let mut status_rx = harness.supervisor.watch_status();
    wait_for_state(&mut status_rx, SessionState::Playing).await;

    let started = drain_events(&mut events)
        .await
        .into_iter()
        .filter(|e| matches!(e, PlayerEvent::PlaybackStarted { .. }))
        .count();
    assert_eq!(started, 1);

    queue.close();
    worker.await.unwrap();
    assert_eq!(harness.pipeline.pending().list()[0].card_id, "999");
    harness.supervisor.shutdown().await;
}

#[tokio::test]
async fn test_scan_endpoint_reports_dispatch() {
    let harness = Harness::start().await;
    let app = rfmp_sh::api::build_router(rfmp_sh::api::AppContext::new(harness.pipeline.clone()));

    let request = Request::builder()
        .method("POST")
        .uri("/scan")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"card_id": "1234567890"}"#))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["outcome"], "mapped");
    assert_eq!(body["directory"], "albums/Blue");
    assert_eq!(body["title"], "Blue");
    assert_eq!(body["dispatch"]["result"], "delivered");
    assert_eq!(body["dispatch"]["response"]["outcome"], "started");
    assert_eq!(harness.supervisor.query_status().state, SessionState::Playing);

    // Bad card ids never reach the pipeline
    let request = Request::builder()
        .method("POST")
        .uri("/scan")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"card_id": "12ab"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    harness.supervisor.shutdown().await;
}

#[tokio::test]
async fn test_pending_endpoints() {
    let harness = Harness::start().await;
    let app = rfmp_sh::api::build_router(rfmp_sh::api::AppContext::new(harness.pipeline.clone()));

    harness.pipeline.process(&ScanEvent::new("999")).await;
    harness.pipeline.process(&ScanEvent::new("555")).await;

    let get = || Request::builder().uri("/pending").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(get()).await.unwrap();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    let ids: Vec<_> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["card_id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["555", "999"]);

    let delete = |id: &str| {
        Request::builder()
            .method("DELETE")
            .uri(format!("/pending/{}", id))
            .body(Body::empty())
            .unwrap()
    };
    let response = app.clone().oneshot(delete("999")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = app.oneshot(delete("999")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert_eq!(harness.pipeline.pending().list().len(), 1);
}

#[tokio::test]
async fn test_store_unavailable_is_reported() {
    let harness = Harness::start().await;
    let mut events = harness.supervisor.subscribe_events();
    harness.store.close().await;

    let report = harness.pipeline.process(&ScanEvent::new("1234567890")).await;
    assert_eq!(report.outcome, ScanOutcome::StoreUnavailable);
    assert!(report.error.is_some());
    assert!(report.dispatch.is_none());

    // Not routed to the assignment workflow
    assert!(harness.pipeline.pending().list().is_empty());
    assert!(drain_events(&mut events).await.is_empty());
}

#[tokio::test]
async fn test_missing_directory_is_rejected_end_to_end() {
    let harness = Harness::start().await;
    harness
        .store
        .upsert(&CardMapping::new("777", "albums/Gone"))
        .await
        .unwrap();

    let report = harness.pipeline.process(&ScanEvent::new("777")).await;
    match report.dispatch {
        Some(DispatchOutcome::Rejected { reason }) => {
            assert!(reason.contains("422"), "reason: {}", reason)
        }
        other => panic!("unexpected dispatch outcome: {:?}", other),
    }
    assert_eq!(harness.supervisor.query_status().state, SessionState::Idle);
}

#[tokio::test]
async fn test_retry_during_slow_switch_is_idempotent() {
    // Player that logs its pid and ignores SIGTERM, so every switch waits
    // out the full grace period
    let log = tempfile::NamedTempFile::new().unwrap();
    let script = format!(
        "echo $$ >> '{}'; trap '' TERM; while :; do sleep 0.05; done",
        log.path().display()
    );
    let player = PlayerConfig {
        program: "/bin/sh".to_string(),
        args: vec!["-c".to_string(), script, "player".to_string()],
        audio_extension: "mp3".to_string(),
        grace_period_ms: 600,
    };
    // Per-attempt timeout well below the grace period
    let dispatch = DispatchConfig {
        endpoint: String::new(),
        timeout_ms: 200,
        max_retries: 4,
        backoff_ms: 50,
    };
    let harness = Harness::start_with(player, dispatch).await;

    let report = harness.pipeline.process(&ScanEvent::new("1234567890")).await;
    assert!(matches!(report.dispatch, Some(DispatchOutcome::Delivered { .. })));
    // Let the shell install its trap
    tokio::time::sleep(Duration::from_millis(150)).await;

    let report = harness.pipeline.process(&ScanEvent::new("2222")).await;
    match report.dispatch {
        Some(DispatchOutcome::Delivered { response }) => {
            assert_eq!(response.outcome, PlayOutcome::AlreadyPlaying);
            assert_eq!(response.status.directory.as_deref(), Some("albums/Red"));
        }
        other => panic!("unexpected dispatch outcome: {:?}", other),
    }

    let status = harness.supervisor.query_status();
    assert_eq!(status.state, SessionState::Playing);
    assert_eq!(status.directory.as_deref(), Some("albums/Red"));

    // One player per album, and only the second one left running
    let read_pids = || -> Vec<i32> {
        std::fs::read_to_string(log.path())
            .unwrap_or_default()
            .lines()
            .filter_map(|line| line.trim().parse().ok())
            .collect()
    };
    for _ in 0..100 {
        if read_pids().len() >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
    let pids = read_pids();
    assert_eq!(pids.len(), 2);
    let alive = pids
        .iter()
        .filter(|pid| unsafe { libc::kill(**pid, 0) == 0 })
        .count();
    assert_eq!(alive, 1);

    harness.supervisor.shutdown().await;
}
