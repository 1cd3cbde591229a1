//! Integration tests for the synchronization orchestrator against a
//! mock engine admin endpoint.

mod common;

use std::sync::Arc;

use common::{MockEngine, PushBehavior};
use proxy_manager::config::{ApiConfig, EngineConfig};
use proxy_manager::document::HandlerStage;
use proxy_manager::engine::{EngineClient, EngineError};
use proxy_manager::registry::{DomainRecord, RecordMutation, RegistryDb};
use proxy_manager::sync::{Orchestrator, SyncError};

async fn setup() -> (MockEngine, Arc<RegistryDb>, Orchestrator) {
    let mock = MockEngine::start().await;
    let engine = EngineClient::new(&EngineConfig {
        admin_url: mock.admin_url(),
        request_timeout_secs: 1,
        ..EngineConfig::default()
    })
    .unwrap();
    let registry = Arc::new(RegistryDb::open_in_memory().unwrap());
    let orchestrator = Orchestrator::new(engine, Arc::clone(&registry), ApiConfig::default());
    (mock, registry, orchestrator)
}

fn https_record(host: &str) -> DomainRecord {
    let mut record = DomainRecord::proxy(host, "10.0.0.5", 8080);
    record.enable_https = true;
    record
}

#[tokio::test]
async fn add_route_pushes_and_persists() {
    let (mock, registry, orchestrator) = setup().await;

    orchestrator
        .add_route(https_record("app.example.com"))
        .await
        .unwrap();

    let document = mock.document();
    assert!(document.has_route_for("app.example.com"));
    match &document.routes()[0].handle[..] {
        [HandlerStage::ReverseProxy {
            upstreams,
            transport,
            ..
        }] => {
            assert_eq!(upstreams[0].dial, "10.0.0.5:8080");
            assert!(transport.as_ref().unwrap().tls.is_some());
        }
        other => panic!("unexpected chain: {other:?}"),
    }

    let stored = registry.find_by_host("app.example.com").unwrap().unwrap();
    assert!(stored.enable_https);
    assert_eq!(registry.snapshot_count().unwrap(), 1);

    // The snapshot reproduces exactly what the engine accepted.
    let snapshot = registry.latest_snapshot().unwrap().unwrap();
    assert_eq!(snapshot.document, document);
}

#[tokio::test]
async fn duplicate_add_fails_and_changes_nothing() {
    let (mock, registry, orchestrator) = setup().await;

    orchestrator
        .add_route(https_record("app.example.com"))
        .await
        .unwrap();
    let routes_before = mock.document().routes().len();

    let result = orchestrator.add_route(https_record("app.example.com")).await;
    assert!(matches!(result, Err(SyncError::DuplicateRoute { .. })));

    assert_eq!(mock.document().routes().len(), routes_before);
    assert_eq!(registry.snapshot_count().unwrap(), 1);
    assert_eq!(registry.list_all().unwrap().len(), 1);
}

#[tokio::test]
async fn rejected_push_leaves_registry_untouched() {
    let (mock, registry, orchestrator) = setup().await;
    mock.set_push_behavior(PushBehavior::Reject);

    let result = orchestrator.add_route(https_record("app.example.com")).await;
    assert!(matches!(
        result,
        Err(SyncError::Engine(EngineError::Rejected { status: 400, .. }))
    ));

    assert!(registry.find_by_host("app.example.com").unwrap().is_none());
    assert_eq!(registry.snapshot_count().unwrap(), 0);
}

#[tokio::test]
async fn push_timeout_is_unreachable_and_atomic() {
    let (mock, registry, orchestrator) = setup().await;
    mock.set_push_behavior(PushBehavior::Hang);

    let result = orchestrator.add_route(https_record("app.example.com")).await;
    assert!(matches!(
        result,
        Err(SyncError::Engine(EngineError::Unreachable(_)))
    ));
    assert!(registry.find_by_host("app.example.com").unwrap().is_none());
}

#[tokio::test]
async fn upsert_replaces_instead_of_appending() {
    let (mock, registry, orchestrator) = setup().await;

    orchestrator
        .add_route(https_record("app.example.com"))
        .await
        .unwrap();

    let mut replacement = DomainRecord::proxy("app.example.com", "10.0.0.9", 9090);
    replacement.enable_https = false;
    orchestrator.update_or_add_route(replacement).await.unwrap();

    let document = mock.document();
    let matching: Vec<_> = document
        .routes()
        .iter()
        .filter(|r| r.matches_host("app.example.com"))
        .collect();
    assert_eq!(matching.len(), 1);
    match &matching[0].handle[..] {
        [HandlerStage::ReverseProxy {
            upstreams,
            transport,
            ..
        }] => {
            assert_eq!(upstreams[0].dial, "10.0.0.9:9090");
            assert!(transport.as_ref().unwrap().tls.is_none());
        }
        other => panic!("unexpected chain: {other:?}"),
    }

    let stored = registry.find_by_host("app.example.com").unwrap().unwrap();
    assert_eq!(stored.port, 9090);
    assert_eq!(registry.list_all().unwrap().len(), 1);
    assert_eq!(registry.snapshot_count().unwrap(), 2);
}

#[tokio::test]
async fn remove_route_deletes_both_sides() {
    let (mock, registry, orchestrator) = setup().await;

    orchestrator
        .add_route(https_record("app.example.com"))
        .await
        .unwrap();
    orchestrator.remove_route("app.example.com").await.unwrap();

    assert!(!mock.document().has_route_for("app.example.com"));
    assert!(registry.find_by_host("app.example.com").unwrap().is_none());
    assert_eq!(registry.snapshot_count().unwrap(), 2);
}

#[tokio::test]
async fn remove_unknown_route_is_not_found() {
    let (_mock, _registry, orchestrator) = setup().await;
    let result = orchestrator.remove_route("ghost.example.com").await;
    assert!(matches!(result, Err(SyncError::RouteNotFound { .. })));
}

#[tokio::test]
async fn locked_record_can_never_be_removed() {
    let (mock, registry, orchestrator) = setup().await;

    orchestrator.initialize().await.unwrap();
    let api_host = ApiConfig::default().host;
    let stored = registry.find_by_host(&api_host).unwrap().unwrap();
    assert!(stored.is_locked);

    let pushes_before = mock.push_count();
    let result = orchestrator.remove_route(&api_host).await;
    assert!(matches!(result, Err(SyncError::LockedRoute { .. })));

    assert_eq!(mock.push_count(), pushes_before);
    assert!(mock.document().has_route_for(&api_host));
    assert!(registry.find_by_host(&api_host).unwrap().is_some());
}

#[tokio::test]
async fn initialize_replays_latest_snapshot() {
    let (mock, registry, orchestrator) = setup().await;

    orchestrator.initialize().await.unwrap();
    orchestrator
        .add_route(https_record("app.example.com"))
        .await
        .unwrap();
    assert_eq!(registry.snapshot_count().unwrap(), 2);

    // A fresh orchestrator over the same registry replays, it does
    // not regenerate.
    let engine = EngineClient::new(&EngineConfig {
        admin_url: mock.admin_url(),
        request_timeout_secs: 1,
        ..EngineConfig::default()
    })
    .unwrap();
    let restarted = Orchestrator::new(engine, Arc::clone(&registry), ApiConfig::default());
    restarted.initialize().await.unwrap();

    assert_eq!(registry.snapshot_count().unwrap(), 2);
    assert!(mock.document().has_route_for("app.example.com"));
}

#[tokio::test]
async fn snapshot_count_tracks_successful_mutations() {
    let (_mock, registry, orchestrator) = setup().await;

    for i in 0..4u16 {
        orchestrator
            .add_route(https_record(&format!("h{i}.example.com")))
            .await
            .unwrap();
    }
    orchestrator.remove_route("h0.example.com").await.unwrap();

    assert_eq!(registry.snapshot_count().unwrap(), 5);
}

#[tokio::test]
async fn import_decomposes_routes_and_counts_failures() {
    let (mock, registry, orchestrator) = setup().await;

    let raw = serde_json::json!({
        "admin": { "listen": "0.0.0.0:2019" },
        "apps": { "http": { "servers": { "main": {
            "listen": [":80", ":443"],
            "automatic_https": { "disable": false },
            "routes": [
                {
                    "match": [{ "host": ["app.example.com"] }],
                    "handle": [{
                        "handler": "reverse_proxy",
                        "upstreams": [{ "dial": "10.0.0.5:8080" }],
                        "transport": { "protocol": "http", "tls": {} }
                    }]
                },
                {
                    "match": [{ "host": ["old.example.com"] }],
                    "handle": [{
                        "handler": "static_response",
                        "status_code": 301,
                        "headers": { "Location": ["https://new.example.com{http.request.uri}"] }
                    }]
                },
                {
                    "match": [],
                    "handle": []
                }
            ]
        }}}}
    });

    let report = orchestrator.import_document(raw).await.unwrap();
    assert_eq!(report.success, 2);
    assert_eq!(report.failed, 1);

    assert!(mock.document().has_route_for("app.example.com"));
    assert_eq!(registry.snapshot_count().unwrap(), 1);

    let proxy = registry.find_by_host("app.example.com").unwrap().unwrap();
    assert!(proxy.enable_https);
    assert_eq!(proxy.destination_address, "10.0.0.5");

    let redirect = registry.find_by_host("old.example.com").unwrap().unwrap();
    assert_eq!(redirect.redirect_url.as_deref(), Some("new.example.com"));
}

#[tokio::test]
async fn invalid_import_document_is_rejected_before_push() {
    let (mock, registry, orchestrator) = setup().await;

    let result = orchestrator
        .import_document(serde_json::json!({ "not": "a document" }))
        .await;
    assert!(matches!(result, Err(SyncError::InvalidDocument(_))));
    assert_eq!(mock.push_count(), 0);
    assert_eq!(registry.snapshot_count().unwrap(), 0);
}

#[tokio::test]
async fn concurrent_adds_both_land_in_the_document() {
    let (mock, registry, orchestrator) = setup().await;
    let orchestrator = Arc::new(orchestrator);

    // Mutations serialize through the writer lock, so neither add can
    // discard the other's route.
    let a = {
        let orch = Arc::clone(&orchestrator);
        tokio::spawn(async move { orch.add_route(https_record("a.example.com")).await })
    };
    let b = {
        let orch = Arc::clone(&orchestrator);
        tokio::spawn(async move { orch.add_route(https_record("b.example.com")).await })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    let document = mock.document();
    assert!(document.has_route_for("a.example.com"));
    assert!(document.has_route_for("b.example.com"));
    assert_eq!(registry.list_all().unwrap().len(), 2);
}

#[tokio::test]
async fn registry_failure_after_push_is_surfaced_distinctly() {
    let (mock, registry, orchestrator) = setup().await;

    // Pre-seed a record so the snapshot transaction hits the UNIQUE
    // constraint after the engine already accepted the push.
    registry
        .commit_mutation(
            RecordMutation::Insert(https_record("app.example.com")),
            &mock.document(),
        )
        .unwrap();
    // The engine has no route for it, so add proceeds past the
    // duplicate check only if we bypass the registry lookup; instead
    // exercise the window through update path: delete the engine-side
    // duplicate guard by using a distinct host with a colliding id.
    let mut collide = https_record("other.example.com");
    collide.id = registry
        .find_by_host("app.example.com")
        .unwrap()
        .unwrap()
        .id;

    let result = orchestrator.add_route(collide).await;
    assert!(matches!(
        result,
        Err(SyncError::PostPushPersistence { .. })
    ));
    // The engine is now ahead of the registry: the route exists live
    // but has no record.
    assert!(mock.document().has_route_for("other.example.com"));
    assert!(registry.find_by_host("other.example.com").unwrap().is_none());
}
