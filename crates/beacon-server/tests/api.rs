//! Router tests for the webhook endpoints.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use beacon_alerts::destination::testing::RecordingDestination;
use beacon_alerts::{
    AlertDispatcher, AlertPipeline, Destination, DestinationError, DestinationRegistry, IssueConverter,
    LabelEnricher, PrometheusMetrics, Team, TeamResolver,
};
use beacon_server::{create_router, AppState};
use http_body_util::BodyExt;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    state: Arc<AppState>,
}

fn app(destinations: &[RecordingDestination], teams: Vec<Team>) -> TestApp {
    let registry = Arc::new(DestinationRegistry::new());
    for destination in destinations {
        registry.register(destination.name().to_string(), Arc::new(destination.clone()));
    }
    let metrics = Arc::new(PrometheusMetrics::new());
    let pipeline = AlertPipeline::new(
        IssueConverter::new().with_enricher(LabelEnricher::default()),
        TeamResolver::new(teams),
        AlertDispatcher::new(registry.clone()).with_metrics(metrics.clone()),
    )
    .with_metrics(metrics.clone());

    let state = Arc::new(AppState::new(pipeline, registry, metrics));
    state.set_ready(true);
    TestApp {
        router: create_router(state.clone()),
        state,
    }
}

fn ops() -> (RecordingDestination, Team) {
    (
        RecordingDestination::new("ops-slack"),
        Team::new("ops").with_destination("ops-slack"),
    )
}

async fn post_alerts(router: Router, body: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/alerts")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn get(router: Router, uri: &str) -> (StatusCode, String) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

const VALID_ALERT: &str = r#"{
    "receiver": "beacon",
    "status": "firing",
    "alerts": [{
        "status": "firing",
        "labels": {"alertname": "HighCPU", "severity": "critical", "pod": "api-1", "namespace": "payments"},
        "annotations": {"summary": "CPU above 90%", "runbook_url": "https://runbooks/cpu"},
        "startsAt": "2024-05-01T12:00:00Z",
        "endsAt": "0001-01-01T00:00:00Z",
        "generatorURL": "http://prometheus/graph",
        "fingerprint": "abc123"
    }],
    "groupLabels": {"alertname": "HighCPU"},
    "commonLabels": {"alertname": "HighCPU"},
    "commonAnnotations": {},
    "externalURL": "http://alertmanager",
    "version": "4",
    "groupKey": "{}:{alertname=\"HighCPU\"}",
    "truncatedAlerts": 0
}"#;

mod alerts_endpoint {
    use super::*;

    #[tokio::test]
    async fn valid_alert_is_processed() {
        let (destination, team) = ops();
        let test = app(&[destination.clone()], vec![team]);

        let (status, json) = post_alerts(test.router, VALID_ALERT).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "alert processed");
        assert_eq!(destination.calls(), 1);

        let notification = &destination.received()[0];
        assert_eq!(notification.title, "CPU above 90%");
        assert_eq!(notification.issues[0].fingerprint, "abc123");
        assert!(notification.text.contains("<https://runbooks/cpu|Runbook>"));
    }

    #[tokio::test]
    async fn empty_body() {
        let test = app(&[], Vec::new());
        let (status, json) = post_alerts(test.router, "").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "empty JSON body");
    }

    #[tokio::test]
    async fn malformed_json() {
        let test = app(&[], Vec::new());
        let (status, json) = post_alerts(test.router, "{not json").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "invalid alert format");
    }

    #[tokio::test]
    async fn missing_fields() {
        let (destination, team) = ops();
        let test = app(&[destination.clone()], vec![team]);

        let (status, json) = post_alerts(test.router, r#"{"receiver": "beacon"}"#).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "invalid alert format: missing status field");
        assert_eq!(destination.calls(), 0);
    }

    #[tokio::test]
    async fn unknown_fields_are_ignored() {
        let (destination, team) = ops();
        let test = app(&[destination.clone()], vec![team]);
        let body = VALID_ALERT.replacen('{', r#"{"extra": {"nested": true},"#, 1);

        let (status, _) = post_alerts(test.router, &body).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(destination.calls(), 1);
    }

    #[tokio::test]
    async fn team_without_destinations_is_ok() {
        let test = app(&[], vec![Team::new("quiet")]);
        let (status, json) = post_alerts(test.router, VALID_ALERT).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "alert processed");
    }

    #[tokio::test]
    async fn delivery_failure_is_server_error() {
        let failing = RecordingDestination::failing(
            "ops-slack",
            DestinationError::Api {
                reason: "channel_not_found".to_string(),
            },
        );
        let backup = RecordingDestination::new("backup");
        let team = Team::new("ops")
            .with_destination("ops-slack")
            .with_destination("backup");
        let test = app(&[failing.clone(), backup.clone()], vec![team]);

        let (status, json) = post_alerts(test.router, VALID_ALERT).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "dispatch_failed");
        assert!(json["message"]
            .as_str()
            .unwrap()
            .contains("ops-slack: api error: channel_not_found"));
        assert_eq!(backup.calls(), 1);
    }
}

mod health_endpoints {
    use super::*;

    #[tokio::test]
    async fn livez() {
        let test = app(&[], Vec::new());
        let (status, body) = get(test.router, "/livez").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#""status":"ok""#));
    }

    #[tokio::test]
    async fn readyz_reports_counts() {
        let (destination, team) = ops();
        let test = app(&[destination], vec![team]);

        let (status, body) = get(test.router, "/readyz").await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["destinations"], 1);
        assert_eq!(json["teams"], 1);
    }

    #[tokio::test]
    async fn healthz_unavailable_during_shutdown() {
        let test = app(&[], Vec::new());
        test.state.shutdown_token().cancel();

        let (status, body) = get(test.router, "/healthz").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.contains("unavailable"));
    }
}

mod metrics_endpoint {
    use super::*;

    #[tokio::test]
    async fn exposes_pipeline_counters() {
        let (destination, team) = ops();
        let test = app(&[destination], vec![team]);

        let (status, _) = post_alerts(test.router.clone(), VALID_ALERT).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = get(test.router, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"beacon_alerts_received_total{receiver="beacon",status="firing"} 1"#));
        assert!(body.contains(
            r#"beacon_alerts_processed_total{alertname="HighCPU",severity="critical",outcome="processed"} 1"#
        ));
        assert!(body.contains(
            r#"beacon_destination_messages_total{destination="ops-slack",kind="recording"} 1"#
        ));
    }
}
