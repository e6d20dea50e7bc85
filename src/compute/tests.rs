//! Tests for the REST client against a local mock server.

use std::net::TcpListener;
use std::time::Duration;

use httpmock::Method::{DELETE, GET};
use httpmock::MockServer;
use serde_json::json;

use super::*;
use crate::resource::{ResourceKind, Scope};

const TOKEN: &str = "test-token";

fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

fn client_for(server: &MockServer) -> ComputeClient {
    ComputeClient::new(&server.base_url(), TOKEN)
        .unwrap_or_else(|err| panic!("client should build: {err}"))
}

#[test]
fn client_rejects_blank_token() {
    let err = ComputeClient::new(DEFAULT_API_ENDPOINT, "  ").expect_err("blank token");
    assert!(matches!(err, ComputeError::Config(_)));
}

#[test]
fn client_rejects_invalid_endpoint() {
    let err = ComputeClient::new("not a url", TOKEN).expect_err("invalid endpoint");
    assert!(matches!(err, ComputeError::Config(_)));
}

#[tokio::test]
async fn list_images_returns_page_and_continuation_token() {
    if !can_bind_localhost() {
        return;
    }
    let server = MockServer::start_async().await;
    let second = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/projects/proj/global/images")
                .query_param("pageToken", "next-1")
                .header("authorization", format!("Bearer {TOKEN}"));
            then.status(200).json_body(json!({
                "items": [
                    {"name": "web-1", "creationTimestamp": "2024-01-01T00:00:00Z"}
                ]
            }));
        })
        .await;
    let first = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/projects/proj/global/images")
                .header("authorization", format!("Bearer {TOKEN}"));
            then.status(200).json_body(json!({
                "items": [
                    {
                        "name": "web-2",
                        "creationTimestamp": "2024-02-01T00:00:00Z",
                        "family": "web"
                    }
                ],
                "nextPageToken": "next-1"
            }));
        })
        .await;

    let client = client_for(&server);
    let page = client
        .list_images("proj", None)
        .await
        .unwrap_or_else(|err| panic!("first page: {err}"));
    assert_eq!(page.next_page_token.as_deref(), Some("next-1"));
    let [image] = page.items.as_slice() else {
        panic!("expected one image, got {:?}", page.items);
    };
    assert_eq!(image.name, "web-2");
    assert_eq!(image.kind, ResourceKind::Image);
    assert_eq!(image.scope, Scope::Global);
    assert_eq!(image.family.as_deref(), Some("web"));

    let last = client
        .list_images("proj", Some("next-1"))
        .await
        .unwrap_or_else(|err| panic!("second page: {err}"));
    assert_eq!(last.next_page_token, None);
    assert_eq!(last.items.len(), 1);

    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn list_instances_reduces_zone_links() {
    if !can_bind_localhost() {
        return;
    }
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/projects/proj/zones/us-central1-a/instances");
            then.status(200).json_body(json!({
                "items": [{
                    "name": "api-7",
                    "creationTimestamp": "2024-01-01T00:00:00Z",
                    "zone": "https://www.googleapis.com/compute/v1/projects/proj/zones/us-central1-a"
                }],
                "nextPageToken": ""
            }));
        })
        .await;

    let page = client_for(&server)
        .list_instances("proj", "us-central1-a", None)
        .await
        .unwrap_or_else(|err| panic!("instances: {err}"));
    assert_eq!(page.next_page_token, None, "empty token ends the listing");
    let [instance] = page.items.as_slice() else {
        panic!("expected one instance, got {:?}", page.items);
    };
    assert_eq!(instance.scope, Scope::Zone(String::from("us-central1-a")));
}

#[tokio::test]
async fn delete_instance_returns_zonal_operation() {
    if !can_bind_localhost() {
        return;
    }
    let server = MockServer::start_async().await;
    let delete = server
        .mock_async(|when, then| {
            when.method(DELETE)
                .path("/projects/proj/zones/europe-west1-b/instances/api-7");
            then.status(200).json_body(json!({
                "name": "operation-123",
                "status": "PENDING",
                "targetLink": "https://www.googleapis.com/compute/v1/projects/proj/zones/europe-west1-b/instances/api-7",
                "zone": "https://www.googleapis.com/compute/v1/projects/proj/zones/europe-west1-b",
                "startTime": "2024-03-01T10:00:00.000-07:00"
            }));
        })
        .await;

    let operation = client_for(&server)
        .delete_instance("proj", "europe-west1-b", "api-7")
        .await
        .unwrap_or_else(|err| panic!("delete: {err}"));
    delete.assert_async().await;
    assert_eq!(operation.id, "operation-123");
    assert_eq!(operation.status, OperationStatus::Pending);
    assert_eq!(operation.scope, Scope::Zone(String::from("europe-west1-b")));
    assert!(operation.start_time.is_some());
}

#[tokio::test]
async fn done_operation_with_errors_is_failed() {
    if !can_bind_localhost() {
        return;
    }
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/projects/proj/global/operations/operation-9");
            then.status(200).json_body(json!({
                "name": "operation-9",
                "status": "DONE",
                "targetLink": "projects/proj/global/images/web-1",
                "error": {"errors": [{"code": "RESOURCE_IN_USE_BY_ANOTHER_RESOURCE", "message": "in use"}]}
            }));
        })
        .await;

    let operation = client_for(&server)
        .get_global_operation("proj", "operation-9")
        .await
        .unwrap_or_else(|err| panic!("operation: {err}"));
    assert_eq!(operation.status, OperationStatus::Failed);
    assert_eq!(operation.scope, Scope::Global);
    assert!(
        operation
            .error
            .as_deref()
            .is_some_and(|message| message.contains("RESOURCE_IN_USE")),
        "unexpected error summary: {:?}",
        operation.error
    );
}

#[tokio::test]
async fn region_operation_uses_region_endpoint() {
    if !can_bind_localhost() {
        return;
    }
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/projects/proj/regions/us-east1/operations/op-r");
            then.status(200).json_body(json!({
                "name": "op-r",
                "status": "RUNNING",
                "region": "https://www.googleapis.com/compute/v1/projects/proj/regions/us-east1"
            }));
        })
        .await;

    let operation = client_for(&server)
        .get_region_operation("proj", "us-east1", "op-r")
        .await
        .unwrap_or_else(|err| panic!("operation: {err}"));
    mock.assert_async().await;
    assert_eq!(operation.status, OperationStatus::Running);
    assert_eq!(operation.scope, Scope::Region(String::from("us-east1")));
}

#[tokio::test]
async fn api_errors_surface_status_and_body() {
    if !can_bind_localhost() {
        return;
    }
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/projects/proj/zones");
            then.status(403).body("{\"error\":{\"message\":\"forbidden\"}}");
        })
        .await;

    let err = client_for(&server)
        .list_zones("proj", None)
        .await
        .expect_err("403 should fail");
    let ComputeError::Api { status, body, .. } = err else {
        panic!("expected Api error, got {err:?}");
    };
    assert_eq!(status, 403);
    assert!(body.contains("forbidden"));
}

#[tokio::test]
async fn unknown_operation_status_is_a_decode_error() {
    if !can_bind_localhost() {
        return;
    }
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/projects/proj/global/operations/op-x");
            then.status(200).json_body(json!({"name": "op-x", "status": "EXPLODED"}));
        })
        .await;

    let err = client_for(&server)
        .get_global_operation("proj", "op-x")
        .await
        .expect_err("unknown status");
    assert!(matches!(err, ComputeError::Decode { .. }));
}

#[tokio::test]
async fn slow_responses_fail_with_a_transport_error() {
    if !can_bind_localhost() {
        return;
    }
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/projects/proj/global/operations/op-slow");
            then.status(200)
                .delay(Duration::from_secs(2))
                .json_body(json!({"name": "op-slow", "status": "DONE"}));
        })
        .await;

    let client =
        ComputeClient::with_request_timeout(&server.base_url(), TOKEN, Duration::from_millis(100))
            .unwrap_or_else(|err| panic!("client should build: {err}"));
    let err = client
        .get_global_operation("proj", "op-slow")
        .await
        .expect_err("request exceeds its timeout");
    assert!(matches!(err, ComputeError::Transport { .. }), "got {err:?}");
}

