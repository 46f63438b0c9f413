//! REST contract of the metadata backend, checked against a mock server

use crate::fixtures::{FakeSystem, create_vendor_tree, nas_target};
use eclipse_ingest::models::{DeliveryRecord, EntityKind};
use eclipse_ingest::services::delivery::register_delivery;
use eclipse_ingest::services::sink::http::HttpSink;
use eclipse_ingest::services::sink::{MetadataRequest, MetadataSink};
use eclipse_ingest::{CopyContext, CopyJob, Error, FolderMapping};
use httpmock::prelude::*;
use serde_json::json;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

fn sink_for(server: &MockServer) -> HttpSink {
    HttpSink::new(&server.base_url(), Duration::from_secs(5)).unwrap()
}

#[test]
fn test_post_goes_to_entity_endpoint() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/delivery")
            .json_body(json!({
                "receiver_name": "north-office",
                "date": "2024-05-01",
                "comments": ""
            }));
        then.status(201)
            .header("content-type", "application/json")
            .json_body(json!({"delivery_id": 7}));
    });

    let delivery = DeliveryRecord::new(
        "north-office".to_string(),
        "2024-05-01".to_string(),
        String::new(),
    );
    let request = MetadataRequest::post(EntityKind::Delivery, &delivery).unwrap();
    let reply = sink_for(&server).send(&request).unwrap();

    mock.assert();
    assert_eq!(reply["delivery_id"], 7);
}

#[test]
fn test_get_sends_query_parameters() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/nasbox")
            .query_param("ipv4_addr", "192.168.1.10");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!([{"nas_id": 3, "name": "nas01"}]));
    });

    let request =
        MetadataRequest::get(EntityKind::Nasbox, [("ipv4_addr", "192.168.1.10")]).unwrap();
    let reply = sink_for(&server).send(&request).unwrap();

    mock.assert();
    assert_eq!(reply[0]["nas_id"], 3);
}

#[test]
fn test_error_status_is_request_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/drive");
        then.status(500).body("internal error");
    });

    let request = MetadataRequest::post(EntityKind::Drive, &json!({"file_count": 1})).unwrap();
    let err = sink_for(&server).send(&request).unwrap_err();
    assert!(matches!(err, Error::Request(msg) if msg.contains("500")));
}

#[test]
fn test_empty_body_is_null() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/sensordata");
        then.status(200);
    });

    let request = MetadataRequest::post(EntityKind::SensorData, &json!([])).unwrap();
    let reply = sink_for(&server).send(&request).unwrap();
    assert!(reply.is_null());
}

#[test]
fn test_unreachable_backend_is_connection_error() {
    let sink = HttpSink::new("http://127.0.0.1:1/", Duration::from_secs(2)).unwrap();
    assert_eq!(sink.base_url(), "http://127.0.0.1:1");

    let request = MetadataRequest::get(EntityKind::Delivery, [("date", "2024-05-01")]).unwrap();
    let err = sink.send(&request).unwrap_err();
    assert!(matches!(err, Error::Connection(_)), "{err}");
}

#[test]
fn test_base_url_requires_scheme() {
    let err = HttpSink::new("127.0.0.1:8000", Duration::from_secs(1)).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn test_register_delivery_over_http() {
    let server = MockServer::start();
    let lookup = server.mock(|when, then| {
        when.method(GET)
            .path("/api/delivery")
            .query_param("receiver_name", "north-office")
            .query_param("date", "2024-05-01");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!([]));
    });
    let create = server.mock(|when, then| {
        when.method(POST).path("/api/delivery");
        then.status(201)
            .header("content-type", "application/json")
            .json_body(json!({"delivery_id": 12}));
    });

    let delivery = DeliveryRecord::new(
        "north-office".to_string(),
        "2024-05-01".to_string(),
        "two drives".to_string(),
    );
    let reply = register_delivery(&sink_for(&server), &delivery).unwrap();

    lookup.assert();
    create.assert();
    assert_eq!(reply["delivery_id"], 12);
}

#[test]
fn test_duplicate_delivery_rejected_over_http() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/delivery");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!([{"delivery_id": 12}]));
    });

    let delivery = DeliveryRecord::new(
        "north-office".to_string(),
        "2024-05-01".to_string(),
        String::new(),
    );
    let err = register_delivery(&sink_for(&server), &delivery).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(msg) if msg.contains("already exists")));
}

#[test]
fn test_copy_job_submits_to_backend() {
    let temp = TempDir::new().unwrap();
    let root = create_vendor_tree(temp.path()).unwrap();
    let dest = temp.path().join("nas");
    fs::create_dir_all(&dest).unwrap();

    let server = MockServer::start();
    let drive = server.mock(|when, then| {
        when.method(POST).path("/api/drive");
        then.status(201)
            .header("content-type", "application/json")
            .json_body(json!({"id": 1}));
    });
    let records = server.mock(|when, then| {
        when.method(POST).path("/api/sensordata");
        then.status(201)
            .header("content-type", "application/json")
            .json_body(json!([{"id": 1}]));
    });

    let system = FakeSystem::unix();
    let sink = sink_for(&server);
    let mut job = CopyJob::new(&root, &FolderMapping::riprocess_to_geobc(), &system).unwrap();
    job.set_identifiers(3, 17);
    job.set_destination(nas_target(&dest));

    let outcome = job.copy(&CopyContext::new(&sink, &system)).unwrap();

    drive.assert();
    records.assert();
    assert!(outcome.is_success());
}

#[test]
fn test_copy_job_with_silent_backend() {
    let temp = TempDir::new().unwrap();
    let root = create_vendor_tree(temp.path()).unwrap();
    let dest = temp.path().join("nas");
    fs::create_dir_all(&dest).unwrap();

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/drive");
        then.status(200);
    });

    let system = FakeSystem::unix();
    let sink = sink_for(&server);
    let mut job = CopyJob::new(&root, &FolderMapping::riprocess_to_geobc(), &system).unwrap();
    job.set_identifiers(3, 17);
    job.set_destination(nas_target(&dest));

    let err = job.copy(&CopyContext::new(&sink, &system)).unwrap_err();
    assert!(matches!(err, Error::Connection(_)), "{err}");
}
