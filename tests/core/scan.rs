use qrtag::core::config::QrtagConfig;
use qrtag::core::error::QrtagError;
use qrtag::core::generator::with_generator;
use qrtag::core::scan::{Verification, scan_file, verify};
use qrtag::core::store::{LookupKey, StoreClient};
use serde_json::json;
use std::fs;
use tempfile::tempdir;

fn ticket_store(dir: &std::path::Path) -> String {
    let uri = dir.display().to_string();
    let client = StoreClient::connect_writable(&uri, "events", "tickets").unwrap();
    client
        .insert_one(&json!({
            "_id": "t-1",
            "Name": "Ada",
            "Code": 1234,
            "Date": "2024-09-01",
            "TicketNumber": 17
        }))
        .unwrap();
    client.close().unwrap();
    uri
}

#[test]
fn generated_ticket_verifies() {
    let tmp = tempdir().unwrap();
    let uri = ticket_store(tmp.path());
    let mut config = QrtagConfig::default();
    config.store.uri = uri.clone();
    config.store.database = "events".to_string();
    config.store.collection = "tickets".to_string();
    config.symbol.auto_version = true;
    config.output.dir = tmp.path().to_path_buf();

    let path = with_generator(&config, |g| g.generate(&LookupKey::Int(1234), None))
        .unwrap()
        .unwrap();
    let payloads = scan_file(&path).unwrap();
    assert_eq!(payloads.len(), 1);

    let client = StoreClient::connect(&uri, "events", "tickets").unwrap();
    assert_eq!(verify(&client, &payloads[0]).unwrap(), Verification::Validated);
}

#[test]
fn tampered_payload_reports_mismatched_fields() {
    let tmp = tempdir().unwrap();
    let uri = ticket_store(tmp.path());
    let client = StoreClient::connect(&uri, "events", "tickets").unwrap();

    let forged = r#"{"Name":"Eve","Code":1234,"Date":"2024-09-01"}"#;
    assert_eq!(
        verify(&client, forged).unwrap(),
        Verification::Mismatch {
            fields: vec!["Name".to_string(), "TicketNumber".to_string()]
        }
    );
}

#[test]
fn unknown_ticket_is_not_found() {
    let tmp = tempdir().unwrap();
    let uri = ticket_store(tmp.path());
    let client = StoreClient::connect(&uri, "events", "tickets").unwrap();
    assert_eq!(
        verify(&client, r#"{"Code":9999,"Name":"Ada"}"#).unwrap(),
        Verification::NotFound {
            key: "9999".to_string()
        }
    );
}

#[test]
fn payload_without_key_field_is_rejected() {
    let tmp = tempdir().unwrap();
    let uri = ticket_store(tmp.path());
    let client = StoreClient::connect(&uri, "events", "tickets").unwrap();
    assert!(matches!(
        verify(&client, r#"{"Name":"Ada"}"#),
        Err(QrtagError::ValidationError(_))
    ));
}

#[test]
fn scanning_non_images_and_missing_files() {
    let tmp = tempdir().unwrap();
    let bogus = tmp.path().join("not-an-image.png");
    fs::write(&bogus, b"plain text").unwrap();
    assert!(matches!(
        scan_file(&bogus),
        Err(QrtagError::ValidationError(_))
    ));

    let missing = tmp.path().join("missing.png");
    match scan_file(&missing).unwrap_err() {
        QrtagError::IoError { path, .. } => assert_eq!(path, missing),
        other => panic!("expected io error, got {:?}", other),
    }
}
