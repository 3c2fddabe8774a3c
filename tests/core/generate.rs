use qrtag::core::config::QrtagConfig;
use qrtag::core::error::QrtagError;
use qrtag::core::generator::{Generator, with_generator};
use qrtag::core::scan::scan_file;
use qrtag::core::store::{LookupKey, StoreClient};
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn seed(dir: &Path, docs: &[Value]) -> QrtagConfig {
    let uri = format!("sqlite://{}", dir.display());
    let client = StoreClient::connect_writable(&uri, "inventory", "items").unwrap();
    for doc in docs {
        client.insert_one(doc).unwrap();
    }
    client.close().unwrap();

    let mut config = QrtagConfig::default();
    config.store.uri = uri;
    config.store.database = "inventory".to_string();
    config.store.collection = "items".to_string();
    config.output.dir = dir.to_path_buf();
    config
}

fn png_count(dir: &Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .unwrap()
                .path()
                .extension()
                .is_some_and(|ext| ext == "png")
        })
        .count()
}

#[test]
fn end_to_end_widget_tag() {
    let tmp = tempdir().unwrap();
    let config = seed(
        tmp.path(),
        &[json!({"_id": "x", "Code": 1234, "Name": "Widget"})],
    );

    let path = with_generator(&config, |g| g.generate(&LookupKey::Int(1234), None))
        .unwrap()
        .expect("record exists");

    assert_eq!(path, tmp.path().join("qr_1234.png"));
    assert_eq!(path.file_name().unwrap(), "qr_1234.png");
    let payloads = scan_file(&path).unwrap();
    assert_eq!(payloads, vec![r#"{"Code": 1234, "Name": "Widget"}"#.to_string()]);
}

#[test]
fn missing_record_returns_none_and_writes_nothing() {
    let tmp = tempdir().unwrap();
    let config = seed(tmp.path(), &[json!({"Code": 1, "Name": "Bolt"})]);

    let result = with_generator(&config, |g| g.generate(&LookupKey::Int(999), None)).unwrap();
    assert!(result.is_none());
    assert_eq!(png_count(tmp.path()), 0);
}

#[test]
fn identity_never_reaches_the_payload() {
    let tmp = tempdir().unwrap();
    let config = seed(
        tmp.path(),
        &[json!({"_id": "secret-identity-42", "Code": 5, "Name": "Nut"})],
    );

    let generated = with_generator(&config, |g| g.generate_detailed(&LookupKey::Int(5), None))
        .unwrap()
        .unwrap();
    assert!(!generated.payload.contains("_id"));
    assert!(!generated.payload.contains("secret-identity-42"));
    let decoded = scan_file(&generated.path).unwrap();
    assert!(!decoded[0].contains("secret-identity-42"));
}

#[test]
fn capacity_boundary_for_fixed_version() {
    let tmp = tempdir().unwrap();
    // `{"Code": 7, "n": "` + padding + `"}` is 20 bytes of framing.
    let fits = json!({"Code": 7, "n": "a".repeat(22)});
    let over = json!({"Code": 8, "n": "a".repeat(23)});
    let config = seed(tmp.path(), &[fits, over]);

    let ok = with_generator(&config, |g| g.generate_detailed(&LookupKey::Int(7), None))
        .unwrap()
        .unwrap();
    assert_eq!(ok.payload.len(), 42);
    assert_eq!(ok.version, 3);

    let err = with_generator(&config, |g| g.generate(&LookupKey::Int(8), None)).unwrap_err();
    match err {
        QrtagError::CapacityError { len, version, .. } => {
            assert_eq!(len, 43);
            assert_eq!(version, 3);
        }
        other => panic!("expected capacity error, got {:?}", other),
    }
    assert!(!tmp.path().join("qr_8.png").exists());
}

#[test]
fn auto_version_fits_large_records() {
    let tmp = tempdir().unwrap();
    let mut config = seed(
        tmp.path(),
        &[json!({
            "Code": 77,
            "Name": "Industrial hex bolt, zinc plated",
            "Date": "2024-05-01",
            "TicketNumber": 4411,
            "Location": "Aisle 14, shelf C"
        })],
    );
    config.symbol.auto_version = true;

    let generated = with_generator(&config, |g| g.generate_detailed(&LookupKey::Int(77), None))
        .unwrap()
        .unwrap();
    assert!(generated.version > 3);
    assert_eq!(scan_file(&generated.path).unwrap(), vec![generated.payload.clone()]);
}

#[test]
fn explicit_output_path_wins() {
    let tmp = tempdir().unwrap();
    let config = seed(tmp.path(), &[json!({"Code": "A-7", "Name": "Crate"})]);
    let target = tmp.path().join("custom-name.png");

    let path = with_generator(&config, |g| {
        g.generate(&LookupKey::from("A-7"), Some(target.as_path()))
    })
    .unwrap()
    .unwrap();
    assert_eq!(path, target);
    assert!(target.exists());
    assert!(!tmp.path().join("qr_A-7.png").exists());
}

#[test]
fn unwritable_output_path_is_an_io_error_with_path() {
    let tmp = tempdir().unwrap();
    let config = seed(tmp.path(), &[json!({"Code": 3, "Name": "Washer"})]);
    let target = tmp.path().join("missing").join("tag.png");

    let err = with_generator(&config, |g| g.generate(&LookupKey::Int(3), Some(target.as_path())))
        .unwrap_err();
    match err {
        QrtagError::IoError { path, .. } => assert_eq!(path, target),
        other => panic!("expected io error, got {:?}", other),
    }
}

#[test]
fn first_match_wins_on_duplicate_keys() {
    let tmp = tempdir().unwrap();
    let config = seed(
        tmp.path(),
        &[
            json!({"Code": 10, "Name": "first"}),
            json!({"Code": 10, "Name": "second"}),
        ],
    );
    let generated = with_generator(&config, |g| g.generate_detailed(&LookupKey::Int(10), None))
        .unwrap()
        .unwrap();
    assert_eq!(generated.payload, r#"{"Code": 10, "Name": "first"}"#);
}

#[test]
fn output_is_reproducible_for_the_same_stored_state() {
    let tmp = tempdir().unwrap();
    let config = seed(tmp.path(), &[json!({"Code": 12, "Name": "Gear", "Teeth": 24})]);

    let first = with_generator(&config, |g| g.generate_detailed(&LookupKey::Int(12), None))
        .unwrap()
        .unwrap();
    let first_bytes = fs::read(&first.path).unwrap();
    let second = with_generator(&config, |g| g.generate_detailed(&LookupKey::Int(12), None))
        .unwrap()
        .unwrap();
    assert_eq!(first.payload, second.payload);
    assert_eq!(first.digest, second.digest);
    assert_eq!(first_bytes, fs::read(&second.path).unwrap());
}

#[test]
fn closure_errors_propagate_unchanged() {
    let tmp = tempdir().unwrap();
    let config = seed(tmp.path(), &[json!({"Code": 1})]);
    let err = with_generator(&config, |_| -> Result<(), QrtagError> {
        Err(QrtagError::ValidationError("boom".to_string()))
    })
    .unwrap_err();
    assert!(matches!(err, QrtagError::ValidationError(msg) if msg == "boom"));
}

#[test]
fn generator_requires_a_reachable_store() {
    let tmp = tempdir().unwrap();
    let mut config = QrtagConfig::default();
    config.store.uri = tmp.path().join("nowhere").display().to_string();
    config.store.database = "inventory".to_string();
    config.store.collection = "items".to_string();
    assert!(matches!(
        Generator::open(&config),
        Err(QrtagError::ConnectionError(_))
    ));
}
