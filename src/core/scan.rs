//! Read printed tags back and check them against the store.
//!
//! Scanning works on image files; the decoded payload is the JSON object the
//! generator wrote. Verification re-fetches the record by the payload's key
//! field and compares field by field.

use crate::core::error::QrtagError;
use crate::core::payload;
use crate::core::store::{LookupKey, Record, StoreClient};
use image::GrayImage;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verification {
    Validated,
    /// Fields whose values differ, or that exist on one side only.
    Mismatch { fields: Vec<String> },
    NotFound { key: String },
}

/// Decode every QR symbol found in `image`, in detection order.
pub fn decode_image(image: &GrayImage) -> Vec<String> {
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        image.width() as usize,
        image.height() as usize,
        |x, y| image.get_pixel(x as u32, y as u32).0[0],
    );
    prepared
        .detect_grids()
        .into_iter()
        .filter_map(|grid| match grid.decode() {
            Ok((_, content)) => Some(content),
            Err(e) => {
                tracing::warn!(error = %e, "QR grid detected but not decodable");
                None
            }
        })
        .collect()
}

pub fn scan_file(path: &Path) -> Result<Vec<String>, QrtagError> {
    let image = image::open(path).map_err(|e| match e {
        image::ImageError::IoError(io) => QrtagError::io(path, io),
        other => QrtagError::ValidationError(format!(
            "{} is not a readable image: {}",
            path.display(),
            other
        )),
    })?;
    let payloads = decode_image(&image.to_luma8());
    if payloads.is_empty() {
        return Err(QrtagError::ValidationError(format!(
            "no QR code detected in {}",
            path.display()
        )));
    }
    Ok(payloads)
}

pub fn parse_payload(text: &str) -> Result<Record, QrtagError> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(QrtagError::ValidationError(
            "payload is not a JSON object".to_string(),
        )),
        Err(e) => Err(QrtagError::ValidationError(format!(
            "payload is not JSON: {}",
            e
        ))),
    }
}

pub fn diff_fields(scanned: &Record, stored: &Record) -> Vec<String> {
    let names: BTreeSet<&String> = scanned.keys().chain(stored.keys()).collect();
    names
        .into_iter()
        .filter(|name| scanned.get(name.as_str()) != stored.get(name.as_str()))
        .cloned()
        .collect()
}

pub fn verify(client: &StoreClient, text: &str) -> Result<Verification, QrtagError> {
    let scanned = parse_payload(text)?;
    let field = client.key_field();
    let key = scanned
        .get(field)
        .and_then(LookupKey::from_json)
        .ok_or_else(|| {
            QrtagError::ValidationError(format!("payload has no usable {} field", field))
        })?;

    let Some(record) = client.fetch_one(&key)? else {
        return Ok(Verification::NotFound {
            key: key.to_string(),
        });
    };
    let stored = payload::strip_identity(&record);
    let fields = diff_fields(&scanned, &stored);
    if fields.is_empty() {
        Ok(Verification::Validated)
    } else {
        Ok(Verification::Mismatch { fields })
    }
}
