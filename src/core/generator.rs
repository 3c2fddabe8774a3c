//! Lookup, serialize, encode, write.
//!
//! The [`Generator`] owns the store connection for its lifetime. Use
//! [`with_generator`] for scoped use: the connection is released whether the
//! closure succeeds or fails.

use crate::core::config::QrtagConfig;
use crate::core::db::OpenMode;
use crate::core::error::QrtagError;
use crate::core::payload;
use crate::core::store::{LookupKey, Record, StoreClient};
use crate::core::symbol::{self, Symbol, SymbolConfig};
use crate::core::writer::{self, OutputConfig};
use std::path::{Path, PathBuf};

/// Everything a successful `generate` produced.
#[derive(Debug, Clone)]
pub struct Generated {
    pub path: PathBuf,
    pub payload: String,
    pub digest: String,
    pub version: i16,
}

#[derive(Debug)]
pub struct Generator {
    client: StoreClient,
    symbol: SymbolConfig,
    output: OutputConfig,
}

impl Generator {
    pub fn new(client: StoreClient, symbol: SymbolConfig, output: OutputConfig) -> Self {
        Self {
            client,
            symbol,
            output,
        }
    }

    pub fn open(config: &QrtagConfig) -> Result<Self, QrtagError> {
        config.validate()?;
        let client = StoreClient::from_config(&config.store, OpenMode::ReadOnly)?;
        Ok(Self::new(client, config.symbol.clone(), config.output.clone()))
    }

    pub fn client(&self) -> &StoreClient {
        &self.client
    }

    /// Strip identity, serialize and encode. Nothing touches the filesystem.
    pub fn render(&self, record: &Record) -> Result<(String, Symbol), QrtagError> {
        let cleaned = payload::strip_identity(record);
        let text = payload::serialize(&cleaned)?;
        let symbol = symbol::encode(&text, &self.symbol)?;
        Ok((text, symbol))
    }

    pub fn output_path(&self, key: &LookupKey, explicit: Option<&Path>) -> PathBuf {
        match explicit {
            Some(path) => path.to_path_buf(),
            None => self.output.path_for(key),
        }
    }

    /// Output path on success, `None` when no record matches `key`.
    pub fn generate(
        &self,
        key: &LookupKey,
        output_path: Option<&Path>,
    ) -> Result<Option<PathBuf>, QrtagError> {
        Ok(self.generate_detailed(key, output_path)?.map(|g| g.path))
    }

    pub fn generate_detailed(
        &self,
        key: &LookupKey,
        output_path: Option<&Path>,
    ) -> Result<Option<Generated>, QrtagError> {
        let Some(record) = self.client.fetch_one(key)? else {
            tracing::info!(field = self.client.key_field(), %key, "no document found");
            return Ok(None);
        };

        let (text, symbol) = self.render(&record)?;
        let path = self.output_path(key, output_path);
        let path = writer::write(&symbol.image, &path)?;
        tracing::info!(%key, path = %path.display(), version = symbol.version, "QR code generated");

        Ok(Some(Generated {
            path,
            digest: payload::payload_digest(&text),
            payload: text,
            version: symbol.version,
        }))
    }

    pub fn close(self) -> Result<(), QrtagError> {
        self.client.close()
    }
}

/// Open a generator, run `f`, and close the connection on every path.
pub fn with_generator<F, R>(config: &QrtagConfig, f: F) -> Result<R, QrtagError>
where
    F: FnOnce(&Generator) -> Result<R, QrtagError>,
{
    let generator = Generator::open(config)?;
    let result = f(&generator);
    match (result, generator.close()) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_err)) => Err(close_err),
        (Err(err), close) => {
            if let Err(close_err) = close {
                tracing::warn!(error = %close_err, "store close failed after error");
            }
            Err(err)
        }
    }
}
