//! qrtag: stored records as scannable QR tags.
//!
//! Looks up one record in a document store by key, drops the store's identity
//! field, serializes the rest as JSON (`{"Code": 1234, "Name": "Widget"}`
//! layout, non-ASCII escaped) and prints it into a QR symbol
//! (version 3, level M, 15px modules, 4-module border by default) written as
//! PNG. Meant for small internal tools: inventory tags, tickets, asset labels.
//!
//! # Pipeline
//!
//! 1. [`core::store::StoreClient::fetch_one`]: first record whose key field
//!    (`Code` by default) equals the lookup key. No match is `Ok(None)`.
//! 2. [`core::payload`]: identity stripping and serialization.
//! 3. [`core::symbol::encode`]: fixed-version symbol, or auto-upgraded when
//!    `auto_version` is set.
//! 4. [`core::writer::write`]: PNG at the caller's path or `qr_<key>.png`.
//!
//! [`core::generator::with_generator`] ties these together with scoped
//! connection handling. [`core::scan`] reads tags back and verifies them.
//!
//! # Examples
//!
//! ```bash
//! qrtag --uri sqlite:///srv/tags --database inventory --collection items \
//!     put --json '{"Code": 1234, "Name": "Widget"}'
//! qrtag --uri sqlite:///srv/tags --database inventory --collection items generate 1234
//! qrtag --uri sqlite:///srv/tags --database inventory --collection items \
//!     scan qr_1234.png --verify
//! ```

pub mod core;

use crate::core::{
    config::{self, QrtagConfig},
    db::OpenMode,
    error::QrtagError,
    generator::with_generator,
    output::{self, Envelope, OutputFormat},
    scan::{self, Verification},
    store::{LookupKey, StoreClient},
};

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

pub const QRTAG_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[clap(
    name = "qrtag",
    version = env!("CARGO_PKG_VERSION"),
    about = "Print stored records as scannable QR tags"
)]
struct Cli {
    /// Config file (defaults to ./qrtag.toml when present).
    #[clap(long, global = true)]
    config: Option<PathBuf>,
    /// Store URI: `sqlite://<dir>` or a directory path.
    #[clap(long, global = true)]
    uri: Option<String>,
    /// Database name (the `<name>.db` file inside the store directory).
    #[clap(long, global = true)]
    database: Option<String>,
    /// Collection name.
    #[clap(long, global = true)]
    collection: Option<String>,
    /// Field the lookup key is matched against.
    #[clap(long, global = true)]
    key_field: Option<String>,
    /// Output format: 'text' or 'json'.
    #[clap(long, global = true, default_value = "text")]
    format: String,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a QR tag for the record matching KEY.
    Generate {
        /// Lookup key; integers match integer fields, anything else matches strings.
        key: String,
        /// Output file (defaults to `<prefix><key>.png`).
        #[clap(short, long)]
        output: Option<PathBuf>,
        /// Pick a larger symbol version when the record does not fit.
        #[clap(long)]
        auto_version: bool,
    },
    /// Load a JSON record (object or array of objects) into the collection.
    Put {
        #[clap(long, conflicts_with = "file")]
        json: Option<String>,
        #[clap(long)]
        file: Option<PathBuf>,
    },
    /// Decode QR tags from an image file.
    Scan {
        image: PathBuf,
        /// Check each decoded payload against the store.
        #[clap(long)]
        verify: bool,
    },
    /// Print the qrtag version.
    Version,
}

fn apply_overrides(config: &mut QrtagConfig, cli: &Cli) {
    if let Some(uri) = &cli.uri {
        config.store.uri = uri.clone();
    }
    if let Some(database) = &cli.database {
        config.store.database = database.clone();
    }
    if let Some(collection) = &cli.collection {
        config.store.collection = collection.clone();
    }
    if let Some(key_field) = &cli.key_field {
        config.store.key_field = key_field.clone();
    }
}

fn emit(format: OutputFormat, cmd: &str, status: &str, extra: Value, text: impl FnOnce()) {
    match format {
        OutputFormat::Json => {
            println!("{}", Envelope::new(cmd, status, extra));
        }
        OutputFormat::Text => text(),
    }
}

fn run_generate(
    config: &QrtagConfig,
    format: OutputFormat,
    key: &str,
    output_path: Option<&Path>,
) -> Result<(), QrtagError> {
    let key = LookupKey::parse(key);
    let key_field = config.store.key_field.clone();
    let generated = with_generator(config, |generator| {
        generator.generate_detailed(&key, output_path)
    })?;

    match generated {
        None => emit(
            format,
            "generate",
            "not_found",
            serde_json::json!({ "key": key.to_json(), "key_field": key_field }),
            || {
                println!(
                    "{}",
                    format!("No document found with {}: {}", key_field, key).yellow()
                )
            },
        ),
        Some(g) => emit(
            format,
            "generate",
            "ok",
            serde_json::json!({
                "key": key.to_json(),
                "path": g.path.display().to_string(),
                "version": g.version,
                "payload": g.payload,
                "payload_sha256": g.digest,
            }),
            || {
                println!(
                    "{} {}",
                    "QR code generated:".green().bold(),
                    g.path.display()
                );
                println!(
                    "  version {}  payload {}",
                    g.version,
                    output::payload_preview(&g.payload, 72)
                );
            },
        ),
    }
    Ok(())
}

fn read_documents(
    json: Option<String>,
    file: Option<PathBuf>,
) -> Result<Vec<Value>, QrtagError> {
    let content = match (json, file) {
        (Some(inline), _) => inline,
        (None, Some(path)) => {
            fs::read_to_string(&path).map_err(|e| QrtagError::io(&path, e))?
        }
        (None, None) => {
            return Err(QrtagError::ValidationError(
                "put needs --json or --file".to_string(),
            ));
        }
    };
    let value: Value = serde_json::from_str(&content)
        .map_err(|e| QrtagError::ValidationError(format!("record is not valid JSON: {}", e)))?;
    Ok(match value {
        Value::Array(items) => items,
        other => vec![other],
    })
}

fn run_put(
    config: &QrtagConfig,
    format: OutputFormat,
    json: Option<String>,
    file: Option<PathBuf>,
) -> Result<(), QrtagError> {
    let documents = read_documents(json, file)?;
    let mut client = StoreClient::from_config(&config.store, OpenMode::ReadWrite)?;
    let inserted = client.insert_many(&documents);
    let close = client.close();
    let ids = inserted?;
    close?;

    emit(
        format,
        "put",
        "ok",
        serde_json::json!({ "ids": ids }),
        || {
            for id in &ids {
                println!("{} {}", "Inserted".green(), id);
            }
        },
    );
    Ok(())
}

fn run_scan(
    config: &QrtagConfig,
    format: OutputFormat,
    image: &Path,
    verify: bool,
) -> Result<(), QrtagError> {
    let payloads = scan::scan_file(image)?;
    if !verify {
        emit(
            format,
            "scan",
            "ok",
            serde_json::json!({ "payloads": payloads }),
            || {
                for payload in &payloads {
                    println!("{}", payload);
                }
            },
        );
        return Ok(());
    }

    let results = with_generator(config, |generator| {
        payloads
            .iter()
            .map(|p| scan::verify(generator.client(), p))
            .collect::<Result<Vec<_>, _>>()
    })?;
    let all_valid = results.iter().all(|r| *r == Verification::Validated);
    let status = if all_valid { "ok" } else { "invalid" };
    emit(
        format,
        "scan",
        status,
        serde_json::json!({ "payloads": payloads, "results": results }),
        || {
            for (payload, result) in payloads.iter().zip(&results) {
                match result {
                    Verification::Validated => {
                        println!("{} {}", "✓ TAG VALIDATED".green().bold(), payload)
                    }
                    Verification::Mismatch { fields } => println!(
                        "{} data mismatch in {}",
                        "✗ VALIDATION FAILED:".red().bold(),
                        fields.join(", ")
                    ),
                    Verification::NotFound { key } => println!(
                        "{} no record with key {}",
                        "✗ VALIDATION FAILED:".red().bold(),
                        key
                    ),
                }
            }
        },
    );
    if all_valid {
        Ok(())
    } else {
        Err(QrtagError::ValidationError(
            "one or more scanned tags did not match the store".to_string(),
        ))
    }
}

pub fn run_from<I, T>(args: I) -> Result<(), QrtagError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let format: OutputFormat = cli.format.parse()?;

    if let Command::Version = cli.command {
        println!("v{}", QRTAG_VERSION);
        return Ok(());
    }

    let cwd = std::env::current_dir().map_err(|e| QrtagError::io(".", e))?;
    let mut config = config::load_config(cli.config.as_deref(), &cwd)?;
    apply_overrides(&mut config, &cli);

    match cli.command {
        Command::Generate {
            key,
            output,
            auto_version,
        } => {
            if auto_version {
                config.symbol.auto_version = true;
            }
            run_generate(&config, format, &key, output.as_deref())
        }
        Command::Put { json, file } => run_put(&config, format, json, file),
        Command::Scan { image, verify } => run_scan(&config, format, &image, verify),
        Command::Version => Ok(()),
    }
}

pub fn run() -> Result<(), QrtagError> {
    run_from(std::env::args_os())
}
