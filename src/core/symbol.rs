//! Payload text to QR symbol raster.
//!
//! Defaults reproduce the labels the tool has always printed: version 3,
//! error-correction level M (~15% damage tolerance), 15px modules, a
//! 4-module quiet border, black on white.
//!
//! With the fixed version a version-3/M symbol holds 42 bytes of mixed text
//! in byte mode. The encoder segments optimally, so digit-heavy payloads can
//! run longer; anything that does not fit fails with `CapacityError` unless
//! `auto_version` is set, in which case the smallest version at or above the
//! configured one that fits is chosen.
//!
//! The rendered edge is bounded by [`MAX_IMAGE_EDGE`] so a bad config cannot
//! overflow the pixel math or allocate an absurd raster.

use crate::core::error::QrtagError;
use image::{GrayImage, Luma, imageops};
use qrcode::types::QrError;
use qrcode::{EcLevel, QrCode, Version};
use serde::{Deserialize, Serialize};

pub const MIN_VERSION: i16 = 1;
pub const MAX_VERSION: i16 = 40;
/// Largest rendered edge in pixels, quiet zone included.
pub const MAX_IMAGE_EDGE: u32 = 8192;

const DARK: Luma<u8> = Luma([0]);
const LIGHT: Luma<u8> = Luma([255]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EcLevelSetting {
    L,
    M,
    Q,
    H,
}

impl EcLevelSetting {
    pub fn to_qr(self) -> EcLevel {
        match self {
            EcLevelSetting::L => EcLevel::L,
            EcLevelSetting::M => EcLevel::M,
            EcLevelSetting::Q => EcLevel::Q,
            EcLevelSetting::H => EcLevel::H,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            EcLevelSetting::L => 'L',
            EcLevelSetting::M => 'M',
            EcLevelSetting::Q => 'Q',
            EcLevelSetting::H => 'H',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionPolicy {
    /// Always the configured version; overflow is a `CapacityError`.
    Fixed,
    /// Smallest version >= the configured one that holds the payload.
    Auto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SymbolConfig {
    pub version: i16,
    pub ec_level: EcLevelSetting,
    /// Pixels per module edge.
    pub module_size: u32,
    /// Quiet zone width in modules.
    pub border: u32,
    pub auto_version: bool,
}

impl Default for SymbolConfig {
    fn default() -> Self {
        Self {
            version: 3,
            ec_level: EcLevelSetting::M,
            module_size: 15,
            border: 4,
            auto_version: false,
        }
    }
}

impl SymbolConfig {
    pub fn validate(&self) -> Result<(), QrtagError> {
        if !(MIN_VERSION..=MAX_VERSION).contains(&self.version) {
            return Err(QrtagError::ConfigError(format!(
                "symbol.version must be within {}..={}, got {}",
                MIN_VERSION, MAX_VERSION, self.version
            )));
        }
        if self.module_size == 0 {
            return Err(QrtagError::ConfigError(
                "symbol.module_size must be at least 1".to_string(),
            ));
        }
        let largest = match self.policy() {
            VersionPolicy::Fixed => self.version,
            VersionPolicy::Auto => MAX_VERSION,
        };
        match expected_edge(largest, self) {
            Some(edge) if edge <= MAX_IMAGE_EDGE => Ok(()),
            Some(edge) => Err(QrtagError::ConfigError(format!(
                "symbol at version {} would be {}px wide (limit {}px); lower module_size or border",
                largest, edge, MAX_IMAGE_EDGE
            ))),
            None => Err(QrtagError::ConfigError(format!(
                "symbol.module_size {} with border {} overflows the image size",
                self.module_size, self.border
            ))),
        }
    }

    pub fn policy(&self) -> VersionPolicy {
        if self.auto_version {
            VersionPolicy::Auto
        } else {
            VersionPolicy::Fixed
        }
    }
}

/// A rendered symbol and the version it was actually encoded at.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub image: GrayImage,
    pub version: i16,
    pub ec_level: EcLevelSetting,
}

fn build_code(text: &str, version: i16, ec: EcLevelSetting) -> Result<QrCode, QrtagError> {
    QrCode::with_version(text.as_bytes(), Version::Normal(version), ec.to_qr()).map_err(
        |e| match e {
            QrError::DataTooLong => QrtagError::CapacityError {
                len: text.len(),
                version,
                ec_level: ec.as_char(),
            },
            other => QrtagError::EncodingError(other.to_string()),
        },
    )
}

fn select_code(text: &str, config: &SymbolConfig) -> Result<(QrCode, i16), QrtagError> {
    match config.policy() {
        VersionPolicy::Fixed => Ok((
            build_code(text, config.version, config.ec_level)?,
            config.version,
        )),
        VersionPolicy::Auto => {
            let mut last_err = None;
            for version in config.version..=MAX_VERSION {
                match build_code(text, version, config.ec_level) {
                    Ok(code) => {
                        if version != config.version {
                            tracing::info!(
                                from = config.version,
                                to = version,
                                len = text.len(),
                                "payload exceeds configured version, upgraded"
                            );
                        }
                        return Ok((code, version));
                    }
                    Err(err @ QrtagError::CapacityError { .. }) => last_err = Some(err),
                    Err(err) => return Err(err),
                }
            }
            Err(last_err.unwrap_or(QrtagError::CapacityError {
                len: text.len(),
                version: MAX_VERSION,
                ec_level: config.ec_level.as_char(),
            }))
        }
    }
}

/// Render `text` into a black-on-white raster.
pub fn encode(text: &str, config: &SymbolConfig) -> Result<Symbol, QrtagError> {
    config.validate()?;
    let (code, version) = select_code(text, config)?;

    let modules = code
        .render::<Luma<u8>>()
        .quiet_zone(false)
        .module_dimensions(config.module_size, config.module_size)
        .dark_color(DARK)
        .light_color(LIGHT)
        .build();

    // Bounded by validate().
    let pad = config.border * config.module_size;
    let mut image = GrayImage::from_pixel(
        modules.width() + 2 * pad,
        modules.height() + 2 * pad,
        LIGHT,
    );
    imageops::replace(&mut image, &modules, i64::from(pad), i64::from(pad));

    tracing::debug!(
        version,
        ec = %config.ec_level.as_char(),
        width = image.width(),
        "symbol rendered"
    );
    Ok(Symbol {
        image,
        version,
        ec_level: config.ec_level,
    })
}

/// Pixel edge of a square symbol: (17 + 4 * version + 2 * border) * module_size.
/// `None` when the result does not fit in a `u32`.
pub fn expected_edge(version: i16, config: &SymbolConfig) -> Option<u32> {
    let version = u32::try_from(version).ok()?;
    config
        .border
        .checked_mul(2)?
        .checked_add(17 + 4 * version)?
        .checked_mul(config.module_size)
}
