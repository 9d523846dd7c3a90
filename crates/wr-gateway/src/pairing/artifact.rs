//! Pairing code artifacts
//!
//! Codes are rendered as QR images named `qr-<YYYYMMDD-HHMMSS>-<phone>.png`
//! so the newest code for a phone is the last one in directory order.

use std::path::{Path, PathBuf};

use image::Luma;
use qrcode::{EcLevel, QrCode};

use wr_core::error::RenderError;
use wr_core::time::local_artifact_stamp;
use wr_core::traits::CodeRenderer;
use wr_core::Phone;

/// Minimum edge length of rendered codes, in pixels
const QR_MIN_SIZE: u32 = 256;

/// Collision suffixes tried before giving up
const MAX_SUFFIX: u32 = 99;

/// File name for a code rendered at `stamp`
pub fn artifact_file_name(phone: &Phone, stamp: &str) -> String {
    format!("qr-{}-{}.png", stamp, phone)
}

/// First free artifact path in `dir` for this phone and stamp.
///
/// Rotations within the same second get `_01`, `_02`, ... appended to the
/// stem. `_` sorts after `.`, so suffixed names still sort after the
/// unsuffixed one.
pub fn unique_artifact_path(dir: &Path, phone: &Phone, stamp: &str) -> PathBuf {
    let base = dir.join(artifact_file_name(phone, stamp));
    if !base.exists() {
        return base;
    }
    for n in 1..=MAX_SUFFIX {
        let candidate = dir.join(format!("qr-{}-{}_{:02}.png", stamp, phone, n));
        if !candidate.exists() {
            return candidate;
        }
    }
    tracing::warn!(phone = %phone, "Exhausted artifact suffixes, overwriting {:?}", base);
    base
}

/// Renders pairing codes as PNG QR codes into a directory
pub struct QrFileRenderer {
    dir: PathBuf,
}

impl QrFileRenderer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl CodeRenderer for QrFileRenderer {
    fn render(&self, phone: &Phone, code: &str) -> Result<PathBuf, RenderError> {
        std::fs::create_dir_all(&self.dir)?;

        let qr = QrCode::with_error_correction_level(code.as_bytes(), EcLevel::M)
            .map_err(|e| RenderError::Encode(e.to_string()))?;
        let image = qr
            .render::<Luma<u8>>()
            .min_dimensions(QR_MIN_SIZE, QR_MIN_SIZE)
            .build();

        let path = unique_artifact_path(&self.dir, phone, &local_artifact_stamp());
        image
            .save(&path)
            .map_err(|e| RenderError::Encode(e.to_string()))?;

        tracing::info!(phone = %phone, "Pairing code written to {:?}", path);
        Ok(path)
    }
}
