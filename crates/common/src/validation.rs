//! Input validation utilities to prevent panics and abuse via uploads
//!
//! This module provides safe validation for all external inputs to prevent:
//! - Panic-induced service crashes
//! - OOM via unbounded labels or payloads
//! - Control-character injection into logs and listings

use anyhow::{anyhow, Result};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// ============================================================================
// CONSTANTS: Input Size Limits
// ============================================================================

/// Maximum length for identity labels
pub const MAX_LABEL_LENGTH: usize = 512;

/// Default maximum size for an uploaded image payload (decoded bytes)
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

// ============================================================================
// Safe Time Operations
// ============================================================================

/// Get current Unix timestamp in seconds, safely handling clock errors
///
/// Returns the timestamp on success, or logs a warning and returns 0 on
/// clock issues
pub fn safe_unix_timestamp() -> u64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_secs(),
        Err(e) => {
            tracing::warn!(
                error = %e,
                "System clock is before UNIX epoch (1970-01-01), using timestamp 0"
            );
            0
        }
    }
}

/// Get duration since UNIX epoch, with safe fallback
pub fn safe_unix_duration() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
}

// ============================================================================
// String Validation
// ============================================================================

/// Validate string length against a maximum
pub fn validate_length(value: &str, max_length: usize, field_name: &str) -> Result<()> {
    if value.len() > max_length {
        return Err(anyhow!(
            "{} exceeds maximum length of {} bytes (got {})",
            field_name,
            max_length,
            value.len()
        ));
    }
    Ok(())
}

/// Validate non-empty string
pub fn validate_non_empty(value: &str, field_name: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("{} cannot be empty", field_name));
    }
    Ok(())
}

/// Validate an identity label (enrollment name)
pub fn validate_label(label: &str) -> Result<()> {
    validate_non_empty(label, "label")?;
    validate_length(label, MAX_LABEL_LENGTH, "label")?;

    // Labels end up in logs and listings; keep control characters out
    if label.chars().any(|c| c.is_control()) {
        return Err(anyhow!("label contains control characters"));
    }

    Ok(())
}

/// Validate a raw upload payload against the configured size bound
pub fn validate_payload_size(payload: &[u8], max_bytes: usize) -> Result<()> {
    if payload.is_empty() {
        return Err(anyhow!("image payload is empty"));
    }
    if payload.len() > max_bytes {
        return Err(anyhow!(
            "image payload exceeds maximum size of {} bytes (got {})",
            max_bytes,
            payload.len()
        ));
    }
    Ok(())
}
