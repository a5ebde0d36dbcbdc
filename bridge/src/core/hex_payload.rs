//! Decoding of hex dumps captured from the remote shell.

use anyhow::{Context, Result};

/// Decode a hex dump into raw bytes.
///
/// Empty (or whitespace-only) output means the file was not readable and yields
/// `Ok(None)`. Anything else must be an even-length hex string once trimmed;
/// malformed output is an error, not a missing file.
pub fn decode_hex_payload(output: &str) -> Result<Option<Vec<u8>>> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let bytes = hex::decode(trimmed)
        .with_context(|| format!("decode hex payload ({} chars)", trimmed.len()))?;
    Ok(Some(bytes))
}
