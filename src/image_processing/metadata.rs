//! EXIF extraction from inputs and re-embedding into encoded outputs.
//!
//! The EXIF block travels as the raw TIFF structure (the payload that
//! follows the `Exif\0\0` marker in JPEG, or the `eXIf` chunk in PNG), so it
//! can be reinserted byte for byte without re-serializing any tag.

use std::io::Cursor;

use tracing::debug;

use super::format::OutputFormat;
use crate::error::{Result, SymmetryError};

const PNG_SIGNATURE: &[u8; 8] = b"\x89PNG\r\n\x1a\n";
const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
const EXIF_MARKER: &[u8; 6] = b"Exif\0\0";
/// Largest TIFF payload that fits one APP1 segment (length field counts
/// itself and the marker).
const MAX_APP1_PAYLOAD: usize = 65535 - 2 - EXIF_MARKER.len();

/// Pull the raw EXIF block out of an encoded image, if it has one.
pub fn extract_exif(bytes: &[u8]) -> Option<Vec<u8>> {
    let mut cursor = Cursor::new(bytes);
    match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => {
            debug!(len = exif.buf().len(), "Found EXIF block");
            Some(exif.buf().to_vec())
        }
        Err(err) => {
            debug!("No usable EXIF block: {}", err);
            None
        }
    }
}

/// Insert an EXIF block into freshly encoded output.
///
/// Returns the (possibly unchanged) bytes and whether the block was written.
/// Formats without an EXIF slot, and blocks too large for one, are skipped.
pub fn embed_exif(format: OutputFormat, bytes: Vec<u8>, exif: &[u8]) -> Result<(Vec<u8>, bool)> {
    if exif.is_empty() {
        return Ok((bytes, false));
    }

    match format {
        OutputFormat::Png => embed_png(bytes, exif).map(|bytes| (bytes, true)),
        OutputFormat::Jpeg => {
            if exif.len() > MAX_APP1_PAYLOAD {
                debug!(len = exif.len(), "EXIF block too large for APP1, dropping it");
                return Ok((bytes, false));
            }
            embed_jpeg(bytes, exif).map(|bytes| (bytes, true))
        }
        OutputFormat::WebP | OutputFormat::Gif => Ok((bytes, false)),
    }
}

/// Insert an `eXIf` chunk right before the first `IDAT`.
fn embed_png(bytes: Vec<u8>, exif: &[u8]) -> Result<Vec<u8>> {
    if !bytes.starts_with(PNG_SIGNATURE) {
        return Err(SymmetryError::encode(OutputFormat::Png, "encoder produced no PNG signature"));
    }

    let mut offset = PNG_SIGNATURE.len();
    let insert_at = loop {
        let Some(header) = bytes.get(offset..offset + 8) else {
            return Err(SymmetryError::encode(OutputFormat::Png, "no IDAT chunk in encoded PNG"));
        };
        if &header[4..8] == b"IDAT" {
            break offset;
        }
        let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        offset += 12 + length;
    };

    let chunk_len = u32::try_from(exif.len())
        .map_err(|_| SymmetryError::encode(OutputFormat::Png, "EXIF block exceeds chunk size"))?;

    let mut crc = crc32fast::Hasher::new();
    crc.update(b"eXIf");
    crc.update(exif);

    let mut out = Vec::with_capacity(bytes.len() + exif.len() + 12);
    out.extend_from_slice(&bytes[..insert_at]);
    out.extend_from_slice(&chunk_len.to_be_bytes());
    out.extend_from_slice(b"eXIf");
    out.extend_from_slice(exif);
    out.extend_from_slice(&crc.finalize().to_be_bytes());
    out.extend_from_slice(&bytes[insert_at..]);
    Ok(out)
}

/// Insert an APP1 `Exif` segment after SOI, or after a leading JFIF APP0.
fn embed_jpeg(bytes: Vec<u8>, exif: &[u8]) -> Result<Vec<u8>> {
    if !bytes.starts_with(&JPEG_SOI) {
        return Err(SymmetryError::encode(OutputFormat::Jpeg, "encoder produced no SOI marker"));
    }

    let mut insert_at = 2;
    if bytes.get(2..4) == Some(&[0xFF, 0xE0]) {
        if let Some(len) = bytes.get(4..6) {
            insert_at = 4 + u16::from_be_bytes([len[0], len[1]]) as usize;
        }
    }
    let insert_at = insert_at.min(bytes.len());

    let segment_len = (2 + EXIF_MARKER.len() + exif.len()) as u16;
    let mut out = Vec::with_capacity(bytes.len() + exif.len() + 10);
    out.extend_from_slice(&bytes[..insert_at]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&segment_len.to_be_bytes());
    out.extend_from_slice(EXIF_MARKER);
    out.extend_from_slice(exif);
    out.extend_from_slice(&bytes[insert_at..]);
    Ok(out)
}
