//! Structural image format sniffing.
//!
//! Classification is by byte signature only. File extensions and declared
//! content types are attacker-controlled and never consulted.

/// Image kinds the ingestion pipeline recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Heic,
    Heif,
}

impl ImageKind {
    /// Stable lowercase name, used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Heic => "heic",
            Self::Heif => "heif",
        }
    }

    /// Whether bytes of this kind decode without prior transcoding
    pub fn is_directly_decodable(&self) -> bool {
        matches!(self, Self::Jpeg | Self::Png)
    }
}

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// HEVC-coded still image brands
const HEIC_BRANDS: [&[u8; 4]; 3] = [b"heic", b"heix", b"hevc"];

/// Generic HEIF container brands
const HEIF_BRANDS: [&[u8; 4]; 2] = [b"mif1", b"msf1"];

/// Classify a raw byte sequence by structural signature.
///
/// Returns `None` for empty or unrecognized input. Pure; no side effects.
pub fn sniff(bytes: &[u8]) -> Option<ImageKind> {
    if bytes.len() >= 3 && bytes[0] == 0xFF && bytes[1] == 0xD8 && bytes[2] == 0xFF {
        return Some(ImageKind::Jpeg);
    }

    if bytes.len() >= PNG_SIGNATURE.len() && bytes[..PNG_SIGNATURE.len()] == PNG_SIGNATURE {
        return Some(ImageKind::Png);
    }

    sniff_isobmff(bytes)
}

/// Inspect a leading ISO-BMFF `ftyp` box for HEIC/HEIF brands.
///
/// The major brand sits at offset 8; compatible brands follow the minor
/// version from offset 16 to the end of the box. Brand position varies
/// between encoders, so every slot is scanned rather than assuming a
/// fixed offset. HEVC-specific brands take precedence over the generic
/// container brands.
fn sniff_isobmff(bytes: &[u8]) -> Option<ImageKind> {
    if bytes.len() < 16 || &bytes[4..8] != b"ftyp" {
        return None;
    }

    let box_len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    if box_len < 16 {
        return None;
    }

    // A truncated upload still sniffs as HEIC/HEIF; the transcoder is the
    // stage that rejects it.
    let end = box_len.min(bytes.len());

    let mut saw_heif = false;
    let mut offset = 8;
    while offset + 4 <= end {
        let brand = &bytes[offset..offset + 4];
        if HEIC_BRANDS.iter().any(|b| &b[..] == brand) {
            return Some(ImageKind::Heic);
        }
        if HEIF_BRANDS.iter().any(|b| &b[..] == brand) {
            saw_heif = true;
        }
        // Skip the minor-version word between major brand and compatible brands
        offset = if offset == 8 { 16 } else { offset + 4 };
    }

    if saw_heif {
        Some(ImageKind::Heif)
    } else {
        None
    }
}
