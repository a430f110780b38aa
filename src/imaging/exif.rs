//! EXIF block handling: orientation lookup and orientation reset.
//!
//! EXIF is carried through the pipeline as an opaque TIFF-structured byte
//! block. Only one field is ever touched: IFD0 tag 0x0112 (Orientation),
//! which must read 1 once the pixels have been physically rotated, or
//! viewers would rotate the output a second time. The rewrite patches the
//! two value bytes in place so every other tag, offset and maker note stays
//! byte-identical.
//!
//! Containers disagree on framing: JPEG APP1 segments and some WebP files
//! prefix the block with `Exif\0\0`, PNG `eXIf` chunks do not. Blocks are
//! normalized to the bare TIFF structure on read.

use super::backend::MetadataError;
use ::exif::{In, Reader, Tag};

/// Prefix of the EXIF payload inside a JPEG APP1 segment.
pub const EXIF_HEADER: &[u8] = b"Exif\0\0";

const ORIENTATION_TAG: u16 = 0x0112;
const TYPE_SHORT: u16 = 3;
const IFD_ENTRY_LEN: usize = 12;

/// Drop a leading `Exif\0\0` if present.
pub fn strip_exif_header(blob: &[u8]) -> &[u8] {
    blob.strip_prefix(EXIF_HEADER).unwrap_or(blob)
}

/// Payload for a JPEG APP1 segment: header + TIFF structure.
pub fn app1_payload(tiff: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(EXIF_HEADER.len() + tiff.len());
    payload.extend_from_slice(EXIF_HEADER);
    payload.extend_from_slice(strip_exif_header(tiff));
    payload
}

/// Read the primary-image orientation value from an EXIF block.
///
/// `Ok(None)` means the block parsed but carries no orientation.
pub fn read_orientation(blob: &[u8]) -> Result<Option<u32>, MetadataError> {
    let exif = Reader::new()
        .read_raw(strip_exif_header(blob).to_vec())
        .map_err(|e| MetadataError::Exif(e.to_string()))?;
    Ok(exif
        .get_field(Tag::Orientation, In::PRIMARY)
        .and_then(|field| field.value.get_uint(0)))
}

#[derive(Clone, Copy)]
struct Endian {
    big: bool,
}

impl Endian {
    fn u16_at(self, data: &[u8], offset: usize) -> Option<u16> {
        let bytes: [u8; 2] = data.get(offset..offset + 2)?.try_into().ok()?;
        Some(if self.big {
            u16::from_be_bytes(bytes)
        } else {
            u16::from_le_bytes(bytes)
        })
    }

    fn u32_at(self, data: &[u8], offset: usize) -> Option<u32> {
        let bytes: [u8; 4] = data.get(offset..offset + 4)?.try_into().ok()?;
        Some(if self.big {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        })
    }

    fn u16_bytes(self, value: u16) -> [u8; 2] {
        if self.big {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        }
    }
}

/// Return a copy of the EXIF block (bare TIFF structure) with IFD0
/// orientation set to 1.
///
/// A block without an orientation tag is returned unchanged. A block whose
/// TIFF header or IFD0 cannot be walked is an error; callers then drop EXIF
/// from the output rather than risk a stale orientation.
pub fn reset_orientation(blob: &[u8]) -> Result<Vec<u8>, MetadataError> {
    let tiff = strip_exif_header(blob);
    let malformed = |what: &str| MetadataError::Exif(what.to_string());

    let endian = match tiff.get(0..2) {
        Some(b"MM") => Endian { big: true },
        Some(b"II") => Endian { big: false },
        _ => return Err(malformed("missing TIFF byte-order mark")),
    };
    if endian.u16_at(tiff, 2) != Some(42) {
        return Err(malformed("bad TIFF magic"));
    }

    let ifd0 = endian
        .u32_at(tiff, 4)
        .ok_or_else(|| malformed("truncated TIFF header"))? as usize;
    let entry_count = endian
        .u16_at(tiff, ifd0)
        .ok_or_else(|| malformed("IFD0 offset out of range"))? as usize;

    let mut patched = tiff.to_vec();
    for i in 0..entry_count {
        let entry = ifd0 + 2 + i * IFD_ENTRY_LEN;
        if entry + IFD_ENTRY_LEN > tiff.len() {
            return Err(malformed("IFD0 entry out of range"));
        }
        let tag = endian.u16_at(tiff, entry).unwrap_or_default();
        if tag != ORIENTATION_TAG {
            continue;
        }
        if endian.u16_at(tiff, entry + 2) != Some(TYPE_SHORT) {
            return Err(malformed("orientation is not a SHORT"));
        }
        // Count 1 SHORT: the value sits left-aligned in the 4-byte slot
        patched[entry + 8..entry + 10].copy_from_slice(&endian.u16_bytes(1));
        return Ok(patched);
    }

    Ok(patched)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Minimal EXIF block: IFD0 with Orientation and ImageWidth entries.
    pub(crate) fn exif_block(big_endian: bool, orientation: u16) -> Vec<u8> {
        let e = Endian { big: big_endian };
        let u32_bytes = |v: u32| {
            if big_endian {
                v.to_be_bytes()
            } else {
                v.to_le_bytes()
            }
        };
        let mut out = Vec::new();
        out.extend_from_slice(if big_endian { b"MM" } else { b"II" });
        out.extend_from_slice(&e.u16_bytes(42));
        out.extend_from_slice(&u32_bytes(8));
        out.extend_from_slice(&e.u16_bytes(2));
        // ImageWidth (0x0100), LONG, 1, 640
        out.extend_from_slice(&e.u16_bytes(0x0100));
        out.extend_from_slice(&e.u16_bytes(4));
        out.extend_from_slice(&u32_bytes(1));
        out.extend_from_slice(&u32_bytes(640));
        // Orientation (0x0112), SHORT, 1, value
        out.extend_from_slice(&e.u16_bytes(ORIENTATION_TAG));
        out.extend_from_slice(&e.u16_bytes(TYPE_SHORT));
        out.extend_from_slice(&u32_bytes(1));
        out.extend_from_slice(&e.u16_bytes(orientation));
        out.extend_from_slice(&[0, 0]);
        // No next IFD
        out.extend_from_slice(&u32_bytes(0));
        out
    }

    #[test]
    fn reads_orientation_little_endian() {
        assert_eq!(read_orientation(&exif_block(false, 6)).unwrap(), Some(6));
    }

    #[test]
    fn reads_orientation_big_endian_with_app1_header() {
        let blob = app1_payload(&exif_block(true, 8));
        assert!(blob.starts_with(EXIF_HEADER));
        assert_eq!(read_orientation(&blob).unwrap(), Some(8));
    }

    #[test]
    fn read_garbage_is_metadata_error() {
        assert!(matches!(
            read_orientation(b"not exif at all"),
            Err(MetadataError::Exif(_))
        ));
    }

    #[test]
    fn reset_sets_orientation_to_one() {
        for big in [false, true] {
            let reset = reset_orientation(&exif_block(big, 6)).unwrap();
            assert_eq!(read_orientation(&reset).unwrap(), Some(1));
        }
    }

    #[test]
    fn reset_preserves_every_other_byte() {
        let original = exif_block(false, 3);
        let reset = reset_orientation(&original).unwrap();
        assert_eq!(original.len(), reset.len());
        let differing: Vec<usize> = original
            .iter()
            .zip(&reset)
            .enumerate()
            .filter(|(_, (a, b))| a != b)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(differing.len(), 1);
    }

    #[test]
    fn reset_strips_app1_header() {
        let reset = reset_orientation(&app1_payload(&exif_block(false, 6))).unwrap();
        assert!(reset.starts_with(b"II"));
    }

    #[test]
    fn reset_rejects_malformed_blocks() {
        assert!(reset_orientation(b"").is_err());
        assert!(reset_orientation(b"XX*\0\x08\0\0\0").is_err());
        assert!(reset_orientation(b"II\x2b\0\x08\0\0\0").is_err());
        // IFD0 offset far past the end
        assert!(reset_orientation(b"II*\0\xff\0\0\0").is_err());
    }

    #[test]
    fn reset_without_orientation_tag_is_identity() {
        let mut block = exif_block(false, 1);
        // Turn the orientation entry into an unrelated tag (0x0131 Software)
        block[22..24].copy_from_slice(&0x0131u16.to_le_bytes());
        let reset = reset_orientation(&block).unwrap();
        assert_eq!(reset, block);
    }
}
