//! ICC profile description lookup.
//!
//! Profiles are passed through the pipeline as opaque bytes. The only thing
//! ever read out of them is the human-readable description (`desc` tag) for
//! image reports. Version 2 profiles store it as `textDescriptionType`
//! (ASCII), version 4 profiles as `multiLocalizedUnicodeType` (UTF-16BE,
//! one record per locale; English is preferred when present).

use super::backend::MetadataError;

const HEADER_LEN: usize = 128;
const TAG_ENTRY_LEN: usize = 12;

fn be_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes: [u8; 4] = data.get(offset..offset + 4)?.try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}

fn invalid(what: impl Into<String>) -> MetadataError {
    MetadataError::Icc(what.into())
}

/// Read the profile description, e.g. "sRGB IEC61966-2.1".
pub fn describe_profile(profile: &[u8]) -> Result<String, MetadataError> {
    if profile.len() < HEADER_LEN + 4 {
        return Err(invalid("profile shorter than its header"));
    }
    if profile.get(36..40) != Some(b"acsp".as_slice()) {
        return Err(invalid("missing 'acsp' signature"));
    }

    let tag_count = be_u32(profile, HEADER_LEN).ok_or_else(|| invalid("no tag table"))? as usize;
    // The declared count is untrusted; only entries inside the buffer exist.
    let tag_count = tag_count.min((profile.len() - HEADER_LEN - 4) / TAG_ENTRY_LEN);
    let (offset, size) = (0..tag_count)
        .map(|i| HEADER_LEN + 4 + i * TAG_ENTRY_LEN)
        .find_map(|entry| {
            let sig = profile.get(entry..entry + 4)?;
            (sig == b"desc").then(|| {
                Some((
                    be_u32(profile, entry + 4)? as usize,
                    be_u32(profile, entry + 8)? as usize,
                ))
            })?
        })
        .ok_or_else(|| invalid("no 'desc' tag"))?;

    let tag = offset
        .checked_add(size)
        .and_then(|end| profile.get(offset..end))
        .ok_or_else(|| invalid("'desc' tag out of range"))?;

    let text = match tag.get(0..4) {
        Some(b"desc") => read_text_description(tag)?,
        Some(b"mluc") => read_multi_localized(tag)?,
        _ => return Err(invalid("unsupported 'desc' tag type")),
    };
    let text = text.trim_end_matches('\0').trim().to_string();
    if text.is_empty() {
        return Err(invalid("empty description"));
    }
    Ok(text)
}

fn read_text_description(tag: &[u8]) -> Result<String, MetadataError> {
    let count = be_u32(tag, 8).ok_or_else(|| invalid("truncated 'desc'"))? as usize;
    let ascii = tag
        .get(12..12 + count)
        .ok_or_else(|| invalid("'desc' text out of range"))?;
    Ok(String::from_utf8_lossy(ascii).into_owned())
}

fn read_multi_localized(tag: &[u8]) -> Result<String, MetadataError> {
    let records = be_u32(tag, 8).ok_or_else(|| invalid("truncated 'mluc'"))? as usize;
    let record_len = be_u32(tag, 12).ok_or_else(|| invalid("truncated 'mluc'"))? as usize;
    if records == 0 || record_len < 12 {
        return Err(invalid("'mluc' has no records"));
    }
    let records = records.min(tag.len().saturating_sub(16) / record_len);

    let record_at = |i: usize| 16 + i * record_len;
    let chosen = (0..records)
        .find(|&i| tag.get(record_at(i)..record_at(i) + 2) == Some(b"en".as_slice()))
        .unwrap_or(0);
    let record = record_at(chosen);

    let len = be_u32(tag, record + 4).ok_or_else(|| invalid("'mluc' record out of range"))?;
    let start = be_u32(tag, record + 8).ok_or_else(|| invalid("'mluc' record out of range"))?;
    let (start, len) = (start as usize, len as usize);
    let raw = tag
        .get(start..start + len)
        .ok_or_else(|| invalid("'mluc' string out of range"))?;

    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    Ok(String::from_utf16_lossy(&units))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Assemble a profile with a single `desc` tag whose body is `tag`.
    fn profile_with_desc(tag: &[u8]) -> Vec<u8> {
        let mut profile = vec![0u8; HEADER_LEN];
        profile[36..40].copy_from_slice(b"acsp");
        profile.extend_from_slice(&1u32.to_be_bytes());
        let offset = (HEADER_LEN + 4 + TAG_ENTRY_LEN) as u32;
        profile.extend_from_slice(b"desc");
        profile.extend_from_slice(&offset.to_be_bytes());
        profile.extend_from_slice(&(tag.len() as u32).to_be_bytes());
        profile.extend_from_slice(tag);
        let size = profile.len() as u32;
        profile[0..4].copy_from_slice(&size.to_be_bytes());
        profile
    }

    /// v2 profile described by `text`.
    pub(crate) fn v2_profile(text: &str) -> Vec<u8> {
        let mut tag = Vec::new();
        tag.extend_from_slice(b"desc");
        tag.extend_from_slice(&[0; 4]);
        tag.extend_from_slice(&(text.len() as u32 + 1).to_be_bytes());
        tag.extend_from_slice(text.as_bytes());
        tag.push(0);
        // Unicode and ScriptCode sections, empty
        tag.extend_from_slice(&[0; 8]);
        tag.extend_from_slice(&[0; 3 + 67]);
        profile_with_desc(&tag)
    }

    fn v4_profile(records: &[(&[u8; 2], &str)]) -> Vec<u8> {
        let mut tag = Vec::new();
        tag.extend_from_slice(b"mluc");
        tag.extend_from_slice(&[0; 4]);
        tag.extend_from_slice(&(records.len() as u32).to_be_bytes());
        tag.extend_from_slice(&12u32.to_be_bytes());
        let mut strings = Vec::new();
        let base = 16 + records.len() * 12;
        for (lang, text) in records {
            let encoded: Vec<u8> = text.encode_utf16().flat_map(|u| u.to_be_bytes()).collect();
            tag.extend_from_slice(*lang);
            tag.extend_from_slice(b"US");
            tag.extend_from_slice(&(encoded.len() as u32).to_be_bytes());
            tag.extend_from_slice(&((base + strings.len()) as u32).to_be_bytes());
            strings.extend_from_slice(&encoded);
        }
        tag.extend_from_slice(&strings);
        profile_with_desc(&tag)
    }

    #[test]
    fn reads_v2_description() {
        assert_eq!(
            describe_profile(&v2_profile("sRGB IEC61966-2.1")).unwrap(),
            "sRGB IEC61966-2.1"
        );
    }

    #[test]
    fn reads_v4_description() {
        let profile = v4_profile(&[(b"en", "Display P3")]);
        assert_eq!(describe_profile(&profile).unwrap(), "Display P3");
    }

    #[test]
    fn prefers_english_record() {
        let profile = v4_profile(&[(b"de", "Farbraum"), (b"en", "Color space")]);
        assert_eq!(describe_profile(&profile).unwrap(), "Color space");
    }

    #[test]
    fn falls_back_to_first_record() {
        let profile = v4_profile(&[(b"fr", "Espace"), (b"de", "Farbraum")]);
        assert_eq!(describe_profile(&profile).unwrap(), "Espace");
    }

    #[test]
    fn rejects_truncated_profile() {
        assert!(describe_profile(&[0u8; 40]).is_err());
        let mut profile = v2_profile("Adobe RGB (1998)");
        profile.truncate(150);
        assert!(describe_profile(&profile).is_err());
    }

    #[test]
    fn oversized_counts_stop_at_buffer_end() {
        let mut profile = v2_profile("x");
        profile[HEADER_LEN..HEADER_LEN + 4].copy_from_slice(&u32::MAX.to_be_bytes());
        assert_eq!(describe_profile(&profile).unwrap(), "x");

        let mut profile = vec![0u8; HEADER_LEN];
        profile[36..40].copy_from_slice(b"acsp");
        profile.extend_from_slice(&u32::MAX.to_be_bytes());
        assert!(matches!(
            describe_profile(&profile),
            Err(MetadataError::Icc(msg)) if msg.contains("no 'desc' tag")
        ));

        let mut profile = v4_profile(&[(b"fr", "Espace")]);
        let records_at = HEADER_LEN + 4 + TAG_ENTRY_LEN + 8;
        profile[records_at..records_at + 4].copy_from_slice(&u32::MAX.to_be_bytes());
        assert_eq!(describe_profile(&profile).unwrap(), "Espace");
    }

    #[test]
    fn rejects_missing_signature() {
        let mut profile = v2_profile("x");
        profile[36..40].copy_from_slice(b"nope");
        assert!(matches!(
            describe_profile(&profile),
            Err(MetadataError::Icc(_))
        ));
    }
}
