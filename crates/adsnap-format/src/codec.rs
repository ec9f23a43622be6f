//! Pure decoders for the Windows-native value encodings carried in a
//! snapshot: GUID, SID, FILETIME and UTF-16LE text.

use adsnap_core::types::Timestamp;
use chrono::DateTime;

/// FILETIME sentinel meaning "never" (also used for never-expiring values).
const FILETIME_NEVER: u64 = 0x7FFF_FFFF_FFFF_FFFF;
/// Microseconds between 1601-01-01 and the Unix epoch.
const EPOCH_DELTA_MICROS: i64 = 11_644_473_600_000_000;

/// Canonical text form of a 16-byte Windows GUID. The first three fields
/// are little-endian in the input, the last two big-endian.
pub fn decode_guid(bytes: &[u8]) -> Option<String> {
    let bytes: &[u8; 16] = bytes.try_into().ok()?;
    let d1 = u32::from_le_bytes(bytes[0..4].try_into().expect("4 bytes"));
    let d2 = u16::from_le_bytes(bytes[4..6].try_into().expect("2 bytes"));
    let d3 = u16::from_le_bytes(bytes[6..8].try_into().expect("2 bytes"));
    Some(format!(
        "{d1:08x}-{d2:04x}-{d3:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[8], bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15],
    ))
}

/// Textual `S-<rev>-<authority>-<sub>...` form of a binary SID: revision
/// byte, sub-authority count byte, 6-byte big-endian identifier authority,
/// then little-endian u32 sub-authorities. Returns None when the buffer is
/// shorter than the declared sub-authority count.
pub fn decode_sid(bytes: &[u8]) -> Option<String> {
    if bytes.len() < 8 {
        return None;
    }
    let revision = bytes[0];
    let sub_count = bytes[1] as usize;
    if bytes.len() < 8 + sub_count * 4 {
        return None;
    }
    let mut authority = 0u64;
    for &b in &bytes[2..8] {
        authority = (authority << 8) | u64::from(b);
    }
    let mut out = format!("S-{revision}-{authority}");
    for i in 0..sub_count {
        let off = 8 + i * 4;
        let sub = u32::from_le_bytes(bytes[off..off + 4].try_into().expect("4 bytes"));
        out.push('-');
        out.push_str(&sub.to_string());
    }
    Some(out)
}

/// Windows FILETIME (100 ns intervals since 1601-01-01 UTC) to a UTC
/// timestamp. `0` and `0x7FFF_FFFF_FFFF_FFFF` are the "never" sentinels.
pub fn filetime_to_utc(value: u64) -> Timestamp {
    if value == 0 || value == FILETIME_NEVER {
        return Timestamp::Never;
    }
    let micros = (value / 10) as i64 - EPOCH_DELTA_MICROS;
    match DateTime::from_timestamp_micros(micros) {
        Some(dt) => Timestamp::At(dt),
        None => Timestamp::Never,
    }
}

/// UTF-16LE to String with U+FFFD replacement for invalid surrogate
/// pairs; trailing NULs are trimmed. A trailing odd byte is ignored.
pub fn decode_utf16le(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    let text = String::from_utf16_lossy(&units);
    text.trim_end_matches('\0').to_owned()
}
