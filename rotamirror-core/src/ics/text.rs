//! Text decoding helpers for feed content.

use std::borrow::Cow;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Decode raw feed bytes.
///
/// Strict UTF-8 first. Anything else is read as ISO-8859-1, one char per byte,
/// so no input byte is ever lost.
pub fn decode_feed(raw: &[u8]) -> Cow<'_, str> {
    let raw = raw.strip_prefix(UTF8_BOM).unwrap_or(raw);

    match std::str::from_utf8(raw) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => Cow::Owned(raw.iter().map(|&b| char::from(b)).collect()),
    }
}

/// Undo UTF-8 text that was decoded as single-byte text.
///
/// "Ã©quipe" becomes "équipe". If the text contains a char that does not fit in
/// one byte, or the bytes are not valid UTF-8, the text is returned unchanged.
pub fn repair_mojibake(text: &str) -> Cow<'_, str> {
    if text.is_ascii() {
        return Cow::Borrowed(text);
    }

    let bytes: Option<Vec<u8>> = text.chars().map(|c| u8::try_from(c).ok()).collect();

    match bytes.map(String::from_utf8) {
        Some(Ok(repaired)) => Cow::Owned(repaired),
        _ => Cow::Borrowed(text),
    }
}

/// Unescape an RFC 5545 TEXT value (`\\`, `\;`, `\,`, `\n`, `\N`).
pub fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }

    out
}
