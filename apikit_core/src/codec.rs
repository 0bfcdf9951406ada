use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use bytes::Bytes;

pub(crate) mod base64_json;
pub(crate) mod form;
pub(crate) mod json;
pub(crate) mod text;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Format {
    Binary,
    Text,
}

/// How a codec's payload is rendered in debug output.
pub trait FormatType {
    const FORMAT_TYPE: Format;
}

pub(crate) fn format_bytes_for_debug(format: Format, bytes: &[u8], max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }
    match format {
        Format::Text => {
            // Worst case UTF-8 expansion for lossy preview: cap by ~4 bytes per char.
            let max_bytes = max_chars.saturating_mul(4).max(1);
            let slice_len = bytes.len().min(max_bytes);
            let s0 = String::from_utf8_lossy(&bytes[..slice_len]).to_string();
            let mut s = truncate_for_debug(&s0, max_chars);
            if slice_len < bytes.len() && !s.ends_with('…') {
                s.push('…');
            }
            s
        }
        Format::Binary => {
            // base64 expands 3 bytes -> 4 chars.
            let max_bytes = max_chars.saturating_mul(3).div_ceil(4).max(1);
            let slice_len = bytes.len().min(max_bytes);
            let s0 = STANDARD_NO_PAD.encode(&bytes[..slice_len]);
            let mut s = truncate_for_debug(&s0, max_chars);
            if slice_len < bytes.len() && !s.ends_with('…') {
                s.push('…');
            }
            s
        }
    }
}

pub(crate) fn truncate_for_debug(s: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }
    let mut it = s.chars();
    let mut out = String::new();
    for _ in 0..max_chars {
        match it.next() {
            Some(c) => out.push(c),
            None => return out,
        }
    }
    if it.next().is_some() {
        out.push('…');
    }
    out
}

fn codec_format<C: ContentType + FormatType>(essence: &str) -> Option<Format> {
    (C::CONTENT_TYPE == essence).then_some(C::FORMAT_TYPE)
}

/// Debug format for a request/response body, picked from its content type.
pub(crate) fn format_for_content_type(ct: &str) -> Format {
    let essence = ct.split(';').next().unwrap_or("").trim();
    if essence.is_empty() || essence.starts_with("text/") || essence.ends_with("+json") {
        return <text::Text as FormatType>::FORMAT_TYPE;
    }
    codec_format::<json::Json>(essence)
        .or_else(|| codec_format::<form::FormUrlEncoded>(essence))
        .unwrap_or(Format::Binary)
}

pub trait ContentType {
    /// "" => no relevant Content-Type/Accept.
    const CONTENT_TYPE: &'static str;
}

pub trait Decodes<T>: ContentType + FormatType {
    type Error: std::error::Error + Send + Sync + 'static;
    fn decode(bytes: &Bytes) -> Result<T, Self::Error>;
}

pub trait Encodes<T: ?Sized>: ContentType + FormatType {
    type Error: std::error::Error + Send + Sync + 'static;
    fn encode(output: &T) -> Result<Bytes, Self::Error>;
}
