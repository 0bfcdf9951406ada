use crate::codec::text::Text;
use crate::codec::*;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::Serialize;

/// JSON document wrapped in standard (padded) base64.
pub struct Base64Json;

/// Sent as plain ASCII text.
impl ContentType for Base64Json {
    const CONTENT_TYPE: &'static str = Text::CONTENT_TYPE;
}

impl FormatType for Base64Json {
    const FORMAT_TYPE: Format = Format::Text;
}

impl<T> Encodes<T> for Base64Json
where
    T: Serialize + ?Sized,
{
    type Error = serde_json::Error;
    fn encode(output: &T) -> Result<Bytes, Self::Error> {
        let json = serde_json::to_vec(output)?;
        Ok(Bytes::from(STANDARD.encode(json)))
    }
}
