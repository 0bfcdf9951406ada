use crate::codec::*;
use bytes::Bytes;
use serde::Serialize;

/// `application/x-www-form-urlencoded` bodies (space encoded as `+`).
pub struct FormUrlEncoded;

impl ContentType for FormUrlEncoded {
    const CONTENT_TYPE: &'static str = "application/x-www-form-urlencoded";
}

impl FormatType for FormUrlEncoded {
    const FORMAT_TYPE: Format = Format::Text;
}

impl<T> Encodes<T> for FormUrlEncoded
where
    T: Serialize + ?Sized,
{
    type Error = serde_urlencoded::ser::Error;
    fn encode(output: &T) -> Result<Bytes, Self::Error> {
        serde_urlencoded::to_string(output).map(Bytes::from)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::params::HttpParameters;

    #[test]
    fn form_rules_apply() {
        let p = HttpParameters::from([("q", "a b&c"), ("lang", "čeština")]);
        let body = FormUrlEncoded::encode(p.as_pairs()).unwrap();
        assert_eq!(&body[..], b"q=a+b%26c&lang=%C4%8De%C5%A1tina");
    }
}
