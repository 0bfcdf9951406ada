use crate::codec::base64_json::Base64Json;
use crate::codec::form::FormUrlEncoded;
use crate::codec::json::Json;
use crate::codec::{ContentType, Encodes};
use crate::endpoint::RequestType;
use crate::error::{ApiError, ApiResult};
use crate::multipart::{MultipartBodyPart, MultipartForm};
use crate::params::HttpParameters;
use crate::transport::RequestBody;
use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue};
use url::Url;

/// Headers and payload produced for one request type.
#[derive(Debug, Default)]
pub struct EncodedBody {
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
}

impl EncodedBody {
    fn with_content_type(ct: &'static str, body: Bytes) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(ct));
        Self {
            headers,
            body: Some(RequestBody::Full(body)),
        }
    }
}

/// Appends parameters to the URL query. Empty parameters leave the URL untouched.
pub fn append_query(url: &mut Url, parameters: &HttpParameters) {
    if parameters.is_empty() {
        return;
    }
    url.query_pairs_mut().extend_pairs(parameters.iter());
    if let Some("") = url.query() {
        url.set_query(None);
    }
}

/// Encodes `parameters` (and the body value carried by `request_type`) into
/// headers and payload, appending to `url` for the query-carrying modes.
///
/// Only multipart awaits: file parts are opened here and streamed later.
pub async fn encode_body(
    url: &mut Url,
    request_type: &RequestType<'_>,
    parameters: &HttpParameters,
) -> ApiResult<EncodedBody> {
    match request_type {
        RequestType::UrlQuery => {
            append_query(url, parameters);
            Ok(EncodedBody::default())
        }
        RequestType::UrlEncoded => {
            let body = FormUrlEncoded::encode(parameters.as_pairs())
                .map_err(ApiError::encode_error)?;
            Ok(EncodedBody::with_content_type(
                FormUrlEncoded::CONTENT_TYPE,
                body,
            ))
        }
        RequestType::JsonParams => {
            let body = <Json as Encodes<HttpParameters>>::encode(parameters)
                .map_err(ApiError::encode_error)?;
            Ok(EncodedBody::with_content_type(Json::CONTENT_TYPE, body))
        }
        RequestType::JsonBody(value) => {
            append_query(url, parameters);
            let body = value.encode_json().map_err(ApiError::encode_error)?;
            Ok(EncodedBody::with_content_type(Json::CONTENT_TYPE, body))
        }
        RequestType::Multipart(parts) => encode_multipart(parts, parameters).await,
        RequestType::Base64Upload => {
            let body = <Base64Json as Encodes<HttpParameters>>::encode(parameters)
                .map_err(ApiError::encode_error)?;
            Ok(EncodedBody::with_content_type(Base64Json::CONTENT_TYPE, body))
        }
    }
}

async fn encode_multipart(
    parts: &[MultipartBodyPart],
    parameters: &HttpParameters,
) -> ApiResult<EncodedBody> {
    let mut form = MultipartForm::new();
    for part in parts {
        form = form.part(part);
    }
    for (k, v) in parameters.iter() {
        form = form.owned_part(MultipartBodyPart::text(k, v));
    }

    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_str(&form.content_type()).map_err(ApiError::encode_error)?,
    );
    let length = form.compute_length();
    headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    let stream = form.into_stream().await?;
    Ok(EncodedBody {
        headers,
        body: Some(RequestBody::Stream { length, stream }),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::StandardError;
    use serde::Serialize;

    fn base() -> Url {
        Url::parse("https://api.example.com/v1/items").unwrap()
    }

    fn ct(enc: &EncodedBody) -> &str {
        enc.headers.get(CONTENT_TYPE).unwrap().to_str().unwrap()
    }

    async fn body(enc: EncodedBody) -> Bytes {
        enc.body.unwrap().collect().await.unwrap()
    }

    #[tokio::test]
    async fn url_query_without_parameters_has_no_query() {
        let mut url = base();
        let enc = encode_body(&mut url, &RequestType::UrlQuery, &HttpParameters::new())
            .await
            .unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/items");
        assert!(url.query().is_none());
        assert!(enc.body.is_none());
        assert!(enc.headers.is_empty());
    }

    #[tokio::test]
    async fn url_query_appends_in_order() {
        let mut url = base();
        let p = HttpParameters::from([("b", "2 3"), ("a", "1")]);
        encode_body(&mut url, &RequestType::UrlQuery, &p).await.unwrap();
        assert_eq!(url.query(), Some("b=2+3&a=1"));
    }

    #[tokio::test]
    async fn url_encoded_round_trips_through_form_decoding() {
        let mut url = base();
        let p = HttpParameters::from([("someParameter", "some value"), ("other", "a&b=c")]);
        let enc = encode_body(&mut url, &RequestType::UrlEncoded, &p).await.unwrap();
        assert_eq!(ct(&enc), "application/x-www-form-urlencoded");
        let body = body(enc).await;
        let decoded: Vec<(String, String)> = serde_urlencoded::from_bytes(&body).unwrap();
        assert_eq!(decoded.as_slice(), p.as_pairs());
        assert!(url.query().is_none());
    }

    #[tokio::test]
    async fn json_params_is_an_object() {
        let mut url = base();
        let p = HttpParameters::from([("k", "v")]);
        let enc = encode_body(&mut url, &RequestType::JsonParams, &p).await.unwrap();
        assert_eq!(ct(&enc), "application/json");
        assert_eq!(&body(enc).await[..], br#"{"k":"v"}"#);
    }

    #[tokio::test]
    async fn json_body_moves_parameters_to_query() {
        #[derive(Serialize)]
        struct Payload {
            id: u32,
        }
        let payload = Payload { id: 7 };
        let mut url = base();
        let p = HttpParameters::from([("dry_run", "true")]);
        let enc = encode_body(&mut url, &RequestType::JsonBody(&payload), &p)
            .await
            .unwrap();
        assert_eq!(ct(&enc), "application/json");
        assert_eq!(&body(enc).await[..], br#"{"id":7}"#);
        assert_eq!(url.query(), Some("dry_run=true"));
    }

    #[tokio::test]
    async fn base64_upload_wraps_json_parameters() {
        let mut url = base();
        let p = HttpParameters::from([("a", "b")]);
        let enc = encode_body(&mut url, &RequestType::Base64Upload, &p).await.unwrap();
        assert_eq!(ct(&enc), "text/plain");
        assert_eq!(&body(enc).await[..], b"eyJhIjoiYiJ9");
    }

    #[tokio::test]
    async fn multipart_sets_boundary_and_exact_length() {
        let parts = vec![MultipartBodyPart::text("field", "value")];
        let p = HttpParameters::from([("someParameter", "someValue")]);
        let mut url = base();
        let enc = encode_body(&mut url, &RequestType::Multipart(&parts), &p)
            .await
            .unwrap();

        let content_type = ct(&enc).to_string();
        let boundary = content_type
            .strip_prefix("multipart/form-data; boundary=")
            .unwrap();
        let declared: u64 = enc
            .headers
            .get(CONTENT_LENGTH)
            .unwrap()
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        let body = enc.body.unwrap();
        assert_eq!(body.len(), declared);
        assert!(body.as_bytes().is_none());
        let body = body.collect().await.unwrap();
        assert_eq!(body.len() as u64, declared);

        let expected = format!(
            "--{0}\r\nContent-Disposition: form-data; name=\"field\"\r\n\r\nvalue\r\n\
             --{0}\r\nContent-Disposition: form-data; name=\"someParameter\"\r\n\r\nsomeValue\r\n\
             --{0}--\r\n",
            boundary
        );
        assert_eq!(&body[..], expected.as_bytes());
    }

    #[tokio::test]
    async fn multipart_missing_file_fails_whole_encode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, b"jpeg").unwrap();
        let parts = vec![
            MultipartBodyPart::text("a", "b"),
            MultipartBodyPart::file("photo", &path).unwrap(),
        ];
        std::fs::remove_file(&path).unwrap();

        let mut url = base();
        let err = encode_body(&mut url, &RequestType::Multipart(&parts), &HttpParameters::new())
            .await
            .unwrap_err();
        match err {
            ApiError::Standard(StandardError::UploadFileNotLoaded { path: p }) => {
                assert_eq!(p, path)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
