use crate::codec::Encodes;
use crate::codec::json::Json;
use crate::debug::DebugLevel;
use crate::multipart::MultipartBodyPart;
use crate::params::HttpParameters;
use bytes::Bytes;
use http::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::fmt;

/// Object-safe JSON serialization, so `RequestType` can borrow any
/// `Serialize` value without becoming generic.
pub trait JsonEncodable: Send + Sync {
    fn encode_json(&self) -> Result<Bytes, serde_json::Error>;
}

impl<T> JsonEncodable for T
where
    T: Serialize + Send + Sync + ?Sized,
{
    fn encode_json(&self) -> Result<Bytes, serde_json::Error> {
        <Json as Encodes<T>>::encode(self)
    }
}

/// How the parameters (and optional body value) of an endpoint become
/// request headers and payload.
pub enum RequestType<'a> {
    /// Parameters go to the URL query; no body.
    UrlQuery,
    /// Parameters form an `application/x-www-form-urlencoded` body.
    UrlEncoded,
    /// Parameters form a JSON object body.
    JsonParams,
    /// The value is the JSON body; parameters go to the URL query.
    JsonBody(&'a dyn JsonEncodable),
    /// Parts followed by one text part per parameter.
    Multipart(&'a [MultipartBodyPart]),
    /// Parameters as JSON, base64 encoded.
    Base64Upload,
}

impl RequestType<'_> {
    pub fn label(&self) -> &'static str {
        match self {
            RequestType::UrlQuery => "url-query",
            RequestType::UrlEncoded => "url-encoded",
            RequestType::JsonParams => "json-params",
            RequestType::JsonBody(_) => "json-body",
            RequestType::Multipart(_) => "multipart",
            RequestType::Base64Upload => "base64-upload",
        }
    }
}

impl fmt::Debug for RequestType<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestType::Multipart(parts) => f
                .debug_tuple("Multipart")
                .field(&parts.len())
                .finish(),
            other => f.write_str(other.label()),
        }
    }
}

/// Description of one API call.
///
/// Only `path` is required; everything else has the defaults of a plain
/// `GET` with JSON parameters and no authorization.
pub trait Endpoint: Send + Sync {
    /// Path relative to the adapter base URL.
    fn path(&self) -> Cow<'_, str>;

    fn parameters(&self) -> HttpParameters {
        HttpParameters::new()
    }

    fn method(&self) -> Method {
        Method::GET
    }

    fn request_type(&self) -> RequestType<'_> {
        RequestType::JsonParams
    }

    /// Advisory flag read by the adapter delegate (e.g. to attach credentials).
    fn authorized(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn debug_level(&self) -> Option<DebugLevel> {
        None
    }
}

/// Endpoint carrying a typed JSON request body.
///
/// Implementors usually answer `POST` from [`Endpoint::method`] and return
/// [`RequestEndpoint::json_body`] from [`Endpoint::request_type`].
pub trait RequestEndpoint: Endpoint {
    type Request: Serialize + Send + Sync;

    fn body(&self) -> &Self::Request;

    fn json_body(&self) -> RequestType<'_> {
        RequestType::JsonBody(self.body())
    }
}

/// Endpoint whose successful response decodes into `Response`.
pub trait ResponseEndpoint: Endpoint {
    type Response: DeserializeOwned + Send + 'static;
}
