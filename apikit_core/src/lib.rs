mod adapter;
mod codec;
mod debug;
mod delegate;
pub mod encoding;
mod endpoint;
pub mod error;
mod multipart;
mod params;
mod policy;
mod request;
mod response;
mod secret;
pub mod transport;

pub mod codecs {
    pub use crate::codec::base64_json::Base64Json;
    pub use crate::codec::form::FormUrlEncoded;
    pub use crate::codec::json::Json;
    pub use crate::codec::text::Text;
    pub use crate::codec::{ContentType, Decodes, Encodes, Format, FormatType};
}

pub mod prelude {
    pub use crate::adapter::{ApiAdapter, TaskHandle};
    pub use crate::debug::{DebugLevel, DebugSink, NoopDebugSink, StderrDebugSink};
    #[cfg(feature = "tracing")]
    pub use crate::debug::TracingDebugSink;
    pub use crate::delegate::{AdapterDelegate, BearerAuth, DelegateFuture, NoDelegate};
    pub use crate::endpoint::{
        Endpoint, JsonEncodable, RequestEndpoint, RequestType, ResponseEndpoint,
    };
    pub use crate::error::{ApiError, ApiResult, FxError, StandardError};
    pub use crate::multipart::{MultipartBodyPart, MultipartError, MultipartForm, PartContent};
    pub use crate::params::HttpParameters;
    pub use crate::policy::Policy;
    pub use crate::request::{build_request, resolve_url};
    pub use crate::response::{CustomError, CustomErrorDecoder, ErrorContext, ErrorDecoder, RawResponse};
    pub use crate::secret::SecretString;
    #[cfg(feature = "reqwest")]
    pub use crate::transport::ReqwestTransport;
    pub use crate::transport::{BuiltRequest, RequestBody, RequestMeta, Transport, TransportError};
}
