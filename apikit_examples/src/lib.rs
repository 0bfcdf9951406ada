//! Endpoints for <https://httpbin.org>, used by the demo binary and the
//! integration tests.

use apikit_core::prelude::*;
use http::Method;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

pub const HTTPBIN: &str = "http://httpbin.org/";

/// `GET /get`
pub struct Get;
impl Endpoint for Get {
    fn path(&self) -> Cow<'_, str> {
        "get".into()
    }
}

/// `GET /get?...` with the parameters in the query string.
pub struct Search {
    pub parameters: HttpParameters,
}
impl Endpoint for Search {
    fn path(&self) -> Cow<'_, str> {
        "get".into()
    }
    fn parameters(&self) -> HttpParameters {
        self.parameters.clone()
    }
    fn request_type(&self) -> RequestType<'_> {
        RequestType::UrlQuery
    }
}

/// `GET /status/{code}`; httpbin answers with that status and an empty body.
pub struct Status(pub u16);
impl Endpoint for Status {
    fn path(&self) -> Cow<'_, str> {
        format!("status/{}", self.0).into()
    }
}

/// `POST /post` with a form-encoded body.
pub struct UrlEncodedPost {
    pub parameters: HttpParameters,
}
impl Endpoint for UrlEncodedPost {
    fn path(&self) -> Cow<'_, str> {
        "post".into()
    }
    fn method(&self) -> Method {
        Method::POST
    }
    fn parameters(&self) -> HttpParameters {
        self.parameters.clone()
    }
    fn request_type(&self) -> RequestType<'_> {
        RequestType::UrlEncoded
    }
}

/// `POST /post` with the parameters as a base64 encoded JSON object.
pub struct Base64Post {
    pub parameters: HttpParameters,
}
impl Endpoint for Base64Post {
    fn path(&self) -> Cow<'_, str> {
        "post".into()
    }
    fn method(&self) -> Method {
        Method::POST
    }
    fn parameters(&self) -> HttpParameters {
        self.parameters.clone()
    }
    fn request_type(&self) -> RequestType<'_> {
        RequestType::Base64Upload
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub items: Option<Vec<String>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Slideshow {
    pub author: String,
    pub date: String,
    pub slides: Vec<Slide>,
    pub title: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SlideshowDocument {
    pub slideshow: Slideshow,
}

/// `GET /json`, a fixed sample document.
pub struct SampleJson;
impl Endpoint for SampleJson {
    fn path(&self) -> Cow<'_, str> {
        "json".into()
    }
}
impl ResponseEndpoint for SampleJson {
    type Response = SlideshowDocument;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub age: u32,
}

/// What `/anything` sends back: the parsed JSON request body under `json`.
#[derive(Clone, Debug, Deserialize)]
pub struct Echo<T> {
    pub json: T,
}

/// `POST /anything` with a JSON user body, decoding httpbin's echo.
pub struct EchoUser {
    pub user: User,
}
impl Endpoint for EchoUser {
    fn path(&self) -> Cow<'_, str> {
        "anything".into()
    }
    fn method(&self) -> Method {
        Method::POST
    }
    fn request_type(&self) -> RequestType<'_> {
        self.json_body()
    }
}
impl RequestEndpoint for EchoUser {
    type Request = User;

    fn body(&self) -> &User {
        &self.user
    }
}
impl ResponseEndpoint for EchoUser {
    type Response = Echo<User>;
}

/// Same request as [`EchoUser`] but expects a bare `User` back, which the
/// echo envelope does not match.
pub struct EchoUserUnwrapped {
    pub user: User,
}
impl Endpoint for EchoUserUnwrapped {
    fn path(&self) -> Cow<'_, str> {
        "anything".into()
    }
    fn method(&self) -> Method {
        Method::POST
    }
    fn request_type(&self) -> RequestType<'_> {
        self.json_body()
    }
}
impl RequestEndpoint for EchoUserUnwrapped {
    type Request = User;

    fn body(&self) -> &User {
        &self.user
    }
}
impl ResponseEndpoint for EchoUserUnwrapped {
    type Response = User;
}

#[derive(Clone, Debug, Deserialize)]
pub struct BearerCheck {
    pub authenticated: bool,
    pub token: String,
}

/// `GET /bearer`; 401 unless an `Authorization: Bearer` header is present.
pub struct Bearer;
impl Endpoint for Bearer {
    fn path(&self) -> Cow<'_, str> {
        "bearer".into()
    }
    fn authorized(&self) -> bool {
        true
    }
}
impl ResponseEndpoint for Bearer {
    type Response = BearerCheck;
}

/// `POST /post` as `multipart/form-data`.
pub struct MultipartUpload {
    pub parts: Vec<MultipartBodyPart>,
    pub parameters: HttpParameters,
}
impl Endpoint for MultipartUpload {
    fn path(&self) -> Cow<'_, str> {
        "post".into()
    }
    fn method(&self) -> Method {
        Method::POST
    }
    fn parameters(&self) -> HttpParameters {
        self.parameters.clone()
    }
    fn request_type(&self) -> RequestType<'_> {
        RequestType::Multipart(&self.parts)
    }
}
