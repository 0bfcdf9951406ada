use crate::codec::Encodes;
use crate::codec::text::Text;
use crate::error::{ApiError, StandardError};
use crate::transport::BodyStream;
use bytes::{Bytes, BytesMut};
use http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue};
use std::borrow::Cow;
use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncReadExt;

#[derive(Error, Debug)]
pub enum MultipartError {
    #[error("part content length changed: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: u64, actual: u64 },
}

#[derive(Clone, Debug)]
pub enum PartContent {
    Bytes(Bytes),
    /// Opened when the request is built and streamed while it is sent; the
    /// length is fixed at construction.
    File(PathBuf),
}

/// One segment of a `multipart/form-data` body.
#[derive(Clone, Debug)]
pub struct MultipartBodyPart {
    headers: HeaderMap,
    content: PartContent,
    content_length: u64,
}

impl MultipartBodyPart {
    pub fn new(headers: HeaderMap, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            headers,
            content_length: data.len() as u64,
            content: PartContent::Bytes(data),
        }
    }

    /// Text field: `Content-Disposition: form-data; name="<name>"`.
    pub fn text(name: &str, value: impl Into<String>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_DISPOSITION, disposition(name, None));
        let value: String = value.into();
        let Ok(body) = <Text as Encodes<str>>::encode(&value);
        Self::new(headers, body)
    }

    /// File field with a guessed content type and the file name in the
    /// disposition.
    pub fn file(name: &str, path: impl AsRef<Path>) -> Result<Self, ApiError> {
        let path = path.as_ref();
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned());

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_DISPOSITION, disposition(name, file_name.as_deref()));
        if let Ok(v) = HeaderValue::from_str(mime.essence_str()) {
            headers.insert(CONTENT_TYPE, v);
        }
        Self::from_file(headers, path)
    }

    /// File-backed part with caller-provided headers.
    pub fn from_file(headers: HeaderMap, path: impl AsRef<Path>) -> Result<Self, ApiError> {
        let path = path.as_ref();
        let meta = std::fs::metadata(path).map_err(|_| not_loaded(path))?;
        if !meta.is_file() {
            return Err(not_loaded(path));
        }
        Ok(Self {
            headers,
            content: PartContent::File(path.to_path_buf()),
            content_length: meta.len(),
        })
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[inline]
    pub fn content(&self) -> &PartContent {
        &self.content
    }

    #[inline]
    pub fn content_length(&self) -> u64 {
        self.content_length
    }
}

fn not_loaded(path: &Path) -> ApiError {
    StandardError::UploadFileNotLoaded {
        path: path.to_path_buf(),
    }
    .into()
}

fn escape_quoted(s: &str) -> Cow<'_, str> {
    if !s.contains(['"', '\r', '\n']) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(
        s.replace('"', "%22")
            .replace('\r', "%0D")
            .replace('\n', "%0A"),
    )
}

fn disposition(name: &str, file_name: Option<&str>) -> HeaderValue {
    let mut v = format!("form-data; name=\"{}\"", escape_quoted(name));
    if let Some(f) = file_name {
        v.push_str(&format!("; filename=\"{}\"", escape_quoted(f)));
    }
    // CR/LF are escaped above; non-ASCII file names pass as obs-text bytes.
    HeaderValue::from_bytes(v.as_bytes()).unwrap_or_else(|_| HeaderValue::from_static("form-data"))
}

/// `content-disposition` -> `Content-Disposition`.
fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if upper {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        upper = c == '-';
    }
    out
}

/// Ordered parts sharing one boundary.
pub struct MultipartForm<'a> {
    boundary: String,
    parts: Vec<Cow<'a, MultipartBodyPart>>,
}

impl Default for MultipartForm<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> MultipartForm<'a> {
    pub fn new() -> Self {
        Self::with_boundary(format!("apikit-{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            parts: Vec::new(),
        }
    }

    #[inline]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn part(mut self, part: &'a MultipartBodyPart) -> Self {
        self.parts.push(Cow::Borrowed(part));
        self
    }

    pub fn owned_part(mut self, part: MultipartBodyPart) -> Self {
        self.parts.push(Cow::Owned(part));
        self
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    fn preamble(&self, part: &MultipartBodyPart) -> String {
        let mut s = format!("--{}\r\n", self.boundary);
        for (name, value) in part.headers.iter() {
            s.push_str(&title_case(name.as_str()));
            s.push_str(": ");
            s.push_str(&String::from_utf8_lossy(value.as_bytes()));
            s.push_str("\r\n");
        }
        s.push_str("\r\n");
        s
    }

    fn terminator(&self) -> String {
        format!("--{}--\r\n", self.boundary)
    }

    /// Exact byte length of the encoded body, computed from the declared
    /// part lengths without touching any file.
    pub fn compute_length(&self) -> u64 {
        let parts: u64 = self
            .parts
            .iter()
            .map(|p| self.preamble(p).len() as u64 + p.content_length + 2)
            .sum();
        parts + self.terminator().len() as u64
    }

    /// Opens every file part and returns the body as a stream of chunks.
    ///
    /// Files are opened (and their size re-checked) here, so a part whose
    /// file vanished fails before anything is sent. Content is read lazily
    /// while the stream is polled.
    pub async fn into_stream(self) -> Result<BodyStream, ApiError> {
        let mut segments = VecDeque::with_capacity(self.parts.len() * 3 + 1);
        for part in &self.parts {
            segments.push_back(Segment::Bytes(Bytes::from(self.preamble(part))));
            match &part.content {
                PartContent::Bytes(b) => segments.push_back(Segment::Bytes(b.clone())),
                PartContent::File(path) => {
                    segments.push_back(open_file(path, part.content_length).await?)
                }
            }
            segments.push_back(Segment::Bytes(Bytes::from_static(b"\r\n")));
        }
        segments.push_back(Segment::Bytes(Bytes::from(self.terminator())));

        Ok(Box::pin(futures_util::stream::unfold(
            segments,
            next_chunk,
        )))
    }
}

const FILE_CHUNK: u64 = 64 * 1024;

enum Segment {
    Bytes(Bytes),
    File {
        file: tokio::fs::File,
        expected: u64,
        read: u64,
    },
}

async fn open_file(path: &Path, expected: u64) -> Result<Segment, ApiError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|_| not_loaded(path))?;
    let actual = file.metadata().await.map_err(|_| not_loaded(path))?.len();
    if actual != expected {
        return Err(ApiError::encode_error(MultipartError::LengthMismatch {
            expected,
            actual,
        }));
    }
    Ok(Segment::File {
        file,
        expected,
        read: 0,
    })
}

async fn next_chunk(
    mut segments: VecDeque<Segment>,
) -> Option<(io::Result<Bytes>, VecDeque<Segment>)> {
    loop {
        let chunk = match segments.front_mut()? {
            Segment::Bytes(b) => Some(Ok(std::mem::take(b))),
            Segment::File {
                file,
                expected,
                read,
            } => read_file_chunk(file, *expected, read).await,
        };
        match chunk {
            None => {
                segments.pop_front();
            }
            Some(Ok(b)) => {
                if let Some(Segment::Bytes(_)) = segments.front() {
                    segments.pop_front();
                }
                return Some((Ok(b), segments));
            }
            Some(Err(e)) => return Some((Err(e), VecDeque::new())),
        }
    }
}

/// `None` once the file ended at exactly `expected` bytes.
async fn read_file_chunk(
    file: &mut tokio::fs::File,
    expected: u64,
    read: &mut u64,
) -> Option<io::Result<Bytes>> {
    // One byte past the declared length so growth is noticed.
    let want = (expected - *read + 1).min(FILE_CHUNK);
    let mut buf = BytesMut::zeroed(usize::try_from(want).unwrap_or(0));
    let n = match file.read(&mut buf[..]).await {
        Ok(n) => n,
        Err(e) => return Some(Err(e)),
    };
    *read += n as u64;
    if *read > expected || (n == 0 && *read != expected) {
        let err = MultipartError::LengthMismatch {
            expected,
            actual: *read,
        };
        return Some(Err(io::Error::other(err)));
    }
    if n == 0 {
        return None;
    }
    buf.truncate(n);
    Some(Ok(buf.freeze()))
}

#[cfg(test)]
mod test {
    use super::*;
    use futures_util::StreamExt;
    use std::io::Write;

    async fn drain(form: MultipartForm<'_>) -> io::Result<Bytes> {
        let mut stream = form.into_stream().await.map_err(io::Error::other)?;
        let mut out = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out.freeze())
    }

    #[tokio::test]
    async fn text_part_layout() {
        let p = MultipartBodyPart::text("foo", "bar");
        let form = MultipartForm::with_boundary("b0").part(&p);
        let length = form.compute_length();
        let body = drain(form).await.unwrap();
        assert_eq!(
            &body[..],
            b"--b0\r\nContent-Disposition: form-data; name=\"foo\"\r\n\r\nbar\r\n--b0--\r\n"
        );
        assert_eq!(length, body.len() as u64);
    }

    #[tokio::test]
    async fn computed_length_matches_for_mixed_parts() {
        let mut tmp = tempfile::Builder::new().suffix(".jpg").tempfile().unwrap();
        tmp.write_all(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]).unwrap();
        tmp.flush().unwrap();

        let file = MultipartBodyPart::file("photo", tmp.path()).unwrap();
        assert_eq!(file.content_length(), 6);
        assert_eq!(
            file.headers().get(CONTENT_TYPE).unwrap().to_str().unwrap(),
            "image/jpeg"
        );

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_DISPOSITION, HeaderValue::from_static("form-data; name=raw"));
        let raw = MultipartBodyPart::new(headers, Bytes::from_static(b"\x00\x01binary"));

        let form = MultipartForm::new()
            .part(&file)
            .part(&raw)
            .owned_part(MultipartBodyPart::text("note", "héllo"));
        assert!(form.boundary().starts_with("apikit-"));
        let length = form.compute_length();
        let body = drain(form).await.unwrap();
        assert_eq!(length, body.len() as u64);
    }

    #[tokio::test]
    async fn large_file_is_streamed_in_chunks() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        tmp.write_all(&data).unwrap();
        tmp.flush().unwrap();

        let part = MultipartBodyPart::file("blob", tmp.path()).unwrap();
        let form = MultipartForm::with_boundary("b1").part(&part);
        let length = form.compute_length();

        let mut stream = form.into_stream().await.unwrap();
        let mut chunks = 0;
        let mut body = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.unwrap();
            assert!(chunk.len() as u64 <= FILE_CHUNK);
            body.extend_from_slice(&chunk);
            chunks += 1;
        }
        assert!(chunks > 4, "{chunks}");
        assert_eq!(body.len() as u64, length);
        let start = body.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4;
        assert_eq!(&body[start..start + data.len()], &data[..]);
    }

    #[test]
    fn missing_file_is_not_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let err = MultipartBodyPart::file("f", dir.path().join("nope.bin")).unwrap_err();
        assert!(err.is_upload_file_not_loaded());
    }

    #[tokio::test]
    async fn file_removed_after_construction_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.txt");
        std::fs::write(&path, b"abc").unwrap();
        let part = MultipartBodyPart::file("f", &path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let err = MultipartForm::new().part(&part).into_stream().await.err().unwrap();
        assert!(err.is_upload_file_not_loaded());
    }

    #[tokio::test]
    async fn file_resized_after_construction_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grow.txt");
        std::fs::write(&path, b"abc").unwrap();
        let part = MultipartBodyPart::file("f", &path).unwrap();
        std::fs::write(&path, b"abcdef").unwrap();

        let err = MultipartForm::new().part(&part).into_stream().await.err().unwrap();
        assert!(matches!(err, ApiError::Encode(_)));
    }

    #[tokio::test]
    async fn file_growing_while_streamed_fails_the_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grow.txt");
        std::fs::write(&path, b"abc").unwrap();
        let part = MultipartBodyPart::file("f", &path).unwrap();

        let mut stream = MultipartForm::new().part(&part).into_stream().await.unwrap();
        std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"def")
            .unwrap();

        let mut failure = None;
        while let Some(chunk) = stream.next().await {
            if let Err(e) = chunk {
                failure = Some(e);
                break;
            }
        }
        let failure = failure.unwrap();
        let inner = failure.get_ref().unwrap().downcast_ref::<MultipartError>();
        assert!(matches!(
            inner,
            Some(MultipartError::LengthMismatch { expected: 3, actual: 4 })
        ));
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn disposition_escapes_quotes() {
        let p = MultipartBodyPart::text("a\"b", "v");
        assert_eq!(
            p.headers().get(CONTENT_DISPOSITION).unwrap().to_str().unwrap(),
            "form-data; name=\"a%22b\""
        );
        assert_eq!(title_case("x-custom-header"), "X-Custom-Header");
    }
}
