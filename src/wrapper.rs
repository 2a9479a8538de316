use crate::body::CaptureBuffer;
use axum::body::{Body, Bytes};
use axum::http::header::CONTENT_TYPE;
use axum::http::{request, response, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::Response;
use encoding_rs::{Encoding, UTF_8};

/// Read-only view over an inbound request plus its captured body.
pub struct RequestView {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    character_encoding: Option<String>,
    body: CaptureBuffer,
}

impl RequestView {
    pub fn new(parts: &request::Parts, body: CaptureBuffer) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            character_encoding: charset_from_headers(&parts.headers),
            body,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Charset declared on the Content-Type header, if any.
    pub fn character_encoding(&self) -> Option<&str> {
        self.character_encoding.as_deref()
    }

    pub fn captured_body(&self) -> Bytes {
        self.body.captured_bytes()
    }

    /// Captured body decoded with the declared charset, UTF-8 when absent.
    pub fn body_text(&self) -> String {
        decode(&self.body.captured_bytes(), self.character_encoding.as_deref())
    }
}

/// View over the buffered response: status and headers stay mutable until
/// the bytes are committed to the transport.
pub struct ResponseView {
    parts: response::Parts,
    character_encoding: Option<String>,
    body: CaptureBuffer,
    committed: bool,
}

impl ResponseView {
    pub fn new(parts: response::Parts, body: CaptureBuffer) -> Self {
        let character_encoding = charset_from_headers(&parts.headers);
        Self {
            parts,
            character_encoding,
            body,
            committed: false,
        }
    }

    /// A view with no backing response, used when the handler failed before
    /// producing one.
    pub fn detached(status: StatusCode) -> Self {
        let (mut parts, _) = Response::new(Body::empty()).into_parts();
        parts.status = status;
        Self::new(parts, CaptureBuffer::new())
    }

    pub fn status(&self) -> StatusCode {
        self.parts.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.parts.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.parts.headers
    }

    /// Sets a header, silently skipping names or values that do not parse.
    pub fn set_header(&mut self, name: &str, value: &str) {
        let name = HeaderName::from_bytes(name.as_bytes());
        let value = HeaderValue::from_str(value);
        if let (Ok(name), Ok(value)) = (name, value) {
            self.parts.headers.insert(name, value);
        }
    }

    pub fn character_encoding(&self) -> Option<&str> {
        self.character_encoding.as_deref()
    }

    /// Change the charset used for decoding and advertised on Content-Type.
    /// Ignored once the response has been committed: a logging concern must
    /// not break a response that is already on the wire.
    pub fn set_character_encoding(&mut self, label: &str) {
        if self.committed {
            return;
        }
        self.character_encoding = Some(label.to_ascii_lowercase());
        set_charset_param(&mut self.parts.headers, label);
    }

    pub fn captured_body(&self) -> Bytes {
        self.body.captured_bytes()
    }

    pub fn body_text(&self) -> String {
        decode(&self.body.captured_bytes(), self.character_encoding.as_deref())
    }

    /// Marks the view flushed; later encoding changes are dropped silently.
    pub fn commit(&mut self) {
        self.committed = true;
    }

    /// Rebuilds the outbound response from the pass-through bytes.
    pub fn into_response(mut self, bytes: Bytes) -> Response {
        self.commit();
        Response::from_parts(self.parts, Body::from(bytes))
    }
}

/// Charset parameter of the Content-Type header, lowercased and unquoted.
pub fn charset_from_headers(headers: &HeaderMap) -> Option<String> {
    let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    for param in content_type.split(';').skip(1) {
        let mut parts = param.splitn(2, '=');
        let name = parts.next()?.trim();
        if name.eq_ignore_ascii_case("charset") {
            let value = parts.next()?.trim().trim_matches('"');
            if !value.is_empty() {
                return Some(value.to_ascii_lowercase());
            }
        }
    }
    None
}

fn set_charset_param(headers: &mut HeaderMap, label: &str) {
    let Some(content_type) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return;
    };
    let mut pieces: Vec<String> = content_type
        .split(';')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.to_ascii_lowercase().starts_with("charset="))
        .collect();
    pieces.push(format!("charset={}", label.to_ascii_lowercase()));
    if let Ok(value) = HeaderValue::from_str(&pieces.join("; ")) {
        headers.insert(CONTENT_TYPE, value);
    }
}

fn decode(bytes: &Bytes, label: Option<&str>) -> String {
    let encoding = label
        .and_then(|l| Encoding::for_label(l.as_bytes()))
        .unwrap_or(UTF_8);
    encoding.decode(bytes).0.into_owned()
}
