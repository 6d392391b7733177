use std::fmt;

use reqwest::Method;
use serde_json::Value;
use url::Url;

use crate::error::Error;

/// One controller request: method, path, optional query/body, and which
/// NDJSON line to consume (`0` = decode the whole body).
///
/// Paths built with [`new`](Self::new) or [`from_segments`](Self::from_segments)
/// are stored as unescaped segments and percent-encoded when joined onto the
/// base URL, so proxy-group names with spaces, slashes or emoji can be passed
/// straight through. [`raw`](Self::raw) keeps a caller-typed path as written.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    method: Method,
    segments: Vec<String>,
    escaped: bool,
    query: Vec<(String, String)>,
    body: Option<Value>,
    read_line: usize,
}

impl ApiRequest {
    /// Build from a slash-separated path such as `"cache/fakeip/flush"`.
    pub fn new(method: Method, path: &str) -> Self {
        Self::from_segments(method, path.split('/').filter(|s| !s.is_empty()))
    }

    /// Build from individual, unescaped path segments.
    pub fn from_segments<I, S>(method: Method, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method,
            segments: segments.into_iter().map(Into::into).collect(),
            escaped: false,
            query: Vec::new(),
            body: None,
            read_line: 0,
        }
    }

    /// Build from an endpoint exactly as a user typed it, e.g.
    /// `"proxies/HK%20Node"` or `"connections?interval=1"`.
    ///
    /// Existing `%XX` escapes are kept and an inline query string is split
    /// into query pairs. A `#fragment` is dropped.
    pub fn raw(method: Method, endpoint: &str) -> Self {
        let endpoint = endpoint.split_once('#').map_or(endpoint, |(head, _)| head);
        let (path, query) = endpoint.split_once('?').unwrap_or((endpoint, ""));

        let mut req = Self::new(method, path);
        req.escaped = true;
        req.query = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        req
    }

    pub fn get(path: &str) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: &str) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: &str) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: &str) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Attach a JSON body.
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Consume only the `line`-th (1-based) NDJSON record of the response.
    pub fn read_line(mut self, line: usize) -> Self {
        self.read_line = line;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path as given, segments joined with `/`.
    pub fn path(&self) -> String {
        self.segments.join("/")
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn line_index(&self) -> usize {
        self.read_line
    }

    /// Resolve against the controller base URL, keeping any base path prefix.
    pub(crate) fn url(&self, base: &Url) -> Result<Url, Error> {
        let mut url = base.clone();
        if self.escaped {
            if url.cannot_be_a_base() {
                return Err(Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase));
            }
            let path = format!("{}/{}", base.path().trim_end_matches('/'), self.path());
            url.set_path(&path);
            return Ok(url);
        }
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(&self.segments);
        Ok(url)
    }
}

impl fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path())
    }
}
