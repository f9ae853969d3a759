//! Request and response types shared by the transport, retry and pagination layers

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;

use crate::error::{ApiError, Result};

/// HTTP verbs the Veracode APIs accept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    pub fn to_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ApiError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            _ => Err(ApiError::UnsupportedMethod(s.to_string())),
        }
    }
}

/// Which of the two API families a request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFamily {
    /// JSON REST API
    Rest,
    /// Legacy query-string API returning XML
    Xml,
}

/// Where a request goes: relative to the family base URL, or an absolute URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Path(String),
    Url(String),
}

/// A file attached to a multipart upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    /// Form field name
    pub field: String,
    /// File name reported to the server
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// An immutable API request.
///
/// Built once through [`RequestBuilder`]; retries and polls reissue the very
/// same value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Method,
    family: ApiFamily,
    target: Target,
    query: Vec<(String, String)>,
    body: Option<Vec<u8>>,
    headers: Vec<(String, String)>,
    files: Vec<FilePart>,
    poll_on_no_content: bool,
}

impl Request {
    /// Start a JSON REST request against a path relative to the REST base URL
    pub fn rest(method: Method, path: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(method, ApiFamily::Rest, Target::Path(path.into()))
    }

    /// Start a legacy XML request against a path relative to the XML base URL
    pub fn xml(method: Method, path: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(method, ApiFamily::Xml, Target::Path(path.into()))
    }

    /// Start a request against an absolute URL, bypassing the base URL
    pub fn absolute(method: Method, family: ApiFamily, url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(method, family, Target::Url(url.into()))
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn family(&self) -> ApiFamily {
        self.family
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn files(&self) -> &[FilePart] {
        &self.files
    }

    /// Whether a 204 means "not ready yet, ask again later"
    pub fn poll_on_no_content(&self) -> bool {
        self.poll_on_no_content
    }

    /// Copy of this request with `key` set to `value`, replacing earlier values of `key`.
    pub fn with_query_param(&self, key: &str, value: impl ToString) -> Request {
        let mut next = self.clone();
        next.query.retain(|(k, _)| k != key);
        next.query.push((key.to_string(), value.to_string()));
        next
    }

    /// Join the target onto the given base URL
    pub fn resolve_url(&self, base_url: &str) -> String {
        match &self.target {
            Target::Url(url) => url.clone(),
            Target::Path(path) => {
                let base = base_url.trim_end_matches('/');
                let path = path.trim_start_matches('/');
                format!("{}/{}", base, path)
            }
        }
    }

    /// Headers sent unless the request overrides them
    pub fn default_headers(&self, user_agent: &str) -> Vec<(String, String)> {
        let mut headers = vec![("User-Agent".to_string(), user_agent.to_string())];
        if self.family == ApiFamily::Rest
            && matches!(self.method, Method::Post | Method::Put)
            && self.files.is_empty()
        {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        headers
    }
}

/// Builder for [`Request`]
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    fn new(method: Method, family: ApiFamily, target: Target) -> Self {
        Self {
            request: Request {
                method,
                family,
                target,
                query: Vec::new(),
                body: None,
                headers: Vec::new(),
                files: Vec::new(),
                poll_on_no_content: family == ApiFamily::Xml,
            },
        }
    }

    /// Append a query parameter. Keys may repeat.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.request.query.push((key.into(), value.to_string()));
        self
    }

    /// Append several query parameters
    pub fn query_pairs<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        self.request
            .query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.to_string())));
        self
    }

    /// Raw body bytes
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.request.body = Some(body.into());
        self
    }

    /// Serialize a value as the JSON body
    pub fn json<T: serde::Serialize>(mut self, value: &T) -> Result<Self> {
        self.request.body = Some(serde_json::to_vec(value)?);
        Ok(self)
    }

    /// Override or add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.headers.push((name.into(), value.into()));
        self
    }

    /// Attach a file for a multipart upload
    pub fn file(
        mut self,
        field: impl Into<String>,
        file_name: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        self.request.files.push(FilePart {
            field: field.into(),
            file_name: file_name.into(),
            bytes: bytes.into(),
        });
        self
    }

    /// Treat 204 as "not ready yet" (the default for the XML family)
    pub fn poll_on_no_content(mut self, enabled: bool) -> Self {
        self.request.poll_on_no_content = enabled;
        self
    }

    pub fn build(self) -> Request {
        self.request
    }
}

/// A received HTTP response, whatever its status
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    headers: HashMap<String, String>,
    body: Vec<u8>,
    url: String,
    request: Request,
}

impl Response {
    /// Header names are stored lower-cased.
    pub fn new(
        status: u16,
        headers: HashMap<String, String>,
        body: Vec<u8>,
        url: impl Into<String>,
        request: Request,
    ) -> Self {
        let headers = headers
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();
        Self {
            status,
            headers,
            body,
            url: url.into(),
            request,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Request correlation id Veracode attaches to every response
    pub fn conversation_id(&self) -> Option<&str> {
        self.header("x-conversation-id")
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            ApiError::InvalidResponse(format!(
                "Failed to parse response from {}: {}",
                self.url, e
            ))
            .into()
        })
    }

    /// Decode the body as JSON, treating an empty body as `null`
    pub fn json_value(&self) -> Result<serde_json::Value> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(serde_json::Value::Null);
        }
        self.json()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn request(&self) -> &Request {
        &self.request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parsing() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("DELETE".parse::<Method>().unwrap(), Method::Delete);

        let err = "PATCH".parse::<Method>().unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedMethod(ref m) if m == "PATCH"));
    }

    #[test]
    fn test_builder_keeps_repeated_keys_in_order() {
        let request = Request::rest(Method::Get, "appsec/v1/applications")
            .query("tag", "a")
            .query("tag", "b")
            .query("size", 50)
            .build();

        assert_eq!(
            request.query(),
            &[
                ("tag".to_string(), "a".to_string()),
                ("tag".to_string(), "b".to_string()),
                ("size".to_string(), "50".to_string()),
            ]
        );
    }

    #[test]
    fn test_with_query_param_replaces_and_leaves_original_untouched() {
        let template = Request::rest(Method::Get, "x")
            .query("page", 0)
            .query("size", 10)
            .build();
        let next = template.with_query_param("page", 3);

        assert_eq!(template.query()[0], ("page".to_string(), "0".to_string()));
        let query = next.query();
        assert!(query.contains(&("page".to_string(), "3".to_string())));
        assert_eq!(next.query().iter().filter(|(k, _)| k == "page").count(), 1);
    }

    #[test]
    fn test_resolve_url_joins_single_slash() {
        let request = Request::rest(Method::Get, "/appsec/v1/applications").build();
        assert_eq!(
            request.resolve_url("https://api.veracode.com/"),
            "https://api.veracode.com/appsec/v1/applications"
        );

        let xml = Request::xml(Method::Get, "4.0/getapplist.do").build();
        assert_eq!(
            xml.resolve_url("https://analysiscenter.veracode.com/api"),
            "https://analysiscenter.veracode.com/api/4.0/getapplist.do"
        );

        let absolute =
            Request::absolute(Method::Get, ApiFamily::Rest, "https://elsewhere/x").build();
        assert_eq!(
            absolute.resolve_url("https://api.veracode.com/"),
            "https://elsewhere/x"
        );
    }

    #[test]
    fn test_default_headers() {
        let post = Request::rest(Method::Post, "x").body("{}").build();
        let headers = post.default_headers("ua");
        assert!(headers.contains(&("Content-Type".to_string(), "application/json".to_string())));
        assert!(headers.contains(&("User-Agent".to_string(), "ua".to_string())));

        let get = Request::rest(Method::Get, "x").build();
        assert_eq!(get.default_headers("ua").len(), 1);

        let upload = Request::rest(Method::Post, "x")
            .file("file", "a.zip", vec![1u8, 2])
            .build();
        assert_eq!(upload.default_headers("ua").len(), 1);

        let xml = Request::xml(Method::Post, "x").build();
        assert_eq!(xml.default_headers("ua").len(), 1);
    }

    #[test]
    fn test_xml_requests_poll_by_default() {
        assert!(Request::xml(Method::Get, "x").build().poll_on_no_content());
        assert!(!Request::rest(Method::Get, "x").build().poll_on_no_content());
        assert!(
            Request::rest(Method::Get, "x")
                .poll_on_no_content(true)
                .build()
                .poll_on_no_content()
        );
    }

    #[test]
    fn test_response_accessors() {
        let request = Request::rest(Method::Get, "x").build();
        let headers = HashMap::from([("X-Conversation-Id".to_string(), "conv-1".to_string())]);
        let response = Response::new(200, headers, br#"{"a":1}"#.to_vec(), "http://h/x", request);

        assert!(response.is_success());
        assert_eq!(response.conversation_id(), Some("conv-1"));
        assert_eq!(response.header("x-conversation-id"), Some("conv-1"));
        let value = response.json_value().unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_empty_body_is_null() {
        let request = Request::rest(Method::Delete, "x").build();
        let response = Response::new(204, HashMap::new(), Vec::new(), "http://h/x", request);
        assert!(response.json_value().unwrap().is_null());
    }

    #[test]
    fn test_invalid_json_is_invalid_response() {
        let request = Request::rest(Method::Get, "x").build();
        let body = b"<xml/>".to_vec();
        let response = Response::new(200, HashMap::new(), body, "http://h/x", request);
        let err = response.json_value().unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Api(ApiError::InvalidResponse(_))
        ));
    }
}
