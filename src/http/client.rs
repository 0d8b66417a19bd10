use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, COOKIE};
use reqwest::{Client, Proxy, Url};
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

use crate::error::{Error, Result};

use super::request::{BodyMode, RequestDocument};
use super::response::ResponseSummary;

pub const DEFAULT_PREVIEW_MAX_BYTES: usize = 2 * 1024 * 1024;
const MAX_TIMEOUT_SECS: u64 = 120;
const MAX_REDIRECTS: usize = 10;

/// A finished exchange: the summary plus the raw bytes that were read.
#[derive(Debug, Clone, Default)]
pub struct Exchange {
    pub summary: ResponseSummary,
    pub raw_body: Vec<u8>,
}

/// Executes a request document. Implementations must resolve to
/// `Error::Canceled` once `cancel_rx` fires.
pub trait Executor: Send + Sync {
    fn execute<'a>(
        &'a self,
        request: &'a RequestDocument,
        cancel_rx: broadcast::Receiver<()>,
    ) -> Pin<Box<dyn Future<Output = Result<Exchange>> + Send + 'a>>;
}

/// `Executor` backed by reqwest.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    preview_max_bytes: usize,
}

impl HttpExecutor {
    pub fn new(preview_max_bytes: usize) -> Self {
        Self { preview_max_bytes }
    }
}

impl Default for HttpExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_PREVIEW_MAX_BYTES)
    }
}

impl Executor for HttpExecutor {
    fn execute<'a>(
        &'a self,
        request: &'a RequestDocument,
        mut cancel_rx: broadcast::Receiver<()>,
    ) -> Pin<Box<dyn Future<Output = Result<Exchange>> + Send + 'a>> {
        Box::pin(async move { send_request(request, self.preview_max_bytes, &mut cancel_rx).await })
    }
}

fn request_error(message: String) -> Error {
    Error::Request(message)
}

pub fn build_headers(request: &RequestDocument) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();

    for (key, value) in request.effective_headers() {
        let header_name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|err| request_error(format!("Invalid header name `{key}`: {err}")))?;
        let header_value = HeaderValue::from_str(&value)
            .map_err(|err| request_error(format!("Invalid header value for `{key}`: {err}")))?;
        headers.append(header_name, header_value);
    }

    let cookies = request.options.cookies.trim();
    if !cookies.is_empty() && !headers.contains_key(COOKIE) {
        let header_value = HeaderValue::from_str(cookies)
            .map_err(|err| request_error(format!("Invalid cookie string: {err}")))?;
        headers.insert(COOKIE, header_value);
    }

    Ok(headers)
}

fn build_url(request: &RequestDocument) -> Result<Url> {
    let mut url = Url::parse(request.url.trim()).map_err(|err| request_error(format!("Invalid URL: {err}")))?;

    let query = request.effective_query();
    if !query.is_empty() {
        let mut query_pairs = url.query_pairs_mut();
        for (key, value) in &query {
            query_pairs.append_pair(key, value);
        }
    }

    Ok(url)
}

fn build_client(request: &RequestDocument) -> Result<Client> {
    let options = &request.options;

    let redirect = if options.allow_redirects {
        reqwest::redirect::Policy::limited(MAX_REDIRECTS)
    } else {
        reqwest::redirect::Policy::none()
    };
    let timeout = Duration::from_secs(options.timeout_secs.clamp(1, MAX_TIMEOUT_SECS));

    let mut builder = Client::builder().redirect(redirect).timeout(timeout);

    let proxy_url = options.proxy.trim();
    if !proxy_url.is_empty() {
        let proxy = Proxy::all(proxy_url).map_err(|err| request_error(format!("Invalid proxy URL: {err}")))?;
        builder = builder.proxy(proxy);
    }

    if !options.verify_tls {
        builder = builder.danger_accept_invalid_certs(true);
    }

    builder
        .build()
        .map_err(|err| request_error(format!("Failed to build HTTP client: {err}")))
}

fn apply_body(mut builder: reqwest::RequestBuilder, request: &RequestDocument) -> Result<reqwest::RequestBuilder> {
    if request.body_text.is_empty() {
        return Ok(builder);
    }

    match request.body_mode {
        BodyMode::None => {}
        BodyMode::Json => {
            let value: serde_json::Value = serde_json::from_str(&request.body_text)
                .map_err(|err| request_error(format!("Invalid JSON body: {err}")))?;
            if request.header("Content-Type").is_none() {
                builder = builder.header(CONTENT_TYPE, "application/json");
            }
            builder = builder.body(serde_json::to_vec(&value)?);
        }
        BodyMode::FormUrlencoded => {
            builder = builder.form(&request.body_pairs());
        }
        BodyMode::Multipart => {
            let form = request
                .body_pairs()
                .into_iter()
                .fold(reqwest::multipart::Form::new(), |form, (key, value)| form.text(key, value));
            builder = builder.multipart(form);
        }
        BodyMode::Raw => {
            builder = builder.body(request.body_text.clone().into_bytes());
        }
    }

    Ok(builder)
}

fn format_headers(headers: &HeaderMap) -> String {
    let mut lines = Vec::new();
    for (name, value) in headers {
        let value = value.to_str().unwrap_or("<binary>");
        lines.push(format!("{name}: {value}"));
    }
    lines.join("\n")
}

pub async fn send_request(
    request: &RequestDocument,
    preview_max_bytes: usize,
    cancel_rx: &mut broadcast::Receiver<()>,
) -> Result<Exchange> {
    let url = build_url(request)?;
    let headers = build_headers(request)?;
    let client = build_client(request)?;

    let mut builder = client.request(request.method.into(), url).headers(headers);

    let basic_auth = request.options.basic_auth.trim();
    if let Some((username, password)) = basic_auth.split_once(':') {
        builder = builder.basic_auth(username, Some(password));
    }

    builder = apply_body(builder, request)?;

    tracing::info!(method = %request.method, url = %request.url, "sending request");
    let start = Instant::now();

    let result = tokio::select! {
        res = builder.send() => res,
        _ = cancel_rx.recv() => {
            return Err(Error::Canceled);
        }
    };
    let mut response = result.map_err(|err| request_error(format!("Request failed: {err}")))?;
    let elapsed = start.elapsed().as_millis() as u64;

    let status = response.status();
    let final_url = response.url().to_string();
    let headers_text = format_headers(response.headers());
    let raw_content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let content_length = response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok());

    let mut raw_body = Vec::new();
    let mut truncated = false;
    loop {
        let chunk = tokio::select! {
            chunk = response.chunk() => chunk.map_err(|err| request_error(format!("Failed to read response: {err}")))?,
            _ = cancel_rx.recv() => {
                return Err(Error::Canceled);
            }
        };
        let Some(chunk) = chunk else {
            break;
        };
        raw_body.extend_from_slice(&chunk);
        if raw_body.len() >= preview_max_bytes {
            truncated = true;
            break;
        }
    }
    if cancel_rx.try_recv().is_ok() {
        return Err(Error::Canceled);
    }

    let mut body_text = String::from_utf8_lossy(&raw_body).into_owned();
    if raw_content_type.to_ascii_lowercase().contains("application/json") {
        if let Ok(value) = serde_json::from_slice::<serde_json::Value>(&raw_body) {
            body_text = serde_json::to_string_pretty(&value)?;
        }
    }

    let content_type = raw_content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();

    tracing::info!(status = status.as_u16(), elapsed_ms = elapsed, bytes = raw_body.len(), "request finished");

    Ok(Exchange {
        summary: ResponseSummary {
            ok: status.as_u16() < 400,
            status_code: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            final_url,
            elapsed_ms: elapsed,
            body_len: content_length.unwrap_or(raw_body.len() as u64),
            content_type,
            headers_text,
            body_text,
            truncated,
            download_id: None,
        },
        raw_body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::method::HttpMethod;

    fn document(url: &str) -> RequestDocument {
        RequestDocument::new(HttpMethod::Get, url)
    }

    #[test]
    fn url_gets_query_rows_appended() {
        let mut request = document("https://api.example.com/items?page=1");
        request.set_query_text("q=a b\nsort=desc");
        let url = build_url(&request).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/items?page=1&q=a+b&sort=desc");
    }

    #[test]
    fn invalid_url_is_a_request_error() {
        let err = build_url(&document("not a url")).unwrap_err();
        assert!(matches!(err, Error::Request(message) if message.starts_with("Invalid URL")));
    }

    #[test]
    fn cookie_string_becomes_header_unless_present() {
        let mut request = document("https://example.com");
        request.options.cookies = "a=1; b=2".into();
        let headers = build_headers(&request).unwrap();
        assert_eq!(headers.get(COOKIE).unwrap(), "a=1; b=2");

        request.set_header_text("Cookie: explicit=1");
        let headers = build_headers(&request).unwrap();
        assert_eq!(headers.get_all(COOKIE).iter().count(), 1);
        assert_eq!(headers.get(COOKIE).unwrap(), "explicit=1");
    }

    #[test]
    fn duplicate_headers_are_kept() {
        let mut request = document("https://example.com");
        request.set_header_text("X-A: 1\nX-A: 2");
        let headers = build_headers(&request).unwrap();
        assert_eq!(headers.get_all("x-a").iter().count(), 2);
    }

    #[tokio::test]
    async fn invalid_json_body_fails_before_sending() {
        let mut request = document("https://example.com");
        request.body_mode = BodyMode::Json;
        request.body_text = "{not json".into();
        let (_tx, mut rx) = broadcast::channel(1);
        let err = send_request(&request, DEFAULT_PREVIEW_MAX_BYTES, &mut rx)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Invalid JSON body"));
    }
}
