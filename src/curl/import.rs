use crate::error::{Error, Result};
use crate::http::method::HttpMethod;
use crate::http::request::{BodyMode, RequestDocument, TransportOptions, DEFAULT_TIMEOUT_SECS};
use crate::kv::{self, Pair};

const MIN_TIMEOUT_SECS: u64 = 1;
const MAX_TIMEOUT_SECS: u64 = 120;
const COMPRESSED_ENCODINGS: &str = "gzip, deflate, br";

/// Everything collected from the command line before the request is built.
#[derive(Debug, Default)]
struct Flags {
    method: Option<String>,
    urls: Vec<String>,
    headers: Vec<Pair>,
    cookies: String,
    basic_auth: String,
    proxy: String,
    insecure: bool,
    timeout_secs: Option<u64>,
    force_get: bool,
    head_only: bool,
    data: Vec<String>,
    data_urlencode: Vec<String>,
    form: Vec<String>,
    compressed: bool,
}

/// Parse a bash-quoted cURL command. Unknown options are ignored.
pub fn parse_curl(text: &str) -> Result<RequestDocument> {
    if !text.contains("curl") {
        return Err(Error::Import(
            "no curl command detected (paste DevTools \"Copy as cURL (bash)\")".into(),
        ));
    }

    let tokens = tokenize(text)?;
    let start = tokens
        .iter()
        .position(|token| token == "curl" || token.ends_with("/curl"))
        .unwrap_or(0);
    let flags = scan(&tokens[(start + 1).min(tokens.len())..]);

    let Some(raw_url) = flags.urls.first() else {
        return Err(Error::Import("no URL found (expected an http:// or https:// argument)".into()));
    };
    build(raw_url, &flags)
}

fn tokenize(text: &str) -> Result<Vec<String>> {
    let trimmed = text.trim();
    let without_prompt = match trimmed.strip_prefix('$') {
        Some(rest) if rest.starts_with(char::is_whitespace) => rest.trim_start(),
        _ => trimmed,
    };
    let joined = without_prompt.replace("\\\r\n", " ").replace("\\\n", " ");

    shlex::split(&joined).ok_or_else(|| Error::Import("Failed to split command: unbalanced quotes".into()))
}

fn scan(tokens: &[String]) -> Flags {
    let mut flags = Flags::default();
    let mut i = 0;

    while i < tokens.len() {
        let token = tokens[i].as_str();
        let next = tokens.get(i + 1).cloned();

        if token.starts_with("http://") || token.starts_with("https://") {
            flags.urls.push(token.to_string());
            i += 1;
            continue;
        }

        let takes_value = match (token, next) {
            ("--url", Some(value)) => {
                flags.urls.push(value);
                true
            }
            ("-X" | "--request", Some(value)) => {
                flags.method = Some(value.to_ascii_uppercase());
                true
            }
            ("-H" | "--header", Some(value)) => {
                if let Some((key, value)) = value.split_once(':') {
                    kv::upsert(&mut flags.headers, key.trim(), value.trim());
                }
                true
            }
            ("-b" | "--cookie", Some(value)) => {
                flags.cookies = value;
                true
            }
            ("-u" | "--user", Some(value)) => {
                flags.basic_auth = value;
                true
            }
            ("-x" | "--proxy", Some(value)) => {
                flags.proxy = value;
                true
            }
            ("-m" | "--max-time", Some(value)) => {
                if let Ok(secs) = value.trim().parse::<f64>() {
                    if secs.is_finite() {
                        flags.timeout_secs = Some(secs.trunc().max(0.0) as u64);
                    }
                }
                true
            }
            ("-d" | "--data" | "--data-raw" | "--data-binary", Some(value)) => {
                flags.data.push(value);
                true
            }
            ("--data-urlencode", Some(value)) => {
                flags.data_urlencode.push(value);
                true
            }
            ("--json", Some(value)) => {
                set_default_header(&mut flags.headers, "Content-Type", "application/json");
                flags.data.push(value);
                flags.method.get_or_insert_with(|| "POST".to_string());
                true
            }
            ("-F" | "--form", Some(value)) => {
                flags.form.push(value);
                true
            }
            _ => {
                match token {
                    "-k" | "--insecure" => flags.insecure = true,
                    "-G" | "--get" => flags.force_get = true,
                    "-I" | "--head" => flags.head_only = true,
                    "--compressed" => flags.compressed = true,
                    _ => {}
                }
                false
            }
        };

        i += if takes_value { 2 } else { 1 };
    }

    flags
}

fn set_default_header(headers: &mut Vec<Pair>, name: &str, value: &str) {
    if !headers.iter().any(|(key, _)| key.eq_ignore_ascii_case(name)) {
        headers.push((name.to_string(), value.to_string()));
    }
}

/// Split `url` into the part before `?` (fragment kept) and its decoded
/// query pairs.
fn split_query(url: &str) -> (String, Vec<Pair>) {
    let (before_fragment, fragment) = match url.split_once('#') {
        Some((head, fragment)) => (head, Some(fragment)),
        None => (url, None),
    };
    let Some((base, query)) = before_fragment.split_once('?') else {
        return (url.to_string(), Vec::new());
    };

    let pairs = url::form_urlencoded::parse(query.as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    let base = match fragment {
        Some(fragment) => format!("{base}#{fragment}"),
        None => base.to_string(),
    };
    (base, pairs)
}

fn split_assignment(item: &str) -> Pair {
    match item.split_once('=') {
        Some((key, value)) => (key.to_string(), value.to_string()),
        None => (item.to_string(), String::new()),
    }
}

fn build(raw_url: &str, flags: &Flags) -> Result<RequestDocument> {
    let (url, mut query) = split_query(raw_url);

    let mut headers = flags.headers.clone();
    if !flags.cookies.is_empty() {
        set_default_header(&mut headers, "Cookie", &flags.cookies);
    }
    if flags.compressed {
        set_default_header(&mut headers, "Accept-Encoding", COMPRESSED_ENCODINGS);
    }

    let has_body = !flags.form.is_empty() || !flags.data.is_empty() || !flags.data_urlencode.is_empty();
    let method = if flags.force_get {
        HttpMethod::Get
    } else if flags.head_only {
        HttpMethod::Head
    } else {
        match &flags.method {
            Some(method) => method.parse().map_err(Error::Import)?,
            None if has_body => HttpMethod::Post,
            None => HttpMethod::Get,
        }
    };

    let mut body_mode = BodyMode::None;
    let mut body_text = String::new();

    if !flags.form.is_empty() {
        body_mode = BodyMode::Multipart;
        body_text = flags.form.join("\n");
    } else {
        if !flags.data_urlencode.is_empty() {
            let pairs: Vec<Pair> = flags.data_urlencode.iter().map(|item| split_assignment(item)).collect();
            if flags.force_get {
                query.extend(pairs);
            } else {
                body_mode = BodyMode::FormUrlencoded;
                body_text = pairs
                    .iter()
                    .map(|(key, value)| format!("{key}={value}"))
                    .collect::<Vec<_>>()
                    .join("\n");
            }
        }

        if !flags.data.is_empty() {
            let raw = flags.data.join("&");
            let raw = raw.trim();
            if flags.force_get {
                query.extend(raw.split('&').filter(|part| !part.is_empty()).map(split_assignment));
            } else if raw.starts_with('{') || raw.starts_with('[') {
                body_mode = BodyMode::Json;
                body_text = raw.to_string();
            } else if raw.contains('&') && raw.contains('=') && !raw.contains('\n') {
                body_mode = BodyMode::FormUrlencoded;
                body_text = raw
                    .split('&')
                    .filter(|part| !part.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n");
            } else {
                body_mode = BodyMode::Raw;
                body_text = raw.to_string();
            }
        }
    }

    let mut document = RequestDocument::new(method, url);
    document.set_query_pairs(query);
    document.set_header_pairs(headers);
    document.body_mode = body_mode;
    document.body_text = body_text;
    document.options = TransportOptions {
        timeout_secs: flags
            .timeout_secs
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS),
        allow_redirects: true,
        verify_tls: !flags.insecure,
        proxy: flags.proxy.clone(),
        basic_auth: flags.basic_auth.clone(),
        cookies: flags.cookies.clone(),
    };
    Ok(document)
}
