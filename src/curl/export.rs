use crate::http::method::HttpMethod;
use crate::http::request::{BodyMode, RequestDocument};

const PART_SEPARATOR: &str = " \\\n  ";

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "\\'"))
}

fn non_blank_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n').map(str::trim).filter(|line| !line.is_empty())
}

/// Render `document` as a multi-line cURL command.
pub fn export_curl(document: &RequestDocument) -> String {
    let mut parts = vec![format!("curl {}", quote(&document.url_with_query()))];

    if document.method != HttpMethod::Get {
        parts.push(format!("-X {}", document.method));
    }
    for (key, value) in document.effective_headers() {
        parts.push(format!("-H {}", quote(format!("{key}: {value}").trim())));
    }

    let body = document.body_text.as_str();
    if !body.trim().is_empty() {
        match document.body_mode {
            BodyMode::Json | BodyMode::Raw => parts.push(format!("--data-raw {}", quote(body))),
            BodyMode::FormUrlencoded => {
                let flat = non_blank_lines(body).collect::<Vec<_>>().join("&");
                parts.push(format!("--data {}", quote(&flat)));
            }
            BodyMode::Multipart => {
                parts.extend(non_blank_lines(body).map(|line| format!("-F {}", quote(line))));
            }
            BodyMode::None => {}
        }
    }

    let options = &document.options;
    for (flag, value) in [("-x", &options.proxy), ("-u", &options.basic_auth), ("-b", &options.cookies)] {
        let value = value.trim();
        if !value.is_empty() {
            parts.push(format!("{flag} {}", quote(value)));
        }
    }
    if !options.verify_tls {
        parts.push("-k".to_string());
    }
    if options.allow_redirects {
        parts.push("-L".to_string());
    }
    if options.timeout_secs > 0 {
        parts.push(format!("-m {}", options.timeout_secs));
    }

    parts.join(PART_SEPARATOR)
}
