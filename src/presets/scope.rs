use url::Url;

use super::Preset;

/// Host (with port, when explicit) and path of `url`. Anything that does not
/// parse as an absolute URL yields two empty strings.
pub fn host_and_path(url: &str) -> (String, String) {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return (String::new(), String::new());
    };

    let host = match (parsed.host_str(), parsed.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    };
    (host, parsed.path().to_string())
}

/// Substring match on host and path; an empty filter matches anything.
pub fn scope_matches(preset: &Preset, url: &str) -> bool {
    let (host, path) = host_and_path(url);
    (preset.scope_host.is_empty() || host.contains(&preset.scope_host))
        && (preset.scope_path.is_empty() || path.contains(&preset.scope_path))
}
