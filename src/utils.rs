use url::Url;

pub fn normalize_url(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// REST root for a server base url, `https://host` -> `https://host/api`.
pub fn base_api(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    if trimmed.ends_with("/api") { trimmed.to_string() } else { format!("{}/api", trimmed) }
}

/// Derive the realtime endpoint from the server base url when none is configured.
pub fn socket_url(base_url: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(&normalize_url(base_url))?;
    let scheme = if url.scheme() == "http" { "ws" } else { "wss" };
    // http(s) -> ws(s) is always a permitted scheme change
    let _ = url.set_scheme(scheme);
    let path = format!("{}/ws", url.path().trim_end_matches('/'));
    url.set_path(&path);
    Ok(url)
}
