use url::Url;

/// Scheme, host and port of a URL, e.g. `https://example.com:8443`
///
/// robots.txt applies per origin, so this is the robots cache key.
pub fn origin_key(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    Some(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}

/// Location of the robots.txt file for the URL's origin
pub fn robots_url(url: &Url) -> Option<Url> {
    let origin = origin_key(url)?;
    Url::parse(&format!("{}/robots.txt", origin)).ok()
}
