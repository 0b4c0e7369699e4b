use crate::UrlError;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use url::Url;

/// A URL in canonical form, the key the frontier deduplicates on
///
/// The query string is not part of the canonical URL. When the raw URL had
/// one it is kept in [`CanonicalUrl::params`] so it can be recorded in the
/// parameter side table.
#[derive(Debug, Clone)]
pub struct CanonicalUrl {
    url: Url,
    params: Option<String>,
}

impl CanonicalUrl {
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn as_url(&self) -> &Url {
        &self.url
    }

    /// Lowercased host of the URL
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Raw query string stripped during normalization, if any
    pub fn params(&self) -> Option<&str> {
        self.params.as_deref()
    }

    /// Number of distinct query keys in the stripped query string
    pub fn param_key_count(&self) -> usize {
        self.params
            .as_deref()
            .map(|query| {
                url::form_urlencoded::parse(query.as_bytes())
                    .map(|(key, _)| key.into_owned())
                    .collect::<HashSet<_>>()
                    .len()
            })
            .unwrap_or(0)
    }
}

impl PartialEq for CanonicalUrl {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for CanonicalUrl {}

impl Hash for CanonicalUrl {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.url.hash(state);
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// Canonicalizes a URL, resolving it against `base` when it is relative
///
/// # Normalization Steps
///
/// 1. Resolve against the base URL (if any) and parse; reject if malformed
/// 2. Accept only `http` and `https`
/// 3. Lowercase the host (default ports are dropped by the parser)
/// 4. Normalize the path:
///    - Remove empty and `.` segments, let `..` pop a segment
///    - Append `/` when the last segment has no file extension
/// 5. Strip the fragment
/// 6. Strip the query, keeping it aside as the URL's parameters
///
/// The result is stable: feeding a canonical URL back in returns it unchanged.
/// Host admission is not checked here; see [`crate::url::Normalizer`].
///
/// # Examples
///
/// ```
/// use linkscout::url::normalize_url;
///
/// let url = normalize_url("HTTPS://News.Example.COM/a/./b?id=7#top", None).unwrap();
/// assert_eq!(url.as_str(), "https://news.example.com/a/b/");
/// assert_eq!(url.params(), Some("id=7"));
/// ```
pub fn normalize_url(raw: &str, base: Option<&Url>) -> Result<CanonicalUrl, UrlError> {
    let raw = raw.trim();
    let mut url = match base {
        Some(base) => base.join(raw),
        None => Url::parse(raw),
    }
    .map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    let host = match url.host_str() {
        Some(host) if !host.is_empty() => host.to_lowercase(),
        _ => return Err(UrlError::MissingDomain),
    };
    if url.host_str() != Some(host.as_str()) {
        url.set_host(Some(&host))
            .map_err(|e| UrlError::Parse(format!("invalid host '{}': {}", host, e)))?;
    }

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    let params = url
        .query()
        .filter(|query| !query.is_empty())
        .map(str::to_string);
    url.set_query(None);

    Ok(CanonicalUrl { url, params })
}

/// Collapses dot and empty segments and settles the trailing slash
fn normalize_path(path: &str) -> String {
    let had_trailing_slash = path.ends_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    let Some(last) = segments.last() else {
        return "/".to_string();
    };

    let mut result = format!("/{}", segments.join("/"));
    if had_trailing_slash || !has_extension(last) {
        result.push('/');
    }
    result
}

/// True for segments like `story.html`; false for `story`, `.hidden` and `v1.`
fn has_extension(segment: &str) -> bool {
    match segment.rfind('.') {
        Some(idx) => idx > 0 && idx + 1 < segment.len(),
        None => false,
    }
}
