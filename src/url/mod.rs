//! URL handling module
//!
//! Canonicalization, host scope checks and origin helpers. Every URL that
//! reaches the frontier has gone through [`Normalizer::normalize`].

mod domain;
mod matcher;
mod normalize;

use crate::config::ScopeConfig;
use crate::{UrlError, UrlResult};
use ::url::Url;

pub use domain::{origin_key, robots_url};
pub use matcher::{matches_wildcard, HostPattern};
pub use normalize::{normalize_url, CanonicalUrl};

/// Allow and deny lists of hosts the crawler may visit
///
/// The deny list wins over the allow list.
#[derive(Debug, Clone)]
pub struct HostScope {
    allowed: Vec<HostPattern>,
    denied: Vec<HostPattern>,
}

impl HostScope {
    pub fn new<A, D>(allowed: A, denied: D) -> Self
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        D: IntoIterator,
        D::Item: AsRef<str>,
    {
        Self {
            allowed: allowed
                .into_iter()
                .map(|p| HostPattern::parse(p.as_ref()))
                .collect(),
            denied: denied
                .into_iter()
                .map(|p| HostPattern::parse(p.as_ref()))
                .collect(),
        }
    }

    pub fn from_config(config: &ScopeConfig) -> Self {
        Self::new(&config.allowed_hosts, &config.denied_hosts)
    }

    /// Admits or rejects a host
    pub fn check(&self, host: &str) -> UrlResult<()> {
        if self.denied.iter().any(|p| p.matches(host)) {
            return Err(UrlError::HostDenied(host.to_string()));
        }
        if !self.allowed.iter().any(|p| p.matches(host)) {
            return Err(UrlError::HostNotAllowed(host.to_string()));
        }
        Ok(())
    }
}

/// Canonicalizes URLs and rejects the ones outside the crawl scope
#[derive(Debug, Clone)]
pub struct Normalizer {
    scope: HostScope,
}

impl Normalizer {
    pub fn new(scope: HostScope) -> Self {
        Self { scope }
    }

    pub fn from_config(config: &ScopeConfig) -> Self {
        Self::new(HostScope::from_config(config))
    }

    /// Canonical form of `raw` (resolved against `base`), if it is in scope
    ///
    /// ```
    /// use linkscout::url::{HostScope, Normalizer};
    /// use linkscout::UrlError;
    ///
    /// let normalizer = Normalizer::new(HostScope::new(["*.example.com"], ["shop.example.com"]));
    ///
    /// let url = normalizer.normalize("https://News.example.com/a?b=1", None).unwrap();
    /// assert_eq!(url.as_str(), "https://news.example.com/a/");
    ///
    /// assert!(matches!(
    ///     normalizer.normalize("https://shop.example.com/", None),
    ///     Err(UrlError::HostDenied(_))
    /// ));
    /// ```
    pub fn normalize(&self, raw: &str, base: Option<&Url>) -> UrlResult<CanonicalUrl> {
        let canonical = normalize_url(raw, base)?;
        self.scope.check(canonical.host())?;
        Ok(canonical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> Normalizer {
        Normalizer::new(HostScope::new(
            ["*.example.com", "partner.org"],
            ["shopping.example.com"],
        ))
    }

    #[test]
    fn test_admits_allowed_hosts() {
        let n = normalizer();
        assert!(n.normalize("https://example.com/", None).is_ok());
        assert!(n.normalize("https://finance.example.com/", None).is_ok());
        assert!(n.normalize("https://partner.org/x", None).is_ok());
    }

    #[test]
    fn test_rejects_foreign_host() {
        let n = normalizer();
        assert_eq!(
            n.normalize("https://other.net/", None),
            Err(UrlError::HostNotAllowed("other.net".to_string()))
        );
        assert!(matches!(
            n.normalize("https://sub.partner.org/", None),
            Err(UrlError::HostNotAllowed(_))
        ));
    }

    #[test]
    fn test_deny_beats_allow() {
        let n = normalizer();
        assert_eq!(
            n.normalize("https://Shopping.Example.com/deals", None),
            Err(UrlError::HostDenied("shopping.example.com".to_string()))
        );
    }

    #[test]
    fn test_relative_links_inherit_base_host() {
        let n = normalizer();
        let base = Url::parse("https://news.example.com/world/").unwrap();
        let url = n.normalize("story.html#comments", Some(&base)).unwrap();
        assert_eq!(url.as_str(), "https://news.example.com/world/story.html");
    }

    #[test]
    fn test_scope_normalization_is_idempotent() {
        let n = normalizer();
        let once = n.normalize("HTTPS://EXAMPLE.com/a/../b?q=1", None).unwrap();
        let twice = n.normalize(once.as_str(), None).unwrap();
        assert_eq!(once, twice);
    }
}
