//! Content extraction for article pages
//!
//! Given a page body this module produces:
//! - a content record: how often the search term occurs in the article
//!   body, and how many of the sentences mentioning it carry a link
//! - the link edges found in those sentences
//! - every followable link on the page, as candidates for the frontier
//!
//! Extraction is pure; it never touches the network or the store.

use crate::config::ExtractConfig;
use crate::storage::{ContentRecord, LinkEdge};
use crate::ConfigError;
use regex::{Regex, RegexBuilder};
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashSet;
use url::Url;

/// Elements that end a line of text
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "li", "ul", "ol", "br", "h3", "h4", "h5", "h6", "blockquote", "section",
    "article", "tr", "td", "figcaption", "pre",
];

/// A followable link found on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateLink {
    /// Absolute URL; not yet canonical
    pub url: String,
    pub anchor_text: String,
}

/// Everything extracted from one page
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// `None` when the page has no content region
    pub record: Option<ContentRecord>,
    pub links: Vec<CandidateLink>,
}

/// Extracts term statistics and links from HTML
#[derive(Debug, Clone)]
pub struct Extractor {
    content_selector: Selector,
    anchor_selector: Selector,
    skip_tags: Vec<String>,
    term: Regex,
}

struct AnchorContext {
    anchor_text: String,
    destination: String,
    parent_text: String,
}

impl Extractor {
    pub fn new(config: &ExtractConfig) -> Result<Self, ConfigError> {
        let content_selector = Selector::parse(&config.content_selector).map_err(|e| {
            ConfigError::Validation(format!(
                "Invalid content_selector '{}': {:?}",
                config.content_selector, e
            ))
        })?;
        let anchor_selector = Selector::parse("a[href]")
            .map_err(|e| ConfigError::Validation(format!("Invalid anchor selector: {:?}", e)))?;

        Ok(Self {
            content_selector,
            anchor_selector,
            skip_tags: config
                .skip_tags
                .iter()
                .map(|t| t.to_ascii_lowercase())
                .collect(),
            term: term_pattern(&config.search_string)?,
        })
    }

    /// Extracts the content record and candidate links of a page
    ///
    /// The record is stored under `record_url` (the frontier URL that was
    /// claimed); links and edges resolve against `page_url`, the URL the
    /// page was finally served from after redirects.
    ///
    /// # Link Extraction Rules
    ///
    /// **Include:** every `<a href>` in the document, resolved against `page_url`
    ///
    /// **Exclude:**
    /// - `<a href="..." download>`
    /// - `javascript:`, `mailto:`, `tel:` and `data:` links
    /// - fragment-only links
    ///
    /// Duplicate URLs are reported once, in document order.
    pub fn extract(&self, record_url: &str, page_url: &Url, html: &str) -> Extraction {
        let document = Html::parse_document(html);
        let links = self.candidate_links(&document, page_url);

        let record = document
            .select(&self.content_selector)
            .next()
            .map(|region| self.measure(region, record_url, page_url));

        Extraction { record, links }
    }

    fn candidate_links(&self, document: &Html, page_url: &Url) -> Vec<CandidateLink> {
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for element in document.select(&self.anchor_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }
            let Some(url) = element
                .value()
                .attr("href")
                .and_then(|href| resolve_link(href, page_url))
            else {
                continue;
            };
            if seen.insert(url.clone()) {
                links.push(CandidateLink {
                    url,
                    anchor_text: squash_whitespace(&element.text().collect::<String>()),
                });
            }
        }

        links
    }

    fn measure(&self, region: ElementRef<'_>, record_url: &str, page_url: &Url) -> ContentRecord {
        let mut text = String::new();
        collect_text(region, &self.skip_tags, &mut text);

        let occurrence_count = self.term.find_iter(&text).count() as u32;
        let anchors = self.anchor_contexts(region, page_url);

        let mut with_links = 0;
        let mut without_links = 0;
        let mut edges = Vec::new();
        let mut seen_edges = HashSet::new();

        for sentence in split_sentences(&text) {
            if !self.term.is_match(&sentence) {
                continue;
            }

            let linked: Vec<&AnchorContext> = anchors
                .iter()
                .filter(|a| {
                    a.parent_text.contains(&sentence)
                        && (a.anchor_text.is_empty() || sentence.contains(&a.anchor_text))
                })
                .collect();

            if linked.is_empty() {
                without_links += 1;
                continue;
            }

            with_links += 1;
            for anchor in linked {
                let edge = LinkEdge {
                    anchor_text: anchor.anchor_text.clone(),
                    destination_url: anchor.destination.clone(),
                };
                if seen_edges.insert(edge.clone()) {
                    edges.push(edge);
                }
            }
        }

        ContentRecord {
            url: record_url.to_string(),
            occurrence_count,
            sentences_without_links: without_links,
            sentences_with_links: with_links,
            edges,
        }
    }

    fn anchor_contexts(&self, region: ElementRef<'_>, page_url: &Url) -> Vec<AnchorContext> {
        region
            .select(&self.anchor_selector)
            .filter_map(|anchor| {
                let destination = resolve_link(anchor.value().attr("href")?, page_url)?;
                let parent = anchor.parent().and_then(ElementRef::wrap)?;

                let mut parent_text = String::new();
                collect_text(parent, &self.skip_tags, &mut parent_text);

                Some(AnchorContext {
                    anchor_text: squash_whitespace(&anchor.text().collect::<String>()),
                    destination,
                    parent_text: squash_whitespace(&parent_text),
                })
            })
            .collect()
    }
}

/// Whole-word, case-insensitive pattern; inner whitespace matches any run of whitespace
fn term_pattern(term: &str) -> Result<Regex, ConfigError> {
    let words: Vec<String> = term.split_whitespace().map(regex::escape).collect();
    if words.is_empty() {
        return Err(ConfigError::Validation(
            "search_string cannot be empty".to_string(),
        ));
    }

    RegexBuilder::new(&format!(r"\b{}\b", words.join(r"\s+")))
        .case_insensitive(true)
        .build()
        .map_err(|e| ConfigError::Validation(format!("Invalid search_string '{}': {}", term, e)))
}

/// Appends the text under `element`, skipping `skip_tags` and breaking lines at block elements
fn collect_text(element: ElementRef<'_>, skip_tags: &[String], out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if skip_tags.iter().any(|t| t == name) || name == "script" || name == "style" {
                    continue;
                }
                let block = BLOCK_TAGS.contains(&name);
                if block {
                    out.push('\n');
                }
                if let Some(child_element) = ElementRef::wrap(child) {
                    collect_text(child_element, skip_tags, out);
                }
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

/// Splits text into sentences at `.`, `!` or `?` followed by whitespace, and at line breaks
///
/// Inner whitespace of each sentence is collapsed to single spaces.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\n' {
            push_sentence(&mut current, &mut sentences);
            continue;
        }

        current.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().map_or(true, |next| next.is_whitespace())
        {
            push_sentence(&mut current, &mut sentences);
        }
    }
    push_sentence(&mut current, &mut sentences);

    sentences
}

fn push_sentence(current: &mut String, sentences: &mut Vec<String>) {
    let sentence = squash_whitespace(current);
    if !sentence.is_empty() {
        sentences.push(sentence);
    }
    current.clear();
}

fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolves an href to an absolute http(s) URL, or `None` if it should not be followed
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    match absolute.scheme() {
        "http" | "https" => Some(absolute.to_string()),
        _ => None,
    }
}
