//! Stream matching logic.
//!
//! # Responsibilities
//! - Match host (case-insensitive) and path (exact, `{param}` segment, `/*` prefix)
//! - Match method sets and required header values
//! - Combine conditions with AND semantics
//!
//! # Design Decisions
//! - Host matching is case-insensitive; path matching is case-sensitive
//! - No regex to keep matching linear in the pattern length

use url::Url;

use crate::runtime::stream::ApiStream;

/// Trait for matching streams against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the stream matches this condition.
    fn matches(&self, stream: &ApiStream) -> bool;
}

/// Matches host and path of the stream URL.
#[derive(Debug, Clone)]
pub struct UrlMatcher {
    host: String,
    segments: Vec<String>,
    wildcard: bool,
}

impl UrlMatcher {
    pub fn new(pattern: &str) -> Self {
        let pattern = pattern.trim();
        let pattern = pattern
            .strip_prefix("https://")
            .or_else(|| pattern.strip_prefix("http://"))
            .unwrap_or(pattern);

        let (host, path) = pattern.split_once('/').unwrap_or((pattern, ""));
        let mut segments = split_path(path);
        let wildcard = segments.last().map(|s| s == "*").unwrap_or(false);
        if wildcard {
            segments.pop();
        }

        Self {
            host: host.to_lowercase(),
            segments,
            wildcard,
        }
    }
}

impl Matcher for UrlMatcher {
    fn matches(&self, stream: &ApiStream) -> bool {
        let Some((host, path)) = host_and_path(&stream.url) else {
            return false;
        };
        if self.host != "*" && host != self.host {
            return false;
        }

        let segments = split_path(&path);
        if segments.len() < self.segments.len() {
            return false;
        }
        if !self.wildcard && segments.len() != self.segments.len() {
            return false;
        }

        self.segments
            .iter()
            .zip(segments.iter())
            .all(|(expected, actual)| is_path_param(expected) || expected == actual)
    }
}

/// Matches the request method against a set.
#[derive(Debug, Clone)]
pub struct MethodMatcher {
    methods: Vec<String>,
}

impl MethodMatcher {
    pub fn new(methods: &[String]) -> Self {
        Self {
            methods: methods.iter().map(|m| m.to_uppercase()).collect(),
        }
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, stream: &ApiStream) -> bool {
        self.methods.iter().any(|m| m.eq_ignore_ascii_case(&stream.method))
    }
}

/// Matches one header value exactly.
#[derive(Debug, Clone)]
pub struct HeaderMatcher {
    name: String,
    value: String,
}

impl HeaderMatcher {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_lowercase(),
            value: value.to_string(),
        }
    }
}

impl Matcher for HeaderMatcher {
    fn matches(&self, stream: &ApiStream) -> bool {
        stream.header(&self.name).map(|v| v == self.value).unwrap_or(false)
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, stream: &ApiStream) -> bool {
        self.matchers.iter().all(|m| m.matches(stream))
    }
}

fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_path_param(segment: &str) -> bool {
    segment.starts_with('{') && segment.ends_with('}')
}

/// Host (lowercase) and path of a stream URL, with or without scheme.
pub(crate) fn host_and_path(raw: &str) -> Option<(String, String)> {
    let parsed = if raw.contains("://") {
        Url::parse(raw)
    } else {
        Url::parse(&format!("http://{}", raw))
    }
    .ok()?;

    let host = parsed.host_str()?.to_lowercase();
    Some((host, parsed.path().to_string()))
}
