//! Flow filters: what a flow (or resource) applies to.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::selector::matcher::{AndMatcher, HeaderMatcher, Matcher, MethodMatcher, UrlMatcher};

/// Declarative predicate over method, URL and headers.
///
/// `url` is written without a scheme: `api.example.com/v1/orders`,
/// `api.example.com/v1/*` (prefix) or `api.example.com/users/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Filter {
    /// Optional label used in logs.
    pub name: String,
    pub url: String,
    pub methods: Vec<String>,
    pub headers: BTreeMap<String, String>,
}

/// Normalized filter used to decide whether two filters are the same.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComparableFilter {
    pub url: String,
    pub methods: Vec<String>,
    pub headers: Vec<(String, String)>,
}

impl Filter {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_methods(mut self, methods: &[&str]) -> Self {
        self.methods = methods.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Key ignoring the label, letter case of methods and header names, and a trailing slash.
    pub fn comparable(&self) -> ComparableFilter {
        let mut methods: Vec<String> = self.methods.iter().map(|m| m.to_uppercase()).collect();
        methods.sort();
        methods.dedup();

        let headers = self
            .headers
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.clone()))
            .collect::<BTreeMap<_, _>>()
            .into_iter()
            .collect();

        ComparableFilter {
            url: normalize_url(&self.url),
            methods,
            headers,
        }
    }

    /// Build the matcher evaluating this filter against a stream.
    pub fn matcher(&self) -> AndMatcher {
        let mut matchers: Vec<Box<dyn Matcher>> = vec![Box::new(UrlMatcher::new(&self.url))];
        if !self.methods.is_empty() {
            matchers.push(Box::new(MethodMatcher::new(&self.methods)));
        }
        for (name, value) in &self.headers {
            matchers.push(Box::new(HeaderMatcher::new(name, value)));
        }
        AndMatcher::new(matchers)
    }

    pub fn is_wildcard(&self) -> bool {
        self.url.trim_end().ends_with('*')
    }

    /// Ordering key: exact before wildcard, then longer patterns first, then
    /// filters with more constraints first.
    pub fn specificity(&self) -> (bool, usize, usize) {
        (
            !self.is_wildcard(),
            normalize_url(&self.url).len(),
            self.methods.len() + self.headers.len(),
        )
    }

    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.url
        } else {
            &self.name
        }
    }
}

fn normalize_url(url: &str) -> String {
    let url = url.trim();
    let url = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    let url = url.trim_end_matches('/');
    match url.split_once('/') {
        Some((host, path)) => format!("{}/{}", host.to_lowercase(), path),
        None => url.to_lowercase(),
    }
}
