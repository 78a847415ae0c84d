//! URL pattern matching.
//!
//! # Responsibilities
//! - Compile user patterns (glob, regex, exact, predicate) once, at `route()` time
//! - Match the current request URL against a compiled pattern
//! - Compare patterns for `unroute`
//!
//! # Design Decisions
//! - Globs are translated into anchored regexes
//! - `*` stops at `/`, `**` crosses it
//! - Relative globs and exact URLs resolve against the context base URL
//! - Invalid syntax fails at compile time, never during dispatch

use std::sync::Arc;

use regex::Regex;
use url::Url;

use crate::error::{Error, Result};

/// Trait for matching request URLs against a compiled condition.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the url matches this condition.
    fn matches(&self, url: &Url) -> bool;
}

/// Custom URL predicate.
pub type UrlPredicate = Arc<dyn Fn(&Url) -> bool + Send + Sync>;

/// A pattern as supplied by the caller.
#[derive(Clone)]
pub enum UrlPattern {
    Glob(String),
    Regex(String),
    Exact(String),
    Predicate(UrlPredicate),
}

impl UrlPattern {
    pub fn glob(pattern: impl Into<String>) -> Self {
        UrlPattern::Glob(pattern.into())
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        UrlPattern::Regex(pattern.into())
    }

    pub fn exact(url: impl Into<String>) -> Self {
        UrlPattern::Exact(url.into())
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Url) -> bool + Send + Sync + 'static,
    {
        UrlPattern::Predicate(Arc::new(f))
    }

    /// Compile into a matcher, resolving relative patterns against `base_url`.
    pub fn compile(&self, base_url: Option<&Url>) -> Result<CompiledPattern> {
        let matcher: Box<dyn Matcher> = match self {
            UrlPattern::Glob(glob) => {
                let glob = resolve_against_base(glob, base_url);
                let source = glob_to_regex(&glob)?;
                let regex = Regex::new(&source).map_err(|e| Error::invalid_pattern(glob.as_str(), e))?;
                Box::new(GlobMatcher { glob, regex })
            }
            UrlPattern::Regex(source) => {
                let regex = Regex::new(source).map_err(|e| Error::invalid_pattern(source.as_str(), e))?;
                Box::new(RegexMatcher { regex })
            }
            UrlPattern::Exact(url) => Box::new(ExactMatcher {
                url: resolve_against_base(url, base_url),
            }),
            UrlPattern::Predicate(f) => Box::new(PredicateMatcher { f: Arc::clone(f) }),
        };

        Ok(CompiledPattern {
            pattern: self.clone(),
            matcher,
        })
    }
}

impl PartialEq for UrlPattern {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (UrlPattern::Glob(a), UrlPattern::Glob(b)) => a == b,
            (UrlPattern::Regex(a), UrlPattern::Regex(b)) => a == b,
            (UrlPattern::Exact(a), UrlPattern::Exact(b)) => a == b,
            (UrlPattern::Predicate(a), UrlPattern::Predicate(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for UrlPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UrlPattern::Glob(g) => f.debug_tuple("Glob").field(g).finish(),
            UrlPattern::Regex(r) => f.debug_tuple("Regex").field(r).finish(),
            UrlPattern::Exact(u) => f.debug_tuple("Exact").field(u).finish(),
            UrlPattern::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl std::fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UrlPattern::Glob(g) => write!(f, "{g}"),
            UrlPattern::Regex(r) => write!(f, "/{r}/"),
            UrlPattern::Exact(u) => write!(f, "{u}"),
            UrlPattern::Predicate(_) => f.write_str("<predicate>"),
        }
    }
}

impl From<&str> for UrlPattern {
    fn from(glob: &str) -> Self {
        UrlPattern::Glob(glob.to_string())
    }
}

impl From<String> for UrlPattern {
    fn from(glob: String) -> Self {
        UrlPattern::Glob(glob)
    }
}

impl From<Regex> for UrlPattern {
    fn from(regex: Regex) -> Self {
        UrlPattern::Regex(regex.as_str().to_string())
    }
}

/// A pattern paired with its compiled matcher.
#[derive(Debug)]
pub struct CompiledPattern {
    pattern: UrlPattern,
    matcher: Box<dyn Matcher>,
}

impl CompiledPattern {
    pub fn pattern(&self) -> &UrlPattern {
        &self.pattern
    }

    pub fn matches(&self, url: &Url) -> bool {
        self.matcher.matches(url)
    }
}

#[derive(Debug)]
struct GlobMatcher {
    glob: String,
    regex: Regex,
}

impl Matcher for GlobMatcher {
    fn matches(&self, url: &Url) -> bool {
        self.regex.is_match(url.as_str())
    }
}

#[derive(Debug)]
struct RegexMatcher {
    regex: Regex,
}

impl Matcher for RegexMatcher {
    fn matches(&self, url: &Url) -> bool {
        self.regex.is_match(url.as_str())
    }
}

#[derive(Debug)]
struct ExactMatcher {
    url: String,
}

impl Matcher for ExactMatcher {
    fn matches(&self, url: &Url) -> bool {
        url.as_str() == self.url
    }
}

struct PredicateMatcher {
    f: UrlPredicate,
}

impl std::fmt::Debug for PredicateMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PredicateMatcher")
    }
}

impl Matcher for PredicateMatcher {
    fn matches(&self, url: &Url) -> bool {
        (self.f)(url)
    }
}

/// Resolve a relative glob against `base_url`.
///
/// Only the literal directory prefix goes through `Url::join`; the part from
/// the first glob token on is appended verbatim so braces and escapes survive.
fn resolve_against_base(pattern: &str, base_url: Option<&Url>) -> String {
    let Some(base) = base_url else {
        return pattern.to_string();
    };
    if pattern.starts_with('*') || pattern.contains("://") {
        return pattern.to_string();
    }

    let Some(token) = pattern.find(['*', '?', '{', '[', '\\']) else {
        return base
            .join(pattern)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| pattern.to_string());
    };
    let split = pattern[..token].rfind('/').map_or(0, |slash| slash + 1);
    let (prefix, rest) = pattern.split_at(split);
    let prefix = if prefix.is_empty() { "./" } else { prefix };

    match base.join(prefix) {
        Ok(url) => format!("{url}{rest}"),
        Err(_) => pattern.to_string(),
    }
}

/// Translate a URL glob into an anchored regex source.
///
/// Supported syntax: `*`, `**`, `?`, `{a,b}`, `[...]` / `[!...]`, `\` escapes.
pub fn glob_to_regex(glob: &str) -> Result<String> {
    let chars: Vec<char> = glob.chars().collect();
    let mut out = String::with_capacity(glob.len() * 2 + 2);
    out.push('^');

    let mut in_group = false;
    let mut in_class = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if in_class {
            match c {
                ']' => {
                    in_class = false;
                    out.push(']');
                }
                '\\' => {
                    i += 1;
                    let escaped = chars
                        .get(i)
                        .ok_or_else(|| Error::invalid_pattern(glob, "trailing escape"))?;
                    push_escaped(&mut out, *escaped);
                }
                // Set operators in regex classes.
                '[' | '&' | '~' => {
                    out.push('\\');
                    out.push(c);
                }
                _ => out.push(c),
            }
            i += 1;
            continue;
        }

        match c {
            '\\' => {
                i += 1;
                let escaped = chars
                    .get(i)
                    .ok_or_else(|| Error::invalid_pattern(glob, "trailing escape"))?;
                push_escaped(&mut out, *escaped);
            }
            '*' => {
                if chars.get(i + 1) == Some(&'*') {
                    while chars.get(i + 1) == Some(&'*') {
                        i += 1;
                    }
                    out.push_str(".*");
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push('.'),
            '[' => {
                in_class = true;
                out.push('[');
                if chars.get(i + 1) == Some(&'!') {
                    out.push('^');
                    i += 1;
                }
            }
            '{' => {
                if in_group {
                    return Err(Error::invalid_pattern(glob, "nested '{' groups are not supported"));
                }
                in_group = true;
                out.push_str("(?:");
            }
            '}' => {
                if !in_group {
                    return Err(Error::invalid_pattern(glob, "unmatched '}'"));
                }
                in_group = false;
                out.push(')');
            }
            ',' if in_group => out.push('|'),
            _ => push_escaped(&mut out, c),
        }
        i += 1;
    }

    if in_group {
        return Err(Error::invalid_pattern(glob, "unclosed '{' group"));
    }
    if in_class {
        return Err(Error::invalid_pattern(glob, "unterminated character class"));
    }

    out.push('$');
    Ok(out)
}

fn push_escaped(out: &mut String, c: char) {
    let mut buf = [0u8; 4];
    out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
}
