//! Compiled route patterns.
//!
//! Aggregation paths like `/users/{id}/profile` are parsed once at startup
//! into anchored regexes so that per-request matching is a single regex
//! application. Placeholder captures match any non-empty run of non-`/`
//! characters; literal characters are escaped verbatim.
use std::{collections::HashMap, sync::LazyLock};

use regex::Regex;

/// `{name}` placeholder syntax shared by route patterns and backend URL templates.
pub(crate) static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\w+)\}").expect("placeholder regex is valid"));

/// A route pattern compiled into an anchored matcher.
///
/// Placeholder names are kept in declaration order so captures can be bound
/// back to their names by index.
#[derive(Debug, Clone)]
pub struct CompiledRoute {
    pattern: String,
    regex: Regex,
    param_names: Vec<String>,
}

impl CompiledRoute {
    /// Compile a pattern string. Literal characters are escaped; each
    /// `{name}` becomes a single `([^/]+)` capture.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let mut regex_str = String::with_capacity(pattern.len() + 16);
        regex_str.push('^');

        let mut param_names = Vec::new();
        let mut literal_start = 0;
        for captures in PLACEHOLDER_RE.captures_iter(pattern) {
            let placeholder = captures.get(0).expect("whole match always present");
            regex_str.push_str(&regex::escape(&pattern[literal_start..placeholder.start()]));
            regex_str.push_str("([^/]+)");
            param_names.push(captures[1].to_string());
            literal_start = placeholder.end();
        }
        regex_str.push_str(&regex::escape(&pattern[literal_start..]));
        regex_str.push('$');

        Ok(Self {
            pattern: pattern.to_string(),
            regex: Regex::new(&regex_str)?,
            param_names,
        })
    }

    /// The original pattern string (also the rate-limiter key for the route).
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Match an incoming path against this route. On success, binds every
    /// placeholder name to its captured substring. Captures are not
    /// URL-decoded beyond what the HTTP layer has already done.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let captures = self.regex.captures(path)?;

        let mut params = HashMap::with_capacity(self.param_names.len());
        for (i, name) in self.param_names.iter().enumerate() {
            if let Some(capture) = captures.get(i + 1) {
                params.insert(name.clone(), capture.as_str().to_string());
            }
        }
        Some(params)
    }
}
