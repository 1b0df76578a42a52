//! Request parameter bags and backend URL materialization.
//!
//! Each request carries three bags: path captures from the route matcher,
//! query parameters, and request headers. Backend URL templates draw on a
//! union of the three (path > query > header) which explicit per-call
//! `$path.X` / `$query.X` / `$header.X` bindings then override.
use std::collections::HashMap;

use http::{HeaderMap, Uri};

use crate::{config::models::Call, core::route::PLACEHOLDER_RE};

/// The three per-request parameter bags.
///
/// Query keys and header names keep only their first value. Header names are
/// in the http crate's canonical lowercase form, so `$header.X-Token` and
/// `$header.x-token` select the same header.
#[derive(Debug, Default)]
pub struct RequestParams {
    pub path: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub header: HashMap<String, String>,
}

impl RequestParams {
    /// Assemble the bags from route captures and the request's URI and headers.
    pub fn new(path: HashMap<String, String>, uri: &Uri, headers: &HeaderMap) -> Self {
        Self {
            path,
            query: extract_query_params(uri),
            header: extract_header_params(headers),
        }
    }

    /// Union of the three bags with precedence path > query > header.
    fn merged(&self) -> HashMap<String, String> {
        let mut merged = self.path.clone();
        for (key, value) in &self.query {
            merged
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        for (key, value) in &self.header {
            merged
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        merged
    }

    /// Look up a parameter in the single bag a source reference names.
    fn lookup(&self, source: ParamSource, name: &str) -> Option<&String> {
        match source {
            ParamSource::Path => self.path.get(name),
            ParamSource::Query => self.query.get(name),
            ParamSource::Header => self.header.get(&name.to_ascii_lowercase()),
        }
    }
}

/// Which bag a `$path.X` / `$query.X` / `$header.X` reference selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamSource {
    Path,
    Query,
    Header,
}

impl ParamSource {
    /// Split a source reference into its bag selector and parameter name.
    /// References that do not split into exactly two dot-separated parts
    /// yield `None` and are ignored by the resolver.
    fn parse(source: &str) -> Option<(Self, &str)> {
        let mut parts = source.split('.');
        let prefix = parts.next()?;
        let name = parts.next()?;
        if parts.next().is_some() {
            return None;
        }
        let bag = match prefix {
            "$path" => Self::Path,
            "$query" => Self::Query,
            "$header" => Self::Header,
            _ => return None,
        };
        Some((bag, name))
    }
}

/// A `{placeholder}` in a backend template that no parameter satisfied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Missing required parameter: {placeholder}")]
pub struct MissingParameter {
    pub placeholder: String,
}

/// Materialize the backend URL for one call.
///
/// The generic union (path > query > header) seeds the substitution map, and
/// each explicit `call.params` binding then overrides its placeholder. A
/// placeholder left without a value, or bound to the empty string, fails the
/// whole call.
pub fn build_backend_url(call: &Call, params: &RequestParams) -> Result<String, MissingParameter> {
    let mut all_params = params.merged();
    for (placeholder, source) in &call.params {
        if let Some((bag, name)) = ParamSource::parse(source) {
            if let Some(value) = params.lookup(bag, name) {
                all_params.insert(placeholder.clone(), value.clone());
            }
        }
    }

    let template = call.backend.as_str();
    let mut url = String::with_capacity(template.len());
    let mut literal_start = 0;
    for captures in PLACEHOLDER_RE.captures_iter(template) {
        let placeholder = captures.get(0).expect("whole match always present");
        let name = &captures[1];

        let value = all_params
            .get(name)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| MissingParameter {
                placeholder: name.to_string(),
            })?;

        url.push_str(&template[literal_start..placeholder.start()]);
        url.push_str(value);
        literal_start = placeholder.end();
    }
    url.push_str(&template[literal_start..]);

    Ok(url)
}

/// First value wins for multi-valued query keys.
fn extract_query_params(uri: &Uri) -> HashMap<String, String> {
    let mut params = HashMap::new();
    if let Some(query) = uri.query() {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            params.entry(key.into_owned()).or_insert(value.into_owned());
        }
    }
    params
}

/// First value wins for repeated headers; values that are not valid UTF-8 are skipped.
fn extract_header_params(headers: &HeaderMap) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            params
                .entry(name.as_str().to_string())
                .or_insert_with(|| value.to_string());
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    fn call_with(backend: &str, params: &[(&str, &str)]) -> Call {
        Call {
            name: "svc".to_string(),
            backend: backend.to_string(),
            required: false,
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn request_params(
        path: &[(&str, &str)],
        query: &[(&str, &str)],
        header: &[(&str, &str)],
    ) -> RequestParams {
        let to_map = |pairs: &[(&str, &str)]| {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        };
        RequestParams {
            path: to_map(path),
            query: to_map(query),
            header: to_map(header),
        }
    }

    #[test]
    fn test_template_without_placeholders_is_unchanged() {
        let call = call_with("http://svc/all", &[]);
        let url = build_backend_url(&call, &RequestParams::default()).unwrap();
        assert_eq!(url, "http://svc/all");
    }

    #[test]
    fn test_union_precedence_path_over_query_over_header() {
        let call = call_with("http://svc/{id}", &[]);
        let params = request_params(&[("id", "P")], &[("id", "Q")], &[("id", "H")]);
        assert_eq!(build_backend_url(&call, &params).unwrap(), "http://svc/P");

        let params = request_params(&[], &[("id", "Q")], &[("id", "H")]);
        assert_eq!(build_backend_url(&call, &params).unwrap(), "http://svc/Q");

        let params = request_params(&[], &[], &[("id", "H")]);
        assert_eq!(build_backend_url(&call, &params).unwrap(), "http://svc/H");
    }

    #[test]
    fn test_explicit_binding_beats_union() {
        // The union would pick the path value; the explicit binding names the query bag.
        let call = call_with("http://svc/{id}", &[("id", "$query.uid")]);
        let params = request_params(&[("id", "P")], &[("uid", "Q")], &[]);
        assert_eq!(build_backend_url(&call, &params).unwrap(), "http://svc/Q");
    }

    #[test]
    fn test_binding_looks_up_named_bag_only() {
        // $query.id must not fall back to the path bag.
        let call = call_with("http://svc/{id}", &[("id", "$query.id")]);
        let params = request_params(&[("id", "P")], &[], &[]);
        // The binding resolves nothing, so the union value still applies.
        assert_eq!(build_backend_url(&call, &params).unwrap(), "http://svc/P");
    }

    #[test]
    fn test_malformed_sources_are_ignored() {
        for source in ["$path", "$path.a.b", "path.id", "$cookie.id", ""] {
            let call = call_with("http://svc/{id}", &[("id", source)]);
            let params = request_params(&[("id", "P")], &[], &[]);
            assert_eq!(
                build_backend_url(&call, &params).unwrap(),
                "http://svc/P",
                "source {source:?} should be ignored"
            );
        }
    }

    #[test]
    fn test_missing_placeholder_fails_the_call() {
        let call = call_with("http://svc/{missing}", &[]);
        let err = build_backend_url(&call, &RequestParams::default()).unwrap_err();
        assert_eq!(err.placeholder, "missing");
        assert_eq!(
            err.to_string(),
            "Missing required parameter: missing"
        );
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let call = call_with("http://svc/{id}", &[]);
        let params = request_params(&[("id", "")], &[], &[]);
        assert!(build_backend_url(&call, &params).is_err());
    }

    #[test]
    fn test_header_binding_is_case_insensitive() {
        let call = call_with("http://svc/{token}", &[("token", "$header.X-Token")]);
        let mut headers = HeaderMap::new();
        headers.insert("x-token", HeaderValue::from_static("t0"));
        let params = RequestParams::new(
            HashMap::new(),
            &"http://gw/a".parse::<Uri>().unwrap(),
            &headers,
        );
        assert_eq!(build_backend_url(&call, &params).unwrap(), "http://svc/t0");
    }

    #[test]
    fn test_query_extraction_first_value_wins() {
        let uri: Uri = "http://gw/a?id=1&id=2&page=3".parse().unwrap();
        let query = extract_query_params(&uri);
        assert_eq!(query["id"], "1");
        assert_eq!(query["page"], "3");
    }

    #[test]
    fn test_header_extraction_first_value_wins() {
        let mut headers = HeaderMap::new();
        headers.append("x-tag", HeaderValue::from_static("a"));
        headers.append("x-tag", HeaderValue::from_static("b"));
        let extracted = extract_header_params(&headers);
        assert_eq!(extracted["x-tag"], "a");
    }

    #[test]
    fn test_multiple_placeholders() {
        let call = call_with("http://svc/{a}/{b}?x={a}", &[]);
        let params = request_params(&[("a", "1"), ("b", "2")], &[], &[]);
        assert_eq!(
            build_backend_url(&call, &params).unwrap(),
            "http://svc/1/2?x=1"
        );
    }
}
