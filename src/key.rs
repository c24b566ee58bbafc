//! Deterministic cache key construction
//!
//! A key is the route name followed by the request parameters sorted by
//! name, e.g. `media.search?page=2&q=dune`. Absent and null parameters are
//! dropped, so a request that omits an optional parameter and one that passes
//! an explicit `null` produce the same key.

use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Display};

use serde_json::Value;

/// Opaque key identifying one logical request
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for CacheKey {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for CacheKey {
    fn from(raw: &str) -> Self {
        Self(raw.to_owned())
    }
}

/// Already-validated request parameters.
///
/// Storage is ordered by name so iteration order never depends on how the
/// bag was assembled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamBag {
    params: BTreeMap<String, Value>,
}

impl ParamBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter. `Value::Null` is treated as absent.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Add an optional parameter; `None` leaves the bag unchanged.
    pub fn with_opt<T: Into<Value>>(self, name: impl Into<String>, value: Option<T>) -> Self {
        match value {
            Some(v) => self.with(name, v),
            None => self,
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        match value.into() {
            Value::Null => {
                self.params.remove(&name);
            }
            v => {
                self.params.insert(name, v);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ParamBag {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut bag = Self::new();
        for (k, v) in iter {
            bag.insert(k, v);
        }
        bag
    }
}

impl From<HashMap<String, Value>> for ParamBag {
    fn from(map: HashMap<String, Value>) -> Self {
        map.into_iter().collect()
    }
}

/// Build the cache key for `route` and `params`.
pub fn build_key(route: &str, params: &ParamBag) -> CacheKey {
    let mut key = escape(route);
    let mut sep = '?';
    for (name, value) in params.iter() {
        key.push(sep);
        key.push_str(&escape(name));
        key.push('=');
        match value {
            Value::String(s) => key.push_str(&escape(s)),
            // Object keys are already sorted by serde_json's default map.
            other => key.push_str(&escape(&other.to_string())),
        }
        sep = '&';
    }
    CacheKey(key)
}

// Keeps separators inside names and values from producing look-alike keys.
fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '%' => out.push_str("%25"),
            '&' => out.push_str("%26"),
            '=' => out.push_str("%3D"),
            '?' => out.push_str("%3F"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_route_without_params() {
        assert_eq!(build_key("media.trending", &ParamBag::new()).as_str(), "media.trending");
    }

    #[test]
    fn test_params_are_sorted_by_name() {
        let params = ParamBag::new().with("q", "dune").with("page", 2);
        assert_eq!(
            build_key("media.search", &params).as_str(),
            "media.search?page=2&q=dune"
        );
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        let a = ParamBag::new()
            .with("id", "tt0111161")
            .with("season", 1)
            .with("episode", 4);
        let b = ParamBag::new()
            .with("episode", 4)
            .with("id", "tt0111161")
            .with("season", 1);

        let mut raw = HashMap::new();
        raw.insert("season".to_owned(), json!(1));
        raw.insert("episode".to_owned(), json!(4));
        raw.insert("id".to_owned(), json!("tt0111161"));
        let c = ParamBag::from(raw);

        assert_eq!(build_key("episode.streams", &a), build_key("episode.streams", &b));
        assert_eq!(build_key("episode.streams", &a), build_key("episode.streams", &c));
    }

    #[test]
    fn test_absent_and_null_params_are_omitted() {
        let omitted = ParamBag::new().with("q", "alien");
        let explicit_null = ParamBag::new().with("q", "alien").with("year", Value::Null);
        let none = ParamBag::new().with("q", "alien").with_opt::<u32>("year", None);

        let key = build_key("media.search", &omitted);
        assert_eq!(key, build_key("media.search", &explicit_null));
        assert_eq!(key, build_key("media.search", &none));
    }

    #[test]
    fn test_null_removes_previous_value() {
        let mut params = ParamBag::new().with("page", 3);
        params.insert("page", Value::Null);
        assert!(params.is_empty());
    }

    #[test]
    fn test_different_routes_and_values_differ() {
        let params = ParamBag::new().with("id", 42);
        assert_ne!(build_key("media.info", &params), build_key("media.episodes", &params));
        assert_ne!(
            build_key("media.info", &params),
            build_key("media.info", &ParamBag::new().with("id", 43))
        );
    }

    #[test]
    fn test_separators_in_values_are_escaped() {
        let tricky = ParamBag::new().with("q", "a&b=c");
        let split = ParamBag::new().with("q", "a").with("b", "c");
        assert_ne!(build_key("media.search", &tricky), build_key("media.search", &split));
        assert_eq!(
            build_key("media.search", &tricky).as_str(),
            "media.search?q=a%26b%3Dc"
        );
    }

    #[test]
    fn test_structured_values_are_stable() {
        let a = ParamBag::new().with("filter", json!({"genre": "drama", "year": 1994}));
        let b = ParamBag::new().with("filter", json!({"year": 1994, "genre": "drama"}));
        assert_eq!(build_key("media.search", &a), build_key("media.search", &b));
    }
}
