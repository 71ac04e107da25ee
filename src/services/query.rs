//! Query strings built from optional parameters

/// Ordered query parameters; absent values are skipped
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.pairs.push((key.to_string(), value.to_string()));
        self
    }

    /// Add `key` only when `value` is present
    pub fn opt<V: ToString>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.with(key, v),
            None => self,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// `?a=1&b=two`, or an empty string when there are no parameters
    pub fn to_query_string(&self) -> String {
        if self.pairs.is_empty() {
            return String::new();
        }
        let encoded: Vec<String> = self
            .pairs
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect();
        format!("?{}", encoded.join("&"))
    }

    /// `endpoint` with the query string appended
    pub fn apply(&self, endpoint: &str) -> String {
        format!("{}{}", endpoint, self.to_query_string())
    }

    /// Parameters as a JSON object, for endpoints that take them as a body
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .pairs
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_values_are_skipped() {
        let params = QueryParams::new()
            .opt("date_from", Some("2024-05-01"))
            .opt::<String>("date_to", None)
            .with("page", 2);

        assert_eq!(params.to_query_string(), "?date_from=2024-05-01&page=2");
        assert_eq!(params.get("page"), Some("2"));
    }

    #[test]
    fn test_empty_params_add_nothing() {
        assert_eq!(QueryParams::new().apply("/personnel"), "/personnel");
    }

    #[test]
    fn test_values_are_encoded() {
        let params = QueryParams::new().with("search", "Dela Cruz & Co");
        assert_eq!(params.apply("/personnel"), "/personnel?search=Dela%20Cruz%20%26%20Co");
    }
}
