//! Ordered label sets attached to every recorded sample.

pub const METHOD: &str = "method";
pub const CLIENT: &str = "client";
/// Randomized high-cardinality dimension.
pub const SQL_HASH: &str = "sqlhash";

/// Key/value string pairs in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet {
    pairs: Vec<(String, String)>,
}

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// `method=repl, client=cli`, shared by every scenario.
    pub fn common() -> Self {
        Self::new().with(METHOD, "repl").with(CLIENT, "cli")
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Sorted owned copy, used as an aggregation key.
    pub fn sorted_key(&self) -> Vec<(String, String)> {
        let mut key = self.pairs.clone();
        key.sort();
        key
    }
}
