//! In-memory key-value storage owned by a single node.
//!
//! The store lives inside the node task and is never shared, so it needs no
//! lock. Writes are last-write-wins: whatever is applied most recently at this
//! node is what a read returns.

use std::collections::BTreeMap;

/// Entry present in every freshly created store.
pub const SEED_KEY: &str = "why?";
pub const SEED_VALUE: &str = "because...";

/// A `"key value"` payload as carried by Put and Replicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteBody<'a> {
    pub key: &'a str,
    pub value: &'a str,
}

impl<'a> WriteBody<'a> {
    /// Splits the body into its first two whitespace-separated tokens. Extra
    /// tokens are ignored; a missing key or value yields `None`.
    pub fn parse(body: &'a str) -> Option<Self> {
        let mut tokens = body.split_whitespace();
        let key = tokens.next()?;
        let value = tokens.next()?;
        Some(Self { key, value })
    }
}

/// BTreeMap keeps iteration order stable for reports and tests.
#[derive(Debug, Clone, Default)]
pub struct KvStore {
    data: BTreeMap<String, String>,
}

impl KvStore {
    /// Creates a store holding only the seed entry.
    pub fn new() -> Self {
        let mut store = Self::default();
        store.put(SEED_KEY, SEED_VALUE);
        store
    }

    /// Stores a key-value pair, overwriting any existing value.
    pub fn put(&mut self, key: &str, value: &str) {
        self.data.insert(key.to_string(), value.to_string());
    }

    /// Applies a parsed write body. Returns false when the body was rejected.
    pub fn apply(&mut self, body: &str) -> bool {
        match WriteBody::parse(body) {
            Some(WriteBody { key, value }) => {
                self.put(key, value);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    /// Read with the wire convention: absent keys read as the empty string.
    pub fn read(&self, key: &str) -> &str {
        self.get(key).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.data.clone()
    }
}
