//! Namespace prefix bindings for XPath expressions.
//!
//! Bindings are given as a single string of whitespace-separated
//! `prefix=uri` tokens, e.g.
//! `"nc=urn:ietf:params:xml:ns:netconf:base:1.0 junos=http://xml.juniper.net/junos/*/junos"`.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;

use crate::error::{Error, Result};

/// Ordered set of `(prefix, uri)` bindings.
///
/// Prefixes are unique: a string that binds the same prefix twice is
/// rejected as a format error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingSet {
    bindings: IndexMap<String, String>,
}

impl BindingSet {
    /// Create an empty binding set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `prefix=uri prefix=uri ...` string.
    ///
    /// Each token is split on its first `=`. The whole call fails if any
    /// token has no `=` or repeats a prefix; no partial set is returned.
    pub fn parse(input: &str) -> Result<Self> {
        let mut bindings = IndexMap::new();

        for token in input.split_whitespace() {
            let (prefix, uri) = token.split_once('=').ok_or_else(|| {
                Error::format(format!(
                    "invalid namespace binding '{}' in \"{}\" (expected prefix=uri)",
                    token, input
                ))
            })?;

            if bindings.contains_key(prefix) {
                return Err(Error::format(format!(
                    "namespace prefix '{}' bound more than once in \"{}\"",
                    prefix, input
                )));
            }
            bindings.insert(prefix.to_string(), uri.to_string());
        }

        Ok(Self { bindings })
    }

    /// Add a binding, replacing any previous URI for the prefix.
    pub fn insert(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.bindings.insert(prefix.into(), uri.into());
    }

    /// Look up the URI bound to a prefix.
    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.bindings.get(prefix).map(String::as_str)
    }

    /// Iterate bindings in input order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings.iter().map(|(p, u)| (p.as_str(), u.as_str()))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl FromStr for BindingSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for BindingSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (prefix, uri) in self.iter() {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{}={}", prefix, uri)?;
            first = false;
        }
        Ok(())
    }
}
