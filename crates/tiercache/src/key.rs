//! Locators and the cache keys derived from them

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};
use url::Url;

use crate::error::{CacheError, Result};

/// A validated resource address
///
/// Parsing normalizes the URL: scheme and host are lowercased, a default
/// port is dropped and the fragment is removed, since none of these change
/// which resource a server returns.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator(Url);

impl Locator {
    /// Parse and normalize a locator
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason: String| CacheError::InvalidLocator {
            locator: input.to_string(),
            reason,
        };

        let mut url = Url::parse(input.trim()).map_err(|e| invalid(e.to_string()))?;
        if url.cannot_be_a_base() {
            return Err(invalid("not a hierarchical URL".to_string()));
        }
        url.set_fragment(None);

        Ok(Locator(url))
    }

    /// Normalized URL
    pub fn url(&self) -> &Url {
        &self.0
    }

    /// Normalized URL as a string
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// URL scheme, lowercased
    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }

    /// Cache key for this locator
    pub fn key(&self) -> CacheKey {
        let digest = Sha256::digest(self.as_str().as_bytes());
        CacheKey(hex::encode(digest))
    }
}

impl FromStr for Locator {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        Locator::parse(s)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hex-encoded SHA-256 of a normalized locator
///
/// Always 64 lowercase hex characters, so it is safe as a file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
