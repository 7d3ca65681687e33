//! Credential registry.
//!
//! Holds hashed tokens only. Plaintext tokens are hashed on insertion and
//! dropped by the caller; nothing in this module retains them.
//!
//! Two shapes exist:
//!
//! - [`AuthMode::PerOriginator`] (canonical): one hash per event source,
//!   salted with the source itself, so a token issued to one source cannot be
//!   replayed under another source's identity.
//! - [`AuthMode::Flat`] (legacy): an unsalted allow-list with no source
//!   binding. Kept for deployments whose token files predate per-source
//!   tokens.
//!
//! The registry is populated once at startup and shared read-only behind an
//! `Arc` afterwards, so no locking is needed.

use crate::domain::crypto::{constant_time_compare, hash};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Which registry shape the gateway authenticates against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// Tokens bound to an event source; the source is the salt
    #[default]
    PerOriginator,
    /// Unsalted allow-list of tokens (legacy)
    Flat,
}

impl FromStr for AuthMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per-originator" | "per-source" | "source" => Ok(AuthMode::PerOriginator),
            "flat" | "legacy" => Ok(AuthMode::Flat),
            other => Err(format!(
                "unknown auth mode {other:?} (expected \"per-originator\" or \"flat\")"
            )),
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::PerOriginator => f.write_str("per-originator"),
            AuthMode::Flat => f.write_str("flat"),
        }
    }
}

/// Hashed credentials in one of the two supported shapes
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialRegistry {
    /// Source -> `hash(source, token)`
    PerOriginator(HashMap<String, String>),
    /// `hash("", token)` for every allowed token; duplicates are harmless
    Flat(Vec<String>),
}

impl CredentialRegistry {
    /// Create an empty registry of the given shape
    pub fn new(mode: AuthMode) -> Self {
        match mode {
            AuthMode::PerOriginator => CredentialRegistry::PerOriginator(HashMap::new()),
            AuthMode::Flat => CredentialRegistry::Flat(Vec::new()),
        }
    }

    /// Shape of this registry
    pub fn mode(&self) -> AuthMode {
        match self {
            CredentialRegistry::PerOriginator(_) => AuthMode::PerOriginator,
            CredentialRegistry::Flat(_) => AuthMode::Flat,
        }
    }

    /// Hash and store a token.
    ///
    /// In per-originator mode the token is salted with `source` and replaces
    /// any earlier entry for that source. In flat mode `source` is ignored and
    /// the unsalted hash is appended.
    pub fn add_token(&mut self, source: &str, token: &str) {
        match self {
            CredentialRegistry::PerOriginator(by_source) => {
                by_source.insert(source.to_string(), hash(source, token));
            }
            CredentialRegistry::Flat(hashes) => hashes.push(hash("", token)),
        }
    }

    /// Stored hash for `source` (per-originator mode only)
    pub fn lookup(&self, source: &str) -> Option<&str> {
        match self {
            CredentialRegistry::PerOriginator(by_source) => {
                by_source.get(source).map(String::as_str)
            }
            CredentialRegistry::Flat(_) => None,
        }
    }

    /// Whether `hashed` is on the allow-list (flat mode only)
    pub fn contains(&self, hashed: &str) -> bool {
        match self {
            CredentialRegistry::PerOriginator(_) => false,
            CredentialRegistry::Flat(hashes) => {
                // Scan everything so timing does not reveal the match position
                hashes
                    .iter()
                    .fold(false, |found, h| constant_time_compare(h, hashed) | found)
            }
        }
    }

    /// Check a presented token.
    ///
    /// `source` is required in per-originator mode; an unknown or missing
    /// source is indistinguishable from a bad token.
    pub fn verify(&self, source: Option<&str>, token: &str) -> bool {
        if token.is_empty() {
            return false;
        }
        match self {
            CredentialRegistry::PerOriginator(_) => {
                let Some(source) = source else {
                    return false;
                };
                match self.lookup(source) {
                    Some(expected) => constant_time_compare(&hash(source, token), expected),
                    None => false,
                }
            }
            CredentialRegistry::Flat(_) => self.contains(&hash("", token)),
        }
    }

    /// Number of stored hashes
    pub fn len(&self) -> usize {
        match self {
            CredentialRegistry::PerOriginator(by_source) => by_source.len(),
            CredentialRegistry::Flat(hashes) => hashes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// Hashes are not secrets, but there is no reason to spray them into logs either
impl fmt::Debug for CredentialRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRegistry")
            .field("mode", &self.mode())
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_is_empty() {
        assert!(CredentialRegistry::new(AuthMode::PerOriginator).is_empty());
        assert!(CredentialRegistry::new(AuthMode::Flat).is_empty());
    }

    #[test]
    fn test_add_token_per_originator() {
        let mut registry = CredentialRegistry::new(AuthMode::PerOriginator);
        registry.add_token("foo", "bar");
        assert_eq!(registry.lookup("foo"), Some(hash("foo", "bar").as_str()));
        assert_eq!(registry.lookup("nope"), None);
    }

    #[test]
    fn test_add_token_overwrites_same_source() {
        let mut registry = CredentialRegistry::new(AuthMode::PerOriginator);
        registry.add_token("foo", "first");
        registry.add_token("foo", "second");
        assert_eq!(registry.len(), 1);
        assert!(registry.verify(Some("foo"), "second"));
        assert!(!registry.verify(Some("foo"), "first"));
    }

    #[test]
    fn test_add_token_flat() {
        let mut registry = CredentialRegistry::new(AuthMode::Flat);
        registry.add_token("ignored", "foo");
        registry.add_token("ignored", "foo");
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(&hash("", "foo")));
        assert!(!registry.contains(&hash("", "bar")));
        assert_eq!(registry.lookup("ignored"), None);
    }

    #[test]
    fn test_verify_per_originator() {
        let mut registry = CredentialRegistry::new(AuthMode::PerOriginator);
        registry.add_token("foo", "bar");
        registry.add_token("other", "baz");

        assert!(registry.verify(Some("foo"), "bar"));
        assert!(!registry.verify(Some("foo"), "baz"));
        // A valid token for one source is useless under another source
        assert!(!registry.verify(Some("other"), "bar"));
        assert!(!registry.verify(Some("unknown"), "bar"));
        assert!(!registry.verify(None, "bar"));
        assert!(!registry.verify(Some("foo"), ""));
    }

    #[test]
    fn test_verify_flat() {
        let mut registry = CredentialRegistry::new(AuthMode::Flat);
        registry.add_token("", "bar");

        assert!(registry.verify(None, "bar"));
        assert!(registry.verify(Some("anything"), "bar"));
        assert!(!registry.verify(None, "baz"));
        assert!(!registry.verify(None, ""));
    }

    #[test]
    fn test_auth_mode_parse() {
        assert_eq!("per-originator".parse::<AuthMode>(), Ok(AuthMode::PerOriginator));
        assert_eq!("FLAT".parse::<AuthMode>(), Ok(AuthMode::Flat));
        assert!("bogus".parse::<AuthMode>().is_err());
        assert_eq!(AuthMode::default(), AuthMode::PerOriginator);
        assert_eq!(AuthMode::Flat.to_string(), "flat");
    }

    #[test]
    fn test_debug_hides_hashes() {
        let mut registry = CredentialRegistry::new(AuthMode::PerOriginator);
        registry.add_token("foo", "bar");
        let rendered = format!("{:?}", registry);
        assert!(!rendered.contains(&hash("foo", "bar")));
        assert!(rendered.contains("entries: 1"));
    }
}
