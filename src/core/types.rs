//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`BranchName`] - Validated Git branch name
//! - [`RefName`] - Validated Git reference name
//! - [`Oid`] - Git object identifier (SHA-1 or SHA-256 hex)
//! - [`Identity`] - Name and email used for committer signatures
//! - [`UtcTimestamp`] - RFC3339 timestamp
//! - [`Fingerprint`] - Stable SHA-256 digest over ordered lines
//!
//! # Validation
//!
//! These types enforce validity at construction time. A sequence loaded
//! from disk goes through the same constructors via serde, so a hand-edited
//! state file cannot smuggle in a malformed id or ref.
//!
//! # Examples
//!
//! ```
//! use stepwise::core::types::{BranchName, Identity, Oid, RefName};
//!
//! let branch = BranchName::new("feature/my-branch").unwrap();
//! let refname = RefName::for_branch(&branch);
//! assert_eq!(refname.as_str(), "refs/heads/feature/my-branch");
//!
//! assert!(Oid::new("not-a-sha").is_err());
//! assert!(Identity::new("", "dev@example.com").is_err());
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid ref name: {0}")]
    InvalidRefName(String),

    #[error("invalid identity: {0}")]
    InvalidIdentity(String),
}

/// Characters git refuses anywhere in a refname.
const FORBIDDEN_REF_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];

/// Apply the `git check-ref-format` rules shared by branch and ref names.
///
/// Returns a human-readable reason on failure; callers wrap it in the
/// variant that matches what they were validating.
fn check_ref_format(name: &str, what: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err(format!("{what} cannot be empty"));
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Err(format!("{what} cannot start or end with '/'"));
    }
    if name.ends_with('.') {
        return Err(format!("{what} cannot end with '.'"));
    }
    for bad in ["..", "@{", "//"] {
        if name.contains(bad) {
            return Err(format!("{what} cannot contain '{bad}'"));
        }
    }
    if let Some(c) = name.chars().find(|c| FORBIDDEN_REF_CHARS.contains(c)) {
        return Err(format!("{what} cannot contain '{c}'"));
    }
    if name.chars().any(|c| c.is_ascii_control()) {
        return Err(format!("{what} cannot contain control characters"));
    }
    for component in name.split('/') {
        if component.starts_with('.') {
            return Err("path component cannot start with '.'".into());
        }
        if component.ends_with(".lock") {
            return Err("path component cannot end with '.lock'".into());
        }
    }
    Ok(())
}

macro_rules! string_newtype {
    ($ty:ident) => {
        impl TryFrom<String> for $ty {
            type Error = TypeError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::new(s)
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

/// A validated Git branch name (the part after `refs/heads/`).
///
/// ```
/// use stepwise::core::types::BranchName;
///
/// assert!(BranchName::new("topic/rebase-me").is_ok());
/// assert!(BranchName::new("-flag").is_err());
/// assert!(BranchName::new("@").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name violates Git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if name == "@" {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot be '@' (reserved)".into(),
            ));
        }
        if name.starts_with('-') {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot start with '-'".into(),
            ));
        }
        check_ref_format(&name, "branch name").map_err(TypeError::InvalidBranchName)?;
        Ok(Self(name))
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

string_newtype!(BranchName);

/// A validated, fully qualified Git reference name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefName(String);

impl RefName {
    /// Create a new validated ref name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidRefName` if the name violates Git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        check_ref_format(&name, "ref name").map_err(TypeError::InvalidRefName)?;
        Ok(Self(name))
    }

    /// Create a ref name for a branch (`refs/heads/<branch>`).
    pub fn for_branch(branch: &BranchName) -> Self {
        Self(format!("refs/heads/{}", branch.as_str()))
    }

    /// The branch this ref names, if it lives under `refs/heads/`.
    pub fn branch(&self) -> Option<BranchName> {
        self.0
            .strip_prefix("refs/heads/")
            .and_then(|b| BranchName::new(b).ok())
    }

    /// Check if this ref is a branch ref.
    pub fn is_branch_ref(&self) -> bool {
        self.0.starts_with("refs/heads/")
    }

    /// Get the ref name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

string_newtype!(RefName);

/// A Git object identifier (SHA-1 or SHA-256).
///
/// OIDs are normalized to lowercase.
///
/// ```
/// use stepwise::core::types::Oid;
///
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
/// assert_eq!(oid.short(7), "abc123d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` if the string is not 40 or 64 hex characters.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(
                "object id must be hexadecimal".into(),
            ));
        }
        Ok(Self(oid))
    }

    /// Abbreviated form, clamped to the full length.
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

string_newtype!(Oid);

/// A committer or author identity.
///
/// Both parts must be non-empty and free of the characters git uses to
/// delimit signatures (`<`, `>`, newlines).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    name: String,
    email: String,
}

impl Identity {
    /// Create a validated identity.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidIdentity` for an empty or malformed part.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into().trim().to_string();
        let email = email.into().trim().to_string();
        for (part, value) in [("name", &name), ("email", &email)] {
            if value.is_empty() {
                return Err(TypeError::InvalidIdentity(format!("{part} cannot be empty")));
            }
            if value.contains(['<', '>', '\n', '\r']) {
                return Err(TypeError::InvalidIdentity(format!(
                    "{part} cannot contain '<', '>' or newlines"
                )));
            }
        }
        Ok(Self { name, email })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// A UTC timestamp in RFC3339 format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtcTimestamp(chrono::DateTime<chrono::Utc>);

impl UtcTimestamp {
    /// Create a timestamp for the current moment.
    pub fn now() -> Self {
        Self(chrono::Utc::now())
    }
}

impl std::fmt::Display for UtcTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

/// A stable SHA-256 digest over an ordered list of lines.
///
/// Unlike a set fingerprint, order matters: the persisted step list is
/// an ordered plan and reordering it must change the digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hash each line followed by a newline separator.
    pub fn of_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut hasher = Sha256::new();
        for line in lines {
            hasher.update(line.as_ref().as_bytes());
            hasher.update(b"\n");
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// Get the fingerprint as a hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod branch_name {
        use super::*;

        #[test]
        fn accepts_ordinary_names() {
            for name in ["main", "feature/foo", "fix-123", "user@feature", "a/b/c"] {
                assert!(BranchName::new(name).is_ok(), "{name} should be valid");
            }
        }

        #[test]
        fn rejects_git_forbidden_forms() {
            for name in [
                "", "@", "-flag", ".hidden", "foo/.hidden", "branch.lock", "branch/",
                "bad..path", "foo@{bar", "foo//bar", "has space", "has~tilde", "has:colon",
                "has\ttab",
            ] {
                assert!(BranchName::new(name).is_err(), "{name:?} should be rejected");
            }
        }

        #[test]
        fn serde_rejects_invalid() {
            let parsed: Result<BranchName, _> = serde_json::from_str("\"bad..name\"");
            assert!(parsed.is_err());
        }
    }

    mod ref_name {
        use super::*;

        #[test]
        fn for_branch_and_back() {
            let branch = BranchName::new("topic").unwrap();
            let refname = RefName::for_branch(&branch);
            assert_eq!(refname.as_str(), "refs/heads/topic");
            assert!(refname.is_branch_ref());
            assert_eq!(refname.branch(), Some(branch));
        }

        #[test]
        fn non_branch_ref_has_no_branch() {
            let refname = RefName::new("refs/tags/v1.0").unwrap();
            assert!(!refname.is_branch_ref());
            assert_eq!(refname.branch(), None);
        }

        #[test]
        fn rejects_bad_refs() {
            for name in ["", "/refs/heads/main", "refs/heads/", "refs/heads/main.lock", "refs//x"] {
                assert!(RefName::new(name).is_err(), "{name:?} should be rejected");
            }
        }
    }

    mod oid {
        use super::*;

        #[test]
        fn sha1_and_sha256_lengths() {
            assert!(Oid::new("abc123def4567890abc123def4567890abc12345").is_ok());
            assert!(Oid::new("a".repeat(64)).is_ok());
            assert!(Oid::new("a".repeat(41)).is_err());
        }

        #[test]
        fn non_hex_rejected() {
            assert!(Oid::new("xyz123def4567890abc123def4567890abc12345").is_err());
        }

        #[test]
        fn short_clamps() {
            let oid = Oid::new("abc123def4567890abc123def4567890abc12345").unwrap();
            assert_eq!(oid.short(4), "abc1");
            assert_eq!(oid.short(100), oid.as_str());
        }
    }

    mod identity {
        use super::*;

        #[test]
        fn trims_and_formats() {
            let id = Identity::new("  Ada  ", "ada@example.com").unwrap();
            assert_eq!(id.name(), "Ada");
            assert_eq!(id.to_string(), "Ada <ada@example.com>");
        }

        #[test]
        fn empty_parts_rejected() {
            assert!(matches!(
                Identity::new("", "a@b"),
                Err(TypeError::InvalidIdentity(_))
            ));
            assert!(matches!(
                Identity::new("Ada", "   "),
                Err(TypeError::InvalidIdentity(_))
            ));
        }

        #[test]
        fn delimiters_rejected() {
            assert!(Identity::new("Ada <x>", "a@b").is_err());
            assert!(Identity::new("Ada", "a@b\n").is_ok());
            assert!(Identity::new("Ada", "a\n@b").is_err());
        }
    }

    mod fingerprint {
        use super::*;

        #[test]
        fn order_sensitive() {
            let a = Fingerprint::of_lines(["pick 1", "pick 2"]);
            let b = Fingerprint::of_lines(["pick 2", "pick 1"]);
            assert_ne!(a, b);
            assert_eq!(a, Fingerprint::of_lines(["pick 1", "pick 2"]));
        }

        #[test]
        fn empty_is_stable() {
            let empty: [&str; 0] = [];
            assert_eq!(Fingerprint::of_lines(empty).as_str().len(), 64);
        }
    }
}
