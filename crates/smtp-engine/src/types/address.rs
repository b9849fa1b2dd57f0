//! Envelope address types.

use crate::error::{Error, Result};

const POSTMASTER: &str = "postmaster";

/// Email address for the SMTP envelope.
///
/// The null reverse-path `<>` used for bounces is represented by
/// [`Address::null`]. The bare `Postmaster` mailbox (RFC 5321 section 4.5.1)
/// is the one address accepted without a domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates a new address from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        Self::validate(&addr)?;
        Ok(Self(addr))
    }

    /// Returns the null reverse-path.
    #[must_use]
    pub const fn null() -> Self {
        Self(String::new())
    }

    /// Returns true for the null reverse-path.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the domainless `Postmaster` mailbox.
    #[must_use]
    pub fn is_postmaster(&self) -> bool {
        self.0.eq_ignore_ascii_case(POSTMASTER)
    }

    /// Returns the domain part, if any.
    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        self.0.rsplit_once('@').map(|(_, domain)| domain)
    }

    /// Checks the `local@domain` shape; the local part may itself contain
    /// a quoted `@`, so the domain is split off at the last one.
    fn validate(addr: &str) -> Result<()> {
        let reason = if addr.is_empty() {
            "empty address"
        } else if addr.contains(|c: char| c.is_whitespace() || c.is_control() || c == '<' || c == '>') {
            "forbidden character"
        } else {
            match addr.rsplit_once('@') {
                None if addr.eq_ignore_ascii_case(POSTMASTER) => return Ok(()),
                None => "missing @",
                Some(("", _)) => "empty local part",
                Some((_, "")) => "empty domain",
                Some(_) => return Ok(()),
            }
        };
        Err(Error::InvalidAddress(format!("{reason}: {addr:?}")))
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn accepts_mailbox_and_splits_domain() {
        let addr = Address::new("user@example.com").unwrap();
        assert_eq!(addr.as_str(), "user@example.com");
        assert_eq!(addr.domain(), Some("example.com"));
        assert!(!addr.is_null());

        let quoted: Address = "\"a@b\"@example.com".parse().unwrap();
        assert_eq!(quoted.domain(), Some("example.com"));
    }

    #[test]
    fn rejects_malformed() {
        for bad in ["", "userexample.com", "@example.com", "user@", "<user@example.com>", "us er@example.com"] {
            assert!(
                matches!(Address::new(bad), Err(Error::InvalidAddress(_))),
                "{bad:?} accepted"
            );
        }
    }

    #[test]
    fn bare_postmaster_is_accepted() {
        let postmaster = Address::new("Postmaster").unwrap();
        assert!(postmaster.is_postmaster());
        assert_eq!(postmaster.domain(), None);
        assert!(!Address::new("postmaster@example.com").unwrap().is_postmaster());
        assert!(Address::new("webmaster").is_err());
    }

    #[test]
    fn null_path_has_no_domain() {
        let null = Address::null();
        assert!(null.is_null());
        assert_eq!(null.to_string(), "");
        assert_eq!(null.domain(), None);
    }
}
