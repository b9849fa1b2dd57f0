//! Service extensions exchanged in the EHLO reply.

use std::fmt;

/// One service extension: advertised by the server role, discovered from
/// the EHLO reply by the client role.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// `ENHANCEDSTATUSCODES` (RFC 2034).
    EnhancedStatusCodes,
    /// `8BITMIME` (RFC 6152).
    EightBitMime,
    /// `PIPELINING` (RFC 2920).
    Pipelining,
    /// `SIZE` with the optional limit in bytes (RFC 1870).
    Size(Option<usize>),
    /// Any other keyword, kept verbatim with its parameters.
    Other(String),
}

impl Extension {
    /// Parses one EHLO reply line after the greeting line.
    ///
    /// Keywords are matched case-insensitively.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (keyword, params) = line.split_once(' ').unwrap_or((line, ""));
        if keyword.eq_ignore_ascii_case("ENHANCEDSTATUSCODES") {
            Self::EnhancedStatusCodes
        } else if keyword.eq_ignore_ascii_case("8BITMIME") {
            Self::EightBitMime
        } else if keyword.eq_ignore_ascii_case("PIPELINING") {
            Self::Pipelining
        } else if keyword.eq_ignore_ascii_case("SIZE") {
            Self::Size(params.trim().parse().ok())
        } else {
            Self::Other(line.to_string())
        }
    }

    /// Returns true if `self` and `other` name the same keyword, ignoring
    /// parameters.
    #[must_use]
    pub fn same_keyword(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Size(_), Self::Size(_)) => true,
            (Self::Other(a), Self::Other(b)) => {
                let keyword = |s: &str| s.split(' ').next().unwrap_or_default().to_ascii_uppercase();
                keyword(a) == keyword(b)
            }
            _ => self == other,
        }
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnhancedStatusCodes => f.write_str("ENHANCEDSTATUSCODES"),
            Self::EightBitMime => f.write_str("8BITMIME"),
            Self::Pipelining => f.write_str("PIPELINING"),
            Self::Size(None) => f.write_str("SIZE"),
            Self::Size(Some(limit)) => write!(f, "SIZE {limit}"),
            Self::Other(line) => f.write_str(line),
        }
    }
}
