//! Semantic version identifiers for prompt revisions.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A strict `major.minor.patch` semantic version.
///
/// Pre-release and build suffixes are not accepted: prompt versions are
/// append-only identifiers and must order unambiguously.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    major: u64,
    minor: u64,
    patch: u64,
}

impl Version {
    /// Creates a version from its numeric components.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parses a version string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidVersion`] unless the input consists of exactly
    /// three dot-separated non-negative integers.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidVersion {
            version: input.to_owned(),
            reason: reason.to_owned(),
        };

        let parts: Vec<&str> = input.split('.').collect();
        if parts.len() != 3 {
            return Err(invalid("expected exactly three components (major.minor.patch)"));
        }

        let mut numbers = [0_u64; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid("components must be non-negative integers"));
            }
            *slot = part
                .parse()
                .map_err(|_| invalid("component does not fit in 64 bits"))?;
        }

        Ok(Self::new(numbers[0], numbers[1], numbers[2]))
    }

    /// Returns the major component.
    #[must_use]
    pub const fn major(self) -> u64 {
        self.major
    }

    /// Returns the minor component.
    #[must_use]
    pub const fn minor(self) -> u64 {
        self.minor
    }

    /// Returns the patch component.
    #[must_use]
    pub const fn patch(self) -> u64 {
        self.patch
    }

    /// Computes the next version for the requested bump level.
    #[must_use]
    pub const fn bump(self, level: BumpLevel) -> Self {
        match level {
            BumpLevel::Major => Self::new(self.major + 1, 0, 0),
            BumpLevel::Minor => Self::new(self.major, self.minor + 1, 0),
            BumpLevel::Patch => Self::new(self.major, self.minor, self.patch + 1),
        }
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Version {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<Version> for String {
    fn from(value: Version) -> Self {
        value.to_string()
    }
}

/// Which component of a version to increment.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BumpLevel {
    /// Breaking change: `1.4.2 -> 2.0.0`.
    Major,
    /// Backwards-compatible change: `1.4.2 -> 1.5.0`.
    Minor,
    /// Correction: `1.4.2 -> 1.4.3`.
    #[default]
    Patch,
}

impl FromStr for BumpLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "major" => Ok(Self::Major),
            "minor" => Ok(Self::Minor),
            "patch" => Ok(Self::Patch),
            other => Err(Error::InvalidVersion {
                version: other.to_owned(),
                reason: "bump level must be one of major, minor, patch".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_displays() {
        let version = Version::parse("1.2.3").unwrap();
        assert_eq!(version, Version::new(1, 2, 3));
        assert_eq!(version.to_string(), "1.2.3");
    }

    #[test]
    fn rejects_malformed_versions() {
        for input in ["invalid", "1.0", "1.0.0.0", "1.-1.0", "1.a.0", "v1.0.0", "1..0", ""] {
            let err = Version::parse(input).expect_err(input);
            assert!(matches!(err, Error::InvalidVersion { .. }), "{input}");
        }
    }

    #[test]
    fn bumps_each_level() {
        let base = Version::new(1, 4, 2);
        assert_eq!(base.bump(BumpLevel::Patch), Version::new(1, 4, 3));
        assert_eq!(base.bump(BumpLevel::Minor), Version::new(1, 5, 0));
        assert_eq!(base.bump(BumpLevel::Major), Version::new(2, 0, 0));
    }

    #[test]
    fn orders_numerically_not_lexically() {
        assert!(Version::parse("1.10.0").unwrap() > Version::parse("1.9.7").unwrap());
        assert!(Version::parse("2.0.0").unwrap() > Version::parse("1.99.99").unwrap());
    }

    #[test]
    fn serializes_as_string() {
        let json = serde_json::to_string(&Version::new(3, 1, 0)).unwrap();
        assert_eq!(json, "\"3.1.0\"");
        assert!(serde_json::from_str::<Version>("\"3.1\"").is_err());
    }

    #[test]
    fn parses_bump_levels() {
        assert_eq!("Minor".parse::<BumpLevel>().unwrap(), BumpLevel::Minor);
        assert!("huge".parse::<BumpLevel>().is_err());
    }
}
