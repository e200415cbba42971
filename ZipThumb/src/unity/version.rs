//! Unity engine version strings (`5.6.2f1`, `2019.4.31f1`)

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Parsed `major.minor.patch<type><build>` version.
///
/// Comparisons only look at the numeric triple, which is all the object
/// layouts depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnityVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl UnityVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// Whether this version is at least `major.minor`.
    pub fn at_least(self, major: u32, minor: u32) -> bool {
        (self.major, self.minor) >= (major, minor)
    }

    /// Whether the string is a placeholder left by version stripping.
    pub fn is_stripped(text: &str) -> bool {
        text.is_empty() || text == "0.0.0"
    }
}

impl FromStr for UnityVersion {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        let mut parts = text
            .split(|c: char| !c.is_ascii_digit())
            .filter(|part| !part.is_empty())
            .map(str::parse::<u32>);
        let mut next = || -> Result<u32> {
            parts
                .next()
                .unwrap_or(Ok(0))
                .map_err(|_| Error::InvalidUnityVersion(text.to_string()))
        };
        let version = Self::new(next()?, next()?, next()?);
        if version.major == 0 && !text.starts_with('0') {
            return Err(Error::InvalidUnityVersion(text.to_string()));
        }
        Ok(version)
    }
}

impl fmt::Display for UnityVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
