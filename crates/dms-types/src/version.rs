use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// A `major.minor` version number.
///
/// Ordering is lexicographic on `(major, minor)`. Fresh objects start at
/// `1.0`; the major component is never zero.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    /// Version `1.0`.
    pub const INITIAL: Version = Version { major: 1, minor: 0 };

    /// Build a version, rejecting a zero major component.
    pub fn new(major: u32, minor: u32) -> Result<Self, TypeError> {
        if major == 0 {
            return Err(TypeError::InvalidVersion(format!("{major}.{minor}")));
        }
        Ok(Self { major, minor })
    }

    /// `1.0`.
    pub fn initial() -> Self {
        Self::INITIAL
    }

    /// `(major + 1).0`
    pub fn next_major(&self) -> Self {
        Self {
            major: self.major.saturating_add(1),
            minor: 0,
        }
    }

    /// `major.(minor + 1)`
    pub fn next_minor(&self) -> Self {
        Self {
            major: self.major,
            minor: self.minor.saturating_add(1),
        }
    }

    /// Suffix used where a per-version unique label is needed (`_v2.0`).
    pub fn suffix(&self) -> String {
        format!("_v{}.{}", self.major, self.minor)
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({}.{})", self.major, self.minor)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for Version {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TypeError::InvalidVersion(s.to_string());
        let (major, minor) = s.split_once('.').ok_or_else(invalid)?;
        let major = major.parse::<u32>().map_err(|_| invalid())?;
        let minor = minor.parse::<u32>().map_err(|_| invalid())?;
        Self::new(major, minor)
    }
}

/// Which component of the version a branch bumps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BranchKind {
    Major,
    Minor,
}

impl BranchKind {
    /// The version a branch of this kind produces from `from`.
    pub fn apply(&self, from: Version) -> Version {
        match self {
            Self::Major => from.next_major(),
            Self::Minor => from.next_minor(),
        }
    }
}

impl fmt::Display for BranchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Major => write!(f, "major"),
            Self::Minor => write!(f, "minor"),
        }
    }
}
