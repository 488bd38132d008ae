//! Protocol and RPC spec version triples

use serde::{Deserialize, Serialize};

/// Semantic version triple used for both the session protocol version and
/// the RPC spec version negotiated with the head unit.
///
/// Ordering is the derived lexicographic field order (major, minor, patch),
/// which is exactly the comparison the minimum-version floors need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl Version {
    pub fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// The unrestricted floor: every negotiated version satisfies it
    pub fn lowest() -> Self {
        Self::new(1, 0, 0)
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl std::str::FromStr for Version {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.');
        let mut next = |name: &str| {
            parts
                .next()
                .ok_or_else(|| format!("Version '{}' is missing the {} part", s, name))?
                .parse::<u8>()
                .map_err(|e| format!("Invalid {} in version '{}': {}", name, s, e))
        };
        let major = next("major")?;
        let minor = next("minor")?;
        let patch = next("patch")?;
        if parts.next().is_some() {
            return Err(format!("Version '{}' has too many parts", s));
        }
        Ok(Self::new(major, minor, patch))
    }
}
