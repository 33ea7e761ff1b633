//! Platform identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A platform-assigned 64-bit identifier for guilds, users, roles and channels.
///
/// Ordering follows the numeric value, which is also creation order on the
/// platform. Role tie-breaks rely on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snowflake(pub u64);

impl Snowflake {
    /// Creates a new identifier from its raw value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw numeric value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for Snowflake {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Snowflake {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let id = Snowflake::new(80351110224678912);
        assert_eq!(id.to_string(), "80351110224678912");
        assert_eq!("80351110224678912".parse::<Snowflake>().unwrap(), id);
        assert!("not-a-number".parse::<Snowflake>().is_err());
    }

    #[test]
    fn test_serde_is_transparent() {
        let id = Snowflake::new(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
    }
}
