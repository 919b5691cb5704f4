use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::ParseRedundancyError;

/// Zone redundancy policy, a cluster-wide layout parameter.
///
/// Serialized as `"maximum"` or `{"atLeast": n}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ZoneRedundancy {
    /// Spread data over as many zones as are available.
    Maximum,
    /// Require at least `n` distinct zones.
    AtLeast(u32),
}

impl Default for ZoneRedundancy {
    fn default() -> Self {
        ZoneRedundancy::AtLeast(1)
    }
}

impl std::fmt::Display for ZoneRedundancy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ZoneRedundancy::Maximum => write!(f, "maximum"),
            ZoneRedundancy::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

impl FromStr for ZoneRedundancy {
    type Err = ParseRedundancyError;

    /// Accepts `maximum` (any case) or a zone count. A count of zero parses and
    /// is rejected later by layout validation.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("maximum") || trimmed.eq_ignore_ascii_case("max") {
            return Ok(ZoneRedundancy::Maximum);
        }
        trimmed
            .parse::<u32>()
            .map(ZoneRedundancy::AtLeast)
            .map_err(|_| ParseRedundancyError {
                input: s.to_string(),
            })
    }
}

/// Layout parameters submitted alongside role changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutParameters {
    pub zone_redundancy: ZoneRedundancy,
}

impl LayoutParameters {
    pub fn new(zone_redundancy: ZoneRedundancy) -> Self {
        Self { zone_redundancy }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_redundancy() {
        assert_eq!(ZoneRedundancy::default(), ZoneRedundancy::AtLeast(1));
    }

    #[test]
    fn test_wire_format() {
        let max = serde_json::to_string(&LayoutParameters::new(ZoneRedundancy::Maximum)).unwrap();
        assert_eq!(max, r#"{"zoneRedundancy":"maximum"}"#);

        let at_least =
            serde_json::to_string(&LayoutParameters::new(ZoneRedundancy::AtLeast(3))).unwrap();
        assert_eq!(at_least, r#"{"zoneRedundancy":{"atLeast":3}}"#);
    }

    #[test]
    fn test_parse() {
        assert_eq!("maximum".parse::<ZoneRedundancy>(), Ok(ZoneRedundancy::Maximum));
        assert_eq!(" MAX ".parse::<ZoneRedundancy>(), Ok(ZoneRedundancy::Maximum));
        assert_eq!("2".parse::<ZoneRedundancy>(), Ok(ZoneRedundancy::AtLeast(2)));
        assert_eq!("0".parse::<ZoneRedundancy>(), Ok(ZoneRedundancy::AtLeast(0)));
        assert!("three".parse::<ZoneRedundancy>().is_err());
        assert!("-1".parse::<ZoneRedundancy>().is_err());
    }
}
