//! Proximity policy switches shared by settings and the proximity engine.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a connection's identity may change across location reports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityBinding {
    /// Every report fully replaces the session, including `userId`.
    #[default]
    Permissive,
    /// The first accepted `userId` sticks; reports claiming another are dropped.
    Strict,
}

impl FromStr for IdentityBinding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "permissive" => Ok(Self::Permissive),
            "strict" => Ok(Self::Strict),
            other => Err(format!("unknown identity binding: {other}")),
        }
    }
}

/// How candidate pairs are enumerated before the haversine test.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProximityStrategy {
    /// Full nested all-pairs scan, O(n²) per broadcast cycle.
    #[default]
    Scan,
    /// Latitude-band bucketing; prunes pairs that cannot be within range.
    LatitudeBands,
}

impl FromStr for ProximityStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "scan" => Ok(Self::Scan),
            "latitude-bands" | "latitude_bands" | "bands" => Ok(Self::LatitudeBands),
            other => Err(format!("unknown proximity strategy: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_binding_parse() {
        assert_eq!("strict".parse::<IdentityBinding>().unwrap(), IdentityBinding::Strict);
        assert_eq!(
            "Permissive".parse::<IdentityBinding>().unwrap(),
            IdentityBinding::Permissive
        );
        assert!("loose".parse::<IdentityBinding>().is_err());
    }

    #[test]
    fn strategy_parse() {
        assert_eq!("scan".parse::<ProximityStrategy>().unwrap(), ProximityStrategy::Scan);
        assert_eq!(
            "latitude-bands".parse::<ProximityStrategy>().unwrap(),
            ProximityStrategy::LatitudeBands
        );
        assert_eq!(
            "bands".parse::<ProximityStrategy>().unwrap(),
            ProximityStrategy::LatitudeBands
        );
        assert!("kdtree".parse::<ProximityStrategy>().is_err());
    }

    #[test]
    fn serde_names() {
        assert_eq!(
            serde_json::to_string(&ProximityStrategy::LatitudeBands).unwrap(),
            "\"latitude-bands\""
        );
        assert_eq!(
            serde_json::to_string(&IdentityBinding::Strict).unwrap(),
            "\"strict\""
        );
    }

    #[test]
    fn defaults_match_original_behaviour() {
        assert_eq!(IdentityBinding::default(), IdentityBinding::Permissive);
        assert_eq!(ProximityStrategy::default(), ProximityStrategy::Scan);
    }
}
