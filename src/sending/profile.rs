//! Named pacing presets for campaign dispatch.

use serde::{Deserialize, Serialize};

/// A named pacing preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendProfile {
    /// Slow and safe for fresh numbers
    Conservative,
    /// The default balance
    Moderate,
    /// Fast, for warmed-up numbers
    Aggressive,
    /// Tiny caps for trying a campaign out
    Test,
}

/// The numeric values a profile binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePreset {
    /// Seconds between messages
    pub interval_seconds: u32,
    /// Messages per hour
    pub max_per_hour: u32,
    /// Messages per day
    pub max_per_day: u32,
}

/// Every profile with its preset.
pub const SEND_PROFILES: [(SendProfile, ProfilePreset); 4] = [
    (
        SendProfile::Conservative,
        ProfilePreset {
            interval_seconds: 60,
            max_per_hour: 20,
            max_per_day: 100,
        },
    ),
    (
        SendProfile::Moderate,
        ProfilePreset {
            interval_seconds: 30,
            max_per_hour: 40,
            max_per_day: 200,
        },
    ),
    (
        SendProfile::Aggressive,
        ProfilePreset {
            interval_seconds: 15,
            max_per_hour: 60,
            max_per_day: 300,
        },
    ),
    (
        SendProfile::Test,
        ProfilePreset {
            interval_seconds: 10,
            max_per_hour: 5,
            max_per_day: 10,
        },
    ),
];

/// Look up the preset a profile binds.
pub fn resolve_profile(profile: SendProfile) -> ProfilePreset {
    match profile {
        SendProfile::Conservative => SEND_PROFILES[0].1,
        SendProfile::Moderate => SEND_PROFILES[1].1,
        SendProfile::Aggressive => SEND_PROFILES[2].1,
        SendProfile::Test => SEND_PROFILES[3].1,
    }
}

impl SendProfile {
    /// All profiles, slowest first.
    pub const ALL: [SendProfile; 4] = [
        SendProfile::Conservative,
        SendProfile::Moderate,
        SendProfile::Aggressive,
        SendProfile::Test,
    ];

    /// The preset this profile binds.
    pub fn preset(&self) -> ProfilePreset {
        resolve_profile(*self)
    }

    /// Display name.
    pub fn label(&self) -> &'static str {
        match self {
            SendProfile::Conservative => "Conservative",
            SendProfile::Moderate => "Moderate",
            SendProfile::Aggressive => "Aggressive",
            SendProfile::Test => "Test",
        }
    }

    /// One-line description for selection lists.
    pub fn description(&self) -> &'static str {
        match self {
            SendProfile::Conservative => "Lowest ban risk, recommended for new numbers",
            SendProfile::Moderate => "Balanced speed and safety",
            SendProfile::Aggressive => "Fast sending for warmed-up numbers, higher risk",
            SendProfile::Test => "Small caps for checking a campaign end to end",
        }
    }
}

impl std::fmt::Display for SendProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label().to_lowercase())
    }
}

impl std::str::FromStr for SendProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "conservative" => Ok(SendProfile::Conservative),
            "moderate" => Ok(SendProfile::Moderate),
            "aggressive" => Ok(SendProfile::Aggressive),
            "test" => Ok(SendProfile::Test),
            other => Err(format!("unknown send profile: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(
            resolve_profile(SendProfile::Conservative),
            ProfilePreset {
                interval_seconds: 60,
                max_per_hour: 20,
                max_per_day: 100
            }
        );
        assert_eq!(SendProfile::Moderate.preset().interval_seconds, 30);
        assert_eq!(SendProfile::Aggressive.preset().max_per_day, 300);
        assert_eq!(SendProfile::Test.preset().max_per_hour, 5);
    }

    #[test]
    fn test_table_matches_all() {
        for (profile, preset) in SEND_PROFILES {
            assert_eq!(profile.preset(), preset);
        }
        assert_eq!(SendProfile::ALL.len(), SEND_PROFILES.len());
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("Aggressive".parse::<SendProfile>().unwrap(), SendProfile::Aggressive);
        assert_eq!(SendProfile::Test.to_string(), "test");
        assert!("turbo".parse::<SendProfile>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&SendProfile::Conservative).unwrap();
        assert_eq!(json, "\"conservative\"");
    }
}
