use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PrivacySetting {
    Public,
    FriendsOnly,
    Private,
}

impl fmt::Display for PrivacySetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrivacySetting::Public => "public",
            PrivacySetting::FriendsOnly => "friends-only",
            PrivacySetting::Private => "private",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for PrivacySetting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "public" => Ok(PrivacySetting::Public),
            "friends-only" | "friends" => Ok(PrivacySetting::FriendsOnly),
            "private" => Ok(PrivacySetting::Private),
            other => Err(format!("Unknown privacy setting '{}'. Use public, friends-only or private", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub privacy: Option<PrivacySetting>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Aggregates served by `GET /stats`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserStats {
    #[serde(default)]
    pub watched_count: u64,
    #[serde(default)]
    pub watchlist_count: u64,
    #[serde(default)]
    pub liked_count: u64,
    #[serde(default)]
    pub average_rating: Option<f64>,
    #[serde(default)]
    pub total_runtime_minutes: Option<u64>,
}
