//! Channel renaming and segment/user identity normalization
//!
//! Every login event is reduced to a segment key (`<platform>_<channel>`) and a
//! canonical user id. Both use the channel *after* renaming.

use std::fmt;
use std::str::FromStr;

/// Raw channel names that are reported under a different canonical name.
///
/// Lookups are exact-match on the raw string as it appears in the log, before
/// any lowercasing. Canonical names are already lowercase.
pub const CHANNEL_RENAMES: &[(&str, &str)] = &[("GOOGLE_PLAY", "google_store")];

/// Map a raw channel to its canonical name, or return it unchanged.
pub fn resolve_channel(raw_channel: &str) -> &str {
    CHANNEL_RENAMES
        .iter()
        .find(|(raw, _)| *raw == raw_channel)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(raw_channel)
}

/// `<lowercase platform>_<lowercase channel>`, using an already-resolved channel.
pub fn segment_key(platform: &str, channel: &str) -> String {
    format!("{}_{}", platform.to_lowercase(), channel.to_lowercase())
}

/// How paying-user ids were built by the payment ingestion job.
///
/// Login ids must be built the same way or the intersection is silently empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdScheme {
    /// `{player_id}_{platform}_{channel}` with platform and channel lowercased.
    #[default]
    Composite,
    /// The raw player id.
    Player,
}

impl IdScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdScheme::Composite => "composite",
            IdScheme::Player => "player",
        }
    }
}

impl fmt::Display for IdScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "composite" => Ok(IdScheme::Composite),
            "player" => Ok(IdScheme::Player),
            other => Err(format!(
                "unknown id scheme '{}' (expected composite or player)",
                other
            )),
        }
    }
}

/// Build the canonical user id for a login, using the resolved channel.
pub fn canonical_user_id(scheme: IdScheme, player_id: &str, platform: &str, channel: &str) -> String {
    match scheme {
        IdScheme::Composite => format!(
            "{}_{}_{}",
            player_id,
            platform.to_lowercase(),
            channel.to_lowercase()
        ),
        IdScheme::Player => player_id.to_string(),
    }
}
