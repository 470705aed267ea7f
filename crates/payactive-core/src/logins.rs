//! Grouping of a day's logins into platform/channel segments

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use tracing::info;

use crate::channels::{canonical_user_id, resolve_channel, segment_key, IdScheme};
use crate::error::StoreError;
use crate::store::{LoginEvent, LoginLogStore};

/// Canonical user ids per segment key, with the first event seen for each
/// segment kept as its display source.
#[derive(Debug, Default)]
pub struct LoginSegments {
    pub ids: HashMap<String, HashSet<String>>,
    pub representatives: HashMap<String, LoginEvent>,
    pub events: usize,
    pub skipped: usize,
}

impl LoginSegments {
    pub fn from_events(events: impl IntoIterator<Item = LoginEvent>, scheme: IdScheme) -> Self {
        let mut segments = Self::default();
        for event in events {
            segments.add_event(event, scheme);
        }
        segments
    }

    pub fn add_event(&mut self, event: LoginEvent, scheme: IdScheme) {
        let channel = resolve_channel(&event.channel);
        let key = segment_key(&event.platform, channel);
        let id = canonical_user_id(scheme, &event.player_id, &event.platform, channel);
        self.events += 1;

        match self.ids.entry(key) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().insert(id);
            }
            Entry::Vacant(entry) => {
                self.representatives.insert(entry.key().clone(), event);
                entry.insert(HashSet::from([id]));
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }
}

/// Read one day of login logs and group them by segment.
///
/// A day with no log data is an empty result, not an error.
pub async fn load_logins(
    store: &dyn LoginLogStore,
    key_prefix: &str,
    event_type: &str,
    day: NaiveDate,
    scheme: IdScheme,
) -> Result<LoginSegments, StoreError> {
    info!(%day, event_type, "Loading login events");
    let logs = store.read_day(key_prefix, event_type, day).await?;
    if !logs.exists {
        info!(%day, "No login data for day");
        return Ok(LoginSegments::default());
    }

    info!(events = logs.events.len(), skipped = logs.skipped, "Login events loaded");
    let mut segments = LoginSegments::from_events(logs.events, scheme);
    segments.skipped = logs.skipped;
    Ok(segments)
}
