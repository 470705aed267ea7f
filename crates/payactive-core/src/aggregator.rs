//! Intersection of paying users with each login segment

use std::collections::{BTreeMap, HashMap, HashSet};

/// Count, per segment, how many of its login ids are paying users.
///
/// Every segment present in `segments` gets a row, including zero-overlap
/// ones. An empty paying set yields an empty map without scanning.
pub fn intersect(
    paying_users: &HashSet<String>,
    segments: &HashMap<String, HashSet<String>>,
) -> BTreeMap<String, u64> {
    if paying_users.is_empty() {
        return BTreeMap::new();
    }

    segments
        .iter()
        .map(|(key, ids)| (key.clone(), overlap(paying_users, ids) as u64))
        .collect()
}

/// `|a ∩ b|`, probing the larger set from the smaller one.
fn overlap(a: &HashSet<String>, b: &HashSet<String>) -> usize {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small.iter().filter(|id| large.contains(*id)).count()
}
