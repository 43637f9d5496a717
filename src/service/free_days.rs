use std::collections::BTreeSet;

use crate::models::calendar::days_in_month;

/// Upper bound on group query participants. Larger groups get an empty
/// result instead of an error.
pub const MAX_GROUP_USERS: usize = 20;

/// Days of the month occupied by none of the given users.
///
/// `occupied` holds one set per user: the union of that user's explicitly
/// busy days and days carrying at least one task. Pure function of its
/// inputs; the repository fetches the sets.
pub fn common_free_days(occupied: &[BTreeSet<u32>], year: i32, month: u32) -> Vec<u32> {
    if occupied.is_empty() || occupied.len() > MAX_GROUP_USERS {
        return Vec::new();
    }
    let mut busy: BTreeSet<u32> = BTreeSet::new();
    for set in occupied {
        busy.extend(set.iter().copied());
    }
    (1..=days_in_month(year, month))
        .filter(|day| !busy.contains(day))
        .collect()
}
