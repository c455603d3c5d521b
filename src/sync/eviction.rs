//! Capacity management for the offline queue.
//!
//! Runs when an append would push the queue past its configured size.

use chrono::{DateTime, Duration, Utc};

use super::action::{ActionStatus, OfflineAction, Priority};

/// Remove actions until one more fits within `max_size`.
///
/// Order of sacrifice:
/// 1. actions older than `retention`, low priority before normal
/// 2. low-priority actions of any age, oldest first
/// 3. stale high-priority actions, only once no low-priority action is left
///
/// Actions in flight are never touched. Returns what was removed; the queue
/// may still be full if nothing else qualifies.
pub fn make_room(
    actions: &mut Vec<OfflineAction>,
    max_size: usize,
    retention: Duration,
    now: DateTime<Utc>,
) -> Vec<OfflineAction> {
    let target = max_size.saturating_sub(1);
    // A window reaching past the earliest representable date makes nothing stale
    let cutoff = now.checked_sub_signed(retention);
    let mut evicted = Vec::new();

    let is_stale = |a: &OfflineAction| cutoff.is_some_and(|c| a.timestamp < c);

    for priority in [Priority::Low, Priority::Normal] {
        while actions.len() > target {
            match evict_oldest(actions, |a| a.priority == priority && is_stale(a)) {
                Some(action) => evicted.push(action),
                None => break,
            }
        }
    }

    while actions.len() > target {
        match evict_oldest(actions, |a| a.priority == Priority::Low) {
            Some(action) => evicted.push(action),
            None => break,
        }
    }

    while actions.len() > target {
        match evict_oldest(actions, |a| a.priority == Priority::High && is_stale(a)) {
            Some(action) => evicted.push(action),
            None => break,
        }
    }

    evicted
}

fn evict_oldest<F>(actions: &mut Vec<OfflineAction>, matches: F) -> Option<OfflineAction>
where
    F: Fn(&OfflineAction) -> bool,
{
    let index = actions
        .iter()
        .enumerate()
        .filter(|(_, a)| a.status != ActionStatus::Syncing && matches(a))
        .min_by_key(|(_, a)| a.timestamp)
        .map(|(i, _)| i)?;
    Some(actions.remove(index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::action::{Mutation, Record, ResourceType};

    fn action(mutation: Mutation, age_days: i64, now: DateTime<Utc>) -> OfflineAction {
        let mut action = OfflineAction::new(mutation, ResourceType::Assignment, "u1", 3, None);
        action.timestamp = now - Duration::days(age_days);
        action
    }

    fn low(age_days: i64, now: DateTime<Utc>) -> OfflineAction {
        action(Mutation::create(Record::new()), age_days, now)
    }

    fn normal(age_days: i64, now: DateTime<Utc>) -> OfflineAction {
        action(Mutation::update("A1", Record::new()), age_days, now)
    }

    fn high(age_days: i64, now: DateTime<Utc>) -> OfflineAction {
        action(Mutation::delete("A1"), age_days, now)
    }

    #[test]
    fn test_no_eviction_below_capacity() {
        let now = Utc::now();
        let mut actions = vec![low(30, now), high(30, now)];
        assert!(make_room(&mut actions, 3, Duration::days(7), now).is_empty());
        assert_eq!(actions.len(), 2);
    }

    #[test]
    fn test_stale_low_before_stale_normal() {
        let now = Utc::now();
        let stale_normal = normal(20, now);
        let stale_low = low(10, now);
        let fresh_high = high(1, now);
        let mut actions = vec![stale_normal.clone(), stale_low.clone(), fresh_high];

        let evicted = make_room(&mut actions, 3, Duration::days(7), now);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].id, stale_low.id);
        assert!(actions.iter().any(|a| a.id == stale_normal.id));
    }

    #[test]
    fn test_fresh_low_evicted_before_stale_high() {
        let now = Utc::now();
        let stale_high = high(30, now);
        let fresh_low_old = low(2, now);
        let fresh_low_new = low(1, now);
        let mut actions = vec![stale_high.clone(), fresh_low_new, fresh_low_old.clone()];

        let evicted = make_room(&mut actions, 3, Duration::days(7), now);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].id, fresh_low_old.id);
        assert!(actions.iter().any(|a| a.id == stale_high.id));
    }

    #[test]
    fn test_stale_high_is_last_resort() {
        let now = Utc::now();
        let stale_high = high(30, now);
        let fresh_normal = normal(1, now);
        let mut actions = vec![fresh_normal.clone(), stale_high.clone()];

        let evicted = make_room(&mut actions, 2, Duration::days(7), now);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].id, stale_high.id);
        assert_eq!(actions[0].id, fresh_normal.id);
    }

    #[test]
    fn test_stale_high_survives_while_low_remains() {
        let now = Utc::now();
        let mut actions = vec![high(40, now), high(35, now), low(0, now), low(0, now)];

        let evicted = make_room(&mut actions, 3, Duration::days(7), now);
        assert_eq!(evicted.len(), 2);
        assert!(evicted.iter().all(|a| a.priority == Priority::Low));
        assert_eq!(actions.len(), 2);
    }

    #[test]
    fn test_huge_retention_treats_nothing_as_stale() {
        let now = Utc::now();
        let stale_high = high(400, now);
        let fresh_low = low(0, now);
        let mut actions = vec![stale_high.clone(), fresh_low.clone()];

        let retention = Duration::days(i64::from(u32::MAX));
        let evicted = make_room(&mut actions, 2, retention, now);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].id, fresh_low.id);

        // Only a high-priority action is left and it is not stale
        let evicted = make_room(&mut actions, 1, retention, now);
        assert!(evicted.is_empty());
        assert_eq!(actions[0].id, stale_high.id);
    }

    #[test]
    fn test_in_flight_never_evicted() {
        let now = Utc::now();
        let mut syncing = low(30, now);
        syncing.status = ActionStatus::Syncing;
        let mut actions = vec![syncing.clone(), normal(1, now)];

        let evicted = make_room(&mut actions, 2, Duration::days(7), now);
        assert!(evicted.is_empty());
        assert_eq!(actions.len(), 2);
    }
}
