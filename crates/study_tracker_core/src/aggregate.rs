//! crates/study_tracker_core/src/aggregate.rs
//!
//! Count and duration rollups over bucketed records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc, Weekday};
use uuid::Uuid;

use crate::bucket::filter_by_window;
use crate::calendar::{LocalDateNormalizer, WeekWindow};
use crate::domain::Record;

/// Totals for a set of records.
///
/// `duration_minutes` only counts completed records: an open record's
/// duration is a target, not time spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AggregateResult {
    pub total: usize,
    pub completed: usize,
    pub remaining: usize,
    pub duration_minutes: u64,
}

impl AggregateResult {
    fn push(&mut self, record: &Record) {
        self.total += 1;
        if record.completed {
            self.completed += 1;
            self.duration_minutes += u64::from(record.duration_minutes);
        } else {
            self.remaining += 1;
        }
    }
}

pub fn aggregate<'a, I>(records: I) -> AggregateResult
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut result = AggregateResult::default();
    for record in records {
        result.push(record);
    }
    result
}

/// One rollup per group key. Records without a group land under `None`.
pub fn aggregate_by_group<'a, I>(records: I) -> BTreeMap<Option<Uuid>, AggregateResult>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut groups: BTreeMap<Option<Uuid>, AggregateResult> = BTreeMap::new();
    for record in records {
        groups.entry(record.group_key).or_default().push(record);
    }
    groups
}

/// The rollup for one owner's week, together with the window it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklyStats {
    pub window: WeekWindow,
    pub totals: AggregateResult,
    pub by_group: BTreeMap<Option<Uuid>, AggregateResult>,
}

/// Filters `records` to the week containing `reference` for `owner_id` and
/// aggregates the result. `None` when `reference` is too close to the ends of
/// the calendar to have a whole week around it.
pub fn weekly_stats(
    records: &[Record],
    owner_id: Uuid,
    reference: DateTime<Utc>,
    week_start: Weekday,
    normalizer: &LocalDateNormalizer,
) -> Option<WeeklyStats> {
    let window = normalizer.week_containing(reference, week_start)?;
    let in_week = filter_by_window(records, &window, owner_id, normalizer);
    Some(WeeklyStats {
        window,
        totals: aggregate(in_week.iter().copied()),
        by_group: aggregate_by_group(in_week.iter().copied()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn record(owner: Uuid, minutes: u32, completed: bool) -> Record {
        Record {
            id: Uuid::new_v4(),
            owner_id: owner,
            title: "Closures".to_string(),
            occurred_at: Some(Utc.with_ymd_and_hms(2024, 6, 4, 12, 0, 0).unwrap()),
            also_at: None,
            duration_minutes: minutes,
            completed,
            group_key: None,
        }
    }

    #[test]
    fn empty_input_is_all_zero() {
        let empty: Vec<Record> = Vec::new();
        assert_eq!(
            aggregate(&empty),
            AggregateResult {
                total: 0,
                completed: 0,
                remaining: 0,
                duration_minutes: 0
            }
        );
    }

    #[test]
    fn duration_ignores_incomplete_records() {
        let owner = Uuid::new_v4();
        let records = vec![record(owner, 30, true), record(owner, 45, false)];
        assert_eq!(
            aggregate(&records),
            AggregateResult {
                total: 2,
                completed: 1,
                remaining: 1,
                duration_minutes: 30
            }
        );
    }

    #[test]
    fn total_is_completed_plus_remaining() {
        let owner = Uuid::new_v4();
        let records: Vec<Record> = (0..17)
            .map(|i| record(owner, i * 5, i % 3 == 0))
            .collect();
        let result = aggregate(&records);
        assert_eq!(result.total, result.completed + result.remaining);
        assert_eq!(result.total, 17);
        assert_eq!(result.completed, 6);
    }

    #[test]
    fn zero_minute_completions_still_count() {
        let owner = Uuid::new_v4();
        let records = vec![record(owner, 0, true), record(owner, 0, true)];
        let result = aggregate(&records);
        assert_eq!(result.completed, 2);
        assert_eq!(result.duration_minutes, 0);
    }

    #[test]
    fn groups_are_rolled_up_separately() {
        let owner = Uuid::new_v4();
        let js = Uuid::new_v4();
        let css = Uuid::new_v4();
        let mut records = vec![
            record(owner, 15, true),
            record(owner, 20, false),
            record(owner, 35, true),
            record(owner, 10, true),
        ];
        records[0].group_key = Some(js);
        records[1].group_key = Some(js);
        records[2].group_key = Some(css);

        let groups = aggregate_by_group(&records);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[&Some(js)].total, 2);
        assert_eq!(groups[&Some(js)].duration_minutes, 15);
        assert_eq!(groups[&Some(css)].duration_minutes, 35);
        assert_eq!(groups[&None].completed, 1);
    }

    #[test]
    fn weekly_stats_are_idempotent() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let records = vec![
            record(owner, 30, true),
            record(owner, 45, false),
            record(other, 60, true),
        ];
        let reference = Utc.with_ymd_and_hms(2024, 6, 6, 9, 0, 0).unwrap();
        let utc = LocalDateNormalizer::utc();

        let first = weekly_stats(&records, owner, reference, Weekday::Sun, &utc).unwrap();
        let second = weekly_stats(&records, owner, reference, Weekday::Sun, &utc).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.totals.total, 2);
        assert_eq!(first.totals.duration_minutes, 30);
        assert_eq!(
            first.window.start_date(),
            NaiveDate::from_ymd_opt(2024, 6, 2).unwrap()
        );
    }
}
