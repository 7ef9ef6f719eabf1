//! crates/study_tracker_core/src/bucket.rs
//!
//! Partitions owner-scoped records into days, weeks and arbitrary ranges of
//! the user's local calendar.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::calendar::{LocalDateNormalizer, WeekWindow};
use crate::domain::Record;

/// Records of `owner_id` with a local calendar date inside `window`, through
/// either of their instants.
pub fn filter_by_window<'a>(
    records: &'a [Record],
    window: &WeekWindow,
    owner_id: Uuid,
    normalizer: &LocalDateNormalizer,
) -> Vec<&'a Record> {
    records
        .iter()
        .filter(|r| r.owner_id == owner_id)
        .filter(|r| in_window(r, window, normalizer))
        .collect()
}

/// Records of `owner_id` whose local calendar date is exactly `day`.
pub fn filter_by_day<'a>(
    records: &'a [Record],
    day: NaiveDate,
    owner_id: Uuid,
    normalizer: &LocalDateNormalizer,
) -> Vec<&'a Record> {
    records
        .iter()
        .filter(|r| r.owner_id == owner_id)
        .filter(|r| local_date(r, normalizer) == Some(day))
        .collect()
}

/// Minutes and occurrences recorded on one local calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBucket {
    pub day: NaiveDate,
    pub total_minutes: u64,
    pub count: usize,
}

/// Buckets records by local calendar date, ascending by day.
///
/// The input is expected to be filtered to one owner (and usually one topic)
/// already. Durations are summed whether or not a record is completed.
pub fn group_by_day<'a, I>(records: I, normalizer: &LocalDateNormalizer) -> Vec<DayBucket>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut days: BTreeMap<NaiveDate, (u64, usize)> = BTreeMap::new();
    for record in records {
        let Some(day) = local_date(record, normalizer) else {
            continue;
        };
        let entry = days.entry(day).or_default();
        entry.0 += u64::from(record.duration_minutes);
        entry.1 += 1;
    }

    days.into_iter()
        .map(|(day, (total_minutes, count))| DayBucket {
            day,
            total_minutes,
            count,
        })
        .collect()
}

/// Case-insensitive substring match on the record title. An empty or
/// whitespace-only needle matches everything.
pub fn matches_search(record: &Record, needle: &str) -> bool {
    let needle = needle.trim();
    needle.is_empty() || record.title.to_lowercase().contains(&needle.to_lowercase())
}

fn local_date(record: &Record, normalizer: &LocalDateNormalizer) -> Option<NaiveDate> {
    record
        .occurred_at
        .and_then(|at| normalizer.to_local_calendar_date(at))
}

fn in_window(record: &Record, window: &WeekWindow, normalizer: &LocalDateNormalizer) -> bool {
    record.instants().any(|at| {
        normalizer
            .to_local_calendar_date(at)
            .is_some_and(|d| window.contains_date(d))
    })
}

//=========================================================================================
// Ordering
//=========================================================================================

/// The sort orders a list view may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Chronological; the default inside a single day or week.
    #[default]
    OccurredAtAsc,
    OccurredAtDesc,
    /// Alphabetical by title, ignoring case.
    Title,
    /// Incomplete records first.
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sort key: {0}")]
pub struct UnknownSortKey(pub String);

impl FromStr for SortKey {
    type Err = UnknownSortKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "occurredAt" | "date" => Ok(SortKey::OccurredAtAsc),
            "-occurredAt" | "-date" | "recent" => Ok(SortKey::OccurredAtDesc),
            "title" => Ok(SortKey::Title),
            "completed" => Ok(SortKey::Completed),
            other => Err(UnknownSortKey(other.to_string())),
        }
    }
}

/// Sorts in place. The sort is stable, so records that compare equal keep
/// their input order. Records without an instant sort after dated ones in
/// both chronological directions.
pub fn sort_records(records: &mut [&Record], key: SortKey) {
    match key {
        SortKey::OccurredAtAsc => records.sort_by(|a, b| by_instant(a, b, false)),
        SortKey::OccurredAtDesc => records.sort_by(|a, b| by_instant(a, b, true)),
        SortKey::Title => {
            records.sort_by_cached_key(|r| r.title.to_lowercase());
        }
        SortKey::Completed => records.sort_by_key(|r| r.completed),
    }
}

fn by_instant(a: &Record, b: &Record, descending: bool) -> Ordering {
    match (a.occurred_at, b.occurred_at) {
        (Some(x), Some(y)) if descending => y.cmp(&x),
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

//=========================================================================================
// Query
//=========================================================================================

/// The closed set of filters a list or stats view can apply.
///
/// Text search runs before calendar bucketing; sorting runs last.
#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
    pub owner_id: Uuid,
    pub group_key: Option<Uuid>,
    pub search: Option<String>,
    pub window: Option<WeekWindow>,
    /// `None` keeps the order the records were supplied in.
    pub sort: Option<SortKey>,
}

impl RecordQuery {
    pub fn for_owner(owner_id: Uuid) -> Self {
        Self {
            owner_id,
            ..Self::default()
        }
    }

    pub fn group(mut self, group_key: Uuid) -> Self {
        self.group_key = Some(group_key);
        self
    }

    pub fn search(mut self, needle: impl Into<String>) -> Self {
        self.search = Some(needle.into());
        self
    }

    pub fn window(mut self, window: WeekWindow) -> Self {
        self.window = Some(window);
        self
    }

    pub fn sort(mut self, sort: SortKey) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn apply<'a>(
        &self,
        records: &'a [Record],
        normalizer: &LocalDateNormalizer,
    ) -> Vec<&'a Record> {
        let mut selected: Vec<&Record> = records
            .iter()
            .filter(|r| r.owner_id == self.owner_id)
            .filter(|r| self.group_key.is_none() || r.group_key == self.group_key)
            .filter(|r| self.search.as_deref().map_or(true, |s| matches_search(r, s)))
            .filter(|r| match &self.window {
                Some(window) => in_window(r, window, normalizer),
                None => true,
            })
            .collect();
        if let Some(key) = self.sort {
            sort_records(&mut selected, key);
        }
        selected
    }
}
