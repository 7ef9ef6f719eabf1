//! crates/study_tracker_core/src/calendar.rs
//!
//! Calendar arithmetic for bucketing UTC-stored instants into the days and
//! weeks a user sees on their own wall calendar.
//!
//! Nothing in this module reads a clock. Every "now" or "today" is passed in
//! by the caller, which keeps the bucketing and aggregation layers deterministic.

use chrono::{
    DateTime, Datelike, Days, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    Utc, Weekday,
};

/// The week-start weekday used when nothing else is configured.
pub const DEFAULT_WEEK_START: Weekday = Weekday::Sun;

/// Largest offset accepted from callers, in minutes either side of UTC.
pub const MAX_OFFSET_MINUTES: i32 = 14 * 60;

/// Days of headroom a parsed instant needs on both sides: a week window
/// reaches six days either way, plus one day for the offset shift.
const CALENDAR_MARGIN_DAYS: u64 = 8;

/// Maps a weekday index where 0 is Sunday and 6 is Saturday.
///
/// Returns `None` for anything outside `0..=6`; configuration loading is
/// expected to reject those values before they reach the calculator.
pub fn week_start_from_index(index: u8) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Sun),
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        _ => None,
    }
}

//=========================================================================================
// Local-Date Normalizer
//=========================================================================================

/// Converts stored UTC instants into the calendar date a user perceives.
///
/// The conversion shifts the instant by a single fixed offset. That is an
/// approximation: it assumes the offset in force when the record happened is
/// the offset captured now, so records on the far side of a daylight-saving
/// transition can land one day off near midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalDateNormalizer {
    offset: FixedOffset,
}

impl LocalDateNormalizer {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    /// Builds a normalizer from an east-positive offset in minutes
    /// (UTC+02:00 is `120`, UTC-05:00 is `-300`).
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        if !(-MAX_OFFSET_MINUTES..=MAX_OFFSET_MINUTES).contains(&minutes) {
            return None;
        }
        FixedOffset::east_opt(minutes * 60).map(Self::new)
    }

    pub fn offset_minutes(&self) -> i32 {
        self.offset.local_minus_utc() / 60
    }

    /// The wall-clock time for `instant`: the UTC instant plus the offset.
    /// `None` when the shift leaves chrono's representable range.
    pub fn to_local_datetime(&self, instant: DateTime<Utc>) -> Option<NaiveDateTime> {
        instant.naive_utc().checked_add_signed(self.shift())
    }

    pub fn to_local_calendar_date(&self, instant: DateTime<Utc>) -> Option<NaiveDate> {
        self.to_local_datetime(instant).map(|local| local.date())
    }

    /// The UTC instant at which the wall clock reads `local`.
    pub fn to_utc(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        local
            .checked_sub_signed(self.shift())
            .map(|shifted| DateTime::from_naive_utc_and_offset(shifted, Utc))
    }

    fn shift(&self) -> Duration {
        Duration::seconds(i64::from(self.offset.local_minus_utc()))
    }

    /// Whether every week window around `instant` can be built and mapped
    /// back to UTC. Instants at the edges of chrono's range cannot.
    fn has_calendar_room(&self, instant: DateTime<Utc>) -> bool {
        self.to_local_calendar_date(instant)
            .and_then(|day| day.checked_sub_days(Days::new(CALENDAR_MARGIN_DAYS)))
            .and_then(|day| day.checked_add_days(Days::new(2 * CALENDAR_MARGIN_DAYS)))
            .is_some()
    }

    /// Parses an instant as supplied by clients or legacy rows.
    ///
    /// RFC 3339 strings keep their own offset. Bare `yyyy-MM-dd` dates and
    /// offset-less date-times are read as wall-clock values in this
    /// normalizer's offset. Anything else is `None`, as are instants too
    /// close to the ends of the representable range to bucket into a week.
    pub fn parse_instant(&self, raw: &str) -> Option<DateTime<Utc>> {
        self.parse_unchecked(raw.trim())
            .filter(|instant| self.has_calendar_room(*instant))
    }

    fn parse_unchecked(&self, raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
                return self.to_utc(naive);
            }
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| self.to_utc(date.and_time(NaiveTime::MIN)))
    }

    /// The week window containing `reference` as seen on this user's calendar.
    pub fn week_containing(
        &self,
        reference: DateTime<Utc>,
        week_start: Weekday,
    ) -> Option<WeekWindow> {
        self.to_local_calendar_date(reference)
            .and_then(|day| week_window(day, week_start))
    }
}

impl Default for LocalDateNormalizer {
    fn default() -> Self {
        Self::utc()
    }
}

//=========================================================================================
// Week-Window Calculator
//=========================================================================================

/// An inclusive span of local calendar time, from midnight of the first day
/// to the last millisecond of the last day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeekWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl WeekWindow {
    /// A window covering the whole of `first` through the whole of `last`.
    /// Used for arbitrary ranges; `first` after `last` yields a window that
    /// contains nothing.
    pub fn from_days(first: NaiveDate, last: NaiveDate) -> Self {
        // 23:59:59.999, by wrapping midnight back one millisecond.
        let (last_milli, _) = NaiveTime::MIN.overflowing_sub_signed(Duration::milliseconds(1));
        Self {
            start: first.and_time(NaiveTime::MIN),
            end: last.and_time(last_milli),
        }
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start.date()
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end.date()
    }

    pub fn contains(&self, local: NaiveDateTime) -> bool {
        self.start <= local && local <= self.end
    }

    pub fn contains_date(&self, day: NaiveDate) -> bool {
        self.start_date() <= day && day <= self.end_date()
    }

    /// The window's bounds as UTC instants, for pre-filtering a record store.
    pub fn utc_bounds(
        &self,
        normalizer: &LocalDateNormalizer,
    ) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        Some((normalizer.to_utc(self.start)?, normalizer.to_utc(self.end)?))
    }
}

/// The week containing `reference`, starting on the most recent `week_start`
/// on or before it. `None` only at the very ends of the calendar.
pub fn week_window(reference: NaiveDate, week_start: Weekday) -> Option<WeekWindow> {
    let back = (7 + reference.weekday().num_days_from_sunday()
        - week_start.num_days_from_sunday())
        % 7;
    let first = reference.checked_sub_days(Days::new(u64::from(back)))?;
    let last = first.checked_add_days(Days::new(6))?;
    Some(WeekWindow::from_days(first, last))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn window_spans_exactly_one_week_minus_a_millisecond() {
        let mut day = date(2024, 2, 20);
        for _ in 0..30 {
            for start in [Weekday::Sun, Weekday::Mon, Weekday::Sat] {
                let window = week_window(day, start).unwrap();
                assert_eq!(
                    window.end - window.start,
                    Duration::days(7) - Duration::milliseconds(1)
                );
                assert_eq!(window.start.weekday(), start);
                assert_eq!(window.start.time(), NaiveTime::MIN);
                assert!(window.contains_date(day));
            }
            day = day.succ_opt().unwrap();
        }
    }

    #[test]
    fn every_day_of_a_week_yields_the_same_window() {
        let expected = week_window(date(2025, 3, 9), Weekday::Sun);
        for offset in 0..7 {
            let day = date(2025, 3, 9) + Duration::days(offset);
            assert_eq!(week_window(day, Weekday::Sun), expected);
        }
        assert!(expected.is_some());
        assert_ne!(week_window(date(2025, 3, 16), Weekday::Sun), expected);
    }

    #[test]
    fn window_crosses_year_boundary() {
        // 2025-12-31 is a Wednesday.
        let window = week_window(date(2025, 12, 31), Weekday::Sun).unwrap();
        assert_eq!(window.start_date(), date(2025, 12, 28));
        assert_eq!(window.end_date(), date(2026, 1, 3));
        assert!(window.contains(date(2026, 1, 1).and_hms_opt(0, 30, 0).unwrap()));
        assert!(window.contains(date(2026, 1, 3).and_hms_milli_opt(23, 59, 59, 999).unwrap()));
        assert!(!window.contains(date(2026, 1, 4).and_time(NaiveTime::MIN)));
    }

    #[test]
    fn reference_on_week_start_begins_that_day() {
        let window = week_window(date(2024, 6, 3), Weekday::Mon).unwrap();
        assert_eq!(window.start_date(), date(2024, 6, 3));
        assert_eq!(window.end_date(), date(2024, 6, 9));
    }

    #[test]
    fn week_start_indices_follow_sunday_first_numbering() {
        assert_eq!(week_start_from_index(0), Some(Weekday::Sun));
        assert_eq!(week_start_from_index(6), Some(Weekday::Sat));
        assert_eq!(week_start_from_index(7), None);
    }

    #[test]
    fn local_date_shifts_by_offset() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 1, 2, 30, 0).unwrap();
        let new_york = LocalDateNormalizer::from_offset_minutes(-300).unwrap();
        let tokyo = LocalDateNormalizer::from_offset_minutes(540).unwrap();
        assert_eq!(new_york.to_local_calendar_date(instant), Some(date(2024, 2, 29)));
        assert_eq!(tokyo.to_local_calendar_date(instant), Some(date(2024, 3, 1)));
        assert_eq!(
            LocalDateNormalizer::utc().to_local_calendar_date(instant),
            Some(date(2024, 3, 1))
        );
    }

    #[test]
    fn offsets_outside_real_world_range_are_rejected() {
        assert!(LocalDateNormalizer::from_offset_minutes(841).is_none());
        assert!(LocalDateNormalizer::from_offset_minutes(-841).is_none());
        assert_eq!(
            LocalDateNormalizer::from_offset_minutes(-840).map(|n| n.offset_minutes()),
            Some(-840)
        );
    }

    #[test]
    fn bare_dates_parse_as_local_midnight() {
        let normalizer = LocalDateNormalizer::from_offset_minutes(-300).unwrap();
        let parsed = normalizer.parse_instant("2024-01-01").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 1, 5, 0, 0).unwrap());
        assert_eq!(normalizer.to_local_calendar_date(parsed), Some(date(2024, 1, 1)));
    }

    #[test]
    fn rfc3339_keeps_its_own_offset() {
        let normalizer = LocalDateNormalizer::from_offset_minutes(120).unwrap();
        let parsed = normalizer.parse_instant("2024-01-01T10:00:00-05:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 1, 15, 0, 0).unwrap());
    }

    #[test]
    fn garbage_instants_do_not_parse() {
        let normalizer = LocalDateNormalizer::utc();
        assert_eq!(normalizer.parse_instant("not a date"), None);
        assert_eq!(normalizer.parse_instant("2024-13-40"), None);
        assert_eq!(normalizer.parse_instant(""), None);
    }

    #[test]
    fn utc_bounds_round_trip_through_offset() {
        let normalizer = LocalDateNormalizer::from_offset_minutes(60).unwrap();
        let window = week_window(date(2024, 5, 15), Weekday::Sun).unwrap();
        let (start, end) = window.utc_bounds(&normalizer).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 5, 11, 23, 0, 0).unwrap());
        assert_eq!(normalizer.to_local_datetime(end), Some(window.end));
    }

    #[test]
    fn week_containing_uses_local_date_of_reference() {
        // Sunday 01:00 UTC is still Saturday evening in UTC-5.
        let reference = Utc.with_ymd_and_hms(2024, 6, 9, 1, 0, 0).unwrap();
        let normalizer = LocalDateNormalizer::from_offset_minutes(-300).unwrap();
        let window = normalizer.week_containing(reference, Weekday::Sun).unwrap();
        assert_eq!(window.start_date(), date(2024, 6, 2));
    }

    #[test]
    fn extreme_years_are_rejected_instead_of_overflowing() {
        let utc = LocalDateNormalizer::utc();
        assert_eq!(utc.parse_instant("+262142-12-31"), None);
        assert_eq!(utc.parse_instant("-262143-01-01"), None);
        assert!(utc.parse_instant("+10000-01-01").is_some());

        // A week starting on the last representable day cannot end.
        let last_day = NaiveDate::MAX;
        assert_eq!(week_window(last_day, last_day.weekday()), None);
        let east = LocalDateNormalizer::from_offset_minutes(840).unwrap();
        assert_eq!(east.to_local_datetime(DateTime::<Utc>::MAX_UTC), None);
        assert_eq!(east.week_containing(DateTime::<Utc>::MAX_UTC, Weekday::Sun), None);
    }

    #[test]
    fn from_days_ends_on_the_last_millisecond() {
        let window = WeekWindow::from_days(date(2024, 6, 2), date(2024, 6, 8));
        assert_eq!(
            window.end,
            date(2024, 6, 8).and_hms_milli_opt(23, 59, 59, 999).unwrap()
        );
    }
}
