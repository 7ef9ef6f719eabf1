pub mod aggregate;
pub mod bucket;
pub mod calendar;
pub mod domain;
pub mod ports;

pub use aggregate::{aggregate, aggregate_by_group, weekly_stats, AggregateResult, WeeklyStats};
pub use bucket::{
    filter_by_day, filter_by_window, group_by_day, matches_search, sort_records, DayBucket,
    RecordQuery, SortKey, UnknownSortKey,
};
pub use calendar::{
    week_start_from_index, week_window, LocalDateNormalizer, WeekWindow, DEFAULT_WEEK_START,
};
pub use domain::{
    AuthSession, PredefinedTopic, Record, Todo, Topic, TopicNote, Track, User, UserCredentials,
};
pub use ports::{
    check_minutes, DatabaseService, NewTodo, NewTopic, PortError, PortResult, TodoPatch,
    TopicPatch, TrackPatch, MAX_MINUTES,
};
