//! Derived views over the fetched collections.
//!
//! Nothing here mutates its input; every function returns a new vector.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Local, Utc};

use crate::models::{AlertRecord, ReportRecord, ReportStatus, UserRecord};
use crate::state::DashboardState;

pub trait Timestamped {
    fn created_at(&self) -> DateTime<Utc>;
}

/// Fields matched by the free-text search box.
pub trait Searchable {
    fn search_fields(&self) -> [Option<&str>; 3];
}

impl Timestamped for UserRecord {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Timestamped for ReportRecord {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Timestamped for AlertRecord {
    fn created_at(&self) -> DateTime<Utc> {
        self.time
    }
}

impl Searchable for UserRecord {
    fn search_fields(&self) -> [Option<&str>; 3] {
        [
            self.username.as_deref(),
            self.college_email.as_deref(),
            Some(self.id.as_str()),
        ]
    }
}

impl Searchable for ReportRecord {
    fn search_fields(&self) -> [Option<&str>; 3] {
        [
            self.title.as_deref(),
            self.description.as_deref(),
            self.user_id.as_deref(),
        ]
    }
}

impl Searchable for AlertRecord {
    fn search_fields(&self) -> [Option<&str>; 3] {
        [
            self.title.as_deref(),
            self.description.as_deref(),
            Some(self.id.as_str()),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateRange {
    #[default]
    All,
    Today,
    /// Rolling seven days.
    Week,
    /// Rolling thirty days.
    Month,
}

impl DateRange {
    pub fn contains(&self, timestamp: DateTime<Utc>, now: DateTime<Local>) -> bool {
        match self {
            DateRange::All => true,
            DateRange::Today => timestamp.with_timezone(&Local).date_naive() == now.date_naive(),
            DateRange::Week => timestamp > (now - Duration::days(7)).with_timezone(&Utc),
            DateRange::Month => timestamp > (now - Duration::days(30)).with_timezone(&Utc),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DateRange::All => "all time",
            DateRange::Today => "today",
            DateRange::Week => "this week",
            DateRange::Month => "this month",
        }
    }
}

impl FromStr for DateRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "" => Ok(DateRange::All),
            "today" => Ok(DateRange::Today),
            "week" | "this-week" => Ok(DateRange::Week),
            "month" | "this-month" => Ok(DateRange::Month),
            other => Err(format!(
                "unknown date range '{other}' (expected all, today, week or month)"
            )),
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "newest" => Ok(SortOrder::Newest),
            "oldest" => Ok(SortOrder::Oldest),
            other => Err(format!("unknown sort order '{other}' (expected newest or oldest)")),
        }
    }
}

/// Selected filters for one dashboard view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewFilters {
    pub date_range: DateRange,
    pub search: String,
    pub college: Option<String>,
    pub course: Option<String>,
    pub year: Option<String>,
    pub status: Option<ReportStatus>,
    pub sort: SortOrder,
}

pub fn filter_by_date<T: Timestamped + Clone>(
    items: &[T],
    range: DateRange,
    now: DateTime<Local>,
) -> Vec<T> {
    items
        .iter()
        .filter(|item| range.contains(item.created_at(), now))
        .cloned()
        .collect()
}

pub fn matches_search<T: Searchable>(item: &T, term: &str) -> bool {
    if term.is_empty() {
        return true;
    }
    let needle = term.to_lowercase();
    item.search_fields()
        .iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
}

pub fn search<T: Searchable + Clone>(items: &[T], term: &str) -> Vec<T> {
    items
        .iter()
        .filter(|item| matches_search(*item, term))
        .cloned()
        .collect()
}

/// Exact match against an optional selected value; `None` passes everything.
pub fn matches_category(value: Option<&str>, selected: Option<&str>) -> bool {
    match selected {
        None => true,
        Some(wanted) => value == Some(wanted),
    }
}

/// Stable sort by creation time; ties keep their input order.
pub fn sort_by_created<T: Timestamped>(items: &mut [T], order: SortOrder) {
    match order {
        SortOrder::Newest => items.sort_by(|a, b| b.created_at().cmp(&a.created_at())),
        SortOrder::Oldest => items.sort_by(|a, b| a.created_at().cmp(&b.created_at())),
    }
}

pub fn filter_users(
    users: &[UserRecord],
    filters: &ViewFilters,
    now: DateTime<Local>,
) -> Vec<UserRecord> {
    let mut filtered: Vec<UserRecord> = filter_by_date(users, filters.date_range, now)
        .into_iter()
        .filter(|user| {
            matches_search(user, &filters.search)
                && matches_category(user.college.as_deref(), filters.college.as_deref())
                && matches_category(user.course.as_deref(), filters.course.as_deref())
                && matches_category(user.year.as_deref(), filters.year.as_deref())
        })
        .collect();
    sort_by_created(&mut filtered, filters.sort);
    filtered
}

pub fn filter_reports(
    reports: &[ReportRecord],
    filters: &ViewFilters,
    now: DateTime<Local>,
) -> Vec<ReportRecord> {
    let mut filtered: Vec<ReportRecord> = filter_by_date(reports, filters.date_range, now)
        .into_iter()
        .filter(|report| {
            matches_search(report, &filters.search)
                && filters
                    .status
                    .as_ref()
                    .map_or(true, |status| &report.status == status)
        })
        .collect();
    sort_by_created(&mut filtered, filters.sort);
    filtered
}

pub fn filter_alerts(
    alerts: &[AlertRecord],
    filters: &ViewFilters,
    now: DateTime<Local>,
) -> Vec<AlertRecord> {
    let mut filtered = search(
        &filter_by_date(alerts, filters.date_range, now),
        &filters.search,
    );
    sort_by_created(&mut filtered, filters.sort);
    filtered
}

/// Unique non-empty values in first-seen order, for filter dropdowns.
pub fn distinct_values<T, F>(items: &[T], field: F) -> Vec<String>
where
    F: Fn(&T) -> Option<&str>,
{
    let mut values: Vec<String> = Vec::new();
    for value in items.iter().filter_map(|item| field(item)) {
        if !value.is_empty() && !values.iter().any(|seen| seen == value) {
            values.push(value.to_string());
        }
    }
    values
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub total_users: usize,
    pub total_reports: usize,
    pub total_sirens: usize,
    pub active_reports: usize,
    pub recent_users: usize,
    pub recent_reports: usize,
}

impl Stats {
    pub fn compute(state: &DashboardState, range: DateRange, now: DateTime<Local>) -> Self {
        Self {
            total_users: state.users.len(),
            total_reports: state.reports.len(),
            total_sirens: state.sirens.len(),
            active_reports: state
                .reports
                .iter()
                .filter(|report| !report.status.is_resolved())
                .count(),
            recent_users: state
                .users
                .iter()
                .filter(|user| range.contains(user.created_at, now))
                .count(),
            recent_reports: state
                .reports
                .iter()
                .filter(|report| range.contains(report.created_at, now))
                .count(),
        }
    }
}
