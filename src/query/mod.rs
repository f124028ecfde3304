use serde::Serialize;
use time::{Date, Duration, OffsetDateTime, Time};

use crate::core::{Category, Report, Severity, Status, Volunteer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRange {
    Today,
    Week,
    Month,
    /// Any other value: no date filtering.
    All,
}

impl DateRange {
    pub fn as_str(self) -> &'static str {
        match self {
            DateRange::Today => "today",
            DateRange::Week => "week",
            DateRange::Month => "month",
            DateRange::All => "all",
        }
    }

    /// Earliest timestamp that still passes the filter.
    pub fn threshold(self, now: OffsetDateTime) -> OffsetDateTime {
        match self {
            DateRange::Today => now.replace_time(Time::MIDNIGHT),
            DateRange::Week => now - Duration::days(7),
            DateRange::Month => one_month_before(now),
            DateRange::All => OffsetDateTime::UNIX_EPOCH,
        }
    }
}

impl From<&str> for DateRange {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" => DateRange::Today,
            "week" => DateRange::Week,
            "month" => DateRange::Month,
            _ => DateRange::All,
        }
    }
}

fn one_month_before(now: OffsetDateTime) -> OffsetDateTime {
    let month = now.month().previous();
    let year = if month == time::Month::December {
        now.year() - 1
    } else {
        now.year()
    };
    let day = now.day().min(time::util::days_in_year_month(year, month));
    match Date::from_calendar_date(year, month, day) {
        Ok(date) => now.replace_date(date),
        Err(_) => now - Duration::days(30),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportFilter {
    pub category: Option<Category>,
    pub severity: Option<Severity>,
    pub date: Option<DateRange>,
    pub status: Option<Status>,
}

impl ReportFilter {
    pub fn active() -> Self {
        Self {
            status: Some(Status::Active),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.severity.is_none()
            && self.status.is_none()
            && matches!(self.date, None | Some(DateRange::All))
    }

    pub fn matches(&self, report: &Report, now: OffsetDateTime) -> bool {
        if let Some(category) = &self.category {
            if &report.category != category {
                return false;
            }
        }
        if let Some(severity) = &self.severity {
            if &report.severity != severity {
                return false;
            }
        }
        if let Some(status) = &self.status {
            if &report.status != status {
                return false;
            }
        }
        if let Some(range) = self.date {
            if report.timestamp < range.threshold(now) {
                return false;
            }
        }
        true
    }
}

/// Subsequence of `reports` passing every supplied predicate, in list order.
pub fn filter_reports<'a>(
    reports: &'a [Report],
    filter: &ReportFilter,
    now: OffsetDateTime,
) -> Vec<&'a Report> {
    reports.iter().filter(|r| filter.matches(r, now)).collect()
}

pub fn active_report_count(reports: &[Report]) -> usize {
    reports.iter().filter(|r| r.is_active()).count()
}

pub fn available_volunteer_count(volunteers: &[Volunteer]) -> usize {
    volunteers.iter().filter(|v| v.available).count()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: Category,
    pub active: usize,
}

/// Active report counts for each known category, in display order.
pub fn category_counts(reports: &[Report]) -> Vec<CategoryCount> {
    Category::KNOWN
        .iter()
        .map(|category| CategoryCount {
            category: category.clone(),
            active: reports
                .iter()
                .filter(|r| r.is_active() && &r.category == category)
                .count(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub active_reports: usize,
    pub available_volunteers: usize,
    pub total_reports: usize,
    pub total_volunteers: usize,
    pub by_category: Vec<CategoryCount>,
}

pub fn dashboard_stats(reports: &[Report], volunteers: &[Volunteer]) -> DashboardStats {
    DashboardStats {
        active_reports: active_report_count(reports),
        available_volunteers: available_volunteer_count(volunteers),
        total_reports: reports.len(),
        total_volunteers: volunteers.len(),
        by_category: category_counts(reports),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Location;
    use time::macros::datetime;

    fn report(id: &str, category: Category, severity: Severity, ts: OffsetDateTime) -> Report {
        Report {
            id: id.to_string(),
            title: id.to_string(),
            category,
            severity,
            description: String::new(),
            location: Some(Location::new(40.0, -74.0)),
            address: None,
            timestamp: ts,
            status: Status::Active,
            photo: None,
        }
    }

    #[test]
    fn today_excludes_yesterday_and_includes_the_last_hour() {
        let now = datetime!(2026-03-10 15:00 UTC);
        let reports = vec![
            report("old", Category::Food, Severity::Low, now - Duration::hours(25)),
            report("new", Category::Food, Severity::Low, now - Duration::hours(1)),
        ];
        let filter = ReportFilter {
            date: Some(DateRange::Today),
            ..ReportFilter::default()
        };
        let ids: Vec<&str> = filter_reports(&reports, &filter, now)
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["new"]);
    }

    #[test]
    fn thresholds() {
        let now = datetime!(2026-03-31 12:30 +02:00);
        assert_eq!(
            DateRange::Today.threshold(now),
            datetime!(2026-03-31 00:00 +02:00)
        );
        assert_eq!(
            DateRange::Week.threshold(now),
            datetime!(2026-03-24 12:30 +02:00)
        );
        assert_eq!(
            DateRange::Month.threshold(now),
            datetime!(2026-02-28 12:30 +02:00)
        );
        assert_eq!(
            DateRange::Month.threshold(datetime!(2026-01-15 08:00 UTC)),
            datetime!(2025-12-15 08:00 UTC)
        );
        assert_eq!(
            DateRange::from("fortnight").threshold(now),
            OffsetDateTime::UNIX_EPOCH
        );
    }

    #[test]
    fn predicates_combine_and_absent_ones_are_no_ops() {
        let now = datetime!(2026-03-10 15:00 UTC);
        let mut resolved = report("c", Category::Medical, Severity::Critical, now);
        resolved.status = Status::Resolved;
        let reports = vec![
            report("a", Category::Medical, Severity::Critical, now),
            report("b", Category::Shelter, Severity::Critical, now),
            resolved,
        ];

        assert_eq!(filter_reports(&reports, &ReportFilter::default(), now).len(), 3);

        let filter = ReportFilter {
            category: Some(Category::Medical),
            severity: Some(Severity::Critical),
            ..ReportFilter::default()
        };
        assert_eq!(filter_reports(&reports, &filter, now).len(), 2);

        let filter = ReportFilter {
            category: Some(Category::Medical),
            ..ReportFilter::active()
        };
        let hits = filter_reports(&reports, &filter, now);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
    }

    #[test]
    fn filtering_is_pure() {
        let now = datetime!(2026-03-10 15:00 UTC);
        let reports = vec![
            report("a", Category::Food, Severity::Low, now),
            report("b", Category::Sos, Severity::High, now),
        ];
        let before = reports.clone();
        let filter = ReportFilter {
            severity: Some(Severity::High),
            ..ReportFilter::default()
        };
        let first: Vec<String> = filter_reports(&reports, &filter, now)
            .iter()
            .map(|r| r.id.clone())
            .collect();
        let second: Vec<String> = filter_reports(&reports, &filter, now)
            .iter()
            .map(|r| r.id.clone())
            .collect();
        assert_eq!(first, second);
        assert_eq!(reports, before);
    }

    #[test]
    fn active_count_matches_active_filter() {
        let now = datetime!(2026-03-10 15:00 UTC);
        let mut resolved = report("b", Category::Food, Severity::Low, now);
        resolved.status = Status::Resolved;
        let reports = vec![report("a", Category::Food, Severity::Low, now), resolved];
        assert_eq!(
            active_report_count(&reports),
            filter_reports(&reports, &ReportFilter::active(), now).len()
        );
        let counts = category_counts(&reports);
        assert_eq!(counts.len(), 4);
        assert_eq!(
            counts
                .iter()
                .find(|c| c.category == Category::Food)
                .map(|c| c.active),
            Some(1)
        );
    }
}
