use anyhow::Error;
use std::io::{self, Write};
use time::OffsetDateTime;
use unicode_width::UnicodeWidthChar;

use crate::core::{Report, Severity, Volunteer};
use crate::error::{ErrorKind, RescueError};
use crate::map::{DensityPoint, Marker, marker_style};
use crate::query::DashboardStats;

pub const POPUP_DESCRIPTION_CHARS: usize = 100;

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub color: bool,
    pub stdin_is_tty: bool,
    pub stdout_is_tty: bool,
    pub stderr_is_tty: bool,
    pub max_table_rows: usize,
    pub quiet: bool,
    pub verbose: bool,
}

pub fn eprintln_error(err: &Error) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "Error:");
    let _ = writeln!(stderr, "  {err}");

    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        let _ = writeln!(stderr, "Caused by:");
        for cause in causes {
            let _ = writeln!(stderr, "  - {cause}");
        }
    }

    let kind = err
        .chain()
        .find_map(|e| e.downcast_ref::<RescueError>())
        .map(RescueError::kind);

    let _ = writeln!(stderr, "Next:");
    match kind {
        Some(ErrorKind::Validation) => {
            let _ = writeln!(stderr, "  - fix the input above and run the command again");
        }
        Some(ErrorKind::Storage) => {
            let _ = writeln!(
                stderr,
                "  - check that the data directory is writable (`--data-dir` or [storage] data_dir)"
            );
        }
        Some(ErrorKind::Network) => {
            let _ = writeln!(
                stderr,
                "  - pass `--lat/--lng` to skip device location, or `--no-geocode` to skip address lookup"
            );
        }
        Some(ErrorKind::Parse) => {
            let _ = writeln!(
                stderr,
                "  - make sure the file is a JSON export (`rescuehub export`)"
            );
        }
        None => {}
    }
    let _ = writeln!(stderr, "  - rerun with `--verbose` for more detail");
    let _ = writeln!(stderr, "  - see `rescuehub --help` for commands and options");
}

pub fn eprintln_warning(message: &str, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut stderr = io::stderr().lock();
    let label = paint("Warning:", "33", cfg.color && cfg.stderr_is_tty);
    let _ = writeln!(stderr, "{label} {message}");
}

pub fn eprintln_info(message: &str, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let _ = writeln!(io::stderr().lock(), "{message}");
}

/// Relative age of `ts` as shown on cards and popups.
pub fn time_ago(ts: OffsetDateTime, now: OffsetDateTime) -> String {
    let diff = now - ts;
    let minutes = diff.whole_minutes();
    let hours = diff.whole_hours();
    let days = diff.whole_days();

    if minutes < 1 {
        return "Just now".to_string();
    }
    if minutes < 60 {
        return format!("{minutes}m ago");
    }
    if hours < 24 {
        return format!("{hours}h ago");
    }
    if days == 1 {
        return "1 day ago".to_string();
    }
    if days < 30 {
        return format!("{days} days ago");
    }
    let date = ts.to_offset(now.offset()).date();
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

/// First `max_chars` characters, with `...` when something was cut.
pub fn excerpt(s: &str, max_chars: usize) -> String {
    let mut chars = s.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

pub fn address_or_placeholder(report: &Report) -> &str {
    report
        .address
        .as_deref()
        .filter(|a| !a.trim().is_empty())
        .unwrap_or("Location not available")
}

pub fn popup_text(report: &Report, now: OffsetDateTime) -> String {
    format!(
        "{}\n{} | {}\n{}\n{}",
        report.title,
        report.category.label(),
        report.severity.label(),
        excerpt(&report.description, POPUP_DESCRIPTION_CHARS),
        time_ago(report.timestamp, now)
    )
}

pub fn write_dashboard(out: &mut dyn Write, stats: &DashboardStats) {
    let _ = writeln!(out, "Active reports:        {}", stats.active_reports);
    let _ = writeln!(out, "Available volunteers:  {}", stats.available_volunteers);
    let _ = writeln!(
        out,
        "Totals:                {} reports, {} volunteers",
        stats.total_reports, stats.total_volunteers
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "Active by category:");
    for count in &stats.by_category {
        let style = marker_style(&count.category);
        let _ = writeln!(
            out,
            "  {} {}  {}",
            style.glyph,
            pad_end_display(&count.category.label(), 8),
            count.active
        );
    }
}

pub fn write_report_list(
    out: &mut dyn Write,
    reports: &[&Report],
    now: OffsetDateTime,
    max_rows: usize,
    color: bool,
) {
    if reports.is_empty() {
        let _ = writeln!(out, "No Reports Found");
        let _ = writeln!(out, "No reports match the current filters");
        return;
    }

    let rows = reports.len().min(max_rows.max(1));
    let ages: Vec<String> = reports
        .iter()
        .take(rows)
        .map(|r| time_ago(r.timestamp, now))
        .collect();

    let id_w = column_width("ID", reports.iter().take(rows).map(|r| r.id.as_str()));
    let sev_w = column_width("SEVERITY", reports.iter().take(rows).map(|r| r.severity.as_str()));
    let cat_w = column_width("CATEGORY", reports.iter().take(rows).map(|r| r.category.as_str()));
    let age_w = column_width("REPORTED", ages.iter().map(String::as_str));

    let _ = writeln!(
        out,
        "{}  {}  {}  {}  {}",
        pad_end_display("ID", id_w),
        pad_end_display("SEVERITY", sev_w),
        pad_end_display("CATEGORY", cat_w),
        pad_end_display("REPORTED", age_w),
        "TITLE"
    );
    let _ = writeln!(
        out,
        "{}  {}  {}  {}  {}",
        "-".repeat(id_w),
        "-".repeat(sev_w),
        "-".repeat(cat_w),
        "-".repeat(age_w),
        "-".repeat(5)
    );
    for (report, age) in reports.iter().zip(&ages) {
        let _ = writeln!(
            out,
            "{}  {}  {}  {}  {}",
            pad_end_display(&report.id, id_w),
            pad_end_ansi(&format_severity(&report.severity, color), sev_w),
            pad_end_display(report.category.as_str(), cat_w),
            pad_end_display(age, age_w),
            report.title
        );
    }
    if reports.len() > rows {
        let _ = writeln!(out, "... ({} more)", reports.len() - rows);
    }
}

pub fn write_report_detail(out: &mut dyn Write, report: &Report, now: OffsetDateTime, color: bool) {
    let _ = writeln!(out, "{}", report.title);
    let _ = writeln!(out, "  id:          {}", report.id);
    let _ = writeln!(out, "  category:    {}", report.category.label());
    let _ = writeln!(
        out,
        "  severity:    {}",
        format_severity(&report.severity, color)
    );
    let _ = writeln!(out, "  status:      {}", report.status.label());
    let _ = writeln!(out, "  reported:    {}", time_ago(report.timestamp, now));
    let _ = writeln!(out, "  address:     {}", address_or_placeholder(report));
    if let Some(loc) = report.location {
        let _ = writeln!(out, "  coordinates: {loc}");
    }
    if let Some(photo) = &report.photo {
        let mime = photo
            .strip_prefix("data:")
            .and_then(|s| s.split(';').next())
            .unwrap_or("unknown");
        let _ = writeln!(out, "  photo:       {mime}, {} chars", photo.len());
    }
    if !report.description.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", report.description);
    }
}

pub fn write_volunteer_list(
    out: &mut dyn Write,
    volunteers: &[Volunteer],
    now: OffsetDateTime,
    max_rows: usize,
    color: bool,
) {
    if volunteers.is_empty() {
        let _ = writeln!(out, "No Volunteers Registered");
        let _ = writeln!(out, "Be the first to register as a volunteer");
        return;
    }

    let rows = volunteers.len().min(max_rows.max(1));
    let id_w = column_width("ID", volunteers.iter().take(rows).map(|v| v.id.as_str()));
    let name_w = column_width("NAME", volunteers.iter().take(rows).map(|v| v.name.as_str()));
    let phone_w = column_width("PHONE", volunteers.iter().take(rows).map(|v| v.phone.as_str()));
    let status_w = "Unavailable".len();

    let _ = writeln!(
        out,
        "{}  {}  {}  {}  SKILLS",
        pad_end_display("ID", id_w),
        pad_end_display("NAME", name_w),
        pad_end_display("PHONE", phone_w),
        pad_end_display("STATUS", status_w),
    );
    for v in volunteers.iter().take(rows) {
        let status = if v.available {
            paint("Available", "32", color)
        } else {
            paint("Unavailable", "90", color)
        };
        let skills: Vec<String> = v.skills.iter().map(|s| s.label()).collect();
        let _ = writeln!(
            out,
            "{}  {}  {}  {}  {}",
            pad_end_display(&v.id, id_w),
            pad_end_display(&v.name, name_w),
            pad_end_display(&v.phone, phone_w),
            pad_end_ansi(&status, status_w),
            skills.join(", ")
        );
        let _ = writeln!(
            out,
            "{}  registered {}",
            " ".repeat(id_w),
            time_ago(v.registered_at, now)
        );
    }
    if volunteers.len() > rows {
        let _ = writeln!(out, "... ({} more)", volunteers.len() - rows);
    }
}

pub fn write_markers(out: &mut dyn Write, markers: &[Marker<'_>]) {
    if markers.is_empty() {
        let _ = writeln!(out, "No active reports with a location.");
        return;
    }
    for m in markers {
        let _ = writeln!(
            out,
            "{} {:>9.4} {:>10.4}  {:<20} {}  {}",
            m.style.glyph,
            m.location.lat,
            m.location.lng,
            m.style.icon,
            m.style.color,
            m.title
        );
    }
}

pub fn write_density(out: &mut dyn Write, points: &[DensityPoint<'_>]) {
    if points.is_empty() {
        let _ = writeln!(out, "No active reports with a location.");
        return;
    }
    for p in points {
        let _ = writeln!(
            out,
            "{:>9.4} {:>10.4}  weight {:.1}  radius {:>3.0} m  {}  {}",
            p.location.lat, p.location.lng, p.weight, p.radius_m, p.color, p.report_id
        );
    }
}

/// Runs `write` against locked stdout unless `--quiet` is set.
pub fn print_with(cfg: &UiConfig, write: impl FnOnce(&mut dyn Write)) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    write(&mut out);
}

/// Runs `f` behind a stderr spinner when `enabled`.
pub fn with_spinner<T>(enabled: bool, message: &str, f: impl FnOnce() -> T) -> T {
    use std::io::IsTerminal;
    let pb = if enabled && io::stderr().is_terminal() {
        let pb = indicatif::ProgressBar::new_spinner();
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        pb.set_message(message.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(120));
        Some(pb)
    } else {
        None
    };

    let out = f();

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    out
}

pub fn format_severity(severity: &Severity, color: bool) -> String {
    let s = severity.label();
    let code = match severity {
        Severity::Critical => "31",
        Severity::High => "33",
        Severity::Medium => "32",
        Severity::Low => "34",
        Severity::Other(_) => "90",
    };
    paint(&s, code, color)
}

fn paint(s: &str, code: &str, color: bool) -> String {
    if !color {
        return s.to_string();
    }
    format!("\x1b[{code}m{s}\x1b[0m")
}

fn column_width<'a>(header: &str, values: impl Iterator<Item = &'a str>) -> usize {
    values
        .map(visible_width_ansi)
        .max()
        .unwrap_or(0)
        .max(visible_width_ansi(header))
}

fn pad_end_ansi(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - w))
}

fn pad_end_display(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - w))
}

fn visible_width_ansi(s: &str) -> usize {
    let mut width: usize = 0;
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            let _ = chars.next();
            for ch2 in chars.by_ref() {
                if ch2 == 'm' {
                    break;
                }
            }
            continue;
        }
        width = width.saturating_add(UnicodeWidthChar::width(ch).unwrap_or(0));
    }
    width
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Category, Location, Skill, Status};
    use crate::query::dashboard_stats;
    use time::Duration;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2026-03-10 15:00 UTC);

    fn report(description: &str) -> Report {
        Report {
            id: "report-1".to_string(),
            title: "Medical Emergency".to_string(),
            category: Category::Medical,
            severity: Severity::Critical,
            description: description.to_string(),
            location: Some(Location::new(40.7128, -74.006)),
            address: None,
            timestamp: NOW - Duration::hours(2),
            status: Status::Active,
            photo: None,
        }
    }

    fn render(write: impl FnOnce(&mut dyn Write)) -> String {
        let mut buf: Vec<u8> = Vec::new();
        write(&mut buf);
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn time_ago_buckets() {
        assert_eq!(time_ago(NOW - Duration::seconds(30), NOW), "Just now");
        assert_eq!(time_ago(NOW + Duration::minutes(5), NOW), "Just now");
        assert_eq!(time_ago(NOW - Duration::minutes(59), NOW), "59m ago");
        assert_eq!(time_ago(NOW - Duration::hours(23), NOW), "23h ago");
        assert_eq!(time_ago(NOW - Duration::hours(25), NOW), "1 day ago");
        assert_eq!(time_ago(NOW - Duration::days(29), NOW), "29 days ago");
        assert_eq!(time_ago(NOW - Duration::days(40), NOW), "2026-01-29");
    }

    #[test]
    fn popup_truncates_long_descriptions() {
        let long = "x".repeat(150);
        let text = popup_text(&report(&long), NOW);
        assert!(text.contains(&format!("{}...", "x".repeat(100))));
        assert!(!text.contains(&"x".repeat(101)));
        assert!(text.contains("Medical | Critical"));
        assert!(text.ends_with("2h ago"));

        assert_eq!(excerpt("short", 100), "short");
        assert_eq!(excerpt(&"y".repeat(100), 100), "y".repeat(100));
    }

    #[test]
    fn empty_lists_render_placeholders() {
        let text = render(|out| write_report_list(out, &[], NOW, 20, false));
        assert!(text.contains("No Reports Found"));
        let text = render(|out| write_volunteer_list(out, &[], NOW, 20, false));
        assert!(text.contains("No Volunteers Registered"));
    }

    #[test]
    fn report_list_is_idempotent_and_limited() {
        let a = report("a");
        let mut b = report("b");
        b.id = "report-2".to_string();
        let list = vec![&a, &b];

        let first = render(|out| write_report_list(out, &list, NOW, 1, false));
        let second = render(|out| write_report_list(out, &list, NOW, 1, false));
        assert_eq!(first, second);
        assert!(first.contains("report-1"));
        assert!(!first.contains("report-2"));
        assert!(first.contains("... (1 more)"));
        assert!(!first.contains('\x1b'));
    }

    #[test]
    fn detail_falls_back_when_address_missing() {
        let text = render(|out| write_report_detail(out, &report("desc"), NOW, false));
        assert!(text.contains("Location not available"));
        assert!(text.contains("40.712800, -74.006000"));
    }

    #[test]
    fn dashboard_lists_every_category() {
        let r = report("d");
        let v = Volunteer {
            id: "volunteer-1".to_string(),
            name: "Dr. Kumari".to_string(),
            phone: "+91 9948739954".to_string(),
            skills: vec![Skill::Medical],
            available: true,
            registered_at: NOW,
        };
        let stats = dashboard_stats(std::slice::from_ref(&r), std::slice::from_ref(&v));
        let text = render(|out| write_dashboard(out, &stats));
        assert!(text.contains("Active reports:        1"));
        assert!(text.contains("Available volunteers:  1"));
        for label in ["Medical", "Shelter", "Food", "Sos"] {
            assert!(text.contains(label), "missing {label}");
        }
    }

    #[test]
    fn ansi_codes_do_not_count_toward_width() {
        assert_eq!(visible_width_ansi(&paint("High", "33", true)), 4);
        assert_eq!(pad_end_ansi(&paint("Low", "34", true), 5).len(), "\x1b[34mLow\x1b[0m".len() + 2);
    }
}
