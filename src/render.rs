use std::fmt::Write;

use chrono::{DateTime, Local, Utc};

use crate::filters::{DateRange, Stats};
use crate::models::{AlertRecord, GeoPoint, ReportRecord, UserRecord};

fn or_default<'a>(value: &'a Option<String>, fallback: &'a str) -> &'a str {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .unwrap_or(fallback)
}

fn local_time(timestamp: DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

fn location_line(location: Option<&GeoPoint>) -> String {
    location
        .map(GeoPoint::maps_url)
        .unwrap_or_else(|| "location not shared".to_string())
}

pub fn render_banner(error: Option<&str>) -> String {
    match error {
        Some(message) => format!("! {message}\n"),
        None => String::new(),
    }
}

pub fn render_stats(stats: &Stats, range: DateRange) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "Users: {}  Reports: {}  Active: {}  Sirens: {}",
        stats.total_users, stats.total_reports, stats.active_reports, stats.total_sirens
    );
    let _ = writeln!(
        output,
        "New {}: {} users, {} reports",
        range, stats.recent_users, stats.recent_reports
    );
    output
}

pub fn render_options(groups: &[(&str, Vec<String>)]) -> String {
    let mut output = String::new();
    for (name, values) in groups {
        if values.is_empty() {
            let _ = writeln!(output, "{name}: (none)");
        } else {
            let _ = writeln!(output, "{name}: {}", values.join(", "));
        }
    }
    output
}

pub fn render_users(users: &[UserRecord]) -> String {
    let mut output = String::new();

    if users.is_empty() {
        let _ = writeln!(output, "No users match these filters.");
        return output;
    }

    for user in users {
        let _ = writeln!(
            output,
            "## {} (id_{})",
            or_default(&user.username, "unnamed"),
            user.id
        );
        let _ = writeln!(
            output,
            "College email: {}  Personal email: {}  Phone: {}",
            or_default(&user.college_email, "Not provided"),
            or_default(&user.personal_email, "Not provided"),
            or_default(&user.phone, "Not provided"),
        );
        let _ = writeln!(
            output,
            "College: {}  Course: {}  Year: {}",
            or_default(&user.college, "Not provided"),
            or_default(&user.course, "Not provided"),
            or_default(&user.year, "Not provided"),
        );
        let _ = writeln!(
            output,
            "Blood group: {}  Conditions: {}  Allergies: {}  Medications: {}",
            or_default(&user.blood_group, "Not provided"),
            or_default(&user.medical_conditions, "None"),
            or_default(&user.allergies, "None"),
            or_default(&user.medications, "None"),
        );
        let _ = writeln!(
            output,
            "Emergency contact: {}",
            or_default(&user.emergency_contact, "Not provided")
        );
        let _ = writeln!(output, "Registered: {}", local_time(user.created_at));
        let _ = writeln!(output);
    }

    output
}

pub fn render_reports(reports: &[ReportRecord]) -> String {
    let mut output = String::new();

    if reports.is_empty() {
        let _ = writeln!(output, "No reports match these filters.");
        return output;
    }

    for report in reports {
        let _ = writeln!(
            output,
            "## {} (id_{}) [{}]",
            or_default(&report.title, "untitled"),
            report.id,
            report.status
        );
        if let Some(description) = report.description.as_deref() {
            let _ = writeln!(output, "{description}");
        }
        if let Some(details) = report.harasser_details.as_deref().filter(|d| !d.is_empty()) {
            let _ = writeln!(output, "Subject: {details}");
        }
        let _ = writeln!(output, "Location: {}", location_line(report.location.as_ref()));
        let _ = writeln!(output, "Reported: {}", local_time(report.created_at));
        let _ = writeln!(
            output,
            "Reporter: {}",
            or_default(&report.user_id, "unknown")
        );
        let _ = writeln!(output);
    }

    output
}

pub fn render_sirens(alerts: &[AlertRecord]) -> String {
    let mut output = String::new();

    if alerts.is_empty() {
        let _ = writeln!(output, "No emergency alerts.");
        return output;
    }

    for alert in alerts {
        let _ = writeln!(output, "## Emergency Alert (id_{})", alert.id);
        let _ = writeln!(output, "{}", or_default(&alert.title, "SOS"));
        if let Some(description) = alert.description.as_deref() {
            let _ = writeln!(output, "{description}");
        }
        let _ = writeln!(output, "Location: {}", location_line(alert.location.as_ref()));
        let _ = writeln!(output, "Time: {}", local_time(alert.time));
        let _ = writeln!(output);
    }

    output
}
