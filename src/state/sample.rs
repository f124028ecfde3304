use time::{Duration, OffsetDateTime};

use crate::core::{Category, Location, Report, Severity, Skill, Status, Volunteer};

/// First-run dataset so an empty install still shows something on the map.
pub fn sample_reports(now: OffsetDateTime) -> Vec<Report> {
    vec![
        Report {
            id: "report-1".to_string(),
            title: "Medical Emergency - Heart Attack".to_string(),
            category: Category::Medical,
            severity: Severity::Critical,
            description: "Elderly person experiencing chest pains and difficulty breathing. \
                          Requires immediate medical attention."
                .to_string(),
            location: Some(Location::new(40.7128, -74.0060)),
            address: Some("Central Park, New York, NY".to_string()),
            timestamp: now - Duration::hours(1),
            status: Status::Active,
            photo: None,
        },
        Report {
            id: "report-2".to_string(),
            title: "Emergency Shelter Needed".to_string(),
            category: Category::Shelter,
            severity: Severity::High,
            description: "Family of 4 displaced by apartment fire. \
                          Need temporary housing and basic supplies."
                .to_string(),
            location: Some(Location::new(40.7589, -73.9851)),
            address: Some("Times Square, New York, NY".to_string()),
            timestamp: now - Duration::hours(2),
            status: Status::Active,
            photo: None,
        },
        Report {
            id: "report-3".to_string(),
            title: "Food Distribution Point".to_string(),
            category: Category::Food,
            severity: Severity::Medium,
            description: "Community kitchen running low on supplies. \
                          Need food donations and volunteers."
                .to_string(),
            location: Some(Location::new(40.6782, -73.9442)),
            address: Some("Brooklyn Bridge, NY".to_string()),
            timestamp: now - Duration::hours(3),
            status: Status::Active,
            photo: None,
        },
    ]
}

pub fn sample_volunteers(now: OffsetDateTime) -> Vec<Volunteer> {
    vec![
        Volunteer {
            id: "volunteer-1".to_string(),
            name: "Dr. Kumari".to_string(),
            phone: "+91 9948739954".to_string(),
            skills: vec![Skill::Medical, Skill::Communication],
            available: true,
            registered_at: now - Duration::days(1),
        },
        Volunteer {
            id: "volunteer-2".to_string(),
            name: "Dr. Prasad".to_string(),
            phone: "+91 6800295798".to_string(),
            skills: vec![Skill::SearchRescue, Skill::Logistics],
            available: true,
            registered_at: now - Duration::days(2),
        },
    ]
}
