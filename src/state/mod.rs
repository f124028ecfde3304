mod sample;

use time::OffsetDateTime;

use crate::core::{
    Location, NewReport, NewVolunteer, Report, Status, Volunteer, dedup_skills, new_report_id,
    new_volunteer_id,
};
use crate::error::{RescueError, Result};
use crate::map::LocationSelector;
use crate::query::{self, DashboardStats};
use crate::store::{self, KeyValueStore, Theme};
use crate::transfer::{self, ExportDocument};

pub use sample::{sample_reports, sample_volunteers};

/// The two ordered lists a session works on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dashboard {
    reports: Vec<Report>,
    volunteers: Vec<Volunteer>,
}

impl Dashboard {
    pub fn new(reports: Vec<Report>, volunteers: Vec<Volunteer>) -> Self {
        Self {
            reports,
            volunteers,
        }
    }

    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    pub fn volunteers(&self) -> &[Volunteer] {
        &self.volunteers
    }

    pub fn report(&self, id: &str) -> Option<&Report> {
        self.reports.iter().find(|r| r.id == id)
    }

    pub fn volunteer(&self, id: &str) -> Option<&Volunteer> {
        self.volunteers.iter().find(|v| v.id == id)
    }

    pub fn stats(&self) -> DashboardStats {
        query::dashboard_stats(&self.reports, &self.volunteers)
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty() && self.volunteers.is_empty()
    }
}

/// Result of a mutation that was applied in memory. `storage_error` is set
/// when mirroring to the store failed; memory stays authoritative either way.
#[derive(Debug)]
#[must_use]
pub struct Saved<T> {
    pub value: T,
    pub storage_error: Option<RescueError>,
}

impl<T> Saved<T> {
    fn new(value: T, saved: Result<()>) -> Self {
        Self {
            value,
            storage_error: saved.err(),
        }
    }

    fn unchanged(value: T) -> Self {
        Self {
            value,
            storage_error: None,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.storage_error.is_none()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OpenOptions {
    pub seed_sample_data: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            seed_sample_data: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub reports: usize,
    pub volunteers: usize,
    pub skipped: usize,
}

/// Application state: the backing store, the lists and the map selection.
pub struct Session<S: KeyValueStore> {
    store: S,
    dashboard: Dashboard,
    selector: LocationSelector,
    device_location: Option<Location>,
    warnings: Vec<String>,
}

impl<S: KeyValueStore> Session<S> {
    /// Loads both lists once. When both come back empty and seeding is on,
    /// the sample dataset is installed and written back.
    pub fn open(store: S, options: OpenOptions, now: OffsetDateTime) -> Self {
        let loaded = store::load(&store);
        let mut warnings = loaded.warnings;
        let mut dashboard = Dashboard::new(loaded.reports, loaded.volunteers);

        let mut session_store = store;
        if options.seed_sample_data && dashboard.is_empty() {
            dashboard = Dashboard::new(sample_reports(now), sample_volunteers(now));
            if let Err(err) = store::save(
                &mut session_store,
                &dashboard.reports,
                &dashboard.volunteers,
            ) {
                warnings.push(format!("could not save sample data: {err}"));
            }
        }

        Self {
            store: session_store,
            dashboard,
            selector: LocationSelector::new(),
            device_location: None,
            warnings,
        }
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Recoverable problems met while loading. Drained on read.
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    pub fn selector(&self) -> &LocationSelector {
        &self.selector
    }

    pub fn selector_mut(&mut self) -> &mut LocationSelector {
        &mut self.selector
    }

    pub fn device_location(&self) -> Option<Location> {
        self.device_location
    }

    pub fn set_device_location(&mut self, location: Option<Location>) {
        self.device_location = location;
    }

    /// A point picked on the map wins over the device position.
    pub fn resolved_location(&self) -> Option<Location> {
        self.selector.selected().or(self.device_location)
    }

    pub fn save(&mut self) -> Result<()> {
        store::save(
            &mut self.store,
            &self.dashboard.reports,
            &self.dashboard.volunteers,
        )
    }

    pub fn create_report(&mut self, draft: NewReport, now: OffsetDateTime) -> Result<Saved<Report>> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(RescueError::validation("report title is required"));
        }
        let Some(location) = self.resolved_location() else {
            return Err(RescueError::validation(
                "please select a location (pick a point on the map or use the device location)",
            ));
        };

        let report = Report {
            id: self.fresh_id(new_report_id),
            title: title.to_string(),
            category: draft.category,
            severity: draft.severity,
            description: draft.description,
            location: Some(location),
            address: draft.address,
            timestamp: now,
            status: Status::Active,
            photo: draft.photo,
        };
        self.dashboard.reports.push(report.clone());
        let saved = self.save();
        Ok(Saved::new(report, saved))
    }

    /// Removing an id that is not present is a successful no-op.
    pub fn delete_report(&mut self, id: &str) -> Saved<bool> {
        let Some(pos) = self.dashboard.reports.iter().position(|r| r.id == id) else {
            return Saved::unchanged(false);
        };
        self.dashboard.reports.remove(pos);
        let saved = self.save();
        Saved::new(true, saved)
    }

    pub fn create_volunteer(
        &mut self,
        draft: NewVolunteer,
        now: OffsetDateTime,
    ) -> Result<Saved<Volunteer>> {
        let name = draft.name.trim();
        let phone = draft.phone.trim();
        if name.is_empty() {
            return Err(RescueError::validation("volunteer name is required"));
        }
        if phone.is_empty() {
            return Err(RescueError::validation("volunteer phone is required"));
        }

        let volunteer = Volunteer {
            id: self.fresh_id(new_volunteer_id),
            name: name.to_string(),
            phone: phone.to_string(),
            skills: dedup_skills(draft.skills),
            available: draft.available,
            registered_at: now,
        };
        self.dashboard.volunteers.push(volunteer.clone());
        let saved = self.save();
        Ok(Saved::new(volunteer, saved))
    }

    pub fn delete_volunteer(&mut self, id: &str) -> Saved<bool> {
        let Some(pos) = self.dashboard.volunteers.iter().position(|v| v.id == id) else {
            return Saved::unchanged(false);
        };
        self.dashboard.volunteers.remove(pos);
        let saved = self.save();
        Saved::new(true, saved)
    }

    pub fn export(&self, now: OffsetDateTime) -> ExportDocument {
        transfer::export_all(&self.dashboard.reports, &self.dashboard.volunteers, now)
    }

    /// Appends the file's arrays. A parse failure leaves state untouched.
    pub fn import(&mut self, text: &str) -> Result<Saved<ImportSummary>> {
        let batch = transfer::parse_import(text)?;
        let summary = ImportSummary {
            reports: batch.reports.len(),
            volunteers: batch.volunteers.len(),
            skipped: batch.skipped,
        };
        self.dashboard.reports.extend(batch.reports);
        self.dashboard.volunteers.extend(batch.volunteers);
        let saved = self.save();
        Ok(Saved::new(summary, saved))
    }

    pub fn theme(&self) -> Theme {
        store::load_theme(&self.store)
    }

    pub fn set_theme(&mut self, theme: Theme) -> Result<Theme> {
        store::save_theme(&mut self.store, theme)?;
        Ok(theme)
    }

    pub fn toggle_theme(&mut self) -> Result<Theme> {
        let next = self.theme().toggled();
        self.set_theme(next)
    }

    fn fresh_id(&self, generate: fn() -> String) -> String {
        loop {
            let id = generate();
            let taken = self.dashboard.reports.iter().any(|r| r.id == id)
                || self.dashboard.volunteers.iter().any(|v| v.id == id);
            if !taken {
                return id;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Category, REPORT_ID_PREFIX, Severity, Skill, VOLUNTEER_ID_PREFIX};
    use crate::error::ErrorKind;
    use crate::query::{ReportFilter, filter_reports};
    use crate::store::{MemoryStore, REPORTS_KEY};
    use time::Duration;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2026-03-10 15:00 UTC);

    fn empty_session() -> Session<MemoryStore> {
        Session::open(
            MemoryStore::new(),
            OpenOptions {
                seed_sample_data: false,
            },
            NOW,
        )
    }

    fn draft(title: &str, category: Category, severity: Severity) -> NewReport {
        NewReport {
            title: title.to_string(),
            category,
            severity,
            description: "details".to_string(),
            address: None,
            photo: None,
        }
    }

    fn pick(session: &mut Session<MemoryStore>, lat: f64, lng: f64) {
        session.selector_mut().begin_selection();
        assert!(session.selector_mut().click(Location::new(lat, lng)));
    }

    #[test]
    fn seeds_sample_data_on_first_run_and_saves_it() {
        let mut session = Session::open(MemoryStore::new(), OpenOptions::default(), NOW);
        assert_eq!(session.dashboard().reports().len(), 3);
        assert_eq!(session.dashboard().volunteers().len(), 2);
        assert!(session.take_warnings().is_empty());

        let reopened = Session::open(
            session.store().clone(),
            OpenOptions {
                seed_sample_data: false,
            },
            NOW,
        );
        assert_eq!(reopened.dashboard().reports().len(), 3);
    }

    #[test]
    fn malformed_storage_still_opens_with_a_warning() {
        let mut store = MemoryStore::new();
        store.insert(REPORTS_KEY, "][");
        let mut session = Session::open(
            store,
            OpenOptions {
                seed_sample_data: false,
            },
            NOW,
        );
        assert!(session.dashboard().reports().is_empty());
        assert_eq!(session.take_warnings().len(), 1);
        assert!(session.take_warnings().is_empty());
    }

    #[test]
    fn critical_medical_report_scenario() {
        let mut session = empty_session();
        pick(&mut session, 40.0, -74.0);
        let saved = session
            .create_report(draft("Collapsed runner", Category::Medical, Severity::Critical), NOW)
            .unwrap();
        assert!(saved.is_persisted());

        let report = saved.value;
        assert!(report.id.starts_with(REPORT_ID_PREFIX));
        assert!(!report.id.starts_with(VOLUNTEER_ID_PREFIX));
        assert_eq!(report.status, Status::Active);
        assert_eq!(report.location, Some(Location::new(40.0, -74.0)));
        assert_eq!(session.dashboard().stats().active_reports, 1);

        let filter = ReportFilter {
            category: Some(Category::Medical),
            ..ReportFilter::default()
        };
        let hits = filter_reports(session.dashboard().reports(), &filter, NOW);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, report.id);
    }

    #[test]
    fn report_without_location_is_rejected_without_state_change() {
        let mut session = empty_session();
        let err = session
            .create_report(draft("No GPS", Category::Sos, Severity::High), NOW)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(session.dashboard().reports().is_empty());

        pick(&mut session, 1.0, 1.0);
        let err = session
            .create_report(draft("   ", Category::Sos, Severity::High), NOW)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(session.dashboard().reports().is_empty());
    }

    #[test]
    fn selected_point_wins_over_device_location() {
        let mut session = empty_session();
        session.set_device_location(Some(Location::new(10.0, 10.0)));
        assert_eq!(session.resolved_location(), Some(Location::new(10.0, 10.0)));
        pick(&mut session, 20.0, 20.0);
        assert_eq!(session.resolved_location(), Some(Location::new(20.0, 20.0)));
    }

    #[test]
    fn length_tracks_creates_minus_successful_deletes() {
        let mut session = empty_session();
        pick(&mut session, 1.0, 2.0);
        let mut ids = Vec::new();
        for i in 0..5 {
            let saved = session
                .create_report(draft(&format!("r{i}"), Category::Food, Severity::Low), NOW)
                .unwrap();
            ids.push(saved.value.id);
        }
        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 5);

        assert!(session.delete_report(&ids[1]).value);
        assert!(!session.delete_report(&ids[1]).value);
        assert!(!session.delete_report("report-missing").value);
        assert!(session.delete_report(&ids[3]).value);
        assert_eq!(session.dashboard().reports().len(), 3);

        let remaining: Vec<&str> = session
            .dashboard()
            .reports()
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(remaining, vec![ids[0].as_str(), ids[2].as_str(), ids[4].as_str()]);
    }

    #[test]
    fn save_failure_keeps_memory_and_reports_the_error() {
        let mut store = MemoryStore::new();
        store.fail_writes(true);
        let mut session = Session::open(
            store,
            OpenOptions {
                seed_sample_data: false,
            },
            NOW,
        );
        pick(&mut session, 1.0, 2.0);
        let saved = session
            .create_report(draft("Downed line", Category::Sos, Severity::High), NOW)
            .unwrap();
        assert!(!saved.is_persisted());
        assert_eq!(
            saved.storage_error.as_ref().map(|e| e.kind()),
            Some(ErrorKind::Storage)
        );
        assert_eq!(session.dashboard().reports().len(), 1);
    }

    #[test]
    fn volunteer_defaults_and_validation() {
        let mut session = empty_session();
        let saved = session
            .create_volunteer(
                NewVolunteer {
                    name: " Ana ".to_string(),
                    phone: "555-0100".to_string(),
                    skills: vec![Skill::Cooking, Skill::Cooking],
                    ..NewVolunteer::default()
                },
                NOW,
            )
            .unwrap();
        assert!(saved.value.id.starts_with(VOLUNTEER_ID_PREFIX));
        assert_eq!(saved.value.name, "Ana");
        assert_eq!(saved.value.skills, vec![Skill::Cooking]);
        assert!(!saved.value.available);
        assert_eq!(session.dashboard().stats().available_volunteers, 0);

        let err = session
            .create_volunteer(
                NewVolunteer {
                    name: "Ben".to_string(),
                    ..NewVolunteer::default()
                },
                NOW,
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(session.dashboard().volunteers().len(), 1);

        let id = saved.value.id;
        assert!(session.delete_volunteer(&id).value);
        assert!(!session.delete_volunteer(&id).value);
    }

    #[test]
    fn export_then_import_into_empty_state_reproduces_lists() {
        let mut source = Session::open(MemoryStore::new(), OpenOptions::default(), NOW);
        pick(&mut source, 5.0, 6.0);
        let saved = source
            .create_report(draft("Bridge out", Category::Sos, Severity::Critical), NOW)
            .unwrap();
        assert!(saved.is_persisted());
        let text = source.export(NOW).to_json_pretty().unwrap();

        let mut target = empty_session();
        let saved = target.import(&text).unwrap();
        assert_eq!(saved.value.reports, 4);
        assert_eq!(saved.value.volunteers, 2);
        assert_eq!(target.dashboard(), source.dashboard());
    }

    #[test]
    fn import_appends_one_report_and_leaves_volunteers() {
        let mut session = Session::open(MemoryStore::new(), OpenOptions::default(), NOW);
        let before_volunteers = session.dashboard().volunteers().to_vec();
        let saved = session
            .import(
                r#"{"reports":[{"id":"report-imported","title":"Levee breach",
                    "category":"sos","severity":"critical",
                    "location":{"lat":29.95,"lng":-90.07},
                    "timestamp":"2026-03-10T14:00:00Z","status":"active"}],
                    "volunteers":[]}"#,
            )
            .unwrap();
        assert_eq!(saved.value.reports, 1);
        assert_eq!(session.dashboard().reports().len(), 4);
        assert_eq!(session.dashboard().volunteers(), before_volunteers.as_slice());
    }

    #[test]
    fn import_admits_records_without_ids_and_with_nulls() {
        let mut session = empty_session();
        let saved = session
            .import(
                r#"{"reports":[{"title":"Flood","category":"sos","severity":"high"},
                    {"id":"report-1","title":"Flood","timestamp":1700000000000},
                    {"id":"report-2","title":"Fire","description":null}],
                    "volunteers":[]}"#,
            )
            .unwrap();
        assert_eq!(saved.value.reports, 3);
        let reports = session.dashboard().reports();
        assert_eq!(reports.len(), 3);
        assert!(reports[0].id.starts_with(crate::core::REPORT_ID_PREFIX));
        assert_eq!(reports[2].description, "");
    }

    #[test]
    fn failed_import_leaves_state_untouched() {
        let mut session = Session::open(MemoryStore::new(), OpenOptions::default(), NOW);
        let before = session.dashboard().clone();
        let err = session.import("{\"reports\": [}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert_eq!(session.dashboard(), &before);
    }

    #[test]
    fn theme_toggles_and_persists() {
        let mut session = empty_session();
        assert_eq!(session.theme(), Theme::Light);
        assert_eq!(session.toggle_theme().unwrap(), Theme::Dark);
        assert_eq!(session.theme(), Theme::Dark);
    }

    #[test]
    fn sample_timestamps_are_relative_to_now() {
        let reports = sample_reports(NOW);
        assert_eq!(reports[0].timestamp, NOW - Duration::hours(1));
        assert_eq!(reports[2].timestamp, NOW - Duration::hours(3));
    }
}
