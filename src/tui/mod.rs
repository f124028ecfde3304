use std::io;
use std::panic;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols;
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::canvas::{Canvas, Circle, Map, MapResolution};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Tabs, Wrap};
use time::{OffsetDateTime, UtcOffset};

use crate::config::{GeocodingConfig, LocationConfig};
use crate::core::{Category, Location, NewReport, NewVolunteer, Report, Severity, Skill, Status};
use crate::error::RescueError;
use crate::geo::{CommandLocator, LocationProvider, NominatimClient, ReverseGeocoder};
use crate::map::MapLayer;
use crate::query::{DateRange, ReportFilter};
use crate::state::Session;
use crate::store::{KeyValueStore, Theme};

/// Everything the dashboard needs besides the session.
#[derive(Debug, Clone)]
pub struct TuiOptions {
    pub color: bool,
    pub geocoding: GeocodingConfig,
    pub location: LocationConfig,
    pub map_center: Location,
    pub photo_max_bytes: u64,
}

pub fn run<S: KeyValueStore>(session: Session<S>, options: TuiOptions) -> Result<()> {
    let offset = crate::platform::now_local().offset();

    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter the alternate screen")?;

    let mut tui = Tui {
        terminal: Terminal::new(CrosstermBackend::new(stdout))
            .context("failed to initialize the terminal")?,
    };
    tui.terminal.clear().ok();

    let res = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        run_app(&mut tui.terminal, App::new(session, options, offset))
    }));

    let _ = tui.terminal.show_cursor();
    let _ = disable_raw_mode();
    let mut stdout = io::stdout();
    let _ = execute!(stdout, LeaveAlternateScreen);

    match res {
        Ok(res) => res,
        Err(_) => Err(anyhow::anyhow!(
            "the dashboard panicked (terminal state has been restored)"
        )),
    }
}

struct Tui {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Dashboard,
    Map,
    Reports,
    ReportDetail,
    Volunteers,
    ReportForm,
    VolunteerForm,
    ConfirmDelete,
    Error,
    Help,
}

impl Screen {
    /// Top-level tabs, in header order.
    const TABS: [Screen; 4] = [
        Screen::Dashboard,
        Screen::Map,
        Screen::Reports,
        Screen::Volunteers,
    ];

    fn tab_index(self) -> usize {
        match self {
            Screen::Map => 1,
            Screen::Reports | Screen::ReportDetail | Screen::ReportForm => 2,
            Screen::Volunteers | Screen::VolunteerForm => 3,
            _ => 0,
        }
    }

    fn title(self) -> &'static str {
        match self {
            Screen::Dashboard => "Dashboard",
            Screen::Map => "Map",
            Screen::Reports => "Reports",
            Screen::ReportDetail => "Report",
            Screen::Volunteers => "Volunteers",
            Screen::ReportForm => "Report Emergency",
            Screen::VolunteerForm => "Volunteer Registration",
            Screen::ConfirmDelete => "Confirm",
            Screen::Error => "Error",
            Screen::Help => "Help",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DeleteTarget {
    Report(String),
    Volunteer(String),
}

#[derive(Debug, Clone)]
struct DeleteConfirm {
    target: DeleteTarget,
    label: String,
    return_to: Screen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportField {
    Title,
    Category,
    Severity,
    Description,
    Photo,
    Location,
    Submit,
}

impl ReportField {
    const ALL: [ReportField; 7] = [
        ReportField::Title,
        ReportField::Category,
        ReportField::Severity,
        ReportField::Description,
        ReportField::Photo,
        ReportField::Location,
        ReportField::Submit,
    ];
}

#[derive(Debug, Clone)]
struct ReportForm {
    field: usize,
    title: String,
    category: usize,
    severity: usize,
    description: String,
    photo: String,
}

impl Default for ReportForm {
    fn default() -> Self {
        Self {
            field: 0,
            title: String::new(),
            category: 0,
            severity: 1,
            description: String::new(),
            photo: String::new(),
        }
    }
}

impl ReportForm {
    fn current(&self) -> ReportField {
        ReportField::ALL[self.field.min(ReportField::ALL.len() - 1)]
    }

    fn category(&self) -> Category {
        Category::KNOWN[self.category % Category::KNOWN.len()].clone()
    }

    fn severity(&self) -> Severity {
        Severity::KNOWN[self.severity % Severity::KNOWN.len()].clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VolunteerField {
    Name,
    Phone,
    Skills,
    Available,
    Submit,
}

impl VolunteerField {
    const ALL: [VolunteerField; 5] = [
        VolunteerField::Name,
        VolunteerField::Phone,
        VolunteerField::Skills,
        VolunteerField::Available,
        VolunteerField::Submit,
    ];
}

#[derive(Debug, Clone, Default)]
struct VolunteerForm {
    field: usize,
    name: String,
    phone: String,
    skill_cursor: usize,
    skills: Vec<bool>,
    available: bool,
}

impl VolunteerForm {
    fn new() -> Self {
        Self {
            skills: vec![false; Skill::KNOWN.len()],
            ..Self::default()
        }
    }

    fn current(&self) -> VolunteerField {
        VolunteerField::ALL[self.field.min(VolunteerField::ALL.len() - 1)]
    }

    fn selected_skills(&self) -> Vec<Skill> {
        Skill::KNOWN
            .iter()
            .zip(&self.skills)
            .filter(|(_, on)| **on)
            .map(|(skill, _)| skill.clone())
            .collect()
    }
}

/// Visible window of the world map.
#[derive(Debug, Clone)]
struct MapView {
    home: Location,
    center: Location,
    /// Degrees of longitude across the canvas; latitude spans half of it.
    span: f64,
    cursor: Location,
    layer: MapLayer,
    focus: Option<usize>,
    dragging: bool,
    return_to: Screen,
}

impl MapView {
    const DEFAULT_SPAN: f64 = 0.4;
    const MIN_SPAN: f64 = 0.005;
    const MAX_SPAN: f64 = 360.0;

    fn new(home: Location) -> Self {
        Self {
            home,
            center: home,
            span: Self::DEFAULT_SPAN,
            cursor: home,
            layer: MapLayer::Markers,
            focus: None,
            dragging: false,
            return_to: Screen::Dashboard,
        }
    }

    fn lat_span(&self) -> f64 {
        self.span / 2.0
    }

    fn x_bounds(&self) -> [f64; 2] {
        [self.center.lng - self.span / 2.0, self.center.lng + self.span / 2.0]
    }

    fn y_bounds(&self) -> [f64; 2] {
        [
            self.center.lat - self.lat_span() / 2.0,
            self.center.lat + self.lat_span() / 2.0,
        ]
    }

    fn step(&self) -> (f64, f64) {
        (self.lat_span() / 20.0, self.span / 20.0)
    }

    fn zoom(&mut self, factor: f64) {
        self.span = (self.span * factor).clamp(Self::MIN_SPAN, Self::MAX_SPAN);
    }

    fn pan(&mut self, dlat: f64, dlng: f64) {
        self.center = clamp_location(self.center.lat + dlat, self.center.lng + dlng);
    }

    fn move_cursor(&mut self, dlat: f64, dlng: f64) {
        self.cursor = clamp_location(self.cursor.lat + dlat, self.cursor.lng + dlng);
        let [x0, x1] = self.x_bounds();
        let [y0, y1] = self.y_bounds();
        if self.cursor.lng < x0 || self.cursor.lng > x1 || self.cursor.lat < y0 || self.cursor.lat > y1
        {
            self.center = self.cursor;
        }
    }
}

fn clamp_location(lat: f64, lng: f64) -> Location {
    Location::new(lat.clamp(-90.0, 90.0), lng.clamp(-180.0, 180.0))
}

struct PendingLocate {
    rx: mpsc::Receiver<crate::error::Result<Location>>,
    cancel: Arc<AtomicBool>,
    started_at: Instant,
    timeout: Duration,
    return_to: Screen,
    /// Centre the map on the result.
    recenter_map: bool,
}

struct PendingSubmit {
    rx: mpsc::Receiver<(String, Option<RescueError>)>,
    draft: NewReport,
    started_at: Instant,
    timeout: Duration,
}

struct App<S: KeyValueStore> {
    session: Session<S>,
    options: TuiOptions,
    offset: UtcOffset,
    now: OffsetDateTime,
    theme: Theme,

    screen: Screen,
    help_return_to: Screen,
    error_return_to: Screen,
    error: Option<String>,
    status: Option<String>,

    filter: ReportFilter,
    category_state: ListState,
    reports_state: ListState,
    volunteers_state: ListState,
    detail_id: Option<String>,
    confirm: Option<DeleteConfirm>,

    map: MapView,
    report_form: ReportForm,
    volunteer_form: VolunteerForm,

    pending_locate: Option<PendingLocate>,
    pending_submit: Option<PendingSubmit>,

    tick: u64,
}

impl<S: KeyValueStore> App<S> {
    fn new(mut session: Session<S>, options: TuiOptions, offset: UtcOffset) -> Self {
        let warnings = session.take_warnings();
        let theme = session.theme();
        let mut category_state = ListState::default();
        category_state.select(Some(0));
        let mut reports_state = ListState::default();
        reports_state.select(Some(0));
        let mut volunteers_state = ListState::default();
        volunteers_state.select(Some(0));
        let map = MapView::new(options.map_center);
        Self {
            session,
            options,
            offset,
            now: OffsetDateTime::now_utc().to_offset(offset),
            theme,
            screen: Screen::Dashboard,
            help_return_to: Screen::Dashboard,
            error_return_to: Screen::Dashboard,
            error: None,
            status: (!warnings.is_empty()).then(|| warnings.join("; ")),
            filter: ReportFilter::default(),
            category_state,
            reports_state,
            volunteers_state,
            detail_id: None,
            confirm: None,
            map,
            report_form: ReportForm::default(),
            volunteer_form: VolunteerForm::new(),
            pending_locate: None,
            pending_submit: None,
            tick: 0,
        }
    }

    fn refresh_now(&mut self) {
        self.now = OffsetDateTime::now_utc().to_offset(self.offset);
    }

    fn filtered_reports(&self) -> Vec<&Report> {
        crate::query::filter_reports(self.session.dashboard().reports(), &self.filter, self.now)
    }

    fn selected_report(&self) -> Option<&Report> {
        let idx = self.reports_state.selected()?;
        self.filtered_reports().get(idx).copied()
    }

    fn ensure_selection_in_range(&mut self) {
        let reports = self.filtered_reports().len();
        clamp_state(&mut self.reports_state, reports);
        let volunteers = self.session.dashboard().volunteers().len();
        clamp_state(&mut self.volunteers_state, volunteers);
    }

    fn busy(&self) -> bool {
        self.pending_locate.is_some() || self.pending_submit.is_some()
    }
}

fn clamp_state(state: &mut ListState, len: usize) {
    if len == 0 {
        state.select(None);
        return;
    }
    let idx = state.selected().unwrap_or(0).min(len - 1);
    state.select(Some(idx));
}

fn move_selection(state: &mut ListState, len: usize, down: bool) {
    if len == 0 {
        state.select(None);
        return;
    }
    let idx = state.selected().unwrap_or(0);
    let next = if down {
        (idx + 1).min(len - 1)
    } else {
        idx.saturating_sub(1)
    };
    state.select(Some(next));
}

fn run_app<S: KeyValueStore>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut app: App<S>,
) -> Result<()> {
    let tick_rate = Duration::from_millis(200);
    let mut last_tick = Instant::now();

    loop {
        app.ensure_selection_in_range();
        terminal
            .draw(|f| draw(f, &mut app))
            .context("failed to draw the screen")?;

        poll_pending(&mut app);

        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if event::poll(timeout).context("failed to wait for input")? {
            match event::read().context("failed to read input")? {
                Event::Key(key) => {
                    if key.kind == KeyEventKind::Press && handle_key(&mut app, key) {
                        break;
                    }
                }
                Event::Resize(_, _) => {}
                _ => {}
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick = app.tick.wrapping_add(1);
            app.refresh_now();
            last_tick = Instant::now();
        }
    }

    if let Some(pending) = app.pending_locate.take() {
        pending.cancel.store(true, Ordering::Relaxed);
    }

    Ok(())
}

fn poll_pending<S: KeyValueStore>(app: &mut App<S>) {
    if let Some(pending) = app.pending_locate.take() {
        match pending.rx.try_recv() {
            Ok(Ok(location)) => {
                app.session.set_device_location(Some(location));
                if pending.recenter_map {
                    center_map_on(app, location);
                }
                app.status = Some(format!("Device location: {}", location.short_label()));
            }
            Ok(Err(err)) => {
                open_error_return_to(app, err.to_string(), pending.return_to);
            }
            Err(mpsc::TryRecvError::Empty) => {
                if pending.started_at.elapsed() > pending.timeout {
                    pending.cancel.store(true, Ordering::Relaxed);
                    open_error_return_to(
                        app,
                        "Timed out waiting for the device location.",
                        pending.return_to,
                    );
                } else {
                    app.pending_locate = Some(pending);
                }
            }
            Err(mpsc::TryRecvError::Disconnected) => {
                open_error_return_to(
                    app,
                    "Lost contact with the location task.",
                    pending.return_to,
                );
            }
        }
    }

    if let Some(pending) = app.pending_submit.take() {
        match pending.rx.try_recv() {
            Ok((address, geocode_err)) => {
                let mut draft = pending.draft;
                draft.address = Some(address);
                finish_report_submit(app, draft, geocode_err);
            }
            Err(mpsc::TryRecvError::Empty) => {
                if pending.started_at.elapsed() > pending.timeout {
                    let mut draft = pending.draft;
                    let fallback = app.session.resolved_location().map(|l| l.short_label());
                    draft.address = fallback;
                    finish_report_submit(
                        app,
                        draft,
                        Some(RescueError::network("address lookup timed out")),
                    );
                } else {
                    app.pending_submit = Some(pending);
                }
            }
            Err(mpsc::TryRecvError::Disconnected) => {
                let mut draft = pending.draft;
                draft.address = app.session.resolved_location().map(|l| l.short_label());
                finish_report_submit(
                    app,
                    draft,
                    Some(RescueError::network("lost contact with the address lookup")),
                );
            }
        }
    }
}

fn open_help<S: KeyValueStore>(app: &mut App<S>) {
    app.help_return_to = app.screen;
    app.screen = Screen::Help;
}

fn open_error_return_to<S: KeyValueStore>(
    app: &mut App<S>,
    msg: impl Into<String>,
    return_to: Screen,
) {
    app.error = Some(msg.into());
    app.error_return_to = match return_to {
        Screen::Error | Screen::ConfirmDelete => Screen::Dashboard,
        other => other,
    };
    app.screen = Screen::Error;
}

fn open_error<S: KeyValueStore>(app: &mut App<S>, msg: impl Into<String>) {
    let return_to = app.screen;
    open_error_return_to(app, msg, return_to);
}

/// Returns `true` when the app should quit.
fn handle_key<S: KeyValueStore>(app: &mut App<S>, key: KeyEvent) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return true;
    }

    match app.screen {
        Screen::Error => {
            app.error = None;
            app.screen = app.error_return_to;
            return false;
        }
        Screen::Help => {
            app.screen = app.help_return_to;
            return false;
        }
        Screen::ConfirmDelete => {
            handle_confirm_key(app, key);
            return false;
        }
        Screen::ReportForm => {
            handle_report_form_key(app, key);
            return false;
        }
        Screen::VolunteerForm => {
            handle_volunteer_form_key(app, key);
            return false;
        }
        _ => {}
    }

    if app.screen == Screen::Map && (app.session.selector().is_selecting() || app.map.dragging) {
        handle_map_key(app, key);
        return false;
    }

    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('?') => {
            open_help(app);
            return false;
        }
        KeyCode::Char('T') => {
            toggle_theme(app);
            return false;
        }
        KeyCode::Tab => {
            let idx = (app.screen.tab_index() + 1) % Screen::TABS.len();
            app.screen = Screen::TABS[idx];
            return false;
        }
        KeyCode::BackTab => {
            let idx = (app.screen.tab_index() + Screen::TABS.len() - 1) % Screen::TABS.len();
            app.screen = Screen::TABS[idx];
            return false;
        }
        KeyCode::Char(c @ '1'..='4') => {
            app.screen = Screen::TABS[(c as usize) - ('1' as usize)];
            return false;
        }
        _ => {}
    }

    match app.screen {
        Screen::Dashboard => match key.code {
            KeyCode::Char('r') => open_report_form(app),
            KeyCode::Char('v') => open_volunteer_form(app),
            KeyCode::Down | KeyCode::Char('j') => {
                move_selection(&mut app.category_state, Category::KNOWN.len(), true)
            }
            KeyCode::Up | KeyCode::Char('k') => {
                move_selection(&mut app.category_state, Category::KNOWN.len(), false)
            }
            KeyCode::Enter => {
                let idx = app.category_state.selected().unwrap_or(0);
                if let Some(category) = Category::KNOWN.get(idx) {
                    filter_by_category(app, category.clone());
                }
            }
            _ => {}
        },
        Screen::Map => handle_map_key(app, key),
        Screen::Reports => handle_reports_key(app, key),
        Screen::ReportDetail => match key.code {
            KeyCode::Esc | KeyCode::Char('b') => app.screen = Screen::Reports,
            KeyCode::Char('d') | KeyCode::Delete => {
                if let Some(id) = app.detail_id.clone() {
                    open_delete_report(app, &id, Screen::Reports);
                }
            }
            KeyCode::Char('m') => {
                if let Some(id) = app.detail_id.clone() {
                    show_report_on_map(app, &id);
                }
            }
            _ => {}
        },
        Screen::Volunteers => handle_volunteers_key(app, key),
        _ => {}
    }
    false
}

/// Opens the report list narrowed to one category; other filters are kept.
fn filter_by_category<S: KeyValueStore>(app: &mut App<S>, category: Category) {
    app.filter.category = Some(category);
    app.reports_state.select(Some(0));
    app.screen = Screen::Reports;
}

fn toggle_theme<S: KeyValueStore>(app: &mut App<S>) {
    match app.session.toggle_theme() {
        Ok(theme) => {
            app.theme = theme;
            app.status = Some(format!("Theme: {theme}"));
        }
        Err(err) => {
            app.theme = app.theme.toggled();
            open_error(app, format!("Theme changed but could not be saved: {err}"));
        }
    }
}

fn handle_reports_key<S: KeyValueStore>(app: &mut App<S>, key: KeyEvent) {
    let len = app.filtered_reports().len();
    match key.code {
        KeyCode::Down | KeyCode::Char('j') => move_selection(&mut app.reports_state, len, true),
        KeyCode::Up | KeyCode::Char('k') => move_selection(&mut app.reports_state, len, false),
        KeyCode::Enter => {
            if let Some(id) = app.selected_report().map(|r| r.id.clone()) {
                app.detail_id = Some(id);
                app.screen = Screen::ReportDetail;
            }
        }
        KeyCode::Char('c') => {
            app.filter.category = cycle_option(&app.filter.category, &Category::KNOWN);
            app.reports_state.select(Some(0));
        }
        KeyCode::Char('s') => {
            app.filter.severity = cycle_option(&app.filter.severity, &Severity::KNOWN);
            app.reports_state.select(Some(0));
        }
        KeyCode::Char('t') => {
            app.filter.date = cycle_option(
                &app.filter.date,
                &[DateRange::Today, DateRange::Week, DateRange::Month],
            );
            app.reports_state.select(Some(0));
        }
        KeyCode::Char('a') => {
            app.filter.status = cycle_option(&app.filter.status, &[Status::Active, Status::Resolved]);
            app.reports_state.select(Some(0));
        }
        KeyCode::Char('x') => {
            app.filter = ReportFilter::default();
            app.reports_state.select(Some(0));
        }
        KeyCode::Char('n') | KeyCode::Char('r') => open_report_form(app),
        KeyCode::Char('d') | KeyCode::Delete => {
            if let Some(id) = app.selected_report().map(|r| r.id.clone()) {
                open_delete_report(app, &id, Screen::Reports);
            }
        }
        KeyCode::Char('m') => {
            if let Some(id) = app.selected_report().map(|r| r.id.clone()) {
                show_report_on_map(app, &id);
            }
        }
        _ => {}
    }
}

/// `None` → first → … → last → `None`.
fn cycle_option<T: Clone + PartialEq>(current: &Option<T>, values: &[T]) -> Option<T> {
    match current {
        None => values.first().cloned(),
        Some(value) => {
            let pos = values.iter().position(|v| v == value)?;
            values.get(pos + 1).cloned()
        }
    }
}

fn handle_volunteers_key<S: KeyValueStore>(app: &mut App<S>, key: KeyEvent) {
    let len = app.session.dashboard().volunteers().len();
    match key.code {
        KeyCode::Down | KeyCode::Char('j') => move_selection(&mut app.volunteers_state, len, true),
        KeyCode::Up | KeyCode::Char('k') => move_selection(&mut app.volunteers_state, len, false),
        KeyCode::Char('n') | KeyCode::Char('v') => open_volunteer_form(app),
        KeyCode::Char('d') | KeyCode::Delete => {
            let Some(idx) = app.volunteers_state.selected() else {
                return;
            };
            let Some(volunteer) = app.session.dashboard().volunteers().get(idx) else {
                return;
            };
            app.confirm = Some(DeleteConfirm {
                target: DeleteTarget::Volunteer(volunteer.id.clone()),
                label: format!("volunteer {}", volunteer.name),
                return_to: Screen::Volunteers,
            });
            app.screen = Screen::ConfirmDelete;
        }
        _ => {}
    }
}

fn open_delete_report<S: KeyValueStore>(app: &mut App<S>, id: &str, return_to: Screen) {
    let Some(report) = app.session.dashboard().report(id) else {
        return;
    };
    app.confirm = Some(DeleteConfirm {
        target: DeleteTarget::Report(report.id.clone()),
        label: format!("report \"{}\"", report.title),
        return_to,
    });
    app.screen = Screen::ConfirmDelete;
}

fn handle_confirm_key<S: KeyValueStore>(app: &mut App<S>, key: KeyEvent) {
    let Some(confirm) = app.confirm.take() else {
        app.screen = Screen::Dashboard;
        return;
    };
    app.screen = confirm.return_to;
    if !matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')) {
        app.status = Some("Delete cancelled.".to_string());
        return;
    }

    let saved = match &confirm.target {
        DeleteTarget::Report(id) => app.session.delete_report(id),
        DeleteTarget::Volunteer(id) => app.session.delete_volunteer(id),
    };
    if app.detail_id.as_ref().is_some_and(|id| {
        matches!(&confirm.target, DeleteTarget::Report(target) if target == id)
    }) {
        app.detail_id = None;
    }
    app.ensure_selection_in_range();
    match saved.storage_error {
        Some(err) => open_error_return_to(
            app,
            format!("Deleted {}, but saving failed: {err}", confirm.label),
            confirm.return_to,
        ),
        None => app.status = Some(format!("Deleted {}.", confirm.label)),
    }
}

fn show_report_on_map<S: KeyValueStore>(app: &mut App<S>, id: &str) {
    let markers = crate::map::markers(app.session.dashboard().reports());
    let Some(pos) = markers.iter().position(|m| m.report_id == id) else {
        app.status = Some("Location not available".to_string());
        return;
    };
    app.map.center = markers[pos].location;
    app.map.focus = Some(pos);
    app.screen = Screen::Map;
}

fn handle_map_key<S: KeyValueStore>(app: &mut App<S>, key: KeyEvent) {
    let (dlat, dlng) = app.map.step();

    if app.session.selector().is_selecting() {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => app.map.move_cursor(dlat, 0.0),
            KeyCode::Down | KeyCode::Char('j') => app.map.move_cursor(-dlat, 0.0),
            KeyCode::Left | KeyCode::Char('h') => app.map.move_cursor(0.0, -dlng),
            KeyCode::Right | KeyCode::Char('l') => app.map.move_cursor(0.0, dlng),
            KeyCode::Char('+') | KeyCode::Char('=') => app.map.zoom(0.5),
            KeyCode::Char('-') => app.map.zoom(2.0),
            KeyCode::Enter | KeyCode::Char(' ') => {
                let at = app.map.cursor;
                if app.session.selector_mut().click(at) {
                    app.status = Some(format!("Location selected: {}", at.short_label()));
                    app.screen = app.map.return_to;
                }
            }
            KeyCode::Esc => {
                app.session.selector_mut().cancel();
                app.screen = app.map.return_to;
            }
            _ => {}
        }
        return;
    }

    if app.map.dragging {
        let Some(mut at) = app.session.selector().selected() else {
            app.map.dragging = false;
            return;
        };
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => at = clamp_location(at.lat + dlat, at.lng),
            KeyCode::Down | KeyCode::Char('j') => at = clamp_location(at.lat - dlat, at.lng),
            KeyCode::Left | KeyCode::Char('h') => at = clamp_location(at.lat, at.lng - dlng),
            KeyCode::Right | KeyCode::Char('l') => at = clamp_location(at.lat, at.lng + dlng),
            KeyCode::Enter | KeyCode::Esc | KeyCode::Char('g') => {
                app.map.dragging = false;
                app.status = Some(format!("Location selected: {}", at.short_label()));
                return;
            }
            _ => return,
        }
        app.session.selector_mut().drag(at);
        return;
    }

    let marker_count = crate::map::markers(app.session.dashboard().reports()).len();
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => app.map.pan(dlat * 2.0, 0.0),
        KeyCode::Down | KeyCode::Char('j') => app.map.pan(-dlat * 2.0, 0.0),
        KeyCode::Left | KeyCode::Char('h') => app.map.pan(0.0, -dlng * 2.0),
        KeyCode::Right | KeyCode::Char('l') => app.map.pan(0.0, dlng * 2.0),
        KeyCode::Char('+') | KeyCode::Char('=') => app.map.zoom(0.5),
        KeyCode::Char('-') => app.map.zoom(2.0),
        KeyCode::Char('o') => app.map.layer = app.map.layer.toggled(),
        KeyCode::Char('c') => {
            app.map.center = app.map.home;
            app.map.span = MapView::DEFAULT_SPAN;
        }
        KeyCode::Char('M') => go_to_my_location(app),
        KeyCode::Char('n') | KeyCode::Char('p') if marker_count > 0 => {
            let next = match (app.map.focus, key.code) {
                (None, _) => 0,
                (Some(i), KeyCode::Char('n')) => (i + 1) % marker_count,
                (Some(i), _) => (i + marker_count - 1) % marker_count,
            };
            app.map.focus = Some(next);
            let markers = crate::map::markers(app.session.dashboard().reports());
            if let Some(marker) = markers.get(next) {
                app.map.center = marker.location;
            }
        }
        KeyCode::Char('g') => {
            if app.session.selector().selected().is_some() {
                app.map.dragging = true;
            } else {
                app.status = Some("No selected location to move.".to_string());
            }
        }
        KeyCode::Esc | KeyCode::Char('b') => {
            app.map.focus = None;
            app.screen = Screen::Dashboard;
        }
        _ => {}
    }
}

/// Centres on the device location, asking for it first when none is known.
fn go_to_my_location<S: KeyValueStore>(app: &mut App<S>) {
    match app.session.device_location() {
        Some(location) => center_map_on(app, location),
        None => start_locate(app, Screen::Map, true),
    }
}

fn center_map_on<S: KeyValueStore>(app: &mut App<S>, location: Location) {
    app.map.center = location;
    app.map.cursor = location;
    app.map.span = app.map.span.min(MapView::DEFAULT_SPAN);
}

fn open_report_form<S: KeyValueStore>(app: &mut App<S>) {
    app.report_form = ReportForm::default();
    app.session.selector_mut().reset();
    app.screen = Screen::ReportForm;
}

fn open_volunteer_form<S: KeyValueStore>(app: &mut App<S>) {
    app.volunteer_form = VolunteerForm::new();
    app.screen = Screen::VolunteerForm;
}

fn begin_map_selection<S: KeyValueStore>(app: &mut App<S>) {
    let start = app
        .session
        .resolved_location()
        .unwrap_or(app.map.center);
    app.map.cursor = start;
    app.map.center = start;
    app.map.return_to = Screen::ReportForm;
    app.map.dragging = false;
    app.session.selector_mut().begin_selection();
    app.screen = Screen::Map;
}

/// Applies a text-editing key. Returns whether the key was consumed.
fn edit_text(buf: &mut String, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            buf.clear();
            true
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            buf.push(c);
            true
        }
        KeyCode::Backspace => {
            buf.pop();
            true
        }
        _ => false,
    }
}

fn handle_report_form_key<S: KeyValueStore>(app: &mut App<S>, key: KeyEvent) {
    if app.pending_submit.is_some() {
        return;
    }

    match key.code {
        KeyCode::Esc => {
            if let Some(pending) = app.pending_locate.take() {
                pending.cancel.store(true, Ordering::Relaxed);
                app.status = Some("Location request cancelled.".to_string());
                return;
            }
            app.session.selector_mut().cancel();
            app.screen = Screen::Reports;
            return;
        }
        KeyCode::Tab | KeyCode::Down => {
            app.report_form.field = (app.report_form.field + 1) % ReportField::ALL.len();
            return;
        }
        KeyCode::BackTab | KeyCode::Up => {
            app.report_form.field =
                (app.report_form.field + ReportField::ALL.len() - 1) % ReportField::ALL.len();
            return;
        }
        KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            submit_report(app);
            return;
        }
        _ => {}
    }

    let form = &mut app.report_form;
    match form.current() {
        ReportField::Title => {
            edit_text(&mut form.title, key);
        }
        ReportField::Description => {
            edit_text(&mut form.description, key);
        }
        ReportField::Photo => {
            edit_text(&mut form.photo, key);
        }
        ReportField::Category => match key.code {
            KeyCode::Left => {
                form.category = (form.category + Category::KNOWN.len() - 1) % Category::KNOWN.len()
            }
            KeyCode::Right | KeyCode::Char(' ') => {
                form.category = (form.category + 1) % Category::KNOWN.len()
            }
            _ => {}
        },
        ReportField::Severity => match key.code {
            KeyCode::Left => {
                form.severity = (form.severity + Severity::KNOWN.len() - 1) % Severity::KNOWN.len()
            }
            KeyCode::Right | KeyCode::Char(' ') => {
                form.severity = (form.severity + 1) % Severity::KNOWN.len()
            }
            _ => {}
        },
        ReportField::Location => match key.code {
            KeyCode::Enter | KeyCode::Char('m') => begin_map_selection(app),
            KeyCode::Char('d') => start_locate(app, Screen::ReportForm, false),
            _ => {}
        },
        ReportField::Submit => {
            if key.code == KeyCode::Enter {
                submit_report(app);
            }
        }
    }
}

fn start_locate<S: KeyValueStore>(app: &mut App<S>, return_to: Screen, recenter_map: bool) {
    if app.pending_locate.is_some() {
        return;
    }
    let locator = match CommandLocator::from_config(&app.options.location) {
        Ok(locator) => locator,
        Err(err) => {
            open_error_return_to(app, err.to_string(), return_to);
            return;
        }
    };
    let cancel = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel();
    let flag = Arc::clone(&cancel);
    thread::spawn(move || {
        let _ = tx.send(locator.locate(Some(flag.as_ref())));
    });
    app.pending_locate = Some(PendingLocate {
        rx,
        cancel,
        started_at: Instant::now(),
        timeout: Duration::from_secs(app.options.location.timeout_secs.max(1) + 5),
        return_to,
        recenter_map,
    });
    app.status = Some("Getting your location...".to_string());
}

fn submit_report<S: KeyValueStore>(app: &mut App<S>) {
    if app.busy() {
        return;
    }
    let form = app.report_form.clone();
    if form.title.trim().is_empty() {
        open_error_return_to(app, "Please enter a title for the report.", Screen::ReportForm);
        return;
    }
    let Some(location) = app.session.resolved_location() else {
        open_error_return_to(
            app,
            "Please select a location on the map or enable location services.",
            Screen::ReportForm,
        );
        return;
    };

    let photo = if form.photo.trim().is_empty() {
        None
    } else {
        match crate::photo::embed_photo(
            &PathBuf::from(form.photo.trim()),
            app.options.photo_max_bytes,
        ) {
            Ok(url) => Some(url),
            Err(err) => {
                open_error_return_to(app, err.to_string(), Screen::ReportForm);
                return;
            }
        }
    };

    let draft = NewReport {
        title: form.title.clone(),
        category: form.category(),
        severity: form.severity(),
        description: form.description.clone(),
        address: None,
        photo,
    };

    if !app.options.geocoding.enabled {
        let mut draft = draft;
        draft.address = Some(location.short_label());
        finish_report_submit(app, draft, None);
        return;
    }

    let geocoding = app.options.geocoding.clone();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let result = match NominatimClient::new(&geocoding) {
            Ok(client) => {
                crate::geo::resolve_address(Some(&client as &dyn ReverseGeocoder), location)
            }
            Err(err) => (location.short_label(), Some(err)),
        };
        let _ = tx.send(result);
    });
    app.pending_submit = Some(PendingSubmit {
        rx,
        draft,
        started_at: Instant::now(),
        timeout: Duration::from_secs(app.options.geocoding.timeout_secs.max(1) + 5),
    });
    app.status = Some("Looking up the address...".to_string());
}

fn finish_report_submit<S: KeyValueStore>(
    app: &mut App<S>,
    draft: NewReport,
    geocode_err: Option<RescueError>,
) {
    match app.session.create_report(draft, app.now) {
        Ok(saved) => {
            app.session.selector_mut().reset();
            app.report_form = ReportForm::default();
            app.filter = ReportFilter::default();
            app.reports_state.select(Some(0));
            let id = saved.value.id.clone();
            if let Some(err) = saved.storage_error {
                open_error_return_to(
                    app,
                    format!("Report {id} was submitted but could not be saved: {err}"),
                    Screen::Reports,
                );
                return;
            }
            app.screen = Screen::Reports;
            app.status = Some(match geocode_err {
                Some(err) => format!(
                    "Incident report submitted ({err}; coordinates used as the address)."
                ),
                None => "Incident report submitted successfully!".to_string(),
            });
        }
        Err(err) => open_error_return_to(app, err.to_string(), Screen::ReportForm),
    }
}

fn handle_volunteer_form_key<S: KeyValueStore>(app: &mut App<S>, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.screen = Screen::Volunteers;
            return;
        }
        KeyCode::Tab | KeyCode::Down => {
            app.volunteer_form.field = (app.volunteer_form.field + 1) % VolunteerField::ALL.len();
            return;
        }
        KeyCode::BackTab | KeyCode::Up => {
            app.volunteer_form.field = (app.volunteer_form.field + VolunteerField::ALL.len() - 1)
                % VolunteerField::ALL.len();
            return;
        }
        KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            submit_volunteer(app);
            return;
        }
        _ => {}
    }

    let form = &mut app.volunteer_form;
    match form.current() {
        VolunteerField::Name => {
            edit_text(&mut form.name, key);
        }
        VolunteerField::Phone => {
            edit_text(&mut form.phone, key);
        }
        VolunteerField::Skills => match key.code {
            KeyCode::Left => form.skill_cursor = form.skill_cursor.saturating_sub(1),
            KeyCode::Right => {
                form.skill_cursor = (form.skill_cursor + 1).min(Skill::KNOWN.len() - 1)
            }
            KeyCode::Char(' ') | KeyCode::Enter => {
                if let Some(on) = form.skills.get_mut(form.skill_cursor) {
                    *on = !*on;
                }
            }
            _ => {}
        },
        VolunteerField::Available => {
            if matches!(key.code, KeyCode::Char(' ') | KeyCode::Enter) {
                form.available = !form.available;
            }
        }
        VolunteerField::Submit => {
            if key.code == KeyCode::Enter {
                submit_volunteer(app);
            }
        }
    }
}

fn submit_volunteer<S: KeyValueStore>(app: &mut App<S>) {
    let form = &app.volunteer_form;
    let draft = NewVolunteer {
        name: form.name.clone(),
        phone: form.phone.clone(),
        skills: form.selected_skills(),
        available: form.available,
    };
    match app.session.create_volunteer(draft, app.now) {
        Ok(saved) => {
            app.volunteer_form = VolunteerForm::new();
            app.screen = Screen::Volunteers;
            let id = saved.value.id.clone();
            match saved.storage_error {
                Some(err) => open_error_return_to(
                    app,
                    format!("Volunteer {id} was registered but could not be saved: {err}"),
                    Screen::Volunteers,
                ),
                None => {
                    app.status = Some("Volunteer registration completed successfully!".to_string())
                }
            }
        }
        Err(err) => open_error_return_to(app, err.to_string(), Screen::VolunteerForm),
    }
}

struct Palette {
    base: Style,
    accent: Style,
    muted: Style,
}

fn palette<S: KeyValueStore>(app: &App<S>) -> Palette {
    if !app.options.color {
        return Palette {
            base: Style::default(),
            accent: Style::default().add_modifier(Modifier::BOLD),
            muted: Style::default(),
        };
    }
    match app.theme {
        Theme::Light => Palette {
            base: Style::default().fg(Color::Black).bg(Color::White),
            accent: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            muted: Style::default().fg(Color::DarkGray),
        },
        Theme::Dark => Palette {
            base: Style::default().fg(Color::Gray).bg(Color::Black),
            accent: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            muted: Style::default().fg(Color::DarkGray),
        },
    }
}

fn hex_color(hex: &str, enabled: bool) -> Color {
    match crate::map::hex_rgb(hex) {
        Some((r, g, b)) if enabled => Color::Rgb(r, g, b),
        _ => Color::Reset,
    }
}

fn severity_style(severity: &Severity, enabled: bool) -> Style {
    if !enabled {
        return Style::default();
    }
    match severity {
        Severity::Critical => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        Severity::High => Style::default().fg(Color::Red),
        Severity::Medium => Style::default().fg(Color::Yellow),
        Severity::Low => Style::default().fg(Color::Green),
        Severity::Other(_) => Style::default(),
    }
}

fn draw<S: KeyValueStore>(f: &mut ratatui::Frame, app: &mut App<S>) {
    let size = f.size();
    f.render_widget(Block::default().style(palette(app).base), size);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(size);

    draw_header(f, chunks[0], app);
    draw_footer(f, chunks[2], app);

    match app.screen {
        Screen::Dashboard => draw_dashboard(f, chunks[1], app),
        Screen::Map => draw_map(f, chunks[1], app),
        Screen::Reports => draw_reports(f, chunks[1], app),
        Screen::ReportDetail => draw_report_detail(f, chunks[1], app),
        Screen::Volunteers => draw_volunteers(f, chunks[1], app),
        Screen::ReportForm => draw_report_form(f, chunks[1], app),
        Screen::VolunteerForm => draw_volunteer_form(f, chunks[1], app),
        Screen::ConfirmDelete => draw_confirm(f, chunks[1], app),
        Screen::Error => draw_error(f, chunks[1], app),
        Screen::Help => draw_help(f, chunks[1], app),
    }
}

fn draw_header<S: KeyValueStore>(f: &mut ratatui::Frame, area: Rect, app: &App<S>) {
    let p = palette(app);
    let titles: Vec<Line> = Screen::TABS
        .iter()
        .enumerate()
        .map(|(i, s)| Line::from(format!("{} {}", i + 1, s.title())))
        .collect();
    let block_title = format!(
        "RescueHub v{} | {} | theme: {}",
        env!("CARGO_PKG_VERSION"),
        app.screen.title(),
        app.theme
    );
    let tabs = Tabs::new(titles)
        .select(app.screen.tab_index())
        .block(Block::default().borders(Borders::ALL).title(block_title))
        .style(p.base)
        .highlight_style(p.accent.add_modifier(Modifier::REVERSED));
    f.render_widget(tabs, area);
}

fn draw_footer<S: KeyValueStore>(f: &mut ratatui::Frame, area: Rect, app: &App<S>) {
    let p = palette(app);
    let keys = match app.screen {
        Screen::Dashboard => "r: report emergency  v: volunteer  j/k+Enter: reports of a type  Tab/1-4: switch  T: theme  ?: help  q: quit",
        Screen::Map if app.session.selector().is_selecting() => {
            "arrows/hjkl: move cursor  +/-: zoom  Enter: select here  Esc: cancel"
        }
        Screen::Map if app.map.dragging => "arrows/hjkl: move marker  Enter/g: done",
        Screen::Map => "arrows: pan  +/-: zoom  o: density  n/p: next/prev report  g: move selection  c: recenter  M: my location",
        Screen::Reports => "j/k: move  Enter: open  c/s/t/a: filters  x: clear  n: new  d: delete  m: map",
        Screen::ReportDetail => "d: delete  m: show on map  b: back",
        Screen::Volunteers => "j/k: move  n: register  d: delete",
        Screen::ReportForm => "Tab/Up/Down: field  Left/Right: choose  Enter on Location: pick on map  d: device location  Ctrl-S: submit  Esc: cancel",
        Screen::VolunteerForm => "Tab/Up/Down: field  Space: toggle  Ctrl-S: submit  Esc: cancel",
        Screen::ConfirmDelete => "y: delete  any other key: cancel",
        Screen::Error | Screen::Help => "any key: back",
    };

    let spinner = ['|', '/', '-', '\\'][(app.tick % 4) as usize];
    let status = if app.busy() {
        format!("{spinner} {}", app.status.as_deref().unwrap_or("Working..."))
    } else {
        app.status.clone().unwrap_or_default()
    };

    let w = Paragraph::new(Text::from(vec![
        Line::from(Span::styled(truncate_chars(&status, 120), p.accent)),
        Line::from(Span::styled(keys, p.muted)),
    ]))
    .style(p.base);
    f.render_widget(w, area);
}

fn truncate_chars(input: &str, max_chars: usize) -> String {
    let mut s = String::new();
    for (i, ch) in input.chars().enumerate() {
        if i >= max_chars {
            s.push('…');
            break;
        }
        s.push(ch);
    }
    s
}

fn draw_dashboard<S: KeyValueStore>(f: &mut ratatui::Frame, area: Rect, app: &mut App<S>) {
    let p = palette(app);
    let stats = app.session.dashboard().stats();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(1)])
        .split(area);

    let counters = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(25),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
        ])
        .split(chunks[0]);
    let cards = [
        ("Active Reports", stats.active_reports),
        ("Available Volunteers", stats.available_volunteers),
        ("Total Reports", stats.total_reports),
        ("Total Volunteers", stats.total_volunteers),
    ];
    for (rect, (title, value)) in counters.iter().zip(cards) {
        let w = Paragraph::new(Line::from(Span::styled(value.to_string(), p.accent)))
            .block(Block::default().borders(Borders::ALL).title(title))
            .style(p.base);
        f.render_widget(w, *rect);
    }

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(chunks[1]);

    let by_category: Vec<ListItem> = stats
        .by_category
        .iter()
        .map(|c| {
            let style = marker_cell_style(&c.category, app.options.color);
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{} ", crate::map::marker_style(&c.category).glyph),
                    style,
                ),
                Span::raw(format!("{:<10}", c.category.label())),
                Span::styled(format!("{:>4} active", c.active), p.muted),
            ]))
        })
        .collect();
    let list = List::new(by_category)
        .block(Block::default().borders(Borders::ALL).title("Disaster Types"))
        .style(p.base)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    f.render_stateful_widget(list, body[0], &mut app.category_state);

    let recent: Vec<ListItem> = app
        .session
        .dashboard()
        .reports()
        .iter()
        .rev()
        .filter(|r| r.is_active())
        .take(usize::from(body[1].height.saturating_sub(2)).max(1))
        .map(|r| report_item(r, app.now, app.options.color, &p))
        .collect();
    let recent = if recent.is_empty() {
        vec![ListItem::new(Line::from("No active reports."))]
    } else {
        recent
    };
    let list = List::new(recent)
        .block(Block::default().borders(Borders::ALL).title("Recent Active Reports"))
        .style(p.base);
    f.render_widget(list, body[1]);
}

fn marker_cell_style(category: &Category, color: bool) -> Style {
    Style::default().fg(hex_color(crate::map::marker_style(category).color, color))
}

fn report_item<'a>(report: &Report, now: OffsetDateTime, color: bool, p: &Palette) -> ListItem<'a> {
    ListItem::new(Line::from(vec![
        Span::styled(
            format!("{} ", crate::map::marker_style(&report.category).glyph),
            marker_cell_style(&report.category, color),
        ),
        Span::styled(
            format!("{:<9}", report.severity.label()),
            severity_style(&report.severity, color),
        ),
        Span::raw(truncate_chars(&report.title, 40)),
        Span::raw("  "),
        Span::styled(
            format!(
                "{} | {}",
                crate::ui::time_ago(report.timestamp, now),
                report.status.label()
            ),
            p.muted,
        ),
    ]))
}

fn draw_map<S: KeyValueStore>(f: &mut ratatui::Frame, area: Rect, app: &mut App<S>) {
    let p = palette(app);
    let color = app.options.color;
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(20), Constraint::Length(36)])
        .split(area);

    let reports = app.session.dashboard().reports();
    let markers = crate::map::markers(reports);
    let density = crate::map::density_points(reports);
    let selected = app.session.selector().selected();
    let selecting = app.session.selector().is_selecting();
    let view = &app.map;

    let title = match (selecting, view.layer) {
        (true, _) => "Map | click to select a location".to_string(),
        (false, MapLayer::Markers) => format!("Map | {} markers", markers.len()),
        (false, MapLayer::Density) => format!("Map | density of {} reports", density.len()),
    };

    let canvas = Canvas::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .marker(symbols::Marker::Braille)
        .x_bounds(view.x_bounds())
        .y_bounds(view.y_bounds())
        .paint(|ctx| {
            ctx.draw(&Map {
                resolution: MapResolution::High,
                color: if color { Color::DarkGray } else { Color::Reset },
            });
            ctx.layer();
            match view.layer {
                MapLayer::Markers => {
                    for (i, m) in markers.iter().enumerate() {
                        let mut style = Style::default().fg(hex_color(m.style.color, color));
                        if view.focus == Some(i) {
                            style = style.add_modifier(Modifier::REVERSED);
                        }
                        ctx.print(
                            m.location.lng,
                            m.location.lat,
                            Span::styled(m.style.glyph.to_string(), style),
                        );
                    }
                }
                MapLayer::Density => {
                    for d in &density {
                        ctx.draw(&Circle {
                            x: d.location.lng,
                            y: d.location.lat,
                            radius: d.radius_degrees(),
                            color: hex_color(d.color, color),
                        });
                    }
                }
            }
            if let Some(at) = selected {
                ctx.print(
                    at.lng,
                    at.lat,
                    Span::styled("X", Style::default().add_modifier(Modifier::BOLD)),
                );
            }
            if selecting {
                ctx.print(
                    view.cursor.lng,
                    view.cursor.lat,
                    Span::styled("@", Style::default().add_modifier(Modifier::BOLD)),
                );
            }
        });
    f.render_widget(canvas, chunks[0]);

    let mut lines = vec![
        Line::from(Span::styled("View", p.accent)),
        Line::from(format!("center {}", view.center.short_label())),
        Line::from(format!("span   {:.3}°", view.span)),
        Line::from(format!(
            "layer  {}",
            match view.layer {
                MapLayer::Markers => "markers",
                MapLayer::Density => "density",
            }
        )),
    ];
    if selecting {
        lines.push(Line::from(format!("cursor {}", view.cursor.short_label())));
    }
    if let Some(at) = selected {
        lines.push(Line::from(format!("picked {}", at.short_label())));
    }
    lines.push(Line::from(""));

    let focused = view
        .focus
        .and_then(|i| markers.get(i))
        .and_then(|m| app.session.dashboard().report(m.report_id));
    match focused {
        Some(report) => {
            lines.push(Line::from(Span::styled("Report", p.accent)));
            for l in crate::ui::popup_text(report, app.now).lines() {
                lines.push(Line::from(l.to_string()));
            }
        }
        None => {
            lines.push(Line::from(Span::styled("Legend", p.accent)));
            for category in Category::KNOWN.iter() {
                let style = crate::map::marker_style(category);
                lines.push(Line::from(vec![
                    Span::styled(
                        format!("{} ", style.glyph),
                        Style::default().fg(hex_color(style.color, color)),
                    ),
                    Span::raw(category.label()),
                ]));
            }
        }
    }

    let w = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::ALL).title("Details"))
        .style(p.base)
        .wrap(Wrap { trim: false });
    f.render_widget(w, chunks[1]);
}

fn filter_summary(filter: &ReportFilter) -> String {
    let part = |name: &str, value: Option<String>| {
        format!("{name}: {}", value.unwrap_or_else(|| "all".to_string()))
    };
    [
        part("category", filter.category.as_ref().map(Category::label)),
        part("severity", filter.severity.as_ref().map(Severity::label)),
        part("date", filter.date.map(|d| d.as_str().to_string())),
        part("status", filter.status.as_ref().map(Status::label)),
    ]
    .join("  ")
}

fn draw_reports<S: KeyValueStore>(f: &mut ratatui::Frame, area: Rect, app: &mut App<S>) {
    let p = palette(app);
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    let reports = app.filtered_reports();
    let items: Vec<ListItem> = if reports.is_empty() {
        vec![
            ListItem::new(Line::from(Span::styled("No Reports Found", p.accent))),
            ListItem::new(Line::from("No reports match the current filters")),
        ]
    } else {
        reports
            .iter()
            .map(|r| report_item(r, app.now, app.options.color, &p))
            .collect()
    };
    let detail = app
        .reports_state
        .selected()
        .and_then(|i| reports.get(i))
        .map(|r| report_detail_text(r, app.now, app.options.color, &p))
        .unwrap_or_else(|| Text::from(""));

    let title = format!("Reports | {}", filter_summary(&app.filter));
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .style(p.base)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    f.render_stateful_widget(list, chunks[0], &mut app.reports_state);

    let w = Paragraph::new(detail)
        .block(Block::default().borders(Borders::ALL).title("Detail"))
        .style(p.base)
        .wrap(Wrap { trim: false });
    f.render_widget(w, chunks[1]);
}

fn report_detail_text(
    report: &Report,
    now: OffsetDateTime,
    color: bool,
    p: &Palette,
) -> Text<'static> {
    let mut lines = vec![
        Line::from(Span::styled(report.title.clone(), p.accent)),
        Line::from(""),
        Line::from(vec![
            Span::styled("Category:  ", p.muted),
            Span::styled(
                report.category.label(),
                marker_cell_style(&report.category, color),
            ),
        ]),
        Line::from(vec![
            Span::styled("Severity:  ", p.muted),
            Span::styled(
                report.severity.label(),
                severity_style(&report.severity, color),
            ),
        ]),
        Line::from(vec![
            Span::styled("Status:    ", p.muted),
            Span::raw(report.status.label()),
        ]),
        Line::from(vec![
            Span::styled("Reported:  ", p.muted),
            Span::raw(crate::ui::time_ago(report.timestamp, now)),
        ]),
        Line::from(vec![
            Span::styled("Location:  ", p.muted),
            Span::raw(crate::ui::address_or_placeholder(report).to_string()),
        ]),
    ];
    if let Some(location) = report.location {
        lines.push(Line::from(vec![
            Span::styled("Coords:    ", p.muted),
            Span::raw(location.short_label()),
        ]));
    }
    if report.photo.is_some() {
        lines.push(Line::from(Span::styled("Photo attached", p.muted)));
    }
    lines.push(Line::from(""));
    for l in report.description.lines() {
        lines.push(Line::from(l.to_string()));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(report.id.clone(), p.muted)));
    Text::from(lines)
}

fn draw_report_detail<S: KeyValueStore>(f: &mut ratatui::Frame, area: Rect, app: &mut App<S>) {
    let p = palette(app);
    let text = match app
        .detail_id
        .as_deref()
        .and_then(|id| app.session.dashboard().report(id))
    {
        Some(report) => report_detail_text(report, app.now, app.options.color, &p),
        None => Text::from("This report no longer exists."),
    };
    let w = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("Report"))
        .style(p.base)
        .wrap(Wrap { trim: false });
    f.render_widget(w, area);
}

fn draw_volunteers<S: KeyValueStore>(f: &mut ratatui::Frame, area: Rect, app: &mut App<S>) {
    let p = palette(app);
    let volunteers = app.session.dashboard().volunteers();
    let items: Vec<ListItem> = if volunteers.is_empty() {
        vec![
            ListItem::new(Line::from(Span::styled("No Volunteers Registered", p.accent))),
            ListItem::new(Line::from("Be the first to register as a volunteer")),
        ]
    } else {
        volunteers
            .iter()
            .map(|v| {
                let availability = if v.available {
                    Span::styled(
                        "Available  ",
                        if app.options.color {
                            Style::default().fg(Color::Green)
                        } else {
                            Style::default()
                        },
                    )
                } else {
                    Span::styled("Unavailable", p.muted)
                };
                let skills = v
                    .skills
                    .iter()
                    .map(Skill::label)
                    .collect::<Vec<_>>()
                    .join(", ");
                ListItem::new(Line::from(vec![
                    availability,
                    Span::raw(" "),
                    Span::styled(format!("{:<20}", truncate_chars(&v.name, 20)), p.accent),
                    Span::raw(format!("{:<16}", v.phone)),
                    Span::raw(truncate_chars(&skills, 40)),
                    Span::raw("  "),
                    Span::styled(crate::ui::time_ago(v.registered_at, app.now), p.muted),
                ]))
            })
            .collect()
    };
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Volunteers ({})", volunteers.len())),
        )
        .style(p.base)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    f.render_stateful_widget(list, area, &mut app.volunteers_state);
}

fn form_line(label: &str, value: Line<'static>, active: bool, p: &Palette) -> Line<'static> {
    let marker = if active { "> " } else { "  " };
    let label_style = if active { p.accent } else { p.muted };
    let mut spans = vec![
        Span::raw(marker.to_string()),
        Span::styled(format!("{label:<12}"), label_style),
    ];
    spans.extend(value.spans);
    Line::from(spans)
}

fn text_value(value: &str, active: bool, tick: u64) -> Line<'static> {
    let cursor = if active && tick % 4 < 2 { "_" } else { "" };
    Line::from(format!("{value}{cursor}"))
}

fn draw_report_form<S: KeyValueStore>(f: &mut ratatui::Frame, area: Rect, app: &mut App<S>) {
    let p = palette(app);
    let form = &app.report_form;
    let current = form.current();
    let location = match (
        app.session.selector().selected(),
        app.session.device_location(),
    ) {
        (Some(at), _) => format!("{} (selected on map)", at.short_label()),
        (None, Some(at)) => format!("{} (device location)", at.short_label()),
        (None, None) if app.pending_locate.is_some() => "locating...".to_string(),
        (None, None) => "not set".to_string(),
    };

    let lines = vec![
        form_line(
            "Title",
            text_value(&form.title, current == ReportField::Title, app.tick),
            current == ReportField::Title,
            &p,
        ),
        form_line(
            "Category",
            Line::from(format!("< {} >", form.category().label())),
            current == ReportField::Category,
            &p,
        ),
        form_line(
            "Severity",
            Line::from(Span::styled(
                format!("< {} >", form.severity().label()),
                severity_style(&form.severity(), app.options.color),
            )),
            current == ReportField::Severity,
            &p,
        ),
        form_line(
            "Description",
            text_value(&form.description, current == ReportField::Description, app.tick),
            current == ReportField::Description,
            &p,
        ),
        form_line(
            "Photo",
            text_value(&form.photo, current == ReportField::Photo, app.tick),
            current == ReportField::Photo,
            &p,
        ),
        form_line(
            "Location",
            Line::from(location),
            current == ReportField::Location,
            &p,
        ),
        Line::from(""),
        form_line(
            "",
            Line::from(Span::styled("[ Submit Report ]", p.accent)),
            current == ReportField::Submit,
            &p,
        ),
    ];

    let w = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::ALL).title("Report Emergency"))
        .style(p.base)
        .wrap(Wrap { trim: false });
    f.render_widget(w, area);
}

fn draw_volunteer_form<S: KeyValueStore>(f: &mut ratatui::Frame, area: Rect, app: &mut App<S>) {
    let p = palette(app);
    let form = &app.volunteer_form;
    let current = form.current();

    let mut skill_spans = Vec::new();
    for (i, skill) in Skill::KNOWN.iter().enumerate() {
        let on = form.skills.get(i).copied().unwrap_or(false);
        let mut style = Style::default();
        if current == VolunteerField::Skills && i == form.skill_cursor {
            style = style.add_modifier(Modifier::REVERSED);
        }
        skill_spans.push(Span::styled(
            format!("[{}] {}", if on { 'x' } else { ' ' }, skill.label()),
            style,
        ));
        skill_spans.push(Span::raw("  "));
    }

    let lines = vec![
        form_line(
            "Name",
            text_value(&form.name, current == VolunteerField::Name, app.tick),
            current == VolunteerField::Name,
            &p,
        ),
        form_line(
            "Phone",
            text_value(&form.phone, current == VolunteerField::Phone, app.tick),
            current == VolunteerField::Phone,
            &p,
        ),
        form_line(
            "Skills",
            Line::from(skill_spans),
            current == VolunteerField::Skills,
            &p,
        ),
        form_line(
            "Available",
            Line::from(if form.available { "[x] yes" } else { "[ ] no" }),
            current == VolunteerField::Available,
            &p,
        ),
        Line::from(""),
        form_line(
            "",
            Line::from(Span::styled("[ Register ]", p.accent)),
            current == VolunteerField::Submit,
            &p,
        ),
    ];

    let w = Paragraph::new(Text::from(lines))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Volunteer Registration"),
        )
        .style(p.base)
        .wrap(Wrap { trim: false });
    f.render_widget(w, area);
}

fn draw_confirm<S: KeyValueStore>(f: &mut ratatui::Frame, area: Rect, app: &App<S>) {
    let p = palette(app);
    let label = app
        .confirm
        .as_ref()
        .map(|c| c.label.as_str())
        .unwrap_or("this entry");
    let text = Text::from(vec![
        Line::from(Span::styled(format!("Delete {label}?"), p.accent)),
        Line::from(""),
        Line::from("This cannot be undone."),
        Line::from(""),
        Line::from(Span::styled("y: delete   any other key: cancel", p.muted)),
    ]);
    let w = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("Confirm"))
        .style(p.base)
        .wrap(Wrap { trim: false });
    f.render_widget(w, centered_rect(50, 40, area));
}

fn draw_error<S: KeyValueStore>(f: &mut ratatui::Frame, area: Rect, app: &App<S>) {
    let msg = app.error.as_deref().unwrap_or("Unknown error.").to_string();
    let w = Paragraph::new(msg)
        .block(Block::default().borders(Borders::ALL).title("Error"))
        .style(palette(app).base)
        .wrap(Wrap { trim: false });
    f.render_widget(w, area);
}

fn draw_help<S: KeyValueStore>(f: &mut ratatui::Frame, area: Rect, app: &App<S>) {
    let p = palette(app);
    let text = Text::from(vec![
        Line::from(Span::styled("RescueHub", p.accent)),
        Line::from(""),
        Line::from("Everywhere:"),
        Line::from("  Tab / Shift-Tab / 1-4 : switch between Dashboard, Map, Reports, Volunteers"),
        Line::from("  T                     : toggle light/dark theme"),
        Line::from("  q                     : quit   Ctrl-C: quit from any screen"),
        Line::from(""),
        Line::from("Dashboard:"),
        Line::from("  r : report an emergency   v : register as a volunteer"),
        Line::from("  j/k, Enter : open the reports of the highlighted disaster type"),
        Line::from(""),
        Line::from("Map:"),
        Line::from("  arrows/hjkl : pan   +/- : zoom   c : recenter   M : my location"),
        Line::from("  o           : toggle the density overlay"),
        Line::from("  n/p         : step through report markers"),
        Line::from("  g           : move the selected location (arrows, Enter when done)"),
        Line::from(""),
        Line::from("Reports:"),
        Line::from("  c/s/t/a : cycle category / severity / date / status filter   x : clear"),
        Line::from("  Enter : open   d : delete (confirm with y)   m : show on map   n : new"),
        Line::from(""),
        Line::from("Report form:"),
        Line::from("  Location field: Enter picks a point on the map, d asks for the device location"),
        Line::from("  A point picked on the map takes precedence over the device location."),
        Line::from("  Ctrl-S submits; the address is looked up before saving."),
        Line::from(""),
        Line::from("Text input:"),
        Line::from("  Backspace : delete   Ctrl-U : clear"),
    ]);

    let w = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("Help"))
        .style(p.base)
        .wrap(Wrap { trim: false });
    f.render_widget(w, centered_rect(70, 80, area));
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
