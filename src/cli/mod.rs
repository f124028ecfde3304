use std::io::{self, IsTerminal, Write as _};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use serde::Serialize;
use time::OffsetDateTime;

use crate::config::EffectiveConfig;
use crate::core::{Category, NewReport, NewVolunteer, Location, Severity, Skill, Status};
use crate::geo::{CommandLocator, LocationProvider, NominatimClient, ReverseGeocoder};
use crate::logs::OperationRecord;
use crate::query::{DateRange, ReportFilter, filter_reports};
use crate::state::{OpenOptions, Saved, Session};
use crate::store::{FileStore, Theme};
use crate::ui::UiConfig;

mod interactive;

use interactive::Selection;

#[derive(Debug, Parser)]
#[command(
    name = "rescuehub",
    version,
    about = "Disaster incident reports and volunteer coordination, stored locally"
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub json: bool,
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,
    #[arg(long, global = true)]
    pub verbose: bool,
    #[arg(long, global = true)]
    pub quiet: bool,
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Directory holding the stored reports, volunteers and theme.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
    /// Seconds to wait for device location and address lookup.
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Active reports, available volunteers and per-category counts.
    Dashboard,
    Report(ReportArgs),
    Volunteer(VolunteerArgs),
    Map(MapArgs),
    /// Write every report and volunteer to a JSON file.
    Export(ExportArgs),
    /// Append the reports and volunteers of a JSON file.
    Import(ImportArgs),
    Theme(ThemeArgs),
    /// Interactive terminal dashboard.
    Ui(UiArgs),
    Completion(CompletionArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    #[command(subcommand)]
    pub command: ReportCommand,
}

#[derive(Debug, Subcommand)]
pub enum ReportCommand {
    Add(ReportAddArgs),
    List(FilterArgs),
    Show {
        #[arg(long)]
        id: String,
    },
    Delete(DeleteArgs),
}

#[derive(Debug, Args)]
pub struct ReportAddArgs {
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub category: Category,
    #[arg(long)]
    pub severity: Severity,
    #[arg(long, default_value = "")]
    pub description: String,
    /// Latitude of a point picked on the map.
    #[arg(long, requires = "lng", allow_negative_numbers = true)]
    pub lat: Option<f64>,
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    pub lng: Option<f64>,
    /// Use the device location from `[location] command`.
    #[arg(long)]
    pub here: bool,
    #[arg(long)]
    pub photo: Option<PathBuf>,
    /// Keep coordinates as the address instead of asking Nominatim.
    #[arg(long)]
    pub no_geocode: bool,
}

#[derive(Debug, Args, Default)]
pub struct FilterArgs {
    #[arg(long)]
    pub category: Option<Category>,
    #[arg(long)]
    pub severity: Option<Severity>,
    /// today | week | month (anything else: no date filter)
    #[arg(long)]
    pub date: Option<String>,
    #[arg(long)]
    pub status: Option<Status>,
}

impl FilterArgs {
    pub fn to_filter(&self) -> ReportFilter {
        ReportFilter {
            category: self.category.clone(),
            severity: self.severity.clone(),
            date: self.date.as_deref().map(DateRange::from),
            status: self.status.clone(),
        }
    }
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    #[arg(long, conflicts_with = "pick")]
    pub id: Option<String>,
    /// Choose entries from a numbered list.
    #[arg(long)]
    pub pick: bool,
    /// Skip the confirmation prompt.
    #[arg(long)]
    pub yes: bool,
}

#[derive(Debug, Args)]
pub struct VolunteerArgs {
    #[command(subcommand)]
    pub command: VolunteerCommand,
}

#[derive(Debug, Subcommand)]
pub enum VolunteerCommand {
    Add(VolunteerAddArgs),
    List {
        #[arg(long)]
        available_only: bool,
    },
    Delete(DeleteArgs),
}

#[derive(Debug, Args)]
pub struct VolunteerAddArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub phone: String,
    /// medical, search-rescue, logistics, communication, transportation, cooking
    #[arg(long = "skill", value_delimiter = ',')]
    pub skills: Vec<Skill>,
    /// Choose skills from a numbered list.
    #[arg(long)]
    pub pick_skills: bool,
    #[arg(long)]
    pub available: bool,
}

#[derive(Debug, Args)]
pub struct MapArgs {
    #[command(subcommand)]
    pub command: MapCommand,
}

#[derive(Debug, Subcommand)]
pub enum MapCommand {
    /// One marker per active report.
    Markers(FilterArgs),
    /// Severity-weighted circles per active report.
    Density(FilterArgs),
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Output path; `-` writes to stdout. Defaults to
    /// `rescue-hub-data-YYYY-MM-DD.json` in the current directory.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// JSON file to merge; `-` reads stdin.
    pub file: PathBuf,
}

#[derive(Debug, Args)]
pub struct ThemeArgs {
    #[command(subcommand)]
    pub command: Option<ThemeCommand>,
}

#[derive(Debug, Subcommand)]
pub enum ThemeCommand {
    Show,
    Set { theme: Theme },
    Toggle,
}

#[derive(Debug, Args)]
pub struct UiArgs {}

#[derive(Debug, Args)]
pub struct CompletionArgs {
    pub shell: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub show: bool,
}

struct Ctx {
    json: bool,
    ui: UiConfig,
    cfg: EffectiveConfig,
    home_dir: PathBuf,
    data_dir: PathBuf,
    now: OffsetDateTime,
}

impl Ctx {
    fn open_session(&self) -> Session<FileStore> {
        let mut session = Session::open(
            FileStore::new(&self.data_dir),
            OpenOptions {
                seed_sample_data: self.cfg.storage.seed_sample_data,
            },
            self.now,
        );
        for warning in session.take_warnings() {
            crate::ui::eprintln_warning(&warning, &self.ui);
        }
        session
    }

    fn show_progress(&self) -> bool {
        self.ui.stderr_is_tty && !self.ui.quiet && !self.json
    }

    fn require_tty(&self, what: &str) -> Result<()> {
        if !(self.ui.stdin_is_tty && self.ui.stdout_is_tty) {
            return Err(crate::exit::invalid_args(format!(
                "{what} needs a TTY (stdin + stdout)"
            )));
        }
        Ok(())
    }

    /// Audit log failures are reported but never fail the command.
    fn record(&self, mut record: OperationRecord) {
        record.finished_at = crate::platform::now_local();
        match crate::logs::write_operation_log(&self.data_dir, &self.home_dir, &record) {
            Ok(path) => {
                if self.ui.verbose {
                    crate::ui::eprintln_info(&format!("log: {}", path.display()), &self.ui);
                }
            }
            Err(err) => {
                crate::ui::eprintln_warning(&format!("could not write operation log: {err:#}"), &self.ui)
            }
        }
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let now = crate::platform::now_local();

    let stdin_is_tty = io::stdin().is_terminal();
    let stdout_is_tty = io::stdout().is_terminal();
    let stderr_is_tty = io::stderr().is_terminal();

    let home_dir = crate::platform::effective_home_dir()?;

    let mut cfg = crate::config::load(cli.config.as_deref(), &home_dir)
        .map_err(crate::exit::invalid_args_err)?;
    if let Some(timeout) = cli.timeout {
        cfg.geocoding.timeout_secs = timeout;
        cfg.location.timeout_secs = timeout;
    }
    if let Some(dir) = &cli.data_dir {
        cfg.storage.data_dir = Some(dir.clone());
    }

    let color = stdout_is_tty && cfg.ui.color && !cli.no_color;

    let ui_cfg = UiConfig {
        color,
        stdin_is_tty,
        stdout_is_tty,
        stderr_is_tty,
        max_table_rows: cfg.ui.max_table_rows,
        quiet: cli.quiet,
        verbose: cli.verbose,
    };

    let ctx = Ctx {
        json: cli.json,
        ui: ui_cfg,
        data_dir: cfg.data_dir(&home_dir),
        cfg,
        home_dir,
        now,
    };

    match cli.command {
        Commands::Dashboard => {
            let session = ctx.open_session();
            let stats = session.dashboard().stats();
            if ctx.json {
                write_json(&stats)?;
            } else {
                crate::ui::print_with(&ctx.ui, |out| crate::ui::write_dashboard(out, &stats));
            }
        }
        Commands::Report(args) => run_report(&ctx, args.command)?,
        Commands::Volunteer(args) => run_volunteer(&ctx, args.command)?,
        Commands::Map(args) => {
            let session = ctx.open_session();
            let (filter_args, density) = match &args.command {
                MapCommand::Markers(f) => (f, false),
                MapCommand::Density(f) => (f, true),
            };
            let filtered: Vec<_> =
                filter_reports(session.dashboard().reports(), &filter_args.to_filter(), ctx.now)
                    .into_iter()
                    .cloned()
                    .collect();
            if density {
                let points = crate::map::density_points(&filtered);
                if ctx.json {
                    write_json(&points)?;
                } else {
                    crate::ui::print_with(&ctx.ui, |out| crate::ui::write_density(out, &points));
                }
            } else {
                let markers = crate::map::markers(&filtered);
                if ctx.json {
                    write_json(&markers)?;
                } else {
                    crate::ui::print_with(&ctx.ui, |out| crate::ui::write_markers(out, &markers));
                }
            }
        }
        Commands::Export(args) => run_export(&ctx, args)?,
        Commands::Import(args) => run_import(&ctx, args)?,
        Commands::Theme(args) => {
            let mut session = ctx.open_session();
            let theme = match args.command.unwrap_or(ThemeCommand::Show) {
                ThemeCommand::Show => session.theme(),
                ThemeCommand::Set { theme } => session.set_theme(theme)?,
                ThemeCommand::Toggle => session.toggle_theme()?,
            };
            if ctx.json {
                write_json(&serde_json::json!({ "theme": theme }))?;
            } else if !ctx.ui.quiet {
                println!("{theme}");
            }
        }
        Commands::Ui(_args) => {
            if ctx.json {
                return Err(crate::exit::invalid_args("ui cannot be combined with --json"));
            }
            ctx.require_tty("ui")?;
            let session = ctx.open_session();
            crate::tui::run(
                session,
                crate::tui::TuiOptions {
                    color: ctx.ui.color,
                    geocoding: ctx.cfg.geocoding.clone(),
                    location: ctx.cfg.location.clone(),
                    map_center: ctx.cfg.map_center(),
                    photo_max_bytes: ctx.cfg.photo.max_bytes,
                },
            )?;
        }
        Commands::Completion(args) => {
            let shell = parse_shell(&args.shell)?;
            let mut cmd = Cli::command();
            let mut out = std::io::stdout().lock();
            clap_complete::generate(shell, &mut cmd, "rescuehub", &mut out);
        }
        Commands::Config(args) => {
            if args.show {
                if ctx.json {
                    write_json(&ctx.cfg)?;
                } else {
                    println!("{}", toml::to_string_pretty(&ctx.cfg)?);
                }
            } else if !ctx.ui.quiet {
                eprintln!("config: use `rescuehub config --show`");
            }
        }
    }

    Ok(())
}

fn run_report(ctx: &Ctx, command: ReportCommand) -> Result<()> {
    match command {
        ReportCommand::Add(args) => {
            let started_at = crate::platform::now_local();
            let mut session = ctx.open_session();

            let photo = args
                .photo
                .as_deref()
                .map(|p| crate::photo::embed_photo(p, ctx.cfg.photo.max_bytes))
                .transpose()?;

            if let (Some(lat), Some(lng)) = (args.lat, args.lng) {
                let picked = Location::new(lat, lng);
                if !picked.is_valid() {
                    return Err(crate::exit::invalid_args(format!(
                        "coordinates out of range: {lat}, {lng}"
                    )));
                }
                session.selector_mut().begin_selection();
                session.selector_mut().click(picked);
            } else if args.here {
                let locator = CommandLocator::from_config(&ctx.cfg.location)?;
                let here = crate::ui::with_spinner(ctx.show_progress(), "Locating device...", || {
                    locator.locate(None)
                })
                .context("device location")?;
                session.set_device_location(Some(here));
            }

            let address = match session.resolved_location() {
                Some(location) => Some(lookup_address(ctx, location, args.no_geocode)),
                None => None,
            };

            let saved = session.create_report(
                NewReport {
                    title: args.title,
                    category: args.category,
                    severity: args.severity,
                    description: args.description,
                    address,
                    photo,
                },
                ctx.now,
            )?;

            let mut record = OperationRecord::new("report add", started_at);
            record.affected_ids.push(saved.value.id.clone());
            finish_mutation(ctx, record, saved, |report| {
                if ctx.json {
                    write_json(report)
                } else {
                    crate::ui::print_with(&ctx.ui, |out| {
                        let _ = writeln!(out, "Incident report submitted: {}", report.id);
                        crate::ui::write_report_detail(out, report, ctx.now, ctx.ui.color);
                    });
                    Ok(())
                }
            })?;
        }
        ReportCommand::List(filter_args) => {
            let session = ctx.open_session();
            let reports = filter_reports(
                session.dashboard().reports(),
                &filter_args.to_filter(),
                ctx.now,
            );
            if ctx.json {
                write_json(&reports)?;
            } else {
                crate::ui::print_with(&ctx.ui, |out| {
                    crate::ui::write_report_list(
                        out,
                        &reports,
                        ctx.now,
                        ctx.ui.max_table_rows,
                        ctx.ui.color,
                    )
                });
            }
        }
        ReportCommand::Show { id } => {
            let session = ctx.open_session();
            let Some(report) = session.dashboard().report(&id) else {
                return Err(crate::exit::invalid_args(format!("no report with id {id}")));
            };
            if ctx.json {
                write_json(report)?;
            } else {
                crate::ui::print_with(&ctx.ui, |out| {
                    crate::ui::write_report_detail(out, report, ctx.now, ctx.ui.color)
                });
            }
        }
        ReportCommand::Delete(args) => {
            let started_at = crate::platform::now_local();
            let mut session = ctx.open_session();
            let ids: Vec<String> = if args.pick {
                ctx.require_tty("report delete --pick")?;
                let reports = session.dashboard().reports();
                let labels: Vec<String> = reports
                    .iter()
                    .map(|r| format!("{}  [{}] {}", r.id, r.severity, r.title))
                    .collect();
                let selection = interactive::prompt_selection("Reports:", &labels, Selection::None)
                    .map_err(crate::exit::invalid_args_err)?;
                selection
                    .indices(reports.len())
                    .into_iter()
                    .map(|i| reports[i].id.clone())
                    .collect()
            } else if let Some(id) = args.id {
                vec![id]
            } else {
                return Err(crate::exit::invalid_args(
                    "report delete: pass --id <ID> or --pick",
                ));
            };

            let present: Vec<String> = ids
                .iter()
                .filter(|id| session.dashboard().report(id).is_some())
                .cloned()
                .collect();
            if !present.is_empty() && !confirm_delete(ctx, "report", &present, args.yes)? {
                if !ctx.ui.quiet {
                    eprintln!("Cancelled.");
                }
                return Ok(());
            }

            let mut record = OperationRecord::new("report delete", started_at);
            let mut storage_error = None;
            let mut results = Vec::new();
            for id in &ids {
                let saved = session.delete_report(id);
                if saved.value {
                    record.affected_ids.push(id.clone());
                }
                results.push(DeleteResult {
                    id: id.clone(),
                    deleted: saved.value,
                });
                if let Some(err) = saved.storage_error {
                    storage_error = Some(err);
                }
            }
            finish_mutation(
                ctx,
                record,
                Saved {
                    value: results,
                    storage_error,
                },
                |results| print_delete_results(ctx, "report", results),
            )?;
        }
    }
    Ok(())
}

fn run_volunteer(ctx: &Ctx, command: VolunteerCommand) -> Result<()> {
    match command {
        VolunteerCommand::Add(args) => {
            let started_at = crate::platform::now_local();
            let mut session = ctx.open_session();

            let mut skills = args.skills;
            if args.pick_skills {
                ctx.require_tty("volunteer add --pick-skills")?;
                let labels: Vec<String> = Skill::KNOWN.iter().map(Skill::label).collect();
                let selection =
                    interactive::prompt_selection("Skills:", &labels, Selection::None)
                        .map_err(crate::exit::invalid_args_err)?;
                skills.extend(
                    selection
                        .indices(Skill::KNOWN.len())
                        .into_iter()
                        .map(|i| Skill::KNOWN[i].clone()),
                );
            }

            let saved = session.create_volunteer(
                NewVolunteer {
                    name: args.name,
                    phone: args.phone,
                    skills,
                    available: args.available,
                },
                ctx.now,
            )?;

            let mut record = OperationRecord::new("volunteer add", started_at);
            record.affected_ids.push(saved.value.id.clone());
            finish_mutation(ctx, record, saved, |volunteer| {
                if ctx.json {
                    write_json(volunteer)
                } else {
                    crate::ui::print_with(&ctx.ui, |out| {
                        let _ = writeln!(out, "Volunteer registration completed: {}", volunteer.id);
                        crate::ui::write_volunteer_list(
                            out,
                            std::slice::from_ref(volunteer),
                            ctx.now,
                            1,
                            ctx.ui.color,
                        );
                    });
                    Ok(())
                }
            })?;
        }
        VolunteerCommand::List { available_only } => {
            let session = ctx.open_session();
            let volunteers: Vec<_> = session
                .dashboard()
                .volunteers()
                .iter()
                .filter(|v| !available_only || v.available)
                .cloned()
                .collect();
            if ctx.json {
                write_json(&volunteers)?;
            } else {
                crate::ui::print_with(&ctx.ui, |out| {
                    crate::ui::write_volunteer_list(
                        out,
                        &volunteers,
                        ctx.now,
                        ctx.ui.max_table_rows,
                        ctx.ui.color,
                    )
                });
            }
        }
        VolunteerCommand::Delete(args) => {
            let started_at = crate::platform::now_local();
            let mut session = ctx.open_session();
            let ids: Vec<String> = if args.pick {
                ctx.require_tty("volunteer delete --pick")?;
                let volunteers = session.dashboard().volunteers();
                let labels: Vec<String> = volunteers
                    .iter()
                    .map(|v| format!("{}  {} ({})", v.id, v.name, v.phone))
                    .collect();
                let selection =
                    interactive::prompt_selection("Volunteers:", &labels, Selection::None)
                        .map_err(crate::exit::invalid_args_err)?;
                selection
                    .indices(volunteers.len())
                    .into_iter()
                    .map(|i| volunteers[i].id.clone())
                    .collect()
            } else if let Some(id) = args.id {
                vec![id]
            } else {
                return Err(crate::exit::invalid_args(
                    "volunteer delete: pass --id <ID> or --pick",
                ));
            };

            let present: Vec<String> = ids
                .iter()
                .filter(|id| session.dashboard().volunteer(id).is_some())
                .cloned()
                .collect();
            if !present.is_empty() && !confirm_delete(ctx, "volunteer", &present, args.yes)? {
                if !ctx.ui.quiet {
                    eprintln!("Cancelled.");
                }
                return Ok(());
            }

            let mut record = OperationRecord::new("volunteer delete", started_at);
            let mut storage_error = None;
            let mut results = Vec::new();
            for id in &ids {
                let saved = session.delete_volunteer(id);
                if saved.value {
                    record.affected_ids.push(id.clone());
                }
                results.push(DeleteResult {
                    id: id.clone(),
                    deleted: saved.value,
                });
                if let Some(err) = saved.storage_error {
                    storage_error = Some(err);
                }
            }
            finish_mutation(
                ctx,
                record,
                Saved {
                    value: results,
                    storage_error,
                },
                |results| print_delete_results(ctx, "volunteer", results),
            )?;
        }
    }
    Ok(())
}

fn run_export(ctx: &Ctx, args: ExportArgs) -> Result<()> {
    let session = ctx.open_session();
    let doc = session.export(ctx.now);
    let text = doc.to_json_pretty().context("failed to serialize export")?;

    let to_stdout = args.output.as_deref() == Some(Path::new("-"));
    if to_stdout {
        write_stdout(text.as_bytes())?;
        return Ok(());
    }

    let path = args
        .output
        .unwrap_or_else(|| PathBuf::from(crate::transfer::export_file_name(ctx.now)));
    std::fs::write(&path, format!("{text}\n"))
        .with_context(|| format!("failed to write export file: {}", path.display()))?;

    if ctx.json {
        write_json(&serde_json::json!({
            "path": path.display().to_string(),
            "reports": doc.reports.len(),
            "volunteers": doc.volunteers.len(),
        }))?;
    } else if !ctx.ui.quiet {
        println!(
            "Data exported: {} reports, {} volunteers -> {}",
            doc.reports.len(),
            doc.volunteers.len(),
            path.display()
        );
    }
    Ok(())
}

fn run_import(ctx: &Ctx, args: ImportArgs) -> Result<()> {
    let started_at = crate::platform::now_local();
    let text = if args.file.as_os_str() == "-" {
        let mut buf = String::new();
        io::Read::read_to_string(&mut io::stdin().lock(), &mut buf)
            .context("failed to read import data from stdin")?;
        buf
    } else {
        std::fs::read_to_string(&args.file)
            .with_context(|| format!("failed to read import file: {}", args.file.display()))?
    };

    let mut session = ctx.open_session();
    let before_reports = session.dashboard().reports().len();
    let before_volunteers = session.dashboard().volunteers().len();
    let saved = session
        .import(&text)
        .with_context(|| format!("import aborted: {}", args.file.display()))?;

    let mut record = OperationRecord::new("import", started_at);
    record.source = (args.file.as_os_str() != "-").then(|| args.file.clone());
    record.affected_ids.extend(
        session.dashboard().reports()[before_reports..]
            .iter()
            .map(|r| r.id.clone()),
    );
    record.affected_ids.extend(
        session.dashboard().volunteers()[before_volunteers..]
            .iter()
            .map(|v| v.id.clone()),
    );

    finish_mutation(ctx, record, saved, |summary| {
        if ctx.json {
            write_json(&serde_json::json!({
                "reports": summary.reports,
                "volunteers": summary.volunteers,
                "skipped": summary.skipped,
            }))
        } else {
            if summary.skipped > 0 {
                crate::ui::eprintln_warning(
                    &format!("skipped {} entries that are not records", summary.skipped),
                    &ctx.ui,
                );
            }
            if !ctx.ui.quiet {
                println!(
                    "Data imported: {} reports, {} volunteers",
                    summary.reports, summary.volunteers
                );
            }
            Ok(())
        }
    })
}

/// Reverse geocoding with coordinate fallback; failures become warnings.
fn lookup_address(ctx: &Ctx, location: Location, no_geocode: bool) -> String {
    if no_geocode || !ctx.cfg.geocoding.enabled {
        return location.short_label();
    }
    let client = match NominatimClient::new(&ctx.cfg.geocoding) {
        Ok(client) => client,
        Err(err) => {
            crate::ui::eprintln_warning(&err.to_string(), &ctx.ui);
            return location.short_label();
        }
    };
    let (address, err) = crate::ui::with_spinner(ctx.show_progress(), "Looking up address...", || {
        crate::geo::resolve_address(Some(&client as &dyn ReverseGeocoder), location)
    });
    if let Some(err) = err {
        crate::ui::eprintln_warning(&format!("{err}; using coordinates as the address"), &ctx.ui);
    }
    address
}

/// Prints the outcome, writes the audit record and turns an unsaved mutation
/// into a storage failure.
fn finish_mutation<T>(
    ctx: &Ctx,
    mut record: OperationRecord,
    saved: Saved<T>,
    print: impl FnOnce(&T) -> Result<()>,
) -> Result<()> {
    record.storage_error = saved.storage_error.as_ref().map(|e| e.to_string());
    print(&saved.value)?;
    ctx.record(record);
    match saved.storage_error {
        Some(err) => Err(anyhow::Error::new(err).context("change applied but could not be saved")),
        None => Ok(()),
    }
}

#[derive(Debug, Serialize)]
struct DeleteResult {
    id: String,
    deleted: bool,
}

fn print_delete_results(ctx: &Ctx, noun: &str, results: &[DeleteResult]) -> Result<()> {
    if ctx.json {
        return write_json(&results);
    }
    if ctx.ui.quiet {
        return Ok(());
    }
    for r in results {
        if r.deleted {
            println!("Deleted {noun} {}", r.id);
        } else {
            println!("No {noun} with id {}; nothing to delete", r.id);
        }
    }
    Ok(())
}

fn confirm_delete(ctx: &Ctx, noun: &str, ids: &[String], yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    if !(ctx.ui.stdin_is_tty && ctx.ui.stderr_is_tty) {
        return Err(crate::exit::invalid_args(format!(
            "{noun} delete needs --yes when not running on a TTY"
        )));
    }
    let what = if ids.len() == 1 {
        format!("{noun} {}", ids[0])
    } else {
        format!("{} {noun}s", ids.len())
    };
    confirm_exact(
        &format!("Delete {what}? This cannot be undone. Type 'delete' to confirm: "),
        "delete",
    )
}

fn write_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let mut buf = serde_json::to_vec_pretty(value)?;
    buf.push(b'\n');
    write_stdout(&buf)
}

fn write_stdout(buf: &[u8]) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    match stdout.write_all(buf) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn confirm_exact(prompt: &str, expected: &str) -> Result<bool> {
    use std::io::BufRead;

    let mut stderr = std::io::stderr().lock();
    write!(stderr, "{prompt}")?;
    stderr.flush()?;

    let mut input = String::new();
    let mut stdin = std::io::stdin().lock();
    let n = stdin.read_line(&mut input)?;
    if n == 0 {
        return Ok(false);
    }
    Ok(input.trim() == expected)
}

fn parse_shell(s: &str) -> Result<clap_complete::Shell> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "bash" => Ok(clap_complete::Shell::Bash),
        "zsh" => Ok(clap_complete::Shell::Zsh),
        "fish" => Ok(clap_complete::Shell::Fish),
        other => Err(crate::exit::invalid_args(format!(
            "unsupported shell: {other} (expected bash|zsh|fish)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn report_add_parses_negative_coordinates_and_kinds() {
        let cli = Cli::try_parse_from([
            "rescuehub",
            "report",
            "add",
            "--title",
            "Heart attack",
            "--category",
            "Medical",
            "--severity",
            "critical",
            "--lat",
            "40.0",
            "--lng",
            "-74.0",
        ])
        .unwrap();
        let Commands::Report(ReportArgs {
            command: ReportCommand::Add(args),
        }) = cli.command
        else {
            panic!("expected report add");
        };
        assert_eq!(args.category, Category::Medical);
        assert_eq!(args.severity, Severity::Critical);
        assert_eq!(args.lat, Some(40.0));
        assert_eq!(args.lng, Some(-74.0));
    }

    #[test]
    fn unknown_category_and_lone_latitude_are_rejected() {
        assert!(Cli::try_parse_from([
            "rescuehub", "report", "add", "--title", "x", "--category", "flood", "--severity",
            "low",
        ])
        .is_err());
        assert!(Cli::try_parse_from([
            "rescuehub", "report", "add", "--title", "x", "--category", "food", "--severity",
            "low", "--lat", "1.0",
        ])
        .is_err());
    }

    #[test]
    fn filter_args_map_to_report_filter() {
        let args = FilterArgs {
            category: Some(Category::Food),
            date: Some("week".to_string()),
            ..FilterArgs::default()
        };
        let filter = args.to_filter();
        assert_eq!(filter.category, Some(Category::Food));
        assert_eq!(filter.date, Some(DateRange::Week));
        assert!(filter.severity.is_none());
        assert!(FilterArgs::default().to_filter().is_empty());
    }

    #[test]
    fn volunteer_skills_accept_comma_lists() {
        let cli = Cli::try_parse_from([
            "rescuehub",
            "volunteer",
            "add",
            "--name",
            "Ana",
            "--phone",
            "555",
            "--skill",
            "medical,search-rescue",
            "--skill",
            "cooking",
        ])
        .unwrap();
        let Commands::Volunteer(VolunteerArgs {
            command: VolunteerCommand::Add(args),
        }) = cli.command
        else {
            panic!("expected volunteer add");
        };
        assert_eq!(
            args.skills,
            vec![Skill::Medical, Skill::SearchRescue, Skill::Cooking]
        );
        assert!(!args.available);
    }

    #[test]
    fn parse_shell_rejects_unknown() {
        assert!(parse_shell("Zsh").is_ok());
        assert!(parse_shell("powershell").is_err());
    }
}
