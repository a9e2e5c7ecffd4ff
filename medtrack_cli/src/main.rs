use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use medtrack_core::clock::parse_local_datetime;
use medtrack_core::*;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "medtrack")]
#[command(about = "Medication adherence tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Pretend the local time is this instant (YYYY-MM-DDTHH:MM)
    #[arg(long, global = true, hide = true)]
    now: Option<String>,
}

/// Medication fields shared by `add` and `edit`
#[derive(clap::Args)]
struct MedicationArgs {
    /// Display name, e.g. "Amlodipine"
    #[arg(long)]
    name: Option<String>,

    /// Dosage, e.g. "5 mg"
    #[arg(long)]
    dosage: Option<String>,

    /// Scheduled time of day (HH:MM); repeat for several
    #[arg(long = "time")]
    times: Vec<String>,

    #[arg(long)]
    notes: Option<String>,

    /// daily, specific-weekdays, every-n-days, weekly, as-needed
    #[arg(long)]
    frequency: Option<String>,

    /// Weekday number for specific-weekdays (1 = Monday .. 7 = Sunday); repeat for several
    #[arg(long = "weekday")]
    weekdays: Vec<u8>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show today's doses and the next one due (default)
    Today,

    /// Register a new medication
    Add {
        #[command(flatten)]
        fields: MedicationArgs,
    },

    /// Change a medication in place
    Edit {
        id: Uuid,
        #[command(flatten)]
        fields: MedicationArgs,
    },

    /// Delete a medication and all of its dose history
    Remove { id: Uuid },

    /// List medications by name
    List,

    /// Show one medication
    Show { id: Uuid },

    /// Mark a dose as taken
    Take {
        id: Uuid,
        /// Scheduled time (HH:MM)
        time: String,
        /// Date of the dose (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Mark a dose as missed
    Miss {
        id: Uuid,
        /// Scheduled time (HH:MM)
        time: String,
        /// Date of the dose (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Revert the most recent take/miss
    Undo,

    /// Weekly adherence, per-day breakdown and streak
    Stats,

    /// Refresh the next-dose countdown periodically
    Watch {
        /// Stop after this many refreshes
        #[arg(long)]
        ticks: Option<u64>,
    },

    /// Compact the dose journal into the CSV table
    Rollup {
        /// Clean up processed journal files after rollup
        #[arg(long)]
        cleanup: bool,
    },
}

fn main() -> Result<()> {
    medtrack_core::logging::init_with_level("warn");

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| config.data.data_dir.clone());
    tracing::debug!("Using data directory {:?}", data_dir);

    let clock: Box<dyn Clock> = match &cli.now {
        Some(s) => Box::new(FixedClock(parse_local_datetime(s)?)),
        None => Box::new(SystemClock),
    };

    let mut store = open_data_dir(&data_dir)?;
    store.tracker_mut().subscribe(Box::new(ConfirmationPrinter));

    match cli.command.unwrap_or(Commands::Today) {
        Commands::Today => cmd_today(&store, clock.now(), &config),
        Commands::Add { fields } => cmd_add(&mut store, fields),
        Commands::Edit { id, fields } => cmd_edit(&mut store, id, fields),
        Commands::Remove { id } => store.delete_medication(id).map(|_| ()),
        Commands::List => cmd_list(&store),
        Commands::Show { id } => cmd_show(&store, id),
        Commands::Take { id, time, date } => cmd_mark(&mut store, id, &time, date, &*clock, true),
        Commands::Miss { id, time, date } => cmd_mark(&mut store, id, &time, date, &*clock, false),
        Commands::Undo => cmd_undo(&mut store),
        Commands::Stats => cmd_stats(&store, clock.now().date()),
        Commands::Watch { ticks } => cmd_watch(&store, &*clock, &config, ticks),
        Commands::Rollup { cleanup } => cmd_rollup(&mut store, cleanup),
    }
}

/// Prints the one-line confirmation for each applied mutation
struct ConfirmationPrinter;

impl TrackerObserver for ConfirmationPrinter {
    fn on_event(&mut self, event: &TrackerEvent) {
        match event {
            TrackerEvent::MedicationAdded(_) => println!("✓ Medication added"),
            TrackerEvent::MedicationUpdated(_) => println!("✓ Medication updated"),
            TrackerEvent::MedicationDeleted { events_removed, .. } => {
                println!("✓ Medication deleted ({} dose records removed)", events_removed)
            }
            TrackerEvent::DoseMarked { status, .. } => println!("✓ Dose marked as {}", status),
            TrackerEvent::DoseRestored { .. } => println!("✓ Action undone"),
        }
    }
}

fn build_draft(base: MedicationDraft, fields: MedicationArgs) -> Result<MedicationDraft> {
    let mut draft = base;
    if let Some(name) = fields.name {
        draft.name = name;
    }
    if let Some(dosage) = fields.dosage {
        draft.dosage = dosage;
    }
    if !fields.times.is_empty() {
        draft.times = fields.times;
    }
    if let Some(notes) = fields.notes {
        draft.notes = Some(notes);
    }
    if let Some(frequency) = fields.frequency {
        draft.frequency = frequency.parse()?;
    }
    if !fields.weekdays.is_empty() {
        draft.specific_weekdays = fields.weekdays;
    }
    Ok(draft)
}

/// Print each invalid field before handing the error back
fn report_validation<T>(result: Result<T>) -> Result<T> {
    if let Err(Error::Validation(errors)) = &result {
        eprintln!("Medication not saved:");
        for error in &errors.errors {
            eprintln!("  - {}: {}", error.field, error.message);
        }
    }
    result
}

fn cmd_add(store: &mut Store, fields: MedicationArgs) -> Result<()> {
    let draft = build_draft(MedicationDraft::default(), fields)?;
    let medication = report_validation(store.add_medication(&draft))?;
    println!("{}", medication.id);
    Ok(())
}

fn cmd_edit(store: &mut Store, id: Uuid, fields: MedicationArgs) -> Result<()> {
    let existing = store
        .tracker()
        .medication(id)
        .ok_or(Error::MedicationNotFound(id))?;
    let draft = build_draft(MedicationDraft::from_medication(existing), fields)?;
    report_validation(store.update_medication(id, &draft))?;
    Ok(())
}

fn cmd_list(store: &Store) -> Result<()> {
    let medications = store.tracker().medications();
    if medications.is_empty() {
        println!("No medications yet. Add one with `medtrack add`.");
        return Ok(());
    }

    for med in medications {
        println!(
            "{}  {} {}  [{}]  {}",
            med.id,
            med.name,
            med.dosage,
            describe_schedule(&med),
            join_times(&med)
        );
    }
    Ok(())
}

fn cmd_show(store: &Store, id: Uuid) -> Result<()> {
    let Some(med) = store.tracker().medication(id) else {
        println!("Medication {} not found.", id);
        return Ok(());
    };

    println!("{}", med.name);
    println!("  Dosage:    {}", med.dosage);
    println!("  Times:     {}", join_times(med));
    println!("  Schedule:  {}", describe_schedule(med));
    if let Some(ref notes) = med.notes {
        println!("  Notes:     {}", notes);
    }
    println!("  Id:        {}", med.id);
    Ok(())
}

fn cmd_today(store: &Store, now: NaiveDateTime, config: &Config) -> Result<()> {
    let dashboard = store
        .tracker()
        .dashboard(now, config.schedule.dose_window());
    display_dashboard(&dashboard);
    Ok(())
}

fn cmd_mark(
    store: &mut Store,
    id: Uuid,
    time: &str,
    date: Option<NaiveDate>,
    clock: &dyn Clock,
    taken: bool,
) -> Result<()> {
    let time: DoseTime = time.parse()?;
    let date = date.unwrap_or_else(|| clock.now().date());
    store.mark_dose(id, date, time, taken)?;
    Ok(())
}

fn cmd_undo(store: &mut Store) -> Result<()> {
    if store.undo()?.is_none() {
        println!("Nothing to undo.");
    }
    Ok(())
}

fn cmd_stats(store: &Store, today: NaiveDate) -> Result<()> {
    let report = store.tracker().stats(today);

    println!("\n  Weekly adherence: {}%", report.weekly_percentage);
    println!("  Streak: {} day{}", report.streak, plural(report.streak));
    println!();
    for day in &report.days {
        let bar = "█".repeat(usize::from(day.percentage / 10));
        println!("  {} {}  {:<10} {:>3}%", day.label(), day.date, bar, day.percentage);
    }
    println!();
    println!("  {}", report.feedback);
    println!();
    Ok(())
}

fn cmd_watch(store: &Store, clock: &dyn Clock, config: &Config, ticks: Option<u64>) -> Result<()> {
    let interval = std::time::Duration::from_secs(config.schedule.countdown_refresh_seconds);
    let window = config.schedule.dose_window();
    let mut count = 0;

    loop {
        let dashboard = store.tracker().dashboard(clock.now(), window);
        println!("{}", countdown_line(&dashboard));

        count += 1;
        if ticks.is_some_and(|limit| count >= limit) {
            return Ok(());
        }
        std::thread::sleep(interval);
    }
}

fn cmd_rollup(store: &mut Store, cleanup: bool) -> Result<()> {
    if !store.paths().wal_path.exists() {
        println!("No journal found - nothing to roll up.");
        return Ok(());
    }

    let count = store.compact()?;

    println!("✓ Rolled up {} journal entries", count);
    println!("  CSV: {}", store.paths().csv_path.display());

    if cleanup {
        let cleaned = medtrack_core::csv_rollup::cleanup_processed_wals(&store.paths().wal_dir)?;
        if cleaned > 0 {
            println!("✓ Cleaned up {} processed journal files", cleaned);
        }
    }

    Ok(())
}

fn display_dashboard(dashboard: &Dashboard) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  TODAY  {}", dashboard.today.format("%a %Y-%m-%d"));
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  {}", countdown_line(dashboard));
    if let Some(ref next) = dashboard.next {
        if next.in_dose_window {
            println!(
                "  → Take now: medtrack take {} {}",
                next.dose.medication.id, next.dose.time
            );
        }
    }
    println!();

    if dashboard.doses.is_empty() {
        println!("  No doses scheduled today.");
    }
    for dose in &dashboard.doses {
        let mark = match dose.status {
            DoseStatus::Taken => "✓",
            DoseStatus::Missed => "✗",
            DoseStatus::Unmarked => "·",
        };
        println!(
            "  {} {}  {} {}  ({})",
            mark, dose.time, dose.medication.name, dose.medication.dosage, dose.status
        );
    }

    println!();
    println!(
        "  This week: {}%   Streak: {} day{}",
        dashboard.weekly_percentage,
        dashboard.streak,
        plural(dashboard.streak)
    );
    println!();
}

fn countdown_line(dashboard: &Dashboard) -> String {
    match dashboard.next {
        Some(ref next) => format!(
            "Next: {} {} at {} (in {})",
            next.dose.medication.name, next.dose.medication.dosage, next.dose.time, next.countdown
        ),
        None => "All done!".to_string(),
    }
}

fn describe_schedule(med: &Medication) -> String {
    match med.frequency {
        Frequency::SpecificWeekdays => {
            let days: Vec<&str> = med
                .specific_weekdays
                .iter()
                .filter_map(|&d| WEEKDAY_NAMES.get(usize::from(d).wrapping_sub(1)).copied())
                .collect();
            format!("{} {}", med.frequency, days.join(","))
        }
        _ => med.frequency.to_string(),
    }
}

const WEEKDAY_NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

fn join_times(med: &Medication) -> String {
    med.scheduled_times
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn plural(n: u32) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}
