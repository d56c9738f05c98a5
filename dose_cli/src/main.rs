use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use dose_core::time::parse_time_of_day;
use dose_core::*;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "dosekeeper")]
#[command(about = "Medicine dose reminders and adherence tracking", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a medicine with up to three daily times
    Add {
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        dosage: String,
        /// First dose time (HH:mm)
        #[arg(long)]
        time1: Option<String>,
        #[arg(long)]
        time2: Option<String>,
        #[arg(long)]
        time3: Option<String>,
        /// First day of the course (YYYY-MM-DD), defaults to today
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Last day of the course (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Course length, used to derive the end date
        #[arg(long, default_value_t = 0)]
        duration_days: u32,
        #[arg(long)]
        notes: Option<String>,
    },

    /// List all medicines of a user
    List {
        #[arg(long)]
        user: UserId,
    },

    /// Remove a medicine
    Delete { id: Uuid },

    /// Show today's doses for a user
    Today {
        #[arg(long)]
        user: UserId,
    },

    /// Show today's doses not yet taken
    Reminders {
        #[arg(long)]
        user: UserId,
    },

    /// Show today's intake counts
    Summary {
        #[arg(long)]
        user: UserId,
    },

    /// Mark a dose as taken, or undo it (slot 1-3; anything else is the legacy slot)
    Toggle { id: Uuid, slot: u8 },

    /// Compute adherence for a user
    Adherence {
        #[arg(long)]
        user: UserId,
    },

    /// Run a single due-dose scan and print the pending reminders
    Scan {
        /// Pretend the current time of day is HH:mm
        #[arg(long)]
        at: Option<String>,
    },

    /// Clear taken flags (all active medicines, or every medicine of one user)
    Reset {
        #[arg(long)]
        user: Option<UserId>,
    },

    /// Run the scheduler until interrupted, printing reminders as they come due
    Run,
}

/// Prints reminders to stdout
struct StdoutNotifier;

impl Notifier for StdoutNotifier {
    fn deliver(&self, medicine_id: MedicineId, message: &str) -> Result<()> {
        println!("🔔 {}  [{}]", message, medicine_id);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    dose_core::logging::init_with_level("warn");

    let cli = Cli::parse();

    // Determine data directory
    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    let store: Arc<dyn MedicineStore> = Arc::new(JsonFileStore::in_dir(&data_dir));
    let clock = SystemClock;

    match cli.command {
        Commands::Add {
            user,
            name,
            dosage,
            time1,
            time2,
            time3,
            start,
            end,
            duration_days,
            notes,
        } => {
            let medicine = intake::add_medicine(
                store.as_ref(),
                NewMedicine {
                    user_id: user,
                    name,
                    dosage,
                    times: [time1, time2, time3],
                    start_date: start,
                    end_date: end,
                    duration_days,
                    notes,
                },
                clock.now(),
            )?;
            println!("✓ Added {} ({})", medicine.name, medicine.dosage);
            println!("  id: {}", medicine.id);
            Ok(())
        }
        Commands::List { user } => cmd_list(store.as_ref(), user),
        Commands::Delete { id } => {
            intake::delete_medicine(store.as_ref(), id)?;
            println!("✓ Deleted {}", id);
            Ok(())
        }
        Commands::Today { user } => {
            let doses = intake::todays_schedule(store.as_ref(), user, clock.now())?;
            print_doses(&doses, "No doses scheduled today.");
            Ok(())
        }
        Commands::Reminders { user } => {
            let doses = intake::upcoming_reminders(store.as_ref(), user, clock.now())?;
            print_doses(&doses, "All doses taken for today.");
            Ok(())
        }
        Commands::Summary { user } => {
            let summary = intake::daily_summary(store.as_ref(), user, clock.now())?;
            println!("Medicines:  {}", summary.total_medicines);
            println!(
                "Doses:      {}/{} taken, {} remaining",
                summary.taken_doses, summary.total_doses, summary.remaining_doses
            );
            println!("Completion: {}%", summary.completion_percentage);
            Ok(())
        }
        Commands::Toggle { id, slot } => {
            let slot = DoseSlot::from_number(slot);
            let medicine = intake::toggle_slot(store.as_ref(), id, slot, clock.now())?;
            let state = if medicine.slot(slot).taken {
                "taken"
            } else {
                "not taken"
            };
            println!("✓ {} {} marked {}", medicine.name, slot, state);
            Ok(())
        }
        Commands::Adherence { user } => {
            let calculator = AdherenceCalculator::new(store, Arc::new(clock));
            let adherence = calculator.compute_adherence(user).await?;
            println!(
                "Adherence: {:.1}% ({}/{} doses)",
                adherence.percentage, adherence.taken_doses, adherence.total_doses
            );
            Ok(())
        }
        Commands::Scan { at } => cmd_scan(store, &config, at).await,
        Commands::Reset { user } => {
            match user {
                Some(user) => {
                    let count = reset::reset_user(store.as_ref(), user)?;
                    println!("✓ Reset {} medicines for user {}", count, user);
                }
                None => {
                    let report = reset_daily(store.as_ref())?;
                    println!("✓ Reset {} medicines", report.reset);
                    if report.failed > 0 {
                        println!("  {} medicines could not be saved", report.failed);
                    }
                }
            }
            Ok(())
        }
        Commands::Run => cmd_run(store, &config).await,
    }
}

fn cmd_list(store: &dyn MedicineStore, user: UserId) -> Result<()> {
    let medicines = store.load_by_user(user)?;
    if medicines.is_empty() {
        println!("No medicines for user {}.", user);
        return Ok(());
    }

    for medicine in medicines {
        let times: Vec<_> = medicine
            .dose_slots()
            .into_iter()
            .filter_map(|(_, state)| state.scheduled_time().map(String::from))
            .collect();
        let status = if medicine.active { "" } else { " (inactive)" };
        println!("{}  {} ({}){}", medicine.id, medicine.name, medicine.dosage, status);
        println!("    times: {}", times.join(", "));
        if let Some(end) = medicine.end_date {
            println!("    until: {}", end);
        }
    }
    Ok(())
}

fn print_doses(doses: &[ScheduledDose], empty: &str) {
    if doses.is_empty() {
        println!("{}", empty);
        return;
    }
    for dose in doses {
        let mark = if dose.taken { "✓" } else { "·" };
        println!(
            "{} {}  {} ({})  {}",
            mark, dose.time, dose.medicine_name, dose.dosage, dose.slot
        );
    }
}

async fn cmd_scan(store: Arc<dyn MedicineStore>, config: &Config, at: Option<String>) -> Result<()> {
    let clock: Arc<dyn Clock> = match at {
        Some(at) => {
            let time = parse_time_of_day(&at)?;
            let now = NaiveDateTime::new(SystemClock.today(), time);
            Arc::new(ManualClock::new(now))
        }
        None => Arc::new(SystemClock),
    };

    let engine = DoseEngine::new(store, clock, config.scheduler.clone())?;
    let checked = engine.scan_due_doses().await;
    engine.wait_idle().await;

    let mut pending: Vec<_> = engine.pending_notifications().into_values().collect();
    pending.sort();
    println!("Checked {} medicines, {} due.", checked, pending.len());
    for message in pending {
        println!("  {}", message);
    }
    Ok(())
}

async fn cmd_run(store: Arc<dyn MedicineStore>, config: &Config) -> Result<()> {
    let mut engine = DoseEngine::new(store, Arc::new(SystemClock), config.scheduler.clone())?;
    engine.start();
    println!("Dosekeeper running. Press Ctrl-C to stop.");

    let mut deliver = tokio::time::interval(std::time::Duration::from_secs(5));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = deliver.tick() => {
                let delivered = engine.dispatch(&StdoutNotifier);
                if delivered > 0 {
                    tracing::debug!(delivered, "Delivered reminders");
                }
            }
        }
    }

    engine.shutdown().await;
    println!("Stopped.");
    Ok(())
}
