use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vitals_core::*;

#[derive(Parser)]
#[command(name = "vitals")]
#[command(about = "Daily health metrics journal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Record (or replace) the readings for a day
    Add {
        /// Day of the reading, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Body weight in kg
        #[arg(long)]
        weight: f64,

        /// Height in cm
        #[arg(long)]
        height: f64,

        /// Systolic pressure in mmHg
        #[arg(long)]
        systolic: u16,

        /// Diastolic pressure in mmHg
        #[arg(long)]
        diastolic: u16,

        /// Heart rate in bpm
        #[arg(long)]
        heart_rate: u16,
    },

    /// Show every record, newest first
    List,

    /// Show records in a date range, oldest first
    Range {
        /// First day, inclusive (defaults to the configured window before --end)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Last day, inclusive (defaults to today)
        #[arg(long)]
        end: Option<NaiveDate>,
    },

    /// Delete a record by id
    Delete {
        /// Record id as shown by `list`
        id: RecordId,
    },

    /// Compute BMI without saving anything
    Bmi {
        #[arg(long)]
        weight: f64,

        #[arg(long)]
        height: f64,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    vitals_core::logging::init();

    let cli = Cli::parse();

    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    tracing::debug!("Using data directory {:?}", data_dir);

    match cli.command {
        Commands::Add {
            date,
            weight,
            height,
            systolic,
            diastolic,
            heart_rate,
        } => {
            let date = date.unwrap_or_else(today);
            let input = HealthRecordInput::new(date, weight, height, systolic, diastolic, heart_rate);
            cmd_add(&open_store(data_dir)?, &input)
        }
        Commands::List => cmd_list(&open_store(data_dir)?),
        Commands::Range { start, end } => {
            let end = end.unwrap_or_else(today);
            let range = match start {
                Some(start) => DateRange::new(start, end),
                None => DateRange::trailing_days(end, config.display.default_range_days)?,
            };
            cmd_range(&open_store(data_dir)?, range)
        }
        Commands::Delete { id } => cmd_delete(&open_store(data_dir)?, id),
        Commands::Bmi { weight, height } => {
            println!("BMI: {}", format_bmi(compute_bmi(Some(weight), Some(height))));
            Ok(())
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn open_store(data_dir: PathBuf) -> Result<RecordStore> {
    let mut store = RecordStore::new(data_dir.join("records"));
    store.init()?;
    Ok(store)
}

fn cmd_add(store: &RecordStore, input: &HealthRecordInput) -> Result<()> {
    let id = store.save(input)?;

    println!("✓ Saved record #{} for {}", id, input.date);
    println!("  BMI: {}", format_bmi(input.bmi));
    println!(
        "  Blood pressure: {}/{} mmHg ({})",
        input.systolic,
        input.diastolic,
        BloodPressureStatus::from_readings(input.systolic, input.diastolic)
    );
    Ok(())
}

fn cmd_list(store: &RecordStore) -> Result<()> {
    let records = store.get_all()?;
    if records.is_empty() {
        println!("No records yet.");
        return Ok(());
    }

    for record in records.iter().rev() {
        display_record(record);
    }
    Ok(())
}

fn cmd_range(store: &RecordStore, range: DateRange) -> Result<()> {
    let records = store.get_in_range(range)?;
    if records.is_empty() {
        println!("No records in {} .. {}.", range.start, range.end);
        return Ok(());
    }

    println!("Records {} .. {}", range.start, range.end);
    println!();
    println!(
        "  {:<10}  {:>5}  {:>5}  {:>4}  {:>6}  {:>5}  status",
        "date", "sys", "dia", "bpm", "kg", "bmi"
    );
    for record in &records {
        println!(
            "  {:<10}  {:>5}  {:>5}  {:>4}  {:>6.1}  {:>5}  {}",
            record.date,
            record.systolic,
            record.diastolic,
            record.heart_rate,
            record.weight,
            format_bmi(record.bmi),
            record.blood_pressure_status()
        );
    }
    Ok(())
}

fn cmd_delete(store: &RecordStore, id: RecordId) -> Result<()> {
    store.delete_by_id(id)?;
    println!("✓ Deleted record #{}", id);
    Ok(())
}

fn display_record(record: &HealthRecord) {
    println!("#{}  {}", record.id, record.date);
    println!(
        "  Weight: {} kg  Height: {} cm  BMI: {}",
        record.weight,
        record.height,
        format_bmi(record.bmi)
    );
    println!(
        "  Blood pressure: {}/{} mmHg ({})  Heart rate: {} bpm",
        record.systolic,
        record.diastolic,
        record.blood_pressure_status(),
        record.heart_rate
    );
    println!();
}

fn format_bmi(bmi: Option<f64>) -> String {
    match bmi {
        Some(value) => format!("{:.1}", value),
        None => "--".into(),
    }
}
