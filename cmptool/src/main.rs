use clap::{Parser, Subcommand};
use colored_json::{Color, ColorMode, Output, Styler, ToColoredJson};
use gdpr_cmp::cmp::{CmpConfig, ConsentManager, MemoryStore};
use gdpr_cmp::v1::{ConsentRecord, Padding};
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fs::File;
use std::io;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Print debug logs
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a consent string and display it in the console
    Decode {
        /// Consent string to decode
        consent_string: String,
    },
    /// Check whether purposes and vendors are allowed by a consent string
    Query {
        /// Consent string to decode
        consent_string: String,
        /// Purpose ID to check
        #[arg(short, long = "purpose")]
        purposes: Vec<u16>,
        /// Vendor ID to check
        #[arg(long = "vendor")]
        vendors: Vec<u16>,
    },
    /// Encode a JSON record, as displayed by the decode command
    Encode {
        /// JSON file to read, or - for the standard input
        file: String,
        /// Pad the output with '=' characters
        #[arg(short, long)]
        padding: bool,
    },
    /// Build a consent string allowing or refusing everything
    ConsentAll {
        /// Highest vendor ID the consent applies to
        #[arg(short, long)]
        max_vendor_id: u16,
        /// Refuse everything instead
        #[arg(short, long)]
        deny: bool,
    },
}

#[derive(Serialize)]
struct QueryResult {
    purposes: BTreeMap<u16, bool>,
    vendors: BTreeMap<u16, bool>,
}

fn main() {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            LevelFilter::DEBUG
        } else {
            LevelFilter::WARN
        })
        .with_writer(io::stderr)
        .init();

    let e = match args.cmd {
        Commands::Decode { consent_string } => decode(&consent_string),
        Commands::Query {
            consent_string,
            purposes,
            vendors,
        } => query(&consent_string, &purposes, &vendors),
        Commands::Encode { file, padding } => encode(&file, padding),
        Commands::ConsentAll {
            max_vendor_id,
            deny,
        } => consent_all(max_vendor_id, !deny),
    };

    if let Err(e) = e {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn decode(s: &str) -> Result<(), Box<dyn Error>> {
    let record = ConsentRecord::from_str(s)?;
    print_json(&record)
}

fn query(s: &str, purposes: &[u16], vendors: &[u16]) -> Result<(), Box<dyn Error>> {
    let record = ConsentRecord::from_str(s)?;

    let result = QueryResult {
        purposes: purposes
            .iter()
            .map(|&id| (id, record.is_purpose_allowed(id)))
            .collect(),
        vendors: vendors
            .iter()
            .map(|&id| (id, record.is_vendor_allowed(id)))
            .collect(),
    };

    print_json(&result)
}

fn encode(file: &str, padding: bool) -> Result<(), Box<dyn Error>> {
    let record: ConsentRecord = if file == "-" {
        serde_json::from_reader(io::stdin().lock())?
    } else {
        serde_json::from_reader(File::open(file)?)?
    };
    debug!(path = file, "read record");

    let padding = if padding {
        Padding::Padded
    } else {
        Padding::None
    };
    println!("{}", record.encode(padding)?);

    Ok(())
}

fn consent_all(max_vendor_id: u16, allowed: bool) -> Result<(), Box<dyn Error>> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis();
    let config = CmpConfig {
        default_max_vendor_id: max_vendor_id,
        ..CmpConfig::default()
    };

    let mut cmp = ConsentManager::new(config, MemoryStore::new());
    cmp.set_subject_to_gdpr(true)?;
    let outcome = cmp.consent_all(None, allowed, u64::try_from(now)?)?;
    debug!(%outcome, "consent flow finished");

    println!("{}", cmp.consent_string()?.ok_or("no consent string")?);

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!(
        "{}",
        serde_json::to_string_pretty(value)?
            .to_colored_json_with_styler(ColorMode::Auto(Output::StdOut), json_color_styler())?
    );

    Ok(())
}

fn json_color_styler() -> Styler {
    Styler {
        key: Color::Green.foreground(),
        string_value: Color::Blue.bold(),
        integer_value: Color::Magenta.bold(),
        float_value: Color::Magenta.italic(),
        object_brackets: Color::Yellow.bold(),
        array_brackets: Color::Cyan.bold(),
        ..Default::default()
    }
}
