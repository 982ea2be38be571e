use advisory_ingest::backfill::{self, BackfillOptions};
use advisory_ingest::config::DEFAULT_CONFIG_PATH;
use advisory_ingest::description::ShortDescriptionBuilder;
use advisory_ingest::notify::notifier_from_config;
use advisory_ingest::sink::{JsonlStore, StoredId};
use advisory_ingest::{AdvisoryRecord, Config, Outcome, Pipeline, Vendor};
use anyhow::Context;
use clap::{Arg, ArgAction, Command};
use log::LevelFilter;
use std::io::Read;
use std::process;

fn main() {
    let matches = Command::new("advisory-ingest")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Turns vendor security-advisory emails into normalized advisory records")
        .arg(
            Arg::new("vendor")
                .long("vendor")
                .value_name("VENDOR")
                .help("Advisory source: debian, fedora, mageia or opensuse")
                .required_unless_present("generate-config")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value(DEFAULT_CONFIG_PATH),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("test")
                .long("test")
                .help("Parse and print the advisory without storing it")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("With --test, print the parsed record as JSON")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("strict")
                .long("strict")
                .help("Exit non-zero when the subject matches no known pattern")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("update-missing")
                .long("update-missing")
                .help("Re-derive short descriptions for stored advisories that lack one")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("limit")
                .long("limit")
                .value_name("N")
                .help("Maximum number of records to update (newest first)")
                .value_parser(clap::value_parser!(usize))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("ids")
                .long("ids")
                .value_name("ID,ID,...")
                .help("Comma-separated record ids to update")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("EMAIL_FILE")
                .help("Advisory email to ingest (reads stdin when omitted)")
                .index(1),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let vendor: Vendor = match matches
        .get_one::<String>("vendor")
        .map(|v| v.parse())
        .transpose()
    {
        Ok(Some(vendor)) => vendor,
        Ok(None) => {
            eprintln!("--vendor is required");
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG_PATH);
    let config = match Config::load_or_default(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e:#}");
            process::exit(1);
        }
    };

    let dry_run = matches.get_flag("test");

    if matches.get_flag("update-missing") {
        let ids = match matches.get_one::<String>("ids").map(|s| parse_ids(s)) {
            Some(Ok(ids)) => ids,
            Some(Err(e)) => {
                eprintln!("Error: {e:#}");
                process::exit(1);
            }
            None => Vec::new(),
        };
        let options = BackfillOptions {
            vendor,
            ids,
            limit: matches.get_one::<usize>("limit").copied(),
            dry_run,
        };
        process::exit(update_missing(&config, &options));
    }

    let raw = match read_input(matches.get_one::<String>("EMAIL_FILE")) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("Error reading advisory email: {e:#}");
            process::exit(1);
        }
    };

    let notifier = notifier_from_config(&config.notifications);
    let pipeline = Pipeline::new(vendor, &config, notifier.as_ref()).dry_run(dry_run);
    let mut store = JsonlStore::open(&config.store_path);

    match pipeline.process(&raw, &mut store) {
        Ok(Outcome::DryRun(record)) => {
            if matches.get_flag("json") {
                match serde_json::to_string_pretty(&record) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("Error serializing record: {e}");
                        process::exit(1);
                    }
                }
            } else {
                print_record(&raw, &record);
            }
        }
        Ok(Outcome::Inserted { record, id }) => {
            println!("Inserted {} as id {}", record.title, id);
        }
        Ok(Outcome::Skipped(reason)) => {
            log::info!("Nothing to do: {}", reason);
        }
        Ok(Outcome::Duplicate { title, id }) => {
            println!("Already stored as id {id}: {title}");
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(e.exit_code(matches.get_flag("strict")));
        }
    }
}

fn generate_default_config(path: &str) {
    let config = Config::default();
    match config.to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Please edit the configuration file to suit your needs.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e:#}");
            process::exit(1);
        }
    }
}

fn read_input(path: Option<&String>) -> anyhow::Result<Vec<u8>> {
    match path {
        Some(path) => std::fs::read(path).with_context(|| format!("Failed to read {path}")),
        None => {
            let mut raw = Vec::new();
            std::io::stdin()
                .read_to_end(&mut raw)
                .context("Failed to read standard input")?;
            Ok(raw)
        }
    }
}

fn parse_ids(list: &str) -> anyhow::Result<Vec<StoredId>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<StoredId>()
                .with_context(|| format!("Invalid record id '{s}'"))
        })
        .collect()
}

fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn print_record(raw: &[u8], record: &AdvisoryRecord) {
    let original_subject = advisory_ingest::message::MessageDecoder::parse(raw)
        .map(|m| m.headers.subject)
        .unwrap_or_default();

    println!("=== TEST MODE ===");
    println!("Original subject: {}", original_subject);
    println!("Title: {}", record.title);
    println!("Alias: {}", record.alias);
    println!("Vendor: {}", record.vendor);
    println!("Date: {} ({})", record.published_at, record.raw_date);
    println!(
        "Short description ({} chars): {}",
        record.short_description.chars().count(),
        record.short_description
    );
    println!();
    println!("Full text (first 500 chars):");
    println!("{}", truncate_chars(&record.full_text, 500));
}

fn update_missing(config: &Config, options: &BackfillOptions) -> i32 {
    let mut store = JsonlStore::open(&config.store_path);
    let builder = ShortDescriptionBuilder::new(&config.short_description);

    let report = match backfill::run(&mut store, &builder, options) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error updating {}: {e}", store.path().display());
            return 1;
        }
    };

    if !options.ids.is_empty() {
        println!("Found {} of {} requested records", report.found.len(), options.ids.len());
        if !report.missing.is_empty() {
            let missing: Vec<String> = report.missing.iter().map(|id| id.to_string()).collect();
            println!("Missing or already populated: {}", missing.join(", "));
        }
    } else {
        println!(
            "Found {} {} records with missing short description",
            report.found.len(),
            options.vendor
        );
    }

    for (id, introtext) in &report.updated {
        println!("ID {}: {}", id, introtext);
    }
    for id in &report.no_description {
        println!("ID {}: no introtext pattern found", id);
    }

    let verb = if options.dry_run { "Would update" } else { "Updated" };
    println!("{} {} records", verb, report.updated.len());
    0
}
