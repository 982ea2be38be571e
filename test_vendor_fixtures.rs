use advisory_ingest::notify::LogNotifier;
use advisory_ingest::sink::JsonlStore;
use advisory_ingest::{Config, Outcome, Pipeline, Vendor};
use std::fs;

const FIXTURES: [(&str, Vendor); 7] = [
    ("testdata/debian_dsa.eml", Vendor::Debian),
    ("testdata/debian_reply.eml", Vendor::Debian),
    ("testdata/fedora_security.eml", Vendor::Fedora),
    ("testdata/mageia_mgasa.eml", Vendor::Mageia),
    ("testdata/mageia_mgaa.eml", Vendor::Mageia),
    ("testdata/opensuse_bulleted.eml", Vendor::OpenSuse),
    ("testdata/opensuse_linelist.eml", Vendor::OpenSuse),
];

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = Config::default();
    let notifier = LogNotifier;
    // Dry-run pipelines never write, the store only satisfies the signature.
    let mut store = JsonlStore::open(std::env::temp_dir().join("advisory-fixtures.jsonl"));

    for (path, vendor) in FIXTURES {
        println!("Fixture: {path} ({vendor})");
        let raw = fs::read(path)?;
        let pipeline = Pipeline::new(vendor, &config, &notifier).dry_run(true);

        match pipeline.process(&raw, &mut store) {
            Ok(Outcome::DryRun(record)) => {
                println!("  Title: {}", record.title);
                println!("  Alias: {}", record.alias);
                println!("  Date: {}", record.published_at);
                println!("  Short description: {}", record.short_description);
            }
            Ok(Outcome::Skipped(reason)) => println!("  Skipped: {reason}"),
            Ok(other) => println!("  Unexpected outcome: {other:?}"),
            Err(e) => println!("  Error: {e}"),
        }
        println!();
    }

    Ok(())
}
