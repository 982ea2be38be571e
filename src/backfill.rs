//! Re-derives missing short descriptions from the full text of stored advisories.

use crate::description::ShortDescriptionBuilder;
use crate::error::{PipelineError, SinkError};
use crate::extract::{ContentStart, LineExtractor, SectionMarkers, Sections};
use crate::sink::{JsonlStore, StoredAdvisory, StoredId};
use crate::vendor::{BodyLayout, Vendor, VendorParser};
use regex::Regex;

lazy_static::lazy_static! {
    static ref TAG: Regex = Regex::new(r"<[^>]+>").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackfillOptions {
    pub vendor: Vendor,
    /// Only these records, in ascending id order. Empty means "all candidates".
    pub ids: Vec<StoredId>,
    /// Newest-first cap when no ids are given.
    pub limit: Option<usize>,
    /// Report what would change without writing.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub found: Vec<StoredId>,
    /// Requested ids that do not exist or already have a description.
    pub missing: Vec<StoredId>,
    pub updated: Vec<(StoredId, String)>,
    pub no_description: Vec<StoredId>,
}

/// Removes markup added when the advisory was stored.
pub fn strip_html(text: &str) -> String {
    TAG.replace_all(text, "")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Stored full text already starts at the advisory content, so line layouts
/// begin collecting immediately instead of waiting for their content marker.
pub fn extract_stored(vendor: Vendor, content: &str) -> Result<Sections, PipelineError> {
    let parser = vendor.parser();
    match &parser.body {
        BodyLayout::Lines(markers) => {
            let markers = SectionMarkers {
                content_start: ContentStart::Immediate,
                ..markers.clone()
            };
            LineExtractor::new(&markers).extract(content)
        }
        BodyLayout::AffectedProducts => parser.extract_sections(content),
    }
}

fn is_candidate(record: &StoredAdvisory, vendor: Vendor) -> bool {
    record.vendor == vendor
        && record.introtext.trim().is_empty()
        && !record.fulltext.trim().is_empty()
}

pub fn select_candidates<'r>(
    records: &'r [StoredAdvisory],
    options: &BackfillOptions,
) -> (Vec<&'r StoredAdvisory>, Vec<StoredId>) {
    let mut candidates: Vec<&StoredAdvisory> = records
        .iter()
        .filter(|r| is_candidate(r, options.vendor))
        .collect();

    if !options.ids.is_empty() {
        candidates.retain(|r| options.ids.contains(&r.id));
        candidates.sort_by_key(|r| r.id);
        let missing = options
            .ids
            .iter()
            .copied()
            .filter(|id| !candidates.iter().any(|r| r.id == *id))
            .collect();
        return (candidates, missing);
    }

    candidates.sort_by(|a, b| b.created.cmp(&a.created).then(b.id.cmp(&a.id)));
    if let Some(limit) = options.limit {
        candidates.truncate(limit);
    }
    (candidates, Vec::new())
}

pub fn run(
    store: &mut JsonlStore,
    descriptions: &ShortDescriptionBuilder,
    options: &BackfillOptions,
) -> Result<BackfillReport, SinkError> {
    let records = store.load()?;
    let (candidates, missing) = select_candidates(&records, options);

    let mut report = BackfillReport {
        found: candidates.iter().map(|r| r.id).collect(),
        missing,
        ..Default::default()
    };
    log::info!(
        "Found {} {} records with missing introtext",
        report.found.len(),
        options.vendor
    );

    let mut updates = Vec::new();
    for record in candidates {
        let content = strip_html(&record.fulltext);
        let lines = match extract_stored(options.vendor, &content) {
            Ok(sections) => sections.short_desc_lines,
            Err(e) => {
                log::debug!("Record {}: {}", record.id, e);
                Vec::new()
            }
        };
        if lines.iter().all(|l| l.trim().is_empty()) {
            log::info!("Record {} - no introtext pattern found in: {}", record.id, record.title);
            report.no_description.push(record.id);
            continue;
        }
        updates.push((record.id, descriptions.build(&lines)));
    }

    for (id, introtext) in &updates {
        if options.dry_run {
            log::info!("Would update record {}: {}", id, introtext);
        } else {
            store.update_introtext(*id, introtext)?;
        }
    }
    report.updated = updates;
    Ok(report)
}
