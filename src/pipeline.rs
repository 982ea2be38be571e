//! Assembles one advisory record from one raw message.
//!
//! decode -> screen -> subject -> body sections -> description -> alias -> sink.
//! The first failing stage stops the run; failures are reported through the
//! notifier, whose own errors are logged and dropped.

use crate::alias::AliasSlugGenerator;
use crate::config::Config;
use crate::description::ShortDescriptionBuilder;
use crate::error::{PipelineError, SinkError};
use crate::message::MessageDecoder;
use crate::notify::Notifier;
use crate::record::{normalize_date, AdvisoryRecord};
use crate::sink::{AdvisorySink, StoredId};
use crate::vendor::{SkipReason, Vendor, VendorParser};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Inserted { record: AdvisoryRecord, id: StoredId },
    /// Built but not stored.
    DryRun(AdvisoryRecord),
    Skipped(SkipReason),
    /// The sink already holds this title; not an error.
    Duplicate { title: String, id: StoredId },
}

pub struct Pipeline<'a> {
    vendor: Vendor,
    parser: &'a dyn VendorParser,
    descriptions: ShortDescriptionBuilder,
    aliases: AliasSlugGenerator,
    notifier: &'a dyn Notifier,
    dry_run: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(vendor: Vendor, config: &Config, notifier: &'a dyn Notifier) -> Self {
        Self {
            vendor,
            parser: vendor.parser(),
            descriptions: ShortDescriptionBuilder::new(&config.short_description),
            aliases: AliasSlugGenerator::new(&config.alias),
            notifier,
            dry_run: false,
        }
    }

    pub fn with_alias_generator(mut self, aliases: AliasSlugGenerator) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    /// Builds the record without touching any sink.
    pub fn build_record(
        &self,
        raw: &[u8],
    ) -> Result<Result<AdvisoryRecord, SkipReason>, PipelineError> {
        let decoded =
            MessageDecoder::parse(raw).map_err(|e| self.fail("<unparseable message>", e))?;
        let subject = decoded.headers.subject.clone();

        if let Some(reason) = self.parser.screen(&subject) {
            log::info!("Skipping {} message ({}): {}", self.vendor, reason, subject);
            return Ok(Err(reason));
        }

        let subject_match = self
            .parser
            .normalize_subject(&subject)
            .map_err(|e| self.fail(&subject, e))?;

        let body = decoded.body().map_err(|e| self.fail(&subject_match.title, e))?;
        let sections = self
            .parser
            .extract_sections(&body)
            .map_err(|e| self.fail(&subject_match.title, e))?;
        let title = self.parser.compose_title(&subject_match, &sections);

        if sections.full_text.trim().is_empty() {
            return Err(self.fail(
                &format!("No advisory content: {title}"),
                PipelineError::EmptyAdvisoryContent {
                    what: "full text".to_string(),
                },
            ));
        }
        let short_description = self.descriptions.build(&sections.short_desc_lines);
        if short_description.is_empty() {
            return Err(self.fail(
                &title,
                PipelineError::EmptyAdvisoryContent {
                    what: "short description".to_string(),
                },
            ));
        }

        let alias = self.aliases.generate(&title);
        log::debug!("Title: {} alias: {}", title, alias);
        Ok(Ok(AdvisoryRecord {
            published_at: normalize_date(&decoded.headers.date),
            raw_date: decoded.headers.date.clone(),
            title,
            short_description,
            full_text: sections.full_text,
            vendor: self.vendor,
            alias,
        }))
    }

    pub fn process(
        &self,
        raw: &[u8],
        sink: &mut dyn AdvisorySink,
    ) -> Result<Outcome, PipelineError> {
        let record = match self.build_record(raw)? {
            Ok(record) => record,
            Err(reason) => return Ok(Outcome::Skipped(reason)),
        };

        if self.dry_run {
            log::info!("Dry run, not storing: {}", record.title);
            return Ok(Outcome::DryRun(record));
        }

        match sink.insert(&record) {
            Ok(id) => {
                log::info!("Successfully inserted: {}", record.title);
                if let Err(e) = self.notifier.notify_inserted(&record) {
                    log::error!("Failed to send insert report: {:#}", e);
                }
                Ok(Outcome::Inserted { record, id })
            }
            Err(SinkError::Duplicate { title, id }) => {
                log::warn!("{} title already exists: {}", self.vendor, id);
                let reason = format!("{} title already exists: {}", self.vendor, id);
                self.notify_failure(&title, Some(&reason));
                Ok(Outcome::Duplicate { title, id })
            }
            Err(e) => Err(self.fail(&record.title, PipelineError::Sink(e))),
        }
    }

    fn notify_failure(&self, subject: &str, reason: Option<&str>) {
        if let Err(e) = self.notifier.notify_failure(subject, self.vendor, reason) {
            log::error!("Failed to send failure notification: {:#}", e);
        }
    }

    fn fail(&self, subject: &str, err: PipelineError) -> PipelineError {
        log::error!("{} advisory failed: {}", self.vendor, err);
        self.notify_failure(subject, Some(&err.reason()));
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::FixedSuffix;
    use crate::config::AliasConfig;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingNotifier {
        failures: RefCell<Vec<(String, Vendor, Option<String>)>>,
        inserted: RefCell<Vec<String>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify_failure(
            &self,
            subject: &str,
            vendor: Vendor,
            reason: Option<&str>,
        ) -> anyhow::Result<()> {
            self.failures
                .borrow_mut()
                .push((subject.to_string(), vendor, reason.map(String::from)));
            Ok(())
        }

        fn notify_inserted(&self, record: &AdvisoryRecord) -> anyhow::Result<()> {
            self.inserted.borrow_mut().push(record.title.clone());
            Ok(())
        }
    }

    struct FailingNotifier;

    impl Notifier for FailingNotifier {
        fn notify_failure(&self, _: &str, _: Vendor, _: Option<&str>) -> anyhow::Result<()> {
            anyhow::bail!("mail relay down")
        }

        fn notify_inserted(&self, _: &AdvisoryRecord) -> anyhow::Result<()> {
            anyhow::bail!("mail relay down")
        }
    }

    #[derive(Default)]
    struct MemorySink {
        titles: Vec<String>,
    }

    impl AdvisorySink for MemorySink {
        fn insert(&mut self, record: &AdvisoryRecord) -> Result<StoredId, SinkError> {
            if let Some(pos) = self.titles.iter().position(|t| *t == record.title) {
                return Err(SinkError::Duplicate {
                    title: record.title.clone(),
                    id: pos as StoredId + 1,
                });
            }
            self.titles.push(record.title.clone());
            Ok(self.titles.len() as StoredId)
        }
    }

    fn pipeline<'a>(vendor: Vendor, notifier: &'a dyn Notifier) -> Pipeline<'a> {
        Pipeline::new(vendor, &Config::default(), notifier).with_alias_generator(
            AliasSlugGenerator::with_source(
                &AliasConfig::default(),
                Box::new(FixedSuffix("s3cr3tsuffix".to_string())),
            ),
        )
    }

    #[test]
    fn test_debian_advisory_end_to_end() {
        let notifier = RecordingNotifier::default();
        let mut sink = MemorySink::default();
        let outcome = pipeline(Vendor::Debian, &notifier)
            .process(include_bytes!("../testdata/debian_dsa.eml"), &mut sink)
            .unwrap();

        let (record, id) = match outcome {
            Outcome::Inserted { record, id } => (record, id),
            other => panic!("expected insert, got {other:?}"),
        };
        assert_eq!(id, 1);
        assert_eq!(record.title, "Debian: DSA-6059-1: thunderbird");
        assert_eq!(record.alias, "debian-dsa-6059-1-thunderbird-s3cr3tsuffix");
        assert!(record
            .short_description
            .starts_with("Multiple security issues were discovered in Thunderbird"));
        assert_eq!(record.published_at, "2025-11-20 18:14:55");
        assert_eq!(record.raw_date, "Thu, 20 Nov 2025 18:14:55 +0000");
        assert!(!record.full_text.contains("BEGIN PGP SIGNATURE"));
        assert_eq!(*notifier.inserted.borrow(), vec![record.title.clone()]);
        assert!(notifier.failures.borrow().is_empty());
    }

    #[test]
    fn test_bugfix_advisory_is_silently_skipped() {
        let notifier = RecordingNotifier::default();
        let mut sink = MemorySink::default();
        let outcome = pipeline(Vendor::Mageia, &notifier)
            .process(include_bytes!("../testdata/mageia_mgaa.eml"), &mut sink)
            .unwrap();
        assert_eq!(outcome, Outcome::Skipped(SkipReason::NotSecurityAdvisory));
        assert!(sink.titles.is_empty());
        assert!(notifier.failures.borrow().is_empty());
    }

    #[test]
    fn test_reply_is_skipped_before_body() {
        let notifier = RecordingNotifier::default();
        let mut sink = MemorySink::default();
        // The reply has an empty body, which would fail if it were decoded.
        let outcome = pipeline(Vendor::Debian, &notifier)
            .process(include_bytes!("../testdata/debian_reply.eml"), &mut sink)
            .unwrap();
        assert_eq!(outcome, Outcome::Skipped(SkipReason::Reply));
        assert!(notifier.failures.borrow().is_empty());
    }

    #[test]
    fn test_opensuse_bulleted_products() {
        let notifier = RecordingNotifier::default();
        let outcome = pipeline(Vendor::OpenSuse, &notifier)
            .dry_run(true)
            .process(
                include_bytes!("../testdata/opensuse_bulleted.eml"),
                &mut MemorySink::default(),
            )
            .unwrap();
        let record = match outcome {
            Outcome::DryRun(record) => record,
            other => panic!("expected dry run, got {other:?}"),
        };
        assert_eq!(record.title, "openSUSE: 2025:4132-1 important: kernel");
        assert_eq!(
            record.short_description,
            "An update that solves 41 vulnerabilities and has 8 security fixes can now be installed."
        );
        assert!(record.full_text.contains("CVSS:3.1/AV:L/AC:L/PR:L/UI:N/S:U/C:N/I:N/A:H"));
        assert!(notifier.inserted.borrow().is_empty());
    }

    #[test]
    fn test_opensuse_line_list_products() {
        let notifier = RecordingNotifier::default();
        let record = pipeline(Vendor::OpenSuse, &notifier)
            .build_record(include_bytes!("../testdata/opensuse_linelist.eml"))
            .unwrap()
            .unwrap();
        assert_eq!(record.title, "openSUSE: 2021:1234-1 moderate: curl");
        assert_eq!(
            record.short_description,
            "An update that fixes two vulnerabilities is now available."
        );
    }

    #[test]
    fn test_fedora_and_mageia_fixtures() {
        let notifier = RecordingNotifier::default();
        let fedora = pipeline(Vendor::Fedora, &notifier)
            .build_record(include_bytes!("../testdata/fedora_security.eml"))
            .unwrap()
            .unwrap();
        assert_eq!(fedora.title, "Fedora 43: chromium FEDORA-2025-4f1c2a9b1e");
        assert!(fedora.short_description.starts_with("Update to 142.0.7444.175 * CVE-2025-13223"));
        assert!(!fedora.full_text.contains("package-announce mailing list"));

        let mageia = pipeline(Vendor::Mageia, &notifier)
            .build_record(include_bytes!("../testdata/mageia_mgasa.eml"))
            .unwrap()
            .unwrap();
        assert_eq!(mageia.title, "Mageia 2025-0301: curl");
        assert_eq!(
            mageia.short_description,
            "MGASA-2025-0301 - Updated curl packages fix security vulnerability"
        );
        assert_eq!(mageia.published_at, "2025-11-12 09:00:00");
    }

    #[test]
    fn test_duplicate_title_is_soft_failure() {
        let notifier = RecordingNotifier::default();
        let mut sink = MemorySink::default();
        let raw = include_bytes!("../testdata/debian_dsa.eml");
        let p = pipeline(Vendor::Debian, &notifier);
        p.process(raw, &mut sink).unwrap();

        let outcome = p.process(raw, &mut sink).unwrap();
        assert_eq!(
            outcome,
            Outcome::Duplicate {
                title: "Debian: DSA-6059-1: thunderbird".to_string(),
                id: 1
            }
        );
        let failures = notifier.failures.borrow();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].2.as_deref(), Some("debian title already exists: 1"));
    }

    #[test]
    fn test_unrecognized_subject_notifies() {
        let notifier = RecordingNotifier::default();
        let raw = b"Subject: [SECURITY] something odd\n\nbody\n";
        let err = pipeline(Vendor::Debian, &notifier)
            .process(raw, &mut MemorySink::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnrecognizedSubject { .. }));
        assert_eq!(err.exit_code(false), 0);

        let failures = notifier.failures.borrow();
        assert_eq!(failures[0].0, "[SECURITY] something odd");
        assert_eq!(failures[0].1, Vendor::Debian);
    }

    #[test]
    fn test_empty_body_fails() {
        let notifier = RecordingNotifier::default();
        let raw = b"Subject: [SECURITY] [DSA 1-1] x - security update\n\n\n";
        let err = pipeline(Vendor::Debian, &notifier)
            .process(raw, &mut MemorySink::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyBody { .. }));
        assert_eq!(err.exit_code(false), 1);
        assert_eq!(notifier.failures.borrow()[0].0, "Debian: DSA-1-1: x");
    }

    #[test]
    fn test_missing_section_fails() {
        let notifier = RecordingNotifier::default();
        let raw = b"Subject: [SECURITY] [DSA 1-1] x - security update\n\nHash: SHA1\n\nno package block\n";
        let err = pipeline(Vendor::Debian, &notifier)
            .process(raw, &mut MemorySink::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::SectionNotFound { .. }));
        assert_eq!(notifier.failures.borrow().len(), 1);
    }

    #[test]
    fn test_notifier_errors_are_swallowed() {
        let mut sink = MemorySink::default();
        let outcome = pipeline(Vendor::Debian, &FailingNotifier)
            .process(include_bytes!("../testdata/debian_dsa.eml"), &mut sink)
            .unwrap();
        assert!(matches!(outcome, Outcome::Inserted { .. }));

        let err = pipeline(Vendor::Debian, &FailingNotifier)
            .process(b"Subject: [SECURITY] odd\n\nx\n", &mut sink)
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnrecognizedSubject { .. }));
    }
}
