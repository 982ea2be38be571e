//! Operator notifications about inserted and failed advisories.

use crate::config::NotificationConfig;
use crate::record::AdvisoryRecord;
use crate::vendor::Vendor;
use anyhow::Context;
use std::io::Write;
use std::process::{Command, Stdio};

const SIGNATURE: &str = "-- Automatic Advisory Inserter";

pub trait Notifier {
    fn notify_failure(&self, subject: &str, vendor: Vendor, reason: Option<&str>)
        -> anyhow::Result<()>;

    fn notify_inserted(&self, record: &AdvisoryRecord) -> anyhow::Result<()>;
}

pub fn failure_message(
    config: &NotificationConfig,
    subject: &str,
    vendor: Vendor,
    reason: Option<&str>,
) -> String {
    let details = reason
        .map(|r| format!("\nError/Reason:\n{r}\n"))
        .unwrap_or_default();
    format!(
        "X-Script-Name: <{script}>\n\
         From: {from}\n\
         To: {to}\n\
         Subject: {vendor} Advisory insert failed\n\
         \n\
         The following advisory failed to be inserted.\n\
         \n\
         subject: {subject}\n\
         {details}\n\
         {SIGNATURE}\n",
        script = config.script_name,
        from = config.from,
        to = config.failure_recipient,
        vendor = vendor.display_name(),
    )
}

pub fn inserted_message(config: &NotificationConfig, record: &AdvisoryRecord) -> String {
    format!(
        "X-Script-Name: <{script}>\n\
         From: {from}\n\
         To: {to}\n\
         Subject: Automatically Inserted Advisory for {vendor}\n\
         \n\
         The following advisory has been inserted into the database.\n\
         Please check the advisory and publish.\n\
         \n\
         -Title: {title}\n\
         \n\
         -Short Description:\n\
         {intro}\n\
         \n\
         -Full Text:\n\
         {full}\n\
         \n\
         {SIGNATURE}\n",
        script = config.script_name,
        from = config.from,
        to = config.report_recipient,
        vendor = record.vendor,
        title = record.title,
        intro = record.short_description,
        full = record.full_text,
    )
}

/// Pipes RFC 822 messages into `sendmail -odb -t`.
pub struct SendmailNotifier {
    config: NotificationConfig,
}

impl SendmailNotifier {
    pub fn new(config: NotificationConfig) -> Self {
        Self { config }
    }

    fn send(&self, message: &str) -> anyhow::Result<()> {
        let mut child = Command::new(&self.config.sendmail_path)
            .args(["-odb", "-t"])
            .stdin(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to start {}", self.config.sendmail_path))?;
        if let Some(ref mut stdin) = child.stdin {
            stdin.write_all(message.as_bytes())?;
        }
        // Close stdin so sendmail sees end of message.
        drop(child.stdin.take());
        let status = child.wait()?;
        if !status.success() {
            anyhow::bail!("{} exited with {}", self.config.sendmail_path, status);
        }
        Ok(())
    }
}

impl Notifier for SendmailNotifier {
    fn notify_failure(
        &self,
        subject: &str,
        vendor: Vendor,
        reason: Option<&str>,
    ) -> anyhow::Result<()> {
        self.send(&failure_message(&self.config, subject, vendor, reason))
    }

    fn notify_inserted(&self, record: &AdvisoryRecord) -> anyhow::Result<()> {
        self.send(&inserted_message(&self.config, record))
    }
}

/// Used when mail notifications are disabled.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_failure(
        &self,
        subject: &str,
        vendor: Vendor,
        reason: Option<&str>,
    ) -> anyhow::Result<()> {
        log::warn!(
            "{} advisory insert failed: {} ({})",
            vendor.display_name(),
            subject,
            reason.unwrap_or("no reason given")
        );
        Ok(())
    }

    fn notify_inserted(&self, record: &AdvisoryRecord) -> anyhow::Result<()> {
        log::info!("Inserted {} advisory: {}", record.vendor, record.title);
        Ok(())
    }
}

pub fn notifier_from_config(config: &NotificationConfig) -> Box<dyn Notifier> {
    if config.enabled {
        Box::new(SendmailNotifier::new(config.clone()))
    } else {
        Box::new(LogNotifier)
    }
}
