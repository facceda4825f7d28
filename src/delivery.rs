use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::info;

use crate::error::DeliveryError;

/// Hands a finished report to whatever sends it on.
pub trait Dispatcher {
    fn dispatch(
        &self,
        artifact: &Path,
        recipients: &[String],
        subject: &str,
    ) -> Result<(), DeliveryError>;
}

#[derive(Debug, Serialize)]
struct DispatchManifest<'a> {
    subject: &'a str,
    recipients: &'a [String],
    attachment: PathBuf,
    generated_at: NaiveDateTime,
}

/// Queues a JSON manifest per report in a directory the mailer polls.
#[derive(Debug, Clone)]
pub struct OutboxDispatcher {
    outbox: PathBuf,
}

impl OutboxDispatcher {
    pub fn new(outbox: impl Into<PathBuf>) -> Self {
        Self {
            outbox: outbox.into(),
        }
    }

    fn manifest_path(&self, artifact: &Path) -> PathBuf {
        let stem = artifact
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("report");
        self.outbox.join(format!("{stem}.json"))
    }
}

impl Dispatcher for OutboxDispatcher {
    fn dispatch(
        &self,
        artifact: &Path,
        recipients: &[String],
        subject: &str,
    ) -> Result<(), DeliveryError> {
        if recipients.is_empty() {
            return Err(DeliveryError::NoRecipients);
        }

        let outbox_err = |source: std::io::Error| DeliveryError::Outbox {
            path: self.outbox.clone(),
            source,
        };

        let attachment = artifact.canonicalize().map_err(outbox_err)?;
        let manifest = DispatchManifest {
            subject,
            recipients,
            attachment,
            generated_at: Utc::now().naive_utc(),
        };
        let body = serde_json::to_vec_pretty(&manifest)?;

        std::fs::create_dir_all(&self.outbox).map_err(outbox_err)?;
        let target = self.manifest_path(artifact);
        let mut file = NamedTempFile::new_in(&self.outbox).map_err(outbox_err)?;
        file.write_all(&body).map_err(outbox_err)?;
        file.persist(&target).map_err(|err| outbox_err(err.error))?;

        info!(
            manifest = %target.display(),
            recipients = recipients.len(),
            "report queued for delivery"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_lists_recipients_and_attachment() {
        let dir = tempfile::tempdir().expect("tempdir");
        let artifact = dir.path().join("report_2026-03-01_to_2026-03-07.csv");
        std::fs::write(&artifact, "Overall\n").expect("artifact written");
        let outbox = dir.path().join("outbox");

        let recipients = vec!["ops@example.org".to_string(), "field@example.org".to_string()];
        OutboxDispatcher::new(&outbox)
            .dispatch(&artifact, &recipients, "Weekly field report")
            .expect("dispatch succeeds");

        let raw = std::fs::read_to_string(outbox.join("report_2026-03-01_to_2026-03-07.json"))
            .expect("manifest exists");
        let manifest: serde_json::Value = serde_json::from_str(&raw).expect("valid json");
        assert_eq!(manifest["subject"], "Weekly field report");
        assert_eq!(manifest["recipients"][1], "field@example.org");
        assert!(manifest["attachment"]
            .as_str()
            .expect("attachment path")
            .ends_with("report_2026-03-01_to_2026-03-07.csv"));
    }

    #[test]
    fn empty_recipient_list_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let artifact = dir.path().join("report.csv");
        std::fs::write(&artifact, "Overall\n").expect("artifact written");

        let result =
            OutboxDispatcher::new(dir.path().join("outbox")).dispatch(&artifact, &[], "x");
        assert!(matches!(result, Err(DeliveryError::NoRecipients)));
        assert!(!dir.path().join("outbox").exists());
    }
}
