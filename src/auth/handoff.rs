use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Handoff file name in the data directory
const HANDOFF_FILE: &str = "pending_verification.json";

/// The email waiting on passcode verification, written when a code is
/// requested and read back when the verification screen initializes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingVerification {
    pub email: String,
    pub requested_at: DateTime<Utc>,
}

/// Durable slot passing the target email between the request-a-code step and
/// the verification step. The slot survives a restart in between; it is
/// cleared only when verification succeeds.
#[derive(Debug, Clone)]
pub struct HandoffSlot {
    data_dir: PathBuf,
}

impl HandoffSlot {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Record the email a code was just sent to
    pub fn write(&self, email: &str) -> Result<()> {
        let pending = PendingVerification {
            email: email.to_string(),
            requested_at: Utc::now(),
        };
        std::fs::create_dir_all(&self.data_dir)?;
        let contents = serde_json::to_string_pretty(&pending)?;
        std::fs::write(self.path(), contents).context("Failed to write handoff file")?;
        Ok(())
    }

    /// Read the pending email, if any. Reading does not clear the slot.
    pub fn read(&self) -> Option<PendingVerification> {
        let path = self.path();
        if !path.exists() {
            return None;
        }
        match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(pending) => Some(pending),
                Err(e) => {
                    debug!(error = %e, "Failed to parse handoff file");
                    None
                }
            },
            Err(e) => {
                debug!(error = %e, "Failed to read handoff file");
                None
            }
        }
    }

    /// Remove the slot; called on verification success only
    pub fn clear(&self) -> Result<()> {
        let path = self.path();
        if path.exists() {
            std::fs::remove_file(path).context("Failed to remove handoff file")?;
        }
        Ok(())
    }

    fn path(&self) -> PathBuf {
        self.data_dir.join(HANDOFF_FILE)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(name: &str) -> HandoffSlot {
        let dir = std::env::temp_dir().join(format!("studyhall-handoff-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        HandoffSlot::new(dir)
    }

    #[test]
    fn test_write_then_read() {
        let slot = slot("write-read");
        slot.write("a@b.com").expect("write");

        let pending = slot.read().expect("pending entry");
        assert_eq!(pending.email, "a@b.com");
    }

    #[test]
    fn test_read_does_not_clear() {
        let slot = slot("read-twice");
        slot.write("a@b.com").expect("write");

        assert!(slot.read().is_some());
        assert!(slot.read().is_some());
    }

    #[test]
    fn test_clear_removes_entry() {
        let slot = slot("clear");
        slot.write("a@b.com").expect("write");
        slot.clear().expect("clear");
        assert!(slot.read().is_none());

        // Clearing an already-empty slot is fine
        slot.clear().expect("clear again");
    }

    #[test]
    fn test_empty_slot_reads_none() {
        let slot = slot("empty");
        assert!(slot.read().is_none());
    }

    #[test]
    fn test_rewrite_replaces_email() {
        let slot = slot("rewrite");
        slot.write("first@b.com").expect("write");
        slot.write("second@b.com").expect("rewrite");
        assert_eq!(slot.read().expect("entry").email, "second@b.com");
    }
}
