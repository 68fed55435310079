use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity levels for activity logs. Controls retention policies and log
/// filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Critical events: long-term retention, never auto-delete
    Critical,
    /// Important events: medium-term retention (default)
    Important,
    /// Noise events: aggressively trimmed
    Noise,
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Important
    }
}

/// Trait for entities that can be logged in the activity log. Implement on
/// any model to enable declarative activity logging.
pub trait Loggable: Serialize + Send + Sync {
    /// The entity type name (e.g., "page", "role_grant"); becomes the prefix
    /// in event names like "page.created".
    fn entity_type() -> &'static str;

    /// The subject id, if the record has a single one. Bulk grant
    /// replacements span a whole role and carry none.
    fn subject_id(&self) -> Option<Uuid>;

    /// Severity level for logs (defaults to Important)
    fn severity(&self) -> Severity {
        Severity::Important
    }

    /// Override severity based on action (deactivations are always kept)
    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "deleted" | "deactivated" => Severity::Critical,
            _ => self.severity(),
        }
    }
}
