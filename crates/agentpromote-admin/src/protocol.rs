//! Wire protocol of the operator socket
//!
//! One JSON object per line in both directions. Requests carry a named
//! command; responses are named events with a payload, matching the
//! vocabulary the admin front-end speaks.

use agentpromote_core::diff::ChangeSummary;
use serde::Serialize;

/// A parsed operator command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Promote the dev agent into test
    DeployDevToTest,
    /// Promote the test agent into prod
    DeployTestToProduction,
    /// Restore prod from the last promotion snapshot
    Rollback,
    /// Preview the dev/test diff without promoting
    RunDiff,
    /// A known-but-unsupported command (the intent-testing commands live
    /// in a different subsystem)
    Unsupported(String),
    /// Anything that did not parse as a command
    Invalid(String),
}

impl Command {
    /// Parse one request line
    pub fn parse(line: &str) -> Command {
        let value: serde_json::Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => return Command::Invalid(e.to_string()),
        };
        let Some(name) = value.get("command").and_then(|c| c.as_str()) else {
            return Command::Invalid("missing \"command\" field".to_string());
        };
        match name {
            "deployDevToTest" => Command::DeployDevToTest,
            "deployTestToProduction" => Command::DeployTestToProduction,
            "rollback" => Command::Rollback,
            "runDiff" => Command::RunDiff,
            other => Command::Unsupported(other.to_string()),
        }
    }
}

/// An event pushed back to the operator
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload")]
pub enum Event {
    /// Diff preview result
    #[serde(rename = "acceptanceOutput")]
    AcceptanceOutput {
        /// One row per selected change
        items: Vec<ChangeSummary>,
    },

    /// A promotion began
    #[serde(rename = "promotionStarted")]
    PromotionStarted {
        /// Source environment name
        from: String,
        /// Destination environment name
        to: String,
    },

    /// A promotion finished successfully
    #[serde(rename = "promotionFinished")]
    PromotionFinished {
        /// Source environment name
        from: String,
        /// Destination environment name
        to: String,
        /// Run identifier of the promotion
        run_id: String,
        /// Number of changed files the bundle carried
        changed_files: usize,
    },

    /// Something went wrong
    #[serde(rename = "systemerror")]
    SystemError {
        /// Error category (failing stage, "unsupported", "protocol", ...)
        #[serde(rename = "type")]
        kind: String,
        /// Human-readable message
        message: String,
    },
}

impl Event {
    /// Error event out of a promotion failure, categorised by stage
    pub fn from_promotion_error(err: &agentpromote_core::promote::PromotionError) -> Event {
        let kind = err
            .stage()
            .and_then(|s| serde_json::to_value(s).ok())
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "promotion".to_string());
        Event::SystemError {
            kind,
            message: err.to_string(),
        }
    }
}
