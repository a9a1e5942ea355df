//! Environment descriptors
//!
//! Static records describing the dev, test and prod agent environments.
//! These are immutable after construction; every other component consumes
//! them by reference.

use serde::{Deserialize, Serialize};

/// Canonical name of the dev environment's local tree
pub const DEV_NAME: &str = "devAgent";
/// Canonical name of the test environment's local tree
pub const TEST_NAME: &str = "testAgent";
/// Canonical name of the prod environment's local tree
pub const PROD_NAME: &str = "prodAgent";

/// One agent environment (dev, test or prod)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Environment name, also used as the local directory name for its
    /// unpacked configuration tree
    pub name: String,

    /// Cloud project the agent lives in
    pub project_id: String,

    /// Webhook URL the agent calls at runtime
    pub webhook_url: String,
}

impl Environment {
    /// Create a new environment descriptor
    pub fn new(
        name: impl Into<String>,
        project_id: impl Into<String>,
        webhook_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            project_id: project_id.into(),
            webhook_url: webhook_url.into(),
        }
    }

    /// Resource path of the agent's parent project (`projects/{id}`)
    pub fn project_path(&self) -> String {
        format!("projects/{}", self.project_id)
    }
}

/// The fixed set of environments a promoter operates on
#[derive(Debug, Clone)]
pub struct EnvironmentSet {
    /// Development environment
    pub dev: Environment,
    /// Test (acceptance) environment
    pub test: Environment,
    /// Production environment
    pub prod: Environment,
}

impl EnvironmentSet {
    /// Look up an environment by name
    pub fn by_name(&self, name: &str) -> Option<&Environment> {
        [&self.dev, &self.test, &self.prod]
            .into_iter()
            .find(|e| e.name == name)
    }
}
