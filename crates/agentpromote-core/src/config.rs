//! Promoter configuration
//!
//! Loaded from a JSON file, with environment-variable overrides for the
//! values that were environment-driven in deployments of this tool
//! (project ids, bucket name, access token). Credential *acquisition* is
//! out of scope; the access token is handed in.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::environment::{Environment, EnvironmentSet, DEV_NAME, PROD_NAME, TEST_NAME};

/// Per-environment settings as they appear in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Cloud project the agent lives in
    pub project_id: String,

    /// Webhook URL the agent calls at runtime
    pub webhook_url: String,
}

/// Full promoter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoteConfig {
    /// Object-storage bucket used for export blobs
    pub bucket: String,

    /// Working directory for per-run trees, staging and history
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// OAuth bearer token used for the remote service APIs
    #[serde(default)]
    pub access_token: String,

    /// Dev environment settings
    pub dev: EnvironmentConfig,

    /// Test environment settings
    pub test: EnvironmentConfig,

    /// Prod environment settings
    pub prod: EnvironmentConfig,
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("tmp")
}

impl PromoteConfig {
    /// Load configuration from a JSON file, then apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let mut config: PromoteConfig = serde_json::from_str(&content)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Override file values from the process environment where set
    ///
    /// Recognised variables: `DEV_AGENT_PROJECT_ID`, `TEST_AGENT_PROJECT_ID`,
    /// `GCLOUD_PROJECT` (prod), `GCLOUD_STORAGE_BUCKET_NAME` and
    /// `GOOGLE_ACCESS_TOKEN`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("DEV_AGENT_PROJECT_ID") {
            self.dev.project_id = v;
        }
        if let Ok(v) = env::var("TEST_AGENT_PROJECT_ID") {
            self.test.project_id = v;
        }
        if let Ok(v) = env::var("GCLOUD_PROJECT") {
            self.prod.project_id = v;
        }
        if let Ok(v) = env::var("GCLOUD_STORAGE_BUCKET_NAME") {
            self.bucket = v;
        }
        if let Ok(v) = env::var("GOOGLE_ACCESS_TOKEN") {
            self.access_token = v;
        }
    }

    /// Build the environment set this configuration describes
    pub fn environments(&self) -> EnvironmentSet {
        EnvironmentSet {
            dev: Environment::new(DEV_NAME, &self.dev.project_id, &self.dev.webhook_url),
            test: Environment::new(TEST_NAME, &self.test.project_id, &self.test.webhook_url),
            prod: Environment::new(PROD_NAME, &self.prod.project_id, &self.prod.webhook_url),
        }
    }
}
