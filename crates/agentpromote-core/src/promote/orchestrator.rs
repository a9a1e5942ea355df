//! The promotion orchestrator

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use super::history::{PromotionHistory, PromotionRecord};
use super::{PromotionError, PromotionState, Stage};
use crate::bundle::{Assembler, ExportedBundle, Exporter, Importer};
use crate::config::PromoteConfig;
use crate::diff::{self, ChangeSet};
use crate::environment::{Environment, EnvironmentSet};
use crate::remote::{AgentService, BlobStore, CloudStorageClient, DialogflowClient};

/// File name of the assembled bundle inside a run directory
const BUNDLE_NAME: &str = "bundle.zip";

/// Outcome of a completed promotion
#[derive(Debug, Clone)]
pub struct PromotionReport {
    /// Run identifier, also the name of the run's working directory
    pub run_id: Uuid,
    /// Source environment name
    pub from: String,
    /// Destination environment name
    pub to: String,
    /// Number of changed files the bundle carried (manifest excluded)
    pub changed_files: usize,
    /// Bundle that was imported
    pub archive: PathBuf,
    /// Final state, always `Done` for a returned report
    pub state: PromotionState,
}

/// Sequences export → export → diff → assemble → import for one
/// (source, destination) environment pair
///
/// Each promotion gets its own working directory under
/// `{work_dir}/runs/{run_id}`, so concurrent promotions to *different*
/// destinations cannot corrupt each other. Promotions to the *same*
/// destination are mutually exclusive: a second request is rejected while
/// one is in flight.
pub struct Promoter {
    envs: EnvironmentSet,
    exporter: Exporter,
    importer: Importer,
    work_dir: PathBuf,
    history: Mutex<PromotionHistory>,
    in_flight: Mutex<HashSet<String>>,
    /// Latest unpacked export tree per environment, for diff previews
    latest_exports: Mutex<HashMap<String, PathBuf>>,
}

impl Promoter {
    /// Create a promoter over explicit remote collaborators
    pub fn new(
        envs: EnvironmentSet,
        agents: Arc<dyn AgentService>,
        store: Arc<dyn BlobStore>,
        bucket: impl Into<String>,
        work_dir: impl Into<PathBuf>,
    ) -> std::io::Result<Self> {
        let work_dir = work_dir.into();
        let history = PromotionHistory::load_or_new(work_dir.join("history/history.json"))?;
        Ok(Self {
            envs,
            exporter: Exporter::new(agents.clone(), store, bucket),
            importer: Importer::new(agents),
            work_dir,
            history: Mutex::new(history),
            in_flight: Mutex::new(HashSet::new()),
            latest_exports: Mutex::new(HashMap::new()),
        })
    }

    /// Create a promoter backed by the HTTP clients the config describes
    pub fn from_config(config: &PromoteConfig) -> std::io::Result<Self> {
        let agents: Arc<dyn AgentService> =
            Arc::new(DialogflowClient::new(&config.access_token));
        let store: Arc<dyn BlobStore> = Arc::new(CloudStorageClient::new(
            &config.access_token,
            &config.prod.project_id,
        ));
        Self::new(
            config.environments(),
            agents,
            store,
            &config.bucket,
            &config.work_dir,
        )
    }

    /// The environments this promoter operates on
    pub fn environments(&self) -> &EnvironmentSet {
        &self.envs
    }

    /// Promote the dev agent into the test environment
    pub async fn deploy_dev_to_test(&self) -> Result<PromotionReport, PromotionError> {
        let (from, to) = (self.envs.dev.clone(), self.envs.test.clone());
        self.promote(&from, &to).await
    }

    /// Promote the test agent into the prod environment
    pub async fn deploy_test_to_production(&self) -> Result<PromotionReport, PromotionError> {
        let (from, to) = (self.envs.test.clone(), self.envs.prod.clone());
        self.promote(&from, &to).await
    }

    /// Restore prod to the state captured just before its last promotion
    pub async fn rollback(&self) -> Result<PromotionReport, PromotionError> {
        let prod = self.envs.prod.clone();
        let snapshot = {
            let history = self.history.lock().expect("history lock poisoned");
            history
                .last_restorable(&prod.name)
                .and_then(|r| r.snapshot.clone())
        };
        let Some(snapshot) = snapshot else {
            return Err(PromotionError::NothingToRollBack {
                destination: prod.name.clone(),
            });
        };

        let _guard = self.claim(&prod)?;
        let run_id = Uuid::new_v4();
        tracing::info!(run = %run_id, snapshot = %snapshot.display(), "rolling back prod");

        self.importer
            .import_bundle(&snapshot, &prod)
            .await
            .map_err(|source| PromotionError::Import {
                environment: prod.name.clone(),
                source,
            })?;

        self.record(PromotionRecord {
            run_id,
            from: prod.name.clone(),
            to: prod.name.clone(),
            archive: snapshot.clone(),
            snapshot: None,
            timestamp: chrono::Utc::now(),
            rollback: true,
        })?;

        Ok(PromotionReport {
            run_id,
            from: prod.name.clone(),
            to: prod.name,
            changed_files: 0,
            archive: snapshot,
            state: PromotionState::Done,
        })
    }

    /// Diff the latest exported trees of two environments, without
    /// exporting or importing anything
    pub async fn compute_diff(
        &self,
        from: &Environment,
        to: &Environment,
    ) -> Result<ChangeSet, PromotionError> {
        let (from_tree, to_tree) = {
            let latest = self.latest_exports.lock().expect("exports lock poisoned");
            let from_tree =
                latest
                    .get(&from.name)
                    .cloned()
                    .ok_or_else(|| PromotionError::NoLocalExport {
                        environment: from.name.clone(),
                    })?;
            let to_tree =
                latest
                    .get(&to.name)
                    .cloned()
                    .ok_or_else(|| PromotionError::NoLocalExport {
                        environment: to.name.clone(),
                    })?;
            (from_tree, to_tree)
        };
        diff::changes(&from_tree, &to_tree).map_err(PromotionError::Diff)
    }

    /// Run one full promotion from `from` into `to`
    pub async fn promote(
        &self,
        from: &Environment,
        to: &Environment,
    ) -> Result<PromotionReport, PromotionError> {
        let _guard = self.claim(to)?;

        let run_id = Uuid::new_v4();
        let run_dir = self.work_dir.join("runs").join(run_id.to_string());
        fs::create_dir_all(&run_dir).map_err(PromotionError::Workspace)?;

        let mut run = Run::new(run_id, &from.name, &to.name);

        run.advance(PromotionState::ExportingSource);
        let from_bundle = self
            .exporter
            .export_environment(from, &run_dir)
            .await
            .map_err(|source| {
                run.fail(Stage::ExportSource, &source);
                PromotionError::ExportSource {
                    environment: from.name.clone(),
                    source,
                }
            })?;

        run.advance(PromotionState::ExportingDestination);
        let to_bundle = self
            .exporter
            .export_environment(to, &run_dir)
            .await
            .map_err(|source| {
                run.fail(Stage::ExportDestination, &source);
                PromotionError::ExportDestination {
                    environment: to.name.clone(),
                    source,
                }
            })?;

        self.remember_exports(from, &from_bundle, to, &to_bundle);

        run.advance(PromotionState::Diffing);
        let changes = diff::changes(&from_bundle.tree, &to_bundle.tree).map_err(|e| {
            run.fail(Stage::Diff, &e);
            PromotionError::Diff(e)
        })?;
        tracing::info!(run = %run_id, changes = changes.len(), "diff complete");

        run.advance(PromotionState::Assembling);
        let assembler = Assembler::new(run_dir.join("prepare"));
        let archive = assembler
            .assemble(&changes, &to_bundle.tree, &run_dir.join(BUNDLE_NAME))
            .map_err(|e| {
                run.fail(Stage::Assemble, &e);
                PromotionError::Assemble(e)
            })?;

        run.advance(PromotionState::Importing);
        self.importer
            .import_bundle(&archive, to)
            .await
            .map_err(|source| {
                run.fail(Stage::Import, &source);
                PromotionError::Import {
                    environment: to.name.clone(),
                    source,
                }
            })?;

        let snapshot = self.keep_snapshot(run_id, to, &to_bundle)?;
        self.record(PromotionRecord {
            run_id,
            from: from.name.clone(),
            to: to.name.clone(),
            archive: archive.clone(),
            snapshot: Some(snapshot),
            timestamp: chrono::Utc::now(),
            rollback: false,
        })?;

        run.advance(PromotionState::Done);
        Ok(PromotionReport {
            run_id,
            from: from.name.clone(),
            to: to.name.clone(),
            changed_files: changes.len(),
            archive,
            state: run.state,
        })
    }

    /// Record both exported trees as each environment's latest export
    fn remember_exports(
        &self,
        from: &Environment,
        from_bundle: &ExportedBundle,
        to: &Environment,
        to_bundle: &ExportedBundle,
    ) {
        let mut latest = self.latest_exports.lock().expect("exports lock poisoned");
        latest.insert(from.name.clone(), from_bundle.tree.clone());
        latest.insert(to.name.clone(), to_bundle.tree.clone());
    }

    /// Preserve the destination's pre-import export outside the run
    /// directory, so a later rollback can re-import it
    fn keep_snapshot(
        &self,
        run_id: Uuid,
        to: &Environment,
        to_bundle: &ExportedBundle,
    ) -> Result<PathBuf, PromotionError> {
        let snapshot_dir = self.work_dir.join("history");
        fs::create_dir_all(&snapshot_dir).map_err(PromotionError::Workspace)?;
        let snapshot = snapshot_dir.join(format!("{run_id}-{}.zip", to.name));
        fs::copy(&to_bundle.archive, &snapshot).map_err(PromotionError::Workspace)?;
        Ok(snapshot)
    }

    fn record(&self, record: PromotionRecord) -> Result<(), PromotionError> {
        let mut history = self.history.lock().expect("history lock poisoned");
        history.append(record).map_err(PromotionError::History)
    }

    /// Claim the destination for a single in-flight promotion
    pub(crate) fn claim(&self, to: &Environment) -> Result<InFlightGuard<'_>, PromotionError> {
        let mut in_flight = self.in_flight.lock().expect("in-flight lock poisoned");
        if !in_flight.insert(to.name.clone()) {
            return Err(PromotionError::AlreadyRunning {
                destination: to.name.clone(),
            });
        }
        Ok(InFlightGuard {
            set: &self.in_flight,
            name: to.name.clone(),
        })
    }
}

/// Releases the destination claim when the promotion ends, however it ends
pub(crate) struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    name: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.name);
        }
    }
}

/// State tracking for one promotion instance
struct Run {
    run_id: Uuid,
    from: String,
    to: String,
    state: PromotionState,
}

impl Run {
    fn new(run_id: Uuid, from: &str, to: &str) -> Self {
        Self {
            run_id,
            from: from.to_string(),
            to: to.to_string(),
            state: PromotionState::Idle,
        }
    }

    fn advance(&mut self, state: PromotionState) {
        tracing::info!(
            run = %self.run_id,
            from = %self.from,
            to = %self.to,
            ?state,
            "promotion state"
        );
        self.state = state;
    }

    fn fail(&mut self, stage: Stage, cause: &dyn std::fmt::Display) {
        let state = PromotionState::Failed {
            stage,
            reason: cause.to_string(),
        };
        tracing::error!(
            run = %self.run_id,
            from = %self.from,
            to = %self.to,
            ?stage,
            %cause,
            "promotion failed"
        );
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::archive;
    use crate::environment::{DEV_NAME, PROD_NAME, TEST_NAME};
    use crate::remote::testing::{zip_bytes, FailingAgentService, MockAgentService, MockBlobStore};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use std::path::Path;
    use tempfile::TempDir;

    fn environments() -> EnvironmentSet {
        EnvironmentSet {
            dev: Environment::new(DEV_NAME, "proj-dev", "http://devurl"),
            test: Environment::new(TEST_NAME, "proj-test", "http://testurl"),
            prod: Environment::new(PROD_NAME, "proj-prod", "http://produrl"),
        }
    }

    fn promoter_with(
        agents: Arc<dyn AgentService>,
        store: Arc<MockBlobStore>,
        work: &TempDir,
    ) -> Promoter {
        Promoter::new(
            environments(),
            agents,
            store,
            "agent-exports",
            work.path(),
        )
        .unwrap()
    }

    /// Unpack the base64 bundle recorded by the mock import call
    fn unpack_import(content_b64: &str, dir: &Path) -> PathBuf {
        let bytes = STANDARD.decode(content_b64).unwrap();
        let archive_path = dir.join("imported.zip");
        std::fs::write(&archive_path, bytes).unwrap();
        let unpacked = dir.join("imported");
        archive::unpack(&archive_path, &unpacked).unwrap();
        unpacked
    }

    #[tokio::test]
    async fn promote_ships_new_files_with_destination_manifest() {
        let work = TempDir::new().unwrap();
        let store = Arc::new(MockBlobStore::default());
        store.insert_prefix(
            "devAgent-",
            zip_bytes(&[
                ("agent.json", "{\"from\":\"dev\"}"),
                ("intents/greet.json", "{}"),
                ("entities/color.json", "{\"name\":\"color\"}"),
            ]),
        );
        store.insert_prefix(
            "testAgent-",
            zip_bytes(&[
                ("agent.json", "{\"from\":\"test\"}"),
                ("intents/greet.json", "{}"),
            ]),
        );
        let agents = Arc::new(MockAgentService::default());

        let promoter = promoter_with(agents.clone(), store, &work);
        let report = promoter.deploy_dev_to_test().await.unwrap();

        assert_eq!(report.from, DEV_NAME);
        assert_eq!(report.to, TEST_NAME);
        assert_eq!(report.changed_files, 1);
        assert_eq!(report.state, PromotionState::Done);

        let imports = agents.imports();
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].0, "proj-test");

        let inspect = TempDir::new().unwrap();
        let unpacked = unpack_import(&imports[0].1, inspect.path());
        assert!(unpacked.join("entities/color.json").exists());
        assert!(!unpacked.join("intents/greet.json").exists());
        assert_eq!(
            std::fs::read_to_string(unpacked.join("agent.json")).unwrap(),
            "{\"from\":\"test\"}"
        );
    }

    #[tokio::test]
    async fn identical_trees_promote_a_manifest_only_bundle() {
        let work = TempDir::new().unwrap();
        let content = zip_bytes(&[
            ("agent.json", "{\"lang\":\"en\"}"),
            ("intents/greet.json", "{}"),
        ]);
        let store = Arc::new(MockBlobStore::with_blob(content));
        let agents = Arc::new(MockAgentService::default());

        let promoter = promoter_with(agents.clone(), store, &work);
        let report = promoter.deploy_dev_to_test().await.unwrap();

        assert_eq!(report.changed_files, 0);

        let imports = agents.imports();
        let inspect = TempDir::new().unwrap();
        let unpacked = unpack_import(&imports[0].1, inspect.path());
        assert!(unpacked.join("agent.json").exists());
        assert!(!unpacked.join("intents/greet.json").exists());
    }

    #[tokio::test]
    async fn failed_source_export_halts_before_diff() {
        let work = TempDir::new().unwrap();
        let agents = Arc::new(FailingAgentService::failing_export());
        let store = Arc::new(MockBlobStore::with_blob(Vec::new()));

        let promoter = promoter_with(agents, store, &work);
        let err = promoter.deploy_dev_to_test().await.unwrap_err();

        assert!(matches!(err, PromotionError::ExportSource { .. }));
        assert_eq!(err.stage(), Some(Stage::ExportSource));

        // The destination was never exported and nothing was recorded
        let runs = work.path().join("runs");
        let run_dirs: Vec<_> = std::fs::read_dir(&runs).unwrap().collect();
        assert_eq!(run_dirs.len(), 1);
        let run_dir = run_dirs[0].as_ref().unwrap().path();
        assert!(!run_dir.join(TEST_NAME).exists());
        assert!(promoter.history.lock().unwrap().records().is_empty());
    }

    #[tokio::test]
    async fn concurrent_promotions_to_one_destination_are_rejected() {
        let work = TempDir::new().unwrap();
        let store = Arc::new(MockBlobStore::with_blob(zip_bytes(&[(
            "agent.json",
            "{}",
        )])));
        let promoter = promoter_with(Arc::new(MockAgentService::default()), store, &work);

        let envs = promoter.environments().clone();
        let _held = promoter.claim(&envs.test).unwrap();

        let err = promoter.deploy_dev_to_test().await.unwrap_err();
        assert!(matches!(err, PromotionError::AlreadyRunning { .. }));

        drop(_held);
        promoter.deploy_dev_to_test().await.unwrap();
    }

    #[tokio::test]
    async fn rollback_reimports_the_destination_snapshot() {
        let work = TempDir::new().unwrap();
        let store = Arc::new(MockBlobStore::default());
        store.insert_prefix(
            "testAgent-",
            zip_bytes(&[("agent.json", "{}"), ("intents/new.json", "{}")]),
        );
        let prod_before = zip_bytes(&[("agent.json", "{}")]);
        store.insert_prefix("prodAgent-", prod_before.clone());
        let agents = Arc::new(MockAgentService::default());

        let promoter = promoter_with(agents.clone(), store, &work);
        promoter.deploy_test_to_production().await.unwrap();

        let report = promoter.rollback().await.unwrap();
        assert_eq!(report.to, PROD_NAME);

        let imports = agents.imports();
        assert_eq!(imports.len(), 2);
        // Second import is the rollback, carrying prod's pre-promotion state
        assert_eq!(imports[1].0, "proj-prod");
        assert_eq!(imports[1].1, STANDARD.encode(&prod_before));
    }

    #[tokio::test]
    async fn rollback_without_history_is_rejected() {
        let work = TempDir::new().unwrap();
        let store = Arc::new(MockBlobStore::with_blob(Vec::new()));
        let promoter = promoter_with(Arc::new(MockAgentService::default()), store, &work);

        let err = promoter.rollback().await.unwrap_err();
        assert!(matches!(err, PromotionError::NothingToRollBack { .. }));
    }

    #[tokio::test]
    async fn compute_diff_uses_latest_exports_only() {
        let work = TempDir::new().unwrap();
        let store = Arc::new(MockBlobStore::default());
        store.insert_prefix(
            "devAgent-",
            zip_bytes(&[("agent.json", "{}"), ("entities/color.json", "{}")]),
        );
        store.insert_prefix("testAgent-", zip_bytes(&[("agent.json", "{}")]));
        let agents = Arc::new(MockAgentService::default());

        let promoter = promoter_with(agents.clone(), store, &work);
        let envs = promoter.environments().clone();

        // No exports yet: the preview has nothing to work on
        let err = promoter.compute_diff(&envs.dev, &envs.test).await.unwrap_err();
        assert!(matches!(err, PromotionError::NoLocalExport { .. }));

        promoter.deploy_dev_to_test().await.unwrap();
        let export_count = agents.exports().len();

        let changes = promoter.compute_diff(&envs.dev, &envs.test).await.unwrap();
        assert_eq!(changes.len(), 1);
        // The preview must not have triggered new exports or imports
        assert_eq!(agents.exports().len(), export_count);
        assert_eq!(agents.imports().len(), 1);
    }

    #[tokio::test]
    async fn export_then_self_diff_is_empty() {
        let work = TempDir::new().unwrap();
        let store = Arc::new(MockBlobStore::with_blob(zip_bytes(&[
            ("agent.json", "{}"),
            ("intents/greet.json", "{\"name\":\"greet\"}"),
        ])));
        let promoter = promoter_with(Arc::new(MockAgentService::default()), store, &work);
        let envs = promoter.environments().clone();

        promoter.deploy_dev_to_test().await.unwrap();
        let changes = promoter.compute_diff(&envs.dev, &envs.dev).await.unwrap();
        assert!(changes.is_empty());
    }

    #[tokio::test]
    async fn history_records_successful_promotions() {
        let work = TempDir::new().unwrap();
        let store = Arc::new(MockBlobStore::with_blob(zip_bytes(&[(
            "agent.json",
            "{}",
        )])));
        let promoter = promoter_with(Arc::new(MockAgentService::default()), store, &work);

        let report = promoter.deploy_dev_to_test().await.unwrap();

        let history = promoter.history.lock().unwrap();
        let records = history.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].run_id, report.run_id);
        assert_eq!(records[0].to, TEST_NAME);
        assert!(records[0].snapshot.as_ref().unwrap().exists());
    }
}
