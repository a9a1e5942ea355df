//! In-memory remote collaborators for tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::{Cursor, Write as _};
use std::path::Path;
use std::sync::Mutex;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use super::{AgentService, BlobStore, Operation, RemoteError};

/// Build zip bytes from (path, content) pairs, for use as export blobs
pub fn zip_bytes(files: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

struct OkOperation;

#[async_trait]
impl Operation for OkOperation {
    async fn wait(self: Box<Self>) -> Result<(), RemoteError> {
        Ok(())
    }
}

struct ErrOperation(&'static str);

#[async_trait]
impl Operation for ErrOperation {
    async fn wait(self: Box<Self>) -> Result<(), RemoteError> {
        Err(RemoteError::OperationFailed {
            name: "projects/mock/operations/1".to_string(),
            message: self.0.to_string(),
        })
    }
}

/// Agent service that records every call and always succeeds
#[derive(Default)]
pub struct MockAgentService {
    exports: Mutex<Vec<(String, String)>>,
    imports: Mutex<Vec<(String, String)>>,
}

impl MockAgentService {
    /// Recorded (project_id, destination_uri) export calls
    pub fn exports(&self) -> Vec<(String, String)> {
        self.exports.lock().unwrap().clone()
    }

    /// Recorded (project_id, agent_content) import calls
    pub fn imports(&self) -> Vec<(String, String)> {
        self.imports.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentService for MockAgentService {
    async fn export_agent(
        &self,
        project_id: &str,
        destination_uri: &str,
    ) -> Result<Box<dyn Operation>, RemoteError> {
        self.exports
            .lock()
            .unwrap()
            .push((project_id.to_string(), destination_uri.to_string()));
        Ok(Box::new(OkOperation))
    }

    async fn import_agent(
        &self,
        project_id: &str,
        agent_content: &str,
    ) -> Result<Box<dyn Operation>, RemoteError> {
        self.imports
            .lock()
            .unwrap()
            .push((project_id.to_string(), agent_content.to_string()));
        Ok(Box::new(OkOperation))
    }
}

/// Agent service whose export or import operation rejects on wait
pub struct FailingAgentService {
    fail_export: bool,
    fail_import: bool,
}

impl FailingAgentService {
    /// Exports fail, imports succeed
    pub fn failing_export() -> Self {
        Self {
            fail_export: true,
            fail_import: false,
        }
    }

    /// Imports fail, exports succeed
    pub fn failing_import() -> Self {
        Self {
            fail_export: false,
            fail_import: true,
        }
    }
}

#[async_trait]
impl AgentService for FailingAgentService {
    async fn export_agent(
        &self,
        _project_id: &str,
        _destination_uri: &str,
    ) -> Result<Box<dyn Operation>, RemoteError> {
        if self.fail_export {
            Ok(Box::new(ErrOperation("export rejected")))
        } else {
            Ok(Box::new(OkOperation))
        }
    }

    async fn import_agent(
        &self,
        _project_id: &str,
        _agent_content: &str,
    ) -> Result<Box<dyn Operation>, RemoteError> {
        if self.fail_import {
            Ok(Box::new(ErrOperation("import rejected")))
        } else {
            Ok(Box::new(OkOperation))
        }
    }
}

/// Blob store serving canned blobs by object-name prefix
///
/// `with_blob` installs a fallback blob served for any object name, which
/// is enough for single-environment tests; orchestrator tests install one
/// blob per environment prefix (`devAgent-`, `testAgent-`, ...).
#[derive(Default)]
pub struct MockBlobStore {
    fallback: Option<Vec<u8>>,
    by_prefix: Mutex<HashMap<String, Vec<u8>>>,
    buckets: Mutex<Vec<String>>,
}

impl MockBlobStore {
    /// Store serving `content` for every object name
    pub fn with_blob(content: Vec<u8>) -> Self {
        Self {
            fallback: Some(content),
            ..Self::default()
        }
    }

    /// Serve `content` for object names starting with `prefix`
    pub fn insert_prefix(&self, prefix: impl Into<String>, content: Vec<u8>) {
        self.by_prefix.lock().unwrap().insert(prefix.into(), content);
    }

    /// Buckets created through this store
    pub fn created_buckets(&self) -> Vec<String> {
        self.buckets.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlobStore for MockBlobStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, RemoteError> {
        Ok(self.buckets.lock().unwrap().iter().any(|b| b == bucket))
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), RemoteError> {
        self.buckets.lock().unwrap().push(bucket.to_string());
        Ok(())
    }

    async fn download(
        &self,
        _bucket: &str,
        object: &str,
        destination: &Path,
    ) -> Result<(), RemoteError> {
        let by_prefix = self.by_prefix.lock().unwrap();
        let content = by_prefix
            .iter()
            .find(|(prefix, _)| object.starts_with(prefix.as_str()))
            .map(|(_, content)| content.clone())
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| {
                RemoteError::MalformedResponse(format!("no canned blob for {object}"))
            })?;
        drop(by_prefix);

        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(destination, content)?;
        Ok(())
    }
}
