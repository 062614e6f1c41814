//! Lookup table of in-flight ingestion tasks

use chrono::Utc;
use ragbridge_core::{IngestionStatus, TaskId, TaskSnapshot, UploadMode};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::{IngestionError, Result};

struct Entry {
    snapshot: TaskSnapshot,
    started: Instant,
}

/// Shared registry keyed by [`TaskId`].
///
/// Tasks are inserted when they start and removed when their result is
/// delivered; reads never block progress of other tasks for long.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<RwLock<HashMap<TaskId, Entry>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new task in the `Uploading` state
    pub async fn register(
        &self,
        id: TaskId,
        file_name: &str,
        collection: &str,
        mode: UploadMode,
    ) -> Result<TaskSnapshot> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&id) {
            return Err(IngestionError::DuplicateTask(id.to_string()));
        }

        let snapshot = TaskSnapshot {
            id: id.clone(),
            file_name: file_name.to_string(),
            collection: collection.to_string(),
            mode,
            status: IngestionStatus::Uploading,
            started_at: Utc::now(),
            elapsed: std::time::Duration::ZERO,
            task_token: None,
            attempts: 0,
        };
        tasks.insert(
            id,
            Entry {
                snapshot: snapshot.clone(),
                started: Instant::now(),
            },
        );
        Ok(snapshot)
    }

    /// Apply `change` to a registered task and return the updated snapshot
    pub async fn update<F>(&self, id: &TaskId, change: F) -> Option<TaskSnapshot>
    where
        F: FnOnce(&mut TaskSnapshot),
    {
        let mut tasks = self.tasks.write().await;
        let entry = tasks.get_mut(id)?;
        change(&mut entry.snapshot);
        entry.snapshot.elapsed = entry.started.elapsed();
        Some(entry.snapshot.clone())
    }

    pub async fn get(&self, id: &TaskId) -> Option<TaskSnapshot> {
        let tasks = self.tasks.read().await;
        tasks.get(id).map(Self::fresh)
    }

    /// All registered tasks, oldest first
    pub async fn list(&self) -> Vec<TaskSnapshot> {
        let tasks = self.tasks.read().await;
        let mut snapshots: Vec<TaskSnapshot> = tasks.values().map(Self::fresh).collect();
        snapshots.sort_by(|a, b| a.started_at.cmp(&b.started_at).then(a.id.cmp(&b.id)));
        snapshots
    }

    pub async fn remove(&self, id: &TaskId) -> Option<TaskSnapshot> {
        let mut tasks = self.tasks.write().await;
        tasks.remove(id).map(|entry| {
            let mut snapshot = entry.snapshot;
            snapshot.elapsed = entry.started.elapsed();
            snapshot
        })
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }

    fn fresh(entry: &Entry) -> TaskSnapshot {
        let mut snapshot = entry.snapshot.clone();
        snapshot.elapsed = entry.started.elapsed();
        snapshot
    }
}
