//! Outbox of whole-project saves.
//!
//! Every persisted change enqueues a full snapshot of the project. Snapshots
//! are sent in the order they were issued, so the backend always ends up with
//! the most recent one even if an earlier push is slow.

use super::{ApiError, ProjectApi};
use crate::project::Project;
use std::collections::VecDeque;

/// What triggered a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveReason {
    LayerAdded,
    LayerRemoved,
    LayerModified,
    ImageUploaded,
    StrokeAdded,
    Undo,
    Redo,
}

impl SaveReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaveReason::LayerAdded => "layer added",
            SaveReason::LayerRemoved => "layer removed",
            SaveReason::LayerModified => "layer modified",
            SaveReason::ImageUploaded => "image uploaded",
            SaveReason::StrokeAdded => "stroke added",
            SaveReason::Undo => "undo",
            SaveReason::Redo => "redo",
        }
    }
}

/// A snapshot waiting to be pushed.
#[derive(Debug, Clone)]
pub struct PendingSave {
    /// Issue order, starting at 1.
    pub seq: u64,
    pub reason: SaveReason,
    pub project: Project,
}

/// Outcome of a flush.
#[derive(Debug, Default)]
pub struct FlushReport {
    /// Sequence numbers accepted by the backend, in send order.
    pub sent: Vec<u64>,
    /// Pushes that failed. They are not retried.
    pub failed: Vec<(u64, ApiError)>,
}

impl FlushReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Ordered queue of pending project saves.
#[derive(Debug, Default)]
pub struct SaveQueue {
    pending: VecDeque<PendingSave>,
    issued: u64,
}

impl SaveQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a snapshot and return its sequence number.
    pub fn enqueue(&mut self, project: Project, reason: SaveReason) -> u64 {
        self.issued += 1;
        log::debug!("Queued save #{} of {} ({})", self.issued, project.id, reason.as_str());
        self.pending.push_back(PendingSave { seq: self.issued, reason, project });
        self.issued
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of saves issued so far, sent or not.
    pub fn issued(&self) -> u64 {
        self.issued
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingSave> {
        self.pending.iter()
    }

    /// Drop everything not yet sent (used when switching projects).
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Push every pending snapshot in issue order.
    ///
    /// Failures are logged and dropped; they do not stop later pushes and
    /// never touch local state.
    pub async fn flush<A: ProjectApi + ?Sized>(&mut self, api: &A, token: Option<&str>) -> FlushReport {
        let mut report = FlushReport::default();
        while let Some(save) = self.pending.pop_front() {
            let Some(token) = token else {
                log::error!("Error saving project {}: not signed in", save.project.id);
                report.failed.push((save.seq, ApiError::NotAuthenticated));
                continue;
            };
            match api.update_project(token, &save.project).await {
                Ok(_) => report.sent.push(save.seq),
                Err(e) => {
                    log::error!("Error saving project {}: {}", save.project.id, e);
                    report.failed.push((save.seq, e));
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::NewProject;
    use crate::storage::{MemoryApi, RegisterRequest};
    use crate::testing::block_on;

    fn setup() -> (MemoryApi, String, Project) {
        let api = MemoryApi::new();
        let token = block_on(api.register(&RegisterRequest {
            username: "ann".to_string(),
            email: "ann@example.com".to_string(),
            password: "pw".to_string(),
        }))
        .unwrap()
        .access_token;
        let project = block_on(api.create_project(&token, &NewProject::new("Poster"))).unwrap();
        (api, token, project)
    }

    #[test]
    fn test_flush_preserves_issue_order() {
        let (api, token, project) = setup();
        let mut queue = SaveQueue::new();

        for name in ["first", "second", "third"] {
            let mut snapshot = project.clone();
            snapshot.name = name.to_string();
            queue.enqueue(snapshot, SaveReason::LayerModified);
        }
        let report = block_on(queue.flush(&api, Some(&token)));

        assert_eq!(report.sent, vec![1, 2, 3]);
        let names: Vec<String> = api.saved_projects().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
        assert_eq!(api.stored_project(&project.id).unwrap().name, "third");
        assert!(queue.is_empty());
    }

    #[test]
    fn test_failures_are_reported_and_dropped() {
        let (api, token, project) = setup();
        let mut queue = SaveQueue::new();
        queue.enqueue(project, SaveReason::LayerAdded);
        api.set_offline(true);

        let report = block_on(queue.flush(&api, Some(&token)));

        assert!(!report.is_clean());
        assert_eq!(report.failed[0].0, 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_flush_without_token_fails_each_save() {
        let (api, _token, project) = setup();
        let mut queue = SaveQueue::new();
        queue.enqueue(project.clone(), SaveReason::LayerAdded);
        queue.enqueue(project, SaveReason::LayerModified);

        let report = block_on(queue.flush(&api, None));
        assert_eq!(report.failed.len(), 2);
        assert!(api.saved_projects().is_empty());
    }
}
