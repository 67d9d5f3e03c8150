//! In-memory implementation of `InterviewStore`.
//!
//! Used by tests. The compare-and-set in `transition` holds the write
//! lock across the check and the mutation, which gives it the same
//! atomicity guarantee (within one process) as the SQLite conditional
//! UPDATE.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{
    InterviewRecord, InterviewStatus, InterviewStore, StoreError, StoredEvaluation,
    TransitionOutcome,
};

/// In-memory interview store. All state is lost on restart.
#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<String, InterviewRecord>>,
    evaluations: RwLock<Vec<StoredEvaluation>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InterviewStore for InMemoryStore {
    async fn create(&self, record: InterviewRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.interview_id) {
            return Err(StoreError::Duplicate);
        }
        records.insert(record.interview_id.clone(), record);
        Ok(())
    }

    async fn get(&self, interview_id: &str) -> Result<Option<InterviewRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records.get(interview_id).cloned())
    }

    async fn transition(
        &self,
        interview_id: &str,
        from: InterviewStatus,
        to: InterviewStatus,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome, StoreError> {
        let mut records = self.records.write().await;
        match records.get_mut(interview_id) {
            Some(record) if record.status == from => {
                record.status = to;
                match to {
                    InterviewStatus::Started => record.started_at = Some(at),
                    InterviewStatus::Completed => record.completed_at = Some(at),
                    InterviewStatus::Scheduled => {}
                }
                Ok(TransitionOutcome::Applied)
            }
            _ => Ok(TransitionOutcome::PreconditionFailed),
        }
    }

    async fn save_evaluation(&self, evaluation: StoredEvaluation) -> Result<(), StoreError> {
        let mut evaluations = self.evaluations.write().await;
        evaluations.push(evaluation);
        Ok(())
    }

    async fn evaluation_for(
        &self,
        interview_id: &str,
    ) -> Result<Option<StoredEvaluation>, StoreError> {
        let evaluations = self.evaluations.read().await;
        Ok(evaluations
            .iter()
            .rev()
            .find(|e| e.interview_id == interview_id)
            .cloned())
    }
}
