use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{CoreError, InsertReceipt, NewPatient, Patient, PatientId, PatientRepository};

/// Simple in-memory repository for tests and demos. Records are kept in
/// insertion order behind a mutex; nothing survives a restart.
pub struct InMemoryRepo {
    inner: Mutex<Vec<Patient>>,
    next_id: AtomicU64,
    acknowledge: bool,
}

impl InMemoryRepo {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            acknowledge: true,
        }
    }

    /// Report inserts as unacknowledged, the way a store with `w: 0` would.
    /// Records are still kept.
    pub fn with_acknowledgement(mut self, acknowledge: bool) -> Self {
        self.acknowledge = acknowledge;
        self
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Same width as a MongoDB ObjectId hex string.
    fn reserve_id(&self) -> PatientId {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        PatientId::new(format!("{:024x}", n))
    }
}

impl Default for InMemoryRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PatientRepository for InMemoryRepo {
    async fn insert(&self, patient: NewPatient) -> Result<InsertReceipt, CoreError> {
        let id = self.reserve_id();
        let mut records = self
            .inner
            .lock()
            .map_err(|_| CoreError::StoreUnavailable("mutex poisoned".into()))?;
        records.push(Patient::from_new(id.clone(), patient));
        Ok(InsertReceipt {
            acknowledged: self.acknowledge,
            id,
        })
    }

    async fn find_all(&self) -> Result<Vec<Patient>, CoreError> {
        let records = self
            .inner
            .lock()
            .map_err(|_| CoreError::StoreUnavailable("mutex poisoned".into()))?;
        Ok(records.clone())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Patient>, CoreError> {
        let records = self
            .inner
            .lock()
            .map_err(|_| CoreError::StoreUnavailable("mutex poisoned".into()))?;
        Ok(records.iter().find(|p| p.name == name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Number;

    fn patient(name: &str, wait: i64) -> NewPatient {
        NewPatient {
            name: name.into(),
            code: "C1".into(),
            severity: Number::from(2),
            wait_time: Number::from(wait),
        }
    }

    #[tokio::test]
    async fn insert_assigns_distinct_ids() {
        let repo = InMemoryRepo::new();
        let a = repo.insert(patient("a", 1)).await.unwrap();
        let b = repo.insert(patient("b", 2)).await.unwrap();
        assert!(a.acknowledged);
        assert_ne!(a.id, b.id);
        assert_eq!(a.id.as_str().len(), 24);
        assert_eq!(repo.len(), 2);
    }

    #[tokio::test]
    async fn find_all_keeps_insertion_order() {
        let repo = InMemoryRepo::new();
        assert!(repo.find_all().await.unwrap().is_empty());
        for (i, name) in ["x", "y", "z"].iter().enumerate() {
            repo.insert(patient(name, i as i64)).await.unwrap();
        }
        let names: Vec<String> = repo
            .find_all()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["x", "y", "z"]);
    }

    #[tokio::test]
    async fn find_by_name_first_exact_match() {
        let repo = InMemoryRepo::new();
        repo.insert(patient("Dup", 10)).await.unwrap();
        repo.insert(patient("Dup", 20)).await.unwrap();
        let got = repo.find_by_name("Dup").await.unwrap().unwrap();
        assert_eq!(got.wait_time, Number::from(10));
        assert!(repo.find_by_name("dup").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unacknowledged_mode_still_records() {
        let repo = InMemoryRepo::new().with_acknowledgement(false);
        let receipt = repo.insert(patient("a", 1)).await.unwrap();
        assert!(!receipt.acknowledged);
        assert!(!repo.is_empty());
    }
}
