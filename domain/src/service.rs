use serde_json::Number;

use crate::validate::{validate_lookup_name, PatientDraft};
use crate::{CoreError, Patient, PatientId, PatientRepository};

/// Static greeting served on the home route.
pub const WELCOME_MESSAGE: &str = "Welcome to the Emergency Room Triage System!";

/// What listing an empty collection means.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EmptyListPolicy {
    /// Report `CoreError::NotFound`, as the original API did.
    #[default]
    NotFound,
    /// Return an empty list.
    EmptyArray,
}

impl EmptyListPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "not_found" | "notfound" | "404" => Some(EmptyListPolicy::NotFound),
            "empty" | "empty_array" => Some(EmptyListPolicy::EmptyArray),
            _ => None,
        }
    }
}

/// Application service for the triage list.
///
/// Stateless between calls: every operation validates its input and then
/// issues exactly one repository call.
pub struct TriageService<R: PatientRepository> {
    repo: R,
    empty_list: EmptyListPolicy,
}

impl<R: PatientRepository> TriageService<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            empty_list: EmptyListPolicy::default(),
        }
    }

    pub fn with_empty_list_policy(mut self, policy: EmptyListPolicy) -> Self {
        self.empty_list = policy;
        self
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Validate and insert one patient, returning the store-assigned id.
    pub async fn add_patient(&self, draft: PatientDraft) -> Result<PatientId, CoreError> {
        let input = draft.validate()?;
        let receipt = self.repo.insert(input).await?;
        if !receipt.acknowledged {
            return Err(CoreError::WriteNotAcknowledged);
        }
        Ok(receipt.id)
    }

    /// Every stored patient, subject to the empty-list policy.
    pub async fn list_patients(&self) -> Result<Vec<Patient>, CoreError> {
        let patients = self.repo.find_all().await?;
        if patients.is_empty() && self.empty_list == EmptyListPolicy::NotFound {
            return Err(CoreError::NotFound);
        }
        Ok(patients)
    }

    /// Wait time of the first patient whose name matches exactly.
    pub async fn patient_wait_time(&self, name: Option<&str>) -> Result<Number, CoreError> {
        let name = validate_lookup_name(name)?;
        match self.repo.find_by_name(name).await? {
            Some(patient) => Ok(patient.wait_time),
            None => Err(CoreError::NotFound),
        }
    }

    pub fn home(&self) -> &'static str {
        WELCOME_MESSAGE
    }

    /// Close the store connection.
    pub async fn shutdown(&self) -> Result<(), CoreError> {
        self.repo.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_repo::InMemoryRepo;
    use crate::{InsertReceipt, NewPatient};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn draft(v: serde_json::Value) -> PatientDraft {
        serde_json::from_value(v).unwrap()
    }

    fn alice() -> PatientDraft {
        draft(json!({"name": "Alice", "code": "C1", "severity": 3, "waitTime": 15}))
    }

    /// Counts store calls so tests can prove validation short-circuits.
    #[derive(Default)]
    struct CountingRepo {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PatientRepository for CountingRepo {
        async fn insert(&self, _patient: NewPatient) -> Result<InsertReceipt, CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CoreError::StoreUnavailable("unreachable".into()))
        }
        async fn find_all(&self) -> Result<Vec<Patient>, CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CoreError::StoreUnavailable("unreachable".into()))
        }
        async fn find_by_name(&self, _name: &str) -> Result<Option<Patient>, CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CoreError::StoreUnavailable("unreachable".into()))
        }
    }

    #[tokio::test]
    async fn add_then_lookup_returns_submitted_wait_time() {
        let svc = TriageService::new(InMemoryRepo::new());
        let id = svc.add_patient(alice()).await.unwrap();
        assert!(!id.as_str().is_empty());

        let wait = svc.patient_wait_time(Some("Alice")).await.unwrap();
        assert_eq!(wait, Number::from(15));

        let err = svc.patient_wait_time(Some("Bob")).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound));
    }

    #[tokio::test]
    async fn invalid_add_writes_nothing() {
        let svc = TriageService::new(InMemoryRepo::new());
        svc.add_patient(alice()).await.unwrap();

        let err = svc
            .add_patient(draft(json!({"name": "Bob", "code": "C2", "severity": 1})))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::MissingField("waitTime")));

        let err = svc
            .add_patient(draft(
                json!({"name": "Bob", "code": "C2", "severity": "high", "waitTime": 4}),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidType("severity")));

        assert_eq!(svc.list_patients().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_list_policy() {
        let svc = TriageService::new(InMemoryRepo::new());
        assert!(matches!(
            svc.list_patients().await.unwrap_err(),
            CoreError::NotFound
        ));

        let svc = TriageService::new(InMemoryRepo::new())
            .with_empty_list_policy(EmptyListPolicy::EmptyArray);
        assert!(svc.list_patients().await.unwrap().is_empty());

        svc.add_patient(alice()).await.unwrap();
        let list = svc.list_patients().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "Alice");
    }

    #[tokio::test]
    async fn unacknowledged_write_is_an_error() {
        let svc = TriageService::new(InMemoryRepo::new().with_acknowledgement(false));
        let err = svc.add_patient(alice()).await.unwrap_err();
        assert!(matches!(err, CoreError::WriteNotAcknowledged));
    }

    #[tokio::test]
    async fn lookup_is_exact_and_returns_first_match() {
        let svc = TriageService::new(InMemoryRepo::new());
        svc.add_patient(alice()).await.unwrap();
        svc.add_patient(draft(
            json!({"name": "Alice", "code": "C4", "severity": 1, "waitTime": 99}),
        ))
        .await
        .unwrap();

        assert_eq!(
            svc.patient_wait_time(Some("Alice")).await.unwrap(),
            Number::from(15)
        );
        assert!(svc.patient_wait_time(Some("alice")).await.is_err());
        assert!(svc.patient_wait_time(Some("Alice ")).await.is_err());
    }

    #[tokio::test]
    async fn blank_lookup_never_reaches_store() {
        let svc = TriageService::new(CountingRepo::default());
        for name in [None, Some(""), Some("  ")] {
            let err = svc.patient_wait_time(name).await.unwrap_err();
            assert!(matches!(err, CoreError::MissingField("name")));
        }
        let err = svc
            .add_patient(draft(json!({"code": "C1", "severity": 3, "waitTime": 15})))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(svc.repo().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn store_errors_propagate() {
        let svc = TriageService::new(CountingRepo::default());
        assert!(matches!(
            svc.list_patients().await.unwrap_err(),
            CoreError::StoreUnavailable(_)
        ));
        assert!(matches!(
            svc.add_patient(alice()).await.unwrap_err(),
            CoreError::StoreUnavailable(_)
        ));
        assert_eq!(svc.repo().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn policy_parsing() {
        assert_eq!(EmptyListPolicy::parse("not_found"), Some(EmptyListPolicy::NotFound));
        assert_eq!(EmptyListPolicy::parse("EMPTY"), Some(EmptyListPolicy::EmptyArray));
        assert_eq!(EmptyListPolicy::parse("sometimes"), None);
    }

    #[test]
    fn home_is_static() {
        let svc = TriageService::new(InMemoryRepo::new());
        assert_eq!(svc.home(), WELCOME_MESSAGE);
    }
}
