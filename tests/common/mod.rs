//! Shared test fakes: fault-injecting wrappers around the crate's real
//! in-memory collaborators, used to exercise the P1/P2 atomicity
//! properties without a flaky real backend.
//!
//! Included via `mod common;` in each integration test binary, so not
//! every helper is used by every binary.
#![allow(dead_code)]

use chrono::Duration;
use experiment_lifecycle::{
    BucketList, Buckets, Clock, Experiment, ExperimentAuditInfo, ExperimentService,
    ExperimentStore, FixedClock, InMemoryEventLog, InMemoryExperimentStore, InMemoryPages,
    InMemoryPriorityList, InMemoryRuleCache, JexlRuleCompiler, NewExperiment, Personalization,
    RepositoryError, StoreRole, User,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Wraps a real `ExperimentStore` and can be told to fail the next call
/// to one specific method, exactly once.
pub struct FaultyStore {
    inner: InMemoryExperimentStore,
    fail_create: AtomicBool,
    fail_update: AtomicBool,
    fail_indices: AtomicBool,
}

impl FaultyStore {
    pub fn new(role: StoreRole) -> Self {
        Self {
            inner: InMemoryExperimentStore::new(role),
            fail_create: AtomicBool::new(false),
            fail_update: AtomicBool::new(false),
            fail_indices: AtomicBool::new(false),
        }
    }

    pub fn fail_next_create(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_update(&self) {
        self.fail_update.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_indices(&self) {
        self.fail_indices.store(true, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &InMemoryExperimentStore {
        &self.inner
    }
}

impl ExperimentStore for FaultyStore {
    fn create_experiment(&self, experiment: &Experiment) -> Result<(), RepositoryError> {
        if self.fail_create.swap(false, Ordering::SeqCst) {
            return Err(RepositoryError::Transient("injected create failure".into()));
        }
        self.inner.create_experiment(experiment)
    }

    fn create_indices_for_new_experiment(&self, experiment: &Experiment) -> Result<(), RepositoryError> {
        if self.fail_indices.swap(false, Ordering::SeqCst) {
            return Err(RepositoryError::Transient("injected index failure".into()));
        }
        self.inner.create_indices_for_new_experiment(experiment)
    }

    fn get_experiment(&self, id: Uuid) -> Result<Option<Experiment>, RepositoryError> {
        self.inner.get_experiment(id)
    }

    fn get_experiment_by_label(
        &self,
        application_name: &str,
        label: &str,
    ) -> Result<Option<Experiment>, RepositoryError> {
        self.inner.get_experiment_by_label(application_name, label)
    }

    fn get_experiments(&self) -> Result<Vec<Experiment>, RepositoryError> {
        self.inner.get_experiments()
    }

    fn get_experiments_for_app(&self, application_name: &str) -> Result<Vec<Experiment>, RepositoryError> {
        self.inner.get_experiments_for_app(application_name)
    }

    fn update_experiment(&self, experiment: &Experiment) -> Result<Experiment, RepositoryError> {
        if self.fail_update.swap(false, Ordering::SeqCst) {
            return Err(RepositoryError::Transient("injected update failure".into()));
        }
        self.inner.update_experiment(experiment)
    }

    fn delete_experiment(&self, id: Uuid) -> Result<(), RepositoryError> {
        self.inner.delete_experiment(id)
    }

    fn log_experiment_changes(&self, id: Uuid, changes: &[ExperimentAuditInfo]) -> Result<(), RepositoryError> {
        self.inner.log_experiment_changes(id, changes)
    }

    fn get_applications_list(&self) -> Result<Vec<String>, RepositoryError> {
        self.inner.get_applications_list()
    }
}

pub struct StubBuckets {
    pub buckets: BucketList,
}

impl Buckets for StubBuckets {
    fn get_buckets(&self, _id: Uuid) -> Result<BucketList, RepositoryError> {
        Ok(self.buckets.clone())
    }
}

pub fn balanced_buckets() -> BucketList {
    use experiment_lifecycle::Bucket;
    BucketList {
        buckets: vec![
            Bucket {
                label: "control".into(),
                allocation_percent: 0.5,
                is_control: true,
            },
            Bucket {
                label: "treatment".into(),
                allocation_percent: 0.5,
                is_control: false,
            },
        ],
    }
}

pub struct Harness {
    pub service: ExperimentService,
    pub primary: Arc<FaultyStore>,
    pub secondary: Arc<FaultyStore>,
    pub priorities: Arc<InMemoryPriorityList>,
    pub events: Arc<InMemoryEventLog>,
}

pub fn harness_with_buckets(buckets: BucketList) -> Harness {
    let primary = Arc::new(FaultyStore::new(StoreRole::Primary));
    let secondary = Arc::new(FaultyStore::new(StoreRole::Secondary));
    let priorities = Arc::new(InMemoryPriorityList::new());
    let events = Arc::new(InMemoryEventLog::new());
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(chrono::Utc::now()));

    let service = ExperimentService::new(
        primary.clone(),
        secondary.clone(),
        priorities.clone(),
        Arc::new(InMemoryPages::new()),
        Arc::new(InMemoryRuleCache::new()),
        Arc::new(JexlRuleCompiler),
        Arc::new(StubBuckets { buckets }),
        events.clone(),
        clock,
    );

    Harness {
        service,
        primary,
        secondary,
        priorities,
        events,
    }
}

pub fn harness() -> Harness {
    harness_with_buckets(balanced_buckets())
}

pub fn test_user() -> User {
    User { id: "tester".into() }
}

pub fn new_experiment(application_name: &str, label: &str) -> NewExperiment {
    let now = chrono::Utc::now();
    NewExperiment {
        application_name: application_name.into(),
        label: label.into(),
        description: "a test experiment".into(),
        start_time: now + Duration::days(1),
        end_time: now + Duration::days(30),
        sampling_percent: 0.5,
        rule: String::new(),
        personalization: Personalization::default(),
        is_rapid_experiment: false,
        user_cap: None,
    }
}
