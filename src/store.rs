/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The dual-store abstraction (spec §4.4): one trait, two required
//! writers. The service holds a primary (wide-column, authoritative,
//! owns indices and audit records) and a secondary (relational mirror
//! for reporting joins) behind this same interface.
//!
//! Ids are opaque, randomly generated UUIDs rather than a backend-issued
//! sequence, so unlike the spec's literal `createExperiment(new) -> id`
//! phrasing, the *service* generates the id up front and both backends
//! persist the same fully-formed [`Experiment`] — see DESIGN.md for why.

use crate::error::RepositoryError;
use crate::model::{Experiment, ExperimentAuditInfo, ExperimentState};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

pub trait ExperimentStore: Send + Sync {
    fn create_experiment(&self, experiment: &Experiment) -> Result<(), RepositoryError>;
    /// No-op on the secondary backend; only the primary owns indices.
    fn create_indices_for_new_experiment(&self, experiment: &Experiment) -> Result<(), RepositoryError>;
    fn get_experiment(&self, id: Uuid) -> Result<Option<Experiment>, RepositoryError>;
    fn get_experiment_by_label(
        &self,
        application_name: &str,
        label: &str,
    ) -> Result<Option<Experiment>, RepositoryError>;
    /// Excludes DELETED experiments; TERMINATED ones remain visible.
    fn get_experiments(&self) -> Result<Vec<Experiment>, RepositoryError>;
    fn get_experiments_for_app(&self, application_name: &str) -> Result<Vec<Experiment>, RepositoryError>;
    fn update_experiment(&self, experiment: &Experiment) -> Result<Experiment, RepositoryError>;
    /// Logical on the primary (row remains, state becomes DELETED);
    /// physical on the secondary mirror.
    fn delete_experiment(&self, id: Uuid) -> Result<(), RepositoryError>;
    /// No-op on the secondary backend; only the primary keeps audit history.
    fn log_experiment_changes(
        &self,
        id: Uuid,
        changes: &[ExperimentAuditInfo],
    ) -> Result<(), RepositoryError>;
    fn get_applications_list(&self) -> Result<Vec<String>, RepositoryError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreRole {
    Primary,
    Secondary,
}

/// A real, in-process implementation of [`ExperimentStore`], used in
/// place of a concrete wide-column or relational driver (out of scope
/// per spec §1) — the same role `LoginDb::open_in_memory` plays for the
/// teacher's login store: a non-mocked implementation of the real
/// trait, backed by process memory instead of a file or network
/// service, so orchestration tests exercise real code paths.
pub struct InMemoryExperimentStore {
    role: StoreRole,
    rows: RwLock<HashMap<Uuid, Experiment>>,
    audit_log: RwLock<Vec<(Uuid, ExperimentAuditInfo)>>,
}

impl InMemoryExperimentStore {
    pub fn new(role: StoreRole) -> Self {
        Self {
            role,
            rows: RwLock::new(HashMap::new()),
            audit_log: RwLock::new(Vec::new()),
        }
    }

    /// Test/diagnostic helper: every audit entry ever logged, in order.
    pub fn audit_log(&self) -> Vec<(Uuid, ExperimentAuditInfo)> {
        self.audit_log.read().clone()
    }
}

impl ExperimentStore for InMemoryExperimentStore {
    fn create_experiment(&self, experiment: &Experiment) -> Result<(), RepositoryError> {
        let mut rows = self.rows.write();
        if rows.contains_key(&experiment.id) {
            return Err(RepositoryError::Conflict(format!(
                "experiment {} already exists",
                experiment.id
            )));
        }
        rows.insert(experiment.id, experiment.clone());
        Ok(())
    }

    fn create_indices_for_new_experiment(&self, _experiment: &Experiment) -> Result<(), RepositoryError> {
        match self.role {
            StoreRole::Primary => Ok(()),
            StoreRole::Secondary => Ok(()),
        }
    }

    fn get_experiment(&self, id: Uuid) -> Result<Option<Experiment>, RepositoryError> {
        Ok(self.rows.read().get(&id).cloned())
    }

    fn get_experiment_by_label(
        &self,
        application_name: &str,
        label: &str,
    ) -> Result<Option<Experiment>, RepositoryError> {
        Ok(self
            .rows
            .read()
            .values()
            .find(|e| {
                e.application_name == application_name
                    && e.label == label
                    && e.state != ExperimentState::Deleted
            })
            .cloned())
    }

    fn get_experiments(&self) -> Result<Vec<Experiment>, RepositoryError> {
        Ok(self
            .rows
            .read()
            .values()
            .filter(|e| e.state != ExperimentState::Deleted)
            .cloned()
            .collect())
    }

    fn get_experiments_for_app(&self, application_name: &str) -> Result<Vec<Experiment>, RepositoryError> {
        Ok(self
            .rows
            .read()
            .values()
            .filter(|e| e.application_name == application_name && e.state != ExperimentState::Deleted)
            .cloned()
            .collect())
    }

    fn update_experiment(&self, experiment: &Experiment) -> Result<Experiment, RepositoryError> {
        let mut rows = self.rows.write();
        if !rows.contains_key(&experiment.id) {
            return Err(RepositoryError::NotFound(experiment.id.to_string()));
        }
        rows.insert(experiment.id, experiment.clone());
        Ok(experiment.clone())
    }

    fn delete_experiment(&self, id: Uuid) -> Result<(), RepositoryError> {
        let mut rows = self.rows.write();
        match self.role {
            StoreRole::Primary => {
                if let Some(row) = rows.get_mut(&id) {
                    row.state = ExperimentState::Deleted;
                    Ok(())
                } else {
                    Err(RepositoryError::NotFound(id.to_string()))
                }
            }
            StoreRole::Secondary => {
                if rows.remove(&id).is_some() {
                    Ok(())
                } else {
                    Err(RepositoryError::NotFound(id.to_string()))
                }
            }
        }
    }

    fn log_experiment_changes(
        &self,
        id: Uuid,
        changes: &[ExperimentAuditInfo],
    ) -> Result<(), RepositoryError> {
        if self.role != StoreRole::Primary {
            return Ok(());
        }
        let mut log = self.audit_log.write();
        for change in changes {
            log.push((id, change.clone()));
        }
        Ok(())
    }

    fn get_applications_list(&self) -> Result<Vec<String>, RepositoryError> {
        let mut apps: Vec<String> = self
            .rows
            .read()
            .values()
            .filter(|e| e.state != ExperimentState::Deleted)
            .map(|e| e.application_name.clone())
            .collect();
        apps.sort();
        apps.dedup();
        Ok(apps)
    }
}
