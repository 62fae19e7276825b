/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The orchestrator. Owns the create/update algorithm, the compensation
//! logic, and audit/event emission (spec §4.5-§4.8). Every collaborator
//! is an injected trait object — this module never assumes a concrete
//! store, cache, or clock.

use crate::buckets::Buckets;
use crate::clock::Clock;
use crate::error::{Result, ServiceError};
use crate::eventlog::{Event, EventLog, ExperimentChangeEvent, ExperimentCreateEvent};
use crate::locks::KeyedLocks;
use crate::model::{
    Experiment, ExperimentAuditInfo, ExperimentPatch, ExperimentState, NewExperiment, User,
};
use crate::pages::Pages;
use crate::priority::PriorityList;
use crate::rule::{CompiledRule, RuleCache, RuleCompiler};
use crate::store::ExperimentStore;
use crate::validator;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

pub struct ExperimentService {
    primary: Arc<dyn ExperimentStore>,
    secondary: Arc<dyn ExperimentStore>,
    priorities: Arc<dyn PriorityList>,
    pages: Arc<dyn Pages>,
    rule_cache: Arc<dyn RuleCache>,
    rule_compiler: Arc<dyn RuleCompiler>,
    buckets: Arc<dyn Buckets>,
    event_log: Arc<dyn EventLog>,
    clock: Arc<dyn Clock>,
    /// Serializes create/update for the same experiment id (spec §5).
    id_locks: KeyedLocks<Uuid>,
    /// Serializes concurrent creates racing for the same (app, label).
    create_locks: KeyedLocks<(String, String)>,
}

impl ExperimentService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        primary: Arc<dyn ExperimentStore>,
        secondary: Arc<dyn ExperimentStore>,
        priorities: Arc<dyn PriorityList>,
        pages: Arc<dyn Pages>,
        rule_cache: Arc<dyn RuleCache>,
        rule_compiler: Arc<dyn RuleCompiler>,
        buckets: Arc<dyn Buckets>,
        event_log: Arc<dyn EventLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            primary,
            secondary,
            priorities,
            pages,
            rule_cache,
            rule_compiler,
            buckets,
            event_log,
            clock,
            id_locks: KeyedLocks::new(),
            create_locks: KeyedLocks::new(),
        }
    }

    pub fn list(&self) -> Result<Vec<Experiment>> {
        Ok(self.primary.get_experiments()?)
    }

    pub fn list_applications(&self) -> Result<Vec<String>> {
        Ok(self.primary.get_applications_list()?)
    }

    pub fn get(&self, id: Uuid) -> Result<Option<Experiment>> {
        Ok(self.primary.get_experiment(id)?)
    }

    pub fn get_by_label(&self, application_name: &str, label: &str) -> Result<Option<Experiment>> {
        Ok(self.primary.get_experiment_by_label(application_name, label)?)
    }

    pub fn list_for_app(&self, application_name: &str) -> Result<Vec<Experiment>> {
        Ok(self.primary.get_experiments_for_app(application_name)?)
    }

    /// Spec §4.5. On any failure, reverse-order compensation runs the
    /// exactly-already-committed steps back out; the original error is
    /// always what's returned, never replaced by a compensation error.
    pub fn create(&self, new: NewExperiment, user: User) -> Result<Uuid> {
        validator::validate_new_experiment(&new)?;

        let _create_guard = self
            .create_locks
            .lock((new.application_name.clone(), new.label.clone()));

        if self
            .primary
            .get_experiment_by_label(&new.application_name, &new.label)?
            .is_some()
        {
            return Err(ServiceError::Conflict(format!(
                "experiment {}/{} already exists",
                new.application_name, new.label
            )));
        }

        let now = self.clock.now();
        let experiment = Experiment {
            id: Uuid::new_v4(),
            application_name: new.application_name,
            label: new.label,
            description: new.description,
            state: ExperimentState::Draft,
            start_time: new.start_time,
            end_time: new.end_time,
            sampling_percent: new.sampling_percent,
            rule: new.rule,
            personalization: new.personalization,
            is_rapid_experiment: new.is_rapid_experiment,
            user_cap: new.user_cap,
            creation_time: now,
            modification_time: now,
        };
        let id = experiment.id;

        // Step 2: primary mints the row. No compensation needed on failure.
        self.primary.create_experiment(&experiment)?;

        // Step 3: priority list before secondary, so any discovery by
        // other components sees the experiment as already ordered.
        if let Err(e) = self.priorities.append(&experiment.application_name, id) {
            log::warn!("create({id}): priorities.append failed ({e}), compensating");
            self.undo_primary_create(id);
            return Err(e.into());
        }

        // Step 4.
        if let Err(e) = self.secondary.create_experiment(&experiment) {
            log::warn!("create({id}): secondary.create failed ({e}), compensating");
            self.undo_priority_append(&experiment.application_name, id);
            self.undo_primary_create(id);
            return Err(e.into());
        }

        // Step 5: indices depend on both rows existing, so they're last.
        if let Err(e) = self.primary.create_indices_for_new_experiment(&experiment) {
            log::warn!("create({id}): createIndices failed ({e}), compensating");
            self.undo_priority_append(&experiment.application_name, id);
            self.undo_primary_create(id);
            self.undo_secondary_create(id);
            return Err(e.into());
        }

        // Step 6: best-effort, never aborts the operation.
        self.event_log.post(Event::Create(ExperimentCreateEvent {
            user,
            experiment,
        }));

        Ok(id)
    }

    fn undo_primary_create(&self, id: Uuid) {
        if let Err(e) = self.primary.delete_experiment(id) {
            log::error!("create({id}): compensation failed to remove primary row: {e}");
        }
    }

    fn undo_secondary_create(&self, id: Uuid) {
        if let Err(e) = self.secondary.delete_experiment(id) {
            log::error!("create({id}): compensation failed to remove secondary row: {e}");
        }
    }

    fn undo_priority_append(&self, application_name: &str, id: Uuid) {
        if let Err(e) = self.priorities.remove(application_name, id) {
            log::error!("create({id}): compensation failed to remove from priorities[{application_name}]: {e}");
        }
    }

    /// Spec §4.6.
    pub fn update(&self, id: Uuid, patch: ExperimentPatch, user: User) -> Result<Experiment> {
        let _id_guard = self.id_locks.lock(id);

        let current = self
            .primary
            .get_experiment(id)?
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))?;

        if let Some(to) = patch.state {
            if to != current.state {
                validator::validate_state_transition(current.state, to)?;
                if current.state == ExperimentState::Draft && to == ExperimentState::Running {
                    let buckets = self.buckets.get_buckets(id)?;
                    validator::validate_experiment_buckets(&buckets)?;
                }
            }
        }

        validator::check_illegal_update(&current, &patch)?;
        validator::check_illegal_terminated_update(&current, &patch)?;
        validator::check_illegal_paused_running_update(&current, &patch, self.clock.as_ref())?;

        let (updated, change_list, dirty) = Self::diff(&current, &patch);

        if !dirty {
            return Ok(current);
        }

        validator::validate_experiment(&updated)?;

        if (updated.application_name.as_str(), updated.label.as_str())
            != (current.application_name.as_str(), current.label.as_str())
        {
            if let Some(existing) = self
                .primary
                .get_experiment_by_label(&updated.application_name, &updated.label)?
            {
                if existing.id != id {
                    return Err(ServiceError::Conflict(format!(
                        "experiment {}/{} already exists",
                        updated.application_name, updated.label
                    )));
                }
            }
        }

        // Rule-compile failures are pre-store: treated as validation, so
        // they never leave a store half-updated (spec §4.8).
        let recompiled_rule: Option<CompiledRule> = if updated.rule != current.rule && !updated.rule.is_empty()
        {
            Some(self.rule_compiler.parse(&updated.rule)?)
        } else {
            None
        };

        self.primary.update_experiment(&updated)?;

        if let Err(e) = self.secondary.update_experiment(&updated) {
            log::warn!("update({id}): secondary.update failed ({e}), restoring primary");
            if let Err(e2) = self.primary.update_experiment(&current) {
                log::error!("update({id}): compensation failed to restore primary row: {e2}");
            }
            return Err(e.into());
        }

        if updated.application_name != current.application_name {
            self.undo_priority_append(&current.application_name, id);
            if let Err(e) = self.priorities.append(&updated.application_name, id) {
                log::warn!("update({id}): failed to re-append to priorities[{}]: {e}", updated.application_name);
            }
        }

        if updated.rule != current.rule {
            if updated.rule.is_empty() {
                self.rule_cache.clear(id);
            } else if let Some(compiled) = recompiled_rule {
                self.rule_cache.set(id, compiled);
            }
        }

        if updated.state != ExperimentState::Draft {
            if let Err(e) = self.primary.log_experiment_changes(id, &change_list) {
                log::warn!("update({id}): failed to persist audit log: {e}");
            }
            for change in &change_list {
                self.event_log.post(Event::Change(ExperimentChangeEvent {
                    user: user.clone(),
                    experiment: updated.clone(),
                    attribute_name: change.attribute_name,
                    old_value: change.old_value.clone(),
                    new_value: change.new_value.clone(),
                }));
            }
        }

        if matches!(
            updated.state,
            ExperimentState::Terminated | ExperimentState::Deleted
        ) {
            self.undo_priority_append(&updated.application_name, id);
            if let Err(e) = self.pages.erase_page_data(&updated.application_name, id, &user) {
                log::warn!("update({id}): failed to erase page data: {e}");
            }
        }

        Ok(updated)
    }

    /// Overlays `patch` onto `current`, returning the merged experiment,
    /// the audit change list, and whether anything changed at all.
    /// `applicationName`/`label` are applied but never audited (Design
    /// Notes: "Audit scope mismatch" — they only ever change in DRAFT,
    /// and DRAFT mutations are never audited).
    fn diff(current: &Experiment, patch: &ExperimentPatch) -> (Experiment, Vec<ExperimentAuditInfo>, bool) {
        let mut updated = current.clone();
        let mut changes = Vec::new();
        let mut dirty = false;

        if let Some(v) = &patch.application_name {
            if v != &updated.application_name {
                updated.application_name = v.clone();
                dirty = true;
            }
        }
        if let Some(v) = &patch.label {
            if v != &updated.label {
                updated.label = v.clone();
                dirty = true;
            }
        }
        if let Some(v) = &patch.description {
            if v != &updated.description {
                changes.push(audit("description", &updated.description, v));
                updated.description = v.clone();
                dirty = true;
            }
        }
        if let Some(to) = patch.state {
            if to != updated.state {
                changes.push(audit("state", &updated.state.to_string(), &to.to_string()));
                updated.state = to;
                dirty = true;
            }
        }
        if let Some(v) = patch.start_time {
            if v != updated.start_time {
                changes.push(audit("startTime", &fmt_ts(updated.start_time), &fmt_ts(v)));
                updated.start_time = v;
                dirty = true;
            }
        }
        if let Some(v) = patch.end_time {
            if v != updated.end_time {
                changes.push(audit("endTime", &fmt_ts(updated.end_time), &fmt_ts(v)));
                updated.end_time = v;
                dirty = true;
            }
        }
        if let Some(v) = patch.sampling_percent {
            if (v - updated.sampling_percent).abs() > f64::EPSILON {
                changes.push(audit(
                    "samplingPercent",
                    &updated.sampling_percent.to_string(),
                    &v.to_string(),
                ));
                updated.sampling_percent = v;
                dirty = true;
            }
        }
        if let Some(v) = &patch.rule {
            if v != &updated.rule {
                changes.push(audit("rule", &updated.rule, v));
                updated.rule = v.clone();
                dirty = true;
            }
        }
        if let Some(v) = patch.is_personalization_enabled {
            if v != updated.personalization.is_personalization_enabled {
                changes.push(audit(
                    "isPersonalizationEnabled",
                    &updated.personalization.is_personalization_enabled.to_string(),
                    &v.to_string(),
                ));
                updated.personalization.is_personalization_enabled = v;
                dirty = true;
            }
        }
        if let Some(v) = &patch.model_name {
            if v != &updated.personalization.model_name {
                changes.push(audit(
                    "modelName",
                    &opt_str(&updated.personalization.model_name),
                    &opt_str(v),
                ));
                updated.personalization.model_name = v.clone();
                dirty = true;
            }
        }
        if let Some(v) = &patch.model_version {
            if v != &updated.personalization.model_version {
                changes.push(audit(
                    "modelVersion",
                    &opt_str(&updated.personalization.model_version),
                    &opt_str(v),
                ));
                updated.personalization.model_version = v.clone();
                dirty = true;
            }
        }
        if let Some(v) = patch.is_rapid_experiment {
            if v != updated.is_rapid_experiment {
                changes.push(audit(
                    "isRapidExperiment",
                    &updated.is_rapid_experiment.to_string(),
                    &v.to_string(),
                ));
                updated.is_rapid_experiment = v;
                dirty = true;
            }
        }
        if let Some(v) = &patch.user_cap {
            if v != &updated.user_cap {
                changes.push(audit("userCap", &opt_u64(updated.user_cap), &opt_u64(*v)));
                updated.user_cap = *v;
                dirty = true;
            }
        }

        (updated, changes, dirty)
    }
}

fn audit(attribute_name: &'static str, old_value: &str, new_value: &str) -> ExperimentAuditInfo {
    ExperimentAuditInfo {
        attribute_name,
        old_value: old_value.to_string(),
        new_value: new_value.to_string(),
    }
}

fn fmt_ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn opt_str(v: &Option<String>) -> String {
    v.clone().unwrap_or_else(|| "none".to_string())
}

fn opt_u64(v: Option<u64>) -> String {
    v.map(|n| n.to_string()).unwrap_or_else(|| "none".to_string())
}
