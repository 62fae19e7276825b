/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The central data model: experiments, their state machine, buckets and
//! audit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

/// One of the five states an experiment moves through. See
/// [`ExperimentState::can_transition_to`] for the legal edges.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Hash, Eq, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExperimentState {
    Draft,
    Running,
    Paused,
    Terminated,
    Deleted,
}

impl Display for ExperimentState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        Display::fmt(
            match self {
                ExperimentState::Draft => "DRAFT",
                ExperimentState::Running => "RUNNING",
                ExperimentState::Paused => "PAUSED",
                ExperimentState::Terminated => "TERMINATED",
                ExperimentState::Deleted => "DELETED",
            },
            f,
        )
    }
}

impl ExperimentState {
    /// Whether `self -> other` is a legal edge of the state graph in
    /// spec §4.7. No self-transitions are ever legal.
    pub fn can_transition_to(self, other: ExperimentState) -> bool {
        use ExperimentState::*;
        matches!(
            (self, other),
            (Draft, Running)
                | (Draft, Deleted)
                | (Running, Paused)
                | (Paused, Running)
                | (Running, Terminated)
                | (Paused, Terminated)
                | (Terminated, Deleted)
        )
    }
}

/// One arm of an experiment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub label: String,
    pub allocation_percent: f64,
    pub is_control: bool,
}

/// The set of buckets fetched from the `Buckets` collaborator, validated
/// before a DRAFT -> RUNNING transition.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BucketList {
    pub buckets: Vec<Bucket>,
}

/// Personalisation triple, always mutated together conceptually but each
/// field independently patchable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Personalization {
    pub is_personalization_enabled: bool,
    pub model_name: Option<String>,
    pub model_version: Option<String>,
}

/// The central entity. See spec §3 for the semantics of each field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
    pub id: Uuid,
    pub application_name: String,
    pub label: String,
    pub description: String,
    pub state: ExperimentState,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub sampling_percent: f64,
    pub rule: String,
    pub personalization: Personalization,
    pub is_rapid_experiment: bool,
    pub user_cap: Option<u64>,
    pub creation_time: DateTime<Utc>,
    pub modification_time: DateTime<Utc>,
}

/// A request to create a new experiment. Fields the service owns
/// (`id`, `creationTime`, `modificationTime`, `state`) are not present —
/// the service fills them in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewExperiment {
    pub application_name: String,
    pub label: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub sampling_percent: f64,
    pub rule: String,
    pub personalization: Personalization,
    pub is_rapid_experiment: bool,
    pub user_cap: Option<u64>,
}

/// A partial update: every field is either `None` ("unset", no change
/// requested) or `Some` (a concrete new value), per spec §4.6.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentPatch {
    pub application_name: Option<String>,
    pub label: Option<String>,
    pub description: Option<String>,
    pub state: Option<ExperimentState>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub sampling_percent: Option<f64>,
    pub rule: Option<String>,
    pub is_personalization_enabled: Option<bool>,
    pub model_name: Option<Option<String>>,
    pub model_version: Option<Option<String>>,
    pub is_rapid_experiment: Option<bool>,
    pub user_cap: Option<Option<u64>>,
}

/// One (attributeName, oldValue, newValue) triple, as persisted by
/// `logExperimentChanges` and mirrored into one `ExperimentChangeEvent`
/// per entry, for state != DRAFT updates only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentAuditInfo {
    pub attribute_name: &'static str,
    pub old_value: String,
    pub new_value: String,
}

/// The user performing a mutation; opaque to the core beyond carrying an
/// identifier for audit/event payloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct User {
    pub id: String,
}
