/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Pure, stateless validation. None of these functions touch a store —
//! the source self-injected a peer `Experiments` reference to re-enter
//! these as instance methods, an artifact of its original framework we
//! don't reproduce; they're plain functions here.

use crate::clock::Clock;
use crate::error::{Result, ServiceError};
use crate::model::{BucketList, Experiment, ExperimentPatch, ExperimentState, NewExperiment};

const SAMPLING_EPSILON: f64 = 1e-9;

fn is_valid_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

/// Field-level checks shared by `create` and the post-diff `update` path.
fn validate_common_fields(
    application_name: &str,
    label: &str,
    sampling_percent: f64,
    start_time: chrono::DateTime<chrono::Utc>,
    end_time: chrono::DateTime<chrono::Utc>,
) -> Result<()> {
    if !is_valid_identifier(application_name) || !is_valid_identifier(label) {
        return Err(ServiceError::InvalidIdentifier(format!(
            "applicationName={application_name:?} label={label:?}"
        )));
    }
    if !(0.0..=1.0).contains(&sampling_percent) {
        return Err(ServiceError::InvalidArgument(
            "samplingPercent must be in [0, 1]".into(),
        ));
    }
    if start_time >= end_time {
        return Err(ServiceError::InvalidArgument(
            "startTime must be before endTime".into(),
        ));
    }
    Ok(())
}

pub fn validate_new_experiment(new: &NewExperiment) -> Result<()> {
    if new.application_name.is_empty() {
        return Err(ServiceError::InvalidArgument(
            "applicationName is required".into(),
        ));
    }
    validate_common_fields(
        &new.application_name,
        &new.label,
        new.sampling_percent,
        new.start_time,
        new.end_time,
    )
}

/// Re-validates the fully merged, post-diff experiment. Called at step 7
/// of `update`, after `checkIllegalUpdate`/`checkIllegalTerminatedUpdate`/
/// `checkIllegalPausedRunningUpdate` have already rejected field-mutability
/// violations.
pub fn validate_experiment(updated: &Experiment) -> Result<()> {
    validate_common_fields(
        &updated.application_name,
        &updated.label,
        updated.sampling_percent,
        updated.start_time,
        updated.end_time,
    )
}

pub fn validate_state_transition(from: ExperimentState, to: ExperimentState) -> Result<()> {
    if !from.can_transition_to(to) {
        return Err(ServiceError::InvalidStateTransition { from, to });
    }
    Ok(())
}

/// DRAFT -> RUNNING additionally requires this to succeed.
pub fn validate_experiment_buckets(buckets: &BucketList) -> Result<()> {
    if buckets.buckets.is_empty() {
        return Err(ServiceError::InvalidArgument(
            "an experiment needs at least one bucket".into(),
        ));
    }
    let mut labels = std::collections::HashSet::new();
    let mut control_count = 0;
    let mut sum = 0.0;
    for bucket in &buckets.buckets {
        if !labels.insert(&bucket.label) {
            return Err(ServiceError::InvalidArgument(format!(
                "duplicate bucket label {:?}",
                bucket.label
            )));
        }
        if bucket.is_control {
            control_count += 1;
        }
        sum += bucket.allocation_percent;
    }
    if control_count != 1 {
        return Err(ServiceError::InvalidArgument(format!(
            "expected exactly one control bucket, found {control_count}"
        )));
    }
    if (sum - 1.0).abs() > SAMPLING_EPSILON {
        return Err(ServiceError::InvalidArgument(format!(
            "bucket allocation percentages must sum to 1, got {sum}"
        )));
    }
    Ok(())
}

/// I1/I4/I6: identity and application/label lock-down. `applicationName`
/// and `label` are only mutable while `state == DRAFT` (I4 names
/// RUNNING/PAUSED explicitly; TERMINATED is covered separately by
/// [`check_illegal_terminated_update`], and DELETED is terminal). I6
/// (unique (app, label) per application) is a cross-experiment
/// invariant and is enforced by the store returning `Conflict`, not
/// here — this function only ever sees one experiment at a time.
pub fn check_illegal_update(current: &Experiment, patch: &ExperimentPatch) -> Result<()> {
    if current.state != ExperimentState::Draft {
        if let Some(app) = &patch.application_name {
            if app != &current.application_name {
                return Err(ServiceError::IllegalUpdateForState {
                    field: "applicationName",
                    state: current.state,
                });
            }
        }
        if let Some(label) = &patch.label {
            if label != &current.label {
                return Err(ServiceError::IllegalUpdateForState {
                    field: "label",
                    state: current.state,
                });
            }
        }
    }
    Ok(())
}

/// I3: in TERMINATED, only `description` is mutable, and `state` may
/// only move to DELETED.
pub fn check_illegal_terminated_update(current: &Experiment, patch: &ExperimentPatch) -> Result<()> {
    if current.state != ExperimentState::Terminated {
        return Ok(());
    }
    let ExperimentPatch {
        application_name,
        label,
        description: _,
        state,
        start_time,
        end_time,
        sampling_percent,
        rule,
        is_personalization_enabled,
        model_name,
        model_version,
        is_rapid_experiment,
        user_cap,
    } = patch;
    let blocked: &[(bool, &'static str)] = &[
        (application_name.is_some(), "applicationName"),
        (label.is_some(), "label"),
        (start_time.is_some(), "startTime"),
        (end_time.is_some(), "endTime"),
        (sampling_percent.is_some(), "samplingPercent"),
        (rule.is_some(), "rule"),
        (is_personalization_enabled.is_some(), "isPersonalizationEnabled"),
        (model_name.is_some(), "modelName"),
        (model_version.is_some(), "modelVersion"),
        (is_rapid_experiment.is_some(), "isRapidExperiment"),
        (user_cap.is_some(), "userCap"),
    ];
    for (present, field) in blocked {
        if *present {
            return Err(ServiceError::IllegalUpdateForState {
                field,
                state: current.state,
            });
        }
    }
    if let Some(to) = state {
        if *to != ExperimentState::Deleted {
            return Err(ServiceError::InvalidStateTransition {
                from: current.state,
                to: *to,
            });
        }
    }
    Ok(())
}

/// I5, for RUNNING/PAUSED only (TERMINATED already rejects any time
/// edit above, DRAFT has no restriction): neither boundary may be moved
/// to the past, and a boundary that has already passed may not be
/// edited at all.
pub fn check_illegal_paused_running_update(
    current: &Experiment,
    patch: &ExperimentPatch,
    clock: &dyn Clock,
) -> Result<()> {
    if !matches!(
        current.state,
        ExperimentState::Running | ExperimentState::Paused
    ) {
        return Ok(());
    }
    let now = clock.now();
    if let Some(new_start) = patch.start_time {
        if current.start_time <= now {
            return Err(ServiceError::IllegalUpdateForState {
                field: "startTime",
                state: current.state,
            });
        }
        if new_start <= now {
            return Err(ServiceError::InvalidArgument(
                "startTime cannot be moved into the past".into(),
            ));
        }
    }
    if let Some(new_end) = patch.end_time {
        if current.end_time <= now {
            return Err(ServiceError::IllegalUpdateForState {
                field: "endTime",
                state: current.state,
            });
        }
        if new_end <= now {
            return Err(ServiceError::InvalidArgument(
                "endTime cannot be moved into the past".into(),
            ));
        }
    }
    Ok(())
}
