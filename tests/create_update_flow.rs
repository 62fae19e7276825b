/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! End-to-end scenarios against the real in-memory collaborators: the
//! happy path, a mid-orchestration failure, and the state-dependent
//! mutability rules.

mod common;

use common::{harness, new_experiment, test_user};
use experiment_lifecycle::{
    ExperimentPatch, ExperimentState, ExperimentStore, PriorityList, ServiceError,
};

#[test]
fn create_happy_path_lands_in_all_collaborators() {
    let h = harness();
    let id = h
        .service
        .create(new_experiment("shop", "cart-cta"), test_user())
        .unwrap();

    let stored = h.service.get(id).unwrap().unwrap();
    assert_eq!(stored.state, ExperimentState::Draft);
    assert_eq!(h.priorities.list("shop"), vec![id]);
    assert!(h.secondary.inner().get_experiment(id).unwrap().is_some());
    assert_eq!(h.events.events().len(), 1);
}

#[test]
fn create_rejects_duplicate_label_within_an_application() {
    let h = harness();
    h.service
        .create(new_experiment("shop", "cart-cta"), test_user())
        .unwrap();

    let err = h
        .service
        .create(new_experiment("shop", "cart-cta"), test_user())
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[test]
fn create_compensates_when_secondary_store_fails() {
    let h = harness();
    h.secondary.fail_next_create();

    let err = h
        .service
        .create(new_experiment("shop", "cart-cta"), test_user())
        .unwrap_err();
    assert!(matches!(err, ServiceError::Repository(_)));

    // Primary row removed, priority entry removed: no partial state survives.
    assert!(h.service.list().unwrap().is_empty());
    assert!(h.priorities.list("shop").is_empty());
    assert!(h
        .service
        .get_by_label("shop", "cart-cta")
        .unwrap()
        .is_none());
}

#[test]
fn create_compensates_when_index_creation_fails() {
    let h = harness();
    // create_indices_for_new_experiment is the last step of create(); a
    // failure there must unwind the priority append and both store rows.
    h.primary.fail_next_indices();

    let err = h
        .service
        .create(new_experiment("shop", "cart-cta"), test_user())
        .unwrap_err();
    assert!(matches!(err, ServiceError::Repository(_)));

    assert!(h.service.list().unwrap().is_empty());
    assert!(h.priorities.list("shop").is_empty());
    assert!(h.secondary.inner().get_experiments().unwrap().is_empty());
}

#[test]
fn draft_to_running_requires_balanced_buckets() {
    let h = common::harness_with_buckets(experiment_lifecycle::BucketList { buckets: vec![] });
    let id = h
        .service
        .create(new_experiment("shop", "cart-cta"), test_user())
        .unwrap();

    let patch = ExperimentPatch {
        state: Some(ExperimentState::Running),
        ..Default::default()
    };
    let err = h.service.update(id, patch, test_user()).unwrap_err();
    assert!(matches!(err, ServiceError::InvalidArgument(_)));
    assert_eq!(h.service.get(id).unwrap().unwrap().state, ExperimentState::Draft);
}

#[test]
fn running_experiment_rejects_application_name_change() {
    let h = harness();
    let id = h
        .service
        .create(new_experiment("shop", "cart-cta"), test_user())
        .unwrap();
    h.service
        .update(
            id,
            ExperimentPatch {
                state: Some(ExperimentState::Running),
                ..Default::default()
            },
            test_user(),
        )
        .unwrap();

    let err = h
        .service
        .update(
            id,
            ExperimentPatch {
                application_name: Some("other-app".into()),
                ..Default::default()
            },
            test_user(),
        )
        .unwrap_err();
    assert!(matches!(err, ServiceError::IllegalUpdateForState { field: "applicationName", .. }));
}

#[test]
fn terminated_experiment_only_allows_description_edits() {
    let h = harness();
    let id = h
        .service
        .create(new_experiment("shop", "cart-cta"), test_user())
        .unwrap();
    h.service
        .update(id, ExperimentPatch { state: Some(ExperimentState::Running), ..Default::default() }, test_user())
        .unwrap();
    h.service
        .update(id, ExperimentPatch { state: Some(ExperimentState::Terminated), ..Default::default() }, test_user())
        .unwrap();

    let updated = h
        .service
        .update(
            id,
            ExperimentPatch {
                description: Some("wrapped up".into()),
                ..Default::default()
            },
            test_user(),
        )
        .unwrap();
    assert_eq!(updated.description, "wrapped up");

    let err = h
        .service
        .update(
            id,
            ExperimentPatch {
                sampling_percent: Some(0.9),
                ..Default::default()
            },
            test_user(),
        )
        .unwrap_err();
    assert!(matches!(err, ServiceError::IllegalUpdateForState { field: "samplingPercent", .. }));

    // Terminating erased the priority entry and the page bindings.
    assert!(h.priorities.list("shop").is_empty());
}

#[test]
fn rule_update_is_cached_and_cleared() {
    let h = harness();
    let id = h
        .service
        .create(new_experiment("shop", "cart-cta"), test_user())
        .unwrap();

    h.service
        .update(
            id,
            ExperimentPatch {
                rule: Some("country == \"US\"".into()),
                ..Default::default()
            },
            test_user(),
        )
        .unwrap();

    let err = h
        .service
        .update(
            id,
            ExperimentPatch {
                rule: Some("country ==".into()),
                ..Default::default()
            },
            test_user(),
        )
        .unwrap_err();
    assert!(matches!(err, ServiceError::RuleParse(_)));

    // The bad rule never reached the store: the last-good state survives.
    let current = h.service.get(id).unwrap().unwrap();
    assert_eq!(current.rule, "country == \"US\"");
}
