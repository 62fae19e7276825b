/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Experiment lifecycle core: creates, validates, mutates and
//! transitions experiments across their state machine while keeping a
//! dual store, an in-memory rule cache, a per-application priority
//! list, and an event log in mutual consistency. HTTP framing, auth,
//! bucket-assignment math, analytics and page-targeting CRUD are out of
//! scope and appear here only as injected collaborator traits.

mod buckets;
mod clock;
mod error;
mod eventlog;
mod locks;
mod model;
mod pages;
mod priority;
mod rule;
mod service;
mod store;
mod validator;

pub use buckets::Buckets;
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{RepositoryError, Result, RuleParseError, ServiceError};
pub use eventlog::{Event, EventLog, ExperimentChangeEvent, ExperimentCreateEvent, InMemoryEventLog};
pub use model::{
    Bucket, BucketList, Experiment, ExperimentAuditInfo, ExperimentPatch, ExperimentState,
    NewExperiment, Personalization, User,
};
pub use pages::{InMemoryPages, Pages};
pub use priority::{InMemoryPriorityList, PriorityList};
pub use rule::{CompiledRule, InMemoryRuleCache, JexlRuleCompiler, RuleCache, RuleCompiler};
pub use service::ExperimentService;
pub use store::{ExperimentStore, InMemoryExperimentStore, StoreRole};
