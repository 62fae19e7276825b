/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Domain events and their append-only, best-effort sink. A failure to
//! post never aborts the operation and is never propagated to the
//! caller (spec §4.8) — it's logged and dropped.

use crate::model::{Experiment, User};
use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentCreateEvent {
    pub user: User,
    pub experiment: Experiment,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentChangeEvent {
    pub user: User,
    pub experiment: Experiment,
    pub attribute_name: &'static str,
    pub old_value: String,
    pub new_value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Create(ExperimentCreateEvent),
    Change(ExperimentChangeEvent),
}

pub trait EventLog: Send + Sync {
    fn post(&self, event: Event);
}

/// Records every posted event for inspection by tests and demos; a real
/// deployment would post these via `log`/`tracing` onward to whatever
/// telemetry pipeline the host application wires up.
#[derive(Default)]
pub struct InMemoryEventLog {
    events: Mutex<Vec<Event>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }
}

impl EventLog for InMemoryEventLog {
    fn post(&self, event: Event) {
        log::debug!("experiment event posted: {event:?}");
        self.events.lock().push(event);
    }
}

