/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Per-application ordering used to resolve overlapping eligible
//! experiments (spec §4.3). Authoritative for invariant I7: exactly the
//! ids of non-terminal experiments for an application, each once.

use crate::error::RepositoryError;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

pub trait PriorityList: Send + Sync {
    /// Idempotent: appending an id already present is a no-op.
    fn append(&self, app: &str, id: Uuid) -> Result<(), RepositoryError>;
    fn remove(&self, app: &str, id: Uuid) -> Result<(), RepositoryError>;
    fn reorder(&self, app: &str, new_order: Vec<Uuid>) -> Result<(), RepositoryError>;
    fn list(&self, app: &str) -> Vec<Uuid>;
}

/// Mutations on the same application are serialized by holding the
/// write lock for the duration of the call; reads take a snapshot under
/// the read lock (spec §5).
#[derive(Default)]
pub struct InMemoryPriorityList {
    inner: RwLock<HashMap<String, Vec<Uuid>>>,
}

impl InMemoryPriorityList {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PriorityList for InMemoryPriorityList {
    fn append(&self, app: &str, id: Uuid) -> Result<(), RepositoryError> {
        let mut map = self.inner.write();
        let list = map.entry(app.to_string()).or_default();
        if !list.contains(&id) {
            list.push(id);
        }
        Ok(())
    }

    fn remove(&self, app: &str, id: Uuid) -> Result<(), RepositoryError> {
        let mut map = self.inner.write();
        if let Some(list) = map.get_mut(app) {
            list.retain(|existing| existing != &id);
        }
        Ok(())
    }

    fn reorder(&self, app: &str, new_order: Vec<Uuid>) -> Result<(), RepositoryError> {
        self.inner.write().insert(app.to_string(), new_order);
        Ok(())
    }

    fn list(&self, app: &str) -> Vec<Uuid> {
        self.inner.read().get(app).cloned().unwrap_or_default()
    }
}
