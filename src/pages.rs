/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Page-targeting binding. Page-targeting CRUD internals are out of
//! scope (spec §1); the core only ever calls `erase_page_data`, on
//! termination (spec §4.6 step 13). `bind_pages`/`unbind_pages` round
//! out the collaborator contract implied by spec §2's "Map from
//! (application, experiment) -> pages; cleared on termination", which
//! `spec.md` otherwise only names through the single `erasePageData`
//! call in §6.

use crate::error::RepositoryError;
use crate::model::User;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

pub trait Pages: Send + Sync {
    fn bind_pages(&self, application_name: &str, id: Uuid, page_ids: Vec<String>) -> Result<(), RepositoryError>;
    fn unbind_pages(&self, application_name: &str, id: Uuid) -> Result<(), RepositoryError>;
    fn erase_page_data(&self, application_name: &str, id: Uuid, user: &User) -> Result<(), RepositoryError>;
    fn pages_for(&self, application_name: &str, id: Uuid) -> Result<Vec<String>, RepositoryError>;
}

#[derive(Default)]
pub struct InMemoryPages {
    bindings: RwLock<HashMap<(String, Uuid), Vec<String>>>,
}

impl InMemoryPages {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Pages for InMemoryPages {
    fn bind_pages(&self, application_name: &str, id: Uuid, page_ids: Vec<String>) -> Result<(), RepositoryError> {
        self.bindings
            .write()
            .insert((application_name.to_string(), id), page_ids);
        Ok(())
    }

    fn unbind_pages(&self, application_name: &str, id: Uuid) -> Result<(), RepositoryError> {
        self.bindings.write().remove(&(application_name.to_string(), id));
        Ok(())
    }

    fn erase_page_data(&self, application_name: &str, id: Uuid, _user: &User) -> Result<(), RepositoryError> {
        self.bindings.write().remove(&(application_name.to_string(), id));
        Ok(())
    }

    fn pages_for(&self, application_name: &str, id: Uuid) -> Result<Vec<String>, RepositoryError> {
        Ok(self
            .bindings
            .read()
            .get(&(application_name.to_string(), id))
            .cloned()
            .unwrap_or_default())
    }
}
