/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Bucket assignment math is out of scope (spec §1) — this collaborator
//! only fetches the [`BucketList`] for an experiment so the service can
//! validate it during a DRAFT -> RUNNING transition (spec §3, "owned by
//! the Buckets collaborator").

use crate::error::RepositoryError;
use crate::model::BucketList;
use uuid::Uuid;

pub trait Buckets: Send + Sync {
    fn get_buckets(&self, id: Uuid) -> Result<BucketList, RepositoryError>;
}
