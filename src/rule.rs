/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Segmentation rule compilation and caching. The grammar itself is
//! opaque to the core (out of scope, per spec §1) — only the contract
//! "does this expression parse" and "cache it by experiment id" matters
//! here. Compilation is backed by `jexl-eval`, the same expression
//! engine the teacher's targeting code evaluates segmentation-style
//! boolean expressions with.

use crate::error::{Result, RuleParseError};
use jexl_eval::Evaluator;
use parking_lot::RwLock;
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

/// A segmentation expression that has been checked for syntactic
/// validity. The source text is retained; evaluating it against a real
/// user context is out of scope for this crate (see spec §1's
/// Non-goals — "evaluate segmentation rules" is explicitly excluded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledRule {
    source: String,
}

impl CompiledRule {
    pub fn source(&self) -> &str {
        &self.source
    }
}

pub trait RuleCompiler: Send + Sync {
    fn parse(&self, expr: &str) -> Result<CompiledRule>;
}

/// Validates an expression by trial-evaluating it against an empty JSON
/// object. A missing field resolves to `null` under jexl rather than an
/// error, so this only ever rejects actual syntax errors, not
/// data-dependent ones — exactly the "opaque grammar, syntactic
/// validity only" contract spec §4.2 asks for.
#[derive(Debug, Default, Clone, Copy)]
pub struct JexlRuleCompiler;

impl RuleCompiler for JexlRuleCompiler {
    fn parse(&self, expr: &str) -> Result<CompiledRule> {
        if expr.is_empty() {
            return Ok(CompiledRule {
                source: String::new(),
            });
        }
        let evaluator = Evaluator::new();
        evaluator
            .eval_in_context(expr, json!({}))
            .map_err(|e| RuleParseError::Invalid {
                expr: expr.to_string(),
                reason: e.to_string(),
            })?;
        Ok(CompiledRule {
            source: expr.to_string(),
        })
    }
}

pub trait RuleCache: Send + Sync {
    fn get(&self, id: Uuid) -> Option<CompiledRule>;
    fn set(&self, id: Uuid, rule: CompiledRule);
    fn clear(&self, id: Uuid);
}

/// Readers take a shared read lock; writers take the exclusive lock.
/// Purely advisory — losing the cache never changes correctness, only
/// whatever downstream component re-parses the rule on a miss (per
/// spec §4.2/§5).
#[derive(Default)]
pub struct InMemoryRuleCache {
    inner: RwLock<HashMap<Uuid, CompiledRule>>,
}

impl InMemoryRuleCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RuleCache for InMemoryRuleCache {
    fn get(&self, id: Uuid) -> Option<CompiledRule> {
        self.inner.read().get(&id).cloned()
    }

    fn set(&self, id: Uuid, rule: CompiledRule) {
        self.inner.write().insert(id, rule);
    }

    fn clear(&self, id: Uuid) {
        self.inner.write().remove(&id);
    }
}
