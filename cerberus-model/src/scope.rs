//! Per-call ownership context.

use crate::schema::Model;
use cerberus_types::EntryId;
use std::sync::Arc;

/// A model paired with the caller's ownership context.
///
/// The auth layer resolves the owner and the role flags; the engine only
/// reads them. Scopes are cheap to clone and live for one call.
#[derive(Debug, Clone)]
pub struct ModelScope {
    model: Arc<Model>,
    owner: Option<EntryId>,
    skip_ownership: bool,
    skip_restrictions: bool,
}

impl ModelScope {
    pub fn new(model: Arc<Model>) -> Self {
        Self {
            model,
            owner: None,
            skip_ownership: false,
            skip_restrictions: false,
        }
    }

    pub fn with_owner(mut self, owner: EntryId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn skipping_ownership(mut self, skip: bool) -> Self {
        self.skip_ownership = skip;
        self
    }

    pub fn skipping_restrictions(mut self, skip: bool) -> Self {
        self.skip_restrictions = skip;
        self
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    pub fn owner(&self) -> Option<EntryId> {
        self.owner
    }

    /// An owner is set and the model is owner scoped.
    pub fn has_ownership(&self) -> bool {
        !self.model.global && self.owner.is_some()
    }

    /// Queries carry no owner clause.
    pub fn is_skipping_ownership(&self) -> bool {
        !self.has_ownership() || self.skip_ownership
    }

    /// The owner to filter on, if queries are owner scoped.
    pub fn scoping_owner(&self) -> Option<EntryId> {
        if self.is_skipping_ownership() {
            None
        } else {
            self.owner
        }
    }

    /// Updates may touch restricted fields.
    pub fn restrictions_relaxed(&self) -> bool {
        self.model.skip_restrictions || self.skip_restrictions
    }
}
