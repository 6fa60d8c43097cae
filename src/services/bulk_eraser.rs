//! Bulk Eraser
//!
//! Deletes every bookmark of every chat the index knows about, then empties
//! the index. Execution needs a [`ConfirmedErase`], which can only be reached
//! from an [`ErasePlan`] through two confirmations.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::host::{ChatContext, ChatStorage};
use crate::managers::bookmark_store::{BookmarkStore, BookmarkStoreTrait};
use crate::types::chat::ChatDocument;
use crate::types::index::IndexSummary;

/// What an erase would destroy. First step of the confirmation chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErasePlan {
    summary: IndexSummary,
}

/// Confirmed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HalfConfirmed {
    summary: IndexSummary,
}

/// Confirmed twice; accepted by [`BulkEraser::execute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedErase {
    summary: IndexSummary,
}

impl ErasePlan {
    pub fn new<C: ChatContext>(store: &BookmarkStore<C>) -> Self {
        Self {
            summary: store.summary(),
        }
    }

    pub fn summary(&self) -> &IndexSummary {
        &self.summary
    }

    pub fn confirm(self) -> HalfConfirmed {
        HalfConfirmed {
            summary: self.summary,
        }
    }

    /// Applies `count` confirmations at once; fewer than two yields `None`.
    pub fn confirm_times(self, count: u32) -> Option<ConfirmedErase> {
        (count >= 2).then(|| self.confirm().confirm())
    }
}

impl HalfConfirmed {
    pub fn summary(&self) -> &IndexSummary {
        &self.summary
    }

    pub fn confirm(self) -> ConfirmedErase {
        ConfirmedErase {
            summary: self.summary,
        }
    }
}

impl ConfirmedErase {
    pub fn summary(&self) -> &IndexSummary {
        &self.summary
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmStep {
    First,
    Final,
}

/// Asks the user. Returning `false` at either step cancels the erase.
#[async_trait]
pub trait Confirmer: Send {
    async fn confirm(&mut self, step: ConfirmStep, summary: &IndexSummary) -> bool;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EraseReport {
    /// Distinct characters in the index snapshot.
    pub characters: usize,
    pub chats_cleared: usize,
    pub errors: Vec<String>,
}

pub struct BulkEraser<'a, S: ChatStorage> {
    storage: &'a S,
}

impl<'a, S: ChatStorage> BulkEraser<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    /// Runs both confirmation steps through `confirmer`, then erases.
    /// Returns `None` if either step was declined.
    pub async fn erase_all_with<C: ChatContext>(&self, store: &mut BookmarkStore<C>, confirmer: &mut dyn Confirmer) -> Option<EraseReport> {
        let plan = ErasePlan::new(store);
        if !confirmer.confirm(ConfirmStep::First, plan.summary()).await {
            info!("bulk erase declined");
            return None;
        }
        let half = plan.confirm();
        if !confirmer.confirm(ConfirmStep::Final, half.summary()).await {
            info!("bulk erase declined at final step");
            return None;
        }
        Some(self.execute(store, half.confirm()).await)
    }

    pub async fn execute<C: ChatContext>(&self, store: &mut BookmarkStore<C>, _confirmed: ConfirmedErase) -> EraseReport {
        let snapshot = store.index().keys();
        let active = store.active_key();
        let mut report = EraseReport {
            characters: snapshot
                .iter()
                .map(|k| k.character_id)
                .collect::<BTreeSet<_>>()
                .len(),
            ..EraseReport::default()
        };

        if let Some(key) = active.as_ref().filter(|k| snapshot.contains(k)) {
            store.working_set_mut().clear();
            match store.save() {
                Ok(()) => report.chats_cleared += 1,
                Err(e) => {
                    warn!(chat = %key.chat_id, error = %e, "failed to clear the open chat");
                    report.errors.push(format!("{}: {}", key.chat_id, e));
                }
            }
        }

        for key in snapshot.iter().filter(|k| active.as_ref() != Some(*k)) {
            let Some(character) = store.context().character(key.character_id).cloned() else {
                warn!(character_id = key.character_id, "indexed character is not loaded");
                report
                    .errors
                    .push(format!("character {} not found", key.character_id));
                continue;
            };
            let label = format!("{}/{}", character.name, key.chat_id);

            let entries = match self
                .storage
                .fetch_chat(&character.name, &key.chat_id, &character.avatar)
                .await
            {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(chat = %label, error = %e, "fetch failed during erase");
                    report.errors.push(format!("{}: fetch failed: {}", label, e));
                    continue;
                }
            };

            let mut doc = ChatDocument::new(entries);
            if !doc.remove_bookmarks() {
                continue;
            }
            match self
                .storage
                .save_chat(&character.name, &key.chat_id, &character.avatar, doc.entries())
                .await
            {
                Ok(()) => report.chats_cleared += 1,
                Err(e) => {
                    warn!(chat = %label, error = %e, "save failed during erase");
                    report.errors.push(format!("{}: save failed: {}", label, e));
                }
            }
        }

        store.reset_index();
        info!(
            characters = report.characters,
            chats_cleared = report.chats_cleared,
            errors = report.errors.len(),
            "bulk erase finished"
        );
        report
    }
}
