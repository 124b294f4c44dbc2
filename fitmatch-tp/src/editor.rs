//! Hybrid Profile State Manager
//!
//! [`ProfileEditor`] owns one profile being edited: the merged view shown to
//! the user, the last-saved baseline, and the patch of unsaved edits.
//!
//! The displayed profile is always the baseline with the pending patch
//! applied on top. Saves are optimistic: the edit is visible before the
//! store confirms it, and a failed save leaves both the profile and the
//! pending patch untouched so nothing the user typed is lost.
//!
//! # Supersession
//! Loads and saves come in two halves. `begin_*` hands out a ticket;
//! `finish_*` applies a result only if the ticket is still current:
//! - a load result is dropped unless it answers the most recent `begin_load`
//! - a save result is dropped if a load replaced the session in between
//!
//! [`ProfileEditor::load`], [`ProfileEditor::refresh`] and
//! [`ProfileEditor::save_profile`] drive both halves in one call.

use crate::completion::CompletionRule;
use crate::merger::merge_profile;
use crate::resolver::IdentifierResolver;
use crate::store::{StoreError, TrainerStore};
use crate::types::{ProfilePatch, ResolutionResult, UnifiedTrainerProfile};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Proof that a load was started; see [`ProfileEditor::finish_load`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    seq: u64,
    identifier: String,
}

impl LoadTicket {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// A save in flight: the patch being sent and the session it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveTicket {
    generation: u64,
    trainer_id: Uuid,
    patch: ProfilePatch,
}

impl SaveTicket {
    pub fn trainer_id(&self) -> Uuid {
        self.trainer_id
    }

    pub fn patch(&self) -> &ProfilePatch {
        &self.patch
    }
}

/// What a save attempt did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Nothing to save, or a save was already in flight
    Skipped,
    Saved,
    /// Store rejected the patch; edits are kept and `error` is set
    Failed,
    /// The session was replaced while the save was in flight
    Superseded,
}

#[derive(Debug, Clone)]
struct EditSession {
    profile: UnifiedTrainerProfile,
    baseline: UnifiedTrainerProfile,
    pending: ProfilePatch,
    is_new: bool,
    completion: u8,
}

/// Edit-session state for one trainer profile
pub struct ProfileEditor {
    resolver: IdentifierResolver,
    store: Arc<dyn TrainerStore>,
    rule: CompletionRule,
    identifier: Option<String>,
    session: Option<EditSession>,
    loading: bool,
    saving: bool,
    error: Option<String>,
    load_seq: u64,
    /// Bumped whenever a load result replaces the session
    generation: u64,
}

impl ProfileEditor {
    pub fn new(resolver: IdentifierResolver, store: Arc<dyn TrainerStore>, rule: CompletionRule) -> Self {
        Self {
            resolver,
            store,
            rule,
            identifier: None,
            session: None,
            loading: false,
            saving: false,
            error: None,
            load_seq: 0,
            generation: 0,
        }
    }

    // ------------------------------------------------------------------
    // Consumer-facing state
    // ------------------------------------------------------------------

    pub fn profile_data(&self) -> Option<&UnifiedTrainerProfile> {
        self.session.as_ref().map(|s| &s.profile)
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn saving(&self) -> bool {
        self.saving
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// True while the pending patch holds unsaved edits
    pub fn is_dirty(&self) -> bool {
        self.session.as_ref().is_some_and(|s| !s.pending.is_empty())
    }

    /// True until the first successful save of a trainer with no profile document
    pub fn is_new_profile(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_new)
    }

    pub fn completion_percentage(&self) -> u8 {
        self.session.as_ref().map_or(0, |s| s.completion)
    }

    /// Required fields still empty in the displayed profile
    pub fn missing_required(&self) -> Vec<&'static str> {
        self.session
            .as_ref()
            .map_or_else(Vec::new, |s| self.rule.assess(&s.profile).missing_required)
    }

    /// Identifier of the most recent load
    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    /// Unsaved edits
    pub fn pending(&self) -> Option<&ProfilePatch> {
        self.session.as_ref().map(|s| &s.pending)
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Start a load; every earlier outstanding load ticket becomes stale
    pub fn begin_load(&mut self, identifier: &str) -> LoadTicket {
        self.load_seq += 1;
        self.loading = true;
        self.error = None;
        self.identifier = Some(identifier.to_string());

        LoadTicket {
            seq: self.load_seq,
            identifier: identifier.to_string(),
        }
    }

    /// Apply a resolution result.
    ///
    /// Returns false if the ticket was stale and the result was dropped.
    pub fn finish_load(&mut self, ticket: LoadTicket, result: ResolutionResult) -> bool {
        if ticket.seq != self.load_seq {
            debug!(
                identifier = %ticket.identifier,
                seq = ticket.seq,
                latest = self.load_seq,
                "Dropping superseded profile load"
            );
            return false;
        }

        self.loading = false;
        self.saving = false;
        self.generation += 1;

        match result {
            Ok(resolved) => {
                let profile = merge_profile(&resolved.record);
                let completion = self.rule.score(&profile);
                info!(
                    identifier = %ticket.identifier,
                    trainer_id = %profile.id,
                    method = %resolved.method,
                    completion,
                    "Profile loaded"
                );

                self.error = None;
                self.session = Some(EditSession {
                    is_new: !profile.has_profile_document,
                    baseline: profile.clone(),
                    profile,
                    pending: ProfilePatch::default(),
                    completion,
                });
            }
            Err(e) => {
                warn!(identifier = %ticket.identifier, error = %e, "Profile load failed");
                self.error = Some(e.to_string());
                self.session = None;
            }
        }

        true
    }

    /// Resolve and merge `identifier`, replacing any current session.
    ///
    /// Returns true if a profile is now loaded.
    pub async fn load(&mut self, identifier: &str) -> bool {
        let ticket = self.begin_load(identifier);
        let result = self.resolver.resolve_raw(ticket.identifier()).await;
        self.finish_load(ticket, result);
        self.session.is_some()
    }

    /// Reload the current identifier, discarding unsaved edits
    pub async fn refresh(&mut self) -> bool {
        let Some(identifier) = self.identifier.clone() else {
            return false;
        };
        self.load(&identifier).await
    }

    // ------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------

    /// Merge a partial edit into the profile and the pending patch.
    ///
    /// No I/O. Returns false when no profile is loaded.
    pub fn update_profile_data(&mut self, patch: ProfilePatch) -> bool {
        let rule = self.rule;
        let Some(session) = self.session.as_mut() else {
            return false;
        };

        patch.apply_to(&mut session.profile);
        session.pending.merge_from(patch);
        session.completion = rule.score(&session.profile);
        true
    }

    /// Discard unsaved edits and restore the last-saved profile.
    ///
    /// Returns false (and does nothing) when there is nothing to discard.
    pub fn reset(&mut self) -> bool {
        if !self.is_dirty() {
            return false;
        }
        let rule = self.rule;
        let Some(session) = self.session.as_mut() else {
            return false;
        };

        session.profile = session.baseline.clone();
        session.pending = ProfilePatch::default();
        session.completion = rule.score(&session.profile);
        self.error = None;
        true
    }

    // ------------------------------------------------------------------
    // Saving
    // ------------------------------------------------------------------

    /// Start a save of the pending patch.
    ///
    /// `None` when nothing is dirty or a save is already in flight.
    pub fn begin_save(&mut self) -> Option<SaveTicket> {
        if self.saving || !self.is_dirty() {
            return None;
        }
        let session = self.session.as_ref()?;

        let ticket = SaveTicket {
            generation: self.generation,
            trainer_id: session.profile.id,
            patch: session.pending.clone(),
        };
        self.saving = true;
        self.error = None;
        Some(ticket)
    }

    /// Apply the store's answer to a save
    pub fn finish_save(&mut self, ticket: SaveTicket, result: Result<(), StoreError>) -> SaveOutcome {
        if ticket.generation != self.generation {
            debug!(trainer_id = %ticket.trainer_id, "Dropping save result for replaced session");
            return SaveOutcome::Superseded;
        }
        self.saving = false;

        let rule = self.rule;
        let Some(session) = self.session.as_mut() else {
            return SaveOutcome::Superseded;
        };

        match result {
            Ok(()) => {
                ticket.patch.apply_to(&mut session.baseline);
                session.pending.clear_sent(&ticket.patch);
                session.profile = session.baseline.clone();
                session.pending.apply_to(&mut session.profile);
                session.completion = rule.score(&session.profile);
                session.is_new = false;

                info!(
                    trainer_id = %ticket.trainer_id,
                    fields = ?ticket.patch.field_names(),
                    still_dirty = !session.pending.is_empty(),
                    "Profile saved"
                );
                SaveOutcome::Saved
            }
            Err(e) => {
                warn!(trainer_id = %ticket.trainer_id, error = %e, "Profile save failed; edits kept");
                self.error = Some(e.to_string());
                SaveOutcome::Failed
            }
        }
    }

    /// Persist the pending patch
    pub async fn save_profile(&mut self) -> SaveOutcome {
        let Some(ticket) = self.begin_save() else {
            return SaveOutcome::Skipped;
        };
        let result = self.store.apply_patch(ticket.trainer_id, &ticket.patch).await;
        self.finish_save(ticket, result)
    }
}
