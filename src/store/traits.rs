//! Backend-agnostic `Database` trait for registration persistence.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::DatabaseError;
use crate::registration::fields::FieldValue;
use crate::registration::model::{
    RegistrationRecord, RegistrationSession, Sender, TranscriptMessage,
};

/// Persistence contract consumed by the message processor.
///
/// Every operation is scoped to a single session's rows.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    // ── Sessions ────────────────────────────────────────────────────

    /// Create a session. Fails with [`DatabaseError::Constraint`] when the
    /// session id is already taken.
    async fn create_session(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<RegistrationSession, DatabaseError>;

    /// Look up a session by id.
    async fn get_session(
        &self,
        session_id: &str,
    ) -> Result<Option<RegistrationSession>, DatabaseError>;

    /// Set the completion flag. Returns `true` only for the call that flipped it.
    async fn mark_session_completed(&self, session_id: &str) -> Result<bool, DatabaseError>;

    // ── Transcript ──────────────────────────────────────────────────

    /// Append a transcript entry.
    async fn append_message(
        &self,
        session_id: &str,
        message: &str,
        sender: Sender,
    ) -> Result<TranscriptMessage, DatabaseError>;

    /// Full transcript for a session, oldest first.
    async fn list_messages(&self, session_id: &str)
    -> Result<Vec<TranscriptMessage>, DatabaseError>;

    // ── Registration records ────────────────────────────────────────

    /// Load the record for a session, if one exists.
    async fn get_registration(
        &self,
        session_id: &str,
    ) -> Result<Option<RegistrationRecord>, DatabaseError>;

    /// Load the record for a session, creating an empty one stamped with
    /// `registration_date` if absent.
    async fn ensure_registration(
        &self,
        session_id: &str,
        registration_date: NaiveDate,
    ) -> Result<RegistrationRecord, DatabaseError>;

    /// Write one field, only if its slot is still unset.
    ///
    /// Returns `false` when the slot was already filled (e.g. by a concurrent
    /// turn). A value that collides with a unique column fails with
    /// [`DatabaseError::Constraint`].
    async fn update_registration_field(
        &self,
        session_id: &str,
        value: &FieldValue,
    ) -> Result<bool, DatabaseError>;
}
