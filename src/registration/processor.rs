//! Message processor: runs one turn of the registration conversation.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::fields::{Field, FieldValue};
use super::sequencer::{FieldPrompt, NextStep, next_field};
use crate::error::{DatabaseError, Error, RegistrationError, Result, ValidationError};
use crate::registration::model::{RegistrationRecord, Sender};
use crate::store::Database;

/// Greeting sent when a session starts. Ends with the first question.
pub const WELCOME_MESSAGE: &str = "Welcome to KaryaPath! I'll help you register for our platform. \
     This registration will help us guide you better through your apprenticeship and career journey. \
     Let's start with your basic information.\n\n\
     First, could you please tell me your full name?";

/// Sent once every field has been collected.
pub const COMPLETION_MESSAGE: &str = "Thank you! Your registration is complete. \
     We'll use this information to provide you with better guidance for your career journey.";

const INVALID_INPUT_PREFIX: &str = "I'm sorry, but that doesn't seem to be a valid input.";

/// Outbound reply for one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationResponse {
    pub message: String,
    #[serde(default)]
    pub completed: bool,
    pub session_id: String,
}

/// Drives registration sessions against a [`Database`].
pub struct RegistrationService {
    db: Arc<dyn Database>,
}

impl RegistrationService {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// The store handle this service writes through.
    pub fn db(&self) -> &Arc<dyn Database> {
        &self.db
    }

    /// Create a session and send the welcome message.
    ///
    /// A session id that already exists fails with
    /// [`RegistrationError::DuplicateSession`].
    pub async fn start(&self, user_id: &str, session_id: &str) -> Result<RegistrationResponse> {
        self.db
            .create_session(user_id, session_id)
            .await
            .map_err(|e| match e {
                DatabaseError::Constraint(_) => Error::from(RegistrationError::DuplicateSession {
                    session_id: session_id.to_string(),
                }),
                other => Error::from(other),
            })?;

        self.db
            .append_message(session_id, WELCOME_MESSAGE, Sender::System)
            .await?;

        info!(session_id = session_id, user_id = user_id, "Registration session started");
        Ok(RegistrationResponse {
            message: WELCOME_MESSAGE.to_string(),
            completed: false,
            session_id: session_id.to_string(),
        })
    }

    /// Handle one inbound message for an existing session.
    ///
    /// Field validation failures are answered in-band: the error is recorded
    /// in the transcript and the same field stays pending.
    pub async fn handle(&self, session_id: &str, text: &str) -> Result<RegistrationResponse> {
        if self.db.get_session(session_id).await?.is_none() {
            return Err(RegistrationError::SessionNotFound {
                session_id: session_id.to_string(),
            }
            .into());
        }

        self.db
            .append_message(session_id, text, Sender::User)
            .await?;

        let mut record = self
            .db
            .ensure_registration(session_id, today())
            .await?;

        let prompt = match next_field(Some(&record)) {
            NextStep::Complete => return self.complete(session_id).await,
            NextStep::Prompt(prompt) => prompt,
        };

        let value = match prompt.field.parse(text, &record) {
            Ok(value) => value,
            Err(err) => return self.reject(session_id, &prompt, err).await,
        };

        match self.write_field(session_id, &value).await {
            Ok(true) => {
                debug!(session_id = session_id, field = %prompt.field, "Field accepted");
                value.apply_to(&mut record);
            }
            Ok(false) => {
                // Another turn filled this slot first; answer from the stored state.
                warn!(
                    session_id = session_id,
                    field = %prompt.field,
                    "Field already set by a concurrent turn"
                );
                record = self
                    .db
                    .get_registration(session_id)
                    .await?
                    .unwrap_or(record);
            }
            Err(FieldWriteError::Validation(err)) => {
                return self.reject(session_id, &prompt, err).await;
            }
            Err(FieldWriteError::Other(e)) => return Err(e),
        }

        match next_field(Some(&record)) {
            NextStep::Complete => self.complete(session_id).await,
            NextStep::Prompt(next) => self.reply(session_id, next.text, false).await,
        }
    }

    /// Persist a parsed value. A registration code already held by another
    /// record is reported as a validation failure.
    async fn write_field(
        &self,
        session_id: &str,
        value: &FieldValue,
    ) -> std::result::Result<bool, FieldWriteError> {
        match self.db.update_registration_field(session_id, value).await {
            Ok(written) => Ok(written),
            Err(DatabaseError::Constraint(_)) if value.field() == Field::NapsRegistrationCode => {
                Err(FieldWriteError::Validation(ValidationError::new(
                    Field::NapsRegistrationCode,
                    "This NAPS registration code is already registered.",
                )))
            }
            Err(e) => Err(FieldWriteError::Other(e.into())),
        }
    }

    async fn reject(
        &self,
        session_id: &str,
        prompt: &FieldPrompt,
        err: ValidationError,
    ) -> Result<RegistrationResponse> {
        info!(
            session_id = session_id,
            field = %err.field,
            detail = %err.detail,
            "Field validation failed"
        );
        let message = format!("{INVALID_INPUT_PREFIX} {err}\n\n{}", prompt.text);
        self.reply(session_id, message, false).await
    }

    async fn complete(&self, session_id: &str) -> Result<RegistrationResponse> {
        if self.db.mark_session_completed(session_id).await? {
            info!(session_id = session_id, "Registration completed");
        }
        self.reply(session_id, COMPLETION_MESSAGE.to_string(), true)
            .await
    }

    async fn reply(
        &self,
        session_id: &str,
        message: String,
        completed: bool,
    ) -> Result<RegistrationResponse> {
        self.db
            .append_message(session_id, &message, Sender::System)
            .await?;
        Ok(RegistrationResponse {
            message,
            completed,
            session_id: session_id.to_string(),
        })
    }

    /// Current record for a session, if the first answer has arrived.
    pub async fn record(&self, session_id: &str) -> Result<Option<RegistrationRecord>> {
        Ok(self.db.get_registration(session_id).await?)
    }
}

enum FieldWriteError {
    Validation(ValidationError),
    Other(Error),
}

/// Registration date stamped on newly created records.
fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::registration::choices::{EducationTrade, QualificationType, SchemeTrade};
    use crate::registration::fields::FIELD_ORDER;
    use crate::registration::model::{RegistrationSession, TranscriptMessage, Trade};
    use crate::store::LibSqlBackend;

    async fn test_service() -> RegistrationService {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        RegistrationService::new(db)
    }

    /// Answers for every field up to (not including) the trade.
    fn answers_before_trade(qualification: &str) -> Vec<String> {
        vec![
            "Asha Kumari".into(),
            "NAPS123456".into(),
            "1998-05-14".into(),
            "Female".into(),
            "No".into(),
            "Meena Kumari".into(),
            "Mother".into(),
            "Hindu".into(),
            "General".into(),
            qualification.into(),
        ]
    }

    async fn send_all(service: &RegistrationService, session: &str, answers: &[String]) {
        for answer in answers {
            let resp = service.handle(session, answer).await.unwrap();
            assert!(
                !resp.message.starts_with(INVALID_INPUT_PREFIX),
                "answer {answer:?} was rejected: {}",
                resp.message
            );
        }
    }

    /// Index in the fixed order of the first unset field.
    fn filled_prefix(record: &RegistrationRecord) -> usize {
        FIELD_ORDER
            .iter()
            .position(|f| !f.is_filled(record))
            .unwrap_or(FIELD_ORDER.len())
    }

    #[tokio::test]
    async fn start_creates_session_and_welcome() {
        let service = test_service().await;
        let resp = service.start("user-1", "sess-1").await.unwrap();

        assert_eq!(resp.message, WELCOME_MESSAGE);
        assert!(!resp.completed);
        assert_eq!(resp.session_id, "sess-1");

        let transcript = service.db().list_messages("sess-1").await.unwrap();
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].sender, Sender::System);
        assert!(service.record("sess-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_start_fails() {
        let service = test_service().await;
        service.start("user-1", "sess-1").await.unwrap();
        let err = service.start("user-1", "sess-1").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Registration(RegistrationError::DuplicateSession { .. })
        ));
        let transcript = service.db().list_messages("sess-1").await.unwrap();
        assert_eq!(transcript.len(), 1);
    }

    #[tokio::test]
    async fn unknown_session_is_rejected() {
        let service = test_service().await;
        let err = service.handle("nope", "hello").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Registration(RegistrationError::SessionNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn first_message_creates_record_and_asks_for_code() {
        let service = test_service().await;
        service.start("user-1", "sess-1").await.unwrap();

        let resp = service.handle("sess-1", "  Asha Kumari ").await.unwrap();
        assert_eq!(
            resp.message,
            Field::NapsRegistrationCode.prompt(None)
        );

        let record = service.record("sess-1").await.unwrap().unwrap();
        assert_eq!(record.name.as_deref(), Some("Asha Kumari"));
        assert_eq!(record.registration_date, today());

        let transcript = service.db().list_messages("sess-1").await.unwrap();
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript[1].sender, Sender::User);
        assert_eq!(transcript[1].message, "  Asha Kumari ");
        assert_eq!(transcript[2].message, resp.message);
    }

    #[tokio::test]
    async fn bad_code_keeps_field_pending() {
        let service = test_service().await;
        service.start("user-1", "sess-1").await.unwrap();
        service.handle("sess-1", "Asha").await.unwrap();

        for bad in ["123456789", "123456789012"] {
            let resp = service.handle("sess-1", bad).await.unwrap();
            assert!(resp.message.starts_with(INVALID_INPUT_PREFIX));
            assert!(resp.message.contains("NAPS registration code"));
            assert!(!resp.completed);
            let record = service.record("sess-1").await.unwrap().unwrap();
            assert!(record.naps_registration_code.is_none());
        }

        let resp = service.handle("sess-1", "1234567890").await.unwrap();
        assert_eq!(resp.message, Field::DateOfBirth.prompt(None));
    }

    #[tokio::test]
    async fn date_of_birth_validation() {
        let service = test_service().await;
        service.start("user-1", "sess-1").await.unwrap();
        send_all(&service, "sess-1", &["Asha".to_string(), "NAPS123456".to_string()]).await;

        for bad in ["2024-02-30", "not-a-date"] {
            let resp = service.handle("sess-1", bad).await.unwrap();
            assert!(resp.message.starts_with(INVALID_INPUT_PREFIX));
            assert!(resp.message.ends_with(&Field::DateOfBirth.prompt(None)));
        }

        let resp = service.handle("sess-1", "1998-05-14").await.unwrap();
        assert_eq!(resp.message, Field::Gender.prompt(None));
    }

    #[tokio::test]
    async fn rejected_turn_still_writes_two_messages() {
        let service = test_service().await;
        service.start("user-1", "sess-1").await.unwrap();
        service.handle("sess-1", "").await.unwrap();

        let transcript = service.db().list_messages("sess-1").await.unwrap();
        assert_eq!(transcript.len(), 3);
        assert!(transcript[2].message.starts_with(INVALID_INPUT_PREFIX));
        assert!(service.record("sess-1").await.unwrap().unwrap().name.is_none());
    }

    #[tokio::test]
    async fn educational_branch_lists_education_trades() {
        let service = test_service().await;
        service.start("user-1", "sess-1").await.unwrap();
        let answers = answers_before_trade("Educational Qualification");
        send_all(&service, "sess-1", &answers[..answers.len() - 1]).await;

        let resp = service
            .handle("sess-1", "Educational Qualification")
            .await
            .unwrap();
        for trade in EducationTrade::ALL {
            assert!(resp.message.contains(&format!("- {trade}")));
        }
        assert!(!resp.message.contains("- NULM"));
    }

    #[tokio::test]
    async fn scheme_branch_lists_scheme_trades() {
        let service = test_service().await;
        service.start("user-1", "sess-1").await.unwrap();
        let answers = answers_before_trade("Trained Under Schemes");
        send_all(&service, "sess-1", &answers[..answers.len() - 1]).await;

        let resp = service
            .handle("sess-1", "Trained Under Schemes")
            .await
            .unwrap();
        for trade in SchemeTrade::ALL {
            assert!(resp.message.contains(&format!("- {trade}")));
        }
        assert!(!resp.message.contains("- Doctoral"));

        // An education trade is out of domain on the scheme branch.
        let resp = service.handle("sess-1", "Doctoral").await.unwrap();
        assert!(resp.message.starts_with(INVALID_INPUT_PREFIX));
    }

    #[tokio::test]
    async fn full_walk_completes_exactly_once() {
        let service = test_service().await;
        service.start("user-1", "sess-1").await.unwrap();
        send_all(
            &service,
            "sess-1",
            &answers_before_trade("Educational Qualification"),
        )
        .await;

        let resp = service.handle("sess-1", "ITI").await.unwrap();
        assert_eq!(resp.message, COMPLETION_MESSAGE);
        assert!(resp.completed);
        assert!(service.db().get_session("sess-1").await.unwrap().unwrap().completed);

        let record = service.record("sess-1").await.unwrap().unwrap();
        assert_eq!(
            record.qualification_type,
            Some(QualificationType::Educational)
        );
        assert_eq!(record.trade, Some(Trade::Education(EducationTrade::Iti)));
        let before = record.updated_at;

        // Further turns answer with the completion notice and change nothing.
        let again = service.handle("sess-1", "anything").await.unwrap();
        assert_eq!(again.message, COMPLETION_MESSAGE);
        assert!(again.completed);
        let after = service.record("sess-1").await.unwrap().unwrap();
        assert_eq!(after.updated_at, before);
        assert!(!service.db().mark_session_completed("sess-1").await.unwrap());
    }

    #[tokio::test]
    async fn fields_fill_in_order_across_mixed_turns() {
        let service = test_service().await;
        service.start("user-1", "sess-1").await.unwrap();

        let inputs = [
            "Asha", "short", "NAPS123456", "1998-13-01", "1998-05-14", "F", "Female", "No",
            "Meena", "Aunt", "Mother", "Hindu", "Other", "General", "Scheme",
            "Trained Under Schemes", "PMKVY",
        ];
        let mut last_prefix = 0;
        for input in inputs {
            service.handle("sess-1", input).await.unwrap();
            let record = service.record("sess-1").await.unwrap().unwrap();
            let prefix = filled_prefix(&record);
            // Nothing after the first gap is ever set.
            for field in &FIELD_ORDER[prefix..] {
                assert!(!field.is_filled(&record), "{field} set out of order");
            }
            assert!(prefix >= last_prefix);
            last_prefix = prefix;
        }
        assert_eq!(last_prefix, FIELD_ORDER.len());
        assert!(service.db().get_session("sess-1").await.unwrap().unwrap().completed);
    }

    #[tokio::test]
    async fn code_taken_by_another_session_is_a_validation_error() {
        let service = test_service().await;
        for session in ["a", "b"] {
            service.start("user", session).await.unwrap();
            service.handle(session, "Asha").await.unwrap();
        }
        service.handle("a", "NAPS123456").await.unwrap();

        let resp = service.handle("b", "NAPS123456").await.unwrap();
        assert!(resp.message.contains("already registered"));
        let record = service.record("b").await.unwrap().unwrap();
        assert!(record.naps_registration_code.is_none());
    }

    #[tokio::test]
    async fn write_field_reports_lost_race() {
        let service = test_service().await;
        service.start("user-1", "sess-1").await.unwrap();
        service.handle("sess-1", "Asha").await.unwrap();

        // Simulate a concurrent turn that already stored a code.
        let db = service.db();
        let other = FieldValue::NapsRegistrationCode("OTHER12345".into());
        assert!(db.update_registration_field("sess-1", &other).await.unwrap());

        let mine = FieldValue::NapsRegistrationCode("MINE123456".into());
        assert!(matches!(service.write_field("sess-1", &mine).await, Ok(false)));

        let record = service.record("sess-1").await.unwrap().unwrap();
        assert_eq!(record.naps_registration_code.as_deref(), Some("OTHER12345"));
    }

    /// Store that lets a competing write land just before the next field update.
    struct RacingDb {
        inner: LibSqlBackend,
        competing: Mutex<Option<FieldValue>>,
    }

    #[async_trait]
    impl Database for RacingDb {
        async fn init_schema(&self) -> std::result::Result<(), DatabaseError> {
            self.inner.init_schema().await
        }

        async fn create_session(
            &self,
            user_id: &str,
            session_id: &str,
        ) -> std::result::Result<RegistrationSession, DatabaseError> {
            self.inner.create_session(user_id, session_id).await
        }

        async fn get_session(
            &self,
            session_id: &str,
        ) -> std::result::Result<Option<RegistrationSession>, DatabaseError> {
            self.inner.get_session(session_id).await
        }

        async fn mark_session_completed(
            &self,
            session_id: &str,
        ) -> std::result::Result<bool, DatabaseError> {
            self.inner.mark_session_completed(session_id).await
        }

        async fn append_message(
            &self,
            session_id: &str,
            message: &str,
            sender: Sender,
        ) -> std::result::Result<TranscriptMessage, DatabaseError> {
            self.inner.append_message(session_id, message, sender).await
        }

        async fn list_messages(
            &self,
            session_id: &str,
        ) -> std::result::Result<Vec<TranscriptMessage>, DatabaseError> {
            self.inner.list_messages(session_id).await
        }

        async fn get_registration(
            &self,
            session_id: &str,
        ) -> std::result::Result<Option<RegistrationRecord>, DatabaseError> {
            self.inner.get_registration(session_id).await
        }

        async fn ensure_registration(
            &self,
            session_id: &str,
            registration_date: NaiveDate,
        ) -> std::result::Result<RegistrationRecord, DatabaseError> {
            self.inner
                .ensure_registration(session_id, registration_date)
                .await
        }

        async fn update_registration_field(
            &self,
            session_id: &str,
            value: &FieldValue,
        ) -> std::result::Result<bool, DatabaseError> {
            let competing = self.competing.lock().unwrap().take();
            if let Some(competing) = competing {
                assert!(
                    self.inner
                        .update_registration_field(session_id, &competing)
                        .await?
                );
            }
            self.inner.update_registration_field(session_id, value).await
        }
    }

    #[tokio::test]
    async fn handle_answers_from_stored_state_after_lost_race() {
        let racing = Arc::new(RacingDb {
            inner: LibSqlBackend::new_memory().await.unwrap(),
            competing: Mutex::new(None),
        });
        let service = RegistrationService::new(racing.clone());
        service.start("user-1", "sess-1").await.unwrap();
        service.handle("sess-1", "Asha").await.unwrap();

        *racing.competing.lock().unwrap() =
            Some(FieldValue::NapsRegistrationCode("OTHER12345".into()));
        let resp = service.handle("sess-1", "MINE123456").await.unwrap();

        let record = service.record("sess-1").await.unwrap().unwrap();
        assert_eq!(record.naps_registration_code.as_deref(), Some("OTHER12345"));
        assert!(!resp.completed);
        assert_eq!(resp.message, Field::DateOfBirth.prompt(Some(&record)));

        let transcript = service.db().list_messages("sess-1").await.unwrap();
        assert_eq!(transcript.last().unwrap().message, resp.message);
    }
}
