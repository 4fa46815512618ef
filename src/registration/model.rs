//! Registration session, transcript and record models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::choices::{
    Category, EducationTrade, Gender, ParentRelation, QualificationType, Religion, SchemeTrade,
    YesNo,
};

/// One registration conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationSession {
    pub user_id: String,
    pub session_id: String,
    /// Flips to true once, when every field has been collected.
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Who wrote a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    System,
}

impl Sender {
    pub fn is_user(&self) -> bool {
        matches!(self, Self::User)
    }
}

/// An append-only transcript entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub id: i64,
    pub session_id: String,
    pub message: String,
    pub sender: Sender,
    pub created_at: DateTime<Utc>,
}

/// The final, qualification-dependent answer.
///
/// Which arm is valid is decided by the record's qualification type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Trade {
    Education(EducationTrade),
    Scheme(SchemeTrade),
}

impl Trade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Education(t) => t.as_str(),
            Self::Scheme(t) => t.as_str(),
        }
    }
}

impl std::fmt::Display for Trade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The form being filled for a session.
///
/// Fields are `None` until collected; they are filled strictly in
/// [`FIELD_ORDER`](super::fields::FIELD_ORDER).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationRecord {
    pub session_id: String,
    pub registration_date: NaiveDate,
    pub name: Option<String>,
    pub naps_registration_code: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub disability_divyang: Option<YesNo>,
    pub parent_name: Option<String>,
    pub parent_relation: Option<ParentRelation>,
    pub religion: Option<Religion>,
    pub category: Option<Category>,
    pub qualification_type: Option<QualificationType>,
    pub trade: Option<Trade>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RegistrationRecord {
    /// An empty record, as created on the first inbound message.
    pub fn new(session_id: impl Into<String>, registration_date: NaiveDate) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            registration_date,
            name: None,
            naps_registration_code: None,
            date_of_birth: None,
            gender: None,
            disability_divyang: None,
            parent_name: None,
            parent_relation: None,
            religion: None,
            category: None,
            qualification_type: None,
            trade: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trade_serializes_with_kind_tag() {
        let json = serde_json::to_value(Trade::Scheme(SchemeTrade::Nulm)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "scheme", "value": "NULM"}));
    }

    #[test]
    fn new_record_is_empty() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let record = RegistrationRecord::new("s1", date);
        assert_eq!(record.session_id, "s1");
        assert_eq!(record.registration_date, date);
        assert!(record.name.is_none());
        assert!(record.trade.is_none());
    }
}
