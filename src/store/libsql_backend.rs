//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::registration::fields::FieldValue;
use crate::registration::model::{
    RegistrationRecord, RegistrationSession, Sender, Trade, TranscriptMessage,
};
use crate::store::migrations;
use crate::store::traits::Database;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.init_schema().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_date(s: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| DatabaseError::Serialization(format!("invalid stored date '{s}': {e}")))
}

/// Parse an optional stored display value back into its choice type.
fn parse_choice<T>(s: Option<String>) -> Result<Option<T>, DatabaseError>
where
    T: std::str::FromStr<Err = String>,
{
    s.map(|s| s.parse::<T>())
        .transpose()
        .map_err(DatabaseError::Serialization)
}

fn row_err(e: libsql::Error) -> DatabaseError {
    DatabaseError::Query(format!("row parse: {e}"))
}

/// Classify a failed write: unique-key collisions become `Constraint`.
fn write_err(op: &str, e: libsql::Error) -> DatabaseError {
    let msg = e.to_string();
    if msg.contains("UNIQUE constraint failed") {
        DatabaseError::Constraint(format!("{op}: {msg}"))
    } else {
        DatabaseError::Query(format!("{op}: {msg}"))
    }
}

/// Read a nullable TEXT column.
fn opt_text_col(row: &libsql::Row, idx: i32) -> Result<Option<String>, DatabaseError> {
    match row.get_value(idx).map_err(row_err)? {
        libsql::Value::Text(s) => Ok(Some(s)),
        libsql::Value::Null => Ok(None),
        other => Err(DatabaseError::Serialization(format!(
            "column {idx}: expected text, got {other:?}"
        ))),
    }
}

fn is_user_to_sender(is_user: i64) -> Sender {
    if is_user != 0 { Sender::User } else { Sender::System }
}

/// Column holding a field value. The trade lives in one of two columns,
/// picked by its arm.
fn field_column(value: &FieldValue) -> &'static str {
    match value {
        FieldValue::Name(_) => "name",
        FieldValue::NapsRegistrationCode(_) => "naps_registration_code",
        FieldValue::DateOfBirth(_) => "date_of_birth",
        FieldValue::Gender(_) => "gender",
        FieldValue::DisabilityDivyang(_) => "disability_divyang",
        FieldValue::ParentName(_) => "parent_name",
        FieldValue::ParentRelation(_) => "parent_relation",
        FieldValue::Religion(_) => "religion",
        FieldValue::Category(_) => "category",
        FieldValue::QualificationType(_) => "qualification_type",
        FieldValue::Trade(Trade::Education(_)) => "education_trade",
        FieldValue::Trade(Trade::Scheme(_)) => "scheme_trade",
    }
}

/// SQL condition that holds while the value's slot is still unset.
fn unset_condition(value: &FieldValue) -> String {
    match value {
        FieldValue::Trade(_) => "education_trade IS NULL AND scheme_trade IS NULL".to_string(),
        other => format!("{} IS NULL", field_column(other)),
    }
}

const SESSION_COLUMNS: &str = "user_id, session_id, completed, created_at, updated_at";

const MESSAGE_COLUMNS: &str = "id, session_id, message, is_user_message, created_at";

const RECORD_COLUMNS: &str = "session_id, registration_date, name, naps_registration_code, \
     date_of_birth, gender, disability_divyang, parent_name, parent_relation, religion, \
     category, qualification_type, education_trade, scheme_trade, created_at, updated_at";

/// Map a libsql Row to a RegistrationSession. Column order matches SESSION_COLUMNS.
fn row_to_session(row: &libsql::Row) -> Result<RegistrationSession, DatabaseError> {
    let completed: i64 = row.get(2).map_err(row_err)?;
    let created_str: String = row.get(3).map_err(row_err)?;
    let updated_str: String = row.get(4).map_err(row_err)?;
    Ok(RegistrationSession {
        user_id: row.get(0).map_err(row_err)?,
        session_id: row.get(1).map_err(row_err)?,
        completed: completed != 0,
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

/// Map a libsql Row to a TranscriptMessage. Column order matches MESSAGE_COLUMNS.
fn row_to_message(row: &libsql::Row) -> Result<TranscriptMessage, DatabaseError> {
    let is_user: i64 = row.get(3).map_err(row_err)?;
    let created_str: String = row.get(4).map_err(row_err)?;
    Ok(TranscriptMessage {
        id: row.get(0).map_err(row_err)?,
        session_id: row.get(1).map_err(row_err)?,
        message: row.get(2).map_err(row_err)?,
        sender: is_user_to_sender(is_user),
        created_at: parse_datetime(&created_str),
    })
}

/// Map a libsql Row to a RegistrationRecord. Column order matches RECORD_COLUMNS.
fn row_to_record(row: &libsql::Row) -> Result<RegistrationRecord, DatabaseError> {
    let registration_date: String = row.get(1).map_err(row_err)?;
    let date_of_birth = opt_text_col(row, 4)?
        .map(|s| parse_date(&s))
        .transpose()?;

    let education_trade = parse_choice(opt_text_col(row, 12)?)?.map(Trade::Education);
    let scheme_trade = parse_choice(opt_text_col(row, 13)?)?.map(Trade::Scheme);

    let created_str: String = row.get(14).map_err(row_err)?;
    let updated_str: String = row.get(15).map_err(row_err)?;

    Ok(RegistrationRecord {
        session_id: row.get(0).map_err(row_err)?,
        registration_date: parse_date(&registration_date)?,
        name: opt_text_col(row, 2)?,
        naps_registration_code: opt_text_col(row, 3)?,
        date_of_birth,
        gender: parse_choice(opt_text_col(row, 5)?)?,
        disability_divyang: parse_choice(opt_text_col(row, 6)?)?,
        parent_name: opt_text_col(row, 7)?,
        parent_relation: parse_choice(opt_text_col(row, 8)?)?,
        religion: parse_choice(opt_text_col(row, 9)?)?,
        category: parse_choice(opt_text_col(row, 10)?)?,
        qualification_type: parse_choice(opt_text_col(row, 11)?)?,
        trade: education_trade.or(scheme_trade),
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::init_schema(self.conn()).await
    }

    // ── Sessions ────────────────────────────────────────────────────

    async fn create_session(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<RegistrationSession, DatabaseError> {
        let now = Utc::now();
        self.conn()
            .execute(
                "INSERT INTO registration_sessions (user_id, session_id, completed, created_at, updated_at)
                 VALUES (?1, ?2, 0, ?3, ?3)",
                params![user_id, session_id, now.to_rfc3339()],
            )
            .await
            .map_err(|e| write_err("create_session", e))?;

        debug!(session_id = session_id, user_id = user_id, "Session inserted into DB");
        Ok(RegistrationSession {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            completed: false,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_session(
        &self,
        session_id: &str,
    ) -> Result<Option<RegistrationSession>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {SESSION_COLUMNS} FROM registration_sessions WHERE session_id = ?1"
                ),
                params![session_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_session: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_session(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_session: {e}"))),
        }
    }

    async fn mark_session_completed(&self, session_id: &str) -> Result<bool, DatabaseError> {
        let changed = self
            .conn()
            .execute(
                "UPDATE registration_sessions SET completed = 1, updated_at = ?2
                 WHERE session_id = ?1 AND completed = 0",
                params![session_id, Utc::now().to_rfc3339()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("mark_session_completed: {e}")))?;
        Ok(changed > 0)
    }

    // ── Transcript ──────────────────────────────────────────────────

    async fn append_message(
        &self,
        session_id: &str,
        message: &str,
        sender: Sender,
    ) -> Result<TranscriptMessage, DatabaseError> {
        let now = Utc::now();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO conversation_messages (session_id, message, is_user_message, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                session_id,
                message,
                i64::from(sender.is_user()),
                now.to_rfc3339()
            ],
        )
        .await
        .map_err(|e| write_err("append_message", e))?;

        let id = conn.last_insert_rowid();
        debug!(session_id = session_id, id, sender = ?sender, "Transcript message appended");
        Ok(TranscriptMessage {
            id,
            session_id: session_id.to_string(),
            message: message.to_string(),
            sender,
            created_at: now,
        })
    }

    async fn list_messages(
        &self,
        session_id: &str,
    ) -> Result<Vec<TranscriptMessage>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM conversation_messages WHERE session_id = ?1 ORDER BY id ASC"
                ),
                params![session_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_messages: {e}")))?;

        let mut messages = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_messages: {e}")))?
        {
            messages.push(row_to_message(&row)?);
        }
        Ok(messages)
    }

    // ── Registration records ────────────────────────────────────────

    async fn get_registration(
        &self,
        session_id: &str,
    ) -> Result<Option<RegistrationRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {RECORD_COLUMNS} FROM student_registrations WHERE session_id = ?1"
                ),
                params![session_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_registration: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_record(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_registration: {e}"))),
        }
    }

    async fn ensure_registration(
        &self,
        session_id: &str,
        registration_date: NaiveDate,
    ) -> Result<RegistrationRecord, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let created = self
            .conn()
            .execute(
                "INSERT INTO student_registrations (session_id, registration_date, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT (session_id) DO NOTHING",
                params![
                    session_id,
                    registration_date.format(DATE_FORMAT).to_string(),
                    now
                ],
            )
            .await
            .map_err(|e| write_err("ensure_registration", e))?;

        if created > 0 {
            debug!(session_id = session_id, "Registration record created");
        }

        self.get_registration(session_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "student_registration".to_string(),
                id: session_id.to_string(),
            })
    }

    async fn update_registration_field(
        &self,
        session_id: &str,
        value: &FieldValue,
    ) -> Result<bool, DatabaseError> {
        let column = field_column(value);
        let sql = format!(
            "UPDATE student_registrations SET {column} = ?1, updated_at = ?2
             WHERE session_id = ?3 AND {}",
            unset_condition(value)
        );
        let changed = self
            .conn()
            .execute(
                &sql,
                params![value.to_db_text(), Utc::now().to_rfc3339(), session_id],
            )
            .await
            .map_err(|e| write_err("update_registration_field", e))?;

        debug!(session_id = session_id, column, written = changed > 0, "Registration field update");
        Ok(changed > 0)
    }
}
