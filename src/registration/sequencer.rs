//! Field sequencer: decides which question comes next.

use serde::Serialize;

use super::fields::{FIELD_ORDER, Field};
use super::model::RegistrationRecord;

/// The question to ask next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldPrompt {
    pub field: Field,
    pub text: String,
}

/// Outcome of sequencing a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStep {
    Prompt(FieldPrompt),
    /// Every field, including the trade, is set.
    Complete,
}

impl NextStep {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// Return the first unfilled field of `record` with its prompt, or
/// [`NextStep::Complete`]. A missing record starts at the first field.
pub fn next_field(record: Option<&RegistrationRecord>) -> NextStep {
    let Some(rec) = record else {
        let field = FIELD_ORDER[0];
        return NextStep::Prompt(FieldPrompt {
            field,
            text: field.prompt(None),
        });
    };

    FIELD_ORDER
        .iter()
        .find(|field| !field.is_filled(rec))
        .map(|&field| {
            NextStep::Prompt(FieldPrompt {
                field,
                text: field.prompt(Some(rec)),
            })
        })
        .unwrap_or(NextStep::Complete)
}
