//! The ordered field table: identity, prompt and parser for every question.
//!
//! Adding or reordering a question is a change to [`FIELD_ORDER`] and the
//! per-field arms below; the sequencer and processor iterate the table.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::choices::{
    self, Category, EducationTrade, Gender, ParentRelation, QualificationType, Religion,
    SchemeTrade, YesNo,
};
use super::model::{RegistrationRecord, Trade};
use crate::error::ValidationError;

/// Accepted NAPS registration code lengths, in characters.
const CODE_LENGTHS: std::ops::RangeInclusive<usize> = 10..=11;

/// Format accepted for the date of birth.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// One question of the registration form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    NapsRegistrationCode,
    DateOfBirth,
    Gender,
    DisabilityDivyang,
    ParentName,
    ParentRelation,
    Religion,
    Category,
    QualificationType,
    /// Education or scheme trade, depending on the qualification type.
    Trade,
}

/// The fixed order in which fields are collected.
pub const FIELD_ORDER: [Field; 11] = [
    Field::Name,
    Field::NapsRegistrationCode,
    Field::DateOfBirth,
    Field::Gender,
    Field::DisabilityDivyang,
    Field::ParentName,
    Field::ParentRelation,
    Field::Religion,
    Field::Category,
    Field::QualificationType,
    Field::Trade,
];

impl Field {
    /// Human-readable field name.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Name => "full name",
            Self::NapsRegistrationCode => "NAPS registration code",
            Self::DateOfBirth => "date of birth",
            Self::Gender => "gender",
            Self::DisabilityDivyang => "disability status",
            Self::ParentName => "parent or guardian name",
            Self::ParentRelation => "parent relation",
            Self::Religion => "religion",
            Self::Category => "category",
            Self::QualificationType => "qualification type",
            Self::Trade => "trade",
        }
    }

    /// Whether the record already holds a value for this field.
    pub fn is_filled(&self, record: &RegistrationRecord) -> bool {
        match self {
            Self::Name => record.name.is_some(),
            Self::NapsRegistrationCode => record.naps_registration_code.is_some(),
            Self::DateOfBirth => record.date_of_birth.is_some(),
            Self::Gender => record.gender.is_some(),
            Self::DisabilityDivyang => record.disability_divyang.is_some(),
            Self::ParentName => record.parent_name.is_some(),
            Self::ParentRelation => record.parent_relation.is_some(),
            Self::Religion => record.religion.is_some(),
            Self::Category => record.category.is_some(),
            Self::QualificationType => record.qualification_type.is_some(),
            Self::Trade => record.trade.is_some(),
        }
    }

    /// Question text asking for this field.
    ///
    /// The trade question lists education trades for
    /// [`QualificationType::Educational`] and scheme trades otherwise.
    pub fn prompt(&self, record: Option<&RegistrationRecord>) -> String {
        match self {
            Self::Name => "Could you please tell me your full name?".to_string(),
            Self::NapsRegistrationCode => {
                "Please provide your NAPS registration code (10-11 digits):".to_string()
            }
            Self::DateOfBirth => "What is your date of birth? (YYYY-MM-DD format)".to_string(),
            Self::Gender => format!(
                "What is your gender? ({})",
                choices::inline_list(Gender::ALL)
            ),
            Self::DisabilityDivyang => format!(
                "Do you have any disabilities? ({})",
                choices::inline_list(YesNo::ALL)
            ),
            Self::ParentName => "What is your parent's or guardian's name?".to_string(),
            Self::ParentRelation => format!(
                "What is your relation with them? ({})",
                choices::inline_list(ParentRelation::ALL)
            ),
            Self::Religion => format!(
                "What is your religion? ({})",
                choices::inline_list(Religion::ALL)
            ),
            Self::Category => format!(
                "What is your category? ({})",
                choices::inline_list(Category::ALL)
            ),
            Self::QualificationType => format!(
                "What is your qualification type? ({})",
                choices::inline_list(QualificationType::ALL)
            ),
            Self::Trade => match record.and_then(|r| r.qualification_type) {
                Some(QualificationType::Educational) => format!(
                    "Please select your educational qualification:\n{}",
                    choices::bullet_list(EducationTrade::ALL)
                ),
                _ => format!(
                    "Please select the scheme you were trained under:\n{}",
                    choices::bullet_list(SchemeTrade::ALL)
                ),
            },
        }
    }

    /// Parse inbound text into a value for this field.
    ///
    /// Input is trimmed first. The trade arm is resolved against the record's
    /// qualification type.
    pub fn parse(
        &self,
        text: &str,
        record: &RegistrationRecord,
    ) -> Result<FieldValue, ValidationError> {
        let text = text.trim();
        match self {
            Self::Name => parse_free_text(*self, text).map(FieldValue::Name),
            Self::ParentName => parse_free_text(*self, text).map(FieldValue::ParentName),
            Self::NapsRegistrationCode => {
                let len = text.chars().count();
                if !CODE_LENGTHS.contains(&len) {
                    return Err(ValidationError::new(
                        *self,
                        format!(
                            "NAPS registration code must be 10-11 characters long (got {len})."
                        ),
                    ));
                }
                Ok(FieldValue::NapsRegistrationCode(text.to_string()))
            }
            Self::DateOfBirth => parse_iso_date(text)
                .map(FieldValue::DateOfBirth)
                .ok_or_else(|| {
                    ValidationError::new(
                        *self,
                        "Date of birth must be a valid calendar date in YYYY-MM-DD format.",
                    )
                }),
            Self::Gender => parse_choice(*self, text, Gender::ALL).map(FieldValue::Gender),
            Self::DisabilityDivyang => {
                parse_choice(*self, text, YesNo::ALL).map(FieldValue::DisabilityDivyang)
            }
            Self::ParentRelation => {
                parse_choice(*self, text, ParentRelation::ALL).map(FieldValue::ParentRelation)
            }
            Self::Religion => parse_choice(*self, text, Religion::ALL).map(FieldValue::Religion),
            Self::Category => parse_choice(*self, text, Category::ALL).map(FieldValue::Category),
            Self::QualificationType => parse_choice(*self, text, QualificationType::ALL)
                .map(FieldValue::QualificationType),
            Self::Trade => match record.qualification_type {
                Some(QualificationType::Educational) => {
                    parse_choice(*self, text, EducationTrade::ALL)
                        .map(|t| FieldValue::Trade(Trade::Education(t)))
                }
                Some(QualificationType::Scheme) => parse_choice(*self, text, SchemeTrade::ALL)
                    .map(|t| FieldValue::Trade(Trade::Scheme(t))),
                None => Err(ValidationError::new(
                    *self,
                    "A qualification type must be chosen before the trade.",
                )),
            },
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

fn parse_free_text(field: Field, text: &str) -> Result<String, ValidationError> {
    if text.is_empty() {
        return Err(ValidationError::new(
            field,
            format!("Your {} cannot be empty.", field.label()),
        ));
    }
    Ok(text.to_string())
}

/// Strict `YYYY-MM-DD`: chrono's `%Y` alone also takes signed and short years.
fn parse_iso_date(text: &str) -> Option<NaiveDate> {
    let shaped = text.len() == 10
        && text.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !shaped {
        return None;
    }
    NaiveDate::parse_from_str(text, DATE_FORMAT).ok()
}

fn parse_choice<T>(field: Field, text: &str, options: &[T]) -> Result<T, ValidationError>
where
    T: std::str::FromStr<Err = String> + std::fmt::Display,
{
    text.parse::<T>().map_err(|e| {
        let options = options
            .iter()
            .map(|o| o.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        ValidationError::new(field, format!("{e}. Please choose one of: {options}"))
    })
}

/// A parsed answer, tagged with the field it fills.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Name(String),
    NapsRegistrationCode(String),
    DateOfBirth(NaiveDate),
    Gender(Gender),
    DisabilityDivyang(YesNo),
    ParentName(String),
    ParentRelation(ParentRelation),
    Religion(Religion),
    Category(Category),
    QualificationType(QualificationType),
    Trade(Trade),
}

impl FieldValue {
    pub fn field(&self) -> Field {
        match self {
            Self::Name(_) => Field::Name,
            Self::NapsRegistrationCode(_) => Field::NapsRegistrationCode,
            Self::DateOfBirth(_) => Field::DateOfBirth,
            Self::Gender(_) => Field::Gender,
            Self::DisabilityDivyang(_) => Field::DisabilityDivyang,
            Self::ParentName(_) => Field::ParentName,
            Self::ParentRelation(_) => Field::ParentRelation,
            Self::Religion(_) => Field::Religion,
            Self::Category(_) => Field::Category,
            Self::QualificationType(_) => Field::QualificationType,
            Self::Trade(_) => Field::Trade,
        }
    }

    /// Text stored for this value. Dates use `YYYY-MM-DD`, choices their
    /// display value.
    pub fn to_db_text(&self) -> String {
        match self {
            Self::Name(s) | Self::NapsRegistrationCode(s) | Self::ParentName(s) => s.clone(),
            Self::DateOfBirth(d) => d.format(DATE_FORMAT).to_string(),
            Self::Gender(v) => v.to_string(),
            Self::DisabilityDivyang(v) => v.to_string(),
            Self::ParentRelation(v) => v.to_string(),
            Self::Religion(v) => v.to_string(),
            Self::Category(v) => v.to_string(),
            Self::QualificationType(v) => v.to_string(),
            Self::Trade(t) => t.to_string(),
        }
    }

    /// Write this value into an in-memory record.
    pub fn apply_to(&self, record: &mut RegistrationRecord) {
        match self {
            Self::Name(s) => record.name = Some(s.clone()),
            Self::NapsRegistrationCode(s) => record.naps_registration_code = Some(s.clone()),
            Self::DateOfBirth(d) => record.date_of_birth = Some(*d),
            Self::Gender(v) => record.gender = Some(*v),
            Self::DisabilityDivyang(v) => record.disability_divyang = Some(*v),
            Self::ParentName(s) => record.parent_name = Some(s.clone()),
            Self::ParentRelation(v) => record.parent_relation = Some(*v),
            Self::Religion(v) => record.religion = Some(*v),
            Self::Category(v) => record.category = Some(*v),
            Self::QualificationType(v) => record.qualification_type = Some(*v),
            Self::Trade(t) => record.trade = Some(*t),
        }
    }
}
