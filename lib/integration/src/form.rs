//! Form questions and how answers map onto an Airtable table.
//!
//! A form is a list of [`Question`]s, each bound to one field of the
//! table. Questions may carry [`ConditionalRules`] that hide them unless
//! earlier answers match. Hidden questions are never required and their
//! answers are not written to the table.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SubmissionError;

/// Question types a form can present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    SingleLineText,
    LongText,
    SingleSelect,
    MultipleSelects,
    Attachment,
}

impl FieldType {
    /// Maps an Airtable field type onto the question type that can fill it.
    ///
    /// Returns `None` for field types forms do not support.
    #[must_use]
    pub fn from_airtable(field_type: &str) -> Option<Self> {
        match field_type {
            "singleLineText" => Some(Self::SingleLineText),
            "multilineText" | "richText" => Some(Self::LongText),
            "singleSelect" => Some(Self::SingleSelect),
            "multipleSelects" => Some(Self::MultipleSelects),
            "multipleAttachments" => Some(Self::Attachment),
            _ => None,
        }
    }
}

/// How the conditions of a rule combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Logic {
    #[default]
    And,
    Or,
}

/// Comparison applied by a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
}

/// One comparison against an earlier answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub question_key: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: Value,
}

impl Condition {
    fn matches(&self, answers: &Map<String, Value>) -> bool {
        let answer = answers.get(&self.question_key).unwrap_or(&Value::Null);
        match self.operator {
            Operator::Equals => answer == &self.value,
            Operator::NotEquals => answer != &self.value,
            Operator::Contains => contains(answer, &self.value),
        }
    }
}

fn contains(answer: &Value, needle: &Value) -> bool {
    match (answer, needle) {
        (Value::Array(items), _) => items.contains(needle),
        (Value::String(text), Value::String(part)) => text.contains(part.as_str()),
        _ => false,
    }
}

/// Visibility rules for a question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalRules {
    #[serde(default)]
    pub logic: Logic,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl ConditionalRules {
    /// Returns true when the question should be shown. No conditions means
    /// always shown.
    #[must_use]
    pub fn is_satisfied(&self, answers: &Map<String, Value>) -> bool {
        if self.conditions.is_empty() {
            return true;
        }
        match self.logic {
            Logic::And => self.conditions.iter().all(|c| c.matches(answers)),
            Logic::Or => self.conditions.iter().any(|c| c.matches(answers)),
        }
    }
}

/// A single form question bound to a table field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub question_key: String,
    pub airtable_field_id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional_rules: Option<ConditionalRules>,
}

impl Question {
    /// Returns true when this question is shown given `answers`.
    #[must_use]
    pub fn is_visible(&self, answers: &Map<String, Value>) -> bool {
        self.conditional_rules
            .as_ref()
            .is_none_or(|rules| rules.is_satisfied(answers))
    }
}

fn is_answered(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(_) => true,
    }
}

/// Checks `answers` against `questions` and returns the Airtable `fields`
/// object for the record.
///
/// # Errors
///
/// Returns [`SubmissionError::NotAnObject`] when `answers` is not an object
/// and [`SubmissionError::MissingRequired`] for the first visible required
/// question without an answer.
pub fn record_fields(
    questions: &[Question],
    answers: &Value,
) -> Result<Map<String, Value>, SubmissionError> {
    let answers = answers.as_object().ok_or(SubmissionError::NotAnObject)?;

    let mut fields = Map::new();
    for question in questions {
        if !question.is_visible(answers) {
            continue;
        }
        let answer = answers.get(&question.question_key);
        if !is_answered(answer) {
            if question.required {
                return Err(SubmissionError::MissingRequired {
                    question_key: question.question_key.clone(),
                });
            }
            continue;
        }
        if let Some(value) = answer {
            fields.insert(question.airtable_field_id.clone(), value.clone());
        }
    }
    Ok(fields)
}
