mod config;
pub mod builder;
pub mod session;

use chrono::{Local, NaiveDateTime};
use log::debug;
use snafu::prelude::*;

use std::collections::{HashMap, HashSet};

pub use crate::builder::AnswerBuilder;
pub use crate::config::*;
pub use crate::session::Session;

/// Separator between the selected options of a multi-choice answer.
pub const MULTI_CHOICE_DELIMITER: &str = ", ";
/// Stored value of a multi-choice answer with nothing selected.
pub const NO_SELECTION: &str = "None";
/// Stored value of a single-choice question left unanswered.
pub const UNANSWERED: &str = "";

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ********* Errors ***********

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SurveyError {
    #[snafu(display("Question {question:?} is not part of the {language} questionnaire"))]
    UnknownQuestion { question: String, language: String },
    #[snafu(display("Option {option:?} is not offered by question {question:?}"))]
    UnknownOption { question: String, option: String },
    #[snafu(display("Question {question:?} expects a {expected} answer"))]
    WrongKind {
        question: String,
        expected: &'static str,
    },
    #[snafu(display("Answer to {question:?} is {len} characters long, the limit is {max}"))]
    TextTooLong {
        question: String,
        len: usize,
        max: usize,
    },
    #[snafu(display("Answer to {question:?} must be between {min} and {max}, got {value}"))]
    NumberOutOfRange {
        question: String,
        value: i64,
        min: i64,
        max: i64,
    },
    #[snafu(display(
        "Answers were given in {answers} but the active questionnaire is {questionnaire}"
    ))]
    LocaleMismatch {
        answers: String,
        questionnaire: String,
    },
    #[snafu(display("This session was already submitted"))]
    AlreadySubmitted {},
}

pub type SurveyResult<T> = Result<T, SurveyError>;

// ********* Input data structures ***********

/// A raw answer, as entered by the visitor.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Answer {
    Single(String),
    /// The options flagged as selected. Their order carries no meaning.
    Multi(HashSet<String>),
    Text(String),
    Number(i64),
}

/// A completed set of answers for one questionnaire.
///
/// Instances are produced by the [AnswerBuilder], which checks every value
/// against the questionnaire when it is entered.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Answers {
    pub(crate) language: String,
    pub(crate) values: HashMap<String, Answer>,
}

impl Answers {
    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn get(&self, question: &str) -> Option<&Answer> {
        self.values.get(question)
    }
}

// ******** Output data structures *********

/// The value stored for one field of a record.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum FieldValue {
    Unanswered,
    Value(String),
    /// The selected options, in the order declared by the question.
    Selection(Vec<String>),
    Number(i64),
}

impl FieldValue {
    /// The value as it appears in a single cell.
    pub fn to_cell(&self) -> String {
        match self {
            FieldValue::Unanswered => UNANSWERED.to_string(),
            FieldValue::Value(s) => s.clone(),
            FieldValue::Selection(sel) if sel.is_empty() => NO_SELECTION.to_string(),
            FieldValue::Selection(sel) => sel.join(MULTI_CHOICE_DELIMITER),
            FieldValue::Number(n) => n.to_string(),
        }
    }
}

/// One persisted outcome of a single form submission.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SurveyResponse {
    pub timestamp: String,
    pub language: String,
    /// The question fields, in questionnaire order.
    pub fields: Vec<(String, FieldValue)>,
}

impl SurveyResponse {
    pub fn field_names(&self) -> Vec<String> {
        let mut names = vec![TIMESTAMP_FIELD.to_string(), LANGUAGE_FIELD.to_string()];
        names.extend(self.fields.iter().map(|(name, _)| name.clone()));
        names
    }

    /// The record as one row of cells, aligned with `field_names`.
    pub fn to_row(&self) -> Vec<String> {
        let mut row = vec![self.timestamp.clone(), self.language.clone()];
        row.extend(self.fields.iter().map(|(_, v)| v.to_cell()));
        row
    }

    /// The record as name/value pairs where a selection contributes one pair
    /// per selected option. Unanswered fields and empty selections produce
    /// no pair.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            (TIMESTAMP_FIELD.to_string(), self.timestamp.clone()),
            (LANGUAGE_FIELD.to_string(), self.language.clone()),
        ];
        for (name, value) in self.fields.iter() {
            match value {
                FieldValue::Unanswered => {}
                FieldValue::Selection(sel) => {
                    pairs.extend(sel.iter().map(|opt| (name.clone(), opt.clone())));
                }
                v => pairs.push((name.clone(), v.to_cell())),
            }
        }
        pairs
    }
}

// ******** Collection *********

/// Builds the record of a submission made now, on the local clock.
pub fn collect(answers: &Answers, questionnaire: &Questionnaire) -> SurveyResult<SurveyResponse> {
    collect_at(answers, questionnaire, Local::now().naive_local())
}

/// Maps the answers onto the fixed fields of the questionnaire.
///
/// Every question produces exactly one field, in declaration order, whether it
/// was answered or not. The answers must have been entered against the same
/// locale as the questionnaire.
pub fn collect_at(
    answers: &Answers,
    questionnaire: &Questionnaire,
    submitted_at: NaiveDateTime,
) -> SurveyResult<SurveyResponse> {
    ensure!(
        answers.language == questionnaire.language,
        LocaleMismatchSnafu {
            answers: answers.language.clone(),
            questionnaire: questionnaire.language.clone(),
        }
    );
    let mut fields: Vec<(String, FieldValue)> = Vec::new();
    for q in questionnaire.questions.iter() {
        let value = field_value(q, answers.values.get(&q.id))?;
        debug!("collect: {:?} -> {:?}", q.id, value);
        fields.push((q.id.clone(), value));
    }
    Ok(SurveyResponse {
        timestamp: submitted_at.format(TIMESTAMP_FORMAT).to_string(),
        language: questionnaire.language.clone(),
        fields,
    })
}

fn field_value(question: &Question, answer: Option<&Answer>) -> SurveyResult<FieldValue> {
    match (&question.kind, answer) {
        (QuestionKind::MultiChoice { options }, Some(Answer::Multi(selected))) => {
            // Declared order, not selection order.
            let sel: Vec<String> = options
                .iter()
                .filter(|opt| selected.contains(*opt))
                .cloned()
                .collect();
            Ok(FieldValue::Selection(sel))
        }
        (QuestionKind::MultiChoice { .. }, None) => Ok(FieldValue::Selection(vec![])),
        (QuestionKind::SingleChoice { .. }, Some(Answer::Single(s))) => {
            Ok(FieldValue::Value(s.clone()))
        }
        (QuestionKind::FreeText { .. }, Some(Answer::Text(s))) => Ok(FieldValue::Value(s.clone())),
        (QuestionKind::FreeText { .. }, None) => Ok(FieldValue::Value("".to_string())),
        (QuestionKind::Number { .. }, Some(Answer::Number(n))) => Ok(FieldValue::Number(*n)),
        (_, None) => Ok(FieldValue::Unanswered),
        (kind, Some(_)) => WrongKindSnafu {
            question: question.id.clone(),
            expected: kind.name(),
        }
        .fail(),
    }
}
