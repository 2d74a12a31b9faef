use log::debug;
use snafu::prelude::*;

use std::collections::{HashMap, HashSet};

use crate::*;

/// Collects the answers of one visitor against a questionnaire.
///
/// Every value is checked when it is entered: options must belong to the
/// question's vocabulary, free text must fit the length cap and numbers must
/// stay in range. A completed [Answers] set is therefore always valid for the
/// questionnaire it was built from.
///
/// ```
/// use survey_collector::{AnswerBuilder, Question, Questionnaire, SurveyError};
///
/// let q = Questionnaire::new(
///     "English",
///     vec![
///         Question::single("gender", &["Male", "Female"]),
///         Question::multi("association", &["Health", "Export", "Nothing special"]),
///     ],
/// );
/// let mut builder = AnswerBuilder::new(&q);
/// builder.select("gender", "Female")?;
/// builder.check("association", "Export")?;
/// let answers = builder.build();
/// assert_eq!(answers.language(), "English");
///
/// # Ok::<(), SurveyError>(())
/// ```
pub struct AnswerBuilder<'a> {
    questionnaire: &'a Questionnaire,
    values: HashMap<String, Answer>,
}

impl<'a> AnswerBuilder<'a> {
    pub fn new(questionnaire: &'a Questionnaire) -> AnswerBuilder<'a> {
        AnswerBuilder {
            questionnaire,
            values: HashMap::new(),
        }
    }

    pub fn questionnaire(&self) -> &'a Questionnaire {
        self.questionnaire
    }

    /// Picks the answer of a single-choice question, replacing any earlier one.
    pub fn select(&mut self, question: &str, option: &str) -> SurveyResult<()> {
        let q = self.lookup(question)?;
        match &q.kind {
            QuestionKind::SingleChoice { .. } => {
                check_option(q, option)?;
                self.values
                    .insert(question.to_string(), Answer::Single(option.to_string()));
                Ok(())
            }
            _ => wrong_kind(question, "single-choice"),
        }
    }

    /// Flags one option of a multi-choice question as selected.
    pub fn check(&mut self, question: &str, option: &str) -> SurveyResult<()> {
        let selected = self.selection(question, option)?;
        selected.insert(option.to_string());
        Ok(())
    }

    pub fn uncheck(&mut self, question: &str, option: &str) -> SurveyResult<()> {
        let selected = self.selection(question, option)?;
        selected.remove(option);
        Ok(())
    }

    pub fn text(&mut self, question: &str, value: &str) -> SurveyResult<()> {
        let q = self.lookup(question)?;
        match &q.kind {
            QuestionKind::FreeText { max_chars } => {
                let len = value.chars().count();
                ensure!(
                    len <= *max_chars,
                    TextTooLongSnafu {
                        question,
                        len,
                        max: *max_chars,
                    }
                );
                self.values
                    .insert(question.to_string(), Answer::Text(value.to_string()));
                Ok(())
            }
            _ => wrong_kind(question, "free text"),
        }
    }

    pub fn number(&mut self, question: &str, value: i64) -> SurveyResult<()> {
        let q = self.lookup(question)?;
        match &q.kind {
            QuestionKind::Number { min, max } => {
                ensure!(
                    *min <= value && value <= *max,
                    NumberOutOfRangeSnafu {
                        question,
                        value,
                        min: *min,
                        max: *max,
                    }
                );
                self.values
                    .insert(question.to_string(), Answer::Number(value));
                Ok(())
            }
            _ => wrong_kind(question, "number"),
        }
    }

    pub fn build(self) -> Answers {
        debug!(
            "build: {} answers for the {} questionnaire",
            self.values.len(),
            self.questionnaire.language
        );
        Answers {
            language: self.questionnaire.language.clone(),
            values: self.values,
        }
    }

    fn lookup(&self, question: &str) -> SurveyResult<&'a Question> {
        self.questionnaire
            .question(question)
            .context(UnknownQuestionSnafu {
                question,
                language: self.questionnaire.language.clone(),
            })
    }

    fn selection(&mut self, question: &str, option: &str) -> SurveyResult<&mut HashSet<String>> {
        let q = self.lookup(question)?;
        match &q.kind {
            QuestionKind::MultiChoice { .. } => check_option(q, option)?,
            _ => return wrong_kind(question, "multi-choice"),
        }
        let entry = self
            .values
            .entry(question.to_string())
            .or_insert_with(|| Answer::Multi(HashSet::new()));
        match entry {
            Answer::Multi(selected) => Ok(selected),
            // Only multi-choice answers are ever stored under a multi-choice id.
            _ => wrong_kind(question, "multi-choice"),
        }
    }
}

fn check_option(q: &Question, option: &str) -> SurveyResult<()> {
    let offered = q.kind.options().unwrap_or(&[]);
    ensure!(
        offered.iter().any(|o| o == option),
        UnknownOptionSnafu {
            question: q.id.as_str(),
            option,
        }
    );
    Ok(())
}

fn wrong_kind<T>(question: &str, expected: &'static str) -> SurveyResult<T> {
    WrongKindSnafu { question, expected }.fail()
}
