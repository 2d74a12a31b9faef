use serde::{Deserialize, Serialize};
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use std::fs;
use std::io::Read;

use crate::survey::*;

/// The answers of one visitor, as read from JSON.
///
/// ```json
/// {"language": "English",
///  "answers": {"country": "Norway", "purchase_factors": ["Taste", "Price"], "group_size": 3}}
/// ```
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RawAnswers {
    pub language: Option<String>,
    #[serde(default)]
    pub answers: JSMap<String, JSValue>,
}

/// Reads the answers from a file, or from the standard input when the path is
/// empty or `-`.
pub fn read_raw_answers(path: Option<&str>) -> CollectorResult<RawAnswers> {
    let contents = match path {
        Some(p) if p != "-" => fs::read_to_string(p).context(OpeningJsonSnafu { path: p })?,
        _ => {
            let mut s = String::new();
            std::io::stdin()
                .read_to_string(&mut s)
                .context(ReadingAnswersSnafu {})?;
            s
        }
    };
    parse_raw_answers(&contents)
}

pub fn parse_raw_answers(contents: &str) -> CollectorResult<RawAnswers> {
    let raw: RawAnswers = serde_json::from_str(contents).context(ParsingJsonSnafu {})?;
    debug!("parse_raw_answers: {:?}", raw);
    Ok(raw)
}

/// Enters the raw answers through the answer builder, so every value is
/// checked against the questionnaire.
pub fn build_answers(
    questionnaire: &Questionnaire,
    raw: &JSMap<String, JSValue>,
) -> CollectorResult<Answers> {
    let mut builder = AnswerBuilder::new(questionnaire);
    for (id, value) in raw.iter() {
        let kind = match questionnaire.question(id) {
            Some(q) => &q.kind,
            None => {
                return Err(SurveyError::UnknownQuestion {
                    question: id.clone(),
                    language: questionnaire.language.clone(),
                })
                .context(SurveySnafu {})
            }
        };
        match (kind, value) {
            (_, JSValue::Null) => {}
            (QuestionKind::FreeText { .. }, JSValue::String(s)) => {
                builder.text(id, s).context(SurveySnafu {})?
            }
            (QuestionKind::MultiChoice { .. }, JSValue::Array(opts)) => {
                for opt in opts.iter() {
                    match opt {
                        JSValue::String(s) => builder.check(id, s).context(SurveySnafu {})?,
                        x => whatever!("Question {:?}: expected option names, got {}", id, x),
                    }
                }
            }
            (QuestionKind::MultiChoice { .. }, JSValue::String(s)) => {
                builder.check(id, s).context(SurveySnafu {})?
            }
            (QuestionKind::Number { .. }, JSValue::Number(n)) => match n.as_i64() {
                Some(i) => builder.number(id, i).context(SurveySnafu {})?,
                None => whatever!("Question {:?}: {} is not an integer", id, n),
            },
            (_, JSValue::String(s)) => builder.select(id, s).context(SurveySnafu {})?,
            (k, x) => whatever!("Question {:?} expects a {} answer, got {}", id, k.name(), x),
        }
    }
    Ok(builder.build())
}
