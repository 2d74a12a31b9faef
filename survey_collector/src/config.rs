// ********* Questionnaire schema ***********

/// Column holding the submission time. Always the first field of a record.
pub const TIMESTAMP_FIELD: &str = "timestamp";
/// Column holding the locale the questionnaire was answered in.
pub const LANGUAGE_FIELD: &str = "language";

/// Default cap for free text answers, in characters.
pub const DEFAULT_MAX_CHARS: usize = 600;

/// The kind of answer a question accepts, with its vocabulary.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum QuestionKind {
    /// Exactly one value out of the options, or nothing.
    SingleChoice { options: Vec<String> },
    /// Any subset of the options. The order of the options is the order
    /// used when the selection is stored.
    MultiChoice { options: Vec<String> },
    /// Free text, capped at `max_chars` characters when entered.
    FreeText { max_chars: usize },
    /// A bounded integer (inclusive bounds).
    Number { min: i64, max: i64 },
}

impl QuestionKind {
    pub fn name(&self) -> &'static str {
        match self {
            QuestionKind::SingleChoice { .. } => "single-choice",
            QuestionKind::MultiChoice { .. } => "multi-choice",
            QuestionKind::FreeText { .. } => "free text",
            QuestionKind::Number { .. } => "number",
        }
    }

    pub fn options(&self) -> Option<&[String]> {
        match self {
            QuestionKind::SingleChoice { options } | QuestionKind::MultiChoice { options } => {
                Some(options.as_slice())
            }
            _ => None,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Question {
    /// Stable identifier, also the name of the column in the store.
    pub id: String,
    pub kind: QuestionKind,
}

impl Question {
    pub fn single(id: &str, options: &[&str]) -> Question {
        Question {
            id: id.to_string(),
            kind: QuestionKind::SingleChoice {
                options: options.iter().map(|s| s.to_string()).collect(),
            },
        }
    }

    pub fn multi(id: &str, options: &[&str]) -> Question {
        Question {
            id: id.to_string(),
            kind: QuestionKind::MultiChoice {
                options: options.iter().map(|s| s.to_string()).collect(),
            },
        }
    }

    pub fn text(id: &str, max_chars: usize) -> Question {
        Question {
            id: id.to_string(),
            kind: QuestionKind::FreeText { max_chars },
        }
    }

    pub fn number(id: &str, min: i64, max: i64) -> Question {
        Question {
            id: id.to_string(),
            kind: QuestionKind::Number { min, max },
        }
    }
}

/// The question set and option vocabulary active for one locale.
///
/// Two locales may share the same question ids with translated options, or
/// define entirely different question sets. A record is always built against
/// a single questionnaire.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Questionnaire {
    pub language: String,
    pub questions: Vec<Question>,
}

impl Questionnaire {
    pub fn new(language: &str, questions: Vec<Question>) -> Questionnaire {
        Questionnaire {
            language: language.to_string(),
            questions,
        }
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// The names of the columns of a record, in storage order.
    pub fn field_names(&self) -> Vec<String> {
        let mut names = vec![TIMESTAMP_FIELD.to_string(), LANGUAGE_FIELD.to_string()];
        names.extend(self.questions.iter().map(|q| q.id.clone()));
        names
    }
}
