use crate::survey::*;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;

/// The questionnaire shipped with the program.
const BUILTIN_CONFIG: &str = include_str!("../../config/salmon_centre.json");

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum DestinationSettings {
    #[serde(rename = "local")]
    Local { path: String },
    #[serde(rename = "remote")]
    Remote {
        url: String,
        #[serde(rename = "fieldMap")]
        field_map: BTreeMap<String, String>,
    },
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct QuestionSettings {
    pub id: String,
    pub kind: String,
    pub options: Option<Vec<String>>,
    #[serde(rename = "maxChars")]
    pub max_chars: Option<usize>,
    pub min: Option<i64>,
    pub max: Option<i64>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct LocaleSettings {
    pub language: String,
    pub questions: Vec<QuestionSettings>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SurveySettings {
    pub destination: DestinationSettings,
    #[serde(rename = "confirmationSeconds")]
    pub confirmation_seconds: Option<u64>,
    pub countries: Option<Vec<String>>,
    #[serde(rename = "defaultLanguage")]
    pub default_language: Option<String>,
    pub locales: Vec<LocaleSettings>,
}

pub fn read_config(path: &str) -> CollectorResult<CollectorConfig> {
    let config_p = Path::new(path);
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let settings: SurveySettings =
        serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
    debug!("read_config: {:?}", settings);
    let root = config_p.parent().unwrap_or_else(|| Path::new("."));
    validate_config(&settings, root)
}

pub fn builtin_config() -> CollectorResult<CollectorConfig> {
    let settings: SurveySettings =
        serde_json::from_str(BUILTIN_CONFIG).context(ParsingJsonSnafu {})?;
    validate_config(&settings, Path::new("."))
}

/// Checks the raw settings and turns them into a collector configuration.
/// Relative store paths are resolved against `root`.
pub fn validate_config(settings: &SurveySettings, root: &Path) -> CollectorResult<CollectorConfig> {
    if settings.locales.is_empty() {
        whatever!("The configuration does not define any locale")
    }
    let countries: Vec<String> = settings.countries.clone().unwrap_or_default();

    let mut questionnaires: Vec<Questionnaire> = Vec::new();
    let mut languages: HashSet<String> = HashSet::new();
    for ls in settings.locales.iter() {
        if !languages.insert(ls.language.clone()) {
            whatever!("Language {:?} is defined twice", ls.language)
        }
        questionnaires.push(validate_locale(ls, &countries)?);
    }

    let default_language = match settings.default_language.clone() {
        Some(l) if languages.contains(&l) => l,
        Some(l) => whatever!("Default language {:?} has no questionnaire", l),
        None => questionnaires[0].language.clone(),
    };

    let destination = match &settings.destination {
        DestinationSettings::Local { path } => Destination::Local {
            path: root.join(path),
        },
        DestinationSettings::Remote { url, field_map } => {
            validate_field_map(field_map, &questionnaires)?;
            Destination::Remote {
                url: url.clone(),
                field_map: field_map.clone(),
            }
        }
    };

    Ok(CollectorConfig {
        destination,
        questionnaires,
        default_language,
        confirmation: Duration::from_secs(
            settings
                .confirmation_seconds
                .unwrap_or(DEFAULT_CONFIRMATION_SECONDS),
        ),
    })
}

fn validate_locale(ls: &LocaleSettings, countries: &[String]) -> CollectorResult<Questionnaire> {
    let mut ids: HashSet<String> = HashSet::new();
    let mut questions: Vec<Question> = Vec::new();
    for qs in ls.questions.iter() {
        if qs.id == TIMESTAMP_FIELD || qs.id == LANGUAGE_FIELD {
            whatever!("{}: question id {:?} is reserved", ls.language, qs.id)
        }
        if !ids.insert(qs.id.clone()) {
            whatever!("{}: question {:?} is defined twice", ls.language, qs.id)
        }
        questions.push(validate_question(qs, countries, &ls.language)?);
    }
    Ok(Questionnaire {
        language: ls.language.clone(),
        questions,
    })
}

fn validate_question(
    qs: &QuestionSettings,
    countries: &[String],
    language: &str,
) -> CollectorResult<Question> {
    let options = || -> CollectorResult<Vec<String>> {
        match &qs.options {
            Some(opts) if !opts.is_empty() => Ok(opts.clone()),
            _ => whatever!("{}: question {:?} has no options", language, qs.id),
        }
    };
    let kind = match qs.kind.as_str() {
        "single" => QuestionKind::SingleChoice { options: options()? },
        "multi" => QuestionKind::MultiChoice { options: options()? },
        "text" => QuestionKind::FreeText {
            max_chars: qs.max_chars.unwrap_or(DEFAULT_MAX_CHARS),
        },
        "number" => {
            let min = qs.min.unwrap_or(i64::MIN);
            let max = qs.max.unwrap_or(i64::MAX);
            if min > max {
                whatever!("{}: question {:?} has min > max", language, qs.id)
            }
            QuestionKind::Number { min, max }
        }
        // A reduced locale list takes precedence over the reference list.
        "country" => match &qs.options {
            Some(opts) if !opts.is_empty() => QuestionKind::SingleChoice {
                options: opts.clone(),
            },
            _ if !countries.is_empty() => QuestionKind::SingleChoice {
                options: countries.to_vec(),
            },
            _ => whatever!(
                "{}: country question {:?} needs a country list",
                language,
                qs.id
            ),
        },
        x => whatever!("{}: unknown question kind {:?} for {:?}", language, x, qs.id),
    };
    Ok(Question {
        id: qs.id.clone(),
        kind,
    })
}

fn validate_field_map(
    field_map: &BTreeMap<String, String>,
    questionnaires: &[Questionnaire],
) -> CollectorResult<()> {
    let known: HashSet<String> = questionnaires
        .iter()
        .flat_map(|q| q.field_names())
        .collect();
    for name in field_map.keys() {
        if !known.contains(name) {
            whatever!("The field map names the unknown field {:?}", name)
        }
    }
    for name in known.iter().filter(|n| !field_map.contains_key(*n)) {
        warn!(
            "validate_field_map: field {:?} has no endpoint identifier and will not be sent",
            name
        );
    }
    Ok(())
}
