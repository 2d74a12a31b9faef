use log::{debug, info, warn};

use reqwest::blocking::Client;
use snafu::{prelude::*, ErrorCompat, Snafu};
use survey_collector::*;

use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

pub mod config_reader;
mod io_common;
mod io_csv;
mod io_forms;

use crate::survey::config_reader::*;
use crate::survey::io_common::*;

pub const DEFAULT_CONFIRMATION_SECONDS: u64 = 5;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CollectorError {
    #[snafu(display("{source}"))]
    Survey { source: SurveyError },
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON: {source}"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error reading the answers: {source}"))]
    ReadingAnswers { source: std::io::Error },
    #[snafu(display("No questionnaire for language {language:?}"))]
    UnknownLanguage { language: String },
    #[snafu(display("This session was already submitted, wait for a new form"))]
    SessionClosed {},

    #[snafu(display("Error opening store {path}"))]
    OpeningStore {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error reading the header of {path}"))]
    ReadingHeader { source: csv::Error, path: String },
    #[snafu(display("Error writing to {path}"))]
    WritingStore { source: csv::Error, path: String },
    #[snafu(display("Error terminating the last row of {path}"))]
    TerminatingRow {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error flushing {path}"))]
    FlushingStore {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("The header of {path} is {found:?} but this response has the fields {expected:?}"))]
    HeaderMismatch {
        path: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[snafu(display("Could not create the HTTP client"))]
    HttpClient { source: reqwest::Error },
    #[snafu(display("Could not reach {url}: {source}"))]
    RemoteTransport { source: reqwest::Error, url: String },
    #[snafu(display("{url} refused the response with status {status}"))]
    RemoteRejected { url: String, status: u16 },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

impl CollectorError {
    /// Remote failures leave the response unsaved; the same answers may be
    /// submitted again.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CollectorError::RemoteTransport { .. } | CollectorError::RemoteRejected { .. }
        )
    }
}

pub type CollectorResult<T> = Result<T, CollectorError>;

/// Where the responses go. Exactly one destination is active.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Destination {
    Local {
        path: PathBuf,
    },
    Remote {
        url: String,
        /// Logical field name -> endpoint field identifier.
        field_map: BTreeMap<String, String>,
    },
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CollectorConfig {
    pub destination: Destination,
    /// One questionnaire per language, in configuration order.
    pub questionnaires: Vec<Questionnaire>,
    pub default_language: String,
    /// How long the confirmation stays up before a new form.
    pub confirmation: Duration,
}

pub struct Collector {
    config: CollectorConfig,
    client: Option<Client>,
}

impl Collector {
    /// A remote destination gets an HTTP client with the default settings.
    pub fn new(config: CollectorConfig) -> CollectorResult<Collector> {
        if let Destination::Local { .. } = config.destination {
            return Ok(Collector {
                config,
                client: None,
            });
        }
        let client = Client::builder().build().context(HttpClientSnafu {})?;
        Ok(Collector::with_client(config, client))
    }

    pub fn with_client(config: CollectorConfig, client: Client) -> Collector {
        Collector {
            config,
            client: Some(client),
        }
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// The questionnaire of a language, or of the default language.
    pub fn questionnaire(&self, language: Option<&str>) -> CollectorResult<&Questionnaire> {
        let language = language.unwrap_or(self.config.default_language.as_str());
        self.config
            .questionnaires
            .iter()
            .find(|q| q.language == language)
            .context(UnknownLanguageSnafu { language })
    }

    pub fn collect(&self, answers: &Answers) -> CollectorResult<SurveyResponse> {
        let questionnaire = self.questionnaire(Some(answers.language()))?;
        collect(answers, questionnaire).context(SurveySnafu {})
    }

    pub fn persist(&self, record: &SurveyResponse) -> CollectorResult<()> {
        match (&self.config.destination, &self.client) {
            (Destination::Local { path }, _) => io_csv::append_response(path, record),
            (Destination::Remote { url, field_map }, Some(client)) => {
                io_forms::submit_form(client, url, field_map, record)
            }
            (Destination::Remote { .. }, None) => {
                whatever!("No HTTP client for the remote destination")
            }
        }
    }

    /// Collects and persists one submission.
    ///
    /// On success the returned session holds the confirmation. On failure the
    /// caller keeps its unsubmitted session and may retry.
    pub fn submit(
        &self,
        session: Session,
        answers: &Answers,
        now: Instant,
    ) -> CollectorResult<Session> {
        ensure!(session.accepts_submission(), SessionClosedSnafu {});
        let record = self.collect(answers)?;
        self.persist(&record)?;
        info!(
            "submit: stored the {} response of {}",
            record.language, record.timestamp
        );
        session.submitted(now).context(SurveySnafu {})
    }
}

/// Runs one submission from the command line.
pub fn run_survey(
    config_path: Option<String>,
    answers_path: Option<String>,
    out: Option<String>,
    language: Option<String>,
    print_header: bool,
) -> CollectorResult<()> {
    let collector = Collector::new(load_config(config_path, out)?)?;

    if print_header {
        let questionnaire = collector.questionnaire(language.as_deref())?;
        println!("{}", io_csv::header_line(questionnaire)?);
        return Ok(());
    }

    let raw = read_raw_answers(answers_path.as_deref())?;
    let answers = answers_for(&collector, &raw, language.as_deref())?;
    collector.submit(Session::new(), &answers, Instant::now())?;
    print_confirmation(collector.config());
    Ok(())
}

/// Kiosk mode: one JSON answer set per line, one session after the other.
///
/// A remote failure is reported and the session stays open for the next line,
/// which is the retry. Any other error ends the run.
pub fn run_kiosk<R: BufRead>(
    collector: &Collector,
    input: R,
    language: Option<&str>,
) -> CollectorResult<usize> {
    let display = collector.config().confirmation;
    let mut session = Session::new();
    let mut stored: usize = 0;
    for line in input.lines() {
        let line = line.context(ReadingAnswersSnafu {})?;
        if line.trim().is_empty() {
            continue;
        }
        // The confirmation has to run out before the next form.
        if let Some(wait) = session.remaining(Instant::now(), display) {
            debug!("run_kiosk: waiting {:?} for a new form", wait);
            thread::sleep(wait);
        }
        session = session.tick(Instant::now(), display);

        let raw = parse_raw_answers(&line)?;
        let answers = answers_for(collector, &raw, language)?;
        match collector.submit(session, &answers, Instant::now()) {
            Ok(s) => {
                session = s;
                stored += 1;
                print_confirmation(collector.config());
            }
            Err(e) if e.is_recoverable() => {
                warn!("run_kiosk: submission failed: {}", e);
                print_retry_prompt(&e);
            }
            Err(e) => return Err(e),
        }
    }
    info!("run_kiosk: stored {} responses", stored);
    Ok(stored)
}

/// Starts the kiosk on the standard input.
pub fn start_kiosk(
    config_path: Option<String>,
    out: Option<String>,
    language: Option<String>,
) -> CollectorResult<()> {
    let collector = Collector::new(load_config(config_path, out)?)?;
    let stdin = std::io::stdin();
    run_kiosk(&collector, stdin.lock(), language.as_deref())?;
    Ok(())
}

pub fn load_config(
    config_path: Option<String>,
    out: Option<String>,
) -> CollectorResult<CollectorConfig> {
    let mut config = match config_path {
        Some(p) => read_config(&p)?,
        None => builtin_config()?,
    };
    if let Some(out_p) = out {
        config.destination = Destination::Local {
            path: PathBuf::from(out_p),
        };
    }
    info!("config: {:?}", config.destination);
    Ok(config)
}

fn answers_for(
    collector: &Collector,
    raw: &RawAnswers,
    language: Option<&str>,
) -> CollectorResult<Answers> {
    // The schema is decided once, before any answer is entered.
    let questionnaire = collector.questionnaire(raw.language.as_deref().or(language))?;
    build_answers(questionnaire, &raw.answers)
}

fn print_confirmation(config: &CollectorConfig) {
    println!("Thank you for your response!");
    println!(
        "A new form will appear in {} seconds...",
        config.confirmation.as_secs()
    );
}

pub fn print_retry_prompt(e: &CollectorError) {
    eprintln!("The response could not be sent: {}", e);
    eprintln!("Nothing was saved. Please submit the form again.");
}

pub fn print_error(e: &CollectorError) {
    eprintln!("An error occured {}", e);
    if let Some(bt) = ErrorCompat::backtrace(e) {
        eprintln!("trace: {}", bt);
    }
}
