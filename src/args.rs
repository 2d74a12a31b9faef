use clap::Parser;

/// Records the answers of a visitor survey.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON file describing the questionnaires and where the responses
    /// are stored. When not provided, the built-in Salmon Knowledge Centre questionnaire is used,
    /// storing the responses in visitor_data.csv.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path, '-' or empty) The answers of the visitor in JSON format. Reads the standard
    /// input when empty or '-'.
    #[clap(short, long, value_parser)]
    pub answers: Option<String>,

    /// (file path, optional) If specified, the responses are appended to this CSV file. Setting
    /// this option overrides the destination that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (language, optional) The questionnaire to use when the answers do not name one.
    #[clap(short, long, value_parser)]
    pub language: Option<String>,

    /// Prints the header row of the questionnaire and exits.
    #[clap(long, takes_value = false)]
    pub print_header: bool,

    /// Runs the kiosk: reads one JSON answer set per line from the standard input, waiting for the
    /// confirmation delay between two visitors. A response that cannot be sent is reported and
    /// the next line is taken as the retry.
    #[clap(long, takes_value = false)]
    pub kiosk: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
