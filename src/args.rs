use clap::Parser;

/// This is a performance-indicator scorecard reporting program.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The JSON configuration describing the indicator catalog, the
    /// observation file sources and the report settings. For more information
    /// about the file format, read the documentation.
    #[clap(short, long, value_parser)]
    pub config: String,

    /// (file path) A reference report in JSON format. If provided, vetkpi will
    /// check that the generated report matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the report will be written in JSON
    /// format to the given location. Setting this option overrides the output directory
    /// that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path or empty) A single observation file. If specified, it replaces the
    /// entry file sources of the configuration.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (default csv) The type of the input: csv, xlsx or json.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// (fiscal year) Overrides the report fiscal year from the configuration.
    #[clap(long, value_parser)]
    pub year: Option<i32>,

    /// (fiscal year) Overrides the comparison year from the configuration.
    #[clap(long, value_parser)]
    pub prior_year: Option<i32>,

    /// When using an Excel file with --input, indicates the name of the worksheet to use.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
