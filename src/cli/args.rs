// Command-line flags. Every required value can also come from the
// environment (or a `.env` file), so a configured machine can run the tool
// with no arguments at all.

use clap::Parser;

use crate::core::pipeline::formatting::check_time_format;
use crate::core::pipeline::{
    FileQuery, RunRequest, DEFAULT_MAX_LABELS, DEFAULT_SHEET_NAME, DEFAULT_TIMESTAMP_FORMAT,
};

#[derive(Debug, Parser)]
#[command(
    name = "gsimg-analyzer",
    version,
    about = "Back up a Drive image to Cloud Storage, label it with Vision, log it to Sheets"
)]
pub struct Cli {
    /// Image file name on Google Drive
    #[arg(short = 'i', long = "imgfile", env = "GSIMG_FILE")]
    pub imgfile: String,

    /// Treat --imgfile as a raw Drive search query instead of a file name
    #[arg(long)]
    pub raw_query: bool,

    /// Cloud Storage bucket name
    #[arg(short = 'b', long, env = "GSIMG_BUCKET")]
    pub bucket: String,

    /// Cloud Storage object prefix ("folder")
    #[arg(short = 'f', long, env = "GSIMG_FOLDER", default_value = "")]
    pub folder: String,

    /// Spreadsheet ID (the long token in the Sheet's URL)
    #[arg(short = 's', long, env = "GSIMG_SHEET_ID")]
    pub sheet_id: String,

    /// Tab to append the report row to
    #[arg(long, env = "GSIMG_SHEET_NAME", default_value = DEFAULT_SHEET_NAME)]
    pub sheet_name: String,

    /// Number of Vision labels to keep
    #[arg(
        short = 't',
        long,
        env = "GSIMG_TOP_LABELS",
        default_value_t = DEFAULT_MAX_LABELS,
        value_parser = parse_top_labels
    )]
    pub top_labels: usize,

    /// Add a Gemini description column (needs GEMINI_API_KEY)
    #[arg(long)]
    pub describe: bool,

    /// Add a Google Maps link column for geotagged photos
    #[arg(long)]
    pub geolocate: bool,

    /// chrono format for the "modified" column
    #[arg(
        long,
        env = "GSIMG_TIME_FORMAT",
        default_value = DEFAULT_TIMESTAMP_FORMAT,
        value_parser = parse_time_format
    )]
    pub time_format: String,

    /// Verbose (debug) logging
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

fn parse_top_labels(value: &str) -> Result<usize, String> {
    let n: usize = value
        .parse()
        .map_err(|_| format!("'{}' is not a number", value))?;
    if n == 0 {
        return Err("must be at least 1".to_string());
    }
    Ok(n)
}

fn parse_time_format(value: &str) -> Result<String, String> {
    check_time_format(value)?;
    Ok(value.to_string())
}

impl Cli {
    pub fn query(&self) -> FileQuery {
        if self.raw_query {
            FileQuery::Raw(self.imgfile.clone())
        } else {
            FileQuery::Name(self.imgfile.clone())
        }
    }

    pub fn run_request(&self) -> RunRequest {
        let mut request = RunRequest::new(
            self.query(),
            self.bucket.clone(),
            self.folder.clone(),
            self.sheet_id.clone(),
        );
        request.sheet_name = self.sheet_name.clone();
        request.max_labels = self.top_labels;
        request.include_location = self.geolocate;
        request.timestamp_format = self.time_format.clone();
        request
    }

    /// Browser URL of the report spreadsheet.
    pub fn sheet_url(&self) -> String {
        format!("https://docs.google.com/spreadsheets/d/{}/edit", self.sheet_id)
    }
}
