use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Normalize inventory exports and sync them to a Smartsheet sheet",
    long_about = None
)]
pub struct Cli {
    /// Settings file (defaults to ~/.stock_sync.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Inspect an export: row and column counts, header structure, inventory columns
    Analyze(AnalyzeArgs),
    /// Run the normalization pipeline and show the first rows
    Preview(PreviewArgs),
    /// Check access to the target sheet and list its columns
    Connect(ConnectArgs),
    /// Normalize an export and upload it to the target sheet
    Upload(UploadArgs),
}

#[derive(Debug, Args)]
pub struct InputArgs {
    /// Inventory export (.xlsx, .xlsm, .xls, .ods, .csv, .tsv, or '-' for stdin)
    #[arg(short, long)]
    pub input: PathBuf,
    /// Delimiter for text inputs (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of text inputs (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ModeArgs {
    /// Keep the reconciled export as-is (no mapping, no row filter)
    #[arg(long, overrides_with = "no_verbatim")]
    pub verbatim: bool,
    /// Map onto the inventory columns and drop invalid rows
    #[arg(long = "no-verbatim", overrides_with = "verbatim")]
    pub no_verbatim: bool,
    /// Map source columns onto the inventory column set (standard mode only)
    #[arg(long, overrides_with = "no_mapping")]
    pub mapping: bool,
    /// Keep source column names in standard mode
    #[arg(long = "no-mapping", overrides_with = "mapping")]
    pub no_mapping: bool,
}

impl ModeArgs {
    pub fn verbatim(&self) -> Option<bool> {
        flag_pair(self.verbatim, self.no_verbatim)
    }

    pub fn mapping(&self) -> Option<bool> {
        flag_pair(self.mapping, self.no_mapping)
    }
}

#[derive(Debug, Args)]
pub struct RemoteArgs {
    /// Sheet URL, publish link, or sheet id
    #[arg(long)]
    pub sheet: Option<String>,
    /// API access token
    #[arg(long, env = "SMARTSHEET_ACCESS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
    /// Store the token in the settings file for later runs
    #[arg(long)]
    pub remember_token: bool,
    /// Override the API base URL
    #[arg(long = "api-base")]
    pub api_base: Option<String>,
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub input: InputArgs,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub modes: ModeArgs,
    /// Number of rows to show
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
    /// Maximum number of columns to show
    #[arg(long = "max-columns", default_value_t = crate::table::PREVIEW_MAX_COLUMNS)]
    pub max_columns: usize,
}

#[derive(Debug, Args)]
pub struct ConnectArgs {
    #[command(flatten)]
    pub remote: RemoteArgs,
}

#[derive(Debug, Args)]
pub struct UploadArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub modes: ModeArgs,
    #[command(flatten)]
    pub remote: RemoteArgs,
    /// Rows per upload request
    #[arg(long = "batch-size", value_parser = clap::value_parser!(u32).range(1..=500))]
    pub batch_size: Option<u32>,
    /// Attempts per remote call before giving up
    #[arg(long = "max-retries", value_parser = clap::value_parser!(u32).range(1..=10))]
    pub max_retries: Option<u32>,
    /// Base retry delay in seconds; attempt n waits n times this long
    #[arg(long = "retry-delay", default_value_t = 2)]
    pub retry_delay: u64,
    /// Delete every existing row before uploading
    #[arg(long, overrides_with = "append")]
    pub overwrite: bool,
    /// Keep existing rows and add the new ones at the bottom
    #[arg(long, overrides_with = "overwrite")]
    pub append: bool,
    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

impl UploadArgs {
    pub fn overwrite(&self) -> Option<bool> {
        flag_pair(self.overwrite, self.append)
    }
}

fn flag_pair(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
