use clap::{Parser, Subcommand};
use clap::builder::PossibleValuesParser;
use phenomate_console::consts::{LOG_FILES, PAGE_SIZES};
use std::path::PathBuf;

fn page_size(value: &str) -> Result<usize, String> {
    let size: usize = value.parse().map_err(|_| format!("`{value}` is not a number"))?;
    if PAGE_SIZES.contains(&size) {
        Ok(size)
    } else {
        Err(format!("page size must be one of {PAGE_SIZES:?}"))
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "phenomate",
    version,
    about = "Terminal console for the Phenomate offloading service"
)]
pub struct Args {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Args, Debug)]
pub struct GlobalArgs {
    /// Backend base URL
    #[arg(long, env = "PHENOMATE_URL", global = true)]
    pub url: Option<String>,

    /// IANA timezone used to display and enter dates
    #[arg(long, env = "PHENOMATE_TZ", global = true)]
    pub timezone: Option<String>,

    /// Config file (defaults to the user config directory)
    #[arg(long, env = "PHENOMATE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Where remembered browser directories are stored
    #[arg(long, env = "PHENOMATE_STATE", global = true)]
    pub state: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create, list and remove projects
    #[command(subcommand)]
    Projects(ProjectsCmd),

    /// Inspect and manage queued jobs
    #[command(subcommand)]
    Activities(ActivitiesCmd),

    /// List a directory on the backend host
    Browse(BrowseArgs),

    /// List a directory with file names parsed into date, site and sensor
    Files(FilesArgs),

    /// Parse file names locally with a project's patterns
    Parse(ParseArgs),

    /// Submit files for offloading into a project
    Offload(OffloadArgs),

    /// List known researchers
    Researchers,

    /// List known organisations
    Organisations,

    /// Fetch the backend's server logs
    #[command(subcommand)]
    Logs(LogsCmd),
}

#[derive(Subcommand, Debug)]
pub enum ProjectsCmd {
    /// List projects
    List(TableArgs),

    /// Show one project
    Show { id: i64 },

    /// Create a project
    Create(CreateArgs),

    /// Delete one or more projects and their stored folders
    Delete {
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// Preview the directory a project would be created in
    Preview(PreviewArgs),
}

#[derive(Subcommand, Debug)]
pub enum ActivitiesCmd {
    /// List the activities of a project
    List {
        project_id: i64,
        #[command(flatten)]
        table: TableArgs,
    },

    /// Re-queue a failed or queued activity
    Restart { id: i64 },

    /// Remove an activity log
    Cancel { id: i64 },

    /// Remove several activity logs
    Delete {
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// Remove every activity log of a project
    Clear { project_id: i64 },
}

#[derive(Subcommand, Debug)]
pub enum LogsCmd {
    /// Fetch the last bytes of a log
    Tail {
        #[arg(value_parser = PossibleValuesParser::new(LOG_FILES))]
        log: String,

        /// How much of the end of the log to fetch (256 KiB when omitted)
        #[arg(long)]
        bytes: Option<u64>,

        #[command(flatten)]
        save: SaveArgs,
    },

    /// Fetch a whole log
    Download {
        #[arg(value_parser = PossibleValuesParser::new(LOG_FILES))]
        log: String,

        #[command(flatten)]
        save: SaveArgs,
    },
}

/// Where fetched log text goes; stdout unless one of these is given.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct SaveArgs {
    /// Write to this file
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Write to a file named after the log in the current directory
    #[arg(long, conflicts_with = "output")]
    pub save: bool,
}

/// Filtering, sorting and paging shared by every table.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct TableArgs {
    /// Filter rows, COLUMN=VALUE; ranges and dates take MIN..MAX
    #[arg(short, long = "filter", value_name = "COLUMN=VALUE")]
    pub filters: Vec<String>,

    /// Sort by column
    #[arg(long, value_name = "COLUMN")]
    pub sort: Option<String>,

    /// Sort descending
    #[arg(long, requires = "sort")]
    pub desc: bool,

    /// Page to show, starting at 1
    #[arg(long, default_value_t = 1)]
    pub page: usize,

    /// Rows per page
    #[arg(long, value_parser = page_size)]
    pub page_size: Option<usize>,

    /// Print the distinct values of a column instead of rows
    #[arg(long, value_name = "COLUMN")]
    pub facets: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct CreateArgs {
    #[arg(long)]
    pub year: i32,

    #[arg(long)]
    pub summary: String,

    /// Naming template on the backend
    #[arg(long)]
    pub template: Option<String>,

    /// Mark the project as external
    #[arg(long)]
    pub external: bool,

    #[arg(long)]
    pub researcher: Option<String>,

    #[arg(long)]
    pub organisation: Option<String>,

    /// Root folder (backend default when omitted)
    #[arg(long)]
    pub root: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct PreviewArgs {
    #[arg(long)]
    pub year: Option<i32>,
    #[arg(long)]
    pub summary: Option<String>,
    #[arg(long)]
    pub project: Option<String>,
    #[arg(long)]
    pub site: Option<String>,
    #[arg(long)]
    pub platform: Option<String>,
    #[arg(long)]
    pub root: Option<String>,
    #[arg(long)]
    pub internal: Option<bool>,
    #[arg(long)]
    pub template: Option<String>,
    #[arg(long)]
    pub researcher: Option<String>,
    #[arg(long)]
    pub organisation: Option<String>,

    /// Read FIELD=VALUE edits from stdin and preview as they settle
    #[arg(long)]
    pub watch: bool,
}

#[derive(clap::Args, Debug)]
pub struct BrowseArgs {
    /// Directory to list (remembered directory or /home when omitted)
    pub path: Option<String>,

    /// Only list directories
    #[arg(long)]
    pub dir_only: bool,

    /// Include hidden entries
    #[arg(short, long)]
    pub all: bool,

    /// Form field whose remembered directory to start from
    #[arg(long, default_value = "src_files")]
    pub field: String,

    #[command(flatten)]
    pub table: TableArgs,
}

#[derive(clap::Args, Debug)]
pub struct FilesArgs {
    /// Directory to list
    pub path: Option<String>,

    /// Project whose name patterns apply
    #[arg(long)]
    pub project: Option<i64>,

    /// Extra pattern, EXT=REGEX (overrides the configured ones)
    #[arg(long = "pattern", value_name = "EXT=REGEX")]
    pub patterns: Vec<String>,

    #[arg(long, default_value = "src_files")]
    pub field: String,

    #[command(flatten)]
    pub table: TableArgs,
}

#[derive(clap::Args, Debug)]
pub struct ParseArgs {
    /// File names to parse
    #[arg(required = true)]
    pub names: Vec<String>,

    #[arg(long)]
    pub project: Option<i64>,

    #[arg(long = "pattern", value_name = "EXT=REGEX")]
    pub patterns: Vec<String>,

    #[command(flatten)]
    pub table: TableArgs,
}

#[derive(clap::Args, Debug)]
pub struct OffloadArgs {
    pub project_id: i64,

    /// Site sub-folder inside the project
    #[arg(long)]
    pub site: String,

    /// Files or folders to offload
    pub paths: Vec<String>,

    /// Also select the entries of this directory that pass --filter
    #[arg(long, value_name = "DIR")]
    pub from: Option<String>,

    #[arg(long = "pattern", value_name = "EXT=REGEX")]
    pub patterns: Vec<String>,

    #[arg(short, long = "filter", value_name = "COLUMN=VALUE")]
    pub filters: Vec<String>,

    #[arg(long, default_value = "src_files")]
    pub field: String,

    /// Show what would be submitted without contacting the backend
    #[arg(long)]
    pub dry_run: bool,
}
