//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// careadmin - batch admin jobs for the care-matching backend
#[derive(Debug, Parser)]
#[command(
    name = "ca",
    author,
    version,
    about = "Seed, migrate and clean up care-matching user data",
    long_about = None
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create an account per bulk record and write the remapped record under it
    Seed {
        #[command(flatten)]
        load: LoadArgs,

        /// Password given to every created account
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Resolve each bulk record's account by email and write the remapped record
    Migrate {
        #[command(flatten)]
        load: LoadArgs,
    },

    /// Print the download URL of every stored photo under a prefix
    PhotoUrls {
        /// Object name prefix
        #[arg(short, long)]
        prefix: Option<String>,
    },

    /// Rewrite care type and task option codes in user care preferences
    RewriteCarePreferences {
        /// Collection holding the user documents
        #[arg(short = 'C', long)]
        collection: Option<String>,

        /// Log the updates without writing them
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Rewrite task option codes in session notes
    RewriteSessionNotes {
        /// Collection holding the session documents
        #[arg(short = 'C', long)]
        collection: Option<String>,

        /// Log the updates without writing them
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Inspect the target schemas
    Schema {
        #[command(subcommand)]
        command: SchemaCommand,
    },
}

/// Arguments shared by the bulk loading jobs
#[derive(Debug, clap::Args)]
pub struct LoadArgs {
    /// JSON file holding an array of user records
    #[arg(short, long, value_name = "FILE")]
    pub bulk_source: Option<PathBuf>,

    /// Collection to write to
    #[arg(short = 'C', long)]
    pub collection: Option<String>,

    /// Built-in target schema name
    #[arg(short, long)]
    pub schema: Option<String>,

    /// Target schema YAML file, instead of a built-in schema
    #[arg(long, value_name = "FILE", conflicts_with = "schema")]
    pub schema_file: Option<PathBuf>,

    /// Remap and log every record without writing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

#[derive(Debug, Subcommand)]
pub enum SchemaCommand {
    /// List the built-in schemas
    List,

    /// Print a schema as YAML
    Show {
        /// Built-in schema name
        #[arg(required = true)]
        name: String,
    },
}
