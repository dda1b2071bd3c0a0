//! CLI argument definitions using clap
//!
//! Commands:
//! - variant-store encode-key --chrom <c> --pos <p> --ref <r> --alt <a>
//! - variant-store decode-key <hex>
//! - variant-store column <kind> ...
//! - variant-store ddl --config <path>
//! - variant-store compile --config <path> --catalog <path> --query <path>

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::keycodec::DEFAULT_MAX_ROW_LENGTH;
use crate::query::SortOrder;

/// variant-store - row keys, columns and queries of a wide-column variant table
#[derive(Parser, Debug)]
#[command(name = "variant-store")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode variant coordinates into a row key
    EncodeKey {
        #[arg(long)]
        chrom: String,

        #[arg(long)]
        pos: u32,

        #[arg(long = "ref", default_value = "")]
        reference: String,

        #[arg(long = "alt", default_value = "")]
        alternate: String,

        /// End of a structural variant
        #[arg(long)]
        end: Option<u32>,

        #[arg(long, default_value_t = DEFAULT_MAX_ROW_LENGTH)]
        max_row_length: usize,
    },

    /// Decode a hex row key
    DecodeKey {
        key: String,

        /// TYPE column of a hashed key
        #[arg(long = "type", requires = "alleles")]
        variant_type: Option<String>,

        /// ALLELES column of a hashed key, `REF,ALT`
        #[arg(long, requires = "variant_type")]
        alleles: Option<String>,
    },

    /// Render or parse a dynamic column name
    Column {
        #[command(subcommand)]
        kind: ColumnKind,
    },

    /// Print the DDL of the variants table
    Ddl {
        /// Path to configuration file
        #[arg(long, default_value = "./variant-store.json")]
        config: PathBuf,
    },

    /// Compile a JSON query into a SELECT statement
    Compile {
        /// Path to configuration file
        #[arg(long, default_value = "./variant-store.json")]
        config: PathBuf,

        /// Path to the catalog snapshot
        #[arg(long)]
        catalog: PathBuf,

        /// Path to the query, a JSON object of param → value. `-` reads stdin.
        #[arg(long, default_value = "-")]
        query: PathBuf,

        #[arg(long)]
        count: bool,

        #[arg(long)]
        limit: Option<u64>,

        #[arg(long)]
        skip: Option<u64>,

        #[arg(long, value_enum)]
        sort: Option<SortArg>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ColumnKind {
    Study { study: u32 },
    File { study: u32, file: u32 },
    Sample {
        study: u32,
        sample: u32,
        /// Secondary file of a multi-file sample
        #[arg(long)]
        file: Option<u32>,
    },
    /// Every stats column of a cohort
    Cohort { study: u32, cohort: u32 },
    Score { study: u32, score: u32 },
    Release { release: u32 },
    /// Parse a column name back into its parts
    Parse { name: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum SortArg {
    Asc,
    Desc,
}

impl From<SortArg> for SortOrder {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Asc => SortOrder::Asc,
            SortArg::Desc => SortOrder::Desc,
        }
    }
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
