use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use svckit::config::ConfigOverrides;
use svckit::errors::ThinkerError;
use svckit::types::{IndexFilter, TableTarget};

use crate::commands::{
    Command, CreateCommand, DescribeCommand, PurgeCommand, ReadCommand, WriteCommand,
};

#[derive(Parser, Debug)]
#[command(name = "thinker")]
#[command(about = "Create, inspect, read, write and purge RethinkDB tables")]
#[command(version)]
pub struct Cli {
    /// A config file to use
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Host to use for rethink [default: localhost]
    #[arg(short = 'H', long, global = true)]
    pub host: Option<String>,

    /// The auth key to use when connecting
    #[arg(short, long, global = true)]
    pub key: Option<String>,

    /// Port to use for rethink [default: 28015]
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only talk to the given host, skip cluster topology discovery
    #[arg(long, global = true)]
    pub no_discover: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Create the database, table and indexes that do not exist yet
    Create(CreateArgs),
    /// Print the rows of a table, optionally following changes
    Read(ReadArgs),
    /// Insert the JSON object in a file, one or more times
    Write(WriteArgs),
    /// Print databases, tables and indexes as JSON
    Describe(DescribeArgs),
    /// Delete all rows, or the rows matching an index value
    Purge(PurgeArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    pub db: String,
    pub table: String,

    /// An index to create
    #[arg(short, long = "index", value_delimiter = ',')]
    pub indexes: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ReadArgs {
    pub db: String,
    pub table: String,
    pub index: Option<String>,
    pub id: Option<String>,

    /// If we should follow changes
    #[arg(short, long)]
    pub follow: bool,
}

#[derive(Args, Debug)]
pub struct WriteArgs {
    pub db: String,
    pub table: String,
    pub file: PathBuf,

    /// The number of times to write the file to the db [default: 1]
    #[arg(short, long)]
    pub times: Option<u32>,

    /// The number of seconds to pause between writes [default: 0]
    #[arg(short, long)]
    pub delay: Option<u64>,
}

#[derive(Args, Debug)]
pub struct DescribeArgs {
    pub db: Option<String>,
}

#[derive(Args, Debug)]
pub struct PurgeArgs {
    pub db: String,
    pub table: String,
    pub index: Option<String>,
    pub id: Option<String>,

    /// If we should not dump the deleted rows
    #[arg(short, long)]
    pub silent: bool,
}

impl CliCommand {
    pub fn name(&self) -> &'static str {
        match self {
            CliCommand::Create(_) => "create",
            CliCommand::Read(_) => "read",
            CliCommand::Write(_) => "write",
            CliCommand::Describe(_) => "describe",
            CliCommand::Purge(_) => "purge",
        }
    }
}

/// Everything `main` needs to resolve configuration and run one command
pub struct Invocation {
    pub overrides: ConfigOverrides,
    pub target: Option<TableTarget>,
    pub command: Box<dyn Command>,
}

impl Cli {
    pub fn into_invocation(self) -> Result<Invocation, ThinkerError> {
        let mut overrides = ConfigOverrides {
            config_file: self.config,
            host: self.host,
            port: self.port,
            key: self.key,
            verbose: self.verbose.then_some(true),
            discover: self.no_discover.then_some(false),
            ..Default::default()
        };

        let (target, command): (Option<TableTarget>, Box<dyn Command>) = match self.command {
            CliCommand::Create(args) => (
                Some(TableTarget::new(args.db, args.table)),
                Box::new(CreateCommand {
                    indexes: args.indexes,
                }),
            ),
            CliCommand::Read(args) => {
                overrides.follow = args.follow.then_some(true);
                (
                    Some(TableTarget::new(args.db, args.table)),
                    Box::new(ReadCommand {
                        filter: IndexFilter::from_args(args.index, args.id)?,
                    }),
                )
            }
            CliCommand::Write(args) => {
                overrides.times = args.times;
                overrides.delay = args.delay;
                (
                    Some(TableTarget::new(args.db, args.table)),
                    Box::new(WriteCommand { file: args.file }),
                )
            }
            CliCommand::Describe(args) => (None, Box::new(DescribeCommand { db: args.db })),
            CliCommand::Purge(args) => {
                overrides.silent = args.silent.then_some(true);
                (
                    Some(TableTarget::new(args.db, args.table)),
                    Box::new(PurgeCommand {
                        filter: IndexFilter::from_args(args.index, args.id)?,
                    }),
                )
            }
        };

        Ok(Invocation {
            overrides,
            target,
            command,
        })
    }
}
