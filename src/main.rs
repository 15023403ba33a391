//! VCF graph crawler main executable

pub mod common;
pub mod crawl;
pub mod entity;
pub mod err;
pub mod fetch;
pub mod pipeline;
pub mod record;
pub mod sink;
pub mod tabular;

use clap::{Parser, Subcommand};
use console::{Emoji, Term};

/// CLI parser based on clap.
#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Turn VCF files into graph documents",
    long_about = "This tool downloads a VCF file and converts it into a variant table \
                  and JSON documents with nodes and links for a graph store"
)]
struct Cli {
    /// Commonly used arguments
    #[command(flatten)]
    common: common::Args,

    /// The sub command to run
    #[command(subcommand)]
    command: Commands,
}

/// Enum supporting the parsing of top-level commands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Download, decompress and convert in one go.
    Crawl(crawl::Args),
    /// Convert a VCF file into the variant table.
    Tsv(tabular::Args),
    /// Convert the variant table into node and link JSON.
    Json(pipeline::Args),
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Build a tracing subscriber according to the configuration in `cli.common`.
    let collector = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(match cli.common.verbose.log_level() {
            Some(level) => match level {
                log::Level::Error => tracing::Level::ERROR,
                log::Level::Warn => tracing::Level::WARN,
                log::Level::Info => tracing::Level::INFO,
                log::Level::Debug => tracing::Level::DEBUG,
                log::Level::Trace => tracing::Level::TRACE,
            },
            None => tracing::Level::INFO,
        })
        .compact()
        .finish();

    // Install collector for all threads and go into sub commands.
    tracing::subscriber::set_global_default(collector)?;
    let term = Term::stderr();
    tracing::debug!("vcf-graph-crawler {}", common::worker_version());
    match &cli.command {
        Commands::Crawl(args) => crawl::run(&cli.common, args)?,
        Commands::Tsv(args) => tabular::run(&cli.common, args)?,
        Commands::Json(args) => pipeline::run(&cli.common, args)?,
    }
    term.write_line(&format!("All done. Have a nice day!{}", Emoji(" 😃", "")))?;

    Ok(())
}

#[cfg(test)]
mod test {
    use clap::{CommandFactory, Parser};
    use pretty_assertions::assert_eq;

    use super::{Cli, Commands};

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_json_command() {
        let cli = Cli::parse_from([
            "vcf-graph-crawler",
            "json",
            "--path-in",
            "clinvar.tsv",
            "--threads",
            "4",
            "--info-key-match",
            "exact",
        ]);

        match cli.command {
            Commands::Json(args) => {
                assert_eq!(args.path_in, "clinvar.tsv");
                assert_eq!(args.path_out_nodes, "nodes.json");
                assert_eq!(args.options.threads, 4);
                assert_eq!(
                    args.options.info_key_match,
                    crate::record::KeyMatch::Exact
                );
                assert!(!args.options.skip_malformed);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn crawl_defaults() {
        let cli = Cli::parse_from(["vcf-graph-crawler", "crawl"]);

        match cli.command {
            Commands::Crawl(args) => {
                assert_eq!(args.url, crate::crawl::DEFAULT_URL);
                assert_eq!(args.path_out_dir, ".");
                assert_eq!(args.options.threads, 1);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
