//! Conversion of VCF text into a simplified tab-separated table.
//!
//! Meta-information lines (`##`) and blank lines are dropped, the `#CHROM`
//! header is replaced by a fixed eight-column header and data lines are
//! truncated to their first eight columns.

use std::borrow::Cow;
use std::io::{BufRead, Write};
use std::time::Instant;

use thousands::Separable;

use crate::common::{self, io::open_read_maybe_gz, io::open_write_maybe_gz};

/// Columns of the output table.
pub const HEADER: [&str; 8] = ["#CHROM", "POS", "ID", "REF", "ALT", "QUAL", "FILTER", "INFO"];

/// Number of columns kept from each data line.
const NUM_COLUMNS: usize = HEADER.len();

/// Command line arguments for `tsv` sub command.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "Convert VCF to simplified TSV", long_about = None)]
pub struct Args {
    /// Path to the input VCF file, may be gzip-compressed.
    #[arg(long)]
    pub path_in: String,
    /// Path to the output TSV file.
    #[arg(long)]
    pub path_out: String,
}

/// Result of converting one input line.
#[derive(Debug, PartialEq, Eq)]
pub enum Line<'a> {
    /// The line does not appear in the output.
    Skip,
    /// The fixed header row.
    Header,
    /// A data row, `truncated` if columns beyond INFO were dropped.
    Data { text: Cow<'a, str>, truncated: bool },
}

/// Classify `line` (without its terminator) and build its output text.
pub fn convert_line(line: &str) -> Line<'_> {
    if line.starts_with("##") || line.is_empty() {
        Line::Skip
    } else if line.starts_with("#CHROM") {
        Line::Header
    } else {
        let parts: Vec<&str> = line.splitn(NUM_COLUMNS + 1, '\t').collect();
        if parts.len() > NUM_COLUMNS {
            Line::Data {
                text: Cow::Owned(parts[..NUM_COLUMNS].join("\t")),
                truncated: true,
            }
        } else if line.contains('\r') {
            Line::Data {
                text: Cow::Owned(line.replace('\r', "")),
                truncated: false,
            }
        } else {
            Line::Data {
                text: Cow::Borrowed(line),
                truncated: false,
            }
        }
    }
}

/// Counters of a conversion run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Number of data rows written.
    pub rows: usize,
    /// Number of rows that had columns beyond INFO.
    pub truncated: usize,
}

/// Convert all lines from `reader` and write the table to `writer`.
pub fn convert<R: BufRead, W: Write>(reader: R, writer: &mut W) -> Result<Stats, anyhow::Error> {
    let mut stats = Stats::default();
    for line in reader.lines() {
        let line = line?;
        match convert_line(&line) {
            Line::Skip => continue,
            Line::Header => writeln!(writer, "{}", HEADER.join("\t"))?,
            Line::Data { text, truncated } => {
                writeln!(writer, "{}", text)?;
                stats.rows += 1;
                if truncated {
                    stats.truncated += 1;
                }
            }
        }
    }
    writer.flush()?;
    Ok(stats)
}

/// Convert the VCF file at `path_in` into the table at `path_out`.
pub fn convert_file(path_in: &str, path_out: &str) -> Result<Stats, anyhow::Error> {
    let reader = open_read_maybe_gz(path_in)
        .map_err(|e| anyhow::anyhow!("could not open input file {}: {}", path_in, e))?;
    let mut writer = open_write_maybe_gz(path_out)
        .map_err(|e| anyhow::anyhow!("could not open output file {}: {}", path_out, e))?;
    convert(reader, &mut writer)
}

/// Main entry point for `tsv` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:?}", &args_common);
    tracing::info!("args = {:?}", &args);

    let before_conversion = Instant::now();
    let stats = convert_file(&args.path_in, &args.path_out)?;
    tracing::info!(
        "wrote {} rows ({} truncated) in {:?}",
        stats.rows.separate_with_commas(),
        stats.truncated.separate_with_commas(),
        before_conversion.elapsed()
    );
    common::report_progress(&common::produced_message(
        &args.path_out,
        before_conversion.elapsed(),
    ));

    Ok(())
}
