//! Implementation of the `crawl` sub command.
//!
//! Downloads the remote file, decompresses it, writes the variant table and
//! finally converts the table into `nodes.json` and `links.json`.

use std::time::Instant;

use thousands::Separable;

use crate::{
    common::{self, LocalNames},
    fetch, pipeline, tabular,
};

/// Default location of the weekly ClinVar VCF for GRCh38.
pub const DEFAULT_URL: &str =
    "ftp://ftp.ncbi.nlm.nih.gov/pub/clinvar/vcf_GRCh38/weekly/clinvar.vcf.gz";

/// Command line arguments for `crawl` sub command.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "Download VCF and convert to graph JSON", long_about = None)]
pub struct Args {
    /// URL of the gzip-compressed VCF file.
    #[arg(long, default_value = DEFAULT_URL)]
    pub url: String,
    /// Directory for all local files.
    #[arg(long, default_value = ".")]
    pub path_out_dir: String,
    /// Use an already downloaded file in the output directory if present.
    #[arg(long)]
    pub skip_download: bool,
    #[command(flatten)]
    pub options: pipeline::Options,
}

fn path_str(path: &std::path::Path) -> Result<&str, anyhow::Error> {
    path.to_str()
        .ok_or_else(|| anyhow::anyhow!("path {:?} is not valid UTF-8", path))
}

/// Main entry point for `crawl` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let before_anything = Instant::now();
    tracing::info!("args_common = {:?}", &args_common);
    tracing::info!("args = {:?}", &args);

    let remote = fetch::RemoteFile::parse(&args.url)?;
    let names = LocalNames::new(&args.path_out_dir, &remote.file_name);
    std::fs::create_dir_all(&args.path_out_dir).map_err(|e| {
        anyhow::anyhow!(
            "could not create output directory {}: {}",
            &args.path_out_dir,
            e
        )
    })?;

    if args.skip_download && names.zipped.exists() {
        tracing::info!("reusing downloaded file {:?}", &names.zipped);
    } else {
        tracing::info!("downloading {} ...", &args.url);
        let before_download = Instant::now();
        let bytes = fetch::download(&remote, &names.zipped)?;
        tracing::info!(
            "... downloaded {} bytes in {:?}",
            bytes.separate_with_commas(),
            before_download.elapsed()
        );
        common::report_progress(&format!(
            "The file: {}, downloaded in {}s",
            &remote.file_name,
            before_download.elapsed().as_secs()
        ));
    }

    tracing::info!("decompressing {:?} ...", &names.zipped);
    let before_decompression = Instant::now();
    let bytes = common::io::decompress_gz(&names.zipped, &names.unzipped)?;
    tracing::info!(
        "... decompressed {} bytes in {:?}",
        bytes.separate_with_commas(),
        before_decompression.elapsed()
    );
    common::report_progress(&format!(
        "The file: {}, extracted to {}, in {}s",
        names.zipped.display(),
        names.unzipped.display(),
        before_decompression.elapsed().as_secs()
    ));

    tracing::info!("writing variant table {:?} ...", &names.tabular);
    let before_tabular = Instant::now();
    let stats = tabular::convert_file(path_str(&names.unzipped)?, path_str(&names.tabular)?)?;
    tracing::info!(
        "... wrote {} rows in {:?}",
        stats.rows.separate_with_commas(),
        before_tabular.elapsed()
    );
    common::report_progress(&common::produced_message(
        path_str(&names.tabular)?,
        before_tabular.elapsed(),
    ));

    pipeline::convert_and_report(
        path_str(&names.tabular)?,
        path_str(&names.nodes)?,
        path_str(&names.links)?,
        &args.options,
    )?;

    tracing::info!(
        "All of `crawl` completed in {:?}",
        before_anything.elapsed()
    );
    Ok(())
}
