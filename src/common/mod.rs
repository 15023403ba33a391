//! Common functionality.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use console::Term;

pub mod io;

/// Commonly used command line arguments.
#[derive(Parser, Debug)]
pub struct Args {
    /// Verbosity of the program
    #[clap(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            verbose: Verbosity::new(0, 0),
        }
    }
}

/// Print an informational progress line to stdout.
///
/// These lines are meant for humans watching the run; nothing parses them.
pub fn report_progress(message: &str) {
    if let Err(e) = Term::stdout().write_line(message) {
        tracing::debug!("could not write progress line: {}", e);
    }
}

/// Format the "produced in" progress line for `name`.
pub fn produced_message(name: &str, elapsed: Duration) -> String {
    format!("The file: {} produced in {}s", name, elapsed.as_secs())
}

/// Names of the local files derived from the remote file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalNames {
    /// The compressed file as downloaded.
    pub zipped: PathBuf,
    /// The decompressed VCF file.
    pub unzipped: PathBuf,
    /// The tab-separated table.
    pub tabular: PathBuf,
    /// The JSON array with the node entities.
    pub nodes: PathBuf,
    /// The JSON array with the link entities.
    pub links: PathBuf,
}

impl LocalNames {
    /// Derive local names in `out_dir` from the remote `file_name`.
    ///
    /// `clinvar.vcf.gz` becomes `clinvar.vcf` (decompressed) and `clinvar.tsv`.
    pub fn new<P: AsRef<Path>>(out_dir: P, file_name: &str) -> Self {
        let out_dir = out_dir.as_ref();
        let unzipped = strip_extension(file_name);
        let tabular = format!("{}.tsv", strip_extension(unzipped));
        Self {
            zipped: out_dir.join(file_name),
            unzipped: out_dir.join(unzipped),
            tabular: out_dir.join(tabular),
            nodes: out_dir.join("nodes.json"),
            links: out_dir.join("links.json"),
        }
    }
}

/// Strip the last extension from `file_name`, keeping leading dots.
fn strip_extension(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(pos) if pos > 0 => &file_name[..pos],
        _ => file_name,
    }
}

/// Return the version of the crate and `x.y.z` in tests.
pub fn worker_version() -> &'static str {
    if cfg!(test) {
        "x.y.z"
    } else {
        env!("CARGO_PKG_VERSION")
    }
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    #[rstest::rstest]
    #[case("clinvar.vcf.gz", "clinvar.vcf", "clinvar.tsv")]
    #[case("clinvar.vcf", "clinvar", "clinvar.tsv")]
    #[case("variants", "variants", "variants.tsv")]
    #[case(".hidden.gz", ".hidden", ".hidden.tsv")]
    fn local_names(#[case] remote: &str, #[case] unzipped: &str, #[case] tabular: &str) {
        let names = super::LocalNames::new("out", remote);

        assert_eq!(
            names,
            super::LocalNames {
                zipped: PathBuf::from("out").join(remote),
                unzipped: PathBuf::from("out").join(unzipped),
                tabular: PathBuf::from("out").join(tabular),
                nodes: PathBuf::from("out/nodes.json"),
                links: PathBuf::from("out/links.json"),
            }
        );
    }

    #[test]
    fn produced_message() {
        insta::assert_snapshot!(
            super::produced_message("clinvar.tsv", Duration::from_millis(2500)),
            @"The file: clinvar.tsv produced in 2s"
        );
    }

    #[test]
    fn worker_version() {
        assert_eq!(super::worker_version(), "x.y.z");
    }
}
