//! Conversion of the variant table into node and link JSON documents.
//!
//! With one thread, rows are projected and appended inline.  With more, a
//! fixed pool of workers projects rows taken from a bounded channel and hands
//! the entities over to a single writer thread, the only owner of the sinks.

use std::io::BufRead;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use thousands::Separable;

use crate::{
    common::{self, io::open_read_maybe_gz},
    entity::{self, Link, Node},
    err::Error,
    record::{KeyMatch, Row},
    sink::JsonArraySink,
};

/// Options of the conversion, shared by the `json` and `crawl` sub commands.
#[derive(Debug, Clone, Copy, clap::Args)]
pub struct Options {
    /// Degree of parallelism; 2 or more runs workers plus a dedicated writer.
    #[arg(long, default_value_t = 1)]
    pub threads: usize,
    /// Log and skip malformed rows instead of aborting.
    #[arg(long)]
    pub skip_malformed: bool,
    /// How INFO keys are matched against annotation tokens.
    #[arg(long, value_enum, default_value_t = KeyMatch::Contains)]
    pub info_key_match: KeyMatch,
    /// Capacity of the channels between the threads.
    #[arg(long, default_value_t = 1024)]
    pub channel_capacity: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            threads: 1,
            skip_malformed: false,
            info_key_match: KeyMatch::Contains,
            channel_capacity: 1024,
        }
    }
}

/// Command line arguments for `json` sub command.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "Convert variant TSV to node/link JSON", long_about = None)]
pub struct Args {
    /// Path to the input TSV file as written by `tsv`.
    #[arg(long)]
    pub path_in: String,
    /// Path to the output JSON file with nodes.
    #[arg(long, default_value = "nodes.json")]
    pub path_out_nodes: String,
    /// Path to the output JSON file with links.
    #[arg(long, default_value = "links.json")]
    pub path_out_links: String,
    #[command(flatten)]
    pub options: Options,
}

/// Message from the workers to the writer.
#[derive(Debug)]
pub enum Message {
    Node(Node),
    Link(Link),
    /// All workers are done; drain and close.
    Stop,
}

/// Counters of a conversion run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Data rows read from the input.
    pub rows: usize,
    /// Entities written to the node document.
    pub nodes: usize,
    /// Entities written to the link document.
    pub links: usize,
    /// Malformed rows skipped.
    pub skipped: usize,
}

/// The pair of output documents.
pub struct Sinks {
    pub nodes: JsonArraySink<Node>,
    pub links: JsonArraySink<Link>,
}

impl Sinks {
    pub fn open(path_nodes: &str, path_links: &str) -> Result<Self, Error> {
        Ok(Self {
            nodes: JsonArraySink::open(path_nodes)?,
            links: JsonArraySink::open(path_links)?,
        })
    }

    /// Close both documents, returning the number of nodes and links.
    pub fn close(self) -> Result<(usize, usize), Error> {
        let nodes = self.nodes.close()?;
        let links = self.links.close()?;
        Ok((nodes, links))
    }
}

/// Parse and project one data row.
///
/// Returns `None` for a malformed row when skipping is enabled.
fn process_line(line: &str, options: &Options) -> Result<Option<(Node, Option<Link>)>, Error> {
    let result = Row::parse(line, options.info_key_match).and_then(|row| entity::project(&row));
    match result {
        Ok(entities) => Ok(Some(entities)),
        Err(e) if options.skip_malformed && e.is_malformed_row() => {
            tracing::warn!("skipping malformed row: {}", e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Run the conversion on the current thread.
pub fn run_sequential<R: BufRead>(
    reader: R,
    mut sinks: Sinks,
    options: &Options,
) -> Result<Stats, Error> {
    let mut stats = Stats::default();
    // The first line is the table header.
    for line in reader.lines().skip(1) {
        let line = line?;
        stats.rows += 1;
        match process_line(&line, options)? {
            Some((node, link)) => {
                sinks.nodes.append(&node)?;
                if let Some(link) = link {
                    sinks.links.append(&link)?;
                }
            }
            None => stats.skipped += 1,
        }
    }
    let (nodes, links) = sinks.close()?;
    stats.nodes = nodes;
    stats.links = links;
    Ok(stats)
}

/// Worker loop: project rows until the row channel is closed.
///
/// Returns the number of skipped rows.
fn process_rows(
    rows: Receiver<String>,
    messages: Sender<Message>,
    options: &Options,
) -> Result<usize, Error> {
    let mut skipped = 0;
    for line in rows {
        match process_line(&line, options)? {
            Some((node, link)) => {
                messages
                    .send(Message::Node(node))
                    .map_err(|_| Error::WriterGone)?;
                if let Some(link) = link {
                    messages
                        .send(Message::Link(link))
                        .map_err(|_| Error::WriterGone)?;
                }
            }
            None => skipped += 1,
        }
    }
    Ok(skipped)
}

/// Writer loop: append entities until `Stop`, then close the sinks.
fn write_messages(messages: Receiver<Message>, mut sinks: Sinks) -> Result<(usize, usize), Error> {
    for message in messages {
        match message {
            Message::Node(node) => sinks.nodes.append(&node)?,
            Message::Link(link) => sinks.links.append(&link)?,
            Message::Stop => return sinks.close(),
        }
    }
    // All senders gone without `Stop`: the run failed, leave the files open-ended.
    Err(Error::WriterGone)
}

/// Send the data rows of `reader` to the workers; returns the number sent.
fn dispatch_rows<R: BufRead>(reader: R, rows: &Sender<String>) -> Result<usize, Error> {
    let mut count = 0;
    for line in reader.lines().skip(1) {
        if rows.send(line?).is_err() {
            // every worker is gone, their errors are reported on join
            break;
        }
        count += 1;
    }
    Ok(count)
}

/// Run the conversion with a worker pool and a single writer thread.
pub fn run_concurrent<R: BufRead>(
    reader: R,
    sinks: Sinks,
    options: &Options,
) -> Result<Stats, Error> {
    let num_workers = options.threads.saturating_sub(1).max(1);
    let capacity = options.channel_capacity.max(1);
    tracing::debug!(
        "running with {} workers and channel capacity {}",
        num_workers,
        capacity
    );

    let (row_tx, row_rx) = crossbeam_channel::bounded::<String>(capacity);
    let (msg_tx, msg_rx) = crossbeam_channel::bounded::<Message>(capacity);

    std::thread::scope(|scope| {
        let writer = scope.spawn(move || write_messages(msg_rx, sinks));
        let workers = (0..num_workers)
            .map(|_| {
                let row_rx = row_rx.clone();
                let msg_tx = msg_tx.clone();
                scope.spawn(move || process_rows(row_rx, msg_tx, options))
            })
            .collect::<Vec<_>>();
        drop(row_rx);

        let dispatched = dispatch_rows(reader, &row_tx);
        drop(row_tx);

        let mut failure = None;
        let mut skipped = 0;
        for worker in workers {
            match worker.join() {
                Ok(Ok(count)) => skipped += count,
                Ok(Err(e)) => {
                    failure.get_or_insert(e);
                }
                Err(_) => {
                    failure.get_or_insert(Error::ThreadPanicked("worker"));
                }
            }
        }
        let rows = match dispatched {
            Ok(rows) => rows,
            Err(e) => {
                failure.get_or_insert(e);
                0
            }
        };

        // Every row is processed and its entities are queued before `Stop`.
        if failure.is_none() && msg_tx.send(Message::Stop).is_err() {
            failure = Some(Error::WriterGone);
        }
        drop(msg_tx);

        let written = writer
            .join()
            .map_err(|_| Error::ThreadPanicked("writer"))?;
        match (written, failure) {
            (Ok((nodes, links)), None) => Ok(Stats {
                rows,
                nodes,
                links,
                skipped,
            }),
            // The writer's own failure is the root cause of the workers' `WriterGone`.
            (Err(e), _) if !matches!(e, Error::WriterGone) => Err(e),
            (_, Some(e)) => Err(e),
            (Err(e), None) => Err(e),
        }
    })
}

/// Convert the rows of `reader`, choosing the mode from `options.threads`.
pub fn convert<R: BufRead>(reader: R, sinks: Sinks, options: &Options) -> Result<Stats, Error> {
    if options.threads >= 2 {
        run_concurrent(reader, sinks, options)
    } else {
        run_sequential(reader, sinks, options)
    }
}

/// Convert the table at `path_in` into the two JSON documents.
pub fn convert_file(
    path_in: &str,
    path_nodes: &str,
    path_links: &str,
    options: &Options,
) -> Result<Stats, anyhow::Error> {
    let reader = open_read_maybe_gz(path_in)
        .map_err(|e| anyhow::anyhow!("could not open input file {}: {}", path_in, e))?;
    let sinks = Sinks::open(path_nodes, path_links)
        .map_err(|e| anyhow::anyhow!("could not create output files: {}", e))?;
    let stats = convert(reader, sinks, options)
        .map_err(|e| anyhow::anyhow!("conversion of {} failed: {}", path_in, e))?;
    Ok(stats)
}

/// Convert with progress logging and reporting, as used by the sub commands.
pub fn convert_and_report(
    path_in: &str,
    path_nodes: &str,
    path_links: &str,
    options: &Options,
) -> Result<Stats, anyhow::Error> {
    let before_conversion = Instant::now();
    let stats = convert_file(path_in, path_nodes, path_links, options)?;
    tracing::info!(
        "converted {} rows into {} nodes and {} links in {:?}",
        stats.rows.separate_with_commas(),
        stats.nodes.separate_with_commas(),
        stats.links.separate_with_commas(),
        before_conversion.elapsed()
    );
    if stats.skipped > 0 {
        tracing::warn!(
            "skipped {} malformed rows",
            stats.skipped.separate_with_commas()
        );
    }
    common::report_progress(&format!(
        "The json files: {} and {} created from {} in {}s",
        path_nodes,
        path_links,
        path_in,
        before_conversion.elapsed().as_secs()
    ));
    Ok(stats)
}

/// Main entry point for `json` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:?}", &args_common);
    tracing::info!("args = {:?}", &args);

    convert_and_report(
        &args.path_in,
        &args.path_out_nodes,
        &args.path_out_links,
        &args.options,
    )?;

    Ok(())
}

#[cfg(test)]
mod test {
    use std::fmt::Write as _;

    use float_cmp::approx_eq;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::{Options, Sinks, Stats};
    use crate::entity::{Link, Node};
    use crate::err::Error;

    const HEADER: &str = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n";

    /// Build a table with `n` rows, every third one carrying an `RS` annotation.
    fn table(n: usize) -> String {
        let mut result = HEADER.to_owned();
        for i in 0..n {
            let info = if i % 3 == 0 {
                format!("ALLELEID={};AF_TGP=0.{};RS={}", i, i % 10, 1000 + i)
            } else {
                format!("ALLELEID={};CLNDN=not_provided", i)
            };
            writeln!(result, "1\t{}\t{}\tA\tG\t.\t.\t{}", 100 + i, i, info).unwrap();
        }
        result
    }

    fn read_outputs(tmp_dir: &temp_testdir::TempDir) -> Result<(Vec<Node>, Vec<Link>), anyhow::Error> {
        let mut nodes: Vec<Node> =
            serde_json::from_str(&std::fs::read_to_string(tmp_dir.join("nodes.json"))?)?;
        let mut links: Vec<Link> =
            serde_json::from_str(&std::fs::read_to_string(tmp_dir.join("links.json"))?)?;
        nodes.sort_by_key(|node| node.pos);
        links.sort_by(|a, b| a.from.cmp(&b.from));
        Ok((nodes, links))
    }

    fn run_on(
        input: &str,
        options: &Options,
        tmp_dir: &temp_testdir::TempDir,
    ) -> Result<Stats, Error> {
        let sinks = Sinks::open(
            tmp_dir.join("nodes.json").to_str().unwrap(),
            tmp_dir.join("links.json").to_str().unwrap(),
        )?;
        super::convert(input.as_bytes(), sinks, options)
    }

    #[test]
    fn single_row_end_to_end() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let input = format!("{}1\t100\trs1\tA\tG\t.\t.\tAF_ESP=0.5;RS=123\n", HEADER);

        let stats = run_on(&input, &Options::default(), &tmp_dir)?;

        assert_eq!(
            stats,
            Stats {
                rows: 1,
                nodes: 1,
                links: 1,
                skipped: 0
            }
        );
        let nodes: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(tmp_dir.join("nodes.json"))?)?;
        assert_eq!(
            nodes,
            serde_json::json!([{
                "CHROM": "1",
                "POS": 100,
                "ID": "rs1",
                "REF": "A",
                "ALT": "G",
                "AF_ESP": 0.5,
                "AF_EXAC": null,
                "AF_TGP": null,
                "ALLELEID": null
            }])
        );
        let links: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(tmp_dir.join("links.json"))?)?;
        assert_eq!(links, serde_json::json!([{"_from": "rs1", "_to": "123"}]));

        Ok(())
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(4)]
    fn header_only(#[case] threads: usize) -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let options = Options {
            threads,
            ..Default::default()
        };

        let stats = run_on(HEADER, &options, &tmp_dir)?;

        assert_eq!(stats, Stats::default());
        assert_eq!(std::fs::read_to_string(tmp_dir.join("nodes.json"))?, "[]\n");
        assert_eq!(std::fs::read_to_string(tmp_dir.join("links.json"))?, "[]\n");

        Ok(())
    }

    #[rstest]
    #[case(2, 1)]
    #[case(4, 2)]
    #[case(8, 1024)]
    fn concurrent_matches_sequential(
        #[case] threads: usize,
        #[case] channel_capacity: usize,
    ) -> Result<(), anyhow::Error> {
        let input = table(500);

        let seq_dir = temp_testdir::TempDir::default();
        let seq_stats = run_on(&input, &Options::default(), &seq_dir)?;
        let par_dir = temp_testdir::TempDir::default();
        let par_stats = run_on(
            &input,
            &Options {
                threads,
                channel_capacity,
                ..Default::default()
            },
            &par_dir,
        )?;

        assert_eq!(
            seq_stats,
            Stats {
                rows: 500,
                nodes: 500,
                links: 167,
                skipped: 0
            }
        );
        assert_eq!(par_stats, seq_stats);
        assert_eq!(read_outputs(&par_dir)?, read_outputs(&seq_dir)?);

        Ok(())
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    fn malformed_row_is_fatal(#[case] threads: usize) {
        let tmp_dir = temp_testdir::TempDir::default();
        let input = format!("{}{}", table(20), "1\tnot-a-number\t7\tA\tG\t.\t.\tRS=1\n");
        let options = Options {
            threads,
            channel_capacity: 2,
            ..Default::default()
        };

        let err = run_on(&input, &options, &tmp_dir).unwrap_err();

        assert!(err.is_malformed_row(), "unexpected error: {}", err);
    }

    #[cfg(target_os = "linux")]
    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(4)]
    fn sink_write_failure_is_fatal(#[case] threads: usize) {
        let tmp_dir = temp_testdir::TempDir::default();
        let path_links = tmp_dir.join("links.json").to_str().unwrap().to_owned();
        let options = Options {
            threads,
            channel_capacity: 4,
            ..Default::default()
        };

        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        std::thread::spawn(move || {
            let input = table(5000);
            let result = Sinks::open("/dev/full", &path_links)
                .and_then(|sinks| super::convert(input.as_bytes(), sinks, &options));
            let _ = done_tx.send(result);
        });

        let err = done_rx
            .recv_timeout(std::time::Duration::from_secs(60))
            .expect("conversion hangs on a failing sink")
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)), "unexpected error: {}", err);
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    fn malformed_row_is_skipped(#[case] threads: usize) -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let input = format!("{}1\t2\n{}", table(10), "1\t100\t7\tA\tG\t.\t.\tALLELEID=x\n");
        let options = Options {
            threads,
            skip_malformed: true,
            ..Default::default()
        };

        let stats = run_on(&input, &options, &tmp_dir)?;

        assert_eq!(
            stats,
            Stats {
                rows: 12,
                nodes: 10,
                links: 4,
                skipped: 2
            }
        );
        let (nodes, links) = read_outputs(&tmp_dir)?;
        assert_eq!(nodes.len(), 10);
        assert_eq!(links.len(), 4);

        Ok(())
    }

    #[test]
    #[tracing_test::traced_test]
    fn skipped_row_is_logged() {
        let tmp_dir = temp_testdir::TempDir::default();
        let input = format!("{}1\t2\n", HEADER);
        let options = Options {
            skip_malformed: true,
            ..Default::default()
        };

        let stats = run_on(&input, &options, &tmp_dir).expect("skipping must not fail");

        assert_eq!(stats.skipped, 1);
        assert!(logs_contain("skipping malformed row"));
    }

    #[test]
    fn run_smoke() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let args = super::Args {
            path_in: "tests/tabular/clinvar.tsv".into(),
            path_out_nodes: tmp_dir.join("nodes.json").to_str().unwrap().into(),
            path_out_links: tmp_dir.join("links.json").to_str().unwrap().into(),
            options: Options {
                threads: 3,
                ..Default::default()
            },
        };

        super::run(&Default::default(), &args)?;

        let (nodes, links) = read_outputs(&tmp_dir)?;
        assert_eq!(nodes.len(), 5);
        assert!(approx_eq!(f64, nodes[1].af_exac.unwrap(), 0.00001, ulps = 2));
        assert!(approx_eq!(f64, nodes[3].af_esp.unwrap(), 0.00023, ulps = 2));
        assert!(approx_eq!(f64, nodes[3].af_tgp.unwrap(), 0.0002, ulps = 2));
        assert_eq!(nodes[3].allele_id, Some(2386655));
        assert_eq!(
            links,
            vec![
                Link {
                    from: "2252161".into(),
                    to: "1553119294".into()
                },
                Link {
                    from: "2396347".into(),
                    to: "1239364457".into()
                },
            ]
        );

        Ok(())
    }
}
