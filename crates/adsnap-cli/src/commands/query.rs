use std::fs::File;
use std::io::{self, BufWriter, Write};

use adsnap_core::error::Error;
use adsnap_format::Snapshot;
use adsnap_query::{Query, QueryOptions};
use anyhow::Context;

use crate::commands::header::write_header;
use crate::output::{Format, Renderer};
use crate::util::expand_attributes;

pub(crate) struct QueryArgs {
    pub(crate) snapshot: String,
    pub(crate) filter: String,
    pub(crate) attributes: Vec<String>,
    pub(crate) format: String,
    pub(crate) limit: Option<usize>,
    pub(crate) ignore_case: bool,
    pub(crate) benchmark: bool,
    pub(crate) dump_header: bool,
    pub(crate) output: Option<String>,
}

pub(crate) fn cmd_query(args: QueryArgs) -> anyhow::Result<i32> {
    let snapshot = match Snapshot::open(&args.snapshot) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            eprintln!("error: failed to open {}: {err}", args.snapshot);
            return Ok(3);
        }
    };

    if args.dump_header {
        write_header(&mut io::stderr().lock(), &args.snapshot, snapshot.header())?;
    }

    let attributes = expand_attributes(&args.attributes);
    let options = QueryOptions {
        attributes: attributes.clone(),
        limit: args.limit,
        case_insensitive: args.ignore_case,
    };
    let query = match Query::new(&snapshot, &args.filter, options) {
        Ok(query) => query,
        Err(Error::Filter(err)) => {
            eprintln!("filter syntax error: {err}");
            return Ok(2);
        }
        Err(err) => {
            eprintln!("error: {err}");
            return Ok(3);
        }
    };

    let unknown = query.unknown_attributes().to_vec();
    if !unknown.is_empty() {
        eprintln!(
            "warning: the following attributes do not exist in the snapshot: {}",
            unknown.join(", ")
        );
    }
    // Columns follow the requested spelling, minus names the snapshot
    // does not know.
    let columns = attributes.map(|names| {
        names
            .into_iter()
            .filter(|name| !unknown.iter().any(|u| u.eq_ignore_ascii_case(name)))
            .collect::<Vec<_>>()
    });
    let columns = columns.filter(|names| !names.is_empty());

    let out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("create {path}"))?,
        )),
        None => Box::new(io::stdout().lock()),
    };
    let mut renderer = Renderer::new(Format::from_flag(&args.format), out, columns);

    let mut matches = query.run();
    let mut failed = false;
    for item in matches.by_ref() {
        match item {
            Ok(row) => renderer.row(&row)?,
            Err(err) => {
                // Flush what already matched, then report.
                renderer.finish()?;
                eprintln!("error: {err}");
                failed = true;
                break;
            }
        }
    }
    if !failed {
        renderer.finish()?;
    }

    let stats = matches.stats();
    if args.benchmark {
        eprintln!();
        eprintln!("Benchmark:");
        eprintln!("  Objects scanned: {}", stats.objects_scanned);
        eprintln!("  Matches:         {}", stats.objects_matched);
        eprintln!("  Decode errors:   {}", stats.decode_errors);
        eprintln!("  Total time:      {:.3}s", stats.elapsed.as_secs_f64());
    }

    Ok(if failed {
        3
    } else if stats.objects_matched == 0 {
        1
    } else {
        0
    })
}
