use std::io::{self, Write};

use adsnap_core::types::HeaderRecord;
use adsnap_format::Snapshot;

use crate::types::HeaderJson;

pub(crate) fn cmd_header(path: &str, json: bool) -> anyhow::Result<i32> {
    let snapshot = match Snapshot::open(path) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            eprintln!("error: failed to open {path}: {err}");
            return Ok(3);
        }
    };
    let header = snapshot.header();

    if json {
        let out = HeaderJson {
            path,
            signature: &header.signature,
            version: header.version,
            captured_at: header.captured_at.render(),
            description: &header.description,
            server: &header.server,
            object_count: header.object_count,
            attribute_count: header.attribute_count,
            class_count: header.class_count,
            prefix_count: header.prefix_count,
            file_size: header.file_size,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        write_header(&mut io::stdout().lock(), path, header)?;
    }
    Ok(0)
}

/// Human-readable header block, shared with `query --dump-header`.
pub(crate) fn write_header(
    w: &mut impl Write,
    path: &str,
    header: &HeaderRecord,
) -> io::Result<()> {
    writeln!(w, "File:         {path}")?;
    writeln!(w, "Server:       {}", or_na(&header.server))?;
    writeln!(w, "Description:  {}", or_na(&header.description))?;
    writeln!(w, "Captured:     {}", header.captured_at.render())?;
    writeln!(w, "Version:      {}", header.version)?;
    writeln!(w, "Objects:      {}", header.object_count)?;
    writeln!(w, "Attributes:   {}", header.attribute_count)?;
    writeln!(w, "Classes:      {}", header.class_count)?;
    writeln!(w, "Prefixes:     {}", header.prefix_count)?;
    let size_mb = header.file_size as f64 / (1024.0 * 1024.0);
    writeln!(w, "Size:         {size_mb:.2} MB")?;
    writeln!(w, "-")
}

fn or_na(text: &str) -> &str {
    if text.is_empty() {
        "N/A"
    } else {
        text
    }
}
