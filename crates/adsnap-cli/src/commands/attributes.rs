use adsnap_format::Snapshot;

use crate::types::AttributeJson;

pub(crate) fn cmd_attributes(path: &str, json: bool) -> anyhow::Result<i32> {
    let snapshot = match Snapshot::open(path) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            eprintln!("error: failed to open {path}: {err}");
            return Ok(3);
        }
    };
    let attributes = snapshot.schema().attributes();

    if json {
        let out: Vec<AttributeJson<'_>> = attributes
            .iter()
            .map(|def| AttributeJson {
                id: def.id,
                name: &def.name,
                syntax: def.syntax.name(),
                single_valued: def.single_valued,
                schema_dn: &def.schema_dn,
                schema_guid: &def.schema_guid,
                security_guid: &def.security_guid,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(0);
    }

    let name_width = attributes
        .iter()
        .map(|def| def.name.len())
        .max()
        .unwrap_or(4)
        .max(4);
    println!("{:<5} {:<name_width$} {:<20} {}", "id", "name", "syntax", "values");
    for def in attributes {
        println!(
            "{:<5} {:<name_width$} {:<20} {}",
            def.id,
            def.name,
            def.syntax.name(),
            if def.single_valued { "single" } else { "multi" },
        );
    }
    Ok(0)
}
