//! Result rendering: aligned table, JSON array, or CSV. The table
//! buffers rows to size its columns; JSON and CSV stream.

use std::io::{self, Write};

use adsnap_query::ProjectedObject;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Format {
    Table,
    Json,
    Csv,
}

impl Format {
    pub(crate) fn from_flag(flag: &str) -> Self {
        match flag {
            "json" => Self::Json,
            "csv" => Self::Csv,
            _ => Self::Table,
        }
    }
}

pub(crate) struct Renderer<W: Write> {
    format: Format,
    out: W,
    /// Requested projection columns; derived from the first row otherwise.
    columns: Option<Vec<String>>,
    buffered: Vec<ProjectedObject>,
    rows_written: usize,
}

impl<W: Write> Renderer<W> {
    pub(crate) fn new(format: Format, out: W, projection: Option<Vec<String>>) -> Self {
        Self {
            format,
            out,
            columns: projection,
            buffered: Vec::new(),
            rows_written: 0,
        }
    }

    pub(crate) fn row(&mut self, row: &ProjectedObject) -> io::Result<()> {
        match self.format {
            Format::Table => {
                self.buffered.push(row.clone());
                Ok(())
            }
            Format::Json => self.json_row(row),
            Format::Csv => self.csv_row(row),
        }
    }

    pub(crate) fn finish(&mut self) -> io::Result<()> {
        match self.format {
            Format::Table => self.table_finish(),
            Format::Json => {
                if self.rows_written == 0 {
                    writeln!(self.out, "[]")
                } else {
                    writeln!(self.out, "\n]")
                }
            }
            Format::Csv => {
                // Header-only output when nothing matched a projection.
                if self.rows_written == 0 {
                    if let Some(columns) = self.columns.take() {
                        let header = header_columns(&columns);
                        self.csv_line(&header)?;
                    }
                }
                Ok(())
            }
        }
    }

    fn json_row(&mut self, row: &ProjectedObject) -> io::Result<()> {
        if self.rows_written == 0 {
            write!(self.out, "[\n")?;
        } else {
            write!(self.out, ",\n")?;
        }
        let mut map = serde_json::Map::new();
        map.insert("dn".to_owned(), serde_json::Value::String(row.dn.clone()));
        for (name, values) in &row.attributes {
            let rendered: Vec<serde_json::Value> = values
                .iter()
                .map(|v| serde_json::Value::String(v.clone()))
                .collect();
            map.insert(name.clone(), serde_json::Value::Array(rendered));
        }
        let text = serde_json::to_string(&serde_json::Value::Object(map))?;
        write!(self.out, "{text}")?;
        self.rows_written += 1;
        Ok(())
    }

    fn csv_row(&mut self, row: &ProjectedObject) -> io::Result<()> {
        if self.rows_written == 0 {
            let columns = self
                .columns
                .get_or_insert_with(|| row.attributes.iter().map(|(n, _)| n.clone()).collect())
                .clone();
            let header = header_columns(&columns);
            self.csv_line(&header)?;
        }
        let columns = self.columns.clone().unwrap_or_default();
        let mut cells = vec![row.dn.clone()];
        for column in &columns {
            cells.push(cell_for(row, column, ";"));
        }
        self.csv_line(&cells)?;
        self.rows_written += 1;
        Ok(())
    }

    fn csv_line(&mut self, cells: &[String]) -> io::Result<()> {
        let line: Vec<String> = cells.iter().map(|c| csv_escape(c)).collect();
        writeln!(self.out, "{}", line.join(","))
    }

    fn table_finish(&mut self) -> io::Result<()> {
        if self.buffered.is_empty() {
            return Ok(());
        }
        let columns = self.columns.clone().unwrap_or_else(|| {
            self.buffered[0]
                .attributes
                .iter()
                .map(|(n, _)| n.clone())
                .collect()
        });
        let header = header_columns(&columns);

        let mut widths: Vec<usize> = header.iter().map(String::len).collect();
        let mut rows: Vec<Vec<String>> = Vec::with_capacity(self.buffered.len());
        for row in &self.buffered {
            let mut cells = vec![row.dn.clone()];
            for column in &columns {
                cells.push(cell_for(row, column, ", "));
            }
            for (width, cell) in widths.iter_mut().zip(&cells) {
                *width = (*width).max(cell.len());
            }
            rows.push(cells);
        }

        let head: Vec<String> = header
            .iter()
            .zip(&widths)
            .map(|(h, w)| format!("{h:<w$}"))
            .collect();
        writeln!(self.out, "{}", head.join(" | "))?;
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(self.out, "{}", rule.join("-+-"))?;
        for cells in rows {
            let line: Vec<String> = cells
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{c:<w$}"))
                .collect();
            writeln!(self.out, "{}", line.join(" | "))?;
        }
        Ok(())
    }
}

fn header_columns(columns: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(columns.len() + 1);
    out.push("dn".to_owned());
    out.extend(columns.iter().cloned());
    out
}

/// Attribute cell text for a row; names compare case-insensitively since
/// the projection may spell them differently than the schema.
fn cell_for(row: &ProjectedObject, column: &str, joiner: &str) -> String {
    row.attributes
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(column))
        .map(|(_, values)| values.join(joiner))
        .unwrap_or_default()
}

fn csv_escape(cell: &str) -> String {
    if cell.contains(',') || cell.contains('"') || cell.contains('\n') || cell.contains('\r') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_owned()
    }
}
