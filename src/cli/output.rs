//! Structured Output (§6): table/CSV/JSON rendering for list-style
//! subcommands, selected by the `--csv`/`--json` global flags.
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Csv,
    Json,
}

impl OutputFormat {
    pub fn from_flags(csv: bool, json: bool) -> Self {
        match (csv, json) {
            (_, true) => OutputFormat::Json,
            (true, false) => OutputFormat::Csv,
            (false, false) => OutputFormat::Table,
        }
    }
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Renders a list of rows. `header`/`rows` back table and CSV
/// rendering; `json_rows` backs JSON rendering, since a JSON object per
/// row carries field names a flat `Vec<String>` row doesn't.
pub fn print_list<T: Serialize>(format: OutputFormat, header: &[&str], rows: &[Vec<String>], json_rows: &[T]) {
    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(header.iter().map(|h| Cell::new(h)));
            for row in rows {
                table.add_row(row.iter().map(|field| Cell::new(field)));
            }
            println!("{table}");
        }
        OutputFormat::Csv => {
            println!("{}", header.join(","));
            for row in rows {
                println!("{}", row.iter().map(|field| csv_escape(field)).collect::<Vec<_>>().join(","));
            }
        }
        OutputFormat::Json => match serde_json::to_string_pretty(json_rows) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => log::error!("failed to serialise output as JSON: {}", e),
        },
    }
}
