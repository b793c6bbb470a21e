//! Report table rendering

use super::Table;
use crate::config::ReportConfig;
use console::{measure_text_width, style};

/// Column-aligned table with a bold header
pub fn render_pretty(table: &Table, config: &ReportConfig) -> String {
    let rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| row.iter().map(|cell| cell.display(config)).collect())
        .collect();

    let widths: Vec<usize> = table
        .headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            rows.iter()
                .map(|row| measure_text_width(&row[i]))
                .chain(std::iter::once(measure_text_width(header)))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    let header: Vec<String> = table
        .headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| style(format!("{:<w$}", h, w = w)).bold().to_string())
        .collect();
    out.push_str(header.join("  ").trim_end());
    out.push('\n');

    let total = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
    out.push_str(&"-".repeat(total));
    out.push('\n');

    for row in &rows {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{:<w$}", cell, w = w))
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    }
    out
}

/// RFC 4180 CSV, header first
pub fn render_csv(table: &Table, config: &ReportConfig) -> String {
    let mut out = String::new();
    push_record(&mut out, table.headers.iter().map(String::as_str));
    for row in &table.rows {
        let cells: Vec<String> = row.iter().map(|cell| cell.display(config)).collect();
        push_record(&mut out, cells.iter().map(String::as_str));
    }
    out
}

fn push_record<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    let fields: Vec<String> = fields.map(quote).collect();
    out.push_str(&fields.join(","));
    out.push_str("\r\n");
}

fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Cell;

    fn table() -> Table {
        Table {
            headers: vec!["id".into(), "config".into(), "acc".into()],
            rows: vec![
                vec![
                    Cell::Text("abc1234".into()),
                    Cell::Text("lr=0.1, seed=1".into()),
                    Cell::Number(0.9),
                ],
                vec![
                    Cell::Text("def5678".into()),
                    Cell::Text("say \"hi\"".into()),
                    Cell::Missing,
                ],
            ],
        }
    }

    #[test]
    fn csv_quotes_fields() {
        let csv = render_csv(&table(), &ReportConfig::default());
        let lines: Vec<&str> = csv.split("\r\n").collect();

        assert_eq!(lines[0], "id,config,acc");
        assert_eq!(lines[1], "abc1234,\"lr=0.1, seed=1\",0.9000");
        assert_eq!(lines[2], "def5678,\"say \"\"hi\"\"\",");
    }

    #[test]
    fn pretty_aligns_columns() {
        console::set_colors_enabled(false);
        let mut config = ReportConfig::default();
        config.float_precision = 2;
        config.missing_value = "n/a".into();

        let pretty = render_pretty(&table(), &config);
        let lines: Vec<&str> = pretty.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("id       config"));
        assert!(lines[1].chars().all(|c| c == '-'));
        assert!(lines[2].ends_with("0.90"));
        assert!(lines[3].ends_with("n/a"));
        assert_eq!(lines[2].find("0.90"), lines[3].find("n/a"));
    }
}
