//! Tabular input and output.
//!
//! The engine works on already-parsed `Dataset`s. CSV helpers here are
//! string-in / string-out; reading and writing files is the caller's job.

use serde::Serialize;

use crate::error::AuditError;
use crate::model::{AnnotatedTable, Cell, MissingIngredientEntry};

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// Headers plus rows of cells aligned to them. `None` = absent/blank cell.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    /// Row indices that had non-blank cells beyond the last header.
    pub truncated_rows: Vec<usize>,
}

impl Dataset {
    /// Rows shorter than the header are padded with absent cells. Longer rows
    /// are cut to the header width; rows that lose a value are listed in
    /// `truncated_rows`.
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = headers.len();
        let mut truncated_rows = Vec::new();
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(i, mut row)| {
                if row.iter().skip(width).any(Option::is_some) {
                    truncated_rows.push(i);
                }
                row.resize(width, None);
                row
            })
            .collect();
        Self { name: name.into(), headers, rows, truncated_rows }
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Parse CSV text. The delimiter is sniffed from the first lines.
    pub fn from_csv_str(name: &str, data: &str) -> Result<Self, AuditError> {
        let data = data.strip_prefix('\u{feff}').unwrap_or(data);
        let delimiter = sniff_delimiter(data);
        let csv_err = |e: csv::Error| AuditError::Csv {
            dataset: name.to_string(),
            message: e.to_string(),
        };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(data.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        // Empty lines never reach here; a record of blank cells is still a row.
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(csv_err)?;
            let row: Vec<Cell> = record
                .iter()
                .map(|f| if f.trim().is_empty() { None } else { Some(f.to_string()) })
                .collect();
            rows.push(row);
        }

        Ok(Self::new(name, headers, rows))
    }
}

/// Candidates in tie-break order.
const DELIMITERS: [u8; 4] = [b'\t', b';', b',', b'|'];
const SNIFF_LINES: usize = 10;

/// Choose the delimiter that splits the header line into several fields and
/// agrees with that width on the most sample lines. Score is
/// `agreeing lines * header width`; the earlier candidate keeps a tie.
/// Comma when no candidate splits the header.
fn sniff_delimiter(content: &str) -> u8 {
    let sample: Vec<&str> = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();

    let mut best: Option<(usize, u8)> = None;
    for delim in DELIMITERS {
        let widths: Vec<usize> = sample.iter().map(|line| field_count(line, delim)).collect();
        let Some(&header_width) = widths.first() else {
            break;
        };
        if header_width <= 1 {
            continue;
        }
        let agreeing = widths.iter().filter(|&&w| w == header_width).count();
        let score = agreeing * header_width;
        if best.map_or(true, |(top, _)| score > top) {
            best = Some((score, delim));
        }
    }
    best.map_or(b',', |(_, delim)| delim)
}

/// Field count of a single line, honoring quotes.
fn field_count(line: &str, delim: u8) -> usize {
    csv::ReaderBuilder::new()
        .delimiter(delim)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes())
        .records()
        .next()
        .and_then(Result::ok)
        .map_or(1, |r| r.len())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn write_csv<T: Serialize>(header: &[&str], rows: impl IntoIterator<Item = T>) -> Result<String, AuditError> {
    let csv_err = |e: csv::Error| AuditError::Csv {
        dataset: "output".into(),
        message: e.to_string(),
    };
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    writer.write_record(header).map_err(csv_err)?;
    for row in rows {
        writer.serialize(row).map_err(csv_err)?;
    }
    let bytes = writer.into_inner().map_err(|e| AuditError::Csv {
        dataset: "output".into(),
        message: e.to_string(),
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

impl AnnotatedTable {
    pub fn to_csv_string(&self) -> Result<String, AuditError> {
        let header: Vec<&str> = self.headers.iter().map(String::as_str).collect();
        write_csv(&header, &self.rows)
    }
}

/// Flat missing-ingredient report, one line per unresolved slot.
pub fn missing_report_to_csv(entries: &[MissingIngredientEntry]) -> Result<String, AuditError> {
    write_csv(
        &[
            "recipe_name",
            "missing_ingredient_name",
            "cleaned_missing_ingredient_name",
            "ingredient_column",
        ],
        entries.iter().map(|e| {
            (
                e.recipe_name.as_str(),
                e.ingredient_name.as_str(),
                e.normalized_name.as_str(),
                e.ingredient_column.as_str(),
            )
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_comma_csv_with_blanks() {
        let csv = "\
Item name,Item size,Supplier
Tomato,1,Acme
Salt,,
";
        let ds = Dataset::from_csv_str("items", csv).unwrap();
        assert_eq!(ds.headers, vec!["Item name", "Item size", "Supplier"]);
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.rows[0][0].as_deref(), Some("Tomato"));
        assert_eq!(ds.rows[1][1], None);
        assert_eq!(ds.rows[1][2], None);
    }

    #[test]
    fn sniff_semicolon_and_pad_short_rows() {
        let csv = "Item name;Item size;Tax rate\nTomato;1\nSalt;2;9%\n";
        let ds = Dataset::from_csv_str("items", csv).unwrap();
        assert_eq!(ds.headers.len(), 3);
        assert_eq!(ds.rows[0].len(), 3);
        assert_eq!(ds.rows[0][2], None);
        assert_eq!(ds.rows[1][2].as_deref(), Some("9%"));
    }

    #[test]
    fn quoted_thousands_survive() {
        let csv = "Item name,€ Price per unit (excluding VAT)\n\"Saffron\",\"1,250.00\"\n";
        let ds = Dataset::from_csv_str("items", csv).unwrap();
        assert_eq!(ds.rows[0][1].as_deref(), Some("1,250.00"));
    }

    #[test]
    fn keeps_blank_records_and_strips_bom() {
        let csv = "\u{feff}Item name,Item size\nTomato,1\n,\n\nSalt,2\n";
        let ds = Dataset::from_csv_str("items", csv).unwrap();
        assert_eq!(ds.headers[0], "Item name");
        // The `,` record stays; the empty line does not.
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.rows[1], vec![None, None]);
        assert_eq!(ds.rows[2][0].as_deref(), Some("Salt"));
    }

    #[test]
    fn blank_recipe_row_keeps_later_indices() {
        let csv = "Menu item name,Name (Ingredient 1),Qty (Ingredient 1),Unit (Ingredient 1)\n\
Soup,Tomato,1,kg\n\
,,,\n\
Cake,Unicorn,1,g\n";
        let ds = Dataset::from_csv_str("recipes", csv).unwrap();
        assert_eq!(ds.len(), 3);
        assert!(ds.rows[1].iter().all(Option::is_none));
        assert_eq!(ds.rows[2][0].as_deref(), Some("Cake"));
    }

    #[test]
    fn sniff_tab_and_pipe() {
        assert_eq!(sniff_delimiter("a\tb\tc\n1\t2\t3\n"), b'\t');
        assert_eq!(sniff_delimiter("a|b\n1|2\n"), b'|');
        assert_eq!(sniff_delimiter("single\nvalue\n"), b',');
        assert_eq!(sniff_delimiter(""), b',');
        // Quoted commas do not count as separators.
        assert_eq!(sniff_delimiter("name;price\n\"a,b\";1\n"), b';');
    }

    #[test]
    fn overlong_rows_are_recorded() {
        let csv = "Item name,Item size\nTomato,1,extra\nSalt,2\nEgg,1,\n";
        let ds = Dataset::from_csv_str("items", csv).unwrap();
        assert_eq!(ds.rows[0].len(), 2);
        // A trailing blank cell loses nothing.
        assert_eq!(ds.truncated_rows, vec![0]);
    }

    #[test]
    fn annotated_table_writes_header_and_quotes() {
        let table = AnnotatedTable {
            headers: vec!["Item name".into(), "Potential_Duplicates_Info".into()],
            rows: vec![vec!["Olive Oil, extra".into(), "None".into()]],
        };
        let out = table.to_csv_string().unwrap();
        assert_eq!(out, "Item name,Potential_Duplicates_Info\n\"Olive Oil, extra\",None\n");
    }

    #[test]
    fn missing_report_columns() {
        let entries = vec![MissingIngredientEntry {
            recipe_name: "Pizza".into(),
            ingredient_name: "Unicorn Dust".into(),
            normalized_name: "unicorn dust".into(),
            ingredient_column: "Name (Ingredient 2)".into(),
        }];
        let out = missing_report_to_csv(&entries).unwrap();
        let mut lines = out.lines();
        assert_eq!(
            lines.next(),
            Some("recipe_name,missing_ingredient_name,cleaned_missing_ingredient_name,ingredient_column")
        );
        assert_eq!(lines.next(), Some("Pizza,Unicorn Dust,unicorn dust,Name (Ingredient 2)"));
    }
}
