use crate::error::{Error, Result};
use crate::parser::{self, Columns};
use crate::record::RawRow;
use log::debug;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    JsonLines,
}

/// JSON-lines if the first non-blank line opens an object, otherwise CSV with a header.
pub fn detect_format(text: &str) -> InputFormat {
    match text.lines().find(|l| !l.trim().is_empty()) {
        Some(l) if l.trim_start().starts_with('{') => InputFormat::JsonLines,
        _ => InputFormat::Csv,
    }
}

/// Reads every row of an access log. Blank lines are skipped; a record that
/// cannot be read as a row fails the whole read. Rows are numbered from 1 in
/// the order they are returned, matching the numbering used by preprocessing.
pub fn read_rows(text: &str) -> Result<Vec<RawRow>> {
    let format = detect_format(text);
    let rows = match format {
        InputFormat::JsonLines => read_json_lines(text)?,
        InputFormat::Csv => read_csv(text)?,
    };
    debug!("read {} rows ({:?})", rows.len(), format);
    Ok(rows)
}

fn read_json_lines(text: &str) -> Result<Vec<RawRow>> {
    let mut rows = Vec::new();
    for line in text.lines().map(|l| l.trim_end_matches('\r')).filter(|l| !l.trim().is_empty()) {
        let row = parser::parse_json_row(line, rows.len() + 1)?;
        rows.push(row);
    }
    Ok(rows)
}

fn read_csv(text: &str) -> Result<Vec<RawRow>> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(text.as_bytes());
    let header = rdr.headers()?;
    if header.iter().all(|h| h.trim().is_empty()) {
        return Err(Error::malformed(0, "header", "is missing"));
    }
    let columns = Columns::from_header(header)?;
    let mut rows = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| Error::malformed(i + 1, "line", e.to_string()))?;
        rows.push(columns.row(&record));
    }
    Ok(rows)
}

pub fn read_file(path: impl AsRef<Path>) -> Result<Vec<RawRow>> {
    let text = std::fs::read_to_string(path)?;
    read_rows(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_json_lines() {
        assert_eq!(detect_format("\n{\"UserID\":\"a\"}\n"), InputFormat::JsonLines);
        assert_eq!(detect_format("UserID,Timestamp,IP\n"), InputFormat::Csv);
    }

    #[test]
    fn empty_text_has_no_header() {
        assert!(matches!(read_rows(""), Err(Error::MalformedInput { row: 0, field: "header", .. })));
    }

    #[test]
    fn quoted_newline_stays_in_one_record() {
        let text = "UserID,Timestamp,Action,Resource,IP\nalice,2024-01-01 10:00:00,read,\"/a\nb\",10.0.0.1\n";
        let rows = read_rows(text).unwrap();
        assert_eq!(rows, vec![RawRow::new("alice", "2024-01-01 10:00:00", "read", "/a\nb", "10.0.0.1")]);
    }

    #[test]
    fn quoted_commas_and_escaped_quotes() {
        let text = "UserID,Timestamp,Action,Resource,IP\r\nbob,\"2024-01-01 09:00:00\",\"read, write\",\"say \"\"hi\"\"\",10.0.0.2\r\n";
        let rows = read_rows(text).unwrap();
        assert_eq!(rows[0].action, "read, write");
        assert_eq!(rows[0].resource, "say \"hi\"");
        assert_eq!(rows[0].ip, "10.0.0.2");
    }

    #[test]
    fn short_csv_record_leaves_missing_fields_empty() {
        let rows = read_rows("UserID,Timestamp,IP\ncarol,2024-01-01 10:00:00\n").unwrap();
        assert_eq!(rows[0].user_id, "carol");
        assert_eq!(rows[0].ip, "");
    }

    #[test]
    fn json_rows_are_numbered_by_record_not_line() {
        let text = "{\"UserID\":\"a\",\"Timestamp\":\"2024-01-01 10:00:00\",\"IP\":\"1.1.1.1\"}\n\n\nnot json\n";
        assert!(matches!(read_rows(text), Err(Error::MalformedInput { row: 2, field: "line", .. })));
    }
}
