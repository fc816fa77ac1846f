//! Comma-separated text helpers
//!
//! RFC 4180 style: fields holding a comma, quote or line break are quoted and
//! inner quotes doubled. Records end with `\n`; `\r\n` is accepted on read.

use crate::{Error, Result};
use std::borrow::Cow;

/// Quote a field when needed
pub fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Append one newline-terminated record
pub fn push_record<I, S>(out: &mut String, fields: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for (index, field) in fields.into_iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        out.push_str(&escape_field(field.as_ref()));
    }
    out.push('\n');
}

/// A parsed table: header row plus data rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    /// Cell by row and column name; short rows read as empty
    pub fn cell<'a>(&'a self, row: &'a [String], name: &str) -> Option<&'a str> {
        let index = self.column_index(name)?;
        Some(row.get(index).map(String::as_str).unwrap_or(""))
    }
}

/// Parse a whole document; the first record is the header
pub fn parse_table(text: &str) -> Result<CsvTable> {
    let mut records = parse_records(text)?.into_iter();
    let headers = records.next().unwrap_or_default();
    Ok(CsvTable {
        headers,
        rows: records.collect(),
    })
}

fn parse_records(text: &str) -> Result<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut field_started = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if !field_started => {
                in_quotes = true;
                field_started = true;
            }
            ',' => {
                record.push(std::mem::take(&mut field));
                field_started = false;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
                field_started = false;
            }
            _ => {
                field.push(c);
                field_started = true;
            }
        }
    }

    if in_quotes {
        return Err(Error::InvalidInput("unterminated quoted field".to_string()));
    }
    if field_started || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    Ok(records)
}
