// src/process/rows.rs

use csv::{Reader, ReaderBuilder, StringRecord};

/// One data row as the csv reader delivered it.
#[derive(Debug)]
pub enum Row<'r> {
    Record(&'r StringRecord),
    /// csv-level failure for this record.
    Malformed(String),
    /// The line opened a quoted field that never closed on that line.
    /// Holds the line split on `;`.
    UnbalancedQuote(Vec<String>),
}

/// `;`-delimited reader over decoded text; rows may vary in length.
pub fn semicolon_reader(text: &str, has_headers: bool) -> Reader<&[u8]> {
    ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(has_headers)
        .flexible(true)
        .from_reader(text.as_bytes())
}

fn is_line_break(c: char) -> bool {
    c == '\n' || c == '\r'
}

fn split_first_line(span: &str) -> (&str, &str) {
    match span.find(is_line_break) {
        Some(i) => {
            let rest = &span[i..];
            let skip = if rest.starts_with("\r\n") { 2 } else { 1 };
            (&span[..i], &rest[skip..])
        }
        None => (span, ""),
    }
}

/// The reader reports where it stopped before a record, which can sit ahead of
/// blank lines or the `\n` of a CRLF. Step over those to the record's own line.
fn record_start(text: &str, line: u64, byte: usize) -> (u64, usize) {
    let ahead = text.get(byte..).unwrap_or_default();
    let body = ahead.trim_start_matches(is_line_break);
    let skipped = &ahead[..ahead.len() - body.len()];
    (line + skipped.matches('\n').count() as u64, byte + skipped.len())
}

/// Hands every data row of `rdr` to `visit` with its 1-based line number in `text`,
/// shifted by `line_offset`.
///
/// A stray `"` makes csv swallow every following line into one field. Such a record
/// is reported once as [`Row::UnbalancedQuote`] for its first line, and the lines it
/// swallowed are read again as ordinary rows, so every line is visited.
pub fn for_each_row<F>(rdr: &mut Reader<&[u8]>, text: &str, line_offset: u64, visit: &mut F)
where
    F: for<'r> FnMut(u64, Row<'r>),
{
    // restart on the line after an unbalanced one with a fresh reader
    let mut resume = read_until_unbalanced(rdr, text, line_offset, visit);
    while let Some((rest, offset)) = resume {
        let mut swallowed = semicolon_reader(rest, false);
        resume = read_until_unbalanced(&mut swallowed, rest, offset, visit);
    }
}

/// Reads rows until one swallows later lines; returns the text from the first
/// swallowed line to the end and the line number it follows.
fn read_until_unbalanced<'t, F>(
    rdr: &mut Reader<&[u8]>,
    text: &'t str,
    line_offset: u64,
    visit: &mut F,
) -> Option<(&'t str, u64)>
where
    F: for<'r> FnMut(u64, Row<'r>),
{
    let mut record = StringRecord::new();
    loop {
        match rdr.read_record(&mut record) {
            Ok(false) => return None,
            Ok(true) => {}
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                visit(line_offset + line, Row::Malformed(e.to_string()));
                continue;
            }
        }
        let (line, start) = record
            .position()
            .map(|p| record_start(text, p.line(), p.byte() as usize))
            .unwrap_or((0, 0));
        let line = line_offset + line;

        if !record.iter().any(|f| f.contains(is_line_break)) {
            visit(line, Row::Record(&record));
            continue;
        }

        let (first, rest) = split_first_line(text.get(start..).unwrap_or_default());
        visit(
            line,
            Row::UnbalancedQuote(first.split(';').map(str::to_string).collect()),
        );
        return (!rest.trim().is_empty()).then_some((rest, line));
    }
}
