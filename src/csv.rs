//! Minimal CSV reading and writing for the assignment table, the local store
//! and the review log.

use std::collections::HashMap;

/// Quote a value if it contains a comma, quote or line break.
pub fn escape(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn format_row<S: AsRef<str>>(values: &[S]) -> String {
    values
        .iter()
        .map(|v| escape(v.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Split one line into fields, honouring quotes.
pub fn parse_line(line: &str) -> Vec<String> {
    let mut scanner = Scanner::default();
    for ch in line.chars() {
        scanner.push(ch, false);
    }
    scanner.finish_record();
    scanner.records.pop().unwrap_or_default()
}

/// Split text into records. A quoted field may span line breaks, so a
/// record is only closed by a newline outside quotes.
pub fn parse_records(text: &str) -> Result<Vec<Vec<String>>, String> {
    let mut scanner = Scanner::default();
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        let crlf = ch == '\r' && chars.peek() == Some(&'\n');
        scanner.push(ch, crlf);
    }
    if scanner.in_quotes {
        return Err(format!(
            "unterminated quoted field in record {}",
            scanner.records.len() + 1
        ));
    }
    if !scanner.current.is_empty() || !scanner.record.is_empty() {
        scanner.finish_record();
    }
    Ok(scanner.records)
}

#[derive(Default)]
struct Scanner {
    records: Vec<Vec<String>>,
    record: Vec<String>,
    current: String,
    in_quotes: bool,
    /// Just left quotes; another quote here is an escaped quote.
    quote_pending: bool,
}

impl Scanner {
    /// `crlf` marks a `\r` directly followed by `\n`.
    fn push(&mut self, ch: char, crlf: bool) {
        if self.quote_pending {
            self.quote_pending = false;
            if ch == '"' {
                // Doubled quote inside a quoted field.
                self.current.push('"');
                self.in_quotes = true;
                return;
            }
        }

        if self.in_quotes {
            if ch == '"' {
                self.in_quotes = false;
                self.quote_pending = true;
            } else {
                self.current.push(ch);
            }
            return;
        }

        match ch {
            '"' => self.in_quotes = true,
            ',' => self.record.push(std::mem::take(&mut self.current)),
            '\r' if crlf => {}
            '\n' => self.finish_record(),
            _ => self.current.push(ch),
        }
    }

    fn finish_record(&mut self) {
        self.record.push(std::mem::take(&mut self.current));
        self.records.push(std::mem::take(&mut self.record));
    }
}

/// A parsed CSV document with a header row.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Parse text whose first record is a header. Blank lines are skipped.
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut records = parse_records(text.trim_start_matches('\u{feff}'))?
            .into_iter()
            .filter(|r| !(r.len() == 1 && r[0].trim().is_empty()));
        let headers: Vec<String> = records
            .next()
            .ok_or("CSV is empty")?
            .into_iter()
            .map(|h| h.trim().to_string())
            .collect();

        Ok(Self {
            headers,
            rows: records.collect(),
        })
    }

    /// Column positions for the requested names, or the first missing name.
    pub fn columns(&self, names: &[&str]) -> Result<Vec<usize>, String> {
        let index: HashMap<&str, usize> = self
            .headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.as_str(), i))
            .collect();

        names
            .iter()
            .map(|name| {
                index
                    .get(name)
                    .copied()
                    .ok_or_else(|| format!("missing column '{name}'"))
            })
            .collect()
    }

    /// Field `col` of `row`, empty when the row is short.
    pub fn field<'a>(row: &'a [String], col: usize) -> &'a str {
        row.get(col).map(String::as_str).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_parse_line_with_quotes() {
        let fields = parse_line("GH0001,\"worker, 7\",\"fine \"\"mostly\"\"\"");
        assert_eq!(fields, vec!["GH0001", "worker, 7", "fine \"mostly\""]);
    }

    #[test]
    fn test_format_then_parse_keeps_fields() {
        let values = ["GH0001", "7", "missed two fields, otherwise good"];
        assert_eq!(parse_line(&format_row(&values)), values);
    }

    #[test]
    fn test_table_columns() {
        let table = Table::parse("\u{feff}name, labeller ,rating\n\nGH1,7,ok\n").unwrap();
        assert_eq!(table.headers, vec!["name", "labeller", "rating"]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.columns(&["rating", "name"]).unwrap(), vec![2, 0]);
        assert!(table.columns(&["date"]).unwrap_err().contains("date"));
    }

    #[test]
    fn test_quoted_line_breaks_stay_in_field() {
        let rows = [
            ["GH0001", "7", "missed field\nsecond line"],
            ["GH0002", "8", "a \"b\",\r\nc"],
        ];
        let mut text = format_row(&["name", "labeller", "rating"]) + "\r\n";
        for row in &rows {
            text += &format_row(row);
            text += "\n";
        }

        let table = Table::parse(&text).unwrap();
        assert_eq!(table.headers, vec!["name", "labeller", "rating"]);
        assert_eq!(table.rows, rows.map(|r| r.map(String::from).to_vec()));
    }

    #[test]
    fn test_unterminated_quote_is_error() {
        let err = Table::parse("name,rating\nGH1,\"open\n").unwrap_err();
        assert!(err.contains("unterminated"));
    }

    #[test]
    fn test_empty_table_is_error() {
        assert!(Table::parse("").is_err());
        assert!(Table::parse("\n  \n").is_err());
    }
}
