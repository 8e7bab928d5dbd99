//! Minimal comma-separated record codec for the match cache file.
//!
//! Fields containing a comma, a double quote or a line break are wrapped in
//! double quotes with inner quotes doubled. Quoted fields may span lines.
//! Empty lines are skipped.

/// A parsed row and the 1-based line it starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub line: usize,
    pub fields: Vec<String>,
}

/// A quoted field was still open at end of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnterminatedQuote {
    pub line: usize,
}

fn needs_quoting(field: &str) -> bool {
    field.contains([',', '"', '\r', '\n'])
}

/// Encode one row, including the trailing newline.
pub fn encode_record(fields: &[&str]) -> String {
    let mut out = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if needs_quoting(field) {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push('\n');
    out
}

/// Split `content` into records.
pub fn parse_records(content: &str) -> Result<Vec<Record>, UnterminatedQuote> {
    let mut records = Vec::new();
    let mut fields: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut field_was_quoted = false;
    let mut line = 1;
    let mut record_line = 1;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() && !field_was_quoted => {
                in_quotes = true;
                field_was_quoted = true;
            }
            ',' => {
                fields.push(std::mem::take(&mut field));
                field_was_quoted = false;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                finish_record(&mut records, &mut fields, &mut field, field_was_quoted, record_line);
                field_was_quoted = false;
                line += 1;
                record_line = line;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(UnterminatedQuote { line: record_line });
    }
    finish_record(&mut records, &mut fields, &mut field, field_was_quoted, record_line);
    Ok(records)
}

fn finish_record(
    records: &mut Vec<Record>,
    fields: &mut Vec<String>,
    field: &mut String,
    field_was_quoted: bool,
    line: usize,
) {
    if fields.is_empty() && field.is_empty() && !field_was_quoted {
        return;
    }
    fields.push(std::mem::take(field));
    records.push(Record {
        line,
        fields: std::mem::take(fields),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_rows() {
        let records = parse_records("email,user,match,method\na@x.com,alice,1,by-identity\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].line, 2);
        assert_eq!(records[1].fields, vec!["a@x.com", "alice", "1", "by-identity"]);
    }

    #[test]
    fn empty_fields_and_blank_lines() {
        let records = parse_records("a,,0,b\n\n\nc,d,1,e").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].fields, vec!["a", "", "0", "b"]);
        assert_eq!(records[1].line, 4);
    }

    #[test]
    fn quoted_fields() {
        let line = encode_record(&["weird,\"mail\"@x.com", "u", "1", "m"]);
        assert_eq!(line, "\"weird,\"\"mail\"\"@x.com\",u,1,m\n");
        let records = parse_records(&line).unwrap();
        assert_eq!(records[0].fields[0], "weird,\"mail\"@x.com");
    }

    #[test]
    fn quoted_field_spans_lines() {
        let records = parse_records("\"a\nb\",c\nd,e\r\n").unwrap();
        assert_eq!(records[0].fields, vec!["a\nb", "c"]);
        assert_eq!(records[1].line, 3);
        assert_eq!(records[1].fields, vec!["d", "e"]);
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        assert_eq!(
            parse_records("ok,row\n\"open,row\n"),
            Err(UnterminatedQuote { line: 2 })
        );
    }
}
