use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::{BuildError, ParseError, ParseFailure};
use crate::models::{Message, Record};
use crate::parsers::record::parse_record;
use crate::utils::safe_open_file;

/// Everything recovered from one JSONL log file
#[derive(Debug, Clone, Default)]
pub struct SessionFile {
    pub path: PathBuf,
    /// `sessionId` carried by the first message record, if any
    pub declared_session_id: Option<String>,
    /// `agentId` carried by the first message record that has one
    pub declared_agent_id: Option<String>,
    /// Message records in file order
    pub messages: Vec<Message>,
    /// First summary record
    pub summary: Option<String>,
    pub metadata_records: usize,
    pub parse_errors: Vec<ParseError>,
    /// An unterminated final line that did not parse (a writer mid-append)
    pub incomplete_tail: bool,
}

/// Read a log file line by line.
///
/// Malformed lines are collected as [`ParseError`]s and skipped; they never
/// stop the rest of the file from being read. Only an unreadable or oversized
/// file is an error.
pub fn parse_session_file(path: &Path, max_size: u64) -> Result<SessionFile, BuildError> {
    let file = safe_open_file(path, max_size)?;
    let mut reader = BufReader::new(file);

    let mut parsed = SessionFile { path: path.to_path_buf(), ..SessionFile::default() };
    let mut buf = Vec::new();
    let mut line_number = 0;

    loop {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf).map_err(|e| BuildError::FileUnreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if read == 0 {
            break;
        }
        line_number += 1;
        let terminated = buf.last() == Some(&b'\n');

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim_end_matches(['\n', '\r']),
            // Cut mid-character by a writer that is still appending
            Err(_) if !terminated => {
                parsed.incomplete_tail = true;
                continue;
            }
            Err(e) => {
                parsed.parse_errors.push(ParseError::new(
                    line_number,
                    ParseFailure::MalformedJson(format!("invalid UTF-8: {}", e)),
                ));
                continue;
            }
        };

        // Skip empty lines
        if line.trim().is_empty() {
            continue;
        }

        match parse_record(line, line_number) {
            Ok(Record::Message(message)) => {
                if parsed.declared_session_id.is_none() && !message.session_id.is_empty() {
                    parsed.declared_session_id = Some(message.session_id.clone());
                }
                if parsed.declared_agent_id.is_none() {
                    parsed.declared_agent_id.clone_from(&message.agent_id);
                }
                parsed.messages.push(*message);
            }
            Ok(Record::Summary { summary, .. }) => {
                if parsed.summary.is_none() {
                    parsed.summary = Some(summary);
                }
            }
            Ok(Record::Metadata { .. }) => parsed.metadata_records += 1,
            Err(e) if !terminated && matches!(e.reason, ParseFailure::MalformedJson(_)) => {
                parsed.incomplete_tail = true;
            }
            Err(e) => parsed.parse_errors.push(e),
        }
    }

    Ok(parsed)
}

/// Read just enough of a file to learn which session it belongs to
pub fn peek_session_id(path: &Path, max_size: u64) -> Result<Option<String>, BuildError> {
    let file = safe_open_file(path, max_size)?;
    let reader = BufReader::new(file);

    for (index, line) in reader.lines().enumerate() {
        let Ok(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(Record::Message(message)) = parse_record(&line, index + 1)
            && !message.session_id.is_empty()
        {
            return Ok(Some(message.session_id));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    const MAX: u64 = 10 * 1024 * 1024;

    /// Helper to create a temporary test file with given content
    fn create_test_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes()).expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    #[test]
    fn test_parse_valid_records() {
        let content = r#"{"type":"user","message":{"role":"user","content":[{"type":"text","text":"Hello"}]},"timestamp":1234567890,"sessionId":"s-1","uuid":"u1"}
{"type":"assistant","parentUuid":"u1","message":{"role":"assistant","content":[{"type":"text","text":"Hi there"}]},"timestamp":"2024-01-15T10:30:00Z","sessionId":"s-1","uuid":"u2"}
"#;
        let file = create_test_file(content);
        let parsed = parse_session_file(file.path(), MAX).unwrap();

        assert_eq!(parsed.messages.len(), 2);
        assert_eq!(parsed.declared_session_id.as_deref(), Some("s-1"));
        assert!(parsed.declared_agent_id.is_none());
        assert!(parsed.parse_errors.is_empty());
        assert!(!parsed.incomplete_tail);
    }

    #[test]
    fn test_declared_agent_id_from_first_record_carrying_one() {
        let content = r#"{"type":"user","message":{"role":"user","content":"go"},"timestamp":1,"uuid":"a"}
{"type":"assistant","parentUuid":"a","agentId":"worker-7","message":{"role":"assistant","content":"ok"},"timestamp":2,"uuid":"b"}
{"type":"assistant","parentUuid":"b","agentId":"other","message":{"role":"assistant","content":"ok"},"timestamp":3,"uuid":"c"}
"#;
        let file = create_test_file(content);
        let parsed = parse_session_file(file.path(), MAX).unwrap();
        assert_eq!(parsed.declared_agent_id.as_deref(), Some("worker-7"));
    }

    #[test]
    fn test_parse_empty_file() {
        let file = create_test_file("");
        let parsed = parse_session_file(file.path(), MAX).unwrap();
        assert!(parsed.messages.is_empty());
        assert!(parsed.parse_errors.is_empty());
    }

    #[test]
    fn test_malformed_line_between_valid_lines() {
        let content = r#"{"type":"user","message":{"role":"user","content":"Valid 1"},"timestamp":1,"uuid":"a"}
invalid json line
{"type":"assistant","parentUuid":"a","message":{"role":"assistant","content":"Valid 2"},"timestamp":2,"uuid":"b"}
"#;
        let file = create_test_file(content);
        let parsed = parse_session_file(file.path(), MAX).unwrap();

        assert_eq!(parsed.messages.len(), 2);
        assert_eq!(parsed.parse_errors.len(), 1);
        assert_eq!(parsed.parse_errors[0].line_number, 2);
    }

    #[test]
    fn test_mostly_broken_file_still_parses() {
        let mut content = String::new();
        for i in 0..150 {
            content.push_str(&format!("invalid line {}\n", i));
        }
        content.push_str(r#"{"type":"user","message":{"role":"user","content":"survivor"},"timestamp":1,"uuid":"a"}"#);
        content.push('\n');

        let file = create_test_file(&content);
        let parsed = parse_session_file(file.path(), MAX).unwrap();
        assert_eq!(parsed.messages.len(), 1);
        assert_eq!(parsed.parse_errors.len(), 150);
    }

    #[test]
    fn test_summary_and_metadata_records() {
        let content = r#"{"type":"summary","summary":"First title","leafUuid":"x"}
{"type":"summary","summary":"Second title","leafUuid":"y"}
{"type":"file-history-snapshot","messageId":"m","snapshot":{}}
{"type":"user","message":{"role":"user","content":"hi"},"timestamp":1,"uuid":"a"}
"#;
        let file = create_test_file(content);
        let parsed = parse_session_file(file.path(), MAX).unwrap();
        assert_eq!(parsed.summary.as_deref(), Some("First title"));
        assert_eq!(parsed.metadata_records, 1);
        assert_eq!(parsed.messages.len(), 1);
    }

    #[test]
    fn test_unterminated_partial_tail_is_not_an_error() {
        let content = "{\"type\":\"user\",\"message\":{\"role\":\"user\",\"content\":\"hi\"},\"timestamp\":1,\"uuid\":\"a\"}\n{\"type\":\"assistant\",\"mess";
        let file = create_test_file(content);
        let parsed = parse_session_file(file.path(), MAX).unwrap();
        assert_eq!(parsed.messages.len(), 1);
        assert!(parsed.parse_errors.is_empty());
        assert!(parsed.incomplete_tail);
    }

    #[test]
    fn test_tail_cut_inside_a_multibyte_char_is_not_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{"type":"user","message":{"role":"user","content":"hi"},"timestamp":1,"uuid":"a"}"#).unwrap();
        file.write_all(b"\n").unwrap();
        let cut = r#"{"type":"user","message":{"role":"user","content":"caf"#.as_bytes();
        file.write_all(cut).unwrap();
        // First byte of the two-byte encoding of 'é'
        file.write_all(&"é".as_bytes()[..1]).unwrap();
        file.flush().unwrap();

        let parsed = parse_session_file(file.path(), MAX).unwrap();
        assert_eq!(parsed.messages.len(), 1);
        assert!(parsed.parse_errors.is_empty());
        assert!(parsed.incomplete_tail);
    }

    #[test]
    fn test_complete_last_line_without_newline() {
        let content = r#"{"type":"user","message":{"role":"user","content":"hi"},"timestamp":1,"uuid":"a"}"#;
        let file = create_test_file(content);
        let parsed = parse_session_file(file.path(), MAX).unwrap();
        assert_eq!(parsed.messages.len(), 1);
        assert!(!parsed.incomplete_tail);
    }

    #[test]
    fn test_crlf_line_endings() {
        let content = "{\"type\":\"user\",\"message\":{\"role\":\"user\",\"content\":\"a\"},\"timestamp\":1,\"uuid\":\"a\"}\r\n{\"type\":\"user\",\"message\":{\"role\":\"user\",\"content\":\"b\"},\"timestamp\":2,\"uuid\":\"b\"}\r\n";
        let file = create_test_file(content);
        let parsed = parse_session_file(file.path(), MAX).unwrap();
        assert_eq!(parsed.messages.len(), 2);
        assert!(parsed.parse_errors.is_empty());
    }

    #[test]
    fn test_invalid_utf8_line_is_a_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"\xff\xfe garbage\n").unwrap();
        file.write_all(br#"{"type":"user","message":{"role":"user","content":"ok"},"timestamp":1,"uuid":"a"}"#).unwrap();
        file.write_all(b"\n").unwrap();
        file.flush().unwrap();

        let parsed = parse_session_file(file.path(), MAX).unwrap();
        assert_eq!(parsed.messages.len(), 1);
        assert_eq!(parsed.parse_errors.len(), 1);
    }

    #[test]
    fn test_nonexistent_file() {
        let result = parse_session_file(Path::new("/nonexistent/session.jsonl"), MAX);
        assert!(matches!(result, Err(BuildError::FileUnreadable { .. })));
    }

    #[test]
    fn test_oversized_file() {
        let file = create_test_file(&"x".repeat(64));
        let result = parse_session_file(file.path(), 16);
        assert!(matches!(result, Err(BuildError::FileTooLarge { size: 64, max: 16, .. })));
    }

    #[test]
    fn test_peek_session_id_skips_leading_metadata() {
        let content = r#"{"type":"file-history-snapshot","messageId":"m","snapshot":{}}
{"type":"user","message":{"role":"user","content":"hi"},"timestamp":1,"uuid":"a","sessionId":"parent-session"}
"#;
        let file = create_test_file(content);
        assert_eq!(peek_session_id(file.path(), MAX).unwrap().as_deref(), Some("parent-session"));
    }
}
