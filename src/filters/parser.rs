//! Textual filter syntax for session listings.
//!
//! Parses user-provided filter expressions into [`FilterCriteria`].
//!
//! # Syntax
//!
//! ```text
//! filter_expr  := field_filter (["AND"] field_filter)*
//! field_filter := field_name:value | field_name:"quoted value"
//! ```
//!
//! Terms are always combined with AND; the `AND` keyword is optional and
//! `OR` is rejected.
//!
//! # Supported Fields
//!
//! - `messages:`, `tokens:`, `input:`, `output:` - counts: `N`, `A..B`, `A..`, `..B`
//! - `branch:` - `main` (exact), `feature/*` (prefix), `~fix` (case-insensitive substring)
//! - `since:`, `until:` - `YYYY-MM-DD`, both inclusive, on the session start date
//! - `role:` - `user,assistant,system,tool`; repeated terms union
//! - `block:` - `text,thinking,tool_use,tool_result,image,file_history_snapshot,unknown`
//! - `project:` - case-insensitive substring of the project path, `~` expands to home
//!
//! Repeating a count or date field narrows it (both terms must hold).
//!
//! # Examples
//!
//! ```rust
//! # use session_inspector::filters::parse_filter;
//! let criteria = parse_filter("messages:5.. branch:feature/* role:tool").unwrap();
//! assert_eq!(criteria.message_count_range, Some(5..=u64::MAX));
//!
//! let criteria = parse_filter("since:2025-01-01 AND project:\"my project\"").unwrap();
//! assert_eq!(criteria.project.as_deref(), Some("my project"));
//!
//! assert!(parse_filter("role:user OR role:tool").is_err());
//! ```

use std::collections::BTreeSet;
use std::iter::Peekable;
use std::ops::RangeInclusive;
use std::str::Chars;

use chrono::NaiveDate;

use super::criteria::{BranchMatch, DateWindow, FilterCriteria};
use crate::error::FilterParseError;
use crate::models::{BlockKind, SenderRole};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// field:value or field:"quoted value"
    FieldValue { field: String, value: String },
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Messages,
    Tokens,
    Input,
    Output,
    Branch,
    Since,
    Until,
    Role,
    Block,
    Project,
}

impl Field {
    fn parse(name: &str) -> Result<Self, FilterParseError> {
        match name.to_lowercase().as_str() {
            "messages" => Ok(Field::Messages),
            "tokens" => Ok(Field::Tokens),
            "input" => Ok(Field::Input),
            "output" => Ok(Field::Output),
            "branch" => Ok(Field::Branch),
            "since" => Ok(Field::Since),
            "until" => Ok(Field::Until),
            "role" => Ok(Field::Role),
            "block" => Ok(Field::Block),
            "project" => Ok(Field::Project),
            _ => Err(FilterParseError::UnknownField(name.to_string())),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, FilterParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&ch) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }

        let word = read_word(&mut chars);
        match word.to_uppercase().as_str() {
            "AND" => tokens.push(Token::And),
            "OR" => tokens.push(Token::Or),
            _ => {
                let Some((field, value)) = word.split_once(':') else {
                    return Err(FilterParseError::InvalidToken(word));
                };
                let value = if value.starts_with('"') {
                    read_quoted_value(&mut chars, value)?
                } else {
                    value.to_string()
                };

                if field.is_empty() || value.is_empty() {
                    return Err(FilterParseError::InvalidToken(word));
                }
                tokens.push(Token::FieldValue { field: field.to_string(), value });
            }
        }
    }

    Ok(tokens)
}

/// Read until whitespace or end
fn read_word(chars: &mut Peekable<Chars>) -> String {
    let mut word = String::new();
    while let Some(&ch) = chars.peek() {
        if ch.is_whitespace() {
            break;
        }
        word.push(ch);
        chars.next();
    }
    word
}

/// `initial` is the part of the word after the colon, opening quote included
fn read_quoted_value(chars: &mut Peekable<Chars>, initial: &str) -> Result<String, FilterParseError> {
    let mut value = initial[1..].to_string();
    if let Some(quote_pos) = value.find('"') {
        value.truncate(quote_pos);
        return Ok(value);
    }

    for ch in chars.by_ref() {
        if ch == '"' {
            return Ok(value);
        }
        value.push(ch);
    }

    Err(FilterParseError::UnterminatedQuote)
}

/// Parse a filter expression into criteria.
///
/// An empty or all-whitespace expression yields unconstrained criteria.
pub fn parse_filter(input: &str) -> Result<FilterCriteria, FilterParseError> {
    let tokens = tokenize(input)?;
    let mut criteria = FilterCriteria::any();
    let mut expecting_filter = true;

    for token in &tokens {
        match token {
            Token::FieldValue { field, value } => {
                apply_term(&mut criteria, Field::parse(field)?, field, value)?;
                expecting_filter = false;
            }
            Token::And => {
                if expecting_filter {
                    return Err(FilterParseError::DanglingOperator);
                }
                expecting_filter = true;
            }
            Token::Or => return Err(FilterParseError::OrNotSupported),
        }
    }

    if expecting_filter && !tokens.is_empty() {
        return Err(FilterParseError::DanglingOperator);
    }

    Ok(criteria)
}

fn apply_term(
    criteria: &mut FilterCriteria,
    field: Field,
    name: &str,
    value: &str,
) -> Result<(), FilterParseError> {
    let invalid = |reason: &str| FilterParseError::InvalidValue {
        field: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };

    match field {
        Field::Messages => narrow(&mut criteria.message_count_range, parse_range(value).map_err(invalid)?),
        Field::Tokens => narrow(&mut criteria.token_count_range, parse_range(value).map_err(invalid)?),
        Field::Input => narrow(&mut criteria.input_token_range, parse_range(value).map_err(invalid)?),
        Field::Output => narrow(&mut criteria.output_token_range, parse_range(value).map_err(invalid)?),
        Field::Since | Field::Until => {
            let date = parse_date(value).ok_or_else(|| invalid("expected YYYY-MM-DD"))?;
            let window = criteria.date_range.get_or_insert_with(DateWindow::default);
            if field == Field::Since {
                window.from = Some(window.from.map_or(date, |from| from.max(date)));
            } else {
                window.to = Some(window.to.map_or(date, |to| to.min(date)));
            }
        }
        Field::Branch => {
            if criteria.git_branch.is_some() {
                return Err(invalid("branch given more than once"));
            }
            criteria.git_branch = Some(parse_branch(value).ok_or_else(|| invalid("empty branch name"))?);
        }
        Field::Role => {
            let roles = parse_list(value, SenderRole::parse)
                .ok_or_else(|| invalid("expected user, assistant, system or tool"))?;
            criteria.sender_roles.get_or_insert_with(BTreeSet::new).extend(roles);
        }
        Field::Block => {
            let kinds = parse_list(value, BlockKind::parse).ok_or_else(|| invalid("unknown block kind"))?;
            criteria.block_kinds.get_or_insert_with(BTreeSet::new).extend(kinds);
        }
        Field::Project => {
            if criteria.project.is_some() {
                return Err(invalid("project given more than once"));
            }
            criteria.project = Some(value.to_string());
        }
    }
    Ok(())
}

/// Intersect with an existing range; disjoint ranges leave an empty one
fn narrow(slot: &mut Option<RangeInclusive<u64>>, range: RangeInclusive<u64>) {
    *slot = Some(match slot.take() {
        Some(prev) => (*prev.start()).max(*range.start())..=(*prev.end()).min(*range.end()),
        None => range,
    });
}

fn parse_range(value: &str) -> Result<RangeInclusive<u64>, &'static str> {
    let number = |s: &str| s.parse::<u64>().map_err(|_| "expected N, A..B, A.. or ..B");
    match value.split_once("..") {
        None => {
            let n = number(value)?;
            Ok(n..=n)
        }
        Some(("", "")) => Err("range needs at least one bound"),
        Some((start, "")) => Ok(number(start)?..=u64::MAX),
        Some(("", end)) => Ok(0..=number(end)?),
        Some((start, end)) => Ok(number(start)?..=number(end)?),
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    // Strict 10-char form; chrono rejects impossible dates like 2025-02-31
    if value.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

fn parse_branch(value: &str) -> Option<BranchMatch> {
    let branch = if let Some(needle) = value.strip_prefix('~') {
        BranchMatch::Contains(needle.to_string())
    } else if let Some(prefix) = value.strip_suffix('*') {
        BranchMatch::Prefix(prefix.to_string())
    } else {
        BranchMatch::Exact(value.to_string())
    };

    match &branch {
        BranchMatch::Exact(s) | BranchMatch::Prefix(s) | BranchMatch::Contains(s) if s.is_empty() => None,
        _ => Some(branch),
    }
}

/// Comma-separated names; one unknown name rejects the whole list
fn parse_list<T>(value: &str, parse: fn(&str) -> Option<T>) -> Option<Vec<T>> {
    value.split(',').map(parse).collect()
}
