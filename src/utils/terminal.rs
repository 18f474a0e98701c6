//! Output sanitization for text lifted out of log files.
//!
//! Message text is user-controlled. Before the CLI prints any of it, escape
//! sequences and control characters are removed so a crafted log cannot move
//! the cursor or recolour the terminal.

/// Flatten `text` into one printable line of at most `max_chars` characters.
///
/// CSI sequences (`ESC [ ... letter`) are dropped, line breaks and tabs become
/// single spaces, other control characters are removed. Truncation appends
/// `…`.
///
/// ```
/// use session_inspector::utils::terminal::preview_line;
///
/// assert_eq!(preview_line("\x1b[31mred\x1b[0m\nnext", 40), "red next");
/// assert_eq!(preview_line("abcdef", 4), "abc…");
/// ```
pub fn preview_line(text: &str, max_chars: usize) -> String {
    let mut cleaned = String::with_capacity(text.len().min(max_chars * 4));
    let mut chars = text.chars().peekable();
    let mut last_was_space = false;

    while let Some(ch) = chars.next() {
        if ch == '\x1b' {
            if chars.peek() == Some(&'[') {
                chars.next();
                for next in chars.by_ref() {
                    if next.is_ascii_alphabetic() {
                        break;
                    }
                }
            }
            continue;
        }

        if ch == '\n' || ch == '\r' || ch == '\t' {
            if !last_was_space && !cleaned.is_empty() {
                cleaned.push(' ');
                last_was_space = true;
            }
            continue;
        }
        if ch.is_control() {
            continue;
        }

        last_was_space = ch == ' ';
        cleaned.push(ch);
    }

    let trimmed = cleaned.trim_end();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }

    let mut truncated: String = trimmed.chars().take(max_chars.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}
