//! RFC 5545 §3.1 line unfolding and folding.
//!
//! A CRLF (or lone LF, or lone CR) followed by SPACE or TAB continues the
//! previous logical line. Real-world emitters disagree on terminators, so
//! the unfolder accepts all three.

/// Split raw iCalendar text into unfolded logical lines. Single pass, O(n).
pub fn unfold_lines(input: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                // CRLF or lone CR both terminate the physical line.
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                if matches!(chars.peek(), Some(' ') | Some('\t')) {
                    chars.next();
                } else {
                    push_line(&mut lines, &mut current);
                }
            }
            '\n' => {
                if matches!(chars.peek(), Some(' ') | Some('\t')) {
                    chars.next();
                } else {
                    push_line(&mut lines, &mut current);
                }
            }
            _ => current.push(c),
        }
    }
    push_line(&mut lines, &mut current);
    lines
}

fn push_line(lines: &mut Vec<String>, current: &mut String) {
    if !current.is_empty() {
        lines.push(std::mem::take(current));
    } else {
        current.clear();
    }
}

/// Maximum octets per physical line, excluding the terminator.
const FOLD_WIDTH: usize = 75;

/// Fold one logical line into CRLF-terminated physical lines.
///
/// Continuation lines start with a single SPACE which counts against the 75
/// octet budget. Splits happen on character boundaries only, never inside a
/// UTF-8 sequence.
pub fn fold_line(line: &str, out: &mut String) {
    if line.len() <= FOLD_WIDTH {
        out.push_str(line);
        out.push_str("\r\n");
        return;
    }

    let mut budget = FOLD_WIDTH;
    let mut used = 0usize;
    for ch in line.chars() {
        let w = ch.len_utf8();
        if used + w > budget {
            out.push_str("\r\n ");
            used = 0;
            budget = FOLD_WIDTH - 1;
        }
        out.push(ch);
        used += w;
    }
    out.push_str("\r\n");
}
