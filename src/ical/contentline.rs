//! Content-line parsing: `NAME ( ";" PARAM )* ":" VALUE` plus the four TEXT
//! escapes of RFC 5545 §3.3.11.

use crate::error::{DavError, DavResult};

/// One parsed content line. `name` is uppercased for dispatch; the original
/// spelling is kept so unknown properties round-trip verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentLine {
    pub name: String,
    pub name_raw: String,
    pub params: Vec<(String, String)>,
    pub value: String,
}

impl ContentLine {
    /// First value of a parameter, matched case-insensitively on the key.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// The original line with parameters, reassembled. Used to preserve
    /// undecodable or unknown properties in `raw_properties`.
    pub fn raw(&self) -> String {
        let mut out = self.name_raw.clone();
        for (k, v) in &self.params {
            out.push(';');
            out.push_str(k);
            out.push('=');
            if v.contains([';', ':', ',']) {
                out.push('"');
                out.push_str(v);
                out.push('"');
            } else {
                out.push_str(v);
            }
        }
        out.push(':');
        out.push_str(&self.value);
        out
    }
}

/// Split one unfolded logical line.
///
/// Parameter values wrapped in double quotes may contain `;`, `:` and `,`;
/// the quotes are stripped from the stored value. The VALUE part is left
/// textually intact for the type-specific decoders.
pub fn parse_content_line(line: &str) -> DavResult<ContentLine> {
    let mut name = String::new();
    let mut params: Vec<(String, String)> = Vec::new();
    let mut chars = line.char_indices().peekable();
    let mut in_quotes = false;
    let mut seg_start = 0usize;
    let mut value_start = None;
    let mut pending_param: Option<String> = None;

    for (idx, c) in chars.by_ref() {
        match c {
            '"' => in_quotes = !in_quotes,
            ';' | ':' if !in_quotes => {
                let seg = &line[seg_start..idx];
                if name.is_empty() && pending_param.is_none() {
                    name = seg.to_string();
                } else if let Some(key) = pending_param.take() {
                    params.push((key, unquote(seg)));
                } else {
                    // Parameter without '=' (seen in the wild); keep as flag.
                    params.push((seg.to_string(), String::new()));
                }
                seg_start = idx + 1;
                if c == ':' {
                    value_start = Some(idx + 1);
                    break;
                }
            }
            '=' if !in_quotes && pending_param.is_none() && !line[seg_start..idx].is_empty() => {
                if name.is_empty() {
                    // '=' before any ';' belongs to the value of a nameless
                    // line only if no name was seen; NAME cannot contain '='.
                    pending_param = None;
                } else {
                    pending_param = Some(line[seg_start..idx].to_string());
                    seg_start = idx + 1;
                }
            }
            _ => {}
        }
    }

    let Some(value_start) = value_start else {
        return Err(DavError::parse_with_raw("content line without ':'", line));
    };
    if name.is_empty() {
        return Err(DavError::parse_with_raw("content line without name", line));
    }

    Ok(ContentLine {
        name: name.to_ascii_uppercase(),
        name_raw: name,
        params,
        value: line[value_start..].to_string(),
    })
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}

/// Undo the TEXT escapes: `\\`, `\;`, `\,`, `\n`/`\N`. Anything else after a
/// backslash is preserved verbatim.
pub fn unescape_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some(';') => out.push(';'),
            Some(',') => out.push(','),
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Apply the TEXT escapes for generation.
pub fn escape_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(c),
        }
    }
    out
}

/// Split a CATEGORIES-style value on unescaped commas, unescaping each
/// element.
pub fn split_on_unescaped_commas(value: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ',' => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
        .into_iter()
        .map(|p| unescape_text(&p))
        .filter(|p| !p.is_empty())
        .collect()
}
