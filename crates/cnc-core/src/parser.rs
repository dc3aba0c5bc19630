//! G-code line parser.
//!
//! Pure function: text in, a structured record out (or nothing for a blank
//! or comment-only line). Never raises; malformed words are simply dropped.

use std::collections::HashMap;

/// One parsed line: axis/parameter words keyed by letter (excluding G/M),
/// plus the ordered G and M numbers that appeared on the line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedLine {
    pub words: HashMap<char, f64>,
    pub gcodes: Vec<u32>,
    pub mcodes: Vec<u32>,
}

impl ParsedLine {
    pub fn is_empty(&self) -> bool {
        self.words.is_empty() && self.gcodes.is_empty() && self.mcodes.is_empty()
    }
}

/// Strip `;`-to-end-of-line comments and non-nested `(...)` comments.
fn strip_comments(line: &str) -> String {
    let without_semicolon = match line.find(';') {
        Some(idx) => &line[..idx],
        None => line,
    };

    let mut out = String::with_capacity(without_semicolon.len());
    let mut depth = 0u32;
    for ch in without_semicolon.chars() {
        match ch {
            '(' => depth += 1,
            ')' => {
                if depth > 0 {
                    depth -= 1;
                }
            }
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Parse one text line into a `ParsedLine`. Returns an empty record for
/// blank, comment-only, or entirely-unparseable lines — never an error.
pub fn parse_line(line: &str) -> ParsedLine {
    let cleaned = strip_comments(line).to_ascii_uppercase();

    let mut out = ParsedLine::default();
    let chars: Vec<char> = cleaned.chars().collect();
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        if !c.is_ascii_alphabetic() {
            i += 1;
            continue;
        }
        let letter = c;
        let mut j = i + 1;

        // Optional sign
        if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
            j += 1;
        }
        let mut seen_dot = false;
        let mut seen_digit = false;
        while j < chars.len() {
            let d = chars[j];
            if d.is_ascii_digit() {
                seen_digit = true;
                j += 1;
            } else if d == '.' && !seen_dot {
                seen_dot = true;
                j += 1;
            } else {
                break;
            }
        }

        if !seen_digit {
            // No numeric token followed this letter; skip just the letter.
            i += 1;
            continue;
        }

        let token: String = chars[i + 1..j].iter().collect();
        match token.parse::<f64>() {
            Ok(value) => match letter {
                'G' => out.gcodes.push(value as u32),
                'M' => out.mcodes.push(value as u32),
                _ => {
                    // Duplicate axis words on one line: last write wins.
                    out.words.insert(letter, value);
                }
            },
            Err(_) => { /* unparseable numeric; drop silently */ }
        }

        i = j;
    }

    out
}
