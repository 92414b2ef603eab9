//! Decoding of raw model output into JSON
//!
//! Models wrap JSON in markdown fences, break lines inside string values,
//! truncate their answer at the token cap, or fall back to Python literals.
//! [`decode`] undoes the common cases in order:
//!
//! 1. strip ```` ```json ```` and ```` ``` ```` fences and surrounding whitespace
//! 2. replace every newline not preceded by a backslash with a space
//! 3. parse strictly; on failure run [`repair`] and parse again

use crate::error::DecodeError;
use serde_json::Value;
use tracing::debug;

/// Decode model output into a JSON value
pub fn decode(raw: &str) -> Result<Value, DecodeError> {
    let stripped = strip_fences(raw);
    if stripped.is_empty() {
        return Err(DecodeError::Empty);
    }

    let flattened = collapse_newlines(&stripped);
    match serde_json::from_str::<Value>(&flattened) {
        Ok(value) => Ok(value),
        Err(strict) => {
            debug!("Strict parse failed, repairing: {}", strict);
            let repaired =
                repair(&flattened).ok_or_else(|| DecodeError::Unrepairable(strict.to_string()))?;
            serde_json::from_str(&repaired).map_err(|e| DecodeError::Unrepairable(e.to_string()))
        }
    }
}

/// Remove markdown code-fence markers and trim
pub fn strip_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

/// Replace newlines that are not preceded by a backslash with spaces
pub fn collapse_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous = None;
    for c in text.chars() {
        if c == '\n' && previous != Some('\\') {
            out.push(' ');
        } else {
            out.push(c);
        }
        previous = Some(c);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Slot {
    /// Expecting a key or the end of the object
    Key,
    /// Key written, colon missing
    Colon,
    /// Colon written, value missing
    Value,
    /// Value written, expecting a comma or the end of the object
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Frame {
    Object(Slot),
    Array { need_comma: bool },
}

impl Frame {
    fn closer(&self) -> char {
        match self {
            Frame::Object(_) => '}',
            Frame::Array { .. } => ']',
        }
    }
}

/// Best-effort rewrite of almost-JSON into JSON
///
/// Starts at the first `{` or `[` and stops after the matching closer, so
/// prose around the payload is dropped. Handles trailing and missing commas,
/// single-quoted strings, unquoted keys, Python literals (`None`, `True`,
/// `False`), invalid escapes, and output truncated mid-string or mid-object.
/// Returns `None` when the text holds no object or array at all.
pub fn repair(text: &str) -> Option<String> {
    let start = text.find(['{', '['])?;
    let chars: Vec<char> = text[start..].chars().collect();
    let mut out = String::with_capacity(chars.len() + 16);
    let mut stack: Vec<Frame> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '{' | '[' => {
                begin_value(&mut out, &mut stack);
                stack.push(if c == '{' {
                    Frame::Object(Slot::Key)
                } else {
                    Frame::Array { need_comma: false }
                });
                out.push(c);
                i += 1;
            }
            '}' | ']' => {
                i += 1;
                let Some(depth) = stack.iter().rposition(|f| f.closer() == c) else {
                    continue;
                };
                while stack.len() > depth {
                    close_frame(&mut out, &mut stack);
                }
                if stack.is_empty() {
                    break;
                }
            }
            '"' | '\'' => {
                let is_key = begin_key(&mut out, &mut stack);
                if !is_key {
                    begin_value(&mut out, &mut stack);
                }
                let (literal, next, closed) = read_string(&chars, i);
                out.push_str(&literal);
                i = next;
                if is_key {
                    set_slot(&mut stack, Slot::Colon);
                }
                if !closed {
                    break;
                }
            }
            ':' => {
                if let Some(Frame::Object(Slot::Colon)) = stack.last() {
                    out.push(':');
                    set_slot(&mut stack, Slot::Value);
                }
                i += 1;
            }
            ',' => {
                match stack.last_mut() {
                    Some(Frame::Object(slot)) if *slot == Slot::Next => {
                        out.push(',');
                        *slot = Slot::Key;
                    }
                    Some(Frame::Array { need_comma }) if *need_comma => {
                        out.push(',');
                        *need_comma = false;
                    }
                    _ => {}
                }
                i += 1;
            }
            c if c.is_whitespace() => {
                out.push(' ');
                i += 1;
            }
            c if c.is_ascii_digit() || matches!(c, '-' | '+' | '.') => {
                let end = scan(&chars, i, |ch| {
                    ch.is_ascii_digit() || matches!(ch, '-' | '+' | '.' | 'e' | 'E')
                });
                let token: String = chars[i..end].iter().collect();
                i = end;
                if begin_key(&mut out, &mut stack) {
                    out.push_str(&quote(&token));
                    set_slot(&mut stack, Slot::Colon);
                } else {
                    begin_value(&mut out, &mut stack);
                    out.push_str(&clean_number(&token));
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let end = scan(&chars, i, |ch| ch.is_alphanumeric() || ch == '_');
                let word: String = chars[i..end].iter().collect();
                i = end;
                if begin_key(&mut out, &mut stack) {
                    out.push_str(&quote(&word));
                    set_slot(&mut stack, Slot::Colon);
                } else {
                    begin_value(&mut out, &mut stack);
                    match literal(&word) {
                        Some(lit) => out.push_str(lit),
                        None => out.push_str(&quote(&word)),
                    }
                }
            }
            _ => i += 1,
        }
    }

    while !stack.is_empty() {
        close_frame(&mut out, &mut stack);
    }
    Some(out)
}

fn scan(chars: &[char], from: usize, accept: impl Fn(char) -> bool) -> usize {
    let mut end = from;
    while end < chars.len() && accept(chars[end]) {
        end += 1;
    }
    end
}

fn set_slot(stack: &mut [Frame], slot: Slot) {
    if let Some(Frame::Object(current)) = stack.last_mut() {
        *current = slot;
    }
}

/// Whether the next token is an object key; inserts a missing comma
fn begin_key(out: &mut String, stack: &mut [Frame]) -> bool {
    match stack.last_mut() {
        Some(Frame::Object(Slot::Key)) => true,
        Some(Frame::Object(slot @ Slot::Next)) => {
            out.push(',');
            *slot = Slot::Key;
            true
        }
        _ => false,
    }
}

/// Record that a value starts in the current container; inserts a missing colon or comma
fn begin_value(out: &mut String, stack: &mut [Frame]) {
    match stack.last_mut() {
        Some(Frame::Object(slot)) => match *slot {
            Slot::Colon => {
                out.push(':');
                *slot = Slot::Next;
            }
            Slot::Value => *slot = Slot::Next,
            Slot::Key | Slot::Next => {}
        },
        Some(Frame::Array { need_comma }) => {
            if *need_comma {
                out.push(',');
            }
            *need_comma = true;
        }
        None => {}
    }
}

fn close_frame(out: &mut String, stack: &mut Vec<Frame>) {
    let Some(frame) = stack.pop() else {
        return;
    };
    trim_end_in_place(out);
    match frame {
        Frame::Object(Slot::Colon) => out.push_str(":null"),
        Frame::Object(Slot::Value) => out.push_str("null"),
        _ => {}
    }
    if out.ends_with(',') {
        out.pop();
    }
    out.push(frame.closer());
}

fn trim_end_in_place(out: &mut String) {
    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
}

/// Read a quoted string starting at `from`, returning it as a JSON literal
///
/// Also returns the index after the closing quote and whether the string was
/// terminated before the end of input.
fn read_string(chars: &[char], from: usize) -> (String, usize, bool) {
    let quote_char = chars[from];
    let mut out = String::from('"');
    let mut j = from + 1;

    while j < chars.len() {
        let ch = chars[j];
        if ch == '\\' {
            let Some(&next) = chars.get(j + 1) else {
                break;
            };
            if quote_char == '\'' && next == '\'' {
                out.push('\'');
            } else if matches!(next, '"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | 'u') {
                out.push('\\');
                out.push(next);
            } else {
                out.push_str("\\\\");
                push_string_char(&mut out, next);
            }
            j += 2;
            continue;
        }
        if ch == quote_char {
            out.push('"');
            return (out, j + 1, true);
        }
        if ch == '"' {
            out.push_str("\\\"");
        } else {
            push_string_char(&mut out, ch);
        }
        j += 1;
    }

    out.push('"');
    (out, chars.len(), false)
}

fn push_string_char(out: &mut String, ch: char) {
    match ch {
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        c if (c as u32) < 0x20 => {}
        c => out.push(c),
    }
}

fn quote(word: &str) -> String {
    Value::String(word.to_string()).to_string()
}

fn literal(word: &str) -> Option<&'static str> {
    match word {
        "true" | "True" | "TRUE" => Some("true"),
        "false" | "False" | "FALSE" => Some("false"),
        "null" | "None" | "none" | "NULL" | "Null" => Some("null"),
        _ => None,
    }
}

fn clean_number(token: &str) -> String {
    let token = token.trim_start_matches('+');
    let token = token.trim_end_matches(['.', '-', '+', 'e', 'E']);
    if token.is_empty() || token == "-" {
        return "null".to_string();
    }
    if let Some(rest) = token.strip_prefix('.') {
        return format!("0.{}", rest);
    }
    token.to_string()
}
