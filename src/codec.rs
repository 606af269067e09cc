//! Text encodings used by the persisted store.
//!
//! A credential set is one pipe-delimited entry, `user|password|nt_hash|aes_key|target`.
//! The whole collection is a run of `["name"]="entry" ` pairs, the shape bash's
//! `declare -p` prints for an associative array, so files written by older shell
//! tooling load unchanged. Persisted values are shell single-quoted.
//!
//! A `|` inside password, hash or key shifts the field boundaries on decode. The
//! entry format carries no escaping for it and stays that way for compatibility.

use crate::config::{CredentialSet, CredentialSets};
use crate::{EnvCredsError, Result};
use std::iter::Peekable;
use std::str::Chars;

const DELIMITER: char = '|';

/// Characters escaped with a backslash inside a double-quoted collection token.
const DOUBLE_QUOTE_SPECIALS: [char; 4] = ['"', '\\', '$', '`'];

pub fn encode_entry(set: &CredentialSet) -> String {
    [
        set.user.as_str(),
        &set.password,
        &set.nt_hash,
        &set.aes_key,
        &set.target,
    ]
    .join("|")
}

/// Splits on the first four delimiters; everything after the fourth is the target.
pub fn decode_entry(entry: &str) -> CredentialSet {
    let mut fields = entry.splitn(5, DELIMITER).map(str::to_string);
    CredentialSet {
        user: fields.next().unwrap_or_default(),
        password: fields.next().unwrap_or_default(),
        nt_hash: fields.next().unwrap_or_default(),
        aes_key: fields.next().unwrap_or_default(),
        target: fields.next().unwrap_or_default(),
    }
}

pub fn encode_collection(sets: &CredentialSets) -> String {
    let mut out = String::new();
    for (name, set) in sets {
        out.push_str("[\"");
        push_escaped(&mut out, name);
        out.push_str("\"]=\"");
        push_escaped(&mut out, &encode_entry(set));
        out.push_str("\" ");
    }
    out
}

/// Parses a serialized collection.
///
/// Keys may be quoted or bare, values double-quoted or bare, and the whole run
/// may be wrapped in `( ... )`. Any other shape is a [`EnvCredsError::Parse`].
pub fn decode_collection(blob: &str) -> Result<CredentialSets> {
    let mut body = blob.trim();
    if let Some(inner) = body.strip_prefix('(') {
        body = inner
            .strip_suffix(')')
            .ok_or_else(|| collection_error("unbalanced parenthesis around collection"))?
            .trim();
    }

    let mut sets = CredentialSets::new();
    let mut chars = body.chars().peekable();
    loop {
        skip_whitespace(&mut chars);
        match chars.next() {
            None => break,
            Some('[') => {}
            Some(c) => return Err(collection_error(&format!("expected '[' but found '{}'", c))),
        }

        let name = match chars.peek() {
            Some('"') => {
                chars.next();
                read_double_quoted(&mut chars).map_err(collection_error)?
            }
            _ => read_until(&mut chars, |c| c == ']'),
        };
        if chars.next() != Some(']') {
            return Err(collection_error(&format!("unterminated key for '{}'", name)));
        }
        if chars.next() != Some('=') {
            return Err(collection_error(&format!("missing '=' after key '{}'", name)));
        }

        let entry = match chars.peek() {
            Some('"') => {
                chars.next();
                read_double_quoted(&mut chars).map_err(collection_error)?
            }
            _ => read_until(&mut chars, char::is_whitespace),
        };
        if name.is_empty() {
            return Err(collection_error("empty credential set name"));
        }
        sets.insert(name, decode_entry(&entry));
    }
    Ok(sets)
}

/// Quotes a value for a `NAME='value'` line, embedding `'` as `'\''`.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Reverses shell quoting of a persisted value.
///
/// Accepts single-quoted, double-quoted and backslash-escaped segments
/// concatenated with bare text, the way a POSIX shell reads an assignment.
pub fn unquote(raw: &str) -> Result<String> {
    let mut out = String::new();
    let mut chars = raw.trim().chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' => loop {
                match chars.next() {
                    Some('\'') => break,
                    Some(c) => out.push(c),
                    None => return Err(value_error("unterminated single quote")),
                }
            },
            '"' => out.push_str(&read_double_quoted(&mut chars).map_err(value_error)?),
            '\\' => {
                if let Some(c) = chars.next() {
                    out.push(c);
                }
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

fn push_escaped(out: &mut String, value: &str) {
    for c in value.chars() {
        if DOUBLE_QUOTE_SPECIALS.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
}

/// Reads up to (and consumes) the closing `"`; the opening one is already consumed.
fn read_double_quoted(chars: &mut Peekable<Chars<'_>>) -> std::result::Result<String, &'static str> {
    let mut out = String::new();
    loop {
        match chars.next() {
            Some('"') => return Ok(out),
            Some('\\') => match chars.next() {
                Some(c) if DOUBLE_QUOTE_SPECIALS.contains(&c) => out.push(c),
                // A shell keeps the backslash before any other character
                Some(c) => {
                    out.push('\\');
                    out.push(c);
                }
                None => return Err("dangling escape"),
            },
            Some(c) => out.push(c),
            None => return Err("unterminated double quote"),
        }
    }
}

fn read_until(chars: &mut Peekable<Chars<'_>>, stop: impl Fn(char) -> bool) -> String {
    let mut out = String::new();
    while let Some(&c) = chars.peek() {
        if stop(c) {
            break;
        }
        out.push(c);
        chars.next();
    }
    out
}

fn skip_whitespace(chars: &mut Peekable<Chars<'_>>) {
    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
    }
}

fn collection_error(msg: &str) -> EnvCredsError {
    EnvCredsError::Parse(format!("credential sets: {}", msg))
}

fn value_error(msg: &str) -> EnvCredsError {
    EnvCredsError::Parse(format!("quoted value: {}", msg))
}
