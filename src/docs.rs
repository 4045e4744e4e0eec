//! Documentation extraction: associate free-text comments with the schema
//! fields they describe, using only lexical position.
//!
//! A schema's declaration source is written in a small struct notation:
//!
//! ```text
//! struct Training {
//!     // Number of passes over the dataset
//!     epochs: int = 10,
//!     lr: float, // Peak learning rate
//!     "continuation lines attach to the previous declaration"
//!     struct Optimizer {
//!         momentum: float = 0.9,
//!     }
//!     optimizer: Optimizer,
//! }
//! ```
//!
//! The extractor runs two scans over the text — one collecting comments,
//! one collecting declarations and standalone string literals — then merges
//! the position-sorted events in a single left-to-right pass:
//!
//! - a standalone string literal extends the most recent declaration,
//! - a comment on the same line as the most recent declaration extends it,
//! - a comment on its own line is buffered and flushed onto the *next*
//!   declaration,
//! - any other statement clears both the buffer and the "current
//!   declaration", so a stray statement cannot donate an unrelated comment
//!   to a later field.
//!
//! This is a line/order heuristic, not a grammar: two declarations on one
//! line, or a comment above the outermost `struct` line (which attaches to
//! the first field), are accepted approximations.
//!
//! Nested `struct` scopes qualify names with `.` (`Optimizer.momentum`);
//! the outermost struct contributes no prefix.

use std::collections::BTreeMap;

/// Tie-break order for events sharing a position: comments first, then
/// string literals, then other statements, then declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EventKind {
    Comment,
    Doc,
    Other,
    Decl,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Event {
    line: usize,
    col: usize,
    kind: EventKind,
    text: Option<String>,
}

/// Extract field documentation from schema declaration source.
///
/// Returns qualified field name → accumulated text (lines joined with
/// `\n`). Names with no associated text are omitted.
pub fn attribute_docs(src: &str) -> BTreeMap<String, String> {
    let mut events = scan_comments(src);
    events.extend(scan_declarations(src));
    events.sort();
    correlate(events)
}

/// Byte offset where a `//` comment starts, ignoring `//` inside string
/// literals.
fn comment_start(line: &str) -> Option<usize> {
    let mut in_string = false;
    let mut escaped = false;
    let mut prev_slash = false;
    for (i, ch) in line.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            prev_slash = false;
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                prev_slash = false;
            }
            '/' if prev_slash => return Some(i - 1),
            '/' => prev_slash = true,
            _ => prev_slash = false,
        }
    }
    None
}

fn scan_comments(src: &str) -> Vec<Event> {
    let mut events = Vec::new();
    for (i, line) in src.lines().enumerate() {
        if let Some(col) = comment_start(line) {
            let text = line[col + 2..].trim_start_matches('/').trim();
            events.push(Event {
                line: i + 1,
                col,
                kind: EventKind::Comment,
                text: Some(text.to_string()),
            });
        }
    }
    events
}

/// The leading identifier of a field declaration (`name:` or `name :`),
/// if the statement is one.
fn field_name(stmt: &str) -> Option<&str> {
    let end = stmt
        .char_indices()
        .take_while(|(i, c)| {
            if *i == 0 {
                c.is_ascii_alphabetic() || *c == '_'
            } else {
                c.is_ascii_alphanumeric() || *c == '_'
            }
        })
        .count();
    if end == 0 {
        return None;
    }
    let rest = stmt[end..].trim_start();
    rest.starts_with(':').then(|| &stmt[..end])
}

/// The inner text of a statement that is a single string literal
/// (optionally comma-terminated).
fn doc_literal(stmt: &str) -> Option<&str> {
    let body = stmt.strip_prefix('"')?;
    let inner = body
        .strip_suffix('"')
        .or_else(|| body.strip_suffix("\","))?;
    (!inner.contains('"')).then_some(inner)
}

fn scan_declarations(src: &str) -> Vec<Event> {
    let mut events = Vec::new();
    let mut scopes: Vec<String> = Vec::new();

    for (i, raw) in src.lines().enumerate() {
        let line = i + 1;
        let code = match comment_start(raw) {
            Some(idx) => &raw[..idx],
            None => raw,
        };
        let stmt = code.trim();
        if stmt.is_empty() {
            continue;
        }
        let col = code.len() - code.trim_start().len();
        // Scope names past the outermost struct, as a dotted prefix.
        let prefix: String = scopes.iter().skip(1).map(|s| format!("{s}.")).collect();

        if let Some(rest) = stmt.strip_prefix("struct ") {
            let name: String = rest
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                .collect();
            if !scopes.is_empty() {
                events.push(Event {
                    line,
                    col,
                    kind: EventKind::Decl,
                    text: Some(format!("{prefix}{name}")),
                });
            }
            scopes.push(name);
        } else if stmt.starts_with('}') {
            scopes.pop();
        } else if let Some(inner) = doc_literal(stmt) {
            events.push(Event {
                line,
                col,
                kind: EventKind::Doc,
                text: Some(inner.to_string()),
            });
        } else if let Some(name) = field_name(stmt) {
            if scopes.is_empty() {
                events.push(Event {
                    line,
                    col,
                    kind: EventKind::Other,
                    text: None,
                });
            } else {
                events.push(Event {
                    line,
                    col,
                    kind: EventKind::Decl,
                    text: Some(format!("{prefix}{name}")),
                });
            }
        } else {
            events.push(Event {
                line,
                col,
                kind: EventKind::Other,
                text: None,
            });
        }
    }
    events
}

/// The single left-to-right association pass over position-sorted events.
fn correlate(events: Vec<Event>) -> BTreeMap<String, String> {
    let mut docs: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut current: Option<String> = None;
    let mut current_line = 0usize;
    let mut pending: Vec<String> = Vec::new();

    for event in events {
        match event.kind {
            EventKind::Comment => {
                let text = event.text.unwrap_or_default();
                match &current {
                    Some(name) if current_line == event.line => {
                        docs.entry(name.clone()).or_default().push(text);
                    }
                    _ => pending.push(text),
                }
            }
            EventKind::Doc => {
                if let Some(name) = &current {
                    docs.entry(name.clone()).or_default().push(
                        event.text.unwrap_or_default(),
                    );
                }
            }
            EventKind::Decl => {
                let name = event.text.expect("declaration event without a name");
                docs.insert(name.clone(), std::mem::take(&mut pending));
                current = Some(name);
                current_line = event.line;
            }
            EventKind::Other => {
                current = None;
                current_line = 0;
                pending.clear();
            }
        }
    }

    docs.into_iter()
        .filter(|(_, lines)| !lines.is_empty())
        .map(|(name, lines)| (name, lines.join("\n")))
        .collect()
}
