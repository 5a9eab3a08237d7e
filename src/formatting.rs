//! Layout check for documents
//!
//! A document passes when it reads exactly as a pretty-printer would lay it out:
//! one element per line, children indented by [`INDENT`] spaces, text kept inline
//! with its element. Elements mixing text and child elements are not checked.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::document::Document;
use crate::outcome::{Violation, ViolationKind};

/// Spaces per nesting level
pub const INDENT: usize = 4;

#[derive(Default)]
struct Frame {
    has_children: bool,
    has_text: bool,
}

/// Report the first line where `document` departs from its expected layout
pub fn check(document: &Document) -> Option<Violation> {
    let expected = expected_layout(document.content())?;
    let actual = normalize(document.content());

    let expected_lines: Vec<&str> = expected.lines().map(str::trim_end).collect();
    let actual_lines: Vec<&str> = actual.lines().map(str::trim_end).collect();

    let index = (0..expected_lines.len().max(actual_lines.len()))
        .find(|&i| expected_lines.get(i) != actual_lines.get(i))?;
    let message = match expected_lines.get(index) {
        Some(line) => format!("badly formatted, expected `{}`", line.trim_start()),
        None => "badly formatted, unexpected content after the root element".to_string(),
    };

    Some(Violation::new(ViolationKind::Formatting, index + 1, message))
}

/// Strip line-ending differences and trailing blank lines
fn normalize(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    text.trim_end().to_string()
}

/// The document as a pretty-printer would write it, `None` for mixed content
fn expected_layout(text: &str) -> Option<String> {
    let mut reader = Reader::from_str(text);
    let mut out = String::with_capacity(text.len());
    let mut stack: Vec<Frame> = Vec::new();
    // Whitespace is only kept inside elements that turn out to hold text alone
    let mut pending = "";

    loop {
        let before = reader.buffer_position();
        let event = reader.read_event().ok()?;
        let raw = text.get(before..reader.buffer_position())?;

        match event {
            Event::Eof => break,
            Event::Text(content) if content.iter().all(u8::is_ascii_whitespace) => {
                pending = raw;
            }
            Event::Text(_) | Event::CData(_) => {
                let frame = stack.last_mut()?;
                if frame.has_children {
                    return None;
                }
                frame.has_text = true;
                out.push_str(pending);
                out.push_str(raw);
                pending = "";
            }
            Event::Start(_) | Event::Empty(_) | Event::Comment(_) | Event::PI(_) => {
                if let Some(parent) = stack.last_mut() {
                    if parent.has_text {
                        return None;
                    }
                    parent.has_children = true;
                }
                new_line(&mut out, stack.len());
                out.push_str(raw);
                if matches!(event, Event::Start(_)) {
                    stack.push(Frame::default());
                }
                pending = "";
            }
            Event::End(_) => {
                let frame = stack.pop()?;
                if frame.has_children {
                    new_line(&mut out, stack.len());
                } else {
                    out.push_str(pending);
                }
                out.push_str(raw);
                pending = "";
            }
            Event::Decl(_) | Event::DocType(_) => {
                new_line(&mut out, 0);
                out.push_str(raw);
                pending = "";
            }
        }
    }

    Some(out)
}

fn new_line(out: &mut String, depth: usize) {
    if !out.is_empty() {
        out.push('\n');
    }
    out.extend(std::iter::repeat_n(' ', depth * INDENT));
}
