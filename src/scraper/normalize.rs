//! Turns the chapter content container into plain text.
//!
//! `<br>` becomes a blank-line token and every `<p>` is followed by one, then the flattened
//! text is cut into lines, each line trimmed, and blank lines dropped. Because blank lines are
//! dropped, the tokens only ever separate lines; they never survive as empty lines.

use scraper::{ElementRef, Node};

const BREAK_TOKEN: &str = "\n\n";

/// Extract normalized plain text from a content container element.
pub fn extract_text(container: ElementRef<'_>) -> String {
    let mut raw = String::new();
    flatten_into(container, &mut raw);
    normalize_lines(&raw)
}

/// Flatten an element's descendants to text with break tokens at `<br>` and after `<p>`.
fn flatten_into(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                match el.name() {
                    "br" => out.push_str(BREAK_TOKEN),
                    "p" => {
                        flatten_into(child_el, out);
                        out.push_str(BREAK_TOKEN);
                    }
                    // Non-content text is not part of the chapter.
                    "script" | "style" | "template" => {}
                    _ => flatten_into(child_el, out),
                }
            }
            _ => {}
        }
    }
}

/// Split on line boundaries, trim each line, drop empty ones, rejoin with `\n`.
pub fn normalize_lines(raw: &str) -> String {
    raw.split(is_line_boundary)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Line-break characters: LF, CR, VT, FF, FS, GS, RS, NEL, LINE SEPARATOR, PARAGRAPH SEPARATOR.
/// CRLF needs no special case since the empty piece between them is dropped.
fn is_line_boundary(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r'
            | '\u{0b}'
            | '\u{0c}'
            | '\u{1c}'
            | '\u{1d}'
            | '\u{1e}'
            | '\u{85}'
            | '\u{2028}'
            | '\u{2029}'
    )
}
