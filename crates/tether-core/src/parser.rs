//! Parser for the tether document format → `Document`.
//!
//! Built on `winnow` 0.7. Handles: comments, `export Name { ... }` blocks,
//! JSX-like elements with nesting, prop values (strings, numbers, booleans,
//! numeric arrays, nested elements, opaque expressions), and appended
//! `export name = { ... }` meta constants.
//!
//! Every element and prop value carries its byte span in the input so the
//! instrumenter can rewrite by position without re-emitting the document.

use crate::id::Atom;
use crate::model::*;
use crate::span::Span;
use smallvec::SmallVec;
use winnow::ascii::space1;
use winnow::combinator::delimited;
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::token::{take_till, take_while};

/// Parse a tether document string into a `Document`.
#[must_use = "parsing result should be used"]
pub fn parse_document(input: &str) -> Result<Document, String> {
    let total = input.len();
    let mut rest = input;
    let mut doc = Document::default();

    skip_ws_and_comments(&mut rest);

    while !rest.is_empty() {
        if rest.starts_with("export") {
            match parse_export(&mut rest, total).map_err(|e| format!("Export parse error: {e}"))? {
                ExportItem::Block(block) => doc.exports.push(block),
                ExportItem::Constant(constant) => doc.constants.push(constant),
            }
        } else {
            let offset = total - rest.len();
            let preview: String = rest.chars().take(24).collect();
            return Err(format!("Unexpected content at byte {offset}: {preview:?}"));
        }

        skip_ws_and_comments(&mut rest);
    }

    Ok(doc)
}

enum ExportItem {
    Block(ExportBlock),
    Constant(MetaConstant),
}

/// Byte offset of the cursor within the original input.
fn at(total: usize, input: &str) -> usize {
    total - input.len()
}

fn backtrack() -> winnow::error::ErrMode<ContextError> {
    winnow::error::ErrMode::Backtrack(ContextError::new())
}

// ─── Low-level parsers ──────────────────────────────────────────────────

fn skip_ws_and_comments(input: &mut &str) {
    loop {
        let before = *input;
        *input = input.trim_start();
        if input.starts_with("//") {
            if let Some(pos) = input.find('\n') {
                *input = &input[pos + 1..];
            } else {
                *input = "";
            }
            continue;
        }
        if *input == before {
            break;
        }
    }
}

/// Consume optional non-newline whitespace.
fn skip_space(input: &mut &str) {
    use winnow::ascii::space0;
    let _: Result<&str, winnow::error::ErrMode<ContextError>> = space0.parse_next(input);
}

fn parse_identifier<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    let first = input.chars().next().ok_or_else(backtrack)?;
    if !first.is_ascii_alphabetic() && first != '_' {
        return Err(backtrack());
    }
    take_while(1.., |c: char| c.is_alphanumeric() || c == '_').parse_next(input)
}

/// Prop names additionally allow `-`, for namespaced attributes like
/// `data-tether`.
fn parse_prop_name<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    let first = input.chars().next().ok_or_else(backtrack)?;
    if !first.is_ascii_alphabetic() && first != '_' {
        return Err(backtrack());
    }
    take_while(1.., |c: char| c.is_alphanumeric() || c == '_' || c == '-').parse_next(input)
}

fn parse_number(input: &mut &str) -> ModalResult<f64> {
    let start = *input;
    if input.starts_with('-') {
        *input = &input[1..];
    }
    let _ = take_while(1.., |c: char| c.is_ascii_digit()).parse_next(input)?;
    if input.starts_with('.') {
        *input = &input[1..];
        let _ =
            take_while::<_, _, ContextError>(0.., |c: char| c.is_ascii_digit()).parse_next(input);
    }
    let matched = &start[..start.len() - input.len()];
    matched.parse::<f64>().map_err(|_| backtrack())
}

fn parse_quoted_string<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    delimited('"', take_till(0.., '"'), '"').parse_next(input)
}

/// Consume a balanced `{ ... }` body starting just after the opening brace;
/// returns the raw inner text and consumes the closing brace. Skips over
/// double-quoted strings so braces inside them don't count.
fn take_balanced_braces<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    let start = *input;
    let bytes = start.as_bytes();
    let mut depth = 1usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    i += if bytes[i] == b'\\' { 2 } else { 1 };
                }
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    let inner = &start[..i];
                    *input = &start[i + 1..];
                    return Ok(inner);
                }
            }
            _ => {}
        }
        i += 1;
    }
    Err(backtrack())
}

// ─── Prop values ────────────────────────────────────────────────────────

fn parse_number_array(input: &mut &str) -> ModalResult<Vec<f64>> {
    let _ = '['.parse_next(input)?;
    let mut items = Vec::new();
    skip_ws_and_comments(input);
    if !input.starts_with(']') {
        loop {
            items.push(parse_number.parse_next(input)?);
            skip_ws_and_comments(input);
            if input.starts_with(',') {
                *input = &input[1..];
                skip_ws_and_comments(input);
            } else {
                break;
            }
        }
    }
    let _ = ']'.parse_next(input)?;
    Ok(items)
}

/// Parse a braced prop value: typed forms first, then an opaque fallback
/// that keeps the raw balanced text.
fn parse_braced_value(input: &mut &str, total: usize) -> ModalResult<PropValue> {
    let _ = '{'.parse_next(input)?;
    let body_start = *input;
    skip_ws_and_comments(input);

    // `{[1, 2, 3]}`
    if input.starts_with('[') {
        let checkpoint = *input;
        if let Ok(items) = parse_number_array.parse_next(input) {
            skip_ws_and_comments(input);
            if input.starts_with('}') {
                *input = &input[1..];
                return Ok(PropValue::Array(items));
            }
        }
        *input = checkpoint;
    }

    // `{true}` / `{false}`
    for (word, value) in [("true", true), ("false", false)] {
        if let Some(rest) = input.strip_prefix(word) {
            let mut probe = rest;
            skip_ws_and_comments(&mut probe);
            if probe.starts_with('}') {
                *input = &probe[1..];
                return Ok(PropValue::Bool(value));
            }
        }
    }

    // `{42}` / `{-1.5}`
    if input.starts_with('-') || input.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        let checkpoint = *input;
        if let Ok(n) = parse_number.parse_next(input) {
            skip_ws_and_comments(input);
            if input.starts_with('}') {
                *input = &input[1..];
                return Ok(PropValue::Number(n));
            }
        }
        *input = checkpoint;
    }

    // `{"string"}`
    if input.starts_with('"') {
        let checkpoint = *input;
        if let Ok(s) = parse_quoted_string.parse_next(input) {
            skip_ws_and_comments(input);
            if input.starts_with('}') {
                let value = PropValue::Str(s.to_string());
                *input = &input[1..];
                return Ok(value);
            }
        }
        *input = checkpoint;
    }

    // `{<Element ... />}` — parsed on the main stream so spans stay absolute.
    if input.starts_with('<') {
        let element = parse_element(input, total)?;
        skip_ws_and_comments(input);
        let _ = '}'.parse_next(input)?;
        return Ok(PropValue::Element(Box::new(element)));
    }

    // Opaque expression: rewind to just after `{` and take the balanced body.
    *input = body_start;
    let raw = take_balanced_braces.parse_next(input)?;
    Ok(PropValue::Expr(raw.trim().to_string()))
}

fn parse_prop(input: &mut &str, total: usize) -> ModalResult<Prop> {
    let name = parse_prop_name.map(Atom::intern).parse_next(input)?;
    skip_space(input);

    if input.starts_with('=') {
        *input = &input[1..];
        skip_space(input);
        let value_start = at(total, input);
        let value = if input.starts_with('"') {
            parse_quoted_string
                .map(|s| PropValue::Str(s.to_string()))
                .parse_next(input)?
        } else if input.starts_with('{') {
            parse_braced_value(input, total)?
        } else {
            return Err(backtrack());
        };
        let value_end = at(total, input);
        Ok(Prop {
            name,
            value,
            value_span: Some(Span::new(value_start, value_end)),
        })
    } else {
        // Bare prop: boolean shorthand.
        Ok(Prop {
            name,
            value: PropValue::Bool(true),
            value_span: None,
        })
    }
}

// ─── Elements ───────────────────────────────────────────────────────────

fn parse_element(input: &mut &str, total: usize) -> ModalResult<Element> {
    let start = at(total, input);
    let _ = '<'.parse_next(input)?;
    let tag = parse_identifier.map(Atom::intern).parse_next(input)?;

    let mut props: SmallVec<[Prop; 4]> = SmallVec::new();
    loop {
        skip_ws_and_comments(input);
        if input.starts_with("/>") {
            *input = &input[2..];
            return Ok(Element {
                tag,
                props,
                children: Vec::new(),
                span: Span::new(start, at(total, input)),
                self_closing: true,
            });
        }
        if input.starts_with('>') {
            *input = &input[1..];
            break;
        }
        props.push(parse_prop(input, total)?);
    }

    let mut children = Vec::new();
    loop {
        skip_ws_and_comments(input);
        if input.starts_with("</") {
            *input = &input[2..];
            skip_space(input);
            let closing = parse_identifier.parse_next(input)?;
            if closing != tag.as_str() {
                return Err(backtrack());
            }
            skip_space(input);
            let _ = '>'.parse_next(input)?;
            return Ok(Element {
                tag,
                props,
                children,
                span: Span::new(start, at(total, input)),
                self_closing: false,
            });
        }
        if input.starts_with('<') {
            children.push(parse_element(input, total)?);
        } else {
            // No text children in this format.
            return Err(backtrack());
        }
    }
}

// ─── Exports ────────────────────────────────────────────────────────────

fn parse_export(input: &mut &str, total: usize) -> ModalResult<ExportItem> {
    let start = at(total, input);
    let _ = "export".parse_next(input)?;
    let _ = space1.parse_next(input)?;
    let name = parse_identifier.parse_next(input)?.to_string();
    skip_space(input);

    // `export name = { ...json... }` — appended meta constant.
    if input.starts_with('=') {
        *input = &input[1..];
        skip_space(input);
        let _ = '{'.parse_next(input)?;
        let raw = take_balanced_braces.parse_next(input)?;
        let value: serde_json::Value =
            serde_json::from_str(&format!("{{{raw}}}")).map_err(|_| backtrack())?;
        return Ok(ExportItem::Constant(MetaConstant { name, value }));
    }

    let _ = '{'.parse_next(input)?;
    let mut roots = Vec::new();
    loop {
        skip_ws_and_comments(input);
        if input.starts_with('}') {
            *input = &input[1..];
            break;
        }
        roots.push(preceded_element(input, total)?);
    }

    Ok(ExportItem::Block(ExportBlock {
        name,
        roots,
        span: Span::new(start, at(total, input)),
    }))
}

fn preceded_element(input: &mut &str, total: usize) -> ModalResult<Element> {
    if !input.starts_with('<') {
        return Err(backtrack());
    }
    parse_element(input, total)
}
