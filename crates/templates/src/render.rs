//! Placeholder substitution and line-based layout rendering.
//!
//! Plain-text bodies become one styled `<p>` per line. A line may open with a
//! layout tag (`[indent]`, `[left]`, `[right]`, `[center]`, any case) that sets the
//! paragraph's alignment and is removed from the text. A body that already carries
//! `<html` and `<body` after substitution is author-supplied markup and is returned
//! untouched.

use std::sync::LazyLock;

use regex::Regex;

use mailrun_common::error::TemplateError;

use crate::placeholder::{Placeholder, PlaceholderContext};
use crate::style::BodyStyle;

static LAYOUT_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\[([A-Za-z]+)\]\s*(.*)$").expect("valid layout tag regex"));

/// Substitute `{name}` placeholders. `{{` and `}}` yield literal braces.
pub fn substitute(template: &str, context: &PlaceholderContext) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' => {
                if matches!(chars.peek(), Some(&(_, '{'))) {
                    chars.next();
                    out.push('{');
                    continue;
                }

                let mut end = None;
                for (i, ch) in chars.by_ref() {
                    match ch {
                        '}' => {
                            end = Some(i);
                            break;
                        }
                        '{' => {
                            return Err(TemplateError::Malformed {
                                position: i,
                                reason: "'{' inside a placeholder".into(),
                            });
                        }
                        _ => {}
                    }
                }
                let end = end.ok_or_else(|| TemplateError::Malformed {
                    position: pos,
                    reason: "unterminated '{'".into(),
                })?;

                let name = &template[pos + 1..end];
                if name.is_empty() {
                    return Err(TemplateError::Malformed {
                        position: pos,
                        reason: "empty placeholder '{}'".into(),
                    });
                }
                let placeholder =
                    Placeholder::from_name(name).ok_or_else(|| TemplateError::UnknownPlaceholder {
                        name: name.to_string(),
                    })?;
                let value = context
                    .get(placeholder)
                    .ok_or_else(|| TemplateError::MissingValue {
                        name: placeholder.name().to_string(),
                    })?;
                out.push_str(value);
            }
            '}' => {
                if matches!(chars.peek(), Some(&(_, '}'))) {
                    chars.next();
                    out.push('}');
                    continue;
                }
                return Err(TemplateError::Malformed {
                    position: pos,
                    reason: "single '}' outside a placeholder".into(),
                });
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

/// Horizontal alignment of a rendered paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Right,
    Center,
}

impl Alignment {
    fn css(&self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Right => "right",
            Alignment::Center => "center",
        }
    }
}

/// One line of a structured body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// A blank source line, kept as a non-empty paragraph to preserve spacing
    Spacer,
    Paragraph {
        align: Alignment,
        indent: bool,
        /// Escaped text, tag removed
        content: String,
    },
}

impl Block {
    pub fn to_html(&self) -> String {
        match self {
            Block::Spacer => "<p>&nbsp;</p>".to_string(),
            Block::Paragraph {
                align,
                indent,
                content,
            } => format!(
                r#"<p style="text-align:{}; text-indent:{};">{}</p>"#,
                align.css(),
                if *indent { "2em" } else { "0" },
                content
            ),
        }
    }
}

/// Split substituted text into layout blocks.
pub fn layout_blocks(text: &str) -> Vec<Block> {
    text.lines().map(layout_line).collect()
}

fn layout_line(line: &str) -> Block {
    if line.trim().is_empty() {
        return Block::Spacer;
    }

    let mut align = Alignment::Left;
    let mut indent = false;
    let mut content = line;

    if let Some(caps) = LAYOUT_TAG_RE.captures(line) {
        let tag = caps[1].to_ascii_lowercase();
        let rest = caps.get(2).map_or("", |m| m.as_str());
        let recognized = match tag.as_str() {
            "indent" => {
                indent = true;
                true
            }
            "left" => true,
            "right" => {
                align = Alignment::Right;
                true
            }
            "center" => {
                align = Alignment::Center;
                true
            }
            _ => false,
        };
        if recognized {
            content = rest;
        }
    }

    Block::Paragraph {
        align,
        indent,
        content: escape_markup(content),
    }
}

/// Escape `&`, `<`, `>` and keep double spaces visible.
fn escape_markup(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace("  ", "&nbsp;&nbsp;")
}

/// True when the author supplied a full document.
pub fn is_custom_markup(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("<html") && lower.contains("<body")
}

/// Render a subject line. Subjects are plain text: substitution only.
pub fn render_subject(template: &str, context: &PlaceholderContext) -> Result<String, TemplateError> {
    substitute(template, context)
}

/// Render a message body to HTML.
pub fn render_body(
    template: &str,
    context: &PlaceholderContext,
    style: &BodyStyle,
) -> Result<String, TemplateError> {
    let filled = substitute(template, context)?;
    if is_custom_markup(&filled) {
        return Ok(filled);
    }

    let paragraphs: String = layout_blocks(&filled).iter().map(Block::to_html).collect();
    Ok(format!(
        r#"<html><body style="{}">{}</body></html>"#,
        style.css(),
        paragraphs
    ))
}
