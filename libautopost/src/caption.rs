//! Post text rendering
//!
//! Drive-sourced videos use a template with `{filename}` and `{file_id}`
//! placeholders; `{{` and `}}` produce literal braces. Local videos use a
//! fixed caption taken verbatim from configuration.

use crate::error::{ConfigError, Result};
use crate::types::VideoCandidate;

/// Default template for Drive-sourced videos
pub const DEFAULT_TEMPLATE: &str = "{filename}";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Filename,
    FileId,
}

/// A caption template validated at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl CaptionTemplate {
    /// Parse a template, rejecting unknown placeholders and unbalanced braces
    pub fn parse(template: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for n in chars.by_ref() {
                        if n == '}' {
                            closed = true;
                            break;
                        }
                        name.push(n);
                    }
                    if !closed {
                        return Err(ConfigError::InvalidTemplate(format!(
                            "unclosed '{{' in \"{}\"",
                            template
                        ))
                        .into());
                    }
                    let placeholder = match name.as_str() {
                        "filename" => Segment::Filename,
                        "file_id" => Segment::FileId,
                        other => {
                            return Err(ConfigError::InvalidTemplate(format!(
                                "unknown placeholder '{{{}}}' (supported: {{filename}}, {{file_id}})",
                                other
                            ))
                            .into())
                        }
                    };
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(placeholder);
                }
                '}' => {
                    return Err(ConfigError::InvalidTemplate(format!(
                        "single '}}' in \"{}\" (use '}}}}' for a literal brace)",
                        template
                    ))
                    .into())
                }
                other => literal.push(other),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    pub fn render(&self, filename: &str, file_id: &str) -> String {
        let mut out = String::with_capacity(self.source.len() + filename.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Filename => out.push_str(filename),
                Segment::FileId => out.push_str(file_id),
            }
        }
        out
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// How the post text for a cycle is produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caption {
    Template(CaptionTemplate),
    Fixed(String),
}

impl Caption {
    pub fn text_for(&self, candidate: &VideoCandidate) -> String {
        match self {
            Caption::Template(template) => {
                template.render(&candidate.display_name, &candidate.identifier)
            }
            Caption::Fixed(text) => text.clone(),
        }
    }
}
