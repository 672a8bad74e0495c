use std::fmt::{self, Write};
use std::path::PathBuf;
use std::time::SystemTime;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use tracing::debug;

use crate::entity::{Entity, Timestamps};

#[derive(thiserror::Error, Debug)]
pub enum TemplateError {
    #[error("Template uses %C[...] but no collapsed folder names were supplied")]
    MissingCollapsedSegments,
    #[error("Template uses %C[...] on folder {path:?}")]
    CollapsedOnFolder { path: PathBuf },
    #[error("Could not read timestamps of {path:?}: {source}")]
    Timestamp {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeKind {
    Accessed,
    Modified,
    Created,
    Least,
}

impl TimeKind {
    fn from_code(code: char) -> Option<Self> {
        match code {
            'A' => Some(TimeKind::Accessed),
            'M' => Some(TimeKind::Modified),
            'C' => Some(TimeKind::Created),
            'L' => Some(TimeKind::Least),
            _ => None,
        }
    }

    fn pick(self, times: &Timestamps) -> SystemTime {
        match self {
            TimeKind::Accessed => times.accessed,
            TimeKind::Modified => times.modified,
            TimeKind::Created => times.created,
            TimeKind::Least => times.least(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Basename,
    Extension,
    Collapsed { separator: String },
    Time { kind: TimeKind, format: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    tokens: Vec<Token>,
}

impl Template {
    pub fn parse(source: &str) -> Self {
        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut rest = source;

        while let Some(start) = rest.find('%') {
            literal.push_str(&rest[..start]);
            rest = &rest[start..];

            match scan_token(rest) {
                Some((token, consumed)) => {
                    if !literal.is_empty() {
                        tokens.push(Token::Literal(std::mem::take(&mut literal)));
                    }
                    tokens.push(token);
                    rest = &rest[consumed..];
                }
                None => {
                    literal.push('%');
                    rest = &rest[1..];
                }
            }
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }

        Self {
            source: source.to_string(),
            tokens,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn render(&self, entity: &Entity, collapsed: Option<&[String]>) -> Result<String, TemplateError> {
        let mut output = String::new();
        let mut times: Option<Timestamps> = None;

        for token in &self.tokens {
            match token {
                Token::Literal(text) => output.push_str(text),
                Token::Basename => output.push_str(&entity.basename()),
                Token::Extension => {
                    if let Entity::File(file) = entity {
                        output.push_str(&file.extension());
                    }
                }
                Token::Collapsed { separator } => {
                    if let Entity::Folder(folder) = entity {
                        return Err(TemplateError::CollapsedOnFolder {
                            path: folder.path().to_path_buf(),
                        });
                    }
                    let segments = collapsed.ok_or(TemplateError::MissingCollapsedSegments)?;
                    output.push_str(&segments.join(separator));
                }
                Token::Time { kind, format } => {
                    let times = match times {
                        Some(times) => times,
                        None => {
                            let read = entity.times().map_err(|source| TemplateError::Timestamp {
                                path: entity.path().to_path_buf(),
                                source,
                            })?;
                            *times.insert(read)
                        }
                    };
                    let moment: DateTime<Local> = kind.pick(&times).into();
                    let mut formatted = String::new();
                    if write!(formatted, "{}", moment.format(format)).is_ok() {
                        output.push_str(&formatted);
                    } else {
                        output.push_str(&time_token_text(*kind, format));
                    }
                }
            }
        }

        debug!("Expanded template '{}' for {:?} to '{}'", self.source, entity.path(), output);
        Ok(output)
    }
}

impl From<&str> for Template {
    fn from(source: &str) -> Self {
        Template::parse(source)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

pub fn expand(template: &str, entity: &Entity, collapsed: Option<&[String]>) -> Result<String, TemplateError> {
    Template::parse(template).render(entity, collapsed)
}

/// Recognizes one token at the start of `text`, which begins with `%`.
/// Returns the token and how many bytes it spans.
fn scan_token(text: &str) -> Option<(Token, usize)> {
    let mut chars = text.char_indices().skip(1);
    let (_, code) = chars.next()?;

    match code {
        'B' => Some((Token::Basename, 2)),
        'E' => Some((Token::Extension, 2)),
        'C' => {
            let body = text[2..].strip_prefix('[')?;
            let end = body.find(']')?;
            let separator = body[..end].to_string();
            // "%C[" + separator + "]"
            Some((Token::Collapsed { separator }, 3 + end + 1))
        }
        'T' => {
            let kind = TimeKind::from_code(chars.next()?.1)?;
            let directive = &text[3..];
            let format = scan_directive(directive)?;
            let consumed = 3 + format.len();
            Some((Token::Time { kind, format }, consumed))
        }
        _ => None,
    }
}

/// A single strftime directive chrono understands: `%x` or `%-x`.
fn scan_directive(text: &str) -> Option<String> {
    let mut chars = text.chars();
    if chars.next()? != '%' {
        return None;
    }

    let mut directive = String::from("%");
    let mut code = chars.next()?;
    if code == '-' {
        directive.push('-');
        code = chars.next()?;
    }
    directive.push(code);

    let understood = StrftimeItems::new(&directive).all(|item| !matches!(item, Item::Error));
    understood.then_some(directive)
}

fn time_token_text(kind: TimeKind, format: &str) -> String {
    let code = match kind {
        TimeKind::Accessed => 'A',
        TimeKind::Modified => 'M',
        TimeKind::Created => 'C',
        TimeKind::Least => 'L',
    };
    format!("%T{}{}", code, format)
}
