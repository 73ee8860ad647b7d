use std::fmt;

use modkit_db::Record;
use serde_json::Value;

use crate::error::TemplateError;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

/// URL pattern with `<%=field%>` placeholders, e.g. `/users/<%= id %>/group`.
///
/// Parsed once when registered; rendered per row. Whitespace inside the
/// tag is ignored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UrlTemplate {
    source: String,
    segments: Vec<Segment>,
}

const OPEN: &str = "<%=";
const CLOSE: &str = "%>";

impl UrlTemplate {
    /// # Errors
    ///
    /// Returns [`TemplateError`] on an unterminated tag or an empty field
    /// name.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find(OPEN) {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_owned()));
            }
            let after_open = &rest[start + OPEN.len()..];
            let Some(end) = after_open.find(CLOSE) else {
                return Err(TemplateError::Unterminated {
                    template: source.to_owned(),
                    offset: offset + start,
                });
            };
            let field = after_open[..end].trim();
            if field.is_empty() {
                return Err(TemplateError::EmptyField {
                    template: source.to_owned(),
                    offset: offset + start,
                });
            }
            segments.push(Segment::Field(field.to_owned()));

            let consumed = start + OPEN.len() + end + CLOSE.len();
            rest = &rest[consumed..];
            offset += consumed;
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_owned()));
        }

        Ok(Self {
            source: source.to_owned(),
            segments,
        })
    }

    /// Fields referenced by the placeholders, in order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Field(f) => Some(f.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// # Errors
    ///
    /// Returns [`TemplateError::MissingField`] when a placeholder's field is
    /// absent from `values` or `null`.
    pub fn render(&self, values: &Record) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(field) => match values.get(field) {
                    None | Some(Value::Null) => {
                        return Err(TemplateError::MissingField {
                            field: field.clone(),
                        });
                    }
                    Some(Value::String(s)) => out.push_str(s),
                    Some(other) => out.push_str(&other.to_string()),
                },
            }
        }
        Ok(out)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for UrlTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
