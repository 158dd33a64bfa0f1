//! Minimal URI templates for resource templates such as `data://{name}/greeting`

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Var(String),
}

/// A parsed URI template.
///
/// Only simple `{var}` expansion is understood. A variable matches a
/// non-empty run of characters without `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    raw: String,
    parts: Vec<Part>,
}

impl UriTemplate {
    /// Parse a template. An unterminated `{` is kept as literal text.
    pub fn parse(template: &str) -> Self {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            let Some(close) = rest[open..].find('}') else {
                break;
            };
            literal.push_str(&rest[..open]);
            let name = &rest[open + 1..open + close];
            if !literal.is_empty() {
                parts.push(Part::Literal(std::mem::take(&mut literal)));
            }
            parts.push(Part::Var(name.trim().to_string()));
            rest = &rest[open + close + 1..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            parts.push(Part::Literal(literal));
        }

        Self {
            raw: template.to_string(),
            parts,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Variable names in order of appearance
    pub fn variables(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Var(name) => Some(name.as_str()),
                Part::Literal(_) => None,
            })
            .collect()
    }

    /// Match a concrete URI, returning the captured variables
    pub fn matches(&self, uri: &str) -> Option<HashMap<String, String>> {
        let mut captures = HashMap::new();
        let mut rest = uri;
        let mut parts = self.parts.iter().peekable();

        while let Some(part) = parts.next() {
            match part {
                Part::Literal(text) => {
                    rest = rest.strip_prefix(text.as_str())?;
                }
                Part::Var(name) => {
                    let segment_end = rest.find('/').unwrap_or(rest.len());
                    let end = match parts.peek() {
                        Some(Part::Literal(next)) => rest[..segment_end]
                            .find(next.as_str())
                            .or_else(|| next.starts_with('/').then_some(segment_end))?,
                        _ => segment_end,
                    };
                    if end == 0 {
                        return None;
                    }
                    captures.insert(name.clone(), rest[..end].to_string());
                    rest = &rest[end..];
                }
            }
        }

        rest.is_empty().then_some(captures)
    }
}
