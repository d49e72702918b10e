// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Template Renderer
//!
//! Plain named-placeholder substitution:
//!
//! - `{{name}}` is replaced by the value bound to `name`
//! - `{{name|autoindent}}` re-indents every line after the first to the
//!   indentation of the line holding the placeholder
//! - a line holding nothing but one placeholder whose value is empty is
//!   dropped entirely
//!
//! A placeholder with no bound value is an error, never silently empty.

use ahash::AHashMap;

use crate::types::{CodegenError, CodegenResult};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Filters a placeholder may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Filter {
    None,
    Autoindent,
}

/// Values bound to placeholder names
#[derive(Debug, Clone, Default)]
pub struct Substitutions {
    values: AHashMap<String, String>,
}

impl Substitutions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Substitutions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut subs = Substitutions::new();
        for (k, v) in iter {
            subs.set(k, v);
        }
        subs
    }
}

/// One `{{...}}` occurrence within a line
struct Placeholder<'a> {
    start: usize,
    end: usize,
    name: &'a str,
    filter: Filter,
}

fn parse_line(line: &str) -> CodegenResult<Vec<Placeholder<'_>>> {
    let mut out = Vec::new();
    let mut cursor = 0;
    while let Some(offset) = line[cursor..].find(OPEN) {
        let start = cursor + offset;
        let inner_start = start + OPEN.len();
        let close = line[inner_start..].find(CLOSE).ok_or_else(|| {
            CodegenError::MalformedTemplate(format!("unterminated placeholder in '{}'", line.trim()))
        })?;
        let inner = line[inner_start..inner_start + close].trim();
        let (name, filter) = match inner.split_once('|') {
            None => (inner, Filter::None),
            Some((name, filter)) => match filter.trim() {
                "autoindent" => (name.trim(), Filter::Autoindent),
                other => {
                    return Err(CodegenError::MalformedTemplate(format!(
                        "unknown filter '{}' on placeholder '{}'",
                        other,
                        name.trim()
                    )))
                }
            },
        };
        if name.is_empty() {
            return Err(CodegenError::MalformedTemplate(format!(
                "empty placeholder in '{}'",
                line.trim()
            )));
        }
        let end = inner_start + close + CLOSE.len();
        out.push(Placeholder {
            start,
            end,
            name,
            filter,
        });
        cursor = end;
    }
    Ok(out)
}

fn autoindent(value: &str, indent: &str) -> String {
    let mut lines = value.lines();
    let mut out = lines.next().unwrap_or_default().to_string();
    for line in lines {
        out.push('\n');
        if !line.is_empty() {
            out.push_str(indent);
            out.push_str(line);
        }
    }
    out
}

/// Substitute every placeholder in `template`
///
/// # Errors
///
/// `MissingPlaceholder` for a placeholder without a value, and
/// `MalformedTemplate` for unterminated placeholders or unknown filters.
pub fn render_template(template: &str, substitutions: &Substitutions) -> CodegenResult<String> {
    let mut out = String::with_capacity(template.len() * 2);

    for line in template.lines() {
        let placeholders = parse_line(line)?;
        if placeholders.is_empty() {
            out.push_str(line);
            out.push('\n');
            continue;
        }

        let mut values = Vec::with_capacity(placeholders.len());
        for p in &placeholders {
            let value = substitutions
                .get(p.name)
                .ok_or_else(|| CodegenError::MissingPlaceholder(p.name.to_string()))?;
            values.push(value);
        }

        let only_placeholder = placeholders.len() == 1 && {
            let p = &placeholders[0];
            line[..p.start].trim().is_empty() && line[p.end..].trim().is_empty()
        };
        if only_placeholder && values[0].is_empty() {
            continue;
        }

        let indent: String = line.chars().take_while(|c| c.is_whitespace()).collect();
        let mut rendered = String::with_capacity(line.len());
        let mut cursor = 0;
        for (p, value) in placeholders.iter().zip(values) {
            rendered.push_str(&line[cursor..p.start]);
            match p.filter {
                Filter::None => rendered.push_str(value),
                Filter::Autoindent => rendered.push_str(&autoindent(value, &indent)),
            }
            cursor = p.end;
        }
        rendered.push_str(&line[cursor..]);
        out.push_str(&rendered);
        out.push('\n');
    }

    Ok(out)
}
