//! SQL text helpers: identifier escaping, comment stripping, qualified-name
//! parsing and clause formatting.
//!
//! These helpers produce the wire conventions used by every statement the
//! crate builds: backtick-quoted identifiers and colon-prefixed named
//! placeholders.

pub mod conditions;

use crate::core::{LitequeryError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;

/// Returns true when `input` is a bare identifier: non-empty and made of
/// word characters only.
pub fn is_plain(input: &str) -> bool {
    !input.is_empty() && input.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Backtick-quotes plain identifiers; anything containing SQL syntax is
/// passed through untouched.
pub fn escape(field: &str) -> String {
    if is_plain(field) {
        format!("`{}`", field)
    } else {
        field.to_string()
    }
}

/// Strips `--` and `#` line comments and (nested) `/* */` block comments
/// from a statement, leaving quoted strings untouched, and collapses
/// whitespace after `;`. The result is trimmed.
pub fn uncomment(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut skip_ws = false;

    while let Some(c) = chars.next() {
        if skip_ws {
            if c.is_whitespace() {
                continue;
            }
            skip_ws = false;
        }
        match c {
            '\'' | '"' | '`' => {
                out.push(c);
                // copy the literal verbatim, honoring backslash escapes
                while let Some(q) = chars.next() {
                    out.push(q);
                    if q == '\\' {
                        if let Some(escaped) = chars.next() {
                            out.push(escaped);
                        }
                    } else if q == c {
                        break;
                    }
                }
            }
            '#' => {
                consume_line(&mut chars);
                skip_ws = true;
            }
            '-' if chars.peek() == Some(&'-') => {
                chars.next();
                consume_line(&mut chars);
                skip_ws = true;
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut depth = 1usize;
                while depth > 0 {
                    match chars.next() {
                        Some('/') if chars.peek() == Some(&'*') => {
                            chars.next();
                            depth += 1;
                        }
                        Some('*') if chars.peek() == Some(&'/') => {
                            chars.next();
                            depth -= 1;
                        }
                        Some(_) => {}
                        None => break,
                    }
                }
                skip_ws = true;
            }
            ';' => {
                out.push(';');
                skip_ws = true;
            }
            _ => out.push(c),
        }
    }

    out.trim().to_string()
}

fn consume_line(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    for c in chars.by_ref() {
        if c == '\n' {
            break;
        }
    }
}

static SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:`(\w+)`|(\w+))$").unwrap());

/// A parsed `database.table.field` reference; each segment may carry its
/// own backticks in the input.
#[derive(Debug, Clone, PartialEq)]
pub struct QualifiedName {
    pub database: Option<String>,
    pub table: String,
    pub field: Option<String>,
}

impl QualifiedName {
    /// Parses a table reference of one to three dot-separated segments.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(LitequeryError::Query("empty table reference".to_string()));
        }
        let segments: Vec<&str> = trimmed.split('.').collect();
        if segments.len() > 3 {
            return Err(LitequeryError::Query(format!(
                "invalid table reference `{}`",
                input
            )));
        }

        let mut names = Vec::with_capacity(segments.len());
        for segment in &segments {
            let caps = SEGMENT.captures(segment).ok_or_else(|| {
                LitequeryError::Query(format!(
                    "invalid identifier `{}` in table reference `{}`",
                    segment, input
                ))
            })?;
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            names.push(name);
        }

        Ok(match names.as_slice() {
            [table] => QualifiedName {
                database: None,
                table: table.clone(),
                field: None,
            },
            [database, table] => QualifiedName {
                database: Some(database.clone()),
                table: table.clone(),
                field: None,
            },
            [database, table, field] => QualifiedName {
                database: Some(database.clone()),
                table: table.clone(),
                field: Some(field.clone()),
            },
            _ => unreachable!(),
        })
    }

    /// Escaped rendering for embedding into a statement, e.g.
    /// `` `aux`.`users` `` or `` `users` ``. A field segment is ignored.
    pub fn to_sql(&self) -> String {
        match &self.database {
            Some(database) => format!("{}.{}", escape(database), escape(&self.table)),
            None => escape(&self.table),
        }
    }

    /// Unescaped rendering used as a cache/configuration key.
    pub fn cache_key(&self) -> String {
        match &self.database {
            Some(database) => format!("{}.{}", database, self.table),
            None => self.table.clone(),
        }
    }
}

/// Parses and escapes a table reference in one step.
pub fn table_reference(table: &str) -> Result<String> {
    Ok(QualifiedName::parse(table)?.to_sql())
}

/// The field list of a SELECT statement.
#[derive(Debug, Clone, Copy)]
pub enum FieldList<'a> {
    /// `*`
    All,
    /// A raw selection expression, passed through untouched.
    Raw(&'a str),
    /// Plain columns, escaped individually.
    Columns(&'a [&'a str]),
    /// `(expression, alias)` pairs rendered as `expression AS alias`.
    Aliased(&'a [(&'a str, &'a str)]),
}

impl FieldList<'_> {
    pub fn to_sql(&self) -> String {
        match self {
            FieldList::All => "*".to_string(),
            FieldList::Raw(raw) if raw.trim().is_empty() => "*".to_string(),
            FieldList::Raw(raw) => (*raw).to_string(),
            FieldList::Columns(columns) if columns.is_empty() => "*".to_string(),
            FieldList::Columns(columns) => columns
                .iter()
                .map(|c| escape(c))
                .collect::<Vec<_>>()
                .join(", "),
            FieldList::Aliased(pairs) => pairs
                .iter()
                .map(|(expr, alias)| format!("{} AS {}", escape(expr), escape(alias)))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// The ORDER BY clause of a SELECT statement.
#[derive(Debug, Clone, Copy)]
pub enum Order<'a> {
    /// A raw ordering expression.
    Raw(&'a str),
    /// Individual ordering terms, joined with `, `.
    Columns(&'a [&'a str]),
}

impl Order<'_> {
    pub fn to_sql(&self) -> String {
        match self {
            Order::Raw(raw) => (*raw).to_string(),
            Order::Columns(columns) => columns.join(", "),
        }
    }
}

/// The LIMIT clause of a SELECT statement.
#[derive(Debug, Clone, Copy)]
pub enum Limit {
    Count(u64),
    OffsetCount(u64, u64),
}

impl Limit {
    pub fn to_sql(&self) -> String {
        match self {
            Limit::Count(count) => count.to_string(),
            Limit::OffsetCount(offset, count) => format!("{} OFFSET {}", count, offset),
        }
    }
}

impl From<u64> for Limit {
    fn from(count: u64) -> Self {
        Limit::Count(count)
    }
}

impl From<(u64, u64)> for Limit {
    fn from((offset, count): (u64, u64)) -> Self {
        Limit::OffsetCount(offset, count)
    }
}

/// Renders `` `key` <operator> :key `` for each key, joined by `glue`.
/// Used for SET lists and key lookups.
pub fn assignments<'a, I>(keys: I, operator: &str, glue: &str) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    keys.into_iter()
        .map(|key| format!("{} {} :{}", escape(key), operator, key))
        .collect::<Vec<_>>()
        .join(glue)
}

/// Renders a value as a standalone SQL literal. Binding is always preferred;
/// this exists for diagnostics and hand-built fragments.
pub fn quote(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(t) => format!("'{}'", t.replace('\'', "''")),
        Value::Blob(b) => {
            let hex: String = b.iter().map(|byte| format!("{:02X}", byte)).collect();
            format!("X'{}'", hex)
        }
    }
}
