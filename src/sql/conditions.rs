//! WHERE-clause construction.
//!
//! A [`Conditions`] value is an ordered mix of plain column equalities, raw
//! boolean fragments, fragments with positional `?` placeholders and
//! fragments with named `:param` placeholders. Translation produces a single
//! parenthesized, AND-joined SQL fragment plus one parameter map ready for
//! binding.
//!
//! Positional placeholders are rewritten to uniquely numbered named
//! placeholders (`:_1`, `:_2`, ...) so that several conditions can carry
//! their own `?` markers without colliding. A `?` inside a quoted string
//! literal is never rewritten.

use crate::core::{LitequeryError, Result};
use crate::sql::{escape, is_plain};
use rusqlite::types::Value;
use std::collections::BTreeMap;

/// One translated WHERE clause: the SQL fragment and its parameter map.
///
/// Invariant: every `:name` placeholder embedded in `sql` has a matching
/// entry in `params`.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub sql: String,
    pub params: BTreeMap<String, Value>,
}

#[derive(Debug, Clone)]
enum Entry {
    /// `column = value` over a plain column name.
    Eq(String, Value),
    /// Raw boolean fragment, no parameters.
    Raw(String),
    /// Fragment with positional `?` placeholders and their values in order.
    Bind(String, Vec<Value>),
    /// Fragment with `:name` placeholders and their values by name.
    Named(String, Vec<(String, Value)>),
}

/// An ordered WHERE-condition specification.
#[derive(Debug, Clone, Default)]
pub struct Conditions {
    entries: Vec<Entry>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a plain `column = value` equality. The column must be a bare
    /// identifier; anything else belongs in [`raw`](Self::raw) or
    /// [`bind`](Self::bind).
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.push(Entry::Eq(column.into(), value.into()));
        self
    }

    /// Adds a raw boolean fragment without parameters.
    pub fn raw(mut self, sql: impl Into<String>) -> Self {
        self.entries.push(Entry::Raw(sql.into()));
        self
    }

    /// Adds a fragment containing positional `?` placeholders together with
    /// one value per placeholder, in order.
    pub fn bind<S, I, V>(mut self, sql: S, values: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.entries.push(Entry::Bind(
            sql.into(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Adds a fragment containing `:name` placeholders together with their
    /// values. Parameter names are given without the colon prefix.
    pub fn named<S, I, K, V>(mut self, sql: S, params: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.entries.push(Entry::Named(
            sql.into(),
            params
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Translates the condition set into one SQL fragment and one parameter
    /// map. Fragments are joined as `( a ) AND ( b )`; an empty set yields
    /// an empty fragment.
    pub fn to_where(&self) -> Result<WhereClause> {
        if self.entries.is_empty() {
            return Ok(WhereClause {
                sql: String::new(),
                params: BTreeMap::new(),
            });
        }

        let mut fragments = Vec::with_capacity(self.entries.len());
        let mut params = BTreeMap::new();
        let mut counter = 0usize;

        for entry in &self.entries {
            match entry {
                Entry::Eq(column, value) => {
                    if !is_plain(column) {
                        return Err(LitequeryError::Query(format!(
                            "`{}` is not a plain column name; use a raw or bound condition",
                            column
                        )));
                    }
                    fragments.push(format!("{} = :{}", escape(column), column));
                    params.entry(column.clone()).or_insert_with(|| value.clone());
                }
                Entry::Raw(sql) => fragments.push(sql.clone()),
                Entry::Bind(sql, values) => {
                    fragments.push(rewrite_positional(sql, values, &mut counter, &mut params)?)
                }
                Entry::Named(sql, pairs) => {
                    fragments.push(sql.clone());
                    for (name, value) in pairs {
                        params.entry(name.clone()).or_insert_with(|| value.clone());
                    }
                }
            }
        }

        Ok(WhereClause {
            sql: format!("( {} )", fragments.join(" ) AND ( ")),
            params,
        })
    }
}

/// Counts `?` markers outside quoted string literals.
fn count_positional(fragment: &str) -> usize {
    let mut count = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in fragment.chars() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                '?' => count += 1,
                _ => {}
            },
        }
    }
    count
}

/// Rewrites each unquoted `?` in `fragment` to a uniquely numbered named
/// placeholder, consuming one value per marker. `counter` carries the
/// numbering across fragments.
fn rewrite_positional(
    fragment: &str,
    values: &[Value],
    counter: &mut usize,
    params: &mut BTreeMap<String, Value>,
) -> Result<String> {
    let expected = count_positional(fragment);
    if expected != values.len() {
        return Err(LitequeryError::Query(format!(
            "condition `{}` has {} placeholder(s) but {} value(s)",
            fragment,
            expected,
            values.len()
        )));
    }

    let mut out = String::with_capacity(fragment.len() + 8);
    let mut used = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in fragment.chars() {
        match quote {
            Some(q) => {
                out.push(c);
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' | '`' => {
                    quote = Some(c);
                    out.push(c);
                }
                '?' => {
                    *counter += 1;
                    let name = format!("_{}", counter);
                    out.push(':');
                    out.push_str(&name);
                    params.insert(name, values[used].clone());
                    used += 1;
                }
                _ => out.push(c),
            },
        }
    }

    Ok(out)
}
