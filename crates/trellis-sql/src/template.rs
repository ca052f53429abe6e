//! The statement-template protocol.
//!
//! A cached template is the literal SQL text of a compiled statement with
//! every runtime value replaced by a bare `?` marker. Because inlined
//! literals may themselves contain question marks (or backslashes), the
//! template escapes `?` as `\?` and `\` as `\\` before the markers are
//! substituted; [`hydrate`] reverses the escaping and rewrites the markers
//! into the dialect's positional form.

use crate::{Bind, Dialect, Fragment};
use trellis_core::{Error, Result, Value};

/// Seed for the runtime-value placeholder. Lengthened until the rendered
/// statement does not contain it, so a caller-supplied value can never
/// collide with the substitution token.
const PLACEHOLDER_SEED: &str = "__trellis_param";

/// A token guaranteed not to occur in `text`.
pub fn unique_placeholder(text: &str) -> String {
    let mut placeholder = String::from(PLACEHOLDER_SEED);
    while text.contains(&placeholder) {
        placeholder.push('_');
    }
    placeholder
}

/// Renders a statement to cacheable template text.
///
/// Constant binds become literals; runtime binds become bare `?` markers,
/// in marker order. The input fragment uses `?` markers as produced by
/// [`SelectQuery::render`](crate::SelectQuery::render).
pub fn make_template(fragment: &Fragment, dialect: &dyn Dialect) -> String {
    // First pass inlines every bind so the placeholder can be checked
    // against the full statement text, runtime values included.
    let base = inline(fragment, dialect, None);
    let placeholder = unique_placeholder(&base);
    let staged = inline(fragment, dialect, Some(&placeholder));

    // Escape, then substitute: the bare markers must be introduced after
    // escaping or they would be escaped themselves.
    let escaped = staged.replace('\\', r"\\").replace('?', r"\?");
    escaped.replace(&format!("'{placeholder}'"), "?")
}

fn inline(fragment: &Fragment, dialect: &dyn Dialect, placeholder: Option<&str>) -> String {
    expand_markers(&fragment.sql, |out, i| {
        match (&fragment.binds[i], placeholder) {
            (Bind::Runtime(_), Some(token)) => {
                out.push('\'');
                out.push_str(token);
                out.push('\'');
            }
            (Bind::Runtime(value), None) | (Bind::Const(value), _) => {
                dialect.push_literal(out, value)
            }
        }
    })
}

/// Rebuilds an executable statement from cached template text and the
/// runtime values for this request, in marker order.
pub fn hydrate(
    template: &str,
    dialect: &dyn Dialect,
    values: &[Value],
) -> Result<(String, Vec<Value>)> {
    let mut sql = String::with_capacity(template.len());
    let mut used = 0;
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.peek() {
                Some('?') => {
                    chars.next();
                    sql.push('?');
                }
                Some('\\') => {
                    chars.next();
                    sql.push('\\');
                }
                _ => sql.push('\\'),
            },
            '?' => {
                if used >= values.len() {
                    return Err(Error::template(format!(
                        "template has more markers than the {} supplied values",
                        values.len()
                    )));
                }
                dialect.push_marker(&mut sql, used + 1);
                used += 1;
            }
            _ => sql.push(c),
        }
    }

    if used != values.len() {
        return Err(Error::template(format!(
            "template has {used} markers but {} values were supplied",
            values.len()
        )));
    }
    Ok((sql, values.to_vec()))
}

/// Walks `sql`, copying text and invoking `on_marker` for each bare `?`
/// outside quoted spans (single quotes, double quotes, and backticks, with
/// doubling honored).
pub(crate) fn expand_markers(
    sql: &str,
    mut on_marker: impl FnMut(&mut String, usize),
) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut index = 0;

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' => {
                out.push(c);
                while let Some(q) = chars.next() {
                    out.push(q);
                    if q == c {
                        // A doubled quote stays inside the span.
                        if chars.peek() == Some(&c) {
                            out.push(c);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                }
            }
            '?' => {
                on_marker(&mut out, index);
                index += 1;
            }
            _ => out.push(c),
        }
    }
    out
}
