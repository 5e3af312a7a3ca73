//! Rewrites `:name` placeholders into a driver's native positional form.

use std::collections::HashMap;

/// Native placeholder spelling of a driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NativeStyle {
    /// `$1, $2, ...`; a repeated name reuses its first number.
    Numbered,
    /// `?` for every occurrence.
    Question,
}

/// SQL rewritten for the driver plus the parameter name behind each bind
/// slot, in bind order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpandedSql {
    pub sql: String,
    pub names: Vec<String>,
}

/// First character of a placeholder name: any letter or `_`.
fn starts_name(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

/// Rest of a placeholder name. Matches what unquoted identifiers may hold,
/// including non-ASCII letters and `$`.
fn continues_name(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Replace every `:ident` outside quotes with a native placeholder.
/// `::` casts and quoted text are copied untouched.
pub fn expand(sql: &str, style: NativeStyle) -> ExpandedSql {
    let mut out = String::with_capacity(sql.len());
    let mut names: Vec<String> = Vec::new();
    let mut numbers: HashMap<&str, usize> = HashMap::new();
    let mut chars = sql.char_indices().peekable();

    while let Some((_, ch)) = chars.next() {
        match ch {
            '\'' | '"' => {
                out.push(ch);
                for (_, inner) in chars.by_ref() {
                    out.push(inner);
                    if inner == ch {
                        break;
                    }
                }
            }
            ':' => match chars.peek() {
                Some((_, ':')) => {
                    out.push_str("::");
                    chars.next();
                }
                Some((start, next)) if starts_name(*next) => {
                    let start = *start;
                    let mut end = sql.len();
                    while let Some((pos, c)) = chars.peek() {
                        if continues_name(*c) {
                            chars.next();
                        } else {
                            end = *pos;
                            break;
                        }
                    }
                    let name = &sql[start..end];
                    match style {
                        NativeStyle::Question => {
                            names.push(name.to_string());
                            out.push('?');
                        }
                        NativeStyle::Numbered => {
                            let position = *numbers.entry(name).or_insert_with(|| {
                                names.push(name.to_string());
                                names.len()
                            });
                            out.push('$');
                            out.push_str(&position.to_string());
                        }
                    }
                }
                _ => out.push(':'),
            },
            _ => out.push(ch),
        }
    }

    ExpandedSql { sql: out, names }
}
