//! Path-pattern compilation.
//!
//! Patterns use the familiar `path-to-regexp` syntax and compile to one
//! anchored [`Regex`]:
//!
//! | Syntax | Meaning | Regex |
//! |---|---|---|
//! | `/users` | literal | `/users` |
//! | `:id` | one segment | `([^/]+?)` |
//! | `:id?` | optional segment | `(?:/([^/]+?))?` |
//! | `:id(\d+)` | segment with a custom pattern | `(\d+)` |
//! | `(\d+)` | unnamed group | `(\d+)` |
//! | `*` | anything, including `/` | `(.*)` |
//! | `\:` | escaped special character | `:` |
//!
//! By default matching ignores case and accepts one trailing `/`; see
//! [`RouterOptions`].

use regex::Regex;

use crate::error::RouteError;
use crate::params::Params;

const DEFAULT_SEGMENT: &str = "[^/]+?";

/// Matching options shared by every route of a router.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterOptions {
    /// Match literal segments case-sensitively.
    pub case_sensitive: bool,
    /// Reject a trailing `/` the pattern does not have.
    pub strict: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Literal(String),
    Param {
        name: String,
        pattern: String,
        optional: bool,
    },
}

/// A compiled route pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    regex: Regex,
    names: Vec<String>,
}

impl PathPattern {
    /// Compiles `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::InvalidPattern`] for malformed syntax and
    /// [`RouteError::NestedCapture`] when a group contains a capturing group
    /// of its own.
    pub fn compile(pattern: &str, options: RouterOptions) -> Result<Self, RouteError> {
        let mut tokens = tokenize(pattern)?;
        if !options.strict {
            if let Some(Token::Literal(last)) = tokens.last_mut() {
                if last.ends_with('/') {
                    last.pop();
                }
            }
        }

        let mut source = String::from(if options.case_sensitive { "^" } else { "(?i)^" });
        let mut names = Vec::new();
        for token in tokens {
            match token {
                Token::Literal(text) => source.push_str(&regex::escape(&text)),
                Token::Param {
                    name,
                    pattern: group,
                    optional,
                } => {
                    if optional && source.ends_with('/') {
                        source.pop();
                        source.push_str(&format!("(?:/({group}))?"));
                    } else if optional {
                        source.push_str(&format!("({group})?"));
                    } else {
                        source.push_str(&format!("({group})"));
                    }
                    names.push(name);
                }
            }
        }
        if !options.strict {
            source.push_str("/?");
        }
        source.push('$');

        let regex =
            Regex::new(&source).map_err(|err| RouteError::invalid(pattern, err.to_string()))?;
        if regex.captures_len() != names.len() + 1 {
            return Err(RouteError::NestedCapture(pattern.to_string()));
        }

        Ok(Self {
            source: pattern.to_string(),
            regex,
            names,
        })
    }

    /// Returns the pattern as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns the parameter names in capture order.
    #[must_use]
    pub fn param_names(&self) -> &[String] {
        &self.names
    }

    /// Returns true if `path` matches.
    #[must_use]
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Matches `path` and returns its captures, whole match excluded.
    #[must_use]
    pub fn captures(&self, path: &str) -> Option<Params> {
        let captures = self.regex.captures(path)?;
        let mut params = Params::with_capacity(self.names.len());
        for (index, name) in self.names.iter().enumerate() {
            let value = captures.get(index + 1).map_or("", |m| m.as_str());
            params.push(name.as_str(), value);
        }
        Some(params)
    }
}

fn tokenize(pattern: &str) -> Result<Vec<Token>, RouteError> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut unnamed = 0_usize;
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| RouteError::invalid(pattern, "trailing escape character"))?;
                literal.push(escaped);
            }
            ':' => {
                let mut name = String::new();
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        name.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if name.is_empty() {
                    return Err(RouteError::invalid(pattern, "missing parameter name after ':'"));
                }
                let group = if chars.peek() == Some(&'(') {
                    chars.next();
                    read_group(pattern, &mut chars)?
                } else {
                    DEFAULT_SEGMENT.to_string()
                };
                let optional = chars.next_if_eq(&'?').is_some();
                flush(&mut literal, &mut tokens);
                tokens.push(Token::Param {
                    name,
                    pattern: group,
                    optional,
                });
            }
            '(' => {
                let group = read_group(pattern, &mut chars)?;
                let optional = chars.next_if_eq(&'?').is_some();
                flush(&mut literal, &mut tokens);
                tokens.push(Token::Param {
                    name: unnamed.to_string(),
                    pattern: group,
                    optional,
                });
                unnamed += 1;
            }
            '*' => {
                flush(&mut literal, &mut tokens);
                tokens.push(Token::Param {
                    name: unnamed.to_string(),
                    pattern: ".*".to_string(),
                    optional: false,
                });
                unnamed += 1;
            }
            ')' => return Err(RouteError::invalid(pattern, "unbalanced ')'")),
            other => literal.push(other),
        }
    }
    flush(&mut literal, &mut tokens);
    Ok(tokens)
}

fn flush(literal: &mut String, tokens: &mut Vec<Token>) {
    if !literal.is_empty() {
        tokens.push(Token::Literal(std::mem::take(literal)));
    }
}

/// Reads a group body; the opening `(` has been consumed.
fn read_group(
    pattern: &str,
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
) -> Result<String, RouteError> {
    let mut depth = 1_usize;
    let mut group = String::new();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                group.push(c);
                if let Some(escaped) = chars.next() {
                    group.push(escaped);
                }
            }
            '(' => {
                depth += 1;
                group.push(c);
            }
            ')' => {
                depth -= 1;
                if depth == 0 {
                    if group.is_empty() {
                        return Err(RouteError::invalid(pattern, "empty group"));
                    }
                    return Ok(group);
                }
                group.push(c);
            }
            other => group.push(other),
        }
    }
    Err(RouteError::invalid(pattern, "unbalanced '('"))
}
