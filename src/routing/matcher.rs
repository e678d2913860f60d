//! Route matching logic.
//!
//! # Responsibilities
//! - Match the request method (`ALL` matches any, `GET` also serves `HEAD`)
//! - Match Express-style path patterns and capture parameters
//!
//! # Design Decisions
//! - Literal segments compare ASCII case-insensitively
//! - A trailing slash is optional on both sides
//! - `:name` captures one non-empty segment, `:name?` may be absent
//! - `*` captures anything, slashes included; captures are named "0", "1", ...
//! - No regex: patterns compile to a token list matched by backtracking

use std::collections::HashMap;
use std::fmt;

use axum::http::Method;

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + fmt::Debug {
    /// Returns true if a request with this method and path matches.
    fn matches(&self, method: &Method, path: &str) -> bool;
}

/// Matches the request method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodMatcher {
    Any,
    Exact(Method),
}

impl MethodMatcher {
    /// Parse "ALL" (any case) or a method name.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.eq_ignore_ascii_case("ALL") || raw == "*" {
            return Some(MethodMatcher::Any);
        }
        Method::from_bytes(raw.to_ascii_uppercase().as_bytes())
            .ok()
            .map(MethodMatcher::Exact)
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, method: &Method, _path: &str) -> bool {
        match self {
            MethodMatcher::Any => true,
            MethodMatcher::Exact(expected) => {
                expected == method || (*expected == Method::GET && *method == Method::HEAD)
            }
        }
    }
}

impl fmt::Display for MethodMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodMatcher::Any => f.write_str("ALL"),
            MethodMatcher::Exact(method) => write!(f, "{}", method),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Param { name: String, optional: bool },
    Wildcard(String),
}

/// A compiled Express-style path pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    tokens: Vec<Token>,
}

impl PathPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        let source = pattern.into();
        let tokens = tokenize(source.trim_end_matches('/'));
        Self { source, tokens }
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Parameters captured from `path`, or `None` when it does not match.
    pub fn captures(&self, path: &str) -> Option<HashMap<String, String>> {
        let mut captured = Vec::new();
        if match_tokens(&self.tokens, path, &mut captured) {
            Some(captured.into_iter().collect())
        } else {
            None
        }
    }
}

impl Matcher for PathPattern {
    fn matches(&self, _method: &Method, path: &str) -> bool {
        self.captures(path).is_some()
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn tokenize(pattern: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut wildcards = 0;
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ':' if chars.peek().copied().is_some_and(is_name_char) => {
                let mut name = String::new();
                while let Some(&next) = chars.peek() {
                    if !is_name_char(next) {
                        break;
                    }
                    name.push(next);
                    chars.next();
                }
                let optional = chars.next_if_eq(&'?').is_some();
                // An optional parameter takes its leading slash with it;
                // the '/' prefix on the name marks that for the matcher.
                let name = if optional && literal.ends_with('/') {
                    literal.pop();
                    format!("/{}", name)
                } else {
                    name
                };
                if !literal.is_empty() {
                    tokens.push(Token::Literal(std::mem::take(&mut literal)));
                }
                tokens.push(Token::Param { name, optional });
            }
            '*' => {
                if !literal.is_empty() {
                    tokens.push(Token::Literal(std::mem::take(&mut literal)));
                }
                tokens.push(Token::Wildcard(wildcards.to_string()));
                wildcards += 1;
            }
            other => literal.push(other),
        }
    }
    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }
    tokens
}

fn match_tokens(tokens: &[Token], path: &str, captured: &mut Vec<(String, String)>) -> bool {
    let Some((token, rest)) = tokens.split_first() else {
        return path.is_empty() || path == "/";
    };

    match token {
        Token::Literal(literal) => {
            let n = literal.len();
            path.len() >= n
                && path.is_char_boundary(n)
                && path[..n].eq_ignore_ascii_case(literal)
                && match_tokens(rest, &path[n..], captured)
        }
        Token::Param { name, optional } => {
            let (name, path) = match name.strip_prefix('/') {
                Some(bare) => match path.strip_prefix('/') {
                    Some(after) => (bare, after),
                    None => return *optional && match_tokens(rest, path, captured),
                },
                None => (name.as_str(), path),
            };
            let segment_end = path.find('/').unwrap_or(path.len());
            // Shortest capture first.
            for end in (1..=segment_end).filter(|&i| path.is_char_boundary(i)) {
                captured.push((name.to_string(), path[..end].to_string()));
                if match_tokens(rest, &path[end..], captured) {
                    return true;
                }
                captured.pop();
            }
            *optional && segment_end == 0 && match_tokens(rest, path, captured)
        }
        Token::Wildcard(name) => {
            // Longest capture first.
            for end in (0..=path.len()).rev().filter(|&i| path.is_char_boundary(i)) {
                captured.push((name.clone(), path[..end].to_string()));
                if match_tokens(rest, &path[end..], captured) {
                    return true;
                }
                captured.pop();
            }
            false
        }
    }
}
