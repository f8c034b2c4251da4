//! Command-line tokenizer.
//!
//! Control commands (`login alice secret`) and the lines of the project
//! attribute store share one grammar:
//!
//! - tokens are separated by spaces or tabs, which are never emitted;
//! - a `"` or `'` opens a quoted run that ends at the next unescaped copy of
//!   the same delimiter, so `"b c"` is a single token `b c`;
//! - inside a quoted run `\` escapes the next character (`\\` is a literal
//!   backslash, `\"` a literal quote);
//! - an unterminated run swallows the rest of the line.
//!
//! Tokenizing never fails.

use std::str::Chars;

/// The first token of a login command.
pub const LOGIN_COMMAND: &str = "login";

/// Splits one line into its tokens.
///
/// ```rust
/// use tether_protocol::tokenize;
///
/// assert_eq!(tokenize("a \"b c\" d"), vec!["a", "b c", "d"]);
/// assert!(tokenize("").is_empty());
/// ```
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut bare = String::new();
    let mut chars = line.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '"' | '\'' => {
                flush(&mut bare, &mut tokens);
                tokens.push(read_quoted(&mut chars, ch));
            }
            ' ' | '\t' => flush(&mut bare, &mut tokens),
            _ => bare.push(ch),
        }
    }
    flush(&mut bare, &mut tokens);
    tokens
}

/// Splits a CRLF-separated block and tokenizes every line.
///
/// Blank lines are kept as empty commands so line positions survive a
/// [`render_block`] round trip.
pub fn tokenize_block(text: &str) -> Vec<Vec<String>> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split("\r\n").map(tokenize).collect()
}

/// Joins commands back into a CRLF block that [`tokenize_block`] reads
/// back to the same tokens.
pub fn render_block<S: AsRef<str>>(commands: &[Vec<S>]) -> String {
    commands
        .iter()
        .map(|command| {
            command
                .iter()
                .map(|token| render_token(token.as_ref()))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\r\n")
}

/// A recognized `login <identity> <secret>` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Login {
    /// The name the client wants to be known as.
    pub identity: String,
    /// The credential handed to the verifier.
    pub secret: String,
}

impl Login {
    /// Recognizes a login command. Needs at least three tokens with the
    /// first one exactly [`LOGIN_COMMAND`]; extra tokens are ignored.
    pub fn from_tokens(tokens: &[String]) -> Option<Self> {
        match tokens {
            [command, identity, secret, ..] if command == LOGIN_COMMAND => {
                Some(Self {
                    identity: identity.clone(),
                    secret: secret.clone(),
                })
            }
            _ => None,
        }
    }
}

fn flush(bare: &mut String, tokens: &mut Vec<String>) {
    if !bare.is_empty() {
        tokens.push(std::mem::take(bare));
    }
}

/// Reads a quoted run; the opening delimiter has already been consumed.
fn read_quoted(chars: &mut Chars<'_>, delimiter: char) -> String {
    let mut run = String::new();
    let mut escaped = false;

    for ch in chars.by_ref() {
        if ch == delimiter && !escaped {
            break;
        }
        if ch == '\\' && !escaped {
            escaped = true;
            continue;
        }
        escaped = false;
        run.push(ch);
    }
    run
}

fn render_token(token: &str) -> String {
    let needs_quotes = token.is_empty()
        || token
            .chars()
            .any(|c| matches!(c, ' ' | '\t' | '"' | '\''));
    if !needs_quotes {
        return token.to_string();
    }
    let mut out = String::with_capacity(token.len() + 2);
    out.push('"');
    for ch in token.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}
