//! Minimal text analysis
//!
//! Splits on anything that is not alphanumeric and lowercases. Each token
//! keeps its position and byte offsets into the source text.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub position: u32,
    pub start: u32,
    pub end: u32,
}

/// Tokenize `text` into lowercase alphanumeric runs
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;

    for (idx, ch) in text.char_indices() {
        if ch.is_alphanumeric() {
            if start.is_none() {
                start = Some(idx);
            }
        } else if let Some(s) = start.take() {
            push_token(&mut tokens, text, s, idx);
        }
    }
    if let Some(s) = start {
        push_token(&mut tokens, text, s, text.len());
    }

    tokens
}

fn push_token(tokens: &mut Vec<Token>, text: &str, start: usize, end: usize) {
    let position = tokens.len() as u32;
    tokens.push(Token {
        text: text[start..end].to_lowercase(),
        position,
        start: start as u32,
        end: end as u32,
    });
}
