use std::sync::OnceLock;

use syntect::parsing::{ParseState, ScopeStack, SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;
use tracing::warn;

/// A highlighted byte span of a code string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub start: usize,
    pub end: usize,
    pub kind: String,
}

fn syntax_set() -> &'static SyntaxSet {
    static SET: OnceLock<SyntaxSet> = OnceLock::new();
    SET.get_or_init(SyntaxSet::load_defaults_newlines)
}

fn find_syntax<'a>(set: &'a SyntaxSet, lang: &str) -> Option<&'a SyntaxReference> {
    let lang = lang.trim();
    if lang.is_empty() {
        return None;
    }
    set.find_syntax_by_token(lang)
}

pub fn is_known_language(lang: &str) -> bool {
    find_syntax(syntax_set(), lang).is_some()
}

/// Tokens of `code` in `lang`. Unknown languages produce none.
pub fn highlight(lang: &str, code: &str) -> Vec<Token> {
    let set = syntax_set();
    let Some(syntax) = find_syntax(set, lang) else {
        return Vec::new();
    };
    let mut state = ParseState::new(syntax);
    let mut stack = ScopeStack::new();
    let mut tokens = Vec::new();
    let mut line_start = 0;

    for line in LinesWithEndings::from(code) {
        let ops = match state.parse_line(line, set) {
            Ok(ops) => ops,
            Err(err) => {
                warn!(%err, lang, "syntax highlighting stopped");
                break;
            }
        };
        let mut cursor = 0;
        for (pos, op) in ops {
            push_token(&stack, line_start + cursor, line_start + pos, &mut tokens);
            cursor = pos;
            if stack.apply(&op).is_err() {
                return tokens;
            }
        }
        push_token(&stack, line_start + cursor, line_start + line.len(), &mut tokens);
        line_start += line.len();
    }
    tokens
}

fn push_token(stack: &ScopeStack, start: usize, end: usize, tokens: &mut Vec<Token>) {
    if start >= end {
        return;
    }
    let Some(kind) = token_kind(stack) else {
        return;
    };
    if let Some(last) = tokens.last_mut()
        && last.end == start
        && last.kind == kind
    {
        last.end = end;
        return;
    }
    tokens.push(Token { start, end, kind });
}

/// First segment of the innermost scope that is more than the language root,
/// e.g. `keyword` for `keyword.control.rust`.
fn token_kind(stack: &ScopeStack) -> Option<String> {
    stack
        .as_slice()
        .iter()
        .rev()
        .map(|scope| scope.build_string())
        .find(|name| !name.starts_with("source") && !name.starts_with("text"))
        .and_then(|name| name.split('.').next().map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_keywords_are_tokenized() {
        let tokens = highlight("rust", "fn main() {}\n");
        assert!(
            tokens
                .iter()
                .any(|t| t.kind == "storage" || t.kind == "keyword"),
            "{tokens:?}"
        );
        assert!(tokens.iter().all(|t| t.start < t.end));
    }

    #[test]
    fn unknown_language_has_no_tokens() {
        assert!(highlight("no-such-language", "whatever").is_empty());
        assert!(!is_known_language(""));
    }
}
