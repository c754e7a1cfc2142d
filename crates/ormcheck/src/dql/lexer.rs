//! DQL tokenizer.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    /// Namespaced class name such as `App\Entity\Post`.
    QualifiedName,
    Integer,
    Float,
    String,
    /// `:name` or `?1`
    Parameter,
    Operator,
    Dot,
    Comma,
    OpenParen,
    CloseParen,
    OpenCurly,
    CloseCurly,
    /// Any character the grammar has no use for.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Token text; string literals are unquoted and unescaped.
    pub value: String,
    /// Byte offset in the query.
    pub position: usize,
}

impl Token {
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Identifier && self.value.eq_ignore_ascii_case(keyword)
    }

    pub fn is_name(&self) -> bool {
        matches!(self.kind, TokenKind::Identifier | TokenKind::QualifiedName)
    }
}

/// Reserved words of the query language (case-insensitive).
pub const KEYWORDS: &[&str] = &[
    "ALL", "AND", "ANY", "AS", "ASC", "BETWEEN", "BOTH", "BY", "CASE", "DELETE", "DESC",
    "DISTINCT", "ELSE", "EMPTY", "END", "ESCAPE", "EXISTS", "FALSE", "FROM", "GROUP", "HAVING",
    "HIDDEN", "IN", "INDEX", "INNER", "INSTANCE", "IS", "JOIN", "LEADING", "LEFT", "LIKE",
    "MEMBER", "NEW", "NOT", "NULL", "OF", "ON", "OR", "ORDER", "OUTER", "PARTIAL", "SELECT",
    "SET", "SOME", "THEN", "TRAILING", "TRUE", "UPDATE", "WHEN", "WHERE", "WITH",
];

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(word))
}

pub fn tokenize(input: &str) -> Vec<Token> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let (kind, value) = if c.is_ascii_alphabetic() || c == b'_' || c == b'\\' {
            i += 1;
            while i < bytes.len()
                && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'\\')
            {
                i += 1;
            }
            let text = &input[start..i];
            let kind = if text.contains('\\') {
                TokenKind::QualifiedName
            } else {
                TokenKind::Identifier
            };
            (kind, text.to_string())
        } else if c.is_ascii_digit() {
            let mut kind = TokenKind::Integer;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i + 1 < bytes.len() && bytes[i] == b'.' && bytes[i + 1].is_ascii_digit() {
                kind = TokenKind::Float;
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
            }
            if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                let mut j = i + 1;
                if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                    j += 1;
                }
                if j < bytes.len() && bytes[j].is_ascii_digit() {
                    kind = TokenKind::Float;
                    i = j;
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            (kind, input[start..i].to_string())
        } else if c == b'\'' {
            let mut value = String::new();
            i += 1;
            let mut closed = false;
            let mut chunk_start = i;
            while i < bytes.len() {
                if bytes[i] == b'\'' {
                    value.push_str(&input[chunk_start..i]);
                    if i + 1 < bytes.len() && bytes[i + 1] == b'\'' {
                        value.push('\'');
                        i += 2;
                        chunk_start = i;
                        continue;
                    }
                    i += 1;
                    closed = true;
                    break;
                }
                i += 1;
            }
            if closed {
                (TokenKind::String, value)
            } else {
                // Unterminated literal: the quote itself is all we can say.
                i = start + 1;
                (TokenKind::Unknown, "'".to_string())
            }
        } else if c == b':' && i + 1 < bytes.len() && (bytes[i + 1].is_ascii_alphabetic() || bytes[i + 1] == b'_') {
            i += 1;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            (TokenKind::Parameter, input[start..i].to_string())
        } else if c == b'?' {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            (TokenKind::Parameter, input[start..i].to_string())
        } else {
            let two = input.get(i..i + 2).unwrap_or("");
            if matches!(two, "<>" | "<=" | ">=" | "!=") {
                i += 2;
                (TokenKind::Operator, two.to_string())
            } else {
                // Advance by one full character.
                let ch = input[i..].chars().next().unwrap_or('?');
                i += ch.len_utf8();
                let kind = match ch {
                    '.' => TokenKind::Dot,
                    ',' => TokenKind::Comma,
                    '(' => TokenKind::OpenParen,
                    ')' => TokenKind::CloseParen,
                    '{' => TokenKind::OpenCurly,
                    '}' => TokenKind::CloseCurly,
                    '=' | '<' | '>' | '!' | '+' | '-' | '*' | '/' => TokenKind::Operator,
                    _ => TokenKind::Unknown,
                };
                (kind, ch.to_string())
            }
        };

        tokens.push(Token {
            kind,
            value,
            position: start,
        });
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<(TokenKind, String)> {
        tokenize(input).into_iter().map(|t| (t.kind, t.value)).collect()
    }

    #[test]
    fn test_tokenize_select() {
        let tokens = tokenize("SELECT e FROM App\\Entity e WHERE e.id <> :id");
        let values: Vec<_> = tokens.iter().map(|t| t.value.as_str()).collect();
        assert_eq!(
            values,
            vec!["SELECT", "e", "FROM", "App\\Entity", "e", "WHERE", "e", ".", "id", "<>", ":id"]
        );
        assert_eq!(tokens[3].kind, TokenKind::QualifiedName);
        assert_eq!(tokens[3].position, 14);
        assert!(tokens[0].is_keyword("select"));
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            kinds("'it''s' 12 1.5 ?1"),
            vec![
                (TokenKind::String, "it's".to_string()),
                (TokenKind::Integer, "12".to_string()),
                (TokenKind::Float, "1.5".to_string()),
                (TokenKind::Parameter, "?1".to_string()),
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let tokens = tokenize("e.title = 'abc");
        assert_eq!(tokens[4].kind, TokenKind::Unknown);
        assert_eq!(tokens[4].position, 10);
    }
}
