//! Tokenizer for the statement language.

use anyhow::{bail, Result};

/// Multi-character punctuators, longest first so `<=` wins over `<`.
const PUNCTS: &[&str] = &[
    "&&", "||", "==", "!=", "<=", ">=", "++", "--", "+=", "-=", "*=", "/=", "%=", "->", "(", ")",
    "{", "}", "[", "]", ";", ",", ".", "=", "<", ">", "+", "-", "*", "/", "%", "!", ":",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tok {
    Ident(String),
    Int(i64),
    Str(String),
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub tok: Tok,
    pub line: usize,
    pub col: usize,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match (self.peek(0), self.peek(1)) {
                (Some(c), _) if c.is_whitespace() => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                (Some('/'), Some('*')) => {
                    let (line, col) = (self.line, self.col);
                    self.bump();
                    self.bump();
                    loop {
                        match (self.peek(0), self.peek(1)) {
                            (Some('*'), Some('/')) => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            (Some(_), _) => {
                                self.bump();
                            }
                            (None, _) => bail!("{line}:{col}: unterminated block comment"),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn string(&mut self, line: usize, col: usize) -> Result<Tok> {
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => bail!("{line}:{col}: unterminated string literal"),
                Some('"') => return Ok(Tok::Str(value)),
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('"') => value.push('"'),
                    Some('\\') => value.push('\\'),
                    other => bail!(
                        "{}:{}: unsupported escape sequence \\{}",
                        self.line,
                        self.col,
                        other.map(String::from).unwrap_or_default()
                    ),
                },
                Some(c) => value.push(c),
            }
        }
    }

    fn next_token(&mut self) -> Result<Token> {
        self.skip_trivia()?;
        let (line, col) = (self.line, self.col);
        let Some(c) = self.peek(0) else {
            return Ok(Token {
                tok: Tok::Eof,
                line,
                col,
            });
        };

        let tok = if c.is_ascii_digit() {
            let mut digits = String::new();
            while let Some(d) = self.peek(0).filter(|d| d.is_ascii_digit()) {
                digits.push(d);
                self.bump();
            }
            match digits.parse::<i64>() {
                Ok(v) => Tok::Int(v),
                Err(_) => bail!("{line}:{col}: integer literal {digits} out of range"),
            }
        } else if c.is_alphabetic() || c == '_' || c == '$' {
            let mut ident = String::new();
            while let Some(d) = self
                .peek(0)
                .filter(|d| d.is_alphanumeric() || *d == '_' || *d == '$')
            {
                ident.push(d);
                self.bump();
            }
            Tok::Ident(ident)
        } else if c == '"' {
            self.string(line, col)?
        } else {
            let rest: String = self.chars[self.pos..].iter().take(2).collect();
            let Some(p) = PUNCTS.iter().find(|p| rest.starts_with(**p)) else {
                bail!("{line}:{col}: unexpected character '{c}'");
            };
            for _ in 0..p.len() {
                self.bump();
            }
            Tok::Punct(*p)
        };
        Ok(Token { tok, line, col })
    }
}

/// Splits `source` into tokens, ending with a single [`Tok::Eof`].
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut lexer = Lexer {
        chars: source.chars().collect(),
        pos: 0,
        line: 1,
        col: 1,
    };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.tok == Tok::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Tok> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.tok)
            .collect()
    }

    #[test]
    fn longest_punct_wins() {
        assert_eq!(
            kinds("a <= b++"),
            vec![
                Tok::Ident("a".into()),
                Tok::Punct("<="),
                Tok::Ident("b".into()),
                Tok::Punct("++"),
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn comments_are_skipped_and_positions_tracked() {
        let tokens = tokenize("// line\n/* block\n */ x").unwrap();
        assert_eq!(tokens[0].tok, Tok::Ident("x".into()));
        assert_eq!((tokens[0].line, tokens[0].col), (3, 5));
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            kinds(r#""a\"b\n""#),
            vec![Tok::Str("a\"b\n".into()), Tok::Eof]
        );
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = tokenize("\"abc").unwrap_err();
        assert!(err.to_string().contains("unterminated string"));
    }

    #[test]
    fn stray_character_is_an_error() {
        let err = tokenize("a # b").unwrap_err();
        assert!(err.to_string().starts_with("1:3:"));
    }
}
