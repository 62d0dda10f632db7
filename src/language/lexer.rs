use crate::language::{
    span::Span,
    token::{Token, TokenKind},
};

#[derive(Debug)]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

pub fn lex(source: &str) -> Result<Vec<Token>, Vec<LexError>> {
    let lexer = Lexer::new(source);
    lexer.run()
}

struct Lexer<'a> {
    src: &'a str,
    chars: std::str::Chars<'a>,
    current: Option<char>,
    offset: usize,
    tokens: Vec<Token>,
    errors: Vec<LexError>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        let mut chars = src.chars();
        let current = chars.next();
        Self {
            src,
            chars,
            current,
            offset: 0,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, Vec<LexError>> {
        while let Some(ch) = self.current {
            match ch {
                ';' if self.peek() == Some(';') => self.eat_line_comment(),
                '(' if self.peek() == Some(';') => self.eat_block_comment(),
                ch if ch.is_whitespace() => {
                    self.bump();
                }
                '(' => self.lex_single(TokenKind::LParen),
                ')' => self.lex_single(TokenKind::RParen),
                '"' => self.lex_string(),
                _ => self.lex_atom(),
            }
        }
        self.push_token(TokenKind::Eof, self.offset, self.offset);

        if self.errors.is_empty() {
            Ok(self.tokens)
        } else {
            Err(self.errors)
        }
    }

    fn bump(&mut self) -> Option<char> {
        if let Some(ch) = self.current {
            self.offset += ch.len_utf8();
        }
        self.current = self.chars.next();
        self.current
    }

    fn peek(&self) -> Option<char> {
        self.chars.clone().next()
    }

    fn push_token(&mut self, kind: TokenKind, start: usize, end: usize) {
        self.tokens.push(Token {
            kind,
            span: Span::new(start, end),
        });
    }

    fn error(&mut self, start: usize, end: usize, message: impl Into<String>) {
        self.errors.push(LexError {
            message: message.into(),
            span: Span::new(start, end),
        });
    }

    fn eat_line_comment(&mut self) {
        while let Some(ch) = self.current {
            if ch == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn eat_block_comment(&mut self) {
        let start = self.offset;
        self.bump();
        self.bump();
        let mut depth = 1usize;
        while let Some(ch) = self.current {
            if ch == '(' && self.peek() == Some(';') {
                self.bump();
                self.bump();
                depth += 1;
                continue;
            }
            if ch == ';' && self.peek() == Some(')') {
                self.bump();
                self.bump();
                depth -= 1;
                if depth == 0 {
                    return;
                }
                continue;
            }
            self.bump();
        }
        self.error(start, self.offset, "Unterminated block comment");
    }

    fn lex_single(&mut self, kind: TokenKind) {
        let start = self.offset;
        self.bump();
        self.push_token(kind, start, self.offset);
    }

    fn lex_atom(&mut self) {
        let start = self.offset;
        while let Some(ch) = self.current {
            if ch.is_whitespace() || matches!(ch, '(' | ')' | '"' | ';') {
                break;
            }
            self.bump();
        }
        let end = self.offset;
        if start == end {
            // A lone `;` that does not open a comment.
            self.bump();
            self.error(start, self.offset, "Unexpected character");
            return;
        }
        let text = self.src[start..end].to_string();
        self.push_token(TokenKind::Atom(text), start, end);
    }

    fn lex_string(&mut self) {
        let start = self.offset;
        self.bump();
        let mut value = String::new();
        loop {
            match self.current {
                None | Some('\n') => {
                    self.error(start, self.offset, "Unterminated string literal");
                    return;
                }
                Some('"') => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    let escape_start = self.offset;
                    self.bump();
                    match self.current {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('\\') => value.push('\\'),
                        Some('"') => value.push('"'),
                        Some('\'') => value.push('\''),
                        Some(hi) if hi.is_ascii_hexdigit() => match self.peek() {
                            Some(lo) if lo.is_ascii_hexdigit() => {
                                self.bump();
                                let byte = hi.to_digit(16).unwrap_or(0) * 16
                                    + lo.to_digit(16).unwrap_or(0);
                                value.push(char::from(byte as u8));
                            }
                            _ => self.error(escape_start, self.offset, "Invalid hex escape"),
                        },
                        _ => self.error(escape_start, self.offset, "Unknown escape sequence"),
                    }
                    self.bump();
                }
                Some(ch) => {
                    value.push(ch);
                    self.bump();
                }
            }
        }
        self.push_token(TokenKind::String(value), start, self.offset);
    }
}
