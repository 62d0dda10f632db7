use crate::language::span::Span;

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    LParen,
    RParen,
    /// Keywords, instruction names and numeric literals; the parser decides.
    Atom(String),
    String(String),
    Eof,
}

impl TokenKind {
    pub fn describe(&self) -> String {
        match self {
            TokenKind::LParen => "`(`".into(),
            TokenKind::RParen => "`)`".into(),
            TokenKind::Atom(text) => format!("`{text}`"),
            TokenKind::String(text) => format!("string {text:?}"),
            TokenKind::Eof => "end of file".into(),
        }
    }
}
