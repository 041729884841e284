//! Tokenizer for the query language.
//!
//! Produces a finite token sequence with an explicit end-of-input
//! sentinel. SQL keywords are recognized case-insensitively; identifiers
//! keep their original spelling because XML element names are
//! case-sensitive. DSN shortcut spellings like `30_001` are lexed as
//! identifiers and `30.002` as a number; the parser classifies them.

use crate::errors::{codes, ArxError, ArxResult, Location};
use std::fmt;

/// Reserved words, recognized case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Select,
    Distinct,
    From,
    For,
    In,
    At,
    Where,
    And,
    Or,
    Not,
    Like,
    Is,
    Null,
    Group,
    By,
    Having,
    Order,
    Asc,
    Desc,
    Limit,
    Offset,
    As,
    Count,
    Sum,
    Avg,
    Min,
    Max,
    FileName,
    Set,
    Show,
    Mode,
    Standard,
    Dsn,
    DsnVersion,
    Xsd,
    Dest,
    Verbose,
    Describe,
    Check,
    Generate,
    Xml,
    Prefix,
    Template,
    Compare,
    Format,
    List,
    UpgradeTo,
}

impl Keyword {
    /// Classify an identifier spelling; comparison uppercases first.
    pub fn from_ident(text: &str) -> Option<Keyword> {
        let upper = text.to_ascii_uppercase();
        let kw = match upper.as_str() {
            "SELECT" => Keyword::Select,
            "DISTINCT" => Keyword::Distinct,
            "FROM" => Keyword::From,
            "FOR" => Keyword::For,
            "IN" => Keyword::In,
            "AT" => Keyword::At,
            "WHERE" => Keyword::Where,
            "AND" => Keyword::And,
            "OR" => Keyword::Or,
            "NOT" => Keyword::Not,
            "LIKE" => Keyword::Like,
            "IS" => Keyword::Is,
            "NULL" => Keyword::Null,
            "GROUP" => Keyword::Group,
            "BY" => Keyword::By,
            "HAVING" => Keyword::Having,
            "ORDER" => Keyword::Order,
            "ASC" => Keyword::Asc,
            "DESC" => Keyword::Desc,
            "LIMIT" => Keyword::Limit,
            "OFFSET" => Keyword::Offset,
            "AS" => Keyword::As,
            "COUNT" => Keyword::Count,
            "SUM" => Keyword::Sum,
            "AVG" => Keyword::Avg,
            "MIN" => Keyword::Min,
            "MAX" => Keyword::Max,
            "FILE_NAME" => Keyword::FileName,
            "SET" => Keyword::Set,
            "SHOW" => Keyword::Show,
            "MODE" => Keyword::Mode,
            "STANDARD" => Keyword::Standard,
            "DSN" => Keyword::Dsn,
            "DSN_VERSION" => Keyword::DsnVersion,
            "XSD" => Keyword::Xsd,
            "DEST" => Keyword::Dest,
            "VERBOSE" => Keyword::Verbose,
            "DESCRIBE" => Keyword::Describe,
            "CHECK" => Keyword::Check,
            "GENERATE" => Keyword::Generate,
            "XML" => Keyword::Xml,
            "PREFIX" => Keyword::Prefix,
            "TEMPLATE" => Keyword::Template,
            "COMPARE" => Keyword::Compare,
            "FORMAT" => Keyword::Format,
            "LIST" => Keyword::List,
            "UPGRADE_TO" => Keyword::UpgradeTo,
            _ => return None,
        };
        Some(kw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword(Keyword),
    Ident,
    Number,
    Str,
    Eq,
    Neq,
    Lt,
    Gt,
    Le,
    Ge,
    Comma,
    LParen,
    RParen,
    Dot,
    Slash,
    At,
    Star,
    EndOfInput,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Keyword(kw) => write!(f, "keyword {:?}", kw),
            TokenKind::Ident => write!(f, "identifier"),
            TokenKind::Number => write!(f, "number"),
            TokenKind::Str => write!(f, "string"),
            TokenKind::Eq => write!(f, "'='"),
            TokenKind::Neq => write!(f, "'!='"),
            TokenKind::Lt => write!(f, "'<'"),
            TokenKind::Gt => write!(f, "'>'"),
            TokenKind::Le => write!(f, "'<='"),
            TokenKind::Ge => write!(f, "'>='"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::Dot => write!(f, "'.'"),
            TokenKind::Slash => write!(f, "'/'"),
            TokenKind::At => write!(f, "'@'"),
            TokenKind::Star => write!(f, "'*'"),
            TokenKind::EndOfInput => write!(f, "end of input"),
        }
    }
}

/// One token with its original spelling and 1-based query position.
///
/// For `Str` tokens `text` is the unquoted content.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: u32,
    pub column: u32,
}

impl Token {
    pub fn location(&self) -> Location {
        Location::at(self.line, self.column)
    }

    pub fn is_keyword(&self, kw: Keyword) -> bool {
        self.kind == TokenKind::Keyword(kw)
    }
}

pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the whole input, appending the end-of-input sentinel.
    pub fn tokenize(input: &str) -> ArxResult<Vec<Token>> {
        let mut lexer = Lexer::new(input);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token()?;
            let done = token.kind == TokenKind::EndOfInput;
            tokens.push(token);
            if done {
                break;
            }
        }
        Ok(tokens)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn token(&self, kind: TokenKind, text: impl Into<String>, line: u32, column: u32) -> Token {
        Token {
            kind,
            text: text.into(),
            line,
            column,
        }
    }

    fn next_token(&mut self) -> ArxResult<Token> {
        loop {
            // skip whitespace
            while matches!(self.peek(), Some(c) if c.is_whitespace()) {
                self.bump();
            }

            let (line, column) = (self.line, self.column);
            let c = match self.peek() {
                Some(c) => c,
                None => return Ok(self.token(TokenKind::EndOfInput, "", line, column)),
            };

            match c {
                '-' => {
                    self.bump();
                    match self.peek() {
                        // `--` comment runs to end of line
                        Some('-') => {
                            while let Some(c) = self.peek() {
                                if c == '\n' {
                                    break;
                                }
                                self.bump();
                            }
                            continue;
                        }
                        Some(d) if d.is_ascii_digit() => {
                            return self.lex_number(line, column, true);
                        }
                        _ => {
                            return Err(ArxError::code(codes::INVALID_CHARACTER)
                                .with_detail("'-'")
                                .with_location(Location::at(line, column)));
                        }
                    }
                }
                '\'' | '"' => return self.lex_string(line, column),
                '=' => {
                    self.bump();
                    return Ok(self.token(TokenKind::Eq, "=", line, column));
                }
                '!' => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        return Ok(self.token(TokenKind::Neq, "!=", line, column));
                    }
                    return Err(ArxError::code(codes::INVALID_CHARACTER)
                        .with_detail("'!' (did you mean '!=')")
                        .with_location(Location::at(line, column)));
                }
                '<' => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        return Ok(self.token(TokenKind::Le, "<=", line, column));
                    }
                    return Ok(self.token(TokenKind::Lt, "<", line, column));
                }
                '>' => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        return Ok(self.token(TokenKind::Ge, ">=", line, column));
                    }
                    return Ok(self.token(TokenKind::Gt, ">", line, column));
                }
                ',' => {
                    self.bump();
                    return Ok(self.token(TokenKind::Comma, ",", line, column));
                }
                '(' => {
                    self.bump();
                    return Ok(self.token(TokenKind::LParen, "(", line, column));
                }
                ')' => {
                    self.bump();
                    return Ok(self.token(TokenKind::RParen, ")", line, column));
                }
                '.' => {
                    self.bump();
                    return Ok(self.token(TokenKind::Dot, ".", line, column));
                }
                '/' => {
                    self.bump();
                    return Ok(self.token(TokenKind::Slash, "/", line, column));
                }
                '@' => {
                    self.bump();
                    return Ok(self.token(TokenKind::At, "@", line, column));
                }
                '*' => {
                    self.bump();
                    return Ok(self.token(TokenKind::Star, "*", line, column));
                }
                c if c.is_ascii_digit() => return self.lex_number(line, column, false),
                c if c.is_ascii_alphabetic() || c == '_' => return self.lex_ident(line, column),
                other => {
                    return Err(ArxError::code(codes::INVALID_CHARACTER)
                        .with_detail(format!("'{}'", other))
                        .with_location(Location::at(line, column)));
                }
            }
        }
    }

    fn lex_string(&mut self, line: u32, column: u32) -> ArxResult<Token> {
        let quote = self.bump().unwrap();
        let mut text = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => {
                    return Ok(self.token(TokenKind::Str, text, line, column));
                }
                Some(c) => text.push(c),
                None => {
                    return Err(ArxError::code(codes::UNTERMINATED_STRING)
                        .with_location(Location::at(line, column)));
                }
            }
        }
    }

    /// Numbers are decimal with an optional sign and fractional part.
    /// A digit run continued by `_` or a letter is reclassified as an
    /// identifier so DSN spellings like `30_001` come out whole.
    fn lex_number(&mut self, line: u32, column: u32, negative: bool) -> ArxResult<Token> {
        let mut text = String::new();
        if negative {
            text.push('-');
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            text.push(self.bump().unwrap());
        }

        if !negative {
            if matches!(self.peek(), Some(c) if c == '_' || c.is_ascii_alphabetic()) {
                while matches!(self.peek(), Some(c) if c == '_' || c.is_ascii_alphanumeric()) {
                    text.push(self.bump().unwrap());
                }
                return Ok(self.token(TokenKind::Ident, text, line, column));
            }
        }

        // fractional part only when a digit follows the dot; a bare
        // trailing dot belongs to path syntax
        if self.peek() == Some('.') {
            let mut lookahead = self.chars.clone();
            lookahead.next();
            if matches!(lookahead.peek(), Some(c) if c.is_ascii_digit()) {
                text.push(self.bump().unwrap());
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    text.push(self.bump().unwrap());
                }
            }
        }

        Ok(self.token(TokenKind::Number, text, line, column))
    }

    fn lex_ident(&mut self, line: u32, column: u32) -> ArxResult<Token> {
        let mut text = String::new();
        while matches!(self.peek(), Some(c) if c == '_' || c.is_ascii_alphanumeric()) {
            text.push(self.bump().unwrap());
        }
        let kind = match Keyword::from_ident(&text) {
            Some(kw) => TokenKind::Keyword(kw),
            None => TokenKind::Ident,
        };
        Ok(self.token(kind, text, line, column))
    }
}
