//! Tokenizer with Go's automatic semicolon insertion

use crate::error::{GoError, Pos, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),

    // Keywords
    Package,
    Import,
    Func,
    Type,
    Struct,
    Interface,
    Map,
    Var,
    Const,
    Return,
    If,
    Else,
    For,
    Range,
    Break,
    Continue,
    Switch,
    Case,
    Default,
    /// Go keywords the subset does not implement (`go`, `defer`, `chan`, ...)
    Unsupported(&'static str),

    // Operators and punctuation
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Shl,
    Shr,
    AndAnd,
    OrOr,
    Not,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Assign,
    Define,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    Inc,
    Dec,
    LParen,
    RParen,
    LBrack,
    RBrack,
    LBrace,
    RBrace,
    Comma,
    Semi,
    Dot,
    Colon,
    Ellipsis,
    Eof,
}

impl Tok {
    /// Human-readable token text for error messages
    pub fn describe(&self) -> String {
        match self {
            Tok::Ident(name) => format!("name {}", name),
            Tok::Int(v) => format!("literal {}", v),
            Tok::Float(v) => format!("literal {}", v),
            Tok::Str(s) => format!("literal {:?}", s),
            Tok::Semi => "newline".to_string(),
            Tok::Eof => "EOF".to_string(),
            Tok::Unsupported(word) => format!("keyword {}", word),
            other => match other.symbol() {
                Some(sym) => sym.to_string(),
                None => format!("keyword {}", format!("{:?}", other).to_lowercase()),
            },
        }
    }

    fn symbol(&self) -> Option<&'static str> {
        let sym = match self {
            Tok::Plus => "+",
            Tok::Minus => "-",
            Tok::Star => "*",
            Tok::Slash => "/",
            Tok::Percent => "%",
            Tok::Amp => "&",
            Tok::Pipe => "|",
            Tok::Caret => "^",
            Tok::Shl => "<<",
            Tok::Shr => ">>",
            Tok::AndAnd => "&&",
            Tok::OrOr => "||",
            Tok::Not => "!",
            Tok::EqEq => "==",
            Tok::NotEq => "!=",
            Tok::Lt => "<",
            Tok::Le => "<=",
            Tok::Gt => ">",
            Tok::Ge => ">=",
            Tok::Assign => "=",
            Tok::Define => ":=",
            Tok::PlusAssign => "+=",
            Tok::MinusAssign => "-=",
            Tok::StarAssign => "*=",
            Tok::SlashAssign => "/=",
            Tok::PercentAssign => "%=",
            Tok::Inc => "++",
            Tok::Dec => "--",
            Tok::LParen => "(",
            Tok::RParen => ")",
            Tok::LBrack => "[",
            Tok::RBrack => "]",
            Tok::LBrace => "{",
            Tok::RBrace => "}",
            Tok::Comma => "comma",
            Tok::Dot => ".",
            Tok::Colon => ":",
            Tok::Ellipsis => "...",
            _ => return None,
        };
        Some(sym)
    }

    fn ends_statement(&self) -> bool {
        matches!(
            self,
            Tok::Ident(_)
                | Tok::Int(_)
                | Tok::Float(_)
                | Tok::Str(_)
                | Tok::Return
                | Tok::Break
                | Tok::Continue
                | Tok::Inc
                | Tok::Dec
                | Tok::RParen
                | Tok::RBrack
                | Tok::RBrace
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub pos: Pos,
}

fn keyword(word: &str) -> Option<Tok> {
    let tok = match word {
        "package" => Tok::Package,
        "import" => Tok::Import,
        "func" => Tok::Func,
        "type" => Tok::Type,
        "struct" => Tok::Struct,
        "interface" => Tok::Interface,
        "map" => Tok::Map,
        "var" => Tok::Var,
        "const" => Tok::Const,
        "return" => Tok::Return,
        "if" => Tok::If,
        "else" => Tok::Else,
        "for" => Tok::For,
        "range" => Tok::Range,
        "break" => Tok::Break,
        "continue" => Tok::Continue,
        "switch" => Tok::Switch,
        "case" => Tok::Case,
        "default" => Tok::Default,
        "go" => Tok::Unsupported("go"),
        "defer" => Tok::Unsupported("defer"),
        "chan" => Tok::Unsupported("chan"),
        "select" => Tok::Unsupported("select"),
        "goto" => Tok::Unsupported("goto"),
        "fallthrough" => Tok::Unsupported("fallthrough"),
        _ => return None,
    };
    Some(tok)
}

pub struct Lexer<'a> {
    src: &'a str,
    chars: Vec<(usize, char)>,
    idx: usize,
    line: u32,
    col: u32,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.char_indices().collect(),
            idx: 0,
            line: 1,
            col: 1,
            tokens: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        while let Some(c) = self.peek() {
            let pos = self.pos();
            match c {
                '\n' => {
                    self.bump();
                    self.newline();
                }
                c if c.is_whitespace() => {
                    self.bump();
                }
                '/' if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                '/' if self.peek_at(1) == Some('*') => {
                    self.bump();
                    self.bump();
                    let mut crossed_line = false;
                    loop {
                        match self.bump() {
                            Some('*') if self.peek() == Some('/') => {
                                self.bump();
                                break;
                            }
                            Some('\n') => crossed_line = true,
                            Some(_) => {}
                            None => return Err(GoError::syntax(pos, "comment not terminated")),
                        }
                    }
                    if crossed_line {
                        self.newline();
                    }
                }
                c if c.is_alphabetic() || c == '_' => self.ident(pos),
                c if c.is_ascii_digit() => self.number(pos)?,
                '.' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => self.number(pos)?,
                '"' => self.string(pos)?,
                '`' => self.raw_string(pos)?,
                '\'' => self.rune(pos)?,
                _ => self.operator(pos)?,
            }
        }
        self.newline();
        let pos = self.pos();
        self.tokens.push(Token { tok: Tok::Eof, pos });
        Ok(self.tokens)
    }

    fn pos(&self) -> Pos {
        Pos::new(self.line, self.col)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.idx).map(|(_, c)| *c)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.idx + offset).map(|(_, c)| *c)
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.idx)
            .map(|(i, _)| *i)
            .unwrap_or(self.src.len())
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.idx += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn push(&mut self, tok: Tok, pos: Pos) {
        self.tokens.push(Token { tok, pos });
    }

    /// Semicolon insertion at a line break.
    fn newline(&mut self) {
        if let Some(last) = self.tokens.last() {
            if last.tok.ends_statement() {
                let pos = last.pos;
                self.push(Tok::Semi, pos);
            }
        }
    }

    fn ident(&mut self, pos: Pos) {
        let start = self.offset();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let word = &self.src[start..self.offset()];
        let tok = keyword(word).unwrap_or_else(|| Tok::Ident(word.to_string()));
        self.push(tok, pos);
    }

    fn number(&mut self, pos: Pos) -> Result<()> {
        let start = self.offset();
        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x' | 'X' | 'b' | 'B' | 'o' | 'O'))
        {
            self.bump();
            let radix = match self.bump() {
                Some('x' | 'X') => 16,
                Some('b' | 'B') => 2,
                _ => 8,
            };
            let digits_start = self.offset();
            while let Some(c) = self.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    self.bump();
                } else {
                    break;
                }
            }
            let digits: String = self.src[digits_start..self.offset()]
                .chars()
                .filter(|c| *c != '_')
                .collect();
            let value = i64::from_str_radix(&digits, radix).map_err(|_| {
                GoError::syntax(pos, format!("invalid integer literal {}", &self.src[start..self.offset()]))
            })?;
            self.push(Tok::Int(value), pos);
            return Ok(());
        }

        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '_' {
                self.bump();
            } else if c == '.' && !is_float {
                is_float = true;
                self.bump();
            } else if c == 'e' || c == 'E' {
                is_float = true;
                self.bump();
                if matches!(self.peek(), Some('+' | '-')) {
                    self.bump();
                }
            } else {
                break;
            }
        }
        let text: String = self.src[start..self.offset()]
            .chars()
            .filter(|c| *c != '_')
            .collect();
        if is_float {
            let value = text
                .parse::<f64>()
                .map_err(|_| GoError::syntax(pos, format!("invalid float literal {}", text)))?;
            self.push(Tok::Float(value), pos);
        } else {
            let value = text.parse::<i64>().map_err(|_| {
                GoError::syntax(pos, format!("integer literal {} overflows int", text))
            })?;
            self.push(Tok::Int(value), pos);
        }
        Ok(())
    }

    fn escape(&mut self, pos: Pos, quote: char) -> Result<char> {
        let c = self
            .bump()
            .ok_or_else(|| GoError::syntax(pos, "escape sequence not terminated"))?;
        let decoded = match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'a' => '\u{07}',
            'b' => '\u{08}',
            'f' => '\u{0C}',
            'v' => '\u{0B}',
            '\\' => '\\',
            '0'..='7' => {
                let mut value = c.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    let digit = self
                        .bump()
                        .and_then(|d| d.to_digit(8))
                        .ok_or_else(|| GoError::syntax(pos, "invalid octal escape"))?;
                    value = value * 8 + digit;
                }
                char::from_u32(value).ok_or_else(|| GoError::syntax(pos, "invalid octal escape"))?
            }
            'x' => self.hex_escape(pos, 2)?,
            'u' => self.hex_escape(pos, 4)?,
            'U' => self.hex_escape(pos, 8)?,
            c if c == quote => c,
            other => {
                return Err(GoError::syntax(
                    pos,
                    format!("unknown escape sequence \\{}", other),
                ))
            }
        };
        Ok(decoded)
    }

    fn hex_escape(&mut self, pos: Pos, len: usize) -> Result<char> {
        let mut value = 0u32;
        for _ in 0..len {
            let digit = self
                .bump()
                .and_then(|d| d.to_digit(16))
                .ok_or_else(|| GoError::syntax(pos, "invalid hex escape"))?;
            value = value * 16 + digit;
        }
        char::from_u32(value).ok_or_else(|| GoError::syntax(pos, "escape sequence is invalid Unicode code point"))
    }

    fn string(&mut self, pos: Pos) -> Result<()> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('"') => break,
                Some('\\') => out.push(self.escape(pos, '"')?),
                Some('\n') | None => return Err(GoError::syntax(pos, "string literal not terminated")),
                Some(c) => out.push(c),
            }
        }
        self.push(Tok::Str(out), pos);
        Ok(())
    }

    fn raw_string(&mut self, pos: Pos) -> Result<()> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('`') => break,
                Some('\r') => {}
                Some(c) => out.push(c),
                None => return Err(GoError::syntax(pos, "raw string literal not terminated")),
            }
        }
        self.push(Tok::Str(out), pos);
        Ok(())
    }

    fn rune(&mut self, pos: Pos) -> Result<()> {
        self.bump();
        let c = match self.bump() {
            Some('\\') => self.escape(pos, '\'')?,
            Some('\'') | Some('\n') | None => {
                return Err(GoError::syntax(pos, "empty rune literal or unescaped ' in rune literal"))
            }
            Some(c) => c,
        };
        if self.bump() != Some('\'') {
            return Err(GoError::syntax(pos, "rune literal not terminated"));
        }
        self.push(Tok::Int(c as i64), pos);
        Ok(())
    }

    fn operator(&mut self, pos: Pos) -> Result<()> {
        let c = self.bump().unwrap_or('\0');
        let next = self.peek();
        let (tok, extra) = match (c, next) {
            ('+', Some('+')) => (Tok::Inc, 1),
            ('+', Some('=')) => (Tok::PlusAssign, 1),
            ('+', _) => (Tok::Plus, 0),
            ('-', Some('-')) => (Tok::Dec, 1),
            ('-', Some('=')) => (Tok::MinusAssign, 1),
            ('-', _) => (Tok::Minus, 0),
            ('*', Some('=')) => (Tok::StarAssign, 1),
            ('*', _) => (Tok::Star, 0),
            ('/', Some('=')) => (Tok::SlashAssign, 1),
            ('/', _) => (Tok::Slash, 0),
            ('%', Some('=')) => (Tok::PercentAssign, 1),
            ('%', _) => (Tok::Percent, 0),
            ('&', Some('&')) => (Tok::AndAnd, 1),
            ('&', _) => (Tok::Amp, 0),
            ('|', Some('|')) => (Tok::OrOr, 1),
            ('|', _) => (Tok::Pipe, 0),
            ('^', _) => (Tok::Caret, 0),
            ('<', Some('<')) => (Tok::Shl, 1),
            ('<', Some('=')) => (Tok::Le, 1),
            ('<', _) => (Tok::Lt, 0),
            ('>', Some('>')) => (Tok::Shr, 1),
            ('>', Some('=')) => (Tok::Ge, 1),
            ('>', _) => (Tok::Gt, 0),
            ('=', Some('=')) => (Tok::EqEq, 1),
            ('=', _) => (Tok::Assign, 0),
            ('!', Some('=')) => (Tok::NotEq, 1),
            ('!', _) => (Tok::Not, 0),
            (':', Some('=')) => (Tok::Define, 1),
            (':', _) => (Tok::Colon, 0),
            ('.', Some('.')) if self.peek_at(1) == Some('.') => (Tok::Ellipsis, 2),
            ('.', _) => (Tok::Dot, 0),
            ('(', _) => (Tok::LParen, 0),
            (')', _) => (Tok::RParen, 0),
            ('[', _) => (Tok::LBrack, 0),
            (']', _) => (Tok::RBrack, 0),
            ('{', _) => (Tok::LBrace, 0),
            ('}', _) => (Tok::RBrace, 0),
            (',', _) => (Tok::Comma, 0),
            (';', _) => (Tok::Semi, 0),
            (other, _) => {
                return Err(GoError::syntax(
                    pos,
                    format!("invalid character {:?}", other),
                ))
            }
        };
        for _ in 0..extra {
            self.bump();
        }
        self.push(tok, pos);
        Ok(())
    }
}

pub fn tokenize(src: &str) -> Result<Vec<Token>> {
    Lexer::new(src).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Tok> {
        tokenize(src).unwrap().into_iter().map(|t| t.tok).collect()
    }

    #[test]
    fn inserts_semicolons_after_line_enders() {
        assert_eq!(
            kinds("x := 1\nreturn x\n"),
            vec![
                Tok::Ident("x".into()),
                Tok::Define,
                Tok::Int(1),
                Tok::Semi,
                Tok::Return,
                Tok::Ident("x".into()),
                Tok::Semi,
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn no_semicolon_after_operator_at_line_end() {
        assert_eq!(
            kinds("a +\nb"),
            vec![
                Tok::Ident("a".into()),
                Tok::Plus,
                Tok::Ident("b".into()),
                Tok::Semi,
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn lexes_struct_tag_as_raw_string() {
        let toks = kinds("FirstName string `tf:\"first\"`");
        assert_eq!(toks[2], Tok::Str("tf:\"first\"".into()));
    }

    #[test]
    fn lexes_numbers_and_runes() {
        assert_eq!(
            kinds("0x1F 1_000 2.5 1e3 'a' '\\n'"),
            vec![
                Tok::Int(31),
                Tok::Int(1000),
                Tok::Float(2.5),
                Tok::Float(1000.0),
                Tok::Int(97),
                Tok::Int(10),
                Tok::Semi,
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn string_escapes_are_decoded() {
        assert_eq!(kinds(r#""a\tb\"cé""#)[0], Tok::Str("a\tb\"c\u{e9}".into()));
    }

    #[test]
    fn comments_are_skipped_and_block_comment_ends_line() {
        assert_eq!(
            kinds("x /* one\ntwo */ y // tail"),
            vec![
                Tok::Ident("x".into()),
                Tok::Semi,
                Tok::Ident("y".into()),
                Tok::Semi,
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_string_is_a_syntax_error() {
        let err = tokenize("\"abc\n").unwrap_err();
        assert!(err.to_string().contains("string literal not terminated"));
    }

    #[test]
    fn reports_positions() {
        let toks = tokenize("a\n  b").unwrap();
        assert_eq!(toks[0].pos, Pos::new(1, 1));
        assert_eq!(toks[2].pos, Pos::new(2, 3));
    }
}
