//! Main lexer implementation for the Simple language.
//!
//! The lexer is direct-coded: `next_token` dispatches on the first
//! character to a `lex_*` helper per token family. Multi-character
//! punctuators are matched maximal-munch, so `<<=` wins over `<<` and
//! `<`, and `..` keeps `0..10` from lexing as a float.

use simplec_util::{Diag, DiagResult, Pos};

use crate::cursor::Cursor;
use crate::token::{keyword_from_ident, Token, TokenKind};

/// Lexes an entire source file into a token sequence ending in
/// [`TokenKind::End`].
///
/// # Examples
///
/// ```
/// use simplec_lex::{lex, TokenKind};
///
/// let tokens = lex("x : i32 = 42;").unwrap();
/// assert_eq!(tokens[0].kind, TokenKind::Identifier);
/// assert_eq!(tokens[0].text, "x");
/// assert_eq!(tokens.last().unwrap().kind, TokenKind::End);
/// ```
pub fn lex(source: &str) -> DiagResult<Vec<Token>> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::End;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

/// The lexer state machine.
pub struct Lexer<'a> {
    /// Character cursor over the source.
    cursor: Cursor<'a>,

    /// Position of the first byte of the current token.
    token_pos: Pos,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            cursor: Cursor::new(source),
            token_pos: Pos::new(1, 1),
        }
    }

    /// Scans and returns the next token.
    pub fn next_token(&mut self) -> DiagResult<Token> {
        self.skip_whitespace_and_comments()?;

        self.token_pos = self.cursor.pos();
        if self.cursor.is_at_end() {
            return Ok(self.token(TokenKind::End));
        }

        match self.cursor.current_char() {
            '(' => Ok(self.single(TokenKind::LParen)),
            ')' => Ok(self.single(TokenKind::RParen)),
            '{' => Ok(self.single(TokenKind::LBrace)),
            '}' => Ok(self.single(TokenKind::RBrace)),
            '[' => Ok(self.single(TokenKind::LBracket)),
            ']' => Ok(self.single(TokenKind::RBracket)),
            ',' => Ok(self.single(TokenKind::Comma)),
            ';' => Ok(self.single(TokenKind::Semicolon)),
            '@' => Ok(self.single(TokenKind::At)),

            '+' => Ok(self.lex_plus()),
            '-' => Ok(self.lex_minus()),
            '*' => Ok(self.lex_star()),
            '/' => Ok(self.lex_slash()),
            '%' => Ok(self.lex_percent()),
            '=' => Ok(self.lex_equals()),
            '!' => Ok(self.lex_bang()),
            '<' => Ok(self.lex_less()),
            '>' => Ok(self.lex_greater()),
            '&' => Ok(self.lex_ampersand()),
            '|' => Ok(self.lex_pipe()),
            '^' => Ok(self.lex_caret()),
            ':' => Ok(self.lex_colon()),
            '.' => Ok(self.lex_dot()),

            '"' => self.lex_string(),
            '\'' => self.lex_char(),

            c if is_ident_start(c) => Ok(self.lex_identifier()),
            c if c.is_ascii_digit() => self.lex_number(),

            c => Err(self.error(format!("unexpected character '{}'", c))),
        }
    }

    /// Consumes whitespace, `// ...` line comments, and `/* ... */`
    /// block comments (non-nesting).
    fn skip_whitespace_and_comments(&mut self) -> DiagResult<()> {
        loop {
            match self.cursor.current_char() {
                ' ' | '\t' | '\r' | '\n' => self.cursor.advance(),
                '/' if self.cursor.char_at(1) == '/' => {
                    while !self.cursor.is_at_end() && self.cursor.current_char() != '\n' {
                        self.cursor.advance();
                    }
                }
                '/' if self.cursor.char_at(1) == '*' => {
                    let open_pos = self.cursor.pos();
                    self.cursor.advance();
                    self.cursor.advance();
                    loop {
                        if self.cursor.is_at_end() {
                            return Err(Diag::new(open_pos, "unterminated block comment"));
                        }
                        if self.cursor.current_char() == '*' && self.cursor.char_at(1) == '/' {
                            self.cursor.advance();
                            self.cursor.advance();
                            break;
                        }
                        self.cursor.advance();
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn lex_identifier(&mut self) -> Token {
        let start = self.cursor.position();
        while is_ident_continue(self.cursor.current_char()) {
            self.cursor.advance();
        }
        let text = self.cursor.slice(start, self.cursor.position());
        match keyword_from_ident(text) {
            Some(kind) => self.token(kind),
            None => Token::with_text(TokenKind::Identifier, text, self.token_pos),
        }
    }

    fn lex_number(&mut self) -> DiagResult<Token> {
        let start = self.cursor.position();
        if self.cursor.current_char() == '0'
            && matches!(self.cursor.char_at(1), 'x' | 'X')
        {
            self.cursor.advance();
            self.cursor.advance();
            let digits_start = self.cursor.position();
            while self.cursor.current_char().is_ascii_hexdigit() {
                self.cursor.advance();
            }
            if self.cursor.position() == digits_start
                || is_ident_continue(self.cursor.current_char())
            {
                return Err(self.error("invalid hex escape"));
            }
            let text = self.cursor.slice(start, self.cursor.position());
            return Ok(Token::with_text(TokenKind::Integer, text, self.token_pos));
        }
        if self.cursor.current_char() == '0'
            && matches!(self.cursor.char_at(1), 'b' | 'B')
        {
            self.cursor.advance();
            self.cursor.advance();
            let digits_start = self.cursor.position();
            while matches!(self.cursor.current_char(), '0' | '1') {
                self.cursor.advance();
            }
            if self.cursor.position() == digits_start
                || is_ident_continue(self.cursor.current_char())
            {
                return Err(self.error("invalid binary literal"));
            }
            let text = self.cursor.slice(start, self.cursor.position());
            return Ok(Token::with_text(TokenKind::Integer, text, self.token_pos));
        }

        while self.cursor.current_char().is_ascii_digit() {
            self.cursor.advance();
        }

        // A fractional part needs a digit right after the dot; `0..10`
        // stays Integer DotDot Integer.
        let mut is_float = false;
        if self.cursor.current_char() == '.' && self.cursor.char_at(1).is_ascii_digit() {
            is_float = true;
            self.cursor.advance();
            while self.cursor.current_char().is_ascii_digit() {
                self.cursor.advance();
            }
        }
        if is_float && matches!(self.cursor.current_char(), 'e' | 'E') {
            self.cursor.advance();
            if matches!(self.cursor.current_char(), '+' | '-') {
                self.cursor.advance();
            }
            if !self.cursor.current_char().is_ascii_digit() {
                return Err(self.error("invalid float literal"));
            }
            while self.cursor.current_char().is_ascii_digit() {
                self.cursor.advance();
            }
        }

        let text = self.cursor.slice(start, self.cursor.position());
        let kind = if is_float {
            TokenKind::Float
        } else {
            TokenKind::Integer
        };
        Ok(Token::with_text(kind, text, self.token_pos))
    }

    fn lex_string(&mut self) -> DiagResult<Token> {
        self.cursor.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.cursor.current_char() {
                '"' => {
                    self.cursor.advance();
                    return Ok(Token::with_text(TokenKind::String, value, self.token_pos));
                }
                '\0' if self.cursor.is_at_end() => {
                    return Err(self.error("unterminated string literal"));
                }
                '\n' => return Err(self.error("unterminated string literal")),
                '\\' => value.push(self.lex_escape("invalid string escape")?),
                c => {
                    value.push(c);
                    self.cursor.advance();
                }
            }
        }
    }

    fn lex_char(&mut self) -> DiagResult<Token> {
        self.cursor.advance(); // opening quote
        let value = match self.cursor.current_char() {
            '\0' if self.cursor.is_at_end() => {
                return Err(self.error("unterminated char literal"));
            }
            '\'' => {
                return Err(self.error("char literal must contain exactly one character"));
            }
            '\n' => return Err(self.error("unterminated char literal")),
            '\\' => self.lex_escape("invalid char escape")?,
            c => {
                self.cursor.advance();
                c
            }
        };
        if !self.cursor.eat('\'') {
            if self.cursor.is_at_end() {
                return Err(self.error("unterminated char literal"));
            }
            return Err(self.error("char literal must contain exactly one character"));
        }
        Ok(Token::with_text(
            TokenKind::Char,
            value.to_string(),
            self.token_pos,
        ))
    }

    /// Decodes one backslash escape. `error_kind` distinguishes the
    /// string and char diagnostic texts.
    fn lex_escape(&mut self, error_kind: &str) -> DiagResult<char> {
        self.cursor.advance(); // backslash
        let c = self.cursor.current_char();
        self.cursor.advance();
        match c {
            'n' => Ok('\n'),
            'r' => Ok('\r'),
            't' => Ok('\t'),
            '"' => Ok('"'),
            '\'' => Ok('\''),
            '\\' => Ok('\\'),
            'x' => {
                let hi = self.cursor.current_char();
                self.cursor.advance();
                let lo = self.cursor.current_char();
                self.cursor.advance();
                match (hi.to_digit(16), lo.to_digit(16)) {
                    (Some(hi), Some(lo)) => Ok(char::from((hi * 16 + lo) as u8)),
                    _ => Err(self.error(error_kind)),
                }
            }
            _ => Err(self.error(error_kind)),
        }
    }

    fn lex_plus(&mut self) -> Token {
        self.cursor.advance();
        if self.cursor.eat('+') {
            self.token(TokenKind::PlusPlus)
        } else if self.cursor.eat('=') {
            self.token(TokenKind::PlusAssign)
        } else {
            self.token(TokenKind::Plus)
        }
    }

    fn lex_minus(&mut self) -> Token {
        self.cursor.advance();
        if self.cursor.eat('-') {
            self.token(TokenKind::MinusMinus)
        } else if self.cursor.eat('=') {
            self.token(TokenKind::MinusAssign)
        } else {
            self.token(TokenKind::Minus)
        }
    }

    fn lex_star(&mut self) -> Token {
        self.cursor.advance();
        if self.cursor.eat('=') {
            self.token(TokenKind::StarAssign)
        } else {
            self.token(TokenKind::Star)
        }
    }

    fn lex_slash(&mut self) -> Token {
        // Comments were consumed by skip_whitespace_and_comments.
        self.cursor.advance();
        if self.cursor.eat('=') {
            self.token(TokenKind::SlashAssign)
        } else {
            self.token(TokenKind::Slash)
        }
    }

    fn lex_percent(&mut self) -> Token {
        self.cursor.advance();
        if self.cursor.eat('=') {
            self.token(TokenKind::PercentAssign)
        } else {
            self.token(TokenKind::Percent)
        }
    }

    fn lex_equals(&mut self) -> Token {
        self.cursor.advance();
        if self.cursor.eat('=') {
            self.token(TokenKind::EqEq)
        } else {
            self.token(TokenKind::Assign)
        }
    }

    fn lex_bang(&mut self) -> Token {
        self.cursor.advance();
        if self.cursor.eat('=') {
            self.token(TokenKind::NotEq)
        } else {
            self.token(TokenKind::Not)
        }
    }

    fn lex_less(&mut self) -> Token {
        self.cursor.advance();
        if self.cursor.current_char() == '<' {
            self.cursor.advance();
            if self.cursor.eat('=') {
                self.token(TokenKind::ShlAssign)
            } else {
                self.token(TokenKind::Shl)
            }
        } else if self.cursor.eat('=') {
            self.token(TokenKind::LtEq)
        } else {
            self.token(TokenKind::Lt)
        }
    }

    fn lex_greater(&mut self) -> Token {
        self.cursor.advance();
        if self.cursor.current_char() == '>' {
            self.cursor.advance();
            if self.cursor.eat('=') {
                self.token(TokenKind::ShrAssign)
            } else {
                self.token(TokenKind::Shr)
            }
        } else if self.cursor.eat('=') {
            self.token(TokenKind::GtEq)
        } else {
            self.token(TokenKind::Gt)
        }
    }

    fn lex_ampersand(&mut self) -> Token {
        self.cursor.advance();
        if self.cursor.eat('&') {
            self.token(TokenKind::AndAnd)
        } else if self.cursor.eat('=') {
            self.token(TokenKind::AmpAssign)
        } else {
            self.token(TokenKind::Amp)
        }
    }

    fn lex_pipe(&mut self) -> Token {
        self.cursor.advance();
        if self.cursor.eat('|') {
            self.token(TokenKind::OrOr)
        } else if self.cursor.eat('=') {
            self.token(TokenKind::PipeAssign)
        } else if self.cursor.eat('>') {
            self.token(TokenKind::PipeGreater)
        } else {
            self.token(TokenKind::Pipe)
        }
    }

    fn lex_caret(&mut self) -> Token {
        self.cursor.advance();
        if self.cursor.eat('=') {
            self.token(TokenKind::CaretAssign)
        } else {
            self.token(TokenKind::Caret)
        }
    }

    fn lex_colon(&mut self) -> Token {
        self.cursor.advance();
        if self.cursor.eat(':') {
            self.token(TokenKind::DoubleColon)
        } else {
            self.token(TokenKind::Colon)
        }
    }

    fn lex_dot(&mut self) -> Token {
        self.cursor.advance();
        if self.cursor.eat('.') {
            self.token(TokenKind::DotDot)
        } else {
            self.token(TokenKind::Dot)
        }
    }

    fn single(&mut self, kind: TokenKind) -> Token {
        self.cursor.advance();
        self.token(kind)
    }

    fn token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.token_pos)
    }

    fn error(&self, message: impl Into<String>) -> Diag {
        Diag::new(self.token_pos, message)
    }
}

#[inline]
fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

#[inline]
fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_lexes_keywords_and_ops() {
        assert_eq!(
            kinds("fn main :: void() { return; }"),
            vec![
                TokenKind::KwFn,
                TokenKind::Identifier,
                TokenKind::DoubleColon,
                TokenKind::Identifier,
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBrace,
                TokenKind::KwReturn,
                TokenKind::Semicolon,
                TokenKind::RBrace,
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn test_lexes_range_without_float() {
        assert_eq!(
            kinds("0..10"),
            vec![
                TokenKind::Integer,
                TokenKind::DotDot,
                TokenKind::Integer,
                TokenKind::End
            ]
        );
    }

    #[test]
    fn test_lexes_literals() {
        let tokens = lex("x : i32 = 42; h : i32 = 0x2A; b : i32 = 0b1010; y : f32 = 3.5; s : string = \"hi\\n\"; c : char = '\\n';").unwrap();
        assert!(tokens
            .iter()
            .any(|t| t.kind == TokenKind::Integer && t.text == "0x2A"));
        assert!(tokens
            .iter()
            .any(|t| t.kind == TokenKind::Integer && t.text == "0b1010"));
        assert!(tokens
            .iter()
            .any(|t| t.kind == TokenKind::Float && t.text == "3.5"));
        assert!(tokens
            .iter()
            .any(|t| t.kind == TokenKind::String && t.text == "hi\n"));
        assert!(tokens
            .iter()
            .any(|t| t.kind == TokenKind::Char && t.text == "\n"));
    }

    #[test]
    fn test_float_exponent() {
        let tokens = lex("2.5e-3 1.0E4").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Float);
        assert_eq!(tokens[0].text, "2.5e-3");
        assert_eq!(tokens[1].text, "1.0E4");
    }

    #[test]
    fn test_rejects_invalid_hex() {
        let err = lex("x : i32 = 0xZZ;").unwrap_err();
        assert!(err.message.contains("invalid hex escape"));
        assert_eq!(err.pos.line, 1);
        assert_eq!(err.pos.column, 11);
    }

    #[test]
    fn test_rejects_invalid_binary() {
        let err = lex("x : i32 = 0b2;").unwrap_err();
        assert!(err.message.contains("invalid binary literal"));
    }

    #[test]
    fn test_rejects_invalid_string_escape() {
        let err = lex("x : string = \"hi\\q\";").unwrap_err();
        assert!(err.message.contains("invalid string escape"));
    }

    #[test]
    fn test_rejects_invalid_char_escape() {
        let err = lex("x : char = '\\q';").unwrap_err();
        assert!(err.message.contains("invalid char escape"));
    }

    #[test]
    fn test_hex_byte_escape() {
        let tokens = lex("\"\\x41\" '\\x0A'").unwrap();
        assert_eq!(tokens[0].text, "A");
        assert_eq!(tokens[1].text, "\n");
    }

    #[test]
    fn test_rejects_multi_char_literal() {
        let err = lex("c : char = 'ab';").unwrap_err();
        assert!(err.message.contains("exactly one character"));
    }

    #[test]
    fn test_rejects_unterminated_string() {
        let err = lex("s : string = \"oops").unwrap_err();
        assert!(err.message.contains("unterminated string literal"));
    }

    #[test]
    fn test_rejects_unexpected_character() {
        let err = lex("x : i32 = #;").unwrap_err();
        assert!(err.message.contains("unexpected character '#'"));
    }

    #[test]
    fn test_maximal_munch_shifts_and_assigns() {
        assert_eq!(
            kinds("<<= >>= << >> <= >= |> || |= |"),
            vec![
                TokenKind::ShlAssign,
                TokenKind::ShrAssign,
                TokenKind::Shl,
                TokenKind::Shr,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::PipeGreater,
                TokenKind::OrOr,
                TokenKind::PipeAssign,
                TokenKind::Pipe,
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("a // line comment\n/* block\ncomment */ b"),
            vec![TokenKind::Identifier, TokenKind::Identifier, TokenKind::End]
        );
    }

    #[test]
    fn test_unterminated_block_comment() {
        let err = lex("a /* never closed").unwrap_err();
        assert!(err.message.contains("unterminated block comment"));
    }

    #[test]
    fn test_positions_are_one_based() {
        let tokens = lex("a\n  b").unwrap();
        assert_eq!(tokens[0].pos, simplec_util::Pos::new(1, 1));
        assert_eq!(tokens[1].pos, simplec_util::Pos::new(2, 3));
    }
}
