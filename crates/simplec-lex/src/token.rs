//! Token definitions for the Simple language.

use simplec_util::Pos;

/// The closed set of token kinds.
///
/// Keywords are recognized by exact match against the reserved set;
/// every other `[A-Za-z_][A-Za-z0-9_]*` run is an [`Identifier`].
/// Contextual words (`as`, `default`, `Artifact`, `Module`, `Enum`,
/// `callback`) stay identifiers and are matched by text in the parser.
///
/// [`Identifier`]: TokenKind::Identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    // Literals and names
    Identifier,
    Integer,
    Float,
    String,
    Char,

    // Keywords
    KwFn,
    KwReturn,
    KwIf,
    KwElse,
    KwWhile,
    KwFor,
    KwBreak,
    KwSkip,
    KwImport,
    KwExtern,
    KwArtifact,
    KwModule,
    KwEnum,
    KwTrue,
    KwFalse,
    KwSelf,

    // Punctuators
    Colon,
    DoubleColon,
    Dot,
    DotDot,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    At,
    /// `|>` - if-chain branch marker
    PipeGreater,

    // Assignment family
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    AmpAssign,
    PipeAssign,
    CaretAssign,
    ShlAssign,
    ShrAssign,

    // Arithmetic / bitwise
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

    // Comparison / logical
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    AndAnd,
    OrOr,
    Not,

    // Increment / decrement
    PlusPlus,
    MinusMinus,

    /// End-of-input marker; every token sequence ends with exactly one.
    End,
}

impl TokenKind {
    /// Display text used in diagnostics ("expected ';'").
    pub fn display(&self) -> &'static str {
        match self {
            TokenKind::Identifier => "identifier",
            TokenKind::Integer => "integer literal",
            TokenKind::Float => "float literal",
            TokenKind::String => "string literal",
            TokenKind::Char => "char literal",
            TokenKind::KwFn => "fn",
            TokenKind::KwReturn => "return",
            TokenKind::KwIf => "if",
            TokenKind::KwElse => "else",
            TokenKind::KwWhile => "while",
            TokenKind::KwFor => "for",
            TokenKind::KwBreak => "break",
            TokenKind::KwSkip => "skip",
            TokenKind::KwImport => "import",
            TokenKind::KwExtern => "extern",
            TokenKind::KwArtifact => "artifact",
            TokenKind::KwModule => "module",
            TokenKind::KwEnum => "enum",
            TokenKind::KwTrue => "true",
            TokenKind::KwFalse => "false",
            TokenKind::KwSelf => "self",
            TokenKind::Colon => ":",
            TokenKind::DoubleColon => "::",
            TokenKind::Dot => ".",
            TokenKind::DotDot => "..",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Semicolon => ";",
            TokenKind::At => "@",
            TokenKind::PipeGreater => "|>",
            TokenKind::Assign => "=",
            TokenKind::PlusAssign => "+=",
            TokenKind::MinusAssign => "-=",
            TokenKind::StarAssign => "*=",
            TokenKind::SlashAssign => "/=",
            TokenKind::PercentAssign => "%=",
            TokenKind::AmpAssign => "&=",
            TokenKind::PipeAssign => "|=",
            TokenKind::CaretAssign => "^=",
            TokenKind::ShlAssign => "<<=",
            TokenKind::ShrAssign => ">>=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Amp => "&",
            TokenKind::Pipe => "|",
            TokenKind::Caret => "^",
            TokenKind::Shl => "<<",
            TokenKind::Shr => ">>",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::LtEq => "<=",
            TokenKind::Gt => ">",
            TokenKind::GtEq => ">=",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            TokenKind::Not => "!",
            TokenKind::PlusPlus => "++",
            TokenKind::MinusMinus => "--",
            TokenKind::End => "end of input",
        }
    }

    /// Whether this is a reserved keyword token.
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::KwFn
                | TokenKind::KwReturn
                | TokenKind::KwIf
                | TokenKind::KwElse
                | TokenKind::KwWhile
                | TokenKind::KwFor
                | TokenKind::KwBreak
                | TokenKind::KwSkip
                | TokenKind::KwImport
                | TokenKind::KwExtern
                | TokenKind::KwArtifact
                | TokenKind::KwModule
                | TokenKind::KwEnum
                | TokenKind::KwTrue
                | TokenKind::KwFalse
                | TokenKind::KwSelf
        )
    }
}

/// Maps an identifier lexeme to its keyword kind, if reserved.
pub fn keyword_from_ident(text: &str) -> Option<TokenKind> {
    let kind = match text {
        "fn" => TokenKind::KwFn,
        "return" => TokenKind::KwReturn,
        "if" => TokenKind::KwIf,
        "else" => TokenKind::KwElse,
        "while" => TokenKind::KwWhile,
        "for" => TokenKind::KwFor,
        "break" => TokenKind::KwBreak,
        "skip" => TokenKind::KwSkip,
        "import" => TokenKind::KwImport,
        "extern" => TokenKind::KwExtern,
        "artifact" => TokenKind::KwArtifact,
        "module" => TokenKind::KwModule,
        "enum" => TokenKind::KwEnum,
        "true" => TokenKind::KwTrue,
        "false" => TokenKind::KwFalse,
        "self" => TokenKind::KwSelf,
        _ => return None,
    };
    Some(kind)
}

/// One lexical unit with its source position.
///
/// `text` holds the lexeme for identifiers and literals (string and char
/// literals store the *decoded* value); punctuators and keywords leave
/// it empty.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub pos: Pos,
}

impl Token {
    pub fn new(kind: TokenKind, pos: Pos) -> Self {
        Self {
            kind,
            text: String::new(),
            pos,
        }
    }

    pub fn with_text(kind: TokenKind, text: impl Into<String>, pos: Pos) -> Self {
        Self {
            kind,
            text: text.into(),
            pos,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup() {
        assert_eq!(keyword_from_ident("fn"), Some(TokenKind::KwFn));
        assert_eq!(keyword_from_ident("skip"), Some(TokenKind::KwSkip));
        assert_eq!(keyword_from_ident("self"), Some(TokenKind::KwSelf));
        assert_eq!(keyword_from_ident("default"), None);
        assert_eq!(keyword_from_ident("as"), None);
        assert_eq!(keyword_from_ident("Artifact"), None);
    }

    #[test]
    fn test_keyword_kinds_report_keyword() {
        assert!(TokenKind::KwArtifact.is_keyword());
        assert!(!TokenKind::Identifier.is_keyword());
        assert!(!TokenKind::PipeGreater.is_keyword());
    }
}
