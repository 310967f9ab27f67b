use jtl_source::Span;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    /// Literal template text between constructs.
    Text,
    /// A whole `{# ... #}` comment, delimiters included.
    Comment { trim_before: bool, trim_after: bool },
    /// `{{` or `{{-`; `trim` strips whitespace from the preceding text.
    VariableStart { trim: bool },
    /// `}}` or `-}}`; `trim` strips whitespace from the following text.
    VariableEnd { trim: bool },
    /// `{%` or `{%-`.
    BlockStart { trim: bool },
    /// `%}` or `-%}`.
    BlockEnd { trim: bool },

    Name,
    Integer,
    Float,
    String,

    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    SlashSlash,
    Percent,
    Tilde,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Assign,
    Dot,
    Comma,
    Colon,
    Pipe,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,

    /// Whitespace inside a tag. Kept so lexemes reproduce the source.
    Whitespace,
    /// A character the lexer could not place; already reported.
    Error,
    Eof,
}

impl TokenKind {
    /// Whether the parser should never see this token.
    #[must_use]
    pub fn is_trivia(self) -> bool {
        matches!(self, TokenKind::Whitespace | TokenKind::Error)
    }

    /// Whether this token closes a `{{ }}` or `{% %}` construct.
    #[must_use]
    pub fn is_tag_end(self) -> bool {
        matches!(
            self,
            TokenKind::VariableEnd { .. } | TokenKind::BlockEnd { .. }
        )
    }

    /// Whether the following text should lose its leading whitespace.
    #[must_use]
    pub fn trims_after(self) -> bool {
        matches!(
            self,
            TokenKind::VariableEnd { trim: true }
                | TokenKind::BlockEnd { trim: true }
                | TokenKind::Comment {
                    trim_after: true,
                    ..
                }
        )
    }

    /// Whether the preceding text should lose its trailing whitespace.
    #[must_use]
    pub fn trims_before(self) -> bool {
        matches!(
            self,
            TokenKind::VariableStart { trim: true }
                | TokenKind::BlockStart { trim: true }
                | TokenKind::Comment {
                    trim_before: true,
                    ..
                }
        )
    }

    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Text => "text",
            TokenKind::Comment { .. } => "comment",
            TokenKind::VariableStart { .. } => "'{{'",
            TokenKind::VariableEnd { .. } => "'}}'",
            TokenKind::BlockStart { .. } => "'{%'",
            TokenKind::BlockEnd { .. } => "'%}'",
            TokenKind::Name => "name",
            TokenKind::Integer => "integer",
            TokenKind::Float => "float",
            TokenKind::String => "string",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::StarStar => "'**'",
            TokenKind::Slash => "'/'",
            TokenKind::SlashSlash => "'//'",
            TokenKind::Percent => "'%'",
            TokenKind::Tilde => "'~'",
            TokenKind::EqEq => "'=='",
            TokenKind::NotEq => "'!='",
            TokenKind::Lt => "'<'",
            TokenKind::LtEq => "'<='",
            TokenKind::Gt => "'>'",
            TokenKind::GtEq => "'>='",
            TokenKind::Assign => "'='",
            TokenKind::Dot => "'.'",
            TokenKind::Comma => "','",
            TokenKind::Colon => "':'",
            TokenKind::Pipe => "'|'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::Whitespace => "whitespace",
            TokenKind::Error => "invalid character",
            TokenKind::Eof => "end of input",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Token {
    kind: TokenKind,
    lexeme: String,
    span: Span,
}

impl Token {
    #[must_use]
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            span,
        }
    }

    #[must_use]
    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// The exact source text of this token. Synthetic tokens have an empty lexeme.
    #[must_use]
    pub fn lexeme(&self) -> &str {
        &self.lexeme
    }

    #[must_use]
    pub fn span(&self) -> Span {
        self.span
    }

    #[must_use]
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// Whether this is the name token `name`. Keywords are plain names.
    #[must_use]
    pub fn is_name(&self, name: &str) -> bool {
        self.kind == TokenKind::Name && self.lexeme == name
    }

    /// A short human description for diagnostics.
    #[must_use]
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Name | TokenKind::Integer | TokenKind::Float => {
                format!("'{}'", self.lexeme)
            }
            kind => kind.describe().to_string(),
        }
    }
}

/// Decode the body of a string literal lexeme, quotes included.
///
/// Unknown escapes are kept verbatim. A missing closing quote is tolerated;
/// the lexer has already reported it.
#[must_use]
pub fn unescape_string(lexeme: &str) -> String {
    let mut chars = lexeme.chars();
    let Some(quote) = chars.next() else {
        return String::new();
    };
    let body = chars.as_str();
    let body = body.strip_suffix(quote).unwrap_or(body);

    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(c @ ('\\' | '\'' | '"')) => out.push(c),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
