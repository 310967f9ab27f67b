use jtl_source::Diagnostic;
use jtl_source::DiagnosticKind;
use jtl_source::Position;
use jtl_source::Span;

use crate::recovery::skip_to_sync;
use crate::tokens::Token;
use crate::tokens::TokenKind;

const BLOCK_TAG_START: &str = "{%";
const BLOCK_TAG_END: &str = "%}";
const VARIABLE_TAG_START: &str = "{{";
const VARIABLE_TAG_END: &str = "}}";
const COMMENT_TAG_START: &str = "{#";
const COMMENT_TAG_END: &str = "#}";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Delimiter {
    Variable,
    Block,
}

impl Delimiter {
    fn closer(self) -> &'static str {
        match self {
            Delimiter::Variable => VARIABLE_TAG_END,
            Delimiter::Block => BLOCK_TAG_END,
        }
    }

    fn start_kind(self, trim: bool) -> TokenKind {
        match self {
            Delimiter::Variable => TokenKind::VariableStart { trim },
            Delimiter::Block => TokenKind::BlockStart { trim },
        }
    }

    fn end_kind(self, trim: bool) -> TokenKind {
        match self {
            Delimiter::Variable => TokenKind::VariableEnd { trim },
            Delimiter::Block => TokenKind::BlockEnd { trim },
        }
    }
}

/// Two-mode scanner turning template source into a flat token stream.
///
/// In text mode it looks for `{{`, `{%` and `{#`; in tag mode it produces
/// names, literals and operators until the matching closer. The lexer never
/// fails: malformed input is reported as diagnostics and the stream is
/// always terminated with [`TokenKind::Eof`]. Concatenating the lexemes of
/// the returned tokens reproduces the source.
pub struct Lexer<'src> {
    source: &'src str,
    cursor: Position,
    tokens: Vec<Token>,
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Lexer<'src> {
    #[must_use]
    pub fn new(source: &'src str) -> Self {
        Lexer {
            source,
            cursor: Position::start(),
            tokens: Vec::with_capacity(source.len() / 4),
            diagnostics: Vec::new(),
        }
    }

    #[must_use]
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        while !self.is_at_end() {
            self.lex_text();
        }

        let eof = Span::point(self.cursor);
        self.tokens.push(Token::new(TokenKind::Eof, "", eof));

        (self.tokens, self.diagnostics)
    }

    fn lex_text(&mut self) {
        let start = self.cursor;
        let opener = self.find_opener(self.offset());

        self.advance_to(opener);
        self.emit(TokenKind::Text, start);

        let rest = self.rest();
        if rest.starts_with(COMMENT_TAG_START) {
            self.lex_comment();
        } else if rest.starts_with(VARIABLE_TAG_START) {
            self.lex_tag(Delimiter::Variable);
        } else if rest.starts_with(BLOCK_TAG_START) {
            self.lex_tag(Delimiter::Block);
        }
    }

    fn lex_comment(&mut self) {
        let start = self.cursor;
        let trim_before = self.rest()[COMMENT_TAG_START.len()..].starts_with('-');
        let body_start = self.offset() + COMMENT_TAG_START.len();

        let (end, trim_after, closed) = match self.source[body_start..].find(COMMENT_TAG_END) {
            Some(index) => {
                let body = &self.source[body_start..body_start + index];
                let end = body_start + index + COMMENT_TAG_END.len();
                (end, body.ends_with('-'), true)
            }
            None => (self.source.len(), false, false),
        };

        self.advance_to(end);
        if !closed {
            self.report(
                DiagnosticKind::UnterminatedComment,
                "unclosed comment; expected '#}'",
                start,
            );
        }
        self.emit(
            TokenKind::Comment {
                trim_before,
                trim_after,
            },
            start,
        );
    }

    fn lex_tag(&mut self, delimiter: Delimiter) {
        let open_start = self.cursor;
        let trim = self.rest()[2..].starts_with('-');
        self.advance_to(self.offset() + 2 + usize::from(trim));
        self.emit(delimiter.start_kind(trim), open_start);

        let closer = delimiter.closer();
        let first_inner = self.tokens.len();
        let mut brackets: Vec<char> = Vec::new();

        loop {
            if self.is_at_end() {
                self.unterminated(delimiter, open_start);
                return;
            }

            let rest = self.rest();
            let may_close = closer != VARIABLE_TAG_END || brackets.last() != Some(&'{');
            if may_close && rest.starts_with('-') && rest[1..].starts_with(closer) {
                let start = self.cursor;
                self.advance_to(self.offset() + 1 + closer.len());
                self.emit(delimiter.end_kind(true), start);
                break;
            }
            if may_close && rest.starts_with(closer) {
                let start = self.cursor;
                self.advance_to(self.offset() + closer.len());
                self.emit(delimiter.end_kind(false), start);
                break;
            }
            if rest.starts_with(VARIABLE_TAG_START)
                || rest.starts_with(BLOCK_TAG_START)
                || rest.starts_with(COMMENT_TAG_START)
            {
                self.unterminated(delimiter, open_start);
                return;
            }

            self.lex_tag_token(closer, &mut brackets);
        }

        if delimiter == Delimiter::Block && self.is_raw_tag(first_inner) {
            self.lex_raw_body();
        }
    }

    fn lex_tag_token(&mut self, closer: &str, brackets: &mut Vec<char>) {
        let start = self.cursor;
        let c = self.peek();

        let kind = match c {
            c if c.is_whitespace() => {
                self.consume_while(char::is_whitespace);
                TokenKind::Whitespace
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                self.consume_while(|c| c.is_ascii_alphanumeric() || c == '_');
                TokenKind::Name
            }
            c if c.is_ascii_digit() => self.lex_number(),
            '\'' | '"' => self.lex_string(c, closer),
            _ => self.lex_operator(brackets),
        };

        if kind == TokenKind::Error {
            let message = format!("unexpected character '{c}'");
            self.report(DiagnosticKind::UnexpectedCharacter, &message, start);
        }
        self.emit(kind, start);
    }

    fn lex_number(&mut self) -> TokenKind {
        self.consume_while(|c| c.is_ascii_digit() || c == '_');
        let mut kind = TokenKind::Integer;

        // `1.` and `x.0` are left to the parser: only a digit after the dot
        // makes this a float literal.
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.consume();
            self.consume_while(|c| c.is_ascii_digit() || c == '_');
            kind = TokenKind::Float;
        }

        if matches!(self.peek(), 'e' | 'E') {
            let next = self.peek_next();
            let signed = matches!(next, '+' | '-') && self.peek_nth(2).is_ascii_digit();
            if next.is_ascii_digit() || signed {
                self.consume();
                if signed {
                    self.consume();
                }
                self.consume_while(|c| c.is_ascii_digit());
                kind = TokenKind::Float;
            }
        }

        kind
    }

    fn lex_string(&mut self, quote: char, closer: &str) -> TokenKind {
        let start = self.cursor;
        let body_start = self.offset() + quote.len_utf8();

        let mut escaped = false;
        let close = self.source[body_start..].char_indices().find_map(|(i, c)| {
            if escaped {
                escaped = false;
                None
            } else if c == '\\' {
                escaped = true;
                None
            } else if c == quote {
                Some(body_start + i + quote.len_utf8())
            } else {
                None
            }
        });

        if let Some(end) = close {
            self.advance_to(end);
        } else {
            // Treat the string as closed right before the tag's own closer.
            let source = self.source;
            let end = skip_to_sync(body_start, source.len(), |i| {
                source.is_char_boundary(i) && source[i..].starts_with(closer)
            });
            self.advance_to(end);
            self.report(
                DiagnosticKind::UnterminatedString,
                format!("unclosed string literal; expected {quote}"),
                start,
            );
        }

        TokenKind::String
    }

    fn lex_operator(&mut self, brackets: &mut Vec<char>) -> TokenKind {
        const TWO_CHAR: &[(&str, TokenKind)] = &[
            ("**", TokenKind::StarStar),
            ("//", TokenKind::SlashSlash),
            ("==", TokenKind::EqEq),
            ("!=", TokenKind::NotEq),
            ("<=", TokenKind::LtEq),
            (">=", TokenKind::GtEq),
        ];

        for (op, kind) in TWO_CHAR {
            if self.rest().starts_with(op) {
                self.advance_to(self.offset() + op.len());
                return *kind;
            }
        }

        let c = self.peek();
        self.consume();
        match c {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '~' => TokenKind::Tilde,
            '<' => TokenKind::Lt,
            '>' => TokenKind::Gt,
            '=' => TokenKind::Assign,
            '.' => TokenKind::Dot,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '|' => TokenKind::Pipe,
            '(' | '[' | '{' => {
                brackets.push(c);
                match c {
                    '(' => TokenKind::LParen,
                    '[' => TokenKind::LBracket,
                    _ => TokenKind::LBrace,
                }
            }
            ')' | ']' | '}' => {
                let open = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                if brackets.last() == Some(&open) {
                    brackets.pop();
                }
                match c {
                    ')' => TokenKind::RParen,
                    ']' => TokenKind::RBracket,
                    _ => TokenKind::RBrace,
                }
            }
            _ => TokenKind::Error,
        }
    }

    /// `{% raw %}` switches off tokenization until the matching `{% endraw %}`.
    fn lex_raw_body(&mut self) {
        let start = self.cursor;
        let source = self.source;
        let offset = self.offset();
        let end = skip_to_sync(offset, source.len(), |i| {
            source.is_char_boundary(i) && is_endraw_at(&source[i..])
        });
        self.advance_to(end);
        self.emit(TokenKind::Text, start);
    }

    fn is_raw_tag(&self, first_inner: usize) -> bool {
        let mut inner = self.tokens[first_inner..]
            .iter()
            .filter(|t| !t.kind().is_trivia() && !t.kind().is_tag_end());
        matches!(inner.next(), Some(t) if t.is_name("raw")) && inner.next().is_none()
    }

    fn unterminated(&mut self, delimiter: Delimiter, open_start: Position) {
        let (kind, message) = match delimiter {
            Delimiter::Variable => (
                DiagnosticKind::UnterminatedExpression,
                "unclosed expression; expected '}}'",
            ),
            Delimiter::Block => (
                DiagnosticKind::UnterminatedBlock,
                "unclosed tag; expected '%}'",
            ),
        };
        self.report(kind, message, open_start);
        let here = self.cursor;
        self.tokens
            .push(Token::new(delimiter.end_kind(false), "", Span::point(here)));
    }

    fn find_opener(&self, from: usize) -> usize {
        let bytes = self.source.as_bytes();
        let mut search = from;
        while let Some(index) = self.source[search..].find('{') {
            let at = search + index;
            if matches!(bytes.get(at + 1), Some(b'{' | b'%' | b'#')) {
                return at;
            }
            search = at + 1;
        }
        self.source.len()
    }

    fn emit(&mut self, kind: TokenKind, start: Position) {
        if start.offset() == self.cursor.offset() {
            return;
        }
        let lexeme = &self.source[start.offset_usize()..self.offset()];
        self.tokens
            .push(Token::new(kind, lexeme, Span::new(start, self.cursor)));
    }

    fn report(&mut self, kind: DiagnosticKind, message: impl Into<String>, start: Position) {
        self.diagnostics
            .push(Diagnostic::new(kind, message, Span::new(start, self.cursor)));
    }

    #[inline]
    fn offset(&self) -> usize {
        self.cursor.offset_usize()
    }

    #[inline]
    fn rest(&self) -> &'src str {
        &self.source[self.offset()..]
    }

    #[inline]
    fn is_at_end(&self) -> bool {
        self.offset() >= self.source.len()
    }

    #[inline]
    fn peek(&self) -> char {
        self.peek_nth(0)
    }

    #[inline]
    fn peek_next(&self) -> char {
        self.peek_nth(1)
    }

    fn peek_nth(&self, n: usize) -> char {
        self.rest().chars().nth(n).unwrap_or('\0')
    }

    #[inline]
    fn consume(&mut self) {
        if let Some(ch) = self.rest().chars().next() {
            self.cursor = self.cursor.advance(ch);
        }
    }

    fn consume_while(&mut self, predicate: impl Fn(char) -> bool) {
        while !self.is_at_end() && predicate(self.peek()) {
            self.consume();
        }
    }

    fn advance_to(&mut self, offset: usize) {
        let offset = offset.min(self.source.len());
        if offset > self.offset() {
            self.cursor = self.cursor.advance_str(&self.source[self.offset()..offset]);
        }
    }
}

fn is_endraw_at(text: &str) -> bool {
    let Some(rest) = text.strip_prefix(BLOCK_TAG_START) else {
        return false;
    };
    let rest = rest.strip_prefix('-').unwrap_or(rest).trim_start();
    let Some(rest) = rest.strip_prefix("endraw") else {
        return false;
    };
    let rest = rest.trim_start();
    let rest = rest.strip_prefix('-').unwrap_or(rest);
    rest.starts_with(BLOCK_TAG_END)
}
