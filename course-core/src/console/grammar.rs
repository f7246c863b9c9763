#![allow(clippy::module_name_repetitions)]

//! Lexer and parser for the tuning console.
//!
//! The lexer uses `regal` to produce a bounded token stream, and the parser
//! walks that stream with `winnow` combinators to build [`Command`] values.
//! Parameter names are resolved while parsing so typos surface with a span.

use core::fmt;
use core::ops::Range;
use core::time::Duration;

use heapless::Vec as HeaplessVec;
use regal::IncrementalError;
use regal::TokenCache;
use regal_macros::RegalLexer;
#[allow(deprecated)]
use winnow::error::ErrorKind;
use winnow::error::{ErrMode, ParserError};
use winnow::prelude::*;
use winnow::stream::Stream;

use super::catalog::{self, CommandTag};
use super::params::{Param, Value};

/// Maximum number of tokens produced per console line.
pub const MAX_TOKENS: usize = 16;
const MAX_CACHE_RECORDS: usize = MAX_TOKENS * 2;

/// Lexical token kinds recognized by the console grammar.
#[derive(RegalLexer, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TokenKind {
    /// Duration literal ending in `ms` or `s`.
    #[regex(r"[0-9]+(?:ms|s)", priority = 2)]
    Duration,
    /// Decimal literal with a fractional part.
    #[regex(r"[0-9]+\.[0-9]+", priority = 2)]
    Decimal,
    /// Unsuffixed integer literal.
    #[regex(r"[0-9]+")]
    Integer,
    /// Command keyword, parameter name or help topic.
    #[regex(r"[A-Za-z][A-Za-z0-9-]*")]
    Ident,
    #[token("=")]
    Equals,
    #[regex(r"[ \t]+", skip)]
    Whitespace,
    #[token("\r\n")]
    #[token("\n")]
    #[token("\r")]
    Eol,
    /// Anything the console does not understand.
    #[default]
    #[regex(r".", priority = 1024)]
    Error,
}

/// One lexeme and where it sits in the line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    pub span: Range<usize>,
}

/// Tokens for one console line.
pub type TokenBuffer<'a> = HeaplessVec<Token<'a>, MAX_TOKENS>;

/// Lexing failures. Unknown characters are not errors here; they surface as
/// [`TokenKind::Error`] tokens and are rejected by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LexError {
    /// The line holds more than [`MAX_TOKENS`] tokens.
    LineTooLong,
    Engine,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::LineTooLong => write!(f, "line longer than {MAX_TOKENS} tokens"),
            LexError::Engine => f.write_str("tokenizer failed"),
        }
    }
}

/// Literal kinds a `set` or `step` argument can be.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Literal {
    Integer,
    Decimal,
    Duration,
}

impl Literal {
    const fn name(self) -> &'static str {
        match self {
            Literal::Integer => "integer",
            Literal::Decimal => "decimal",
            Literal::Duration => "duration",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrammarErrorKind<'a> {
    UnexpectedToken {
        expected: &'static str,
        found: &'a str,
        span: Range<usize>,
    },
    UnexpectedEnd {
        expected: &'static str,
    },
    UnknownParameter {
        span: Range<usize>,
        lexeme: &'a str,
    },
    BadLiteral {
        literal: Literal,
        span: Range<usize>,
    },
    StrayCharacter {
        span: Range<usize>,
        lexeme: &'a str,
    },
}

impl fmt::Display for GrammarErrorKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarErrorKind::UnexpectedToken {
                expected,
                found,
                span,
            } => write!(f, "col {}: wanted {expected}, got `{found}`", span.start + 1),
            GrammarErrorKind::UnexpectedEnd { expected } => {
                write!(f, "line ended before {expected}")
            }
            GrammarErrorKind::UnknownParameter { span, lexeme } => {
                write!(f, "col {}: no parameter named `{lexeme}`", span.start + 1)
            }
            GrammarErrorKind::BadLiteral { literal, span } => {
                write!(f, "col {}: {} out of range", span.start + 1, literal.name())
            }
            GrammarErrorKind::StrayCharacter { span, lexeme } => {
                write!(f, "col {}: stray `{lexeme}`", span.start + 1)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrammarError<'a> {
    pub kind: GrammarErrorKind<'a>,
}

impl fmt::Display for GrammarError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl<'a> From<GrammarErrorKind<'a>> for GrammarError<'a> {
    fn from(kind: GrammarErrorKind<'a>) -> Self {
        Self { kind }
    }
}

impl<'a> GrammarError<'a> {
    fn unexpected(expected: &'static str, token: Option<&Token<'a>>) -> Self {
        match token {
            Some(token) => GrammarErrorKind::UnexpectedToken {
                expected,
                found: token.lexeme,
                span: token.span.clone(),
            },
            None => GrammarErrorKind::UnexpectedEnd { expected },
        }
        .into()
    }

    fn bad_literal(literal: Literal, token: &Token<'a>) -> Self {
        GrammarErrorKind::BadLiteral {
            literal,
            span: token.span.clone(),
        }
        .into()
    }
}

type Input<'src, 'slice> = &'slice [Token<'src>];

#[allow(deprecated)]
impl<'src, 'slice> ParserError<Input<'src, 'slice>> for GrammarError<'src>
where
    'src: 'slice,
{
    fn from_error_kind(input: &Input<'src, 'slice>, _kind: ErrorKind) -> Self {
        GrammarError::unexpected("token", input.first())
    }

    fn append(
        self,
        _input: &Input<'src, 'slice>,
        _token_start: &<Input<'src, 'slice> as Stream>::Checkpoint,
        _kind: ErrorKind,
    ) -> Self {
        self
    }

    fn or(self, other: Self) -> Self {
        other
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError<'a> {
    Lex(LexError),
    Grammar(GrammarError<'a>),
}

impl fmt::Display for ParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Lex(err) => err.fmt(f),
            ParseError::Grammar(err) => err.fmt(f),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command<'a> {
    Status,
    Show(Option<Param>),
    Set(SetCommand),
    Step(StepCommand),
    Run,
    Reset,
    Help(HelpCommand<'a>),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SetCommand {
    pub param: Param,
    pub value: Value,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepCommand {
    pub ticks: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HelpCommand<'a> {
    pub topic: Option<&'a str>,
}

/// Splits `line` into tokens, dropping whitespace.
pub fn lex(line: &str) -> Result<TokenBuffer<'_>, LexError> {
    let compiled = TokenKind::lexer();
    let mut cache: TokenCache<TokenKind, MAX_CACHE_RECORDS> = TokenCache::new();
    let partial = cache
        .rebuild(compiled, line)
        .map_err(map_incremental_error)?;
    let mut buffer = TokenBuffer::new();

    for record in cache.tokens() {
        if record.skipped {
            continue;
        }
        let span = record.start..record.end;
        push_token(&mut buffer, record.token, &line[span.clone()], span)?;
    }

    if let Some(partial) = partial.filter(|partial| !partial.fragment.is_empty()) {
        let span = partial.start..partial.start + partial.fragment.len();
        push_token(&mut buffer, TokenKind::Error, partial.fragment, span)?;
    }

    Ok(buffer)
}

fn push_token<'a>(
    buffer: &mut TokenBuffer<'a>,
    kind: TokenKind,
    lexeme: &'a str,
    span: Range<usize>,
) -> Result<(), LexError> {
    buffer
        .push(Token { kind, lexeme, span })
        .map_err(|_| LexError::LineTooLong)
}

fn map_incremental_error(error: IncrementalError) -> LexError {
    match error {
        IncrementalError::TokenOverflow => LexError::LineTooLong,
        _ => LexError::Engine,
    }
}

/// Parses one console line into a [`Command`].
pub fn parse(line: &str) -> Result<Command<'_>, ParseError<'_>> {
    let tokens = lex(line).map_err(ParseError::Lex)?;

    if let Some(token) = tokens.iter().find(|token| token.kind == TokenKind::Error) {
        return Err(ParseError::Grammar(
            GrammarErrorKind::StrayCharacter {
                span: token.span.clone(),
                lexeme: token.lexeme,
            }
            .into(),
        ));
    }

    let mut input = tokens.as_slice();
    let command = match command().parse_next(&mut input) {
        Ok(command) => command,
        Err(ErrMode::Backtrack(err) | ErrMode::Cut(err)) => {
            return Err(ParseError::Grammar(err));
        }
        Err(ErrMode::Incomplete(_)) => {
            return Err(ParseError::Grammar(GrammarError::unexpected(
                "token",
                input.first(),
            )));
        }
    };

    match input.iter().find(|token| token.kind != TokenKind::Eol) {
        Some(token) => Err(ParseError::Grammar(GrammarError::unexpected(
            "end of command",
            Some(token),
        ))),
        None => Ok(command),
    }
}

fn command<'src, 'slice>() -> impl Parser<Input<'src, 'slice>, Command<'src>, GrammarError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| {
        let snapshot = *input;
        let keyword = expect_kind(TokenKind::Ident, "command keyword").parse_next(input)?;

        let Some(spec) = catalog::find(keyword.lexeme) else {
            *input = snapshot;
            return Err(ErrMode::Backtrack(GrammarError::unexpected(
                "command keyword",
                Some(&keyword),
            )));
        };

        match spec.tag {
            CommandTag::Status => Ok(Command::Status),
            CommandTag::Run => Ok(Command::Run),
            CommandTag::Reset => Ok(Command::Reset),
            CommandTag::Show => {
                let param = match optional_ident(input) {
                    Some(token) => Some(resolve_param(&token)?),
                    None => None,
                };
                Ok(Command::Show(param))
            }
            CommandTag::Set => {
                let name = expect_kind(TokenKind::Ident, "parameter").parse_next(input)?;
                let param = resolve_param(&name)?;
                if let Some((token, rest)) = input.split_first()
                    && token.kind == TokenKind::Equals
                {
                    *input = rest;
                }
                let value = value(input)?;
                Ok(Command::Set(SetCommand { param, value }))
            }
            CommandTag::Step => {
                let ticks = match input.split_first() {
                    Some((token, rest)) if token.kind == TokenKind::Integer => {
                        *input = rest;
                        Some(parse_integer(token).map_err(ErrMode::Cut)?)
                    }
                    _ => None,
                };
                Ok(Command::Step(StepCommand { ticks }))
            }
            CommandTag::Help => Ok(Command::Help(HelpCommand {
                topic: optional_ident(input).map(|token| token.lexeme),
            })),
        }
    }
}

fn optional_ident<'src>(input: &mut Input<'src, '_>) -> Option<Token<'src>> {
    match input.split_first() {
        Some((token, rest)) if token.kind == TokenKind::Ident => {
            *input = rest;
            Some(token.clone())
        }
        _ => None,
    }
}

fn resolve_param<'a>(token: &Token<'a>) -> Result<Param, ErrMode<GrammarError<'a>>> {
    Param::find(token.lexeme).ok_or_else(|| {
        ErrMode::Cut(
            GrammarErrorKind::UnknownParameter {
                span: token.span.clone(),
                lexeme: token.lexeme,
            }
            .into(),
        )
    })
}

fn value<'src>(input: &mut Input<'src, '_>) -> Result<Value, ErrMode<GrammarError<'src>>> {
    let Some((token, rest)) = input.split_first() else {
        return Err(ErrMode::Backtrack(GrammarError::unexpected("value", None)));
    };
    let parsed = match token.kind {
        TokenKind::Integer => parse_integer(token).map(Value::Integer),
        TokenKind::Decimal => parse_decimal(token).map(Value::Decimal),
        TokenKind::Duration => parse_duration(token).map(Value::Duration),
        _ => {
            return Err(ErrMode::Backtrack(GrammarError::unexpected(
                "value",
                Some(token),
            )));
        }
    };
    *input = rest;
    parsed.map_err(ErrMode::Cut)
}

fn expect_kind<'src, 'slice>(
    kind: TokenKind,
    label: &'static str,
) -> impl Parser<Input<'src, 'slice>, Token<'src>, GrammarError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| match input.split_first() {
        Some((token, rest)) if token.kind == kind => {
            *input = rest;
            Ok(token.clone())
        }
        Some((token, _)) => Err(ErrMode::Backtrack(GrammarError::unexpected(
            label,
            Some(token),
        ))),
        None => Err(ErrMode::Backtrack(GrammarError::unexpected(label, None))),
    }
}

fn parse_integer<'a>(token: &Token<'a>) -> Result<u32, GrammarError<'a>> {
    token
        .lexeme
        .parse::<u32>()
        .map_err(|_| GrammarError::bad_literal(Literal::Integer, token))
}

fn parse_decimal<'a>(token: &Token<'a>) -> Result<f32, GrammarError<'a>> {
    match token.lexeme.parse::<f32>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(GrammarError::bad_literal(Literal::Decimal, token)),
    }
}

/// Durations are whole milliseconds (`250ms`) or whole seconds (`2s`).
fn parse_duration<'a>(token: &Token<'a>) -> Result<Duration, GrammarError<'a>> {
    let (digits, scale) = match token.lexeme.strip_suffix("ms") {
        Some(digits) => (digits, 1),
        None => (token.lexeme.trim_end_matches('s'), 1_000),
    };
    digits
        .parse::<u64>()
        .ok()
        .and_then(|count| count.checked_mul(scale))
        .map(Duration::from_millis)
        .ok_or_else(|| GrammarError::bad_literal(Literal::Duration, token))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(input: &str) -> Command<'_> {
        parse(input).expect("command should parse")
    }

    #[test]
    fn parses_bare_commands() {
        assert_eq!(parse_ok("status"), Command::Status);
        assert_eq!(parse_ok("run\n"), Command::Run);
        assert_eq!(parse_ok("RESET"), Command::Reset);
    }

    #[test]
    fn parses_show_with_and_without_param() {
        assert_eq!(parse_ok("show"), Command::Show(None));
        assert_eq!(
            parse_ok("show bottom-detect"),
            Command::Show(Some(Param::BottomDetect))
        );
    }

    #[test]
    fn parses_set_with_each_literal_kind() {
        assert_eq!(
            parse_ok("set reject 24.5"),
            Command::Set(SetCommand {
                param: Param::Reject,
                value: Value::Decimal(24.5),
            })
        );
        assert_eq!(
            parse_ok("set cup = 12"),
            Command::Set(SetCommand {
                param: Param::Cup,
                value: Value::Integer(12),
            })
        );
        assert_eq!(
            parse_ok("set grab 2s"),
            Command::Set(SetCommand {
                param: Param::Grab,
                value: Value::Duration(Duration::from_secs(2)),
            })
        );
        assert_eq!(
            parse_ok("set tick 20ms"),
            Command::Set(SetCommand {
                param: Param::TickPeriod,
                value: Value::Duration(Duration::from_millis(20)),
            })
        );
    }

    #[test]
    fn parses_step_count() {
        assert_eq!(
            parse_ok("step"),
            Command::Step(StepCommand { ticks: None })
        );
        assert_eq!(
            parse_ok("step 25"),
            Command::Step(StepCommand { ticks: Some(25) })
        );
    }

    #[test]
    fn parses_help_topic() {
        assert_eq!(
            parse_ok("help set"),
            Command::Help(HelpCommand { topic: Some("set") })
        );
    }

    #[test]
    fn unknown_parameter_is_reported_with_span() {
        match parse("set warp 9") {
            Err(ParseError::Grammar(GrammarError {
                kind: GrammarErrorKind::UnknownParameter { span, lexeme },
            })) => {
                assert_eq!(lexeme, "warp");
                assert_eq!(span, 4..8);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn set_without_value_fails() {
        assert!(matches!(
            parse("set cup"),
            Err(ParseError::Grammar(GrammarError {
                kind: GrammarErrorKind::UnexpectedEnd { expected: "value" },
            }))
        ));
    }

    #[test]
    fn oversized_literals_are_rejected() {
        assert!(matches!(
            parse("step 99999999999"),
            Err(ParseError::Grammar(GrammarError {
                kind: GrammarErrorKind::BadLiteral {
                    literal: Literal::Integer,
                    ..
                },
            }))
        ));
        assert!(parse("set grab 99999999999999999999s").is_err());
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        assert!(parse("status now").is_err());
        assert!(parse("launch").is_err());
    }

    #[test]
    fn lexer_emits_error_token_for_unknown_symbol() {
        let tokens = lex("step 3$").expect("lexing should succeed");
        let last = tokens.last().expect("expected at least one token");
        assert_eq!(last.kind, TokenKind::Error);
        assert_eq!(last.lexeme, "$");
    }
}
