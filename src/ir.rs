//! Textual IR: a parenthesized notation for values
//!
//! Decimal integers, `0x` hex literals, quoted strings, operator keywords and
//! bare words all read as atoms. `(a b . c)` builds pairs.
use std::iter::Peekable;

use logos::SpannedIter;
use num_bigint::BigInt;

use crate::{
    lexer::{LexerError, Span, Token},
    runtime::opcodes,
    value::{Atom, Value},
};

mod printer;

pub use printer::{display, PrintConfig, Printed};

#[derive(thiserror::Error, Debug, PartialEq, Clone)]
pub enum IrError {
    #[error("unexpected '{ch}' at offset {offset}")]
    UnexpectedCharacter { ch: char, offset: usize },
    #[error("unexpected '.' at offset {offset}")]
    UnexpectedDot { offset: usize },
    #[error("unterminated string starting at offset {offset}")]
    UnterminatedString { offset: usize },
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEnd { offset: usize },
    #[error("invalid hex literal {token:?} at offset {offset}")]
    InvalidHex { offset: usize, token: Box<str> },
    #[error("extra characters at offset {offset} of {len}")]
    TrailingCharacters { offset: usize, len: usize },
    #[error("lexer error at offset {offset}: {source}")]
    Lexer {
        offset: usize,
        #[source]
        source: LexerError,
    },
}

impl IrError {
    /// Byte offset into the source where the problem starts
    pub fn offset(&self) -> usize {
        match self {
            Self::UnexpectedCharacter { offset, .. }
            | Self::UnexpectedDot { offset }
            | Self::UnterminatedString { offset }
            | Self::UnexpectedEnd { offset }
            | Self::InvalidHex { offset, .. }
            | Self::TrailingCharacters { offset, .. }
            | Self::Lexer { offset, .. } => *offset,
        }
    }
}

fn is_decimal(word: &str) -> bool {
    let digits = word.strip_prefix(['+', '-']).unwrap_or(word);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn atom_from_word(word: &str, offset: usize) -> Result<Atom, IrError> {
    if is_decimal(word) {
        if let Ok(value) = word.parse::<BigInt>() {
            return Ok(Atom::from_int(&value));
        }
    }
    if let Some(digits) = word.strip_prefix("0x").or_else(|| word.strip_prefix("0X")) {
        let padded;
        let digits = if digits.len() % 2 == 1 {
            padded = format!("0{digits}");
            padded.as_str()
        } else {
            digits
        };
        return hex::decode(digits)
            .map(Atom::from)
            .map_err(|_| IrError::InvalidHex {
                offset,
                token: Box::from(word),
            });
    }
    if let Some(opcode) = opcodes::opcode_for_keyword(word) {
        return Ok(Atom::from([opcode]));
    }
    Ok(Atom::from_slice(word.as_bytes()))
}

struct Parser<'s> {
    tokens: Peekable<SpannedIter<'s, Token>>,
    // Offset of the lexed slice within the caller's source
    base: usize,
    end: usize,
    pos: usize,
}

impl<'s> Parser<'s> {
    fn new(source: &'s str, base: usize) -> Self {
        Self {
            tokens: Token::lexer(&source[base..]).spanned().peekable(),
            base,
            end: source.len(),
            pos: base,
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some((Ok(Token::Whitespace), _)) = self.tokens.peek() {
            self.tokens.next();
        }
    }

    fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.tokens.peek().is_none()
    }

    fn next(&mut self) -> Result<Option<(Token, Span)>, IrError> {
        self.skip_whitespace();
        let Some((token, span)) = self.tokens.next() else {
            return Ok(None);
        };
        let span = span.start + self.base..span.end + self.base;
        self.pos = span.end;
        match token {
            Ok(token) => Ok(Some((token, span))),
            Err(LexerError::UnterminatedString) => {
                Err(IrError::UnterminatedString { offset: span.start })
            }
            Err(source) => Err(IrError::Lexer {
                offset: span.start,
                source,
            }),
        }
    }

    fn unexpected_end(&self) -> IrError {
        IrError::UnexpectedEnd { offset: self.end }
    }

    fn expr(&mut self) -> Result<Value, IrError> {
        match self.next()? {
            Some(token) => self.expr_from(token),
            None => Err(self.unexpected_end()),
        }
    }

    fn expr_from(&mut self, (token, span): (Token, Span)) -> Result<Value, IrError> {
        match token {
            Token::LParen => self.list(),
            Token::RParen => Err(IrError::UnexpectedCharacter {
                ch: ')',
                offset: span.start,
            }),
            Token::Dot => Err(IrError::UnexpectedDot { offset: span.start }),
            Token::Quoted(bytes) => Ok(Value::atom(Vec::from(bytes))),
            Token::Word(word) => Ok(Value::Atom(atom_from_word(&word, span.start)?)),
            Token::Whitespace | Token::Unterminated => unreachable!("filtered by next"),
        }
    }

    // Called just after the opening paren
    fn list(&mut self) -> Result<Value, IrError> {
        let mut items = Vec::new();
        loop {
            match self.next()? {
                None => return Err(self.unexpected_end()),
                Some((Token::RParen, _)) => return Ok(Value::list(items)),
                Some((Token::Dot, dot)) => {
                    if items.is_empty() {
                        return Err(IrError::UnexpectedDot { offset: dot.start });
                    }
                    let tail = match self.next()? {
                        None => return Err(self.unexpected_end()),
                        Some((Token::Dot, span)) => {
                            return Err(IrError::UnexpectedDot { offset: span.start })
                        }
                        Some((Token::RParen, _)) => {
                            return Err(IrError::UnexpectedDot { offset: dot.start })
                        }
                        Some(token) => self.expr_from(token)?,
                    };
                    return match self.next()? {
                        None => Err(self.unexpected_end()),
                        Some((Token::RParen, _)) => Ok(Value::list_with_tail(items, tail)),
                        Some((Token::Dot, span)) => {
                            Err(IrError::UnexpectedDot { offset: span.start })
                        }
                        Some(_) => Err(IrError::UnexpectedDot { offset: dot.start }),
                    };
                }
                Some(token) => items.push(self.expr_from(token)?),
            }
        }
    }

    fn finish(mut self) -> Result<(), IrError> {
        self.skip_whitespace();
        match self.tokens.next() {
            None => Ok(()),
            Some((_, span)) => Err(IrError::TrailingCharacters {
                offset: span.start + self.base,
                len: self.end,
            }),
        }
    }
}

/// Parses a source holding exactly one expression
pub fn parse(source: &str) -> Result<Value, IrError> {
    let mut parser = Parser::new(source, 0);
    let value = parser.expr()?;
    parser.finish()?;
    Ok(value)
}

/// Parses the first expression at or after `offset`, returning it with the
/// offset just past it.
pub fn parse_next(source: &str, offset: usize) -> Result<(Value, usize), IrError> {
    let mut base = offset.min(source.len());
    // An offset inside a multibyte character resumes at the next one
    while !source.is_char_boundary(base) {
        base += 1;
    }
    let mut parser = Parser::new(source, base);
    let value = parser.expr()?;
    Ok((value, parser.pos))
}

/// Parses `program` or `program args`; missing args read as nil
pub fn parse_one_or_two(source: &str) -> Result<(Value, Value), IrError> {
    let mut parser = Parser::new(source, 0);
    let first = parser.expr()?;
    if parser.at_end() {
        return Ok((first, Value::NIL));
    }
    let second = parser.expr()?;
    parser.finish()?;
    Ok((first, second))
}
