pub use logos::Span;
use logos::{Lexer, Logos};

#[derive(thiserror::Error, Debug, PartialEq, Clone, Default)]
pub enum LexerError {
    #[default]
    #[error("invalid token encountered")]
    Invalid,
    #[error("unterminated string")]
    UnterminatedString,
}

fn process_quoted(lexer: &mut Lexer<Token>) -> Box<[u8]> {
    // Strip the matching quotes, the contents are taken verbatim
    let slice = lexer.slice();
    Box::from(slice[1..slice.len() - 1].as_bytes())
}

fn unterminated(_: &mut Lexer<Token>) -> Result<(), LexerError> {
    Err(LexerError::UnterminatedString)
}

/// Tokens of the textual IR.
#[derive(Debug, Clone, PartialEq, Logos)]
#[logos(error = LexerError)]
pub enum Token {
    #[regex("[ \t\r\n\x0C]+")]
    Whitespace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(".")]
    Dot,
    #[regex(r#""[^"]*""#, process_quoted)]
    #[regex(r#"'[^']*'"#, process_quoted)]
    Quoted(Box<[u8]>),
    // A quote that runs off the end of the input
    #[regex(r#""[^"]*"#, unterminated)]
    #[regex(r#"'[^']*"#, unterminated)]
    Unterminated,
    // Everything up to the next paren or whitespace, classified by the parser
    #[regex(r#"[^() \t\r\n\x0C.'"][^() \t\r\n\x0C]*"#, |l| Box::from(l.slice()))]
    #[regex(r#"\.[^() \t\r\n\x0C]+"#, |l| Box::from(l.slice()))]
    Word(Box<str>),
}

impl Token {
    pub fn lexer(source: &str) -> Lexer<Self> {
        <Self as Logos>::lexer(source)
    }
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};

    use super::{LexerError, Token};

    fn tokens(source: &str) -> Vec<Result<Token, LexerError>> {
        Token::lexer(source)
            .filter(|token| token != &Ok(Token::Whitespace))
            .collect()
    }

    #[test]
    fn structure() {
        check!(
            tokens("(a . b)")
                == vec![
                    Ok(Token::LParen),
                    Ok(Token::Word("a".into())),
                    Ok(Token::Dot),
                    Ok(Token::Word("b".into())),
                    Ok(Token::RParen),
                ]
        );
    }

    #[test]
    fn words_stop_at_parens_and_whitespace() {
        check!(
            tokens("(0x4ff\t-32769)")
                == vec![
                    Ok(Token::LParen),
                    Ok(Token::Word("0x4ff".into())),
                    Ok(Token::Word("-32769".into())),
                    Ok(Token::RParen),
                ]
        );
        // Dots only stand alone when followed by a delimiter
        check!(tokens(".5") == vec![Ok(Token::Word(".5".into()))]);
        check!(tokens("a.b") == vec![Ok(Token::Word("a.b".into()))]);
    }

    #[test]
    fn quoted_strings() {
        check!(tokens(r#""A B""#) == vec![Ok(Token::Quoted(Box::from(&b"A B"[..])))]);
        check!(tokens("'ABC'") == vec![Ok(Token::Quoted(Box::from(&b"ABC"[..])))]);
        check!(tokens(r#""it's""#) == vec![Ok(Token::Quoted(Box::from(&b"it's"[..])))]);
        check!(tokens(r#""""#) == vec![Ok(Token::Quoted(Box::from(&b""[..])))]);
    }

    #[test]
    fn unterminated_strings() {
        let mut lexer = Token::lexer(r#"(1 "abc)"#);
        check!(lexer.next() == Some(Ok(Token::LParen)));
        check!(lexer.next() == Some(Ok(Token::Word("1".into()))));
        check!(lexer.next() == Some(Ok(Token::Whitespace)));
        let_assert!(Some(Err(LexerError::UnterminatedString)) = lexer.next());
        check!(lexer.span() == (3..8));
        check!(tokens("'abc\"") == vec![Err(LexerError::UnterminatedString)]);
    }
}
