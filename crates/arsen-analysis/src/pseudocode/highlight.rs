//! Token classification for coloured pseudocode display.
//!
//! Concatenating the token texts of a line reproduces the line exactly.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{anychar, one_of},
    combinator::{map, recognize, rest},
    multi::many0,
    sequence::pair,
};

const KEYWORDS: [&str; 11] = [
    "if", "else", "while", "do", "for", "return", "break", "continue", "int", "void", "true",
];

const FUNCTION_PREFIXES: [&str; 3] = ["sub_", "SUB_", "func_"];

const VARIABLE_PREFIXES: [&str; 4] = ["r_", "local_", "mem_", "var_"];

/// Display class of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Control-flow keyword or type name.
    Keyword,
    /// Function name.
    Function,
    /// Generated variable.
    Variable,
    /// Numeric literal.
    Number,
    /// `//` comment through end of line.
    Comment,
    /// Arithmetic, comparison, or assignment operator.
    Operator,
    /// Parenthesis, brace, or square bracket.
    Bracket,
    /// Anything else, including whitespace.
    Plain,
}

/// A classified slice of a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Display class.
    pub kind: TokenKind,
    /// Source text.
    pub text: String,
}

fn token(kind: TokenKind, text: &str) -> Token {
    Token {
        kind,
        text: text.to_string(),
    }
}

fn comment(input: &str) -> IResult<&str, Token> {
    map(recognize(pair(tag("//"), rest)), |s| token(TokenKind::Comment, s)).parse(input)
}

fn classify_word(word: &str) -> TokenKind {
    if KEYWORDS.contains(&word) {
        TokenKind::Keyword
    } else if FUNCTION_PREFIXES.iter().any(|p| word.starts_with(p)) {
        TokenKind::Function
    } else if VARIABLE_PREFIXES.iter().any(|p| word.starts_with(p)) {
        TokenKind::Variable
    } else {
        TokenKind::Plain
    }
}

fn word(input: &str) -> IResult<&str, Token> {
    let (input, text) = recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))
    .parse(input)?;
    Ok((input, token(classify_word(text), text)))
}

fn number(input: &str) -> IResult<&str, Token> {
    let (input, text) = recognize(pair(
        take_while1(|c: char| c.is_ascii_digit()),
        take_while(|c: char| c.is_ascii_alphanumeric()),
    ))
    .parse(input)?;
    Ok((input, token(TokenKind::Number, text)))
}

fn bracket(input: &str) -> IResult<&str, Token> {
    map(recognize(one_of("()[]{}")), |s| token(TokenKind::Bracket, s)).parse(input)
}

fn operator(input: &str) -> IResult<&str, Token> {
    map(take_while1(|c: char| "+-*/%=<>!&|^~".contains(c)), |s| {
        token(TokenKind::Operator, s)
    })
    .parse(input)
}

fn whitespace(input: &str) -> IResult<&str, Token> {
    map(take_while1(char::is_whitespace), |s| token(TokenKind::Plain, s)).parse(input)
}

fn other(input: &str) -> IResult<&str, Token> {
    map(recognize(anychar), |s| token(TokenKind::Plain, s)).parse(input)
}

/// Splits one line of pseudocode into classified tokens.
#[must_use]
pub fn tokenize(line: &str) -> Vec<Token> {
    let parsed: IResult<&str, Vec<Token>> =
        many0(alt((comment, word, number, bracket, operator, whitespace, other))).parse(line);
    match parsed {
        Ok((_, tokens)) => tokens,
        Err(_) => vec![token(TokenKind::Plain, line)],
    }
}
