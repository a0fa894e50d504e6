//! Tokenizer for XPath 1.0 expressions
//!
//! Applies the disambiguation rules of the expression lexical structure: a
//! `*` or an `and`/`or`/`mod`/`div` name is an operator when the previous
//! token can end an operand; a name before `(` is a function name or node
//! type; a name before `::` is an axis name.

use std::fmt;

const NODE_TYPES: [&str; 4] = ["comment", "text", "processing-instruction", "node"];

/// Lexical token
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    DotDot,
    At,
    Comma,
    DoubleColon,
    Slash,
    DoubleSlash,
    Pipe,
    Plus,
    Minus,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Multiply,
    And,
    Or,
    Mod,
    Div,
    Number(f64),
    Literal(String),
    Variable(String),
    /// `*` name test
    Star,
    /// `prefix:*` name test
    PrefixStar(String),
    /// Name test, possibly prefixed
    Name(String),
    NodeType(String),
    FunctionName(String),
    AxisName(String),
}

impl Token {
    /// Whether a following `*` or operator name must be read as an operator
    fn ends_operand(&self) -> bool {
        !matches!(
            self,
            Token::At
                | Token::DoubleColon
                | Token::LParen
                | Token::LBracket
                | Token::Comma
                | Token::Slash
                | Token::DoubleSlash
                | Token::Pipe
                | Token::Plus
                | Token::Minus
                | Token::Eq
                | Token::Neq
                | Token::Lt
                | Token::Lte
                | Token::Gt
                | Token::Gte
                | Token::Multiply
                | Token::And
                | Token::Or
                | Token::Mod
                | Token::Div
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::LBracket => f.write_str("["),
            Token::RBracket => f.write_str("]"),
            Token::Dot => f.write_str("."),
            Token::DotDot => f.write_str(".."),
            Token::At => f.write_str("@"),
            Token::Comma => f.write_str(","),
            Token::DoubleColon => f.write_str("::"),
            Token::Slash => f.write_str("/"),
            Token::DoubleSlash => f.write_str("//"),
            Token::Pipe => f.write_str("|"),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Eq => f.write_str("="),
            Token::Neq => f.write_str("!="),
            Token::Lt => f.write_str("<"),
            Token::Lte => f.write_str("<="),
            Token::Gt => f.write_str(">"),
            Token::Gte => f.write_str(">="),
            Token::Multiply | Token::Star => f.write_str("*"),
            Token::And => f.write_str("and"),
            Token::Or => f.write_str("or"),
            Token::Mod => f.write_str("mod"),
            Token::Div => f.write_str("div"),
            Token::Number(n) => write!(f, "{}", n),
            Token::Literal(s) => write!(f, "'{}'", s),
            Token::Variable(v) => write!(f, "${}", v),
            Token::PrefixStar(p) => write!(f, "{}:*", p),
            Token::Name(n) | Token::NodeType(n) | Token::FunctionName(n) | Token::AxisName(n) => {
                f.write_str(n)
            }
        }
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '\u{B7}')
}

struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    tokens: Vec<Token>,
    input: &'a str,
}

/// Split an expression into tokens
pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut lexer = Lexer {
        chars: input.chars().collect(),
        pos: 0,
        tokens: Vec::new(),
        input,
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn operator_expected(&self) -> bool {
        self.tokens.last().is_some_and(Token::ends_operand)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn next_significant(&self) -> Option<char> {
        self.chars[self.pos..]
            .iter()
            .copied()
            .find(|c| !c.is_whitespace())
    }

    fn next_is_double_colon(&self) -> bool {
        let rest: Vec<char> = self.chars[self.pos..]
            .iter()
            .copied()
            .skip_while(|c| c.is_whitespace())
            .take(2)
            .collect();
        rest == [':', ':']
    }

    fn ncname(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(is_name_char) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn run(&mut self) -> Result<(), String> {
        loop {
            self.skip_whitespace();
            let Some(c) = self.peek() else {
                return Ok(());
            };
            let token = match c {
                '(' => self.single(Token::LParen),
                ')' => self.single(Token::RParen),
                '[' => self.single(Token::LBracket),
                ']' => self.single(Token::RBracket),
                '@' => self.single(Token::At),
                ',' => self.single(Token::Comma),
                '|' => self.single(Token::Pipe),
                '+' => self.single(Token::Plus),
                '-' => self.single(Token::Minus),
                '=' => self.single(Token::Eq),
                '!' if self.peek_at(1) == Some('=') => self.double(Token::Neq),
                '<' if self.peek_at(1) == Some('=') => self.double(Token::Lte),
                '<' => self.single(Token::Lt),
                '>' if self.peek_at(1) == Some('=') => self.double(Token::Gte),
                '>' => self.single(Token::Gt),
                ':' if self.peek_at(1) == Some(':') => self.double(Token::DoubleColon),
                '/' if self.peek_at(1) == Some('/') => self.double(Token::DoubleSlash),
                '/' => self.single(Token::Slash),
                '*' => {
                    if self.operator_expected() {
                        self.single(Token::Multiply)
                    } else {
                        self.single(Token::Star)
                    }
                }
                '.' if self.peek_at(1) == Some('.') => self.double(Token::DotDot),
                '.' if self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) => self.number()?,
                '.' => self.single(Token::Dot),
                '"' | '\'' => self.literal(c)?,
                '$' => {
                    self.pos += 1;
                    let name = self.qname()?;
                    Token::Variable(name)
                }
                d if d.is_ascii_digit() => self.number()?,
                n if is_name_start(n) => self.name()?,
                other => {
                    return Err(format!(
                        "unexpected character '{}' at position {} in '{}'",
                        other, self.pos, self.input
                    ))
                }
            };
            self.tokens.push(token);
        }
    }

    fn single(&mut self, token: Token) -> Token {
        self.pos += 1;
        token
    }

    fn double(&mut self, token: Token) -> Token {
        self.pos += 2;
        token
    }

    fn number(&mut self) -> Result<Token, String> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some('.') {
            self.pos += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| format!("malformed number '{}'", text))
    }

    fn literal(&mut self, quote: char) -> Result<Token, String> {
        let start = self.pos;
        self.pos += 1;
        let content_start = self.pos;
        while let Some(c) = self.peek() {
            if c == quote {
                let content: String = self.chars[content_start..self.pos].iter().collect();
                self.pos += 1;
                return Ok(Token::Literal(content));
            }
            self.pos += 1;
        }
        Err(format!("unterminated string literal at position {}", start))
    }

    /// A QName for variables and function names
    fn qname(&mut self) -> Result<String, String> {
        if !self.peek().is_some_and(is_name_start) {
            return Err(format!("expected a name at position {}", self.pos));
        }
        let mut name = self.ncname();
        if self.peek() == Some(':') && self.peek_at(1).is_some_and(is_name_start) {
            self.pos += 1;
            name.push(':');
            name.push_str(&self.ncname());
        }
        Ok(name)
    }

    fn name(&mut self) -> Result<Token, String> {
        let first = self.ncname();

        if self.operator_expected() {
            return match first.as_str() {
                "and" => Ok(Token::And),
                "or" => Ok(Token::Or),
                "mod" => Ok(Token::Mod),
                "div" => Ok(Token::Div),
                other => Err(format!(
                    "expected an operator, found '{}' in '{}'",
                    other, self.input
                )),
            };
        }

        if self.peek() == Some(':') && self.peek_at(1) != Some(':') {
            match self.peek_at(1) {
                Some('*') => {
                    self.pos += 2;
                    return Ok(Token::PrefixStar(first));
                }
                Some(c) if is_name_start(c) => {
                    self.pos += 1;
                    let local = self.ncname();
                    let qname = format!("{}:{}", first, local);
                    return Ok(if self.next_significant() == Some('(') {
                        Token::FunctionName(qname)
                    } else {
                        Token::Name(qname)
                    });
                }
                _ => return Err(format!("malformed name '{}:' in '{}'", first, self.input)),
            }
        }

        if self.next_significant() == Some('(') {
            return Ok(if NODE_TYPES.contains(&first.as_str()) {
                Token::NodeType(first)
            } else {
                Token::FunctionName(first)
            });
        }
        if self.next_is_double_colon() {
            return Ok(Token::AxisName(first));
        }
        Ok(Token::Name(first))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_path() {
        let tokens = tokenize("/root/child").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Slash,
                Token::Name("root".into()),
                Token::Slash,
                Token::Name("child".into())
            ]
        );
    }

    #[test]
    fn test_star_disambiguation() {
        let tokens = tokenize("* * 2").unwrap();
        assert_eq!(tokens, vec![Token::Star, Token::Multiply, Token::Number(2.0)]);
    }

    #[test]
    fn test_operator_names() {
        let tokens = tokenize("div div div").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Name("div".into()),
                Token::Div,
                Token::Name("div".into())
            ]
        );
    }

    #[test]
    fn test_functions_axes_and_node_types() {
        let tokens = tokenize("count(child::text())").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::FunctionName("count".into()),
                Token::LParen,
                Token::AxisName("child".into()),
                Token::DoubleColon,
                Token::NodeType("text".into()),
                Token::LParen,
                Token::RParen,
                Token::RParen
            ]
        );
    }

    #[test]
    fn test_prefixed_names() {
        let tokens = tokenize("ns:a/ns:*").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Name("ns:a".into()),
                Token::Slash,
                Token::PrefixStar("ns".into())
            ]
        );
    }

    #[test]
    fn test_literals_numbers_variables() {
        let tokens = tokenize("'a' \"b\" .5 12.25 $v").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Literal("a".into()),
                Token::Literal("b".into()),
                Token::Number(0.5),
                Token::Number(12.25),
                Token::Variable("v".into())
            ]
        );
    }

    #[test]
    fn test_errors() {
        assert!(tokenize("'open").is_err());
        assert!(tokenize("a # b").is_err());
        assert!(tokenize("1 foo 2").is_err());
    }
}
