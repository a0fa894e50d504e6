//! Recursive descent parser for XPath 1.0
//!
//! Name test prefixes are resolved while parsing, against the resolver the
//! expression is compiled with.

use super::ast::{Axis, BinaryOp, Expr, NodeTest, Step};
use super::lexer::{tokenize, Token};
use crate::names::split_qname;
use crate::namespaces::{NamespaceResolver, NAMESPACE_ALIAS_XML, NAMESPACE_XML};

/// Core function library: name and accepted argument counts
pub(crate) const FUNCTIONS: &[(&str, usize, Option<usize>)] = &[
    ("last", 0, Some(0)),
    ("position", 0, Some(0)),
    ("count", 1, Some(1)),
    ("id", 1, Some(1)),
    ("local-name", 0, Some(1)),
    ("namespace-uri", 0, Some(1)),
    ("name", 0, Some(1)),
    ("string", 0, Some(1)),
    ("concat", 2, None),
    ("starts-with", 2, Some(2)),
    ("contains", 2, Some(2)),
    ("substring-before", 2, Some(2)),
    ("substring-after", 2, Some(2)),
    ("substring", 2, Some(3)),
    ("string-length", 0, Some(1)),
    ("normalize-space", 0, Some(1)),
    ("translate", 3, Some(3)),
    ("boolean", 1, Some(1)),
    ("not", 1, Some(1)),
    ("true", 0, Some(0)),
    ("false", 0, Some(0)),
    ("lang", 1, Some(1)),
    ("number", 0, Some(1)),
    ("sum", 1, Some(1)),
    ("floor", 1, Some(1)),
    ("ceiling", 1, Some(1)),
    ("round", 1, Some(1)),
];

/// Parse `input` into an expression tree
pub(crate) fn parse(input: &str, resolver: Option<&dyn NamespaceResolver>) -> Result<Expr, String> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        resolver,
    };
    let expr = parser.or_expr()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(format!("unexpected '{}' after expression", token)),
    }
}

struct Parser<'r> {
    tokens: Vec<Token>,
    pos: usize,
    resolver: Option<&'r dyn NamespaceResolver>,
}

impl<'r> Parser<'r> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), String> {
        match self.advance() {
            Some(ref token) if *token == expected => Ok(()),
            Some(token) => Err(format!("expected '{}', found '{}'", expected, token)),
            None => Err(format!("expected '{}' at end of expression", expected)),
        }
    }

    fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn or_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.and_expr()?;
        while self.eat(&Token::Or) {
            let right = self.and_expr()?;
            left = Self::binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.equality_expr()?;
        while self.eat(&Token::And) {
            let right = self.equality_expr()?;
            left = Self::binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn equality_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.relational_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => BinaryOp::Eq,
                Some(Token::Neq) => BinaryOp::Neq,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.relational_expr()?;
            left = Self::binary(op, left, right);
        }
    }

    fn relational_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.additive_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Lte) => BinaryOp::Lte,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Gte) => BinaryOp::Gte,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.additive_expr()?;
            left = Self::binary(op, left, right);
        }
    }

    fn additive_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.multiplicative_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.multiplicative_expr()?;
            left = Self::binary(op, left, right);
        }
    }

    fn multiplicative_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.unary_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Multiply) => BinaryOp::Mul,
                Some(Token::Div) => BinaryOp::Div,
                Some(Token::Mod) => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.unary_expr()?;
            left = Self::binary(op, left, right);
        }
    }

    fn unary_expr(&mut self) -> Result<Expr, String> {
        if self.eat(&Token::Minus) {
            let operand = self.unary_expr()?;
            return Ok(Expr::Negate(Box::new(operand)));
        }
        self.union_expr()
    }

    fn union_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.path_expr()?;
        while self.eat(&Token::Pipe) {
            let right = self.path_expr()?;
            left = Expr::Union(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn path_expr(&mut self) -> Result<Expr, String> {
        let starts_filter = matches!(
            self.peek(),
            Some(Token::Variable(_))
                | Some(Token::LParen)
                | Some(Token::Literal(_))
                | Some(Token::Number(_))
                | Some(Token::FunctionName(_))
        );
        if !starts_filter {
            return self.location_path();
        }

        let primary = self.primary_expr()?;
        let predicates = self.predicates()?;
        let mut steps = Vec::new();
        match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                self.relative_path(&mut steps)?;
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                steps.push(Step::descendant_or_self());
                self.relative_path(&mut steps)?;
            }
            _ => {}
        }
        if predicates.is_empty() && steps.is_empty() {
            return Ok(primary);
        }
        Ok(Expr::Filter {
            primary: Box::new(primary),
            predicates,
            steps,
        })
    }

    fn primary_expr(&mut self) -> Result<Expr, String> {
        match self.advance() {
            Some(Token::Variable(name)) => Ok(Expr::Variable(name)),
            Some(Token::Literal(s)) => Ok(Expr::Literal(s)),
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::LParen) => {
                let expr = self.or_expr()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Some(Token::FunctionName(name)) => self.function_call(name),
            Some(token) => Err(format!("unexpected '{}'", token)),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    fn function_call(&mut self, name: String) -> Result<Expr, String> {
        let (min, max) = FUNCTIONS
            .iter()
            .find(|(f, _, _)| *f == name)
            .map(|(_, min, max)| (*min, *max))
            .ok_or_else(|| format!("unknown function '{}'", name))?;

        self.expect(Token::LParen)?;
        let mut args = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                args.push(self.or_expr()?);
                if self.eat(&Token::Comma) {
                    continue;
                }
                self.expect(Token::RParen)?;
                break;
            }
        }
        if args.len() < min || max.is_some_and(|max| args.len() > max) {
            return Err(format!(
                "wrong number of arguments for {}(): {}",
                name,
                args.len()
            ));
        }
        Ok(Expr::Function { name, args })
    }

    fn predicates(&mut self) -> Result<Vec<Expr>, String> {
        let mut predicates = Vec::new();
        while self.eat(&Token::LBracket) {
            predicates.push(self.or_expr()?);
            self.expect(Token::RBracket)?;
        }
        Ok(predicates)
    }

    fn location_path(&mut self) -> Result<Expr, String> {
        let mut steps = Vec::new();
        match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                if self.starts_step() {
                    self.relative_path(&mut steps)?;
                }
                Ok(Expr::Path {
                    absolute: true,
                    steps,
                })
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                steps.push(Step::descendant_or_self());
                self.relative_path(&mut steps)?;
                Ok(Expr::Path {
                    absolute: true,
                    steps,
                })
            }
            _ => {
                self.relative_path(&mut steps)?;
                Ok(Expr::Path {
                    absolute: false,
                    steps,
                })
            }
        }
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Dot)
                | Some(Token::DotDot)
                | Some(Token::At)
                | Some(Token::AxisName(_))
                | Some(Token::Star)
                | Some(Token::PrefixStar(_))
                | Some(Token::Name(_))
                | Some(Token::NodeType(_))
        )
    }

    fn relative_path(&mut self, steps: &mut Vec<Step>) -> Result<(), String> {
        steps.push(self.step()?);
        loop {
            match self.peek() {
                Some(Token::Slash) => {
                    self.pos += 1;
                    steps.push(self.step()?);
                }
                Some(Token::DoubleSlash) => {
                    self.pos += 1;
                    steps.push(Step::descendant_or_self());
                    steps.push(self.step()?);
                }
                _ => return Ok(()),
            }
        }
    }

    fn step(&mut self) -> Result<Step, String> {
        if self.eat(&Token::Dot) {
            return Ok(Step {
                axis: Axis::Self_,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }
        if self.eat(&Token::DotDot) {
            return Ok(Step {
                axis: Axis::Parent,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }

        let axis = if self.eat(&Token::At) {
            Axis::Attribute
        } else if let Some(Token::AxisName(name)) = self.peek().cloned() {
            self.pos += 1;
            self.expect(Token::DoubleColon)?;
            Axis::parse(&name).ok_or_else(|| format!("unknown axis '{}'", name))?
        } else {
            Axis::Child
        };

        let test = self.node_test()?;
        let predicates = self.predicates()?;
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn resolve_prefix(&self, prefix: &str) -> Result<Option<String>, String> {
        if prefix == NAMESPACE_ALIAS_XML {
            return Ok(Some(NAMESPACE_XML.to_string()));
        }
        match self.resolver {
            Some(resolver) => resolver
                .namespace_uri(prefix)
                .map(|uri| Some(uri.to_string()))
                .ok_or_else(|| format!("prefix '{}' is not bound to a namespace", prefix)),
            None => Ok(None),
        }
    }

    fn node_test(&mut self) -> Result<NodeTest, String> {
        match self.advance() {
            Some(Token::Star) => Ok(NodeTest::Any),
            Some(Token::PrefixStar(prefix)) => {
                let namespace = self.resolve_prefix(&prefix)?;
                Ok(NodeTest::AnyInNamespace { prefix, namespace })
            }
            Some(Token::Name(qname)) => {
                let (prefix, local) = split_qname(&qname);
                let namespace = match prefix {
                    Some(p) => self.resolve_prefix(p)?,
                    None => None,
                };
                Ok(NodeTest::Name {
                    prefix: prefix.map(str::to_string),
                    local: local.to_string(),
                    namespace,
                    qname,
                })
            }
            Some(Token::NodeType(kind)) => {
                self.expect(Token::LParen)?;
                let test = match kind.as_str() {
                    "node" => NodeTest::Node,
                    "text" => NodeTest::Text,
                    "comment" => NodeTest::Comment,
                    _ => match self.peek().cloned() {
                        Some(Token::Literal(target)) => {
                            self.pos += 1;
                            NodeTest::ProcessingInstruction(Some(target))
                        }
                        _ => NodeTest::ProcessingInstruction(None),
                    },
                };
                self.expect(Token::RParen)?;
                Ok(test)
            }
            Some(token) => Err(format!("expected a node test, found '{}'", token)),
            None => Err("expected a node test at end of expression".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespaces::NamespaceContext;

    fn parsed(input: &str) -> Expr {
        parse(input, None).unwrap()
    }

    #[test]
    fn test_abbreviated_path() {
        let expr = parsed("//a/@b");
        let Expr::Path { absolute, steps } = expr else {
            panic!("expected a path");
        };
        assert!(absolute);
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].axis, Axis::DescendantOrSelf);
        assert_eq!(steps[2].axis, Axis::Attribute);
    }

    #[test]
    fn test_root_only() {
        assert_eq!(
            parsed("/"),
            Expr::Path {
                absolute: true,
                steps: vec![]
            }
        );
    }

    #[test]
    fn test_precedence() {
        let expr = parsed("1 + 2 * 3 = 7 or false()");
        let Expr::Binary { op, left, .. } = expr else {
            panic!("expected a binary expression");
        };
        assert_eq!(op, BinaryOp::Or);
        assert!(matches!(*left, Expr::Binary { op: BinaryOp::Eq, .. }));
    }

    #[test]
    fn test_filter_with_path() {
        let expr = parsed("(//a)[1]/b");
        assert!(matches!(expr, Expr::Filter { ref predicates, ref steps, .. }
            if predicates.len() == 1 && steps.len() == 1));
    }

    #[test]
    fn test_prefix_resolution() {
        let ctx = NamespaceContext::new().with_prefix("ns", "urn:ns");
        let expr = parse("ns:a", Some(&ctx)).unwrap();
        let Expr::Path { steps, .. } = expr else {
            panic!("expected a path");
        };
        assert!(matches!(&steps[0].test, NodeTest::Name { namespace: Some(ns), local, .. }
            if ns == "urn:ns" && local == "a"));

        assert!(parse("other:a", Some(&ctx)).is_err());
    }

    #[test]
    fn test_errors() {
        assert!(parse("", None).is_err());
        assert!(parse("/a[", None).is_err());
        assert!(parse("unknown()", None).is_err());
        assert!(parse("count()", None).is_err());
        assert!(parse("a b", None).is_err());
        assert!(parse("bogus::a", None).is_err());
    }
}
