//! XPath Parser
//!
//! Recursive descent parser for XPath 1.0 expressions. Abbreviations are
//! expanded while parsing: `.` is `self::node()`, `..` is `parent::node()`,
//! `@x` is `attribute::x` and `//` is `/descendant-or-self::node()/`.

use super::lexer::{Lexer, Token};

/// XPath expression AST node
#[derive(Debug, Clone)]
pub enum Expr {
    /// Root of the evaluation (`/`)
    Root,
    /// Union of two node-sets (`|`)
    Union(Box<Expr>, Box<Expr>),
    /// `expr/step`
    Path(Box<Expr>, Box<Step>),
    /// `primary[predicate]`
    Filter(Box<Expr>, Box<Expr>),
    Function(String, Vec<Expr>),
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
    Negate(Box<Expr>),
    Number(f64),
    String(String),
    Variable(String),
    /// Location step relative to the context node
    Step(Box<Step>),
}

impl Expr {
    /// Whether the expression always produces a node-set
    pub fn is_node_set(&self) -> bool {
        match self {
            Expr::Root | Expr::Union(..) | Expr::Path(..) | Expr::Step(_) => true,
            Expr::Filter(base, _) => base.is_node_set(),
            _ => false,
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// Location step in a path
#[derive(Debug, Clone)]
pub struct Step {
    pub axis: Axis,
    pub node_test: NodeTest,
    pub predicates: Vec<Expr>,
}

impl Step {
    fn new(axis: Axis, node_test: NodeTest) -> Self {
        Step {
            axis,
            node_test,
            predicates: Vec::new(),
        }
    }
}

/// XPath axes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Parent,
    Ancestor,
    AncestorOrSelf,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
    Self_,
    Attribute,
    Namespace,
}

impl Axis {
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "child" => Some(Axis::Child),
            "descendant" => Some(Axis::Descendant),
            "descendant-or-self" => Some(Axis::DescendantOrSelf),
            "parent" => Some(Axis::Parent),
            "ancestor" => Some(Axis::Ancestor),
            "ancestor-or-self" => Some(Axis::AncestorOrSelf),
            "following-sibling" => Some(Axis::FollowingSibling),
            "preceding-sibling" => Some(Axis::PrecedingSibling),
            "following" => Some(Axis::Following),
            "preceding" => Some(Axis::Preceding),
            "self" => Some(Axis::Self_),
            "attribute" => Some(Axis::Attribute),
            "namespace" => Some(Axis::Namespace),
            _ => None,
        }
    }

    /// Reverse axes count proximity positions backwards
    pub fn is_reverse(&self) -> bool {
        matches!(
            self,
            Axis::Parent
                | Axis::Ancestor
                | Axis::AncestorOrSelf
                | Axis::PrecedingSibling
                | Axis::Preceding
        )
    }
}

/// Node test in a location step
#[derive(Debug, Clone, PartialEq)]
pub enum NodeTest {
    /// `*`: any node of the axis' principal type
    Any,
    /// Unprefixed name, matched against the local name
    Name(String),
    /// `prefix:local`
    QName(String, String),
    /// `prefix:*`
    NamespaceWildcard(String),
    /// node()
    Node,
    /// text()
    Text,
    /// comment()
    Comment,
    /// processing-instruction() with optional target literal
    ProcessingInstruction(Option<String>),
}

/// XPath parser
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Result<Self, String> {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token()?;
        Ok(Parser { lexer, current })
    }

    /// Parse a complete expression; trailing tokens are an error.
    pub fn parse(&mut self) -> Result<Expr, String> {
        let expr = self.parse_or_expr()?;
        if self.current != Token::Eof {
            return Err(format!("unexpected token {:?}", self.current));
        }
        Ok(expr)
    }

    fn advance(&mut self) -> Result<(), String> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<(), String> {
        if self.current != token {
            return Err(format!("expected {}, got {:?}", what, self.current));
        }
        self.advance()
    }

    fn parse_or_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_and_expr()?;
        while self.current == Token::Or {
            self.advance()?;
            let right = self.parse_and_expr()?;
            left = Expr::Binary(Box::new(left), BinaryOp::Or, Box::new(right));
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_equality_expr()?;
        while self.current == Token::And {
            self.advance()?;
            let right = self.parse_equality_expr()?;
            left = Expr::Binary(Box::new(left), BinaryOp::And, Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_relational_expr()?;
        loop {
            let op = match self.current {
                Token::Eq => BinaryOp::Eq,
                Token::NotEq => BinaryOp::NotEq,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_relational_expr()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_relational_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_additive_expr()?;
        loop {
            let op = match self.current {
                Token::Lt => BinaryOp::Lt,
                Token::LtEq => BinaryOp::LtEq,
                Token::Gt => BinaryOp::Gt,
                Token::GtEq => BinaryOp::GtEq,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_additive_expr()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_additive_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_multiplicative_expr()?;
        loop {
            let op = match self.current {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_multiplicative_expr()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_unary_expr()?;
        loop {
            let op = match self.current {
                Token::Multiply => BinaryOp::Mul,
                Token::Div => BinaryOp::Div,
                Token::Mod => BinaryOp::Mod,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_unary_expr()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary_expr(&mut self) -> Result<Expr, String> {
        if self.current == Token::Minus {
            self.advance()?;
            let expr = self.parse_unary_expr()?;
            Ok(Expr::Negate(Box::new(expr)))
        } else {
            self.parse_union_expr()
        }
    }

    fn parse_union_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_path_expr()?;
        while self.current == Token::Pipe {
            self.advance()?;
            let right = self.parse_path_expr()?;
            if !left.is_node_set() || !right.is_node_set() {
                return Err("union operands must be node-sets".to_string());
            }
            left = Expr::Union(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.current,
            Token::Name(_)
                | Token::NameTest(_)
                | Token::Star
                | Token::At
                | Token::Dot
                | Token::DoubleDot
                | Token::Axis(_)
                | Token::NodeType(_)
        )
    }

    fn descendant_or_self() -> Step {
        Step::new(Axis::DescendantOrSelf, NodeTest::Node)
    }

    fn parse_path_expr(&mut self) -> Result<Expr, String> {
        let expr = match self.current {
            Token::Slash => {
                self.advance()?;
                if !self.starts_step() {
                    return Ok(Expr::Root);
                }
                let step = self.parse_step()?;
                Expr::Path(Box::new(Expr::Root), Box::new(step))
            }
            Token::DoubleSlash => {
                self.advance()?;
                let step = self.parse_step()?;
                let base = Expr::Path(Box::new(Expr::Root), Box::new(Self::descendant_or_self()));
                Expr::Path(Box::new(base), Box::new(step))
            }
            _ if self.starts_step() => Expr::Step(Box::new(self.parse_step()?)),
            _ => self.parse_filter_expr()?,
        };
        self.parse_relative_path(expr)
    }

    /// Continue `expr` with `/step` and `//step`
    fn parse_relative_path(&mut self, mut expr: Expr) -> Result<Expr, String> {
        let continues = matches!(self.current, Token::Slash | Token::DoubleSlash);
        if continues && !expr.is_node_set() {
            return Err("expression must evaluate to a node-set".to_string());
        }
        loop {
            match self.current {
                Token::Slash => {
                    self.advance()?;
                    let step = self.parse_step()?;
                    expr = Expr::Path(Box::new(expr), Box::new(step));
                }
                Token::DoubleSlash => {
                    self.advance()?;
                    let step = self.parse_step()?;
                    expr = Expr::Path(
                        Box::new(Expr::Path(Box::new(expr), Box::new(Self::descendant_or_self()))),
                        Box::new(step),
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_filter_expr(&mut self) -> Result<Expr, String> {
        let mut expr = self.parse_primary_expr()?;
        while self.current == Token::LeftBracket {
            if !expr.is_node_set() {
                return Err("expression must evaluate to a node-set".to_string());
            }
            self.advance()?;
            let pred = self.parse_or_expr()?;
            self.expect(Token::RightBracket, "]")?;
            expr = Expr::Filter(Box::new(expr), Box::new(pred));
        }
        Ok(expr)
    }

    fn parse_primary_expr(&mut self) -> Result<Expr, String> {
        match std::mem::replace(&mut self.current, Token::Eof) {
            Token::Number(n) => {
                self.advance()?;
                Ok(Expr::Number(n))
            }
            Token::String(s) => {
                self.advance()?;
                Ok(Expr::String(s))
            }
            Token::Dollar => {
                self.advance()?;
                match std::mem::replace(&mut self.current, Token::Eof) {
                    Token::Name(name) => {
                        self.advance()?;
                        Ok(Expr::Variable(name))
                    }
                    other => Err(format!("expected variable name, got {:?}", other)),
                }
            }
            Token::LeftParen => {
                self.advance()?;
                let expr = self.parse_or_expr()?;
                self.expect(Token::RightParen, ")")?;
                Ok(expr)
            }
            Token::FunctionName(name) => {
                self.advance()?;
                self.expect(Token::LeftParen, "(")?;
                let args = self.parse_function_args()?;
                Ok(Expr::Function(name, args))
            }
            Token::LeftBracket => Err("expression must evaluate to a node-set".to_string()),
            Token::Eof => Err("unexpected end of expression".to_string()),
            other => Err(format!("unexpected token {:?}", other)),
        }
    }

    fn parse_step(&mut self) -> Result<Step, String> {
        let axis = match std::mem::replace(&mut self.current, Token::Eof) {
            Token::Dot => {
                self.advance()?;
                return Ok(Step::new(Axis::Self_, NodeTest::Node));
            }
            Token::DoubleDot => {
                self.advance()?;
                return Ok(Step::new(Axis::Parent, NodeTest::Node));
            }
            Token::At => {
                self.advance()?;
                Axis::Attribute
            }
            Token::Axis(name) => {
                let axis = Axis::from_name(&name).ok_or_else(|| format!("unknown axis: {}", name))?;
                self.advance()?;
                self.expect(Token::DoubleColon, "::")?;
                axis
            }
            other => {
                self.current = other;
                Axis::Child
            }
        };

        let node_test = self.parse_node_test()?;
        let mut step = Step::new(axis, node_test);
        while self.current == Token::LeftBracket {
            self.advance()?;
            step.predicates.push(self.parse_or_expr()?);
            self.expect(Token::RightBracket, "]")?;
        }
        Ok(step)
    }

    fn parse_node_test(&mut self) -> Result<NodeTest, String> {
        match std::mem::replace(&mut self.current, Token::Eof) {
            Token::Star => {
                self.advance()?;
                Ok(NodeTest::Any)
            }
            Token::Name(name) => {
                self.advance()?;
                Ok(NodeTest::Name(name))
            }
            Token::NameTest(qname) => {
                self.advance()?;
                let (prefix, local) = qname.split_once(':').unwrap_or(("", qname.as_str()));
                if local == "*" {
                    Ok(NodeTest::NamespaceWildcard(prefix.to_string()))
                } else {
                    Ok(NodeTest::QName(prefix.to_string(), local.to_string()))
                }
            }
            Token::NodeType(name) => {
                self.advance()?;
                self.expect(Token::LeftParen, "(")?;
                let mut target = None;
                if name == "processing-instruction" {
                    if let Token::String(s) = &self.current {
                        target = Some(s.clone());
                        self.advance()?;
                    }
                }
                self.expect(Token::RightParen, ")")?;
                Ok(match name.as_str() {
                    "node" => NodeTest::Node,
                    "text" => NodeTest::Text,
                    "comment" => NodeTest::Comment,
                    _ => NodeTest::ProcessingInstruction(target),
                })
            }
            Token::Eof => Err("expected node test at end of expression".to_string()),
            other => Err(format!("expected node test, got {:?}", other)),
        }
    }

    fn parse_function_args(&mut self) -> Result<Vec<Expr>, String> {
        let mut args = Vec::new();
        if self.current != Token::RightParen {
            args.push(self.parse_or_expr()?);
            while self.current == Token::Comma {
                self.advance()?;
                args.push(self.parse_or_expr()?);
            }
        }
        self.expect(Token::RightParen, ")")?;
        Ok(args)
    }
}

/// Parse an XPath expression string
pub fn parse(input: &str) -> Result<Expr, String> {
    Parser::new(input)?.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_path() {
        let expr = parse("/root/child").unwrap();
        match expr {
            Expr::Path(base, step) => {
                assert!(matches!(*base, Expr::Path(..)));
                assert_eq!(step.node_test, NodeTest::Name("child".to_string()));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(parse("/").unwrap(), Expr::Root));
    }

    #[test]
    fn test_step_predicates() {
        match parse("item[@id='test'][2]").unwrap() {
            Expr::Step(step) => {
                assert_eq!(step.axis, Axis::Child);
                assert_eq!(step.predicates.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_abbreviations() {
        match parse("..").unwrap() {
            Expr::Step(step) => assert_eq!(step.axis, Axis::Parent),
            other => panic!("unexpected {:?}", other),
        }
        match parse("@*").unwrap() {
            Expr::Step(step) => {
                assert_eq!(step.axis, Axis::Attribute);
                assert_eq!(step.node_test, NodeTest::Any);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_function_and_operators() {
        assert!(matches!(parse("count(//item)").unwrap(), Expr::Function(name, _) if name == "count"));
        assert!(matches!(
            parse("1 + 2 * 3").unwrap(),
            Expr::Binary(_, BinaryOp::Add, _)
        ));
        assert!(matches!(
            parse("a | b").unwrap(),
            Expr::Union(..)
        ));
    }

    #[test]
    fn test_node_set_detection() {
        assert!(parse("//a | /b").unwrap().is_node_set());
        assert!(parse("(//a)[1]").unwrap().is_node_set());
        assert!(!parse("count(//a)").unwrap().is_node_set());
        assert!(!parse("'x'").unwrap().is_node_set());
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            parse("[invalid").unwrap_err(),
            "expression must evaluate to a node-set"
        );
        assert!(parse("//a[@a==1]").is_err());
        assert!(parse("/a/").is_err());
        assert!(parse("a b").is_err());
        assert!(parse("1 | 2").is_err());
        assert!(parse("foo::a").is_err());
    }
}
