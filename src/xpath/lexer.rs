//! XPath Lexer
//!
//! Tokenizes XPath expressions. `*` and the operator names `and`, `or`,
//! `mod`, `div` are disambiguated from the previous token: they are
//! operators only where an operator is expected.

/// XPath token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Operators
    Slash,       // /
    DoubleSlash, // //
    Dot,         // .
    DoubleDot,   // ..
    At,          // @
    Pipe,        // |
    Plus,        // +
    Minus,       // -
    Star,        // * as a name test
    Multiply,    // * as an operator
    Eq,          // =
    NotEq,       // !=
    Lt,          // <
    LtEq,        // <=
    Gt,          // >
    GtEq,        // >=
    And,         // and
    Or,          // or
    Mod,         // mod
    Div,         // div

    // Brackets
    LeftParen,    // (
    RightParen,   // )
    LeftBracket,  // [
    RightBracket, // ]

    // Literals
    Number(f64),
    String(String),

    // Names
    Name(String),         // NCName
    NameTest(String),     // prefix:* or prefix:local
    NodeType(String),     // node, text, comment, processing-instruction before (
    FunctionName(String), // any other name before (
    Axis(String),         // name before ::

    DoubleColon, // ::
    Comma,       // ,
    Dollar,      // $

    Eof,
}

impl Token {
    /// Whether a following `*` or operator name is an operator
    fn ends_operand(&self) -> bool {
        matches!(
            self,
            Token::Name(_)
                | Token::NameTest(_)
                | Token::Star
                | Token::Number(_)
                | Token::String(_)
                | Token::RightParen
                | Token::RightBracket
                | Token::Dot
                | Token::DoubleDot
        )
    }
}

/// XPath lexer
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    operator_expected: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input,
            pos: 0,
            operator_expected: false,
        }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.remaining().chars().nth(offset)
    }

    fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance(c.len_utf8());
            } else {
                break;
            }
        }
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<Token, String> {
        let token = self.scan()?;
        self.operator_expected = token.ends_operand();
        Ok(token)
    }

    fn single(&mut self, token: Token) -> Result<Token, String> {
        self.advance(1);
        Ok(token)
    }

    fn scan(&mut self) -> Result<Token, String> {
        self.skip_whitespace();

        let Some(c) = self.peek() else {
            return Ok(Token::Eof);
        };

        match c {
            '/' => {
                self.advance(1);
                if self.peek() == Some('/') {
                    self.advance(1);
                    Ok(Token::DoubleSlash)
                } else {
                    Ok(Token::Slash)
                }
            }
            '.' => {
                if self.peek_at(1) == Some('.') {
                    self.advance(2);
                    Ok(Token::DoubleDot)
                } else if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
                    Ok(self.read_number())
                } else {
                    self.single(Token::Dot)
                }
            }
            '@' => self.single(Token::At),
            '|' => self.single(Token::Pipe),
            '+' => self.single(Token::Plus),
            '-' => self.single(Token::Minus),
            '*' => {
                if self.operator_expected {
                    self.single(Token::Multiply)
                } else {
                    self.single(Token::Star)
                }
            }
            '=' => self.single(Token::Eq),
            '!' => {
                if self.peek_at(1) == Some('=') {
                    self.advance(2);
                    Ok(Token::NotEq)
                } else {
                    Err(format!("unexpected character '!' at {}", self.pos))
                }
            }
            '<' => {
                self.advance(1);
                if self.peek() == Some('=') {
                    self.advance(1);
                    Ok(Token::LtEq)
                } else {
                    Ok(Token::Lt)
                }
            }
            '>' => {
                self.advance(1);
                if self.peek() == Some('=') {
                    self.advance(1);
                    Ok(Token::GtEq)
                } else {
                    Ok(Token::Gt)
                }
            }
            '(' => self.single(Token::LeftParen),
            ')' => self.single(Token::RightParen),
            '[' => self.single(Token::LeftBracket),
            ']' => self.single(Token::RightBracket),
            ',' => self.single(Token::Comma),
            '$' => self.single(Token::Dollar),
            ':' => {
                if self.peek_at(1) == Some(':') {
                    self.advance(2);
                    Ok(Token::DoubleColon)
                } else {
                    Err(format!("unexpected character ':' at {}", self.pos))
                }
            }
            '"' | '\'' => self.read_string(c),
            '0'..='9' => Ok(self.read_number()),
            _ if is_name_start_char(c) => Ok(self.read_name_or_keyword()),
            _ => Err(format!("unexpected character '{}' at {}", c, self.pos)),
        }
    }

    fn read_number(&mut self) -> Token {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance(1);
        }
        if self.peek() == Some('.') {
            self.advance(1);
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance(1);
            }
        }
        Token::Number(self.input[start..self.pos].parse().unwrap_or(f64::NAN))
    }

    fn read_string(&mut self, quote: char) -> Result<Token, String> {
        let open = self.pos;
        self.advance(1);
        let start = self.pos;
        match self.remaining().find(quote) {
            Some(len) => {
                let value = self.input[start..start + len].to_string();
                self.advance(len + 1);
                Ok(Token::String(value))
            }
            None => Err(format!("unterminated string literal at {}", open)),
        }
    }

    fn read_ncname(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_name_char(c) {
                self.advance(c.len_utf8());
            } else {
                break;
            }
        }
        &self.input[start..self.pos]
    }

    fn read_name_or_keyword(&mut self) -> Token {
        let name = self.read_ncname();

        if self.operator_expected {
            match name {
                "and" => return Token::And,
                "or" => return Token::Or,
                "mod" => return Token::Mod,
                "div" => return Token::Div,
                _ => {}
            }
        }

        // prefix:local and prefix:*
        if self.peek() == Some(':') && self.peek_at(1) != Some(':') {
            if self.peek_at(1) == Some('*') {
                self.advance(2);
                return Token::NameTest(format!("{}:*", name));
            }
            if self.peek_at(1).is_some_and(is_name_start_char) {
                self.advance(1);
                let local = self.read_ncname();
                return Token::NameTest(format!("{}:{}", name, local));
            }
        }

        let save = self.pos;
        self.skip_whitespace();
        if self.remaining().starts_with("::") {
            return Token::Axis(name.to_string());
        }
        if self.peek() == Some('(') {
            return match name {
                "node" | "text" | "comment" | "processing-instruction" => {
                    Token::NodeType(name.to_string())
                }
                _ => Token::FunctionName(name.to_string()),
            };
        }
        self.pos = save;
        Token::Name(name.to_string())
    }

    /// Tokenize entire input
    pub fn tokenize(&mut self) -> Result<Vec<Token>, String> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            if token == Token::Eof {
                break;
            }
            tokens.push(token);
        }
        Ok(tokens)
    }
}

fn is_name_start_char(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '.'
}
