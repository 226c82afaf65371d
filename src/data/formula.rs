//! Single-variable conversion formulas (`y = f(x)`).
//!
//! A small recursive-descent parser compiles the user's text once into an expression
//! tree; evaluation substitutes `x` and never panics. Grammar, loosest binding first:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary | power)*      // juxtaposition multiplies: 2x, 3(x+1)
//! unary   := ('+' | '-') unary | power
//! power   := primary ('^' unary)?                    // right associative
//! primary := number | 'x' | 'pi' | 'e' | func '(' expr ')' | '(' expr ')'
//! ```

use thiserror::Error;

/// Deepest nesting of parentheses, calls, signs and exponents accepted by the parser.
pub const MAX_DEPTH: usize = 256;
/// Longest accepted formula, in tokens. Bounds the expression tree that evaluation walks.
pub const MAX_TOKENS: usize = 1024;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FormulaError {
    #[error("unexpected character {ch:?} at position {pos}")]
    UnexpectedChar { pos: usize, ch: char },
    #[error("invalid number {0:?}")]
    InvalidNumber(String),
    #[error("unexpected end of formula")]
    UnexpectedEnd,
    #[error("unexpected {found} at position {pos}")]
    UnexpectedToken { pos: usize, found: String },
    #[error("unknown identifier {0:?}")]
    UnknownIdentifier(String),
    #[error("unknown function {0:?}")]
    UnknownFunction(String),
    #[error("formula nests deeper than {0} levels")]
    TooDeep(usize),
    #[error("formula is longer than {0} tokens")]
    TooLong(usize),
    #[error("formula evaluated to a non-finite value ({0})")]
    NonFinite(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Func {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Sqrt,
    Abs,
    Exp,
    Ln,
    Log10,
    Log2,
    Floor,
    Ceil,
    Round,
}

impl Func {
    fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "sin" => Func::Sin,
            "cos" => Func::Cos,
            "tan" => Func::Tan,
            "asin" | "arcsin" => Func::Asin,
            "acos" | "arccos" => Func::Acos,
            "atan" | "arctan" => Func::Atan,
            "sinh" => Func::Sinh,
            "cosh" => Func::Cosh,
            "tanh" => Func::Tanh,
            "sqrt" => Func::Sqrt,
            "abs" => Func::Abs,
            "exp" => Func::Exp,
            // natural log, as in most CAS front-ends
            "ln" | "log" => Func::Ln,
            "log10" => Func::Log10,
            "log2" => Func::Log2,
            "floor" => Func::Floor,
            "ceil" => Func::Ceil,
            "round" => Func::Round,
            _ => return None,
        })
    }

    fn apply(self, v: f64) -> f64 {
        match self {
            Func::Sin => v.sin(),
            Func::Cos => v.cos(),
            Func::Tan => v.tan(),
            Func::Asin => v.asin(),
            Func::Acos => v.acos(),
            Func::Atan => v.atan(),
            Func::Sinh => v.sinh(),
            Func::Cosh => v.cosh(),
            Func::Tanh => v.tanh(),
            Func::Sqrt => v.sqrt(),
            Func::Abs => v.abs(),
            Func::Exp => v.exp(),
            Func::Ln => v.ln(),
            Func::Log10 => v.log10(),
            Func::Log2 => v.log2(),
            Func::Floor => v.floor(),
            Func::Ceil => v.ceil(),
            Func::Round => v.round(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Num(f64),
    X,
    Neg(Box<Expr>),
    Bin(Op, Box<Expr>, Box<Expr>),
    Call(Func, Box<Expr>),
}

impl Expr {
    fn eval(&self, x: f64) -> f64 {
        match self {
            Expr::Num(v) => *v,
            Expr::X => x,
            Expr::Neg(e) => -e.eval(x),
            Expr::Bin(op, a, b) => {
                let (a, b) = (a.eval(x), b.eval(x));
                match op {
                    Op::Add => a + b,
                    Op::Sub => a - b,
                    Op::Mul => a * b,
                    Op::Div => a / b,
                    Op::Pow => a.powf(b),
                }
            }
            Expr::Call(f, e) => f.apply(e.eval(x)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Num(v) => format!("number {v}"),
            Token::Ident(s) => format!("identifier {s:?}"),
            Token::Plus => "'+'".into(),
            Token::Minus => "'-'".into(),
            Token::Star => "'*'".into(),
            Token::Slash => "'/'".into(),
            Token::Caret => "'^'".into(),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
        }
    }

    /// Whether this token can begin an implicitly multiplied operand.
    fn starts_operand(&self) -> bool {
        matches!(self, Token::Num(_) | Token::Ident(_) | Token::LParen)
    }
}

fn tokenize(src: &str) -> Result<Vec<(usize, Token)>, FormulaError> {
    let chars: Vec<char> = src.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let start = i;
        match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '+' => out.push((start, Token::Plus)),
            '-' => out.push((start, Token::Minus)),
            '*' => {
                // accept "**" as power
                if chars.get(i + 1) == Some(&'*') {
                    i += 1;
                    out.push((start, Token::Caret));
                } else {
                    out.push((start, Token::Star));
                }
            }
            '/' => out.push((start, Token::Slash)),
            '^' => out.push((start, Token::Caret)),
            '(' => out.push((start, Token::LParen)),
            ')' => out.push((start, Token::RParen)),
            c if c.is_ascii_digit() || c == '.' => {
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // exponent only when followed by digits, so "2e" stays 2*e
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let v = text
                    .parse::<f64>()
                    .map_err(|_| FormulaError::InvalidNumber(text.clone()))?;
                out.push((start, Token::Num(v)));
                continue;
            }
            c if c.is_alphabetic() || c == '_' => {
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                out.push((start, Token::Ident(chars[start..i].iter().collect())));
                continue;
            }
            other => return Err(FormulaError::UnexpectedChar { pos: start, ch: other }),
        }
        i += 1;
    }
    Ok(out)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn next(&mut self) -> Option<(usize, Token)> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, want: Token) -> Result<(), FormulaError> {
        match self.next() {
            Some((_, t)) if t == want => Ok(()),
            Some((pos, t)) => Err(FormulaError::UnexpectedToken {
                pos,
                found: t.describe(),
            }),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }

    fn expr(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => Op::Add,
                Some(Token::Minus) => Op::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn term(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.unary()?;
        loop {
            let (op, rhs) = match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    (Op::Mul, self.unary()?)
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    (Op::Div, self.unary()?)
                }
                Some(t) if t.starts_operand() => (Op::Mul, self.power()?),
                _ => return Ok(lhs),
            };
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(rhs));
        }
    }

    // Every recursive path through the grammar passes here, so this is where depth is counted.
    fn unary(&mut self) -> Result<Expr, FormulaError> {
        if self.depth >= MAX_DEPTH {
            return Err(FormulaError::TooDeep(MAX_DEPTH));
        }
        self.depth += 1;
        let e = self.signed();
        self.depth -= 1;
        e
    }

    fn signed(&mut self) -> Result<Expr, FormulaError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(Expr::Neg(Box::new(self.unary()?)))
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Expr, FormulaError> {
        let base = self.primary()?;
        if self.peek() == Some(&Token::Caret) {
            self.pos += 1;
            let exp = self.unary()?;
            return Ok(Expr::Bin(Op::Pow, Box::new(base), Box::new(exp)));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr, FormulaError> {
        match self.next() {
            Some((_, Token::Num(v))) => Ok(Expr::Num(v)),
            Some((_, Token::LParen)) => {
                let inner = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some((_, Token::Ident(name))) => match name.as_str() {
                "x" | "X" => Ok(Expr::X),
                "pi" | "PI" => Ok(Expr::Num(std::f64::consts::PI)),
                "e" => Ok(Expr::Num(std::f64::consts::E)),
                _ if self.peek() == Some(&Token::LParen) => {
                    let f = Func::lookup(&name).ok_or(FormulaError::UnknownFunction(name))?;
                    self.pos += 1;
                    let arg = self.expr()?;
                    self.expect(Token::RParen)?;
                    Ok(Expr::Call(f, Box::new(arg)))
                }
                _ => Err(FormulaError::UnknownIdentifier(name)),
            },
            Some((pos, t)) => Err(FormulaError::UnexpectedToken {
                pos,
                found: t.describe(),
            }),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }
}

/// A compiled conversion formula in the variable `x`.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    expr: Expr,
}

impl Formula {
    /// Compile `source`. Blank text compiles to the identity.
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        let tokens = tokenize(source)?;
        let expr = if tokens.is_empty() {
            Expr::X
        } else {
            if tokens.len() > MAX_TOKENS {
                return Err(FormulaError::TooLong(MAX_TOKENS));
            }
            let mut p = Parser {
                tokens,
                pos: 0,
                depth: 0,
            };
            let e = p.expr()?;
            if let Some((pos, t)) = p.next() {
                return Err(FormulaError::UnexpectedToken {
                    pos,
                    found: t.describe(),
                });
            }
            e
        };
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn identity() -> Self {
        Self {
            source: "x".to_string(),
            expr: Expr::X,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_identity(&self) -> bool {
        self.expr == Expr::X
    }

    /// Evaluate at `x`; a non-finite result is an error so callers can fall back.
    pub fn eval(&self, x: f64) -> Result<f64, FormulaError> {
        let y = self.expr.eval(x);
        if y.is_finite() {
            Ok(y)
        } else {
            Err(FormulaError::NonFinite(y))
        }
    }
}

impl std::str::FromStr for Formula {
    type Err = FormulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Formula::parse(s)
    }
}

impl std::fmt::Display for Formula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}
