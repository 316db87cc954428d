// Path: crates/guardian/src/prg/expr.rs
//! The sandboxed boolean expression language for requirement leaves.
//!
//! The language is deliberately closed: literals, field/index access on the
//! activation bindings, comparison, boolean connectives, and integer
//! arithmetic. There is no call syntax, so no builtin can reach a clock,
//! I/O, or any other nondeterministic source; determinism is a property of
//! the grammar, not a runtime check.
//!
//! Expressions compile to a typed AST once and are memoized per source
//! string behind a read-write lock with double-checked insertion.

use helm_types::error::PolicyError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Host-configurable compile budgets.
#[derive(Debug, Clone, Copy)]
pub struct EvalLimits {
    /// Maximum nesting depth of the parse.
    pub max_depth: usize,
    /// Maximum number of AST nodes.
    pub max_cost: usize,
}

impl Default for EvalLimits {
    fn default() -> Self {
        // Depth is counted per grammar level, not per source paren, so a
        // single parenthesized group costs several levels.
        Self {
            max_depth: 128,
            max_cost: 512,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Str(String),
    True,
    False,
    AndAnd,
    OrOr,
    Not,
    Eq,
    Ne,
    Le,
    Ge,
    Lt,
    Gt,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Field(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Int(i64),
    Str(String),
    Bool(bool),
    Path { root: String, segments: Vec<Segment> },
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr> },
}

/// A compiled expression: the typed AST plus its measured cost.
#[derive(Debug)]
pub struct CompiledExpr {
    ast: Expr,
    /// Number of AST nodes, for observability.
    pub cost: usize,
}

fn lex(src: &str) -> Result<Vec<Token>, PolicyError> {
    let mut tokens = Vec::new();
    let mut chars = src.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '[' => {
                chars.next();
                tokens.push(Token::LBracket);
            }
            ']' => {
                chars.next();
                tokens.push(Token::RBracket);
            }
            '.' => {
                chars.next();
                tokens.push(Token::Dot);
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '%' => {
                chars.next();
                tokens.push(Token::Percent);
            }
            '&' => {
                chars.next();
                if chars.next_if_eq(&'&').is_some() {
                    tokens.push(Token::AndAnd);
                } else {
                    return Err(PolicyError::Compile("expected '&&'".to_string()));
                }
            }
            '|' => {
                chars.next();
                if chars.next_if_eq(&'|').is_some() {
                    tokens.push(Token::OrOr);
                } else {
                    return Err(PolicyError::Compile("expected '||'".to_string()));
                }
            }
            '=' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Eq);
                } else {
                    return Err(PolicyError::Compile("expected '=='".to_string()));
                }
            }
            '!' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Ne);
                } else {
                    tokens.push(Token::Not);
                }
            }
            '<' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Le);
                } else {
                    tokens.push(Token::Lt);
                }
            }
            '>' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Ge);
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => match chars.next() {
                            Some('\\') => s.push('\\'),
                            Some(q) if q == quote => s.push(q),
                            Some(other) => {
                                return Err(PolicyError::Compile(format!(
                                    "unsupported escape '\\{other}'"
                                )))
                            }
                            None => {
                                return Err(PolicyError::Compile(
                                    "unterminated string".to_string(),
                                ))
                            }
                        },
                        Some(ch) if ch == quote => break,
                        Some(ch) => s.push(ch),
                        None => {
                            return Err(PolicyError::Compile("unterminated string".to_string()))
                        }
                    }
                }
                tokens.push(Token::Str(s));
            }
            c if c.is_ascii_digit() => {
                let mut raw = String::new();
                while let Some(d) = chars.next_if(|c| c.is_ascii_digit()) {
                    raw.push(d);
                }
                let value = raw
                    .parse::<i64>()
                    .map_err(|_| PolicyError::Compile(format!("integer overflow: {raw}")))?;
                tokens.push(Token::Int(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(ch) = chars.next_if(|c| c.is_ascii_alphanumeric() || *c == '_') {
                    ident.push(ch);
                }
                tokens.push(match ident.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    _ => Token::Ident(ident),
                });
            }
            other => {
                return Err(PolicyError::Compile(format!(
                    "unexpected character {other:?}"
                )))
            }
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    nodes: usize,
    limits: EvalLimits,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> Result<(), PolicyError> {
        match self.next() {
            Some(ref token) if token == expected => Ok(()),
            other => Err(PolicyError::Compile(format!(
                "expected {expected:?}, found {other:?}"
            ))),
        }
    }

    fn node(&mut self) -> Result<(), PolicyError> {
        self.nodes += 1;
        if self.nodes > self.limits.max_cost {
            return Err(PolicyError::CostExceeded(self.limits.max_cost));
        }
        Ok(())
    }

    fn guard_depth(&self, depth: usize) -> Result<usize, PolicyError> {
        if depth >= self.limits.max_depth {
            return Err(PolicyError::DepthExceeded(self.limits.max_depth));
        }
        Ok(depth + 1)
    }

    fn parse_or(&mut self, depth: usize) -> Result<Expr, PolicyError> {
        let depth = self.guard_depth(depth)?;
        let mut lhs = self.parse_and(depth)?;
        while self.peek() == Some(&Token::OrOr) {
            self.next();
            self.node()?;
            let rhs = self.parse_and(depth)?;
            lhs = Expr::Binary {
                op: BinOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self, depth: usize) -> Result<Expr, PolicyError> {
        let depth = self.guard_depth(depth)?;
        let mut lhs = self.parse_comparison(depth)?;
        while self.peek() == Some(&Token::AndAnd) {
            self.next();
            self.node()?;
            let rhs = self.parse_comparison(depth)?;
            lhs = Expr::Binary {
                op: BinOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self, depth: usize) -> Result<Expr, PolicyError> {
        let depth = self.guard_depth(depth)?;
        let lhs = self.parse_additive(depth)?;
        let op = match self.peek() {
            Some(Token::Eq) => Some(BinOp::Eq),
            Some(Token::Ne) => Some(BinOp::Ne),
            Some(Token::Le) => Some(BinOp::Le),
            Some(Token::Ge) => Some(BinOp::Ge),
            Some(Token::Lt) => Some(BinOp::Lt),
            Some(Token::Gt) => Some(BinOp::Gt),
            _ => None,
        };
        if let Some(op) = op {
            self.next();
            self.node()?;
            let rhs = self.parse_additive(depth)?;
            return Ok(Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            });
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self, depth: usize) -> Result<Expr, PolicyError> {
        let depth = self.guard_depth(depth)?;
        let mut lhs = self.parse_multiplicative(depth)?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.next();
            self.node()?;
            let rhs = self.parse_multiplicative(depth)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self, depth: usize) -> Result<Expr, PolicyError> {
        let depth = self.guard_depth(depth)?;
        let mut lhs = self.parse_unary(depth)?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Rem,
                _ => break,
            };
            self.next();
            self.node()?;
            let rhs = self.parse_unary(depth)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self, depth: usize) -> Result<Expr, PolicyError> {
        let depth = self.guard_depth(depth)?;
        match self.peek() {
            Some(Token::Not) => {
                self.next();
                self.node()?;
                Ok(Expr::Not(Box::new(self.parse_unary(depth)?)))
            }
            Some(Token::Minus) => {
                self.next();
                self.node()?;
                Ok(Expr::Neg(Box::new(self.parse_unary(depth)?)))
            }
            _ => self.parse_primary(depth),
        }
    }

    fn parse_primary(&mut self, depth: usize) -> Result<Expr, PolicyError> {
        let depth = self.guard_depth(depth)?;
        self.node()?;
        match self.next() {
            Some(Token::Int(value)) => Ok(Expr::Int(value)),
            Some(Token::Str(value)) => Ok(Expr::Str(value)),
            Some(Token::True) => Ok(Expr::Bool(true)),
            Some(Token::False) => Ok(Expr::Bool(false)),
            Some(Token::LParen) => {
                let inner = self.parse_or(depth)?;
                self.eat(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(root)) => {
                let mut segments = Vec::new();
                loop {
                    match self.peek() {
                        Some(Token::Dot) => {
                            self.next();
                            match self.next() {
                                Some(Token::Ident(field)) => {
                                    self.node()?;
                                    segments.push(Segment::Field(field));
                                }
                                other => {
                                    return Err(PolicyError::Compile(format!(
                                        "expected field name after '.', found {other:?}"
                                    )))
                                }
                            }
                        }
                        Some(Token::LBracket) => {
                            self.next();
                            match self.next() {
                                Some(Token::Int(index)) if index >= 0 => {
                                    self.node()?;
                                    segments.push(Segment::Index(index as usize));
                                }
                                Some(Token::Str(field)) => {
                                    self.node()?;
                                    segments.push(Segment::Field(field));
                                }
                                other => {
                                    return Err(PolicyError::Compile(format!(
                                        "expected index or key, found {other:?}"
                                    )))
                                }
                            }
                            self.eat(&Token::RBracket)?;
                        }
                        _ => break,
                    }
                }
                Ok(Expr::Path { root, segments })
            }
            other => Err(PolicyError::Compile(format!(
                "unexpected token {other:?}"
            ))),
        }
    }
}

/// Compiles an expression under the given budgets.
pub fn compile(src: &str, limits: EvalLimits) -> Result<CompiledExpr, PolicyError> {
    let tokens = lex(src)?;
    if tokens.is_empty() {
        return Err(PolicyError::Compile("empty expression".to_string()));
    }
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        nodes: 0,
        limits,
    };
    let ast = parser.parse_or(0)?;
    if parser.pos != tokens.len() {
        return Err(PolicyError::Compile(format!(
            "trailing input at token {}",
            parser.pos
        )));
    }
    Ok(CompiledExpr {
        ast,
        cost: parser.nodes,
    })
}

impl CompiledExpr {
    /// Evaluates against an activation object. The result MUST be boolean.
    pub fn eval_bool(&self, activation: &Value) -> Result<bool, PolicyError> {
        match eval(&self.ast, activation)? {
            Value::Bool(b) => Ok(b),
            _ => Err(PolicyError::NotBoolean),
        }
    }
}

fn eval(expr: &Expr, activation: &Value) -> Result<Value, PolicyError> {
    match expr {
        Expr::Int(value) => Ok(Value::from(*value)),
        Expr::Str(value) => Ok(Value::String(value.clone())),
        Expr::Bool(value) => Ok(Value::Bool(*value)),
        Expr::Path { root, segments } => {
            let mut current = activation.get(root).cloned().unwrap_or(Value::Null);
            for segment in segments {
                current = match segment {
                    Segment::Field(field) => current.get(field).cloned().unwrap_or(Value::Null),
                    Segment::Index(index) => current.get(index).cloned().unwrap_or(Value::Null),
                };
            }
            Ok(current)
        }
        Expr::Not(inner) => match eval(inner, activation)? {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            other => Err(PolicyError::Eval(format!(
                "'!' requires a boolean, found {other}"
            ))),
        },
        Expr::Neg(inner) => {
            let value = as_int(&eval(inner, activation)?)?;
            value
                .checked_neg()
                .map(Value::from)
                .ok_or_else(|| PolicyError::Eval("integer overflow".to_string()))
        }
        Expr::Binary { op, lhs, rhs } => eval_binary(*op, lhs, rhs, activation),
    }
}

fn eval_binary(
    op: BinOp,
    lhs: &Expr,
    rhs: &Expr,
    activation: &Value,
) -> Result<Value, PolicyError> {
    // Short-circuit the connectives before touching the right side.
    match op {
        BinOp::And => {
            return match eval(lhs, activation)? {
                Value::Bool(false) => Ok(Value::Bool(false)),
                Value::Bool(true) => match eval(rhs, activation)? {
                    Value::Bool(b) => Ok(Value::Bool(b)),
                    other => Err(PolicyError::Eval(format!(
                        "'&&' requires booleans, found {other}"
                    ))),
                },
                other => Err(PolicyError::Eval(format!(
                    "'&&' requires booleans, found {other}"
                ))),
            };
        }
        BinOp::Or => {
            return match eval(lhs, activation)? {
                Value::Bool(true) => Ok(Value::Bool(true)),
                Value::Bool(false) => match eval(rhs, activation)? {
                    Value::Bool(b) => Ok(Value::Bool(b)),
                    other => Err(PolicyError::Eval(format!(
                        "'||' requires booleans, found {other}"
                    ))),
                },
                other => Err(PolicyError::Eval(format!(
                    "'||' requires booleans, found {other}"
                ))),
            };
        }
        _ => {}
    }

    let left = eval(lhs, activation)?;
    let right = eval(rhs, activation)?;
    match op {
        BinOp::Eq => Ok(Value::Bool(left == right)),
        BinOp::Ne => Ok(Value::Bool(left != right)),
        BinOp::Lt => Ok(Value::Bool(as_int(&left)? < as_int(&right)?)),
        BinOp::Le => Ok(Value::Bool(as_int(&left)? <= as_int(&right)?)),
        BinOp::Gt => Ok(Value::Bool(as_int(&left)? > as_int(&right)?)),
        BinOp::Ge => Ok(Value::Bool(as_int(&left)? >= as_int(&right)?)),
        BinOp::Add => checked(as_int(&left)?.checked_add(as_int(&right)?)),
        BinOp::Sub => checked(as_int(&left)?.checked_sub(as_int(&right)?)),
        BinOp::Mul => checked(as_int(&left)?.checked_mul(as_int(&right)?)),
        BinOp::Div => {
            let divisor = as_int(&right)?;
            if divisor == 0 {
                return Err(PolicyError::Eval("division by zero".to_string()));
            }
            checked(as_int(&left)?.checked_div(divisor))
        }
        BinOp::Rem => {
            let divisor = as_int(&right)?;
            if divisor == 0 {
                return Err(PolicyError::Eval("division by zero".to_string()));
            }
            checked(as_int(&left)?.checked_rem(divisor))
        }
        BinOp::And | BinOp::Or => Err(PolicyError::Eval("unreachable connective".to_string())),
    }
}

fn checked(value: Option<i64>) -> Result<Value, PolicyError> {
    value
        .map(Value::from)
        .ok_or_else(|| PolicyError::Eval("integer overflow".to_string()))
}

fn as_int(value: &Value) -> Result<i64, PolicyError> {
    value
        .as_i64()
        .ok_or_else(|| PolicyError::Eval(format!("expected an integer, found {value}")))
}

/// The per-expression compile cache: read-mostly, with double-checked
/// insertion so the same source is never compiled twice under load.
pub struct ExprCache {
    map: RwLock<HashMap<String, Arc<CompiledExpr>>>,
    limits: EvalLimits,
}

impl ExprCache {
    /// Creates a cache with the given budgets.
    pub fn new(limits: EvalLimits) -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
            limits,
        }
    }

    /// Fetches the compiled form of `src`, compiling it on first use.
    pub fn get_or_compile(&self, src: &str) -> Result<Arc<CompiledExpr>, PolicyError> {
        if let Ok(map) = self.map.read() {
            if let Some(compiled) = map.get(src) {
                return Ok(compiled.clone());
            }
        }
        // Compile outside the write lock; insertion re-checks so a racing
        // compile of the same source keeps a single cached form.
        let compiled = Arc::new(compile(src, self.limits)?);
        let mut map = self
            .map
            .write()
            .map_err(|_| PolicyError::Eval("poisoned expression cache".to_string()))?;
        Ok(map
            .entry(src.to_string())
            .or_insert(compiled)
            .clone())
    }

    /// The number of distinct expressions cached.
    pub fn len(&self) -> usize {
        self.map.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ExprCache {
    fn default() -> Self {
        Self::new(EvalLimits::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn activation() -> Value {
        json!({
            "input": {"severity": "high", "count": 7, "flags": [true, false]},
            "action": "EXECUTE_TOOL",
            "timestamp": "2026-08-01T12:00:00.000Z"
        })
    }

    fn eval_src(src: &str) -> Result<bool, PolicyError> {
        compile(src, EvalLimits::default())?.eval_bool(&activation())
    }

    #[test]
    fn comparisons_and_connectives() {
        assert!(eval_src("input.count >= 5 && input.severity == 'high'").unwrap());
        assert!(eval_src("input.count < 5 || input.flags[0]").unwrap());
        assert!(eval_src("!(input.count == 8)").unwrap());
        assert!(!eval_src("input.severity != \"high\"").unwrap());
    }

    #[test]
    fn arithmetic_is_checked() {
        assert!(eval_src("input.count * 2 + 1 == 15").unwrap());
        assert!(eval_src("(input.count - 1) % 2 == 0").unwrap());
        assert!(matches!(
            eval_src("input.count / 0 == 1"),
            Err(PolicyError::Eval(_))
        ));
        assert!(matches!(
            eval_src("9223372036854775807 + 1 == 0"),
            Err(PolicyError::Eval(_))
        ));
    }

    #[test]
    fn missing_members_read_as_null() {
        assert!(eval_src("input.absent == input.also_absent").unwrap());
        assert!(!eval_src("input.absent == 1").unwrap());
    }

    #[test]
    fn non_boolean_result_is_an_error() {
        assert!(matches!(eval_src("1 + 1"), Err(PolicyError::NotBoolean)));
        assert!(matches!(
            eval_src("'text'"),
            Err(PolicyError::NotBoolean)
        ));
    }

    #[test]
    fn no_call_syntax_exists() {
        // Function application does not parse; there is nothing to sandbox
        // because nothing can be invoked.
        assert!(matches!(
            eval_src("now()"),
            Err(PolicyError::Compile(_))
        ));
        assert!(matches!(
            eval_src("time.now == 1"),
            Ok(false) // plain member access on an absent binding, not a call
        ));
    }

    #[test]
    fn depth_budget_enforced() {
        let deep = format!("{}1{}", "(".repeat(40), ")".repeat(40));
        assert!(matches!(
            compile(&deep, EvalLimits { max_depth: 16, max_cost: 10_000 }),
            Err(PolicyError::DepthExceeded(16))
        ));
    }

    #[test]
    fn cost_budget_enforced() {
        let wide = (0..200)
            .map(|i| format!("input.count == {i}"))
            .collect::<Vec<_>>()
            .join(" || ");
        assert!(matches!(
            compile(&wide, EvalLimits { max_depth: 64, max_cost: 100 }),
            Err(PolicyError::CostExceeded(100))
        ));
    }

    #[test]
    fn cache_compiles_once() {
        let cache = ExprCache::default();
        let a = cache.get_or_compile("input.count == 7").unwrap();
        let b = cache.get_or_compile("input.count == 7").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn short_circuit_skips_rhs_errors() {
        // The right side would error (non-integer comparison), but the left
        // side decides first.
        assert!(eval_src("true || input.severity > 3").unwrap());
        assert!(!eval_src("false && input.severity > 3").unwrap());
    }
}
