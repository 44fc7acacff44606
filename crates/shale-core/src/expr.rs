//! Predicate engine.
//!
//! Predicates are small boolean expressions over a row's decoded
//! values, e.g. `age >= 30 && (city = "Oslo" || city = "Bergen")`.
//! The SQL words `AND`, `OR` and `NOT` are accepted case-insensitively
//! and normalized to `&&`, `||` and `!`.
//!
//! Evaluation runs in three stages: bare identifiers are resolved
//! against the target table's columns and substituted with the current
//! row's values, the token stream is converted from infix to postfix
//! with a shunting-yard pass (`!` binds tighter than `&&`, which binds
//! tighter than `||`), and the postfix form is reduced on a stack. A
//! comparison is consumed as three consecutive tokens `lhs op rhs`;
//! the boolean connectives pop their operands.
//!
//! Comparisons are numeric only when **both** operands are non-empty
//! digit sequences (`[0-9]+`); everything else, including negative
//! numbers, compares lexicographically on the raw bytes. This is a
//! deliberate compatibility rule.

use std::cmp::Ordering;

use regex::Regex;

use crate::schema::Column;

/// Errors raised while compiling or evaluating a predicate.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExprError {
    /// An identifier does not name a column of the target table.
    #[error("unknown column '{0}' in predicate")]
    UnknownColumn(String),

    /// A token in operator position is not a comparison operator.
    #[error("unknown comparison operator '{0}'")]
    UnknownOperator(String),

    /// The expression cannot be reduced to a single boolean.
    #[error("malformed predicate: {0}")]
    Malformed(String),

    /// An empty predicate where one is required.
    #[error("predicate must not be empty")]
    Empty,
}

/// The six comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    Ge,
    /// `<=`
    Le,
}

impl CmpOp {
    /// Parses an operator token.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "=" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            ">" => Some(Self::Gt),
            "<" => Some(Self::Lt),
            ">=" => Some(Self::Ge),
            "<=" => Some(Self::Le),
            _ => None,
        }
    }

    /// The operator's source form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
        }
    }

    /// Applies the operator to an ordering between two operands.
    #[must_use]
    pub fn matches(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Gt => ordering == Ordering::Greater,
            Self::Lt => ordering == Ordering::Less,
            Self::Ge => ordering != Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
        }
    }
}

/// Returns true when the value is a non-empty ASCII digit sequence.
#[must_use]
pub fn is_numeric(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

/// Orders two raw values: numerically when both are digit sequences
/// that fit an `i64`, lexicographically otherwise.
#[must_use]
pub fn order_values(lhs: &str, rhs: &str) -> Ordering {
    if is_numeric(lhs) && is_numeric(rhs) {
        if let (Ok(l), Ok(r)) = (lhs.parse::<i64>(), rhs.parse::<i64>()) {
            return l.cmp(&r);
        }
    }
    lhs.as_bytes().cmp(rhs.as_bytes())
}

/// Compares two raw values under the engine's comparison rule.
#[must_use]
pub fn compare_values(lhs: &str, op: CmpOp, rhs: &str) -> bool {
    op.matches(order_values(lhs, rhs))
}

/// A raw predicate token. Quoted literals keep their flag so column
/// validation can tell them apart from identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    text: String,
    quoted: bool,
}

impl Token {
    fn raw(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quoted: false,
        }
    }

    fn is_bool_op(&self) -> bool {
        !self.quoted && matches!(self.text.as_str(), "&&" | "||" | "!")
    }

    fn is_paren(&self) -> bool {
        !self.quoted && matches!(self.text.as_str(), "(" | ")")
    }

    fn is_cmp_op(&self) -> bool {
        !self.quoted && CmpOp::parse(&self.text).is_some()
    }
}

/// Rewrites `AND`/`OR`/`NOT` (any case) into `&&`/`||`/`!`.
fn normalize(expr: &str) -> String {
    let and = Regex::new(r"(?i)\bAND\b").expect("valid regex");
    let or = Regex::new(r"(?i)\bOR\b").expect("valid regex");
    let not = Regex::new(r"(?i)\bNOT\b").expect("valid regex");
    let expr = and.replace_all(expr, "&&");
    let expr = or.replace_all(&expr, "||");
    not.replace_all(&expr, "!").into_owned()
}

/// Splits a predicate into tokens.
///
/// Tokens are whitespace-separated; quoted literals (single or double
/// quotes) form one token even when they contain spaces, and the
/// parentheses are standalone tokens even when glued to other text.
fn tokenize(expr: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '"' || c == '\'' {
            chars.next();
            let mut text = String::new();
            for next in chars.by_ref() {
                if next == c {
                    break;
                }
                text.push(next);
            }
            tokens.push(Token { text, quoted: true });
        } else if c == '(' || c == ')' {
            chars.next();
            tokens.push(Token::raw(c));
        } else {
            let mut text = String::new();
            while let Some(&next) = chars.peek() {
                if next.is_whitespace() || next == '(' || next == ')' || next == '"' || next == '\''
                {
                    break;
                }
                text.push(next);
                chars.next();
            }
            tokens.push(Token::raw(text));
        }
    }

    tokens
}

fn precedence(op: &str) -> u8 {
    match op {
        "!" => 3,
        "&&" => 2,
        "||" => 1,
        _ => 0,
    }
}

/// Shunting-yard conversion. Only the boolean connectives and
/// parentheses are treated as operators; comparison operators and
/// operands pass through in source order, so each comparison stays a
/// contiguous `lhs op rhs` triple in the output.
fn infix_to_postfix(tokens: Vec<Token>) -> Vec<Token> {
    let mut output = Vec::with_capacity(tokens.len());
    let mut ops: Vec<Token> = Vec::new();

    for token in tokens {
        if token.quoted {
            output.push(token);
        } else if token.text == "(" {
            ops.push(token);
        } else if token.text == ")" {
            while let Some(top) = ops.pop() {
                if top.text == "(" {
                    break;
                }
                output.push(top);
            }
        } else if token.is_bool_op() {
            while ops
                .last()
                .is_some_and(|top| precedence(&top.text) >= precedence(&token.text))
            {
                if let Some(top) = ops.pop() {
                    output.push(top);
                }
            }
            ops.push(token);
        } else {
            output.push(token);
        }
    }

    while let Some(top) = ops.pop() {
        output.push(top);
    }

    output
}

/// One element of a compiled predicate's postfix program.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PostfixToken {
    And,
    Or,
    Not,
    /// An operand or comparison operator: a literal, or a column
    /// reference resolved to its position in the row.
    Term {
        text: String,
        column: Option<usize>,
    },
}

/// A predicate compiled against one table's columns.
///
/// Compilation validates every bare identifier and fixes the postfix
/// program, so a predicate can be evaluated against many rows without
/// re-parsing.
#[derive(Debug, Clone)]
pub struct Predicate {
    postfix: Vec<PostfixToken>,
}

impl Predicate {
    /// Compiles a predicate for a table. An empty predicate compiles to
    /// "match all". Fails if **any** bare identifier is not a column.
    pub fn compile(expr: &str, columns: &[Column]) -> Result<Self, ExprError> {
        let tokens = tokenize(&normalize(expr));

        for token in &tokens {
            if token.quoted
                || token.is_bool_op()
                || token.is_paren()
                || token.is_cmp_op()
                || is_numeric(&token.text)
            {
                continue;
            }
            if !columns.iter().any(|c| c.name == token.text) {
                return Err(ExprError::UnknownColumn(token.text.clone()));
            }
        }

        let postfix = infix_to_postfix(tokens)
            .into_iter()
            .map(|token| {
                if token.is_bool_op() {
                    match token.text.as_str() {
                        "&&" => PostfixToken::And,
                        "||" => PostfixToken::Or,
                        _ => PostfixToken::Not,
                    }
                } else {
                    let column = if token.quoted {
                        None
                    } else {
                        columns.iter().position(|c| c.name == token.text)
                    };
                    PostfixToken::Term {
                        text: token.text,
                        column,
                    }
                }
            })
            .collect();

        Ok(Self { postfix })
    }

    /// True when the predicate has no tokens (matches every row).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.postfix.is_empty()
    }

    /// Evaluates the predicate against one decoded row.
    ///
    /// An empty predicate matches everything. The result depends only
    /// on the compiled expression and the row values.
    pub fn matches(&self, row: &[String]) -> Result<bool, ExprError> {
        if self.postfix.is_empty() {
            return Ok(true);
        }

        let resolve = |text: &str, column: Option<usize>| -> String {
            match column {
                Some(index) => row.get(index).cloned().unwrap_or_default(),
                None => text.to_string(),
            }
        };

        let mut stack: Vec<bool> = Vec::new();
        let mut i = 0;
        while i < self.postfix.len() {
            match &self.postfix[i] {
                PostfixToken::And | PostfixToken::Or => {
                    let b = stack
                        .pop()
                        .ok_or_else(|| ExprError::Malformed("missing operand".to_string()))?;
                    let a = stack
                        .pop()
                        .ok_or_else(|| ExprError::Malformed("missing operand".to_string()))?;
                    stack.push(match self.postfix[i] {
                        PostfixToken::And => a && b,
                        _ => a || b,
                    });
                    i += 1;
                }
                PostfixToken::Not => {
                    let a = stack
                        .pop()
                        .ok_or_else(|| ExprError::Malformed("missing operand".to_string()))?;
                    stack.push(!a);
                    i += 1;
                }
                PostfixToken::Term { text, column } => {
                    // A comparison is three consecutive terms: lhs op rhs.
                    if i + 2 >= self.postfix.len() {
                        return Err(ExprError::Malformed(format!(
                            "dangling comparison near '{text}'"
                        )));
                    }
                    let lhs = resolve(text, *column);
                    let op = match &self.postfix[i + 1] {
                        PostfixToken::Term { text, column: None } => CmpOp::parse(text)
                            .ok_or_else(|| ExprError::UnknownOperator(text.clone()))?,
                        PostfixToken::Term { text, .. } => {
                            return Err(ExprError::UnknownOperator(text.clone()))
                        }
                        _ => {
                            return Err(ExprError::Malformed(
                                "connective in operator position".to_string(),
                            ))
                        }
                    };
                    let rhs = match &self.postfix[i + 2] {
                        PostfixToken::Term { text, column } => resolve(text, *column),
                        _ => {
                            return Err(ExprError::Malformed(
                                "connective in operand position".to_string(),
                            ))
                        }
                    };
                    stack.push(compare_values(&lhs, op, &rhs));
                    i += 3;
                }
            }
        }

        match (stack.pop(), stack.is_empty()) {
            (Some(result), true) => Ok(result),
            _ => Err(ExprError::Malformed(
                "expression does not reduce to a single boolean".to_string(),
            )),
        }
    }
}

/// Recognizes a predicate that is one bare comparison,
/// `identifier <op> value`, and splits it into its parts.
///
/// Such predicates can be answered by an index point lookup instead of
/// a full expression scan. Anything else returns `None`.
#[must_use]
pub fn simple_comparison(expr: &str) -> Option<(String, CmpOp, String)> {
    let tokens = tokenize(&normalize(expr));
    let [column, op, value] = tokens.as_slice() else {
        return None;
    };
    if column.quoted || is_numeric(&column.text) || !op.is_cmp_op() {
        return None;
    }
    let op = CmpOp::parse(&op.text)?;
    Some((column.text.clone(), op, value.text.clone()))
}

/// Compiles a predicate purely for its column validation.
pub fn validate_columns(expr: &str, columns: &[Column]) -> Result<(), ExprError> {
    Predicate::compile(expr, columns).map(|_| ())
}

/// One-shot compile-and-evaluate.
pub fn evaluate(expr: &str, columns: &[Column], row: &[String]) -> Result<bool, ExprError> {
    Predicate::compile(expr, columns)?.matches(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;

    fn columns() -> Vec<Column> {
        vec![
            Column::text("a", 8),
            Column::text("b", 8),
            Column::int("age"),
            Column::text("city", 16),
        ]
    }

    fn row(a: &str, b: &str, age: &str, city: &str) -> Vec<String> {
        vec![a.to_string(), b.to_string(), age.to_string(), city.to_string()]
    }

    #[test]
    fn test_simple_equality() {
        let cols = columns();
        let r = row("1", "9", "30", "Oslo");
        assert!(evaluate("a = \"1\"", &cols, &r).unwrap());
        assert!(!evaluate("a = \"2\"", &cols, &r).unwrap());
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let cols = columns();
        let r = row("1", "9", "30", "Oslo");
        // a = "1" OR (a = "2" AND b = "3") under the real precedence.
        assert!(evaluate("a = \"1\" OR a = \"2\" AND b = \"3\"", &cols, &r).unwrap());
        // Parenthesized the other way the same row fails.
        assert!(!evaluate("( a = \"1\" OR a = \"2\" ) AND b = \"3\"", &cols, &r).unwrap());
    }

    #[test]
    fn test_parens_adjacent_to_identifiers() {
        let cols = columns();
        let r = row("1", "9", "30", "Oslo");
        assert!(!evaluate("(a = \"1\" OR a = \"2\") AND b = \"3\"", &cols, &r).unwrap());
    }

    #[test]
    fn test_not_operator() {
        let cols = columns();
        let r = row("1", "9", "30", "Oslo");
        assert!(evaluate("NOT a = \"2\"", &cols, &r).unwrap());
        assert!(!evaluate("! a = \"1\"", &cols, &r).unwrap());
    }

    #[test]
    fn test_sql_words_case_insensitive() {
        let cols = columns();
        let r = row("1", "9", "30", "Oslo");
        assert!(evaluate("a = \"1\" and b = \"9\"", &cols, &r).unwrap());
        assert!(evaluate("a = \"2\" Or b = \"9\"", &cols, &r).unwrap());
        assert!(evaluate("not a = \"2\"", &cols, &r).unwrap());
    }

    #[test]
    fn test_numeric_comparison_on_digit_operands() {
        let cols = columns();
        let r = row("x", "y", "9", "Oslo");
        // Lexicographically "9" > "30"; numerically it is not.
        assert!(!evaluate("age > 30", &cols, &r).unwrap());
        assert!(evaluate("age < 30", &cols, &r).unwrap());
        assert!(evaluate("age >= 9", &cols, &r).unwrap());
        assert!(evaluate("age <= 9", &cols, &r).unwrap());
        assert!(evaluate("age != 10", &cols, &r).unwrap());
    }

    #[test]
    fn test_negative_numbers_compare_lexicographically() {
        let cols = columns();
        let r = row("-5", "y", "30", "Oslo");
        // "-5" is not a digit sequence, so bytes decide: '-' < '1'.
        assert!(evaluate("a < \"1\"", &cols, &r).unwrap());
    }

    #[test]
    fn test_quoted_values_with_spaces() {
        let cols = columns();
        let r = row("1", "9", "30", "New York");
        assert!(evaluate("city = \"New York\"", &cols, &r).unwrap());
        assert!(evaluate("city = 'New York'", &cols, &r).unwrap());
    }

    #[test]
    fn test_unknown_column_rejected() {
        let cols = columns();
        let err = Predicate::compile("nope = \"1\"", &cols).unwrap_err();
        assert_eq!(err, ExprError::UnknownColumn("nope".to_string()));
        // Any unknown identifier fails, even after a known one.
        let err = Predicate::compile("a = \"1\" && nope = \"2\"", &cols).unwrap_err();
        assert_eq!(err, ExprError::UnknownColumn("nope".to_string()));
    }

    #[test]
    fn test_quoted_literal_is_not_an_identifier() {
        let cols = columns();
        assert!(validate_columns("a = \"not_a_column\"", &cols).is_ok());
    }

    #[test]
    fn test_empty_predicate_matches_all() {
        let cols = columns();
        let pred = Predicate::compile("", &cols).unwrap();
        assert!(pred.is_empty());
        assert!(pred.matches(&row("1", "2", "3", "4")).unwrap());
    }

    #[test]
    fn test_malformed_predicate_is_an_error() {
        let cols = columns();
        let r = row("1", "9", "30", "Oslo");
        assert!(evaluate("a =", &cols, &r).is_err());
        assert!(evaluate("&& a = \"1\"", &cols, &r).is_err());
        assert!(evaluate("a ~ \"1\"", &cols, &r).is_err());
    }

    #[test]
    fn test_simple_comparison_detection() {
        let (col, op, value) = simple_comparison("id = 2").expect("simple");
        assert_eq!(col, "id");
        assert_eq!(op, CmpOp::Eq);
        assert_eq!(value, "2");

        let (col, op, value) = simple_comparison("name >= \"bob\"").expect("simple");
        assert_eq!(col, "name");
        assert_eq!(op, CmpOp::Ge);
        assert_eq!(value, "bob");

        assert!(simple_comparison("a = 1 && b = 2").is_none());
        assert!(simple_comparison("1 = 1").is_none());
        assert!(simple_comparison("\"a\" = 1").is_none());
        assert!(simple_comparison("").is_none());
    }

    #[test]
    fn test_compiled_predicate_is_deterministic() {
        let cols = columns();
        let pred = Predicate::compile("age >= 18 && city != \"Oslo\"", &cols).unwrap();
        let r = row("1", "2", "21", "Bergen");
        let first = pred.matches(&r).unwrap();
        for _ in 0..3 {
            assert_eq!(pred.matches(&r).unwrap(), first);
        }
    }
}
