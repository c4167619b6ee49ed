//! SQL parsing using datafusion-sqlparser-rs
//!
//! Parses SQL into AST and maps parser failures to a tagged error with an
//! optional line/column.

use regex::Regex;
use serde::Serialize;
use sqlfacts_core::{Diagnostic, DiagnosticCode, DialectConfig, Location, Severity};
use sqlparser::ast::Statement;
use sqlparser::dialect::{Dialect, GenericDialect, PostgreSqlDialect};
use sqlparser::parser::{Parser, ParserError};
use std::sync::OnceLock;

pub use sqlfacts_core::DEFAULT_RECURSION_LIMIT;

/// SQL parser with configurable dialect
pub struct SqlParser {
    dialect: Box<dyn Dialect>,
    recursion_limit: usize,
}

impl SqlParser {
    /// Create a new SQL parser for PostgreSQL, the target grammar
    pub fn new() -> Self {
        Self {
            dialect: Box::new(PostgreSqlDialect {}),
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }

    /// Create a SQL parser with the generic dialect
    pub fn generic() -> Self {
        Self {
            dialect: Box::new(GenericDialect {}),
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }

    /// Create a parser from a dialect config
    pub fn from_dialect(dialect: DialectConfig) -> Self {
        match dialect {
            DialectConfig::Postgres => Self::new(),
            DialectConfig::Ansi => Self::generic(),
        }
    }

    pub fn with_recursion_limit(mut self, recursion_limit: usize) -> Self {
        self.recursion_limit = recursion_limit;
        self
    }

    /// Parse SQL string into AST
    ///
    /// Blank input and input without any statement (e.g. `;`) are rejected
    /// with [`ParseError::EmptyInput`] before or after reaching the parser.
    pub fn parse(&self, sql: &str) -> Result<ParsedSql, ParseError> {
        if sql.trim().is_empty() {
            return Err(ParseError::EmptyInput);
        }

        let statements = Parser::new(&*self.dialect)
            .with_recursion_limit(self.recursion_limit)
            .try_with_sql(sql)
            .and_then(|mut parser| parser.parse_statements())
            .map_err(ParseError::from)?;

        if statements.is_empty() {
            return Err(ParseError::EmptyInput);
        }

        Ok(ParsedSql {
            sql: sql.to_string(),
            statements,
        })
    }
}

impl Default for SqlParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Successfully parsed SQL with AST
#[derive(Debug, Clone)]
pub struct ParsedSql {
    /// Original SQL string
    pub sql: String,

    /// Parsed statements
    pub statements: Vec<Statement>,
}

impl ParsedSql {
    pub fn first_statement(&self) -> Option<&Statement> {
        self.statements.first()
    }

    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }

    /// Source text for the statement at `index`
    ///
    /// A single-statement input keeps the caller's text; in a multi-statement
    /// input each statement is rendered back from its AST.
    pub fn statement_sql(&self, index: usize) -> String {
        if self.statements.len() == 1 {
            return self.sql.trim().trim_end_matches(';').trim_end().to_string();
        }
        self.statements
            .get(index)
            .map(|statement| statement.to_string())
            .unwrap_or_default()
    }
}

/// Tagged parse failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind")]
pub enum ParseError {
    /// Input was empty or whitespace-only
    #[error("input is empty")]
    EmptyInput,

    /// The parser rejected the input; `message` is the parser's own text
    #[error("{message}")]
    Syntax {
        message: String,
        line: Option<usize>,
        column: Option<usize>,
    },
}

impl ParseError {
    /// Build a syntax error, pulling `Line: N, Column: M` out of the message
    pub fn syntax(message: impl Into<String>) -> Self {
        let message = message.into();
        let (line, column) = match position_in(&message) {
            Some((line, column)) => (Some(line), Some(column)),
            None => (None, None),
        };
        Self::Syntax {
            message,
            line,
            column,
        }
    }

    /// Convert to a diagnostic; `file` is the source name, if any
    pub fn to_diagnostic(&self, file: Option<&str>) -> Diagnostic {
        let file = file.unwrap_or("<inline>");
        match self {
            Self::EmptyInput => Diagnostic::new(
                DiagnosticCode::SqlEmptyInput,
                Severity::Error,
                "No SQL to analyze: input is empty",
            )
            .with_location(Location::new(file)),
            Self::Syntax {
                message,
                line,
                column,
            } => {
                let location = match (line, column) {
                    (Some(line), Some(column)) => Location::with_position(file, *line, *column),
                    _ => Location::new(file),
                };
                Diagnostic::new(
                    DiagnosticCode::SqlParseError,
                    Severity::Error,
                    format!("Failed to parse SQL: {}", message),
                )
                .with_location(location)
            }
        }
    }
}

impl From<ParserError> for ParseError {
    fn from(error: ParserError) -> Self {
        Self::syntax(error.to_string())
    }
}

fn position_in(message: &str) -> Option<(usize, usize)> {
    static POSITION: OnceLock<Option<Regex>> = OnceLock::new();
    let re = POSITION
        .get_or_init(|| Regex::new(r"Line: (\d+), Column:? (\d+)").ok())
        .as_ref()?;

    let captures = re.captures(message)?;
    let line = captures.get(1)?.as_str().parse().ok()?;
    let column = captures.get(2)?.as_str().parse().ok()?;
    Some((line, column))
}
