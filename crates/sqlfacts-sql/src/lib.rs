//! SQL parsing and fact extraction
//!
//! This crate handles:
//! - Parsing SQL using datafusion-sqlparser-rs
//! - Building a Schema Model from `CREATE TABLE` DDL
//! - Extracting Query Facts (tables, role-annotated columns, joins, filter
//!   conditions, nested CTEs and subqueries) from statements
//! - Validating Query Facts against a Schema Model

pub mod parser;
pub mod capabilities;
pub mod ddl;
pub mod extractor;
mod expression;
pub mod validator;
pub mod analyzer;

pub use parser::{SqlParser, ParsedSql, ParseError, DEFAULT_RECURSION_LIMIT};
pub use capabilities::ParserCapabilities;
pub use ddl::{DdlExtractor, normalize_data_type};
pub use extractor::{StatementExtractor, DEFAULT_MAX_DEPTH};
pub use validator::{SchemaValidator, ValidationIssue, ValidationSummary};
pub use analyzer::Analyzer;

use sqlfacts_core::{QueryFact, SchemaModel};

/// Parse `sql` and extract the Query Fact of its first statement
pub fn extract_query(sql: &str) -> Result<QueryFact, ParseError> {
    Analyzer::new().extract_query(sql)
}

/// Parse DDL into a Schema Model
pub fn parse_schema(ddl: &str) -> Result<SchemaModel, ParseError> {
    DdlExtractor::new().parse_schema(ddl)
}

/// Annotate `fact` in place against `schema` with the default policy
pub fn validate(fact: &mut QueryFact, schema: &SchemaModel) -> ValidationSummary {
    SchemaValidator::new(schema).validate(fact)
}
