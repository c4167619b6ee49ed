//! Schema validation of Query Facts
//!
//! Annotates every Column Fact with `isValid` and `dataType` against a
//! [`SchemaModel`]. Columns of tables the schema does not know are left
//! unjudged. Nested CTE and subquery facts are validated against their own
//! table lists.

use serde::Serialize;
use sqlfacts_core::{
    AmbiguousColumnPolicy, ColumnFact, Diagnostic, DiagnosticCode, QueryFact, SchemaModel,
    Severity,
};
use std::collections::HashMap;
use tracing::{debug, trace};

/// A column the validator could not confirm
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    /// No referenced table defines the column
    UnknownColumn {
        column: String,
        table: Option<String>,
    },

    /// More than one referenced table defines an unqualified column
    AmbiguousColumn {
        column: String,
        candidates: Vec<String>,
    },
}

/// Outcome counts of one validation pass, nested facts included
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    pub valid: usize,
    pub invalid: usize,

    /// Columns left unjudged because their table is not in the schema
    pub unknown: usize,

    pub ambiguous: usize,

    pub issues: Vec<ValidationIssue>,
}

impl ValidationSummary {
    pub fn is_clean(&self) -> bool {
        self.invalid == 0
    }

    /// Convert issues to diagnostics
    pub fn to_diagnostics(&self) -> Vec<Diagnostic> {
        self.issues
            .iter()
            .map(|issue| match issue {
                ValidationIssue::UnknownColumn { column, table } => {
                    let subject = match table {
                        Some(table) => format!("{}.{}", table, column),
                        None => column.clone(),
                    };
                    Diagnostic::new(
                        DiagnosticCode::SchemaUnknownColumn,
                        Severity::Error,
                        format!("Column '{}' does not exist in the schema", subject),
                    )
                    .with_subject(subject)
                }
                ValidationIssue::AmbiguousColumn { column, candidates } => Diagnostic::new(
                    DiagnosticCode::SchemaAmbiguousColumn,
                    Severity::Warn,
                    format!(
                        "Column '{}' is ambiguous: defined by {}",
                        column,
                        candidates.join(", ")
                    ),
                )
                .with_subject(column.clone()),
            })
            .collect()
    }
}

/// Validates Query Facts against one schema model
pub struct SchemaValidator<'a> {
    schema: &'a SchemaModel,
    policy: AmbiguousColumnPolicy,
}

impl<'a> SchemaValidator<'a> {
    pub fn new(schema: &'a SchemaModel) -> Self {
        Self {
            schema,
            policy: AmbiguousColumnPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: AmbiguousColumnPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Annotate `fact` and its nested facts in place
    pub fn validate(&self, fact: &mut QueryFact) -> ValidationSummary {
        let mut summary = ValidationSummary::default();
        self.validate_fact(fact, &mut summary);

        debug!(
            valid = summary.valid,
            invalid = summary.invalid,
            unknown = summary.unknown,
            ambiguous = summary.ambiguous,
            "validated query fact"
        );
        summary
    }

    fn validate_fact(&self, fact: &mut QueryFact, summary: &mut ValidationSummary) {
        for nested in fact.ctes.iter_mut().chain(fact.subqueries.iter_mut()) {
            self.validate_fact(nested, summary);
        }

        // alias or name (lower-cased) -> real table name
        let mut aliases: HashMap<String, String> = HashMap::new();
        let mut referenced: Vec<String> = Vec::new();
        for table in &fact.tables {
            aliases.insert(table.name.to_lowercase(), table.name.clone());
            if let Some(alias) = &table.alias {
                aliases.insert(alias.to_lowercase(), table.name.clone());
            }
            if !referenced
                .iter()
                .any(|name| name.eq_ignore_ascii_case(&table.name))
            {
                referenced.push(table.name.clone());
            }
        }

        let mut adopted = false;
        for column in fact.columns.iter_mut().filter(|column| !column.is_wildcard()) {
            match column.table.clone() {
                Some(qualifier) => {
                    let table = aliases
                        .get(&qualifier.to_lowercase())
                        .cloned()
                        .unwrap_or(qualifier);
                    self.check_qualified(column, &table, summary);
                }
                None => adopted |= self.check_unqualified(column, &referenced, summary),
            }
        }

        if adopted {
            fact.dedup_columns();
        }
    }

    fn check_qualified(&self, column: &mut ColumnFact, table: &str, summary: &mut ValidationSummary) {
        if !self.schema.has_table(table) {
            trace!(table, column = %column.name, "table not in schema; column left unjudged");
            column.clear_validation();
            summary.unknown += 1;
            return;
        }

        match self.schema.column_type(table, &column.name) {
            Some(data_type) => {
                column.mark_valid(Some(data_type.to_string()));
                summary.valid += 1;
            }
            None => {
                column.mark_invalid();
                summary.invalid += 1;
                summary.issues.push(ValidationIssue::UnknownColumn {
                    column: column.name.clone(),
                    table: Some(table.to_string()),
                });
            }
        }
    }

    /// Returns true when the column adopted a table
    fn check_unqualified(
        &self,
        column: &mut ColumnFact,
        referenced: &[String],
        summary: &mut ValidationSummary,
    ) -> bool {
        let matches: Vec<(&String, &str)> = referenced
            .iter()
            .filter_map(|table| {
                self.schema
                    .column_type(table, &column.name)
                    .map(|data_type| (table, data_type))
            })
            .collect();

        match matches.as_slice() {
            [(table, data_type)] => {
                column.table = Some((*table).clone());
                column.mark_valid(Some(data_type.to_string()));
                summary.valid += 1;
                true
            }
            [] => {
                column.mark_invalid();
                summary.invalid += 1;
                summary.issues.push(ValidationIssue::UnknownColumn {
                    column: column.name.clone(),
                    table: None,
                });
                false
            }
            candidates => {
                match self.policy {
                    AmbiguousColumnPolicy::AssumeValid => column.mark_valid(None),
                    AmbiguousColumnPolicy::Unknown => column.clear_validation(),
                }
                summary.ambiguous += 1;
                summary.issues.push(ValidationIssue::AmbiguousColumn {
                    column: column.name.clone(),
                    candidates: candidates.iter().map(|(table, _)| (*table).clone()).collect(),
                });
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddl::DdlExtractor;
    use crate::extractor::StatementExtractor;
    use crate::parser::SqlParser;
    use pretty_assertions::assert_eq;

    const DDL: &str = "
        CREATE TABLE users (id SERIAL PRIMARY KEY, name VARCHAR(100), email TEXT);
        CREATE TABLE orders (id SERIAL PRIMARY KEY, user_id INT REFERENCES users(id), total NUMERIC(10,2));
    ";

    fn schema() -> SchemaModel {
        DdlExtractor::new().parse_schema(DDL).unwrap()
    }

    fn fact(sql: &str) -> QueryFact {
        let parsed = SqlParser::new().parse(sql).unwrap();
        StatementExtractor::new().extract(parsed.first_statement().unwrap(), sql)
    }

    #[test]
    fn qualified_columns_through_aliases() {
        let schema = schema();
        let mut fact = fact("SELECT u.name, u.nickname, o.total FROM users u JOIN orders o ON u.id = o.user_id");
        let summary = SchemaValidator::new(&schema).validate(&mut fact);

        let name = fact.column(Some("users"), "name").unwrap();
        assert_eq!(name.is_valid, Some(true));
        assert_eq!(name.data_type.as_deref(), Some("VARCHAR(100)"));

        let nickname = fact.column(Some("users"), "nickname").unwrap();
        assert_eq!(nickname.is_valid, Some(false));
        assert_eq!(nickname.data_type, None);

        assert_eq!(fact.column(Some("orders"), "total").unwrap().data_type.as_deref(), Some("NUMERIC(10,2)"));
        assert_eq!(summary.invalid, 1);
        assert_eq!(
            summary.issues,
            vec![ValidationIssue::UnknownColumn {
                column: "nickname".to_string(),
                table: Some("users".to_string()),
            }]
        );
    }

    #[test]
    fn unknown_table_left_unset() {
        let schema = schema();
        let mut fact = fact("SELECT p.sku FROM products p");
        let summary = SchemaValidator::new(&schema).validate(&mut fact);

        assert_eq!(fact.columns[0].is_valid, None);
        assert_eq!(summary.unknown, 1);
        assert!(summary.is_clean());
    }

    #[test]
    fn unqualified_column_adopts_single_table() {
        let schema = schema();
        let mut fact = fact("SELECT email FROM users u JOIN orders o ON u.id = o.user_id WHERE total > 10");
        SchemaValidator::new(&schema).validate(&mut fact);

        let email = fact.column(Some("users"), "email").unwrap();
        assert_eq!(email.is_valid, Some(true));
        assert_eq!(email.data_type.as_deref(), Some("TEXT"));
        assert!(fact.column(None, "email").is_none());
        assert!(fact.column(Some("orders"), "total").unwrap().is_filter_column);
    }

    #[test]
    fn adopted_column_merges_with_qualified_entry() {
        let schema = schema();
        let mut fact = fact("SELECT user_id FROM orders o WHERE o.user_id > 3");
        SchemaValidator::new(&schema).validate(&mut fact);

        assert_eq!(fact.columns.len(), 1);
        let user_id = &fact.columns[0];
        assert_eq!(user_id.table.as_deref(), Some("orders"));
        assert!(user_id.is_selected && user_id.is_filter_column);
    }

    #[test]
    fn unqualified_column_with_no_match_is_invalid() {
        let schema = schema();
        let mut fact = fact("SELECT missing FROM users");
        let summary = SchemaValidator::new(&schema).validate(&mut fact);

        assert_eq!(fact.column(None, "missing").unwrap().is_valid, Some(false));
        assert!(!summary.is_clean());
        assert_eq!(summary.to_diagnostics()[0].code, DiagnosticCode::SchemaUnknownColumn);
    }

    #[test]
    fn ambiguous_column_policies() {
        let schema = schema();

        let mut assumed = fact("SELECT id FROM users u JOIN orders o ON u.id = o.user_id");
        let summary = SchemaValidator::new(&schema).validate(&mut assumed);
        let id = assumed.column(None, "id").unwrap();
        assert_eq!(id.is_valid, Some(true));
        assert_eq!(id.data_type, None);
        assert_eq!(summary.ambiguous, 1);
        assert_eq!(summary.to_diagnostics()[0].severity, Severity::Warn);

        let mut unknown = fact("SELECT id FROM users u JOIN orders o ON u.id = o.user_id");
        SchemaValidator::new(&schema)
            .with_policy(AmbiguousColumnPolicy::Unknown)
            .validate(&mut unknown);
        assert_eq!(unknown.column(None, "id").unwrap().is_valid, None);
    }

    #[test]
    fn nested_facts_validated_against_own_tables() {
        let schema = schema();
        let mut fact = fact(
            "WITH big AS (SELECT user_id, total FROM orders WHERE total > 100)
             SELECT u.name FROM users u JOIN big b ON u.id = b.user_id",
        );
        SchemaValidator::new(&schema).validate(&mut fact);

        let cte = &fact.ctes[0];
        assert_eq!(cte.column(Some("orders"), "total").unwrap().is_valid, Some(true));
        // the CTE name is not a schema table
        assert_eq!(fact.column(Some("big"), "user_id").unwrap().is_valid, None);
    }

    #[test]
    fn wildcard_never_judged() {
        let schema = schema();
        let mut fact = fact("SELECT * FROM users");
        let summary = SchemaValidator::new(&schema).validate(&mut fact);

        assert_eq!(fact.columns[0].is_valid, None);
        assert_eq!(summary, ValidationSummary::default());
    }
}
