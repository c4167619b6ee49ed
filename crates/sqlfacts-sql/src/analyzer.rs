//! High-level analysis entry point
//!
//! Ties the parser, the extractors and the validator together under one
//! [`Config`] and produces Query Facts, Schema Models and reports.

use crate::ddl::DdlExtractor;
use crate::extractor::StatementExtractor;
use crate::parser::{ParseError, SqlParser};
use crate::validator::{SchemaValidator, ValidationSummary};
use sqlfacts_core::{
    AmbiguousColumnPolicy, Config, Diagnostic, DiagnosticCode, Location, QueryFact, Report,
    SchemaModel, Severity, WarningKind,
};
use tracing::debug;

/// Parser, extractor and validator settings for one session
pub struct Analyzer {
    parser: SqlParser,
    extractor: StatementExtractor,
    policy: AmbiguousColumnPolicy,
}

impl Analyzer {
    pub fn new() -> Self {
        Self::from_config(&Config::default())
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            parser: SqlParser::from_dialect(config.dialect)
                .with_recursion_limit(config.recursion_limit),
            extractor: StatementExtractor::from_config(&config.extraction),
            policy: config.validation.ambiguous_columns,
        }
    }

    /// Parse `sql` and extract its first statement
    pub fn extract_query(&self, sql: &str) -> Result<QueryFact, ParseError> {
        let parsed = self.parser.parse(sql)?;
        let statement = parsed.first_statement().ok_or(ParseError::EmptyInput)?;
        Ok(self.extractor.extract(statement, &parsed.statement_sql(0)))
    }

    /// Parse `sql` and extract one Query Fact per top-level statement
    pub fn extract_all(&self, sql: &str) -> Result<Vec<QueryFact>, ParseError> {
        let parsed = self.parser.parse(sql)?;
        Ok(parsed
            .statements
            .iter()
            .enumerate()
            .map(|(index, statement)| self.extractor.extract(statement, &parsed.statement_sql(index)))
            .collect())
    }

    pub fn parse_schema(&self, ddl: &str) -> Result<SchemaModel, ParseError> {
        let parsed = self.parser.parse(ddl)?;
        Ok(DdlExtractor::build(&parsed.statements))
    }

    pub fn validate(&self, fact: &mut QueryFact, schema: &SchemaModel) -> ValidationSummary {
        SchemaValidator::new(schema)
            .with_policy(self.policy)
            .validate(fact)
    }

    /// Analyze one SQL text into a fresh report
    pub fn analyze(&self, sql: &str, schema: Option<&SchemaModel>) -> Report {
        let mut report = Report::new();
        if let Some(schema) = schema {
            report = report.with_schema(schema.clone());
        }
        self.analyze_into(&mut report, sql, schema, None);
        report
    }

    /// Extract (and optionally validate) every statement of `sql` into `report`
    ///
    /// A parse failure becomes a single error diagnostic for the source;
    /// extraction warnings and validation issues become diagnostics as well.
    pub fn analyze_into(
        &self,
        report: &mut Report,
        sql: &str,
        schema: Option<&SchemaModel>,
        file: Option<&str>,
    ) {
        let source = file.unwrap_or("<inline>");

        let facts = match self.extract_all(sql) {
            Ok(facts) => facts,
            Err(error) => {
                debug!(source, %error, "parse failed");
                report.add_diagnostic(error.to_diagnostic(Some(source)));
                return;
            }
        };

        for mut fact in facts {
            let warnings: Vec<Diagnostic> = fact
                .all_warnings()
                .into_iter()
                .map(|warning| {
                    let code = match warning.kind {
                        WarningKind::UnsupportedConstruct => DiagnosticCode::SqlUnsupportedConstruct,
                        WarningKind::DepthLimitExceeded => DiagnosticCode::SqlDepthLimit,
                    };
                    Diagnostic::new(code, Severity::Warn, warning.message.clone())
                        .with_location(Location::new(source))
                })
                .collect();
            report.extend_diagnostics(warnings);

            if let Some(schema) = schema {
                let summary = self.validate(&mut fact, schema);
                report.extend_diagnostics(
                    summary
                        .to_diagnostics()
                        .into_iter()
                        .map(|diagnostic| diagnostic.with_location(Location::new(source))),
                );
            }

            report.add_statement(fact);
        }
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}
