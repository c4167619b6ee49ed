//! sqlfacts core
//!
//! Core domain model with stable, versioned types: Query Facts, the Schema
//! Model, diagnostics, reports and configuration.
//! Serialized field names are a wire contract - never rename them.

pub mod diagnostic;
pub mod facts;
pub mod schema;
pub mod report;
pub mod config;

pub use diagnostic::{Diagnostic, DiagnosticCode, Severity, Location};
pub use facts::{
    ColumnFact, ColumnRole, ExtractionWarning, JoinFact, JoinType, QueryFact, QueryType,
    TableFact, WarningKind,
};
pub use schema::{ColumnDetail, SchemaModel, TableDetail};
pub use report::{Report, ReportSummary, ReportVersion};
pub use config::{
    AmbiguousColumnPolicy, Config, ConfigError, DialectConfig, ExtractionConfig, ValidationConfig,
    DEFAULT_MAX_DEPTH, DEFAULT_RECURSION_LIMIT,
};
