//! DDL extraction
//!
//! Walks `CREATE TABLE` statements and builds the Schema Model used by the
//! validator. Table-level foreign keys are not modeled; only column-level
//! `REFERENCES` markers flag a foreign key.

use crate::parser::{ParseError, SqlParser};
use sqlfacts_core::{ColumnDetail, SchemaModel, TableDetail};
use sqlparser::ast::{
    CharacterLength, ColumnOption, CreateTable, DataType, ExactNumberInfo, ObjectName, Statement,
    TableConstraint, TimezoneInfo,
};
use tracing::debug;

/// Builds a [`SchemaModel`] from DDL text
pub struct DdlExtractor {
    parser: SqlParser,
}

impl DdlExtractor {
    pub fn new() -> Self {
        Self {
            parser: SqlParser::new(),
        }
    }

    pub fn with_parser(parser: SqlParser) -> Self {
        Self { parser }
    }

    /// Parse DDL and build the schema model
    pub fn parse_schema(&self, ddl: &str) -> Result<SchemaModel, ParseError> {
        let parsed = self.parser.parse(ddl)?;
        Ok(Self::build(&parsed.statements))
    }

    /// Build a schema model from already parsed statements
    pub fn build(statements: &[Statement]) -> SchemaModel {
        let mut model = SchemaModel::new();

        for statement in statements {
            match statement {
                Statement::CreateTable(create) => {
                    let table = Self::table_from_create(create);
                    debug!(
                        table = %table.name,
                        columns = table.columns.len(),
                        "registered table from DDL"
                    );
                    model.insert_table(table);
                }
                other => debug!(statement = %other, "skipping non CREATE TABLE statement in DDL"),
            }
        }

        model
    }

    fn table_from_create(create: &CreateTable) -> TableDetail {
        let (name, schema) = split_table_name(&create.name);

        let table_primary_key: Vec<String> = create
            .constraints
            .iter()
            .filter_map(|constraint| match constraint {
                TableConstraint::PrimaryKey { columns, .. } => Some(columns),
                _ => None,
            })
            .flatten()
            .map(|ident| ident.value.to_lowercase())
            .collect();

        let mut table = TableDetail::new(name, schema);

        for column in &create.columns {
            let mut not_null = false;
            let mut primary_key = table_primary_key.contains(&column.name.value.to_lowercase());
            let mut foreign_key = false;

            for option in &column.options {
                match &option.option {
                    ColumnOption::NotNull => not_null = true,
                    ColumnOption::Unique { is_primary, .. } if *is_primary => primary_key = true,
                    ColumnOption::ForeignKey { .. } => foreign_key = true,
                    _ => {}
                }
            }

            table.columns.push(
                ColumnDetail::new(column.name.value.clone(), normalize_data_type(&column.data_type))
                    .with_nullable(!not_null)
                    .with_primary_key(primary_key)
                    .with_foreign_key(foreign_key),
            );
        }

        table
    }
}

impl Default for DdlExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Split `db.schema.table` into the table name and the segment before it
pub(crate) fn split_table_name(name: &ObjectName) -> (String, Option<String>) {
    match name.0.as_slice() {
        [] => (String::new(), None),
        [table] => (table.value.clone(), None),
        [.., schema, table] => (table.value.clone(), Some(schema.value.clone())),
    }
}

/// Canonical display string for a declared column type
///
/// Integer spellings collapse to `INT`, `SMALLINT`, `BIGINT`, `SERIAL` and
/// `BIGSERIAL`; parameterized types keep their precision, scale or length.
pub fn normalize_data_type(data_type: &DataType) -> String {
    match data_type {
        DataType::TinyInt(_) => "TINYINT".to_string(),
        DataType::SmallInt(_) | DataType::Int2(_) => "SMALLINT".to_string(),
        DataType::Int(_) | DataType::Integer(_) | DataType::Int4(_) | DataType::MediumInt(_) => {
            "INT".to_string()
        }
        DataType::BigInt(_) | DataType::Int8(_) => "BIGINT".to_string(),
        DataType::Numeric(info) => with_number_info("NUMERIC", info),
        DataType::Decimal(info) => with_number_info("DECIMAL", info),
        DataType::Varchar(length) | DataType::CharacterVarying(length) => {
            with_length("VARCHAR", length.as_ref())
        }
        DataType::Char(length) | DataType::Character(length) => {
            with_length("CHAR", length.as_ref())
        }
        DataType::Text => "TEXT".to_string(),
        DataType::Boolean | DataType::Bool => "BOOLEAN".to_string(),
        DataType::Date => "DATE".to_string(),
        DataType::Timestamp(_, tz) => match tz {
            TimezoneInfo::WithTimeZone | TimezoneInfo::Tz => "TIMESTAMPTZ".to_string(),
            _ => "TIMESTAMP".to_string(),
        },
        DataType::Real | DataType::Float4 => "REAL".to_string(),
        DataType::Double | DataType::DoublePrecision | DataType::Float8 => {
            "DOUBLE PRECISION".to_string()
        }
        DataType::Float(_) => "FLOAT".to_string(),
        DataType::JSON => "JSON".to_string(),
        DataType::JSONB => "JSONB".to_string(),
        DataType::Uuid => "UUID".to_string(),
        DataType::Custom(name, modifiers) => {
            let base = name.to_string().to_uppercase();
            match base.as_str() {
                "SERIAL" | "SERIAL4" => "SERIAL".to_string(),
                "BIGSERIAL" | "SERIAL8" => "BIGSERIAL".to_string(),
                "SMALLSERIAL" | "SERIAL2" => "SMALLSERIAL".to_string(),
                _ if modifiers.is_empty() => base,
                _ => format!("{}({})", base, modifiers.join(",")),
            }
        }
        other => other.to_string().to_uppercase(),
    }
}

fn with_number_info(base: &str, info: &ExactNumberInfo) -> String {
    match info {
        ExactNumberInfo::None => base.to_string(),
        ExactNumberInfo::Precision(precision) => format!("{}({})", base, precision),
        ExactNumberInfo::PrecisionAndScale(precision, scale) => {
            format!("{}({},{})", base, precision, scale)
        }
    }
}

fn with_length(base: &str, length: Option<&CharacterLength>) -> String {
    match length {
        Some(length) => format!("{}({})", base, length),
        None => base.to_string(),
    }
}
