//! Query Fact model
//!
//! The normalized, role-annotated extraction result of one SQL statement.
//! Field names and nesting are part of the JSON wire contract consumed by the
//! diagram and prompt builders. Do not rename serialized fields.

use serde::{Deserialize, Serialize};

/// Kind of statement a Query Fact was extracted from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
    /// Body of a common table expression
    Cte,
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Select => write!(f, "SELECT"),
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
            Self::Cte => write!(f, "CTE"),
        }
    }
}

/// Join flavour of an extracted equi-join edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl std::fmt::Display for JoinType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inner => write!(f, "INNER"),
            Self::Left => write!(f, "LEFT"),
            Self::Right => write!(f, "RIGHT"),
            Self::Full => write!(f, "FULL"),
            Self::Cross => write!(f, "CROSS"),
        }
    }
}

/// How a column is used at one reference site
///
/// Roles are not exclusive on a [`ColumnFact`]: every observed role is OR-ed
/// into the fact's flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnRole {
    /// Appears in the SELECT list
    Selected,

    /// One side of an extracted equi-join
    Join,

    /// WHERE, GROUP BY, ORDER BY or HAVING usage
    Filter,

    /// Written by INSERT or UPDATE
    Modified,

    /// Plain reference with no specific role
    Reference,
}

/// One FROM-clause or target-table reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableFact {
    /// Table name (or CTE / derived-table alias for virtual tables)
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// Schema qualifier, e.g. `public` in `public.users`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

impl TableFact {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            schema: None,
        }
    }

    pub fn with_alias(mut self, alias: Option<String>) -> Self {
        self.alias = alias;
        self
    }

    pub fn with_schema(mut self, schema: Option<String>) -> Self {
        self.schema = schema;
        self
    }

    /// Identity of a table reference is `(name, alias)`
    pub fn same_identity(&self, other: &TableFact) -> bool {
        self.name == other.name && self.alias == other.alias
    }

    pub fn alias_matches(&self, qualifier: &str) -> bool {
        self.alias
            .as_deref()
            .is_some_and(|alias| alias.eq_ignore_ascii_case(qualifier))
    }

    pub fn name_matches(&self, qualifier: &str) -> bool {
        self.name.eq_ignore_ascii_case(qualifier)
    }
}

/// A column reference with its usage roles and optional validation result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnFact {
    pub name: String,

    /// Owning table name (or literal qualifier when unresolved)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    #[serde(default)]
    pub is_selected: bool,

    #[serde(default)]
    pub is_join_column: bool,

    #[serde(default)]
    pub is_filter_column: bool,

    #[serde(default)]
    pub is_modified: bool,

    /// `None` until validated against a schema that knows the table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_valid: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

impl ColumnFact {
    pub fn new(name: impl Into<String>, table: Option<String>) -> Self {
        Self {
            name: name.into(),
            table,
            alias: None,
            is_selected: false,
            is_join_column: false,
            is_filter_column: false,
            is_modified: false,
            is_valid: None,
            data_type: None,
        }
    }

    pub fn with_alias(mut self, alias: Option<String>) -> Self {
        self.alias = alias;
        self
    }

    pub fn with_role(mut self, role: ColumnRole) -> Self {
        self.apply_role(role);
        self
    }

    pub fn apply_role(&mut self, role: ColumnRole) {
        match role {
            ColumnRole::Selected => self.is_selected = true,
            ColumnRole::Join => self.is_join_column = true,
            ColumnRole::Filter => self.is_filter_column = true,
            ColumnRole::Modified => self.is_modified = true,
            ColumnRole::Reference => {}
        }
    }

    /// Dedup key; unqualified columns use `""` as their table
    pub fn key(&self) -> (&str, &str) {
        (self.table.as_deref().unwrap_or(""), self.name.as_str())
    }

    /// Key comparison; identifiers compare case-insensitively like table lookup
    pub fn has_key(&self, table: &str, name: &str) -> bool {
        let (own_table, own_name) = self.key();
        own_table.eq_ignore_ascii_case(table) && own_name.eq_ignore_ascii_case(name)
    }

    pub fn is_wildcard(&self) -> bool {
        self.name == "*"
    }

    /// OR-merge the role flags of another fact for the same column
    ///
    /// The first non-empty alias wins, as does the first known validity.
    pub fn merge(&mut self, other: &ColumnFact) {
        self.is_selected |= other.is_selected;
        self.is_join_column |= other.is_join_column;
        self.is_filter_column |= other.is_filter_column;
        self.is_modified |= other.is_modified;

        if self.alias.as_deref().map_or(true, str::is_empty) {
            if let Some(alias) = other.alias.as_ref().filter(|a| !a.is_empty()) {
                self.alias = Some(alias.clone());
            }
        }

        if self.is_valid.is_none() && other.is_valid.is_some() {
            self.is_valid = other.is_valid;
            self.data_type = other.data_type.clone();
        }
    }

    pub fn mark_valid(&mut self, data_type: Option<String>) {
        self.is_valid = Some(true);
        self.data_type = data_type;
    }

    pub fn mark_invalid(&mut self) {
        self.is_valid = Some(false);
        self.data_type = None;
    }

    pub fn clear_validation(&mut self) {
        self.is_valid = None;
        self.data_type = None;
    }
}

/// One equi-join edge taken from an `ON a.x = b.y` predicate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinFact {
    #[serde(rename = "type")]
    pub join_type: JoinType,

    pub left_table: String,

    pub right_table: String,

    pub left_column: String,

    pub right_column: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// Category of a non-fatal extraction problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Recognized by the parser but deliberately not modeled
    UnsupportedConstruct,

    /// Traversal stopped descending at the configured depth cap
    DepthLimitExceeded,
}

/// A non-fatal extraction warning; the rest of the statement is still extracted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionWarning {
    pub kind: WarningKind,
    pub message: String,
}

/// Extraction result of one statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryFact {
    #[serde(rename = "type")]
    pub query_type: QueryType,

    pub tables: Vec<TableFact>,

    /// Unique by `(table, name)`
    pub columns: Vec<ColumnFact>,

    pub joins: Vec<JoinFact>,

    pub where_conditions: Vec<String>,

    pub ctes: Vec<QueryFact>,

    pub subqueries: Vec<QueryFact>,

    pub raw_sql: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ExtractionWarning>,
}

impl QueryFact {
    pub fn new(query_type: QueryType, raw_sql: impl Into<String>) -> Self {
        Self {
            query_type,
            tables: Vec::new(),
            columns: Vec::new(),
            joins: Vec::new(),
            where_conditions: Vec::new(),
            ctes: Vec::new(),
            subqueries: Vec::new(),
            raw_sql: raw_sql.into(),
            warnings: Vec::new(),
        }
    }

    /// Add a table unless one with the same identity is already listed
    pub fn add_table(&mut self, table: TableFact) -> bool {
        if self.tables.iter().any(|t| t.same_identity(&table)) {
            return false;
        }
        self.tables.push(table);
        true
    }

    /// Record a column, merging roles into an existing `(table, name)` entry
    ///
    /// The first-seen spelling of the name is kept.
    pub fn record_column(&mut self, column: ColumnFact) {
        let (table, name) = column.key();
        match self.columns.iter_mut().find(|c| c.has_key(table, name)) {
            Some(existing) => existing.merge(&column),
            None => self.columns.push(column),
        }
    }

    /// Collapse entries sharing a `(table, name)` key, keeping first-seen order
    pub fn dedup_columns(&mut self) {
        let columns = std::mem::take(&mut self.columns);
        for column in columns {
            self.record_column(column);
        }
    }

    /// Merge the tables and columns a nested fact exposes into this one
    pub fn merge_exposed(&mut self, child: &QueryFact) {
        for table in &child.tables {
            self.add_table(table.clone());
        }
        for column in &child.columns {
            self.record_column(column.clone());
        }
    }

    pub fn add_condition(&mut self, condition: String) {
        self.where_conditions.push(condition);
    }

    pub fn push_warning(&mut self, kind: WarningKind, message: impl Into<String>) {
        let warning = ExtractionWarning {
            kind,
            message: message.into(),
        };
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }

    /// Look up a column by owning table (`None` for unqualified) and name
    pub fn column(&self, table: Option<&str>, name: &str) -> Option<&ColumnFact> {
        let table = table.unwrap_or("");
        self.columns.iter().find(|c| c.has_key(table, name))
    }

    /// Distinct table names in first-seen order
    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for table in &self.tables {
            if !names.contains(&table.name.as_str()) {
                names.push(&table.name);
            }
        }
        names
    }

    /// Warnings of this fact and every nested CTE/subquery fact
    pub fn all_warnings(&self) -> Vec<&ExtractionWarning> {
        let mut warnings: Vec<&ExtractionWarning> = self.warnings.iter().collect();
        for nested in self.ctes.iter().chain(self.subqueries.iter()) {
            warnings.extend(nested.all_warnings());
        }
        warnings
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn record_column_merges_roles() {
        let mut fact = QueryFact::new(QueryType::Select, "SELECT id FROM t WHERE id > 5");
        fact.record_column(ColumnFact::new("id", None).with_role(ColumnRole::Selected));
        fact.record_column(ColumnFact::new("id", None).with_role(ColumnRole::Filter));

        assert_eq!(fact.columns.len(), 1);
        assert!(fact.columns[0].is_selected);
        assert!(fact.columns[0].is_filter_column);
        assert!(!fact.columns[0].is_join_column);
    }

    #[test]
    fn record_column_ignores_identifier_case() {
        let mut fact = QueryFact::new(QueryType::Select, "SELECT Id FROM t WHERE id > 5");
        fact.record_column(ColumnFact::new("Id", None).with_role(ColumnRole::Selected));
        fact.record_column(ColumnFact::new("id", None).with_role(ColumnRole::Filter));
        fact.record_column(ColumnFact::new("ID", Some("T".to_string())).with_role(ColumnRole::Join));
        fact.record_column(ColumnFact::new("id", Some("t".to_string())).with_role(ColumnRole::Filter));

        assert_eq!(fact.columns.len(), 2);
        assert_eq!(fact.columns[0].name, "Id");
        assert!(fact.columns[0].is_selected && fact.columns[0].is_filter_column);
        assert_eq!(fact.columns[1].name, "ID");
        assert!(fact.columns[1].is_join_column && fact.columns[1].is_filter_column);
        assert!(fact.column(Some("t"), "Id").is_some());
    }

    #[test]
    fn first_non_empty_alias_wins() {
        let mut column = ColumnFact::new("name", Some("users".to_string()));
        column.merge(&ColumnFact::new("name", None).with_alias(Some("user_name".to_string())));
        column.merge(&ColumnFact::new("name", None).with_alias(Some("other".to_string())));

        assert_eq!(column.alias.as_deref(), Some("user_name"));
    }

    #[test]
    fn qualified_and_unqualified_columns_stay_apart() {
        let mut fact = QueryFact::new(QueryType::Select, "");
        fact.record_column(ColumnFact::new("id", None));
        fact.record_column(ColumnFact::new("id", Some("users".to_string())));

        assert_eq!(fact.columns.len(), 2);
        assert!(fact.column(None, "id").is_some());
        assert!(fact.column(Some("users"), "id").is_some());
    }

    #[test]
    fn add_table_dedups_by_identity() {
        let mut fact = QueryFact::new(QueryType::Select, "");
        assert!(fact.add_table(TableFact::new("users").with_alias(Some("u".to_string()))));
        assert!(!fact.add_table(TableFact::new("users").with_alias(Some("u".to_string()))));
        assert!(fact.add_table(TableFact::new("users")));

        assert_eq!(fact.tables.len(), 2);
        assert_eq!(fact.table_names(), vec!["users"]);
    }

    #[test]
    fn dedup_after_table_adoption() {
        let mut fact = QueryFact::new(QueryType::Select, "");
        fact.columns.push(ColumnFact::new("id", Some("users".to_string())).with_role(ColumnRole::Selected));
        fact.columns.push(ColumnFact::new("id", Some("users".to_string())).with_role(ColumnRole::Join));
        fact.dedup_columns();

        assert_eq!(fact.columns.len(), 1);
        assert!(fact.columns[0].is_selected && fact.columns[0].is_join_column);
    }

    #[test]
    fn wire_field_names() {
        let mut fact = QueryFact::new(QueryType::Cte, "SELECT 1");
        fact.add_table(TableFact::new("users").with_alias(Some("u".to_string())));
        fact.record_column(ColumnFact::new("id", Some("users".to_string())).with_role(ColumnRole::Join));
        fact.joins.push(JoinFact {
            join_type: JoinType::Left,
            left_table: "users".to_string(),
            right_table: "orders".to_string(),
            left_column: "id".to_string(),
            right_column: "user_id".to_string(),
            condition: None,
        });

        let json = serde_json::to_value(&fact).unwrap();
        assert_eq!(json["type"], "CTE");
        assert_eq!(json["rawSql"], "SELECT 1");
        assert_eq!(json["columns"][0]["isJoinColumn"], true);
        assert_eq!(json["joins"][0]["type"], "LEFT");
        assert_eq!(json["joins"][0]["leftTable"], "users");
        assert!(json["columns"][0].get("isValid").is_none());
        assert!(json.get("warnings").is_none());
        assert!(json["whereConditions"].is_array());
    }

    #[test]
    fn validation_state_is_tri_state() {
        let mut column = ColumnFact::new("c", Some("t".to_string()));
        assert_eq!(column.is_valid, None);

        column.mark_valid(Some("INT".to_string()));
        assert_eq!(column.is_valid, Some(true));

        column.mark_invalid();
        assert_eq!(column.is_valid, Some(false));
        assert_eq!(column.data_type, None);
    }
}
