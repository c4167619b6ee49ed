//! Statement extraction
//!
//! Turns one parsed statement into a [`QueryFact`]: the tables it touches,
//! every column with the roles it plays, equi-join edges, WHERE condition
//! strings and nested facts for CTE bodies and subqueries.
//!
//! Each statement (and each nested query) is walked by its own [`Scope`].
//! A scope only resolves qualifiers against the tables it registered itself
//! plus those of enclosing scopes, so tables merged up from a nested fact
//! never capture an outer alias.

use crate::ddl::split_table_name;
use crate::expression::{column_from_parts, column_ref, equi_join_sides, ColumnRef, ExprContext};
use sqlfacts_core::{
    ColumnFact, ColumnRole, ExtractionConfig, JoinFact, JoinType, QueryFact, QueryType, TableFact,
    WarningKind,
};
use sqlparser::ast::{
    AssignmentTarget, Delete, Expr, FromTable, GroupByExpr, Ident, Insert, Join, JoinConstraint,
    JoinOperator, Query, Select, SelectItem, SetExpr, SetOperator, Statement, TableFactor,
    TableWithJoins,
};
use tracing::{debug, trace};

pub use sqlfacts_core::DEFAULT_MAX_DEPTH;

/// Extracts Query Facts from parsed statements
#[derive(Debug, Clone, Copy)]
pub struct StatementExtractor {
    max_depth: usize,
}

impl StatementExtractor {
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            max_depth: config.max_depth,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Extract the Query Fact of one top-level statement
    ///
    /// `raw_sql` is kept verbatim as the fact's `rawSql`. Statement kinds other
    /// than SELECT, INSERT, UPDATE and DELETE yield an empty SELECT fact.
    pub fn extract(&self, statement: &Statement, raw_sql: &str) -> QueryFact {
        let fact = QueryFact::new(statement_kind(statement), raw_sql);
        let mut scope = Scope::new(fact, Vec::new(), 0, self.max_depth);
        scope.statement(statement);
        let fact = scope.finish();

        debug!(
            query_type = %fact.query_type,
            tables = fact.tables.len(),
            columns = fact.columns.len(),
            joins = fact.joins.len(),
            warnings = fact.warnings.len(),
            "extracted statement"
        );
        fact
    }
}

impl Default for StatementExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn statement_kind(statement: &Statement) -> QueryType {
    match statement {
        Statement::Insert(_) => QueryType::Insert,
        Statement::Update { .. } => QueryType::Update,
        Statement::Delete(_) => QueryType::Delete,
        _ => QueryType::Select,
    }
}

/// Walk state for one statement or nested query
pub(crate) struct Scope {
    pub(crate) fact: QueryFact,

    /// Tables this scope registered, in registration order
    visible: Vec<TableFact>,

    /// Tables of enclosing scopes, innermost first
    outer: Vec<TableFact>,

    depth: usize,
    max_depth: usize,
}

impl Scope {
    fn new(fact: QueryFact, outer: Vec<TableFact>, depth: usize, max_depth: usize) -> Self {
        Self {
            fact,
            visible: Vec::new(),
            outer,
            depth,
            max_depth,
        }
    }

    fn finish(mut self) -> QueryFact {
        self.fact.dedup_columns();
        self.fact
    }

    /// Run `walk` one level deeper, or skip it once the depth cap is reached
    pub(crate) fn descend(&mut self, what: &str, walk: impl FnOnce(&mut Self)) {
        if self.depth >= self.max_depth {
            self.depth_exceeded(what);
            return;
        }
        self.depth += 1;
        walk(self);
        self.depth -= 1;
    }

    fn depth_exceeded(&mut self, what: &str) {
        self.fact.push_warning(
            WarningKind::DepthLimitExceeded,
            format!("{} nested deeper than {} levels was skipped", what, self.max_depth),
        );
    }

    pub(crate) fn unsupported(&mut self, message: impl Into<String>) {
        self.fact
            .push_warning(WarningKind::UnsupportedConstruct, message);
    }

    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Query(query) => self.query(query),
            Statement::Insert(insert) => self.insert(insert),
            Statement::Update {
                table,
                assignments,
                selection,
                ..
            } => {
                let target = self.table_with_joins(table);
                for assignment in assignments {
                    match &assignment.target {
                        AssignmentTarget::ColumnName(name) => {
                            self.modified_column(&name.0, target.as_deref())
                        }
                        AssignmentTarget::Tuple(names) => {
                            for name in names {
                                self.modified_column(&name.0, target.as_deref());
                            }
                        }
                    }
                    self.walk_expr(&assignment.value, ExprContext::new(ColumnRole::Reference));
                }
                if let Some(selection) = selection {
                    self.walk_expr(selection, ExprContext::predicate());
                }
            }
            Statement::Delete(delete) => self.delete(delete),
            other => debug!(statement = %other, "statement kind not extracted"),
        }
    }

    fn query(&mut self, query: &Query) {
        self.descend("query", |scope| {
            if let Some(with) = &query.with {
                if with.recursive {
                    scope.unsupported("WITH RECURSIVE is outside the supported grammar; extracted as a plain CTE");
                }
                for cte in &with.cte_tables {
                    if let Some(child) = scope.extract_nested(QueryType::Cte, &cte.query) {
                        scope.fact.merge_exposed(&child);
                        scope.fact.ctes.push(child);
                    }
                    scope.register_table(TableFact::new(cte.alias.name.value.clone()));
                }
            }

            scope.set_expr(&query.body);

            if let Some(order_by) = &query.order_by {
                for item in &order_by.exprs {
                    scope.walk_expr(&item.expr, ExprContext::new(ColumnRole::Filter));
                }
            }
        });
    }

    fn set_expr(&mut self, body: &SetExpr) {
        match body {
            SetExpr::Select(select) => self.select(select),
            SetExpr::Query(query) => self.query(query),
            SetExpr::SetOperation {
                op: SetOperator::Union,
                left,
                right,
                ..
            } => {
                // each branch resolves against its own FROM items
                for branch in [left, right] {
                    let mark = self.visible.len();
                    self.descend("UNION branch", |scope| scope.set_expr(branch));
                    self.visible.truncate(mark);
                }
            }
            SetExpr::SetOperation { op, .. } => {
                self.unsupported(format!("{} is outside the supported grammar; branches skipped", op));
            }
            other => trace!(body = %other, "set expression not walked"),
        }
    }

    fn select(&mut self, select: &Select) {
        for item in &select.from {
            self.table_with_joins(item);
        }

        for item in &select.projection {
            self.select_item(item);
        }

        if let Some(selection) = &select.selection {
            self.walk_expr(selection, ExprContext::predicate());
        }

        if let GroupByExpr::Expressions(exprs, _) = &select.group_by {
            for expr in exprs {
                self.walk_expr(expr, ExprContext::new(ColumnRole::Filter));
            }
        }

        if let Some(having) = &select.having {
            self.walk_expr(having, ExprContext::new(ColumnRole::Filter));
        }
    }

    fn select_item(&mut self, item: &SelectItem) {
        let selected = ExprContext::new(ColumnRole::Selected);
        match item {
            SelectItem::UnnamedExpr(expr) => self.walk_expr(expr, selected),
            SelectItem::ExprWithAlias { expr, alias } => {
                match column_ref(expr) {
                    Some(column) => {
                        self.record_column_ref(column, ColumnRole::Selected, Some(alias.value.clone()))
                    }
                    None => self.walk_expr(expr, selected),
                }
            }
            SelectItem::Wildcard(_) => {
                self.fact
                    .record_column(ColumnFact::new("*", None).with_role(ColumnRole::Selected));
            }
            SelectItem::QualifiedWildcard(name, _) => {
                let table = name.0.last().map(|ident| self.resolve_table(&ident.value));
                self.fact
                    .record_column(ColumnFact::new("*", table).with_role(ColumnRole::Selected));
            }
        }
    }

    /// Walk a FROM item and its joins; returns the base relation's name
    fn table_with_joins(&mut self, item: &TableWithJoins) -> Option<String> {
        let base = self.table_factor(&item.relation);

        let mut left = base.clone();
        for join in &item.joins {
            let right = self.table_factor(&join.relation);
            self.join(join, left.as_deref(), right.as_deref());
            left = right;
        }

        base
    }

    /// Register one FROM relation; returns the name columns resolve to
    fn table_factor(&mut self, factor: &TableFactor) -> Option<String> {
        match factor {
            TableFactor::Table { name, alias, .. } => {
                let (table, schema) = split_table_name(name);
                let fact = TableFact::new(table)
                    .with_alias(alias.as_ref().map(|a| a.name.value.clone()))
                    .with_schema(schema);
                let resolved = fact.name.clone();
                self.register_table(fact);
                Some(resolved)
            }
            TableFactor::Derived {
                subquery, alias, ..
            } => {
                self.nested_subquery(subquery);
                alias.as_ref().map(|alias| {
                    let name = alias.name.value.clone();
                    self.register_table(TableFact::new(name.clone()));
                    name
                })
            }
            TableFactor::NestedJoin {
                table_with_joins,
                alias,
            } => {
                let base = self.table_with_joins(table_with_joins);
                match alias {
                    Some(alias) => {
                        let name = alias.name.value.clone();
                        self.register_table(TableFact::new(name.clone()));
                        Some(name)
                    }
                    None => base,
                }
            }
            other => {
                self.unsupported(format!("FROM item `{}` is not modeled", other));
                None
            }
        }
    }

    fn join(&mut self, join: &Join, left: Option<&str>, right: Option<&str>) {
        let (join_type, constraint) = match &join.join_operator {
            JoinOperator::Inner(constraint) => (JoinType::Inner, Some(constraint)),
            JoinOperator::LeftOuter(constraint) => (JoinType::Left, Some(constraint)),
            JoinOperator::RightOuter(constraint) => (JoinType::Right, Some(constraint)),
            JoinOperator::FullOuter(constraint) => (JoinType::Full, Some(constraint)),
            JoinOperator::CrossJoin => (JoinType::Cross, None),
            _ => {
                self.unsupported(format!("join `{}` is not modeled", join));
                return;
            }
        };

        match constraint {
            Some(JoinConstraint::On(on)) => self.join_on(on, join_type, left, right),
            Some(JoinConstraint::Using(_)) => {
                self.unsupported(format!("{} join with USING is not modeled as a join edge", join_type));
            }
            Some(JoinConstraint::Natural) => {
                self.unsupported(format!("NATURAL {} join is not modeled as a join edge", join_type));
            }
            Some(JoinConstraint::None) | None => {}
        }
    }

    fn join_on(&mut self, on: &Expr, join_type: JoinType, left: Option<&str>, right: Option<&str>) {
        let Some((left_column, right_column)) = equi_join_sides(on) else {
            self.unsupported(format!(
                "join predicate `{}` is not a single column equality; no join edge recorded",
                on
            ));
            self.walk_expr(on, ExprContext::new(ColumnRole::Reference));
            return;
        };

        let left_table = self.join_side_table(&left_column, left);
        let right_table = self.join_side_table(&right_column, right);
        let (Some(left_table), Some(right_table)) = (left_table, right_table) else {
            self.unsupported(format!(
                "join predicate `{}` references a relation outside this FROM clause",
                on
            ));
            self.walk_expr(on, ExprContext::new(ColumnRole::Reference));
            return;
        };

        self.fact.record_column(
            ColumnFact::new(left_column.column.clone(), Some(left_table.clone()))
                .with_role(ColumnRole::Join),
        );
        self.fact.record_column(
            ColumnFact::new(right_column.column.clone(), Some(right_table.clone()))
                .with_role(ColumnRole::Join),
        );
        self.fact.joins.push(JoinFact {
            join_type,
            left_table,
            right_table,
            left_column: left_column.column,
            right_column: right_column.column,
            condition: Some(on.to_string()),
        });
    }

    /// Table owning one side of an equi-join; bare columns take the join's relation
    fn join_side_table(&self, column: &ColumnRef, relation: Option<&str>) -> Option<String> {
        match &column.qualifier {
            Some(qualifier) => {
                find_table(self.visible.iter().rev(), qualifier).map(|table| table.name.clone())
            }
            None => relation.map(str::to_string),
        }
    }

    fn insert(&mut self, insert: &Insert) {
        let (name, schema) = split_table_name(&insert.table_name);
        let target = TableFact::new(name)
            .with_alias(insert.table_alias.as_ref().map(|alias| alias.value.clone()))
            .with_schema(schema);
        let owner = target.name.clone();
        self.register_table(target);

        for column in &insert.columns {
            self.fact.record_column(
                ColumnFact::new(column.value.clone(), Some(owner.clone()))
                    .with_role(ColumnRole::Modified),
            );
        }

        if let Some(source) = &insert.source {
            if !matches!(source.body.as_ref(), SetExpr::Values(_)) {
                self.nested_subquery(source);
            }
        }
    }

    fn delete(&mut self, delete: &Delete) {
        let targets = match &delete.from {
            FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => tables,
        };
        for item in targets {
            self.table_with_joins(item);
        }

        if let Some(using) = &delete.using {
            for item in using {
                self.table_with_joins(item);
            }
        }

        if let Some(selection) = &delete.selection {
            self.walk_expr(selection, ExprContext::predicate());
        }
    }

    /// Record a SET target; bare names belong to the UPDATE target
    fn modified_column(&mut self, parts: &[Ident], target: Option<&str>) {
        let Some(column) = column_from_parts(parts) else {
            return;
        };
        let table = match &column.qualifier {
            Some(qualifier) => Some(self.resolve_table(qualifier)),
            None => target.map(str::to_string),
        };
        self.fact
            .record_column(ColumnFact::new(column.column, table).with_role(ColumnRole::Modified));
    }

    /// Extract a nested query into its own fact, seeing this scope's tables
    fn extract_nested(&mut self, query_type: QueryType, query: &Query) -> Option<QueryFact> {
        if self.depth >= self.max_depth {
            self.depth_exceeded("subquery");
            return None;
        }

        let outer = self
            .visible
            .iter()
            .rev()
            .chain(self.outer.iter())
            .cloned()
            .collect();
        let fact = QueryFact::new(query_type, query.to_string());
        let mut child = Scope::new(fact, outer, self.depth, self.max_depth);
        child.query(query);
        Some(child.finish())
    }

    /// Extract a subquery, keep it in `subqueries` and merge it upward
    pub(crate) fn nested_subquery(&mut self, query: &Query) {
        if let Some(child) = self.extract_nested(QueryType::Select, query) {
            self.fact.merge_exposed(&child);
            self.fact.subqueries.push(child);
        }
    }

    fn register_table(&mut self, table: TableFact) {
        self.fact.add_table(table.clone());
        self.visible.push(table);
    }

    /// Real table name for a qualifier; unmatched qualifiers are kept literally
    pub(crate) fn resolve_table(&self, qualifier: &str) -> String {
        find_table(self.visible.iter().rev(), qualifier)
            .or_else(|| find_table(self.outer.iter(), qualifier))
            .map(|table| table.name.clone())
            .unwrap_or_else(|| qualifier.to_string())
    }

    pub(crate) fn record_column_ref(
        &mut self,
        column: ColumnRef,
        role: ColumnRole,
        alias: Option<String>,
    ) {
        let table = column
            .qualifier
            .as_deref()
            .map(|qualifier| self.resolve_table(qualifier));
        trace!(
            column = %column.column,
            qualifier = ?column.qualifier,
            table = ?table,
            ?role,
            "recorded column reference"
        );
        self.fact.record_column(
            ColumnFact::new(column.column, table)
                .with_alias(alias)
                .with_role(role),
        );
    }
}

/// Alias match first, then name match, in iteration order
fn find_table<'a, I>(tables: I, qualifier: &str) -> Option<&'a TableFact>
where
    I: Iterator<Item = &'a TableFact> + Clone,
{
    tables
        .clone()
        .find(|table| table.alias_matches(qualifier))
        .or_else(|| tables.into_iter().find(|table| table.name_matches(qualifier)))
}
