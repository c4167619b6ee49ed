//! Expression walking
//!
//! Records column references with the role of the calling clause and builds
//! one `column op value` condition string per WHERE comparison leaf.

use crate::extractor::Scope;
use sqlfacts_core::ColumnRole;
use sqlparser::ast::{
    BinaryOperator, Expr, Function, FunctionArg, FunctionArgExpr, FunctionArguments, Ident,
    Subscript, UnaryOperator, WindowType,
};
use tracing::trace;

/// Role and condition mode threaded through one expression walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ExprContext {
    pub role: ColumnRole,

    /// Append condition strings for comparison leaves
    pub conditions: bool,
}

impl ExprContext {
    pub fn new(role: ColumnRole) -> Self {
        Self {
            role,
            conditions: false,
        }
    }

    /// WHERE clause: Filter role with condition strings
    pub fn predicate() -> Self {
        Self {
            role: ColumnRole::Filter,
            conditions: true,
        }
    }

    /// Operands of a leaf keep the role but never emit conditions
    pub fn operands(self) -> Self {
        Self {
            conditions: false,
            ..self
        }
    }
}

/// A direct column reference, qualifier still unresolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ColumnRef {
    pub qualifier: Option<String>,
    pub column: String,
}

/// `col`, `t.col` or `schema.t.col`; the qualifier is the part before the column
pub(crate) fn column_from_parts(parts: &[Ident]) -> Option<ColumnRef> {
    match parts {
        [] => None,
        [column] => Some(ColumnRef {
            qualifier: None,
            column: column.value.clone(),
        }),
        [.., table, column] => Some(ColumnRef {
            qualifier: Some(table.value.clone()),
            column: column.value.clone(),
        }),
    }
}

pub(crate) fn column_ref(expr: &Expr) -> Option<ColumnRef> {
    match expr {
        Expr::Identifier(ident) => column_from_parts(std::slice::from_ref(ident)),
        Expr::CompoundIdentifier(parts) => column_from_parts(parts),
        Expr::Nested(inner) => column_ref(inner),
        _ => None,
    }
}

/// Both sides of a single `col = col` predicate
pub(crate) fn equi_join_sides(expr: &Expr) -> Option<(ColumnRef, ColumnRef)> {
    match expr {
        Expr::Nested(inner) => equi_join_sides(inner),
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Eq,
            right,
        } => Some((column_ref(left)?, column_ref(right)?)),
        _ => None,
    }
}

/// Operand as written in a condition string; columns drop their qualifier
fn operand_text(expr: &Expr) -> String {
    match column_ref(expr) {
        Some(column) => column.column,
        None => expr.to_string(),
    }
}

fn is_comparison(op: &BinaryOperator) -> bool {
    matches!(
        op,
        BinaryOperator::Eq
            | BinaryOperator::NotEq
            | BinaryOperator::Lt
            | BinaryOperator::LtEq
            | BinaryOperator::Gt
            | BinaryOperator::GtEq
            | BinaryOperator::PGRegexMatch
            | BinaryOperator::PGRegexIMatch
            | BinaryOperator::PGRegexNotMatch
            | BinaryOperator::PGRegexNotIMatch
    )
}

fn negation(negated: bool) -> &'static str {
    if negated {
        "NOT "
    } else {
        ""
    }
}

/// Leaves of an `a AND b AND c` chain, left to right
fn connective_leaves<'a>(expr: &'a Expr, connective: &BinaryOperator) -> Vec<&'a Expr> {
    let mut leaves = Vec::new();
    let mut pending = vec![expr];
    while let Some(next) = pending.pop() {
        match next {
            Expr::BinaryOp { left, op, right } if op == connective => {
                pending.push(right);
                pending.push(left);
            }
            other => leaves.push(other),
        }
    }
    leaves
}

impl Scope {
    /// Walk an expression tree, recording every column reference it holds
    ///
    /// AND/OR chains are flattened so a long WHERE clause does not count
    /// against the depth cap.
    pub(crate) fn walk_expr(&mut self, expr: &Expr, ctx: ExprContext) {
        match expr {
            Expr::BinaryOp { op, .. } if matches!(op, BinaryOperator::And | BinaryOperator::Or) => {
                for leaf in connective_leaves(expr, op) {
                    self.walk_expr(leaf, ctx);
                }
            }
            _ => self.descend("expression", |scope| scope.walk_expr_node(expr, ctx)),
        }
    }

    fn walk_expr_node(&mut self, expr: &Expr, ctx: ExprContext) {
        let reference = ExprContext::new(ColumnRole::Reference);

        match expr {
            Expr::Identifier(_) | Expr::CompoundIdentifier(_) => {
                if let Some(column) = column_ref(expr) {
                    self.record_column_ref(column, ctx.role, None);
                }
            }
            Expr::BinaryOp { left, op, right } => {
                if ctx.conditions && is_comparison(op) {
                    self.fact.add_condition(format!(
                        "{} {} {}",
                        operand_text(left),
                        op,
                        operand_text(right)
                    ));
                }
                self.walk_expr(left, ctx.operands());
                self.walk_expr(right, ctx.operands());
            }
            Expr::UnaryOp {
                op: UnaryOperator::Not,
                expr: operand,
            } if ctx.conditions => self.negated_predicate(operand, ctx),
            Expr::UnaryOp { expr: operand, .. }
            | Expr::Nested(operand)
            | Expr::Cast { expr: operand, .. } => self.walk_expr(operand, ctx),
            Expr::IsDistinctFrom(left, right) => {
                self.distinct_test(left, right, "IS DISTINCT FROM", ctx)
            }
            Expr::IsNotDistinctFrom(left, right) => {
                self.distinct_test(left, right, "IS NOT DISTINCT FROM", ctx)
            }
            Expr::AnyOp {
                left,
                compare_op,
                right,
                is_some,
            } => {
                let quantifier = if *is_some { "SOME" } else { "ANY" };
                self.quantified_comparison(left, compare_op, right, quantifier, ctx)
            }
            Expr::AllOp {
                left,
                compare_op,
                right,
            } => self.quantified_comparison(left, compare_op, right, "ALL", ctx),
            Expr::IsNull(operand) => self.null_test(operand, "IS NULL", ctx),
            Expr::IsNotNull(operand) => self.null_test(operand, "IS NOT NULL", ctx),
            Expr::IsTrue(operand)
            | Expr::IsNotTrue(operand)
            | Expr::IsFalse(operand)
            | Expr::IsNotFalse(operand)
            | Expr::IsUnknown(operand)
            | Expr::IsNotUnknown(operand) => self.walk_expr(operand, ctx.operands()),
            Expr::Between {
                expr: operand,
                negated,
                low,
                high,
            } => {
                if ctx.conditions {
                    self.fact.add_condition(format!(
                        "{} {}BETWEEN {} AND {}",
                        operand_text(operand),
                        negation(*negated),
                        low,
                        high
                    ));
                }
                self.walk_expr(operand, ctx.operands());
                self.walk_expr(low, reference);
                self.walk_expr(high, reference);
            }
            Expr::InList {
                expr: operand,
                list,
                negated,
            } => {
                if ctx.conditions {
                    let items: Vec<String> = list.iter().map(ToString::to_string).collect();
                    self.fact.add_condition(format!(
                        "{} {}IN ({})",
                        operand_text(operand),
                        negation(*negated),
                        items.join(", ")
                    ));
                }
                self.walk_expr(operand, ctx.operands());
                for item in list {
                    self.walk_expr(item, reference);
                }
            }
            Expr::InSubquery {
                expr: operand,
                subquery,
                ..
            } => {
                self.walk_expr(operand, ctx.operands());
                self.nested_subquery(subquery);
            }
            Expr::Exists { subquery, .. } | Expr::Subquery(subquery) => {
                self.nested_subquery(subquery)
            }
            Expr::Like {
                negated,
                expr: operand,
                pattern,
                ..
            } => self.pattern_match(operand, pattern, *negated, "LIKE", ctx),
            Expr::ILike {
                negated,
                expr: operand,
                pattern,
                ..
            } => self.pattern_match(operand, pattern, *negated, "ILIKE", ctx),
            Expr::SimilarTo {
                expr: operand,
                pattern,
                ..
            } => {
                self.unsupported("SIMILAR TO is outside the supported grammar");
                self.walk_expr(operand, ctx.operands());
                self.walk_expr(pattern, reference);
            }
            Expr::Function(function) => self.function(function, ctx),
            Expr::Case {
                operand,
                conditions,
                results,
                else_result,
            } => {
                let branch = ctx.operands();
                if let Some(operand) = operand {
                    self.walk_expr(operand, branch);
                }
                for expr in conditions.iter().chain(results.iter()) {
                    self.walk_expr(expr, branch);
                }
                if let Some(else_result) = else_result {
                    self.walk_expr(else_result, branch);
                }
            }
            Expr::Tuple(items) => {
                for item in items {
                    self.walk_expr(item, ctx.operands());
                }
            }
            Expr::Extract { expr: operand, .. }
            | Expr::Collate { expr: operand, .. }
            | Expr::Ceil { expr: operand, .. }
            | Expr::Floor { expr: operand, .. }
            | Expr::Convert { expr: operand, .. }
            | Expr::CompositeAccess { expr: operand, .. }
            | Expr::JsonAccess { value: operand, .. }
            | Expr::Named { expr: operand, .. }
            | Expr::OuterJoin(operand)
            | Expr::Prior(operand) => self.walk_expr(operand, ctx.operands()),
            Expr::Interval(interval) => self.walk_expr(&interval.value, ctx.operands()),
            Expr::AtTimeZone {
                timestamp,
                time_zone,
            } => {
                self.walk_expr(timestamp, ctx.operands());
                self.walk_expr(time_zone, ctx.operands());
            }
            Expr::Position { expr: operand, r#in } => {
                self.walk_expr(operand, ctx.operands());
                self.walk_expr(r#in, ctx.operands());
            }
            Expr::Substring {
                expr: operand,
                substring_from,
                substring_for,
                ..
            } => {
                self.walk_expr(operand, ctx.operands());
                for part in substring_from.iter().chain(substring_for.iter()) {
                    self.walk_expr(part, ctx.operands());
                }
            }
            Expr::Trim {
                expr: operand,
                trim_what,
                trim_characters,
                ..
            } => {
                self.walk_expr(operand, ctx.operands());
                if let Some(what) = trim_what {
                    self.walk_expr(what, ctx.operands());
                }
                for character in trim_characters.iter().flatten() {
                    self.walk_expr(character, ctx.operands());
                }
            }
            Expr::Overlay {
                expr: operand,
                overlay_what,
                overlay_from,
                overlay_for,
            } => {
                self.walk_expr(operand, ctx.operands());
                self.walk_expr(overlay_what, ctx.operands());
                self.walk_expr(overlay_from, ctx.operands());
                if let Some(length) = overlay_for {
                    self.walk_expr(length, ctx.operands());
                }
            }
            Expr::Subscript {
                expr: operand,
                subscript,
            } => {
                self.walk_expr(operand, ctx.operands());
                match subscript.as_ref() {
                    Subscript::Index { index } => self.walk_expr(index, ctx.operands()),
                    Subscript::Slice {
                        lower_bound,
                        upper_bound,
                        stride,
                    } => {
                        for bound in [lower_bound, upper_bound, stride].into_iter().flatten() {
                            self.walk_expr(bound, ctx.operands());
                        }
                    }
                }
            }
            Expr::MapAccess { column, keys } => {
                self.walk_expr(column, ctx.operands());
                for key in keys {
                    self.walk_expr(&key.key, ctx.operands());
                }
            }
            Expr::Array(array) => {
                for element in &array.elem {
                    self.walk_expr(element, ctx.operands());
                }
            }
            Expr::Struct { values, .. } => {
                for value in values {
                    self.walk_expr(value, ctx.operands());
                }
            }
            Expr::InUnnest {
                expr: operand,
                array_expr,
                ..
            } => {
                self.walk_expr(operand, ctx.operands());
                self.walk_expr(array_expr, ctx.operands());
            }
            Expr::RLike {
                expr: operand,
                pattern,
                ..
            } => {
                self.walk_expr(operand, ctx.operands());
                self.walk_expr(pattern, reference);
            }
            Expr::GroupingSets(sets) => {
                self.unsupported("GROUPING SETS is outside the supported grammar");
                self.grouping_sets(sets, ctx);
            }
            Expr::Rollup(sets) | Expr::Cube(sets) => self.grouping_sets(sets, ctx),
            Expr::Value(_) | Expr::TypedString { .. } | Expr::IntroducedString { .. } => {}
            other => trace!(expr = %other, "expression kind not walked"),
        }
    }

    /// `NOT (leaf)` keeps its single leaf as `NOT leaf`
    ///
    /// Leaves under a negated compound no longer hold one by one, so they are
    /// dropped; their columns are still recorded.
    fn negated_predicate(&mut self, operand: &Expr, ctx: ExprContext) {
        let start = self.fact.where_conditions.len();
        self.walk_expr(operand, ctx);
        let leaves = self.fact.where_conditions.split_off(start);
        if let [leaf] = leaves.as_slice() {
            self.fact.add_condition(format!("NOT {leaf}"));
        }
    }

    fn distinct_test(&mut self, left: &Expr, right: &Expr, test: &str, ctx: ExprContext) {
        if ctx.conditions {
            self.fact.add_condition(format!(
                "{} {} {}",
                operand_text(left),
                test,
                operand_text(right)
            ));
        }
        self.walk_expr(left, ctx.operands());
        self.walk_expr(right, ctx.operands());
    }

    /// `col op ANY (...)`, `col op SOME (...)` and `col op ALL (...)`
    fn quantified_comparison(
        &mut self,
        left: &Expr,
        op: &BinaryOperator,
        right: &Expr,
        quantifier: &str,
        ctx: ExprContext,
    ) {
        if ctx.conditions {
            let right_text = match right {
                Expr::Subquery(_) => right.to_string(),
                _ => format!("({right})"),
            };
            self.fact.add_condition(format!(
                "{} {} {}{}",
                operand_text(left),
                op,
                quantifier,
                right_text
            ));
        }
        self.walk_expr(left, ctx.operands());
        self.walk_expr(right, ctx.operands());
    }

    fn grouping_sets(&mut self, sets: &[Vec<Expr>], ctx: ExprContext) {
        for expr in sets.iter().flatten() {
            self.walk_expr(expr, ctx.operands());
        }
    }

    fn null_test(&mut self, operand: &Expr, test: &str, ctx: ExprContext) {
        if ctx.conditions {
            self.fact
                .add_condition(format!("{} {}", operand_text(operand), test));
        }
        self.walk_expr(operand, ctx.operands());
    }

    fn pattern_match(
        &mut self,
        operand: &Expr,
        pattern: &Expr,
        negated: bool,
        keyword: &str,
        ctx: ExprContext,
    ) {
        if ctx.conditions {
            self.fact.add_condition(format!(
                "{} {}{} {}",
                operand_text(operand),
                negation(negated),
                keyword,
                pattern
            ));
        }
        self.walk_expr(operand, ctx.operands());
        self.walk_expr(pattern, ExprContext::new(ColumnRole::Reference));
    }

    /// Arguments, FILTER and window clauses all take the calling role
    fn function(&mut self, function: &Function, ctx: ExprContext) {
        let ctx = ctx.operands();

        match &function.args {
            FunctionArguments::List(list) => {
                for arg in &list.args {
                    let arg = match arg {
                        FunctionArg::Named { arg, .. } | FunctionArg::Unnamed(arg) => arg,
                        _ => continue,
                    };
                    if let FunctionArgExpr::Expr(expr) = arg {
                        self.walk_expr(expr, ctx);
                    }
                }
            }
            FunctionArguments::Subquery(query) => self.nested_subquery(query),
            FunctionArguments::None => {}
        }

        if let Some(filter) = &function.filter {
            self.walk_expr(filter, ctx);
        }

        if let Some(WindowType::WindowSpec(spec)) = &function.over {
            for expr in &spec.partition_by {
                self.walk_expr(expr, ctx);
            }
            for item in &spec.order_by {
                self.walk_expr(&item.expr, ctx);
            }
            if spec.window_frame.is_some() {
                self.unsupported("window frames (ROWS / RANGE) are outside the supported grammar");
            }
        }
    }
}
