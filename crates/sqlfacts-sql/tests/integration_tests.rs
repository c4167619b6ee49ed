//! Integration tests for fact extraction and schema validation

use pretty_assertions::assert_eq;
use sqlfacts_core::{JoinType, QueryFact, QueryType, TableFact};
use sqlfacts_sql::{extract_query, parse_schema, validate, Analyzer, ParseError};
use std::collections::HashSet;

const SHOP_DDL: &str = "
    CREATE TABLE users (
        id SERIAL PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        email TEXT
    );
    CREATE TABLE orders (
        id SERIAL PRIMARY KEY,
        user_id INTEGER REFERENCES users(id),
        status VARCHAR(20),
        total NUMERIC(10,2)
    );
";

fn all_facts(fact: &QueryFact) -> Vec<&QueryFact> {
    let mut facts = vec![fact];
    for nested in fact.ctes.iter().chain(fact.subqueries.iter()) {
        facts.extend(all_facts(nested));
    }
    facts
}

#[test]
fn test_extraction_is_idempotent() {
    let sql = "WITH t AS (SELECT a.id FROM a WHERE a.flag = true)
               SELECT t.id, b.v FROM t JOIN b ON t.id = b.t_id
               WHERE b.v IN (SELECT v FROM c) ORDER BY b.v";

    let first = extract_query(sql).unwrap();
    let second = extract_query(sql).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_role_union() {
    let fact = extract_query("SELECT id FROM t WHERE id > 5").unwrap();

    let id = fact.column(None, "id").unwrap();
    assert!(id.is_selected);
    assert!(id.is_filter_column);
}

#[test]
fn test_join_symmetry() {
    let fact = extract_query("SELECT * FROM a JOIN b ON a.x = b.y").unwrap();

    assert_eq!(fact.joins.len(), 1);
    let join = &fact.joins[0];
    assert_eq!(join.left_table, "a");
    assert_eq!(join.right_table, "b");
    assert_eq!(join.left_column, "x");
    assert_eq!(join.right_column, "y");

    assert!(fact.column(Some("a"), "x").unwrap().is_join_column);
    assert!(fact.column(Some("b"), "y").unwrap().is_join_column);
}

#[test]
fn test_no_duplicate_column_keys() {
    let queries = [
        "SELECT u.id, u.id, id FROM users u WHERE u.id = 1 AND id > 0 ORDER BY u.id",
        "SELECT a.x FROM a JOIN b ON a.x = b.x JOIN c ON a.x = c.x WHERE a.x IS NOT NULL",
        "WITH s AS (SELECT id FROM t) SELECT id FROM s UNION SELECT id FROM t",
        "UPDATE t SET x = x + 1, y = x WHERE x > 3",
    ];

    for sql in queries {
        let fact = extract_query(sql).unwrap();
        for fact in all_facts(&fact) {
            let mut seen = HashSet::new();
            for column in &fact.columns {
                assert!(seen.insert(column.key()), "duplicate {:?} in {}", column.key(), sql);
            }
        }
    }
}

#[test]
fn test_join_tables_are_listed() {
    let fact = extract_query(
        "SELECT * FROM users u
         JOIN orders o ON u.id = o.user_id
         LEFT JOIN (SELECT order_id, SUM(qty) AS qty FROM items GROUP BY order_id) i
           ON o.id = i.order_id",
    )
    .unwrap();

    let names = fact.table_names();
    for join in &fact.joins {
        assert!(names.contains(&join.left_table.as_str()));
        assert!(names.contains(&join.right_table.as_str()));
    }
    assert_eq!(fact.joins[1].right_table, "i");
}

#[test]
fn test_validation_tri_state() {
    let sql = "SELECT t.c FROM t";
    let mut fact = extract_query(sql).unwrap();
    assert_eq!(fact.columns[0].is_valid, None);

    let without_table = parse_schema("CREATE TABLE other (c INT);").unwrap();
    validate(&mut fact, &without_table);
    assert_eq!(fact.columns[0].is_valid, None);

    let without_column = parse_schema("CREATE TABLE t (d INT);").unwrap();
    let mut fact = extract_query(sql).unwrap();
    validate(&mut fact, &without_column);
    assert_eq!(fact.columns[0].is_valid, Some(false));
    assert_eq!(fact.columns[0].data_type, None);

    let with_both = parse_schema("CREATE TABLE t (c BIGINT);").unwrap();
    let mut fact = extract_query(sql).unwrap();
    validate(&mut fact, &with_both);
    assert_eq!(fact.columns[0].is_valid, Some(true));
    assert_eq!(fact.columns[0].data_type.as_deref(), Some("BIGINT"));
}

#[test]
fn test_empty_input_rejected() {
    assert_eq!(extract_query("").unwrap_err(), ParseError::EmptyInput);
    assert_eq!(extract_query("   ").unwrap_err(), ParseError::EmptyInput);
    assert_eq!(parse_schema("\n\t").unwrap_err(), ParseError::EmptyInput);
}

#[test]
fn test_syntax_error_carries_parser_message() {
    let error = extract_query("SELECT id FROM users WHERE").unwrap_err();
    match error {
        ParseError::Syntax { message, .. } => assert!(!message.is_empty()),
        other => panic!("expected syntax error, got {other:?}"),
    }
}

#[test]
fn test_users_orders_scenario() {
    let fact = extract_query(
        "SELECT u.id, u.name, o.total FROM users u INNER JOIN orders o ON u.id = o.user_id WHERE o.status = 'completed'",
    )
    .unwrap();

    assert_eq!(fact.query_type, QueryType::Select);
    assert_eq!(
        fact.tables,
        vec![
            TableFact::new("users").with_alias(Some("u".to_string())),
            TableFact::new("orders").with_alias(Some("o".to_string())),
        ]
    );

    assert_eq!(fact.joins.len(), 1);
    let join = &fact.joins[0];
    assert_eq!(join.join_type, JoinType::Inner);
    assert_eq!(
        (join.left_table.as_str(), join.right_table.as_str()),
        ("users", "orders")
    );
    assert_eq!(
        (join.left_column.as_str(), join.right_column.as_str()),
        ("id", "user_id")
    );

    let id = fact.column(Some("users"), "id").unwrap();
    assert!(id.is_selected && id.is_join_column);

    let status = fact.column(Some("orders"), "status").unwrap();
    assert!(status.is_filter_column);

    assert_eq!(fact.where_conditions, vec!["status = 'completed'".to_string()]);

    let json = serde_json::to_value(&fact).unwrap();
    assert_eq!(json["joins"][0]["type"], "INNER");
    assert_eq!(json["tables"][0]["alias"], "u");
}

#[test]
fn test_users_orders_validated() {
    let schema = parse_schema(SHOP_DDL).unwrap();
    let mut fact = extract_query(
        "SELECT u.id, u.name, o.total FROM users u INNER JOIN orders o ON u.id = o.user_id WHERE o.status = 'completed'",
    )
    .unwrap();

    let summary = validate(&mut fact, &schema);
    assert_eq!(summary.invalid, 0);
    assert_eq!(summary.unknown, 0);
    assert!(fact.columns.iter().all(|column| column.is_valid == Some(true)));
    assert_eq!(
        fact.column(Some("orders"), "user_id").unwrap().data_type.as_deref(),
        Some("INT")
    );
}

#[test]
fn test_insert_scenario() {
    let fact = extract_query("INSERT INTO users (name, email) VALUES ('J','j@x.com')").unwrap();

    assert_eq!(fact.query_type, QueryType::Insert);
    assert_eq!(fact.tables, vec![TableFact::new("users")]);
    assert_eq!(fact.columns.len(), 2);
    for column in &fact.columns {
        assert!(column.is_modified);
        assert!(!column.is_selected);
        assert!(!column.is_filter_column);
        assert!(!column.is_join_column);
    }

    let json = serde_json::to_value(&fact).unwrap();
    assert_eq!(json["type"], "INSERT");
}

#[test]
fn test_numeric_ddl_scenario() {
    let schema = parse_schema("CREATE TABLE t (a NUMERIC(10,2), b NUMERIC(5), c NUMERIC);").unwrap();

    assert_eq!(schema.column_type("t", "a"), Some("NUMERIC(10,2)"));
    assert_eq!(schema.column_type("t", "b"), Some("NUMERIC(5)"));
    assert_eq!(schema.column_type("t", "c"), Some("NUMERIC"));

    let json = serde_json::to_value(&schema).unwrap();
    assert_eq!(json["tables"]["t"]["a"], "NUMERIC(10,2)");
    assert_eq!(json["tableDetails"][0]["columns"][0]["dataType"], "NUMERIC(10,2)");
}

#[test]
fn test_five_join_chain() {
    let fact = extract_query(
        "SELECT c.name, o.id, p.title
         FROM customers c
         INNER JOIN orders o ON c.id = o.customer_id
         LEFT JOIN order_items oi ON o.id = oi.order_id
         INNER JOIN products p ON oi.product_id = p.id
         LEFT JOIN categories cat ON p.category_id = cat.id
         LEFT JOIN suppliers s ON p.supplier_id = s.id",
    )
    .unwrap();

    assert_eq!(fact.tables.len(), 6);
    assert_eq!(fact.joins.len(), 5);

    let types: Vec<JoinType> = fact.joins.iter().map(|join| join.join_type).collect();
    assert_eq!(
        types,
        vec![
            JoinType::Inner,
            JoinType::Left,
            JoinType::Inner,
            JoinType::Left,
            JoinType::Left,
        ]
    );

    let edges: Vec<(&str, &str)> = fact
        .joins
        .iter()
        .map(|join| (join.left_table.as_str(), join.right_table.as_str()))
        .collect();
    assert_eq!(
        edges,
        vec![
            ("customers", "orders"),
            ("orders", "order_items"),
            ("order_items", "products"),
            ("products", "categories"),
            ("products", "suppliers"),
        ]
    );
}

#[test]
fn test_three_way_union_is_flat() {
    let fact = extract_query(
        "SELECT id FROM a UNION ALL SELECT id FROM b UNION SELECT id FROM c WHERE c.live = true",
    )
    .unwrap();

    assert_eq!(fact.table_names(), vec!["a", "b", "c"]);
    assert!(fact.subqueries.is_empty());
    assert_eq!(fact.where_conditions, vec!["live = true".to_string()]);
}

#[test]
fn test_statement_forest() {
    let analyzer = Analyzer::new();
    let schema = analyzer.parse_schema(SHOP_DDL).unwrap();

    let report = analyzer.analyze(
        "SELECT name FROM users; UPDATE orders SET status = 'shipped' WHERE id = 4; DELETE FROM users WHERE email IS NULL;",
        Some(&schema),
    );

    assert_eq!(report.statements.len(), 3);
    assert_eq!(report.statements[1].query_type, QueryType::Update);
    assert!(!report.has_errors());

    let json = report.to_json().unwrap();
    assert!(json.contains("\"whereConditions\""));
}
