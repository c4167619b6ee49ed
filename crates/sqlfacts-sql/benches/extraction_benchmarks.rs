//! Benchmarks for statement extraction and validation
//!
//! Measures parse + extract on wide join chains and CTE-heavy queries, and
//! validation against a generated schema.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sqlfacts_sql::{Analyzer, SqlParser, StatementExtractor};

/// `SELECT` over a chain of `n` joined tables
fn generate_join_chain(n: usize) -> String {
    let mut sql = String::from("SELECT t0.id");
    for i in 1..=n {
        sql.push_str(&format!(", t{}.value_{}", i, i));
    }
    sql.push_str(" FROM table_0 t0");
    for i in 1..=n {
        let kind = if i % 2 == 0 { "LEFT JOIN" } else { "INNER JOIN" };
        sql.push_str(&format!(
            " {} table_{} t{} ON t{}.id = t{}.parent_id",
            kind,
            i,
            i,
            i - 1,
            i
        ));
    }
    sql.push_str(" WHERE t0.status = 'active' AND t0.created_at > '2024-01-01'");
    sql
}

/// `WITH` of `n` chained CTEs, each filtering the previous one
fn generate_cte_chain(n: usize) -> String {
    let mut ctes = vec!["c0 AS (SELECT id, amount FROM payments WHERE amount > 0)".to_string()];
    for i in 1..n {
        ctes.push(format!(
            "c{} AS (SELECT id, amount FROM c{} WHERE amount > {})",
            i,
            i - 1,
            i
        ));
    }
    format!(
        "WITH {} SELECT c.id, SUM(c.amount) AS total FROM c{} c GROUP BY c.id",
        ctes.join(", "),
        n - 1
    )
}

fn generate_ddl(n: usize) -> String {
    (0..=n)
        .map(|i| {
            format!(
                "CREATE TABLE table_{} (id INT PRIMARY KEY, parent_id INT, value_{} NUMERIC(10,2), status TEXT, created_at TIMESTAMP);",
                i, i
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn bench_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("extraction");
    let parser = SqlParser::new();
    let extractor = StatementExtractor::new();

    for size in [5, 20, 40] {
        let sql = generate_join_chain(size);
        let parsed = parser.parse(&sql).unwrap();
        let statement = parsed.first_statement().unwrap().clone();

        group.bench_with_input(BenchmarkId::new("join_chain", size), &statement, |b, statement| {
            b.iter(|| extractor.extract(black_box(statement), &sql))
        });
    }

    for size in [5, 20] {
        let sql = generate_cte_chain(size);
        let parsed = parser.parse(&sql).unwrap();
        let statement = parsed.first_statement().unwrap().clone();

        group.bench_with_input(BenchmarkId::new("cte_chain", size), &statement, |b, statement| {
            b.iter(|| extractor.extract(black_box(statement), &sql))
        });
    }

    group.finish();
}

fn bench_parse_and_validate(c: &mut Criterion) {
    let analyzer = Analyzer::new();
    let size = 20;
    let sql = generate_join_chain(size);
    let schema = analyzer.parse_schema(&generate_ddl(size)).unwrap();

    c.bench_function("parse_extract_validate_20", |b| {
        b.iter(|| {
            let mut fact = analyzer.extract_query(black_box(&sql)).unwrap();
            analyzer.validate(&mut fact, &schema)
        })
    });
}

criterion_group!(benches, bench_extraction, bench_parse_and_validate);
criterion_main!(benches);
