//! Grammar subset of the bound parser
//!
//! Describes what the extraction layer models and which constructs of the
//! target grammar are known gaps. Exposed for diagnostics and documentation
//! only; traversal never branches on it.

use serde::Serialize;

/// Static description of the parsing dependency and its supported subset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParserCapabilities {
    /// Parser crate the extraction layer binds to
    pub parser: &'static str,

    /// Major.minor of that crate
    pub parser_version: &'static str,

    /// Constructs the extractor models
    pub supported: &'static [&'static str],

    /// Constructs outside the target grammar
    pub limitations: &'static [&'static str],
}

impl ParserCapabilities {
    pub const CURRENT: ParserCapabilities = ParserCapabilities {
        parser: "sqlparser",
        parser_version: "0.53",
        supported: &[
            "SELECT",
            "INSERT",
            "UPDATE",
            "DELETE",
            "WITH (non-recursive CTEs)",
            "UNION / UNION ALL",
            "INNER / LEFT / RIGHT / FULL / CROSS JOIN",
            "multi-way joins",
            "scalar and correlated subqueries",
            "derived tables",
            "window function calls",
            "CASE expressions",
            "CAST",
        ],
        limitations: &[
            "recursive CTEs",
            "INTERSECT / EXCEPT",
            "GROUPING SETS",
            "window frames (ROWS / RANGE)",
            "SIMILAR TO",
            "join predicates other than a single column equality",
        ],
    };

    /// Whether `construct` is listed as a known limitation (case-insensitive)
    pub fn is_limitation(&self, construct: &str) -> bool {
        self.limitations
            .iter()
            .any(|item| item.eq_ignore_ascii_case(construct))
    }
}

impl std::fmt::Display for ParserCapabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} {}", self.parser, self.parser_version)?;
        writeln!(f, "supported:")?;
        for item in self.supported {
            writeln!(f, "  - {}", item)?;
        }
        writeln!(f, "not supported:")?;
        for item in self.limitations {
            writeln!(f, "  - {}", item)?;
        }
        Ok(())
    }
}
