//! Join edges, projections, and the join graph of a query.

use std::fmt;

/// Kind of join between two tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    /// NATURAL JOIN, rendered without an ON clause.
    Natural,
    /// LEFT JOIN
    Left,
    /// INNER JOIN
    Inner,
    /// FULL OUTER JOIN
    Outer,
    /// LEFT OUTER JOIN
    LeftOuter,
    /// CROSS JOIN
    Cross,
}

impl JoinType {
    /// Returns true if the join carries an ON clause.
    #[must_use]
    pub const fn has_condition(self) -> bool {
        !matches!(self, Self::Natural)
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Natural => write!(f, "NATURAL JOIN"),
            Self::Left => write!(f, "LEFT JOIN"),
            Self::Inner => write!(f, "INNER JOIN"),
            Self::Outer => write!(f, "FULL OUTER JOIN"),
            Self::LeftOuter => write!(f, "LEFT OUTER JOIN"),
            Self::Cross => write!(f, "CROSS JOIN"),
        }
    }
}

/// A join between a parent column and a child column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    /// Join kind.
    pub join_type: JoinType,
    /// Referenced table.
    pub parent_table: String,
    /// Referenced column.
    pub parent_column: String,
    /// Referencing table.
    pub child_table: String,
    /// Referencing column.
    pub child_column: String,
}

impl Join {
    /// Creates a join edge `parent_table.parent_column = child_table.child_column`.
    #[must_use]
    pub fn new(
        join_type: JoinType,
        parent: (&str, &str),
        child: (&str, &str),
    ) -> Self {
        Self {
            join_type,
            parent_table: String::from(parent.0),
            parent_column: String::from(parent.1),
            child_table: String::from(child.0),
            child_column: String::from(child.1),
        }
    }
}

/// Columns selected from one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    /// Source table.
    pub table: String,
    /// Selected columns, in output order.
    pub columns: Vec<String>,
    /// Whether the query should be DISTINCT.
    pub distinct: bool,
}

impl Projection {
    /// Creates a projection of `columns` from `table`.
    #[must_use]
    pub fn new(table: &str, columns: &[&str]) -> Self {
        Self {
            table: String::from(table),
            columns: columns.iter().map(|c| String::from(*c)).collect(),
            distinct: false,
        }
    }

    /// Requests DISTINCT rows.
    #[must_use]
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Returns the columns qualified with the table name.
    #[must_use]
    pub fn qualified_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| format!("{}.{c}", self.table))
            .collect()
    }
}

/// A join edge oriented from the graph towards the table it brings in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinEdge {
    /// Join kind.
    pub join_type: JoinType,
    /// Table joined in by this edge.
    pub partner_table: String,
    /// Partner-side column.
    pub partner_column: String,
    /// Table already in the graph.
    pub anchor_table: String,
    /// Anchor-side column.
    pub anchor_column: String,
}

/// The base table plus every table joined onto it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinGraph {
    base: String,
    tables: Vec<String>,
    edges: Vec<JoinEdge>,
}

impl JoinGraph {
    /// Creates a graph containing only `base`.
    #[must_use]
    pub fn new(base: &str) -> Self {
        Self {
            base: String::from(base),
            tables: vec![String::from(base)],
            edges: Vec::new(),
        }
    }

    /// The base table.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Member tables, base first.
    #[must_use]
    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    /// Edges in insertion order.
    #[must_use]
    pub fn edges(&self) -> &[JoinEdge] {
        &self.edges
    }

    /// Returns true if nothing is joined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Returns true if `table` is already part of the graph.
    #[must_use]
    pub fn contains(&self, table: &str) -> bool {
        self.tables.iter().any(|t| t == table)
    }

    /// Adds an edge and returns the partner table it connects.
    ///
    /// The partner is whichever side is not yet a member. When neither side
    /// is a member the child side is taken.
    pub fn add(&mut self, join: &Join) -> &str {
        let parent_is_new = !self.contains(&join.parent_table);
        let child_is_new = !self.contains(&join.child_table);

        let edge = if parent_is_new && !child_is_new {
            JoinEdge {
                join_type: join.join_type,
                partner_table: join.parent_table.clone(),
                partner_column: join.parent_column.clone(),
                anchor_table: join.child_table.clone(),
                anchor_column: join.child_column.clone(),
            }
        } else {
            JoinEdge {
                join_type: join.join_type,
                partner_table: join.child_table.clone(),
                partner_column: join.child_column.clone(),
                anchor_table: join.parent_table.clone(),
                anchor_column: join.parent_column.clone(),
            }
        };

        if !self.contains(&edge.partner_table) {
            self.tables.push(edge.partner_table.clone());
        }
        self.edges.push(edge);
        &self.edges[self.edges.len() - 1].partner_table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partner_is_the_new_side() {
        let mut graph = JoinGraph::new("users");
        let partner = graph.add(&Join::new(
            JoinType::Left,
            ("users", "id"),
            ("posts", "user_id"),
        ));
        assert_eq!(partner, "posts");

        let partner = graph.add(&Join::new(
            JoinType::Inner,
            ("blogs", "id"),
            ("posts", "blog_id"),
        ));
        assert_eq!(partner, "blogs");
        assert_eq!(graph.edges()[1].anchor_table, "posts");
        assert_eq!(graph.tables(), ["users", "posts", "blogs"]);
    }

    #[test]
    fn test_partner_defaults_to_child_when_both_new() {
        let mut graph = JoinGraph::new("users");
        let partner = graph.add(&Join::new(JoinType::Inner, ("a", "id"), ("b", "a_id")));
        assert_eq!(partner, "b");
    }

    #[test]
    fn test_join_type_keywords() {
        assert_eq!(JoinType::Outer.to_string(), "FULL OUTER JOIN");
        assert_eq!(JoinType::LeftOuter.to_string(), "LEFT OUTER JOIN");
        assert!(!JoinType::Natural.has_condition());
        assert!(JoinType::Cross.has_condition());
    }

    #[test]
    fn test_projection_qualifies_columns() {
        let p = Projection::new("users", &["id", "name"]).distinct();
        assert!(p.distinct);
        assert_eq!(p.qualified_columns(), ["users.id", "users.name"]);
    }
}
