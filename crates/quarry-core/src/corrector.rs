//! Rewrites an abstract query shape into SQL fragments the engine accepts.
//!
//! The engine has no LIMIT/OFFSET on UPDATE or DELETE, no joined mutations,
//! and no way to ask for "the last N rows" directly. All three are handled by
//! the same compound rewrite: the WHERE clause becomes
//! `table.rowid IN (SELECT table.rowid FROM ... ORDER BY ... LIMIT ...)` and
//! the limiting happens inside the subselect.

use tracing::debug;

use crate::join::{JoinEdge, JoinGraph};
use crate::order::Direction;
use crate::predicate::Selection;

/// LIMIT value meaning "no limit", required when only an OFFSET is wanted.
pub const NO_LIMIT: i64 = -1;

/// Name of the engine's implicit row identifier.
pub const ROWID: &str = "rowid";

/// The statement a query shape is corrected for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatementKind {
    /// SELECT
    #[default]
    Select,
    /// UPDATE
    Update,
    /// DELETE
    Delete,
}

impl StatementKind {
    /// Returns true for UPDATE and DELETE.
    #[must_use]
    pub const fn is_mutation(self) -> bool {
        matches!(self, Self::Update | Self::Delete)
    }
}

/// Everything a caller asked for, before correction.
#[derive(Debug, Clone)]
pub struct QueryShape {
    kind: StatementKind,
    graph: JoinGraph,
    selection: Selection,
    order_by: String,
    limit: u64,
    offset: u64,
    last: bool,
}

impl QueryShape {
    /// Creates a SELECT shape over `table`.
    #[must_use]
    pub fn select(table: &str) -> Self {
        Self::new(StatementKind::Select, table)
    }

    /// Creates an UPDATE shape over `table`.
    #[must_use]
    pub fn update(table: &str) -> Self {
        Self::new(StatementKind::Update, table)
    }

    /// Creates a DELETE shape over `table`.
    #[must_use]
    pub fn delete(table: &str) -> Self {
        Self::new(StatementKind::Delete, table)
    }

    fn new(kind: StatementKind, table: &str) -> Self {
        Self {
            kind,
            graph: JoinGraph::new(table),
            selection: Selection::default(),
            order_by: String::new(),
            limit: 0,
            offset: 0,
            last: false,
        }
    }

    /// Replaces the join graph. Its base table becomes the shape's table.
    #[must_use]
    pub fn joins(mut self, graph: JoinGraph) -> Self {
        self.graph = graph;
        self
    }

    /// Sets the WHERE selection.
    #[must_use]
    pub fn selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    /// Sets the caller-proposed ORDER BY text.
    #[must_use]
    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = order_by.into();
        self
    }

    /// Sets the row limit, 0 meaning unbounded.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the number of rows to skip.
    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Requests the last rows under the order instead of the first.
    #[must_use]
    pub fn last(mut self, last: bool) -> Self {
        self.last = last;
        self
    }

    /// The statement kind.
    #[must_use]
    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    /// The base table.
    #[must_use]
    pub fn table(&self) -> &str {
        self.graph.base()
    }
}

/// The engine-legal fragments of a corrected query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectedQuery {
    /// Table name.
    pub table: String,
    /// FROM text: the base table followed by its joins.
    pub from: String,
    /// WHERE text, empty for none.
    pub where_clause: String,
    /// ORDER BY text, empty for mutations.
    pub order_by: String,
    /// Outer LIMIT, `None` when suppressed.
    pub limit: Option<i64>,
    /// Outer OFFSET, `None` when suppressed.
    pub offset: Option<u64>,
    /// True if the WHERE clause is a rowid subselect.
    pub compound: bool,
    /// Positional arguments for the WHERE text.
    pub params: Vec<String>,
}

/// Applies the dialect's rewrite rules to a [`QueryShape`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DialectCorrector;

impl DialectCorrector {
    /// Creates a corrector.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Corrects a shape. Pure: the same shape always yields the same fragments.
    #[must_use]
    pub fn correct(&self, shape: &QueryShape) -> CorrectedQuery {
        let table = shape.table();
        let from = join_text(&shape.graph);
        let explicit = shape.order_by.trim();
        let compound = shape.last
            || (shape.kind.is_mutation()
                && (shape.limit > 0 || shape.offset > 0 || !shape.graph.is_empty()));

        if !compound {
            let (limit, offset) = limit_offset(shape.limit, shape.offset);
            return CorrectedQuery {
                table: String::from(table),
                from,
                where_clause: shape.selection.where_clause().to_string(),
                order_by: if shape.kind.is_mutation() {
                    String::new()
                } else {
                    resolve_order(table, explicit, false)
                },
                limit,
                offset,
                compound: false,
                params: shape.selection.args().to_vec(),
            };
        }

        let inner_order = resolve_order(table, explicit, shape.last);
        let mut subselect = format!("SELECT {table}.{ROWID} FROM {from}");
        if !shape.selection.is_empty() {
            subselect.push_str(" WHERE ");
            subselect.push_str(shape.selection.where_clause());
        }
        subselect.push_str(" ORDER BY ");
        subselect.push_str(&inner_order);
        let (limit, offset) = limit_offset(shape.limit, shape.offset);
        if let Some(limit) = limit {
            subselect.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = offset {
            subselect.push_str(&format!(" OFFSET {offset}"));
        }

        let where_clause = format!("{table}.{ROWID} IN ({subselect})");
        debug!(table, kind = ?shape.kind, last = shape.last, "rewrote query into rowid subselect");

        let order_by = if shape.kind.is_mutation() {
            String::new()
        } else {
            resolve_order(table, explicit, false)
        };

        CorrectedQuery {
            table: String::from(table),
            // Mutations address the base table only; the joins live in the subselect.
            from: if shape.kind.is_mutation() {
                String::from(table)
            } else {
                from
            },
            where_clause,
            order_by,
            limit: None,
            offset: None,
            compound: true,
            params: shape.selection.args().to_vec(),
        }
    }
}

/// Resolves the ORDER BY used for a query over `table`.
///
/// Without an explicit order the rowid is used, descending when the last rows
/// are wanted. With one, bottom selection flips every direction token.
#[must_use]
pub fn resolve_order(table: &str, explicit: &str, last: bool) -> String {
    let explicit = explicit.trim();
    match (explicit.is_empty(), last) {
        (true, false) => format!("{table}.{ROWID} ASC"),
        (true, true) => format!("{table}.{ROWID} DESC"),
        (false, false) => String::from(explicit),
        (false, true) => invert_order(explicit),
    }
}

/// Flips every `ASC`/`DESC` token, leaving identifiers and punctuation alone.
///
/// Tokens end at whitespace or a comma, so `t.a ASC,t.b DESC` flips both
/// directions. Separators are kept as they are.
#[must_use]
pub fn invert_order(order: &str) -> String {
    let mut inverted = String::with_capacity(order.len() + 8);
    let mut word = String::new();
    for ch in order.chars() {
        if ch == ',' || ch.is_whitespace() {
            push_flipped(&mut inverted, &word);
            word.clear();
            inverted.push(ch);
        } else {
            word.push(ch);
        }
    }
    push_flipped(&mut inverted, &word);
    inverted
}

fn push_flipped(out: &mut String, word: &str) {
    match Direction::from_keyword(word) {
        Some(direction) => out.push_str(&direction.flipped().to_string()),
        None => out.push_str(word),
    }
}

/// Renders `base TYPE JOIN partner ON partner.c=anchor.c [AND ...]`.
///
/// Edges bringing in the same partner share one JOIN, their conditions joined
/// with AND. The first edge decides the join type.
#[must_use]
pub fn join_text(graph: &JoinGraph) -> String {
    let mut groups: Vec<(&str, Vec<&JoinEdge>)> = Vec::new();
    for edge in graph.edges() {
        match groups
            .iter_mut()
            .find(|(partner, _)| *partner == edge.partner_table)
        {
            Some((_, edges)) => edges.push(edge),
            None => groups.push((edge.partner_table.as_str(), vec![edge])),
        }
    }

    let mut text = String::from(graph.base());
    for (partner, edges) in groups {
        let join_type = edges[0].join_type;
        text.push_str(&format!(" {join_type} {partner}"));
        if join_type.has_condition() {
            let conditions: Vec<String> = edges
                .iter()
                .map(|e| {
                    format!(
                        "{}.{}={}.{}",
                        e.partner_table, e.partner_column, e.anchor_table, e.anchor_column
                    )
                })
                .collect();
            text.push_str(" ON ");
            text.push_str(&conditions.join(" AND "));
        }
    }
    text
}

fn limit_offset(limit: u64, offset: u64) -> (Option<i64>, Option<u64>) {
    let limit = if limit > 0 {
        Some(i64::try_from(limit).unwrap_or(i64::MAX))
    } else if offset > 0 {
        Some(NO_LIMIT)
    } else {
        None
    };
    let offset = (offset > 0).then_some(offset);
    (limit, offset)
}
