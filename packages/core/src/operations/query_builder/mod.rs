//! Typed Query Builder
//!
//! Builds `SELECT` statements over the node or edge table from composable
//! predicate clauses. Only structural tokens (table, column, operator, joiner)
//! are rendered into the SQL text; JSON paths, tree keys and compared values are
//! always bound parameters.
//!
//! # Architecture
//!
//! - **Clause layer**: one predicate fragment ([`Clause`]) with an optional
//!   boolean [`Joiner`]
//! - **Query layer**: table, result column and optional `json_tree` source
//!   ([`Query`]), rendered by [`Query::build`]
//!
//! Every predicate renders in parentheses. Later clauses default to `AND`. On
//! the first clause `AND` and `OR` are dropped while `AND NOT` becomes a
//! leading `NOT`, so any combination of clauses renders to valid SQL.
//!
//! # Examples
//!
//! ```rust
//! use personal_graph_core::operations::query_builder::{Clause, Comparison, Query};
//! use serde_json::json;
//!
//! let query = Query::nodes()
//!     .filter(Clause::key_value("name", Comparison::Eq, json!("Jack")))
//!     .filter(Clause::key_value("age", Comparison::Gt, json!(21)).or());
//!
//! let built = query.build().unwrap();
//! assert!(!built.sql.contains("Jack"));
//! assert_eq!(built.params.len(), 4);
//! ```

use crate::db::EntityTable;
use crate::models::{Attributes, Edge, Node, NodeId};
use crate::operations::edge_ops::row_to_stored_edge;
use crate::operations::error::{GraphError, Result};
use crate::operations::node_ops::{parse_attributes, row_to_stored_node};
use libsql::{Connection, Value};
use tracing::debug;

/// Comparison operator of a clause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Like,
    Gt,
    Lt,
    Ge,
    Le,
}

impl Comparison {
    fn as_sql(self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Like => "LIKE",
            Comparison::Gt => ">",
            Comparison::Lt => "<",
            Comparison::Ge => ">=",
            Comparison::Le => "<=",
        }
    }
}

/// Boolean connective placed before a clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Joiner {
    #[default]
    And,
    Or,
    AndNot,
}

impl Joiner {
    fn as_sql(self) -> &'static str {
        match self {
            Joiner::And => "AND",
            Joiner::Or => "OR",
            Joiner::AndNot => "AND NOT",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    /// `<table>.id = ?`
    IdLookup(NodeId),
    /// `json_extract(<table>.attribute, ?) <op> ?`
    KeyValue {
        key: String,
        comparison: Comparison,
        value: serde_json::Value,
    },
    /// `[json_tree.key = ? AND] json_tree.value <op> ?`
    Tree {
        key: Option<String>,
        comparison: Comparison,
        value: serde_json::Value,
    },
}

/// One predicate fragment
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    joiner: Option<Joiner>,
    predicate: Predicate,
}

impl Clause {
    /// Match a node by id
    pub fn id_lookup(id: impl Into<NodeId>) -> Self {
        Self::new(Predicate::IdLookup(id.into()))
    }

    /// Compare a top-level attribute key (or a `$`-prefixed JSON path)
    pub fn key_value(key: &str, comparison: Comparison, value: serde_json::Value) -> Self {
        Self::new(Predicate::KeyValue {
            key: key.to_string(),
            comparison,
            value,
        })
    }

    /// Compare any value anywhere in the attribute tree
    pub fn tree(comparison: Comparison, value: serde_json::Value) -> Self {
        Self::new(Predicate::Tree {
            key: None,
            comparison,
            value,
        })
    }

    /// Compare values stored under `key` anywhere in the attribute tree
    pub fn tree_key(key: &str, comparison: Comparison, value: serde_json::Value) -> Self {
        Self::new(Predicate::Tree {
            key: Some(key.to_string()),
            comparison,
            value,
        })
    }

    fn new(predicate: Predicate) -> Self {
        Self {
            joiner: None,
            predicate,
        }
    }

    pub fn joined_by(mut self, joiner: Joiner) -> Self {
        self.joiner = Some(joiner);
        self
    }

    pub fn or(self) -> Self {
        self.joined_by(Joiner::Or)
    }

    pub fn and_not(self) -> Self {
        self.joined_by(Joiner::AndNot)
    }

    fn uses_tree(&self) -> bool {
        matches!(self.predicate, Predicate::Tree { .. })
    }

    fn render(&self, table: EntityTable, sql: &mut String, params: &mut Vec<Value>) -> Result<()> {
        let name = table.table();
        match &self.predicate {
            Predicate::IdLookup(id) => {
                if table == EntityTable::Edges {
                    return Err(GraphError::InvalidQuery(
                        "edges have no id column to look up".to_string(),
                    ));
                }
                sql.push_str(&format!("{}.id = ?", name));
                params.push(Value::from(id));
            }
            Predicate::KeyValue {
                key,
                comparison,
                value,
            } => {
                sql.push_str(&format!(
                    "json_extract({}.attribute, ?) {} ?",
                    name,
                    comparison.as_sql()
                ));
                params.push(Value::Text(json_path(key)?));
                params.push(json_to_sql(value));
            }
            Predicate::Tree {
                key: Some(key),
                comparison,
                value,
            } => {
                sql.push_str(&format!(
                    "json_tree.key = ? AND json_tree.value {} ?",
                    comparison.as_sql()
                ));
                params.push(Value::Text(key.clone()));
                params.push(json_to_sql(value));
            }
            Predicate::Tree {
                key: None,
                comparison,
                value,
            } => {
                sql.push_str(&format!("json_tree.value {} ?", comparison.as_sql()));
                params.push(json_to_sql(value));
            }
        }
        Ok(())
    }
}

/// Which column(s) a query returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultColumn {
    /// Node id (nodes only)
    Id,
    Label,
    /// The stored attribute JSON
    #[default]
    Attribute,
    /// Full rows, as read by [`find_nodes`] / [`find_edges`]
    Row,
}

/// A `SELECT` over one entity table
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    table: EntityTable,
    result: ResultColumn,
    tree_path: Option<String>,
    clauses: Vec<Clause>,
}

/// Rendered SQL and its positional parameters
#[derive(Debug, Clone)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Query {
    pub fn new(table: EntityTable) -> Self {
        Self {
            table,
            result: ResultColumn::default(),
            tree_path: None,
            clauses: Vec::new(),
        }
    }

    pub fn nodes() -> Self {
        Self::new(EntityTable::Nodes)
    }

    pub fn edges() -> Self {
        Self::new(EntityTable::Edges)
    }

    pub fn table(&self) -> EntityTable {
        self.table
    }

    pub fn select(mut self, result: ResultColumn) -> Self {
        self.result = result;
        self
    }

    /// Restrict `json_tree` to the subtree under `key` (or a `$` path)
    pub fn tree_under(mut self, key: &str) -> Self {
        self.tree_path = Some(key.to_string());
        self
    }

    pub fn filter(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    fn uses_tree(&self) -> bool {
        self.tree_path.is_some() || self.clauses.iter().any(Clause::uses_tree)
    }

    fn columns(&self) -> Result<String> {
        let name = self.table.table();
        let columns = match (self.result, self.table) {
            (ResultColumn::Id, EntityTable::Nodes) => format!("{}.id", name),
            (ResultColumn::Id, EntityTable::Edges) => {
                return Err(GraphError::InvalidQuery(
                    "edges have no id column to select".to_string(),
                ))
            }
            (ResultColumn::Label, _) => format!("{}.label", name),
            (ResultColumn::Attribute, _) => format!("{}.attribute", name),
            (ResultColumn::Row, EntityTable::Nodes) => format!(
                "{0}.embed_id, {0}.id, {0}.label, {0}.attribute",
                name
            ),
            (ResultColumn::Row, EntityTable::Edges) => format!(
                "{0}.embed_id, {0}.source, {0}.target, {0}.label, {0}.attribute",
                name
            ),
        };
        Ok(columns)
    }

    /// Render the statement
    ///
    /// With `json_tree` one row would come back per matching tree element, so
    /// results are grouped per entity row. Rows are ordered by `embed_id`.
    pub fn build(&self) -> Result<BuiltQuery> {
        let name = self.table.table();
        let mut params = Vec::new();
        let mut sql = format!("SELECT {} FROM {}", self.columns()?, name);

        let tree = self.uses_tree();
        if tree {
            match &self.tree_path {
                Some(key) => {
                    sql.push_str(&format!(", json_tree({}.attribute, ?)", name));
                    params.push(Value::Text(json_path(key)?));
                }
                None => sql.push_str(&format!(", json_tree({}.attribute)", name)),
            }
        }

        for (i, clause) in self.clauses.iter().enumerate() {
            let joiner = clause.joiner.unwrap_or_default();
            if i == 0 {
                sql.push_str(" WHERE ");
                if joiner == Joiner::AndNot {
                    sql.push_str("NOT ");
                }
            } else {
                sql.push(' ');
                sql.push_str(joiner.as_sql());
                sql.push(' ');
            }
            sql.push('(');
            clause.render(self.table, &mut sql, &mut params)?;
            sql.push(')');
        }

        if tree {
            sql.push_str(&format!(" GROUP BY {}.embed_id", name));
        }
        sql.push_str(&format!(" ORDER BY {}.embed_id", name));

        Ok(BuiltQuery { sql, params })
    }
}

/// Top-level keys become a quoted JSON path; `$` paths pass through
///
/// SQLite path labels have no escape for `"`, so such keys are rejected.
fn json_path(key: &str) -> Result<String> {
    if key.starts_with('$') {
        Ok(key.to_string())
    } else if key.contains('"') {
        Err(GraphError::InvalidQuery(format!(
            "attribute key {:?} contains a double quote",
            key
        )))
    } else {
        Ok(format!("$.\"{}\"", key))
    }
}

/// Bind a JSON value the way `json_extract` / `json_tree` report it
fn json_to_sql(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Integer(i64::from(*b)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Real(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string()),
    }
}

async fn run(conn: &Connection, built: BuiltQuery) -> Result<libsql::Rows> {
    debug!(sql = %built.sql, params = built.params.len(), "Running built query");
    Ok(conn.query(&built.sql, built.params).await?)
}

/// Nodes matching the query's clauses
pub async fn find_nodes(conn: &Connection, query: &Query) -> Result<Vec<Node>> {
    if query.table != EntityTable::Nodes {
        return Err(GraphError::InvalidQuery("find_nodes needs a node query".to_string()));
    }
    let built = query.clone().select(ResultColumn::Row).build()?;
    let mut rows = run(conn, built).await?;

    let mut nodes = Vec::new();
    while let Some(row) = rows.next().await? {
        nodes.push(row_to_stored_node(&row)?.node);
    }
    Ok(nodes)
}

/// Ids of nodes matching the query's clauses
pub async fn find_node_ids(conn: &Connection, query: &Query) -> Result<Vec<NodeId>> {
    if query.table != EntityTable::Nodes {
        return Err(GraphError::InvalidQuery("find_node_ids needs a node query".to_string()));
    }
    let built = query.clone().select(ResultColumn::Id).build()?;
    let mut rows = run(conn, built).await?;

    let mut ids = Vec::new();
    while let Some(row) = rows.next().await? {
        ids.push(NodeId::from_sql(row.get_value(0)?, "nodes")?);
    }
    Ok(ids)
}

/// Edges matching the query's clauses
pub async fn find_edges(conn: &Connection, query: &Query) -> Result<Vec<Edge>> {
    if query.table != EntityTable::Edges {
        return Err(GraphError::InvalidQuery("find_edges needs an edge query".to_string()));
    }
    let built = query.clone().select(ResultColumn::Row).build()?;
    let mut rows = run(conn, built).await?;

    let mut edges = Vec::new();
    while let Some(row) = rows.next().await? {
        edges.push(row_to_stored_edge(&row)?.edge);
    }
    Ok(edges)
}

/// Stored attribute payloads of matching rows (node payloads include `id`)
pub async fn find_attributes(conn: &Connection, query: &Query) -> Result<Vec<Attributes>> {
    let built = query.clone().select(ResultColumn::Attribute).build()?;
    let table = query.table.table();
    let mut rows = run(conn, built).await?;

    let mut payloads = Vec::new();
    while let Some(row) = rows.next().await? {
        let raw: String = row.get(0)?;
        payloads.push(parse_attributes(&raw, table)?);
    }
    Ok(payloads)
}
