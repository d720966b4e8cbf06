//! Breadth-first adjacency walk
//!
//! Starting from `source`, each expanded node contributes every unseen
//! neighbor (per [`Direction`]) to the path, in edge `embed_id` order. The walk
//! stops when the target is appended or the frontier runs dry. A node already
//! on the path is never appended or expanded again, so cycles terminate.
//!
//! This returns the first path found by expansion order, not the shortest.

use crate::models::{Direction, NodeId, StepMarker, TraversalOptions, TraversalStep};
use crate::operations::error::Result;
use crate::operations::node_ops::{find_node, parse_attributes};
use libsql::{Connection, Value};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

struct Neighbor {
    id: NodeId,
    marker: StepMarker,
    edge_attributes: String,
}

async fn fetch_neighbors(
    conn: &Connection,
    node: &NodeId,
    direction: Direction,
) -> Result<Vec<Neighbor>> {
    // Column 2 is 1 for an outbound edge, 0 for an inbound one
    let sql = match direction {
        Direction::Outbound => {
            "SELECT target, embed_id, 1, attribute FROM edges WHERE source = ?1 ORDER BY embed_id"
        }
        Direction::Inbound => {
            "SELECT source, embed_id, 0, attribute FROM edges WHERE target = ?1 ORDER BY embed_id"
        }
        Direction::Both => {
            "SELECT target, embed_id, 1, attribute FROM edges WHERE source = ?1
             UNION ALL
             SELECT source, embed_id, 0, attribute FROM edges WHERE target = ?1
             ORDER BY 2"
        }
    };

    let mut rows = conn.query(sql, vec![Value::from(node)]).await?;
    let mut neighbors = Vec::new();
    while let Some(row) = rows.next().await? {
        let outbound: i64 = row.get(2)?;
        neighbors.push(Neighbor {
            id: NodeId::from_sql(row.get_value(0)?, "edges")?,
            marker: if outbound == 1 {
                StepMarker::Outbound
            } else {
                StepMarker::Inbound
            },
            edge_attributes: row.get(3)?,
        });
    }
    Ok(neighbors)
}

async fn node_step(conn: &Connection, id: &NodeId, with_bodies: bool) -> Result<TraversalStep> {
    let body = if with_bodies {
        find_node(conn, id)
            .await?
            .map(|node| serde_json::Value::Object(node.attributes))
    } else {
        None
    };
    Ok(TraversalStep {
        id: id.clone(),
        marker: StepMarker::Node,
        body,
    })
}

/// Walk from `source`; an absent source yields an empty path
pub async fn traverse(
    conn: &Connection,
    source: &NodeId,
    options: &TraversalOptions,
) -> Result<Vec<TraversalStep>> {
    if find_node(conn, source).await?.is_none() {
        return Ok(Vec::new());
    }

    let mut path = vec![node_step(conn, source, options.with_bodies).await?];
    if options.target.as_ref() == Some(source) {
        return Ok(path);
    }

    let mut seen = HashSet::from([source.clone()]);
    let mut frontier = VecDeque::from([source.clone()]);

    while let Some(current) = frontier.pop_front() {
        for neighbor in fetch_neighbors(conn, &current, options.direction).await? {
            if !seen.insert(neighbor.id.clone()) {
                continue;
            }

            if options.with_bodies {
                let edge_body = parse_attributes(&neighbor.edge_attributes, "edges")?;
                path.push(TraversalStep {
                    id: neighbor.id.clone(),
                    marker: neighbor.marker,
                    body: Some(serde_json::Value::Object(edge_body)),
                });
            }
            path.push(node_step(conn, &neighbor.id, options.with_bodies).await?);

            if options.target.as_ref() == Some(&neighbor.id) {
                debug!(source = %source, steps = path.len(), "Traversal reached target");
                return Ok(path);
            }
            frontier.push_back(neighbor.id);
        }
    }

    debug!(source = %source, steps = path.len(), "Traversal exhausted neighbors");
    Ok(path)
}
