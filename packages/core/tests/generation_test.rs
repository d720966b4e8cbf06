//! Text entry points backed by a graph generator

mod common;

#[cfg(test)]
mod generation_tests {
    use super::common::{count, create_test_graph};
    use anyhow::Result;
    use async_trait::async_trait;
    use personal_graph_core::{
        GraphError, GraphGenerator, KgEdge, KgNode, KnowledgeGraph, NodeId,
    };
    use serde_json::{json, Value};
    use std::sync::Arc;

    /// Returns the same graph for any text
    struct FixedGenerator(KnowledgeGraph);

    #[async_trait]
    impl GraphGenerator for FixedGenerator {
        async fn generate(&self, _text: &str) -> anyhow::Result<KnowledgeGraph> {
            Ok(self.0.clone())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl GraphGenerator for FailingGenerator {
        async fn generate(&self, _text: &str) -> anyhow::Result<KnowledgeGraph> {
            anyhow::bail!("model unavailable")
        }
    }

    fn kg_node(id: i64, label: &str, attributes: Value) -> KgNode {
        KgNode {
            id: NodeId::Int(id),
            label: label.to_string(),
            attributes,
        }
    }

    fn jack_knows_james() -> KnowledgeGraph {
        KnowledgeGraph {
            nodes: vec![
                kg_node(1, "Jack", json!("Jack is a pilot")),
                kg_node(2, "James", json!({"age": 25})),
            ],
            edges: vec![KgEdge {
                source: NodeId::Int(1),
                target: NodeId::Int(2),
                label: "knows".to_string(),
                attributes: Value::Null,
            }],
        }
    }

    #[tokio::test]
    async fn test_insert_into_graph_remaps_ids() -> Result<()> {
        let (graph, _temp_dir) = create_test_graph().await?;
        let graph = graph.with_generator(Arc::new(FixedGenerator(jack_knows_james())));

        let stored = graph.insert_into_graph("Jack knows James").await?;

        assert_eq!(stored.nodes.len(), 2);
        assert_eq!(stored.edges.len(), 1);
        assert!(stored.nodes.iter().all(|n| !matches!(n.id, NodeId::Int(_))));
        assert_eq!(stored.edges[0].source, stored.nodes[0].id);
        assert_eq!(stored.edges[0].target, stored.nodes[1].id);

        let jack = graph.search_node(&stored.nodes[0].id).await?;
        let jack = jack.ok_or_else(|| anyhow::anyhow!("generated node missing"))?;
        assert_eq!(jack.label, "Jack");
        assert_eq!(jack.attributes["body"], json!("Jack is a pilot"));

        let edges = graph.connections(&stored.nodes[0].id).await?;
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].attributes["body"], Value::Null);
        Ok(())
    }

    #[tokio::test]
    async fn test_dangling_generated_edge_rejects_graph() -> Result<()> {
        let (graph, _temp_dir) = create_test_graph().await?;
        let mut generated = jack_knows_james();
        generated.edges.push(KgEdge {
            source: NodeId::Int(1),
            target: NodeId::Int(9),
            label: "likes".to_string(),
            attributes: Value::Null,
        });
        let graph = graph.with_generator(Arc::new(FixedGenerator(generated)));

        let stored = graph.insert_into_graph("anything").await?;
        assert!(stored.is_empty());
        assert_eq!(count(&graph, "SELECT COUNT(*) FROM nodes").await?, 0);
        assert_eq!(count(&graph, "SELECT COUNT(*) FROM edges").await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_generator_errors() -> Result<()> {
        let (graph, _temp_dir) = create_test_graph().await?;
        assert!(matches!(
            graph.insert_into_graph("text").await,
            Err(GraphError::Config(_))
        ));

        let graph = graph.with_generator(Arc::new(FailingGenerator));
        assert!(matches!(
            graph.insert_into_graph("text").await,
            Err(GraphError::Generation(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_search_from_graph_projects_neighborhood() -> Result<()> {
        let (graph, _temp_dir) = create_test_graph().await?;
        let graph = graph.with_generator(Arc::new(FixedGenerator(jack_knows_james())));
        let stored = graph.insert_into_graph("Jack knows James").await?;

        let found = graph.search_from_graph("Jack", 1).await?;

        assert_eq!(found.nodes.len(), 2);
        assert_eq!(found.nodes[0].id, stored.nodes[0].id);
        assert_eq!(found.nodes[0].attributes, json!("Jack is a pilot"));
        assert_eq!(found.nodes[1].id, stored.nodes[1].id);
        assert_eq!(found.nodes[1].attributes, json!({"age": 25}));
        assert_eq!(found.edges.len(), 1);
        assert_eq!(found.edges[0].label, "knows");
        assert_eq!(found.edges[0].attributes, Value::Null);
        assert!(found.dangling_edges().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_search_from_empty_graph() -> Result<()> {
        let (graph, _temp_dir) = create_test_graph().await?;
        assert!(graph.search_from_graph("Jack", 3).await?.is_empty());
        Ok(())
    }
}
