//! Schema-related data models.
//!
//! Catalog snapshots for the tree view and the diagram structures produced by
//! the ERD builder. Serialized field names follow what the console renders.

use serde::Serialize;
use std::collections::BTreeMap;

/// One owner and the names of every object kind it holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OwnerObjects {
    pub owner: String,
    pub tables: Vec<String>,
    pub views: Vec<String>,
    /// `TABLE.INDEX` pairs
    pub indexes: Vec<String>,
    pub triggers: Vec<String>,
    pub packages: Vec<String>,
    pub procedures: Vec<String>,
    pub functions: Vec<String>,
    pub tablespaces: Vec<String>,
}

impl OwnerObjects {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            ..Self::default()
        }
    }
}

/// A diagram column; names and types are already sanitized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErdColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub pk: bool,
    pub fk: bool,
}

/// One column pair of a foreign key, rendered parent -> child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub child: String,
    pub child_column: String,
    pub parent: String,
    pub parent_column: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErdNodeData {
    pub label: String,
    pub columns: Vec<ErdColumn>,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErdNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: &'static str,
    pub data: ErdNodeData,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErdEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub label: String,
    #[serde(rename = "type")]
    pub edge_type: &'static str,
    pub animated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErdGraph {
    pub nodes: Vec<ErdNode>,
    pub edges: Vec<ErdEdge>,
}

/// Full ERD response: Mermaid text plus the node/edge graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErdDiagram {
    pub success: bool,
    pub mermaid: String,
    pub tables: Vec<String>,
    pub columns: BTreeMap<String, Vec<ErdColumn>>,
    pub relations: Vec<Relation>,
    pub graph: ErdGraph,
}
