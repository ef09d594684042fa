//! Entity-relationship diagram for one owner.
//!
//! Catalog reads produce raw table, column and foreign-key records;
//! [`assemble`] turns them into Mermaid text and a positioned node/edge
//! graph. Every identifier in the output passes through
//! [`sanitize_identifier`]; tables that collide after sanitizing get a
//! numeric suffix, and edge endpoints are looked up from the same table map.

use crate::db::{SourceConnection, sanitize_identifier};
use crate::error::DbResult;
use crate::models::{
    ErdColumn, ErdDiagram, ErdEdge, ErdGraph, ErdNode, ErdNodeData, Position, Relation,
};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use tracing::{debug, warn};

/// Nodes per grid row.
pub const GRID_COLUMNS: usize = 5;
pub const GRID_X_SPACING: u32 = 280;
pub const GRID_Y_SPACING: u32 = 220;

const NODE_TYPE: &str = "tableNode";
const EDGE_TYPE: &str = "smoothstep";

// =============================================================================
// SQL Query Templates
// =============================================================================

mod queries {
    /// Owner tables without recycle-bin, workload-capture and Data Pump
    /// scratch tables.
    pub const TABLES: &str = r#"
        SELECT table_name FROM all_tables
        WHERE owner = :1
          AND table_name NOT LIKE 'SYS\_%' ESCAPE '\'
          AND table_name NOT LIKE 'WRR$%'
          AND table_name NOT LIKE 'KU\_%' ESCAPE '\'
        ORDER BY table_name
        "#;

    pub const COLUMNS: &str = r#"
        SELECT c.column_name,
               c.data_type,
               MAX(CASE WHEN k.constraint_type = 'P' THEN 1 ELSE 0 END) AS is_pk,
               MAX(CASE WHEN k.constraint_type = 'R' THEN 1 ELSE 0 END) AS is_fk
        FROM all_tab_columns c
        LEFT JOIN all_cons_columns cc
          ON cc.owner = c.owner
         AND cc.table_name = c.table_name
         AND cc.column_name = c.column_name
        LEFT JOIN all_constraints k
          ON k.owner = cc.owner
         AND k.constraint_name = cc.constraint_name
         AND k.constraint_type IN ('P', 'R')
        WHERE c.owner = :1 AND c.table_name = :2
        GROUP BY c.column_name, c.data_type, c.column_id
        ORDER BY c.column_id
        "#;

    /// One row per foreign-key column pair, matched by position so composite
    /// keys line up.
    pub const RELATIONS: &str = r#"
        SELECT a.table_name AS child_table,
               a.column_name AS child_column,
               b.table_name AS parent_table,
               b.column_name AS parent_column
        FROM all_constraints c
        JOIN all_cons_columns a
          ON a.owner = c.owner
         AND a.constraint_name = c.constraint_name
        JOIN all_cons_columns b
          ON b.owner = c.r_owner
         AND b.constraint_name = c.r_constraint_name
         AND b.position = a.position
        WHERE c.constraint_type = 'R'
          AND c.owner = :1
        ORDER BY a.table_name, c.constraint_name, a.position
        "#;
}

/// Column as read from the catalog, before sanitization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawColumn {
    pub name: String,
    pub data_type: String,
    pub pk: bool,
    pub fk: bool,
}

impl RawColumn {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            pk: false,
            fk: false,
        }
    }

    pub fn pk(mut self) -> Self {
        self.pk = true;
        self
    }

    pub fn fk(mut self) -> Self {
        self.fk = true;
        self
    }
}

/// Read the catalog for `owner` and build its diagram.
pub async fn build_diagram<C>(conn: &C, owner: &str) -> DbResult<ErdDiagram>
where
    C: SourceConnection,
{
    let owner = owner.trim().to_uppercase();

    let tables = conn
        .run(queries::TABLES, &[owner.as_str()])
        .await?
        .first_column();

    let mut columns = Vec::with_capacity(tables.len());
    for table in &tables {
        let rows = conn
            .run(queries::COLUMNS, &[owner.as_str(), table.as_str()])
            .await?;
        let cols = rows
            .rows
            .iter()
            .filter_map(|row| {
                let name = row.first()?.as_str()?;
                let data_type = row.get(1).and_then(|v| v.as_str()).unwrap_or_default();
                Some(RawColumn {
                    name: name.to_string(),
                    data_type: data_type.to_string(),
                    pk: row.get(2).is_some_and(|v| v.as_flag()),
                    fk: row.get(3).is_some_and(|v| v.as_flag()),
                })
            })
            .collect();
        columns.push((table.clone(), cols));
    }

    let relations = conn
        .run(queries::RELATIONS, &[owner.as_str()])
        .await?
        .rows
        .iter()
        .filter_map(|row| {
            let text = |i: usize| row.get(i).and_then(|v| v.as_str()).map(String::from);
            Some(Relation {
                child: text(0)?,
                child_column: text(1)?,
                parent: text(2)?,
                parent_column: text(3)?,
            })
        })
        .collect();

    let diagram = assemble(columns, relations);
    debug!(
        owner = %owner,
        tables = diagram.tables.len(),
        edges = diagram.graph.edges.len(),
        "Built ERD"
    );
    Ok(diagram)
}

/// Build the diagram from raw catalog records.
///
/// Tables keep their given order. Relations whose parent or child is not
/// among the tables are dropped from every output.
pub fn assemble(tables: Vec<(String, Vec<RawColumn>)>, relations: Vec<Relation>) -> ErdDiagram {
    let mut names = Vec::with_capacity(tables.len());
    let mut ids: HashMap<String, String> = HashMap::with_capacity(tables.len());
    let mut columns: BTreeMap<String, Vec<ErdColumn>> = BTreeMap::new();

    for (table, cols) in tables {
        if ids.contains_key(&table) {
            continue;
        }
        let name = unique_id(&table, &columns);
        let cols = cols
            .into_iter()
            .map(|c| ErdColumn {
                name: sanitize_identifier(&c.name),
                data_type: sanitize_identifier(&c.data_type),
                pk: c.pk,
                fk: c.fk,
            })
            .collect();
        columns.insert(name.clone(), cols);
        ids.insert(table, name.clone());
        names.push(name);
    }

    // Endpoints resolve through the table map so each edge stays on the
    // node of the table it was read for.
    let relations: Vec<Relation> = relations
        .into_iter()
        .filter_map(|r| {
            Some(Relation {
                child: ids.get(&r.child)?.clone(),
                child_column: sanitize_identifier(&r.child_column),
                parent: ids.get(&r.parent)?.clone(),
                parent_column: sanitize_identifier(&r.parent_column),
            })
        })
        .collect();

    let nodes = names
        .iter()
        .enumerate()
        .map(|(i, name)| ErdNode {
            id: name.clone(),
            node_type: NODE_TYPE,
            data: ErdNodeData {
                label: name.clone(),
                columns: columns.get(name).cloned().unwrap_or_default(),
                id: name.clone(),
            },
            position: grid_position(i),
        })
        .collect();

    let edges = relations
        .iter()
        .enumerate()
        .map(|(i, r)| ErdEdge {
            id: format!("e{}", i),
            source: r.parent.clone(),
            target: r.child.clone(),
            label: edge_label(r),
            edge_type: EDGE_TYPE,
            animated: true,
        })
        .collect();

    let mermaid = mermaid(&names, &columns, &relations);

    ErdDiagram {
        success: true,
        mermaid,
        tables: names,
        columns,
        relations,
        graph: ErdGraph { nodes, edges },
    }
}

/// Sanitized id for `table`, suffixed `_2`, `_3`, ... when an earlier table
/// already sanitized to the same id.
fn unique_id(table: &str, taken: &BTreeMap<String, Vec<ErdColumn>>) -> String {
    let base = sanitize_identifier(table);
    if !taken.contains_key(&base) {
        return base;
    }
    let mut n = 2;
    let mut id = format!("{}_{}", base, n);
    while taken.contains_key(&id) {
        n += 1;
        id = format!("{}_{}", base, n);
    }
    warn!(table, id = %id, "Table id collides after sanitizing; renamed");
    id
}

fn grid_position(index: usize) -> Position {
    let col = (index % GRID_COLUMNS) as u32;
    let row = (index / GRID_COLUMNS) as u32;
    Position {
        x: col * GRID_X_SPACING,
        y: row * GRID_Y_SPACING,
    }
}

fn edge_label(r: &Relation) -> String {
    format!("{} → {}", r.parent_column, r.child_column)
}

fn mermaid(
    tables: &[String],
    columns: &BTreeMap<String, Vec<ErdColumn>>,
    relations: &[Relation],
) -> String {
    let mut out = String::from("erDiagram\n");
    for table in tables {
        let _ = writeln!(out, "  {} {{", table);
        for col in columns.get(table).map(Vec::as_slice).unwrap_or_default() {
            let key = match (col.pk, col.fk) {
                (true, true) => " PK, FK",
                (true, false) => " PK",
                (false, true) => " FK",
                (false, false) => "",
            };
            let _ = writeln!(out, "    {} {}{}", col.data_type, col.name, key);
        }
        out.push_str("  }\n");
    }
    for r in relations {
        let _ = writeln!(
            out,
            "  {} ||--o{{ {} : \"{}\"",
            r.parent,
            r.child,
            edge_label(r)
        );
    }
    out
}
