//! Generated DDL text for a named object.

use crate::db::{SourceConnection, ValueStream};
use crate::error::{DbError, DbResult};
use futures_util::StreamExt;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Characters per chunk when reading the generated text back.
pub const DDL_CHUNK_SIZE: usize = 1000;

/// `DBMS_METADATA.GET_DDL` returns a CLOB; it is read back as fixed-size
/// `VARCHAR2` slices, one per row, so arbitrarily large definitions stream.
/// The generated text is materialized once; an inline view could be merged
/// and regenerated for every slice.
const GET_DDL_CHUNKS: &str = r#"
    WITH d AS (
        SELECT /*+ MATERIALIZE */ DBMS_METADATA.GET_DDL(:1, :2, :3) AS ddl FROM DUAL
    )
    SELECT DBMS_LOB.SUBSTR(d.ddl, 1000, (LEVEL - 1) * 1000 + 1) AS chunk
    FROM d
    CONNECT BY LEVEL <= CEIL(DBMS_LOB.GETLENGTH(d.ddl) / 1000)
    "#;

/// Object kinds the console can request DDL for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdlKind {
    Table,
    View,
    Index,
    Sequence,
    Trigger,
    Procedure,
    Function,
    Package,
    PackageBody,
}

impl DdlKind {
    /// Object type keyword understood by the metadata API.
    pub fn metadata_type(&self) -> &'static str {
        match self {
            Self::Table => "TABLE",
            Self::View => "VIEW",
            Self::Index => "INDEX",
            Self::Sequence => "SEQUENCE",
            Self::Trigger => "TRIGGER",
            Self::Procedure => "PROCEDURE",
            Self::Function => "FUNCTION",
            Self::Package => "PACKAGE_SPEC",
            Self::PackageBody => "PACKAGE_BODY",
        }
    }
}

impl FromStr for DdlKind {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_lowercase().replace([' ', '-'], "_");
        match token.as_str() {
            "table" => Ok(Self::Table),
            "view" => Ok(Self::View),
            "index" => Ok(Self::Index),
            "sequence" => Ok(Self::Sequence),
            "trigger" => Ok(Self::Trigger),
            "procedure" => Ok(Self::Procedure),
            "function" => Ok(Self::Function),
            "package" | "package_spec" => Ok(Self::Package),
            "package_body" => Ok(Self::PackageBody),
            _ => Err(DbError::invalid_input(format!(
                "Unsupported object type '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for DdlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.metadata_type())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DdlText {
    pub ddl: String,
    pub owner: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Fetch the definition of `owner.name`.
///
/// `kind` must already be parsed; callers reject unknown tokens before
/// connecting.
pub async fn fetch_ddl<C>(conn: &C, owner: &str, name: &str, kind: DdlKind) -> DbResult<DdlText>
where
    C: SourceConnection,
{
    let chunks = conn
        .stream_values(GET_DDL_CHUNKS, &[kind.metadata_type(), name, owner])
        .await?;
    let ddl = drain(chunks).await?;
    debug!(owner, name, kind = %kind, chars = ddl.chars().count(), "Fetched DDL");

    Ok(DdlText {
        ddl,
        owner: owner.to_string(),
        name: name.to_string(),
        kind: kind.metadata_type().to_string(),
    })
}

/// Concatenate streamed text chunks in arrival order.
pub async fn drain(mut chunks: ValueStream) -> DbResult<String> {
    let mut text = String::new();
    while let Some(chunk) = chunks.next().await {
        if let Some(part) = chunk?.as_str() {
            text.push_str(part);
        }
    }
    Ok(text)
}
