use crate::core::identifiers::MirrorName;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexMethod {
    BTree,
    Hash,
    Gin,
    Gist,
    SpGist,
    Brin,
}

impl IndexMethod {
    pub fn from_pg_amname(name: &str) -> Self {
        match name {
            "hash" => IndexMethod::Hash,
            "gin" => IndexMethod::Gin,
            "gist" => IndexMethod::Gist,
            "spgist" => IndexMethod::SpGist,
            "brin" => IndexMethod::Brin,
            _ => IndexMethod::BTree,
        }
    }
}

/// Snapshot of a source index, captured verbatim so unique, partial and
/// expression indexes all survive replication unmodified (spec §4.4).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub mirror: MirrorName,
    pub destination_table: String,
    pub index_name: String,
    pub method: IndexMethod,
    pub is_unique: bool,
    pub is_primary: bool,
    pub definition: String,
    pub replicated: bool,
}
