//! Extracted symbol/reference facts, as emitted by the external fact
//! extraction collaborator for one repository snapshot.
//!
//! A batch is the complete fact set for the files it declares; the
//! ingestor validates internal consistency (see the snapshot plan builder
//! in fedkernel-store) and reports the offending record on failure.

use serde::{Deserialize, Serialize};

use crate::node::Span;

/// Reference to a node declared in the same batch, or already live in the
/// graph, by its identity fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub file_path: String,
    pub name: String,
    pub kind: String,
}

fn default_link_kind() -> String {
    "references".to_string()
}

fn default_weight() -> f64 {
    1.0
}

/// One extracted fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Fact {
    /// A file exists in this snapshot. Declaring a file makes the batch
    /// authoritative for it: prior nodes absent from the batch are
    /// tombstoned.
    FileDeclared { file_path: String },

    /// A symbol declared inside a file of this snapshot.
    NodeDeclared {
        file_path: String,
        name: String,
        kind: String,
        #[serde(default)]
        span: Option<Span>,
    },

    /// A reference from a node in this snapshot to a symbol in some
    /// repository, which may not be ingested yet.
    LinkDeclared {
        from: NodeRef,
        target_owner: String,
        target_repo: String,
        target_symbol: String,
        #[serde(default)]
        hint_path: Option<String>,
        #[serde(default = "default_link_kind")]
        kind: String,
        #[serde(default = "default_weight")]
        weight: f64,
        #[serde(default)]
        notes: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facts_use_snake_case_tags() {
        let fact: Fact = serde_json::from_str(
            r#"{"type": "node_declared", "file_path": "f.py", "name": "foo", "kind": "function"}"#,
        )
        .unwrap();
        match fact {
            Fact::NodeDeclared { name, span, .. } => {
                assert_eq!(name, "foo");
                assert!(span.is_none());
            }
            other => panic!("unexpected fact: {other:?}"),
        }
    }

    #[test]
    fn link_declared_defaults() {
        let fact: Fact = serde_json::from_str(
            r#"{
                "type": "link_declared",
                "from": {"file_path": "f.py", "name": "foo", "kind": "function"},
                "target_owner": "acme",
                "target_repo": "util",
                "target_symbol": "helper"
            }"#,
        )
        .unwrap();
        match fact {
            Fact::LinkDeclared {
                kind,
                weight,
                notes,
                hint_path,
                ..
            } => {
                assert_eq!(kind, "references");
                assert_eq!(weight, 1.0);
                assert!(notes.is_empty());
                assert!(hint_path.is_none());
            }
            other => panic!("unexpected fact: {other:?}"),
        }
    }
}
