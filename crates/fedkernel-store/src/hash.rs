//! Deterministic identity and content hashing using blake3.
//!
//! Two digests drive the engine's idempotence guarantees:
//!
//! - **Node identity**: [`node_id_for`] digests the identity tuple
//!   `(repo_id, file_path, name, kind)`, so the same declaration always
//!   maps to the same [`NodeId`] across re-ingestions.
//! - **File content**: [`file_content_hash`] digests a file's fact content
//!   in canonical order, so an unchanged file hashes identically no matter
//!   how the extractor ordered its batch.
//!
//! # Determinism
//!
//! All hashing is deterministic: same content always produces the same
//! digest. This is ensured by:
//! - Using `serde_json::to_vec` for canonical serialization
//! - Sorting nodes and links by deterministic keys before hashing
//! - Never feeding HashMap iteration order into a hasher

use fedkernel_core::{NodeId, RepoId, Span};

/// One declared node of a file, as seen by the content hash.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct NodeSeed {
    pub name: String,
    pub kind: String,
    pub span: Option<Span>,
}

/// One declared outgoing link of a file, as seen by the content hash.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct LinkSeed {
    pub from_name: String,
    pub from_kind: String,
    pub target_owner: String,
    pub target_repo: String,
    pub target_symbol: String,
    pub hint_path: Option<String>,
    pub kind: String,
    pub weight: f64,
    pub notes: String,
}

/// Computes the deterministic node id for an identity tuple.
pub fn node_id_for(repo_id: RepoId, file_path: &str, name: &str, kind: &str) -> NodeId {
    let identity = serde_json::to_vec(&(repo_id.0, file_path, name, kind))
        .expect("identity tuple serialization should never fail");
    NodeId::from_bytes(*blake3::hash(&identity).as_bytes())
}

/// Computes a file's content hash from its declared nodes and links.
///
/// Inputs are sorted by their identity keys before hashing, so batch
/// ordering never affects the digest. Returns the lowercase hex form
/// stored in the file record.
pub fn file_content_hash(nodes: &[NodeSeed], links: &[LinkSeed]) -> String {
    let mut sorted_nodes: Vec<&NodeSeed> = nodes.iter().collect();
    sorted_nodes.sort_by(|a, b| (&a.name, &a.kind).cmp(&(&b.name, &b.kind)));

    let mut sorted_links: Vec<&LinkSeed> = links.iter().collect();
    sorted_links.sort_by(|a, b| {
        (
            &a.from_name,
            &a.from_kind,
            &a.target_owner,
            &a.target_repo,
            &a.target_symbol,
            &a.kind,
        )
            .cmp(&(
                &b.from_name,
                &b.from_kind,
                &b.target_owner,
                &b.target_repo,
                &b.target_symbol,
                &b.kind,
            ))
    });

    let mut hasher = blake3::Hasher::new();
    for node in sorted_nodes {
        let bytes = serde_json::to_vec(node).expect("node seed serialization should never fail");
        hasher.update(&bytes);
    }
    // Separator so a link can never collide with a node of the same shape.
    hasher.update(b"\0links\0");
    for link in sorted_links {
        let bytes = serde_json::to_vec(link).expect("link seed serialization should never fail");
        hasher.update(&bytes);
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn seed(name: &str) -> NodeSeed {
        NodeSeed {
            name: name.to_string(),
            kind: "function".to_string(),
            span: None,
        }
    }

    #[test]
    fn node_id_is_deterministic() {
        let a = node_id_for(RepoId(1), "src/f.py", "foo", "function");
        let b = node_id_for(RepoId(1), "src/f.py", "foo", "function");
        assert_eq!(a, b);
    }

    #[test]
    fn node_id_changes_with_any_identity_field() {
        let base = node_id_for(RepoId(1), "src/f.py", "foo", "function");
        assert_ne!(base, node_id_for(RepoId(2), "src/f.py", "foo", "function"));
        assert_ne!(base, node_id_for(RepoId(1), "src/g.py", "foo", "function"));
        assert_ne!(base, node_id_for(RepoId(1), "src/f.py", "bar", "function"));
        assert_ne!(base, node_id_for(RepoId(1), "src/f.py", "foo", "class"));
    }

    #[test]
    fn content_hash_ignores_declaration_order() {
        let forward = file_content_hash(&[seed("a"), seed("b")], &[]);
        let reversed = file_content_hash(&[seed("b"), seed("a")], &[]);
        assert_eq!(forward, reversed);
    }

    #[test]
    fn content_hash_sees_every_field() {
        let base = file_content_hash(&[seed("a")], &[]);
        let mut with_span = seed("a");
        with_span.span = Some(Span {
            start_line: 1,
            end_line: 4,
        });
        assert_ne!(base, file_content_hash(&[with_span], &[]));

        let link = LinkSeed {
            from_name: "a".into(),
            from_kind: "function".into(),
            target_owner: "acme".into(),
            target_repo: "util".into(),
            target_symbol: "helper".into(),
            hint_path: None,
            kind: "calls".into(),
            weight: 1.0,
            notes: String::new(),
        };
        assert_ne!(base, file_content_hash(&[seed("a")], &[link]));
    }

    proptest! {
        #[test]
        fn node_id_pure_function(
            repo in 1i64..1000,
            path in "[a-z/]{1,20}",
            name in "[a-zA-Z_]{1,20}",
            kind in "[a-z]{1,10}",
        ) {
            let a = node_id_for(RepoId(repo), &path, &name, &kind);
            let b = node_id_for(RepoId(repo), &path, &name, &kind);
            prop_assert_eq!(a, b);
        }

        #[test]
        fn content_hash_permutation_invariant(names in proptest::collection::vec("[a-z]{1,8}", 1..6)) {
            let seeds: Vec<NodeSeed> = names.iter().map(|n| seed(n)).collect();
            let mut shuffled = seeds.clone();
            shuffled.reverse();
            prop_assert_eq!(
                file_content_hash(&seeds, &[]),
                file_content_hash(&shuffled, &[])
            );
        }
    }
}
