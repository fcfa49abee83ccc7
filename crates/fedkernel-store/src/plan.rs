//! Snapshot plan construction: validation and diffing of a fact batch
//! against the stored graph.
//!
//! Building a plan is a pure read phase -- nothing is written until the
//! whole batch has validated, after which [`FederationStore::apply_snapshot`]
//! commits the plan atomically. A file becomes part of the snapshot either
//! through an explicit `file_declared` fact or implicitly when the batch
//! declares nodes for a file already on record; in both cases the batch is
//! authoritative for that file's content, and prior nodes absent from it
//! are tombstoned.
//!
//! [`FederationStore::apply_snapshot`]: crate::traits::FederationStore::apply_snapshot

use indexmap::IndexMap;
use serde::Serialize;

use fedkernel_core::{Fact, FileRecord, NodeId, PendingLink, RepoId, Span, SymbolNode};

use crate::error::StorageError;
use crate::hash::{file_content_hash, node_id_for, LinkSeed, NodeSeed};
use crate::traits::FederationStore;

/// Everything to write for one changed file.
#[derive(Debug, Clone)]
pub struct FilePlan {
    pub file: FileRecord,
    pub nodes: Vec<SymbolNode>,
    pub pending_links: Vec<PendingLink>,
    /// Prior live nodes absent from the new fact set.
    pub tombstoned: Vec<NodeId>,
}

/// A validated, diffed unit of ingestion for one repository snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotPlan {
    pub repo_id: RepoId,
    /// Changed files, in batch declaration order.
    pub files: Vec<FilePlan>,
    /// Files whose content hash matched the stored record; untouched.
    pub skipped: Vec<String>,
    /// Links declared from nodes that already exist in the graph and were
    /// not re-declared by this batch.
    pub loose_links: Vec<PendingLink>,
}

/// Counters reported after a snapshot commits.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SnapshotOutcome {
    pub files_applied: usize,
    pub files_skipped: usize,
    pub nodes_upserted: usize,
    pub nodes_tombstoned: usize,
    pub links_declared: usize,
}

#[derive(Default)]
struct FileSeed {
    nodes: IndexMap<(String, String), Option<Span>>,
    links: Vec<LinkSeedRef>,
}

struct LinkSeedRef {
    from_name: String,
    from_kind: String,
    target_owner: String,
    target_repo: String,
    target_symbol: String,
    hint_path: Option<String>,
    kind: String,
    weight: f64,
    notes: String,
}

fn invalid(index: usize, reason: impl Into<String>, fact: &Fact) -> StorageError {
    StorageError::InvalidFact {
        index,
        reason: reason.into(),
        fact: serde_json::to_value(fact).unwrap_or(serde_json::Value::Null),
    }
}

/// Validates a fact batch and diffs it against the store, producing the
/// plan to apply.
///
/// Fails with [`StorageError::InvalidFact`] -- carrying the offending
/// record -- on the first inconsistency: a duplicate declaration, a node
/// referencing a file that is neither in the batch nor on record, or a
/// link whose source node cannot be found.
pub fn build_snapshot_plan(
    store: &dyn FederationStore,
    repo_id: RepoId,
    facts: &[Fact],
) -> Result<SnapshotPlan, StorageError> {
    let mut seeds: IndexMap<String, FileSeed> = IndexMap::new();
    let mut loose: Vec<PendingLink> = Vec::new();

    for (index, fact) in facts.iter().enumerate() {
        match fact {
            Fact::FileDeclared { file_path } => {
                if seeds.contains_key(file_path) {
                    return Err(invalid(index, format!("file '{file_path}' declared twice"), fact));
                }
                seeds.insert(file_path.clone(), FileSeed::default());
            }
            Fact::NodeDeclared {
                file_path,
                name,
                kind,
                span,
            } => {
                if !seeds.contains_key(file_path) {
                    if store.get_file(repo_id, file_path)?.is_none() {
                        return Err(invalid(
                            index,
                            format!("node '{name}' references undeclared file '{file_path}'"),
                            fact,
                        ));
                    }
                    seeds.insert(file_path.clone(), FileSeed::default());
                }
                let seed = seeds.get_mut(file_path).expect("seed just ensured");
                let key = (name.clone(), kind.clone());
                if seed.nodes.contains_key(&key) {
                    return Err(invalid(
                        index,
                        format!("node '{name}' ({kind}) declared twice in '{file_path}'"),
                        fact,
                    ));
                }
                seed.nodes.insert(key, *span);
            }
            Fact::LinkDeclared {
                from,
                target_owner,
                target_repo,
                target_symbol,
                hint_path,
                kind,
                weight,
                notes,
            } => {
                let in_batch = seeds
                    .get(&from.file_path)
                    .is_some_and(|s| s.nodes.contains_key(&(from.name.clone(), from.kind.clone())));
                if in_batch {
                    let seed = seeds.get_mut(&from.file_path).expect("checked above");
                    seed.links.push(LinkSeedRef {
                        from_name: from.name.clone(),
                        from_kind: from.kind.clone(),
                        target_owner: target_owner.clone(),
                        target_repo: target_repo.clone(),
                        target_symbol: target_symbol.clone(),
                        hint_path: hint_path.clone(),
                        kind: kind.clone(),
                        weight: *weight,
                        notes: notes.clone(),
                    });
                } else {
                    // Source not in the batch: accept only if the node is
                    // already live in the graph.
                    let from_id = node_id_for(repo_id, &from.file_path, &from.name, &from.kind);
                    match store.get_node(from_id)? {
                        Some(node) if node.is_live() => loose.push(PendingLink {
                            from: from_id,
                            target_owner: target_owner.clone(),
                            target_repo: target_repo.clone(),
                            target_symbol: target_symbol.clone(),
                            hint_path: hint_path.clone(),
                            kind: kind.clone(),
                            weight: *weight,
                            notes: notes.clone(),
                            attempts: 0,
                            resolved: false,
                        }),
                        _ => {
                            return Err(invalid(
                                index,
                                format!(
                                    "link source '{}' ({}) in '{}' is not declared in this batch \
                                     and not live in the graph",
                                    from.name, from.kind, from.file_path
                                ),
                                fact,
                            ));
                        }
                    }
                }
            }
        }
    }

    let mut plan = SnapshotPlan {
        repo_id,
        files: Vec::new(),
        skipped: Vec::new(),
        loose_links: loose,
    };

    for (file_path, seed) in &seeds {
        let node_seeds: Vec<NodeSeed> = seed
            .nodes
            .iter()
            .map(|((name, kind), span)| NodeSeed {
                name: name.clone(),
                kind: kind.clone(),
                span: *span,
            })
            .collect();
        let link_seeds: Vec<LinkSeed> = seed
            .links
            .iter()
            .map(|l| LinkSeed {
                from_name: l.from_name.clone(),
                from_kind: l.from_kind.clone(),
                target_owner: l.target_owner.clone(),
                target_repo: l.target_repo.clone(),
                target_symbol: l.target_symbol.clone(),
                hint_path: l.hint_path.clone(),
                kind: l.kind.clone(),
                weight: l.weight,
                notes: l.notes.clone(),
            })
            .collect();

        let content_hash = file_content_hash(&node_seeds, &link_seeds);
        if let Some(existing) = store.get_file(repo_id, file_path)? {
            if existing.content_hash == content_hash {
                plan.skipped.push(file_path.clone());
                continue;
            }
        }

        let nodes: Vec<SymbolNode> = node_seeds
            .iter()
            .map(|n| SymbolNode {
                node_id: node_id_for(repo_id, file_path, &n.name, &n.kind),
                repo_id,
                file_path: file_path.clone(),
                name: n.name.clone(),
                kind: n.kind.clone(),
                span: n.span,
                tombstoned: false,
            })
            .collect();

        let new_ids: Vec<NodeId> = nodes.iter().map(|n| n.node_id).collect();
        let tombstoned: Vec<NodeId> = store
            .list_nodes_in_file(repo_id, file_path, false)?
            .into_iter()
            .map(|n| n.node_id)
            .filter(|id| !new_ids.contains(id))
            .collect();

        let pending_links: Vec<PendingLink> = seed
            .links
            .iter()
            .map(|l| PendingLink {
                from: node_id_for(repo_id, file_path, &l.from_name, &l.from_kind),
                target_owner: l.target_owner.clone(),
                target_repo: l.target_repo.clone(),
                target_symbol: l.target_symbol.clone(),
                hint_path: l.hint_path.clone(),
                kind: l.kind.clone(),
                weight: l.weight,
                notes: l.notes.clone(),
                attempts: 0,
                resolved: false,
            })
            .collect();

        plan.files.push(FilePlan {
            file: FileRecord {
                repo_id,
                file_path: file_path.clone(),
                content_hash,
            },
            nodes,
            pending_links,
            tombstoned,
        });
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use fedkernel_core::NodeRef;

    fn file(path: &str) -> Fact {
        Fact::FileDeclared {
            file_path: path.to_string(),
        }
    }

    fn node(path: &str, name: &str) -> Fact {
        Fact::NodeDeclared {
            file_path: path.to_string(),
            name: name.to_string(),
            kind: "function".to_string(),
            span: None,
        }
    }

    fn link(path: &str, name: &str, target_symbol: &str) -> Fact {
        Fact::LinkDeclared {
            from: NodeRef {
                file_path: path.to_string(),
                name: name.to_string(),
                kind: "function".to_string(),
            },
            target_owner: "acme".to_string(),
            target_repo: "util".to_string(),
            target_symbol: target_symbol.to_string(),
            hint_path: None,
            kind: "calls".to_string(),
            weight: 1.0,
            notes: String::new(),
        }
    }

    fn registered(store: &mut InMemoryStore) -> RepoId {
        store.create_repo("acme", "kernel", "main").unwrap().repo_id
    }

    #[test]
    fn plan_groups_nodes_and_links_per_file() {
        let mut store = InMemoryStore::new();
        let repo_id = registered(&mut store);

        let facts = vec![
            file("a.py"),
            node("a.py", "foo"),
            link("a.py", "foo", "helper"),
            file("b.py"),
            node("b.py", "bar"),
        ];
        let plan = build_snapshot_plan(&store, repo_id, &facts).unwrap();
        assert_eq!(plan.files.len(), 2);
        assert_eq!(plan.files[0].nodes.len(), 1);
        assert_eq!(plan.files[0].pending_links.len(), 1);
        assert_eq!(plan.files[1].nodes.len(), 1);
        assert!(plan.skipped.is_empty());
        assert!(plan.loose_links.is_empty());
    }

    #[test]
    fn node_without_file_reports_offending_fact() {
        let mut store = InMemoryStore::new();
        let repo_id = registered(&mut store);

        let facts = vec![file("a.py"), node("b.py", "bar")];
        let err = build_snapshot_plan(&store, repo_id, &facts).unwrap_err();
        match err {
            StorageError::InvalidFact { index, reason, fact } => {
                assert_eq!(index, 1);
                assert!(reason.contains("undeclared file"), "{reason}");
                assert_eq!(fact["type"], "node_declared");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn link_from_unknown_node_is_rejected() {
        let mut store = InMemoryStore::new();
        let repo_id = registered(&mut store);

        let facts = vec![file("a.py"), link("a.py", "ghost", "helper")];
        let err = build_snapshot_plan(&store, repo_id, &facts).unwrap_err();
        assert!(matches!(err, StorageError::InvalidFact { index: 1, .. }));
    }

    #[test]
    fn duplicate_declarations_are_rejected() {
        let mut store = InMemoryStore::new();
        let repo_id = registered(&mut store);

        let twice = vec![file("a.py"), file("a.py")];
        assert!(matches!(
            build_snapshot_plan(&store, repo_id, &twice),
            Err(StorageError::InvalidFact { index: 1, .. })
        ));

        let dup_node = vec![file("a.py"), node("a.py", "foo"), node("a.py", "foo")];
        assert!(matches!(
            build_snapshot_plan(&store, repo_id, &dup_node),
            Err(StorageError::InvalidFact { index: 2, .. })
        ));
    }

    #[test]
    fn unchanged_file_is_skipped_and_removal_tombstones() {
        let mut store = InMemoryStore::new();
        let repo_id = registered(&mut store);

        let facts = vec![file("a.py"), node("a.py", "foo"), node("a.py", "bar")];
        let plan = build_snapshot_plan(&store, repo_id, &facts).unwrap();
        store.apply_snapshot(&plan).unwrap();

        // Same batch again: nothing to do.
        let replay = build_snapshot_plan(&store, repo_id, &facts).unwrap();
        assert!(replay.files.is_empty());
        assert_eq!(replay.skipped, vec!["a.py".to_string()]);

        // Drop `bar`: the file changes and the prior node is tombstoned.
        let shrunk = vec![file("a.py"), node("a.py", "foo")];
        let plan = build_snapshot_plan(&store, repo_id, &shrunk).unwrap();
        assert_eq!(plan.files.len(), 1);
        assert_eq!(
            plan.files[0].tombstoned,
            vec![node_id_for(repo_id, "a.py", "bar", "function")]
        );
    }
}
