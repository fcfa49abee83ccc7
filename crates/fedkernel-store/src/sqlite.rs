//! SQLite implementation of [`FederationStore`].
//!
//! [`SqliteStore`] persists the federation graph in a SQLite database with
//! WAL mode, transactions around every multi-row write, and automatic
//! schema migrations. Node-id lists on proposals are stored as JSON TEXT
//! columns via serde_json.

use rusqlite::{params, Connection, OptionalExtension};

use fedkernel_core::{
    CrossLink, FileRecord, NodeId, PatchId, PatchProposal, PatchStatus, PendingLink,
    PendingLinkKey, RepoId, RepoStatus, Repository, Span, SymbolNode,
};

use crate::error::StorageError;
use crate::plan::{SnapshotOutcome, SnapshotPlan};
use crate::traits::{FederationStore, LinkDirection};

/// SQLite-backed implementation of [`FederationStore`].
pub struct SqliteStore {
    conn: Connection,
}

/// Raw proposal row before id/status parsing.
type ProposalRow = (
    String,
    i64,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    i64,
    Option<String>,
    Option<i64>,
    Option<String>,
);

impl SqliteStore {
    /// Opens (or creates) a SQLite database at `path`.
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let conn = crate::schema::open_database(path)?;
        Ok(SqliteStore { conn })
    }

    /// Opens an in-memory SQLite database (for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = crate::schema::open_in_memory()?;
        Ok(SqliteStore { conn })
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn parse_node_id(hex: &str) -> Result<NodeId, StorageError> {
        NodeId::parse_hex(hex).map_err(|_| StorageError::CorruptRecord {
            reason: format!("bad node id in database: '{hex}'"),
        })
    }

    fn parse_repo_status(s: &str) -> Result<RepoStatus, StorageError> {
        RepoStatus::parse(s).map_err(|_| StorageError::CorruptRecord {
            reason: format!("bad repository status in database: '{s}'"),
        })
    }

    fn parse_patch_status(s: &str) -> Result<PatchStatus, StorageError> {
        PatchStatus::parse(s).map_err(|_| StorageError::CorruptRecord {
            reason: format!("bad proposal status in database: '{s}'"),
        })
    }

    fn repo_from_parts(
        repo_id: i64,
        owner: String,
        repo: String,
        default_branch: String,
        status: String,
    ) -> Result<Repository, StorageError> {
        Ok(Repository {
            repo_id: RepoId(repo_id),
            owner,
            repo,
            default_branch,
            status: Self::parse_repo_status(&status)?,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn node_from_parts(
        node_id: String,
        repo_id: i64,
        file_path: String,
        name: String,
        kind: String,
        span_start: Option<u32>,
        span_end: Option<u32>,
        tombstoned: bool,
    ) -> Result<SymbolNode, StorageError> {
        let span = match (span_start, span_end) {
            (Some(start_line), Some(end_line)) => Some(Span {
                start_line,
                end_line,
            }),
            _ => None,
        };
        Ok(SymbolNode {
            node_id: Self::parse_node_id(&node_id)?,
            repo_id: RepoId(repo_id),
            file_path,
            name,
            kind,
            span,
            tombstoned,
        })
    }

    fn query_nodes(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<SymbolNode>, StorageError> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<u32>>(5)?,
                row.get::<_, Option<u32>>(6)?,
                row.get::<_, bool>(7)?,
            ))
        })?;
        let mut nodes = Vec::new();
        for row in rows {
            let (node_id, repo_id, file_path, name, kind, span_start, span_end, tombstoned) = row?;
            nodes.push(Self::node_from_parts(
                node_id, repo_id, file_path, name, kind, span_start, span_end, tombstoned,
            )?);
        }
        Ok(nodes)
    }

    fn query_links(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<CrossLink>, StorageError> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, bool>(5)?,
            ))
        })?;
        let mut links = Vec::new();
        for row in rows {
            let (from, to, kind, weight, notes, retired) = row?;
            links.push(CrossLink {
                from: Self::parse_node_id(&from)?,
                to: Self::parse_node_id(&to)?,
                kind,
                weight,
                notes,
                retired,
            });
        }
        Ok(links)
    }

    fn query_pending(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<PendingLink>, StorageError> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, f64>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, u32>(8)?,
                row.get::<_, bool>(9)?,
            ))
        })?;
        let mut links = Vec::new();
        for row in rows {
            let (from, target_owner, target_repo, target_symbol, hint, kind, weight, notes, attempts, resolved) =
                row?;
            links.push(PendingLink {
                from: Self::parse_node_id(&from)?,
                target_owner,
                target_repo,
                target_symbol,
                hint_path: hint,
                kind,
                weight,
                notes,
                attempts,
                resolved,
            });
        }
        Ok(links)
    }

    fn proposal_from_row(row: ProposalRow) -> Result<PatchProposal, StorageError> {
        let (
            patch_id,
            repo_id,
            owner,
            repo,
            file_path,
            targets_json,
            actor,
            status,
            conflicts_json,
            created_at,
            reviewed_by,
            decided_at,
            decided_by,
        ) = row;

        let target_hex: Vec<String> = serde_json::from_str(&targets_json)?;
        let mut target_node_ids = Vec::with_capacity(target_hex.len());
        for hex in &target_hex {
            target_node_ids.push(Self::parse_node_id(hex)?);
        }

        let conflict_strs: Vec<String> = serde_json::from_str(&conflicts_json)?;
        let mut conflicts_with = Vec::with_capacity(conflict_strs.len());
        for s in &conflict_strs {
            conflicts_with.push(PatchId::parse(s).map_err(|_| StorageError::CorruptRecord {
                reason: format!("bad patch id in conflicts_with: '{s}'"),
            })?);
        }

        Ok(PatchProposal {
            patch_id: PatchId::parse(&patch_id).map_err(|_| StorageError::CorruptRecord {
                reason: format!("bad patch id in database: '{patch_id}'"),
            })?,
            repo_id: RepoId(repo_id),
            owner,
            repo,
            file_path,
            target_node_ids,
            actor,
            status: Self::parse_patch_status(&status)?,
            conflicts_with,
            created_at,
            reviewed_by,
            decided_at,
            decided_by,
        })
    }

    fn query_proposals(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<PatchProposal>, StorageError> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
                row.get::<_, i64>(9)?,
                row.get::<_, Option<String>>(10)?,
                row.get::<_, Option<i64>>(11)?,
                row.get::<_, Option<String>>(12)?,
            ))
        })?;
        let mut proposals = Vec::new();
        for row in rows {
            proposals.push(Self::proposal_from_row(row?)?);
        }
        Ok(proposals)
    }

    fn targets_to_json(proposal: &PatchProposal) -> Result<(String, String), StorageError> {
        let targets: Vec<String> = proposal
            .target_node_ids
            .iter()
            .map(NodeId::to_hex)
            .collect();
        let conflicts: Vec<String> = proposal
            .conflicts_with
            .iter()
            .map(|id| id.to_string())
            .collect();
        Ok((
            serde_json::to_string(&targets)?,
            serde_json::to_string(&conflicts)?,
        ))
    }
}

const SELECT_NODE_COLS: &str =
    "node_id, repo_id, file_path, name, kind, span_start, span_end, tombstoned";
const SELECT_LINK_COLS: &str = "from_node_id, to_node_id, kind, weight, notes, retired";
const SELECT_PENDING_COLS: &str = "from_node_id, target_owner, target_repo, target_symbol, \
     hint_path, kind, weight, notes, attempts, resolved";
const SELECT_PROPOSAL_COLS: &str = "patch_id, repo_id, owner, repo, file_path, target_node_ids, \
     actor, status, conflicts_with, created_at, reviewed_by, decided_at, decided_by";

impl FederationStore for SqliteStore {
    // -------------------------------------------------------------------
    // Repositories
    // -------------------------------------------------------------------

    fn create_repo(
        &mut self,
        owner: &str,
        repo: &str,
        default_branch: &str,
    ) -> Result<Repository, StorageError> {
        if self.find_repo(owner, repo)?.is_some() {
            return Err(StorageError::RepoExists {
                owner: owner.to_string(),
                repo: repo.to_string(),
            });
        }
        self.conn.execute(
            "INSERT INTO repos (owner, repo, default_branch, status) VALUES (?1, ?2, ?3, ?4)",
            params![owner, repo, default_branch, RepoStatus::Pending.as_str()],
        )?;
        let repo_id = RepoId(self.conn.last_insert_rowid());
        Ok(Repository {
            repo_id,
            owner: owner.to_string(),
            repo: repo.to_string(),
            default_branch: default_branch.to_string(),
            status: RepoStatus::Pending,
        })
    }

    fn get_repo(&self, repo_id: RepoId) -> Result<Repository, StorageError> {
        let row = self
            .conn
            .query_row(
                "SELECT repo_id, owner, repo, default_branch, status FROM repos WHERE repo_id = ?1",
                params![repo_id.0],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;
        match row {
            Some((id, owner, repo, branch, status)) => {
                Self::repo_from_parts(id, owner, repo, branch, status)
            }
            None => Err(StorageError::RepoNotFound(repo_id)),
        }
    }

    fn find_repo(&self, owner: &str, repo: &str) -> Result<Option<Repository>, StorageError> {
        let row = self
            .conn
            .query_row(
                "SELECT repo_id, owner, repo, default_branch, status FROM repos \
                 WHERE owner = ?1 AND repo = ?2",
                params![owner, repo],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;
        match row {
            Some((id, owner, repo, branch, status)) => {
                Ok(Some(Self::repo_from_parts(id, owner, repo, branch, status)?))
            }
            None => Ok(None),
        }
    }

    fn set_repo_status(
        &mut self,
        repo_id: RepoId,
        status: RepoStatus,
    ) -> Result<(), StorageError> {
        let updated = self.conn.execute(
            "UPDATE repos SET status = ?1 WHERE repo_id = ?2",
            params![status.as_str(), repo_id.0],
        )?;
        if updated == 0 {
            return Err(StorageError::RepoNotFound(repo_id));
        }
        Ok(())
    }

    fn list_repos(&self) -> Result<Vec<Repository>, StorageError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT repo_id, owner, repo, default_branch, status FROM repos ORDER BY repo_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;
        let mut repos = Vec::new();
        for row in rows {
            let (id, owner, repo, branch, status) = row?;
            repos.push(Self::repo_from_parts(id, owner, repo, branch, status)?);
        }
        Ok(repos)
    }

    // -------------------------------------------------------------------
    // Files and nodes
    // -------------------------------------------------------------------

    fn get_file(
        &self,
        repo_id: RepoId,
        file_path: &str,
    ) -> Result<Option<FileRecord>, StorageError> {
        let row = self
            .conn
            .query_row(
                "SELECT content_hash FROM files WHERE repo_id = ?1 AND file_path = ?2",
                params![repo_id.0, file_path],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(row.map(|content_hash| FileRecord {
            repo_id,
            file_path: file_path.to_string(),
            content_hash,
        }))
    }

    fn list_files(&self, repo_id: RepoId) -> Result<Vec<FileRecord>, StorageError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT file_path, content_hash FROM files WHERE repo_id = ?1 ORDER BY file_path",
        )?;
        let rows = stmt.query_map(params![repo_id.0], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut files = Vec::new();
        for row in rows {
            let (file_path, content_hash) = row?;
            files.push(FileRecord {
                repo_id,
                file_path,
                content_hash,
            });
        }
        Ok(files)
    }

    fn upsert_file(&mut self, file: &FileRecord) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO files (repo_id, file_path, content_hash) VALUES (?1, ?2, ?3) \
             ON CONFLICT (repo_id, file_path) DO UPDATE SET content_hash = excluded.content_hash",
            params![file.repo_id.0, file.file_path, file.content_hash],
        )?;
        Ok(())
    }

    fn get_node(&self, node_id: NodeId) -> Result<Option<SymbolNode>, StorageError> {
        let nodes = self.query_nodes(
            &format!("SELECT {SELECT_NODE_COLS} FROM nodes WHERE node_id = ?1"),
            &[&node_id.to_hex()],
        )?;
        Ok(nodes.into_iter().next())
    }

    fn upsert_node(&mut self, node: &SymbolNode) -> Result<(), StorageError> {
        let (span_start, span_end) = match node.span {
            Some(span) => (Some(span.start_line), Some(span.end_line)),
            None => (None, None),
        };
        self.conn.execute(
            "INSERT INTO nodes (node_id, repo_id, file_path, name, kind, span_start, span_end, tombstoned) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0) \
             ON CONFLICT (node_id) DO UPDATE SET \
               span_start = excluded.span_start, \
               span_end = excluded.span_end, \
               tombstoned = 0",
            params![
                node.node_id.to_hex(),
                node.repo_id.0,
                node.file_path,
                node.name,
                node.kind,
                span_start,
                span_end,
            ],
        )?;
        Ok(())
    }

    fn list_nodes_in_file(
        &self,
        repo_id: RepoId,
        file_path: &str,
        include_tombstoned: bool,
    ) -> Result<Vec<SymbolNode>, StorageError> {
        let sql = if include_tombstoned {
            format!(
                "SELECT {SELECT_NODE_COLS} FROM nodes \
                 WHERE repo_id = ?1 AND file_path = ?2 ORDER BY name, kind"
            )
        } else {
            format!(
                "SELECT {SELECT_NODE_COLS} FROM nodes \
                 WHERE repo_id = ?1 AND file_path = ?2 AND tombstoned = 0 ORDER BY name, kind"
            )
        };
        self.query_nodes(&sql, &[&repo_id.0, &file_path])
    }

    fn find_nodes_by_symbol(
        &self,
        repo_id: RepoId,
        name: &str,
    ) -> Result<Vec<SymbolNode>, StorageError> {
        self.query_nodes(
            &format!(
                "SELECT {SELECT_NODE_COLS} FROM nodes \
                 WHERE repo_id = ?1 AND name = ?2 AND tombstoned = 0 ORDER BY file_path, kind"
            ),
            &[&repo_id.0, &name],
        )
    }

    fn list_nodes(&self, repo_id: Option<RepoId>) -> Result<Vec<SymbolNode>, StorageError> {
        match repo_id {
            Some(id) => self.query_nodes(
                &format!(
                    "SELECT {SELECT_NODE_COLS} FROM nodes WHERE repo_id = ?1 \
                     ORDER BY repo_id, file_path, name, kind"
                ),
                &[&id.0],
            ),
            None => self.query_nodes(
                &format!(
                    "SELECT {SELECT_NODE_COLS} FROM nodes \
                     ORDER BY repo_id, file_path, name, kind"
                ),
                &[],
            ),
        }
    }

    // -------------------------------------------------------------------
    // Links
    // -------------------------------------------------------------------

    fn upsert_link(&mut self, link: &CrossLink) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO links (from_node_id, to_node_id, kind, weight, notes, retired) \
             VALUES (?1, ?2, ?3, ?4, ?5, 0) \
             ON CONFLICT (from_node_id, to_node_id, kind) DO UPDATE SET \
               weight = excluded.weight, notes = excluded.notes, retired = 0",
            params![
                link.from.to_hex(),
                link.to.to_hex(),
                link.kind,
                link.weight,
                link.notes,
            ],
        )?;
        Ok(())
    }

    fn list_links(
        &self,
        node_id: NodeId,
        direction: LinkDirection,
    ) -> Result<Vec<CrossLink>, StorageError> {
        let column = match direction {
            LinkDirection::Outgoing => "from_node_id",
            LinkDirection::Incoming => "to_node_id",
        };
        self.query_links(
            &format!(
                "SELECT {SELECT_LINK_COLS} FROM links WHERE {column} = ?1 \
                 ORDER BY from_node_id, to_node_id, kind"
            ),
            &[&node_id.to_hex()],
        )
    }

    fn list_all_links(&self) -> Result<Vec<CrossLink>, StorageError> {
        self.query_links(
            &format!(
                "SELECT {SELECT_LINK_COLS} FROM links ORDER BY from_node_id, to_node_id, kind"
            ),
            &[],
        )
    }

    fn upsert_pending_link(&mut self, link: &PendingLink) -> Result<(), StorageError> {
        // attempts and resolved are preserved on conflict: re-ingestion
        // must not reset the audit trail.
        self.conn.execute(
            "INSERT INTO pending_links \
               (from_node_id, target_owner, target_repo, target_symbol, hint_path, kind, weight, notes, attempts, resolved) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
             ON CONFLICT (from_node_id, target_owner, target_repo, target_symbol) DO UPDATE SET \
               hint_path = excluded.hint_path, kind = excluded.kind, \
               weight = excluded.weight, notes = excluded.notes",
            params![
                link.from.to_hex(),
                link.target_owner,
                link.target_repo,
                link.target_symbol,
                link.hint_path,
                link.kind,
                link.weight,
                link.notes,
                link.attempts,
                link.resolved,
            ],
        )?;
        Ok(())
    }

    fn list_unresolved(
        &self,
        target_owner: &str,
        target_repo: &str,
    ) -> Result<Vec<PendingLink>, StorageError> {
        self.query_pending(
            &format!(
                "SELECT {SELECT_PENDING_COLS} FROM pending_links \
                 WHERE target_owner = ?1 AND target_repo = ?2 AND resolved = 0 \
                 ORDER BY from_node_id, target_symbol"
            ),
            &[&target_owner, &target_repo],
        )
    }

    fn list_pending_from_repo(&self, repo_id: RepoId) -> Result<Vec<PendingLink>, StorageError> {
        self.query_pending(
            &format!(
                "SELECT p.from_node_id, p.target_owner, p.target_repo, p.target_symbol, \
                        p.hint_path, p.kind, p.weight, p.notes, p.attempts, p.resolved \
                 FROM pending_links p JOIN nodes n ON n.node_id = p.from_node_id \
                 WHERE n.repo_id = ?1 ORDER BY p.from_node_id, p.target_symbol"
            ),
            &[&repo_id.0],
        )
    }

    fn list_all_pending(&self) -> Result<Vec<PendingLink>, StorageError> {
        self.query_pending(
            &format!(
                "SELECT {SELECT_PENDING_COLS} FROM pending_links \
                 ORDER BY from_node_id, target_symbol"
            ),
            &[],
        )
    }

    fn mark_pending_resolved(&mut self, key: &PendingLinkKey) -> Result<(), StorageError> {
        self.conn.execute(
            "UPDATE pending_links SET resolved = 1 \
             WHERE from_node_id = ?1 AND target_owner = ?2 AND target_repo = ?3 \
               AND target_symbol = ?4",
            params![
                key.from.to_hex(),
                key.target_owner,
                key.target_repo,
                key.target_symbol,
            ],
        )?;
        Ok(())
    }

    fn bump_pending_attempts(&mut self, key: &PendingLinkKey) -> Result<(), StorageError> {
        self.conn.execute(
            "UPDATE pending_links SET attempts = attempts + 1 \
             WHERE from_node_id = ?1 AND target_owner = ?2 AND target_repo = ?3 \
               AND target_symbol = ?4",
            params![
                key.from.to_hex(),
                key.target_owner,
                key.target_repo,
                key.target_symbol,
            ],
        )?;
        Ok(())
    }

    // -------------------------------------------------------------------
    // Snapshots
    // -------------------------------------------------------------------

    fn apply_snapshot(&mut self, plan: &SnapshotPlan) -> Result<SnapshotOutcome, StorageError> {
        let mut outcome = SnapshotOutcome {
            files_skipped: plan.skipped.len(),
            ..Default::default()
        };

        let tx = self.conn.transaction()?;
        {
            let mut upsert_file = tx.prepare_cached(
                "INSERT INTO files (repo_id, file_path, content_hash) VALUES (?1, ?2, ?3) \
                 ON CONFLICT (repo_id, file_path) DO UPDATE SET content_hash = excluded.content_hash",
            )?;
            let mut upsert_node = tx.prepare_cached(
                "INSERT INTO nodes (node_id, repo_id, file_path, name, kind, span_start, span_end, tombstoned) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0) \
                 ON CONFLICT (node_id) DO UPDATE SET \
                   span_start = excluded.span_start, \
                   span_end = excluded.span_end, \
                   tombstoned = 0",
            )?;
            let mut tombstone_node =
                tx.prepare_cached("UPDATE nodes SET tombstoned = 1 WHERE node_id = ?1")?;
            let mut retire_links =
                tx.prepare_cached("UPDATE links SET retired = 1 WHERE from_node_id = ?1")?;
            let mut reopen_pending =
                tx.prepare_cached("UPDATE pending_links SET resolved = 0 WHERE from_node_id = ?1")?;
            let mut upsert_pending = tx.prepare_cached(
                "INSERT INTO pending_links \
                   (from_node_id, target_owner, target_repo, target_symbol, hint_path, kind, weight, notes, attempts, resolved) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, 0) \
                 ON CONFLICT (from_node_id, target_owner, target_repo, target_symbol) DO UPDATE SET \
                   hint_path = excluded.hint_path, kind = excluded.kind, \
                   weight = excluded.weight, notes = excluded.notes",
            )?;

            // Per-file chunks keep each statement's work bounded; the
            // surrounding transaction keeps the whole snapshot invisible
            // until commit.
            for file_plan in &plan.files {
                upsert_file.execute(params![
                    file_plan.file.repo_id.0,
                    file_plan.file.file_path,
                    file_plan.file.content_hash,
                ])?;
                outcome.files_applied += 1;

                for node in &file_plan.nodes {
                    let (span_start, span_end) = match node.span {
                        Some(span) => (Some(span.start_line), Some(span.end_line)),
                        None => (None, None),
                    };
                    upsert_node.execute(params![
                        node.node_id.to_hex(),
                        node.repo_id.0,
                        node.file_path,
                        node.name,
                        node.kind,
                        span_start,
                        span_end,
                    ])?;
                    outcome.nodes_upserted += 1;
                }

                for node_id in &file_plan.tombstoned {
                    let hex = node_id.to_hex();
                    tombstone_node.execute(params![hex])?;
                    retire_links.execute(params![hex])?;
                    reopen_pending.execute(params![hex])?;
                    outcome.nodes_tombstoned += 1;
                }

                for pending in &file_plan.pending_links {
                    upsert_pending.execute(params![
                        pending.from.to_hex(),
                        pending.target_owner,
                        pending.target_repo,
                        pending.target_symbol,
                        pending.hint_path,
                        pending.kind,
                        pending.weight,
                        pending.notes,
                    ])?;
                    outcome.links_declared += 1;
                }
            }

            for pending in &plan.loose_links {
                upsert_pending.execute(params![
                    pending.from.to_hex(),
                    pending.target_owner,
                    pending.target_repo,
                    pending.target_symbol,
                    pending.hint_path,
                    pending.kind,
                    pending.weight,
                    pending.notes,
                ])?;
                outcome.links_declared += 1;
            }
        }
        tx.commit()?;

        Ok(outcome)
    }

    // -------------------------------------------------------------------
    // Proposals
    // -------------------------------------------------------------------

    fn insert_proposal(&mut self, proposal: &PatchProposal) -> Result<(), StorageError> {
        let (targets_json, conflicts_json) = Self::targets_to_json(proposal)?;
        self.conn.execute(
            "INSERT INTO proposals \
               (patch_id, repo_id, owner, repo, file_path, target_node_ids, actor, status, \
                conflicts_with, created_at, reviewed_by, decided_at, decided_by) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                proposal.patch_id.to_string(),
                proposal.repo_id.0,
                proposal.owner,
                proposal.repo,
                proposal.file_path,
                targets_json,
                proposal.actor,
                proposal.status.as_str(),
                conflicts_json,
                proposal.created_at,
                proposal.reviewed_by,
                proposal.decided_at,
                proposal.decided_by,
            ],
        )?;
        Ok(())
    }

    fn get_proposal(&self, patch_id: PatchId) -> Result<Option<PatchProposal>, StorageError> {
        let proposals = self.query_proposals(
            &format!("SELECT {SELECT_PROPOSAL_COLS} FROM proposals WHERE patch_id = ?1"),
            &[&patch_id.to_string()],
        )?;
        Ok(proposals.into_iter().next())
    }

    fn update_proposals(&mut self, proposals: &[PatchProposal]) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        {
            let mut update = tx.prepare_cached(
                "UPDATE proposals SET status = ?2, conflicts_with = ?3, reviewed_by = ?4, \
                   decided_at = ?5, decided_by = ?6 \
                 WHERE patch_id = ?1",
            )?;
            for proposal in proposals {
                let (_, conflicts_json) = Self::targets_to_json(proposal)?;
                let updated = update.execute(params![
                    proposal.patch_id.to_string(),
                    proposal.status.as_str(),
                    conflicts_json,
                    proposal.reviewed_by,
                    proposal.decided_at,
                    proposal.decided_by,
                ])?;
                if updated == 0 {
                    return Err(StorageError::ProposalNotFound(proposal.patch_id));
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn list_proposals(
        &self,
        status: Option<PatchStatus>,
    ) -> Result<Vec<PatchProposal>, StorageError> {
        match status {
            Some(s) => self.query_proposals(
                &format!(
                    "SELECT {SELECT_PROPOSAL_COLS} FROM proposals WHERE status = ?1 \
                     ORDER BY created_at DESC, patch_id"
                ),
                &[&s.as_str()],
            ),
            None => self.query_proposals(
                &format!(
                    "SELECT {SELECT_PROPOSAL_COLS} FROM proposals \
                     ORDER BY created_at DESC, patch_id"
                ),
                &[],
            ),
        }
    }

    fn find_open_proposals_touching(
        &self,
        node_ids: &[NodeId],
    ) -> Result<Vec<PatchProposal>, StorageError> {
        // Target sets are JSON columns; fetch open proposals and
        // intersect in Rust.
        let open = self.query_proposals(
            &format!(
                "SELECT {SELECT_PROPOSAL_COLS} FROM proposals \
                 WHERE status IN ('Proposed', 'UnderReview', 'Conflicted') \
                 ORDER BY created_at, patch_id"
            ),
            &[],
        )?;
        Ok(open
            .into_iter()
            .filter(|p| p.targets_overlap(node_ids))
            .collect())
    }
}
