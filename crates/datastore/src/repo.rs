//! A versioned repository of roots.
//!
//! A repository lives in a `.strata` directory:
//!
//! - `objects/` is a [`DirTrieValueStore`] holding tables, roots and commits.
//! - `repo_state.toml` names the checked out branch, every branch's commit,
//!   and the staged and working root hashes.
//! - `config.toml` is the [`Config`].
//!
//! The three states of a repository are `HEAD`, the root of the checked out branch's commit,
//! `staged`, the root the next commit will record, and `working`, the root edits apply to.

use crate::config::Config;
use crate::database::Database;
use crate::error::DatastoreError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strata_sats::buffer::{BufReader, BufWriter, DecodeError};
use strata_sats::codec::{self, Decode, Encode};
use strata_sats::Hash;
use strata_store::{DirTrieValueStore, StoreError, ValueStore};
use strata_table::RootValue;

pub const REPO_DIR: &str = ".strata";
pub const DEFAULT_BRANCH: &str = "main";
const STATE_FILE: &str = "repo_state.toml";
const CONFIG_FILE: &str = "config.toml";
const OBJECTS_DIR: &str = "objects";
const INIT_MESSAGE: &str = "Initialize data repository";

/// Who made a commit, when, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitMeta {
    pub name: Box<str>,
    pub email: Box<str>,
    pub message: Box<str>,
    /// Milliseconds since the unix epoch.
    pub timestamp: i64,
}

impl CommitMeta {
    /// Metadata for a commit made now by the configured user.
    pub fn now(config: &Config, message: &str) -> Self {
        Self {
            name: config.user.name.as_str().into(),
            email: config.user.email.as_str().into(),
            message: message.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn time(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp_millis(self.timestamp)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub root: Hash,
    /// The first parent is the commit this one was made on top of.
    pub parents: Vec<Hash>,
    pub meta: CommitMeta,
}

impl Encode for Commit {
    fn encode(&self, w: &mut impl BufWriter) {
        self.root.encode(w);
        self.parents.encode(w);
        self.meta.name.encode(w);
        self.meta.email.encode(w);
        self.meta.message.encode(w);
        self.meta.timestamp.encode(w);
    }
}

impl<'de> Decode<'de> for Commit {
    fn decode(r: &mut impl BufReader<'de>) -> std::result::Result<Self, DecodeError> {
        Ok(Self {
            root: Hash::decode(r)?,
            parents: Vec::decode(r)?,
            meta: CommitMeta {
                name: Box::decode(r)?,
                email: Box::decode(r)?,
                message: Box::decode(r)?,
                timestamp: i64::decode(r)?,
            },
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RepoState {
    head: String,
    branches: BTreeMap<String, Hash>,
    staged: Hash,
    working: Hash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DeltaKind {
    Added,
    Modified,
    Deleted,
}

impl DeltaKind {
    /// The one-letter code of the change, as printed after a reset.
    pub fn code(self) -> char {
        match self {
            Self::Added => 'A',
            Self::Modified => 'M',
            Self::Deleted => 'D',
        }
    }
}

impl fmt::Display for DeltaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Added => "new table",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        })
    }
}

/// How one table differs between two roots.
///
/// A renamed table shows up as the old name deleted and the new name added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDelta {
    pub name: Box<str>,
    pub kind: DeltaKind,
}

/// Returns how the tables of `to` differ from those of `from`, ordered by table name.
pub fn diff_roots(from: &RootValue, to: &RootValue) -> Vec<TableDelta> {
    let names = from.table_names().chain(to.table_names()).collect::<BTreeSet<_>>();
    names
        .into_iter()
        .filter_map(|name| {
            let kind = match (from.get_table(name), to.get_table(name)) {
                (None, Some(_)) => DeltaKind::Added,
                (Some(_), None) => DeltaKind::Deleted,
                (Some(a), Some(b)) if a.hash() != b.hash() => DeltaKind::Modified,
                _ => return None,
            };
            Some(TableDelta { name: name.into(), kind })
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Status {
    /// Changes from `HEAD` to staged, which the next commit records.
    pub staged: Vec<TableDelta>,
    /// Changes from staged to working.
    pub unstaged: Vec<TableDelta>,
}

impl Status {
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty() && self.unstaged.is_empty()
    }
}

pub struct Repo {
    dir: PathBuf,
    store: Arc<dyn ValueStore>,
    state: RepoState,
    config: Config,
}

impl Repo {
    /// Creates a repository in `dir` with an initial, empty commit on [`DEFAULT_BRANCH`].
    pub fn init(dir: &Path) -> Result<Repo> {
        let repo_dir = dir.join(REPO_DIR);
        if repo_dir.exists() {
            return Err(DatastoreError::AlreadyInitialized(dir.to_owned()));
        }
        fs::create_dir_all(&repo_dir)?;
        let store: Arc<dyn ValueStore> = Arc::new(DirTrieValueStore::open(repo_dir.join(OBJECTS_DIR))?);
        let config = Config::default();
        config.save(&repo_dir.join(CONFIG_FILE))?;

        let root = RootValue::new().write_to(&*store)?;
        let commit = Commit {
            root,
            parents: Vec::new(),
            meta: CommitMeta::now(&config, INIT_MESSAGE),
        };
        let commit = store.put(&codec::to_vec(&commit))?;
        let repo = Repo {
            dir: repo_dir,
            store,
            state: RepoState {
                head: DEFAULT_BRANCH.into(),
                branches: [(DEFAULT_BRANCH.to_owned(), commit)].into(),
                staged: root,
                working: root,
            },
            config,
        };
        repo.save_state()?;
        log::debug!("REPOSITORY INITIALIZED: {}, commit {commit}", dir.display());
        Ok(repo)
    }

    /// Opens the repository in `dir`.
    pub fn open(dir: &Path) -> Result<Repo> {
        let repo_dir = dir.join(REPO_DIR);
        let state_path = repo_dir.join(STATE_FILE);
        if !state_path.is_file() {
            return Err(DatastoreError::NotARepository(dir.to_owned()));
        }
        let state = toml::from_str(&fs::read_to_string(&state_path)?).map_err(|source| {
            DatastoreError::RepoState {
                path: state_path.clone(),
                source,
            }
        })?;
        let config = Config::load(&repo_dir.join(CONFIG_FILE))?;
        let store = Arc::new(DirTrieValueStore::open(repo_dir.join(OBJECTS_DIR))?);
        Ok(Repo {
            dir: repo_dir,
            store,
            state,
            config,
        })
    }

    fn save_state(&self) -> Result<()> {
        let path = self.dir.join(STATE_FILE);
        let tmp = path.with_extension("toml.tmp");
        fs::write(&tmp, toml::to_string_pretty(&self.state)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ValueStore> {
        &self.store
    }

    /// The name of the checked out branch.
    pub fn head_branch(&self) -> &str {
        &self.state.head
    }

    pub fn branch_commit(&self, branch: &str) -> Result<Hash> {
        self.state
            .branches
            .get(branch)
            .copied()
            .ok_or_else(|| DatastoreError::BranchNotFound(branch.into()))
    }

    pub fn head_commit_hash(&self) -> Result<Hash> {
        self.branch_commit(&self.state.head)
    }

    pub fn read_commit(&self, hash: &Hash) -> Result<Commit> {
        let bytes = self.store.get(hash)?.ok_or(StoreError::Missing(*hash))?;
        Ok(codec::from_slice(&bytes)?)
    }

    fn read_root(&self, hash: &Hash) -> Result<RootValue> {
        Ok(RootValue::read_from(&*self.store, hash)?)
    }

    /// The root recorded by `commit`.
    pub fn commit_root(&self, commit: &Hash) -> Result<RootValue> {
        self.read_root(&self.read_commit(commit)?.root)
    }

    pub fn head_root(&self) -> Result<RootValue> {
        self.commit_root(&self.head_commit_hash()?)
    }

    pub fn staged_root(&self) -> Result<RootValue> {
        self.read_root(&self.state.staged)
    }

    pub fn working_root(&self) -> Result<RootValue> {
        self.read_root(&self.state.working)
    }

    pub fn set_working_root(&mut self, root: &RootValue) -> Result<()> {
        self.state.working = root.write_to(&*self.store)?;
        self.save_state()
    }

    pub fn set_staged_root(&mut self, root: &RootValue) -> Result<()> {
        self.state.staged = root.write_to(&*self.store)?;
        self.save_state()
    }

    /// Points the checked out branch at `commit`.
    pub fn set_head(&mut self, commit: Hash) -> Result<()> {
        self.read_commit(&commit)?;
        self.state.branches.insert(self.state.head.clone(), commit);
        self.save_state()
    }

    /// Copies the working state of `tables` into staged.
    /// A table missing from working is deleted from staged.
    pub fn stage_tables(&mut self, tables: &[&str]) -> Result<()> {
        let working = self.working_root()?;
        let staged = self.staged_root()?;
        let missing = tables
            .iter()
            .filter(|name| !working.has_table(name) && !staged.has_table(name))
            .map(|name| name.to_string())
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(DatastoreError::TablesNotFound(missing));
        }
        self.set_staged_root(&staged.with_tables_from(&working, tables))
    }

    pub fn stage_all(&mut self) -> Result<()> {
        self.state.staged = self.state.working;
        self.save_state()
    }

    /// Commits the staged root on top of `HEAD`, returning the new commit's hash.
    pub fn commit(&mut self, message: &str) -> Result<Hash> {
        let head = self.head_commit_hash()?;
        if self.read_commit(&head)?.root == self.state.staged {
            return Err(DatastoreError::NothingToCommit);
        }
        let commit = Commit {
            root: self.state.staged,
            parents: vec![head],
            meta: CommitMeta::now(&self.config, message),
        };
        let hash = self.store.put(&codec::to_vec(&commit))?;
        self.set_head(hash)?;
        log::debug!("COMMITTED: {hash} on {}", self.state.head);
        Ok(hash)
    }

    /// The first-parent history starting at `start`, newest first.
    pub fn log(&self, start: Hash) -> Result<Vec<(Hash, Commit)>> {
        let mut history = Vec::new();
        let mut next = Some(start);
        while let Some(hash) = next {
            let commit = self.read_commit(&hash)?;
            next = commit.parents.first().copied();
            history.push((hash, commit));
        }
        Ok(history)
    }

    /// Resolves a revision to a commit hash.
    ///
    /// A revision is `HEAD`, a branch name, or a full or abbreviated commit hash,
    /// optionally followed by ancestry suffixes: `~n` goes back `n` first parents,
    /// `^n` takes the `n`th parent. Both default to 1.
    pub fn resolve_revision(&self, rev: &str) -> Result<Hash> {
        let invalid = || DatastoreError::InvalidRevision(rev.into());
        let (base, mut suffix) = rev.split_at(rev.find(['~', '^']).unwrap_or(rev.len()));
        let mut hash = if base.eq_ignore_ascii_case("HEAD") {
            self.head_commit_hash()?
        } else if let Some(&hash) = self.state.branches.get(base) {
            hash
        } else {
            self.resolve_hash(base)?.ok_or_else(invalid)?
        };

        while let Some(op) = suffix.chars().next() {
            if op != '~' && op != '^' {
                return Err(invalid());
            }
            let rest = &suffix[op.len_utf8()..];
            let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
            let n = match &rest[..digits] {
                "" => 1,
                n => n.parse::<usize>().map_err(|_| invalid())?,
            };
            suffix = &rest[digits..];
            if op == '~' {
                for _ in 0..n {
                    hash = *self.read_commit(&hash)?.parents.first().ok_or_else(invalid)?;
                }
            } else if n > 0 {
                hash = *self.read_commit(&hash)?.parents.get(n - 1).ok_or_else(invalid)?;
            }
        }
        Ok(hash)
    }

    /// Finds the commit whose hash is, or starts with, `hex` among the commits reachable from a branch.
    fn resolve_hash(&self, hex: &str) -> Result<Option<Hash>> {
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Ok(None);
        }
        let hex = hex.to_ascii_lowercase();
        if let Ok(hash) = Hash::from_hex(&hex) {
            return Ok(self.store.contains(&hash)?.then_some(hash));
        }
        let mut seen = HashSet::new();
        let mut pending = self.state.branches.values().copied().collect::<Vec<_>>();
        let mut found = None;
        while let Some(hash) = pending.pop() {
            if !seen.insert(hash) {
                continue;
            }
            if hash.to_hex().starts_with(&hex) {
                if found.is_some_and(|f| f != hash) {
                    return Err(DatastoreError::AmbiguousRevision(hex.into()));
                }
                found = Some(hash);
            }
            pending.extend(self.read_commit(&hash)?.parents);
        }
        Ok(found)
    }

    pub fn status(&self) -> Result<Status> {
        let head = self.head_root()?;
        let staged = self.staged_root()?;
        let working = self.working_root()?;
        Ok(Status {
            staged: diff_roots(&head, &staged),
            unstaged: diff_roots(&staged, &working),
        })
    }

    /// A [`Database`] over this repository's objects, positioned at the working root.
    pub fn open_database(&self) -> Result<Database> {
        Ok(Database::new(self.store.clone(), self.working_root()?))
    }

    /// Makes the current root of `db` the working root.
    pub fn save_database(&mut self, db: &Database) -> Result<()> {
        self.set_working_root(&db.root())
    }
}
