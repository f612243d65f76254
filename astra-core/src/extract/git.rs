//! Git history extractor.
//!
//! Every commit reachable from `HEAD` becomes one record: the commit is a step
//! performed by its author, consuming its parents and the files it changed as
//! they were in the first parent, producing itself and the files as they are
//! after the change.

use super::Extractor;
use crate::config::GitConfig;
use crate::error::ExtractError;
use crate::record::{Item, Record, RecordStream};
use git2::{Commit, Delta, DiffFile, ObjectType, Oid, Repository, Sort, TreeWalkMode, TreeWalkResult};
use std::collections::HashSet;
use url::Url;

const SOURCE: &str = "git";
const GIT_RESOURCE: &str = "resource:git";

/// Reduce a remote URL to `host/owner/repo`.
///
/// HTTPS, `ssh://` and scp-style (`git@host:owner/repo.git`) remotes of the
/// same repository yield the same slug. Anything unrecognised is returned
/// trimmed of slashes and a `.git` suffix.
pub fn repo_slug(remote: &str) -> String {
    let remote = remote.trim();
    let tidy = |path: &str| {
        path.trim_matches('/')
            .trim_end_matches(".git")
            .trim_end_matches('/')
            .to_string()
    };

    if let Ok(url) = Url::parse(remote) {
        match url.host_str() {
            Some(host) => return format!("{host}/{}", tidy(url.path())),
            None if url.scheme() == "file" => return tidy(url.path()),
            None => {}
        }
    }

    if let Some((prefix, path)) = remote.split_once(':')
        && !path.starts_with("//")
    {
        let host = prefix.rsplit('@').next().unwrap_or(prefix);
        if !host.is_empty() {
            return format!("{host}/{}", tidy(path));
        }
    }

    tidy(remote)
}

pub fn step_id(slug: &str, commit: &str) -> String {
    format!("step:commit:{slug}@{commit}")
}

pub fn commit_artifact_id(slug: &str, commit: &str) -> String {
    format!("artifact:gitcommit:{slug}@{commit}")
}

pub fn file_artifact_id(slug: &str, commit: &str, path: &str) -> String {
    format!("artifact:gitfile:{slug}@{commit}:{path}")
}

/// A blob as seen in one tree.
#[derive(Debug, Clone)]
struct FileObject {
    path: String,
    oid: Oid,
    size: usize,
    mode: u32,
}

impl FileObject {
    fn item(&self, slug: &str, commit: &str) -> Item {
        Item::new(file_artifact_id(slug, commit, &self.path), &self.path, "git-file")
            .with_attr("content-hash", self.oid.to_string())
            .with_attr("size", self.size.to_string())
            .with_attr("mode", format!("{:07o}", self.mode))
    }
}

#[derive(Debug, Default)]
struct CommitIo {
    inputs: Vec<FileObject>,
    outputs: Vec<FileObject>,
}

fn diff_file(repo: &Repository, file: &DiffFile<'_>) -> Result<FileObject, git2::Error> {
    let blob = repo.find_blob(file.id())?;
    Ok(FileObject {
        path: file
            .path()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default(),
        oid: file.id(),
        size: blob.size(),
        mode: u32::from(file.mode()),
    })
}

fn push_once(files: &mut Vec<FileObject>, seen: &mut HashSet<String>, file: FileObject) {
    if seen.insert(file.path.clone()) {
        files.push(file);
    }
}

/// Classify the files a commit touched against its first parent.
fn commit_io(repo: &Repository, commit: &Commit<'_>) -> Result<CommitIo, ExtractError> {
    let tree = commit.tree()?;
    let mut io = CommitIo::default();

    if commit.parent_count() == 0 {
        let mut failed = None;
        let walked = tree.walk(TreeWalkMode::PreOrder, |dir, entry| {
            if entry.kind() != Some(ObjectType::Blob) {
                return TreeWalkResult::Ok;
            }
            match repo.find_blob(entry.id()) {
                Ok(blob) => {
                    io.outputs.push(FileObject {
                        path: format!("{dir}{}", String::from_utf8_lossy(entry.name_bytes())),
                        oid: entry.id(),
                        size: blob.size(),
                        mode: entry.filemode() as u32,
                    });
                    TreeWalkResult::Ok
                }
                Err(e) => {
                    failed = Some(e);
                    TreeWalkResult::Abort
                }
            }
        });
        if let Some(e) = failed {
            return Err(e.into());
        }
        walked?;
        return Ok(io);
    }

    let parent_tree = commit.parent(0)?.tree()?;
    let diff = repo.diff_tree_to_tree(Some(&parent_tree), Some(&tree), None)?;
    let mut seen_in = HashSet::new();
    let mut seen_out = HashSet::new();

    for delta in diff.deltas() {
        match delta.status() {
            Delta::Added => match diff_file(repo, &delta.new_file()) {
                Ok(file) => push_once(&mut io.outputs, &mut seen_out, file),
                Err(e) => tracing::debug!(
                    commit = %commit.id(),
                    path = ?delta.new_file().path(),
                    error = %e,
                    "skipping non-blob insertion"
                ),
            },
            Delta::Deleted => {
                let file = diff_file(repo, &delta.old_file())?;
                push_once(&mut io.inputs, &mut seen_in, file);
            }
            _ => {
                let before = diff_file(repo, &delta.old_file())?;
                let after = diff_file(repo, &delta.new_file())?;
                push_once(&mut io.inputs, &mut seen_in, before);
                push_once(&mut io.outputs, &mut seen_out, after);
            }
        }
    }

    Ok(io)
}

fn commit_record(repo: &Repository, slug: &str, commit: &Commit<'_>) -> Result<Record, ExtractError> {
    let hash = commit.id().to_string();
    let author = commit.author();
    let email = String::from_utf8_lossy(author.email_bytes()).into_owned();
    let name = String::from_utf8_lossy(author.name_bytes()).into_owned();
    let message = String::from_utf8_lossy(commit.message_bytes()).trim().to_string();
    let time = author.when().seconds().to_string();

    let step = Item::new(step_id(slug, &hash), "Commit", "step")
        .with_attr("phase", "source")
        .with_attr("message", &message)
        .with_attr("time", &time);
    let principal = Item::new(format!("principal:{email}"), name, "principal")
        .with_attr("email", &email);

    let mut artifacts_in: Vec<Item> = commit
        .parent_ids()
        .enumerate()
        .map(|(index, parent)| {
            let parent = parent.to_string();
            Item::new(commit_artifact_id(slug, &parent), &parent, "git-commit")
                .with_attr("role", "parent")
                .with_attr("index", index.to_string())
        })
        .collect();

    let io = commit_io(repo, commit)?;
    if let Some(base) = commit.parent_ids().next() {
        let base = base.to_string();
        artifacts_in.extend(io.inputs.iter().map(|f| f.item(slug, &base)));
    }

    let mut artifacts_out = vec![
        Item::new(commit_artifact_id(slug, &hash), &hash, "git-commit")
            .with_attr("message", &message)
            .with_attr("author", &email)
            .with_attr("time", &time),
    ];
    artifacts_out.extend(io.outputs.iter().map(|f| f.item(slug, &hash)));

    Ok(Record {
        step,
        principal,
        artifacts_in,
        artifacts_out,
        resources: vec![Item::new(GIT_RESOURCE, "git", "vcs")],
    })
}

fn origin_url(repo: &Repository) -> Result<String, ExtractError> {
    let missing = || ExtractError::MissingRemote("origin".into());
    let remote = repo.find_remote("origin").map_err(|_| missing())?;
    remote.url().map(str::to_string).ok_or_else(missing)
}

/// Extractor for git repositories given by clone URL.
#[derive(Debug, Clone, Default)]
pub struct GitExtractor {
    config: GitConfig,
}

impl GitExtractor {
    pub fn new(config: GitConfig) -> Self {
        Self { config }
    }

    /// Extract the history of an open repository, naming it by `remote_url`.
    pub fn extract_repository(
        repo: &Repository,
        remote_url: &str,
    ) -> Result<RecordStream, ExtractError> {
        let slug = repo_slug(remote_url);
        let mut walk = repo.revwalk()?;
        walk.set_sorting(Sort::TIME)?;
        walk.push_head()?;

        let mut stream = RecordStream::new(SOURCE);
        for oid in walk {
            let commit = repo.find_commit(oid?)?;
            stream.records.push(commit_record(repo, &slug, &commit)?);
        }
        tracing::debug!(slug, commits = stream.records.len(), "walked history");
        Ok(stream)
    }
}

impl Extractor for GitExtractor {
    fn source(&self) -> &'static str {
        SOURCE
    }

    fn parse(&self, input: &str) -> Result<RecordStream, ExtractError> {
        let dir = self.config.clone_dir();
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }

        tracing::info!(url = input, dir = %dir.display(), "cloning repository");
        let repo = Repository::clone(input, &dir).map_err(|source| ExtractError::Clone {
            url: input.to_string(),
            source,
        })?;
        let result = origin_url(&repo).and_then(|url| Self::extract_repository(&repo, &url));
        drop(repo);

        if !self.config.keep_clone
            && let Err(e) = std::fs::remove_dir_all(&dir)
        {
            tracing::warn!(dir = %dir.display(), error = %e, "failed to remove clone");
        }
        result
    }
}
