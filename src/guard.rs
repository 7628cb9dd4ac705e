use std::path::{Path, PathBuf};

use git2::{Repository, Status, StatusOptions};

use crate::error::{DirtyKind, Error, Result};

// Conflicted paths only carry CONFLICTED; they count as staged.
const STAGED: Status = Status::INDEX_NEW
    .union(Status::INDEX_MODIFIED)
    .union(Status::INDEX_DELETED)
    .union(Status::INDEX_RENAMED)
    .union(Status::INDEX_TYPECHANGE)
    .union(Status::CONFLICTED);

const UNSTAGED: Status = Status::WT_MODIFIED
    .union(Status::WT_DELETED)
    .union(Status::WT_RENAMED)
    .union(Status::WT_TYPECHANGE);

/// Working-tree status split the way the guard looks at it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryStatus {
    pub staged: Vec<String>,
    pub unstaged: Vec<String>,
    /// Reported for information only; untracked files never block a build.
    pub untracked: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub id: String,
    pub author: String,
    pub message: String,
    /// Full ref name of HEAD, `None` when detached.
    pub branch: Option<String>,
}

pub trait Vcs {
    fn status(&self) -> Result<RepositoryStatus>;
    /// History reachable from HEAD, newest first, at most `limit` entries.
    fn log(&self, limit: usize) -> Result<Vec<Commit>>;
}

pub struct Git2Vcs {
    repo: Repository,
}

impl Git2Vcs {
    pub fn open(root: &Path) -> Result<Self> {
        Ok(Self {
            repo: Repository::discover(root)?,
        })
    }
}

impl Vcs for Git2Vcs {
    fn status(&self) -> Result<RepositoryStatus> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true).recurse_untracked_dirs(true);
        let statuses = self.repo.statuses(Some(&mut opts))?;

        let mut out = RepositoryStatus::default();
        for entry in statuses.iter() {
            let Some(path) = entry.path().map(str::to_string) else {
                continue;
            };
            let status = entry.status();
            if status.intersects(STAGED) {
                out.staged.push(path.clone());
            }
            if status.intersects(UNSTAGED) {
                out.unstaged.push(path.clone());
            }
            if status.contains(Status::WT_NEW) {
                out.untracked.push(path);
            }
        }
        Ok(out)
    }

    fn log(&self, limit: usize) -> Result<Vec<Commit>> {
        let head = match self.repo.head() {
            Ok(head) => head,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let branch = head
            .is_branch()
            .then(|| head.name().map(str::to_string))
            .flatten();

        let mut walk = self.repo.revwalk()?;
        walk.push_head()?;
        walk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::TIME)?;

        let mut commits = Vec::new();
        for oid in walk.take(limit) {
            let commit = self.repo.find_commit(oid?)?;
            let author = commit.author();
            commits.push(Commit {
                id: commit.id().to_string(),
                author: format!(
                    "{} <{}>",
                    author.name().unwrap_or("unknown"),
                    author.email().unwrap_or("")
                ),
                message: commit.message().unwrap_or("").trim_end().to_string(),
                branch: branch.clone(),
            });
        }
        Ok(commits)
    }
}

/// Fails when anything is staged or modified; staged changes are reported first.
pub fn check_status(vcs: &impl Vcs) -> Result<RepositoryStatus> {
    tracing::trace!("guard: checking git status");
    let status = vcs.status()?;
    if !status.staged.is_empty() {
        return Err(Error::DirtyRepository {
            kind: DirtyKind::Staged,
            paths: status.staged,
        });
    }
    if !status.unstaged.is_empty() {
        return Err(Error::DirtyRepository {
            kind: DirtyKind::Unstaged,
            paths: status.unstaged,
        });
    }
    if !status.untracked.is_empty() {
        tracing::debug!(count = status.untracked.len(), "guard: ignoring untracked files");
    }
    Ok(status)
}

pub fn get_latest_commit(vcs: &impl Vcs) -> Result<Commit> {
    check_status(vcs)?;
    read_latest_commit(vcs)
}

/// Newest commit without looking at the working tree.
pub fn read_latest_commit(vcs: &impl Vcs) -> Result<Commit> {
    tracing::trace!("guard: finding latest commit");
    vcs.log(1)?.into_iter().next().ok_or(Error::NoCommits)
}

pub async fn repo_root() -> Result<PathBuf> {
    tracing::trace!("guard: discovering repo root");
    tokio::task::spawn_blocking(|| {
        let repo = Repository::discover(".")?;
        Ok::<_, Error>(repo.workdir().unwrap_or(repo.path()).to_path_buf())
    })
    .await
    .map_err(|e| anyhow::anyhow!("repo_root task join error: {}", e))?
}

/// Latest commit at `root`, verifying the tree is clean unless `force` is set.
pub async fn latest_commit_at(root: &Path, force: bool) -> Result<Commit> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let vcs = Git2Vcs::open(&root)?;
        if force {
            read_latest_commit(&vcs)
        } else {
            get_latest_commit(&vcs)
        }
    })
    .await
    .map_err(|e| anyhow::anyhow!("latest_commit task join error: {}", e))?
}

#[cfg(test)]
mod tests {
    use std::fs;

    use git2::{IndexAddOption, Signature};
    use tempfile::TempDir;

    use super::*;

    struct FakeVcs {
        status: RepositoryStatus,
        history: Vec<Commit>,
    }

    impl Vcs for FakeVcs {
        fn status(&self) -> Result<RepositoryStatus> {
            Ok(self.status.clone())
        }

        fn log(&self, limit: usize) -> Result<Vec<Commit>> {
            Ok(self.history.iter().take(limit).cloned().collect())
        }
    }

    struct BrokenVcs;

    impl Vcs for BrokenVcs {
        fn status(&self) -> Result<RepositoryStatus> {
            Err(git2::Error::from_str("not a repository").into())
        }

        fn log(&self, _limit: usize) -> Result<Vec<Commit>> {
            Err(git2::Error::from_str("not a repository").into())
        }
    }

    fn commit(id: &str) -> Commit {
        Commit {
            id: id.into(),
            author: "dev <dev@example.com>".into(),
            message: "msg".into(),
            branch: Some("refs/heads/feature/PROJ-1".into()),
        }
    }

    fn fake(staged: &[&str], unstaged: &[&str], history: Vec<Commit>) -> FakeVcs {
        FakeVcs {
            status: RepositoryStatus {
                staged: staged.iter().map(|s| s.to_string()).collect(),
                unstaged: unstaged.iter().map(|s| s.to_string()).collect(),
                untracked: Vec::new(),
            },
            history,
        }
    }

    #[test]
    fn staged_changes_are_dirty() {
        let err = check_status(&fake(&["a.rs"], &[], vec![])).unwrap_err();
        assert!(matches!(
            err,
            Error::DirtyRepository { kind: DirtyKind::Staged, .. }
        ));
    }

    #[test]
    fn unstaged_changes_are_dirty() {
        let err = check_status(&fake(&[], &["b.rs"], vec![])).unwrap_err();
        assert!(matches!(
            err,
            Error::DirtyRepository { kind: DirtyKind::Unstaged, .. }
        ));
    }

    #[test]
    fn clean_status_passes_with_untracked() {
        let mut vcs = fake(&[], &[], vec![]);
        vcs.status.untracked.push("notes.txt".into());
        assert_eq!(check_status(&vcs).unwrap().untracked, ["notes.txt"]);
    }

    #[test]
    fn status_failure_is_vcs_unavailable() {
        assert!(matches!(
            check_status(&BrokenVcs),
            Err(Error::VcsUnavailable(_))
        ));
    }

    #[test]
    fn latest_commit_is_newest_entry() {
        let vcs = fake(&[], &[], vec![commit("abc"), commit("def")]);
        assert_eq!(get_latest_commit(&vcs).unwrap().id, "abc");
    }

    #[test]
    fn empty_history_has_no_commits() {
        assert!(matches!(
            get_latest_commit(&fake(&[], &[], vec![])),
            Err(Error::NoCommits)
        ));
    }

    #[test]
    fn dirty_tree_blocks_latest_commit_but_not_forced_read() {
        let vcs = fake(&["a.rs"], &[], vec![commit("abc")]);
        assert!(get_latest_commit(&vcs).is_err());
        assert_eq!(read_latest_commit(&vcs).unwrap().id, "abc");
    }

    fn commit_all(repo: &Repository, message: &str) {
        let mut idx = repo.index().unwrap();
        idx.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
            .unwrap();
        idx.write().unwrap();
        let tree = repo.find_tree(idx.write_tree().unwrap()).unwrap();
        let sig = Signature::now("dev", "dev@example.com").unwrap();
        let parents = match repo.head() {
            Ok(head) => vec![repo.find_commit(head.target().unwrap()).unwrap()],
            Err(_) => Vec::new(),
        };
        let parents: Vec<_> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap();
    }

    #[test]
    fn git2_reports_staged_unstaged_and_untracked() {
        let td = TempDir::new().unwrap();
        let root = td.path();
        let repo = Repository::init(root).unwrap();
        fs::write(root.join("tracked.txt"), "one\n").unwrap();
        fs::write(root.join("staged.txt"), "one\n").unwrap();
        commit_all(&repo, "init");

        fs::write(root.join("tracked.txt"), "two\n").unwrap();
        fs::write(root.join("staged.txt"), "two\n").unwrap();
        let mut idx = repo.index().unwrap();
        idx.add_path(Path::new("staged.txt")).unwrap();
        idx.write().unwrap();
        fs::write(root.join("new.txt"), "new\n").unwrap();

        let status = Git2Vcs::open(root).unwrap().status().unwrap();
        assert_eq!(status.staged, ["staged.txt"]);
        assert_eq!(status.unstaged, ["tracked.txt"]);
        assert_eq!(status.untracked, ["new.txt"]);
    }

    #[test]
    fn git2_conflicted_merge_is_dirty() {
        let td = TempDir::new().unwrap();
        let root = td.path();
        let repo = Repository::init(root).unwrap();
        fs::write(root.join("f.txt"), "base\n").unwrap();
        commit_all(&repo, "base");
        let base = repo.head().unwrap().peel_to_commit().unwrap();

        // Diverge `other` from base without checking it out.
        let blob = repo.blob(b"other\n").unwrap();
        let mut builder = repo.treebuilder(Some(&base.tree().unwrap())).unwrap();
        builder.insert("f.txt", blob, 0o100644).unwrap();
        let other_tree = repo.find_tree(builder.write().unwrap()).unwrap();
        let sig = Signature::now("dev", "dev@example.com").unwrap();
        let other_oid = repo
            .commit(Some("refs/heads/other"), &sig, &sig, "other", &other_tree, &[&base])
            .unwrap();

        fs::write(root.join("f.txt"), "mine\n").unwrap();
        commit_all(&repo, "mine");

        let other = repo.find_annotated_commit(other_oid).unwrap();
        repo.merge(&[&other], None, None).unwrap();
        assert!(repo.index().unwrap().has_conflicts());

        let vcs = Git2Vcs::open(root).unwrap();
        assert_eq!(vcs.status().unwrap().staged, ["f.txt"]);
        assert!(matches!(
            check_status(&vcs),
            Err(Error::DirtyRepository { kind: DirtyKind::Staged, .. })
        ));
    }

    #[test]
    fn git2_log_keeps_full_message() {
        let td = TempDir::new().unwrap();
        let root = td.path();
        let repo = Repository::init(root).unwrap();
        fs::write(root.join("a.txt"), "a\n").unwrap();
        commit_all(&repo, "Subject line\n\nBody paragraph.\n");

        let latest = read_latest_commit(&Git2Vcs::open(root).unwrap()).unwrap();
        assert_eq!(latest.message, "Subject line\n\nBody paragraph.");
    }

    #[test]
    fn git2_log_is_newest_first_with_branch() {
        let td = TempDir::new().unwrap();
        let root = td.path();
        let repo = Repository::init(root).unwrap();
        fs::write(root.join("a.txt"), "a\n").unwrap();
        commit_all(&repo, "first");
        fs::write(root.join("a.txt"), "b\n").unwrap();
        commit_all(&repo, "second");

        let vcs = Git2Vcs::open(root).unwrap();
        let latest = get_latest_commit(&vcs).unwrap();
        assert_eq!(latest.message, "second");
        assert_eq!(latest.author, "dev <dev@example.com>");
        assert!(latest.branch.unwrap().starts_with("refs/heads/"));
        assert_eq!(vcs.log(10).unwrap().len(), 2);
    }

    #[test]
    fn git2_unborn_head_has_no_commits() {
        let td = TempDir::new().unwrap();
        Repository::init(td.path()).unwrap();
        let vcs = Git2Vcs::open(td.path()).unwrap();
        assert!(matches!(read_latest_commit(&vcs), Err(Error::NoCommits)));
    }
}
