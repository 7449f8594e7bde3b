//! The `GitRemote` abstraction and its implementations
//!
//! Reconcilers talk to the downstream repository through this trait; the
//! real implementation drives the REST client, the in-memory one backs
//! tests with the same tree-planning code path.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use kalypso_common::crd::{GitOpsRepoSpec, RepoContent};
use kalypso_common::{Error, Result};

use crate::client::GitHubClient;
use crate::models::{CommitAuthor, TreeEntry};
use crate::tree::{apply_plan, plan_tree, PROMOTED_COMMIT_ID_PATH, PROMOTED_LABEL};
use crate::GITHUB_AUTH_TOKEN_ENV;

/// Commit author name; part of the downstream contract.
pub const AUTHOR_NAME: &str = "Kalypso Scheduler";
/// Commit author email.
pub const AUTHOR_EMAIL: &str = "kalypso.scheduler@email.com";
/// Commit message used for every scheduler commit.
pub const COMMIT_MESSAGE: &str = "Kalypso Scheduler commit";
/// Body of every scheduler pull request.
pub const PR_BODY: &str = "This PR updates the manifests in GitOps Repo";

/// Operations the reconcilers need against the downstream repository.
#[async_trait]
pub trait GitRemote: Send + Sync {
    /// Publish the repo content on `pr_branch` and open a PR against the
    /// configured base branch. Returns the PR number.
    async fn create_pr(&self, pr_branch: &str, content: &RepoContent) -> Result<Option<u64>>;

    /// Create, edit or close the issue mirroring an assignment failure.
    ///
    /// `message == None` closes an existing open issue and returns `None`;
    /// `issue_no == None` creates a new issue; otherwise the referenced
    /// issue is edited.
    async fn update_issue(
        &self,
        issue_no: Option<u64>,
        title: &str,
        message: Option<&str>,
    ) -> Result<Option<u64>>;
}

/// Builds a [`GitRemote`] for a GitOpsRepo spec.
pub trait GitRemoteFactory: Send + Sync {
    fn for_repo(&self, spec: &GitOpsRepoSpec) -> Result<Arc<dyn GitRemote>>;
}

/// The production adapter over the GitHub REST API.
pub struct GitHubRepo {
    client: GitHubClient,
    spec: GitOpsRepoSpec,
}

impl GitHubRepo {
    /// Build an adapter for the repository named by the spec. The token is
    /// read from `GITHUB_AUTH_TOKEN`; its absence is tolerated here.
    pub fn new(spec: &GitOpsRepoSpec) -> Result<Self> {
        let token = std::env::var(GITHUB_AUTH_TOKEN_ENV).ok();
        Ok(Self {
            client: GitHubClient::new(&spec.manifests.repo, token)?,
            spec: spec.clone(),
        })
    }
}

#[async_trait]
impl GitRemote for GitHubRepo {
    async fn create_pr(&self, pr_branch: &str, content: &RepoContent) -> Result<Option<u64>> {
        let base_branch = self.spec.manifests.branch.as_str();

        let base_ref = self
            .client
            .get_ref(base_branch)
            .await?
            .ok_or_else(|| Error::BaseBranchMissing {
                branch: base_branch.to_string(),
            })?;

        let branch_ref = match self.client.get_ref(pr_branch).await? {
            Some(existing) => existing,
            None => self.client.create_ref(pr_branch, &base_ref.object.sha).await?,
        };

        let existing_tree = self
            .client
            .get_tree_recursive(&branch_ref.object.sha)
            .await?;

        let existing_promoted = match existing_tree
            .tree
            .iter()
            .find(|e| e.entry_type == "blob" && e.path == PROMOTED_COMMIT_ID_PATH)
            .and_then(|e| e.sha.clone())
        {
            Some(sha) => Some(self.client.get_blob_text(&sha).await?),
            None => None,
        };

        let plan = plan_tree(&existing_tree.tree, existing_promoted.as_deref(), content);

        let new_tree = self
            .client
            .create_tree(&branch_ref.object.sha, &plan.entries)
            .await?;
        let parent = self.client.get_commit(&branch_ref.object.sha).await?;

        let author = CommitAuthor {
            name: AUTHOR_NAME.to_string(),
            email: AUTHOR_EMAIL.to_string(),
            date: chrono::Utc::now().to_rfc3339(),
        };
        let commit = self
            .client
            .create_commit(COMMIT_MESSAGE, &new_tree.sha, &parent.sha, &author)
            .await?;
        self.client.update_ref(pr_branch, &commit.sha).await?;

        // supersede: every open PR against the base branch is now stale
        for pull in self.client.list_open_pulls(base_branch).await? {
            tracing::info!(branch = %pull.head.ref_name, pr = pull.number, "superseding pull request");
            self.client.delete_ref(&pull.head.ref_name).await?;
            self.client.close_pull(pull.number).await?;
        }

        let title = format!("Update manifests in {base_branch} from {pr_branch}");
        let pull = self
            .client
            .create_pull(&title, pr_branch, base_branch, PR_BODY)
            .await?;

        if plan.is_promoted {
            self.client.add_labels(pull.number, &[PROMOTED_LABEL]).await?;
        }

        tracing::info!(pr = pull.number, branch = %pr_branch, "pull request created");
        Ok(Some(pull.number))
    }

    async fn update_issue(
        &self,
        issue_no: Option<u64>,
        title: &str,
        message: Option<&str>,
    ) -> Result<Option<u64>> {
        let issue_no = issue_no.filter(|n| *n != 0);
        match message {
            None => {
                if let Some(number) = issue_no {
                    let issue = self.client.get_issue(number).await?;
                    if issue.state == "open" {
                        self.client.close_issue(number).await?;
                    }
                }
                Ok(None)
            }
            Some(body) => match issue_no {
                None => {
                    let issue = self.client.create_issue(title, body).await?;
                    Ok(Some(issue.number))
                }
                Some(number) => {
                    self.client.edit_issue(number, title, body).await?;
                    Ok(Some(number))
                }
            },
        }
    }
}

/// Factory producing real GitHub adapters.
#[derive(Clone, Copy, Debug, Default)]
pub struct GitHubFactory;

impl GitRemoteFactory for GitHubFactory {
    fn for_repo(&self, spec: &GitOpsRepoSpec) -> Result<Arc<dyn GitRemote>> {
        Ok(Arc::new(GitHubRepo::new(spec)?))
    }
}

/// A pull request recorded by the mock remote.
#[derive(Clone, Debug)]
pub struct MockPull {
    pub number: u64,
    pub branch: String,
    pub open: bool,
    pub promoted: bool,
}

/// An issue recorded by the mock remote.
#[derive(Clone, Debug)]
pub struct MockIssue {
    pub title: String,
    pub body: String,
    pub open: bool,
}

#[derive(Default)]
struct MockState {
    files: BTreeMap<String, String>,
    pulls: Vec<MockPull>,
    issues: BTreeMap<u64, MockIssue>,
    next_pull: u64,
    next_issue: u64,
    pr_error: Option<String>,
}

/// In-memory remote: runs the same tree planning against a path → content
/// map and records PRs and issues for assertions.
#[derive(Default)]
pub struct MockGitRemote {
    state: Mutex<MockState>,
}

impl MockGitRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of the simulated repository tree.
    pub fn files(&self) -> BTreeMap<String, String> {
        self.state.lock().unwrap().files.clone()
    }

    /// All recorded pull requests, oldest first.
    pub fn pulls(&self) -> Vec<MockPull> {
        self.state.lock().unwrap().pulls.clone()
    }

    /// Currently open pull requests.
    pub fn open_pulls(&self) -> Vec<MockPull> {
        self.pulls().into_iter().filter(|p| p.open).collect()
    }

    /// A recorded issue by number.
    pub fn issue(&self, number: u64) -> Option<MockIssue> {
        self.state.lock().unwrap().issues.get(&number).cloned()
    }

    /// Fail the next `create_pr` call with the given message.
    pub fn fail_next_pr(&self, message: impl Into<String>) {
        self.state.lock().unwrap().pr_error = Some(message.into());
    }
}

/// Factory handing out one shared mock remote regardless of spec.
pub struct MockFactory(pub Arc<MockGitRemote>);

impl GitRemoteFactory for MockFactory {
    fn for_repo(&self, _spec: &GitOpsRepoSpec) -> Result<Arc<dyn GitRemote>> {
        Ok(self.0.clone())
    }
}

#[async_trait]
impl GitRemote for MockGitRemote {
    async fn create_pr(&self, pr_branch: &str, content: &RepoContent) -> Result<Option<u64>> {
        let mut state = self.state.lock().unwrap();

        if let Some(message) = state.pr_error.take() {
            return Err(Error::git(message));
        }

        let existing: Vec<TreeEntry> = state
            .files
            .keys()
            .map(|path| TreeEntry::blob(path.clone(), "mock"))
            .collect();
        let existing_promoted = state.files.get(PROMOTED_COMMIT_ID_PATH).cloned();

        let plan = plan_tree(&existing, existing_promoted.as_deref(), content);
        apply_plan(&mut state.files, &plan);

        for pull in state.pulls.iter_mut().filter(|p| p.open) {
            pull.open = false;
        }

        state.next_pull += 1;
        let number = state.next_pull;
        state.pulls.push(MockPull {
            number,
            branch: pr_branch.to_string(),
            open: true,
            promoted: plan.is_promoted,
        });

        Ok(Some(number))
    }

    async fn update_issue(
        &self,
        issue_no: Option<u64>,
        title: &str,
        message: Option<&str>,
    ) -> Result<Option<u64>> {
        let mut state = self.state.lock().unwrap();
        let issue_no = issue_no.filter(|n| *n != 0);

        match message {
            None => {
                if let Some(number) = issue_no {
                    if let Some(issue) = state.issues.get_mut(&number) {
                        issue.open = false;
                    }
                }
                Ok(None)
            }
            Some(body) => match issue_no {
                None => {
                    state.next_issue += 1;
                    let number = state.next_issue;
                    state.issues.insert(
                        number,
                        MockIssue {
                            title: title.to_string(),
                            body: body.to_string(),
                            open: true,
                        },
                    );
                    Ok(Some(number))
                }
                Some(number) => {
                    state.issues.insert(
                        number,
                        MockIssue {
                            title: title.to_string(),
                            body: body.to_string(),
                            open: true,
                        },
                    );
                    Ok(Some(number))
                }
            },
        }
    }
}
