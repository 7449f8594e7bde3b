//! Typed GitHub REST v3 client
//!
//! One independent HTTPS round-trip per call, bearer auth from the
//! environment. Hosts other than `github.com` are treated as GitHub
//! Enterprise and addressed through `https://{host}/api/v3`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use kalypso_common::{Error, Result};

use crate::models::{
    CommitAuthor, GitBlob, GitCommit, GitRef, GitTree, Issue, NewTreeEntry, PullRequest,
    RepoCommit,
};

/// Thin client for one repository.
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
    owner: String,
    repo: String,
    token: Option<String>,
}

/// Split a repository URL into (host, owner, name).
pub fn parse_repo_url(repo_url: &str) -> Result<(String, String, String)> {
    let url = Url::parse(repo_url).map_err(|e| Error::git(format!("invalid repo url: {e}")))?;
    let host = url
        .host_str()
        .ok_or_else(|| Error::git("invalid repo url: missing host"))?
        .to_string();

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();
    if segments.len() < 2 {
        return Err(Error::git("invalid repo url"));
    }

    let owner = segments[0].to_string();
    let name = segments[1].trim_end_matches(".git").to_string();
    Ok((host, owner, name))
}

impl GitHubClient {
    /// Build a client for the repository at `repo_url`.
    ///
    /// A missing token is tolerated here; calls will fail with an
    /// unauthenticated error from the API.
    pub fn new(repo_url: &str, token: Option<String>) -> Result<Self> {
        let (host, owner, repo) = parse_repo_url(repo_url)?;
        let api_base = if host == "github.com" {
            "https://api.github.com".to_string()
        } else {
            format!("https://{host}/api/v3")
        };

        Ok(Self {
            http: reqwest::Client::new(),
            api_base,
            owner,
            repo,
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base, self.owner, self.repo, path
        )
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("kalypso-scheduler"));
        if let Some(token) = &self.token {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
                headers.insert(AUTHORIZATION, value);
            }
        }
        headers
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<reqwest::Response> {
        let url = self.url(path);
        let mut request = self.http.request(method.clone(), &url).headers(self.headers());
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::git(format!("{method} {url}: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        Err(Error::git(format!("{method} {url} returned {status}: {text}")))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T> {
        let response = self.send(method.clone(), path, body).await?;
        response
            .json()
            .await
            .map_err(|e| Error::git(format!("{method} {path}: invalid response: {e}")))
    }

    /// Look up a branch head; `None` when the branch does not exist.
    pub async fn get_ref(&self, branch: &str) -> Result<Option<GitRef>> {
        let path = format!("git/ref/heads/{branch}");
        match self.send_json(Method::GET, &path, None).await {
            Ok(git_ref) => Ok(Some(git_ref)),
            Err(Error::Git { message }) if message.contains(&StatusCode::NOT_FOUND.to_string()) => {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Create a branch at the given commit.
    pub async fn create_ref(&self, branch: &str, sha: &str) -> Result<GitRef> {
        self.send_json(
            Method::POST,
            "git/refs",
            Some(json!({ "ref": format!("refs/heads/{branch}"), "sha": sha })),
        )
        .await
    }

    /// Move a branch head to the given commit (fast-forward only).
    pub async fn update_ref(&self, branch: &str, sha: &str) -> Result<GitRef> {
        let path = format!("git/refs/heads/{branch}");
        self.send_json(
            Method::PATCH,
            &path,
            Some(json!({ "sha": sha, "force": false })),
        )
        .await
    }

    /// Delete a branch.
    pub async fn delete_ref(&self, branch: &str) -> Result<()> {
        let path = format!("git/refs/heads/{branch}");
        self.send(Method::DELETE, &path, None).await?;
        Ok(())
    }

    /// Fetch a tree recursively.
    pub async fn get_tree_recursive(&self, sha: &str) -> Result<GitTree> {
        let path = format!("git/trees/{sha}?recursive=1");
        self.send_json(Method::GET, &path, None).await
    }

    /// Create a tree on top of a base tree.
    pub async fn create_tree(&self, base_tree: &str, entries: &[NewTreeEntry]) -> Result<GitTree> {
        self.send_json(
            Method::POST,
            "git/trees",
            Some(json!({ "base_tree": base_tree, "tree": entries })),
        )
        .await
    }

    /// Fetch a repository commit (for use as a parent).
    pub async fn get_commit(&self, sha: &str) -> Result<RepoCommit> {
        let path = format!("commits/{sha}");
        self.send_json(Method::GET, &path, None).await
    }

    /// Create a commit object.
    pub async fn create_commit(
        &self,
        message: &str,
        tree_sha: &str,
        parent_sha: &str,
        author: &CommitAuthor,
    ) -> Result<GitCommit> {
        self.send_json(
            Method::POST,
            "git/commits",
            Some(json!({
                "message": message,
                "tree": tree_sha,
                "parents": [parent_sha],
                "author": author,
            })),
        )
        .await
    }

    /// Fetch a blob and decode it to text.
    pub async fn get_blob_text(&self, sha: &str) -> Result<String> {
        let path = format!("git/blobs/{sha}");
        let blob: GitBlob = self.send_json(Method::GET, &path, None).await?;
        if blob.encoding != "base64" {
            return Ok(blob.content);
        }
        let compact: String = blob.content.split_whitespace().collect();
        let bytes = STANDARD
            .decode(compact)
            .map_err(|e| Error::git(format!("blob {sha}: {e}")))?;
        String::from_utf8(bytes).map_err(|e| Error::git(format!("blob {sha}: {e}")))
    }

    /// List open pull requests against a base branch.
    pub async fn list_open_pulls(&self, base: &str) -> Result<Vec<PullRequest>> {
        let path = format!("pulls?state=open&base={base}");
        self.send_json(Method::GET, &path, None).await
    }

    /// Open a pull request.
    pub async fn create_pull(
        &self,
        title: &str,
        head: &str,
        base: &str,
        body: &str,
    ) -> Result<PullRequest> {
        self.send_json(
            Method::POST,
            "pulls",
            Some(json!({
                "title": title,
                "head": head,
                "base": base,
                "body": body,
                "maintainer_can_modify": true,
            })),
        )
        .await
    }

    /// Close a pull request.
    pub async fn close_pull(&self, number: u64) -> Result<()> {
        let path = format!("pulls/{number}");
        self.send(Method::PATCH, &path, Some(json!({ "state": "closed" })))
            .await?;
        Ok(())
    }

    /// Fetch an issue.
    pub async fn get_issue(&self, number: u64) -> Result<Issue> {
        let path = format!("issues/{number}");
        self.send_json(Method::GET, &path, None).await
    }

    /// Open an issue.
    pub async fn create_issue(&self, title: &str, body: &str) -> Result<Issue> {
        self.send_json(
            Method::POST,
            "issues",
            Some(json!({ "title": title, "body": body })),
        )
        .await
    }

    /// Edit an issue's title and body.
    pub async fn edit_issue(&self, number: u64, title: &str, body: &str) -> Result<Issue> {
        let path = format!("issues/{number}");
        self.send_json(
            Method::PATCH,
            &path,
            Some(json!({ "title": title, "body": body })),
        )
        .await
    }

    /// Close an issue.
    pub async fn close_issue(&self, number: u64) -> Result<()> {
        let path = format!("issues/{number}");
        self.send(Method::PATCH, &path, Some(json!({ "state": "closed" })))
            .await?;
        Ok(())
    }

    /// Add labels to an issue or pull request.
    pub async fn add_labels(&self, number: u64, labels: &[&str]) -> Result<()> {
        let path = format!("issues/{number}/labels");
        self.send(Method::POST, &path, Some(json!({ "labels": labels })))
            .await?;
        Ok(())
    }
}
