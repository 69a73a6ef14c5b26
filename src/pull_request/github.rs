//! GitHub pull request creator
//!
//! Uses the git data API: blobs for binary files, a tree on top of the base
//! commit, a commit, then a ref create or force-update, then the pull
//! request and its annotations. An existing branch whose head already
//! carries the update commit is reused as is.

use super::api::{ApiClient, ApiResponse, Auth};
use super::{api_endpoint, Labeler, LabelStore, PullRequest, PullRequestCreator, PullRequestHandle};
use crate::domain::{Credential, DependencyFile, FileOperation, LabelDetails, Provider, Source};
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Attempts for races GitHub documents (tree not yet visible, ref update failed)
const MAX_RACE_ATTEMPTS: u32 = 3;

const RACE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Deserialize)]
struct Repository {
    default_branch: String,
    #[serde(default)]
    archived: bool,
}

#[derive(Debug, Deserialize)]
struct GitRef {
    object: GitObject,
}

#[derive(Debug, Deserialize)]
struct GitObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct Sha {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct Commit {
    message: String,
}

#[derive(Debug, Deserialize)]
struct PullSummary {
    number: u64,
    #[serde(default)]
    merged_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedPull {
    number: u64,
    #[serde(default)]
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Label {
    name: String,
}

pub struct GithubCreator {
    api: ApiClient,
    repo: String,
    default_branch: OnceCell<String>,
}

impl GithubCreator {
    pub fn new(source: &Source, credential: Option<&Credential>) -> Result<Self, ProviderError> {
        let api = ApiClient::new(
            Provider::Github,
            api_endpoint(source)?,
            source.repo.clone(),
            Auth::github(credential),
        )?;
        Ok(Self {
            api,
            repo: source.repo.clone(),
            default_branch: OnceCell::new(),
        })
    }

    fn path(&self, suffix: &str) -> String {
        format!("repos/{}/{}", self.repo, suffix)
    }

    async fn repository(&self) -> Result<Repository, ProviderError> {
        let repository: Repository = self.api.get(&format!("repos/{}", self.repo)).await?;
        if repository.archived {
            return Err(ProviderError::RepoArchived {
                repo: self.repo.clone(),
            });
        }
        Ok(repository)
    }

    async fn default_branch(&self) -> Result<String, ProviderError> {
        self.default_branch
            .get_or_try_init(|| async { Ok(self.repository().await?.default_branch) })
            .await
            .cloned()
    }

    async fn target_branch(&self, request: &PullRequest) -> Result<String, ProviderError> {
        match &request.target_branch {
            Some(branch) => Ok(branch.clone()),
            None => self.default_branch().await,
        }
    }

    /// Head commit of a branch, `None` when the branch does not exist
    async fn branch_head(&self, branch: &str) -> Result<Option<String>, ProviderError> {
        let response = self
            .api
            .execute(Method::GET, &self.path(&format!("git/ref/heads/{}", branch)), None)
            .await?;
        match response.status {
            s if s.is_success() => {
                let reference: GitRef = self.api.parse(&response)?;
                Ok(Some(reference.object.sha))
            }
            StatusCode::NOT_FOUND => {
                // A missing repository also answers 404
                self.repository().await?;
                Ok(None)
            }
            _ => Err(self.api.error_for(&response)),
        }
    }

    async fn branch_exists(&self, branch: &str) -> Result<bool, ProviderError> {
        Ok(self.branch_head(branch).await?.is_some())
    }

    /// True when the branch head is already this update's commit
    async fn commit_exists(&self, head: &str, request: &PullRequest) -> Result<bool, ProviderError> {
        let commit: Commit = self.api.get(&self.path(&format!("git/commits/{}", head))).await?;
        Ok(commit.message.trim() == request.commit_message.trim())
    }

    /// Open or closed pull requests for the branch; merged ones are ignored
    /// so a regressed dependency can be updated again
    async fn pull_request_exists(&self, branch: &str) -> Result<bool, ProviderError> {
        let owner = self.repo.split('/').next().unwrap_or_default();
        let head = urlencoding::encode(&format!("{}:{}", owner, branch)).into_owned();
        let response = self
            .api
            .execute(Method::GET, &self.path(&format!("pulls?head={}&state=all", head)), None)
            .await?;

        let pulls: Vec<PullSummary> = if response.status.is_server_error() {
            // `state=all` occasionally fails server-side; ask twice instead
            let mut pulls: Vec<PullSummary> = self
                .api
                .get(&self.path(&format!("pulls?head={}&state=open", head)))
                .await?;
            let closed: Vec<PullSummary> = self
                .api
                .get(&self.path(&format!("pulls?head={}&state=closed", head)))
                .await?;
            pulls.extend(closed);
            pulls
        } else {
            let response = self.api.check(response)?;
            self.api.parse(&response)?
        };

        let unmerged: Vec<u64> = pulls
            .iter()
            .filter(|p| p.merged_at.is_none())
            .map(|p| p.number)
            .collect();
        debug!(branch, ?unmerged, "existing pull requests");
        Ok(!unmerged.is_empty())
    }

    async fn create_blob(&self, file: &DependencyFile) -> Result<String, ProviderError> {
        let blob: Sha = self
            .api
            .post(
                &self.path("git/blobs"),
                &json!({"content": file.content(), "encoding": "base64"}),
            )
            .await?;
        Ok(blob.sha)
    }

    async fn create_tree(&self, request: &PullRequest) -> Result<String, ProviderError> {
        let mut entries = Vec::new();
        for file in &request.files {
            let path = file.write_path();
            let entry = match file.operation {
                FileOperation::Delete => {
                    json!({"path": path, "mode": "100644", "type": "blob", "sha": Value::Null})
                }
                _ if file.is_binary() => {
                    let sha = self.create_blob(file).await?;
                    json!({"path": path, "mode": "100644", "type": "blob", "sha": sha})
                }
                _ => json!({"path": path, "mode": "100644", "type": "blob", "content": file.content()}),
            };
            entries.push(entry);
        }

        let tree: Sha = self
            .api
            .post(
                &self.path("git/trees"),
                &json!({"base_tree": request.base_commit, "tree": entries}),
            )
            .await?;
        Ok(tree.sha)
    }

    async fn create_commit(&self, request: &PullRequest) -> Result<String, ProviderError> {
        let tree = self.create_tree(request).await?;
        let mut body = json!({
            "message": request.commit_message,
            "tree": tree,
            "parents": [request.base_commit],
        });
        if let Some(author) = &request.author {
            body["author"] = json!({"name": author.name, "email": author.email});
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            let response = self.api.execute(Method::POST, &self.path("git/commits"), Some(&body)).await?;
            if response.status == StatusCode::UNPROCESSABLE_ENTITY
                && response.message().contains("Tree SHA does not exist")
                && attempt < MAX_RACE_ATTEMPTS
            {
                tokio::time::sleep(RACE_DELAY).await;
                continue;
            }
            let response = self.check(response, &request.branch_name)?;
            let commit: Sha = self.api.parse(&response)?;
            return Ok(commit.sha);
        }
    }

    /// `None` when another run created the branch and its pull request first
    async fn create_or_update_branch(
        &self,
        request: &PullRequest,
        commit: &str,
        exists: bool,
    ) -> Result<Option<String>, ProviderError> {
        let branch = &request.branch_name;
        if exists {
            self.update_branch(branch, commit).await?;
            return Ok(Some(branch.clone()));
        }

        let response = self
            .api
            .execute(
                Method::POST,
                &self.path("git/refs"),
                Some(&json!({"ref": format!("refs/heads/{}", branch), "sha": commit})),
            )
            .await?;
        if response.status == StatusCode::UNPROCESSABLE_ENTITY
            && response.message().to_lowercase().contains("reference already exists")
        {
            info!(branch = %branch, "branch created concurrently, re-reading state");
            if self.pull_request_exists(branch).await? {
                return Ok(None);
            }
            self.update_branch(branch, commit).await?;
            return Ok(Some(branch.clone()));
        }
        self.check(response, branch)?;
        Ok(Some(branch.clone()))
    }

    async fn update_branch(&self, branch: &str, commit: &str) -> Result<(), ProviderError> {
        let body = json!({"sha": commit, "force": true});
        let path = self.path(&format!("git/refs/heads/{}", branch));
        let mut attempt = 0;
        loop {
            attempt += 1;
            let response = self.api.execute(Method::PATCH, &path, Some(&body)).await?;
            if response.status == StatusCode::UNPROCESSABLE_ENTITY
                && response.message().contains("Reference update failed")
                && attempt < MAX_RACE_ATTEMPTS
            {
                tokio::time::sleep(RACE_DELAY).await;
                continue;
            }
            self.check(response, branch)?;
            return Ok(());
        }
    }

    async fn create_pull_request(
        &self,
        request: &PullRequest,
        target: &str,
    ) -> Result<Option<PullRequestHandle>, ProviderError> {
        let body = json!({
            "base": target,
            "head": request.branch_name,
            "title": request.title,
            "body": request.description,
        });
        let response = self.api.execute(Method::POST, &self.path("pulls"), Some(&body)).await?;
        if response.status == StatusCode::UNPROCESSABLE_ENTITY {
            let message = response.message();
            if message.contains("pull request already exists") {
                info!(branch = %request.branch_name, "pull request created concurrently");
                return Ok(None);
            }
            if message.contains("base") && request.target_branch.is_some() && !self.branch_exists(target).await? {
                warn!(target, "target branch no longer exists");
                return Ok(None);
            }
        }
        let response = self.check(response, &request.branch_name)?;
        let created: CreatedPull = self.api.parse(&response)?;
        Ok(Some(PullRequestHandle::new(
            created.number,
            created.html_url,
            request.branch_name.clone(),
        )))
    }

    /// Labels, reviewers, assignees and milestone; failures become warnings
    async fn annotate(&self, handle: &mut PullRequestHandle, request: &PullRequest) {
        let labeler = Labeler::new(self, &request.dependencies, &request.labels);
        match self.apply_labels(&labeler, handle.number).await {
            Ok(labels) => handle.labels = labels,
            Err(e) => handle.warnings.push(format!("labels: {}", e)),
        }

        if !request.reviewers.is_empty() || !request.team_reviewers.is_empty() {
            if let Err(e) = self.add_reviewers(handle.number, request).await {
                handle.warnings.push(format!("reviewers: {}", e));
            }
        }
        if !request.assignees.is_empty() {
            let body = json!({"assignees": request.assignees});
            let path = self.path(&format!("issues/{}/assignees", handle.number));
            if let Err(e) = self.post_ignoring_body(&path, &body).await {
                handle.warnings.push(format!("assignees: {}", e));
            }
        }
        if let Some(milestone) = request.milestone {
            let path = self.path(&format!("issues/{}", handle.number));
            let result = self
                .api
                .execute(Method::PATCH, &path, Some(&json!({"milestone": milestone})))
                .await
                .and_then(|r| self.api.check(r));
            if let Err(e) = result {
                handle.warnings.push(format!("milestone: {}", e));
            }
        }

        for warning in &handle.warnings {
            warn!(number = handle.number, "{}", warning);
        }
    }

    async fn apply_labels(&self, labeler: &Labeler<'_>, number: u64) -> Result<Vec<String>, ProviderError> {
        labeler.create_default_labels_if_required().await?;
        let labels = labeler.labels_for_pr().await?;
        if labels.is_empty() {
            return Ok(labels);
        }
        let path = self.path(&format!("issues/{}/labels", number));
        self.post_ignoring_body(&path, &json!({"labels": labels})).await?;
        Ok(labels)
    }

    /// Invalid reviewers are reported on the pull request instead of failing it
    async fn add_reviewers(&self, number: u64, request: &PullRequest) -> Result<(), ProviderError> {
        let path = self.path(&format!("pulls/{}/requested_reviewers", number));
        let body = json!({"reviewers": request.reviewers, "team_reviewers": request.team_reviewers});
        let response = self.api.execute(Method::POST, &path, Some(&body)).await?;
        if response.status == StatusCode::UNPROCESSABLE_ENTITY && is_invalid_reviewer(&response) {
            let comment = format!(
                "Could not add the requested reviewers to this pull request. GitHub returned:\n\n```\n{}\n```",
                response.message()
            );
            let comment_path = self.path(&format!("issues/{}/comments", number));
            self.post_ignoring_body(&comment_path, &json!({"body": comment})).await?;
            return Err(self.api.error_for(&response));
        }
        self.api.check(response)?;
        Ok(())
    }

    async fn post_ignoring_body(&self, path: &str, body: &Value) -> Result<(), ProviderError> {
        let response = self.api.execute(Method::POST, path, Some(body)).await?;
        self.api.check(response)?;
        Ok(())
    }

    /// Like `ApiClient::check`, with GitHub's unrelated-history error typed
    fn check(&self, response: ApiResponse, branch: &str) -> Result<ApiResponse, ProviderError> {
        if response.status == StatusCode::UNPROCESSABLE_ENTITY
            && response.message().contains("no history in common")
        {
            return Err(ProviderError::NoHistoryInCommon {
                branch: branch.to_string(),
            });
        }
        self.api.check(response)
    }
}

fn is_invalid_reviewer(response: &ApiResponse) -> bool {
    let message = response.message();
    message.contains("Could not resolve to a node")
        || message.contains("not a collaborator")
        || message.contains("Could not add requested reviewers")
}

#[async_trait]
impl LabelStore for GithubCreator {
    async fn fetch_labels(&self) -> Result<Vec<String>, ProviderError> {
        let mut names = Vec::new();
        let mut page = 1;
        loop {
            let labels: Vec<Label> = self
                .api
                .get(&self.path(&format!("labels?per_page=100&page={}", page)))
                .await?;
            let count = labels.len();
            names.extend(labels.into_iter().map(|l| l.name));
            if count < 100 {
                return Ok(names);
            }
            page += 1;
        }
    }

    async fn create_label(&self, label: &LabelDetails) -> Result<(), ProviderError> {
        let body = json!({
            "name": label.name,
            "color": label.colour,
            "description": label.description,
        });
        let response = self.api.execute(Method::POST, &self.path("labels"), Some(&body)).await?;
        if response.status == StatusCode::UNPROCESSABLE_ENTITY
            && response.error_codes().iter().any(|c| c == "already_exists")
        {
            return Ok(());
        }
        self.api.check(response)?;
        Ok(())
    }
}

#[async_trait]
impl PullRequestCreator for GithubCreator {
    fn provider(&self) -> Provider {
        Provider::Github
    }

    async fn base_commit(&self, branch: Option<&str>) -> Result<String, ProviderError> {
        let branch = match branch {
            Some(branch) => branch.to_string(),
            None => self.default_branch().await?,
        };
        let reference: GitRef = self.api.get(&self.path(&format!("git/ref/heads/{}", branch))).await?;
        Ok(reference.object.sha)
    }

    async fn create(&self, request: &PullRequest) -> Result<Option<PullRequestHandle>, ProviderError> {
        let head = self.branch_head(&request.branch_name).await?;
        if head.is_some() && self.pull_request_exists(&request.branch_name).await? {
            info!(branch = %request.branch_name, "pull request already exists");
            return Ok(None);
        }

        let commit_exists = match &head {
            Some(head) => self.commit_exists(head, request).await?,
            None => false,
        };
        let branch = if commit_exists {
            info!(branch = %request.branch_name, "branch already has the update commit");
            request.branch_name.clone()
        } else {
            let commit = self.create_commit(request).await?;
            let Some(branch) = self.create_or_update_branch(request, &commit, head.is_some()).await? else {
                return Ok(None);
            };
            debug!(branch = %branch, commit = %commit, "branch ready");
            branch
        };

        let target = self.target_branch(request).await?;
        let Some(mut handle) = self.create_pull_request(request, &target).await? else {
            return Ok(None);
        };
        self.annotate(&mut handle, request).await;
        info!(number = handle.number, branch = %branch, "created pull request");
        Ok(Some(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pull_request::test_support;
    use mockito::{Matcher, Server};

    fn creator(server: &Server) -> GithubCreator {
        let source = Source::new(Provider::Github, "gocardless/bump").with_api_endpoint(server.url());
        let credential = Credential::git_source("github.com", "token");
        GithubCreator::new(&source, Some(&credential)).unwrap()
    }

    #[tokio::test]
    async fn test_creates_branch_commit_and_pull_request() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/repos/gocardless/bump/git/ref/heads/dependabot/bundler/business-1.5.0")
            .with_status(404)
            .create_async()
            .await;
        server
            .mock("GET", "/repos/gocardless/bump")
            .match_header("authorization", "token token")
            .with_status(200)
            .with_body(r#"{"default_branch":"main","archived":false}"#)
            .create_async()
            .await;
        let tree = server
            .mock("POST", "/repos/gocardless/bump/git/trees")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({"base_tree": "basecommitsha"})),
                Matcher::Regex(r#""path":"Gemfile""#.to_string()),
            ]))
            .with_status(201)
            .with_body(r#"{"sha":"treesha"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/repos/gocardless/bump/git/commits")
            .match_body(Matcher::PartialJson(json!({"tree": "treesha"})))
            .with_status(201)
            .with_body(r#"{"sha":"commitsha"}"#)
            .create_async()
            .await;
        let branch = server
            .mock("POST", "/repos/gocardless/bump/git/refs")
            .match_body(Matcher::PartialJson(json!({
                "ref": "refs/heads/dependabot/bundler/business-1.5.0",
                "sha": "commitsha"
            })))
            .with_status(201)
            .with_body("{}")
            .create_async()
            .await;
        server
            .mock("POST", "/repos/gocardless/bump/pulls")
            .match_body(Matcher::PartialJson(json!({
                "base": "main",
                "head": "dependabot/bundler/business-1.5.0",
                "title": "Bump business from 1.4.0 to 1.5.0"
            })))
            .with_status(201)
            .with_body(r#"{"number":42,"html_url":"https://github.com/gocardless/bump/pull/42"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/repos/gocardless/bump/labels")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"[{"name":"dependencies"}]"#)
            .create_async()
            .await;
        let labels = server
            .mock("POST", "/repos/gocardless/bump/issues/42/labels")
            .match_body(Matcher::Json(json!({"labels": ["dependencies"]})))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let handle = creator(&server)
            .create(&test_support::request())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(handle.number, 42);
        assert_eq!(handle.labels, vec!["dependencies"]);
        assert!(handle.warnings.is_empty());
        tree.assert_async().await;
        branch.assert_async().await;
        labels.assert_async().await;
    }

    #[tokio::test]
    async fn test_existing_branch_and_pull_request_is_a_no_op() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/repos/gocardless/bump/git/ref/heads/dependabot/bundler/business-1.5.0")
            .with_status(200)
            .with_body(r#"{"object":{"sha":"commitsha"}}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/repos/gocardless/bump/pulls")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("head".into(), "gocardless:dependabot/bundler/business-1.5.0".into()),
                Matcher::UrlEncoded("state".into(), "all".into()),
            ]))
            .with_status(200)
            .with_body(r#"[{"number":41,"merged_at":null}]"#)
            .create_async()
            .await;
        let tree = server
            .mock("POST", "/repos/gocardless/bump/git/trees")
            .expect(0)
            .create_async()
            .await;

        let result = creator(&server).create(&test_support::request()).await.unwrap();
        assert!(result.is_none());
        tree.assert_async().await;
    }

    #[tokio::test]
    async fn test_pull_request_race_returns_none() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/repos/gocardless/bump/git/ref/heads/dependabot/bundler/business-1.5.0")
            .with_status(200)
            .with_body(r#"{"object":{"sha":"oldsha"}}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/repos/gocardless/bump/pulls")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"[{"number":40,"merged_at":"2019-01-01T00:00:00Z"}]"#)
            .create_async()
            .await;
        server
            .mock("GET", "/repos/gocardless/bump/git/commits/oldsha")
            .with_status(200)
            .with_body(r#"{"sha":"oldsha","message":"Bump business from 1.3.0 to 1.4.0"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/repos/gocardless/bump/git/trees")
            .with_status(201)
            .with_body(r#"{"sha":"treesha"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/repos/gocardless/bump/git/commits")
            .with_status(201)
            .with_body(r#"{"sha":"commitsha"}"#)
            .create_async()
            .await;
        let update = server
            .mock("PATCH", "/repos/gocardless/bump/git/refs/heads/dependabot/bundler/business-1.5.0")
            .match_body(Matcher::Json(json!({"sha": "commitsha", "force": true})))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        server
            .mock("GET", "/repos/gocardless/bump")
            .with_status(200)
            .with_body(r#"{"default_branch":"main"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/repos/gocardless/bump/pulls")
            .with_status(422)
            .with_body(r#"{"message":"Validation Failed","errors":[{"message":"A pull request already exists for gocardless:dependabot/bundler/business-1.5.0."}]}"#)
            .create_async()
            .await;

        let result = creator(&server).create(&test_support::request()).await.unwrap();
        assert!(result.is_none());
        update.assert_async().await;
    }

    #[tokio::test]
    async fn test_existing_commit_on_branch_is_reused() {
        let mut server = Server::new_async().await;
        let request = test_support::request();
        server
            .mock("GET", "/repos/gocardless/bump/git/ref/heads/dependabot/bundler/business-1.5.0")
            .with_status(200)
            .with_body(r#"{"object":{"sha":"headsha"}}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/repos/gocardless/bump/pulls")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;
        server
            .mock("GET", "/repos/gocardless/bump/git/commits/headsha")
            .with_status(200)
            .with_body(json!({"sha": "headsha", "message": request.commit_message}).to_string())
            .create_async()
            .await;
        let tree = server
            .mock("POST", "/repos/gocardless/bump/git/trees")
            .expect(0)
            .create_async()
            .await;
        let commit = server
            .mock("POST", "/repos/gocardless/bump/git/commits")
            .expect(0)
            .create_async()
            .await;
        let update = server
            .mock("PATCH", "/repos/gocardless/bump/git/refs/heads/dependabot/bundler/business-1.5.0")
            .expect(0)
            .create_async()
            .await;
        server
            .mock("GET", "/repos/gocardless/bump")
            .with_status(200)
            .with_body(r#"{"default_branch":"main"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/repos/gocardless/bump/pulls")
            .with_status(201)
            .with_body(r#"{"number":43,"html_url":"https://github.com/gocardless/bump/pull/43"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/repos/gocardless/bump/labels")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;
        server
            .mock("POST", "/repos/gocardless/bump/labels")
            .with_status(201)
            .with_body("{}")
            .create_async()
            .await;
        server
            .mock("POST", "/repos/gocardless/bump/issues/43/labels")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let handle = creator(&server).create(&request).await.unwrap().unwrap();
        assert_eq!(handle.number, 43);
        assert_eq!(handle.branch_name, "dependabot/bundler/business-1.5.0");
        tree.assert_async().await;
        commit.assert_async().await;
        update.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_repository() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", Matcher::Any)
            .with_status(404)
            .with_body(r#"{"message":"Not Found"}"#)
            .create_async()
            .await;

        let err = creator(&server).create(&test_support::request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::RepoNotFound { .. }));
    }

    #[tokio::test]
    async fn test_label_already_exists_is_tolerated() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/repos/gocardless/bump/labels")
            .with_status(422)
            .with_body(r#"{"message":"Validation Failed","errors":[{"resource":"Label","code":"already_exists","field":"name"}]}"#)
            .create_async()
            .await;

        let label = LabelDetails::new("dependencies", "0366d6");
        assert!(creator(&server).create_label(&label).await.is_ok());
    }
}
