//! GitLab merge request creator
//!
//! Commits go through the multi-action commits API; labels, assignees,
//! reviewers and milestone are sent with the merge request itself.

use super::api::{ApiClient, Auth};
use super::{api_endpoint, Labeler, LabelStore, PullRequest, PullRequestCreator, PullRequestHandle};
use crate::domain::{ContentEncoding, Credential, FileOperation, LabelDetails, Provider, Source};
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct Project {
    default_branch: String,
    #[serde(default)]
    archived: bool,
}

#[derive(Debug, Deserialize)]
struct Branch {
    commit: BranchCommit,
}

#[derive(Debug, Deserialize)]
struct BranchCommit {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Commit {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct MergeRequest {
    iid: u64,
    #[serde(default)]
    web_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Label {
    name: String,
}

pub struct GitlabCreator {
    api: ApiClient,
    repo: String,
    /// URL-encoded `namespace/project`
    project: String,
    default_branch: OnceCell<String>,
}

impl GitlabCreator {
    pub fn new(source: &Source, credential: Option<&Credential>) -> Result<Self, ProviderError> {
        let api = ApiClient::new(
            Provider::Gitlab,
            api_endpoint(source)?,
            source.repo.clone(),
            Auth::gitlab(credential),
        )?;
        Ok(Self {
            api,
            repo: source.repo.clone(),
            project: urlencoding::encode(&source.repo).into_owned(),
            default_branch: OnceCell::new(),
        })
    }

    fn path(&self, suffix: &str) -> String {
        format!("projects/{}/{}", self.project, suffix)
    }

    async fn project(&self) -> Result<Project, ProviderError> {
        let project: Project = self.api.get(&format!("projects/{}", self.project)).await?;
        if project.archived {
            return Err(ProviderError::RepoArchived {
                repo: self.repo.clone(),
            });
        }
        Ok(project)
    }

    async fn default_branch(&self) -> Result<String, ProviderError> {
        self.default_branch
            .get_or_try_init(|| async { Ok(self.project().await?.default_branch) })
            .await
            .cloned()
    }

    async fn branch_exists(&self, branch: &str) -> Result<bool, ProviderError> {
        let path = self.path(&format!("repository/branches/{}", urlencoding::encode(branch)));
        let response = self.api.execute(Method::GET, &path, None).await?;
        match response.status {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => {
                self.project().await?;
                Ok(false)
            }
            _ => Err(self.api.error_for(&response)),
        }
    }

    /// Any merge request from the branch into the target, whatever its state
    async fn merge_request_exists(&self, branch: &str, target: &str) -> Result<bool, ProviderError> {
        let path = self.path(&format!(
            "merge_requests?source_branch={}&target_branch={}&state=all",
            urlencoding::encode(branch),
            urlencoding::encode(target)
        ));
        let merge_requests: Vec<Value> = self.api.get(&path).await?;
        Ok(!merge_requests.is_empty())
    }

    /// The branch head already carries this update
    async fn commit_exists(&self, request: &PullRequest) -> Result<bool, ProviderError> {
        let path = self.path(&format!(
            "repository/commits?ref_name={}&per_page=1",
            urlencoding::encode(&request.branch_name)
        ));
        let commits: Vec<Commit> = self.api.get(&path).await?;
        Ok(commits
            .first()
            .is_some_and(|c| c.message.trim() == request.commit_message.trim()))
    }

    /// Returns false when the branch appeared concurrently
    async fn create_branch(&self, request: &PullRequest) -> Result<bool, ProviderError> {
        let body = json!({"branch": request.branch_name, "ref": request.base_commit});
        let response = self
            .api
            .execute(Method::POST, &self.path("repository/branches"), Some(&body))
            .await?;
        let already_exists = matches!(response.status, StatusCode::BAD_REQUEST | StatusCode::CONFLICT)
            && response.message().to_lowercase().contains("already exists");
        if already_exists {
            info!(branch = %request.branch_name, "branch created concurrently");
            return Ok(false);
        }
        self.api.check(response)?;
        Ok(true)
    }

    async fn create_commit(&self, request: &PullRequest) -> Result<(), ProviderError> {
        let actions: Vec<Value> = request
            .files
            .iter()
            .map(|file| {
                let action = match file.operation {
                    FileOperation::Update => "update",
                    FileOperation::Create => "create",
                    FileOperation::Delete => "delete",
                };
                let encoding = match file.content_encoding {
                    ContentEncoding::Utf8 => "text",
                    ContentEncoding::Base64 => "base64",
                };
                json!({
                    "action": action,
                    "file_path": file.write_path(),
                    "content": file.content(),
                    "encoding": encoding,
                })
            })
            .collect();

        let mut body = json!({
            "branch": request.branch_name,
            "commit_message": request.commit_message,
            "actions": actions,
        });
        if let Some(author) = &request.author {
            body["author_name"] = json!(author.name);
            body["author_email"] = json!(author.email);
        }
        let response = self
            .api
            .execute(Method::POST, &self.path("repository/commits"), Some(&body))
            .await?;
        self.api.check(response)?;
        Ok(())
    }

    async fn create_merge_request(
        &self,
        request: &PullRequest,
        target: &str,
        labels: &[String],
    ) -> Result<Option<PullRequestHandle>, ProviderError> {
        let mut body = json!({
            "source_branch": request.branch_name,
            "target_branch": target,
            "title": request.title,
            "description": request.description,
            "remove_source_branch": true,
        });
        if !labels.is_empty() {
            body["labels"] = json!(labels.join(","));
        }
        // GitLab addresses users by numeric id
        let assignee_ids = numeric_ids(&request.assignees);
        if !assignee_ids.is_empty() {
            body["assignee_ids"] = json!(assignee_ids);
        }
        let reviewer_ids = numeric_ids(&request.reviewers);
        if !reviewer_ids.is_empty() {
            body["reviewer_ids"] = json!(reviewer_ids);
        }
        if let Some(milestone) = request.milestone {
            body["milestone_id"] = json!(milestone);
        }

        let response = self
            .api
            .execute(Method::POST, &self.path("merge_requests"), Some(&body))
            .await?;
        if response.status == StatusCode::CONFLICT {
            info!(branch = %request.branch_name, "merge request created concurrently");
            return Ok(None);
        }
        let response = self.api.check(response)?;
        let created: MergeRequest = self.api.parse(&response)?;
        let mut handle = PullRequestHandle::new(created.iid, created.web_url, request.branch_name.clone());
        handle.labels = labels.to_vec();
        Ok(Some(handle))
    }
}

fn numeric_ids(values: &[String]) -> Vec<u64> {
    values.iter().filter_map(|v| v.parse().ok()).collect()
}

#[async_trait]
impl LabelStore for GitlabCreator {
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
            "color": format!("#{}", label.colour),
            "description": label.description,
        });
        let response = self.api.execute(Method::POST, &self.path("labels"), Some(&body)).await?;
        if response.status == StatusCode::CONFLICT {
            return Ok(());
        }
        self.api.check(response)?;
        Ok(())
    }
}

#[async_trait]
impl PullRequestCreator for GitlabCreator {
    fn provider(&self) -> Provider {
        Provider::Gitlab
    }

    async fn base_commit(&self, branch: Option<&str>) -> Result<String, ProviderError> {
        let branch = match branch {
            Some(branch) => branch.to_string(),
            None => self.default_branch().await?,
        };
        let path = self.path(&format!("repository/branches/{}", urlencoding::encode(&branch)));
        let branch: Branch = self.api.get(&path).await?;
        Ok(branch.commit.id)
    }

    async fn create(&self, request: &PullRequest) -> Result<Option<PullRequestHandle>, ProviderError> {
        let target = match &request.target_branch {
            Some(branch) => branch.clone(),
            None => self.default_branch().await?,
        };

        let mut branch_exists = self.branch_exists(&request.branch_name).await?;
        if branch_exists && self.merge_request_exists(&request.branch_name, &target).await? {
            info!(branch = %request.branch_name, "merge request already exists");
            return Ok(None);
        }

        if !branch_exists {
            branch_exists = !self.create_branch(request).await?;
            if branch_exists && self.merge_request_exists(&request.branch_name, &target).await? {
                return Ok(None);
            }
        }
        if !branch_exists || !self.commit_exists(request).await? {
            self.create_commit(request).await?;
        }

        let labeler = Labeler::new(self, &request.dependencies, &request.labels);
        let mut warnings = Vec::new();
        if let Err(e) = labeler.create_default_labels_if_required().await {
            warnings.push(format!("labels: {}", e));
        }
        let labels = match labeler.labels_for_pr().await {
            Ok(labels) => labels,
            Err(e) => {
                warnings.push(format!("labels: {}", e));
                Vec::new()
            }
        };

        let Some(mut handle) = self.create_merge_request(request, &target, &labels).await? else {
            return Ok(None);
        };
        for warning in &warnings {
            warn!(number = handle.number, "{}", warning);
        }
        handle.warnings = warnings;
        info!(number = handle.number, branch = %request.branch_name, "created merge request");
        Ok(Some(handle))
    }
}
