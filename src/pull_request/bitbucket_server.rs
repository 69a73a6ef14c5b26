//! Bitbucket Server (Data Center) pull request creator
//!
//! Bitbucket Server has no multi-file commit endpoint. Each file is
//! written with its own edit through the browse API, chaining commit ids.

use super::api::{ApiClient, Auth};
use super::{api_endpoint, PullRequest, PullRequestCreator, PullRequestHandle};
use crate::domain::{Credential, FileOperation, Provider, Source};
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::multipart::Form;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    values: Vec<T>,
    #[serde(default = "default_last_page")]
    is_last_page: bool,
    #[serde(default)]
    next_page_start: Option<u64>,
}

fn default_last_page() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Branch {
    display_id: String,
    #[serde(default)]
    latest_commit: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ref {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequestSummary {
    from_ref: Ref,
    to_ref: Ref,
}

#[derive(Debug, Deserialize)]
struct Commit {
    id: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Links {
    #[serde(rename = "self", default)]
    self_links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
}

#[derive(Debug, Deserialize)]
struct CreatedPullRequest {
    id: u64,
    #[serde(default)]
    links: Option<Links>,
}

pub struct BitbucketServerCreator {
    api: ApiClient,
    default_branch: OnceCell<String>,
}

impl BitbucketServerCreator {
    /// `source.repo` is `PROJECT/repository-slug`
    pub fn new(source: &Source, credential: Option<&Credential>) -> Result<Self, ProviderError> {
        let endpoint = api_endpoint(source)?;
        let (project, slug) = source.repo.split_once('/').ok_or_else(|| ProviderError::Misconfigured {
            provider: Provider::BitbucketServer.to_string(),
            message: format!("repo '{}' is not of the form PROJECT/repository", source.repo),
        })?;
        let base = format!("{}/projects/{}/repos/{}", endpoint, project, slug);
        let api = ApiClient::new(
            Provider::BitbucketServer,
            base,
            source.repo.clone(),
            Auth::bitbucket_server(credential),
        )?;
        Ok(Self {
            api,
            default_branch: OnceCell::new(),
        })
    }

    async fn default_branch(&self) -> Result<String, ProviderError> {
        self.default_branch
            .get_or_try_init(|| async {
                let branch: Branch = self.api.get("branches/default").await?;
                Ok(branch.display_id)
            })
            .await
            .cloned()
    }

    /// Head commit of a branch, if it exists
    async fn branch_head(&self, branch: &str) -> Result<Option<String>, ProviderError> {
        let path = format!("branches?filterText={}", urlencoding::encode(branch));
        let page: Page<Branch> = self.api.get(&path).await?;
        Ok(page
            .values
            .into_iter()
            .find(|b| b.display_id == branch)
            .and_then(|b| b.latest_commit))
    }

    async fn pull_request_exists(&self, branch: &str, target: &str) -> Result<bool, ProviderError> {
        let from = format!("refs/heads/{}", branch);
        let to = format!("refs/heads/{}", target);
        let mut start = 0;
        loop {
            let path = format!(
                "pull-requests?state=ALL&direction=OUTGOING&at={}&start={}",
                urlencoding::encode(&from),
                start
            );
            let page: Page<PullRequestSummary> = self.api.get(&path).await?;
            if page.values.iter().any(|pr| pr.from_ref.id == from && pr.to_ref.id == to) {
                return Ok(true);
            }
            match page.next_page_start {
                Some(next) if !page.is_last_page => start = next,
                _ => return Ok(false),
            }
        }
    }

    async fn head_commit_message(&self, branch: &str) -> Result<Option<String>, ProviderError> {
        let path = format!("commits?until={}&limit=1", urlencoding::encode(&format!("refs/heads/{}", branch)));
        let page: Page<Commit> = self.api.get(&path).await?;
        Ok(page.values.into_iter().next().map(|c| c.message))
    }

    /// Write every file onto the branch, one commit per file
    async fn commit_files(
        &self,
        request: &PullRequest,
        target: &str,
        head: Option<&str>,
    ) -> Result<(), ProviderError> {
        let mut new_branch = head.is_none();
        let mut parent = head.unwrap_or(&request.base_commit).to_string();

        for file in &request.files {
            if file.operation == FileOperation::Delete {
                warn!(path = %file.path(), "file deletion is not supported on Bitbucket Server, skipping");
                continue;
            }
            let mut form = Form::new()
                .text("message", request.commit_message.clone())
                .text("branch", request.branch_name.clone())
                .text("content", file.content().to_string());
            if file.operation == FileOperation::Update || !new_branch {
                form = form.text("sourceCommitId", parent.clone());
            }
            if new_branch {
                form = form.text("sourceBranch", target.to_string());
            }

            let path = format!("browse/{}", file.write_path());
            let response = self
                .api
                .send(self.api.request(Method::PUT, &path).multipart(form))
                .await?;
            let response = self.api.check(response)?;
            let commit: Commit = self.api.parse(&response)?;
            debug!(path = %path, commit = %commit.id, "committed file");
            parent = commit.id;
            new_branch = false;
        }
        Ok(())
    }

    async fn create_pull_request(
        &self,
        request: &PullRequest,
        target: &str,
    ) -> Result<Option<PullRequestHandle>, ProviderError> {
        let reviewers: Vec<_> = request
            .reviewers
            .iter()
            .map(|name| json!({"user": {"name": name}}))
            .collect();
        let body = json!({
            "title": request.title,
            "description": request.description,
            "state": "OPEN",
            "fromRef": {"id": format!("refs/heads/{}", request.branch_name)},
            "toRef": {"id": format!("refs/heads/{}", target)},
            "reviewers": reviewers,
        });
        let response = self.api.execute(Method::POST, "pull-requests", Some(&body)).await?;
        if response.status == StatusCode::CONFLICT {
            info!(branch = %request.branch_name, "pull request created concurrently");
            return Ok(None);
        }
        let response = self.api.check(response)?;
        let created: CreatedPullRequest = self.api.parse(&response)?;
        let url = created
            .links
            .and_then(|l| l.self_links.into_iter().next())
            .map(|l| l.href);
        Ok(Some(PullRequestHandle::new(created.id, url, request.branch_name.clone())))
    }
}

#[async_trait]
impl PullRequestCreator for BitbucketServerCreator {
    fn provider(&self) -> Provider {
        Provider::BitbucketServer
    }

    async fn base_commit(&self, branch: Option<&str>) -> Result<String, ProviderError> {
        let branch = match branch {
            Some(branch) => branch.to_string(),
            None => self.default_branch().await?,
        };
        self.branch_head(&branch).await?.ok_or_else(|| {
            ProviderError::api(
                Provider::BitbucketServer.to_string(),
                404,
                format!("branch '{}' not found", branch),
            )
        })
    }

    async fn create(&self, request: &PullRequest) -> Result<Option<PullRequestHandle>, ProviderError> {
        let target = match &request.target_branch {
            Some(branch) => branch.clone(),
            None => self.default_branch().await?,
        };

        let head = self.branch_head(&request.branch_name).await?;
        if let Some(head) = head.as_deref() {
            if self.pull_request_exists(&request.branch_name, &target).await? {
                info!(branch = %request.branch_name, "pull request already exists");
                return Ok(None);
            }
            let message = self.head_commit_message(&request.branch_name).await?;
            if message.as_deref().map(str::trim) != Some(request.commit_message.trim()) {
                self.commit_files(request, &target, Some(head)).await?;
            }
        } else {
            self.commit_files(request, &target, None).await?;
        }

        let handle = self.create_pull_request(request, &target).await?;
        if let Some(handle) = &handle {
            info!(number = handle.number, branch = %request.branch_name, "created pull request");
        }
        Ok(handle)
    }
}
