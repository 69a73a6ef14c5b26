//! Azure DevOps pull request creator
//!
//! Azure has no repository label list, so labels come from
//! `SyntheticLabels` and are attached to the pull request by name.

use super::api::{ApiClient, Auth};
use super::{
    api_endpoint, truncate_description, Labeler, PullRequest, PullRequestCreator, PullRequestHandle,
    SyntheticLabels,
};
use crate::domain::{ContentEncoding, Credential, FileOperation, Provider, Source};
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{info, warn};

const API_VERSION: &str = "5.0";

/// Azure rejects longer pull request descriptions
const MAX_DESCRIPTION_LEN: usize = 4000;

/// `oldObjectId` for a ref that does not exist yet
const NULL_OBJECT_ID: &str = "0000000000000000000000000000000000000000";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Repository {
    default_branch: String,
    #[serde(default)]
    is_disabled: bool,
}

#[derive(Debug, Deserialize)]
struct ValueList<T> {
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GitRef {
    object_id: String,
}

#[derive(Debug, Deserialize)]
struct Commit {
    #[serde(default)]
    comment: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedPullRequest {
    pull_request_id: u64,
    #[serde(default)]
    url: Option<String>,
}

pub struct AzureCreator {
    api: ApiClient,
    repo: String,
    default_branch: OnceCell<String>,
}

impl AzureCreator {
    pub fn new(source: &Source, credential: Option<&Credential>) -> Result<Self, ProviderError> {
        let (organization, project, repository) =
            source.azure_parts().ok_or_else(|| ProviderError::Misconfigured {
                provider: Provider::Azure.to_string(),
                message: format!(
                    "repo '{}' is not of the form organization/project/_git/repository",
                    source.repo
                ),
            })?;
        let base = format!(
            "{}/{}/{}/_apis/git/repositories/{}",
            api_endpoint(source)?,
            organization,
            project,
            repository
        );
        let api = ApiClient::new(Provider::Azure, base, source.repo.clone(), Auth::azure(credential))?;
        Ok(Self {
            api,
            repo: source.repo.clone(),
            default_branch: OnceCell::new(),
        })
    }

    /// Append the API version every Azure request needs
    fn path(suffix: &str) -> String {
        let separator = if suffix.contains('?') { '&' } else { '?' };
        format!("{}{}api-version={}", suffix, separator, API_VERSION)
    }

    async fn default_branch(&self) -> Result<String, ProviderError> {
        self.default_branch
            .get_or_try_init(|| async {
                let repository: Repository = self.api.get(&Self::path("")).await?;
                if repository.is_disabled {
                    return Err(ProviderError::RepoDisabled {
                        repo: self.repo.clone(),
                    });
                }
                Ok(repository
                    .default_branch
                    .trim_start_matches("refs/heads/")
                    .to_string())
            })
            .await
            .cloned()
    }

    /// Head commit of a branch, if it exists
    async fn branch_head(&self, branch: &str) -> Result<Option<String>, ProviderError> {
        let path = Self::path(&format!("refs?filter={}", urlencoding::encode(&format!("heads/{}", branch))));
        let refs: ValueList<GitRef> = self.api.get(&path).await?;
        Ok(refs.value.into_iter().next().map(|r| r.object_id))
    }

    async fn pull_request_exists(&self, branch: &str, target: &str) -> Result<bool, ProviderError> {
        let path = Self::path(&format!(
            "pullrequests?searchCriteria.status=all&searchCriteria.sourceRefName={}&searchCriteria.targetRefName={}",
            urlencoding::encode(&format!("refs/heads/{}", branch)),
            urlencoding::encode(&format!("refs/heads/{}", target))
        ));
        let pulls: ValueList<Value> = self.api.get(&path).await?;
        Ok(!pulls.value.is_empty())
    }

    async fn commit_exists(&self, request: &PullRequest) -> Result<bool, ProviderError> {
        let path = Self::path(&format!(
            "commits?searchCriteria.itemVersion.version={}&$top=1",
            urlencoding::encode(&request.branch_name)
        ));
        let commits: ValueList<Commit> = self.api.get(&path).await?;
        // Azure truncates long comments in listings
        Ok(commits.value.first().is_some_and(|c| {
            let comment = c.comment.trim_end_matches("...");
            !comment.is_empty() && request.commit_message.starts_with(comment)
        }))
    }

    /// Push the files as one commit; creates the branch when `head` is `None`
    async fn push(&self, request: &PullRequest, head: Option<&str>) -> Result<(), ProviderError> {
        let changes: Vec<Value> = request
            .files
            .iter()
            .map(|file| {
                let change_type = match file.operation {
                    FileOperation::Update => "edit",
                    FileOperation::Create => "add",
                    FileOperation::Delete => "delete",
                };
                let item = json!({"path": format!("/{}", file.write_path())});
                if file.operation == FileOperation::Delete {
                    return json!({"changeType": change_type, "item": item});
                }
                let content_type = match file.content_encoding {
                    ContentEncoding::Utf8 => "rawtext",
                    ContentEncoding::Base64 => "base64encoded",
                };
                json!({
                    "changeType": change_type,
                    "item": item,
                    "newContent": {"content": file.content(), "contentType": content_type},
                })
            })
            .collect();

        let mut commit = json!({
            "comment": request.commit_message,
            "changes": changes,
        });
        if let Some(author) = &request.author {
            commit["author"] = json!({"name": author.name, "email": author.email});
        }
        let old_object_id = match head {
            Some(head) => head.to_string(),
            None => {
                commit["parents"] = json!([request.base_commit]);
                NULL_OBJECT_ID.to_string()
            }
        };
        let body = json!({
            "refUpdates": [{
                "name": format!("refs/heads/{}", request.branch_name),
                "oldObjectId": old_object_id,
            }],
            "commits": [commit],
        });
        let response = self
            .api
            .execute(Method::POST, &Self::path("pushes"), Some(&body))
            .await?;
        self.api.check(response)?;
        Ok(())
    }

    async fn create_pull_request(
        &self,
        request: &PullRequest,
        target: &str,
        labels: &[String],
    ) -> Result<Option<PullRequestHandle>, ProviderError> {
        let labels_body: Vec<Value> = labels.iter().map(|name| json!({"name": name})).collect();
        let reviewers: Vec<Value> = request.reviewers.iter().map(|id| json!({"id": id})).collect();
        let body = json!({
            "sourceRefName": format!("refs/heads/{}", request.branch_name),
            "targetRefName": format!("refs/heads/{}", target),
            "title": request.title,
            "description": truncate_description(&request.description, MAX_DESCRIPTION_LEN),
            "labels": labels_body,
            "reviewers": reviewers,
        });

        let response = self
            .api
            .execute(Method::POST, &Self::path("pullrequests"), Some(&body))
            .await?;
        if response.status == StatusCode::CONFLICT {
            info!(branch = %request.branch_name, "pull request created concurrently");
            return Ok(None);
        }
        let response = self.api.check(response)?;
        let created: CreatedPullRequest = self.api.parse(&response)?;
        let mut handle = PullRequestHandle::new(created.pull_request_id, created.url, request.branch_name.clone());
        handle.labels = labels.to_vec();
        Ok(Some(handle))
    }
}

#[async_trait]
impl PullRequestCreator for AzureCreator {
    fn provider(&self) -> Provider {
        Provider::Azure
    }

    async fn base_commit(&self, branch: Option<&str>) -> Result<String, ProviderError> {
        let branch = match branch {
            Some(branch) => branch.to_string(),
            None => self.default_branch().await?,
        };
        self.branch_head(&branch).await?.ok_or_else(|| {
            ProviderError::api(Provider::Azure.to_string(), 404, format!("branch '{}' not found", branch))
        })
    }

    async fn create(&self, request: &PullRequest) -> Result<Option<PullRequestHandle>, ProviderError> {
        let target = match &request.target_branch {
            Some(branch) => branch.clone(),
            None => self.default_branch().await?,
        };

        let head = self.branch_head(&request.branch_name).await?;
        match head.as_deref() {
            Some(head) => {
                if self.pull_request_exists(&request.branch_name, &target).await? {
                    info!(branch = %request.branch_name, "pull request already exists");
                    return Ok(None);
                }
                if !self.commit_exists(request).await? {
                    self.push(request, Some(head)).await?;
                }
            }
            None => self.push(request, None).await?,
        }

        let store = SyntheticLabels::new(request.labels.language.as_ref());
        let labeler = Labeler::new(&store, &request.dependencies, &request.labels);
        let labels = match labeler.labels_for_pr().await {
            Ok(labels) => labels,
            Err(e) => {
                warn!(error = %e, "could not compute labels");
                Vec::new()
            }
        };

        let handle = self.create_pull_request(request, &target, &labels).await?;
        if let Some(handle) = &handle {
            info!(number = handle.number, branch = %request.branch_name, "created pull request");
        }
        Ok(handle)
    }
}
