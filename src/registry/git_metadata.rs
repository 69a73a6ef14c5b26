//! Remote git ref listing
//!
//! Reads the smart-HTTP ref advertisement at
//! `{repo}.git/info/refs?service=git-upload-pack`, which lists every branch
//! and tag with the commit it points at, without cloning.

use crate::domain::{credential_for_host, Credential};
use crate::error::RegistryError;
use crate::registry::HttpClient;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

static SCP_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^git@(?P<host>[^:/]+)[:/]+(?P<path>.+)$").unwrap());

static HOST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z+]+://(?:[^@/]+@)?(?P<host>[^/:]+)").unwrap());

/// Kind of an advertised ref
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefType {
    Head,
    Tag,
}

/// A branch or tag on the remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitRef {
    /// Short name (`v1.0.0`, `master`, or `HEAD`)
    pub name: String,
    pub ref_type: RefType,
    /// Commit the ref resolves to; annotated tags are peeled
    pub commit_sha: String,
    /// Sha of the tag object itself; equals `commit_sha` for lightweight tags
    pub tag_sha: String,
}

/// All refs advertised by one remote
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitMetadata {
    refs: Vec<GitRef>,
}

impl GitMetadata {
    pub fn new(refs: Vec<GitRef>) -> Self {
        Self { refs }
    }

    /// Parse a pkt-line encoded ref advertisement
    pub fn parse(upload_pack: &str) -> Result<Self, String> {
        let mut refs: Vec<GitRef> = Vec::new();

        for line in pkt_lines(upload_pack)? {
            let line = line.split('\0').next().unwrap_or_default().trim_end();
            if line.starts_with('#') || line.is_empty() {
                continue;
            }
            let Some((sha, full_name)) = line.split_once(' ') else {
                continue;
            };

            if let Some(peeled) = full_name.strip_suffix("^{}") {
                let short = peeled.trim_start_matches("refs/tags/");
                if let Some(tag) = refs
                    .iter_mut()
                    .find(|r| r.ref_type == RefType::Tag && r.name == short)
                {
                    tag.commit_sha = sha.to_string();
                }
                continue;
            }

            let (name, ref_type) = if let Some(tag) = full_name.strip_prefix("refs/tags/") {
                (tag, RefType::Tag)
            } else if let Some(head) = full_name.strip_prefix("refs/heads/") {
                (head, RefType::Head)
            } else if full_name == "HEAD" {
                ("HEAD", RefType::Head)
            } else {
                continue;
            };

            refs.push(GitRef {
                name: name.to_string(),
                ref_type,
                commit_sha: sha.to_string(),
                tag_sha: sha.to_string(),
            });
        }

        Ok(Self { refs })
    }

    pub fn refs(&self) -> &[GitRef] {
        &self.refs
    }

    pub fn tags(&self) -> impl Iterator<Item = &GitRef> {
        self.refs.iter().filter(|r| r.ref_type == RefType::Tag)
    }

    pub fn heads(&self) -> impl Iterator<Item = &GitRef> {
        self.refs.iter().filter(|r| r.ref_type == RefType::Head)
    }

    pub fn find_tag(&self, name: &str) -> Option<&GitRef> {
        self.tags().find(|r| r.name == name)
    }

    pub fn find_head(&self, name: &str) -> Option<&GitRef> {
        self.heads().find(|r| r.name == name)
    }

    /// Commit a branch, tag or `HEAD` points at
    pub fn head_commit_for_ref(&self, name: &str) -> Option<&str> {
        self.find_head(name)
            .or_else(|| self.find_tag(name))
            .map(|r| r.commit_sha.as_str())
    }
}

/// Splits a pkt-line stream into payloads, skipping flush packets
fn pkt_lines(body: &str) -> Result<Vec<&str>, String> {
    let mut lines = Vec::new();
    let mut rest = body;

    while !rest.is_empty() {
        let (len_hex, tail) = rest
            .split_at_checked(4)
            .ok_or_else(|| format!("truncated pkt-line: {:?}", rest))?;
        let len = usize::from_str_radix(len_hex, 16)
            .map_err(|_| format!("invalid pkt-line length: {:?}", len_hex))?;
        if len == 0 {
            rest = tail;
            continue;
        }
        let payload_len = len
            .checked_sub(4)
            .ok_or_else(|| format!("invalid pkt-line length: {}", len))?;
        let (payload, next) = tail
            .split_at_checked(payload_len)
            .ok_or_else(|| "pkt-line longer than body".to_string())?;
        lines.push(payload);
        rest = next;
    }

    Ok(lines)
}

/// Normalises `git@host:path`, `git://` and bare URLs to an HTTPS `.git` URL
pub fn normalize_git_url(url: &str) -> String {
    let https = if let Some(caps) = SCP_URL_RE.captures(url) {
        format!("https://{}/{}", &caps["host"], &caps["path"])
    } else if let Some(rest) = url.strip_prefix("git://") {
        format!("https://{}", rest)
    } else if url.contains("://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    };

    let trimmed = https.trim_end_matches('/');
    if trimmed.ends_with(".git") {
        trimmed.to_string()
    } else {
        format!("{}.git", trimmed)
    }
}

/// Host part of a git URL
pub fn git_host(url: &str) -> Option<String> {
    let normalized = normalize_git_url(url);
    HOST_RE
        .captures(&normalized)
        .map(|caps| caps["host"].to_string())
}

/// Fetches ref advertisements with the matching host credential
pub struct GitMetadataFetcher {
    client: HttpClient,
    credentials: Vec<Credential>,
}

impl GitMetadataFetcher {
    pub fn new(client: HttpClient, credentials: Vec<Credential>) -> Self {
        Self {
            client,
            credentials,
        }
    }

    pub async fn fetch(&self, url: &str) -> Result<GitMetadata, RegistryError> {
        let repo_url = normalize_git_url(url);
        let service_url = format!("{}/info/refs?service=git-upload-pack", repo_url);
        let credential = git_host(url)
            .and_then(|host| credential_for_host(&self.credentials, &host))
            .filter(|c| c.secret().is_some());

        debug!(url = %service_url, authenticated = credential.is_some(), "fetching git refs");
        let body = self
            .client
            .get_text(&service_url, credential, url, "git")
            .await?;

        GitMetadata::parse(&body).map_err(|message| RegistryError::InvalidResponse {
            package: url.to_string(),
            registry: "git".to_string(),
            message,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn pkt(line: &str) -> String {
        format!("{:04x}{}", line.len() + 4, line)
    }

    /// Builds an advertisement from `(sha, ref)` pairs
    pub(crate) fn upload_pack(refs: &[(&str, &str)]) -> String {
        let mut body = pkt("# service=git-upload-pack\n");
        body.push_str("0000");
        for (i, (sha, name)) in refs.iter().enumerate() {
            if i == 0 {
                body.push_str(&pkt(&format!("{} {}\0multi_ack side-band-64k\n", sha, name)));
            } else {
                body.push_str(&pkt(&format!("{} {}\n", sha, name)));
            }
        }
        body.push_str("0000");
        body
    }

    const TAG_SHA: &str = "c5bf1bd47935504072ac0eba1006cf4d67af6a7a";
    const COMMIT_SHA: &str = "df9f605d7111b6814fe493cf8f41de3f9f0978b2";
    const HEAD_SHA: &str = "7bb4e41ce5164074a0920d5b5770d196b4d90104";

    #[test]
    fn test_parse_peels_annotated_tags() {
        let body = upload_pack(&[
            (HEAD_SHA, "HEAD"),
            (HEAD_SHA, "refs/heads/master"),
            (TAG_SHA, "refs/tags/v1.0.0"),
            (COMMIT_SHA, "refs/tags/v1.0.0^{}"),
        ]);
        let metadata = GitMetadata::parse(&body).unwrap();

        let tag = metadata.find_tag("v1.0.0").unwrap();
        assert_eq!(tag.tag_sha, TAG_SHA);
        assert_eq!(tag.commit_sha, COMMIT_SHA);
        assert_eq!(metadata.tags().count(), 1);
        assert_eq!(metadata.head_commit_for_ref("master"), Some(HEAD_SHA));
        assert_eq!(metadata.head_commit_for_ref("HEAD"), Some(HEAD_SHA));
    }

    #[test]
    fn test_parse_empty_repo() {
        let metadata = GitMetadata::parse(&upload_pack(&[])).unwrap();
        assert!(metadata.refs().is_empty());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(GitMetadata::parse("zzzz").is_err());
    }

    #[test]
    fn test_normalize_git_url() {
        let expected = "https://github.com/gocardless/business.git";
        assert_eq!(normalize_git_url("https://github.com/gocardless/business"), expected);
        assert_eq!(normalize_git_url("git@github.com:gocardless/business"), expected);
        assert_eq!(normalize_git_url("git@github.com:/gocardless/business"), expected);
        assert_eq!(normalize_git_url("git@github.com/gocardless/business"), expected);
        assert_eq!(normalize_git_url("git://github.com/gocardless/business.git"), expected);
        assert_eq!(
            normalize_git_url("http://bitbucket.org/gocardless/business"),
            "http://bitbucket.org/gocardless/business.git"
        );
    }

    #[test]
    fn test_git_host() {
        assert_eq!(git_host("git@github.com:a/b").as_deref(), Some("github.com"));
        assert_eq!(
            git_host("https://user@bitbucket.org/a/b").as_deref(),
            Some("bitbucket.org")
        );
    }

    #[tokio::test]
    async fn test_fetch_against_server() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/gocardless/business.git/info/refs")
            .match_query(mockito::Matcher::UrlEncoded(
                "service".into(),
                "git-upload-pack".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/x-git-upload-pack-advertisement")
            .with_body(upload_pack(&[(COMMIT_SHA, "refs/tags/v1.5.0")]))
            .create_async()
            .await;

        let fetcher = GitMetadataFetcher::new(HttpClient::new().unwrap(), Vec::new());
        let metadata = fetcher
            .fetch(&format!("{}/gocardless/business", server.url()))
            .await
            .unwrap();
        assert_eq!(metadata.find_tag("v1.5.0").unwrap().commit_sha, COMMIT_SHA);
    }
}
