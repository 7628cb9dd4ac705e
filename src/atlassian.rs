//! Stash (Bitbucket Server) and Jira REST calls.
//!
//! Both services share one `reqwest::Client` and one set of credentials. The
//! certificate policy is fixed when the client is built and covers every
//! request issued through it, for both services, and nothing else.

use futures::future::join_all;
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, Response};
use serde::{Deserialize, Serialize};

use crate::build::{BuildResult, BuildStatusPayload};
use crate::comment::compose_log_message;
use crate::config::Credentials;
use crate::error::{Error, Result};
use crate::guard::Commit;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsPolicy {
    Verify,
    AcceptInvalidCertificates,
}

impl TlsPolicy {
    pub fn for_credentials(credentials: &Credentials) -> Self {
        if credentials.allow_unsafe_certificate {
            TlsPolicy::AcceptInvalidCertificates
        } else {
            TlsPolicy::Verify
        }
    }
}

#[derive(Debug, Serialize)]
struct Visibility<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    value: &'a str,
}

#[derive(Debug, Serialize)]
struct CommentPayload<'a> {
    body: &'a str,
    visibility: Visibility<'a>,
}

#[derive(Debug, Deserialize)]
struct CommentResponse {
    id: String,
}

#[derive(Debug)]
pub struct AtlassianClient {
    client: Client,
    credentials: Credentials,
    comment_role: String,
    tls: TlsPolicy,
}

impl AtlassianClient {
    pub fn new(credentials: Credentials, comment_role: impl Into<String>) -> Result<Self> {
        let tls = TlsPolicy::for_credentials(&credentials);
        if tls == TlsPolicy::AcceptInvalidCertificates {
            tracing::warn!("certificate verification disabled for Stash and Jira requests");
        }
        let client = Client::builder()
            .danger_accept_invalid_certs(tls == TlsPolicy::AcceptInvalidCertificates)
            .build()?;
        Ok(Self {
            client,
            credentials,
            comment_role: comment_role.into(),
            tls,
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// One authenticated call; any 2xx resolves, everything else is an error.
    async fn request<B>(
        &self,
        base_url: &str,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response>
    where
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", base_url, path);
        tracing::trace!(%method, %url, tls = ?self.tls, "atlassian request");

        let mut req = self
            .client
            .request(method.clone(), &url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .header(ACCEPT, "application/json");
        if let Some(body) = body {
            req = req.json(body);
        }

        let response = req.send().await.inspect_err(|e| {
            tracing::trace!(%url, "atlassian transport error: {}", e);
        })?;
        let status = response.status();
        if status.is_success() {
            tracing::trace!(%url, %status, "atlassian response success");
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::trace!(%url, %status, %body, "atlassian response error");
        Err(Error::HttpStatus {
            method,
            url,
            status,
            body,
        })
    }

    async fn stash<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response> {
        self.request(&self.credentials.stash_url, method, path, body)
            .await
    }

    async fn jira<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response> {
        self.request(&self.credentials.jira_url, method, path, body)
            .await
    }

    pub async fn check_credentials(&self) -> Result<()> {
        tracing::debug!("checking credentials with Stash");
        let path = format!(
            "/rest/api/1.0/users/{}",
            urlencoding::encode(&self.credentials.username)
        );
        self.stash(Method::GET, &path, None::<&()>).await?;
        Ok(())
    }

    pub async fn validate_issue_key(&self, issue_key: &str) -> Result<()> {
        let path = format!("/rest/api/2/issue/{}", urlencoding::encode(issue_key));
        self.jira(Method::HEAD, &path, None::<&()>).await?;
        Ok(())
    }

    pub async fn post_build_status(
        &self,
        result: &BuildResult,
        commit: &Commit,
        link: &str,
    ) -> Result<()> {
        let payload = BuildStatusPayload::new(result, link);
        tracing::debug!(
            key = %payload.key,
            state = ?payload.state,
            "posting build status to Stash"
        );
        let path = format!("/rest/build-status/1.0/commits/{}", commit.id);
        self.stash(Method::POST, &path, Some(&payload)).await?;
        Ok(())
    }

    /// Posts every status at once and waits for all of them; one settlement per
    /// result, in input order.
    pub async fn post_build_results(
        &self,
        results: &[BuildResult],
        commit: &Commit,
        link: &str,
    ) -> Vec<Result<()>> {
        tracing::info!(count = results.len(), "posting build results to Stash");
        let settled = join_all(
            results
                .iter()
                .map(|result| self.post_build_status(result, commit, link)),
        )
        .await;
        for (result, settlement) in results.iter().zip(&settled) {
            if let Err(err) = settlement {
                tracing::warn!(key = %result.conf.key, "failed to post build status: {}", err);
            }
        }
        settled
    }

    /// Validates the issue, then posts the composed comment. Returns the comment id.
    pub async fn post_log_comment(
        &self,
        results: &[BuildResult],
        commit: &Commit,
        issue_key: &str,
    ) -> Result<String> {
        let body = compose_log_message(results, commit)?;
        let payload = CommentPayload {
            body: &body,
            visibility: Visibility {
                kind: "role",
                value: &self.comment_role,
            },
        };

        tracing::info!(%issue_key, "posting build log to JIRA");
        if let Err(err) = self.validate_issue_key(issue_key).await {
            tracing::debug!("issue key validation failed: {}", err);
            return Err(Error::InvalidIssueKey(issue_key.to_string()));
        }

        let path = format!(
            "/rest/api/2/issue/{}/comment",
            urlencoding::encode(issue_key)
        );
        let created: CommentResponse = self
            .jira(Method::POST, &path, Some(&payload))
            .await?
            .json()
            .await?;
        Ok(created.id)
    }
}
