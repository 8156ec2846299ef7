use crate::{
    config::Config,
    poller::StatusSource,
    status::StatusReport,
    utils::{build_request, FetchError},
};

const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";
static USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

pub fn status_url(config: &Config) -> String {
    let api_url = config.api_url.trim_end_matches('/');
    let owner = &config.repository_owner;
    let repo = config.repository_name();
    let reference = &config.ref_name;
    format!("{api_url}/repos/{owner}/{repo}/commits/{reference}/status")
}

/// Combined-status endpoint for one commit, queried once per poll attempt.
pub struct GitHubStatusClient {
    client: reqwest::Client,
    url: String,
    headers: Vec<(&'static str, String)>,
    timeout: std::time::Duration,
}

impl GitHubStatusClient {
    pub fn new(config: &Config) -> Result<GitHubStatusClient, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(FetchError::Request)?;
        let token = &config.token;
        let headers = vec![
            ("Authorization", format!("Bearer {token}")),
            ("Accept", String::from(ACCEPT)),
            ("X-GitHub-Api-Version", String::from(API_VERSION)),
        ];
        Ok(GitHubStatusClient {
            client,
            url: status_url(config),
            headers,
            timeout: config.request_timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn build_request(&self) -> Result<reqwest::Request, FetchError> {
        build_request(&self.client, &self.url, &self.headers, self.timeout)
    }
}

impl StatusSource for GitHubStatusClient {
    async fn fetch(&self) -> Result<StatusReport, FetchError> {
        let request = self.build_request()?;
        crate::utils::request::<StatusReport>(&self.client, request).await
    }
}
