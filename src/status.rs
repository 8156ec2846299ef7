use std::sync::OnceLock;

use regex::Regex;

use crate::config::Config;

const SUCCESS: &str = "success";

// https://<host>/<3 ignored segments>/<build id>/<anything>
const TARGET_URL_PATTERN: &str = r"^https://[^/]+/[^/]+/[^/]+/[^/]+/(\d+)/.+$";

fn target_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(TARGET_URL_PATTERN).expect("target url pattern is valid"))
}

/// Combined commit status as returned by `GET /repos/{owner}/{repo}/commits/{ref}/status`.
#[derive(Debug, Clone, serde::Deserialize, PartialEq)]
pub struct StatusReport {
    pub state: String,
    #[serde(default)]
    pub statuses: Vec<StatusEntry>,
}

#[derive(Debug, Clone, serde::Deserialize, PartialEq)]
pub struct StatusEntry {
    pub state: String,
    pub context: String,
    #[serde(default)]
    pub target_url: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("status {0} not found")]
    StatusNotFound(String),

    #[error("status {name} is not success (state: {state})")]
    StatusNotSuccessful { name: String, state: String },

    #[error("build info not found in target url {0:?}")]
    MalformedTargetUrl(String),
}

impl StatusReport {
    /// Index of the first entry whose context is `status_name`.
    pub fn find(&self, status_name: &str) -> Option<usize> {
        self.statuses
            .iter()
            .position(|status| status.context == status_name)
    }

    pub fn is_success(&self, index: usize) -> bool {
        self.statuses
            .get(index)
            .map(|status| status.state == SUCCESS)
            .unwrap_or(false)
    }

    /// True when the first entry named `status_name` exists and succeeded.
    pub fn is_ready(&self, status_name: &str) -> bool {
        match self.find(status_name) {
            Some(index) => self.is_success(index),
            None => false,
        }
    }

    /// Builds `<image>:<ref>-<build id>` from the target url of the configured status.
    pub fn image_reference(&self, config: &Config) -> Result<String, ExtractError> {
        let status_name = &config.status_name;
        let index = self
            .find(status_name)
            .ok_or_else(|| ExtractError::StatusNotFound(status_name.to_string()))?;
        let status = &self.statuses[index];
        if !self.is_success(index) {
            return Err(ExtractError::StatusNotSuccessful {
                name: status_name.to_string(),
                state: status.state.to_string(),
            });
        }

        let target_url = status.target_url.as_deref().unwrap_or("");
        let build_id = build_id(target_url)
            .ok_or_else(|| ExtractError::MalformedTargetUrl(target_url.to_string()))?;

        let image_name = &config.image_name;
        let ref_name = &config.ref_name;
        Ok(format!("{image_name}:{ref_name}-{build_id}"))
    }
}

fn build_id(target_url: &str) -> Option<&str> {
    target_url_regex()
        .captures(target_url)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod status_tests {
    use super::*;
    use crate::config::test_config;

    fn entry(context: &str, state: &str, target_url: &str) -> StatusEntry {
        StatusEntry {
            state: String::from(state),
            context: String::from(context),
            target_url: Some(String::from(target_url)),
        }
    }

    fn report(statuses: Vec<StatusEntry>) -> StatusReport {
        StatusReport {
            state: String::from("pending"),
            statuses,
        }
    }

    const JENKINS: &str = "continuous-integration/jenkins/branch";
    const JENKINS_URL: &str = "https://jenkins.example.com/job/myapp/main/482/display/redirect";

    #[test]
    fn decode_response() {
        let s = String::from(
            "{\"state\":\"success\",\"sha\":\"6dcb09b5b57875f334f61aebed695e2e4193db5e\",\"total_count\":2,\"statuses\":[{\"url\":\"https://api.github.com/repos/octocat/Hello-World/statuses/6dcb09b\",\"id\":1,\"state\":\"success\",\"description\":\"This commit looks good\",\"target_url\":\"https://jenkins.example.com/job/myapp/main/482/display/redirect\",\"context\":\"continuous-integration/jenkins/branch\",\"created_at\":\"2012-07-20T01:19:13Z\"},{\"id\":2,\"state\":\"pending\",\"description\":null,\"target_url\":null,\"context\":\"security/brakeman\"}]}",
        );
        let v = serde_json::from_str::<StatusReport>(&s).unwrap();
        let expected = StatusReport {
            state: String::from("success"),
            statuses: vec![
                entry(JENKINS, "success", JENKINS_URL),
                StatusEntry {
                    state: String::from("pending"),
                    context: String::from("security/brakeman"),
                    target_url: None,
                },
            ],
        };
        assert_eq!(v, expected);
    }

    #[test]
    fn decode_without_statuses() {
        let v = serde_json::from_str::<StatusReport>("{\"state\":\"pending\"}").unwrap();
        assert!(v.statuses.is_empty());
        assert_eq!(v.find(JENKINS), None);
    }

    #[test]
    fn find_returns_index_of_single_match() {
        let r = report(vec![
            entry("lint", "success", "https://x"),
            entry("build", "failure", "https://y"),
            entry(JENKINS, "pending", JENKINS_URL),
        ]);
        assert_eq!(r.find(JENKINS), Some(2));
        assert_eq!(r.find("build"), Some(1));
        assert_eq!(r.find("lint"), Some(0));
        assert_eq!(r.find("missing"), None);
    }

    #[test]
    fn find_on_empty_report() {
        assert_eq!(report(vec![]).find(JENKINS), None);
    }

    #[test]
    fn find_prefers_first_duplicate() {
        let r = report(vec![
            entry("lint", "success", "https://x"),
            entry(JENKINS, "failure", JENKINS_URL),
            entry(JENKINS, "success", JENKINS_URL),
        ]);
        assert_eq!(r.find(JENKINS), Some(1));
        assert!(!r.is_ready(JENKINS));
    }

    #[test]
    fn is_success_is_exact() {
        let r = report(vec![
            entry("a", "success", ""),
            entry("b", "Success", ""),
            entry("c", " success", ""),
            entry("d", "pending", ""),
            entry("e", "error", ""),
        ]);
        assert!(r.is_success(0));
        assert!(!r.is_success(1));
        assert!(!r.is_success(2));
        assert!(!r.is_success(3));
        assert!(!r.is_success(4));
        assert!(!r.is_success(5));
    }

    #[test]
    fn image_reference_from_target_url() {
        let mut config = test_config();
        config.image_name = String::from("myapp");
        config.ref_name = String::from("main");
        config.status_name = String::from(JENKINS);
        let r = report(vec![entry(JENKINS, "success", "https://a/b/c/d/482/console")]);
        assert_eq!(r.image_reference(&config), Ok(String::from("myapp:main-482")));
    }

    #[test]
    fn image_reference_from_jenkins_redirect_url() {
        let mut config = test_config();
        config.image_name = String::from("ghcr.io/octocat/myapp");
        config.ref_name = String::from("feature-x");
        let r = report(vec![entry(JENKINS, "success", JENKINS_URL)]);
        assert_eq!(
            r.image_reference(&config),
            Ok(String::from("ghcr.io/octocat/myapp:feature-x-482"))
        );
    }

    #[test]
    fn image_reference_status_not_found() {
        let config = test_config();
        let r = report(vec![entry("lint", "success", JENKINS_URL)]);
        assert_eq!(
            r.image_reference(&config),
            Err(ExtractError::StatusNotFound(String::from(JENKINS)))
        );
    }

    #[test]
    fn image_reference_status_not_successful() {
        let config = test_config();
        let r = report(vec![
            entry(JENKINS, "pending", JENKINS_URL),
            entry(JENKINS, "success", JENKINS_URL),
        ]);
        assert_eq!(
            r.image_reference(&config),
            Err(ExtractError::StatusNotSuccessful {
                name: String::from(JENKINS),
                state: String::from("pending"),
            })
        );
    }

    #[test]
    fn image_reference_malformed_urls() {
        let config = test_config();
        let urls = [
            "https://a/b/c/d/console",
            "https://a/b/c/482/console",
            "https://a/b/c/d/e/482/console",
            "https://a/b/c/d/482",
            "https://a/b/c/d/482/",
            "http://a/b/c/d/482/console",
            "https://a/b/c/d/abc/console",
            "",
        ];
        for url in urls {
            let r = report(vec![entry(JENKINS, "success", url)]);
            assert_eq!(
                r.image_reference(&config),
                Err(ExtractError::MalformedTargetUrl(String::from(url))),
                "url {url}"
            );
        }
    }

    #[test]
    fn image_reference_without_target_url() {
        let config = test_config();
        let r = report(vec![StatusEntry {
            state: String::from("success"),
            context: String::from(JENKINS),
            target_url: None,
        }]);
        assert_eq!(
            r.image_reference(&config),
            Err(ExtractError::MalformedTargetUrl(String::new()))
        );
    }
}
