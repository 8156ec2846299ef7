use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_STATUS_NAME: &str = "continuous-integration/jenkins/branch";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(15);
const DEFAULT_MAXIMUM_WAIT_TIME: Duration = Duration::from_secs(10 * 60);

pub const GITHUB_REF_NAME: &str = "GITHUB_REF_NAME";
pub const GITHUB_REPOSITORY: &str = "GITHUB_REPOSITORY";
pub const GITHUB_REPOSITORY_OWNER: &str = "GITHUB_REPOSITORY_OWNER";
pub const GITHUB_API_URL: &str = "GITHUB_API_URL";
pub const GITHUB_TOKEN: &str = "GITHUB_TOKEN";
pub const INPUT_GITHUB_TOKEN: &str = "INPUT_GITHUB_TOKEN";
pub const INPUT_IMAGE_NAME: &str = "INPUT_IMAGE_NAME";
pub const JBI_REQUEST_TIMEOUT: &str = "JBI_REQUEST_TIMEOUT";
pub const JBI_STATUS_NAME: &str = "JBI_STATUS_NAME";
pub const JBI_CHECK_INTERVAL: &str = "JBI_CHECK_INTERVAL";
pub const JBI_MAXIMUM_WAIT_TIME: &str = "JBI_MAXIMUM_WAIT_TIME";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("INPUT_GITHUB_TOKEN or GITHUB_TOKEN is required")]
    MissingToken,

    #[error("{name} is not a valid duration ({value:?}): {reason}")]
    InvalidDuration {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

#[derive(Clone, PartialEq)]
pub struct Config {
    pub repository_owner: String,
    pub repository: String,
    pub ref_name: String,
    pub token: String,
    pub image_name: String,
    pub api_url: String,
    pub status_name: String,
    pub request_timeout: Duration,
    pub check_interval: Duration,
    pub maximum_wait_time: Duration,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("repository_owner", &self.repository_owner)
            .field("repository", &self.repository)
            .field("ref_name", &self.ref_name)
            .field("token", &"***")
            .field("image_name", &self.image_name)
            .field("api_url", &self.api_url)
            .field("status_name", &self.status_name)
            .field("request_timeout", &self.request_timeout)
            .field("check_interval", &self.check_interval)
            .field("maximum_wait_time", &self.maximum_wait_time)
            .finish()
    }
}

pub fn env_replacer(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn non_empty(replacer: fn(&str) -> Option<String>, name: &str) -> Option<String> {
    replacer(name).filter(|value| !value.is_empty())
}

fn required(replacer: fn(&str) -> Option<String>, name: &'static str) -> Result<String, ConfigError> {
    non_empty(replacer, name).ok_or(ConfigError::Missing(name))
}

fn duration(
    replacer: fn(&str) -> Option<String>,
    name: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match non_empty(replacer, name) {
        Some(value) => {
            humantime::parse_duration(value.trim()).map_err(|e| ConfigError::InvalidDuration {
                name,
                value,
                reason: e.to_string(),
            })
        }
        None => Ok(default),
    }
}

/// Reads the action configuration through `replacer`; token fallback and range checks
/// are left to [`Config::validate`].
pub fn load_config(replacer: fn(&str) -> Option<String>) -> Result<Config, ConfigError> {
    Ok(Config {
        repository_owner: required(replacer, GITHUB_REPOSITORY_OWNER)?,
        repository: required(replacer, GITHUB_REPOSITORY)?,
        ref_name: required(replacer, GITHUB_REF_NAME)?,
        token: non_empty(replacer, INPUT_GITHUB_TOKEN)
            .or_else(|| non_empty(replacer, GITHUB_TOKEN))
            .unwrap_or_default(),
        image_name: required(replacer, INPUT_IMAGE_NAME)?,
        api_url: non_empty(replacer, GITHUB_API_URL)
            .unwrap_or_else(|| String::from(DEFAULT_API_URL)),
        status_name: non_empty(replacer, JBI_STATUS_NAME)
            .unwrap_or_else(|| String::from(DEFAULT_STATUS_NAME)),
        request_timeout: duration(replacer, JBI_REQUEST_TIMEOUT, DEFAULT_REQUEST_TIMEOUT)?,
        check_interval: duration(replacer, JBI_CHECK_INTERVAL, DEFAULT_CHECK_INTERVAL)?,
        maximum_wait_time: duration(replacer, JBI_MAXIMUM_WAIT_TIME, DEFAULT_MAXIMUM_WAIT_TIME)?,
    })
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            (GITHUB_REPOSITORY_OWNER, &self.repository_owner),
            (GITHUB_REPOSITORY, &self.repository),
            (GITHUB_REF_NAME, &self.ref_name),
            (INPUT_IMAGE_NAME, &self.image_name),
        ];
        for (name, value) in required {
            if value.is_empty() {
                return Err(ConfigError::Missing(name));
            }
        }
        if self.token.is_empty() {
            return Err(ConfigError::MissingToken);
        }

        let durations = [
            (JBI_REQUEST_TIMEOUT, self.request_timeout),
            (JBI_CHECK_INTERVAL, self.check_interval),
            (JBI_MAXIMUM_WAIT_TIME, self.maximum_wait_time),
        ];
        for (name, value) in durations {
            if value.is_zero() {
                return Err(ConfigError::ZeroDuration(name));
            }
        }
        Ok(())
    }

    /// Repository name without the `owner/` prefix GitHub Actions puts in `GITHUB_REPOSITORY`.
    pub fn repository_name(&self) -> &str {
        let owner = self.repository_owner.as_str();
        self.repository
            .strip_prefix(owner)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(&self.repository)
    }
}

#[cfg(test)]
pub fn test_config() -> Config {
    Config {
        repository_owner: String::from("octocat"),
        repository: String::from("octocat/hello-world"),
        ref_name: String::from("main"),
        token: String::from("ghp_secret"),
        image_name: String::from("myapp"),
        api_url: String::from(DEFAULT_API_URL),
        status_name: String::from(DEFAULT_STATUS_NAME),
        request_timeout: DEFAULT_REQUEST_TIMEOUT,
        check_interval: DEFAULT_CHECK_INTERVAL,
        maximum_wait_time: DEFAULT_MAXIMUM_WAIT_TIME,
    }
}
