use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request error: {0}")]
    Request(#[source] reqwest::Error),

    #[error("status code is {0}, expected 200")]
    Status(u16),

    #[error("json decode error: {0}")]
    Decode(#[source] serde_json::Error),
}

pub fn build_request(
    client: &reqwest::Client,
    url: &str,
    headers: &[(&str, String)],
    timeout: Duration,
) -> Result<reqwest::Request, FetchError> {
    let mut builder = client.get(url).timeout(timeout);
    for (key, value) in headers {
        builder = builder.header(*key, value);
    }
    builder.build().map_err(FetchError::Request)
}

fn handle_status(r: Result<reqwest::Response, reqwest::Error>) -> Result<reqwest::Response, FetchError> {
    let r = r.map_err(FetchError::Request)?;
    let status = r.status().as_u16();
    if status == 200 {
        Ok(r)
    } else {
        Err(FetchError::Status(status))
    }
}

async fn resp_to_json<T: serde::de::DeserializeOwned>(r: reqwest::Response) -> Result<T, FetchError> {
    let body = r.bytes().await.map_err(FetchError::Request)?;
    serde_json::from_slice::<T>(&body).map_err(FetchError::Decode)
}

/// Sends `request` and decodes a 200 body as `T`; the connection is released on every path.
pub async fn request<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    request: reqwest::Request,
) -> Result<T, FetchError> {
    let response = handle_status(client.execute(request).await)?;
    resp_to_json::<T>(response).await
}

#[cfg(test)]
mod utils_tests {
    use super::*;

    #[test]
    fn build_request_applies_headers_and_timeout() {
        let client = reqwest::Client::new();
        let headers = [
            ("Accept", String::from("application/json")),
            ("X-Custom", String::from("yes")),
        ];
        let request = build_request(
            &client,
            "https://api.example.com/thing",
            &headers,
            Duration::from_secs(3),
        )
        .unwrap();

        assert_eq!(request.method(), reqwest::Method::GET);
        assert_eq!(request.url().as_str(), "https://api.example.com/thing");
        assert_eq!(request.headers()["Accept"], "application/json");
        assert_eq!(request.headers()["X-Custom"], "yes");
        assert_eq!(request.timeout(), Some(&Duration::from_secs(3)));
    }

    #[test]
    fn build_request_rejects_invalid_url() {
        let client = reqwest::Client::new();
        let result = build_request(&client, "not a url", &[], Duration::from_secs(1));
        assert!(matches!(result, Err(FetchError::Request(_))));
    }

    #[test]
    fn decode_error_keeps_cause() {
        let cause = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let message = FetchError::Decode(cause).to_string();
        assert!(message.starts_with("json decode error: EOF"), "{message}");
    }

    #[test]
    fn status_error_message() {
        assert_eq!(
            FetchError::Status(404).to_string(),
            "status code is 404, expected 200"
        );
    }
}
