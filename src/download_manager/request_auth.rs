// model-linker/src/download_manager/request_auth.rs

use reqwest::StatusCode;
use url::Url;

/// Tokens for the hosts that require them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Credentials {
    pub huggingface_token: Option<String>,
    pub civitai_api_key: Option<String>,
}

impl Credentials {
    /// Per-request tokens take precedence over configured ones.
    pub fn overridden_by(&self, huggingface_token: Option<String>, civitai_api_key: Option<String>) -> Self {
        let pick = |request: Option<String>, configured: &Option<String>| {
            request
                .filter(|t| !t.trim().is_empty())
                .or_else(|| configured.clone())
        };
        Self {
            huggingface_token: pick(huggingface_token, &self.huggingface_token),
            civitai_api_key: pick(civitai_api_key, &self.civitai_api_key),
        }
    }
}

/// URL and bearer token actually used for a download.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizedRequest {
    pub url: String,
    pub bearer: Option<String>,
}

pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
}

fn is_host(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{}", domain))
}

/// HuggingFace takes a bearer header; CivitAI a `token` query parameter.
pub fn authorize(url: &str, credentials: &Credentials) -> AuthorizedRequest {
    let unchanged = AuthorizedRequest { url: url.to_string(), bearer: None };
    let Ok(mut parsed) = Url::parse(url) else {
        return unchanged;
    };
    let host = parsed.host_str().unwrap_or("").to_lowercase();

    if is_host(&host, "huggingface.co") {
        return AuthorizedRequest {
            url: url.to_string(),
            bearer: credentials.huggingface_token.clone(),
        };
    }

    if is_host(&host, "civitai.com") {
        if let Some(key) = &credentials.civitai_api_key {
            let has_token = parsed.query_pairs().any(|(name, _)| name == "token");
            if !has_token {
                parsed.query_pairs_mut().append_pair("token", key);
                return AuthorizedRequest { url: parsed.to_string(), bearer: None };
            }
        }
    }
    unchanged
}

/// Last path segment of the URL, percent-decoded.
pub fn filename_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let decoded = urlencoding::decode(last)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| last.to_string());
    if decoded.is_empty() || decoded == "." || decoded == ".." || decoded.contains(['/', '\\']) {
        return None;
    }
    Some(decoded)
}

/// Human-readable reason for a failed response.
pub fn describe_http_failure(status: StatusCode, host: &str) -> String {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => format!(
            "Authentication required for {}. Provide an API token for this source (HTTP {})",
            host,
            status.as_u16()
        ),
        StatusCode::NOT_FOUND => format!("File not found on {} (HTTP 404)", host),
        other => format!("HTTP error {}", other),
    }
}
