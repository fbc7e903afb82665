//! SimpleTex formula recognition with signed request headers.
//!
//! Every request carries `timestamp`, `random-str`, `app-id` and `sign`.
//! The signature is the lowercase MD5 hex of all form fields and the three
//! plain headers as `key=value`, sorted by key, joined with `&`, followed by
//! `&secret=<app secret>`.

use super::{status_error, FormulaRecognizer};
use crate::config::SimpleTexConfig;
use crate::error::ResolverError;
use async_trait::async_trait;
use md5::{Digest, Md5};
use rand::distr::Alphanumeric;
use rand::Rng;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

const NONCE_LEN: usize = 16;

/// The four auth headers of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub timestamp: String,
    pub random_str: String,
    pub app_id: String,
    pub sign: String,
}

impl SignedHeaders {
    fn pairs(&self) -> [(&'static str, &str); 4] {
        [
            ("timestamp", &self.timestamp),
            ("random-str", &self.random_str),
            ("app-id", &self.app_id),
            ("sign", &self.sign),
        ]
    }
}

/// Sign a request. Pure, so it can be checked against known digests.
pub fn sign_request(
    data: &BTreeMap<String, String>,
    app_id: &str,
    secret: &str,
    timestamp: i64,
    nonce: &str,
) -> SignedHeaders {
    let timestamp = timestamp.to_string();

    let mut fields: BTreeMap<&str, &str> = data
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    fields.insert("timestamp", &timestamp);
    fields.insert("random-str", nonce);
    fields.insert("app-id", app_id);

    let mut pre_sign = fields
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    pre_sign.push_str("&secret=");
    pre_sign.push_str(secret);

    let sign = format!("{:x}", Md5::digest(pre_sign.as_bytes()));
    SignedHeaders {
        timestamp,
        random_str: nonce.to_string(),
        app_id: app_id.to_string(),
        sign,
    }
}

fn nonce() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LEN)
        .map(char::from)
        .collect()
}

#[derive(Debug, Deserialize)]
struct LatexResponse {
    #[serde(default)]
    status: Option<bool>,
    #[serde(default)]
    res: Option<LatexResult>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LatexResult {
    #[serde(default)]
    latex: Option<String>,
}

fn parse_latex(body: &str) -> Result<String, ResolverError> {
    let parsed: LatexResponse = serde_json::from_str(body)
        .map_err(|e| ResolverError::InvalidResponse(format!("not JSON: {e}")))?;

    if parsed.status == Some(false) {
        return Err(ResolverError::Service(
            parsed.message.unwrap_or_else(|| "status false".to_string()),
        ));
    }

    parsed
        .res
        .and_then(|r| r.latex)
        .ok_or_else(|| ResolverError::InvalidResponse("missing res.latex".to_string()))
}

/// Posts images to the SimpleTex `latex_ocr` endpoint.
#[derive(Debug, Clone)]
pub struct SimpleTexRecognizer {
    client: reqwest::Client,
    config: SimpleTexConfig,
    timeout_secs: u64,
}

impl SimpleTexRecognizer {
    pub fn new(client: reqwest::Client, config: SimpleTexConfig, timeout_secs: u64) -> Self {
        Self {
            client,
            config,
            timeout_secs,
        }
    }
}

#[async_trait]
impl FormulaRecognizer for SimpleTexRecognizer {
    async fn recognize(&self, image: &[u8]) -> Result<String, ResolverError> {
        let data = BTreeMap::new();
        let headers = sign_request(
            &data,
            &self.config.app_id,
            &self.config.app_secret,
            chrono::Utc::now().timestamp(),
            &nonce(),
        );

        let form = Form::new().part("file", Part::bytes(image.to_vec()).file_name("image.png"));
        let mut request = self.client.post(&self.config.endpoint).multipart(form);
        for (name, value) in headers.pairs() {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ResolverError::from_reqwest(e, self.timeout_secs))?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| ResolverError::from_reqwest(e, self.timeout_secs))?;
        let latex = parse_latex(&body)?;
        debug!("SimpleTex recognised {} chars of LaTeX", latex.len());
        Ok(latex)
    }
}
