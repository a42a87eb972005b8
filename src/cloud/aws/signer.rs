//! AWS Signature Version 4 request signing.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderValue, AUTHORIZATION, HOST};
use sha2::{Digest, Sha256};

use crate::cloud::RequestSigner;
use crate::config::AwsConfig;
use crate::errors::{CostError, CostResult};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Headers covered by the signature, in canonical (sorted) order.
const SIGNED_HEADERS: &[&str] = &[
    "content-type",
    "host",
    "x-amz-content-sha256",
    "x-amz-date",
    "x-amz-security-token",
    "x-amz-target",
];

#[derive(Debug, Clone)]
pub struct SigV4Signer {
    pub access_key: String,
    pub secret_key: String,
    pub session_token: Option<String>,
    pub region: String,
    pub service: String,
}

impl SigV4Signer {
    /// Signer for the Cost Explorer API, which is served from us-east-1 only.
    pub fn cost_explorer(access_key: impl Into<String>, secret_key: impl Into<String>, session_token: Option<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            session_token: session_token.filter(|t| !t.is_empty()),
            region: "us-east-1".into(),
            service: "ce".into(),
        }
    }

    /// Cost Explorer signer from configured credentials; `None` when the key pair is missing.
    pub fn from_config(config: &AwsConfig) -> Option<Self> {
        if config.access_key.is_empty() || config.secret_key.is_empty() {
            return None;
        }
        Some(Self::cost_explorer(
            config.access_key.clone(),
            config.secret_key.clone(),
            Some(config.session_token.clone()),
        ))
    }

    /// Signs with a fixed clock; two calls with the same inputs produce identical headers.
    pub fn sign_at(&self, req: &mut reqwest::Request, body: &[u8], now: DateTime<Utc>) -> CostResult<()> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let payload_hash = hex::encode(Sha256::digest(body));

        let host = host_header(req.url())?;
        let headers = req.headers_mut();
        headers.insert(HOST, header_value(&host)?);
        headers.insert("x-amz-date", header_value(&amz_date)?);
        headers.insert("x-amz-content-sha256", header_value(&payload_hash)?);
        if let Some(token) = &self.session_token {
            headers.insert("x-amz-security-token", header_value(token)?);
        }

        let (canonical_headers, signed_headers) = canonical_headers(req.headers());
        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            req.method().as_str(),
            canonical_path(req.url()),
            canonical_query(req.url()),
            canonical_headers,
            signed_headers,
            payload_hash,
        );

        let scope = format!("{date}/{}/{}/aws4_request", self.region, self.service);
        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let key = signing_key(&self.secret_key, &date, &self.region, &self.service)?;
        let signature = hex::encode(hmac(&key, string_to_sign.as_bytes())?);

        let authorization = format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            self.access_key
        );
        req.headers_mut().insert(AUTHORIZATION, header_value(&authorization)?);
        Ok(())
    }
}

impl RequestSigner for SigV4Signer {
    fn sign(&self, req: &mut reqwest::Request, body: &[u8]) -> CostResult<()> {
        self.sign_at(req, body, Utc::now())
    }
}

fn header_value(value: &str) -> CostResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| CostError::Configuration(format!("invalid header value: {e}")))
}

fn hmac(key: &[u8], data: &[u8]) -> CostResult<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| CostError::Configuration(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// `AWS4<secret> -> date -> region -> service -> "aws4_request"`.
pub fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> CostResult<Vec<u8>> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date.as_bytes())?;
    let k_region = hmac(&k_date, region.as_bytes())?;
    let k_service = hmac(&k_region, service.as_bytes())?;
    hmac(&k_service, b"aws4_request")
}

fn host_header(url: &reqwest::Url) -> CostResult<String> {
    let host = url
        .host_str()
        .ok_or_else(|| CostError::Configuration(format!("request URL has no host: {url}")))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

fn canonical_path(url: &reqwest::Url) -> String {
    match url.path() {
        "" => "/".into(),
        p => p.to_string(),
    }
}

fn canonical_query(url: &reqwest::Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (urlencoding::encode(&k).into_owned(), urlencoding::encode(&v).into_owned()))
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn canonical_headers(headers: &reqwest::header::HeaderMap) -> (String, String) {
    let mut canonical = String::new();
    let mut signed = Vec::new();
    for name in SIGNED_HEADERS {
        let Some(value) = headers.get(*name) else {
            continue;
        };
        let value = String::from_utf8_lossy(value.as_bytes());
        canonical.push_str(name);
        canonical.push(':');
        canonical.push_str(&value.split_whitespace().collect::<Vec<_>>().join(" "));
        canonical.push('\n');
        signed.push(*name);
    }
    (canonical, signed.join(";"))
}
