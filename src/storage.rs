//! Azure Blob Storage uploads.
//!
//! Uploaded PDFs are written to a fixed container with the original
//! filename as the blob name. A `Put Blob` on an existing name replaces it,
//! so re-uploading a file overwrites the previous copy.
//!
//! Requests go straight to the Blob REST API and are signed with the
//! account's Shared Key (HMAC-SHA256 over the canonical request, `hmac` +
//! `sha2`), so no Azure SDK is needed.
//!
//! # Connection strings
//!
//! | Form | Example |
//! |------|---------|
//! | Account | `AccountName=acct;AccountKey=...;EndpointSuffix=core.windows.net` |
//! | Explicit endpoint | `AccountName=acct;AccountKey=...;BlobEndpoint=http://host/acct` |
//! | Azurite | `UseDevelopmentStorage=true` |

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Url;
use sha2::Sha256;

use crate::error::ChefError;

type HmacSha256 = Hmac<Sha256>;

const API_VERSION: &str = "2021-08-06";

const DEV_ACCOUNT: &str = "devstoreaccount1";
const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEV_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

/// Somewhere to persist uploaded files.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `data` to `container/blob_name`, replacing any existing blob.
    async fn upload(
        &self,
        container: &str,
        blob_name: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<()>;
}

// ============ Connection string ============

/// Parsed account settings from an Azure Storage connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageAccount {
    pub name: String,
    /// Base64-encoded account key.
    pub key: String,
    /// Blob service endpoint without a trailing slash.
    pub blob_endpoint: String,
}

impl StorageAccount {
    pub fn from_connection_string(conn: &str) -> Result<Self, ChefError> {
        let mut protocol = "https".to_string();
        let mut suffix = "core.windows.net".to_string();
        let mut name = None;
        let mut key = None;
        let mut endpoint = None;
        let mut dev = false;

        for part in conn.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (k, v) = part.split_once('=').ok_or_else(|| {
                ChefError::InvalidConnectionString(format!("segment '{}' has no '='", part))
            })?;
            match k {
                "DefaultEndpointsProtocol" => protocol = v.to_string(),
                "EndpointSuffix" => suffix = v.to_string(),
                "AccountName" => name = Some(v.to_string()),
                "AccountKey" => key = Some(v.to_string()),
                "BlobEndpoint" => endpoint = Some(v.trim_end_matches('/').to_string()),
                "UseDevelopmentStorage" => dev = v.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }

        if dev {
            return Ok(Self {
                name: DEV_ACCOUNT.to_string(),
                key: DEV_ACCOUNT_KEY.to_string(),
                blob_endpoint: endpoint.unwrap_or_else(|| DEV_BLOB_ENDPOINT.to_string()),
            });
        }

        let name = name.ok_or_else(|| {
            ChefError::InvalidConnectionString("AccountName is required".to_string())
        })?;
        let key = key.ok_or_else(|| {
            ChefError::InvalidConnectionString("AccountKey is required".to_string())
        })?;
        let blob_endpoint =
            endpoint.unwrap_or_else(|| format!("{}://{}.blob.{}", protocol, name, suffix));

        Ok(Self {
            name,
            key,
            blob_endpoint,
        })
    }
}

// ============ Azure client ============

pub struct AzureBlobStore {
    account: StorageAccount,
    client: reqwest::Client,
}

impl AzureBlobStore {
    pub fn new(account: StorageAccount) -> Self {
        Self {
            account,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_connection_string(conn: &str) -> Result<Self> {
        Ok(Self::new(StorageAccount::from_connection_string(conn)?))
    }

    /// Build a store from the connection string in environment variable `var`.
    pub fn from_env(var: &str) -> Result<Self> {
        let conn = crate::config::credential(var).ok_or_else(|| ChefError::MissingCredential {
            var: var.to_string(),
        })?;
        Self::from_connection_string(&conn)
    }

    fn blob_url(&self, container: &str, blob_name: &str) -> Result<Url> {
        let encoded = blob_name
            .split('/')
            .map(uri_encode)
            .collect::<Vec<_>>()
            .join("/");
        let raw = format!("{}/{}/{}", self.account.blob_endpoint, container, encoded);
        Url::parse(&raw).with_context(|| format!("invalid blob URL: {}", raw))
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn upload(
        &self,
        container: &str,
        blob_name: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let url = self.blob_url(container, blob_name)?;
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();

        let ms_headers = vec![
            ("x-ms-blob-type".to_string(), "BlockBlob".to_string()),
            ("x-ms-date".to_string(), date),
            ("x-ms-version".to_string(), API_VERSION.to_string()),
        ];

        let string_to_sign = put_string_to_sign(
            data.len(),
            content_type,
            &ms_headers,
            &canonical_resource(&self.account.name, url.path()),
        );
        let signature = sign(&self.account.key, &string_to_sign)?;
        let authorization = format!("SharedKey {}:{}", self.account.name, signature);

        let mut req = self
            .client
            .put(url.clone())
            .header("Authorization", authorization)
            .header("Content-Type", content_type);
        for (name, value) in &ms_headers {
            req = req.header(name.as_str(), value.as_str());
        }

        let size = data.len();
        let resp = req
            .body(data)
            .send()
            .await
            .with_context(|| format!("failed to upload blob to {}", url))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ChefError::Storage {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            }
            .into());
        }

        tracing::info!(container, blob = blob_name, bytes = size, "blob uploaded");
        Ok(())
    }
}

// ============ Shared Key helpers ============

/// `/{account}{url path}`. For path-style endpoints (Azurite) the account
/// name therefore appears twice.
fn canonical_resource(account: &str, url_path: &str) -> String {
    format!("/{}{}", account, url_path)
}

/// String-to-sign for a `Put Blob` request without query parameters.
///
/// ```text
/// VERB\nContent-Encoding\nContent-Language\nContent-Length\nContent-MD5\n
/// Content-Type\nDate\nIf-Modified-Since\nIf-Match\nIf-None-Match\n
/// If-Unmodified-Since\nRange\nCanonicalizedHeaders CanonicalizedResource
/// ```
///
/// A zero Content-Length is signed as the empty string.
fn put_string_to_sign(
    content_length: usize,
    content_type: &str,
    ms_headers: &[(String, String)],
    resource: &str,
) -> String {
    let length = if content_length == 0 {
        String::new()
    } else {
        content_length.to_string()
    };

    let mut headers: Vec<(String, String)> = ms_headers
        .iter()
        .map(|(k, v)| (k.to_lowercase(), v.trim().to_string()))
        .collect();
    headers.sort_by(|a, b| a.0.cmp(&b.0));
    let canonical_headers: String = headers
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v))
        .collect();

    format!(
        "PUT\n\n\n{}\n\n{}\n\n\n\n\n\n\n{}{}",
        length, content_type, canonical_headers, resource
    )
}

/// Base64 HMAC-SHA256 of `string_to_sign` keyed with the decoded account key.
fn sign(account_key: &str, string_to_sign: &str) -> Result<String> {
    let engine = base64::engine::general_purpose::STANDARD;
    let key = engine.decode(account_key).map_err(|e| {
        ChefError::InvalidConnectionString(format!("AccountKey is not base64: {}", e))
    })?;
    let mut mac = HmacSha256::new_from_slice(&key)
        .map_err(|e| anyhow::anyhow!("invalid HMAC key: {}", e))?;
    mac.update(string_to_sign.as_bytes());
    Ok(engine.encode(mac.finalize().into_bytes()))
}

/// Percent-encode everything except RFC 3986 unreserved characters.
fn uri_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_account_connection_string() {
        let account = StorageAccount::from_connection_string(
            "DefaultEndpointsProtocol=https;AccountName=recipes;AccountKey=a2V5;\
             EndpointSuffix=core.windows.net",
        )
        .unwrap();
        assert_eq!(account.name, "recipes");
        assert_eq!(account.key, "a2V5");
        assert_eq!(account.blob_endpoint, "https://recipes.blob.core.windows.net");
    }

    #[test]
    fn account_key_may_contain_equals() {
        let account =
            StorageAccount::from_connection_string("AccountName=a;AccountKey=abc==;").unwrap();
        assert_eq!(account.key, "abc==");
    }

    #[test]
    fn from_env_reports_missing_variable() {
        let err = AzureBlobStore::from_env("CHEFDESK_TEST_UNSET_STORAGE_CONN")
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<ChefError>(),
            Some(ChefError::MissingCredential { var }) if var == "CHEFDESK_TEST_UNSET_STORAGE_CONN"
        ));
    }

    #[test]
    fn development_storage_uses_azurite_defaults() {
        let account = StorageAccount::from_connection_string("UseDevelopmentStorage=true").unwrap();
        assert_eq!(account.name, "devstoreaccount1");
        assert_eq!(account.blob_endpoint, "http://127.0.0.1:10000/devstoreaccount1");
    }

    #[test]
    fn explicit_blob_endpoint_wins() {
        let account = StorageAccount::from_connection_string(
            "AccountName=devstoreaccount1;AccountKey=a2V5;\
             BlobEndpoint=http://azurite:10000/devstoreaccount1/",
        )
        .unwrap();
        assert_eq!(account.blob_endpoint, "http://azurite:10000/devstoreaccount1");
    }

    #[test]
    fn missing_key_is_rejected() {
        let err = StorageAccount::from_connection_string("AccountName=a").unwrap_err();
        assert!(err.to_string().contains("AccountKey"));
        assert!(StorageAccount::from_connection_string("garbage").is_err());
    }

    #[test]
    fn blob_url_encodes_filename() {
        let store = AzureBlobStore::from_connection_string("UseDevelopmentStorage=true").unwrap();
        let url = store.blob_url("pdf-uploads", "my report (v2).pdf").unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:10000/devstoreaccount1/pdf-uploads/my%20report%20%28v2%29.pdf"
        );
        assert_eq!(
            canonical_resource("devstoreaccount1", url.path()),
            "/devstoreaccount1/devstoreaccount1/pdf-uploads/my%20report%20%28v2%29.pdf"
        );
    }

    #[test]
    fn string_to_sign_layout() {
        let headers = vec![
            ("x-ms-version".to_string(), "2021-08-06".to_string()),
            ("x-ms-blob-type".to_string(), "BlockBlob".to_string()),
            ("X-MS-Date".to_string(), "Mon, 01 Jan 2024 00:00:00 GMT".to_string()),
        ];
        let sts = put_string_to_sign(42, "application/pdf", &headers, "/acct/c/b.pdf");
        assert_eq!(
            sts,
            "PUT\n\n\n42\n\napplication/pdf\n\n\n\n\n\n\n\
             x-ms-blob-type:BlockBlob\n\
             x-ms-date:Mon, 01 Jan 2024 00:00:00 GMT\n\
             x-ms-version:2021-08-06\n\
             /acct/c/b.pdf"
        );
    }

    #[test]
    fn empty_body_signs_empty_length() {
        let sts = put_string_to_sign(0, "text/plain", &[], "/a/c/b");
        assert!(sts.starts_with("PUT\n\n\n\n\ntext/plain\n"));
    }

    #[test]
    fn signature_depends_on_key() {
        let a = sign("a2V5LW9uZQ==", "payload").unwrap();
        let b = sign("a2V5LXR3bw==", "payload").unwrap();
        assert_ne!(a, b);
        assert_eq!(a, sign("a2V5LW9uZQ==", "payload").unwrap());
        // 32-byte MAC → 44 base64 chars
        assert_eq!(a.len(), 44);
        assert!(sign("not base64!", "payload").is_err());
    }
}
