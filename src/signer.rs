//! OSS header signature (version 1).
//!
//! ```text
//! Signature = base64(hmac-sha1(secret,
//!     VERB + "\n" + Content-MD5 + "\n" + Content-Type + "\n" + Date + "\n"
//!     + CanonicalizedOSSHeaders + CanonicalizedResource))
//! Authorization: OSS <AccessKeyId>:<Signature>
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::error::OssError;

type HmacSha1 = Hmac<Sha1>;

/// The parts of a request covered by the signature.
#[derive(Debug, Clone, Default)]
pub struct SignedRequest<'a> {
    pub verb: &'a str,
    pub content_md5: &'a str,
    pub content_type: &'a str,
    pub date: &'a str,
    /// `x-oss-*` headers; any case, any order.
    pub oss_headers: &'a [(&'a str, &'a str)],
    /// `/bucket/key`, or `/bucket/` plus sub-resources for bucket calls.
    pub resource: &'a str,
}

impl SignedRequest<'_> {
    pub fn string_to_sign(&self) -> String {
        let mut headers: Vec<(String, &str)> = self
            .oss_headers
            .iter()
            .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim()))
            .filter(|(name, _)| name.starts_with("x-oss-"))
            .collect();
        headers.sort_by(|a, b| a.0.cmp(&b.0));

        let mut out = format!(
            "{}\n{}\n{}\n{}\n",
            self.verb, self.content_md5, self.content_type, self.date
        );
        for (name, value) in headers {
            out.push_str(&name);
            out.push(':');
            out.push_str(value);
            out.push('\n');
        }
        out.push_str(self.resource);
        out
    }
}

/// Signs requests with an access key pair.
#[derive(Clone)]
pub struct Signer {
    access_key_id: String,
    access_key_secret: String,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

impl Signer {
    pub fn new(access_key_id: impl Into<String>, access_key_secret: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
        }
    }

    pub fn signature(&self, request: &SignedRequest<'_>) -> Result<String, OssError> {
        let mut mac = HmacSha1::new_from_slice(self.access_key_secret.as_bytes())
            .map_err(|_| OssError::Signing)?;
        mac.update(request.string_to_sign().as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// Value for the `Authorization` header.
    pub fn authorization(&self, request: &SignedRequest<'_>) -> Result<String, OssError> {
        Ok(format!("OSS {}:{}", self.access_key_id, self.signature(request)?))
    }
}

/// RFC 1123 date as required by the `Date` header.
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
