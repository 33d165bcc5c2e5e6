// API client module: a small blocking HTTP client for the Aliyun OSS REST
// API. Every call is a single signed request; uploads stream the file body
// from disk. Calls are synchronous because the uploader processes files one
// at a time.

use std::fs::File;
use std::path::Path;

use chrono::Utc;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::blocking::{Body, Client, RequestBuilder, Response};
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, DATE, ETAG, LAST_MODIFIED};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::config::OssConfig;
use crate::error::OssError;
use crate::signer::{http_date, SignedRequest, Signer};
use crate::store::{
    BucketInfo, HeadOutcome, ListPage, ListQuery, ObjectHead, ObjectMeta, ObjectStore, PutOutcome,
};

/// Characters left as-is in object key paths.
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

/// Blocking OSS client bound to one bucket.
#[derive(Clone)]
pub struct OssClient {
    http: Client,
    config: OssConfig,
    signer: Signer,
    scheme: String,
    host: String,
}

impl std::fmt::Debug for OssClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OssClient")
            .field("bucket", &self.config.bucket)
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .finish()
    }
}

impl OssClient {
    /// Build a client from a validated configuration.
    pub fn new(config: OssConfig) -> Result<Self, OssError> {
        let http = Client::builder().timeout(config.timeout()).build()?;
        let (scheme, host) = endpoint_host(&config, true);
        let signer = Signer::new(&config.access_key_id, &config.access_key_secret);
        Ok(OssClient {
            http,
            config,
            signer,
            scheme,
            host,
        })
    }

    fn bucket_base(&self) -> String {
        format!("{}://{}.{}", self.scheme, self.config.bucket, self.host)
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.bucket_base(), encode_key(key))
    }

    fn object_resource(&self, key: &str) -> String {
        format!("/{}/{}", self.config.bucket, key)
    }

    /// Build a signed request. `resource` is the canonicalized resource and
    /// `content_type` must match the header sent with the body.
    fn request(
        &self,
        method: Method,
        url: &str,
        resource: &str,
        content_type: Option<&str>,
    ) -> Result<RequestBuilder, OssError> {
        let date = http_date(Utc::now());
        let authorization = self.signer.authorization(&SignedRequest {
            verb: method.as_str(),
            content_type: content_type.unwrap_or_default(),
            date: &date,
            resource,
            ..Default::default()
        })?;

        debug!(method = %method, url, "sending OSS request");
        let mut builder = self
            .http
            .request(method, url)
            .header(DATE, date)
            .header(AUTHORIZATION, authorization);
        if let Some(content_type) = content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        Ok(builder)
    }
}

impl ObjectStore for OssClient {
    fn put_file(&self, key: &str, path: &Path) -> Result<PutOutcome, OssError> {
        let file = File::open(path).map_err(|source| OssError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let content_type = content_type_for(path);

        let res = self
            .request(
                Method::PUT,
                &self.object_url(key),
                &self.object_resource(key),
                Some(&content_type),
            )?
            .body(Body::from(file))
            .send()?;
        let res = into_result(res)?;

        Ok(PutOutcome {
            etag: header_string(&res, ETAG).map(|e| e.trim_matches('"').to_string()),
        })
    }

    fn head(&self, key: &str) -> Result<HeadOutcome, OssError> {
        let res = self
            .request(Method::HEAD, &self.object_url(key), &self.object_resource(key), None)?
            .send()?;

        match res.status() {
            StatusCode::NOT_FOUND => Ok(HeadOutcome::NotFound),
            status if status.is_success() => Ok(HeadOutcome::Found(ObjectHead {
                size: header_string(&res, CONTENT_LENGTH).and_then(|v| v.parse().ok()),
                etag: header_string(&res, ETAG).map(|e| e.trim_matches('"').to_string()),
                last_modified: header_string(&res, LAST_MODIFIED),
            })),
            status => Err(OssError::Status(status.as_u16())),
        }
    }

    fn list(&self, query: &ListQuery) -> Result<ListPage, OssError> {
        let mut params: Vec<(&str, String)> = vec![
            ("prefix", query.prefix.clone()),
            ("max-keys", query.max_keys.to_string()),
        ];
        if let Some(delimiter) = &query.delimiter {
            params.push(("delimiter", delimiter.clone()));
        }
        if let Some(marker) = &query.marker {
            params.push(("marker", marker.clone()));
        }

        let url = format!("{}/", self.bucket_base());
        let resource = format!("/{}/", self.config.bucket);
        let res = self
            .request(Method::GET, &url, &resource, None)?
            .query(&params)
            .send()?;
        let body = into_result(res)?.text()?;
        parse_list(&body)
    }

    fn delete(&self, key: &str) -> Result<(), OssError> {
        let res = self
            .request(Method::DELETE, &self.object_url(key), &self.object_resource(key), None)?
            .send()?;
        into_result(res)?;
        Ok(())
    }

    fn bucket_info(&self) -> Result<BucketInfo, OssError> {
        let url = format!("{}/?bucketInfo", self.bucket_base());
        let resource = format!("/{}/?bucketInfo", self.config.bucket);
        let res = self.request(Method::GET, &url, &resource, None)?.send()?;
        let body = into_result(res)?.text()?;
        parse_bucket_info(&body)
    }

    fn public_url(&self, key: &str) -> String {
        public_url(&self.config, key)
    }
}

/// Scheme and host for the bucket. A scheme written into `endpoint` wins
/// over `secure`; `internal` only affects the derived regional host.
fn endpoint_host(config: &OssConfig, honor_internal: bool) -> (String, String) {
    let default_scheme = if config.secure { "https" } else { "http" };

    match config.endpoint.as_deref() {
        Some(endpoint) => {
            let endpoint = endpoint.trim_end_matches('/');
            match endpoint.split_once("://") {
                Some((scheme, host)) => (scheme.to_string(), host.to_string()),
                None => (default_scheme.to_string(), endpoint.to_string()),
            }
        }
        None => {
            let suffix = if honor_internal && config.internal { "-internal" } else { "" };
            (
                default_scheme.to_string(),
                format!("{}{}.aliyuncs.com", config.region, suffix),
            )
        }
    }
}

/// Public URL of an object: `http(s)://<bucket>.<endpoint>/<key>`.
pub fn public_url(config: &OssConfig, key: &str) -> String {
    let (scheme, host) = endpoint_host(config, false);
    format!("{}://{}.{}/{}", scheme, config.bucket, host, encode_key(key))
}

fn encode_key(key: &str) -> String {
    utf8_percent_encode(key, KEY_ENCODE_SET).to_string()
}

fn header_string(res: &Response, name: reqwest::header::HeaderName) -> Option<String> {
    res.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Guess a `Content-Type` from the file extension.
pub fn content_type_for(path: &Path) -> String {
    mime_guess::from_path(path).first_or_octet_stream().to_string()
}

fn into_result(res: Response) -> Result<Response, OssError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().unwrap_or_default();
    Err(parse_error(status.as_u16(), &body))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorXml {
    code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    request_id: String,
}

fn parse_error(status: u16, body: &str) -> OssError {
    match quick_xml::de::from_str::<ErrorXml>(body) {
        Ok(err) => OssError::Service {
            status,
            code: err.code,
            message: err.message,
            request_id: err.request_id,
        },
        Err(_) => OssError::Status(status),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketResultXml {
    #[serde(default)]
    is_truncated: bool,
    #[serde(default)]
    next_marker: Option<String>,
    #[serde(default)]
    contents: Vec<ContentsXml>,
    #[serde(default)]
    common_prefixes: Vec<CommonPrefixXml>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContentsXml {
    key: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    last_modified: String,
    #[serde(rename = "ETag", default)]
    etag: String,
    #[serde(default)]
    storage_class: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CommonPrefixXml {
    prefix: String,
}

fn parse_list(body: &str) -> Result<ListPage, OssError> {
    let result: ListBucketResultXml =
        quick_xml::de::from_str(body).map_err(|e| OssError::Xml(e.to_string()))?;

    Ok(ListPage {
        objects: result
            .contents
            .into_iter()
            .map(|c| ObjectMeta {
                key: c.key,
                size: c.size,
                last_modified: c.last_modified,
                etag: c.etag.trim_matches('"').to_string(),
                storage_class: c.storage_class,
            })
            .collect(),
        prefixes: result.common_prefixes.into_iter().map(|p| p.prefix).collect(),
        is_truncated: result.is_truncated,
        next_marker: result.next_marker.filter(|m| !m.is_empty()),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BucketInfoXml {
    bucket: BucketXml,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BucketXml {
    name: String,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    creation_date: Option<String>,
    #[serde(default)]
    extranet_endpoint: Option<String>,
    #[serde(default)]
    intranet_endpoint: Option<String>,
    #[serde(default)]
    storage_class: Option<String>,
    #[serde(default)]
    access_control_list: Option<AccessControlListXml>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AccessControlListXml {
    #[serde(default)]
    grant: Option<String>,
}

fn parse_bucket_info(body: &str) -> Result<BucketInfo, OssError> {
    let info: BucketInfoXml =
        quick_xml::de::from_str(body).map_err(|e| OssError::Xml(e.to_string()))?;
    let bucket = info.bucket;
    Ok(BucketInfo {
        name: bucket.name,
        location: bucket.location,
        creation_date: bucket.creation_date,
        extranet_endpoint: bucket.extranet_endpoint,
        intranet_endpoint: bucket.intranet_endpoint,
        storage_class: bucket.storage_class,
        acl: bucket.access_control_list.and_then(|acl| acl.grant),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> OssConfig {
        OssConfig::new("oss-cn-hangzhou", "test-key-id", "test-key-secret", "test-bucket")
    }

    #[test]
    fn test_public_url_defaults_to_https_region_host() {
        assert_eq!(
            public_url(&config(), "test/file.txt"),
            "https://test-bucket.oss-cn-hangzhou.aliyuncs.com/test/file.txt"
        );
    }

    #[test]
    fn test_public_url_http_when_insecure() {
        let config = OssConfig {
            secure: false,
            ..config()
        };
        assert!(public_url(&config, "test/file.txt").starts_with("http://"));
    }

    #[test]
    fn test_public_url_custom_endpoint() {
        let config = OssConfig {
            endpoint: Some("custom.endpoint.com".into()),
            ..config()
        };
        assert_eq!(
            public_url(&config, "test/file.txt"),
            "https://test-bucket.custom.endpoint.com/test/file.txt"
        );

        let config = OssConfig {
            endpoint: Some("http://cdn.example.com/".into()),
            ..config
        };
        assert_eq!(public_url(&config, "a.js"), "http://test-bucket.cdn.example.com/a.js");
    }

    #[test]
    fn test_public_url_encodes_key() {
        assert_eq!(
            public_url(&config(), "docs/my file+1.pdf"),
            "https://test-bucket.oss-cn-hangzhou.aliyuncs.com/docs/my%20file%2B1.pdf"
        );
    }

    #[test]
    fn test_internal_host_only_for_requests() {
        let config = OssConfig {
            internal: true,
            ..config()
        };
        let client = OssClient::new(config.clone()).unwrap();
        assert_eq!(client.host, "oss-cn-hangzhou-internal.aliyuncs.com");
        assert_eq!(
            client.object_url("a b.txt"),
            "https://test-bucket.oss-cn-hangzhou-internal.aliyuncs.com/a%20b.txt"
        );
        assert!(public_url(&config, "a.txt").contains("oss-cn-hangzhou.aliyuncs.com"));
    }

    #[test]
    fn test_content_type_for() {
        assert!(content_type_for(Path::new("app.js")).ends_with("/javascript"));
        assert_eq!(content_type_for(Path::new("INDEX.HTML")), "text/html");
        assert_eq!(content_type_for(Path::new("logo.svg")), "image/svg+xml");
        assert_eq!(content_type_for(Path::new("README")), "application/octet-stream");
    }

    #[test]
    fn test_parse_error_body() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<Error>
  <Code>AccessDenied</Code>
  <Message>You have no right to access this object.</Message>
  <RequestId>5C3D9175B6FC201293AD4890</RequestId>
  <HostId>test-bucket.oss-cn-hangzhou.aliyuncs.com</HostId>
</Error>"#;
        match parse_error(403, body) {
            OssError::Service {
                status,
                code,
                request_id,
                ..
            } => {
                assert_eq!(status, 403);
                assert_eq!(code, "AccessDenied");
                assert_eq!(request_id, "5C3D9175B6FC201293AD4890");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_without_body() {
        assert!(matches!(parse_error(502, ""), OssError::Status(502)));
    }

    #[test]
    fn test_parse_list() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult>
  <Name>test-bucket</Name>
  <Prefix>fun/</Prefix>
  <Marker></Marker>
  <MaxKeys>100</MaxKeys>
  <Delimiter>/</Delimiter>
  <IsTruncated>true</IsTruncated>
  <NextMarker>fun/test.jpg</NextMarker>
  <Contents>
    <Key>fun/test.jpg</Key>
    <LastModified>2012-02-24T08:42:32.000Z</LastModified>
    <ETag>"5B3C1A2E053D763E1B002CC607C5A0FE"</ETag>
    <Type>Normal</Type>
    <Size>344606</Size>
    <StorageClass>Standard</StorageClass>
    <Owner>
      <ID>0022012****</ID>
      <DisplayName>user-example</DisplayName>
    </Owner>
  </Contents>
  <CommonPrefixes>
    <Prefix>fun/movie/</Prefix>
  </CommonPrefixes>
  <CommonPrefixes>
    <Prefix>fun/music/</Prefix>
  </CommonPrefixes>
</ListBucketResult>"#;

        let page = parse_list(body).unwrap();
        assert!(page.is_truncated);
        assert_eq!(page.next_marker.as_deref(), Some("fun/test.jpg"));
        assert_eq!(page.objects.len(), 1);
        assert_eq!(page.objects[0].key, "fun/test.jpg");
        assert_eq!(page.objects[0].size, 344606);
        assert_eq!(page.objects[0].etag, "5B3C1A2E053D763E1B002CC607C5A0FE");
        assert_eq!(page.prefixes, vec!["fun/movie/".to_string(), "fun/music/".to_string()]);
    }

    #[test]
    fn test_parse_empty_list() {
        let body = r#"<ListBucketResult>
  <Name>test-bucket</Name>
  <Prefix></Prefix>
  <MaxKeys>1000</MaxKeys>
  <IsTruncated>false</IsTruncated>
</ListBucketResult>"#;
        let page = parse_list(body).unwrap();
        assert!(page.objects.is_empty());
        assert!(page.prefixes.is_empty());
        assert!(!page.is_truncated);
        assert_eq!(page.next_marker, None);
    }

    #[test]
    fn test_parse_bucket_info() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<BucketInfo>
  <Bucket>
    <CreationDate>2013-07-31T10:56:21.000Z</CreationDate>
    <ExtranetEndpoint>oss-cn-hangzhou.aliyuncs.com</ExtranetEndpoint>
    <IntranetEndpoint>oss-cn-hangzhou-internal.aliyuncs.com</IntranetEndpoint>
    <Location>oss-cn-hangzhou</Location>
    <StorageClass>Standard</StorageClass>
    <Name>test-bucket</Name>
    <Owner>
      <DisplayName>username</DisplayName>
      <ID>27183473914****</ID>
    </Owner>
    <AccessControlList>
      <Grant>private</Grant>
    </AccessControlList>
  </Bucket>
</BucketInfo>"#;

        let info = parse_bucket_info(body).unwrap();
        assert_eq!(info.name, "test-bucket");
        assert_eq!(info.location.as_deref(), Some("oss-cn-hangzhou"));
        assert_eq!(info.storage_class.as_deref(), Some("Standard"));
        assert_eq!(info.acl.as_deref(), Some("private"));
    }
}
