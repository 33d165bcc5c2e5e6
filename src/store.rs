//! The object-storage operations the uploader and browser depend on.
//!
//! [`crate::api::OssClient`] talks to the real service; tests substitute an
//! in-memory implementation.

use std::path::Path;

use serde::Serialize;

use crate::error::OssError;

/// OSS rejects list requests above this page size.
pub const MAX_KEYS_LIMIT: u32 = 1000;

/// Metadata returned by a successful HEAD.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectHead {
    pub size: Option<u64>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

/// Outcome of an existence check. Transport and permission failures are
/// reported as errors, not as `NotFound`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadOutcome {
    Found(ObjectHead),
    NotFound,
}

/// Result of a PUT.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOutcome {
    pub etag: Option<String>,
}

/// One object in a list response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    pub last_modified: String,
    pub etag: String,
    pub storage_class: String,
}

/// Parameters of a single list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub prefix: String,
    pub delimiter: Option<String>,
    pub marker: Option<String>,
    pub max_keys: u32,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            delimiter: None,
            marker: None,
            max_keys: MAX_KEYS_LIMIT,
        }
    }
}

impl ListQuery {
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    /// Group keys by `/` so sub-directories come back as common prefixes.
    pub fn directories(mut self) -> Self {
        self.delimiter = Some("/".to_string());
        self
    }

    pub fn max_keys(mut self, max_keys: u32) -> Self {
        self.max_keys = max_keys.clamp(1, MAX_KEYS_LIMIT);
        self
    }
}

/// One page of list results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub objects: Vec<ObjectMeta>,
    /// Common prefixes, each ending in the delimiter.
    pub prefixes: Vec<String>,
    pub is_truncated: bool,
    pub next_marker: Option<String>,
}

/// Bucket metadata returned by `GET /?bucketInfo`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BucketInfo {
    pub name: String,
    pub location: Option<String>,
    pub creation_date: Option<String>,
    pub extranet_endpoint: Option<String>,
    pub intranet_endpoint: Option<String>,
    pub storage_class: Option<String>,
    pub acl: Option<String>,
}

/// Typed access to one bucket.
pub trait ObjectStore {
    /// Upload the file at `path` to `key`, replacing any existing object.
    fn put_file(&self, key: &str, path: &Path) -> Result<PutOutcome, OssError>;

    fn head(&self, key: &str) -> Result<HeadOutcome, OssError>;

    fn list(&self, query: &ListQuery) -> Result<ListPage, OssError>;

    fn delete(&self, key: &str) -> Result<(), OssError>;

    fn bucket_info(&self) -> Result<BucketInfo, OssError>;

    /// Public URL an uploaded object is reachable at.
    fn public_url(&self, key: &str) -> String;
}

impl<T: ObjectStore + ?Sized> ObjectStore for &T {
    fn put_file(&self, key: &str, path: &Path) -> Result<PutOutcome, OssError> {
        (**self).put_file(key, path)
    }

    fn head(&self, key: &str) -> Result<HeadOutcome, OssError> {
        (**self).head(key)
    }

    fn list(&self, query: &ListQuery) -> Result<ListPage, OssError> {
        (**self).list(query)
    }

    fn delete(&self, key: &str) -> Result<(), OssError> {
        (**self).delete(key)
    }

    fn bucket_info(&self) -> Result<BucketInfo, OssError> {
        (**self).bucket_info()
    }

    fn public_url(&self, key: &str) -> String {
        (**self).public_url(key)
    }
}

/// Follow `next_marker` until the listing is exhausted and merge the pages.
pub fn list_all<S>(store: &S, query: &ListQuery) -> Result<ListPage, OssError>
where
    S: ObjectStore + ?Sized,
{
    let mut query = query.clone();
    let mut merged = ListPage::default();

    loop {
        let page = store.list(&query)?;
        merged.objects.extend(page.objects);
        merged.prefixes.extend(page.prefixes);

        match page.next_marker.filter(|m| page.is_truncated && !m.is_empty()) {
            Some(marker) => query.marker = Some(marker),
            None => break,
        }
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Serves a fixed sequence of pages and records the markers it was asked for.
    struct PagedStore {
        pages: Vec<ListPage>,
        markers: RefCell<Vec<Option<String>>>,
    }

    impl ObjectStore for PagedStore {
        fn put_file(&self, _key: &str, _path: &Path) -> Result<PutOutcome, OssError> {
            unimplemented!()
        }

        fn head(&self, _key: &str) -> Result<HeadOutcome, OssError> {
            unimplemented!()
        }

        fn list(&self, query: &ListQuery) -> Result<ListPage, OssError> {
            let mut markers = self.markers.borrow_mut();
            let index = markers.len();
            markers.push(query.marker.clone());
            Ok(self.pages[index].clone())
        }

        fn delete(&self, _key: &str) -> Result<(), OssError> {
            unimplemented!()
        }

        fn bucket_info(&self) -> Result<BucketInfo, OssError> {
            unimplemented!()
        }

        fn public_url(&self, key: &str) -> String {
            key.to_string()
        }
    }

    fn object(key: &str) -> ObjectMeta {
        ObjectMeta {
            key: key.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_list_all_follows_markers() {
        let store = PagedStore {
            pages: vec![
                ListPage {
                    objects: vec![object("a")],
                    prefixes: vec!["d1/".into()],
                    is_truncated: true,
                    next_marker: Some("a".into()),
                },
                ListPage {
                    objects: vec![object("b")],
                    prefixes: vec!["d2/".into()],
                    is_truncated: false,
                    next_marker: None,
                },
            ],
            markers: RefCell::new(Vec::new()),
        };

        let merged = list_all(&store, &ListQuery::prefix("").directories()).unwrap();
        assert_eq!(merged.objects, vec![object("a"), object("b")]);
        assert_eq!(merged.prefixes, vec!["d1/".to_string(), "d2/".to_string()]);
        assert_eq!(*store.markers.borrow(), vec![None, Some("a".to_string())]);
    }

    #[test]
    fn test_max_keys_is_clamped() {
        assert_eq!(ListQuery::default().max_keys(5000).max_keys, MAX_KEYS_LIMIT);
        assert_eq!(ListQuery::default().max_keys(0).max_keys, 1);
        assert_eq!(ListQuery::default().max_keys(50).max_keys, 50);
    }
}
