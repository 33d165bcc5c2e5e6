// Shared fixtures for integration tests: an in-memory bucket and a prompter
// that replays canned selections.
#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use oss_uploader::error::OssError;
use oss_uploader::store::{
    BucketInfo, HeadOutcome, ListPage, ListQuery, ObjectHead, ObjectMeta, ObjectStore, PutOutcome,
};
use oss_uploader::ui::Prompter;

pub const BASE_URL: &str = "https://test-bucket.oss-cn-hangzhou.aliyuncs.com";

/// Bucket kept in memory. Keys listed in `fail_put` / `fail_head` return a
/// service error for that call.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    fail_put: BTreeSet<String>,
    fail_head: BTreeSet<String>,
    calls: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(self, key: &str, body: &[u8]) -> Self {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), body.to_vec());
        self
    }

    pub fn failing_put(mut self, key: &str) -> Self {
        self.fail_put.insert(key.to_string());
        self
    }

    pub fn failing_head(mut self, key: &str) -> Self {
        self.fail_head.insert(key.to_string());
        self
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn body(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    /// Calls in order, e.g. `"PUT a.js"`, `"HEAD a.js"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

fn service_error(code: &str) -> OssError {
    OssError::Service {
        status: 500,
        code: code.to_string(),
        message: "injected failure".to_string(),
        request_id: "test".to_string(),
    }
}

impl ObjectStore for MemoryStore {
    fn put_file(&self, key: &str, path: &Path) -> Result<PutOutcome, OssError> {
        self.record(format!("PUT {key}"));
        if self.fail_put.contains(key) {
            return Err(service_error("InternalError"));
        }
        let body = fs::read(path).map_err(|source| OssError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let etag = format!("{:08x}", body.len());
        self.objects.lock().unwrap().insert(key.to_string(), body);
        Ok(PutOutcome { etag: Some(etag) })
    }

    fn head(&self, key: &str) -> Result<HeadOutcome, OssError> {
        self.record(format!("HEAD {key}"));
        if self.fail_head.contains(key) {
            return Err(OssError::Status(403));
        }
        Ok(match self.objects.lock().unwrap().get(key) {
            Some(body) => HeadOutcome::Found(ObjectHead {
                size: Some(body.len() as u64),
                ..Default::default()
            }),
            None => HeadOutcome::NotFound,
        })
    }

    fn list(&self, query: &ListQuery) -> Result<ListPage, OssError> {
        self.record(format!("LIST {}", query.prefix));
        let objects = self.objects.lock().unwrap();
        let mut page = ListPage::default();

        let after_marker = |key: &String| query.marker.as_ref().map_or(true, |m| key > m);
        let in_range = |key: &String| key.starts_with(&query.prefix) && after_marker(key);
        for (key, body) in objects.iter().filter(|(k, _)| in_range(k)) {
            let rest = &key[query.prefix.len()..];
            match query.delimiter.as_deref().and_then(|d| rest.find(d).map(|i| (d, i))) {
                Some((delimiter, idx)) => {
                    let prefix = format!("{}{}{}", query.prefix, &rest[..idx], delimiter);
                    if !page.prefixes.contains(&prefix) {
                        page.prefixes.push(prefix);
                    }
                }
                None => page.objects.push(ObjectMeta {
                    key: key.clone(),
                    size: body.len() as u64,
                    ..Default::default()
                }),
            }
        }
        Ok(page)
    }

    fn delete(&self, key: &str) -> Result<(), OssError> {
        self.record(format!("DELETE {key}"));
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    fn bucket_info(&self) -> Result<BucketInfo, OssError> {
        Ok(BucketInfo {
            name: "test-bucket".to_string(),
            location: Some("oss-cn-hangzhou".to_string()),
            ..Default::default()
        })
    }

    fn public_url(&self, key: &str) -> String {
        format!("{BASE_URL}/{key}")
    }
}

/// Answers prompts by label from a fixed script and records what it saw.
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    pub menus: Vec<Vec<String>>,
}

impl ScriptedPrompter {
    /// Each answer is matched against the menu labels by substring.
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            menus: Vec::new(),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn select(
        &mut self,
        _prompt: &str,
        items: &[String],
        _default: usize,
    ) -> anyhow::Result<usize> {
        self.menus.push(items.to_vec());
        let answer = self
            .answers
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("prompt script exhausted"))?;
        items
            .iter()
            .position(|item| item.contains(&answer))
            .ok_or_else(|| anyhow::anyhow!("no menu entry for {answer:?}: {items:?}"))
    }
}

/// Write `relative` under `root` with `body`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, body: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, body).unwrap();
}
