//! Scripted mock services for testing
//!
//! These mirror the trait/mock pairing of the storage layer: every
//! service trait has an in-memory implementation that records calls and
//! returns scripted responses, so pipeline behavior can be tested
//! without network access.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{
    ImageSearch, ObjectStorage, SearchGenerator, ServiceError, ServiceResult, SpeechSynthesizer,
    TextGenerator,
};

fn scripted(result: &Result<String, String>, service: &'static str) -> ServiceResult<String> {
    match result {
        Ok(text) => Ok(text.clone()),
        Err(reason) => Err(ServiceError::bad_response(service, reason.clone())),
    }
}

/// Mock text generator with substring-keyed response rules
///
/// Rules match on prompt content, so a single mock can serve the
/// pipeline's distinct generation calls (script, cleanup, summary,
/// title, image query, topics) without depending on call order.
#[derive(Default)]
pub struct MockTextGenerator {
    rules: Mutex<Vec<(String, Result<String, String>)>>,
    default_response: Mutex<String>,
    prompts: Mutex<Vec<String>>,
    fail_all: AtomicBool,
}

impl MockTextGenerator {
    /// Create a mock that echoes a fixed default
    pub fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            default_response: Mutex::new(String::from("mock generated text")),
            prompts: Mutex::new(Vec::new()),
            fail_all: AtomicBool::new(false),
        }
    }

    /// Set the response used when no rule matches
    pub fn with_default(self, response: impl Into<String>) -> Self {
        *self.default_response.lock().unwrap() = response.into();
        self
    }

    /// Respond with `response` to prompts containing `marker`
    pub fn respond_when(self, marker: impl Into<String>, response: impl Into<String>) -> Self {
        self.rules
            .lock()
            .unwrap()
            .push((marker.into(), Ok(response.into())));
        self
    }

    /// Fail prompts containing `marker`
    pub fn fail_when(self, marker: impl Into<String>) -> Self {
        self.rules
            .lock()
            .unwrap()
            .push((marker.into(), Err(String::from("scripted failure"))));
        self
    }

    /// Fail every call
    pub fn fail_all(self) -> Self {
        self.fail_all.store(true, Ordering::SeqCst);
        self
    }

    /// Prompts received so far
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate(&self, prompt: &str) -> ServiceResult<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        if self.fail_all.load(Ordering::SeqCst) {
            return Err(ServiceError::bad_response("mock-llm", "scripted failure"));
        }

        let rules = self.rules.lock().unwrap();
        for (marker, result) in rules.iter() {
            if prompt.contains(marker.as_str()) {
                return scripted(result, "mock-llm");
            }
        }

        Ok(self.default_response.lock().unwrap().clone())
    }
}

/// Mock search-augmented generator
pub struct MockSearchGenerator {
    response: Mutex<Result<String, String>>,
    queries: Mutex<Vec<(String, String)>>,
}

impl MockSearchGenerator {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: Mutex::new(Ok(response.into())),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            response: Mutex::new(Err(String::from("scripted failure"))),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// (query, instruction) pairs received so far
    pub fn queries(&self) -> Vec<(String, String)> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchGenerator for MockSearchGenerator {
    async fn search_synthesize(&self, query: &str, instruction: &str) -> ServiceResult<String> {
        self.queries
            .lock()
            .unwrap()
            .push((query.to_string(), instruction.to_string()));
        scripted(&self.response.lock().unwrap(), "mock-search")
    }
}

/// Mock speech synthesizer
pub struct MockSpeechSynthesizer {
    audio: Mutex<Result<Vec<u8>, String>>,
    requests: Mutex<Vec<(String, String)>>,
}

impl MockSpeechSynthesizer {
    /// Return the given payload for every synthesis call
    pub fn new(audio: Vec<u8>) -> Self {
        Self {
            audio: Mutex::new(Ok(audio)),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            audio: Mutex::new(Err(String::from("scripted failure"))),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// (text, voice_id) pairs received so far
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSpeechSynthesizer {
    async fn synthesize(&self, text: &str, voice_id: &str) -> ServiceResult<Bytes> {
        self.requests
            .lock()
            .unwrap()
            .push((text.to_string(), voice_id.to_string()));
        match &*self.audio.lock().unwrap() {
            Ok(bytes) => Ok(Bytes::from(bytes.clone())),
            Err(reason) => Err(ServiceError::bad_response("mock-tts", reason.clone())),
        }
    }
}

/// Mock image search
pub struct MockImageSearch {
    result: Mutex<Result<Option<String>, String>>,
    queries: Mutex<Vec<String>>,
}

impl MockImageSearch {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            result: Mutex::new(Ok(Some(url.into()))),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self {
            result: Mutex::new(Ok(None)),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            result: Mutex::new(Err(String::from("scripted failure"))),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageSearch for MockImageSearch {
    async fn find_landscape_photo(&self, query: &str) -> ServiceResult<Option<String>> {
        self.queries.lock().unwrap().push(query.to_string());
        match &*self.result.lock().unwrap() {
            Ok(url) => Ok(url.clone()),
            Err(reason) => Err(ServiceError::bad_response("mock-images", reason.clone())),
        }
    }
}

/// One upload recorded by [`MockObjectStorage`]
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub folder: String,
    pub key: String,
    pub content_type: String,
    pub size: usize,
}

/// Mock object storage recording uploads
#[derive(Default)]
pub struct MockObjectStorage {
    uploads: Mutex<Vec<StoredObject>>,
    fail: AtomicBool,
}

impl MockObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let storage = Self::default();
        storage.fail.store(true, Ordering::SeqCst);
        storage
    }

    pub fn uploads(&self) -> Vec<StoredObject> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStorage for MockObjectStorage {
    async fn upload(
        &self,
        bytes: Bytes,
        folder: &str,
        key: &str,
        content_type: &str,
    ) -> ServiceResult<String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::bad_response("mock-storage", "scripted failure"));
        }

        self.uploads.lock().unwrap().push(StoredObject {
            folder: folder.to_string(),
            key: key.to_string(),
            content_type: content_type.to_string(),
            size: bytes.len(),
        });

        Ok(format!("https://cdn.test/{folder}/{key}"))
    }
}
