//! Common test utilities

#![allow(dead_code)]

use std::sync::Arc;

use sori::dispatch::Dispatcher;
use sori::models::{Category, GenerationMode, Scheduler, Topic};
use sori::notify::RunNotifier;
use sori::pipeline::EpisodePipeline;
use sori::services::mock::{
    MockImageSearch, MockObjectStorage, MockSearchGenerator, MockSpeechSynthesizer,
    MockTextGenerator,
};
use sori::storage::{CategoryRepository, MemoryDatabase, SchedulerRepository};

/// Mock services plus an in-memory store, wired the way `main` wires
/// the real clients
pub struct Harness {
    pub text: Arc<MockTextGenerator>,
    pub search: Arc<MockSearchGenerator>,
    pub tts: Arc<MockSpeechSynthesizer>,
    pub images: Arc<MockImageSearch>,
    pub storage: Arc<MockObjectStorage>,
    pub store: Arc<MemoryDatabase>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            text: Arc::new(MockTextGenerator::new().with_default("A generated script.")),
            search: Arc::new(MockSearchGenerator::new("search synthesis")),
            tts: Arc::new(MockSpeechSynthesizer::new(vec![0u8; 16_000 * 60])),
            images: Arc::new(MockImageSearch::new("https://img.test/cover.jpg")),
            storage: Arc::new(MockObjectStorage::new()),
            store: Arc::new(MemoryDatabase::new()),
        }
    }

    pub fn with_text(mut self, text: MockTextGenerator) -> Self {
        self.text = Arc::new(text);
        self
    }

    pub fn pipeline(&self) -> EpisodePipeline {
        EpisodePipeline::new(
            self.text.clone(),
            self.search.clone(),
            self.tts.clone(),
            self.images.clone(),
            self.storage.clone(),
            self.store.clone(),
        )
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            self.store.clone(),
            Arc::new(self.pipeline()),
            Arc::new(RunNotifier::disabled()),
        )
    }

    /// Insert the standard test category and return it
    pub fn seed_category(&self) -> Category {
        let category = create_test_category();
        self.store.insert_category(&category).unwrap();
        category
    }

    pub fn seed_scheduler(&self, scheduler: &Scheduler) {
        self.store.insert_scheduler(scheduler).unwrap();
    }
}

/// Create a test category with default values
pub fn create_test_category() -> Category {
    Category {
        id: "cat-tech".to_string(),
        name: "Tech Digest".to_string(),
        paid: false,
        presenter_name: "Sujin".to_string(),
        presenter_persona: "curious, plain-spoken technology commentator".to_string(),
        voice_id: "voice-sujin-1".to_string(),
    }
}

/// Create a single-mode scheduler bound to the test category
pub fn create_single_scheduler(prompt: &str) -> Scheduler {
    let mut scheduler = Scheduler::new("cat-tech", GenerationMode::Single, "0 9 * * *");
    scheduler.prompt = prompt.to_string();
    scheduler
}

/// Create a list-mode scheduler with the given topic titles
pub fn create_list_scheduler(titles: &[&str]) -> Scheduler {
    let mut scheduler = Scheduler::new("cat-tech", GenerationMode::List, "0 9 * * *");
    scheduler.topics = titles.iter().map(|t| Topic::new(*t)).collect();
    scheduler
}
