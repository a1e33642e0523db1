//! In-memory backends for judge tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use tribunal_inference::{ClassifierInput, Embedder, InferenceError, LabelScore, PerplexityModel, SequenceClassifier};
use tribunal_llm::{CompletionModel, LlmError};
use tribunal_search::{SearchError, SearchProvider};

type ClassifyFn = dyn Fn(&ClassifierInput<'_>) -> Vec<(&'static str, f64)> + Send + Sync;

pub struct FakeClassifier {
    respond: Option<Box<ClassifyFn>>,
    seen: Mutex<Vec<String>>,
}

impl FakeClassifier {
    pub fn with(
        respond: impl Fn(&ClassifierInput<'_>) -> Vec<(&'static str, f64)> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self { respond: Some(Box::new(respond)), seen: Mutex::new(Vec::new()) })
    }

    pub fn fixed(labels: &[(&'static str, f64)]) -> Arc<Self> {
        let labels = labels.to_vec();
        Self::with(move |_| labels.clone())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { respond: None, seen: Mutex::new(Vec::new()) })
    }

    /// Inputs seen so far; pairs are rendered as `text || text_pair`.
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl SequenceClassifier for FakeClassifier {
    fn model_id(&self) -> &str {
        "fake/classifier"
    }

    async fn classify(&self, input: ClassifierInput<'_>) -> Result<Vec<LabelScore>, InferenceError> {
        let rendered = match input {
            ClassifierInput::Text(text) => text.to_string(),
            ClassifierInput::Pair { text, text_pair } => format!("{} || {}", text, text_pair),
        };
        self.seen.lock().unwrap().push(rendered);

        let respond = self
            .respond
            .as_ref()
            .ok_or_else(|| InferenceError::Api { status: 503, message: "model is loading".into() })?;
        Ok(respond(&input)
            .into_iter()
            .map(|(label, score)| LabelScore { label: label.to_string(), score })
            .collect())
    }
}

pub struct FakeEmbedder {
    vector: Option<Vec<f32>>,
    calls: AtomicUsize,
}

impl FakeEmbedder {
    /// Embeds every text as the same vector.
    pub fn constant(vector: Vec<f32>) -> Arc<Self> {
        Arc::new(Self { vector: Some(vector), calls: AtomicUsize::new(0) })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { vector: None, calls: AtomicUsize::new(0) })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let vector = self
            .vector
            .as_ref()
            .ok_or_else(|| InferenceError::InvalidResponse("no embeddings".into()))?;
        Ok(texts.iter().map(|_| vector.clone()).collect())
    }
}

pub struct FakePerplexity {
    value: Option<f64>,
    calls: AtomicUsize,
}

impl FakePerplexity {
    pub fn fixed(value: f64) -> Arc<Self> {
        Arc::new(Self { value: Some(value), calls: AtomicUsize::new(0) })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { value: None, calls: AtomicUsize::new(0) })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PerplexityModel for FakePerplexity {
    async fn perplexity(&self, _text: &str) -> Result<f64, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.value
            .ok_or_else(|| InferenceError::Api { status: 500, message: "tgi down".into() })
    }
}

pub struct FakeSearch {
    snippets: Option<Vec<String>>,
    calls: AtomicUsize,
    last_max_results: Mutex<Option<usize>>,
}

impl FakeSearch {
    pub fn returning(snippets: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            snippets: Some(snippets.iter().map(|s| s.to_string()).collect()),
            calls: AtomicUsize::new(0),
            last_max_results: Mutex::new(None),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { snippets: None, calls: AtomicUsize::new(0), last_max_results: Mutex::new(None) })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_max_results(&self) -> Option<usize> {
        *self.last_max_results.lock().unwrap()
    }
}

#[async_trait]
impl SearchProvider for FakeSearch {
    fn name(&self) -> &str {
        "fake"
    }

    async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<String>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_max_results.lock().unwrap() = Some(max_results);
        self.snippets
            .clone()
            .ok_or_else(|| SearchError::Api { status: 500, message: "search down".into() })
    }
}

pub struct FakeCompletion {
    reply: String,
}

impl FakeCompletion {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self { reply: reply.to_string() })
    }
}

#[async_trait]
impl CompletionModel for FakeCompletion {
    fn model_name(&self) -> &str {
        "fake-rater"
    }

    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        Ok(self.reply.clone())
    }
}
