//! Text generation contract.
//!
//! The LLM inference call is external: prompt in, text out. The production
//! adapter lives in the composition root; `MockGeneration` provides a
//! deterministic double for agent tests.

use async_trait::async_trait;

use aftercare_core::error::Result;

/// Prompt-to-text generation service.
#[async_trait]
pub trait TextGeneration: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Test double
// ---------------------------------------------------------------------------

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use aftercare_core::error::AftercareError;

/// Deterministic generation double recording prompts and counting calls.
#[derive(Default)]
pub struct MockGeneration {
    reply: String,
    fail: bool,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockGeneration {
    /// A mock returning the given reply on every call.
    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            fail: false,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A mock that fails every call.
    pub fn failing() -> Self {
        Self {
            reply: String::new(),
            fail: true,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Number of times `generate` was invoked.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received so far, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TextGeneration for MockGeneration {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if self.fail {
            return Err(AftercareError::Generation(
                "mock generation unavailable".to_string(),
            ));
        }
        Ok(self.reply.clone())
    }
}
