//! Coherence rating by an external generative model.

use std::sync::Arc;

use tracing::warn;

use tribunal_core::JudgeError;

use crate::{CompletionModel, LlmError, RetryPolicy};

/// Instruction sent ahead of the text being rated.
pub const COHERENCE_RATING_PROMPT: &str =
    "Score the coherence of the following text on a scale from 1 to 5. Respond with only a single number.";

/// Asks a [`CompletionModel`] for a 1-5 coherence rating.
pub struct CoherenceRater {
    model: Arc<dyn CompletionModel>,
    policy: RetryPolicy,
}

impl CoherenceRater {
    pub fn new(model: Arc<dyn CompletionModel>, policy: RetryPolicy) -> Self {
        Self { model, policy }
    }

    /// Rates `text`, returning a value in `[1, 5]`.
    ///
    /// Rate-limit errors are retried under the policy. `None` on any other
    /// error, exhausted retries, or a reply that is not a number in range.
    pub async fn rate(&self, text: &str) -> Option<f64> {
        match self.try_rate(text).await {
            Ok(rating) => Some(rating),
            Err(e) => {
                warn!("Coherence rating from {} dropped: {}", self.model.model_name(), e);
                None
            }
        }
    }

    async fn try_rate(&self, text: &str) -> Result<f64, JudgeError> {
        let prompt = format!("{}\n\n{}", COHERENCE_RATING_PROMPT, text);
        let reply = self
            .policy
            .run(|| self.model.complete(&prompt), LlmError::is_rate_limit)
            .await?;
        parse_rating(&reply).ok_or_else(|| JudgeError::ParseError(format!("not a 1-5 rating: {:?}", reply)))
    }
}

/// Parses a reply that should be a single number in `[1, 5]`.
pub fn parse_rating(reply: &str) -> Option<f64> {
    let rating: f64 = reply.trim().parse().ok()?;
    (1.0..=5.0).contains(&rating).then_some(rating)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Replays scripted replies and records the prompts it saw.
    struct ScriptedModel {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<String, LlmError>>) -> Arc<Self> {
            Arc::new(Self { replies: Mutex::new(replies.into()), prompts: Mutex::new(Vec::new()) })
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionModel for ScriptedModel {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::InvalidResponse("script exhausted".into())))
        }
    }

    fn limited() -> Result<String, LlmError> {
        Err(LlmError::RateLimited("429 Too Many Requests".into()))
    }

    #[test]
    fn parses_numbers_in_range_only() {
        assert_eq!(parse_rating(" 4\n"), Some(4.0));
        assert_eq!(parse_rating("3.5"), Some(3.5));
        assert_eq!(parse_rating("0"), None);
        assert_eq!(parse_rating("7"), None);
        assert_eq!(parse_rating("Four"), None);
        assert_eq!(parse_rating("NaN"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn sends_fixed_prompt_and_returns_rating() {
        let model = ScriptedModel::new(vec![Ok("5".into())]);
        let rater = CoherenceRater::new(model.clone(), RetryPolicy::default());

        assert_eq!(rater.rate("Clear text.").await, Some(5.0));
        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts[0], format!("{}\n\nClear text.", COHERENCE_RATING_PROMPT));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_rate_limits_then_succeeds() {
        let model = ScriptedModel::new(vec![limited(), limited(), Ok("2".into())]);
        let rater = CoherenceRater::new(model.clone(), RetryPolicy::default());
        let start = Instant::now();

        assert_eq!(rater.rate("x").await, Some(2.0));
        assert_eq!(model.calls(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_drop_the_signal() {
        let model = ScriptedModel::new(vec![limited(), limited(), limited(), Ok("4".into())]);
        let rater = CoherenceRater::new(model.clone(), RetryPolicy::default());

        assert_eq!(rater.rate("x").await, None);
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn other_errors_are_not_retried() {
        let model = ScriptedModel::new(vec![
            Err(LlmError::Api { status: 500, message: "boom".into() }),
            Ok("4".into()),
        ]);
        let rater = CoherenceRater::new(model.clone(), RetryPolicy::default());

        assert_eq!(rater.rate("x").await, None);
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_classified() {
        let model = ScriptedModel::new(vec![limited(), limited(), limited()]);
        let rater = CoherenceRater::new(model, RetryPolicy::default());
        assert!(matches!(rater.try_rate("x").await, Err(JudgeError::RateLimited(_))));

        let model = ScriptedModel::new(vec![Err(LlmError::Api { status: 503, message: "overloaded".into() })]);
        let rater = CoherenceRater::new(model, RetryPolicy::default());
        assert!(matches!(rater.try_rate("x").await, Err(JudgeError::TransientApi(_))));

        let model = ScriptedModel::new(vec![Ok("very coherent".into())]);
        let rater = CoherenceRater::new(model, RetryPolicy::default());
        assert!(matches!(rater.try_rate("x").await, Err(JudgeError::ParseError(_))));
    }
}
