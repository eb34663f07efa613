//! Remote inference scanner
//!
//! Plugin-shaped interface for optional ML-inference services. A scanner
//! may return "no opinion" at any time (disabled, rate-limited, timed out,
//! malformed reply) and the orchestrator proceeds without it — an outage
//! must never block or fail message scoring.

use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::ScannerConfig;

/// An advisory opinion from an inference service.
#[derive(Debug, Clone)]
pub struct ScanOpinion {
    /// Whether the service calls the text spam
    pub is_spam: bool,
    /// Winning label score
    pub confidence: f64,
    /// Winning label
    pub label: String,
}

/// An optional, advisory-only classifier. Implementations must return
/// `None` instead of erroring; the pipeline treats `None` as "no opinion".
#[async_trait]
pub trait InferenceScanner: Send + Sync {
    /// Classify a text, or decline to.
    async fn classify(&self, text: &str) -> Option<ScanOpinion>;
}

/// Sliding-window requests-per-minute budget.
pub struct RequestBudget {
    limit: usize,
    window: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RequestBudget {
    /// Budget of `limit` requests per `window`.
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            timestamps: Mutex::new(VecDeque::new()),
        }
    }

    /// Take one request slot if the window has room.
    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut timestamps = self.timestamps.lock();
        while timestamps
            .front()
            .map(|t| now.duration_since(*t) > self.window)
            .unwrap_or(false)
        {
            timestamps.pop_front();
        }
        if timestamps.len() < self.limit {
            timestamps.push_back(now);
            true
        } else {
            false
        }
    }
}

/// Zero-shot classification response shape.
#[derive(Debug, Deserialize)]
struct ZeroShotResponse {
    labels: Vec<String>,
    scores: Vec<f64>,
}

/// Zero-shot classifier over an HTTP inference API.
pub struct ZeroShotScanner {
    config: ScannerConfig,
    client: reqwest::Client,
    budget: RequestBudget,
}

impl ZeroShotScanner {
    /// Build the scanner from configuration.
    pub fn new(config: ScannerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        let budget = RequestBudget::new(config.rpm_limit, Duration::from_secs(60));
        Self {
            config,
            client,
            budget,
        }
    }

    fn parse_response(&self, body: serde_json::Value) -> Option<ScanOpinion> {
        // Some inference APIs wrap the result in a one-element list
        let body = match body {
            serde_json::Value::Array(mut items) => items.drain(..).next()?,
            other => other,
        };
        let response: ZeroShotResponse = serde_json::from_value(body).ok()?;
        let label = response.labels.first()?.clone();
        let score = *response.scores.first()?;

        let is_spam = self.config.spam_labels.contains(&label) && score > self.config.min_score;
        Some(ScanOpinion {
            is_spam,
            confidence: score,
            label,
        })
    }
}

#[async_trait]
impl InferenceScanner for ZeroShotScanner {
    async fn classify(&self, text: &str) -> Option<ScanOpinion> {
        if !self.config.enabled || self.config.endpoint.is_empty() {
            return None;
        }
        if text.chars().count() < 10 {
            return None;
        }
        if !self.budget.try_acquire() {
            debug!("Inference budget exhausted, skipping scan");
            return None;
        }

        // Long inputs are truncated to the API's limits
        let input: String = text.chars().take(512).collect();
        let payload = serde_json::json!({
            "inputs": input,
            "parameters": {
                "candidate_labels": self.config.labels,
                "multi_label": false,
            },
        });

        let mut request = self.client.post(&self.config.endpoint).json(&payload);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                match response.json::<serde_json::Value>().await {
                    Ok(body) => self.parse_response(body),
                    Err(err) => {
                        warn!("Inference response parse failed: {err}");
                        None
                    }
                }
            }
            Ok(response) => {
                debug!(status = %response.status(), "Inference request declined");
                None
            }
            Err(err) => {
                warn!("Inference request failed: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_allows_up_to_limit() {
        let budget = RequestBudget::new(3, Duration::from_secs(60));
        assert!(budget.try_acquire());
        assert!(budget.try_acquire());
        assert!(budget.try_acquire());
        assert!(!budget.try_acquire());
    }

    #[test]
    fn budget_refills_after_the_window() {
        let budget = RequestBudget::new(1, Duration::from_millis(10));
        assert!(budget.try_acquire());
        assert!(!budget.try_acquire());
        std::thread::sleep(Duration::from_millis(20));
        assert!(budget.try_acquire());
    }

    #[tokio::test]
    async fn disabled_scanner_has_no_opinion() {
        let scanner = ZeroShotScanner::new(ScannerConfig::default());
        assert!(scanner.classify("totally suspicious text here").await.is_none());
    }

    #[tokio::test]
    async fn short_text_is_skipped() {
        let config = ScannerConfig {
            enabled: true,
            endpoint: "http://localhost:1/unreachable".to_string(),
            ..ScannerConfig::default()
        };
        let scanner = ZeroShotScanner::new(config);
        assert!(scanner.classify("short").await.is_none());
    }

    #[test]
    fn spam_label_over_threshold_is_spam() {
        let scanner = ZeroShotScanner::new(ScannerConfig::default());
        let body = serde_json::json!({
            "labels": ["casino gambling spam", "normal conversation"],
            "scores": [0.91, 0.09],
        });
        let opinion = scanner.parse_response(body).unwrap();
        assert!(opinion.is_spam);
        assert_eq!(opinion.label, "casino gambling spam");
    }

    #[test]
    fn benign_label_is_not_spam() {
        let scanner = ZeroShotScanner::new(ScannerConfig::default());
        let body = serde_json::json!({
            "labels": ["normal conversation", "casino gambling spam"],
            "scores": [0.8, 0.2],
        });
        let opinion = scanner.parse_response(body).unwrap();
        assert!(!opinion.is_spam);
    }

    #[test]
    fn list_wrapped_response_is_unwrapped() {
        let scanner = ZeroShotScanner::new(ScannerConfig::default());
        let body = serde_json::json!([{
            "labels": ["recruitment job scam"],
            "scores": [0.95],
        }]);
        let opinion = scanner.parse_response(body).unwrap();
        assert!(opinion.is_spam);
    }

    #[test]
    fn malformed_response_is_no_opinion() {
        let scanner = ZeroShotScanner::new(ScannerConfig::default());
        assert!(scanner
            .parse_response(serde_json::json!({"unexpected": true}))
            .is_none());
    }
}
