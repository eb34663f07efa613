//! Statistical classifier
//!
//! Trainable text classifier over two label-separated corpora (confirmed
//! spam, confirmed legitimate). Features are unigram+bigram TF-IDF plus a
//! small set of hand-engineered numerics; the model is a soft-voting
//! ensemble of multinomial Naive Bayes and logistic regression. Retraining
//! runs off the scoring path: predictions keep using the last trained
//! snapshot while a new one is built.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use regex::Regex;
use serde::{Deserialize, Serialize};
use store::JsonStore;
use tracing::{debug, info, warn};

use crate::{
    config::ClassifierConfig,
    text::{currency_count, emoji_count, is_stopword, uppercase_ratio},
};

/// Name of the persisted corpus store
const CORPUS_STORE: &str = "classifier_corpus";
/// Name of the persisted model artifact
const MODEL_STORE: &str = "classifier_model";

/// Laplace smoothing for the Naive Bayes likelihoods
const NB_ALPHA: f64 = 0.1;
/// Logistic regression training epochs
const LR_EPOCHS: usize = 200;
/// Logistic regression learning rate
const LR_RATE: f64 = 0.5;

static URL_MASK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://\S+|www\.\S+|t\.me/\S+").expect("valid url mask regex"));
static MENTION_MASK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@\w+").expect("valid mention mask regex"));

/// Label for a training example.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExampleLabel {
    /// Confirmed spam
    Spam,
    /// Confirmed legitimate
    Legitimate,
}

/// A classifier opinion on one text.
#[derive(Debug, Clone, Copy)]
pub struct Prediction {
    /// Whether the ensemble calls the text spam
    pub is_spam: bool,
    /// Probability of the predicted class
    pub confidence: f64,
}

/// The two labeled example sets. Append-only, deduplicated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingCorpus {
    /// Confirmed spam examples
    pub spam: Vec<String>,
    /// Confirmed legitimate examples
    pub legitimate: Vec<String>,
    /// Last corpus mutation
    pub last_updated: Option<DateTime<Utc>>,
}

impl Default for TrainingCorpus {
    fn default() -> Self {
        Self::seed()
    }
}

impl TrainingCorpus {
    /// Curated seed examples covering the scam families the engine sees
    /// most: trading testimonials, recruitment offers, casino promos and
    /// the ordinary questions they must not be confused with.
    pub fn seed() -> Self {
        let spam = [
            "Thanks to Kathy Lien my trading account is thriving with great returns",
            "From food stamps to $20,300 profit I bought my son a bike",
            "I use an automated trading system based on market conditions",
            "Send me a DM for more proof of my trading results",
            "My trading account grew from $500 to $50,000 in just 2 weeks",
            "Contact @tradingexpert for guaranteed daily returns",
            "Financial assistance without hassle, withdrawals are straightforward",
            "Thanks to this expert trader I made $10,000 in one week",
            "Join my trading team and earn $500-$1000 per week",
            "I was skeptical but now I make $200 daily from home",
            "New online project! Legal and secure activities on the exchange",
            "Urgently seeking 2-3 individuals for remote employment",
            "70-80 dollars per day, only via phone or PC. Details in PM",
            "We're recruiting for a cool project, earn $500-$1000 per week",
            "Looking for partners for a completely remote project",
            "Earn from home, simple tasks, full training provided",
            "Write + if interested in earning extra income",
            "Work from home and earn $1000+ weekly guaranteed",
            "Get your welcome bonus now at 1win casino",
            "Use promo code for free spins and $200 bonus",
            "I won $5000 on slots last night, try your luck",
            "Jackpot winner! Claim your bonus now",
            "Casino bonus activated on your balance",
            "DM me now for exclusive opportunity",
            "Inbox me for details on how to make money fast",
            "Click this link to claim your free crypto",
            "Guaranteed profit with no risk involved",
            "Limited time offer, act now before it's too late",
            "I made $50,000 last month working from home",
            "This changed my life, you need to try this",
        ];
        let legitimate = [
            "What do you think about BTC price action today?",
            "I'm bullish on ETH for the long term",
            "The market is looking pretty volatile",
            "Should I DCA into Bitcoin or wait for a dip?",
            "What's the best strategy for beginners?",
            "I've been holding since 2020",
            "Is this a good entry point for SOL?",
            "The funding rates are really high right now",
            "Technical analysis shows support at 40k",
            "How do I withdraw my funds?",
            "What are the fees on this platform?",
            "Can someone help me with KYC verification?",
            "Is there a referral program?",
            "When will the new feature be released?",
            "I'm having trouble logging in",
            "How do I contact support?",
            "What's the minimum deposit amount?",
            "Can I use a credit card to buy crypto?",
            "How long does withdrawal take?",
            "Good morning everyone!",
            "Thanks for the help",
            "That makes sense, appreciate it",
            "I agree with your analysis",
            "Interesting perspective",
            "Let's see how this plays out",
            "Happy trading everyone",
            "Stay safe out there",
            "Great community here",
            "What's the APY on the earn products?",
            "What coins can I trade here?",
        ];
        Self {
            spam: spam.iter().map(|s| s.to_string()).collect(),
            legitimate: legitimate.iter().map(|s| s.to_string()).collect(),
            last_updated: None,
        }
    }

    fn total(&self) -> usize {
        self.spam.len() + self.legitimate.len()
    }
}

/// Multinomial Naive Bayes over vocabulary counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct NaiveBayes {
    log_prior_spam: f64,
    log_prior_legit: f64,
    log_like_spam: Array1<f64>,
    log_like_legit: Array1<f64>,
}

/// Logistic regression over TF-IDF plus engineered features.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Logistic {
    weights: Array1<f64>,
    bias: f64,
}

/// A trained model snapshot. Immutable once built; prediction threads share
/// it through an `Arc` while retraining builds the next one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    vocab: HashMap<String, usize>,
    idf: Array1<f64>,
    nb: NaiveBayes,
    lr: Logistic,
    /// When this snapshot was trained
    pub trained_at: DateTime<Utc>,
    /// Corpus size it was trained on
    pub samples: usize,
}

/// Classifier statistics for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierStats {
    /// Whether a trained model is available
    pub is_trained: bool,
    /// Spam examples in the corpus
    pub spam_samples: usize,
    /// Legitimate examples in the corpus
    pub legitimate_samples: usize,
    /// When the current model was trained
    pub trained_at: Option<DateTime<Utc>>,
}

/// Trainable spam/legitimate text classifier.
pub struct SpamClassifier {
    config: ClassifierConfig,
    corpus: Mutex<TrainingCorpus>,
    model: RwLock<Option<Arc<TrainedModel>>>,
    store: JsonStore,
    retraining: AtomicBool,
}

impl SpamClassifier {
    /// Create the classifier: load the persisted corpus (or seed it), load
    /// the persisted model, and train synchronously if none exists yet.
    pub fn new(config: ClassifierConfig, store: JsonStore) -> Self {
        let corpus: TrainingCorpus = store.load_or_default(CORPUS_STORE);
        let model: Option<Arc<TrainedModel>> = store
            .load::<TrainedModel>(MODEL_STORE)
            .ok()
            .flatten()
            .map(Arc::new);

        let classifier = Self {
            config,
            corpus: Mutex::new(corpus),
            model: RwLock::new(model),
            store,
            retraining: AtomicBool::new(false),
        };
        if classifier.model.read().is_none() {
            classifier.train_and_swap();
        }
        classifier
    }

    /// Classify a text. Returns `None` when no model has been trained —
    /// the orchestrator treats that as "no opinion".
    pub fn predict(&self, text: &str) -> Option<Prediction> {
        let model = self.model.read().as_ref().cloned()?;
        let tokens = tokenize(&preprocess(text));

        let mut counts: HashMap<usize, f64> = HashMap::new();
        for token in &tokens {
            if let Some(&idx) = model.vocab.get(token) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        // Naive Bayes posterior
        let mut log_spam = model.nb.log_prior_spam;
        let mut log_legit = model.nb.log_prior_legit;
        for (&idx, &count) in &counts {
            log_spam += count * model.nb.log_like_spam[idx];
            log_legit += count * model.nb.log_like_legit[idx];
        }
        let p_nb = 1.0 / (1.0 + (log_legit - log_spam).clamp(-30.0, 30.0).exp());

        // Logistic regression over TF-IDF plus engineered features
        let features = feature_vector(&counts, &model.idf, model.vocab.len(), text);
        let z = model.lr.weights.dot(&features) + model.lr.bias;
        let p_lr = 1.0 / (1.0 + (-z).clamp(-30.0, 30.0).exp());

        // Soft vote
        let p = (p_nb + p_lr) / 2.0;
        let is_spam = p > 0.5;
        Some(Prediction {
            is_spam,
            confidence: if is_spam { p } else { 1.0 - p },
        })
    }

    /// Append a confirmed example and retrain once enough new spam has
    /// accumulated. Short texts and duplicates are ignored.
    pub fn add_example(self: &Arc<Self>, text: &str, label: ExampleLabel) {
        if text.chars().count() < self.config.min_example_len {
            return;
        }
        let should_retrain = {
            let mut corpus = self.corpus.lock();
            let set = match label {
                ExampleLabel::Spam => &mut corpus.spam,
                ExampleLabel::Legitimate => &mut corpus.legitimate,
            };
            if set.iter().any(|s| s == text) {
                return;
            }
            set.push(text.to_string());
            let new_len = set.len();
            corpus.last_updated = Some(Utc::now());
            self.store.save_logged(CORPUS_STORE, &*corpus);
            debug!(label = ?label, total = new_len, "Training example added");

            label == ExampleLabel::Spam && new_len % self.config.retrain_batch == 0
        };

        if should_retrain {
            self.retrain();
        }
    }

    /// Retrain on a background thread when a runtime is available, inline
    /// otherwise. Concurrent requests collapse into one run; predictions
    /// keep serving the previous snapshot meanwhile.
    pub fn retrain(self: &Arc<Self>) {
        if self.retraining.swap(true, Ordering::SeqCst) {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let this = Arc::clone(self);
                let _join = handle.spawn_blocking(move || this.train_and_swap());
            }
            Err(_) => self.train_and_swap(),
        }
    }

    fn train_and_swap(&self) {
        let corpus = self.corpus.lock().clone();
        match train(&corpus, &self.config) {
            Some(model) => {
                info!(
                    samples = model.samples,
                    vocabulary = model.vocab.len(),
                    "Classifier trained"
                );
                self.store.save_logged(MODEL_STORE, &model);
                *self.model.write() = Some(Arc::new(model));
            }
            None => {
                warn!(
                    samples = corpus.total(),
                    required = self.config.min_samples,
                    "Not enough training data"
                );
            }
        }
        self.retraining.store(false, Ordering::SeqCst);
    }

    /// Classifier statistics.
    pub fn stats(&self) -> ClassifierStats {
        let corpus = self.corpus.lock();
        let model = self.model.read();
        ClassifierStats {
            is_trained: model.is_some(),
            spam_samples: corpus.spam.len(),
            legitimate_samples: corpus.legitimate.len(),
            trained_at: model.as_ref().map(|m| m.trained_at),
        }
    }
}

/// Fold case, mask URLs and mentions to placeholder tokens, strip
/// punctuation and squeeze whitespace.
fn preprocess(text: &str) -> String {
    let lower = text.to_lowercase();
    let masked = URL_MASK_RE.replace_all(&lower, " urltoken ");
    let masked = MENTION_MASK_RE.replace_all(&masked, " mentiontoken ");
    let mut out = String::with_capacity(masked.len());
    let mut last_space = true;
    for c in masked.chars() {
        if c.is_alphanumeric() {
            out.push(c);
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    out.trim_end().to_string()
}

/// Unigrams and adjacent bigrams over the stopword-filtered token stream.
fn tokenize(processed: &str) -> Vec<String> {
    let words: Vec<&str> = processed
        .split_whitespace()
        .filter(|w| w.len() >= 2 && !is_stopword(w))
        .collect();

    let mut tokens: Vec<String> = words.iter().map(|w| w.to_string()).collect();
    for pair in words.windows(2) {
        tokens.push(format!("{} {}", pair[0], pair[1]));
    }
    tokens
}

/// Normalized hand-engineered numeric features.
fn engineered_features(text: &str) -> [f64; 5] {
    [
        (text.chars().count() as f64 / 500.0).min(1.0),
        uppercase_ratio(text),
        (crate::text::count_links(text) as f64 / 5.0).min(1.0),
        (emoji_count(text) as f64 / 10.0).min(1.0),
        (currency_count(text) as f64 / 5.0).min(1.0),
    ]
}

/// L2-normalized TF-IDF vector with the engineered features appended.
fn feature_vector(
    counts: &HashMap<usize, f64>,
    idf: &Array1<f64>,
    vocab_len: usize,
    raw_text: &str,
) -> Array1<f64> {
    let mut features = Array1::zeros(vocab_len + 5);
    for (&idx, &count) in counts {
        features[idx] = count * idf[idx];
    }
    let norm = features.dot(&features).sqrt();
    if norm > 0.0 {
        features.mapv_inplace(|v| v / norm);
    }
    for (i, value) in engineered_features(raw_text).into_iter().enumerate() {
        features[vocab_len + i] = value;
    }
    features
}

/// Train a model snapshot from the corpus. Returns `None` when the corpus
/// is below the minimum sample count.
fn train(corpus: &TrainingCorpus, config: &ClassifierConfig) -> Option<TrainedModel> {
    if corpus.total() < config.min_samples {
        return None;
    }

    let docs: Vec<(&str, f64)> = corpus
        .spam
        .iter()
        .map(|t| (t.as_str(), 1.0))
        .chain(corpus.legitimate.iter().map(|t| (t.as_str(), 0.0)))
        .collect();
    let tokenized: Vec<(Vec<String>, f64)> = docs
        .iter()
        .map(|(text, label)| (tokenize(&preprocess(text)), *label))
        .collect();

    // Vocabulary capped by document frequency, ties broken lexically so
    // training is deterministic
    let mut doc_freq: HashMap<&str, usize> = HashMap::new();
    for (tokens, _) in &tokenized {
        let unique: HashSet<&str> = tokens.iter().map(String::as_str).collect();
        for token in unique {
            *doc_freq.entry(token).or_insert(0) += 1;
        }
    }
    let mut ranked: Vec<(&str, usize)> = doc_freq.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    ranked.truncate(config.vocabulary);

    let vocab: HashMap<String, usize> = ranked
        .iter()
        .enumerate()
        .map(|(idx, (token, _))| (token.to_string(), idx))
        .collect();
    let n_docs = tokenized.len() as f64;
    let idf = Array1::from_iter(
        ranked
            .iter()
            .map(|(_, df)| ((n_docs + 1.0) / (*df as f64 + 1.0)).ln() + 1.0),
    );

    // Per-document vocabulary counts
    let doc_counts: Vec<(HashMap<usize, f64>, f64)> = tokenized
        .iter()
        .map(|(tokens, label)| {
            let mut counts: HashMap<usize, f64> = HashMap::new();
            for token in tokens {
                if let Some(&idx) = vocab.get(token.as_str()) {
                    *counts.entry(idx).or_insert(0.0) += 1.0;
                }
            }
            (counts, *label)
        })
        .collect();

    let nb = train_naive_bayes(&doc_counts, vocab.len());
    let lr = train_logistic(&doc_counts, &idf, vocab.len(), &docs);

    Some(TrainedModel {
        vocab,
        idf,
        nb,
        lr,
        trained_at: Utc::now(),
        samples: corpus.total(),
    })
}

fn train_naive_bayes(doc_counts: &[(HashMap<usize, f64>, f64)], vocab_len: usize) -> NaiveBayes {
    let n = doc_counts.len() as f64;
    let n_spam = doc_counts.iter().filter(|(_, l)| *l > 0.5).count() as f64;
    let n_legit = n - n_spam;

    let mut spam_counts = Array1::<f64>::zeros(vocab_len);
    let mut legit_counts = Array1::<f64>::zeros(vocab_len);
    for (counts, label) in doc_counts {
        let target = if *label > 0.5 {
            &mut spam_counts
        } else {
            &mut legit_counts
        };
        for (&idx, &count) in counts {
            target[idx] += count;
        }
    }

    let spam_total: f64 = spam_counts.sum();
    let legit_total: f64 = legit_counts.sum();
    let denom_spam = spam_total + NB_ALPHA * vocab_len as f64;
    let denom_legit = legit_total + NB_ALPHA * vocab_len as f64;

    NaiveBayes {
        log_prior_spam: (n_spam.max(1.0) / n).ln(),
        log_prior_legit: (n_legit.max(1.0) / n).ln(),
        log_like_spam: spam_counts.mapv(|c| ((c + NB_ALPHA) / denom_spam).ln()),
        log_like_legit: legit_counts.mapv(|c| ((c + NB_ALPHA) / denom_legit).ln()),
    }
}

fn train_logistic(
    doc_counts: &[(HashMap<usize, f64>, f64)],
    idf: &Array1<f64>,
    vocab_len: usize,
    docs: &[(&str, f64)],
) -> Logistic {
    let n = doc_counts.len();
    let dim = vocab_len + 5;

    let mut features = Array2::<f64>::zeros((n, dim));
    let mut labels = Array1::<f64>::zeros(n);
    for (row, ((counts, label), (raw, _))) in doc_counts.iter().zip(docs.iter()).enumerate() {
        features
            .row_mut(row)
            .assign(&feature_vector(counts, idf, vocab_len, raw));
        labels[row] = *label;
    }

    let mut weights = Array1::<f64>::zeros(dim);
    let mut bias = 0.0;
    for _ in 0..LR_EPOCHS {
        let z = features.dot(&weights) + bias;
        let predictions = z.mapv(|v| 1.0 / (1.0 + (-v).clamp(-30.0, 30.0).exp()));
        let errors = &predictions - &labels;
        let grad = features.t().dot(&errors) / n as f64;
        weights = weights - grad * LR_RATE;
        bias -= LR_RATE * errors.sum() / n as f64;
    }

    Logistic { weights, bias }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Arc<SpamClassifier> {
        let dir = tempfile::tempdir().unwrap();
        Arc::new(SpamClassifier::new(
            ClassifierConfig::default(),
            JsonStore::new(dir.path()),
        ))
    }

    #[test]
    fn preprocess_masks_urls_and_mentions() {
        let processed = preprocess("Contact @scammer at https://evil.example NOW!");
        assert!(processed.contains("mentiontoken"));
        assert!(processed.contains("urltoken"));
        assert!(!processed.contains("https"));
        assert!(!processed.contains('!'));
    }

    #[test]
    fn tokenize_emits_unigrams_and_bigrams() {
        let tokens = tokenize("guaranteed profit scheme");
        assert!(tokens.contains(&"guaranteed".to_string()));
        assert!(tokens.contains(&"guaranteed profit".to_string()));
        assert!(tokens.contains(&"profit scheme".to_string()));
    }

    #[test]
    fn seed_corpus_trains_a_model() {
        let c = classifier();
        let stats = c.stats();
        assert!(stats.is_trained);
        assert!(stats.spam_samples >= 20);
    }

    #[test]
    fn recognizes_seeded_spam_shapes() {
        let c = classifier();
        let spam = c
            .predict("Get your welcome bonus now at 1win casino")
            .expect("model available");
        assert!(spam.is_spam);

        let legit = c
            .predict("How do I withdraw my funds?")
            .expect("model available");
        assert!(!legit.is_spam);
    }

    #[test]
    fn short_and_duplicate_examples_are_ignored() {
        let c = classifier();
        let before = c.stats().spam_samples;

        c.add_example("short", ExampleLabel::Spam);
        assert_eq!(c.stats().spam_samples, before);

        c.add_example("DM me now for exclusive opportunity", ExampleLabel::Spam);
        assert_eq!(c.stats().spam_samples, before);
    }

    #[test]
    fn corpus_grows_and_retrains_on_batch_boundary() {
        let c = classifier();
        let before = c.stats().spam_samples;
        let trained_before = c.stats().trained_at;

        for i in 0..10 {
            c.add_example(
                &format!("totally new casino promo blast number {i} claim bonus"),
                ExampleLabel::Spam,
            );
        }
        let stats = c.stats();
        assert_eq!(stats.spam_samples, before + 10);
        assert!(stats.trained_at >= trained_before);
    }

    #[test]
    fn model_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        {
            let _ = SpamClassifier::new(ClassifierConfig::default(), JsonStore::new(dir.path()));
        }
        let c = SpamClassifier::new(ClassifierConfig::default(), JsonStore::new(dir.path()));
        assert!(c.stats().is_trained);
        assert!(c.predict("Jackpot winner! Claim your bonus now").is_some());
    }
}
