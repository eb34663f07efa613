//! Lexical matchers
//!
//! Keyword, phrase and regex detection over raw and normalized message text.
//! Two tiers: the disqualification tier short-circuits scoring with a
//! maximum-severity action, the weighted tier adds bounded score increments.
//! Patterns run against the raw text, a punctuation-stripped variant and a
//! homoglyph-folded variant, because substituting lookalike characters is a
//! common way to dodge literal keyword scans.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    config::LexicalConfig,
    text::{emoji_count, fold_homoglyphs, has_char_run, strip_punctuation},
    Action, EntityKind, Message, ViolationCategory,
};

/// URL pattern covering bare links and chat deep links
static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"https?://[^\s<>"{}|\\^`\[\]]+|www\.[^\s<>"{}|\\^`\[\]]+|t\.me/[^\s<>"{}|\\^`\[\]]+"#,
    )
    .expect("valid url regex")
});

/// Automation-account link pattern
static BOT_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)t\.me/[a-zA-Z0-9_]+bot|@[a-zA-Z0-9_]+bot").expect("valid bot regex"));

/// Obfuscation-tolerant adult content pattern
static ADULT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)x\s*x\s*x|p[\s\-\.]*o[\s\-\.]*r[\s\-\.]*n|xxx|porn|nudes|onlyfans")
        .expect("valid adult regex")
});

/// Runs of shouting capitals
static CAPS_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Z]{5,}").expect("valid caps regex"));

/// Cryptocurrency address shapes
static CRYPTO_RES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        ("eth", Regex::new(r"0x[a-fA-F0-9]{40}").expect("valid eth regex")),
        (
            "btc",
            Regex::new(r"[13][a-km-zA-HJ-NP-Z1-9]{25,34}|bc1[a-zA-HJ-NP-Z0-9]{39,59}")
                .expect("valid btc regex"),
        ),
        (
            "sol",
            Regex::new(r"[1-9A-HJ-NP-Za-km-z]{32,44}").expect("valid sol regex"),
        ),
    ]
});

/// @-mention pattern
static MENTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@\w+").expect("valid mention regex"));

/// External handle worth a DM (five or more name characters)
static HANDLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@[a-zA-Z][a-zA-Z0-9_]{4,}").expect("valid handle regex"));

/// Dollar-earnings claim shapes used by recruitment scams
static EARNINGS_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\$\d{2,4}\s*(per|a)\s*(day|week)",
        r"\$\d{2,4}\s*-\s*\$\d{2,4}",
        r"(earnings?|income|earn)\s*(from|starting|of|up to)?\s*\$\d+",
        r"\$\d+\+?\s*(per|a|/)\s*(day|week)",
        r"(up to|starting at)\s*\$\d+",
        r"\d{2,4}\s*(dollars?|usd)\s*(per|a)\s*(day|week)",
        r"\d{2,4}\s*-\s*\d{2,4}\s*(dollars?|usd)",
        r"\$\d+\s*[–-]\s*\$\d+",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid earnings regex"))
    .collect()
});

/// Flexible scam testimonial shapes
static SCAM_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"thanks to [^,\n]+,? my (trading )?account is (thriving|growing|doing great)",
        r"profit (with|thanks to) (mrs|mr|@)\S+",
        r"withdrawals? (are|is) (easy|straightforward|simple|without hassle)",
        r"from [^\n]+ to \$?\d{2,5} (profit|returns|income)",
        r"automated trading system (based on|using) (market conditions|algorithms)",
        r"avoids? risky strategies? (like|such as) (martingale|grid|hedging)",
        r"aims? for a daily (performance|return|roi|profit) of ?\d+%?",
        r"(ea|system) operates? on the m\d+ timeframe",
        r"compatible with all brokers",
        r"manages? (sl/tp|stop loss|take profit)",
        r"works 24/5 on mt4( and mt5)?",
        r"funded account challenges?",
        r"send me a dm (for|to see|for more) (proof|results|details)",
        r"financial assistance (without|with no) hassle",
        r"my life changed after",
        r"i bought (my|a|the) [^\n]+ for my (son|daughter|family|wife|husband)",
        r"(contact|dm|message) @[a-zA-Z0-9_]{4,} (for|to get|for help|for more)",
        r"\$\d{2,5} (profit|returns|income|gain|withdrawal)",
        r"\d+% (daily|weekly|monthly) (returns?|profit|roi)",
        r"roi of \d+%",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid scam regex"))
    .collect()
});

/// Remote-work phrases used by recruitment scams
const REMOTE_PHRASES: &[&str] = &[
    "remote",
    "remotely",
    "from home",
    "from a phone",
    "from phone",
    "from a computer",
    "from computer",
    "work online",
    "online work",
    "completely remote",
    "fully remote",
    "remote employment",
    "remote job",
    "online project",
    "via phone",
    "via pc",
    "only via phone",
    "phone or pc",
];

/// Recruitment phrases
const RECRUITMENT_PHRASES: &[&str] = &[
    "looking for",
    "recruiting",
    "recruitment",
    "opening recruitment",
    "join a project",
    "join my team",
    "putting together",
    "looking for people",
    "looking for partners",
    "looking for several",
    "2-3 people",
    "two people",
    "several people",
    "responsible people",
    "2-3 individuals",
    "seeking",
    "urgently seeking",
    "new online project",
    "we're recruiting",
];

/// Direct-message request phrases
const DM_REQUEST_PHRASES: &[&str] = &[
    "write to",
    "message me",
    "dm me",
    "private message",
    "send me a",
    "contact me",
    "write \"+\"",
    "write '+'",
    "leave a \"+\"",
    "write +",
    "leave +",
    "if interested",
    "details:",
    "details -",
    "want to join",
    "details in pm",
    "details in dm",
    "write now",
    "write me",
    "pm -",
    "dm -",
    "pm:",
];

/// Easy-money promise phrases
const EASY_WORK_PHRASES: &[&str] = &[
    "simple tasks",
    "clear instructions",
    "easy",
    "1-2 hours",
    "1.5-2 hours",
    "hours per day",
    "full training",
    "training and support",
    "we provide",
    "daily payments",
    "transparent",
];

/// Attention-grabber glyphs
const ATTENTION_GLYPHS: &[&str] = &["attention", "‼️", "❗", "⚡", "❗️", "✔", "✅"];

/// Legitimacy-claim words scammers decorate offers with
const LEGITIMACY_WORDS: &[&str] = &["legal", "secure", "legitimate", "legit", "safe", "trusted"];

/// Signal words for the contextual promo-code rule
const PROMO_SIGNALS: &[&str] = &[
    "jackpot", "casino", "betting", "win", "bonus", "free", "balance", "activate", "$", "play",
    "🎰", "💰", "🎲",
];

/// Promo keywords for the emoji-flood rule
const PROMO_WORDS: &[&str] = &[
    "right here",
    "click",
    "join",
    "bonus",
    "win",
    "free",
    "ready",
    "launch",
    "promo",
    "code",
    "new players",
    "get a",
    "start",
    "cash",
    "today",
    "now",
    "hot",
    "big",
];

/// Decorative glyphs counted alongside emoji by the flood rules
const DECORATIVE_GLYPHS: &[char] = &[
    '▫', '▪', '➡', '⬅', '✔', '✅', '❌', '⭐', '💪', '⚡', '💋', '🔥', '💎', '🏆', '🥇', '💰', '💵',
];

/// Promotional spam keywords for mention-spam co-occurrence
const MENTION_PROMO_WORDS: &[&str] = &[
    "join", "click", "now", "link", "hurry", "act", "fast", "don't miss",
];

/// A disqualification-tier match. Sufficient on its own to decide the
/// verdict; no weighted scoring runs after one of these.
#[derive(Debug, Clone)]
pub struct Disqualification {
    /// Category that fired
    pub category: ViolationCategory,
    /// Human-readable reason
    pub reason: String,
    /// Recommended action
    pub action: Action,
}

/// A weighted-tier match contributing a bounded score increment.
#[derive(Debug, Clone)]
pub struct WeightedHit {
    /// Category that fired
    pub category: ViolationCategory,
    /// Score increment
    pub score: f64,
    /// Human-readable reason
    pub reason: String,
    /// Action this hit forces regardless of the accumulated score
    pub forced_action: Option<Action>,
}

/// Pre-computed text variants shared by the matchers.
#[derive(Debug)]
pub struct TextVariants {
    /// Lowercased raw text
    pub lower: String,
    /// Lowercased homoglyph-folded text
    pub folded_lower: String,
    /// Lowercased punctuation-stripped text
    pub normalized: String,
}

impl TextVariants {
    /// Derive all matching variants from the raw text.
    pub fn derive(text: &str) -> Self {
        let lower = text.to_lowercase();
        Self {
            folded_lower: fold_homoglyphs(text).to_lowercase(),
            normalized: strip_punctuation(&lower),
            lower,
        }
    }
}

/// Keyword, phrase and regex matchers over message text.
pub struct LexicalMatchers {
    config: LexicalConfig,
}

impl LexicalMatchers {
    /// Create matchers from configuration.
    pub fn new(config: LexicalConfig) -> Self {
        Self { config }
    }

    /// Return the first allow-listed phrase found in the text. A hit
    /// bypasses all spam detection for the message.
    pub fn allow_listed<'a>(&'a self, variants: &TextVariants) -> Option<&'a str> {
        self.config
            .allow_phrases
            .iter()
            .find(|phrase| variants.lower.contains(&phrase.to_lowercase()))
            .map(String::as_str)
    }

    /// Run the disqualification tier in its fixed order. The first match
    /// wins; later rules never see the message.
    pub fn disqualify(&self, msg: &Message, variants: &TextVariants) -> Option<Disqualification> {
        self.check_premium_emoji(msg)
            .or_else(|| self.check_hyperlink_emoji(msg))
            .or_else(|| self.check_adult(&msg.text, &variants.folded_lower))
            .or_else(|| self.check_bot_link(&msg.text))
            .or_else(|| self.check_casino(variants))
            .or_else(|| self.check_promo_code(msg, variants))
            .or_else(|| self.check_dm_solicitation(variants))
            .or_else(|| self.check_instant_keywords(variants))
            .or_else(|| self.check_emoji_flood(msg, variants))
            .or_else(|| self.check_recruitment(msg, variants))
            .or_else(|| self.check_scam_patterns(variants))
    }

    fn check_premium_emoji(&self, msg: &Message) -> Option<Disqualification> {
        let count = msg
            .entities
            .iter()
            .filter(|e| e.kind == EntityKind::CustomEmoji)
            .count();
        (count >= self.config.premium_emoji_threshold).then(|| Disqualification {
            category: ViolationCategory::PremiumEmojiFlood,
            reason: format!("Custom emoji flood ({count} custom emoji entities)"),
            action: Action::Ban,
        })
    }

    fn check_hyperlink_emoji(&self, msg: &Message) -> Option<Disqualification> {
        let has_hyperlink = msg
            .entities
            .iter()
            .any(|e| matches!(e.kind, EntityKind::Url | EntityKind::TextLink));
        if !has_hyperlink {
            return None;
        }
        let emojis = emoji_count(&msg.text);
        (emojis > self.config.hyperlink_emoji_threshold).then(|| Disqualification {
            category: ViolationCategory::HyperlinkEmoji,
            reason: format!("Hyperlinked text decorated with {emojis} emoji"),
            action: Action::Ban,
        })
    }

    fn check_adult(&self, raw: &str, folded_lower: &str) -> Option<Disqualification> {
        (ADULT_RE.is_match(raw) || ADULT_RE.is_match(folded_lower)).then(|| Disqualification {
            category: ViolationCategory::AdultContent,
            reason: "Adult content detected".to_string(),
            action: Action::Ban,
        })
    }

    fn check_bot_link(&self, raw: &str) -> Option<Disqualification> {
        let matched = BOT_LINK_RE.find(raw)?.as_str().to_lowercase();
        // Commands addressed at a bot ("/warn@somebot") are not spam
        if raw.trim_start().starts_with('/') {
            return None;
        }
        if self
            .config
            .safe_bot_handles
            .iter()
            .any(|safe| matched.contains(&safe.to_lowercase()))
        {
            return None;
        }
        Some(Disqualification {
            category: ViolationCategory::BotLink,
            reason: format!("Automation account link: {matched}"),
            action: Action::Ban,
        })
    }

    fn check_casino(&self, variants: &TextVariants) -> Option<Disqualification> {
        self.config
            .casino_phrases
            .iter()
            .find(|phrase| {
                let phrase = phrase.to_lowercase();
                variants.lower.contains(&phrase) || variants.folded_lower.contains(&phrase)
            })
            .map(|phrase| Disqualification {
                category: ViolationCategory::CasinoSpam,
                reason: format!("Casino/betting spam: {phrase}"),
                action: Action::Ban,
            })
    }

    /// "promo code" alone is a legitimate question; combined with bot links
    /// or gambling signals and emoji decoration it is promotion.
    fn check_promo_code(&self, msg: &Message, variants: &TextVariants) -> Option<Disqualification> {
        let has_promo_code = variants.lower.contains("promo code")
            || variants.folded_lower.contains("promo code");
        if !has_promo_code {
            return None;
        }
        let has_bot_signal = msg.text.contains('@')
            && (variants.lower.contains("bot") || variants.lower.contains("win"));
        let has_spam_signal = PROMO_SIGNALS.iter().any(|s| variants.lower.contains(s));
        let has_many_emojis = emoji_count(&msg.text) >= 3;

        (has_bot_signal || (has_spam_signal && has_many_emojis)).then(|| Disqualification {
            category: ViolationCategory::CasinoSpam,
            reason: "Promotional spam: promo code with spam signals".to_string(),
            action: Action::Ban,
        })
    }

    fn check_dm_solicitation(&self, variants: &TextVariants) -> Option<Disqualification> {
        self.config
            .dm_phrases
            .iter()
            .find(|phrase| {
                let phrase = phrase.to_lowercase();
                variants.lower.contains(&phrase) || variants.normalized.contains(&phrase)
            })
            .map(|phrase| Disqualification {
                category: ViolationCategory::DmSolicitation,
                reason: format!("Aggressive DM solicitation: {phrase}"),
                action: Action::Ban,
            })
    }

    fn check_instant_keywords(&self, variants: &TextVariants) -> Option<Disqualification> {
        self.config
            .instant_keywords
            .iter()
            .find(|kw| {
                let kw = kw.to_lowercase();
                variants.lower.contains(&kw)
                    || variants.normalized.contains(&kw)
                    || variants.folded_lower.contains(&kw)
            })
            .map(|kw| Disqualification {
                category: ViolationCategory::InstantKeyword,
                reason: format!("Instant keyword: {kw}"),
                action: Action::Ban,
            })
    }

    fn check_emoji_flood(&self, msg: &Message, variants: &TextVariants) -> Option<Disqualification> {
        let decorative = emoji_count(&msg.text)
            + msg
                .text
                .chars()
                .filter(|c| DECORATIVE_GLYPHS.contains(c))
                .count();
        let has_link = URL_RE.is_match(&msg.text);

        if decorative > self.config.promo_flood_with_link && has_link {
            return Some(Disqualification {
                category: ViolationCategory::PromoFlood,
                reason: format!("Promotional spam ({decorative} decorative glyphs with links)"),
                action: Action::Ban,
            });
        }

        if decorative > self.config.promo_flood_without_link {
            let promo_matches = PROMO_WORDS
                .iter()
                .filter(|kw| variants.lower.contains(*kw))
                .count();
            if promo_matches >= self.config.promo_flood_min_keywords {
                return Some(Disqualification {
                    category: ViolationCategory::PromoFlood,
                    reason: format!(
                        "Promotional spam ({decorative} decorative glyphs, {promo_matches} promo keywords)"
                    ),
                    action: Action::Ban,
                });
            }
        }
        None
    }

    /// Recruitment scams promise remote work with unrealistic earnings and
    /// ask victims to DM. No single signal decides; the combination does.
    fn check_recruitment(&self, msg: &Message, variants: &TextVariants) -> Option<Disqualification> {
        let weights = &self.config.recruitment;
        let lower = &variants.lower;

        let has_handle = HANDLE_RE.is_match(&msg.text);
        let has_earnings = EARNINGS_RES.iter().any(|re| re.is_match(lower));
        let has_remote = REMOTE_PHRASES.iter().any(|kw| lower.contains(kw));
        let has_recruitment = RECRUITMENT_PHRASES.iter().any(|kw| lower.contains(kw));
        let has_dm_request = DM_REQUEST_PHRASES.iter().any(|kw| lower.contains(kw));
        let has_easy = EASY_WORK_PHRASES.iter().any(|kw| lower.contains(kw));
        let has_attention = ATTENTION_GLYPHS.iter().any(|kw| msg.text.contains(kw));
        let has_legitimacy = LEGITIMACY_WORDS.iter().any(|kw| lower.contains(kw));

        let mut score = 0.0;
        let mut triggers = Vec::new();
        let mut add = |cond: bool, weight: f64, label: &str| {
            if cond {
                score += weight;
                triggers.push(label.to_string());
            }
        };
        add(has_handle, weights.handle_weight, "handle");
        add(has_earnings, weights.earnings_weight, "earnings_claim");
        add(has_remote, weights.remote_weight, "remote_work");
        add(has_recruitment, weights.recruitment_weight, "recruitment");
        add(has_dm_request, weights.dm_weight, "dm_request");
        add(has_easy, weights.easy_weight, "easy_money");
        add(has_attention, weights.attention_weight, "attention_grabber");
        add(has_legitimacy, weights.legitimacy_weight, "legitimacy_claim");
        add(
            has_handle && has_attention && has_recruitment,
            weights.combo_bonus,
            "combo",
        );

        (score >= weights.cutoff).then(|| Disqualification {
            category: ViolationCategory::RecruitmentScam,
            reason: format!(
                "Recruitment scam (score {score:.1}: {})",
                triggers.join(", ")
            ),
            action: Action::Ban,
        })
    }

    fn check_scam_patterns(&self, variants: &TextVariants) -> Option<Disqualification> {
        SCAM_RES
            .iter()
            .find(|re| re.is_match(&variants.lower))
            .map(|re| Disqualification {
                category: ViolationCategory::ScamPattern,
                reason: format!("Scam pattern: {}", re.as_str()),
                action: Action::Ban,
            })
    }

    /// Currency-glyph rule. Only fires for senders that are "new" by at
    /// least one of: first message, low reputation, recent join.
    pub fn money_emoji(&self, msg: &Message, reputation: i64) -> Option<Disqualification> {
        let rule = &self.config.money_emoji;
        if !rule.enabled {
            return None;
        }
        if reputation >= rule.trusted_floor {
            return None;
        }
        let count = msg
            .text
            .chars()
            .filter(|c| rule.emojis.contains(c))
            .count();
        if count < rule.threshold {
            return None;
        }

        let mut suspicion = Vec::new();
        if msg.is_first_message {
            suspicion.push("first message".to_string());
        }
        if reputation < rule.min_reputation {
            suspicion.push(format!("low reputation ({reputation})"));
        }
        if let Some(joined) = msg.sender_joined_at {
            let hours = (msg.timestamp - joined).num_hours();
            if hours < rule.new_sender_hours {
                suspicion.push(format!("new sender ({hours}h old)"));
            }
        }
        if suspicion.is_empty() {
            return None;
        }

        Some(Disqualification {
            category: ViolationCategory::MoneyEmoji,
            reason: format!(
                "Currency emoji spam ({count} glyphs) from {}",
                suspicion.join(", ")
            ),
            action: rule.action,
        })
    }

    /// Disallowed-script rule. Characters from an always-allowed range never
    /// trigger it; a URL alongside a blocked script escalates the action
    /// from content removal to sender removal.
    pub fn script_violation(&self, text: &str) -> Option<Disqualification> {
        if !self.config.script_check_enabled {
            return None;
        }
        let mut detected: Vec<&str> = Vec::new();
        for c in text.chars() {
            if self.config.allowed_scripts.iter().any(|r| r.contains(c)) {
                continue;
            }
            if let Some(range) = self.config.blocked_scripts.iter().find(|r| r.contains(c)) {
                if !detected.contains(&range.name.as_str()) {
                    detected.push(&range.name);
                }
            }
        }
        if detected.is_empty() {
            return None;
        }

        let has_url = URL_RE.is_match(text);
        Some(Disqualification {
            category: ViolationCategory::DisallowedScript,
            reason: format!("Disallowed script: {}", detected.join(", ")),
            action: if has_url { Action::Ban } else { Action::DeleteAndWarn },
        })
    }

    /// Run the weighted tier and return every hit with its score increment.
    pub fn weighted(&self, msg: &Message, variants: &TextVariants) -> Vec<WeightedHit> {
        let mut hits = Vec::new();

        if let Some(hit) = self.check_keywords(&variants.lower) {
            hits.push(hit);
        }
        if let Some(hit) = self.check_urls(&msg.text) {
            hits.push(hit);
        }
        if let Some(hit) = self.check_new_sender_link(msg) {
            hits.push(hit);
        }
        if let Some(hit) = self.check_crypto(&msg.text) {
            hits.push(hit);
        }
        hits.extend(self.check_formatting(&msg.text));
        if let Some(hit) = self.check_mention_spam(&msg.text, &variants.lower) {
            hits.push(hit);
        }
        if let Some(hit) = self.check_profanity(&variants.normalized) {
            hits.push(hit);
        }

        hits
    }

    fn check_keywords(&self, lower: &str) -> Option<WeightedHit> {
        let matched: Vec<&str> = self
            .config
            .spam_keywords
            .iter()
            .filter(|kw| lower.contains(&kw.to_lowercase()))
            .map(String::as_str)
            .collect();
        let score = match matched.len() {
            0 => return None,
            1 => 0.3,
            2 => 0.5,
            _ => 0.8,
        };
        Some(WeightedHit {
            category: ViolationCategory::SpamKeywords,
            score,
            reason: format!("Spam keywords: {}", matched.join(", ")),
            forced_action: None,
        })
    }

    /// Three-way URL classification. Allow-listed domains pass free;
    /// deny-listed and unclassified domains both add weight — unknown
    /// external links are suspicious by default.
    fn check_urls(&self, text: &str) -> Option<WeightedHit> {
        let urls: Vec<&str> = URL_RE.find_iter(text).map(|m| m.as_str()).collect();
        if urls.is_empty() {
            return None;
        }

        let mut suspicious = Vec::new();
        for url in &urls {
            let url_lower = url.to_lowercase();
            let allowed = self
                .config
                .allowed_domains
                .iter()
                .any(|d| url_lower.contains(&d.to_lowercase()));
            if allowed {
                continue;
            }
            let deny_listed = self
                .config
                .suspicious_domains
                .iter()
                .any(|d| url_lower.contains(&d.to_lowercase()));
            suspicious.push(if deny_listed {
                format!("{url} (deny-listed)")
            } else {
                format!("{url} (unclassified)")
            });
        }
        if suspicious.is_empty() {
            return None;
        }

        let score = (suspicious.len() as f64 * 0.8).min(1.0);
        Some(WeightedHit {
            category: ViolationCategory::SuspiciousUrl,
            score,
            reason: format!("Suspicious links: {}", suspicious.join(", ")),
            forced_action: Some(Action::Mute),
        })
    }

    fn check_new_sender_link(&self, msg: &Message) -> Option<WeightedHit> {
        let joined = msg.sender_joined_at?;
        let hours = (msg.timestamp - joined).num_hours();
        if hours >= self.config.new_sender_link_hours || !URL_RE.is_match(&msg.text) {
            return None;
        }
        Some(WeightedHit {
            category: ViolationCategory::NewSenderLink,
            score: 0.6,
            reason: format!("Sender joined {hours}h ago and is posting links"),
            forced_action: None,
        })
    }

    fn check_crypto(&self, text: &str) -> Option<WeightedHit> {
        CRYPTO_RES
            .iter()
            .find(|(_, re)| re.is_match(text))
            .map(|(name, _)| WeightedHit {
                category: ViolationCategory::CryptoAddress,
                score: 0.4,
                reason: format!("Contains a {name} address"),
                forced_action: None,
            })
    }

    fn check_formatting(&self, text: &str) -> Vec<WeightedHit> {
        let mut hits = Vec::new();

        if CAPS_RUN_RE.find_iter(text).count() >= 3 {
            hits.push(WeightedHit {
                category: ViolationCategory::Formatting,
                score: 0.3,
                reason: "Excessive capitalization".to_string(),
                forced_action: None,
            });
        }
        if has_char_run(text, 5) {
            hits.push(WeightedHit {
                category: ViolationCategory::Formatting,
                score: 0.2,
                reason: "Repeated characters".to_string(),
                forced_action: None,
            });
        }
        if emoji_count(text) > 10 {
            hits.push(WeightedHit {
                category: ViolationCategory::Formatting,
                score: 0.2,
                reason: "Excessive emoji".to_string(),
                forced_action: None,
            });
        }

        hits
    }

    /// Mention-spam scoring. Weight scales with mention count and promo
    /// co-occurrence; near-duplicate mentions are stronger evidence than
    /// varied ones.
    fn check_mention_spam(&self, text: &str, lower: &str) -> Option<WeightedHit> {
        let mentions: Vec<&str> = MENTION_RE.find_iter(text).map(|m| m.as_str()).collect();
        let count = mentions.len();
        if count == 0 {
            return None;
        }

        let has_promo = MENTION_PROMO_WORDS.iter().any(|kw| lower.contains(kw));
        let mut score: f64 = match count {
            c if c >= 5 => 0.7,
            c if c >= 3 => {
                if has_promo {
                    0.6
                } else {
                    0.3
                }
            }
            2 if has_promo => 0.4,
            _ => 0.0,
        };

        let unique: std::collections::HashSet<&str> = mentions.iter().copied().collect();
        if (unique.len() as f64) < count as f64 * 0.5 {
            score = score.max(0.5);
        }

        (score > 0.0).then(|| WeightedHit {
            category: ViolationCategory::MentionSpam,
            score,
            reason: format!("Mention spam ({count} mentions)"),
            forced_action: None,
        })
    }

    fn check_profanity(&self, normalized: &str) -> Option<WeightedHit> {
        if !self.config.profanity_enabled {
            return None;
        }
        let words: std::collections::HashSet<&str> = normalized.split_whitespace().collect();
        let matched: Vec<&str> = self
            .config
            .profanity_words
            .iter()
            .filter(|w| words.contains(w.to_lowercase().as_str()))
            .map(String::as_str)
            .collect();
        let score = match matched.len() {
            0 => return None,
            1 => 0.3,
            2 => 0.4,
            _ => 0.6,
        };
        Some(WeightedHit {
            category: ViolationCategory::Profanity,
            score,
            reason: format!("Profanity: {}", matched.join(", ")),
            forced_action: None,
        })
    }
}

/// Extract URL spans from a text, for collaborators that need them.
pub fn extract_urls(text: &str) -> Vec<&str> {
    URL_RE.find_iter(text).map(|m| m.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn matchers() -> LexicalMatchers {
        LexicalMatchers::new(LexicalConfig::default())
    }

    fn disqualify(text: &str) -> Option<Disqualification> {
        let msg = Message::text(1, -1, text);
        let variants = TextVariants::derive(text);
        matchers().disqualify(&msg, &variants)
    }

    #[test]
    fn adult_content_disqualifies_through_obfuscation() {
        let hit = disqualify("hot p.o.r.n here").expect("should disqualify");
        assert_eq!(hit.category, ViolationCategory::AdultContent);
        assert_eq!(hit.action, Action::Ban);
    }

    #[test]
    fn casino_phrase_detected_after_homoglyph_folding() {
        // Cyrillic с, а, і, о standing in for Latin letters
        let hit = disqualify("grab your саsіnо bonus today").expect("should disqualify");
        assert_eq!(hit.category, ViolationCategory::CasinoSpam);
    }

    #[test]
    fn dm_solicitation_disqualifies() {
        let hit = disqualify("DM me now for guaranteed profit").expect("should disqualify");
        assert_eq!(hit.category, ViolationCategory::DmSolicitation);
        assert_eq!(hit.action, Action::Ban);
    }

    #[test]
    fn bot_link_disqualifies_but_commands_do_not() {
        let hit = disqualify("join t.me/freemoneybot today").expect("should disqualify");
        assert_eq!(hit.category, ViolationCategory::BotLink);

        assert!(disqualify("/warn@chatwarden_bot spammer").is_none());
    }

    #[test]
    fn promo_code_question_is_not_disqualified() {
        assert!(disqualify("where can i find a promo code for the exchange?").is_none());
    }

    #[test]
    fn recruitment_composite_triggers_on_combined_signals() {
        let hit = disqualify(
            "Urgently seeking 2-3 individuals for remote employment, \
             70-80 dollars per day, details in PM, write to @hiringdesk",
        )
        .expect("should disqualify");
        assert_eq!(hit.category, ViolationCategory::RecruitmentScam);
    }

    #[test]
    fn single_recruitment_signal_is_not_enough() {
        assert!(disqualify("I am looking for a good book on options").is_none());
    }

    #[test]
    fn premium_emoji_flood_disqualifies() {
        let msg = Message::text(1, -1, "nice").with_entities(
            (0..5)
                .map(|i| crate::MessageEntity::new(EntityKind::CustomEmoji, i, 1))
                .collect(),
        );
        let variants = TextVariants::derive(&msg.text);
        let hit = matchers().disqualify(&msg, &variants).expect("should disqualify");
        assert_eq!(hit.category, ViolationCategory::PremiumEmojiFlood);
    }

    #[test]
    fn hyperlink_with_emoji_decoration_disqualifies() {
        let msg = Message::text(1, -1, "🎉🎉🎉 amazing offer")
            .with_entities(vec![crate::MessageEntity::new(EntityKind::TextLink, 0, 5)]);
        let variants = TextVariants::derive(&msg.text);
        let hit = matchers().disqualify(&msg, &variants).expect("should disqualify");
        assert_eq!(hit.category, ViolationCategory::HyperlinkEmoji);
    }

    #[test]
    fn money_emoji_fires_only_for_new_senders() {
        let m = matchers();
        let now = Utc::now();

        let msg = Message::text(1, -1, "💰💰 easy gains")
            .with_joined_at(now - Duration::hours(1));
        assert!(m.money_emoji(&msg, 0).is_some());

        // Same text and join time; only the reputation changes
        let msg = Message::text(1, -1, "💰💰 easy gains")
            .with_joined_at(now - Duration::hours(1));
        assert!(m.money_emoji(&msg, 300).is_none());
    }

    #[test]
    fn blocked_script_without_url_removes_content_only() {
        let hit = matchers()
            .script_violation("привет всем")
            .expect("should detect script");
        assert_eq!(hit.category, ViolationCategory::DisallowedScript);
        assert_eq!(hit.action, Action::DeleteAndWarn);
    }

    #[test]
    fn blocked_script_with_url_removes_sender() {
        let hit = matchers()
            .script_violation("привет https://scam.example")
            .expect("should detect script");
        assert_eq!(hit.action, Action::Ban);
    }

    #[test]
    fn allowed_script_never_triggers() {
        assert!(matchers().script_violation("नमस्ते सबको").is_none());
    }

    #[test]
    fn keyword_weight_scales_with_distinct_matches() {
        let m = matchers();
        let one = m.check_keywords("claim now before it ends").unwrap();
        assert_eq!(one.score, 0.3);

        let two = m.check_keywords("claim now and act fast").unwrap();
        assert_eq!(two.score, 0.5);

        let three = m
            .check_keywords("claim now, act fast, guaranteed profit")
            .unwrap();
        assert_eq!(three.score, 0.8);
    }

    #[test]
    fn allowed_domain_passes_unknown_domain_scores() {
        let m = matchers();
        assert!(m.check_urls("chart at https://tradingview.com/x").is_none());

        let hit = m.check_urls("see https://random-site.example/offer").unwrap();
        assert_eq!(hit.score, 0.8);
        assert_eq!(hit.forced_action, Some(Action::Mute));
    }

    #[test]
    fn crypto_address_adds_flat_weight() {
        let hit = matchers()
            .check_crypto("send to 0x52908400098527886E0F7030069857D2E4169EE7")
            .unwrap();
        assert_eq!(hit.score, 0.4);
    }

    #[test]
    fn duplicate_mentions_are_stronger_evidence() {
        let m = matchers();
        let hit = m
            .check_mention_spam("@promo @promo @promo check", "@promo @promo @promo check")
            .unwrap();
        assert!(hit.score >= 0.5);
    }

    #[test]
    fn allow_list_matches_verbatim_substring_only() {
        let m = matchers();
        let hit = TextVariants::derive("anyone know how to get promo code in mudrex?");
        assert!(m.allow_listed(&hit).is_some());

        let miss = TextVariants::derive("anyone know how to get bonus codes?");
        assert!(m.allow_listed(&miss).is_none());
    }
}
