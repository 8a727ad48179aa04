//! Canned-response table and selection policy
//!
//! The table maps trigger keywords (e.g. "過來", "坐下") to candidate replies
//! and keeps a reserved generic category ("通用") for everything else.
//!
//! Selection for an inbound text:
//! 1. draw `r` in `[0, 1)`
//! 2. find the first category (definition order) whose keyword occurs in the text
//! 3. use the generic list when `r < 0.7` or nothing matched, otherwise the
//!    matched category's list
//! 4. pick one reply uniformly and prefix it with the persona tag

use std::path::Path;

use async_trait::async_trait;
use hanji_core::{HanjiError, HanjiResult, ReplyGenerator};
use parking_lot::Mutex;
use tracing::debug;

use super::random::{RandomSource, ThreadRandom};

/// Reserved category holding the generic fallback replies
pub const GENERIC_CATEGORY: &str = "通用";

/// Probability of answering with a generic reply even when a keyword matched
pub const GENERIC_REPLY_PROBABILITY: f64 = 0.7;

/// Tag prepended to every canned reply
pub const DEFAULT_PERSONA_TAG: &str = "【憨吉】";

/// Keyword category with its candidate replies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CannedCategory {
    pub keyword: String,
    pub replies: Vec<String>,
}

impl CannedCategory {
    pub fn new(keyword: impl Into<String>, replies: &[&str]) -> Self {
        Self {
            keyword: keyword.into(),
            replies: replies.iter().map(|r| r.to_string()).collect(),
        }
    }
}

/// Immutable keyword-to-replies table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CannedResponseTable {
    categories: Vec<CannedCategory>,
    generic: Vec<String>,
}

impl Default for CannedResponseTable {
    fn default() -> Self {
        Self {
            categories: vec![
                CannedCategory::new(
                    "過來",
                    &[
                        "搖著尾巴衝過來了！",
                        "咚咚咚跑過來，撲到你腳邊",
                        "慢慢走過來，順便打了個哈欠",
                    ],
                ),
                CannedCategory::new(
                    "坐下",
                    &[
                        "乖乖坐好，眼睛盯著你的零食",
                        "屁股一沉，坐下了！",
                        "坐下了...然後直接躺平",
                    ],
                ),
                CannedCategory::new(
                    "握手",
                    &["伸出右手掌～", "把肉球放到你手上", "換左手也可以喔！"],
                ),
                CannedCategory::new(
                    "吃飯",
                    &[
                        "眼睛發亮，口水直流！",
                        "已經叼著碗在旁邊等了",
                        "汪！吃飯最重要！",
                    ],
                ),
                CannedCategory::new(
                    "散步",
                    &[
                        "叼著牽繩跑過來了！",
                        "開心到原地轉圈圈",
                        "已經在門口等你了，快點快點",
                    ],
                ),
            ],
            generic: ["歪著頭看你", "汪汪！", "搖搖尾巴", "蹭蹭你的腳", "打了一個大哈欠"]
                .iter()
                .map(|r| r.to_string())
                .collect(),
        }
    }
}

impl CannedResponseTable {
    /// Build a table, validating that every list is usable
    pub fn new(categories: Vec<CannedCategory>, generic: Vec<String>) -> HanjiResult<Self> {
        if generic.is_empty() {
            return Err(HanjiError::validation(format!(
                "canned responses need at least one '{}' reply",
                GENERIC_CATEGORY
            )));
        }

        for category in &categories {
            if category.keyword.is_empty() {
                return Err(HanjiError::validation(
                    "canned response keyword must not be empty",
                ));
            }
            if category.replies.is_empty() {
                return Err(HanjiError::validation(format!(
                    "canned response category '{}' has no replies",
                    category.keyword
                )));
            }
        }

        Ok(Self {
            categories,
            generic,
        })
    }

    /// Parse a YAML mapping of `keyword: [replies...]`
    ///
    /// Definition order is kept; the `通用` key holds the generic replies.
    pub fn from_yaml_str(content: &str) -> HanjiResult<Self> {
        let mapping: serde_yaml::Mapping = serde_yaml::from_str(content)
            .map_err(|e| HanjiError::config(format!("Invalid canned responses: {}", e)))?;

        let mut categories = Vec::new();
        let mut generic = Vec::new();

        for (key, value) in mapping {
            let keyword = key
                .as_str()
                .ok_or_else(|| HanjiError::config("canned response keys must be strings"))?
                .to_string();
            let replies: Vec<String> = serde_yaml::from_value(value).map_err(|e| {
                HanjiError::config(format!("Invalid replies for '{}': {}", keyword, e))
            })?;

            if keyword == GENERIC_CATEGORY {
                generic = replies;
            } else {
                categories.push(CannedCategory { keyword, replies });
            }
        }

        Self::new(categories, generic)
    }

    /// Load a YAML table from disk
    pub fn from_file(path: impl AsRef<Path>) -> HanjiResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn categories(&self) -> &[CannedCategory] {
        &self.categories
    }

    pub fn generic(&self) -> &[String] {
        &self.generic
    }

    /// First category whose keyword occurs in `text`
    pub fn match_category(&self, text: &str) -> Option<&CannedCategory> {
        self.categories
            .iter()
            .find(|category| text.contains(category.keyword.as_str()))
    }
}

/// Canned reply generator
pub struct CannedResponder {
    table: CannedResponseTable,
    persona_tag: String,
    rng: Mutex<Box<dyn RandomSource>>,
}

impl CannedResponder {
    /// Create a responder backed by the thread-local RNG
    pub fn new(table: CannedResponseTable) -> Self {
        Self::with_random(table, Box::new(ThreadRandom))
    }

    /// Create a responder with an explicit random source
    pub fn with_random(table: CannedResponseTable, rng: Box<dyn RandomSource>) -> Self {
        Self {
            table,
            persona_tag: DEFAULT_PERSONA_TAG.to_string(),
            rng: Mutex::new(rng),
        }
    }

    /// Override the tag prepended to replies
    pub fn with_persona_tag(mut self, tag: impl Into<String>) -> Self {
        self.persona_tag = tag.into();
        self
    }

    pub fn table(&self) -> &CannedResponseTable {
        &self.table
    }

    /// Pick a reply for `text`
    pub fn select(&self, text: &str) -> String {
        let mut rng = self.rng.lock();
        let roll = rng.next_f64();
        let matched = self.table.match_category(text);

        let (source, replies) = match matched {
            Some(category) if roll >= GENERIC_REPLY_PROBABILITY => {
                (category.keyword.as_str(), &category.replies)
            }
            _ => (GENERIC_CATEGORY, &self.table.generic),
        };

        let index = rng.next_index(replies.len());
        let reply = match replies.get(index).or_else(|| self.table.generic.first()) {
            Some(reply) => reply.as_str(),
            None => "",
        };
        debug!("Canned reply from '{}' (roll {:.2})", source, roll);

        format!("{}{}", self.persona_tag, reply)
    }
}

#[async_trait]
impl ReplyGenerator for CannedResponder {
    async fn generate(&self, text: &str) -> String {
        self.select(text)
    }

    fn name(&self) -> &'static str {
        "canned"
    }
}
