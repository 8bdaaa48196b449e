//! Rule based classification of window labels into activity categories.
//! [CategoryRuleSet] is resolved in a fixed priority order, so the same label
//! always lands in the same category.

pub mod external;

use std::{fmt::Display, io::ErrorKind, path::Path};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Activity categories mirror the built-in productive/neutral/distracting
/// split, with [Category::Uncategorized] reserved for labels no rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Productive,
    Neutral,
    Distracting,
    Uncategorized,
}

impl Category {
    /// Weight used by the productivity score. Neutral time counts for half.
    pub fn score_weight(&self) -> f64 {
        match self {
            Category::Productive => 1.0,
            Category::Neutral => 0.5,
            Category::Distracting | Category::Uncategorized => 0.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Productive => "productive",
            Category::Neutral => "neutral",
            Category::Distracting => "distracting",
            Category::Uncategorized => "uncategorized",
        }
    }

    pub fn from_name(name: &str) -> Option<Category> {
        match name.trim().to_lowercase().as_str() {
            "productive" => Some(Category::Productive),
            "neutral" => Some(Category::Neutral),
            "distracting" => Some(Category::Distracting),
            "uncategorized" => Some(Category::Uncategorized),
            _ => None,
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single match rule. Patterns are stored as written by the user and
/// interpreted on match:
/// - `=name` requires a whole token of the label to equal `name`.
/// - patterns containing `*` are wildcards checked against label tokens,
///   so `*.github.com` matches browser tab hosts.
/// - everything else is substring containment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pattern(String);

impl Pattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    /// Whether this pattern matches the already normalized label. Empty
    /// patterns never match, they are not an error.
    fn matches(&self, label: &str) -> bool {
        let pattern = self.0.trim().to_lowercase();
        if pattern.is_empty() {
            return false;
        }

        if let Some(exact) = pattern.strip_prefix('=') {
            return label == exact || label.split_whitespace().any(|token| token == exact);
        }

        if pattern.contains('*') {
            return label
                .split_whitespace()
                .any(|token| wildcard_match(&pattern, token))
                || wildcard_match(&pattern, label);
        }

        label.contains(&pattern)
    }
}

/// Glob style matching with `*` as the only wildcard. Classic two pointer
/// scan with backtracking to the last star.
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut star_t = 0usize;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some(p);
            star_t = t;
            p += 1;
        } else if let Some(star_p) = star {
            p = star_p + 1;
            star_t += 1;
            t = star_t;
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}

/// Lowercases and trims a label before matching. Classification and rule
/// patterns both go through this, which keeps matching case-insensitive.
pub fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Ordered rule set. Categories are tested in `priority` order and the first
/// category with a matching pattern wins. Labels nothing matches resolve to
/// `fallback`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRuleSet {
    priority: Vec<Category>,
    rules: Vec<CategoryRules>,
    fallback: Category,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRules {
    pub category: Category,
    pub patterns: Vec<Pattern>,
}

impl CategoryRuleSet {
    pub fn new(rules: Vec<CategoryRules>, priority: Vec<Category>, fallback: Category) -> Self {
        Self {
            priority,
            rules,
            fallback,
        }
    }

    pub fn fallback(&self) -> Category {
        self.fallback
    }

    /// Total classification function. Never fails, never skips a category.
    pub fn classify(&self, label: &str) -> Category {
        let label = normalize_label(label);
        for category in &self.priority {
            let matched = self
                .rules
                .iter()
                .filter(|r| r.category == *category)
                .flat_map(|r| r.patterns.iter())
                .any(|pattern| pattern.matches(&label));
            if matched {
                return *category;
            }
        }
        self.fallback
    }

    /// Reads rules from a json file, falling back to the built-in mapping
    /// when the file is absent. A corrupted file is reported and replaced by
    /// the defaults instead of stopping the daemon.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(v) => Ok(v),
                Err(e) => {
                    warn!("Ignoring unreadable rule file {path:?}: {e}");
                    Ok(Self::default())
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Default for CategoryRuleSet {
    fn default() -> Self {
        let productive = [
            "code",
            "intellij",
            "pycharm",
            "webstorm",
            "terminal",
            "iterm",
            "cmd",
            "powershell",
            "word",
            "excel",
            "notion",
            "jira",
            "confluence",
            "figma",
            "photoshop",
            "zoom",
            "slack",
            "*.github.com",
        ];
        let neutral = [
            "chrome",
            "firefox",
            "safari",
            "edge",
            "finder",
            "explorer",
            "calendar",
            "mail",
            "telegram",
            "spotify",
            "settings",
        ];
        let distracting = [
            "youtube",
            "netflix",
            "twitch",
            "facebook",
            "instagram",
            "twitter",
            "tiktok",
            "reddit",
            "steam",
            "minecraft",
            "fortnite",
        ];

        let to_rules = |category, patterns: &[&str]| CategoryRules {
            category,
            patterns: patterns.iter().map(|p| Pattern::new(*p)).collect(),
        };

        Self {
            priority: vec![
                Category::Productive,
                Category::Distracting,
                Category::Neutral,
            ],
            rules: vec![
                to_rules(Category::Productive, &productive),
                to_rules(Category::Neutral, &neutral),
                to_rules(Category::Distracting, &distracting),
            ],
            fallback: Category::Uncategorized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> CategoryRuleSet {
        CategoryRuleSet::new(
            vec![
                CategoryRules {
                    category: Category::Productive,
                    patterns: vec![Pattern::new("code"), Pattern::new("*.github.com")],
                },
                CategoryRules {
                    category: Category::Distracting,
                    patterns: vec![Pattern::new("youtube"), Pattern::new("=game")],
                },
                CategoryRules {
                    category: Category::Neutral,
                    patterns: vec![Pattern::new("firefox")],
                },
            ],
            vec![
                Category::Productive,
                Category::Distracting,
                Category::Neutral,
            ],
            Category::Uncategorized,
        )
    }

    #[test]
    fn classify_is_case_insensitive() {
        assert_eq!(rules().classify("Visual Studio CODE"), Category::Productive);
        assert_eq!(rules().classify("  YouTube Music  "), Category::Distracting);
    }

    #[test]
    fn classify_priority_order_wins() {
        // Matches both productive (code) and neutral (firefox), productive is
        // declared first.
        assert_eq!(
            rules().classify("vs code docs - firefox"),
            Category::Productive
        );
    }

    #[test]
    fn classify_falls_back_without_match() {
        assert_eq!(rules().classify("RandomApp.exe"), Category::Uncategorized);
        assert_eq!(rules().classify(""), Category::Uncategorized);
    }

    #[test]
    fn classify_is_deterministic() {
        let rules = rules();
        let first = rules.classify("github.com/worklens - firefox");
        for _ in 0..10 {
            assert_eq!(rules.classify("github.com/worklens - firefox"), first);
        }
    }

    #[test]
    fn wildcard_patterns_match_hosts() {
        assert_eq!(rules().classify("gist.github.com issue 5"), Category::Productive);
        // The `*` has to consume the subdomain including the dot.
        assert_eq!(rules().classify("github.org something"), Category::Uncategorized);
    }

    #[test]
    fn exact_patterns_require_full_token() {
        assert_eq!(rules().classify("game"), Category::Distracting);
        assert_eq!(rules().classify("launch game now"), Category::Distracting);
        assert_eq!(rules().classify("endgame trailer"), Category::Uncategorized);
    }

    #[test]
    fn empty_pattern_is_not_a_match() {
        let rules = CategoryRuleSet::new(
            vec![CategoryRules {
                category: Category::Productive,
                patterns: vec![Pattern::new("   ")],
            }],
            vec![Category::Productive],
            Category::Neutral,
        );
        assert_eq!(rules.classify("anything"), Category::Neutral);
    }

    #[test]
    fn wildcard_matcher_edge_cases() {
        assert!(wildcard_match("*", "anything"));
        assert!(wildcard_match("a*c", "abbbc"));
        assert!(!wildcard_match("a*c", "abbb"));
        assert!(wildcard_match("*.github.com", "gist.github.com"));
        assert!(!wildcard_match("*.github.com", "github.com"));
    }

    #[test]
    fn default_rules_cover_original_mappings() {
        let rules = CategoryRuleSet::default();
        assert_eq!(rules.classify("Visual Studio Code"), Category::Productive);
        assert_eq!(rules.classify("Mozilla Firefox"), Category::Neutral);
        assert_eq!(rules.classify("watching netflix"), Category::Distracting);
        assert_eq!(rules.fallback(), Category::Uncategorized);
    }
}
