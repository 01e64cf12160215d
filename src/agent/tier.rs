//! Model-Tier Selector (§4.F).
//!
//! A pure function from a lowercased model identifier to a step budget
//! and prompt tier. Grounded in the teacher's `LoopConfig` named
//! constructors (`gateway()`/`tui()`/`scheduler()`), generalised here into
//! a table-driven function instead of a fixed handful of presets.

use serde::{Deserialize, Serialize};

/// Prompt tier selected for a model, consulted by the Prompt Composer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptTier {
    Tiny,
    Small,
    Large,
}

impl std::fmt::Display for PromptTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PromptTier::Tiny => write!(f, "tiny"),
            PromptTier::Small => write!(f, "small"),
            PromptTier::Large => write!(f, "large"),
        }
    }
}

const DEFAULT_STEP_BUDGET: u32 = 12;
const DEFAULT_TIER: PromptTier = PromptTier::Small;

/// Ordered substring groups; first match wins. Declared in the exact
/// order of the spec's tier table.
const TIER_TABLE: &[(&[&str], u32, PromptTier)] = &[
    (&["0.5b", "0.6b", "1b", "1.5b", "2b"], 4, PromptTier::Tiny),
    (&["3b", "4b"], 6, PromptTier::Tiny),
    (&["7b", "8b"], 10, PromptTier::Small),
    (&["13b", "14b"], 15, PromptTier::Small),
    (&["30b", "32b", "33b", "34b", "70b", "72b", "405b"], 25, PromptTier::Large),
    (&["claude", "gpt-4", "gpt4", "o1", "gemini", "grok"], 25, PromptTier::Large),
];

/// Resolve a model identifier into (step_budget, prompt_tier). Matching is
/// case-insensitive and substring-based, ordered, first match wins; an
/// unmatched identifier gets the default band.
pub fn resolve_tier(model: &str) -> (u32, PromptTier) {
    let lower = model.to_lowercase();
    for (substrings, budget, tier) in TIER_TABLE {
        if substrings.iter().any(|s| lower.contains(s)) {
            return (*budget, *tier);
        }
    }
    (DEFAULT_STEP_BUDGET, DEFAULT_TIER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiny_band_for_sub_2b_models() {
        assert_eq!(resolve_tier("qwen2.5:0.5b"), (4, PromptTier::Tiny));
        assert_eq!(resolve_tier("Llama-3.2-1B"), (4, PromptTier::Tiny));
    }

    #[test]
    fn tiny_band_for_3b_4b() {
        assert_eq!(resolve_tier("llama3.2:3b"), (6, PromptTier::Tiny));
    }

    #[test]
    fn small_band_for_7b_8b_and_13b_14b() {
        assert_eq!(resolve_tier("llama3:8b"), (10, PromptTier::Small));
        assert_eq!(resolve_tier("vicuna-13b"), (15, PromptTier::Small));
    }

    #[test]
    fn large_band_for_frontier_size_and_named_models() {
        assert_eq!(resolve_tier("llama3:70b"), (25, PromptTier::Large));
        assert_eq!(resolve_tier("claude-opus-4"), (25, PromptTier::Large));
        assert_eq!(resolve_tier("gpt-4o"), (25, PromptTier::Large));
    }

    #[test]
    fn unmatched_identifier_gets_default_band() {
        assert_eq!(resolve_tier("some-custom-model"), (12, PromptTier::Small));
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(resolve_tier("CLAUDE-3.5-SONNET"), (25, PromptTier::Large));
    }
}
