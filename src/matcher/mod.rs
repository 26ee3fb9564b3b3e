//! Image matcher
//!
//! Picks the best image for one catalog entry. Tiers are tried in order and
//! the first tier that produces an acceptable candidate wins; a weaker tier
//! is never consulted once a stronger one has an answer.
//!
//! ## Tiers
//! 1. exact: `normalize(name) == normalize(stem)`, score 1.0
//! 2. token-subset: every token of the smaller set is related to a token of
//!    the larger one; score = matched / max(|A|, |B|)
//! 3. keyword-category: keywords in the name select categories, candidates
//!    from those categories are scored by token overlap
//!
//! Pure: no filesystem access, all inputs are passed in.

pub mod types;

use catalog_recon_common::{
    normalize, tokenize, tokens_related, DecisionStatus, KeywordTable, MatchDecision, MatchTier,
};
use crate::scanner::CandidateIndex;
use std::collections::HashSet;
use std::path::PathBuf;
pub use types::{Candidate, MatchOptions};

#[derive(Debug, Clone)]
pub struct Matcher {
    options: MatchOptions,
    keywords: KeywordTable,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(MatchOptions::default(), KeywordTable::builtin())
    }
}

impl Matcher {
    pub fn new(options: MatchOptions, keywords: KeywordTable) -> Self {
        Self { options, keywords }
    }

    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    pub fn keywords(&self) -> &KeywordTable {
        &self.keywords
    }

    /// Decide on an image for one entry.
    ///
    /// # Arguments
    /// * `entry_id` - id used in the decision
    /// * `name` - display name of the entry
    /// * `index` - candidate images
    /// * `claimed` - absolute paths of images already taken in this run
    pub fn match_entry(
        &self,
        entry_id: &str,
        name: &str,
        index: &CandidateIndex,
        claimed: &HashSet<PathBuf>,
    ) -> MatchDecision {
        let key = normalize(name);
        if key.is_empty() {
            return MatchDecision::without_image(
                entry_id,
                name,
                DecisionStatus::Skipped,
                "name normalizes to an empty key",
            );
        }

        let name_tokens = tokenize(name, self.min_token_len());

        let winner = self
            .exact_tier(&key, index)
            .or_else(|| self.token_subset_tier(&key, &name_tokens, index))
            .or_else(|| self.keyword_tier(&key, &name_tokens, index));

        match winner {
            None => MatchDecision::without_image(
                entry_id,
                name,
                DecisionStatus::Skipped,
                format!("no candidate cleared any tier for \"{}\"", key),
            ),
            Some(candidate) if claimed.contains(&candidate.image.absolute_path) => {
                MatchDecision::without_image(
                    entry_id,
                    name,
                    DecisionStatus::Skipped,
                    format!(
                        "best {} candidate {} ({:.2}) is already claimed",
                        candidate.tier, candidate.image.filename, candidate.score
                    ),
                )
            }
            Some(candidate) => MatchDecision::matched(
                entry_id,
                name,
                candidate.image.clone(),
                candidate.tier,
                candidate.score,
                candidate.rationale,
            ),
        }
    }

    fn min_token_len(&self) -> usize {
        self.options.min_token_len
    }

    /// Image stem tokens long enough to count for this matcher.
    fn significant_tokens(&self, tokens: &[String]) -> Vec<String> {
        tokens
            .iter()
            .filter(|t| t.chars().count() > self.min_token_len())
            .cloned()
            .collect()
    }

    fn exact_tier<'a>(&self, key: &str, index: &'a CandidateIndex) -> Option<Candidate<'a>> {
        // Every image with this stem competes, not only the first-seen one.
        let candidates = index
            .stem_matches(key)
            .map(|image| Candidate {
                image,
                tier: MatchTier::Exact,
                score: 1.0,
                keyword_hits: self.keywords.keyword_hits(key, &image.category),
                rationale: format!("normalized name \"{}\" equals the stem of {}", key, image.filename),
            })
            .collect();

        pick_best(candidates)
    }

    fn token_subset_tier<'a>(
        &self,
        key: &str,
        name_tokens: &[String],
        index: &'a CandidateIndex,
    ) -> Option<Candidate<'a>> {
        let threshold = self.options.token_subset_threshold;
        let mut candidates = Vec::new();

        for (image, tokens) in index.tokenized_candidates() {
            let image_tokens = self.significant_tokens(tokens);
            let Some((matched, score)) = subset_score(name_tokens, &image_tokens) else {
                continue;
            };
            if score < threshold {
                continue;
            }
            candidates.push(Candidate {
                image,
                tier: MatchTier::TokenSubset,
                score,
                keyword_hits: self.keywords.keyword_hits(key, &image.category),
                rationale: format!(
                    "{} of {} tokens shared with {} (score {:.2} >= {:.2})",
                    matched,
                    name_tokens.len().max(image_tokens.len()),
                    image.filename,
                    score,
                    threshold
                ),
            });
        }

        pick_best(candidates)
    }

    fn keyword_tier<'a>(
        &self,
        key: &str,
        name_tokens: &[String],
        index: &'a CandidateIndex,
    ) -> Option<Candidate<'a>> {
        let categories = self.keywords.categories_for(key);
        if categories.is_empty() {
            return None;
        }
        let keywords: Vec<&str> = self
            .keywords
            .matching_rules(key)
            .map(|rule| rule.keyword.as_str())
            .collect();

        let threshold = self.options.keyword_threshold;
        let mut candidates = Vec::new();

        for (image, tokens) in index.tokenized_candidates() {
            if !categories.contains(&normalize(&image.category)) {
                continue;
            }
            let image_tokens = self.significant_tokens(tokens);
            let score = overlap_score(name_tokens, &image_tokens);
            if score < threshold || score <= 0.0 {
                continue;
            }
            candidates.push(Candidate {
                image,
                tier: MatchTier::KeywordCategory,
                score,
                keyword_hits: self.keywords.keyword_hits(key, &image.category),
                rationale: format!(
                    "keywords [{}] select category \"{}\"; token overlap {:.2} with {} (>= {:.2})",
                    keywords.join(", "),
                    image.category,
                    score,
                    image.filename,
                    threshold
                ),
            });
        }

        pick_best(candidates)
    }
}

/// Token-subset score. `None` unless every token of the smaller set is
/// related to some token of the larger set.
pub fn subset_score(a: &[String], b: &[String]) -> Option<(usize, f64)> {
    if a.is_empty() || b.is_empty() {
        return None;
    }
    let (shorter, longer) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    let matched = shorter
        .iter()
        .filter(|t| longer.iter().any(|u| tokens_related(t, u)))
        .count();
    if matched < shorter.len() {
        return None;
    }

    Some((matched, matched as f64 / a.len().max(b.len()) as f64))
}

/// Share of name tokens related to some image token, over the larger set.
pub fn overlap_score(name_tokens: &[String], image_tokens: &[String]) -> f64 {
    let denominator = name_tokens.len().max(image_tokens.len());
    if denominator == 0 {
        return 0.0;
    }
    let matched = name_tokens
        .iter()
        .filter(|t| image_tokens.iter().any(|u| tokens_related(t, u)))
        .count();
    matched as f64 / denominator as f64
}

/// Highest score; ties go to more category keyword hits, then the
/// lexicographically smallest filename, then the smallest path.
fn pick_best(mut candidates: Vec<Candidate<'_>>) -> Option<Candidate<'_>> {
    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.keyword_hits.cmp(&a.keyword_hits))
            .then_with(|| a.image.filename.cmp(&b.image.filename))
            .then_with(|| a.image.absolute_path.cmp(&b.image.absolute_path))
    });
    candidates.into_iter().next()
}
