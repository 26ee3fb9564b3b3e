use catalog_recon_common::{ImageDescriptor, MatchTier, DEFAULT_MIN_TOKEN_LEN};

/// Matcher thresholds
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOptions {
    /// Minimum accepted token-subset score
    pub token_subset_threshold: f64,
    /// Minimum accepted keyword-category score
    pub keyword_threshold: f64,
    /// Tokens of this length or shorter are ignored
    pub min_token_len: usize,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            token_subset_threshold: 0.70,
            keyword_threshold: 0.30,
            min_token_len: DEFAULT_MIN_TOKEN_LEN,
        }
    }
}

/// A scored image inside one tier
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub image: &'a ImageDescriptor,
    pub tier: MatchTier,
    pub score: f64,
    /// Keywords of the entry name that map to the image's category
    pub keyword_hits: usize,
    pub rationale: String,
}
