//! Caching implementations for recommendation types.

use crate::cache::{Cacheable, Collection};

use super::types::RecommendationItem;

/// The per-user cached list of recommendations.
pub type ItemCollection = Collection<RecommendationItem>;

impl Cacheable for RecommendationItem {
  fn cache_key(&self) -> &str {
    self.id.as_str()
  }

  fn entity_type() -> &'static str {
    "recommendation"
  }

  fn check(&self) -> Result<(), String> {
    // The viewer's own vote is part of the count.
    if self.is_upvoted_by && self.upvote_count == 0 {
      return Err("upvoted by the viewer but upvote count is 0".to_string());
    }
    Ok(())
  }
}
