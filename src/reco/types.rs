use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

const PLACEHOLDER_PREFIX: &str = "pending:";

static NEXT_PLACEHOLDER: AtomicU64 = AtomicU64::new(1);

/// Opaque recommendation identifier assigned by the server
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecoId(String);

impl RecoId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  /// A locally generated stand-in used until the server assigns the real id.
  pub fn placeholder() -> Self {
    let n = NEXT_PLACEHOLDER.fetch_add(1, Ordering::Relaxed);
    Self(format!("{PLACEHOLDER_PREFIX}{n}"))
  }

  pub fn is_placeholder(&self) -> bool {
    self.0.starts_with(PLACEHOLDER_PREFIX)
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for RecoId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Identity of the viewing (and acting) user
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for UserId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Kind of work being recommended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Media {
  Manga,
  Anime,
  Other,
}

impl fmt::Display for Media {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Media::Manga => "manga",
      Media::Anime => "anime",
      Media::Other => "other",
    };
    f.write_str(name)
  }
}

impl FromStr for Media {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "manga" => Ok(Media::Manga),
      "anime" => Ok(Media::Anime),
      "other" => Ok(Media::Other),
      other => Err(format!("unknown media `{other}` (expected manga, anime or other)")),
    }
  }
}

/// One recommendation as seen by a specific viewing user.
///
/// `is_upvoted_by` is relative to the viewer whose cache holds this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationItem {
  pub id: RecoId,
  pub name: String,
  pub link: Option<String>,
  pub media: Media,
  pub created_by: UserId,
  pub upvote_count: u32,
  pub is_upvoted_by: bool,
}

/// Authored fields of a recommendation about to be created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecommendation {
  pub name: String,
  pub link: Option<String>,
  pub media: Media,
}
