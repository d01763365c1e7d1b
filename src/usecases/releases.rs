//! Release lookup for chart annotations.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::config::RepoConfig;
use crate::domain::Release;
use crate::ports::{MAX_RELEASES_PAGE, TrafficSource};

/// Releases per repository name. Lookups that fail are logged and left out.
pub async fn fetch_releases(
  source: &dyn TrafficSource,
  repos: &[RepoConfig],
) -> BTreeMap<String, Vec<Release>> {
  let mut by_repo = BTreeMap::new();

  for repo in repos {
    match source
      .get_releases(&repo.owner, &repo.name, MAX_RELEASES_PAGE)
      .await
    {
      Ok(releases) => {
        debug!(repo = %repo.full_name(), count = releases.len(), "Releases fetched");
        by_repo.insert(repo.name.clone(), releases);
      }
      Err(e) => {
        warn!(repo = %repo.full_name(), error = %e, "Could not fetch releases");
      }
    }
  }

  by_repo
}
