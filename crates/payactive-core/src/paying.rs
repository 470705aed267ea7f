use std::collections::HashSet;

use tracing::info;

use crate::error::StoreError;
use crate::store::PaymentStore;

/// Load every paying-user id from `index`. Duplicate ids collapse.
pub async fn load_paying_users(
    store: &dyn PaymentStore,
    index: &str,
) -> Result<HashSet<String>, StoreError> {
    info!(index, "Loading paying users");
    let ids = store.query_all(index).await?;
    let fetched = ids.len();
    let users: HashSet<String> = ids.into_iter().collect();
    info!(fetched, unique = users.len(), "Paying users loaded");
    Ok(users)
}
