use anyhow::Result;
use futures::future::BoxFuture;

use crate::domain::Item;

/// Side effect applied to an item judged not relevant.
///
/// `Ok(true)` means the item was dismissed, `Ok(false)` that the handler
/// declined. Both `Ok(false)` and `Err` are isolated to the one item.
pub trait ActionHandler: Send + Sync {
    fn apply<'a>(&'a self, item: &'a Item) -> BoxFuture<'a, Result<bool>>;
}
