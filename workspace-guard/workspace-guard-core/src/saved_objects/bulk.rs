use super::types::{BulkResponse, SavedObject};
use crate::error::{Result, SavedObjectsError};
use anyhow::anyhow;
use std::future::Future;
use tracing::debug;

/// Splits a bulk input into forwarded items and in-place rejections, and
/// stitches the inner response back into input order.
pub(crate) struct Partition<T> {
    allowed: Vec<T>,
    slots: Vec<Option<SavedObject>>,
}

impl<T> Partition<T> {
    /// `rejections[i]` is the error entry for `items[i]`, or `None` to forward it.
    pub fn split(items: Vec<T>, rejections: Vec<Option<SavedObject>>) -> Self {
        debug_assert_eq!(items.len(), rejections.len());
        let allowed = items
            .into_iter()
            .zip(rejections.iter())
            .filter_map(|(item, rejected)| rejected.is_none().then_some(item))
            .collect();
        Self {
            allowed,
            slots: rejections,
        }
    }

    pub fn rejected(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Send the allowed items through `forward` (skipped when none are
    /// left) and merge the result with the rejected entries.
    pub async fn forward<F, Fut>(self, forward: F) -> Result<BulkResponse>
    where
        F: FnOnce(Vec<T>) -> Fut,
        Fut: Future<Output = Result<BulkResponse>>,
    {
        let rejected = self.rejected();
        if rejected > 0 {
            debug!(rejected, forwarded = self.allowed.len(), "bulk call partially rejected");
        }
        let Self { allowed, slots } = self;
        let forwarded = if allowed.is_empty() {
            Vec::new()
        } else {
            let expected = allowed.len();
            let response = forward(allowed).await?;
            if response.saved_objects.len() != expected {
                return Err(SavedObjectsError::Internal(anyhow!(
                    "inner client returned {} entries for {} forwarded objects",
                    response.saved_objects.len(),
                    expected
                )));
            }
            response.saved_objects
        };
        let mut forwarded = forwarded.into_iter();
        let saved_objects = slots
            .into_iter()
            .map(|slot| slot.or_else(|| forwarded.next()))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                SavedObjectsError::Internal(anyhow!("bulk response shorter than input"))
            })?;
        Ok(BulkResponse { saved_objects })
    }
}
