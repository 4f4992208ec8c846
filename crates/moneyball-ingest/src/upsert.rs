// Idempotent writes of derived documents into the store.

use std::fmt;

use moneyball_core::store::{Document, DocumentStore, StoreError, UpsertPolicy};

/// What an upsert did to the stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpsertOutcome {
    Created,
    Skipped,
    Merged,
    Overwritten,
}

impl UpsertOutcome {
    /// Whether the store was written.
    pub fn wrote(&self) -> bool {
        !matches!(self, UpsertOutcome::Skipped)
    }
}

impl fmt::Display for UpsertOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UpsertOutcome::Created => "created",
            UpsertOutcome::Skipped => "skipped",
            UpsertOutcome::Merged => "merged",
            UpsertOutcome::Overwritten => "overwritten",
        };
        f.write_str(s)
    }
}

/// Write `payload` under `collection/key` according to `policy`.
///
/// The existence check and the write are two store calls. Under `Merge` the
/// write itself is a per-field merge, so a concurrent writer that slips in
/// between them only ever has its other fields preserved. A merge whose
/// fields already match the stored values is reported as `Skipped` and not
/// written.
pub async fn upsert(
    store: &dyn DocumentStore,
    collection: &str,
    key: &str,
    payload: &Document,
    policy: UpsertPolicy,
) -> Result<UpsertOutcome, StoreError> {
    match policy {
        UpsertPolicy::SkipIfExists => {
            if store.exists(collection, key).await? {
                return Ok(UpsertOutcome::Skipped);
            }
            store.set(collection, key, payload, false).await?;
            Ok(UpsertOutcome::Created)
        }
        UpsertPolicy::Merge => match store.get(collection, key).await? {
            None => {
                store.set(collection, key, payload, true).await?;
                Ok(UpsertOutcome::Created)
            }
            Some(existing) if is_subset(payload, &existing) => Ok(UpsertOutcome::Skipped),
            Some(_) => {
                store.set(collection, key, payload, true).await?;
                Ok(UpsertOutcome::Merged)
            }
        },
        UpsertPolicy::AlwaysOverwrite => {
            let existed = store.exists(collection, key).await?;
            store.set(collection, key, payload, false).await?;
            Ok(if existed {
                UpsertOutcome::Overwritten
            } else {
                UpsertOutcome::Created
            })
        }
    }
}

/// True when every field of `payload` is already stored with the same value.
fn is_subset(payload: &Document, existing: &Document) -> bool {
    payload
        .iter()
        .all(|(field, value)| existing.get(field) == Some(value))
}
