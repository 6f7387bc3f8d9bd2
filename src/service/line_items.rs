//! Line-item manager: the only writer of a reservation's child collections.

use chrono::{DateTime, Utc};

use crate::domain::{LineItemDraft, LineItems, ReservationId};
use crate::error::ReservationError;
use crate::persistence::StoreTx;

/// Supersedes every active child of the reservation and inserts `items` as
/// the new active set.
///
/// Used on create (nothing to supersede yet) and on update. Superseded rows
/// are kept with `active = false` for audit; availability and reporting
/// queries never see them.
///
/// # Errors
///
/// Returns [`ReservationError::Persistence`] on storage failure. The caller's
/// unit of work must then be dropped, which discards the partial replace.
pub async fn replace_children<T: StoreTx>(
    tx: &mut T,
    reservation_id: ReservationId,
    items: &LineItemDraft,
    actor: i64,
    now: DateTime<Utc>,
) -> Result<LineItems, ReservationError> {
    let superseded = tx.deactivate_line_items(reservation_id, actor, now).await?;
    let inserted = tx
        .insert_line_items(reservation_id, items, actor, now)
        .await?;
    tracing::debug!(
        %reservation_id,
        superseded,
        tables = inserted.tables.len(),
        products = inserted.products.len(),
        events = inserted.events.len(),
        payments = inserted.payments.len(),
        "line items replaced"
    );
    Ok(inserted)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::ProductLineDraft;
    use crate::persistence::{MemoryStore, ReservationStore};
    use rust_decimal::Decimal;

    fn product(product_id: i64) -> ProductLineDraft {
        ProductLineDraft {
            product_id,
            quantity: 1,
            subtotal: Decimal::new(1500, 2),
            observation: None,
        }
    }

    #[tokio::test]
    async fn second_replace_supersedes_first() {
        let store = MemoryStore::new();
        let id = ReservationId::new(77);
        let first = LineItemDraft {
            products: vec![product(1), product(2)],
            ..LineItemDraft::with_tables(&[4])
        };
        let second = LineItemDraft {
            products: vec![product(3)],
            ..LineItemDraft::default()
        };

        let Ok(mut tx) = store.begin().await else {
            panic!("begin failed");
        };
        let Ok(_) = replace_children(&mut tx, id, &first, 1, Utc::now()).await else {
            panic!("first replace failed");
        };
        let Ok(current) = replace_children(&mut tx, id, &second, 2, Utc::now()).await else {
            panic!("second replace failed");
        };
        let Ok(()) = tx.commit().await else {
            panic!("commit failed");
        };

        assert_eq!(current.products.len(), 1);
        let Ok(active) = store.line_items(id, false).await else {
            panic!("load failed");
        };
        assert_eq!(active.products.len(), 1);
        assert!(active.tables.is_empty());
        assert_eq!(active.products.first().map(|p| p.product_id), Some(3));

        let Ok(all) = store.line_items(id, true).await else {
            panic!("load failed");
        };
        assert_eq!(all.products.len(), 3);
        assert_eq!(all.products.iter().filter(|p| !p.active).count(), 2);
        assert_eq!(all.tables.len(), 1);
    }
}
