#[cfg(test)]
mod tests {
    use crate::{
        Harness, doc,
        fakes::Fault,
        oid,
        utils::{assert_committed, assert_failed},
    };
    use engine_core::state::{CursorStore, JsonFileCursorStore};
    use model::{core::dataset::Dataset, pagination::cursor::Cursor};
    use std::{collections::BTreeMap, sync::Arc, time::Duration};
    use tokio_util::sync::CancellationToken;
    use tracing_test::traced_test;

    #[traced_test]
    #[tokio::test]
    async fn cancelled_run_leaves_every_cursor_untouched() {
        let h = Harness::new().await;
        let orders = Dataset::new("shop", "orders");
        let key = h.source.add_dataset(orders.clone());
        h.source.insert(&key, [doc(1, &[("v", "1")])]);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = h.run_with(cancel).await;

        assert!(report.cancelled);
        assert_failed(&report, &key, "cancelled");
        assert_eq!(h.cursor(&key).await, None);
        assert!(h.published(&orders).await.is_none());
    }

    #[traced_test]
    #[tokio::test]
    async fn cancellation_stops_units_still_in_flight() {
        let h = Harness::new().await;
        let fast = Dataset::new("a", "fast");
        let slow = Dataset::new("a", "slow");
        for dataset in [&fast, &slow] {
            let key = h.source.add_dataset(dataset.clone());
            h.source.insert(&key, [doc(1, &[("v", "1")])]);
        }
        h.source.inject(&slow.key(), Fault::Hang(Duration::from_secs(30)));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let report = h.run_with(cancel).await;

        assert!(report.cancelled);
        assert_committed(&report, &fast.key(), 1);
        assert_failed(&report, &slow.key(), "cancelled");
        assert_eq!(h.cursor(&slow.key()).await, None);
    }

    #[traced_test]
    #[tokio::test]
    async fn fetch_deadline_fails_only_the_slow_dataset() {
        let mut h = Harness::new().await;
        h.options.timeouts.fetch = Duration::from_millis(50);

        let fast = Dataset::new("a", "fast");
        let slow = Dataset::new("a", "slow");
        for dataset in [&fast, &slow] {
            let key = h.source.add_dataset(dataset.clone());
            h.source.insert(&key, [doc(1, &[("v", "1")])]);
        }
        h.source.inject(&slow.key(), Fault::Hang(Duration::from_secs(30)));

        let report = h.run().await;

        assert!(!report.cancelled);
        assert_committed(&report, &fast.key(), 1);
        assert_failed(&report, &slow.key(), "timeout");
        assert!(
            report.units.iter().any(|u| u
                .error
                .as_deref()
                .is_some_and(|e| e.contains("fetch exceeded"))),
            "{:?}",
            report.units
        );
    }

    #[traced_test]
    #[tokio::test]
    async fn bounded_concurrency_still_syncs_everything() {
        let mut h = Harness::new().await;
        h.options.max_concurrency = 1;

        let keys: Vec<_> = (0..5)
            .map(|i| {
                let key = h.source.add_dataset(Dataset::new("bulk", format!("c{i}")));
                h.source.insert(&key, (1..=3).map(|n| doc(n, &[("v", "x")])));
                key
            })
            .collect();

        let report = h.run().await;

        assert!(!report.has_failures());
        assert_eq!(report.metrics.datasets_committed, 5);
        assert_eq!(report.rows_appended(), 15);
        for key in &keys {
            assert_eq!(h.cursor(key).await, Some(Cursor::identifier(oid(3))));
        }
    }

    #[traced_test]
    #[tokio::test]
    async fn json_cursor_file_holds_flat_map_after_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let store: Arc<dyn CursorStore> = Arc::new(JsonFileCursorStore::new(&path));
        store
            .upsert(&"legacy.untouched".into(), &Cursor::identifier(oid(42)))
            .await
            .unwrap();

        let h = Harness::with_store(dir, store).await;
        for name in ["orders", "refunds"] {
            let key = h.source.add_dataset(Dataset::new("shop", name));
            h.source.insert(&key, (1..=2).map(|n| doc(n, &[("v", "x")])));
        }

        let report = h.run().await;
        assert_eq!(report.metrics.datasets_committed, 2);

        let raw: BTreeMap<String, String> =
            serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
        assert_eq!(raw.len(), 3);
        assert_eq!(raw["shop.orders"], oid(2));
        assert_eq!(raw["shop.refunds"], oid(2));
        assert_eq!(raw["legacy.untouched"], oid(42));
    }
}
