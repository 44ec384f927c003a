/*
 * SPDX-FileCopyrightText: 2026 The heapgraph developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::scanner::StoreScanner;
use crate::graphs::{IdMap, IdMapBuilder};
use crate::parallel::ExecutionContext;
use crate::store::{GraphStore, NodeRecord, RecordStore};
use crate::utils::MemoryTracker;
use anyhow::Result;
use dsi_progress_logger::ConcurrentProgressLog;

/// Scans the node store and assigns dense identifiers to the nodes in use
/// that have the given label (or to all nodes in use, if `label` is `None`).
///
/// Ranges are decoded in parallel, but identifiers are assigned in range
/// order, so dense order is store order.
pub fn import_nodes<S: GraphStore + ?Sized>(
    store: &S,
    label: Option<u32>,
    records_per_range: Option<usize>,
    ctx: &ExecutionContext,
    tracker: &MemoryTracker,
    pl: &mut impl ConcurrentProgressLog,
) -> Result<IdMap> {
    let nodes = store.nodes();
    let scanner = StoreScanner::new(nodes, records_per_range);
    let mut builder = IdMapBuilder::new(tracker)?;

    let matches = |record: &NodeRecord| label.map_or(true, |label| record.has_label(label));

    pl.item_name("record");
    pl.start(format!(
        "Scanning {} node records with {} threads...",
        nodes.high_id(),
        ctx.concurrency()
    ));
    scanner.scan(
        ctx,
        |_, reader| {
            let mut ids = vec![];
            for item in reader {
                let (id, record) = item?;
                if matches(&record) {
                    ids.push(id);
                }
            }
            Ok(ids)
        },
        |_, ids| {
            for id in ids {
                builder.add(id)?;
            }
            Ok(())
        },
        pl,
    )?;
    pl.done();

    let id_map = builder.build();
    log::info!("Imported {} nodes", id_map.node_count());
    Ok(id_map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use dsi_progress_logger::no_logging;

    #[test]
    fn test_dense_order_is_store_order() -> Result<()> {
        let mut builder = MemoryStore::builder().records_per_page(4);
        let mut expected = vec![];
        for i in 0..200 {
            let labels: &[&str] = if i % 3 == 0 { &["Even"] } else { &["Odd"] };
            let id = builder.add_node(labels);
            if i % 3 == 0 {
                expected.push(id);
            }
            if i % 17 == 0 {
                builder.skip_node_ids(5);
            }
        }
        let store = builder.build();
        let ctx = ExecutionContext::new(4)?;
        let tracker = MemoryTracker::unbounded();

        let label = store.label_id("Even");
        let id_map = import_nodes(&store, label, Some(9), &ctx, &tracker, no_logging![])?;
        assert_eq!(id_map.iter().collect::<Vec<_>>(), expected);

        let id_map = import_nodes(&store, None, Some(9), &ctx, &tracker, no_logging![])?;
        assert_eq!(id_map.node_count(), 200);
        let ids = id_map.iter().collect::<Vec<_>>();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        Ok(())
    }
}
