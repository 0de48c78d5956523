//! Picking the most up-to-date node among a set of RPC endpoints.

use std::time::{Duration, Instant};

use futures_util::future::join_all;

use crate::TransactionSource;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BestNode {
    pub url: String,
    pub height: u64,
    pub latency: Duration,
}

/// Query `getblockcount` on every URL at once and return the highest one.
/// Ties go to the faster responder. Unreachable nodes are skipped; `None`
/// when none answered.
pub async fn select_best_node(source: &dyn TransactionSource, urls: &[String]) -> Option<BestNode> {
    let probes = urls.iter().map(|url| async move {
        let started = Instant::now();
        match source.get_block_count(url).await {
            Ok(height) => Some(BestNode {
                url: url.clone(),
                height,
                latency: started.elapsed(),
            }),
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "rpc node did not answer getblockcount");
                None
            }
        }
    });

    join_all(probes)
        .await
        .into_iter()
        .flatten()
        .max_by(|a, b| a.height.cmp(&b.height).then(b.latency.cmp(&a.latency)))
}
