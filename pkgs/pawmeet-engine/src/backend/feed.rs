//! Polling adaptor turning a "list messages" call into a live feed

use super::{RawSnapshot, SnapshotStream};
use crate::error::Result;
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use std::time::Duration;
use tracing::trace;

struct PollState<F> {
    fetch: F,
    interval: Duration,
    last: Option<RawSnapshot>,
    first: bool,
}

/// Re-run `fetch` every `interval`, yielding only snapshots that changed
///
/// The first successful fetch is always yielded. A failed fetch yields an
/// `Err` item and polling carries on.
pub fn poll_snapshots<F>(fetch: F, interval: Duration) -> SnapshotStream
where
    F: Fn() -> BoxFuture<'static, Result<RawSnapshot>> + Send + 'static,
{
    let state = PollState {
        fetch,
        interval,
        last: None,
        first: true,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if !state.first {
                tokio::time::sleep(state.interval).await;
            }
            state.first = false;

            match (state.fetch)().await {
                Ok(snapshot) if state.last.as_ref() == Some(&snapshot) => {
                    trace!("Snapshot unchanged, skipping");
                    continue;
                }
                Ok(snapshot) => {
                    state.last = Some(snapshot.clone());
                    return Some((Ok(snapshot), state));
                }
                Err(e) => return Some((Err(e), state)),
            }
        }
    })
    .boxed()
}
