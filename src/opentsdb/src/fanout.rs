//! Concurrent execution of OpenTSDB queries for one read call
//!
//! One task per query request. Each task fetches its fragments without holding
//! any lock, then folds them into the shared [`SeriesAccumulator`]. The call
//! ends with exactly one outcome: every task succeeded, the first task error, or
//! the deadline. Remaining tasks are aborted and the accumulator is sealed so a
//! straggler can never fold into it after that point.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::prompb::TimeSeries;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::OpenTsdbError;
use crate::merge::SeriesAccumulator;
use crate::types::{QueryRequest, QueryResult};

/// Executes a single `/api/query` request
#[async_trait]
pub trait QueryBackend: Send + Sync + 'static {
    async fn query(&self, request: &QueryRequest) -> Result<Vec<QueryResult>, OpenTsdbError>;
}

#[derive(Debug, Default)]
struct MergeState {
    accumulator: SeriesAccumulator,
    sealed: bool,
}

type SharedState = Arc<Mutex<MergeState>>;

fn fold_into(state: &SharedState, fragments: Vec<QueryResult>) -> Result<(), OpenTsdbError> {
    let mut state = state
        .lock()
        .map_err(|_| OpenTsdbError::Internal("merge state lock poisoned".to_string()))?;
    if state.sealed {
        tracing::debug!(
            fragments = fragments.len(),
            "Discarding fragments that arrived after the read call finished"
        );
        return Ok(());
    }
    state.accumulator.fold_all(fragments);
    Ok(())
}

fn seal(state: &SharedState) -> Result<SeriesAccumulator, OpenTsdbError> {
    let mut state = state
        .lock()
        .map_err(|_| OpenTsdbError::Internal("merge state lock poisoned".to_string()))?;
    state.sealed = true;
    Ok(std::mem::take(&mut state.accumulator))
}

/// Run all requests concurrently and merge their results
///
/// `max_in_flight` optionally bounds the number of concurrent backend calls.
pub async fn execute<B: QueryBackend>(
    backend: Arc<B>,
    requests: Vec<QueryRequest>,
    deadline: Duration,
    max_in_flight: Option<usize>,
) -> Result<Vec<TimeSeries>, OpenTsdbError> {
    let expires_at = tokio::time::Instant::now() + deadline;
    let total = requests.len();
    let state: SharedState = Arc::default();
    let permits = max_in_flight.map(|limit| Arc::new(Semaphore::new(limit.max(1))));

    let mut tasks = JoinSet::new();
    for request in requests {
        let backend = Arc::clone(&backend);
        let state = Arc::clone(&state);
        let permits = permits.clone();
        tasks.spawn(async move {
            let _permit = match permits {
                Some(semaphore) => Some(
                    semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| OpenTsdbError::Internal(e.to_string()))?,
                ),
                None => None,
            };

            let fragments = backend.query(&request).await.inspect_err(|e| {
                tracing::warn!(
                    error = %e,
                    metric = ?request.queries.first().map(|q| q.metric.as_str()),
                    "OpenTSDB query failed"
                );
            })?;
            tracing::debug!(
                fragments = fragments.len(),
                start = request.start,
                end = request.end,
                "OpenTSDB query returned"
            );
            fold_into(&state, fragments)
        });
    }

    let outcome = tokio::time::timeout_at(expires_at, async {
        while let Some(joined) = tasks.join_next().await {
            joined.map_err(|e| OpenTsdbError::Internal(format!("query task failed: {e}")))??;
        }
        Ok::<_, OpenTsdbError>(())
    })
    .await;

    // Decisive outcome reached: stop stragglers and freeze the accumulator
    tasks.abort_all();
    let accumulator = seal(&state)?;

    match outcome {
        Ok(Ok(())) => {
            tracing::debug!(
                queries = total,
                series = accumulator.len(),
                "All OpenTSDB queries merged"
            );
            Ok(accumulator.into_timeseries())
        }
        Ok(Err(e)) => Err(e),
        Err(_) => Err(OpenTsdbError::DeadlineExceeded { timeout: deadline }),
    }
}
