use super::{resolve, DocumentSource, FindingId, LocationResult, LocationTask};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Resolve every task with at most `concurrency` searches in flight.
///
/// Each task opens its own view of the document and searches it on the
/// blocking pool. Results come back in completion order; match them to
/// findings through `task.owner`. Returns once every task has exactly one
/// result: open failures and panics inside a search become `found = false`.
pub async fn batch_resolve<S: DocumentSource>(
    source: Arc<S>,
    tasks: Vec<LocationTask>,
    concurrency: usize,
) -> Vec<LocationResult> {
    if tasks.is_empty() {
        return Vec::new();
    }

    let started = Instant::now();
    let total = tasks.len();
    let concurrency = concurrency.max(1);
    let semaphore = Arc::new(Semaphore::new(concurrency));
    info!("swarm: {total} task(s), concurrency {concurrency}");

    // Slot per submitted task so nothing can go missing at the barrier.
    let mut pending: HashMap<usize, LocationTask> = HashMap::with_capacity(total);
    let mut set = JoinSet::new();

    for (slot, task) in tasks.into_iter().enumerate() {
        pending.insert(slot, task.clone());
        let source = Arc::clone(&source);
        let semaphore = Arc::clone(&semaphore);

        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            let fallback = task.clone();
            let owner = task.owner;
            let searched = tokio::task::spawn_blocking(move || search_one(&*source, task)).await;
            let result = match searched {
                Ok(r) => r,
                Err(e) => {
                    warn!("locator worker for finding {} failed: {e}", owner.0);
                    LocationResult::not_found(fallback)
                }
            };
            (slot, result)
        });
    }

    let mut results = Vec::with_capacity(total);
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((slot, result)) => {
                pending.remove(&slot);
                results.push(result);
            }
            Err(e) => warn!("locator task aborted: {e}"),
        }
    }

    for (_, task) in pending {
        results.push(LocationResult::not_found(task));
    }

    let found = results.iter().filter(|r| r.found).count();
    info!(
        "swarm: located {found}/{total} in {:.3}s",
        started.elapsed().as_secs_f64()
    );
    results
}

fn search_one<S: DocumentSource + ?Sized>(source: &S, task: LocationTask) -> LocationResult {
    let view = match source.open() {
        Ok(v) => v,
        Err(e) => {
            warn!("cannot open document view for finding {}: {e}", task.owner.0);
            return LocationResult::not_found(task);
        }
    };
    let result = resolve(view.as_ref(), task);
    drop(view);
    result
}

/// Single (page, text) lookup through a one-worker swarm.
pub async fn locate_one<S: DocumentSource>(
    source: Arc<S>,
    page: u32,
    text: &str,
) -> LocationResult {
    let task = LocationTask {
        page_hint: page,
        query: text.to_string(),
        owner: FindingId(0),
    };
    let mut results = batch_resolve(source, vec![task.clone()], 1).await;
    debug!("locate_one page={page} results={}", results.len());
    results.pop().unwrap_or_else(|| LocationResult::not_found(task))
}
