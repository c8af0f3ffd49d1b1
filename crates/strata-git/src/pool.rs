// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Bounded fan-out over independent units of work

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::GitError;

/// Run `work` once per item with at most `concurrency` in flight
///
/// Outcomes come back in input order regardless of completion order. A unit
/// that panics becomes [`GitError::Task`]; units that have not started when
/// `cancel` fires become [`GitError::Cancelled`].
pub(crate) async fn fan_out<I, T, F, Fut>(
    items: Vec<I>,
    concurrency: usize,
    cancel: &CancellationToken,
    work: F,
) -> Vec<Result<T, GitError>>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, GitError>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let work = Arc::new(work);

    let handles: Vec<_> = items
        .into_iter()
        .map(|item| {
            let semaphore = Arc::clone(&semaphore);
            let work = Arc::clone(&work);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| GitError::Task(e.to_string()))?;
                if cancel.is_cancelled() {
                    return Err(GitError::Cancelled);
                }
                let unit = (*work)(item);
                unit.await
            })
        })
        .collect();

    // Awaiting in spawn order restores input order
    let mut outcomes = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => outcomes.push(Err(GitError::Task(e.to_string()))),
        }
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_outcomes_follow_input_order() {
        let items: Vec<u64> = (0..8).collect();
        let outcomes = fan_out(items, 4, &CancellationToken::new(), |n| async move {
            // Later items finish first
            tokio::time::sleep(Duration::from_millis(40 - n * 5)).await;
            Ok::<u64, GitError>(n * 10)
        })
        .await;

        let values: Vec<u64> = outcomes.into_iter().map(|o| o.expect("ok")).collect();
        assert_eq!(values, vec![0, 10, 20, 30, 40, 50, 60, 70]);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let items: Vec<usize> = (0..12).collect();

        let (flight, high) = (Arc::clone(&in_flight), Arc::clone(&peak));
        let outcomes = fan_out(items, 3, &CancellationToken::new(), move |_| {
            let flight = Arc::clone(&flight);
            let high = Arc::clone(&high);
            async move {
                let now = flight.fetch_add(1, Ordering::SeqCst) + 1;
                high.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<(), GitError>(())
            }
        })
        .await;

        assert_eq!(outcomes.len(), 12);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_panicking_unit_is_isolated() {
        let outcomes = fan_out(vec![1, 2, 3], 2, &CancellationToken::new(), |n| async move {
            if n == 2 {
                panic!("unit two exploded");
            }
            Ok::<i32, GitError>(n)
        })
        .await;

        assert!(matches!(outcomes[0], Ok(1)));
        assert!(matches!(outcomes[1], Err(GitError::Task(_))));
        assert!(matches!(outcomes[2], Ok(3)));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcomes = fan_out(vec![1, 2], 1, &cancel, |n| async move { Ok::<i32, GitError>(n) }).await;
        assert!(outcomes.iter().all(|o| matches!(o, Err(GitError::Cancelled))));
    }
}
