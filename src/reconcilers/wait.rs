// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cancellable polling with a deadline.
//!
//! Waits on host objects (an address being assigned, an object disappearing)
//! poll at a fixed interval. The poll loop is bounded by a deadline and, being a
//! plain future, is cancelled when the enclosing reconcile is dropped.

use crate::errors::ProjectionError;
use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Poll `check` every `interval` until it yields a value or `deadline` elapses.
///
/// The first check runs immediately.
///
/// # Errors
///
/// Returns the check's error as soon as one occurs, or
/// [`ProjectionError::WaitTimeout`] once `deadline` has elapsed.
pub async fn wait_for<T, F, Fut>(
    what: &str,
    interval: Duration,
    deadline: Duration,
    mut check: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let start = Instant::now();
    let mut attempt: u32 = 0;

    let poll = async {
        loop {
            attempt += 1;
            if let Some(value) = check().await? {
                return Ok::<T, anyhow::Error>(value);
            }
            debug!(what = what, attempt = attempt, "Condition not met yet, polling again");
            tokio::time::sleep(interval).await;
        }
    };

    match tokio::time::timeout(deadline, poll).await {
        Ok(result) => result,
        Err(_) => Err(ProjectionError::WaitTimeout {
            what: what.to_string(),
            elapsed: start.elapsed(),
        }
        .into()),
    }
}

#[cfg(test)]
#[path = "wait_tests.rs"]
mod wait_tests;
