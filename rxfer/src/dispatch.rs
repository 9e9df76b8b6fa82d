//! Concurrent execution of one operation per independent session.
//!
//! Sessions share nothing, so each runs on its own tokio task with its own channel. Within a
//! session operations stay strictly sequential.

use crate::{Error, Session};

/// Run `op` once per session, concurrently, and return the results in session order.
///
/// `op` receives the session's index and takes ownership of the session for the duration
/// of the task. A task that panics or is cancelled yields a transfer error for its session
/// only; the others are unaffected.
pub async fn run_sessions<T, F, Fut>(sessions: Vec<Session>, op: F) -> Vec<Result<T, Error>>
where
    F: Fn(usize, Session) -> Fut,
    Fut: std::future::Future<Output = Result<T, Error>> + Send + 'static,
    T: Send + 'static,
{
    let handles: Vec<_> = sessions
        .into_iter()
        .enumerate()
        .map(|(index, session)| {
            let name = session.name().to_string();
            tracing::debug!("dispatching session {} ({})", index, &name);
            (name, tokio::spawn(op(index, session)))
        })
        .collect();
    let mut results = Vec::with_capacity(handles.len());
    for (name, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(join_error) => Err(Error::transfer(
                anyhow::Error::new(join_error).context(format!("session {name} did not complete")),
            )),
        };
        if let Err(error) = &result {
            tracing::error!("session {}: {:#}", &name, error);
        }
        results.push(result);
    }
    results
}
