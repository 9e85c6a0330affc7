//! The authoritative single-owner context.
//!
//! One task owns the live state `S` and runs submitted jobs strictly in
//! submission order. Anything that mutates live user or world state goes
//! through here; I/O stays on other tasks and resumes here for its effects.

use crate::core::{RealmError, Result};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{Level, event};

type Job<S> = Box<dyn FnOnce(&mut S) + Send>;

enum Message<S> {
    Job(Job<S>),
    Stop,
}

pub struct Authority<S> {
    tx: mpsc::UnboundedSender<Message<S>>,
    join_handle: Arc<Mutex<Option<JoinHandle<S>>>>,
}

impl<S> Clone for Authority<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            join_handle: self.join_handle.clone(),
        }
    }
}

impl<S: Send + 'static> Authority<S> {
    /// Moves `state` onto a dedicated task. Must be called inside a tokio runtime.
    pub fn spawn(mut state: S) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Message<S>>();

        let join_handle = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match message {
                    Message::Job(job) => {
                        // A panicking job must not take the owner task down with it.
                        if catch_unwind(AssertUnwindSafe(|| job(&mut state))).is_err() {
                            event!(Level::ERROR, "authority job panicked; state retained");
                        }
                    }
                    Message::Stop => break,
                }
            }
            state
        });

        Self {
            tx,
            join_handle: Arc::new(Mutex::new(Some(join_handle))),
        }
    }

    /// Queues `job` behind everything already submitted.
    pub fn post<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.tx
            .send(Message::Job(Box::new(job)))
            .map_err(|_| RealmError::AuthorityClosed)
    }

    /// Runs `job` on the owner task and returns its result.
    pub async fn call<T, F>(&self, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut S) -> T + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.post(move |state| {
            let _ = reply_tx.send(job(state));
        })?;
        reply_rx.await.map_err(|_| RealmError::AuthorityClosed)
    }

    /// Runs every job queued so far, stops the owner task and hands the
    /// state back. Later submissions fail with `AuthorityClosed`.
    pub async fn shutdown(&self) -> Result<S> {
        let _ = self.tx.send(Message::Stop);
        let join_handle = self
            .join_handle
            .lock()?
            .take()
            .ok_or(RealmError::AuthorityClosed)?;
        Ok(join_handle.await?)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_jobs_run_in_submission_order() {
        let authority = Authority::spawn(Vec::<u32>::new());
        for n in 0..10 {
            authority.post(move |log: &mut Vec<u32>| log.push(n)).unwrap();
        }
        let log = authority.call(|log: &mut Vec<u32>| log.clone()).await.unwrap();
        assert_eq!(log, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_panicking_job_keeps_state() {
        let authority = Authority::spawn(1u32);
        authority
            .post(|_: &mut u32| panic!("boom"))
            .unwrap();
        let value = authority.call(|value: &mut u32| *value + 1).await.unwrap();
        assert_eq!(value, 2);
    }

    #[tokio::test]
    async fn test_shutdown_returns_state_and_rejects_new_jobs() {
        let authority = Authority::spawn(0u32);
        authority.post(|value: &mut u32| *value = 7).unwrap();

        let state = authority.shutdown().await.unwrap();
        assert_eq!(state, 7);
        assert!(authority.call(|value: &mut u32| *value).await.is_err());
    }
}
