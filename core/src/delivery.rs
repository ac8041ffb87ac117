//! Where completion callbacks run.
//!
//! # Design
//! A `Dispatch` moves a boxed job onto some execution context: a UI loop, a
//! dedicated thread, or the application's own `MainQueue`. `Delivery` decides
//! which outcomes go through the dispatcher. By default every outcome does, so
//! a callback always runs in one place; `DeliveryPolicy::SuccessOnly` keeps
//! errors on the context that produced them.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::warn;

use crate::error::FetchError;

/// A unit of work handed to a dispatcher.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs jobs on a chosen execution context.
pub trait Dispatch: Send + Sync {
    fn dispatch(&self, job: Job);
}

impl<F> Dispatch for F
where
    F: Fn(Job) + Send + Sync,
{
    fn dispatch(&self, job: Job) {
        self(job)
    }
}

/// Which outcomes are marshaled through the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryPolicy {
    /// Successes and errors alike.
    #[default]
    AllOutcomes,
    /// Only successes; errors run on the worker task, or on the calling
    /// thread for `InvalidUrl`.
    SuccessOnly,
}

/// Callback delivery configuration for an `HttpClient`.
#[derive(Clone, Default)]
pub struct Delivery {
    dispatcher: Option<Arc<dyn Dispatch>>,
    policy: DeliveryPolicy,
}

impl Delivery {
    /// Run every callback wherever its outcome was produced.
    pub fn inline() -> Self {
        Self::default()
    }

    /// Marshal every outcome through `dispatcher`.
    pub fn on(dispatcher: Arc<dyn Dispatch>) -> Self {
        Self {
            dispatcher: Some(dispatcher),
            policy: DeliveryPolicy::AllOutcomes,
        }
    }

    pub fn with_policy(mut self, policy: DeliveryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> DeliveryPolicy {
        self.policy
    }

    pub(crate) fn deliver<T, F>(&self, result: Result<T, FetchError>, callback: F)
    where
        T: Send + 'static,
        F: FnOnce(Result<T, FetchError>) + Send + 'static,
    {
        match &self.dispatcher {
            Some(dispatcher)
                if result.is_ok() || self.policy == DeliveryPolicy::AllOutcomes =>
            {
                dispatcher.dispatch(Box::new(move || callback(result)));
            }
            _ => callback(result),
        }
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("dispatched", &self.dispatcher.is_some())
            .field("policy", &self.policy)
            .finish()
    }
}

/// A main-context job queue drained by the application.
///
/// Callbacks dispatched here run only when the owner calls one of the `run_*`
/// methods, on the owner's thread.
pub struct MainQueue {
    tx: UnboundedSender<Job>,
    rx: UnboundedReceiver<Job>,
}

impl MainQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    pub fn dispatcher(&self) -> Arc<dyn Dispatch> {
        Arc::new(QueueDispatcher {
            tx: self.tx.clone(),
        })
    }

    /// Run every job queued so far without waiting. Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Wait for the next job and run it.
    pub async fn run_next(&mut self) {
        // The queue holds a sender, so `recv` never reports a closed channel.
        if let Some(job) = self.rx.recv().await {
            job();
        }
    }

    /// Blocking variant of `run_next` for threads outside a tokio runtime.
    ///
    /// Panics if called from within an async context.
    pub fn blocking_run_next(&mut self) {
        if let Some(job) = self.rx.blocking_recv() {
            job();
        }
    }
}

impl Default for MainQueue {
    fn default() -> Self {
        Self::new()
    }
}

struct QueueDispatcher {
    tx: UnboundedSender<Job>,
}

impl Dispatch for QueueDispatcher {
    fn dispatch(&self, job: Job) {
        if self.tx.send(job).is_err() {
            warn!("main queue dropped; completion discarded");
        }
    }
}
