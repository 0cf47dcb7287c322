//! One task per Thing, created on demand and stopped when idle.

use super::{BehaviorFactory, PersistenceRouter, ReplyTo, ThingBehavior, WorkerStopListener};
use crate::command::ThingCommand;
use crate::config::WorkerConfig;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use twinguard_types::ThingId;

struct Envelope {
    command: ThingCommand,
    reply_to: ReplyTo,
}

struct WorkerHandle {
    tx: mpsc::Sender<Envelope>,
    generation: u64,
    task: JoinHandle<()>,
}

struct ShardInner<F> {
    factory: Arc<F>,
    workers: RwLock<HashMap<ThingId, WorkerHandle>>,
    listener: RwLock<Option<Arc<dyn WorkerStopListener>>>,
    config: WorkerConfig,
    next_generation: AtomicU64,
}

/// [`PersistenceRouter`] running one worker task per Thing.
///
/// A worker is spawned on the first command for its Thing and stops after
/// `passivate_after` without commands. Commands that were already queued
/// when it stops are still processed. A replacement worker for the same
/// Thing only starts once its predecessor is finished, so at most one
/// worker applies commands to a Thing at any time.
///
/// # Example
///
/// ```ignore
/// let shard = ThingShard::new(Arc::new(persistence.clone()), config.worker.clone());
/// shard.set_stop_listener(Arc::new(enforcer.invalidator()));
/// ```
pub struct ThingShard<F> {
    inner: Arc<ShardInner<F>>,
}

impl<F> Clone for ThingShard<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: BehaviorFactory> ThingShard<F> {
    /// Creates an empty shard.
    #[must_use]
    pub fn new(factory: Arc<F>, config: WorkerConfig) -> Self {
        Self {
            inner: Arc::new(ShardInner {
                factory,
                workers: RwLock::new(HashMap::new()),
                listener: RwLock::new(None),
                config,
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Registers the listener notified whenever a worker stops.
    pub fn set_stop_listener(&self, listener: Arc<dyn WorkerStopListener>) {
        *self.inner.listener.write() = Some(listener);
    }

    /// Number of workers currently accepting commands.
    #[must_use]
    pub fn active_workers(&self) -> usize {
        self.inner
            .workers
            .read()
            .values()
            .filter(|h| !h.tx.is_closed())
            .count()
    }

    /// Returns `true` if a worker for `thing_id` is accepting commands.
    #[must_use]
    pub fn is_active(&self, thing_id: &ThingId) -> bool {
        self.inner
            .workers
            .read()
            .get(thing_id)
            .is_some_and(|h| !h.tx.is_closed())
    }

    /// Detaches all workers. Each stops once its mailbox is drained.
    pub fn stop_all(&self) {
        let drained: Vec<_> = self.inner.workers.write().drain().collect();
        info!("ThingShard: stopping {} workers", drained.len());
    }

    fn sender_for(&self, thing_id: &ThingId) -> mpsc::Sender<Envelope> {
        if let Some(handle) = self.inner.workers.read().get(thing_id) {
            if !handle.tx.is_closed() {
                return handle.tx.clone();
            }
        }

        let mut workers = self.inner.workers.write();
        if let Some(handle) = workers.get(thing_id) {
            if !handle.tx.is_closed() {
                return handle.tx.clone();
            }
        }

        let previous = workers.remove(thing_id).map(|h| h.task);
        let (tx, rx) = mpsc::channel(self.inner.config.mailbox_size.max(1));
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let worker = Worker {
            shard: Arc::downgrade(&self.inner),
            behavior_factory: Arc::clone(&self.inner.factory),
            thing_id: thing_id.clone(),
            generation,
            passivate_after: self.inner.config.passivate_after(),
        };
        let task = tokio::spawn(worker.run(rx, previous));
        workers.insert(
            thing_id.clone(),
            WorkerHandle {
                tx: tx.clone(),
                generation,
                task,
            },
        );
        tx
    }
}

#[async_trait]
impl<F: BehaviorFactory> PersistenceRouter for ThingShard<F> {
    async fn forward(&self, command: ThingCommand, reply_to: ReplyTo) {
        let thing_id = command.thing_id.clone();
        let mut envelope = Envelope { command, reply_to };

        // A closed mailbox means the worker is passivating; the second
        // attempt spawns its successor.
        for _ in 0..2 {
            let tx = self.sender_for(&thing_id);
            match tx.send(envelope).await {
                Ok(()) => return,
                Err(mpsc::error::SendError(returned)) => {
                    debug!(thing_id = %thing_id, "Worker mailbox closed, retrying");
                    envelope = returned;
                }
            }
        }

        error!(
            thing_id = %thing_id,
            correlation_id = %envelope.command.headers.correlation_id,
            "Could not deliver command to thing worker"
        );
    }
}

struct Worker<F> {
    shard: Weak<ShardInner<F>>,
    behavior_factory: Arc<F>,
    thing_id: ThingId,
    generation: u64,
    passivate_after: Duration,
}

impl<F: BehaviorFactory> Worker<F> {
    async fn run(self, mut rx: mpsc::Receiver<Envelope>, previous: Option<JoinHandle<()>>) {
        if let Some(previous) = previous {
            if previous.await.is_err() {
                error!(thing_id = %self.thing_id, "Previous thing worker panicked");
            }
        }

        let mut behavior = self.behavior_factory.create(&self.thing_id);
        info!(thing_id = %self.thing_id, generation = self.generation, "Thing worker started");

        loop {
            match tokio::time::timeout(self.passivate_after, rx.recv()).await {
                Ok(Some(envelope)) => self.process(&mut behavior, envelope).await,
                Ok(None) => {
                    debug!(thing_id = %self.thing_id, "Thing worker detached");
                    break;
                }
                Err(_) => {
                    debug!(thing_id = %self.thing_id, "Thing worker idle, passivating");
                    rx.close();
                    while let Some(envelope) = rx.recv().await {
                        self.process(&mut behavior, envelope).await;
                    }
                    break;
                }
            }
        }

        self.deregister();
        info!(thing_id = %self.thing_id, generation = self.generation, "Thing worker stopped");
    }

    async fn process(&self, behavior: &mut F::Behavior, envelope: Envelope) {
        let Envelope { command, reply_to } = envelope;
        let name = command.name();
        let result = behavior.handle(command).await;
        if let Err(ref e) = result {
            debug!(thing_id = %self.thing_id, command = name, error = %e, "Command failed");
        }
        if reply_to.send(result.map_err(Into::into)).is_err() {
            debug!(thing_id = %self.thing_id, command = name, "Requester no longer waiting");
        }
    }

    fn deregister(&self) {
        let Some(shard) = self.shard.upgrade() else {
            return;
        };
        {
            let mut workers = shard.workers.write();
            if workers
                .get(&self.thing_id)
                .is_some_and(|h| h.generation == self.generation)
            {
                workers.remove(&self.thing_id);
            }
        }
        let listener = shard.listener.read().clone();
        if let Some(listener) = listener {
            listener.worker_stopped(&self.thing_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{ResponseStatus, ThingAction, ThingResponse};
    use crate::error::{EnforcementError, ThingError};
    use parking_lot::Mutex;
    use tokio::sync::oneshot;
    use twinguard_types::AuthorizationContext;

    /// Records the order in which commands reach each behavior.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(ThingId, String)>>,
        started: AtomicU64,
    }

    struct Recording {
        recorder: Arc<Recorder>,
        thing_id: ThingId,
    }

    #[async_trait]
    impl ThingBehavior for Recording {
        async fn handle(&mut self, command: ThingCommand) -> Result<ThingResponse, ThingError> {
            let label = match &command.action {
                ThingAction::RetrieveFeature { feature_id } => feature_id.clone(),
                other => other.name().to_string(),
            };
            self.recorder.seen.lock().push((self.thing_id.clone(), label));
            Ok(command.respond(ResponseStatus::Ok, None))
        }
    }

    struct RecorderFactory(Arc<Recorder>);

    impl BehaviorFactory for RecorderFactory {
        type Behavior = Recording;

        fn create(&self, thing_id: &ThingId) -> Recording {
            self.0.started.fetch_add(1, Ordering::SeqCst);
            Recording {
                recorder: Arc::clone(&self.0),
                thing_id: thing_id.clone(),
            }
        }
    }

    #[derive(Default)]
    struct StopRecorder(Mutex<Vec<ThingId>>);

    impl WorkerStopListener for StopRecorder {
        fn worker_stopped(&self, thing_id: &ThingId) {
            self.0.lock().push(thing_id.clone());
        }
    }

    fn command(thing: &str, feature: &str) -> ThingCommand {
        ThingCommand::new(
            ThingId::new(thing).expect("valid thing id"),
            AuthorizationContext::new(["s"]),
            ThingAction::RetrieveFeature {
                feature_id: feature.to_string(),
            },
        )
    }

    fn shard(recorder: &Arc<Recorder>, passivate_after_secs: u64) -> ThingShard<RecorderFactory> {
        ThingShard::new(
            Arc::new(RecorderFactory(Arc::clone(recorder))),
            WorkerConfig {
                mailbox_size: 4,
                passivate_after_secs,
            },
        )
    }

    type Reply = oneshot::Receiver<Result<ThingResponse, EnforcementError>>;

    async fn send(shard: &ThingShard<RecorderFactory>, cmd: ThingCommand) -> Reply {
        let (tx, rx) = oneshot::channel();
        shard.forward(cmd, tx).await;
        rx
    }

    #[tokio::test]
    async fn commands_for_one_thing_keep_their_order() {
        let recorder = Arc::new(Recorder::default());
        let shard = shard(&recorder, 60);

        let mut pending = Vec::new();
        for i in 0..10 {
            pending.push(send(&shard, command("ns:a", &i.to_string())).await);
        }
        for rx in pending {
            assert!(rx.await.expect("worker answers").is_ok());
        }

        let seen: Vec<String> = recorder.seen.lock().iter().map(|(_, l)| l.clone()).collect();
        let expected: Vec<String> = (0..10).map(|i| i.to_string()).collect();
        assert_eq!(seen, expected);
        assert_eq!(shard.active_workers(), 1);
    }

    #[tokio::test]
    async fn one_worker_per_thing() {
        let recorder = Arc::new(Recorder::default());
        let shard = shard(&recorder, 60);

        for thing in ["ns:a", "ns:b", "ns:a", "ns:c"] {
            let rx = send(&shard, command(thing, "x")).await;
            rx.await.expect("worker answers").expect("ok response");
        }
        assert_eq!(shard.active_workers(), 3);
        assert_eq!(recorder.started.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_worker_passivates_and_notifies() {
        let recorder = Arc::new(Recorder::default());
        let listener = Arc::new(StopRecorder::default());
        let shard = shard(&recorder, 5);
        shard.set_stop_listener(Arc::clone(&listener) as Arc<dyn WorkerStopListener>);

        let thing = ThingId::new("ns:a").expect("valid thing id");
        send(&shard, command("ns:a", "x")).await.await.expect("answer").expect("ok");
        assert!(shard.is_active(&thing));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(!shard.is_active(&thing));
        assert_eq!(listener.0.lock().as_slice(), &[thing.clone()]);

        // Next command spawns a fresh worker.
        send(&shard, command("ns:a", "y")).await.await.expect("answer").expect("ok");
        assert_eq!(recorder.started.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stop_all_detaches_workers() {
        let recorder = Arc::new(Recorder::default());
        let shard = shard(&recorder, 60);
        send(&shard, command("ns:a", "x")).await.await.expect("answer").expect("ok");
        shard.stop_all();
        assert_eq!(shard.active_workers(), 0);
    }
}
