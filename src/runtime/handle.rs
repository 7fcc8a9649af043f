use std::{
    hash::{DefaultHasher, Hash, Hasher},
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{
    sync::{Mutex, broadcast, mpsc, oneshot, watch},
    time::{Duration, Instant},
};

use crate::{
    core::{
        seq::SeqSource,
        store::LedgerStore,
        wallet::LedgerError,
    },
    op::StoredOp,
    persist::{OpSink, PersistError},
    records::{LedgerEntry, TranslationDraft, TranslationRecord},
    types::{Credits, EntrySeq, LedgerKind, UserId},
};

use super::events::LedgerEvent;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("persistence: {0}")]
    Persist(#[from] PersistError),
    #[error("ledger runtime channel closed")]
    ChannelClosed,
}

/// When a mutation is acknowledged to its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckMode {
    /// After the in-memory change and a reserved slot in the persist queue.
    InMemory,
    /// After the journal has committed the op. A rejected commit is rolled
    /// back in memory before the caller sees the error.
    #[default]
    Durable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub shards: usize,
    pub ack_mode: AckMode,
    pub batch_max_ops: usize,
    pub batch_max_latency_ms: u64,
    pub persist_queue_bound: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            shards: 8,
            ack_mode: AckMode::Durable,
            batch_max_ops: 32,
            batch_max_latency_ms: 75,
            persist_queue_bound: 64,
        }
    }
}

/// Cloneable front door to the sharded ledger.
///
/// Users are partitioned over single-writer shard tasks, so operations on
/// one user are serialized while different shards run independently.
#[derive(Clone)]
pub struct LedgerHandle {
    shards: Arc<[mpsc::Sender<Command>]>,
    persist_tx: Option<mpsc::Sender<PersistMsg>>,
    events_tx: broadcast::Sender<LedgerEvent>,
    seq: SeqSource,
}

enum Command {
    Balance {
        user_id: UserId,
        resp: oneshot::Sender<Credits>,
    },
    CanAfford {
        user_id: UserId,
        amount: Credits,
        resp: oneshot::Sender<bool>,
    },
    Credit {
        user_id: UserId,
        amount: Credits,
        kind: LedgerKind,
        resp: oneshot::Sender<Result<LedgerEntry, RuntimeError>>,
    },
    Debit {
        user_id: UserId,
        amount: Credits,
        kind: LedgerKind,
        resp: oneshot::Sender<Result<LedgerEntry, RuntimeError>>,
    },
    RecordTranslation {
        draft: TranslationDraft,
        resp: oneshot::Sender<Result<TranslationRecord, RuntimeError>>,
    },
    Transactions {
        user_id: Option<UserId>,
        resp: oneshot::Sender<Vec<LedgerEntry>>,
    },
    Translations {
        user_id: Option<UserId>,
        resp: oneshot::Sender<Vec<TranslationRecord>>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

enum PersistMsg {
    Ops(Vec<StoredOp>),
    Commit {
        ops: Vec<StoredOp>,
        resp: oneshot::Sender<Result<EntrySeq, PersistError>>,
    },
    Flush {
        resp: oneshot::Sender<Result<EntrySeq, PersistError>>,
    },
    Shutdown {
        resp: oneshot::Sender<Result<EntrySeq, PersistError>>,
    },
}

struct ShardContext {
    index: usize,
    ack_mode: AckMode,
    events_tx: broadcast::Sender<LedgerEvent>,
    persist_tx: Option<mpsc::Sender<PersistMsg>>,
    /// Last journal write error while buffered ops are still unwritten.
    stalled: watch::Receiver<Option<String>>,
}

/// Shard owning `user_id` when users are spread over `shards` partitions.
pub fn shard_index(user_id: &str, shards: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    user_id.hash(&mut hasher);
    (hasher.finish() % shards.max(1) as u64) as usize
}

/// Spawns an empty in-memory ledger.
pub fn spawn_in_memory(config: RuntimeConfig) -> LedgerHandle {
    let shard_count = config.shards.max(1);
    let seq = SeqSource::new();
    let stores = (0..shard_count)
        .map(|_| LedgerStore::with_seq(seq.clone()))
        .collect();
    start(stores, seq, None, config)
}

/// Spawns the ledger after replaying `replay` (ordered by sequence).
///
/// Must be called from within a tokio runtime.
pub fn spawn_ledger(
    replay: Vec<StoredOp>,
    sink: Option<Box<dyn OpSink>>,
    config: RuntimeConfig,
) -> Result<LedgerHandle, RuntimeError> {
    let shard_count = config.shards.max(1);
    let seq = SeqSource::new();
    let mut stores: Vec<LedgerStore> = (0..shard_count)
        .map(|_| LedgerStore::with_seq(seq.clone()))
        .collect();

    let replayed = replay.len();
    for stored in replay {
        let idx = shard_index(stored.op.user_id(), shard_count);
        stores[idx].apply_replayed_op(stored)?;
    }
    tracing::info!(
        replayed,
        shards = shard_count,
        latest_seq = seq.latest(),
        "ledger state restored"
    );

    Ok(start(stores, seq, sink, config))
}

fn start(
    stores: Vec<LedgerStore>,
    seq: SeqSource,
    sink: Option<Box<dyn OpSink>>,
    config: RuntimeConfig,
) -> LedgerHandle {
    let (events_tx, _) = broadcast::channel::<LedgerEvent>(1024);

    let (stalled_tx, stalled_rx) = watch::channel::<Option<String>>(None);

    let persist_tx = sink.map(|sink| {
        let (persist_tx, persist_rx) = mpsc::channel::<PersistMsg>(config.persist_queue_bound.max(1));
        let worker = PersistWorker {
            sink: Arc::new(Mutex::new(sink)),
            buf: Vec::new(),
            last_durable: 0,
            events_tx: events_tx.clone(),
            stalled_tx,
        };
        spawn_persistence_worker(worker, persist_rx, config.clone());
        persist_tx
    });

    let shards: Vec<_> = stores
        .into_iter()
        .enumerate()
        .map(|(index, store)| {
            let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(256);
            let ctx = ShardContext {
                index,
                ack_mode: config.ack_mode,
                events_tx: events_tx.clone(),
                persist_tx: persist_tx.clone(),
                stalled: stalled_rx.clone(),
            };
            spawn_shard(store, cmd_rx, ctx);
            cmd_tx
        })
        .collect();

    LedgerHandle {
        shards: shards.into(),
        persist_tx,
        events_tx,
        seq,
    }
}

fn spawn_shard(store: LedgerStore, mut cmd_rx: mpsc::Receiver<Command>, ctx: ShardContext) {
    tokio::spawn(async move {
        let mut store = store;
        tracing::debug!(shard = ctx.index, "ledger shard started");
        while let Some(cmd) = cmd_rx.recv().await {
            if handle_command(cmd, &mut store, &ctx).await {
                break;
            }
        }
        tracing::debug!(shard = ctx.index, "ledger shard stopped");
    });
}

impl LedgerHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events_tx.subscribe()
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Highest sequence handed out so far.
    pub fn latest_seq(&self) -> EntrySeq {
        self.seq.latest()
    }

    pub async fn balance(&self, user_id: &str) -> Result<Credits, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(
            user_id,
            Command::Balance {
                user_id: user_id.to_string(),
                resp: tx,
            },
        )
        .await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    pub async fn can_afford(&self, user_id: &str, amount: Credits) -> Result<bool, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(
            user_id,
            Command::CanAfford {
                user_id: user_id.to_string(),
                amount,
                resp: tx,
            },
        )
        .await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    pub async fn credit(
        &self,
        user_id: &str,
        amount: Credits,
        kind: LedgerKind,
    ) -> Result<LedgerEntry, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(
            user_id,
            Command::Credit {
                user_id: user_id.to_string(),
                amount,
                kind,
                resp: tx,
            },
        )
        .await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Atomic check-and-debit; fails without side effects when the balance
    /// is below `amount`.
    pub async fn debit(
        &self,
        user_id: &str,
        amount: Credits,
        kind: LedgerKind,
    ) -> Result<LedgerEntry, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(
            user_id,
            Command::Debit {
                user_id: user_id.to_string(),
                amount,
                kind,
                resp: tx,
            },
        )
        .await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    pub(crate) async fn record_translation(
        &self,
        draft: TranslationDraft,
    ) -> Result<TranslationRecord, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        let user_id = draft.user_id.clone();
        self.send(&user_id, Command::RecordTranslation { draft, resp: tx })
            .await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Ledger entries for one user, or for everyone merged in sequence order.
    pub async fn transactions(&self, user_id: Option<&str>) -> Result<Vec<LedgerEntry>, RuntimeError> {
        match user_id {
            Some(user) => {
                let (tx, rx) = oneshot::channel();
                self.send(
                    user,
                    Command::Transactions {
                        user_id: Some(user.to_string()),
                        resp: tx,
                    },
                )
                .await?;
                rx.await.map_err(|_| RuntimeError::ChannelClosed)
            }
            None => {
                let mut all = Vec::new();
                for shard in self.shards.iter() {
                    let (tx, rx) = oneshot::channel();
                    shard
                        .send(Command::Transactions {
                            user_id: None,
                            resp: tx,
                        })
                        .await
                        .map_err(|_| RuntimeError::ChannelClosed)?;
                    all.extend(rx.await.map_err(|_| RuntimeError::ChannelClosed)?);
                }
                all.sort_by_key(|entry| entry.seq);
                Ok(all)
            }
        }
    }

    /// Translation records for one user, or for everyone merged in sequence order.
    pub async fn translations(
        &self,
        user_id: Option<&str>,
    ) -> Result<Vec<TranslationRecord>, RuntimeError> {
        match user_id {
            Some(user) => {
                let (tx, rx) = oneshot::channel();
                self.send(
                    user,
                    Command::Translations {
                        user_id: Some(user.to_string()),
                        resp: tx,
                    },
                )
                .await?;
                rx.await.map_err(|_| RuntimeError::ChannelClosed)
            }
            None => {
                let mut all = Vec::new();
                for shard in self.shards.iter() {
                    let (tx, rx) = oneshot::channel();
                    shard
                        .send(Command::Translations {
                            user_id: None,
                            resp: tx,
                        })
                        .await
                        .map_err(|_| RuntimeError::ChannelClosed)?;
                    all.extend(rx.await.map_err(|_| RuntimeError::ChannelClosed)?);
                }
                all.sort_by_key(|record| record.seq);
                Ok(all)
            }
        }
    }

    /// Forces buffered ops to the journal and returns the durable sequence.
    pub async fn flush(&self) -> Result<EntrySeq, RuntimeError> {
        let Some(tx) = self.persist_tx.as_ref() else {
            return Ok(self.seq.latest());
        };
        let (flush_tx, flush_rx) = oneshot::channel();
        tx.send(PersistMsg::Flush { resp: flush_tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        flush_rx
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?
            .map_err(RuntimeError::from)
    }

    /// Stops every shard, then drains the persistence worker.
    ///
    /// Fails if buffered ops could not be written to the journal.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        for shard in self.shards.iter() {
            let (tx, rx) = oneshot::channel();
            shard
                .send(Command::Shutdown { resp: tx })
                .await
                .map_err(|_| RuntimeError::ChannelClosed)?;
            rx.await.map_err(|_| RuntimeError::ChannelClosed)?;
        }

        if let Some(tx) = self.persist_tx.as_ref() {
            let (done_tx, done_rx) = oneshot::channel();
            tx.send(PersistMsg::Shutdown { resp: done_tx })
                .await
                .map_err(|_| RuntimeError::ChannelClosed)?;
            done_rx.await.map_err(|_| RuntimeError::ChannelClosed)??;
        }
        Ok(())
    }

    async fn send(&self, user_id: &str, cmd: Command) -> Result<(), RuntimeError> {
        let idx = shard_index(user_id, self.shards.len());
        self.shards[idx]
            .send(cmd)
            .await
            .map_err(|_| RuntimeError::ChannelClosed)
    }
}

async fn handle_command(cmd: Command, store: &mut LedgerStore, ctx: &ShardContext) -> bool {
    match cmd {
        Command::Balance { user_id, resp } => {
            let _ = resp.send(store.balance(&user_id));
        }
        Command::CanAfford {
            user_id,
            amount,
            resp,
        } => {
            let _ = resp.send(store.can_afford(&user_id, amount));
        }
        Command::Credit {
            user_id,
            amount,
            kind,
            resp,
        } => {
            let res = commit(store, ctx, |store| {
                store.credit(&user_id, amount, kind).map(|(entry, _)| entry)
            })
            .await;
            if let Ok(entry) = &res {
                let _ = ctx.events_tx.send(LedgerEvent::Credited {
                    user_id,
                    amount,
                    kind,
                    seq: entry.seq,
                });
            }
            let _ = resp.send(res);
        }
        Command::Debit {
            user_id,
            amount,
            kind,
            resp,
        } => {
            let res = commit(store, ctx, |store| {
                store.debit(&user_id, amount, kind).map(|(entry, _)| entry)
            })
            .await;
            if let Ok(entry) = &res {
                let _ = ctx.events_tx.send(LedgerEvent::Debited {
                    user_id,
                    amount,
                    kind,
                    seq: entry.seq,
                });
            }
            let _ = resp.send(res);
        }
        Command::RecordTranslation { draft, resp } => {
            let res = commit(store, ctx, |store| Ok(store.record_translation(draft).0)).await;
            if let Ok(record) = &res {
                let _ = ctx.events_tx.send(LedgerEvent::TranslationRecorded {
                    user_id: record.user_id.clone(),
                    seq: record.seq,
                });
            }
            let _ = resp.send(res);
        }
        Command::Transactions { user_id, resp } => {
            let _ = resp.send(store.transactions(user_id.as_deref()));
        }
        Command::Translations { user_id, resp } => {
            let _ = resp.send(store.translations(user_id.as_deref()));
        }
        Command::Shutdown { resp } => {
            let _ = resp.send(());
            return true;
        }
    }

    false
}

/// Applies `mutate` so that its journal op is accepted before the caller
/// hears about success.
async fn commit<T>(
    store: &mut LedgerStore,
    ctx: &ShardContext,
    mutate: impl FnOnce(&mut LedgerStore) -> Result<T, LedgerError>,
) -> Result<T, RuntimeError> {
    let Some(tx) = ctx.persist_tx.as_ref() else {
        let out = mutate(store)?;
        store.drain_pending_ops();
        let _ = ctx.events_tx.send(LedgerEvent::DurableUpTo {
            seq: store.latest_seq(),
        });
        return Ok(out);
    };

    match ctx.ack_mode {
        AckMode::InMemory => {
            let stalled = ctx.stalled.borrow().clone();
            if let Some(err) = stalled {
                return Err(RuntimeError::Persist(PersistError::Message(format!(
                    "journal writes are failing: {err}"
                ))));
            }
            let permit = tx.try_reserve().map_err(|err| {
                RuntimeError::Persist(PersistError::Message(format!("persist queue error: {err}")))
            })?;
            let out = mutate(store)?;
            permit.send(PersistMsg::Ops(store.drain_pending_ops()));
            Ok(out)
        }
        AckMode::Durable => {
            let out = mutate(store)?;
            let ops = store.drain_pending_ops();
            let (resp_tx, resp_rx) = oneshot::channel();
            let result = match tx
                .send(PersistMsg::Commit {
                    ops: ops.clone(),
                    resp: resp_tx,
                })
                .await
            {
                Ok(()) => resp_rx
                    .await
                    .map_err(|_| RuntimeError::ChannelClosed)
                    .and_then(|r| r.map_err(RuntimeError::from)),
                Err(_) => Err(RuntimeError::ChannelClosed),
            };

            if let Err(err) = result {
                for op in ops.iter().rev() {
                    store.rollback(op);
                }
                tracing::warn!(shard = ctx.index, error = %err, "journal commit rejected, change rolled back");
                return Err(err);
            }
            Ok(out)
        }
    }
}

/// Owns the sink and the in-memory ack buffer.
struct PersistWorker {
    sink: Arc<Mutex<Box<dyn OpSink>>>,
    buf: Vec<StoredOp>,
    last_durable: EntrySeq,
    events_tx: broadcast::Sender<LedgerEvent>,
    stalled_tx: watch::Sender<Option<String>>,
}

impl PersistWorker {
    /// Writes every buffered op as one batch.
    ///
    /// On failure the batch stays buffered for the next attempt and shards
    /// refuse new in-memory acks until a write succeeds.
    async fn drain(&mut self) -> Result<EntrySeq, PersistError> {
        if self.buf.is_empty() {
            return Ok(self.last_durable);
        }

        let count = self.buf.len();
        match self.append(self.buf.clone()).await {
            Ok(seq) => {
                self.buf.drain(..count);
                self.mark_durable(seq);
                if self.stalled_tx.borrow().is_some() {
                    tracing::info!(last_durable = self.last_durable, "journal writes recovered");
                    self.stalled_tx.send_replace(None);
                }
                Ok(self.last_durable)
            }
            Err(err) => {
                tracing::error!(pending = count, error = %err, "journal append failed, ops kept for retry");
                self.stalled_tx.send_replace(Some(err.to_string()));
                let _ = self.events_tx.send(LedgerEvent::JournalStalled { pending: count });
                Err(err)
            }
        }
    }

    /// Writes ops a shard is waiting on. Nothing is kept on failure; the
    /// shard rolls the change back.
    async fn commit(&mut self, ops: Vec<StoredOp>) -> Result<EntrySeq, PersistError> {
        self.drain().await?;
        let count = ops.len();
        match self.append(ops).await {
            Ok(seq) => {
                self.mark_durable(seq);
                Ok(self.last_durable)
            }
            Err(err) => {
                tracing::error!(ops = count, error = %err, "journal commit failed");
                Err(err)
            }
        }
    }

    async fn append(&self, ops: Vec<StoredOp>) -> Result<EntrySeq, PersistError> {
        let sink = Arc::clone(&self.sink);
        tokio::task::spawn_blocking(move || {
            let mut sink = sink.blocking_lock();
            sink.append_ops(&ops)
        })
            .await
            .map_err(|e| PersistError::Message(format!("join error: {e}")))?
    }

    /// Appended rows are already committed, so a failed checkpoint is only
    /// logged.
    async fn checkpoint(&self) {
        let sink = Arc::clone(&self.sink);
        let res = tokio::task::spawn_blocking(move || {
            let mut sink = sink.blocking_lock();
            sink.flush()
        })
        .await;
        match res {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(error = %err, "journal checkpoint failed"),
            Err(err) => tracing::warn!(error = %err, "journal checkpoint task failed"),
        }
    }

    async fn drain_and_checkpoint(&mut self) -> Result<EntrySeq, PersistError> {
        let durable = self.drain().await?;
        self.checkpoint().await;
        Ok(durable)
    }

    fn mark_durable(&mut self, seq: EntrySeq) {
        self.last_durable = self.last_durable.max(seq);
        let _ = self.events_tx.send(LedgerEvent::DurableUpTo {
            seq: self.last_durable,
        });
    }
}

fn spawn_persistence_worker(
    mut worker: PersistWorker,
    mut rx: mpsc::Receiver<PersistMsg>,
    config: RuntimeConfig,
) {
    let latency = Duration::from_millis(config.batch_max_latency_ms);
    tokio::spawn(async move {
        let mut deadline = Instant::now() + latency;

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(msg) = msg else {
                        if worker.drain_and_checkpoint().await.is_err() {
                            tracing::error!(pending = worker.buf.len(), "ledger dropped with unwritten journal ops");
                        }
                        break;
                    };

                    match msg {
                        PersistMsg::Ops(ops) => {
                            worker.buf.extend(ops);
                            if worker.buf.len() >= config.batch_max_ops {
                                // A failed batch stays buffered and is reported through `stalled`.
                                let _ = worker.drain().await;
                                deadline = Instant::now() + latency;
                            }
                        }
                        PersistMsg::Commit { ops, resp } => {
                            let _ = resp.send(worker.commit(ops).await);
                        }
                        PersistMsg::Flush { resp } => {
                            let _ = resp.send(worker.drain_and_checkpoint().await);
                            deadline = Instant::now() + latency;
                        }
                        PersistMsg::Shutdown { resp } => {
                            let result = worker.drain_and_checkpoint().await;
                            if result.is_err() {
                                tracing::error!(pending = worker.buf.len(), "shutting down with unwritten journal ops");
                            }
                            let _ = resp.send(result);
                            break;
                        }
                    }
                }
                _ = tokio::time::sleep_until(deadline), if !worker.buf.is_empty() => {
                    let _ = worker.drain().await;
                    deadline = Instant::now() + latency;
                }
            }
        }
        tracing::debug!(last_durable = worker.last_durable, "persistence worker stopped");
    });
}
