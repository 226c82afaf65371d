//! Pushes one sample per tick to every connected subscriber.
//!
//! The broadcaster is `Idle` while nobody listens and `Active` otherwise. With a
//! [`TickSource::Timer`] the first subscriber starts a periodic task that calls
//! [`Broadcaster::tick`] at the sampling rate; the last one leaving stops it. With
//! [`TickSource::External`] nothing runs on its own: samples arrive through
//! [`Broadcaster::publish`] (device relay) or explicit `tick` calls.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::data::generator::{generate, Channel, GeneratorParams};
use crate::data::sample::Sample;
use crate::data::window::WindowBuffer;
use crate::error::ParamError;

/// Samples kept for the periodogram.
pub const HISTORY_CAPACITY: usize = 50_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickSource {
    Timer,
    External,
}

/// How sample indices are assigned to subscribers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IndexPolicy {
    /// Each subscriber starts at index 0 and counts on its own.
    #[default]
    PerConnection,
    /// One counter for everybody; it survives idle periods.
    Shared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BroadcastState {
    Idle,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BroadcastSettings {
    pub channel: Channel,
    pub params: GeneratorParams,
}

impl BroadcastSettings {
    pub fn period(&self) -> Result<Duration, ParamError> {
        self.params.tick_period()
    }
}

/// Reported by `GET /status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastStatus {
    pub state: BroadcastState,
    pub subscribers: usize,
    pub channel: Channel,
    pub params: GeneratorParams,
}

struct Subscriber {
    id: u64,
    tx: UnboundedSender<Sample>,
    next_index: u64,
}

struct Inner {
    settings: BroadcastSettings,
    subscribers: Vec<Subscriber>,
    next_id: u64,
    shared_index: u64,
    history: WindowBuffer<Sample>,
    rng: StdRng,
    timer: Option<JoinHandle<()>>,
}

#[derive(Clone)]
pub struct Broadcaster {
    inner: Arc<Mutex<Inner>>,
    tick_source: TickSource,
    policy: IndexPolicy,
}

/// Receiving end of one subscriber. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    rx: UnboundedReceiver<Sample>,
    owner: Broadcaster,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn recv(&mut self) -> Option<Sample> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Sample> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.owner.unsubscribe(self.id);
    }
}

impl Broadcaster {
    pub fn new(settings: BroadcastSettings, tick_source: TickSource, policy: IndexPolicy) -> Self {
        Self::with_rng(settings, tick_source, policy, StdRng::from_entropy())
    }

    /// Same as [`Broadcaster::new`] with a reproducible noise sequence.
    pub fn with_seed(
        settings: BroadcastSettings,
        tick_source: TickSource,
        policy: IndexPolicy,
        seed: u64,
    ) -> Self {
        Self::with_rng(settings, tick_source, policy, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        settings: BroadcastSettings,
        tick_source: TickSource,
        policy: IndexPolicy,
        rng: StdRng,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                settings,
                subscribers: Vec::new(),
                next_id: 0,
                shared_index: 0,
                history: WindowBuffer::new(HISTORY_CAPACITY),
                rng,
                timer: None,
            })),
            tick_source,
            policy,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn tick_source(&self) -> TickSource {
        self.tick_source
    }

    pub fn index_policy(&self) -> IndexPolicy {
        self.policy
    }

    pub fn settings(&self) -> BroadcastSettings {
        self.lock().settings
    }

    pub fn state(&self) -> BroadcastState {
        if self.lock().subscribers.is_empty() {
            BroadcastState::Idle
        } else {
            BroadcastState::Active
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    pub fn status(&self) -> BroadcastStatus {
        let inner = self.lock();
        BroadcastStatus {
            state: if inner.subscribers.is_empty() {
                BroadcastState::Idle
            } else {
                BroadcastState::Active
            },
            subscribers: inner.subscribers.len(),
            channel: inner.settings.channel,
            params: inner.settings.params,
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = unbounded_channel();
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.push(Subscriber {
            id,
            tx,
            next_index: 0,
        });
        debug!(id, subscribers = inner.subscribers.len(), "subscriber added");
        if inner.subscribers.len() == 1 {
            info!("first subscriber, broadcast active");
            self.start_timer(&mut inner);
        }
        drop(inner);
        Subscription {
            id,
            rx,
            owner: self.clone(),
        }
    }

    pub fn unsubscribe(&self, id: u64) {
        let mut inner = self.lock();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|s| s.id != id);
        if before != inner.subscribers.len() {
            debug!(id, subscribers = inner.subscribers.len(), "subscriber removed");
            if inner.subscribers.is_empty() {
                Self::go_idle(&mut inner);
            }
        }
    }

    /// Generate one sample per subscriber. Returns how many were delivered.
    pub fn tick(&self) -> usize {
        let policy = self.policy;
        let mut guard = self.lock();
        if guard.subscribers.is_empty() {
            return 0;
        }
        let inner = &mut *guard;
        let settings = inner.settings;
        let global = inner.shared_index;
        inner.shared_index += 1;
        let value = generate(global, settings.channel, &settings.params, &mut inner.rng);
        inner.history.push(Sample::new(global, value));

        let rng = &mut inner.rng;
        inner.subscribers.retain_mut(|sub| {
            let sample = match policy {
                IndexPolicy::Shared => Sample::new(global, value),
                IndexPolicy::PerConnection => {
                    let index = sub.next_index;
                    sub.next_index += 1;
                    Sample::new(
                        index,
                        generate(index, settings.channel, &settings.params, rng),
                    )
                }
            };
            sub.tx.send(sample).is_ok()
        });
        let delivered = inner.subscribers.len();
        if delivered == 0 {
            Self::go_idle(inner);
        }
        delivered
    }

    /// Forward an externally produced sample unchanged. Returns how many were delivered.
    pub fn publish(&self, sample: Sample) -> usize {
        let mut guard = self.lock();
        if guard.subscribers.is_empty() {
            return 0;
        }
        let inner = &mut *guard;
        inner.history.push(sample);
        inner.subscribers.retain(|sub| sub.tx.send(sample).is_ok());
        let delivered = inner.subscribers.len();
        if delivered == 0 {
            Self::go_idle(inner);
        }
        delivered
    }

    /// Switch the waveform; out-of-range channels are rejected and nothing changes.
    pub fn set_channel(&self, channel: i64) -> Result<Channel, ParamError> {
        let channel = Channel::try_from(channel)?;
        self.lock().settings.channel = channel;
        info!(%channel, "channel changed");
        Ok(channel)
    }

    /// Replace the generator settings. A new sampling rate re-arms a running timer.
    pub fn set_generator_params(&self, params: GeneratorParams) -> Result<(), ParamError> {
        params.validate()?;
        let mut inner = self.lock();
        let rate_changed = inner.settings.params.sampling_rate != params.sampling_rate;
        inner.settings.params = params;
        info!(
            frequency = params.frequency,
            sampling_rate = params.sampling_rate,
            noise = params.noise,
            bias = params.bias,
            "generator settings changed"
        );
        if rate_changed && inner.timer.is_some() {
            if let Some(handle) = inner.timer.take() {
                handle.abort();
            }
            self.start_timer(&mut inner);
        }
        Ok(())
    }

    /// Take every sample recorded since the last call, oldest first.
    pub fn drain_history(&self) -> Vec<Sample> {
        self.lock().history.drain()
    }

    fn start_timer(&self, inner: &mut Inner) {
        if self.tick_source != TickSource::Timer {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no tokio runtime, broadcast timer not started");
            return;
        };
        let period = match inner.settings.period() {
            Ok(period) => period,
            Err(e) => {
                warn!(error = %e, "broadcast timer not started");
                return;
            }
        };
        let this = self.clone();
        debug!(?period, "starting broadcast timer");
        inner.timer = Some(runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if this.tick() == 0 {
                    break;
                }
            }
        }));
    }

    fn go_idle(inner: &mut Inner) {
        info!("last subscriber left, broadcast idle");
        if let Some(handle) = inner.timer.take() {
            handle.abort();
        }
    }
}
