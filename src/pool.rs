//! Core object pool implementation

use crate::available::{AvailableSet, Wake};
use crate::cancellation::CancellationToken;
use crate::config::{PoolConfiguration, ReclaimPolicy};
use crate::errors::{BoxError, PoolError, PoolResult};
use crate::gate::CapacityGate;
use crate::metrics::{MetricsExporter, MetricsTracker, PoolMetrics};

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken as TaskCancellationToken;
use tracing::{debug, trace, warn};

type Factory<T> = Arc<dyn Fn() -> Result<T, BoxError> + Send + Sync>;

/// A pooled object that automatically returns to the pool when dropped
///
/// The handle can be moved to and released from any thread.
pub struct PooledObject<T: Send + 'static> {
    value: Option<T>,
    pool: Arc<PoolInner<T>>,
}

impl<T: Send + 'static> PooledObject<T> {
    /// Return the object to the pool now instead of at the end of the scope
    pub fn release(self) {
        drop(self);
    }

    /// Take the object out of the pool for good
    ///
    /// Its capacity slot is freed, so a pool with a factory may create a
    /// replacement later. A fixed pool permanently shrinks by one.
    pub fn detach(mut self) -> T {
        let value = self.value.take().expect("Value already taken");
        self.pool.metrics.record_checkin();
        self.pool.free();
        value
    }
}

impl<T: Send + 'static> Deref for PooledObject<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.value.as_ref().expect("Value already taken")
    }
}

impl<T: Send + 'static> DerefMut for PooledObject<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.value.as_mut().expect("Value already taken")
    }
}

impl<T: Send + 'static> Drop for PooledObject<T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            self.pool.reclaim(value);
        }
    }
}

impl<T: Send + fmt::Debug + 'static> fmt::Debug for PooledObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledObject").field("value", &self.value).finish()
    }
}

/// State shared by a pool and all of its outstanding handles
struct PoolInner<T: Send + 'static> {
    available: AvailableSet<T>,
    gate: CapacityGate,
    factory: Option<Factory<T>>,
    reclaim: ReclaimPolicy<T>,
    reclaim_failure_hook: Option<fn(&PoolError)>,
    metrics: MetricsTracker,
}

impl<T: Send + 'static> PoolInner<T> {
    fn issue(self: &Arc<Self>, value: T) -> PooledObject<T> {
        self.metrics.record_checkout();
        trace!("object checked out");
        PooledObject {
            value: Some(value),
            pool: Arc::clone(self),
        }
    }

    /// Hand out an idle object or create one, without waiting
    fn try_take_or_create(self: &Arc<Self>) -> PoolResult<Option<PooledObject<T>>> {
        if let Some(value) = self.available.try_take() {
            return Ok(Some(self.issue(value)));
        }
        Ok(self.try_create()?.map(|value| self.issue(value)))
    }

    fn try_create(&self) -> PoolResult<Option<T>> {
        let Some(factory) = &self.factory else {
            return Ok(None);
        };
        let Some(reservation) = self.gate.try_reserve() else {
            return Ok(None);
        };

        // The factory runs outside the gate's lock; the reservation keeps
        // other creators from overshooting and rolls back if we fail.
        match factory() {
            Ok(value) => {
                reservation.commit();
                self.metrics.total_created.fetch_add(1, Ordering::Relaxed);
                debug!(
                    size = self.gate.size(),
                    max_size = self.gate.max_size(),
                    "created pooled object"
                );
                Ok(Some(value))
            }
            Err(err) => {
                drop(reservation);
                self.metrics.factory_failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %err, "object factory failed");
                Err(PoolError::factory(err))
            }
        }
    }

    fn take(
        self: &Arc<Self>,
        timeout: Option<Duration>,
        cancel: Option<&CancellationToken>,
    ) -> PoolResult<PooledObject<T>> {
        if let Some(object) = self.try_take_or_create()? {
            return Ok(object);
        }
        self.wait(timeout, cancel.as_slice())
    }

    /// Block until an object is returned, a slot frees up, the timeout
    /// elapses or a signal is cancelled
    fn wait(
        self: &Arc<Self>,
        timeout: Option<Duration>,
        signals: &[&CancellationToken],
    ) -> PoolResult<PooledObject<T>> {
        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));

        loop {
            match self.available.wait(deadline, signals) {
                Wake::Object(value) => return Ok(self.issue(value)),
                Wake::Vacancy => {
                    // Another caller may have claimed the slot first
                    if let Some(object) = self.try_take_or_create()? {
                        return Ok(object);
                    }
                }
                Wake::TimedOut => {
                    self.metrics.timeouts.fetch_add(1, Ordering::Relaxed);
                    return Err(PoolError::Timeout(timeout.unwrap_or_default()));
                }
                Wake::Cancelled => {
                    self.metrics.cancellations.fetch_add(1, Ordering::Relaxed);
                    return Err(PoolError::Cancelled);
                }
            }
        }
    }

    fn reclaim(&self, mut value: T) {
        self.metrics.record_checkin();

        if let ReclaimPolicy::Clear(clear) = self.reclaim {
            let failure = match panic::catch_unwind(AssertUnwindSafe(|| clear(&mut value))) {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(PoolError::reclaim(err)),
                Err(_) => Some(PoolError::reclaim("clear panicked")),
            };

            if let Some(err) = failure {
                // Slot goes back before the value's drop or the hook can panic
                self.free();
                self.metrics.reclaim_failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %err, "discarding pooled object that could not be cleared");
                drop(value);
                if let Some(hook) = self.reclaim_failure_hook {
                    hook(&err);
                }
                return;
            }
        }

        self.available.put(value);
        self.metrics.total_returned.fetch_add(1, Ordering::Relaxed);
        trace!("object returned to pool");
    }

    fn free(&self) {
        let size = self.gate.free();
        debug!(size, max_size = self.gate.max_size(), "freed pool slot");
        if self.factory.is_some() {
            self.available.notify_vacancy();
        }
    }

    fn warmup(&self, count: usize) -> PoolResult<usize> {
        let mut created = 0;
        while created < count {
            match self.try_create()? {
                Some(value) => {
                    self.available.put(value);
                    created += 1;
                }
                None => break,
            }
        }
        Ok(created)
    }
}

/// Await a blocking-pool task, re-raising its panic on the caller
async fn join_blocking<R>(handle: tokio::task::JoinHandle<PoolResult<R>>) -> PoolResult<R> {
    match handle.await {
        Ok(result) => result,
        Err(err) if err.is_panic() => panic::resume_unwind(err.into_panic()),
        Err(_) => Err(PoolError::Cancelled),
    }
}

/// Race a take against a tokio token
///
/// Dropping the losing take abandons its wait; the abandoned wait records
/// the cancellation and hands back anything delivered to it.
async fn until_cancelled<T, F>(
    take: F,
    token: &TaskCancellationToken,
) -> PoolResult<PooledObject<T>>
where
    T: Send + 'static,
    F: Future<Output = PoolResult<PooledObject<T>>>,
{
    tokio::select! {
        biased;
        result = take => result,
        () = token.cancelled() => Err(PoolError::Cancelled),
    }
}

/// Thread-safe pool bounding the number of live objects
///
/// A pool is built in one of three ways: from a factory alone
/// ([`ObjectPool::new`]), from a fixed collection ([`ObjectPool::fixed`]) or
/// from an initial collection topped up by a factory
/// ([`ObjectPool::with_initial`]).
///
/// Checkouts first take an idle object, then try to create one if the pool
/// is below capacity, and only then wait. Waiters are served best effort:
/// returned objects come back out in FIFO order, but there is no strict
/// ordering among waiting callers, and a caller arriving just as an object is
/// returned may get it ahead of one that has been waiting.
///
/// # Examples
///
/// ```
/// use gated_objectpool::{ObjectPool, PoolConfiguration};
/// use std::time::Duration;
///
/// let pool = ObjectPool::new(
///     || Ok::<_, std::io::Error>(Vec::<u8>::with_capacity(1024)),
///     PoolConfiguration::new().with_max_pool_size(1),
/// )
/// .unwrap();
///
/// let buffer = pool.take().unwrap();
/// assert!(pool.take_timeout(Duration::ZERO).unwrap_err().is_cancelled());
///
/// drop(buffer);
/// assert!(pool.take_timeout(Duration::ZERO).is_ok());
/// ```
pub struct ObjectPool<T: Send + 'static> {
    inner: Arc<PoolInner<T>>,
}

impl<T: Send + 'static> ObjectPool<T> {
    /// Create a pool that creates objects on demand, up to `max_pool_size`
    pub fn new<F, E>(factory: F, config: PoolConfiguration<T>) -> PoolResult<Self>
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        config.validate()?;
        let max_size = config.max_pool_size;
        Ok(Self::build(Vec::new(), Some(Self::share_factory(factory)), max_size, &config))
    }

    /// Create a pool over a fixed set of objects
    ///
    /// Capacity is the number of objects; `max_pool_size` is ignored. Objects
    /// discarded on return are never replaced.
    pub fn fixed(objects: Vec<T>, config: PoolConfiguration<T>) -> PoolResult<Self> {
        if objects.is_empty() {
            return Err(PoolError::configuration("a fixed pool needs at least one object"));
        }
        let max_size = objects.len();
        Ok(Self::build(objects, None, max_size, &config))
    }

    /// Create a pool seeded with `initial` objects that creates more on demand
    ///
    /// Objects beyond `max_pool_size` are dropped.
    pub fn with_initial<F, E, I>(
        factory: F,
        initial: I,
        config: PoolConfiguration<T>,
    ) -> PoolResult<Self>
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
        I: IntoIterator<Item = T>,
    {
        config.validate()?;
        let max_size = config.max_pool_size;
        let initial: Vec<T> = initial.into_iter().take(max_size).collect();
        Ok(Self::build(initial, Some(Self::share_factory(factory)), max_size, &config))
    }

    fn share_factory<F, E>(factory: F) -> Factory<T>
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Arc::new(move || factory().map_err(Into::into))
    }

    fn build(
        objects: Vec<T>,
        factory: Option<Factory<T>>,
        max_size: usize,
        config: &PoolConfiguration<T>,
    ) -> Self {
        let size = objects.len();
        let available = AvailableSet::new(max_size);
        for object in objects {
            available.put(object);
        }

        debug!(
            size,
            max_size,
            has_factory = factory.is_some(),
            reclaim = ?config.reclaim,
            "object pool created"
        );

        Self {
            inner: Arc::new(PoolInner {
                available,
                gate: CapacityGate::new(size, max_size),
                factory,
                reclaim: config.reclaim,
                reclaim_failure_hook: config.reclaim_failure_hook,
                metrics: MetricsTracker::new(),
            }),
        }
    }

    /// Get an idle object or create one, without waiting
    ///
    /// Returns `Ok(None)` when the pool is empty and at capacity.
    pub fn try_take(&self) -> PoolResult<Option<PooledObject<T>>> {
        self.inner.try_take_or_create()
    }

    /// Get an object, waiting as long as it takes
    pub fn take(&self) -> PoolResult<PooledObject<T>> {
        self.inner.take(None, None)
    }

    /// Get an object, waiting at most `timeout`
    ///
    /// A zero timeout tries once and never blocks.
    pub fn take_timeout(&self, timeout: Duration) -> PoolResult<PooledObject<T>> {
        self.inner.take(Some(timeout), None)
    }

    /// Get an object, waiting until one is available or `token` is cancelled
    pub fn take_with_cancel(&self, token: &CancellationToken) -> PoolResult<PooledObject<T>> {
        self.inner.take(None, Some(token))
    }

    /// Get an object, waiting at most `timeout` unless `token` is cancelled first
    pub fn take_timeout_with_cancel(
        &self,
        timeout: Duration,
        token: &CancellationToken,
    ) -> PoolResult<PooledObject<T>> {
        self.inner.take(Some(timeout), Some(token))
    }

    /// Get an object asynchronously, waiting as long as it takes
    ///
    /// Completes without suspending when an object is idle or can be
    /// created. Otherwise the wait runs on tokio's blocking pool so the
    /// calling task is free; dropping the future abandons that wait.
    pub async fn take_async(&self) -> PoolResult<PooledObject<T>> {
        self.take_async_inner(None, None).await
    }

    /// Get an object asynchronously, waiting at most `timeout`
    pub async fn take_timeout_async(&self, timeout: Duration) -> PoolResult<PooledObject<T>> {
        self.take_async_inner(Some(timeout), None).await
    }

    /// Get an object asynchronously, until one is available or `token` is cancelled
    pub async fn take_with_cancel_async(
        &self,
        token: &CancellationToken,
    ) -> PoolResult<PooledObject<T>> {
        self.take_async_inner(None, Some(token)).await
    }

    /// Get an object asynchronously, waiting at most `timeout` unless `token` is cancelled first
    pub async fn take_timeout_with_cancel_async(
        &self,
        timeout: Duration,
        token: &CancellationToken,
    ) -> PoolResult<PooledObject<T>> {
        self.take_async_inner(Some(timeout), Some(token)).await
    }

    /// Get an object asynchronously, until one is available or a tokio
    /// `CancellationToken` is cancelled
    ///
    /// Like [`take_with_cancel_async`](Self::take_with_cancel_async) for
    /// callers already holding a `tokio_util` token. An idle object still
    /// wins over a token that is cancelled up front.
    pub async fn take_until_cancelled_async(
        &self,
        token: &TaskCancellationToken,
    ) -> PoolResult<PooledObject<T>> {
        until_cancelled(self.take_async(), token).await
    }

    /// Get an object asynchronously, waiting at most `timeout` unless a
    /// tokio `CancellationToken` is cancelled first
    pub async fn take_timeout_until_cancelled_async(
        &self,
        timeout: Duration,
        token: &TaskCancellationToken,
    ) -> PoolResult<PooledObject<T>> {
        until_cancelled(self.take_timeout_async(timeout), token).await
    }

    async fn take_async_inner(
        &self,
        timeout: Option<Duration>,
        cancel: Option<&CancellationToken>,
    ) -> PoolResult<PooledObject<T>> {
        if let Some(object) = self.inner.try_take_or_create()? {
            return Ok(object);
        }

        // Neither of these can block
        if timeout == Some(Duration::ZERO) || cancel.is_some_and(CancellationToken::is_cancelled) {
            return self.inner.wait(timeout, cancel.as_slice());
        }

        let inner = Arc::clone(&self.inner);
        let cancel = cancel.cloned();
        let abandon = CancellationToken::new();
        let _abandon_guard = abandon.clone().drop_guard();

        join_blocking(tokio::task::spawn_blocking(move || match &cancel {
            Some(cancel) => inner.wait(timeout, &[&abandon, cancel]),
            None => inner.wait(timeout, &[&abandon]),
        }))
        .await
    }

    /// Warm up the pool by pre-creating up to `count` objects
    ///
    /// Stops early at capacity. Returns how many objects were created.
    pub fn warmup(&self, count: usize) -> PoolResult<usize> {
        self.inner.warmup(count)
    }

    /// Warm up asynchronously on tokio's blocking pool
    pub async fn warmup_async(&self, count: usize) -> PoolResult<usize> {
        let inner = Arc::clone(&self.inner);

        join_blocking(tokio::task::spawn_blocking(move || inner.warmup(count))).await
    }

    /// Live objects counted against capacity
    pub fn size(&self) -> usize {
        self.inner.gate.size()
    }

    pub fn max_size(&self) -> usize {
        self.inner.gate.max_size()
    }

    /// Get available count
    pub fn available_count(&self) -> usize {
        self.inner.available.len()
    }

    /// Get active count
    pub fn active_count(&self) -> usize {
        self.inner.metrics.active.load(Ordering::Relaxed)
    }

    pub fn has_factory(&self) -> bool {
        self.inner.factory.is_some()
    }

    /// Get pool metrics
    pub fn get_metrics(&self) -> PoolMetrics {
        self.inner
            .metrics
            .get_metrics(self.size(), self.available_count(), self.max_size())
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.get_metrics().export()
    }

    /// Export metrics in Prometheus format
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        MetricsExporter::export_prometheus(&self.get_metrics(), pool_name, tags)
    }
}

impl<T: Send + 'static> Clone for ObjectPool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPool")
            .field("size", &self.size())
            .field("max_size", &self.max_size())
            .field("available", &self.available_count())
            .field("has_factory", &self.has_factory())
            .finish()
    }
}
