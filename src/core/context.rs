use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

/// Identity and clock for one workflow instance. One context per run,
/// passed explicitly to the store — no process-wide singletons.
#[derive(Clone)]
pub struct InstanceContext {
    pub instance_id: String,
    pub workflow_id: String,
    pub time_provider: Arc<dyn TimeProvider>,
    pub id_generator: Arc<dyn IdGenerator>,
}

impl InstanceContext {
    pub fn new(workflow_id: impl Into<String>) -> Self {
        let id_generator: Arc<dyn IdGenerator> = Arc::new(RealIdGenerator);
        let instance_id = id_generator.next_id();
        Self {
            instance_id,
            workflow_id: workflow_id.into(),
            time_provider: Arc::new(RealTimeProvider),
            id_generator,
        }
    }

    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = instance_id.into();
        self
    }

    pub fn with_time_provider(mut self, time_provider: Arc<dyn TimeProvider>) -> Self {
        self.time_provider = time_provider;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.time_provider.now()
    }
}

/// Provides the current wall-clock time for the engine.
pub trait TimeProvider: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Generates unique identifiers (e.g. instance ids).
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

// --- Real implementations ---

/// Production [`TimeProvider`] using the system clock.
pub struct RealTimeProvider;

impl TimeProvider for RealTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Production [`IdGenerator`] using UUID v4.
pub struct RealIdGenerator;

impl IdGenerator for RealIdGenerator {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

// --- Fake implementations ---

/// Deterministic [`TimeProvider`] for testing. Returns a fixed base time,
/// advanced by one millisecond on each call so that successive history
/// entries keep distinct, monotonic timestamps.
pub struct FakeTimeProvider {
    base: DateTime<Utc>,
    ticks: AtomicU64,
}

impl FakeTimeProvider {
    pub fn new(base: DateTime<Utc>) -> Self {
        Self {
            base,
            ticks: AtomicU64::new(0),
        }
    }

    /// Panics if `millis` is outside the representable timestamp range, so
    /// a bad fixture fails the test instead of silently using the real
    /// clock.
    pub fn at_epoch_millis(millis: i64) -> Self {
        Self::new(
            DateTime::<Utc>::from_timestamp_millis(millis)
                .expect("epoch millis out of range for a timestamp"),
        )
    }
}

impl TimeProvider for FakeTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
        self.base + Duration::milliseconds(tick as i64)
    }
}

/// Deterministic [`IdGenerator`] for testing. Produces sequential ids with
/// a prefix.
pub struct FakeIdGenerator {
    pub prefix: String,
    counter: AtomicU64,
}

impl FakeIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl IdGenerator for FakeIdGenerator {
    fn next_id(&self) -> String {
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}", self.prefix, id)
    }
}
