//! Wall-clock time for fault timestamps.
//!
//! - [`Clock`] - cloneable time source used by [`LogAspect`](crate::LogAspect)
//! - [`ClockProvider`] - trait behind it, mockable for testing
//! - [`MockClock`] - controllable provider for tests

use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use parking_lot::RwLock;

// ─────────────────────────────────────────────────────────────────────────────
// ClockProvider Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for providing the current wall-clock time.
///
/// Implement this for custom time providers (e.g., a frozen clock in tests).
///
/// # Example
///
/// ```
/// use chrono::{DateTime, Utc};
/// use interpose_core_aspects::{Clock, ClockProvider};
///
/// /// A clock that always returns the Unix epoch.
/// struct EpochClock;
///
/// impl ClockProvider for EpochClock {
///     fn now(&self) -> DateTime<Utc> {
///         DateTime::UNIX_EPOCH
///     }
/// }
///
/// let clock = Clock::with_provider(EpochClock);
/// assert_eq!(clock.timestamp(), "1970-01-01T00:00:00.000Z");
/// ```
pub trait ClockProvider: Send + Sync + 'static {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// System clock provider using `chrono::Utc::now`.
#[derive(Debug, Clone, Copy, Default)]
struct SystemClock;

impl ClockProvider for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<P: ClockProvider + ?Sized> ClockProvider for Arc<P> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Clock
// ─────────────────────────────────────────────────────────────────────────────

/// Time source for diagnostic timestamps.
///
/// Uses the system clock by default, but can be configured with a mock
/// provider for testing.
#[derive(Clone)]
pub struct Clock {
    provider: Arc<dyn ClockProvider>,
}

impl Clock {
    /// Creates a Clock using the system clock.
    #[must_use]
    pub fn system() -> Self {
        Self {
            provider: Arc::new(SystemClock),
        }
    }

    /// Creates a Clock with a custom provider.
    #[must_use]
    pub fn with_provider(provider: impl ClockProvider) -> Self {
        Self {
            provider: Arc::new(provider),
        }
    }

    /// Returns the current time.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.provider.now()
    }

    /// Returns the current time as RFC 3339 with millisecond precision.
    #[must_use]
    pub fn timestamp(&self) -> String {
        self.now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::system()
    }
}

impl core::fmt::Debug for Clock {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Clock").field("now", &self.now()).finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MockClock for Testing
// ─────────────────────────────────────────────────────────────────────────────

/// Mock clock for testing with controllable time.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use chrono::{DateTime, Duration};
/// use interpose_core_aspects::{Clock, MockClock};
///
/// let mock = Arc::new(MockClock::new(DateTime::UNIX_EPOCH));
/// let clock = Clock::with_provider(Arc::clone(&mock));
///
/// mock.advance(Duration::seconds(60));
/// assert_eq!(clock.timestamp(), "1970-01-01T00:01:00.000Z");
/// ```
#[derive(Debug)]
pub struct MockClock {
    current: RwLock<DateTime<Utc>>,
}

impl MockClock {
    /// Creates a mock clock set to the given time.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: RwLock::new(start),
        }
    }

    /// Advances the clock by the given duration.
    pub fn advance(&self, duration: Duration) {
        *self.current.write() += duration;
    }

    /// Sets the clock to a specific time.
    pub fn set(&self, time: DateTime<Utc>) {
        *self.current.write() = time;
    }
}

impl ClockProvider for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.read()
    }
}
