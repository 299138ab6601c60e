//! Pool configuration options

use std::fmt;

use crate::errors::{BoxError, PoolError, PoolResult};

/// Objects that can be prepared for reuse before they go back into the pool
///
/// When a pool is configured with [`PoolConfiguration::with_clearing`], every
/// returned object is cleared first. A failed clear discards the object and
/// frees its capacity slot instead of returning it.
///
/// # Examples
///
/// ```
/// use gated_objectpool::Clearable;
///
/// struct Buffer(Vec<u8>);
///
/// impl Clearable for Buffer {
///     type Error = std::convert::Infallible;
///
///     fn clear(&mut self) -> Result<(), Self::Error> {
///         self.0.clear();
///         Ok(())
///     }
/// }
/// ```
pub trait Clearable {
    type Error: Into<BoxError>;

    /// Reset the object so the next borrower sees a clean instance
    ///
    /// An error or a panic discards the object and frees its slot. The one
    /// exception is a handle dropped while its thread is already unwinding:
    /// a panic in `clear` at that point is a double panic and aborts the
    /// process, so implementations that may run during unwinding should
    /// report failure through the `Err` variant instead.
    fn clear(&mut self) -> Result<(), Self::Error>;
}

/// How a returned object is reclaimed
///
/// Bound once per pool at construction time.
pub enum ReclaimPolicy<T> {
    /// Put the object straight back into the pool
    Return,

    /// Run the clear operation first; discard the object if it fails
    Clear(fn(&mut T) -> Result<(), BoxError>),
}

impl<T> Default for ReclaimPolicy<T> {
    fn default() -> Self {
        Self::Return
    }
}

impl<T> Clone for ReclaimPolicy<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ReclaimPolicy<T> {}

impl<T> fmt::Debug for ReclaimPolicy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Return => f.write_str("Return"),
            Self::Clear(_) => f.write_str("Clear"),
        }
    }
}

fn clear_object<T: Clearable>(object: &mut T) -> Result<(), BoxError> {
    object.clear().map_err(Into::into)
}

/// Configuration for object pool behavior
///
/// # Examples
///
/// ```
/// use gated_objectpool::PoolConfiguration;
///
/// let config = PoolConfiguration::<i32>::new()
///     .with_max_pool_size(100);
///
/// assert_eq!(config.max_pool_size, 100);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct PoolConfiguration<T> {
    /// Maximum number of objects that can exist at the same time.
    /// Ignored by fixed pools, whose capacity is the size of their collection.
    pub max_pool_size: usize,

    /// What happens to an object when its handle is released
    pub reclaim: ReclaimPolicy<T>,

    /// Called whenever reclaiming an object fails
    pub reclaim_failure_hook: Option<fn(&PoolError)>,
}

impl<T> Default for PoolConfiguration<T> {
    fn default() -> Self {
        Self {
            max_pool_size: 10,
            reclaim: ReclaimPolicy::Return,
            reclaim_failure_hook: None,
        }
    }
}

impl<T> PoolConfiguration<T> {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum pool size
    pub fn with_max_pool_size(mut self, size: usize) -> Self {
        self.max_pool_size = size;
        self
    }

    /// Observe reclaim failures, which are otherwise only logged
    ///
    /// # Examples
    ///
    /// ```
    /// use gated_objectpool::{PoolConfiguration, PoolError};
    ///
    /// fn report(err: &PoolError) {
    ///     eprintln!("dropped a pooled object: {err}");
    /// }
    ///
    /// let config = PoolConfiguration::<i32>::new().with_reclaim_failure_hook(report);
    /// assert!(config.reclaim_failure_hook.is_some());
    /// ```
    pub fn with_reclaim_failure_hook(mut self, hook: fn(&PoolError)) -> Self {
        self.reclaim_failure_hook = Some(hook);
        self
    }

    /// Check the configuration before a pool is built from it
    pub fn validate(&self) -> PoolResult<()> {
        if self.max_pool_size == 0 {
            return Err(PoolError::configuration("max_pool_size must be greater than 0"));
        }
        Ok(())
    }
}

impl<T: Clearable> PoolConfiguration<T> {
    /// Clear objects through [`Clearable`] before they are reused
    pub fn with_clearing(mut self) -> Self {
        self.reclaim = ReclaimPolicy::Clear(clear_object::<T>);
        self
    }
}
