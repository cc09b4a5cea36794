use embedded_time::duration::Milliseconds;
use embedded_time::Instant;

/// A duration, in milliseconds
pub type Millis = Milliseconds<u64>;

/// Supertrait of [`embedded_time::Clock`] pinning the
/// type of "ticks" to u64
pub trait Clock: embedded_time::Clock<T = u64> {}
impl<C: embedded_time::Clock<T = u64>> Clock for C {}

/// Milliseconds between the clock's epoch and `instant`.
///
/// Saturates at `u64::MAX` if the conversion overflows.
pub fn millis_since_epoch<C: Clock>(instant: Instant<C>) -> u64 {
  Millis::try_from(instant.duration_since_epoch()).map(|Milliseconds(ms)| ms)
                                                  .unwrap_or(u64::MAX)
}

/// Milliseconds elapsed from `earlier` to `later` (zero if `later` is not after `earlier`)
pub fn millis_between<C: Clock>(earlier: Instant<C>, later: Instant<C>) -> u64 {
  later.checked_duration_since(&earlier)
       .and_then(|d| Millis::try_from(d).ok())
       .map(|Milliseconds(ms)| ms)
       .unwrap_or(0)
}
