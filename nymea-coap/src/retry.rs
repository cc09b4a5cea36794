use core::ops::RangeInclusive;

use embedded_time::duration::Milliseconds;
use embedded_time::Instant;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::time::{millis_between, millis_since_epoch, Clock};

/// Decides when a confirmable message is due to be sent again,
/// and when to give up on it.
///
/// The timer only keeps time. The engine stores the packed datagram
/// beside it and consults [`RetryTimer::what_should_i_do`] once
/// [`RetryTimer::next_attempt_at`] has passed.
///
/// ```
/// use embedded_time::duration::Milliseconds;
/// use embedded_time::Clock;
/// use nymea_coap::retry;
///
/// let clock = nymea_coap::std::Clock::new();
/// let now = || clock.try_now().unwrap();
/// let strategy = retry::Strategy::Delay { min: Milliseconds(1),
///                                         max: Milliseconds(1) };
/// let mut retry = retry::RetryTimer::new(now(), strategy, retry::Attempts(2));
///
/// loop {
///   match retry.what_should_i_do(now()) {
///     | Ok(retry::YouShould::Retry) => continue,
///     | Ok(retry::YouShould::Cry) => break,
///     | Err(nb::Error::WouldBlock) => std::thread::sleep(std::time::Duration::from_millis(1)),
///     | Err(nb::Error::Other(never)) => match never {},
///   }
/// }
///
/// assert_eq!(retry.attempts(), retry::Attempts(2));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RetryTimer<C: Clock> {
  start: Instant<C>,
  init: Milliseconds<u64>,
  strategy: Strategy,
  attempts: Attempts,
  max_attempts: Attempts,
}

/// How many times a message has been (or may be) sent, the first send included
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Attempts(pub u16);

/// What [`RetryTimer::what_should_i_do`] decided
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum YouShould {
  /// Every attempt went unanswered; the exchange has timed out
  Cry,
  /// Send the message again
  Retry,
}

impl<C: Clock> RetryTimer<C> {
  /// Start timing a message that was first sent at `start`.
  ///
  /// When the strategy's bounds differ, the initial delay is drawn
  /// at random between them.
  pub fn new(start: Instant<C>, strategy: Strategy, max_attempts: Attempts) -> Self {
    let range = strategy.range();
    let init = if strategy.has_jitter() {
      ChaCha8Rng::seed_from_u64(millis_since_epoch(start)).gen_range(range)
    } else {
      *range.start()
    };

    Self { start,
           init: Milliseconds(init),
           strategy,
           attempts: Attempts(1),
           max_attempts }
  }

  /// Ask whether the message should go out again.
  ///
  /// [`nb::Error::WouldBlock`] until the delay for the current attempt
  /// has passed; after that [`YouShould::Retry`] (counting the attempt)
  /// or, once `max_attempts` were used up, [`YouShould::Cry`].
  pub fn what_should_i_do(&mut self,
                          now: Instant<C>)
                          -> nb::Result<YouShould, core::convert::Infallible> {
    let elapsed = Milliseconds(millis_between(self.start, now));

    match (self.is_ready(elapsed, self.attempts.0), self.attempts >= self.max_attempts) {
      | (false, _) => Err(nb::Error::WouldBlock),
      | (true, true) => Ok(YouShould::Cry),
      | (true, false) => {
        self.attempts.0 += 1;
        Ok(YouShould::Retry)
      },
    }
  }

  /// Whether `elapsed` (since the first send) covers the delay owed after `attempts` sends
  pub fn is_ready(&self, Milliseconds(elapsed): Milliseconds<u64>, attempts: u16) -> bool {
    elapsed >= self.delay_until(attempts)
  }

  /// When the current attempt's delay runs out
  pub fn next_attempt_at(&self) -> Instant<C> {
    self.start
        .checked_add(Milliseconds(self.delay_until(self.attempts.0)))
        .unwrap_or(self.start)
  }

  /// Sends so far
  pub fn attempts(&self) -> Attempts {
    self.attempts
  }

  /// Sends allowed before giving up
  pub fn max_attempts(&self) -> Attempts {
    self.max_attempts
  }

  /// Milliseconds from `start` until the send after send number `attempts`
  fn delay_until(&self, attempts: u16) -> u64 {
    match (attempts, self.strategy) {
      | (0, _) => 0,
      | (n, Strategy::Delay { .. }) => self.init.0.saturating_mul(u64::from(n)),
      | (n, Strategy::Exponential { .. }) => Strategy::total_delay_exp(self.init, n),
    }
  }
}

/// How far apart retransmissions are spaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
  /// Wait a random delay in `init_min..=init_max` before the first
  /// retransmission, doubling it for each one after.
  Exponential {
    /// Lower bound of the first delay
    init_min: Milliseconds<u64>,
    /// Upper bound of the first delay
    init_max: Milliseconds<u64>,
  },
  /// Wait the same delay, picked once in `min..=max`, between every send.
  Delay {
    /// Lower bound of the delay
    min: Milliseconds<u64>,
    /// Upper bound of the delay
    max: Milliseconds<u64>,
  },
}

impl Strategy {
  /// Whether the bounds differ, so a delay has to be drawn between them
  pub fn has_jitter(&self) -> bool {
    let range = self.range();
    range.start() != range.end()
  }

  /// The bounds of the (first) delay
  pub fn range(&self) -> RangeInclusive<u64> {
    match *self {
      | Self::Delay { min, max } => min.0..=max.0,
      | Self::Exponential { init_min, init_max } => init_min.0..=init_max.0,
    }
  }

  /// The longest an exchange can wait before timing out
  pub fn max_time(&self, max_attempts: Attempts) -> Milliseconds<u64> {
    let ms = match *self {
      | Self::Exponential { init_max, .. } => Self::total_delay_exp(init_max, max_attempts.0),
      | Self::Delay { max, .. } => max.0.saturating_mul(u64::from(max_attempts.0)),
    };

    Milliseconds(ms)
  }

  /// `init * 2^(attempt - 1)`: time from the first send until the send after `attempt`
  fn total_delay_exp(Milliseconds(init): Milliseconds<u64>, attempt: u16) -> u64 {
    init.saturating_mul(2u64.saturating_pow(u32::from(attempt.saturating_sub(1))))
  }
}
