use core::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::reply::ReplyId;

/// What a deadline belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum Key {
  /// Retransmission of an exchange's last request
  Reply(ReplyId),
  /// Retransmission of the request fetching the rest of a blockwise notification
  NotificationFetch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Deadline {
  at: u64,
  generation: u64,
  key: Key,
}

/// Min-heap of retransmission deadlines (milliseconds since the clock's epoch)
/// shared by every outstanding exchange.
///
/// Each key has at most one live deadline. Rescheduling or cancelling
/// does not touch the heap; the superseded entry is recognised by its
/// generation and discarded when it reaches the top.
#[derive(Debug, Default)]
pub(crate) struct Deadlines {
  heap: BinaryHeap<Reverse<Deadline>>,
  live: HashMap<Key, u64>,
  generation: u64,
}

impl Deadlines {
  pub(crate) fn schedule(&mut self, key: Key, at: u64) {
    self.generation += 1;
    self.live.insert(key, self.generation);
    self.heap.push(Reverse(Deadline { at,
                                      generation: self.generation,
                                      key }));
  }

  pub(crate) fn cancel(&mut self, key: Key) {
    self.live.remove(&key);
  }

  #[cfg(test)]
  pub(crate) fn is_scheduled(&self, key: Key) -> bool {
    self.live.contains_key(&key)
  }

  /// The earliest live deadline
  pub(crate) fn next(&mut self) -> Option<u64> {
    self.discard_stale();
    self.heap.peek().map(|Reverse(d)| d.at)
  }

  /// Remove and yield the earliest live deadline if it is due at `now`
  pub(crate) fn pop_due(&mut self, now: u64) -> Option<Key> {
    match self.next() {
      | Some(at) if at <= now => {
        let Reverse(d) = self.heap.pop()?;
        self.live.remove(&d.key);
        Some(d.key)
      },
      | _ => None,
    }
  }

  fn discard_stale(&mut self) {
    while let Some(Reverse(d)) = self.heap.peek() {
      if self.live.get(&d.key) == Some(&d.generation) {
        break;
      }

      self.heap.pop();
    }
  }
}
