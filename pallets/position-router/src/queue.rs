//! Per-kind FIFO queues of request keys.
//!
//! Each queue is an append-only arena of slots `[start, length)`. Slots below `start` have been
//! processed and their storage is reclaimed. Appends and cursor advances are the only mutations.

use crate::{
  Config, DecreaseRequests, Event, IncreaseRequests, LOG_TARGET, Pallet, RequestQueueKeys, RequestQueues,
  types::{RequestKey, RequestKind, RequestQueue},
};
use alloc::vec::Vec;
use frame::prelude::*;

impl<T: Config> Pallet<T> {
  /// Append `key` and return its slot index.
  pub(crate) fn enqueue(kind: RequestKind, key: RequestKey) -> u64 {
    RequestQueues::<T>::mutate(kind, |queue| {
      let slot = queue.length;
      RequestQueueKeys::<T>::insert(kind, slot, key);
      queue.length = queue.length.saturating_add(1);
      slot
    })
  }

  pub(crate) fn is_pending(kind: RequestKind, key: &RequestKey) -> bool {
    match kind {
      RequestKind::Increase => IncreaseRequests::<T>::contains_key(key),
      RequestKind::Decrease => DecreaseRequests::<T>::contains_key(key),
    }
  }

  /// Move `start` past the resolved prefix of the queue, visiting at most `max_steps` slots.
  /// Returns the new cursor.
  pub(crate) fn advance_queue(kind: RequestKind, max_steps: u32) -> u64 {
    let mut queue = RequestQueues::<T>::get(kind);
    let from = queue.start;
    let mut steps = 0u32;
    while queue.pending_span() > 0 && steps < max_steps {
      let pending = RequestQueueKeys::<T>::get(kind, queue.start)
        .is_some_and(|key| Self::is_pending(kind, &key));
      if pending {
        break;
      }
      RequestQueueKeys::<T>::remove(kind, queue.start);
      queue.start = queue.start.saturating_add(1);
      steps = steps.saturating_add(1);
    }
    if queue.start != from {
      log::debug!(
        target: LOG_TARGET,
        "{:?} queue start moved {} -> {}",
        kind,
        from,
        queue.start
      );
      RequestQueues::<T>::insert(kind, queue);
      Self::deposit_event(Event::QueueAdvanced {
        kind,
        start: queue.start,
      });
    }
    queue.start
  }

  /// Mark every slot in `[start, new_start)` processed.
  pub(crate) fn set_queue_start(kind: RequestKind, new_start: u64) {
    let mut queue = RequestQueues::<T>::get(kind);
    let target = new_start.min(queue.length);
    if queue.start >= target {
      return;
    }
    while queue.start < target {
      RequestQueueKeys::<T>::remove(kind, queue.start);
      queue.start = queue.start.saturating_add(1);
    }
    RequestQueues::<T>::insert(kind, queue);
    Self::deposit_event(Event::QueueAdvanced {
      kind,
      start: queue.start,
    });
  }

  /// `(increase_start, increase_length, decrease_start, decrease_length)`
  pub fn request_queue_lengths() -> (u64, u64, u64, u64) {
    let increase = RequestQueues::<T>::get(RequestKind::Increase);
    let decrease = RequestQueues::<T>::get(RequestKind::Decrease);
    (increase.start, increase.length, decrease.start, decrease.length)
  }

  pub fn request_queue(kind: RequestKind) -> RequestQueue {
    RequestQueues::<T>::get(kind)
  }

  /// Up to `limit` keys still pending, in queue order starting at `start`.
  pub fn pending_request_keys(kind: RequestKind, limit: u32) -> Vec<RequestKey> {
    let queue = RequestQueues::<T>::get(kind);
    (queue.start..queue.length)
      .filter_map(|slot| RequestQueueKeys::<T>::get(kind, slot))
      .filter(|key| Self::is_pending(kind, key))
      .take(limit as usize)
      .collect()
  }
}
