//! Timing policy for resolving pending requests.
//!
//! Pure functions over the creation stamp of a request, the current block stamp and the
//! configured [`DelayValues`]. Nothing here touches storage.

use crate::types::DelayValues;
use polkadot_sdk::sp_runtime::traits::Saturating;

/// Capability of the account calling execute or cancel
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CallerRole {
  /// Member of the keeper allow-list; checked before ownership
  Keeper,
  /// Account that created the request
  Owner,
  Public,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ForbiddenReason {
  NotAuthorized,
  DelayNotElapsed,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TimingOutcome {
  Due,
  /// Keeper arrived early; the call succeeds without effect
  NotYetDue,
  Forbidden(ForbiddenReason),
}

/// Block number and unix seconds at one point in time
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Stamp<BlockNumber> {
  pub block: BlockNumber,
  pub time: u64,
}

impl<BlockNumber> Stamp<BlockNumber> {
  pub fn new(block: BlockNumber, time: u64) -> Self {
    Self { block, time }
  }
}

/// Owner and public timing rule
fn public_delay_elapsed<B>(created: &Stamp<B>, now: &Stamp<B>, delays: &DelayValues<B>) -> bool {
  now.time >= created.time.saturating_add(delays.min_time_delay_public)
}

/// Past `max_time_delay`, anyone may cancel. A zero delay disables the valve.
pub fn is_stale<B>(created: &Stamp<B>, now: &Stamp<B>, delays: &DelayValues<B>) -> bool {
  delays.max_time_delay > 0 && now.time >= created.time.saturating_add(delays.max_time_delay)
}

pub fn execution_outcome<B>(
  role: CallerRole,
  created: &Stamp<B>,
  now: &Stamp<B>,
  delays: &DelayValues<B>,
) -> TimingOutcome
where
  B: Copy + PartialOrd + Saturating,
{
  match role {
    CallerRole::Keeper => {
      if now.block >= created.block.saturating_add(delays.min_block_delay_keeper) {
        TimingOutcome::Due
      } else {
        TimingOutcome::NotYetDue
      }
    }
    CallerRole::Owner => {
      if public_delay_elapsed(created, now, delays) {
        TimingOutcome::Due
      } else {
        TimingOutcome::Forbidden(ForbiddenReason::DelayNotElapsed)
      }
    }
    CallerRole::Public => TimingOutcome::Forbidden(ForbiddenReason::NotAuthorized),
  }
}

pub fn cancellation_outcome<B>(
  role: CallerRole,
  created: &Stamp<B>,
  now: &Stamp<B>,
  delays: &DelayValues<B>,
) -> TimingOutcome
where
  B: Copy + PartialOrd + Saturating,
{
  if is_stale(created, now, delays) {
    return TimingOutcome::Due;
  }
  execution_outcome(role, created, now, delays)
}
