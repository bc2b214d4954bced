use crate::timing::ForbiddenReason;
use frame::prelude::*;

pub use primitives::{AssetKind, Balance, ReferralCode, RequestKey, params::MAX_PATH_LENGTH};

/// Swap route carried by a request: one asset, or an input asset plus one hop
pub type PathOf = BoundedVec<AssetKind, ConstU32<MAX_PATH_LENGTH>>;

/// Which of the two independent request queues an entry belongs to
#[derive(
  Clone,
  Copy,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  MaxEncodedLen,
  Ord,
  PartialEq,
  PartialOrd,
  TypeInfo,
)]
pub enum RequestKind {
  Increase,
  Decrease,
}

/// Pending request to open or grow a position
#[derive(Clone, Debug, Decode, Encode, Eq, MaxEncodedLen, PartialEq, TypeInfo)]
pub struct IncreaseRequest<AccountId, BlockNumber> {
  pub account: AccountId,
  /// `path[0]` is the deposited asset, `path.last()` the collateral
  pub path: PathOf,
  pub index_asset: AssetKind,
  pub amount_in: Balance,
  pub min_out: Balance,
  /// USD notional to add, in `PRICE_PRECISION` units
  pub size_delta: Balance,
  pub is_long: bool,
  pub acceptable_price: Balance,
  pub execution_fee: Balance,
  pub block_number: BlockNumber,
  /// Unix seconds at creation
  pub block_time: u64,
  pub has_collateral_in_native: bool,
}

/// Pending request to shrink or close a position
#[derive(Clone, Debug, Decode, Encode, Eq, MaxEncodedLen, PartialEq, TypeInfo)]
pub struct DecreaseRequest<AccountId, BlockNumber> {
  pub account: AccountId,
  /// `path[0]` is the collateral, `path.last()` the asset paid to `receiver`
  pub path: PathOf,
  pub index_asset: AssetKind,
  pub collateral_delta: Balance,
  pub size_delta: Balance,
  pub is_long: bool,
  pub receiver: AccountId,
  pub acceptable_price: Balance,
  pub execution_fee: Balance,
  pub block_number: BlockNumber,
  pub block_time: u64,
  pub withdraw_native: bool,
}

/// Funds held by the custodian on behalf of one pending request
#[derive(
  Clone, Copy, Debug, Decode, Default, Encode, Eq, MaxEncodedLen, PartialEq, TypeInfo,
)]
pub struct EscrowedFunds {
  /// Deposited input leg (increase requests only)
  pub input: Option<(AssetKind, Balance)>,
  /// Always denominated in the native asset
  pub execution_fee: Balance,
}

impl EscrowedFunds {
  /// Native-denominated part of the escrow
  pub fn native_amount(&self) -> Balance {
    let native_input = match self.input {
      Some((AssetKind::Native, amount)) => amount,
      _ => 0,
    };
    native_input.saturating_add(self.execution_fee)
  }
}

/// Append-only queue bookkeeping; slots below `start` are processed
#[derive(
  Clone, Copy, Debug, Decode, Default, Encode, Eq, MaxEncodedLen, PartialEq, TypeInfo,
)]
pub struct RequestQueue {
  pub start: u64,
  pub length: u64,
}

impl RequestQueue {
  pub fn pending_span(&self) -> u64 {
    self.length.saturating_sub(self.start)
  }
}

/// Keeper, public and stale-request delays
#[derive(
  Clone,
  Copy,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Default,
  Encode,
  Eq,
  MaxEncodedLen,
  PartialEq,
  TypeInfo,
)]
pub struct DelayValues<BlockNumber> {
  pub min_block_delay_keeper: BlockNumber,
  /// Seconds before the owner may resolve their own request
  pub min_time_delay_public: u64,
  /// Seconds after which anyone may cancel; zero disables the valve
  pub max_time_delay: u64,
}

/// How a single execute/cancel call ended
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Resolution {
  /// No record under the key
  AlreadyResolved,
  /// Keeper called before its block delay elapsed
  NotYetDue,
  /// Caller may not resolve the request yet, or at all
  Rejected(ForbiddenReason),
  Executed,
  /// Engine rejected the request and the escrow was refunded
  FellBackToCancel,
  Cancelled,
}

impl Resolution {
  pub fn is_resolved(&self) -> bool {
    matches!(
      self,
      Resolution::Executed | Resolution::FellBackToCancel | Resolution::Cancelled
    )
  }
}

/// Margin engine that opens, grows, shrinks and closes positions
pub trait PositionEngine<AccountId> {
  /// Swap along `path` and grow the position. The engine takes `amount_in` of `path[0]`
  /// from `custodian`. Slippage against `acceptable_price` is the engine's to enforce.
  fn increase_position(
    custodian: &AccountId,
    account: &AccountId,
    path: &[AssetKind],
    index_asset: AssetKind,
    amount_in: Balance,
    min_out: Balance,
    size_delta: Balance,
    is_long: bool,
    acceptable_price: Balance,
  ) -> DispatchResult;

  /// Shrink the position and pay `path.last()` to `receiver`; returns the amount paid out.
  /// With `withdraw_native` the payout must be made in the native asset.
  fn decrease_position(
    account: &AccountId,
    path: &[AssetKind],
    index_asset: AssetKind,
    collateral_delta: Balance,
    size_delta: Balance,
    is_long: bool,
    receiver: &AccountId,
    acceptable_price: Balance,
    withdraw_native: bool,
  ) -> Result<Balance, DispatchError>;
}

/// Referral bookkeeping collaborator
pub trait ReferralStorage<AccountId> {
  fn set_trader_referral_code(account: &AccountId, code: ReferralCode) -> DispatchResult;
}

impl<AccountId> ReferralStorage<AccountId> for () {
  fn set_trader_referral_code(_: &AccountId, _: ReferralCode) -> DispatchResult {
    Ok(())
  }
}

/// Per-asset open-interest caps the engine consults; `None` means uncapped
pub trait GlobalSizeLimits {
  fn max_global_long_size(index_asset: AssetKind) -> Option<Balance>;
  fn max_global_short_size(index_asset: AssetKind) -> Option<Balance>;
}

/// Helper for benchmarking
#[cfg(feature = "runtime-benchmarks")]
pub trait BenchmarkHelper<AccountId> {
  /// Make `asset` usable as a request input
  fn create_asset(asset: AssetKind) -> DispatchResult;
  fn mint_asset(asset: AssetKind, to: &AccountId, amount: Balance) -> DispatchResult;
  /// Make the engine accept an increase of `size_delta` on `index_asset`
  fn prepare_engine(index_asset: AssetKind, size_delta: Balance) -> DispatchResult;
}
