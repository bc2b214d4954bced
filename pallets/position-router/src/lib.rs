//! Position Router Pallet
//!
//! Deferred execution of leveraged-position requests.
//!
//! Traders submit increase/decrease requests together with an execution fee. The pallet escrows
//! the deposit, appends the request to a per-kind FIFO queue and waits for a keeper to execute it
//! against the margin engine after a block delay. If keepers stay silent the owner may resolve
//! their own request after a public time delay, and once `max_time_delay` has passed anyone may
//! cancel it. A request is resolved exactly once and whoever resolves it collects the fee.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub use pallet::*;

pub mod types;
pub use types::*;

pub mod timing;
pub use timing::{CallerRole, ForbiddenReason, Stamp, TimingOutcome};

mod custody;
mod queue;

#[cfg(test)]
pub mod mock;

#[cfg(feature = "runtime-benchmarks")]
mod benchmarking;

pub mod weights;
pub use weights::WeightInfo;

pub const LOG_TARGET: &str = "runtime::position-router";

#[frame::pallet]
pub mod pallet {
  use crate::{
    LOG_TARGET, WeightInfo,
    timing::{self, CallerRole, ForbiddenReason, Stamp, TimingOutcome},
    types::*,
  };
  use alloc::vec::Vec;
  use codec::Encode;
  use frame::deps::{
    frame_support::{
      storage::with_storage_layer,
      traits::{
        EnsureOrigin, UnixTime,
        fungible::{Inspect as NativeInspect, Mutate as NativeMutate},
        fungibles::{Inspect as FungiblesInspect, Mutate as FungiblesMutate},
      },
    },
    sp_runtime::traits::{AccountIdConversion, Saturating},
  };
  use polkadot_sdk::frame_support::traits::ConstBool;
  use frame::prelude::*;
  use polkadot_sdk::sp_runtime::Permill;
  use primitives::ecosystem::NULL_REFERRAL_CODE;

  pub type IncreaseRequestOf<T> =
    IncreaseRequest<<T as frame_system::Config>::AccountId, BlockNumberFor<T>>;
  pub type DecreaseRequestOf<T> =
    DecreaseRequest<<T as frame_system::Config>::AccountId, BlockNumberFor<T>>;

  #[pallet::config]
  pub trait Config: frame_system::Config {
    /// Native currency; execution fees and native deposits are held in it
    type Currency: NativeInspect<Self::AccountId, Balance = Balance>
      + NativeMutate<Self::AccountId, Balance = Balance>;
    /// Fungible assets accepted as request inputs
    type Assets: FungiblesInspect<Self::AccountId, AssetId = u32, Balance = Balance>
      + FungiblesMutate<Self::AccountId, AssetId = u32, Balance = Balance>;
    /// Margin engine that applies executed requests
    type PositionEngine: PositionEngine<Self::AccountId>;
    /// Receives non-empty referral codes attached to increase requests
    type ReferralStorage: ReferralStorage<Self::AccountId>;
    /// Wall clock used for the public and stale delays
    type TimeProvider: UnixTime;
    /// Origin allowed to manage keepers, fees and delays
    type AdminOrigin: EnsureOrigin<Self::RuntimeOrigin>;
    /// Pallet ID for the custody account
    #[pallet::constant]
    type PalletId: Get<PalletId>;
    /// Minimum execution fee until the admin sets one
    #[pallet::constant]
    type DefaultMinExecutionFee: Get<Balance>;
    /// Deposit fee on executed collateral top-ups until the admin sets one
    #[pallet::constant]
    type DefaultDepositFee: Get<Permill>;
    /// Maximum keys accepted by a batch call
    #[pallet::constant]
    type MaxBatchSize: Get<u32>;
    /// Maximum queue slots visited by a single sweep
    #[pallet::constant]
    type MaxQueueSweep: Get<u32>;
    type WeightInfo: WeightInfo;
    #[cfg(feature = "runtime-benchmarks")]
    type BenchmarkHelper: BenchmarkHelper<Self::AccountId>;
  }

  /// The pallet module, the place to define dispatchable calls, storage items, events, errors, etc.
  ///
  /// ## Request lifecycle
  /// 1. **Create**: the trader pays the execution fee (and the input leg for increases) into the
  ///    pallet account. The request gets key `blake2_256((account, index))` and a queue slot.
  /// 2. **Resolve**: a keeper, the owner or (once stale) anyone executes or cancels it. The record
  ///    is deleted before any funds move, so a request settles at most once.
  /// 3. **Fallback**: an engine failure rolls back the engine's writes and turns the execution
  ///    into a cancellation. The trader is refunded and the caller still earns the fee.
  ///
  /// ## Queue
  /// Each kind keeps an append-only arena of keys and a `start` cursor. The cursor moves past
  /// resolved slots after every resolution, in `execute_queued_requests`, and in `on_idle`.
  #[pallet::pallet]
  pub struct Pallet<T>(PhantomData<T>);

  #[pallet::storage]
  pub type IncreaseRequests<T: Config> =
    StorageMap<_, Blake2_128Concat, RequestKey, IncreaseRequestOf<T>, OptionQuery>;

  #[pallet::storage]
  pub type DecreaseRequests<T: Config> =
    StorageMap<_, Blake2_128Concat, RequestKey, DecreaseRequestOf<T>, OptionQuery>;

  /// Last index handed out per account and kind; the first request gets index 1
  #[pallet::storage]
  pub type RequestIndices<T: Config> = StorageDoubleMap<
    _,
    Blake2_128Concat,
    T::AccountId,
    Blake2_128Concat,
    RequestKind,
    u64,
    ValueQuery,
  >;

  #[pallet::storage]
  pub type RequestQueues<T: Config> =
    StorageMap<_, Blake2_128Concat, RequestKind, RequestQueue, ValueQuery>;

  /// Queue slot -> key; slots below the queue's `start` are removed
  #[pallet::storage]
  pub type RequestQueueKeys<T: Config> =
    StorageDoubleMap<_, Blake2_128Concat, RequestKind, Blake2_128Concat, u64, RequestKey, OptionQuery>;

  /// What each pending request deposited into the pallet account
  #[pallet::storage]
  pub type Escrows<T: Config> = StorageDoubleMap<
    _,
    Blake2_128Concat,
    RequestKind,
    Blake2_128Concat,
    RequestKey,
    EscrowedFunds,
    OptionQuery,
  >;

  #[pallet::storage]
  pub type PositionKeepers<T: Config> =
    StorageMap<_, Blake2_128Concat, T::AccountId, (), OptionQuery>;

  #[pallet::storage]
  pub type MinExecutionFee<T: Config> =
    StorageValue<_, Balance, ValueQuery, T::DefaultMinExecutionFee>;

  #[pallet::storage]
  pub type DepositFee<T: Config> = StorageValue<_, Permill, ValueQuery, T::DefaultDepositFee>;

  #[pallet::storage]
  pub type DelayValuesStore<T: Config> =
    StorageValue<_, DelayValues<BlockNumberFor<T>>, ValueQuery>;

  #[pallet::storage]
  pub type MaxGlobalLongSizes<T: Config> =
    StorageMap<_, Blake2_128Concat, AssetKind, Balance, OptionQuery>;

  #[pallet::storage]
  pub type MaxGlobalShortSizes<T: Config> =
    StorageMap<_, Blake2_128Concat, AssetKind, Balance, OptionQuery>;

  /// While disabled, owners lose their right to resolve requests and only keepers (or anyone,
  /// once a request is stale) may act
  #[pallet::storage]
  pub type IsLeverageEnabled<T: Config> = StorageValue<_, bool, ValueQuery, ConstBool<true>>;

  /// Deposit fees retained in the pallet account, per asset
  #[pallet::storage]
  pub type FeeReserves<T: Config> =
    StorageMap<_, Blake2_128Concat, AssetKind, Balance, ValueQuery>;

  #[pallet::event]
  #[pallet::generate_deposit(pub(super) fn deposit_event)]
  pub enum Event<T: Config> {
    IncreaseRequestCreated {
      account: T::AccountId,
      key: RequestKey,
      index: u64,
      queue_index: u64,
      path: PathOf,
      index_asset: AssetKind,
      amount_in: Balance,
      min_out: Balance,
      size_delta: Balance,
      is_long: bool,
      acceptable_price: Balance,
      execution_fee: Balance,
    },
    DecreaseRequestCreated {
      account: T::AccountId,
      key: RequestKey,
      index: u64,
      queue_index: u64,
      path: PathOf,
      index_asset: AssetKind,
      collateral_delta: Balance,
      size_delta: Balance,
      is_long: bool,
      receiver: T::AccountId,
      acceptable_price: Balance,
      execution_fee: Balance,
      withdraw_native: bool,
    },
    IncreaseRequestExecuted {
      account: T::AccountId,
      key: RequestKey,
      amount_in: Balance,
      size_delta: Balance,
      is_long: bool,
      execution_fee: Balance,
      block_gap: BlockNumberFor<T>,
      time_gap: u64,
    },
    IncreaseRequestCancelled {
      account: T::AccountId,
      key: RequestKey,
      amount_in: Balance,
      execution_fee: Balance,
      block_gap: BlockNumberFor<T>,
      time_gap: u64,
    },
    DecreaseRequestExecuted {
      account: T::AccountId,
      key: RequestKey,
      receiver: T::AccountId,
      amount_out: Balance,
      size_delta: Balance,
      is_long: bool,
      execution_fee: Balance,
      block_gap: BlockNumberFor<T>,
      time_gap: u64,
    },
    DecreaseRequestCancelled {
      account: T::AccountId,
      key: RequestKey,
      execution_fee: Balance,
      block_gap: BlockNumberFor<T>,
      time_gap: u64,
    },
    /// The engine rejected a due request; it is cancelled in the same call
    RequestExecutionFailed {
      kind: RequestKind,
      key: RequestKey,
      error: DispatchError,
    },
    /// A batch entry the caller may not resolve yet was left pending
    BatchItemSkipped { kind: RequestKind, key: RequestKey },
    QueueAdvanced { kind: RequestKind, start: u64 },
    DepositFeeCollected {
      key: RequestKey,
      asset: AssetKind,
      amount: Balance,
    },
    PositionKeeperSet { account: T::AccountId, active: bool },
    LeverageEnabledSet { enabled: bool },
    MinExecutionFeeUpdated { fee: Balance },
    DepositFeeUpdated { fee: Permill },
    DelayValuesUpdated {
      min_block_delay_keeper: BlockNumberFor<T>,
      min_time_delay_public: u64,
      max_time_delay: u64,
    },
    MaxGlobalSizeSet {
      asset: AssetKind,
      long: Balance,
      short: Balance,
    },
    FeesWithdrawn {
      asset: AssetKind,
      receiver: T::AccountId,
      amount: Balance,
    },
  }

  #[pallet::error]
  pub enum Error<T> {
    /// Execution fee below the configured minimum
    InvalidExecutionFee,
    /// Attached native payment does not match what the request needs
    InvalidPayment,
    /// Path must hold one or two assets
    InvalidPathLength,
    /// Native-input requests must start their path with the native asset
    InvalidPath,
    /// Native withdrawal requires a path ending in the native asset
    InvalidCollateralAsset,
    ZeroAmount,
    /// Caller may not resolve this request
    Forbidden,
    /// Public delay has not elapsed yet
    DelayNotElapsed,
    RequestIndexOverflow,
    /// More entries than `MaxBatchSize`
    TooManyEntries,
    NoFeesToWithdraw,
    /// Execution fees cannot be paid to the custody account
    InvalidFeeReceiver,
  }

  #[pallet::hooks]
  impl<T: Config> Hooks<BlockNumberFor<T>> for Pallet<T> {
    /// Reclaim resolved queue slots left behind a sweep limit
    fn on_idle(_now: BlockNumberFor<T>, remaining_weight: Weight) -> Weight {
      let per_slot = T::DbWeight::get().reads_writes(2, 1);
      let max_steps = u64::from(T::MaxQueueSweep::get());
      let mut used = Weight::zero();
      for kind in [RequestKind::Increase, RequestKind::Decrease] {
        let budget = remaining_weight.saturating_sub(used);
        let steps = if per_slot.is_zero() {
          max_steps
        } else {
          budget
            .checked_div_per_component(&per_slot)
            .unwrap_or(0)
            .min(max_steps)
        };
        let steps = steps as u32;
        if steps == 0 {
          break;
        }
        let before = RequestQueues::<T>::get(kind).start;
        let after = Self::advance_queue(kind, steps);
        let visited = after.saturating_sub(before).saturating_add(1);
        used = used
          .saturating_add(T::DbWeight::get().reads_writes(1, 1))
          .saturating_add(per_slot.saturating_mul(visited));
      }
      used
    }

    fn integrity_test() {
      assert!(T::MaxBatchSize::get() > 0, "MaxBatchSize must be positive");
      assert!(T::MaxQueueSweep::get() > 0, "MaxQueueSweep must be positive");
    }
  }

  #[pallet::call]
  impl<T: Config> Pallet<T> {
    /// Request to grow a position with a fungible deposit.
    ///
    /// `payment` is the native value attached to the call and must equal `execution_fee`.
    /// `amount_in` of `path[0]` is taken separately; native inputs go through
    /// `create_increase_request_native`.
    #[pallet::call_index(0)]
    #[pallet::weight(T::WeightInfo::create_increase_request())]
    pub fn create_increase_request(
      origin: OriginFor<T>,
      path: Vec<AssetKind>,
      index_asset: AssetKind,
      amount_in: Balance,
      min_out: Balance,
      size_delta: Balance,
      is_long: bool,
      acceptable_price: Balance,
      execution_fee: Balance,
      referral_code: ReferralCode,
      payment: Balance,
    ) -> DispatchResult {
      let who = ensure_signed(origin)?;
      Self::ensure_execution_fee(execution_fee)?;
      ensure!(payment == execution_fee, Error::<T>::InvalidPayment);
      let path = Self::bounded_path(path)?;
      ensure!(path.first() != Some(&AssetKind::Native), Error::<T>::InvalidPath);
      ensure!(amount_in > 0, Error::<T>::ZeroAmount);

      let now = Self::now();
      let request = IncreaseRequest {
        account: who,
        path,
        index_asset,
        amount_in,
        min_out,
        size_delta,
        is_long,
        acceptable_price,
        execution_fee,
        block_number: now.block,
        block_time: now.time,
        has_collateral_in_native: false,
      };
      Self::store_increase_request(request, referral_code)
    }

    /// Request to grow a position with a native deposit.
    ///
    /// `payment` must equal `execution_fee + amount_in` and `path[0]` must be the native asset.
    #[pallet::call_index(1)]
    #[pallet::weight(T::WeightInfo::create_increase_request_native())]
    pub fn create_increase_request_native(
      origin: OriginFor<T>,
      path: Vec<AssetKind>,
      index_asset: AssetKind,
      amount_in: Balance,
      min_out: Balance,
      size_delta: Balance,
      is_long: bool,
      acceptable_price: Balance,
      execution_fee: Balance,
      referral_code: ReferralCode,
      payment: Balance,
    ) -> DispatchResult {
      let who = ensure_signed(origin)?;
      Self::ensure_execution_fee(execution_fee)?;
      ensure!(
        Some(payment) == execution_fee.checked_add(amount_in),
        Error::<T>::InvalidPayment
      );
      let path = Self::bounded_path(path)?;
      ensure!(path.first() == Some(&AssetKind::Native), Error::<T>::InvalidPath);
      ensure!(amount_in > 0, Error::<T>::ZeroAmount);

      let now = Self::now();
      let request = IncreaseRequest {
        account: who,
        path,
        index_asset,
        amount_in,
        min_out,
        size_delta,
        is_long,
        acceptable_price,
        execution_fee,
        block_number: now.block,
        block_time: now.time,
        has_collateral_in_native: true,
      };
      Self::store_increase_request(request, referral_code)
    }

    /// Request to shrink or close a position. Only the execution fee is escrowed.
    #[pallet::call_index(2)]
    #[pallet::weight(T::WeightInfo::create_decrease_request())]
    pub fn create_decrease_request(
      origin: OriginFor<T>,
      path: Vec<AssetKind>,
      index_asset: AssetKind,
      collateral_delta: Balance,
      size_delta: Balance,
      is_long: bool,
      receiver: T::AccountId,
      acceptable_price: Balance,
      execution_fee: Balance,
      withdraw_native: bool,
      payment: Balance,
    ) -> DispatchResult {
      let who = ensure_signed(origin)?;
      Self::ensure_execution_fee(execution_fee)?;
      ensure!(payment == execution_fee, Error::<T>::InvalidPayment);
      let path = Self::bounded_path(path)?;
      if withdraw_native {
        ensure!(
          path.last() == Some(&AssetKind::Native),
          Error::<T>::InvalidCollateralAsset
        );
      }

      let now = Self::now();
      let request = DecreaseRequest {
        account: who,
        path,
        index_asset,
        collateral_delta,
        size_delta,
        is_long,
        receiver,
        acceptable_price,
        execution_fee,
        block_number: now.block,
        block_time: now.time,
        withdraw_native,
      };
      Self::store_decrease_request(request)
    }

    #[pallet::call_index(3)]
    #[pallet::weight(T::WeightInfo::execute_increase_request())]
    pub fn execute_increase_request(
      origin: OriginFor<T>,
      key: RequestKey,
      fee_receiver: T::AccountId,
    ) -> DispatchResult {
      let who = ensure_signed(origin)?;
      Self::ensure_fee_receiver(&fee_receiver)?;
      let resolution = Self::do_execute_increase(key, &who, &fee_receiver)?;
      Self::finish_single(RequestKind::Increase, resolution)
    }

    #[pallet::call_index(4)]
    #[pallet::weight(T::WeightInfo::cancel_increase_request())]
    pub fn cancel_increase_request(
      origin: OriginFor<T>,
      key: RequestKey,
      fee_receiver: T::AccountId,
    ) -> DispatchResult {
      let who = ensure_signed(origin)?;
      Self::ensure_fee_receiver(&fee_receiver)?;
      let resolution = Self::do_cancel_increase(key, &who, &fee_receiver)?;
      Self::finish_single(RequestKind::Increase, resolution)
    }

    #[pallet::call_index(5)]
    #[pallet::weight(T::WeightInfo::execute_decrease_request())]
    pub fn execute_decrease_request(
      origin: OriginFor<T>,
      key: RequestKey,
      fee_receiver: T::AccountId,
    ) -> DispatchResult {
      let who = ensure_signed(origin)?;
      Self::ensure_fee_receiver(&fee_receiver)?;
      let resolution = Self::do_execute_decrease(key, &who, &fee_receiver)?;
      Self::finish_single(RequestKind::Decrease, resolution)
    }

    #[pallet::call_index(6)]
    #[pallet::weight(T::WeightInfo::cancel_decrease_request())]
    pub fn cancel_decrease_request(
      origin: OriginFor<T>,
      key: RequestKey,
      fee_receiver: T::AccountId,
    ) -> DispatchResult {
      let who = ensure_signed(origin)?;
      Self::ensure_fee_receiver(&fee_receiver)?;
      let resolution = Self::do_cancel_decrease(key, &who, &fee_receiver)?;
      Self::finish_single(RequestKind::Decrease, resolution)
    }

    /// Execute `keys` in order. Resolved and not-yet-due keys are no-ops; keys the caller may
    /// not resolve are skipped.
    #[pallet::call_index(7)]
    #[pallet::weight(T::WeightInfo::batch_execute(keys.len() as u32))]
    pub fn batch_execute(
      origin: OriginFor<T>,
      kind: RequestKind,
      keys: Vec<RequestKey>,
      fee_receiver: T::AccountId,
    ) -> DispatchResult {
      let who = ensure_signed(origin)?;
      Self::do_batch(kind, keys, &who, &fee_receiver, true)
    }

    #[pallet::call_index(8)]
    #[pallet::weight(T::WeightInfo::batch_cancel(keys.len() as u32))]
    pub fn batch_cancel(
      origin: OriginFor<T>,
      kind: RequestKind,
      keys: Vec<RequestKey>,
      fee_receiver: T::AccountId,
    ) -> DispatchResult {
      let who = ensure_signed(origin)?;
      Self::do_batch(kind, keys, &who, &fee_receiver, false)
    }

    /// Keeper sweep: execute queued requests from `start` up to `end_index` (exclusive),
    /// stopping at the first one whose block delay has not elapsed.
    #[pallet::call_index(9)]
    #[pallet::weight(T::WeightInfo::execute_queued_requests(T::MaxQueueSweep::get()))]
    pub fn execute_queued_requests(
      origin: OriginFor<T>,
      kind: RequestKind,
      end_index: u64,
      fee_receiver: T::AccountId,
    ) -> DispatchResult {
      let who = ensure_signed(origin)?;
      ensure!(PositionKeepers::<T>::contains_key(&who), Error::<T>::Forbidden);
      Self::ensure_fee_receiver(&fee_receiver)?;

      let queue = RequestQueues::<T>::get(kind);
      let end = end_index
        .min(queue.length)
        .min(queue.start.saturating_add(T::MaxQueueSweep::get().into()));
      let mut cursor = queue.start;
      while cursor < end {
        if let Some(key) = RequestQueueKeys::<T>::get(kind, cursor) {
          let resolution = match kind {
            RequestKind::Increase => Self::do_execute_increase(key, &who, &fee_receiver)?,
            RequestKind::Decrease => Self::do_execute_decrease(key, &who, &fee_receiver)?,
          };
          if matches!(resolution, Resolution::NotYetDue | Resolution::Rejected(_)) {
            break;
          }
        }
        cursor = cursor.saturating_add(1);
      }

      Self::set_queue_start(kind, cursor);
      Ok(())
    }

    #[pallet::call_index(10)]
    #[pallet::weight(T::WeightInfo::set_position_keeper())]
    pub fn set_position_keeper(
      origin: OriginFor<T>,
      account: T::AccountId,
      active: bool,
    ) -> DispatchResult {
      T::AdminOrigin::ensure_origin(origin)?;
      if active {
        PositionKeepers::<T>::insert(&account, ());
      } else {
        PositionKeepers::<T>::remove(&account);
      }
      Self::deposit_event(Event::PositionKeeperSet { account, active });
      Ok(())
    }

    /// Toggle whether owners may resolve their own requests.
    #[pallet::call_index(16)]
    #[pallet::weight(T::WeightInfo::set_leverage_enabled())]
    pub fn set_leverage_enabled(origin: OriginFor<T>, enabled: bool) -> DispatchResult {
      T::AdminOrigin::ensure_origin(origin)?;
      IsLeverageEnabled::<T>::put(enabled);
      Self::deposit_event(Event::LeverageEnabledSet { enabled });
      Ok(())
    }

    #[pallet::call_index(11)]
    #[pallet::weight(T::WeightInfo::set_min_execution_fee())]
    pub fn set_min_execution_fee(origin: OriginFor<T>, fee: Balance) -> DispatchResult {
      T::AdminOrigin::ensure_origin(origin)?;
      MinExecutionFee::<T>::put(fee);
      Self::deposit_event(Event::MinExecutionFeeUpdated { fee });
      Ok(())
    }

    #[pallet::call_index(12)]
    #[pallet::weight(T::WeightInfo::set_deposit_fee())]
    pub fn set_deposit_fee(origin: OriginFor<T>, fee: Permill) -> DispatchResult {
      T::AdminOrigin::ensure_origin(origin)?;
      DepositFee::<T>::put(fee);
      Self::deposit_event(Event::DepositFeeUpdated { fee });
      Ok(())
    }

    #[pallet::call_index(13)]
    #[pallet::weight(T::WeightInfo::set_delay_values())]
    pub fn set_delay_values(
      origin: OriginFor<T>,
      min_block_delay_keeper: BlockNumberFor<T>,
      min_time_delay_public: u64,
      max_time_delay: u64,
    ) -> DispatchResult {
      T::AdminOrigin::ensure_origin(origin)?;
      DelayValuesStore::<T>::put(DelayValues {
        min_block_delay_keeper,
        min_time_delay_public,
        max_time_delay,
      });
      Self::deposit_event(Event::DelayValuesUpdated {
        min_block_delay_keeper,
        min_time_delay_public,
        max_time_delay,
      });
      Ok(())
    }

    /// Set `(asset, max_long, max_short)` caps; a zero cap removes the limit.
    #[pallet::call_index(14)]
    #[pallet::weight(T::WeightInfo::set_max_global_sizes(entries.len() as u32))]
    pub fn set_max_global_sizes(
      origin: OriginFor<T>,
      entries: Vec<(AssetKind, Balance, Balance)>,
    ) -> DispatchResult {
      T::AdminOrigin::ensure_origin(origin)?;
      ensure!(
        entries.len() <= T::MaxBatchSize::get() as usize,
        Error::<T>::TooManyEntries
      );
      for (asset, long, short) in entries {
        MaxGlobalLongSizes::<T>::set(asset, Some(long).filter(|cap| *cap > 0));
        MaxGlobalShortSizes::<T>::set(asset, Some(short).filter(|cap| *cap > 0));
        Self::deposit_event(Event::MaxGlobalSizeSet { asset, long, short });
      }
      Ok(())
    }

    /// Pay out the deposit fees retained in `asset`.
    #[pallet::call_index(15)]
    #[pallet::weight(T::WeightInfo::withdraw_fees())]
    pub fn withdraw_fees(
      origin: OriginFor<T>,
      asset: AssetKind,
      receiver: T::AccountId,
    ) -> DispatchResult {
      T::AdminOrigin::ensure_origin(origin)?;
      Self::ensure_fee_receiver(&receiver)?;
      let amount = FeeReserves::<T>::get(asset);
      ensure!(amount > 0, Error::<T>::NoFeesToWithdraw);
      FeeReserves::<T>::remove(asset);
      Self::push_out(asset, &receiver, amount)?;
      Self::deposit_event(Event::FeesWithdrawn {
        asset,
        receiver,
        amount,
      });
      Ok(())
    }
  }

  impl<T: Config> Pallet<T> {
    /// Custody account holding every escrowed deposit and retained fee
    pub fn account_id() -> T::AccountId {
      T::PalletId::get().into_account_truncating()
    }

    pub fn request_key(account: &T::AccountId, index: u64) -> RequestKey {
      frame::hashing::blake2_256(&(account, index).encode())
    }

    /// Last index assigned to `account` for `kind`
    pub fn request_index(account: &T::AccountId, kind: RequestKind) -> u64 {
      RequestIndices::<T>::get(account, kind)
    }

    pub fn increase_request(key: &RequestKey) -> Option<IncreaseRequestOf<T>> {
      IncreaseRequests::<T>::get(key)
    }

    pub fn decrease_request(key: &RequestKey) -> Option<DecreaseRequestOf<T>> {
      DecreaseRequests::<T>::get(key)
    }

    pub fn escrowed_funds(kind: RequestKind, key: &RequestKey) -> Option<EscrowedFunds> {
      Escrows::<T>::get(kind, key)
    }

    /// Native-denominated escrow of a pending request, zero once resolved
    pub fn escrowed_amount(kind: RequestKind, key: &RequestKey) -> Balance {
      Escrows::<T>::get(kind, key).map_or(0, |funds| funds.native_amount())
    }

    pub fn is_position_keeper(account: &T::AccountId) -> bool {
      PositionKeepers::<T>::contains_key(account)
    }

    pub(crate) fn now() -> Stamp<BlockNumberFor<T>> {
      Stamp::new(
        frame_system::Pallet::<T>::block_number(),
        T::TimeProvider::now().as_secs(),
      )
    }

    fn ensure_execution_fee(execution_fee: Balance) -> DispatchResult {
      ensure!(
        execution_fee >= MinExecutionFee::<T>::get(),
        Error::<T>::InvalidExecutionFee
      );
      Ok(())
    }

    fn ensure_fee_receiver(fee_receiver: &T::AccountId) -> DispatchResult {
      ensure!(*fee_receiver != Self::account_id(), Error::<T>::InvalidFeeReceiver);
      Ok(())
    }

    fn bounded_path(path: Vec<AssetKind>) -> Result<PathOf, DispatchError> {
      ensure!(!path.is_empty(), Error::<T>::InvalidPathLength);
      PathOf::try_from(path).map_err(|_| Error::<T>::InvalidPathLength.into())
    }

    fn caller_role(caller: &T::AccountId, owner: &T::AccountId) -> CallerRole {
      if Self::is_position_keeper(caller) {
        CallerRole::Keeper
      } else if caller == owner && IsLeverageEnabled::<T>::get() {
        CallerRole::Owner
      } else {
        CallerRole::Public
      }
    }

    fn forbidden_error(reason: ForbiddenReason) -> Error<T> {
      match reason {
        ForbiddenReason::NotAuthorized => Error::<T>::Forbidden,
        ForbiddenReason::DelayNotElapsed => Error::<T>::DelayNotElapsed,
      }
    }

    /// `None` when the request may be settled now
    fn unless_due(outcome: TimingOutcome) -> Option<Resolution> {
      match outcome {
        TimingOutcome::Due => None,
        TimingOutcome::NotYetDue => Some(Resolution::NotYetDue),
        TimingOutcome::Forbidden(reason) => Some(Resolution::Rejected(reason)),
      }
    }

    fn gaps(
      created: &Stamp<BlockNumberFor<T>>,
      now: &Stamp<BlockNumberFor<T>>,
    ) -> (BlockNumberFor<T>, u64) {
      (
        now.block.saturating_sub(created.block),
        now.time.saturating_sub(created.time),
      )
    }

    fn next_request_key(
      account: &T::AccountId,
      kind: RequestKind,
    ) -> Result<(u64, RequestKey), DispatchError> {
      let index = RequestIndices::<T>::try_mutate(account, kind, |index| {
        *index = index.checked_add(1).ok_or(Error::<T>::RequestIndexOverflow)?;
        Ok::<u64, DispatchError>(*index)
      })?;
      Ok((index, Self::request_key(account, index)))
    }

    fn store_increase_request(
      request: IncreaseRequestOf<T>,
      referral_code: ReferralCode,
    ) -> DispatchResult {
      let input = *request.path.first().ok_or(Error::<T>::InvalidPathLength)?;
      if request.has_collateral_in_native {
        Self::pull_into(
          AssetKind::Native,
          &request.account,
          request.execution_fee.saturating_add(request.amount_in),
        )?;
      } else {
        Self::pull_into(AssetKind::Native, &request.account, request.execution_fee)?;
        Self::pull_into(input, &request.account, request.amount_in)?;
      }

      if referral_code != NULL_REFERRAL_CODE {
        T::ReferralStorage::set_trader_referral_code(&request.account, referral_code)?;
      }

      let (index, key) = Self::next_request_key(&request.account, RequestKind::Increase)?;
      Self::record_escrow(
        RequestKind::Increase,
        &key,
        EscrowedFunds {
          input: Some((input, request.amount_in)),
          execution_fee: request.execution_fee,
        },
      );
      let queue_index = Self::enqueue(RequestKind::Increase, key);
      IncreaseRequests::<T>::insert(key, &request);

      log::debug!(
        target: LOG_TARGET,
        "increase request {} created at slot {} by {:?}",
        index,
        queue_index,
        request.account
      );
      Self::deposit_event(Event::IncreaseRequestCreated {
        account: request.account,
        key,
        index,
        queue_index,
        path: request.path,
        index_asset: request.index_asset,
        amount_in: request.amount_in,
        min_out: request.min_out,
        size_delta: request.size_delta,
        is_long: request.is_long,
        acceptable_price: request.acceptable_price,
        execution_fee: request.execution_fee,
      });
      Ok(())
    }

    fn store_decrease_request(request: DecreaseRequestOf<T>) -> DispatchResult {
      Self::pull_into(AssetKind::Native, &request.account, request.execution_fee)?;

      let (index, key) = Self::next_request_key(&request.account, RequestKind::Decrease)?;
      Self::record_escrow(
        RequestKind::Decrease,
        &key,
        EscrowedFunds {
          input: None,
          execution_fee: request.execution_fee,
        },
      );
      let queue_index = Self::enqueue(RequestKind::Decrease, key);
      DecreaseRequests::<T>::insert(key, &request);

      log::debug!(
        target: LOG_TARGET,
        "decrease request {} created at slot {} by {:?}",
        index,
        queue_index,
        request.account
      );
      Self::deposit_event(Event::DecreaseRequestCreated {
        account: request.account,
        key,
        index,
        queue_index,
        path: request.path,
        index_asset: request.index_asset,
        collateral_delta: request.collateral_delta,
        size_delta: request.size_delta,
        is_long: request.is_long,
        receiver: request.receiver,
        acceptable_price: request.acceptable_price,
        execution_fee: request.execution_fee,
        withdraw_native: request.withdraw_native,
      });
      Ok(())
    }

    fn finish_single(kind: RequestKind, resolution: Resolution) -> DispatchResult {
      if let Resolution::Rejected(reason) = resolution {
        return Err(Self::forbidden_error(reason).into());
      }
      if resolution.is_resolved() {
        Self::advance_queue(kind, T::MaxQueueSweep::get());
      }
      Ok(())
    }

    fn do_batch(
      kind: RequestKind,
      keys: Vec<RequestKey>,
      caller: &T::AccountId,
      fee_receiver: &T::AccountId,
      execute: bool,
    ) -> DispatchResult {
      ensure!(
        keys.len() <= T::MaxBatchSize::get() as usize,
        Error::<T>::TooManyEntries
      );
      Self::ensure_fee_receiver(fee_receiver)?;
      for key in keys {
        let resolution = match (kind, execute) {
          (RequestKind::Increase, true) => Self::do_execute_increase(key, caller, fee_receiver)?,
          (RequestKind::Increase, false) => Self::do_cancel_increase(key, caller, fee_receiver)?,
          (RequestKind::Decrease, true) => Self::do_execute_decrease(key, caller, fee_receiver)?,
          (RequestKind::Decrease, false) => Self::do_cancel_decrease(key, caller, fee_receiver)?,
        };
        if let Resolution::Rejected(reason) = resolution {
          log::warn!(
            target: LOG_TARGET,
            "batch skipped {:?} request {:?}: {:?}",
            kind,
            key,
            reason
          );
          Self::deposit_event(Event::BatchItemSkipped { kind, key });
        }
      }
      Self::advance_queue(kind, T::MaxQueueSweep::get());
      Ok(())
    }

    /// Deposit fee (collateral top-ups only) plus the engine call. Runs inside a storage layer.
    fn apply_increase(key: &RequestKey, request: &IncreaseRequestOf<T>) -> DispatchResult {
      let input = *request.path.first().ok_or(Error::<T>::InvalidPathLength)?;
      let mut amount_in = request.amount_in;
      if request.size_delta == 0 {
        let fee = DepositFee::<T>::get().mul_floor(amount_in);
        if fee > 0 {
          FeeReserves::<T>::mutate(input, |reserve| *reserve = reserve.saturating_add(fee));
          amount_in = amount_in.saturating_sub(fee);
          Self::deposit_event(Event::DepositFeeCollected {
            key: *key,
            asset: input,
            amount: fee,
          });
        }
      }
      T::PositionEngine::increase_position(
        &Self::account_id(),
        &request.account,
        &request.path,
        request.index_asset,
        amount_in,
        request.min_out,
        request.size_delta,
        request.is_long,
        request.acceptable_price,
      )
    }

    pub(crate) fn do_execute_increase(
      key: RequestKey,
      caller: &T::AccountId,
      fee_receiver: &T::AccountId,
    ) -> Result<Resolution, DispatchError> {
      let Some(request) = IncreaseRequests::<T>::get(key) else {
        return Ok(Resolution::AlreadyResolved);
      };
      let created = Stamp::new(request.block_number, request.block_time);
      let now = Self::now();
      let outcome = timing::execution_outcome(
        Self::caller_role(caller, &request.account),
        &created,
        &now,
        &DelayValuesStore::<T>::get(),
      );
      if let Some(resolution) = Self::unless_due(outcome) {
        return Ok(resolution);
      }

      IncreaseRequests::<T>::remove(key);
      let escrow = Self::release_escrow(RequestKind::Increase, &key);
      let (block_gap, time_gap) = Self::gaps(&created, &now);

      match with_storage_layer(|| Self::apply_increase(&key, &request)) {
        Ok(()) => {
          Self::push_out(AssetKind::Native, fee_receiver, escrow.execution_fee)?;
          log::debug!(target: LOG_TARGET, "increase request {:?} executed", key);
          Self::deposit_event(Event::IncreaseRequestExecuted {
            account: request.account,
            key,
            amount_in: request.amount_in,
            size_delta: request.size_delta,
            is_long: request.is_long,
            execution_fee: request.execution_fee,
            block_gap,
            time_gap,
          });
          Ok(Resolution::Executed)
        }
        Err(error) => {
          log::warn!(
            target: LOG_TARGET,
            "increase request {:?} failed in engine, refunding: {:?}",
            key,
            error
          );
          Self::deposit_event(Event::RequestExecutionFailed {
            kind: RequestKind::Increase,
            key,
            error,
          });
          Self::settle_cancellation(&request.account, &escrow, fee_receiver)?;
          Self::deposit_event(Event::IncreaseRequestCancelled {
            account: request.account,
            key,
            amount_in: request.amount_in,
            execution_fee: request.execution_fee,
            block_gap,
            time_gap,
          });
          Ok(Resolution::FellBackToCancel)
        }
      }
    }

    pub(crate) fn do_cancel_increase(
      key: RequestKey,
      caller: &T::AccountId,
      fee_receiver: &T::AccountId,
    ) -> Result<Resolution, DispatchError> {
      let Some(request) = IncreaseRequests::<T>::get(key) else {
        return Ok(Resolution::AlreadyResolved);
      };
      let created = Stamp::new(request.block_number, request.block_time);
      let now = Self::now();
      let outcome = timing::cancellation_outcome(
        Self::caller_role(caller, &request.account),
        &created,
        &now,
        &DelayValuesStore::<T>::get(),
      );
      if let Some(resolution) = Self::unless_due(outcome) {
        return Ok(resolution);
      }

      IncreaseRequests::<T>::remove(key);
      let escrow = Self::release_escrow(RequestKind::Increase, &key);
      Self::settle_cancellation(&request.account, &escrow, fee_receiver)?;

      let (block_gap, time_gap) = Self::gaps(&created, &now);
      log::debug!(target: LOG_TARGET, "increase request {:?} cancelled", key);
      Self::deposit_event(Event::IncreaseRequestCancelled {
        account: request.account,
        key,
        amount_in: request.amount_in,
        execution_fee: request.execution_fee,
        block_gap,
        time_gap,
      });
      Ok(Resolution::Cancelled)
    }

    pub(crate) fn do_execute_decrease(
      key: RequestKey,
      caller: &T::AccountId,
      fee_receiver: &T::AccountId,
    ) -> Result<Resolution, DispatchError> {
      let Some(request) = DecreaseRequests::<T>::get(key) else {
        return Ok(Resolution::AlreadyResolved);
      };
      let created = Stamp::new(request.block_number, request.block_time);
      let now = Self::now();
      let outcome = timing::execution_outcome(
        Self::caller_role(caller, &request.account),
        &created,
        &now,
        &DelayValuesStore::<T>::get(),
      );
      if let Some(resolution) = Self::unless_due(outcome) {
        return Ok(resolution);
      }

      DecreaseRequests::<T>::remove(key);
      let escrow = Self::release_escrow(RequestKind::Decrease, &key);
      let (block_gap, time_gap) = Self::gaps(&created, &now);

      let engine_result = with_storage_layer(|| {
        T::PositionEngine::decrease_position(
          &request.account,
          &request.path,
          request.index_asset,
          request.collateral_delta,
          request.size_delta,
          request.is_long,
          &request.receiver,
          request.acceptable_price,
          request.withdraw_native,
        )
      });
      match engine_result {
        Ok(amount_out) => {
          Self::push_out(AssetKind::Native, fee_receiver, escrow.execution_fee)?;
          log::debug!(
            target: LOG_TARGET,
            "decrease request {:?} executed, {} paid out",
            key,
            amount_out
          );
          Self::deposit_event(Event::DecreaseRequestExecuted {
            account: request.account,
            key,
            receiver: request.receiver,
            amount_out,
            size_delta: request.size_delta,
            is_long: request.is_long,
            execution_fee: request.execution_fee,
            block_gap,
            time_gap,
          });
          Ok(Resolution::Executed)
        }
        Err(error) => {
          log::warn!(
            target: LOG_TARGET,
            "decrease request {:?} failed in engine, cancelling: {:?}",
            key,
            error
          );
          Self::deposit_event(Event::RequestExecutionFailed {
            kind: RequestKind::Decrease,
            key,
            error,
          });
          Self::settle_cancellation(&request.account, &escrow, fee_receiver)?;
          Self::deposit_event(Event::DecreaseRequestCancelled {
            account: request.account,
            key,
            execution_fee: request.execution_fee,
            block_gap,
            time_gap,
          });
          Ok(Resolution::FellBackToCancel)
        }
      }
    }

    pub(crate) fn do_cancel_decrease(
      key: RequestKey,
      caller: &T::AccountId,
      fee_receiver: &T::AccountId,
    ) -> Result<Resolution, DispatchError> {
      let Some(request) = DecreaseRequests::<T>::get(key) else {
        return Ok(Resolution::AlreadyResolved);
      };
      let created = Stamp::new(request.block_number, request.block_time);
      let now = Self::now();
      let outcome = timing::cancellation_outcome(
        Self::caller_role(caller, &request.account),
        &created,
        &now,
        &DelayValuesStore::<T>::get(),
      );
      if let Some(resolution) = Self::unless_due(outcome) {
        return Ok(resolution);
      }

      DecreaseRequests::<T>::remove(key);
      let escrow = Self::release_escrow(RequestKind::Decrease, &key);
      Self::settle_cancellation(&request.account, &escrow, fee_receiver)?;

      let (block_gap, time_gap) = Self::gaps(&created, &now);
      log::debug!(target: LOG_TARGET, "decrease request {:?} cancelled", key);
      Self::deposit_event(Event::DecreaseRequestCancelled {
        account: request.account,
        key,
        execution_fee: request.execution_fee,
        block_gap,
        time_gap,
      });
      Ok(Resolution::Cancelled)
    }
  }

  impl<T: Config> GlobalSizeLimits for Pallet<T> {
    fn max_global_long_size(index_asset: AssetKind) -> Option<Balance> {
      MaxGlobalLongSizes::<T>::get(index_asset)
    }

    fn max_global_short_size(index_asset: AssetKind) -> Option<Balance> {
      MaxGlobalShortSizes::<T>::get(index_asset)
    }
  }

  #[pallet::genesis_config]
  #[derive(DefaultNoBound)]
  pub struct GenesisConfig<T: Config> {
    pub keepers: Vec<T::AccountId>,
    pub min_block_delay_keeper: BlockNumberFor<T>,
    pub min_time_delay_public: u64,
    pub max_time_delay: u64,
  }

  #[pallet::genesis_build]
  impl<T: Config> BuildGenesisConfig for GenesisConfig<T> {
    fn build(&self) {
      for keeper in &self.keepers {
        PositionKeepers::<T>::insert(keeper, ());
      }
      DelayValuesStore::<T>::put(DelayValues {
        min_block_delay_keeper: self.min_block_delay_keeper,
        min_time_delay_public: self.min_time_delay_public,
        max_time_delay: self.max_time_delay,
      });
      // One existential deposit stays in custody for good, so payouts never reap the account
      let custodian = Pallet::<T>::account_id();
      if T::Currency::balance(&custodian) < T::Currency::minimum_balance() {
        T::Currency::mint_into(&custodian, T::Currency::minimum_balance())
          .expect("custody account must be fundable at genesis");
      }
    }
  }
}
