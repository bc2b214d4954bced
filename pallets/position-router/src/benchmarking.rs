extern crate alloc;

use crate::{types::BenchmarkHelper, *};
use alloc::{vec, vec::Vec};
use polkadot_sdk::frame_benchmarking::{account, v2::*};
use polkadot_sdk::frame_system::RawOrigin;
use polkadot_sdk::sp_runtime::Permill;
use primitives::{NULL_REFERRAL_CODE, well_known};

const FUND: Balance = 1_000_000_000_000_000_000;
const AMOUNT_IN: Balance = 1_000_000_000_000;
const SIZE_DELTA: Balance = 1_000_000_000_000_000_000_000_000_000_000;

fn input_asset() -> AssetKind {
  AssetKind::Local(well_known::USDC)
}

fn index_asset() -> AssetKind {
  AssetKind::Local(well_known::BTC)
}

fn setup_trader<T: Config>(name: &'static str, seed: u32) -> T::AccountId {
  let trader: T::AccountId = account(name, seed, 0);
  T::BenchmarkHelper::create_asset(input_asset()).expect("Failed to create asset");
  T::BenchmarkHelper::mint_asset(AssetKind::Native, &trader, FUND).expect("Failed to mint native");
  T::BenchmarkHelper::mint_asset(input_asset(), &trader, FUND).expect("Failed to mint asset");
  trader
}

fn setup_keeper<T: Config>() -> T::AccountId {
  let keeper: T::AccountId = whitelisted_caller();
  T::BenchmarkHelper::mint_asset(AssetKind::Native, &keeper, FUND).expect("Failed to mint native");
  PositionKeepers::<T>::insert(&keeper, ());
  DelayValuesStore::<T>::kill();
  T::BenchmarkHelper::prepare_engine(index_asset(), SIZE_DELTA).expect("Failed to prepare engine");
  keeper
}

fn create_increase<T: Config>(trader: &T::AccountId) -> RequestKey {
  let fee = MinExecutionFee::<T>::get();
  Pallet::<T>::create_increase_request(
    RawOrigin::Signed(trader.clone()).into(),
    vec![input_asset()],
    index_asset(),
    AMOUNT_IN,
    0,
    SIZE_DELTA,
    true,
    Balance::MAX,
    fee,
    NULL_REFERRAL_CODE,
    fee,
  )
  .expect("Failed to create increase request");
  Pallet::<T>::request_key(trader, Pallet::<T>::request_index(trader, RequestKind::Increase))
}

fn create_decrease<T: Config>(trader: &T::AccountId) -> RequestKey {
  let fee = MinExecutionFee::<T>::get();
  Pallet::<T>::create_decrease_request(
    RawOrigin::Signed(trader.clone()).into(),
    vec![input_asset()],
    index_asset(),
    0,
    0,
    true,
    trader.clone(),
    0,
    fee,
    false,
    fee,
  )
  .expect("Failed to create decrease request");
  Pallet::<T>::request_key(trader, Pallet::<T>::request_index(trader, RequestKind::Decrease))
}

#[benchmarks]
mod benches {
  use super::*;

  #[benchmark]
  fn create_increase_request() {
    let trader = setup_trader::<T>("trader", 0);
    let fee = MinExecutionFee::<T>::get();

    #[extrinsic_call]
    create_increase_request(
      RawOrigin::Signed(trader.clone()),
      vec![input_asset(), index_asset()],
      index_asset(),
      AMOUNT_IN,
      0,
      SIZE_DELTA,
      true,
      Balance::MAX,
      fee,
      [1u8; 32],
      fee,
    );

    assert_eq!(Pallet::<T>::request_index(&trader, RequestKind::Increase), 1);
  }

  #[benchmark]
  fn create_increase_request_native() {
    let trader = setup_trader::<T>("trader", 0);
    let fee = MinExecutionFee::<T>::get();

    #[extrinsic_call]
    create_increase_request_native(
      RawOrigin::Signed(trader.clone()),
      vec![AssetKind::Native, index_asset()],
      index_asset(),
      AMOUNT_IN,
      0,
      SIZE_DELTA,
      true,
      Balance::MAX,
      fee,
      NULL_REFERRAL_CODE,
      fee.saturating_add(AMOUNT_IN),
    );

    assert_eq!(Pallet::<T>::request_index(&trader, RequestKind::Increase), 1);
  }

  #[benchmark]
  fn create_decrease_request() {
    let trader = setup_trader::<T>("trader", 0);
    let fee = MinExecutionFee::<T>::get();

    #[extrinsic_call]
    create_decrease_request(
      RawOrigin::Signed(trader.clone()),
      vec![input_asset(), AssetKind::Native],
      index_asset(),
      AMOUNT_IN,
      SIZE_DELTA,
      true,
      trader.clone(),
      0,
      fee,
      true,
      fee,
    );

    assert_eq!(Pallet::<T>::request_index(&trader, RequestKind::Decrease), 1);
  }

  #[benchmark]
  fn execute_increase_request() {
    let trader = setup_trader::<T>("trader", 0);
    let key = create_increase::<T>(&trader);
    let keeper = setup_keeper::<T>();

    #[extrinsic_call]
    execute_increase_request(RawOrigin::Signed(keeper.clone()), key, keeper.clone());

    assert!(IncreaseRequests::<T>::get(key).is_none());
  }

  #[benchmark]
  fn cancel_increase_request() {
    let trader = setup_trader::<T>("trader", 0);
    let key = create_increase::<T>(&trader);
    let keeper = setup_keeper::<T>();

    #[extrinsic_call]
    cancel_increase_request(RawOrigin::Signed(keeper.clone()), key, keeper.clone());

    assert!(IncreaseRequests::<T>::get(key).is_none());
  }

  #[benchmark]
  fn execute_decrease_request() {
    let trader = setup_trader::<T>("trader", 0);
    let key = create_decrease::<T>(&trader);
    let keeper = setup_keeper::<T>();

    #[extrinsic_call]
    execute_decrease_request(RawOrigin::Signed(keeper.clone()), key, keeper.clone());

    assert!(DecreaseRequests::<T>::get(key).is_none());
  }

  #[benchmark]
  fn cancel_decrease_request() {
    let trader = setup_trader::<T>("trader", 0);
    let key = create_decrease::<T>(&trader);
    let keeper = setup_keeper::<T>();

    #[extrinsic_call]
    cancel_decrease_request(RawOrigin::Signed(keeper.clone()), key, keeper.clone());

    assert!(DecreaseRequests::<T>::get(key).is_none());
  }

  #[benchmark]
  fn batch_execute(n: Linear<1, { T::MaxBatchSize::get() }>) {
    let keys: Vec<RequestKey> = (0..n)
      .map(|i| create_increase::<T>(&setup_trader::<T>("trader", i)))
      .collect();
    let keeper = setup_keeper::<T>();

    #[extrinsic_call]
    batch_execute(
      RawOrigin::Signed(keeper.clone()),
      RequestKind::Increase,
      keys.clone(),
      keeper.clone(),
    );

    assert!(keys.iter().all(|key| IncreaseRequests::<T>::get(key).is_none()));
  }

  #[benchmark]
  fn batch_cancel(n: Linear<1, { T::MaxBatchSize::get() }>) {
    let keys: Vec<RequestKey> = (0..n)
      .map(|i| create_increase::<T>(&setup_trader::<T>("trader", i)))
      .collect();
    let keeper = setup_keeper::<T>();

    #[extrinsic_call]
    batch_cancel(
      RawOrigin::Signed(keeper.clone()),
      RequestKind::Increase,
      keys.clone(),
      keeper.clone(),
    );

    assert!(keys.iter().all(|key| IncreaseRequests::<T>::get(key).is_none()));
  }

  #[benchmark]
  fn execute_queued_requests(n: Linear<1, { T::MaxQueueSweep::get() }>) {
    for i in 0..n {
      create_increase::<T>(&setup_trader::<T>("trader", i));
    }
    let keeper = setup_keeper::<T>();

    #[extrinsic_call]
    execute_queued_requests(
      RawOrigin::Signed(keeper.clone()),
      RequestKind::Increase,
      u64::from(n),
      keeper.clone(),
    );

    assert_eq!(RequestQueues::<T>::get(RequestKind::Increase).start, u64::from(n));
  }

  #[benchmark]
  fn set_position_keeper() {
    let keeper: T::AccountId = account("keeper", 0, 0);

    #[extrinsic_call]
    set_position_keeper(RawOrigin::Root, keeper.clone(), true);

    assert!(Pallet::<T>::is_position_keeper(&keeper));
  }

  #[benchmark]
  fn set_leverage_enabled() {
    #[extrinsic_call]
    set_leverage_enabled(RawOrigin::Root, false);

    assert!(!IsLeverageEnabled::<T>::get());
  }

  #[benchmark]
  fn set_min_execution_fee() {
    #[extrinsic_call]
    set_min_execution_fee(RawOrigin::Root, 4_000);

    assert_eq!(MinExecutionFee::<T>::get(), 4_000);
  }

  #[benchmark]
  fn set_deposit_fee() {
    #[extrinsic_call]
    set_deposit_fee(RawOrigin::Root, Permill::from_percent(1));

    assert_eq!(DepositFee::<T>::get(), Permill::from_percent(1));
  }

  #[benchmark]
  fn set_delay_values() {
    #[extrinsic_call]
    set_delay_values(RawOrigin::Root, 1u32.into(), 180, 1_800);

    assert_eq!(DelayValuesStore::<T>::get().max_time_delay, 1_800);
  }

  #[benchmark]
  fn set_max_global_sizes(n: Linear<1, { T::MaxBatchSize::get() }>) {
    let entries: Vec<(AssetKind, Balance, Balance)> = (0..n)
      .map(|i| (AssetKind::Local(i), SIZE_DELTA, SIZE_DELTA))
      .collect();

    #[extrinsic_call]
    set_max_global_sizes(RawOrigin::Root, entries);

    assert_eq!(MaxGlobalLongSizes::<T>::get(AssetKind::Local(0)), Some(SIZE_DELTA));
  }

  #[benchmark]
  fn withdraw_fees() {
    let receiver: T::AccountId = account("receiver", 0, 0);
    T::BenchmarkHelper::create_asset(input_asset()).expect("Failed to create asset");
    T::BenchmarkHelper::mint_asset(input_asset(), &Pallet::<T>::account_id(), AMOUNT_IN)
      .expect("Failed to fund custodian");
    FeeReserves::<T>::insert(input_asset(), AMOUNT_IN);

    #[extrinsic_call]
    withdraw_fees(RawOrigin::Root, input_asset(), receiver.clone());

    assert_eq!(FeeReserves::<T>::get(input_asset()), 0);
  }

  impl_benchmark_test_suite!(Pallet, crate::mock::new_test_ext(), crate::mock::Test);
}
