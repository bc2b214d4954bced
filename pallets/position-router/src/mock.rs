use crate as pallet_position_router;

use polkadot_sdk::frame_support::traits::fungible::Mutate as FungibleMutate;
use polkadot_sdk::frame_support::traits::fungibles::Mutate as FungiblesMutate;
use polkadot_sdk::frame_support::traits::tokens::Preservation;
use polkadot_sdk::frame_support::{
  PalletId, construct_runtime, derive_impl,
  traits::{ConstU32, ConstU128, Get, UnixTime},
};
use polkadot_sdk::frame_system;
use polkadot_sdk::sp_runtime::{
  BuildStorage, DispatchError, DispatchResult, Permill,
  testing::H256,
  traits::{BlakeTwo256, IdentityLookup},
};

use crate::types::{AssetKind, Balance, GlobalSizeLimits, ReferralCode};
use primitives::ecosystem::params::{PRECISION, PRICE_PRECISION};
use std::cell::RefCell;
use std::collections::BTreeMap;

pub const ALICE: u64 = 1;
pub const BOB: u64 = 2;
pub const CHARLIE: u64 = 3;
pub const KEEPER: u64 = 10;
pub const FEE_RECEIVER: u64 = 20;
/// Margin engine vault that receives executed deposits
pub const VAULT: u64 = 777;

pub const USDC: u32 = primitives::well_known::USDC;
pub const BTC: u32 = primitives::well_known::BTC;

pub const INITIAL_BALANCE: Balance = 10_000 * PRECISION;
/// Native existential deposit; kept permanently in the custody account
pub const EXISTENTIAL_DEPOSIT: Balance = 1_000_000;
pub const MIN_EXECUTION_FEE: Balance = primitives::ecosystem::params::DEFAULT_MIN_EXECUTION_FEE;

pub const GENESIS_TIME: u64 = 1_700_000_000;
pub const MIN_BLOCK_DELAY_KEEPER: u64 = 1;
pub const MIN_TIME_DELAY_PUBLIC: u64 = 180;
pub const MAX_TIME_DELAY: u64 = 1_800;

/// Index price of BTC in the mock engine
pub const BTC_PRICE: Balance = 50_000 * PRICE_PRECISION;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MockPosition {
  pub size: Balance,
  pub collateral: Balance,
}

// State containers for stateful mocks
thread_local! {
    // Wall clock in unix seconds
    pub static NOW: RefCell<u64> = const { RefCell::new(GENESIS_TIME) };

    // Index prices: asset -> price in PRICE_PRECISION units
    pub static PRICES: RefCell<BTreeMap<AssetKind, Balance>> = const { RefCell::new(BTreeMap::new()) };

    // Positions: (account, index asset, is_long) -> position
    pub static POSITIONS: RefCell<BTreeMap<(u64, AssetKind, bool), MockPosition>> = const { RefCell::new(BTreeMap::new()) };

    // Open interest: (index asset, is_long) -> total size
    pub static OPEN_INTEREST: RefCell<BTreeMap<(AssetKind, bool), Balance>> = const { RefCell::new(BTreeMap::new()) };

    // Forced engine failure for the next calls
    pub static ENGINE_FAILURE: RefCell<Option<&'static str>> = const { RefCell::new(None) };

    // Amounts the engine received per increase call: (account, asset, amount)
    pub static ENGINE_DEPOSITS: RefCell<Vec<(u64, AssetKind, Balance)>> = const { RefCell::new(Vec::new()) };

    // Referral codes recorded by the referral collaborator
    pub static REFERRAL_CODES: RefCell<BTreeMap<u64, ReferralCode>> = const { RefCell::new(BTreeMap::new()) };
}

// Helper methods to setup and inspect state
pub fn advance_time(seconds: u64) {
  NOW.with(|n| *n.borrow_mut() += seconds);
}

pub fn advance_blocks(blocks: u64) {
  System::set_block_number(System::block_number() + blocks);
}

pub fn set_price(asset: AssetKind, price: Balance) {
  PRICES.with(|p| p.borrow_mut().insert(asset, price));
}

pub fn fail_engine(reason: &'static str) {
  ENGINE_FAILURE.with(|f| *f.borrow_mut() = Some(reason));
}

pub fn set_position(account: u64, index_asset: AssetKind, is_long: bool, size: Balance, collateral: Balance) {
  POSITIONS.with(|p| {
    p.borrow_mut()
      .insert((account, index_asset, is_long), MockPosition { size, collateral })
  });
}

pub fn position(account: u64, index_asset: AssetKind, is_long: bool) -> MockPosition {
  POSITIONS.with(|p| {
    p.borrow()
      .get(&(account, index_asset, is_long))
      .copied()
      .unwrap_or_default()
  })
}

pub fn engine_deposits() -> Vec<(u64, AssetKind, Balance)> {
  ENGINE_DEPOSITS.with(|d| d.borrow().clone())
}

pub fn referral_code_of(account: u64) -> Option<ReferralCode> {
  REFERRAL_CODES.with(|r| r.borrow().get(&account).copied())
}

pub fn native_balance(account: u64) -> Balance {
  Balances::free_balance(account)
}

pub fn asset_balance(asset: u32, account: u64) -> Balance {
  Assets::balance(asset, account)
}

pub fn custodian() -> u64 {
  PositionRouter::account_id()
}

type Block = frame_system::mocking::MockBlock<Test>;

construct_runtime!(
  pub struct Test {
    System: frame_system,
    Balances: polkadot_sdk::pallet_balances,
    Assets: polkadot_sdk::pallet_assets,
    PositionRouter: pallet_position_router,
  }
);

#[derive_impl(frame_system::config_preludes::TestDefaultConfig)]
impl frame_system::Config for Test {
  type Block = Block;
  type AccountId = u64;
  type Lookup = IdentityLookup<Self::AccountId>;
  type Hash = H256;
  type Hashing = BlakeTwo256;
  type AccountData = polkadot_sdk::pallet_balances::AccountData<u128>;
}

impl polkadot_sdk::pallet_balances::Config for Test {
  type MaxLocks = ();
  type MaxReserves = ();
  type ReserveIdentifier = [u8; 8];
  type Balance = u128;
  type DustRemoval = ();
  type RuntimeEvent = RuntimeEvent;
  type ExistentialDeposit = ConstU128<EXISTENTIAL_DEPOSIT>;
  type AccountStore = System;
  type WeightInfo = ();
  type FreezeIdentifier = ();
  type MaxFreezes = ();
  type RuntimeHoldReason = ();
  type RuntimeFreezeReason = ();
  type DoneSlashHandler = ();
}

impl polkadot_sdk::pallet_assets::Config for Test {
  type RuntimeEvent = RuntimeEvent;
  type Balance = u128;
  type AssetId = u32;
  type AssetIdParameter = u32;
  type Currency = Balances;
  type CreateOrigin = polkadot_sdk::frame_support::traits::AsEnsureOriginWithArg<
    frame_system::EnsureSigned<Self::AccountId>,
  >;
  type ForceOrigin = frame_system::EnsureRoot<Self::AccountId>;
  type AssetDeposit = ConstU128<1>;
  type AssetAccountDeposit = ConstU128<1>;
  type MetadataDepositBase = ConstU128<1>;
  type MetadataDepositPerByte = ConstU128<1>;
  type ApprovalDeposit = ConstU128<1>;
  type StringLimit = ConstU32<50>;
  type Freezer = ();
  type Extra = ();
  type ReserveData = ();
  type CallbackHandle = ();
  type WeightInfo = ();
  type RemoveItemsLimit = ConstU32<5>;
  type Holder = ();
  #[cfg(feature = "runtime-benchmarks")]
  type BenchmarkHelper = AssetBenchmarkHelper;
}

#[cfg(feature = "runtime-benchmarks")]
pub struct AssetBenchmarkHelper;

#[cfg(feature = "runtime-benchmarks")]
impl polkadot_sdk::pallet_assets::BenchmarkHelper<u32, ()> for AssetBenchmarkHelper {
  fn create_asset_id_parameter(id: u32) -> u32 {
    id
  }
  fn create_reserve_id_parameter(_id: u32) -> () {
    ()
  }
}

pub struct PositionRouterPalletId;
impl Get<PalletId> for PositionRouterPalletId {
  fn get() -> PalletId {
    PalletId(*primitives::ecosystem::pallet_ids::POSITION_ROUTER_PALLET_ID)
  }
}

pub struct DepositFeeStub;
impl Get<Permill> for DepositFeeStub {
  fn get() -> Permill {
    primitives::ecosystem::params::DEFAULT_DEPOSIT_FEE
  }
}

pub struct MockTime;
impl UnixTime for MockTime {
  fn now() -> core::time::Duration {
    core::time::Duration::from_secs(NOW.with(|n| *n.borrow()))
  }
}

// MOCK IMPLEMENTATIONS

pub struct MockReferrals;
impl pallet_position_router::types::ReferralStorage<u64> for MockReferrals {
  fn set_trader_referral_code(account: &u64, code: ReferralCode) -> DispatchResult {
    REFERRAL_CODES.with(|r| r.borrow_mut().insert(*account, code));
    Ok(())
  }
}

fn transfer(asset: AssetKind, from: &u64, to: &u64, amount: Balance) -> DispatchResult {
  match asset {
    AssetKind::Native => {
      <Balances as FungibleMutate<u64>>::transfer(from, to, amount, Preservation::Expendable)?;
    }
    AssetKind::Local(id) | AssetKind::Foreign(id) => {
      <Assets as FungiblesMutate<u64>>::transfer(id, from, to, amount, Preservation::Expendable)?;
    }
  }
  Ok(())
}

/// Margin engine stand-in: takes deposits into `VAULT`, enforces acceptable price and global
/// caps, and pays decreases out of `VAULT`.
pub struct MockEngine;
impl pallet_position_router::types::PositionEngine<u64> for MockEngine {
  fn increase_position(
    custodian: &u64,
    account: &u64,
    path: &[AssetKind],
    index_asset: AssetKind,
    amount_in: Balance,
    _min_out: Balance,
    size_delta: Balance,
    is_long: bool,
    acceptable_price: Balance,
  ) -> DispatchResult {
    let input = *path.first().ok_or(DispatchError::Other("EmptyPath"))?;
    // Pull first so a later rejection must roll this transfer back
    transfer(input, custodian, &VAULT, amount_in)?;

    if let Some(reason) = ENGINE_FAILURE.with(|f| *f.borrow()) {
      return Err(DispatchError::Other(reason));
    }
    let price = PRICES
      .with(|p| p.borrow().get(&index_asset).copied())
      .ok_or(DispatchError::Other("NoPrice"))?;
    let price_ok = if is_long {
      price <= acceptable_price
    } else {
      price >= acceptable_price
    };
    if !price_ok {
      return Err(DispatchError::Other("SlippageExceeded"));
    }

    let open = OPEN_INTEREST.with(|o| o.borrow().get(&(index_asset, is_long)).copied().unwrap_or(0));
    let cap = if is_long {
      PositionRouter::max_global_long_size(index_asset)
    } else {
      PositionRouter::max_global_short_size(index_asset)
    };
    if let Some(cap) = cap {
      if open.saturating_add(size_delta) > cap {
        return Err(DispatchError::Other("MaxGlobalSizeExceeded"));
      }
    }

    OPEN_INTEREST.with(|o| {
      *o.borrow_mut().entry((index_asset, is_long)).or_default() += size_delta;
    });
    POSITIONS.with(|p| {
      let mut positions = p.borrow_mut();
      let position = positions.entry((*account, index_asset, is_long)).or_default();
      position.size += size_delta;
      position.collateral += amount_in;
    });
    ENGINE_DEPOSITS.with(|d| d.borrow_mut().push((*account, input, amount_in)));
    Ok(())
  }

  fn decrease_position(
    account: &u64,
    path: &[AssetKind],
    index_asset: AssetKind,
    collateral_delta: Balance,
    size_delta: Balance,
    is_long: bool,
    receiver: &u64,
    acceptable_price: Balance,
    withdraw_native: bool,
  ) -> Result<Balance, DispatchError> {
    if let Some(reason) = ENGINE_FAILURE.with(|f| *f.borrow()) {
      return Err(DispatchError::Other(reason));
    }
    let price = PRICES
      .with(|p| p.borrow().get(&index_asset).copied())
      .ok_or(DispatchError::Other("NoPrice"))?;
    let price_ok = if is_long {
      price >= acceptable_price
    } else {
      price <= acceptable_price
    };
    if !price_ok {
      return Err(DispatchError::Other("SlippageExceeded"));
    }

    let current = position(*account, index_asset, is_long);
    if current.size < size_delta || current.collateral < collateral_delta {
      return Err(DispatchError::Other("InsufficientPosition"));
    }
    let output = if withdraw_native {
      AssetKind::Native
    } else {
      *path.last().ok_or(DispatchError::Other("EmptyPath"))?
    };
    transfer(output, &VAULT, receiver, collateral_delta)?;

    set_position(
      *account,
      index_asset,
      is_long,
      current.size - size_delta,
      current.collateral - collateral_delta,
    );
    OPEN_INTEREST.with(|o| {
      let mut open = o.borrow_mut();
      let entry = open.entry((index_asset, is_long)).or_default();
      *entry = entry.saturating_sub(size_delta);
    });
    Ok(collateral_delta)
  }
}

impl pallet_position_router::Config for Test {
  type Currency = Balances;
  type Assets = Assets;
  type PositionEngine = MockEngine;
  type ReferralStorage = MockReferrals;
  type TimeProvider = MockTime;
  type AdminOrigin = frame_system::EnsureRoot<u64>;
  type PalletId = PositionRouterPalletId;
  type DefaultMinExecutionFee = ConstU128<MIN_EXECUTION_FEE>;
  type DefaultDepositFee = DepositFeeStub;
  type MaxBatchSize = ConstU32<8>;
  type MaxQueueSweep = ConstU32<16>;
  type WeightInfo = ();
  #[cfg(feature = "runtime-benchmarks")]
  type BenchmarkHelper = PositionRouterBenchmarkHelper;
}

#[cfg(feature = "runtime-benchmarks")]
pub struct PositionRouterBenchmarkHelper;

#[cfg(feature = "runtime-benchmarks")]
impl crate::types::BenchmarkHelper<u64> for PositionRouterBenchmarkHelper {
  fn create_asset(asset: AssetKind) -> DispatchResult {
    if let AssetKind::Local(id) | AssetKind::Foreign(id) = asset {
      let _ = Assets::force_create(RuntimeOrigin::root(), id, ALICE, true, 1);
    }
    Ok(())
  }

  fn mint_asset(asset: AssetKind, to: &u64, amount: Balance) -> DispatchResult {
    match asset {
      AssetKind::Native => {
        <Balances as FungibleMutate<u64>>::mint_into(to, amount)?;
      }
      AssetKind::Local(id) | AssetKind::Foreign(id) => {
        <Assets as FungiblesMutate<u64>>::mint_into(id, to, amount)?;
      }
    }
    Ok(())
  }

  fn prepare_engine(index_asset: AssetKind, _size_delta: Balance) -> DispatchResult {
    set_price(index_asset, BTC_PRICE);
    Ok(())
  }
}

pub fn new_test_ext() -> polkadot_sdk::sp_io::TestExternalities {
  let mut storage = frame_system::GenesisConfig::<Test>::default()
    .build_storage()
    .unwrap();
  pallet_position_router::GenesisConfig::<Test> {
    keepers: vec![KEEPER],
    min_block_delay_keeper: MIN_BLOCK_DELAY_KEEPER,
    min_time_delay_public: MIN_TIME_DELAY_PUBLIC,
    max_time_delay: MAX_TIME_DELAY,
  }
  .assimilate_storage(&mut storage)
  .unwrap();
  let mut ext: polkadot_sdk::sp_io::TestExternalities = storage.into();

  // Reset thread locals
  NOW.with(|n| *n.borrow_mut() = GENESIS_TIME);
  PRICES.with(|p| p.borrow_mut().clear());
  POSITIONS.with(|p| p.borrow_mut().clear());
  OPEN_INTEREST.with(|o| o.borrow_mut().clear());
  ENGINE_FAILURE.with(|f| *f.borrow_mut() = None);
  ENGINE_DEPOSITS.with(|d| d.borrow_mut().clear());
  REFERRAL_CODES.with(|r| r.borrow_mut().clear());

  ext.execute_with(|| {
    System::set_block_number(1);

    for account in [ALICE, BOB, CHARLIE, KEEPER, FEE_RECEIVER, VAULT] {
      <Balances as FungibleMutate<u64>>::mint_into(&account, INITIAL_BALANCE).unwrap();
    }

    for asset_id in [USDC, BTC] {
      Assets::force_create(RuntimeOrigin::root(), asset_id, ALICE, true, 1).unwrap();
      for account in [ALICE, BOB, CHARLIE, VAULT] {
        <Assets as FungiblesMutate<u64>>::mint_into(asset_id, &account, INITIAL_BALANCE).unwrap();
      }
    }

    set_price(AssetKind::Local(BTC), BTC_PRICE);
  });
  ext
}
