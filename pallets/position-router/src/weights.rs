#![cfg_attr(rustfmt, rustfmt_skip)]
#![allow(unused_parens)]
#![allow(unused_imports)]
#![allow(missing_docs)]

use polkadot_sdk::frame_support::{traits::Get, weights::{Weight, constants::RocksDbWeight}};
use core::marker::PhantomData;

pub trait WeightInfo {
	fn create_increase_request() -> Weight;
	fn create_increase_request_native() -> Weight;
	fn create_decrease_request() -> Weight;
	fn execute_increase_request() -> Weight;
	fn cancel_increase_request() -> Weight;
	fn execute_decrease_request() -> Weight;
	fn cancel_decrease_request() -> Weight;
	fn batch_execute(n: u32) -> Weight;
	fn batch_cancel(n: u32) -> Weight;
	fn execute_queued_requests(n: u32) -> Weight;
	fn set_position_keeper() -> Weight;
	fn set_leverage_enabled() -> Weight;
	fn set_min_execution_fee() -> Weight;
	fn set_deposit_fee() -> Weight;
	fn set_delay_values() -> Weight;
	fn set_max_global_sizes(n: u32) -> Weight;
	fn withdraw_fees() -> Weight;
}

pub struct SubstrateWeight<T>(PhantomData<T>);
impl<T: polkadot_sdk::frame_system::Config> WeightInfo for SubstrateWeight<T> {
	fn create_increase_request() -> Weight {
		Weight::from_parts(95_000_000, 8000)
			.saturating_add(T::DbWeight::get().reads(7))
			.saturating_add(T::DbWeight::get().writes(9))
	}
	fn create_increase_request_native() -> Weight {
		Weight::from_parts(80_000_000, 6500)
			.saturating_add(T::DbWeight::get().reads(6))
			.saturating_add(T::DbWeight::get().writes(7))
	}
	fn create_decrease_request() -> Weight {
		Weight::from_parts(75_000_000, 6000)
			.saturating_add(T::DbWeight::get().reads(6))
			.saturating_add(T::DbWeight::get().writes(7))
	}
	fn execute_increase_request() -> Weight {
		Weight::from_parts(160_000_000, 12000)
			.saturating_add(T::DbWeight::get().reads(12))
			.saturating_add(T::DbWeight::get().writes(10))
	}
	fn cancel_increase_request() -> Weight {
		Weight::from_parts(90_000_000, 8000)
			.saturating_add(T::DbWeight::get().reads(9))
			.saturating_add(T::DbWeight::get().writes(8))
	}
	fn execute_decrease_request() -> Weight {
		Weight::from_parts(150_000_000, 11000)
			.saturating_add(T::DbWeight::get().reads(11))
			.saturating_add(T::DbWeight::get().writes(9))
	}
	fn cancel_decrease_request() -> Weight {
		Weight::from_parts(70_000_000, 6000)
			.saturating_add(T::DbWeight::get().reads(7))
			.saturating_add(T::DbWeight::get().writes(6))
	}
	fn batch_execute(n: u32) -> Weight {
		Weight::from_parts(20_000_000, 3000)
			.saturating_add(Weight::from_parts(160_000_000, 12000).saturating_mul(n.into()))
			.saturating_add(T::DbWeight::get().reads(2))
			.saturating_add(T::DbWeight::get().reads((12_u64).saturating_mul(n.into())))
			.saturating_add(T::DbWeight::get().writes((10_u64).saturating_mul(n.into())))
	}
	fn batch_cancel(n: u32) -> Weight {
		Weight::from_parts(20_000_000, 3000)
			.saturating_add(Weight::from_parts(90_000_000, 8000).saturating_mul(n.into()))
			.saturating_add(T::DbWeight::get().reads(2))
			.saturating_add(T::DbWeight::get().reads((9_u64).saturating_mul(n.into())))
			.saturating_add(T::DbWeight::get().writes((8_u64).saturating_mul(n.into())))
	}
	fn execute_queued_requests(n: u32) -> Weight {
		Weight::from_parts(25_000_000, 3500)
			.saturating_add(Weight::from_parts(165_000_000, 12500).saturating_mul(n.into()))
			.saturating_add(T::DbWeight::get().reads(3))
			.saturating_add(T::DbWeight::get().reads((13_u64).saturating_mul(n.into())))
			.saturating_add(T::DbWeight::get().writes(1))
			.saturating_add(T::DbWeight::get().writes((11_u64).saturating_mul(n.into())))
	}
	fn set_position_keeper() -> Weight {
		Weight::from_parts(12_000_000, 1500)
			.saturating_add(T::DbWeight::get().writes(1))
	}
	fn set_leverage_enabled() -> Weight {
		Weight::from_parts(9_000_000, 1000)
			.saturating_add(T::DbWeight::get().writes(1))
	}
	fn set_min_execution_fee() -> Weight {
		Weight::from_parts(10_000_000, 1000)
			.saturating_add(T::DbWeight::get().writes(1))
	}
	fn set_deposit_fee() -> Weight {
		Weight::from_parts(10_000_000, 1000)
			.saturating_add(T::DbWeight::get().writes(1))
	}
	fn set_delay_values() -> Weight {
		Weight::from_parts(10_000_000, 1000)
			.saturating_add(T::DbWeight::get().writes(1))
	}
	fn set_max_global_sizes(n: u32) -> Weight {
		Weight::from_parts(10_000_000, 1000)
			.saturating_add(Weight::from_parts(3_000_000, 0).saturating_mul(n.into()))
			.saturating_add(T::DbWeight::get().writes((2_u64).saturating_mul(n.into())))
	}
	fn withdraw_fees() -> Weight {
		Weight::from_parts(55_000_000, 5000)
			.saturating_add(T::DbWeight::get().reads(3))
			.saturating_add(T::DbWeight::get().writes(3))
	}
}

impl WeightInfo for () {
	fn create_increase_request() -> Weight {
		Weight::from_parts(95_000_000, 8000)
	}
	fn create_increase_request_native() -> Weight {
		Weight::from_parts(80_000_000, 6500)
	}
	fn create_decrease_request() -> Weight {
		Weight::from_parts(75_000_000, 6000)
	}
	fn execute_increase_request() -> Weight {
		Weight::from_parts(160_000_000, 12000)
	}
	fn cancel_increase_request() -> Weight {
		Weight::from_parts(90_000_000, 8000)
	}
	fn execute_decrease_request() -> Weight {
		Weight::from_parts(150_000_000, 11000)
	}
	fn cancel_decrease_request() -> Weight {
		Weight::from_parts(70_000_000, 6000)
	}
	fn batch_execute(n: u32) -> Weight {
		Weight::from_parts(20_000_000, 3000)
			.saturating_add(Weight::from_parts(160_000_000, 12000).saturating_mul(n.into()))
	}
	fn batch_cancel(n: u32) -> Weight {
		Weight::from_parts(20_000_000, 3000)
			.saturating_add(Weight::from_parts(90_000_000, 8000).saturating_mul(n.into()))
	}
	fn execute_queued_requests(n: u32) -> Weight {
		Weight::from_parts(25_000_000, 3500)
			.saturating_add(Weight::from_parts(165_000_000, 12500).saturating_mul(n.into()))
	}
	fn set_position_keeper() -> Weight {
		Weight::from_parts(12_000_000, 1500)
	}
	fn set_leverage_enabled() -> Weight {
		Weight::from_parts(9_000_000, 1000)
	}
	fn set_min_execution_fee() -> Weight {
		Weight::from_parts(10_000_000, 1000)
	}
	fn set_deposit_fee() -> Weight {
		Weight::from_parts(10_000_000, 1000)
	}
	fn set_delay_values() -> Weight {
		Weight::from_parts(10_000_000, 1000)
	}
	fn set_max_global_sizes(n: u32) -> Weight {
		Weight::from_parts(10_000_000, 1000)
			.saturating_add(Weight::from_parts(3_000_000, 0).saturating_mul(n.into()))
	}
	fn withdraw_fees() -> Weight {
		Weight::from_parts(55_000_000, 5000)
	}
}
