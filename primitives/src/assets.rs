use codec::{Decode, DecodeWithMemTracking, Encode, MaxEncodedLen};
use scale_info::TypeInfo;
use serde::{Deserialize, Serialize};

/// Asset identifier used in request paths, index assets and custody legs.
///
/// - `Native`: the chain's native token (managed by pallet-balances). Execution fees are always
///   paid in this asset.
/// - `Local(u32)`: assets managed by pallet-assets.
/// - `Foreign(u32)`: pallet-assets entries mapped from other consensus systems.
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
  Ord,
  PartialEq,
  PartialOrd,
  TypeInfo,
  Serialize,
  Deserialize,
)]
pub enum AssetKind {
  #[default]
  Native,
  Local(u32),
  Foreign(u32),
}

pub trait AssetInspector {
  fn is_native(&self) -> bool;
  /// pallet-assets id, `None` for the native token
  fn local_id(&self) -> Option<u32>;
}

impl AssetInspector for AssetKind {
  fn is_native(&self) -> bool {
    matches!(self, AssetKind::Native)
  }

  fn local_id(&self) -> Option<u32> {
    match self {
      AssetKind::Local(id) | AssetKind::Foreign(id) => Some(*id),
      AssetKind::Native => None,
    }
  }
}

pub const MASK_TYPE: u32 = 0xF000_0000;
pub const MASK_INDEX: u32 = 0x0FFF_FFFF;

pub const TYPE_STD: u32 = 0x1000_0000;
pub const TYPE_STABLE: u32 = 0x2000_0000;

const fn make_id(type_mask: u32, index: u32) -> u32 {
  type_mask | (index & MASK_INDEX)
}

/// Asset ids with a fixed meaning across runtimes and tests
pub mod well_known {
  use super::*;

  pub const BTC: u32 = make_id(TYPE_STD, 1);
  pub const ETH: u32 = make_id(TYPE_STD, 2);

  pub const USDC: u32 = make_id(TYPE_STABLE, 1);
  pub const DAI: u32 = make_id(TYPE_STABLE, 2);
}
