//! Ecosystem constants for the position router.
//!
//! Pallet ids, precision scalars and the default economic parameters shared by the pallet,
//! its mocks and any runtime that wires it in.

/// Balance type alias for consistency across the workspace
pub type Balance = u128;

/// Deterministic key of a pending request, `blake2_256((account, index))`
pub type RequestKey = [u8; 32];

/// Referral code forwarded to the referral collaborator on request creation
pub type ReferralCode = [u8; 32];

/// All-zero referral code, meaning "no referral"
pub const NULL_REFERRAL_CODE: ReferralCode = [0u8; 32];

/// Pallet identifiers for deriving pallet-owned accounts.
pub mod pallet_ids {
  /// Position router custody account (holds every escrowed input and execution fee)
  pub const POSITION_ROUTER_PALLET_ID: &[u8; 8] = b"py/posrt";
}

pub mod params {
  use super::Balance;
  use sp_arithmetic::Permill;

  /// Native token precision (10^12).
  pub const PRECISION: Balance = 1_000_000_000_000;

  /// USD precision for sizes and acceptable prices (10^30).
  pub const PRICE_PRECISION: Balance = 1_000_000_000_000_000_000_000_000_000_000;

  /// Longest swap route a request may carry: input asset plus one optional hop.
  pub const MAX_PATH_LENGTH: u32 = 2;

  /// Minimum execution fee until governance sets one.
  pub const DEFAULT_MIN_EXECUTION_FEE: Balance = PRECISION / 1_000;

  /// Deposit fee charged on executed collateral top-ups (0.5%).
  pub const DEFAULT_DEPOSIT_FEE: Permill = Permill::from_parts(5_000);
}
