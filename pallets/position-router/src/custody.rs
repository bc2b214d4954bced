//! Custody ledger: moves funds between traders and the pallet account and tracks what each
//! pending request has deposited.

use crate::{
  Config, Escrows, Pallet,
  types::{AssetKind, Balance, EscrowedFunds, RequestKey, RequestKind},
};
use primitives::AssetInspector;
use frame::deps::frame_support::traits::{
  fungible::Mutate as NativeMutate, fungibles::Mutate as FungiblesMutate, tokens::Preservation,
};
use frame::prelude::*;

impl<T: Config> Pallet<T> {
  /// Move `amount` of `asset` from `from` into the pallet account.
  pub(crate) fn pull_into(asset: AssetKind, from: &T::AccountId, amount: Balance) -> DispatchResult {
    if amount == 0 {
      return Ok(());
    }
    let custodian = Self::account_id();
    match asset.local_id() {
      None => {
        T::Currency::transfer(from, &custodian, amount, Preservation::Preserve)?;
      }
      Some(id) => {
        T::Assets::transfer(id, from, &custodian, amount, Preservation::Preserve)?;
      }
    }
    Ok(())
  }

  /// Pay `amount` of `asset` out of the pallet account. The native existential deposit seeded
  /// at genesis is never paid out.
  pub(crate) fn push_out(asset: AssetKind, to: &T::AccountId, amount: Balance) -> DispatchResult {
    if amount == 0 {
      return Ok(());
    }
    let custodian = Self::account_id();
    match asset.local_id() {
      None => {
        T::Currency::transfer(&custodian, to, amount, Preservation::Preserve)?;
      }
      Some(id) => {
        T::Assets::transfer(id, &custodian, to, amount, Preservation::Expendable)?;
      }
    }
    Ok(())
  }

  pub(crate) fn record_escrow(kind: RequestKind, key: &RequestKey, funds: EscrowedFunds) {
    Escrows::<T>::insert(kind, key, funds);
  }

  /// Drop the escrow entry of a request that is being resolved.
  pub(crate) fn release_escrow(kind: RequestKind, key: &RequestKey) -> EscrowedFunds {
    Escrows::<T>::take(kind, key).unwrap_or_default()
  }

  /// Return the input leg to `account` and pay the execution fee to `fee_receiver`.
  pub(crate) fn settle_cancellation(
    account: &T::AccountId,
    funds: &EscrowedFunds,
    fee_receiver: &T::AccountId,
  ) -> DispatchResult {
    if let Some((asset, amount)) = funds.input {
      Self::push_out(asset, account, amount)?;
    }
    Self::push_out(AssetKind::Native, fee_receiver, funds.execution_fee)
  }
}
