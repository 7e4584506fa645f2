//!
//! The first round spending a pool output.
//!
//! The multisig signatures don't exist yet when the round is built, so the
//! fee is computed once against a worst-case placeholder unlocking script and
//! never corrected afterwards.
//!

use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut};
use bitcoin::absolute::LockTime;
use bitcoin::transaction::Version;
use bitcoin_ext::{fee, TransactionExt};
use log::debug;

use crate::{update, Party, PartialSignature};
use crate::error::PoolError;
use crate::script::{self, PoolScript};
use crate::tx::{ChannelTransaction, SigningContext};


/// Parameters of the first spend round of a pool.
#[derive(Debug, Clone, PartialEq)]
pub struct SpendParams {
	/// The pool output.
	pub funding: OutPoint,
	/// The value of the pool output.
	pub pool_amount: Amount,
	/// The script paid by the first output.
	pub first_payee: ScriptBuf,
	/// The script paid by the second output, it receives the rest after fee.
	pub second_payee: ScriptBuf,
	/// The initial value of the first output.
	pub first_amount: Amount,
	pub sequence: u32,
	pub locktime: u32,
	/// Fee rate in satoshis per 1000 bytes.
	pub fee_rate: f64,
}

/// An unsigned spend round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendTx {
	/// The round, with the placeholder unlocking script and the signing context.
	pub tx: ChannelTransaction,
	/// The value of the second output.
	pub net: Amount,
	pub fee: Amount,
}

impl SpendTx {
	/// Sign the round as one of the pool members.
	pub fn sign(self, pool: &PoolScript, party: &Party) -> Result<SpendRound, PoolError> {
		let signature = update::sign(&self.tx, pool, party)?;
		Ok(SpendRound { tx: self.tx, signature, amount: self.net, fee: self.fee })
	}
}

/// The first round of a pool together with its builder's signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendRound {
	pub tx: ChannelTransaction,
	pub signature: PartialSignature,
	/// The value of the second output.
	pub amount: Amount,
	pub fee: Amount,
}

/// Build the first round spending the pool output into two payees.
///
/// The returned transaction still carries the placeholder unlocking script
/// used for sizing. Fails with [PoolError::InsufficientFunds] when what's
/// left for the second payee can't pay the fee.
pub fn build_spend(pool: &PoolScript, params: &SpendParams) -> Result<SpendTx, PoolError> {
	if !fee::is_valid_fee_rate(params.fee_rate) {
		return Err(PoolError::InvalidTransaction(format!("invalid fee rate {}", params.fee_rate)));
	}
	if params.first_amount > params.pool_amount {
		return Err(PoolError::InsufficientFunds {
			needed: params.first_amount,
			available: params.pool_amount,
		});
	}
	let rest = params.pool_amount - params.first_amount;

	let mut tx = Transaction {
		version: Version::ONE,
		lock_time: LockTime::from_consensus(params.locktime),
		input: vec![TxIn {
			previous_output: params.funding,
			script_sig: script::fake_unlocking_script(pool.threshold()),
			sequence: Sequence(params.sequence),
			witness: Default::default(),
		}],
		output: vec![
			TxOut { value: params.first_amount, script_pubkey: params.first_payee.clone() },
			TxOut { value: rest, script_pubkey: params.second_payee.clone() },
		],
	};

	let size = tx.byte_size();
	let fee = fee::fee_for_size(size, params.fee_rate);
	if rest < fee {
		return Err(PoolError::InsufficientFunds {
			needed: params.first_amount.checked_add(fee).unwrap_or(Amount::MAX),
			available: params.pool_amount,
		});
	}
	let net = rest - fee;
	tx.output[1].value = net;
	debug!("Spend round of {} sized at {} bytes, fee {}, net {}", params.funding, size, fee, net);

	let context = SigningContext::new(params.pool_amount, pool.redeem_script().to_owned());
	Ok(SpendTx {
		tx: ChannelTransaction::from_parts(tx, context),
		net,
		fee,
	})
}
