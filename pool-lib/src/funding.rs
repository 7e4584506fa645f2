//!
//! Funding transactions that lock the external UTXOs of one party into the
//! pool output.
//!
//! The fee depends on the size of the signed transaction, so the inputs are
//! signed twice: once against a provisional pool amount to measure the size
//! and once more after the fee has been taken off the pool output.
//!

use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid};
use bitcoin::absolute::LockTime;
use bitcoin::hashes::Hash;
use bitcoin::transaction::Version;
use bitcoin_ext::{fee, TransactionExt, P2PKH_DUST};
use log::{debug, trace};

use crate::{FundingInput, Party, PartialSignature};
use crate::error::PoolError;
use crate::script::{self, PoolScript};
use crate::sighash::{self, SighashFlag, SighashParams};


/// Index of the pool output in the funding transaction.
pub const POOL_VOUT: u32 = 0;

/// Parameters of a funding transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct FundingParams {
	/// The funder's UTXOs, all locked to the funder's key.
	pub inputs: Vec<FundingInput>,
	/// The value to lock in the pool before the fee.
	///
	/// When absent the whole input value goes to the pool. Otherwise the rest
	/// is paid back to the funder, unless it would be below the dust limit.
	pub pool_amount: Option<Amount>,
	/// Fee rate in satoshis per 1000 bytes.
	pub fee_rate: f64,
	/// Change below this value is added to the pool.
	pub dust_limit: Amount,
}

impl FundingParams {
	pub fn new(inputs: Vec<FundingInput>, fee_rate: f64) -> FundingParams {
		FundingParams {
			inputs,
			pool_amount: None,
			fee_rate,
			dust_limit: P2PKH_DUST,
		}
	}

	/// The summed value of the inputs, `None` if it overflows.
	pub fn total_input(&self) -> Option<Amount> {
		self.inputs.iter().try_fold(Amount::ZERO, |acc, i| acc.checked_add(i.amount))
	}
}

/// A signed funding transaction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FundingTx {
	#[serde(with = "bitcoin_ext::serde::encodable")]
	pub tx: Transaction,
	/// The value of the pool output.
	#[serde(with = "bitcoin::amount::serde::as_sat")]
	pub amount: Amount,
	#[serde(with = "bitcoin::amount::serde::as_sat")]
	pub fee: Amount,
	/// The value paid back to the funder, if any.
	#[serde(default, with = "bitcoin::amount::serde::as_sat::opt")]
	pub change: Option<Amount>,
}

impl FundingTx {
	pub fn txid(&self) -> Txid {
		self.tx.compute_txid()
	}

	/// The pool output.
	pub fn outpoint(&self) -> OutPoint {
		OutPoint::new(self.txid(), POOL_VOUT)
	}

	pub fn hex(&self) -> String {
		self.tx.serialize_hex()
	}

	pub fn size(&self) -> usize {
		self.tx.byte_size()
	}
}

fn unsigned_funding_tx(inputs: &[FundingInput], outputs: Vec<TxOut>) -> Transaction {
	Transaction {
		version: Version::ONE,
		lock_time: LockTime::ZERO,
		input: inputs.iter().map(|i| TxIn {
			previous_output: i.outpoint(),
			script_sig: ScriptBuf::new(),
			sequence: Sequence::MAX,
			witness: Default::default(),
		}).collect(),
		output: outputs,
	}
}

/// Sign every input of the funding transaction with the funder's key.
fn sign_inputs(tx: &mut Transaction, inputs: &[FundingInput], funder: &Party) {
	let flag = SighashFlag::ALL_FORKID;
	let script_code = script::p2pkh_locking_script(&funder.public_key());

	let mut unlocking = Vec::with_capacity(inputs.len());
	for (idx, input) in inputs.iter().enumerate() {
		let others = tx.input.iter().enumerate()
			.filter(|(i, _)| *i != idx)
			.map(|(_, txin)| txin.clone())
			.collect::<Vec<_>>();
		let params = SighashParams {
			source_txid: input.txid,
			source_vout: input.vout,
			source_amount: input.amount,
			version: tx.version,
			other_inputs: &others,
			outputs: &tx.output,
			input_index: idx,
			redeem_script: &script_code,
			sequence: tx.input[idx].sequence.to_consensus_u32(),
			locktime: tx.raw_lock_time(),
			flag,
		};
		let sighash = sighash::signature_hash(&params);
		trace!("Funding input {} sighash: {}", input.outpoint(), sighash);
		let sig = funder.sign_hash(&sighash.to_byte_array());
		let sig = PartialSignature::new(funder.role(), &sig, flag);
		unlocking.push(script::p2pkh_unlocking_script(sig.as_bytes(), &funder.public_key()));
	}

	for (txin, script_sig) in tx.input.iter_mut().zip(unlocking) {
		txin.script_sig = script_sig;
	}
}

/// Build and sign the transaction funding a pool.
///
/// Fails with [PoolError::EmptyInputs] without inputs and with
/// [PoolError::InsufficientFunds] when the inputs can't cover the pool amount
/// and the fee.
pub fn build_funding(
	funder: &Party,
	pool: &PoolScript,
	params: &FundingParams,
) -> Result<FundingTx, PoolError> {
	if params.inputs.is_empty() {
		return Err(PoolError::EmptyInputs);
	}
	if !fee::is_valid_fee_rate(params.fee_rate) {
		return Err(PoolError::InvalidTransaction(format!("invalid fee rate {}", params.fee_rate)));
	}

	let total = params.total_input()
		.ok_or_else(|| PoolError::InvalidTransaction("input value overflows".into()))?;
	let pool_spk = pool.redeem_script().to_owned();
	let change_spk = script::p2pkh_locking_script(&funder.public_key());

	// provisional outputs, only used to measure the signed size
	let mut outputs = vec![TxOut {
		value: params.pool_amount.unwrap_or(total),
		script_pubkey: pool_spk.clone(),
	}];
	if let Some(amount) = params.pool_amount {
		if amount > total {
			return Err(PoolError::InsufficientFunds { needed: amount, available: total });
		}
		if amount < total {
			outputs.push(TxOut { value: total - amount, script_pubkey: change_spk.clone() });
		}
	}

	let mut tx = unsigned_funding_tx(&params.inputs, outputs);
	sign_inputs(&mut tx, &params.inputs, funder);
	let size = tx.byte_size();
	let fee = fee::fee_for_size(size, params.fee_rate);
	debug!("Funding tx of {} inputs sized at {} bytes, fee {}", params.inputs.len(), size, fee);

	match params.pool_amount.unwrap_or(Amount::ZERO).checked_add(fee) {
		Some(needed) if needed <= total => {},
		needed => return Err(PoolError::InsufficientFunds {
			needed: needed.unwrap_or(Amount::MAX),
			available: total,
		}),
	}

	let (amount, change) = match params.pool_amount {
		None => (total - fee, None),
		Some(amount) => {
			let change = total - amount - fee;
			if change < params.dust_limit {
				if change > Amount::ZERO {
					debug!("Change of {} is below dust, adding it to the pool", change);
				}
				(amount + change, None)
			} else {
				(amount, Some(change))
			}
		},
	};

	let mut outputs = vec![TxOut { value: amount, script_pubkey: pool_spk }];
	if let Some(change) = change {
		outputs.push(TxOut { value: change, script_pubkey: change_spk });
	}
	let mut tx = unsigned_funding_tx(&params.inputs, outputs);
	sign_inputs(&mut tx, &params.inputs, funder);
	debug!("Funding tx {} locks {} in the pool", tx.compute_txid(), amount);

	Ok(FundingTx { tx, amount, fee, change })
}
