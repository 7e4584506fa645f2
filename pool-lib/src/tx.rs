//!
//! The channel transaction value type.
//!
//! A [ChannelTransaction] is one round of a pool: a transaction spending the
//! pool output, optionally carrying the [SigningContext] needed to sign it.
//! All mutators consume the value and return a new one. Changing any field
//! that signatures commit to strips the unlocking script, so stale signatures
//! can never be carried into the next round.
//!

use bitcoin::{Amount, OutPoint, Script, ScriptBuf, Sequence, Transaction, TxOut, Txid};
use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode;
use bitcoin::hashes::{sha256d, Hash};
use bitcoin_ext::TransactionExt;
use log::trace;

use crate::{Party, PartialSignature};
use crate::error::PoolError;
use crate::sighash::{self, SighashFlag, SighashParams};


/// The pool output a channel transaction spends.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct SigningContext {
	/// The value of the pool output.
	#[serde(with = "bitcoin::amount::serde::as_sat")]
	pub amount: Amount,
	/// The multisig script locking the pool output.
	pub redeem_script: ScriptBuf,
}

impl SigningContext {
	pub fn new(amount: Amount, redeem_script: ScriptBuf) -> SigningContext {
		SigningContext { amount, redeem_script }
	}
}

/// A transaction spending the pool output into the payees' outputs.
///
/// It always has a single input and at least two outputs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "ChannelTransactionRepr")]
pub struct ChannelTransaction {
	#[serde(with = "bitcoin_ext::serde::encodable")]
	tx: Transaction,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	context: Option<SigningContext>,
}

impl ChannelTransaction {
	/// Wrap a transaction, checking it has the shape of a channel round.
	pub fn from_tx(tx: Transaction) -> Result<ChannelTransaction, PoolError> {
		if tx.input.len() != 1 {
			return Err(PoolError::InvalidTransaction(format!(
				"expected a single input, got {}", tx.input.len(),
			)));
		}
		if tx.output.len() < 2 {
			return Err(PoolError::InvalidTransaction(format!(
				"expected at least two outputs, got {}", tx.output.len(),
			)));
		}
		Ok(ChannelTransaction { tx, context: None })
	}

	/// Parse a transaction from its consensus hex encoding.
	pub fn from_hex(hex: &str) -> Result<ChannelTransaction, PoolError> {
		let tx = encode::deserialize_hex::<Transaction>(hex)
			.map_err(|e| PoolError::InvalidTransaction(e.to_string()))?;
		Self::from_tx(tx)
	}

	pub(crate) fn from_parts(tx: Transaction, context: SigningContext) -> ChannelTransaction {
		debug_assert_eq!(tx.input.len(), 1);
		ChannelTransaction { tx, context: Some(context) }
	}

	pub fn tx(&self) -> &Transaction {
		&self.tx
	}

	pub fn into_tx(self) -> Transaction {
		self.tx
	}

	pub fn hex(&self) -> String {
		self.tx.serialize_hex()
	}

	pub fn txid(&self) -> Txid {
		self.tx.compute_txid()
	}

	/// Serialized size in bytes.
	pub fn size(&self) -> usize {
		self.tx.byte_size()
	}

	pub fn outputs(&self) -> &[TxOut] {
		&self.tx.output
	}

	/// The sequence number of the pool input.
	pub fn sequence(&self) -> u32 {
		self.tx.input[0].sequence.to_consensus_u32()
	}

	pub fn locktime(&self) -> u32 {
		self.tx.raw_lock_time()
	}

	/// The pool output this transaction spends.
	pub fn funding_outpoint(&self) -> OutPoint {
		self.tx.input[0].previous_output
	}

	pub fn signing_context(&self) -> Option<&SigningContext> {
		self.context.as_ref()
	}

	pub fn unlocking_script(&self) -> &Script {
		&self.tx.input[0].script_sig
	}

	/// Attach the pool output needed to sign this transaction.
	///
	/// Doesn't touch the unlocking script, signatures stay valid as long as
	/// the context describes the output actually spent.
	pub fn with_signing_context(mut self, context: SigningContext) -> ChannelTransaction {
		self.context = Some(context);
		self
	}

	fn strip(&mut self) {
		self.tx.input[0].script_sig = ScriptBuf::new();
	}

	pub fn with_sequence(mut self, sequence: u32) -> ChannelTransaction {
		self.tx.input[0].sequence = Sequence(sequence);
		self.strip();
		self
	}

	pub fn with_locktime(mut self, locktime: u32) -> ChannelTransaction {
		self.tx.lock_time = LockTime::from_consensus(locktime);
		self.strip();
		self
	}

	/// Move value between the first two outputs, keeping their total.
	///
	/// The first output gets `first` and the second one what's left.
	pub fn with_allocation(mut self, first: Amount) -> Result<ChannelTransaction, PoolError> {
		let total = self.tx.output[0].value + self.tx.output[1].value;
		if first > total {
			return Err(PoolError::InsufficientFunds { needed: first, available: total });
		}
		self.tx.output[0].value = first;
		self.tx.output[1].value = total - first;
		self.strip();
		Ok(self)
	}

	pub(crate) fn with_unlocking_script(mut self, script: ScriptBuf) -> ChannelTransaction {
		self.tx.input[0].script_sig = script;
		self
	}

	/// The parameters to compute the signature hash of the pool input.
	pub fn sighash_params(&self, flag: SighashFlag) -> Result<SighashParams<'_>, PoolError> {
		let ctx = self.context.as_ref().ok_or(PoolError::MissingSigningContext)?;
		let input = &self.tx.input[0];
		Ok(SighashParams {
			source_txid: input.previous_output.txid,
			source_vout: input.previous_output.vout,
			source_amount: ctx.amount,
			version: self.tx.version,
			other_inputs: &[],
			outputs: &self.tx.output,
			input_index: 0,
			redeem_script: &ctx.redeem_script,
			sequence: input.sequence.to_consensus_u32(),
			locktime: self.tx.raw_lock_time(),
			flag,
		})
	}

	pub fn sighash(&self, flag: SighashFlag) -> Result<sha256d::Hash, PoolError> {
		let hash = sighash::signature_hash(&self.sighash_params(flag)?);
		trace!("Sighash of round {} (seq {}): {}", self.txid(), self.sequence(), hash);
		Ok(hash)
	}

	/// Sign the pool input with the party's key.
	pub fn sign(&self, party: &Party) -> Result<PartialSignature, PoolError> {
		let flag = SighashFlag::ALL_FORKID;
		let hash = self.sighash(flag)?.to_byte_array();
		let sig = party.sign_hash(&hash);
		Ok(PartialSignature::new(party.role(), &sig, flag))
	}
}

#[derive(Deserialize)]
struct ChannelTransactionRepr {
	#[serde(with = "bitcoin_ext::serde::encodable")]
	tx: Transaction,
	#[serde(default)]
	context: Option<SigningContext>,
}

impl TryFrom<ChannelTransactionRepr> for ChannelTransaction {
	type Error = PoolError;
	fn try_from(repr: ChannelTransactionRepr) -> Result<Self, Self::Error> {
		let ret = ChannelTransaction::from_tx(repr.tx)?;
		Ok(match repr.context {
			Some(ctx) => ret.with_signing_context(ctx),
			None => ret,
		})
	}
}
