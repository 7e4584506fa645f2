//!
//! Later rounds of a pool: reallocating the outputs, signing and merging.
//!
//! Every round is a fresh [ChannelTransaction]. A round is reloaded from the
//! previous one with [reload] or [close], signed by each party with [sign]
//! and turned into a broadcastable transaction with [merge] once enough
//! signatures are collected. [PendingRound] does the collecting while
//! checking each signature as it comes in.
//!

use bitcoin::{Amount, OutPoint, TxOut, Txid};
use bitcoin_ext::{BlockHeight, LOCKTIME_FINAL, SEQUENCE_FINAL};
use log::debug;

use crate::{Party, PartialSignature, Role};
use crate::error::PoolError;
use crate::script::PoolScript;
use crate::sighash::SighashFlag;
use crate::tx::{ChannelTransaction, SigningContext};
use crate::verify;


/// Prepare a new round from an existing one.
///
/// Attaches the pool output as signing context, overwrites sequence and
/// locktime when given, and moves value between the two outputs so that the
/// first gets `first_amount`. Their total stays the same, the fee isn't
/// charged again.
pub fn reload(
	tx: ChannelTransaction,
	pool: &PoolScript,
	source_amount: Amount,
	sequence: Option<u32>,
	locktime: Option<u32>,
	first_amount: Amount,
) -> Result<ChannelTransaction, PoolError> {
	let context = SigningContext::new(source_amount, pool.redeem_script().to_owned());
	let mut tx = tx.with_signing_context(context);
	if let Some(sequence) = sequence {
		tx = tx.with_sequence(sequence);
	}
	if let Some(locktime) = locktime {
		tx = tx.with_locktime(locktime);
	}
	let tx = tx.with_allocation(first_amount)?;
	debug!("Reloaded round on {}: seq {}, locktime {}, first output {}",
		tx.funding_outpoint(), tx.sequence(), tx.locktime(), first_amount,
	);
	Ok(tx)
}

/// Prepare the closing round.
///
/// Sequence and locktime are set to their final values so the transaction
/// can be broadcast right away and not be replaced.
pub fn close(
	tx: ChannelTransaction,
	pool: &PoolScript,
	source_amount: Amount,
	first_amount: Amount,
) -> Result<ChannelTransaction, PoolError> {
	reload(
		tx,
		pool,
		source_amount,
		Some(SEQUENCE_FINAL.to_consensus_u32()),
		Some(LOCKTIME_FINAL),
		first_amount,
	)
}

/// Sign a round as a member of the pool.
pub fn sign(
	tx: &ChannelTransaction,
	pool: &PoolScript,
	party: &Party,
) -> Result<PartialSignature, PoolError> {
	match pool.public_key(party.role()) {
		Some(pk) if *pk == party.public_key() => tx.sign(party),
		_ => Err(PoolError::UnknownSigner(party.role())),
	}
}

/// Merge signatures into the unlocking script of the round.
///
/// Exactly `threshold` signatures of distinct members are needed, in any
/// order. They are not verified here, use [PendingRound] for that.
pub fn merge(
	tx: ChannelTransaction,
	pool: &PoolScript,
	signatures: &[PartialSignature],
) -> Result<ChannelTransaction, PoolError> {
	let script = pool.unlocking_script(signatures)?;
	Ok(tx.with_unlocking_script(script))
}

/// Whether the signature of the given member is valid for the round.
///
/// Uses the signing context attached to the round.
pub fn verify_member_signature(
	tx: &ChannelTransaction,
	pool: &PoolScript,
	signature: &PartialSignature,
) -> bool {
	match pool.public_key(signature.signer) {
		Some(pk) => verify::verify_channel_signature(
			tx, pk, signature.as_bytes(), SighashFlag::ALL_FORKID,
		),
		None => false,
	}
}

/// A round collecting signatures.
#[derive(Debug, Clone)]
pub struct PendingRound {
	tx: ChannelTransaction,
	pool: PoolScript,
	signatures: Vec<PartialSignature>,
}

impl PendingRound {
	/// Start collecting signatures for the round.
	///
	/// The round needs a signing context.
	pub fn new(tx: ChannelTransaction, pool: PoolScript) -> Result<PendingRound, PoolError> {
		if tx.signing_context().is_none() {
			return Err(PoolError::MissingSigningContext);
		}
		Ok(PendingRound { tx, pool, signatures: Vec::new() })
	}

	pub fn tx(&self) -> &ChannelTransaction {
		&self.tx
	}

	pub fn signatures(&self) -> &[PartialSignature] {
		&self.signatures
	}

	/// Add a signature after checking it.
	///
	/// Once the threshold is reached further signatures are refused.
	pub fn add(&mut self, signature: PartialSignature) -> Result<(), PoolError> {
		let signer = signature.signer;
		let pk = self.pool.public_key(signer).ok_or(PoolError::UnknownSigner(signer))?;
		if self.signatures.iter().any(|s| s.signer == signer) {
			return Err(PoolError::DuplicateSignature(signer));
		}
		if self.is_complete() {
			return Err(PoolError::SignatureCount {
				needed: self.pool.threshold(),
				got: self.signatures.len() + 1,
			});
		}

		let ctx = self.tx.signing_context().expect("checked on creation");
		let valid = verify::check_signature(
			self.tx.tx(),
			0,
			&ctx.redeem_script,
			ctx.amount,
			pk,
			signature.as_bytes(),
			SighashFlag::ALL_FORKID,
		)?;
		if !valid {
			return Err(PoolError::InvalidSignature(signer));
		}

		debug!("Got valid signature of {} for round {}", signer, self.tx.txid());
		self.signatures.push(signature);
		Ok(())
	}

	/// Sign the round ourselves and add the signature.
	pub fn sign(&mut self, party: &Party) -> Result<(), PoolError> {
		let sig = sign(&self.tx, &self.pool, party)?;
		self.add(sig)
	}

	pub fn is_complete(&self) -> bool {
		self.signatures.len() >= self.pool.threshold()
	}

	/// The members that haven't signed yet.
	pub fn missing(&self) -> Vec<Role> {
		self.pool.roles()
			.filter(|r| !self.signatures.iter().any(|s| s.signer == *r))
			.collect()
	}

	/// Merge the collected signatures into the final round.
	pub fn finalize(self) -> Result<ChannelTransaction, PoolError> {
		if !self.is_complete() {
			return Err(PoolError::SignatureCount {
				needed: self.pool.threshold(),
				got: self.signatures.len(),
			});
		}
		merge(self.tx, &self.pool, &self.signatures)
	}
}

/// The state of a pool as seen from one of its rounds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeePoolInfo {
	/// The locktime of the round, the block height until which the pool runs.
	pub expiry_height: BlockHeight,
	pub funding_txid: Txid,
	pub funding_vout: u32,
	pub sequence: u32,
	/// The values of the outputs, in output order.
	#[serde(with = "amounts_as_sat")]
	pub allocation: Vec<Amount>,
}

impl FeePoolInfo {
	pub fn funding_outpoint(&self) -> OutPoint {
		OutPoint::new(self.funding_txid, self.funding_vout)
	}

	/// Total value of all outputs.
	pub fn total(&self) -> Amount {
		self.allocation.iter().copied().sum()
	}

	/// Whether this is a closing round.
	pub fn is_final(&self) -> bool {
		self.sequence == SEQUENCE_FINAL.to_consensus_u32()
	}
}

mod amounts_as_sat {
	use bitcoin::Amount;
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(v: &[Amount], s: S) -> Result<S::Ok, S::Error> {
		s.collect_seq(v.iter().map(|a| a.to_sat()))
	}

	pub fn deserialize<'d, D: Deserializer<'d>>(d: D) -> Result<Vec<Amount>, D::Error> {
		Ok(Vec::<u64>::deserialize(d)?.into_iter().map(Amount::from_sat).collect())
	}
}

/// Read the pool state from a round.
pub fn fee_pool_info(tx: &ChannelTransaction) -> FeePoolInfo {
	let funding = tx.funding_outpoint();
	FeePoolInfo {
		expiry_height: tx.locktime(),
		funding_txid: funding.txid,
		funding_vout: funding.vout,
		sequence: tx.sequence(),
		allocation: tx.outputs().iter().map(|o: &TxOut| o.value).collect(),
	}
}


#[cfg(test)]
mod test {
	use super::*;

	use std::str::FromStr;

	use bitcoin::secp256k1::SecretKey;

	const SPEND_HEX: &str = "0100000001201f8665d4d165761ab252e67405b38b0afdeeb8e3c62fd691e159367bee98d900000000950049000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000004900000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000010000000200000000000000001976a914789d07c284ff3f6c41633e2031b375e57434759688ac3c860100000000001976a9147e06a09c32ea06e80745cbfae60036968b64238888ac00350c00";

	fn party(role: Role, hex: &str) -> Party {
		Party::new(role, SecretKey::from_str(hex).unwrap())
	}

	fn server() -> Party {
		party(Role::Server, "a2d2ca4c19e3c560792ca751842c29b9da94be09f712a7f9ba7c66e64a354829")
	}

	fn client() -> Party {
		party(Role::Client, "903b1b2c396f17203fa83444d72bf5c666119d9d681eb715520f99ae6f92322c")
	}

	fn pool() -> PoolScript {
		PoolScript::dual(server().public_key(), client().public_key())
	}

	fn spend() -> ChannelTransaction {
		ChannelTransaction::from_hex(SPEND_HEX).unwrap()
	}

	#[test]
	fn reload_keeps_total() {
		let tx = reload(spend(), &pool(), Amount::from_sat(99901), Some(2), None, Amount::from_sat(1000)).unwrap();
		assert_eq!(tx.sequence(), 2);
		assert_eq!(tx.locktime(), 800_000);
		assert_eq!(tx.outputs()[0].value + tx.outputs()[1].value, Amount::from_sat(99900));
		assert_eq!(tx.outputs()[1].value, Amount::from_sat(98900));
		assert!(tx.unlocking_script().is_empty());

		let back = reload(tx, &pool(), Amount::from_sat(99901), None, None, Amount::ZERO).unwrap();
		assert_eq!(back.outputs()[1].value, Amount::from_sat(99900));
		assert_eq!(back.sequence(), 2);

		assert!(matches!(
			reload(back, &pool(), Amount::from_sat(99901), None, None, Amount::from_sat(99901)),
			Err(PoolError::InsufficientFunds { .. }),
		));
	}

	#[test]
	fn close_is_final() {
		let tx = close(spend(), &pool(), Amount::from_sat(99901), Amount::from_sat(5000)).unwrap();
		assert_eq!(tx.sequence(), u32::MAX);
		assert_eq!(tx.locktime(), u32::MAX);
		assert!(fee_pool_info(&tx).is_final());
	}

	#[test]
	fn sign_checks_membership() {
		let tx = reload(spend(), &pool(), Amount::from_sat(99901), None, None, Amount::ZERO).unwrap();
		assert!(sign(&tx, &pool(), &server()).is_ok());

		let escrow = party(Role::Escrow, "a682814ac246ca65543197e593aa3b2633b891959c183416f54e2c63a8de1d8c");
		assert_eq!(sign(&tx, &pool(), &escrow), Err(PoolError::UnknownSigner(Role::Escrow)));

		// right role, wrong key
		let impostor = party(Role::Server, "a682814ac246ca65543197e593aa3b2633b891959c183416f54e2c63a8de1d8c");
		assert_eq!(sign(&tx, &pool(), &impostor), Err(PoolError::UnknownSigner(Role::Server)));
	}

	#[test]
	fn pending_round_collects() {
		assert_eq!(PendingRound::new(spend(), pool()).unwrap_err(), PoolError::MissingSigningContext);

		let tx = reload(spend(), &pool(), Amount::from_sat(99901), None, None, Amount::ZERO).unwrap();
		let mut round = PendingRound::new(tx.clone(), pool()).unwrap();
		assert_eq!(round.missing(), vec![Role::Server, Role::Client]);
		assert_eq!(round.clone().finalize(), Err(PoolError::SignatureCount { needed: 2, got: 0 }));

		let client_sig = sign(&tx, &pool(), &client()).unwrap();
		round.add(client_sig.clone()).unwrap();
		assert_eq!(round.add(client_sig.clone()), Err(PoolError::DuplicateSignature(Role::Client)));
		assert!(!round.is_complete());
		assert_eq!(round.missing(), vec![Role::Server]);

		// a signature over another round is rejected
		let other = tx.clone().with_sequence(5);
		let stale = sign(&other, &pool(), &server()).unwrap();
		assert_eq!(round.add(stale), Err(PoolError::InvalidSignature(Role::Server)));

		let bogus = PartialSignature::from_bytes(Role::Escrow, vec![0x30; 71]);
		assert_eq!(round.add(bogus), Err(PoolError::UnknownSigner(Role::Escrow)));

		round.sign(&server()).unwrap();
		assert!(round.is_complete());
		assert!(round.missing().is_empty());
		let merged = round.finalize().unwrap();

		let direct = merge(tx.clone(), &pool(), &[
			client_sig,
			sign(&tx, &pool(), &server()).unwrap(),
		]).unwrap();
		assert_eq!(merged, direct);
		assert_eq!(merged.hex(), "0100000001201f8665d4d165761ab252e67405b38b0afdeeb8e3c62fd691e159367bee98d900000000920047304402205327dbfb02a36f64c6841c1b3f3559a56bdb5c282b6174cef1340903b1fe675b0220121ae327d8c124deba3eb2ec42dc6dbd7bcfb56e97cb9e45c60bd280217e3afc414830450221008186673e2a874c6c64ef008c4c67ae8235c4aa7fd34428b501842b8ea54dd8ec022016bb42d2a5919245a35514fa0ef26002c04081b52006aa3ff2c1046e9fd1ea0241010000000200000000000000001976a914789d07c284ff3f6c41633e2031b375e57434759688ac3c860100000000001976a9147e06a09c32ea06e80745cbfae60036968b64238888ac00350c00");
	}

	#[test]
	fn fee_pool_info_of_round() {
		let info = fee_pool_info(&spend());
		assert_eq!(info.expiry_height, 800_000);
		assert_eq!(info.sequence, 1);
		assert_eq!(info.funding_outpoint().to_string(),
			"d998ee7b3659e191d62fc6e3b8eefd0a8bb30574e652b21a7665d1d465861f20:0",
		);
		assert_eq!(info.allocation, vec![Amount::ZERO, Amount::from_sat(99900)]);
		assert_eq!(info.total(), Amount::from_sat(99900));
		assert!(!info.is_final());

		let json = serde_json::to_value(&info).unwrap();
		assert_eq!(json["allocation"], serde_json::json!([0, 99900]));
		assert_eq!(serde_json::from_value::<FeePoolInfo>(json).unwrap(), info);
	}
}
