//!
//! Signature verification.
//!
//! The signature hash is recomputed from the raw transaction here, separately
//! from the signing path on [ChannelTransaction].
//!

use bitcoin::{Amount, Script, Transaction};
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::PublicKey;
use bitcoin_ext::TransactionExt;
use log::trace;

use crate::crypto::{self, Signature};
use crate::crypto::der::DerError;
use crate::error::PoolError;
use crate::sighash::{self, SighashFlag, SighashParams};
use crate::tx::ChannelTransaction;


/// Signatures shorter than this can't be a DER signature plus flag byte.
pub const MIN_SIGNATURE_LEN: usize = 10;

/// Split the signature bytes into the parsed signature and check its flag.
fn parse_signature(sig: &[u8], flag: SighashFlag) -> Result<Signature, PoolError> {
	if sig.len() < MIN_SIGNATURE_LEN {
		return Err(DerError::TooShort(sig.len()).into());
	}
	let (found, der) = sig.split_last().expect("checked length");
	if *found != flag.to_u8() {
		return Err(PoolError::SignatureScopeMismatch { expected: flag.to_u8(), found: *found });
	}
	Ok(Signature::from_der(der)?)
}

/// Check a signature on one input of a transaction.
///
/// Returns an error when the signature is malformed or doesn't have the
/// expected flag, and `Ok(false)` when it simply doesn't verify.
pub fn check_signature(
	tx: &Transaction,
	input_index: usize,
	redeem_script: &Script,
	source_amount: Amount,
	signer: &PublicKey,
	sig: &[u8],
	flag: SighashFlag,
) -> Result<bool, PoolError> {
	let input = tx.input.get(input_index).ok_or_else(|| PoolError::InvalidTransaction(format!(
		"no input {} in tx with {} inputs", input_index, tx.input.len(),
	)))?;
	let signature = parse_signature(sig, flag)?;

	let others = tx.input.iter().enumerate()
		.filter(|(i, _)| *i != input_index)
		.map(|(_, txin)| txin.clone())
		.collect::<Vec<_>>();
	let params = SighashParams {
		source_txid: input.previous_output.txid,
		source_vout: input.previous_output.vout,
		source_amount,
		version: tx.version,
		other_inputs: &others,
		outputs: &tx.output,
		input_index,
		redeem_script,
		sequence: input.sequence.to_consensus_u32(),
		locktime: tx.raw_lock_time(),
		flag,
	};
	let hash = sighash::signature_hash(&params);
	trace!("Verifying signature against sighash {}", hash);
	Ok(crypto::verify(signer, &hash.to_byte_array(), &signature))
}

/// Whether the signature is valid for the given input.
///
/// Never fails, anything malformed is simply not valid.
pub fn verify(
	tx: &Transaction,
	input_index: usize,
	redeem_script: &Script,
	source_amount: Amount,
	signer: &PublicKey,
	sig: &[u8],
	flag: SighashFlag,
) -> bool {
	match check_signature(tx, input_index, redeem_script, source_amount, signer, sig, flag) {
		Ok(valid) => valid,
		Err(e) => {
			trace!("Rejecting signature: {}", e);
			false
		},
	}
}

/// Verify a signature on a channel round using its attached signing context.
///
/// Without a signing context nothing verifies.
pub fn verify_channel_signature(
	tx: &ChannelTransaction,
	signer: &PublicKey,
	sig: &[u8],
	flag: SighashFlag,
) -> bool {
	match tx.signing_context() {
		Some(ctx) => verify(tx.tx(), 0, &ctx.redeem_script, ctx.amount, signer, sig, flag),
		None => false,
	}
}


#[cfg(test)]
mod test {
	use super::*;

	use std::str::FromStr;

	use bitcoin::ScriptBuf;
	use bitcoin::hex::FromHex;

	const SPEND_HEX: &str = "0100000001201f8665d4d165761ab252e67405b38b0afdeeb8e3c62fd691e159367bee98d900000000950049000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000004900000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000010000000200000000000000001976a914789d07c284ff3f6c41633e2031b375e57434759688ac3c860100000000001976a9147e06a09c32ea06e80745cbfae60036968b64238888ac00350c00";
	const SERVER_SIG: &str = "304402205327dbfb02a36f64c6841c1b3f3559a56bdb5c282b6174cef1340903b1fe675b0220121ae327d8c124deba3eb2ec42dc6dbd7bcfb56e97cb9e45c60bd280217e3afc41";
	const CLIENT_SIG: &str = "30450221008186673e2a874c6c64ef008c4c67ae8235c4aa7fd34428b501842b8ea54dd8ec022016bb42d2a5919245a35514fa0ef26002c04081b52006aa3ff2c1046e9fd1ea0241";

	fn server() -> PublicKey {
		PublicKey::from_str("03f6552f24751f8618fe0b2a813c9c3e163fbeec92ab737af7990297568a63d621").unwrap()
	}

	fn client() -> PublicKey {
		PublicKey::from_str("039e00beaeaab4162fa3d45326e3632303c394faf8f7a17bbcf27a01952a1e7646").unwrap()
	}

	fn redeem() -> ScriptBuf {
		ScriptBuf::from_hex("522103f6552f24751f8618fe0b2a813c9c3e163fbeec92ab737af7990297568a63d62121039e00beaeaab4162fa3d45326e3632303c394faf8f7a17bbcf27a01952a1e764652ae").unwrap()
	}

	fn spend() -> Transaction {
		ChannelTransaction::from_hex(SPEND_HEX).unwrap().into_tx()
	}

	fn check(tx: &Transaction, signer: &PublicKey, sig: &[u8]) -> bool {
		verify(tx, 0, &redeem(), Amount::from_sat(99901), signer, sig, SighashFlag::ALL_FORKID)
	}

	#[test]
	fn valid_signatures() {
		let tx = spend();
		let server_sig = Vec::<u8>::from_hex(SERVER_SIG).unwrap();
		let client_sig = Vec::<u8>::from_hex(CLIENT_SIG).unwrap();
		assert!(check(&tx, &server(), &server_sig));
		assert!(check(&tx, &client(), &client_sig));

		// wrong key
		assert!(!check(&tx, &client(), &server_sig));
		// wrong amount
		assert!(!verify(&tx, 0, &redeem(), Amount::from_sat(99900), &server(), &server_sig,
			SighashFlag::ALL_FORKID,
		));
	}

	#[test]
	fn flag_byte_mismatch() {
		let tx = spend();
		let mut sig = Vec::<u8>::from_hex(SERVER_SIG).unwrap();
		*sig.last_mut().unwrap() = 0x01;
		assert!(!check(&tx, &server(), &sig));
		assert_eq!(
			check_signature(&tx, 0, &redeem(), Amount::from_sat(99901), &server(), &sig, SighashFlag::ALL_FORKID),
			Err(PoolError::SignatureScopeMismatch { expected: 0x41, found: 0x01 }),
		);

		// the same bytes verify under the flag they carry, just not against this sighash
		assert_eq!(
			check_signature(&tx, 0, &redeem(), Amount::from_sat(99901), &server(), &sig, SighashFlag::ALL),
			Ok(false),
		);
	}

	#[test]
	fn mutation_invalidates() {
		let sig = Vec::<u8>::from_hex(SERVER_SIG).unwrap();

		let mut tx = spend();
		tx.lock_time = bitcoin::absolute::LockTime::from_consensus(800_001);
		assert!(!check(&tx, &server(), &sig));

		let mut tx = spend();
		tx.input[0].sequence = bitcoin::Sequence(2);
		assert!(!check(&tx, &server(), &sig));

		let mut tx = spend();
		tx.output[0].value = Amount::from_sat(1);
		assert!(!check(&tx, &server(), &sig));

		// the unlocking script is not covered
		let mut tx = spend();
		tx.input[0].script_sig = ScriptBuf::new();
		assert!(check(&tx, &server(), &sig));
	}

	#[test]
	fn malformed_signatures() {
		let tx = spend();
		assert!(!check(&tx, &server(), &[]));
		assert!(!check(&tx, &server(), &[0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02, 0x41]));
		assert!(!check(&tx, &server(), &[0x41; 72]));

		let short = [0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02, 0x41];
		assert_eq!(
			check_signature(&tx, 0, &redeem(), Amount::ZERO, &server(), &short, SighashFlag::ALL_FORKID),
			Err(PoolError::MalformedSignature(DerError::TooShort(9))),
		);
		let sig = Vec::<u8>::from_hex(SERVER_SIG).unwrap();
		assert!(matches!(
			check_signature(&tx, 1, &redeem(), Amount::ZERO, &server(), &sig, SighashFlag::ALL_FORKID),
			Err(PoolError::InvalidTransaction(_)),
		));
		assert!(!verify(&tx, 1, &redeem(), Amount::from_sat(99901), &server(), &sig, SighashFlag::ALL_FORKID));
	}

	#[test]
	fn channel_signature_needs_context() {
		use crate::tx::SigningContext;

		let sig = Vec::<u8>::from_hex(SERVER_SIG).unwrap();
		let tx = ChannelTransaction::from_hex(SPEND_HEX).unwrap();
		assert!(!verify_channel_signature(&tx, &server(), &sig, SighashFlag::ALL_FORKID));
		let tx = tx.with_signing_context(SigningContext::new(Amount::from_sat(99901), redeem()));
		assert!(verify_channel_signature(&tx, &server(), &sig, SighashFlag::ALL_FORKID));
	}
}
