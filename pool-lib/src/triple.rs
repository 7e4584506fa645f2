
//! Triple pool flow, a 2-of-3 between a server, a client (party A) and an
//! escrow (party B):
//!
//! * The client locks its UTXOs into the pool using [build_funding]. The whole
//!   input value minus the fee goes into the pool.
//! * The client builds the first round with [build_spend], paying the escrow
//!   nothing and itself the rest, and signs it.
//! * Any second member completes a round. The server checks the incoming
//!   signatures with [server_verify_client_a_sig] and
//!   [server_verify_client_b_sig], the client checks the server's with
//!   [client_verify_server_sig].
//! * Later rounds are created with [reload] and the last one with [close].

use bitcoin::{Amount, OutPoint};
use bitcoin::secp256k1::PublicKey;

use crate::{FundingInput, INITIAL_SEQUENCE, Party, PartialSignature, Role};
use crate::config::Config;
use crate::error::PoolError;
use crate::funding::{self, FundingParams, FundingTx};
use crate::script::{self, PoolScript};
use crate::spend::{self, SpendParams, SpendRound};
use crate::tx::ChannelTransaction;
use crate::update;

pub use crate::update::{merge, sign};


/// The multisig of a triple pool, keys ordered server, client, escrow.
pub fn pool_script(server: PublicKey, client: PublicKey, escrow: PublicKey) -> PoolScript {
	PoolScript::triple(server, client, escrow)
}

/// Parameters of the funding transaction of a triple pool.
#[derive(Debug, Clone, PartialEq)]
pub struct TripleFunding {
	pub inputs: Vec<FundingInput>,
	pub fee_rate: f64,
}

impl TripleFunding {
	pub fn new(inputs: Vec<FundingInput>, config: &Config) -> TripleFunding {
		TripleFunding { inputs, fee_rate: config.fee_rate }
	}
}

/// Parameters of the first round of a triple pool.
#[derive(Debug, Clone, PartialEq)]
pub struct TripleSpend {
	pub funding: OutPoint,
	pub pool_amount: Amount,
	/// The initial payment to the escrow.
	pub escrow_amount: Amount,
	pub locktime: u32,
	pub fee_rate: f64,
}

impl TripleSpend {
	pub fn new(funding: &FundingTx, config: &Config) -> TripleSpend {
		TripleSpend {
			funding: funding.outpoint(),
			pool_amount: funding.amount,
			escrow_amount: Amount::ZERO,
			locktime: config.triple_locktime,
			fee_rate: config.fee_rate,
		}
	}
}

/// Build the client's funding transaction.
pub fn build_funding(
	client: &Party,
	server: PublicKey,
	escrow: PublicKey,
	params: &TripleFunding,
) -> Result<FundingTx, PoolError> {
	if client.role() != Role::Client {
		return Err(PoolError::UnknownSigner(client.role()));
	}
	let pool = pool_script(server, client.public_key(), escrow);
	let funding = FundingParams::new(params.inputs.clone(), params.fee_rate);
	funding::build_funding(client, &pool, &funding)
}

/// Build the first round and sign it as the given member.
///
/// The outputs pay the escrow first and the client second.
pub fn build_spend(
	signer: &Party,
	pool: &PoolScript,
	params: &TripleSpend,
) -> Result<SpendRound, PoolError> {
	let escrow = pool.public_key(Role::Escrow).ok_or(PoolError::UnknownSigner(Role::Escrow))?;
	let client = pool.public_key(Role::Client).ok_or(PoolError::UnknownSigner(Role::Client))?;
	let spend = spend::build_spend(pool, &SpendParams {
		funding: params.funding,
		pool_amount: params.pool_amount,
		first_payee: script::p2pkh_locking_script(escrow),
		second_payee: script::p2pkh_locking_script(client),
		first_amount: params.escrow_amount,
		sequence: INITIAL_SEQUENCE,
		locktime: params.locktime,
		fee_rate: params.fee_rate,
	})?;
	spend.sign(pool, signer)
}

/// Prepare the next round paying `escrow_amount` to the escrow.
///
/// The locktime is kept when none is given.
pub fn reload(
	tx: ChannelTransaction,
	pool: &PoolScript,
	pool_amount: Amount,
	sequence: u32,
	locktime: Option<u32>,
	escrow_amount: Amount,
) -> Result<ChannelTransaction, PoolError> {
	update::reload(tx, pool, pool_amount, Some(sequence), locktime, escrow_amount)
}

/// Prepare the closing round paying `escrow_amount` to the escrow.
pub fn close(
	tx: ChannelTransaction,
	pool: &PoolScript,
	pool_amount: Amount,
	escrow_amount: Amount,
) -> Result<ChannelTransaction, PoolError> {
	update::close(tx, pool, pool_amount, escrow_amount)
}

fn verify_role(tx: &ChannelTransaction, pool: &PoolScript, sig: &PartialSignature, role: Role) -> bool {
	sig.signer == role && update::verify_member_signature(tx, pool, sig)
}

/// Check the signature of the client, party A.
pub fn server_verify_client_a_sig(tx: &ChannelTransaction, pool: &PoolScript, sig: &PartialSignature) -> bool {
	verify_role(tx, pool, sig, Role::Client)
}

/// Check the signature of the escrow, party B.
pub fn server_verify_client_b_sig(tx: &ChannelTransaction, pool: &PoolScript, sig: &PartialSignature) -> bool {
	verify_role(tx, pool, sig, Role::Escrow)
}

/// Check the server's signature on a round received by a client.
pub fn client_verify_server_sig(tx: &ChannelTransaction, pool: &PoolScript, sig: &PartialSignature) -> bool {
	verify_role(tx, pool, sig, Role::Server)
}


#[cfg(test)]
mod test {
	use super::*;

	use std::str::FromStr;

	use bitcoin::Txid;
	use bitcoin::secp256k1::SecretKey;

	fn party(role: Role, hex: &str) -> Party {
		Party::new(role, SecretKey::from_str(hex).unwrap())
	}

	fn server() -> Party {
		party(Role::Server, "903b1b2c396f17203fa83444d72bf5c666119d9d681eb715520f99ae6f92322c")
	}

	fn client() -> Party {
		party(Role::Client, "a682814ac246ca65543197e593aa3b2633b891959c183416f54e2c63a8de1d8c")
	}

	fn escrow() -> Party {
		party(Role::Escrow, "a2d2ca4c19e3c560792ca751842c29b9da94be09f712a7f9ba7c66e64a354829")
	}

	fn pool() -> PoolScript {
		pool_script(server().public_key(), client().public_key(), escrow().public_key())
	}

	fn config() -> Config {
		Config { fee_rate: 1.2, ..Config::default() }
	}

	fn inputs() -> Vec<FundingInput> {
		vec![FundingInput {
			txid: Txid::from_str("ffcfe296a596f01e5cef2d14f39bc61f55c8f0535a5f723c1b5b043b77053595").unwrap(),
			vout: 1,
			amount: Amount::from_sat(19996),
		}]
	}

	#[test]
	fn first_round() {
		let funding = build_funding(
			&client(), server().public_key(), escrow().public_key(), &TripleFunding::new(inputs(), &config()),
		).unwrap();
		assert_eq!(funding.amount, Amount::from_sat(19995));
		assert_eq!(funding.txid().to_string(),
			"71a6aff5999de8ad0ac1512516b5d33f75b9ea95a13448fb09c3f44050f63b19",
		);

		let round = build_spend(&client(), &pool(), &TripleSpend::new(&funding, &config())).unwrap();
		assert_eq!(round.amount, Amount::from_sat(19994));
		assert_eq!(round.tx.locktime(), 0);
		assert!(server_verify_client_a_sig(&round.tx, &pool(), &round.signature));
		assert!(!server_verify_client_b_sig(&round.tx, &pool(), &round.signature));

		let escrow_sig = sign(&round.tx, &pool(), &escrow()).unwrap();
		assert!(server_verify_client_b_sig(&round.tx, &pool(), &escrow_sig));

		let server_sig = sign(&round.tx, &pool(), &server()).unwrap();
		assert!(client_verify_server_sig(&round.tx, &pool(), &server_sig));
	}

	#[test]
	fn escrow_can_build_first_round() {
		let funding = build_funding(
			&client(), server().public_key(), escrow().public_key(), &TripleFunding::new(inputs(), &config()),
		).unwrap();
		let round = build_spend(&escrow(), &pool(), &TripleSpend::new(&funding, &config())).unwrap();
		assert_eq!(round.signature.signer, Role::Escrow);

		let outsider = PoolScript::dual(server().public_key(), client().public_key());
		assert_eq!(
			build_spend(&client(), &outsider, &TripleSpend::new(&funding, &config())),
			Err(PoolError::UnknownSigner(Role::Escrow)),
		);
	}
}
