
//! Dual pool flow, a 2-of-2 between a server and a client:
//!
//! * The client locks its UTXOs into the pool using [build_funding].
//! * The client builds the first round paying the server nothing with
//!   [build_spend] and sends it, together with its signature, to the server.
//! * The server checks the client's signature with [server_verify_client_sig],
//!   signs with [sign] and combines both signatures using [merge].
//! * For every payment both parties [reload] the round with a higher sequence
//!   and a larger server output, sign and merge again.
//! * The last round is created with [close].

use bitcoin::{Amount, OutPoint};
use bitcoin::secp256k1::PublicKey;
use bitcoin_ext::BlockHeight;

use crate::{FundingInput, INITIAL_SEQUENCE, Party, PartialSignature, Role};
use crate::config::Config;
use crate::error::PoolError;
use crate::funding::{self, FundingParams, FundingTx};
use crate::script::{self, PoolScript};
use crate::spend::{self, SpendParams, SpendRound};
use crate::tx::ChannelTransaction;
use crate::update;

pub use crate::update::{merge, sign};


/// The multisig of a dual pool, with the server key first.
pub fn pool_script(server: PublicKey, client: PublicKey) -> PoolScript {
	PoolScript::dual(server, client)
}

/// Parameters of the funding transaction of a dual pool.
#[derive(Debug, Clone, PartialEq)]
pub struct DualFunding {
	pub inputs: Vec<FundingInput>,
	/// The value to lock in the pool, the whole input value when absent.
	pub pool_amount: Option<Amount>,
	pub fee_rate: f64,
	pub dust_limit: Amount,
}

impl DualFunding {
	pub fn new(inputs: Vec<FundingInput>, config: &Config) -> DualFunding {
		DualFunding {
			inputs,
			pool_amount: None,
			fee_rate: config.fee_rate,
			dust_limit: config.dust_limit,
		}
	}
}

/// Parameters of the first round of a dual pool.
#[derive(Debug, Clone, PartialEq)]
pub struct DualSpend {
	pub funding: OutPoint,
	pub pool_amount: Amount,
	/// The initial payment to the server.
	pub server_amount: Amount,
	/// The block height until which the pool runs, used as locktime.
	pub end_height: BlockHeight,
	pub fee_rate: f64,
}

impl DualSpend {
	pub fn new(funding: &FundingTx, end_height: BlockHeight, config: &Config) -> DualSpend {
		DualSpend {
			funding: funding.outpoint(),
			pool_amount: funding.amount,
			server_amount: Amount::ZERO,
			end_height,
			fee_rate: config.fee_rate,
		}
	}
}

fn check_role(party: &Party, role: Role) -> Result<(), PoolError> {
	if party.role() != role {
		return Err(PoolError::UnknownSigner(party.role()));
	}
	Ok(())
}

/// Build the client's funding transaction.
pub fn build_funding(
	client: &Party,
	server: PublicKey,
	params: &DualFunding,
) -> Result<FundingTx, PoolError> {
	check_role(client, Role::Client)?;
	let pool = pool_script(server, client.public_key());
	funding::build_funding(client, &pool, &FundingParams {
		inputs: params.inputs.clone(),
		pool_amount: params.pool_amount,
		fee_rate: params.fee_rate,
		dust_limit: params.dust_limit,
	})
}

/// Build the first round and sign it as the client.
///
/// The outputs pay the server first and the client second.
pub fn build_spend(
	client: &Party,
	server: PublicKey,
	params: &DualSpend,
) -> Result<SpendRound, PoolError> {
	check_role(client, Role::Client)?;
	let pool = pool_script(server, client.public_key());
	let spend = spend::build_spend(&pool, &SpendParams {
		funding: params.funding,
		pool_amount: params.pool_amount,
		first_payee: script::p2pkh_locking_script(&server),
		second_payee: script::p2pkh_locking_script(&client.public_key()),
		first_amount: params.server_amount,
		sequence: INITIAL_SEQUENCE,
		locktime: params.end_height,
		fee_rate: params.fee_rate,
	})?;
	spend.sign(&pool, client)
}

/// Prepare the next round paying `server_amount` to the server.
pub fn reload(
	tx: ChannelTransaction,
	pool: &PoolScript,
	pool_amount: Amount,
	sequence: u32,
	end_height: BlockHeight,
	server_amount: Amount,
) -> Result<ChannelTransaction, PoolError> {
	update::reload(tx, pool, pool_amount, Some(sequence), Some(end_height), server_amount)
}

/// Prepare the closing round paying `server_amount` to the server.
pub fn close(
	tx: ChannelTransaction,
	pool: &PoolScript,
	pool_amount: Amount,
	server_amount: Amount,
) -> Result<ChannelTransaction, PoolError> {
	update::close(tx, pool, pool_amount, server_amount)
}

fn verify_role(tx: &ChannelTransaction, pool: &PoolScript, sig: &PartialSignature, role: Role) -> bool {
	sig.signer == role && update::verify_member_signature(tx, pool, sig)
}

/// Check the client's signature on a round received by the server.
pub fn server_verify_client_sig(tx: &ChannelTransaction, pool: &PoolScript, sig: &PartialSignature) -> bool {
	verify_role(tx, pool, sig, Role::Client)
}

/// Check the server's signature on a round received by the client.
pub fn client_verify_server_sig(tx: &ChannelTransaction, pool: &PoolScript, sig: &PartialSignature) -> bool {
	verify_role(tx, pool, sig, Role::Server)
}
