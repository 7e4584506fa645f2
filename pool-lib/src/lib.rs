
pub extern crate bitcoin;

#[macro_use] extern crate serde;
#[macro_use] extern crate lazy_static;

pub mod config;
pub mod crypto;
pub mod dual;
pub mod error;
pub mod funding;
pub mod script;
pub mod sighash;
pub mod spend;
pub mod triple;
pub mod tx;
pub mod update;
pub mod verify;
mod util;

pub use crate::error::{ParticipantSetError, PoolError};
pub use crate::script::PoolScript;
pub use crate::sighash::SighashFlag;
pub use crate::tx::{ChannelTransaction, SigningContext};


use std::fmt;

use bitcoin::{Amount, OutPoint, Txid};
use bitcoin::secp256k1::{PublicKey, SecretKey};

use crate::crypto::Signature;
use crate::crypto::der::DerError;


/// The sequence number of the first spend round of a pool.
pub const INITIAL_SEQUENCE: u32 = 1;

/// The role a participant plays in a fee pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	/// The service provider receiving payments from the pool.
	Server,
	/// The party funding the pool, also called party A.
	Client,
	/// The arbitrator of a triple pool, also called party B.
	Escrow,
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Role::Server => f.write_str("server"),
			Role::Client => f.write_str("client"),
			Role::Escrow => f.write_str("escrow"),
		}
	}
}

/// A participant that holds its own private key.
#[derive(Clone)]
pub struct Party {
	role: Role,
	secret: SecretKey,
	public: PublicKey,
}

impl Party {
	pub fn new(role: Role, secret: SecretKey) -> Party {
		let public = crypto::public_key(&secret);
		Party { role, secret, public }
	}

	pub fn role(&self) -> Role {
		self.role
	}

	pub fn public_key(&self) -> PublicKey {
		self.public
	}

	pub fn secret_key(&self) -> &SecretKey {
		&self.secret
	}

	/// Sign a 32-byte message hash with a deterministic nonce.
	pub fn sign_hash(&self, hash: &[u8; 32]) -> Signature {
		crypto::sign(&self.secret, hash)
	}
}

impl fmt::Debug for Party {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("Party")
			.field("role", &self.role)
			.field("public", &self.public)
			.finish_non_exhaustive()
	}
}

/// An external UTXO used to fund a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct FundingInput {
	pub txid: Txid,
	pub vout: u32,
	#[serde(rename = "satoshis", with = "bitcoin::amount::serde::as_sat")]
	pub amount: Amount,
}

impl FundingInput {
	pub fn outpoint(&self) -> OutPoint {
		OutPoint::new(self.txid, self.vout)
	}
}

/// One party's signature over a channel transaction.
///
/// Holds the DER encoded signature followed by the sighash flag byte, exactly
/// as it will be pushed in the unlocking script.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct PartialSignature {
	pub signer: Role,
	#[serde(with = "crate::util::hex_bytes")]
	bytes: Vec<u8>,
}

impl PartialSignature {
	pub fn new(signer: Role, signature: &Signature, flag: SighashFlag) -> PartialSignature {
		let mut bytes = signature.to_der();
		bytes.push(flag.to_u8());
		PartialSignature { signer, bytes }
	}

	/// Wrap raw signature bytes received from a counterparty.
	///
	/// No validation is done, use [verify](crate::verify) for that.
	pub fn from_bytes(signer: Role, bytes: Vec<u8>) -> PartialSignature {
		PartialSignature { signer, bytes }
	}

	pub fn as_bytes(&self) -> &[u8] {
		&self.bytes
	}

	pub fn into_bytes(self) -> Vec<u8> {
		self.bytes
	}

	/// The trailing sighash flag byte.
	pub fn flag(&self) -> Option<u8> {
		self.bytes.last().copied()
	}

	/// Parse the DER part of the signature.
	pub fn signature(&self) -> Result<Signature, DerError> {
		match self.bytes.split_last() {
			Some((_, der)) => Signature::from_der(der),
			None => Err(DerError::TooShort(0)),
		}
	}
}
