
use bitcoin::Amount;

use crate::Role;
use crate::crypto::der::DerError;


/// The reason a set of keys can't form a multisig pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ParticipantSetError {
	#[error("threshold of {threshold} is invalid for {keys} keys")]
	InvalidThreshold {
		threshold: usize,
		keys: usize,
	},
	#[error("a multisig needs between 1 and 20 keys, got {0}")]
	InvalidKeyCount(usize),
	#[error("role {0} appears more than once")]
	DuplicateRole(Role),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
	#[error("invalid participant set: {0}")]
	InvalidParticipantSet(#[from] ParticipantSetError),
	#[error("insufficient funds: need {needed}, have {available}")]
	InsufficientFunds {
		needed: Amount,
		available: Amount,
	},
	#[error("no funding inputs provided")]
	EmptyInputs,
	#[error("no signing context attached to the transaction")]
	MissingSigningContext,
	#[error("malformed signature: {0}")]
	MalformedSignature(#[from] DerError),
	#[error("signature has sighash flag {found:#04x}, expected {expected:#04x}")]
	SignatureScopeMismatch {
		expected: u8,
		found: u8,
	},
	#[error("nonce produced a zero signature component")]
	InvalidNonce,
	#[error("signature of {0} does not match the transaction")]
	InvalidSignature(Role),
	#[error("{0} is not a member of this pool")]
	UnknownSigner(Role),
	#[error("duplicate signature from {0}")]
	DuplicateSignature(Role),
	#[error("need exactly {needed} signatures, got {got}")]
	SignatureCount {
		needed: usize,
		got: usize,
	},
	#[error("invalid channel transaction: {0}")]
	InvalidTransaction(String),
}
