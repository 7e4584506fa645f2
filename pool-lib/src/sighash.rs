//!
//! Signature hashes for spending a pool output.
//!
//! The preimage follows the fork-id signature scheme: it commits to the amount
//! of the spent output and hashes the inputs, sequences and outputs separately
//! depending on the scope flag.
//!

use std::{fmt, ops};

use bitcoin::{Amount, OutPoint, Script, TxIn, TxOut, Txid};
use bitcoin::consensus::Encodable;
use bitcoin::hashes::{sha256d, Hash};
use bitcoin::transaction::Version;


/// The scope flag appended to every signature.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SighashFlag(u8);

impl SighashFlag {
	pub const ALL: SighashFlag = SighashFlag(0x01);
	pub const NONE: SighashFlag = SighashFlag(0x02);
	pub const SINGLE: SighashFlag = SighashFlag(0x03);
	pub const FORKID: SighashFlag = SighashFlag(0x40);
	pub const ANYONECANPAY: SighashFlag = SighashFlag(0x80);

	/// The flag used for all channel signatures.
	pub const ALL_FORKID: SighashFlag = SighashFlag(0x41);

	pub const fn from_u8(v: u8) -> SighashFlag {
		SighashFlag(v)
	}

	pub const fn to_u8(self) -> u8 {
		self.0
	}

	/// The base type with the modifier bits masked off.
	pub fn base_type(self) -> u8 {
		self.0 & 0x1f
	}

	pub fn has_anyone_can_pay(self) -> bool {
		self.0 & Self::ANYONECANPAY.0 != 0
	}

	pub fn has_fork_id(self) -> bool {
		self.0 & Self::FORKID.0 != 0
	}
}

impl Default for SighashFlag {
	fn default() -> Self {
		Self::ALL_FORKID
	}
}

impl ops::BitOr for SighashFlag {
	type Output = SighashFlag;
	fn bitor(self, rhs: SighashFlag) -> SighashFlag {
		SighashFlag(self.0 | rhs.0)
	}
}

impl fmt::Debug for SighashFlag {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "SighashFlag({:#04x})", self.0)
	}
}

impl fmt::Display for SighashFlag {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{:#04x}", self.0)
	}
}

/// Everything that goes into the signature hash of one input.
#[derive(Debug, Clone)]
pub struct SighashParams<'a> {
	pub source_txid: Txid,
	pub source_vout: u32,
	pub source_amount: Amount,
	pub version: Version,
	/// The inputs of the transaction other than the one being signed.
	pub other_inputs: &'a [TxIn],
	pub outputs: &'a [TxOut],
	/// Position of the signed input among all inputs.
	pub input_index: usize,
	/// The script code, which for pool spends is the redeem script.
	pub redeem_script: &'a Script,
	pub sequence: u32,
	pub locktime: u32,
	pub flag: SighashFlag,
}

fn encode_into<T: Encodable + ?Sized>(buf: &mut Vec<u8>, v: &T) {
	v.consensus_encode(buf).expect("buffers don't produce I/O errors");
}

fn hash_of(buf: Vec<u8>) -> [u8; 32] {
	sha256d::Hash::hash(&buf).to_byte_array()
}

impl<'a> SighashParams<'a> {
	/// All outpoints and sequences in input order, with the signed input in place.
	fn input_parts(&self) -> Vec<(OutPoint, u32)> {
		let mut ret = self.other_inputs.iter()
			.map(|i| (i.previous_output, i.sequence.to_consensus_u32()))
			.collect::<Vec<_>>();
		let idx = self.input_index.min(ret.len());
		ret.insert(idx, (OutPoint::new(self.source_txid, self.source_vout), self.sequence));
		ret
	}

	fn hash_prevouts(&self) -> [u8; 32] {
		if self.flag.has_anyone_can_pay() {
			return [0; 32];
		}
		let mut buf = Vec::new();
		for (prevout, _) in self.input_parts() {
			encode_into(&mut buf, &prevout);
		}
		hash_of(buf)
	}

	fn hash_sequence(&self) -> [u8; 32] {
		let base = self.flag.base_type();
		if self.flag.has_anyone_can_pay()
			|| base == SighashFlag::SINGLE.0
			|| base == SighashFlag::NONE.0
		{
			return [0; 32];
		}
		let mut buf = Vec::new();
		for (_, sequence) in self.input_parts() {
			buf.extend_from_slice(&sequence.to_le_bytes());
		}
		hash_of(buf)
	}

	fn hash_outputs(&self) -> [u8; 32] {
		match self.flag.base_type() {
			b if b == SighashFlag::NONE.0 => [0; 32],
			b if b == SighashFlag::SINGLE.0 => match self.outputs.get(self.input_index) {
				Some(out) => {
					let mut buf = Vec::new();
					encode_into(&mut buf, out);
					hash_of(buf)
				},
				None => [0; 32],
			},
			_ => {
				let mut buf = Vec::new();
				for out in self.outputs {
					encode_into(&mut buf, out);
				}
				hash_of(buf)
			},
		}
	}
}

/// The preimage of the signature hash.
pub fn format(params: &SighashParams) -> Vec<u8> {
	let mut buf = Vec::with_capacity(256);
	encode_into(&mut buf, &params.version);
	buf.extend_from_slice(&params.hash_prevouts());
	buf.extend_from_slice(&params.hash_sequence());
	encode_into(&mut buf, &OutPoint::new(params.source_txid, params.source_vout));
	encode_into(&mut buf, params.redeem_script);
	buf.extend_from_slice(&params.source_amount.to_sat().to_le_bytes());
	buf.extend_from_slice(&params.sequence.to_le_bytes());
	buf.extend_from_slice(&params.hash_outputs());
	buf.extend_from_slice(&params.locktime.to_le_bytes());
	buf.extend_from_slice(&(params.flag.to_u8() as u32).to_le_bytes());
	buf
}

/// The double SHA-256 of the preimage, the message that gets signed.
pub fn signature_hash(params: &SighashParams) -> sha256d::Hash {
	sha256d::Hash::hash(&format(params))
}
