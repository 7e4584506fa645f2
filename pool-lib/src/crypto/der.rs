//!
//! DER encoding of ECDSA signatures.
//!

use num_bigint::BigUint;
use num_traits::Zero;

use crate::crypto::curve::N;
use crate::crypto::Signature;


/// The shortest possible encoding, with single-byte integers.
const MIN_DER_LEN: usize = 8;

const TAG_SEQUENCE: u8 = 0x30;
const TAG_INTEGER: u8 = 0x02;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum DerError {
	#[error("signature of {0} bytes is too short")]
	TooShort(usize),
	#[error("unexpected tag byte {0:#04x}")]
	InvalidTag(u8),
	#[error("length field doesn't match the data")]
	InvalidLength,
	#[error("signature value is zero or not below the curve order")]
	OutOfRange,
}

/// Minimal big-endian encoding with a zero byte in front if the high bit is set.
fn encode_int(v: &BigUint) -> Vec<u8> {
	let mut bytes = v.to_bytes_be();
	if bytes[0] & 0x80 != 0 {
		bytes.insert(0, 0x00);
	}
	bytes
}

fn decode_int(data: &[u8], pos: &mut usize) -> Result<BigUint, DerError> {
	let tag = *data.get(*pos).ok_or(DerError::InvalidLength)?;
	if tag != TAG_INTEGER {
		return Err(DerError::InvalidTag(tag));
	}
	let len = *data.get(*pos + 1).ok_or(DerError::InvalidLength)? as usize;
	let start = *pos + 2;
	let end = start + len;
	if len == 0 || end > data.len() {
		return Err(DerError::InvalidLength);
	}
	*pos = end;

	let mut bytes = &data[start..end];
	while let [0x00, rest @ ..] = bytes {
		bytes = rest;
	}
	Ok(BigUint::from_bytes_be(bytes))
}

impl Signature {
	pub fn to_der(&self) -> Vec<u8> {
		let r = encode_int(&self.r);
		let s = encode_int(&self.s);

		let mut ret = Vec::with_capacity(6 + r.len() + s.len());
		ret.push(TAG_SEQUENCE);
		ret.push((4 + r.len() + s.len()) as u8);
		ret.push(TAG_INTEGER);
		ret.push(r.len() as u8);
		ret.extend_from_slice(&r);
		ret.push(TAG_INTEGER);
		ret.push(s.len() as u8);
		ret.extend_from_slice(&s);
		ret
	}

	pub fn from_der(der: &[u8]) -> Result<Signature, DerError> {
		if der.len() < MIN_DER_LEN {
			return Err(DerError::TooShort(der.len()));
		}
		if der[0] != TAG_SEQUENCE {
			return Err(DerError::InvalidTag(der[0]));
		}
		if der[1] as usize != der.len() - 2 {
			return Err(DerError::InvalidLength);
		}

		let mut pos = 2;
		let r = decode_int(der, &mut pos)?;
		let s = decode_int(der, &mut pos)?;
		if pos != der.len() {
			return Err(DerError::InvalidLength);
		}

		let in_range = |v: &BigUint| !v.is_zero() && *v < *N;
		if !in_range(&r) || !in_range(&s) {
			return Err(DerError::OutOfRange);
		}
		Ok(Signature::new(r, s))
	}
}
