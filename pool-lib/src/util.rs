
use num_bigint::BigUint;


/// Encode a big integer as 32 big-endian bytes, left-padded with zeros.
///
/// Values over 256 bits are truncated to their low 32 bytes.
pub fn to_bytes32(v: &BigUint) -> [u8; 32] {
	let bytes = v.to_bytes_be();
	let mut ret = [0u8; 32];
	if bytes.len() >= 32 {
		ret.copy_from_slice(&bytes[bytes.len() - 32..]);
	} else {
		ret[32 - bytes.len()..].copy_from_slice(&bytes);
	}
	ret
}

/// Serde helpers to hex-encode a byte vector.
pub mod hex_bytes {
	use std::borrow::Cow;

	use bitcoin::hex::{DisplayHex, FromHex};
	use serde::{de, Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(v: &[u8], s: S) -> Result<S::Ok, S::Error> {
		s.collect_str(&v.as_hex())
	}

	pub fn deserialize<'d, D: Deserializer<'d>>(d: D) -> Result<Vec<u8>, D::Error> {
		let s = <Cow<'d, str>>::deserialize(d)?;
		Vec::<u8>::from_hex(s.as_ref()).map_err(de::Error::custom)
	}
}
