
pub mod encodable {
	//! Module to hex- or bytes-encode bitcoin objects using the consensus encoding.
	//!
	//! Human readable formats get a lowercase hex string, binary formats get
	//! the raw bytes.

	use std::borrow::Cow;

	use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

	use cbitcoin::consensus::encode::{self, Decodable, Encodable};

	struct SerWrapper<'a, T>(&'a T);

	impl<'a, T: Encodable> Serialize for SerWrapper<'a, T> {
		fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
			if s.is_human_readable() {
				s.serialize_str(&encode::serialize_hex(self.0))
			} else {
				s.serialize_bytes(&encode::serialize(self.0))
			}
		}
	}

	struct DeWrapper<T>(T);

	impl<'de, T: Decodable> Deserialize<'de> for DeWrapper<T> {
		fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
			if d.is_human_readable() {
				let s = <Cow<'de, str>>::deserialize(d)?;
				Ok(DeWrapper(encode::deserialize_hex(s.as_ref())
					.map_err(de::Error::custom)?))
			} else {
				let b = <Cow<'de, [u8]>>::deserialize(d)?;
				Ok(DeWrapper(encode::deserialize(b.as_ref())
					.map_err(de::Error::custom)?))
			}
		}
	}

	pub fn serialize<T: Encodable, S: Serializer>(v: &T, s: S) -> Result<S::Ok, S::Error> {
		SerWrapper(v).serialize(s)
	}

	pub fn deserialize<'d, T: Decodable, D: Deserializer<'d>>(d: D) -> Result<T, D::Error> {
		Ok(DeWrapper::<T>::deserialize(d)?.0)
	}
}


#[cfg(test)]
mod test {
	use cbitcoin::{Transaction, TxOut};
	use serde::{Deserialize, Serialize};

	// funding transaction of a dual pool, one P2PKH input and a 2-of-2 output
	const FUNDING_HEX: &str = "010000000150a016efa792709fd86b47e13793aa783ae88e949e49fb731a8de6023fd91f0a010000006b483045022100a5a54548db07e6c063ac05f646dbffbdb47a09398071ac89ce84a9f670ca3ef4022060a676631c36312a9b9c3f539e24b2bf24f732730949421cd4c27319e7ff91764121039e00beaeaab4162fa3d45326e3632303c394faf8f7a17bbcf27a01952a1e7646ffffffff013d8601000000000047522103f6552f24751f8618fe0b2a813c9c3e163fbeec92ab737af7990297568a63d62121039e00beaeaab4162fa3d45326e3632303c394faf8f7a17bbcf27a01952a1e764652ae00000000";

	#[test]
	fn test_serde_encodable() {
		let tx = cbitcoin::consensus::encode::deserialize_hex::<Transaction>(FUNDING_HEX).unwrap();

		#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
		struct S {
			#[serde(with = "crate::serde::encodable")]
			tx: Transaction,
			#[serde(with = "crate::serde::encodable")]
			output: TxOut,
		}

		let s = S { output: tx.output[0].clone(), tx };
		let json = serde_json::to_string(&s).unwrap();
		assert!(json.starts_with(&format!("{{\"tx\":\"{}\"", FUNDING_HEX)));

		let s_from_json = serde_json::from_str(&json).unwrap();
		assert_eq!(s, s_from_json);
	}
}
