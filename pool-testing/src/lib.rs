#[macro_use]
extern crate lazy_static;

pub mod constants;
pub mod util;

use std::str::FromStr;

use bitcoin::{Amount, Txid};
use bitcoin::secp256k1::SecretKey;
use feepool::{FundingInput, Party, Role};


fn party(role: Role, secret: &str) -> Party {
	Party::new(role, SecretKey::from_str(secret).expect("valid test key"))
}

fn utxo(txid: &str, vout: u32, sat: u64) -> FundingInput {
	FundingInput {
		txid: Txid::from_str(txid).expect("valid test txid"),
		vout,
		amount: Amount::from_sat(sat),
	}
}

/// The parties and funds of the dual pool scenario.
pub mod dual {
	use super::*;

	use crate::constants::keys;

	pub fn server() -> Party {
		party(Role::Server, keys::KEY_2)
	}

	pub fn client() -> Party {
		party(Role::Client, keys::KEY_1)
	}

	pub fn funding_inputs() -> Vec<FundingInput> {
		vec![utxo("0a1fd93f02e68d1a73fb499e948ee83a78aa9337e1476bd89f7092a7ef16a050", 1, 99902)]
	}

	pub const FEE_RATE: f64 = 0.5;
	pub const END_HEIGHT: u32 = 800_000;
}

/// The parties and funds of the triple pool scenario.
pub mod triple {
	use super::*;

	use crate::constants::keys;

	pub fn server() -> Party {
		party(Role::Server, keys::KEY_1)
	}

	/// Party A.
	pub fn client() -> Party {
		party(Role::Client, keys::KEY_3)
	}

	/// Party B.
	pub fn escrow() -> Party {
		party(Role::Escrow, keys::KEY_2)
	}

	pub fn funding_inputs() -> Vec<FundingInput> {
		vec![utxo("ffcfe296a596f01e5cef2d14f39bc61f55c8f0535a5f723c1b5b043b77053595", 1, 19996)]
	}

	pub const FEE_RATE: f64 = 1.2;
}
