
use bitcoin::{opcodes, Script, ScriptBuf};
use bitcoin::script::{Builder, Instruction, PushBytesBuf};
use bitcoin::secp256k1::PublicKey;

use crate::{PartialSignature, Role};
use crate::error::{ParticipantSetError, PoolError};


/// The largest number of keys CHECKMULTISIG accepts.
pub const MAX_MULTISIG_KEYS: usize = 20;

/// Length of a placeholder signature push: the largest DER signature plus
/// the sighash flag byte.
pub const PLACEHOLDER_SIG_LEN: usize = 73;

fn push_data(builder: Builder, data: &[u8]) -> Builder {
	let push = PushBytesBuf::try_from(data.to_vec()).expect("signatures and keys fit a push");
	builder.push_slice(push)
}

/// Build the multisig script without checking the parameters.
fn build_multisig<'a>(keys: impl ExactSizeIterator<Item = &'a PublicKey>, threshold: usize) -> ScriptBuf {
	let n = keys.len();
	let mut builder = Builder::new().push_int(threshold as i64);
	for key in keys {
		builder = push_data(builder, &key.serialize());
	}
	builder
		.push_int(n as i64)
		.push_opcode(opcodes::all::OP_CHECKMULTISIG)
		.into_script()
}

/// Check that `threshold`-of-`keys` is a valid multisig configuration.
pub fn check_multisig_params(keys: usize, threshold: usize) -> Result<(), ParticipantSetError> {
	if threshold == 0 || threshold > keys {
		return Err(ParticipantSetError::InvalidThreshold { threshold, keys });
	}
	if keys == 0 || keys > MAX_MULTISIG_KEYS {
		return Err(ParticipantSetError::InvalidKeyCount(keys));
	}
	Ok(())
}

/// A bare m-of-n multisig script over the keys in the given order.
pub fn multisig_locking_script(
	keys: &[PublicKey],
	threshold: usize,
) -> Result<ScriptBuf, ParticipantSetError> {
	check_multisig_params(keys.len(), threshold)?;
	Ok(build_multisig(keys.iter(), threshold))
}

/// Parse a script created by [multisig_locking_script].
///
/// Returns the threshold and the keys in script order.
pub fn parse_multisig(script: &Script) -> Option<(usize, Vec<PublicKey>)> {
	fn small_int(ins: &Instruction) -> Option<usize> {
		match ins {
			Instruction::Op(op) => match op.classify(opcodes::ClassifyContext::Legacy) {
				opcodes::Class::PushNum(n) if n > 0 => Some(n as usize),
				_ => None,
			},
			Instruction::PushBytes(b) if b.len() == 1 => Some(b.as_bytes()[0] as usize),
			_ => None,
		}
	}

	let ins = script.instructions().collect::<Result<Vec<_>, _>>().ok()?;
	let (last, rest) = ins.split_last()?;
	if *last != Instruction::Op(opcodes::all::OP_CHECKMULTISIG) || rest.len() < 2 {
		return None;
	}
	let threshold = small_int(&rest[0])?;
	let n = small_int(&rest[rest.len() - 1])?;

	let keys = rest[1..rest.len() - 1].iter().map(|ins| match ins {
		Instruction::PushBytes(b) => PublicKey::from_slice(b.as_bytes()).ok(),
		_ => None,
	}).collect::<Option<Vec<_>>>()?;
	if keys.len() != n || check_multisig_params(n, threshold).is_err() {
		return None;
	}
	Some((threshold, keys))
}

/// The standard pay-to-pubkey-hash script for a key.
pub fn p2pkh_locking_script(key: &PublicKey) -> ScriptBuf {
	ScriptBuf::new_p2pkh(&bitcoin::PublicKey::new(*key).pubkey_hash())
}

/// The unlocking script for a pay-to-pubkey-hash output.
pub fn p2pkh_unlocking_script(signature: &[u8], key: &PublicKey) -> ScriptBuf {
	let builder = push_data(Builder::new(), signature);
	push_data(builder, &key.serialize()).into_script()
}

/// An unlocking script of worst-case size, for fee estimation.
///
/// It holds the dummy element CHECKMULTISIG consumes followed by
/// `threshold` zero-filled signatures of maximum length.
pub fn fake_unlocking_script(threshold: usize) -> ScriptBuf {
	let mut builder = Builder::new().push_opcode(opcodes::OP_0);
	for _ in 0..threshold {
		builder = push_data(builder, &[0u8; PLACEHOLDER_SIG_LEN]);
	}
	builder.into_script()
}

/// Combine signatures into a multisig unlocking script.
///
/// The signatures must already be in the order of the keys in the redeem
/// script.
pub fn merge_signatures<'a>(
	signatures: impl IntoIterator<Item = &'a [u8]>,
) -> ScriptBuf {
	let mut builder = Builder::new().push_opcode(opcodes::OP_0);
	for sig in signatures {
		builder = push_data(builder, sig);
	}
	builder.into_script()
}

/// The multisig descriptor of a fee pool.
///
/// The order of the members is part of the protocol: the redeem script lists
/// their keys in this order and signatures are merged in this order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "PoolScriptRepr", into = "PoolScriptRepr")]
pub struct PoolScript {
	members: Vec<(Role, PublicKey)>,
	threshold: usize,
	redeem_script: ScriptBuf,
}

impl PoolScript {
	pub fn new(members: Vec<(Role, PublicKey)>, threshold: usize) -> Result<PoolScript, ParticipantSetError> {
		check_multisig_params(members.len(), threshold)?;
		for (i, (role, _)) in members.iter().enumerate() {
			if members[..i].iter().any(|(r, _)| r == role) {
				return Err(ParticipantSetError::DuplicateRole(*role));
			}
		}
		Ok(Self::new_unchecked(members, threshold))
	}

	fn new_unchecked(members: Vec<(Role, PublicKey)>, threshold: usize) -> PoolScript {
		let redeem_script = build_multisig(members.iter().map(|(_, pk)| pk), threshold);
		PoolScript { members, threshold, redeem_script }
	}

	/// The 2-of-2 pool between a server and a client.
	pub fn dual(server: PublicKey, client: PublicKey) -> PoolScript {
		Self::new_unchecked(vec![(Role::Server, server), (Role::Client, client)], 2)
	}

	/// The 2-of-3 pool between a server, a client and an escrow.
	pub fn triple(server: PublicKey, client: PublicKey, escrow: PublicKey) -> PoolScript {
		Self::new_unchecked(vec![
			(Role::Server, server),
			(Role::Client, client),
			(Role::Escrow, escrow),
		], 2)
	}

	pub fn threshold(&self) -> usize {
		self.threshold
	}

	pub fn redeem_script(&self) -> &Script {
		&self.redeem_script
	}

	pub fn keys(&self) -> impl Iterator<Item = &PublicKey> + '_ {
		self.members.iter().map(|(_, pk)| pk)
	}

	pub fn roles(&self) -> impl Iterator<Item = Role> + '_ {
		self.members.iter().map(|(r, _)| *r)
	}

	/// Position of the member in the redeem script.
	pub fn member_index(&self, role: Role) -> Option<usize> {
		self.members.iter().position(|(r, _)| *r == role)
	}

	pub fn public_key(&self, role: Role) -> Option<&PublicKey> {
		self.members.iter().find(|(r, _)| *r == role).map(|(_, pk)| pk)
	}

	/// Merge exactly `threshold` signatures into an unlocking script.
	///
	/// The signatures may be given in any order, they are sorted into key
	/// order here.
	pub fn unlocking_script(&self, signatures: &[PartialSignature]) -> Result<ScriptBuf, PoolError> {
		if signatures.len() != self.threshold {
			return Err(PoolError::SignatureCount {
				needed: self.threshold,
				got: signatures.len(),
			});
		}

		let mut indexed: Vec<(usize, &PartialSignature)> = Vec::with_capacity(signatures.len());
		for sig in signatures {
			let idx = self.member_index(sig.signer).ok_or(PoolError::UnknownSigner(sig.signer))?;
			if indexed.iter().any(|(i, _)| *i == idx) {
				return Err(PoolError::DuplicateSignature(sig.signer));
			}
			indexed.push((idx, sig));
		}
		indexed.sort_by_key(|(i, _)| *i);

		Ok(merge_signatures(indexed.into_iter().map(|(_, sig)| sig.as_bytes())))
	}
}

#[derive(Deserialize, Serialize)]
struct PoolScriptRepr {
	members: Vec<(Role, PublicKey)>,
	threshold: usize,
}

impl TryFrom<PoolScriptRepr> for PoolScript {
	type Error = ParticipantSetError;
	fn try_from(repr: PoolScriptRepr) -> Result<Self, Self::Error> {
		PoolScript::new(repr.members, repr.threshold)
	}
}

impl From<PoolScript> for PoolScriptRepr {
	fn from(pool: PoolScript) -> Self {
		PoolScriptRepr { members: pool.members, threshold: pool.threshold }
	}
}
