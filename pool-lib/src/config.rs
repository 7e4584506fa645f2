use std::io;
use std::path::Path;

use anyhow::{bail, Context};
use bitcoin::Amount;
use bitcoin_ext::{fee, P2PKH_DUST};
use config::{Environment, File};


/// Settings shared by the pool flows.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
	/// Fee rate in satoshis per 1000 bytes.
	pub fee_rate: f64,
	/// Change outputs of funding transactions below this value are not created.
	#[serde(with = "bitcoin::amount::serde::as_sat")]
	pub dust_limit: Amount,
	/// Locktime of the first round of a triple pool.
	pub triple_locktime: u32,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			fee_rate: 0.5,
			dust_limit: P2PKH_DUST,
			triple_locktime: 0,
		}
	}
}

impl Config {
	fn load_with_custom_env(
		config_file: Option<&Path>,
		#[cfg(test)]
		custom_env: Option<std::collections::HashMap<String, String>>,
	) -> anyhow::Result<Self> {
		let default = config::Config::try_from(&Self::default())
			.expect("default config failed to deconstruct");

		// We'll add three layers of config:
		// - the defaults defined in Config's Default impl
		// - the config file passed in this function, if any
		// - environment variables (prefixed with `FEEPOOL_`)

		let mut builder = config::Config::builder()
			.add_source(default);
		if let Some(file) = config_file {
			builder = builder.add_source(File::from(file));
		}

		let env = Environment::with_prefix("FEEPOOL")
			.separator("__");
		#[cfg(test)]
		let env = env.source(custom_env);
		builder = builder.add_source(env);

		let cfg = builder.build().context("error building config")?;
		let cfg: Config = cfg.try_deserialize().context("error parsing config")?;
		Ok(cfg)
	}

	pub fn load(config_file: Option<&Path>) -> anyhow::Result<Self> {
		Self::load_with_custom_env(config_file, #[cfg(test)] None)
	}

	/// Verifies if the specified configuration is valid
	pub fn validate(&self) -> anyhow::Result<()> {
		if !fee::is_valid_fee_rate(self.fee_rate) {
			bail!("Invalid fee_rate {}: it must be a finite number between 0 and {}",
				self.fee_rate, fee::MAX_FEE_RATE,
			);
		}
		Ok(())
	}

	/// Write the config into the writer.
	pub fn write_into(&self, writer: &mut dyn io::Write) -> anyhow::Result<()> {
		let s = toml::to_string_pretty(self).expect("config serialization error");
		writer.write_all(s.as_bytes()).context("error writing config to writer")?;
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use std::collections::HashMap;
	use std::io::Write;

	use super::*;

	#[test]
	fn defaults() {
		let cfg = Config::load(None).unwrap();
		assert_eq!(cfg, Config::default());
		assert_eq!(cfg.fee_rate, 0.5);
		assert_eq!(cfg.dust_limit, Amount::from_sat(546));
		assert_eq!(cfg.triple_locktime, 0);
		cfg.validate().expect("default config is valid");
	}

	#[test]
	fn validate_fee_rate() {
		let mut cfg = Config::default();
		cfg.fee_rate = 1.2;
		cfg.validate().expect("This config should be valid");

		cfg.fee_rate = -0.1;
		cfg.validate().expect_err("Invalid because fee rate is negative");

		cfg.fee_rate = f64::INFINITY;
		cfg.validate().expect_err("Invalid because fee rate is not finite");

		cfg.fee_rate = 1e30;
		cfg.validate().expect_err("Invalid because fee rate exceeds all money");
	}

	#[test]
	fn config_from_env_vars() {
		let env = [
			("FEEPOOL__FEE_RATE", "1.2"),
			("FEEPOOL__DUST_LIMIT", "1000"),
		].into_iter().map(|(k, v)| (k.into(), v.into())).collect::<HashMap<String, String>>();

		let cfg = Config::load_with_custom_env(None, Some(env)).unwrap();
		cfg.validate().expect("invalid configuration");
		assert_eq!(cfg.fee_rate, 1.2);
		assert_eq!(cfg.dust_limit, Amount::from_sat(1000));
		assert_eq!(cfg.triple_locktime, 0);
	}

	#[test]
	fn config_file_roundtrip() {
		let mut cfg = Config::default();
		cfg.fee_rate = 2.5;
		cfg.triple_locktime = 840_000;

		let mut buf = Vec::new();
		cfg.write_into(&mut buf).unwrap();
		let text = String::from_utf8(buf).unwrap();
		assert!(text.contains("fee_rate = 2.5"));
		assert!(text.contains("dust_limit = 546"));

		let path = std::env::temp_dir().join(format!("feepool-config-{}.toml", std::process::id()));
		std::fs::File::create(&path).unwrap().write_all(text.as_bytes()).unwrap();
		let loaded = Config::load_with_custom_env(Some(&path), Some(HashMap::new())).unwrap();
		std::fs::remove_file(&path).unwrap();
		assert_eq!(loaded, cfg);
	}
}
