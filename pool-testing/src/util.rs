
use std::str::FromStr;

use feepool::config::Config;

use crate::constants::env::TEST_LOG;


lazy_static! {
	static ref LOG_LEVEL: log::LevelFilter = std::env::var(TEST_LOG).ok()
		.and_then(|l| log::LevelFilter::from_str(&l).ok())
		.unwrap_or(log::LevelFilter::Trace);
}

pub fn init_logging() -> anyhow::Result<()> {
	// We ignore the output
	// An error is returned if the logger is initiated twice
	// Note, that every test tries to initiate the logger
	let _ = fern::Dispatch::new()
		.format(|out, msg, rec| {
			let now = chrono::Local::now();
			let stamp = now.format("%H:%M:%S.%3f");
			out.finish(format_args!("[{} {: >5}] {}", stamp, rec.level(), msg))
		})
		.level(*LOG_LEVEL)
		.chain(std::io::stdout())
		.apply();
	Ok(())
}

/// The default config with the given fee rate.
pub fn config_with_fee_rate(fee_rate: f64) -> Config {
	Config { fee_rate, ..Config::default() }
}
