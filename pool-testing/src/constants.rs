
pub mod keys {
	pub const KEY_1: &str = "903b1b2c396f17203fa83444d72bf5c666119d9d681eb715520f99ae6f92322c";
	pub const KEY_2: &str = "a2d2ca4c19e3c560792ca751842c29b9da94be09f712a7f9ba7c66e64a354829";
	pub const KEY_3: &str = "a682814ac246ca65543197e593aa3b2633b891959c183416f54e2c63a8de1d8c";
}

pub mod env {
	/// Set to a log level like `debug` to change the level of test logging.
	pub const TEST_LOG: &str = "TEST_LOG";
}
