#[macro_export]
macro_rules! debug_log {
	($($arg:tt)*) => {{
		#[cfg(debug_assertions)]
		{
			eprintln!($($arg)*);
		}
	}};
}

pub mod action;
pub mod config;
pub mod error;
pub mod extractor;
pub mod model;
pub mod paths;
pub mod scanner;
pub mod server;
pub mod store;
pub mod synth;
