pub mod controller;
pub mod paper;
pub mod retry;
pub mod trading_loop;

pub use controller::*;
pub use paper::*;
pub use trading_loop::*;
