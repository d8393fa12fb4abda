pub mod trading;
pub mod receipt;

pub use trading::*;
pub use receipt::*;
