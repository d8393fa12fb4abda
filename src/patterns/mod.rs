pub mod generator;
pub mod random;

pub use generator::PricePatternGenerator;
pub use random::*;
