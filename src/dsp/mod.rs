pub mod filter;
pub mod oscillator;
