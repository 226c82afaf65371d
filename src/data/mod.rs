pub mod export;
pub mod filter;
pub mod formula;
pub mod generator;
pub mod sample;
pub mod stats;
pub mod window;

#[cfg(feature = "fft")]
pub mod fft;
