//! Forward-error-correction and checksum primitives
//!
//! Each submodule implements one code exactly as it appears on the air
//! interface of the protocols in this crate. Encoders never fail; decoders
//! either correct what the code allows or report the word as unusable.

pub mod bptc;
pub mod convolution;
pub mod crc;
pub mod golay;
pub mod hamming;
pub mod qr1676;
pub mod rs129;
