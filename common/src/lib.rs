#![cfg_attr(not(feature = "std"), no_std)]

pub mod measurement;

pub use measurement::*;
