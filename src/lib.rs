pub mod adc;
pub mod config;
pub mod error;
pub mod measurement;
pub mod mode;
pub mod network;
pub mod sampler;
pub mod scale;

pub mod prelude {
    pub use crate::{
        adc::*, config::*, error::*, measurement::*, mode::*, sampler::*, scale::*,
    };
}
