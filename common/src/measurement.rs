use serde::{Deserialize, Serialize};

/// Multiplier from grams to the fluid-ounce figure shown by the dashboard.
pub const GRAMS_TO_OUNCES: f32 = 0.035_273_96;

/// The JSON body served on `GET /api/measurements`.
///
/// Every gram figure has a matching ounce figure so clients never have to
/// know the conversion constant.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeasurementReport {
    pub measured_weight_g: f32,
    pub measured_weight_oz: f32,
    pub container_weight_g: f32,
    pub container_weight_oz: f32,
    pub fluid_weight_g: f32,
    pub fluid_weight_oz: f32,
}

impl MeasurementReport {
    pub fn from_grams(measured: f32, container: f32, fluid: f32) -> Self {
        Self {
            measured_weight_g: measured,
            measured_weight_oz: measured * GRAMS_TO_OUNCES,
            container_weight_g: container,
            container_weight_oz: container * GRAMS_TO_OUNCES,
            fluid_weight_g: fluid,
            fluid_weight_oz: fluid * GRAMS_TO_OUNCES,
        }
    }
}

/// Body of `POST /api/container`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContainerWeight {
    pub weight_g: f32,
}
