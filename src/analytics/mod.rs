pub mod batch;
pub mod luck;
pub mod ranking;
pub mod ratings;
pub mod sos;
pub mod spreads;
pub mod status;
pub mod validate;
pub mod win_probability;

pub use batch::{run_luck_batch, run_sos_batch, BatchSettings};
pub use win_probability::WinProbabilityModel;

/// Round half away from zero to `places` decimals.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}
