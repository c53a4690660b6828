//! Pregame win probability from a power-rating differential.
//!
//! The rating gap (plus a home-field term) is treated as the mean of a normal
//! margin distribution with a fixed standard deviation, so
//! `P(win) = Φ((diff − mean) / σ)`. Φ is evaluated with the Zelen–Severo
//! rational approximation (Abramowitz & Stegun 26.2.17), |error| < 7.5e-8.

/// Conventional standard deviation of a college football margin, in rating points.
pub const DEFAULT_STD_DEV: f64 = 13.5;

/// Rating points credited to the home side at a non-neutral site.
pub const HOME_FIELD_ADVANTAGE: f64 = 2.15;

// A&S 26.2.17 coefficients
const P: f64 = 0.231_641_9;
const B1: f64 = 0.319_381_530;
const B2: f64 = -0.356_563_782;
const B3: f64 = 1.781_477_937;
const B4: f64 = -1.821_255_978;
const B5: f64 = 1.330_274_429;

/// 1 / √(2π)
const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

/// Fixed model parameters. Nothing here is fitted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WinProbabilityModel {
    pub mean: f64,
    pub std_dev: f64,
    pub home_field_advantage: f64,
}

impl Default for WinProbabilityModel {
    fn default() -> Self {
        WinProbabilityModel {
            mean: 0.0,
            std_dev: DEFAULT_STD_DEV,
            home_field_advantage: HOME_FIELD_ADVANTAGE,
        }
    }
}

impl WinProbabilityModel {
    pub fn new(std_dev: f64, home_field_advantage: f64) -> Self {
        WinProbabilityModel {
            std_dev,
            home_field_advantage,
            ..Default::default()
        }
    }

    /// Probability that the side with the given rating edge wins.
    pub fn win_probability(&self, rating_diff: f64) -> f64 {
        win_probability(rating_diff, self.mean, self.std_dev)
    }

    /// Home-side rating differential including the home-field term.
    /// The away side's differential is the negation.
    pub fn rating_diff(&self, home_rating: f64, away_rating: f64, neutral_site: bool) -> f64 {
        let hfa = if neutral_site {
            0.0
        } else {
            self.home_field_advantage
        };
        home_rating - away_rating + hfa
    }

    /// (home, away) win probabilities; they always sum to one.
    pub fn matchup(&self, home_rating: f64, away_rating: f64, neutral_site: bool) -> (f64, f64) {
        let home = self.win_probability(self.rating_diff(home_rating, away_rating, neutral_site));
        (home, 1.0 - home)
    }
}

/// `Φ((rating_diff − mean) / std_dev)`
pub fn win_probability(rating_diff: f64, mean: f64, std_dev: f64) -> f64 {
    normal_cdf((rating_diff - mean) / std_dev)
}

/// Standard normal CDF. The lower tail is evaluated directly and the upper
/// tail mirrored so that Φ(z) + Φ(−z) = 1.
pub fn normal_cdf(z: f64) -> f64 {
    if z > 0.0 {
        return 1.0 - normal_cdf(-z);
    }
    let x = -z;
    let t = 1.0 / (1.0 + P * x);
    let poly = t * (B1 + t * (B2 + t * (B3 + t * (B4 + t * B5))));
    INV_SQRT_2PI * (-0.5 * x * x).exp() * poly
}
