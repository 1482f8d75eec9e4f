// src/models/gbm.rs
use super::model::SpotDynamics;

/// Constant-volatility FX spot (Garman–Kohlhagen dynamics)
#[derive(Debug, Clone, Copy)]
pub struct FxGbm {
    pub rd: f64,
    pub rf: f64,
    pub sigma: f64,
}

impl FxGbm {
    pub fn new(rd: f64, rf: f64, sigma: f64) -> Self {
        FxGbm { rd, rf, sigma }
    }

    /// Spot at `t` given the terminal normal draw, `S_0 exp((r_d - r_f - σ²/2)t + σ√t z)`
    pub fn exact_step(&self, s_t: f64, dt: f64, normal_draw: f64) -> f64 {
        s_t * ((self.rd - self.rf - 0.5 * self.sigma * self.sigma) * dt
            + self.sigma * dt.sqrt() * normal_draw)
            .exp()
    }
}

impl SpotDynamics for FxGbm {
    fn carry(&self) -> f64 {
        self.rd - self.rf
    }

    fn volatility(&self, _s: f64, _t: f64) -> f64 {
        self.sigma
    }

    fn step(&self, s: f64, _t: f64, dt: f64, z: f64) -> f64 {
        self.exact_step(s, dt, z)
    }
}
