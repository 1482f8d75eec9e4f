// src/models/model.rs
/// Risk-neutral spot dynamics in the domestic measure
///
/// ```text
/// dS_t = (r_d - r_f) S_t dt + σ(t, S_t) S_t dW_t
/// ```
pub trait SpotDynamics: Sync {
    /// Drift rate `r_d - r_f`
    fn carry(&self) -> f64;

    /// Instantaneous volatility σ(t, S)
    fn volatility(&self, s: f64, t: f64) -> f64;

    /// One log-Euler step with standard normal draw `z`
    ///
    /// ```text
    /// S_{t+dt} = S_t exp((r_d - r_f - σ²/2) dt + σ √dt z)
    /// ```
    /// Exact when σ is constant over the step.
    fn step(&self, s: f64, t: f64, dt: f64, z: f64) -> f64 {
        let sigma = self.volatility(s, t);
        s * ((self.carry() - 0.5 * sigma * sigma) * dt + sigma * dt.sqrt() * z).exp()
    }
}
