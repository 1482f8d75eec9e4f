// src/output.rs
//! CSV rendering of valuations and surfaces.

use crate::pricer::{Completion, ValuationResult};
use crate::vol::VolatilitySurface;
use std::fs::File;
use std::io::{self, BufWriter, Write};

/// One row per labelled valuation.
pub fn write_valuation_to_csv(filename: &str, rows: &[(&str, &ValuationResult)]) -> io::Result<()> {
    let mut file = BufWriter::new(File::create(filename)?);
    writeln!(
        file,
        "label,method,price,unit_price,delta,gamma,vega,theta,rho_domestic,rho_foreign,ci_lower,ci_upper,complete"
    )?;
    for (label, v) in rows {
        let g = v.greeks();
        let (lo, hi) = v
            .confidence_interval()
            .map_or((f64::NAN, f64::NAN), |ci| (ci.lower, ci.upper));
        writeln!(
            file,
            "{},{:?},{},{},{},{},{},{},{},{},{},{},{}",
            label,
            v.method(),
            v.price(),
            v.unit_price(),
            g.delta,
            g.gamma,
            g.vega,
            g.theta,
            g.rho_domestic,
            g.rho_foreign,
            lo,
            hi,
            v.completion() == Completion::Complete
        )?;
    }
    file.flush()
}

/// Quoted nodes of every smile slice: `tenor,strike,vol`.
pub fn write_surface_to_csv(filename: &str, surface: &VolatilitySurface) -> io::Result<()> {
    let mut file = BufWriter::new(File::create(filename)?);
    writeln!(file, "tenor,strike,vol")?;
    for slice in surface.slices() {
        for (k, vol) in slice.strikes().iter().zip(slice.vols()) {
            writeln!(file, "{},{},{}", slice.tenor(), k, vol)?;
        }
    }
    file.flush()
}

/// Benchmark timings: `label,work_units,elapsed_ms,units_per_sec`.
pub fn write_timings_to_csv(filename: &str, rows: &[(&str, usize, f64)]) -> io::Result<()> {
    let mut file = BufWriter::new(File::create(filename)?);
    writeln!(file, "label,work_units,elapsed_ms,units_per_sec")?;
    for (label, units, ms) in rows {
        let rate = if *ms > 0.0 { *units as f64 / (ms / 1000.0) } else { f64::NAN };
        writeln!(file, "{},{},{:.3},{:.1}", label, units, ms, rate)?;
    }
    file.flush()
}
