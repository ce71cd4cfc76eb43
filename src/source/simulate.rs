use super::{SourceParams, SourceStats};
use crate::model::{PositionSample, SimulationConfig, SourceEvent, SourceFailure};
use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use time::OffsetDateTime;

/// A runner lapping a circle around the origin at constant speed.
struct Runner {
    angle: f64,
    step: f64,
}

impl Runner {
    fn new(sim: &SimulationConfig, interval_secs: f64) -> Self {
        let radius = sim.radius_m.max(1.0);
        Self {
            angle: 0.0,
            step: sim.speed_mps * interval_secs / radius,
        }
    }

    /// Offset from the origin in meters (north, east), then advance one delivery.
    fn advance(&mut self, radius: f64) -> (f64, f64) {
        let pos = (radius * self.angle.sin(), radius * self.angle.cos());
        self.angle = (self.angle + self.step) % std::f64::consts::TAU;
        pos
    }
}

pub(crate) async fn run_simulated(sim: &SimulationConfig, params: SourceParams<'_>) -> Result<SourceStats> {
    let mut rng = match sim.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let noise = params.mode.noise_m();
    let dropout = sim.dropout.clamp(0.0, 1.0);
    let radius = sim.radius_m.max(1.0);
    let mut runner = Runner::new(sim, params.interval.as_secs_f64());
    let mut stats = SourceStats::default();
    let mut pacer = params.pacer();

    loop {
        pacer.tick().await;
        if params.cancelled() {
            break;
        }

        let (north, east) = runner.advance(radius);
        let ev = if rng.gen_bool(dropout) {
            SourceEvent::Failed(SourceFailure::NoFix)
        } else {
            let position = sim.origin.offset(
                north + rng.gen_range(-noise..=noise),
                east + rng.gen_range(-noise..=noise),
            );
            SourceEvent::Fix(PositionSample::new(
                position,
                sim.speed_mps,
                OffsetDateTime::now_utc(),
            ))
        };

        if !params.emit(ev, &mut stats) {
            break;
        }
    }

    Ok(stats)
}
