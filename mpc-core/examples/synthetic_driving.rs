//! Fills the buffers from a synthetic driving simulator and trains a
//! constant dynamics model on prioritized windows.
use anyhow::Result;
use clap::Parser;
use log::{info, warn};
use mpc_core::{
    dummy::DummyDynamicsModel,
    error::MpcError,
    frame_stats::{FrameStatsAccumulator, FrameStatsConfig},
    record::{AggregateRecorder, BufferedRecorder, Record},
    trajectory_buffer::{StepEffect, TrajectoryBufferConfig, TrajectoryRingBuffer},
    util::prediction_loss,
    DynamicsModel,
};
use ndarray::{ArrayD, IxDyn};

const FRAME_SHAPE: [usize; 3] = [12, 12, 3];
const HIDDEN_DIM: usize = 32;
const MAX_EPISODE_LEN: usize = 150;

/// Train a dynamics model on synthetic driving data
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// YAML file of the trajectory buffer configuration; overrides the
    /// buffer options below
    #[arg(long)]
    config: Option<String>,

    /// Capacity of both buffers
    #[arg(long, default_value_t = 2000)]
    capacity: usize,

    /// Prediction horizon
    #[arg(long, default_value_t = 10)]
    horizon: usize,

    /// Number of stacked frames
    #[arg(long, default_value_t = 3)]
    frame_history_len: usize,

    /// Number of discrete actions
    #[arg(long, default_value_t = 9)]
    action_dim: usize,

    /// Number of windows per batch
    #[arg(long, default_value_t = 16)]
    batch_size: usize,

    /// Number of simulator steps
    #[arg(long, default_value_t = 5000)]
    steps: usize,

    /// Simulator steps between optimization steps
    #[arg(long, default_value_t = 100)]
    train_interval: usize,

    /// Sample from the earliest third of the buffer only
    #[arg(long, default_value_t = false)]
    sample_early: bool,

    /// Random seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Toy vehicle: steering changes the heading, heading moves the car across
/// the lane.
struct Simulator {
    rng: fastrand::Rng,
    speed: f32,
    angle: f32,
    position: f32,
    t: usize,
}

impl Simulator {
    fn new(seed: u64) -> Self {
        let mut sim = Self {
            rng: fastrand::Rng::with_seed(seed),
            speed: 0.0,
            angle: 0.0,
            position: 0.0,
            t: 0,
        };
        sim.reset();
        sim
    }

    fn reset(&mut self) {
        self.speed = self.rng.f32() * 5.0;
        self.angle = 0.0;
        self.position = self.rng.f32() - 0.5;
        self.t = 0;
    }

    fn frame(&mut self) -> ArrayD<u8> {
        let lane = ((self.position + 3.0) / 6.0 * FRAME_SHAPE[1] as f32) as usize;
        let rng = &mut self.rng;
        ArrayD::from_shape_fn(IxDyn(&FRAME_SHAPE), |ix| {
            if ix[1] == lane {
                255
            } else {
                rng.u8(..64)
            }
        })
    }

    fn step(&mut self, action: usize, action_dim: usize) -> StepEffect {
        let steer = (action as f32 / (action_dim - 1).max(1) as f32 - 0.5) * 0.2;
        self.angle = (self.angle + steer).clamp(-1.0, 1.0);
        self.speed = (self.speed + self.rng.f32() - 0.4).clamp(0.0, 10.0);
        self.position += self.speed * self.angle.sin() * 0.1;
        self.t += 1;

        let offroad = self.position.abs() > 2.5;
        let collision = self.rng.f32() < 0.002;
        let effect = StepEffect {
            action,
            terminal: offroad || collision || self.t >= MAX_EPISODE_LEN,
            collision,
            offroad,
            speed: self.speed,
            angle: self.angle,
            position: self.position,
        };
        if effect.terminal {
            self.reset();
        }
        effect
    }
}

fn buffer_config(args: &Args) -> Result<TrajectoryBufferConfig> {
    match &args.config {
        Some(path) => TrajectoryBufferConfig::load(path),
        None => Ok(TrajectoryBufferConfig::default()
            .capacity(args.capacity)
            .horizon(args.horizon)
            .frame_history_len(args.frame_history_len)
            .action_dim(args.action_dim)
            .seed(args.seed)),
    }
}

fn run(args: &Args) -> Result<BufferedRecorder> {
    let config = buffer_config(args)?;
    let mut buffer = TrajectoryRingBuffer::new(&config)?;
    let stats_config = FrameStatsConfig::default()
        .capacity(config.capacity)
        .frame_history_len(config.frame_history_len);
    let mut frame_stats = FrameStatsAccumulator::new(&stats_config)?;
    let mut sim = Simulator::new(args.seed);
    let mut policy_rng = fastrand::Rng::with_seed(args.seed + 1);
    let mut model = DummyDynamicsModel::new(HIDDEN_DIM);
    let mut recorder = BufferedRecorder::new();

    for step in 1..=args.steps {
        let frame = sim.frame();
        frame_stats.append(frame.view())?;
        let ix = buffer.store_frame(frame.view())?;
        let effect = sim.step(policy_rng.usize(..config.action_dim), config.action_dim);
        buffer.store_effect(ix, &effect)?;

        if step % args.train_interval != 0 || !buffer.can_sample(args.batch_size) {
            continue;
        }

        let (batch, ixs) = match buffer.sample(args.batch_size, args.sample_early) {
            Ok(sampled) => sampled,
            Err(e @ MpcError::SamplingExhausted { .. }) => {
                warn!("Skip optimization at step {}: {}", step, e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let stats = frame_stats.compute_stats()?;
        let obs = stats.normalize(batch.obs.view())?;
        let (output, _) = model.predict(obs.view(), batch.action.view(), None)?;
        let losses = prediction_loss(&batch, &output)?;
        buffer.store_loss(&losses, &ixs)?;

        let loss = losses.iter().sum::<f32>() / losses.len() as f32;
        recorder.store(buffer.record().merge(Record::from_scalar("loss", loss)));
        recorder.flush(step as i64);
    }

    info!(
        "Stored {} steps, {} episode ends",
        buffer.len(),
        buffer.num_terminal_flags()
    );
    Ok(recorder)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    run(&args)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mpc_core::record::RecordValue;
    use tempdir::TempDir;

    fn args() -> Args {
        Args {
            config: None,
            capacity: 400,
            horizon: 3,
            frame_history_len: 2,
            action_dim: 5,
            batch_size: 4,
            steps: 800,
            train_interval: 50,
            sample_early: false,
            seed: 0,
        }
    }

    #[test]
    fn test_synthetic_driving() -> Result<()> {
        let recorder = run(&args())?;
        assert!(!recorder.is_empty());
        for record in recorder.iter() {
            assert!(record.get_scalar("loss")?.is_finite());
            assert!(record.get_scalar("len")? <= 400.0);
        }
        Ok(())
    }

    #[test]
    fn test_synthetic_driving_with_config_file() -> Result<()> {
        let dir = TempDir::new("synthetic_driving")?;
        let path = dir.path().join("buffer.yaml");
        TrajectoryBufferConfig::default()
            .capacity(300)
            .horizon(2)
            .action_dim(3)
            .save(&path)?;

        let args = Args {
            config: Some(path.to_string_lossy().into_owned()),
            steps: 600,
            ..args()
        };
        let recorder = run(&args)?;
        let last = recorder.iter().last().map(|r| r.get("capacity").cloned());
        assert_eq!(last, Some(Some(RecordValue::Scalar(300.0))));
        Ok(())
    }
}
