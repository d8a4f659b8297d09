use anyhow::Result;
use mpc_core::{
    dummy::DummyDynamicsModel,
    error::MpcError,
    frame_stats::{FrameStatsAccumulator, FrameStatsConfig},
    trajectory_buffer::{PriorityConfig, StepEffect, TrajectoryBufferConfig, TrajectoryRingBuffer},
    util::prediction_loss,
    DynamicsModel,
};
use ndarray::{ArrayD, IxDyn};

fn store_steps(
    buffer: &mut TrajectoryRingBuffer,
    rng: &mut fastrand::Rng,
    n: usize,
    terminal: impl Fn(usize) -> bool,
) -> Result<()> {
    let action_dim = buffer.action_dim();
    for step in 0..n {
        let frame = ArrayD::from_shape_fn(IxDyn(&[6, 6, 3]), |_| rng.u8(..));
        let ix = buffer.store_frame(frame.view())?;
        let effect = StepEffect {
            action: rng.usize(..action_dim),
            terminal: terminal(step),
            collision: rng.f32() < 0.1,
            offroad: rng.f32() < 0.1,
            speed: rng.f32() * 8.0,
            angle: rng.f32() - 0.5,
            position: rng.f32() * 2.0 - 1.0,
        };
        buffer.store_effect(ix, &effect)?;
    }
    Ok(())
}

// First slot of the history of `ix` and last slot of its horizon
fn window(ix: usize, frame_history_len: usize, horizon: usize) -> (usize, usize) {
    ((ix + 1).saturating_sub(frame_history_len), ix + horizon)
}

#[test]
fn test_small_buffer_with_terminal() -> Result<()> {
    let config = TrajectoryBufferConfig::default()
        .capacity(20)
        .frame_history_len(3)
        .horizon(2)
        .action_dim(4);
    let mut buffer = TrajectoryRingBuffer::new(&config)?;
    let mut rng = fastrand::Rng::with_seed(7);
    store_steps(&mut buffer, &mut rng, 20, |step| step == 12)?;

    assert!(buffer.can_sample(9));
    assert!(!buffer.can_sample(10));

    // With margins of 10 at both ends no start index is left
    for _ in 0..5 {
        assert!(matches!(
            buffer.sample(1, false),
            Err(MpcError::SamplingExhausted {
                requested: 1,
                available: 0
            })
        ));
    }
    Ok(())
}

#[test]
fn test_samples_never_cross_terminals() -> Result<()> {
    let (hist, horizon) = (3, 2);
    let config = TrajectoryBufferConfig::default()
        .capacity(20)
        .frame_history_len(hist)
        .horizon(horizon)
        .action_dim(4)
        .priority(PriorityConfig::default().edge_margin(1));
    let mut buffer = TrajectoryRingBuffer::new(&config)?;
    let mut rng = fastrand::Rng::with_seed(11);
    store_steps(&mut buffer, &mut rng, 20, |step| step == 12)?;

    let mut seen = vec![false; 20];
    for _ in 0..500 {
        let (batch, ixs) = buffer.sample(1, false)?;
        // No episode end within the horizon counted from the first history frame
        let (first, _) = window(ixs[0], hist, horizon);
        assert!(!(first..(first + horizon)).contains(&12), "ix={}", ixs[0]);
        assert_eq!(batch.obs.shape(), &[1, horizon, 3 * hist, 6, 6]);
        seen[ixs[0]] = true;
    }
    // Starts before and after the episode end are both drawn
    assert!(seen[..12].iter().any(|&s| s));
    assert!(seen[13..].iter().any(|&s| s));
    Ok(())
}

#[test]
fn test_sampling_after_wraparound() -> Result<()> {
    let (hist, horizon) = (4, 5);
    let config = TrajectoryBufferConfig::default()
        .capacity(500)
        .frame_history_len(hist)
        .horizon(horizon)
        .action_dim(6)
        .seed(3);
    let mut buffer = TrajectoryRingBuffer::new(&config)?;
    let mut rng = fastrand::Rng::with_seed(5);
    store_steps(&mut buffer, &mut rng, 1234, |step| step % 97 == 96)?;
    assert!(buffer.is_full());

    // The slot after the newest one holds the oldest step
    let cursor = (buffer.last_written_index().unwrap() + 1) % 500;
    for _ in 0..100 {
        let (batch, ixs) = buffer.sample(16, false)?;
        assert_eq!(batch.len(), 16);
        let mut unique = ixs.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), 16);

        for &ix in ixs.iter() {
            assert!(buffer.is_valid_start(ix));
            let (first, last) = window(ix, hist, horizon);
            assert!(!(first < cursor && cursor <= last));
        }
    }
    Ok(())
}

#[test]
fn test_training_round_trip() -> Result<()> {
    let config = TrajectoryBufferConfig::default()
        .capacity(300)
        .frame_history_len(2)
        .horizon(4)
        .action_dim(5);
    let mut buffer = TrajectoryRingBuffer::new(&config)?;
    let mut frame_stats = FrameStatsAccumulator::new(
        &FrameStatsConfig::default()
            .capacity(300)
            .frame_history_len(2),
    )?;

    let mut rng = fastrand::Rng::with_seed(13);
    for step in 0..300 {
        let frame = ArrayD::from_shape_fn(IxDyn(&[6, 6, 3]), |_| rng.u8(..));
        frame_stats.append(frame.view())?;
        let ix = buffer.store_frame(frame.view())?;
        let effect = StepEffect {
            action: step % 5,
            terminal: step % 50 == 49,
            speed: 2.0,
            ..StepEffect::default()
        };
        buffer.store_effect(ix, &effect)?;
    }

    let (batch, ixs) = buffer.sample(8, false)?;
    let stats = frame_stats.compute_stats()?;
    let obs = stats.normalize(batch.obs.view())?;
    let mut model = DummyDynamicsModel::new(8);
    let (output, _) = model.predict(obs.view(), batch.action.view(), None)?;
    let losses = prediction_loss(&batch, &output)?;
    assert_eq!(losses.len(), 8);

    buffer.store_loss(&losses, &ixs)?;
    for (&ix, &loss) in ixs.iter().zip(losses.iter()) {
        let expected = (1000.0 + loss) / 2.0;
        assert!((buffer.loss_priority(ix).unwrap() - expected).abs() < 1e-3);
    }
    Ok(())
}
