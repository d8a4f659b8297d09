//! Reward priority and sampling weights.
//!
//! The per-step signal rewards driving fast along the road direction and
//! penalizes heading error and lateral deviation from the lane center:
//!
//! $r = v \left(\cos\theta - |\sin\theta| - |p| / s\right)$
//!
//! where $v$ is the speed, $\theta$ the angle to the road, $p$ the lateral
//! position and $s$ a position scale. Summed over a window it is the reward
//! priority used as sampling prior; pointwise it is the distance target of the
//! dynamics model.
use super::PriorityConfig;
use std::ops::Range;

/// Directional progress of a single step.
#[inline]
pub fn progress(speed: f32, angle: f32, position: f32, position_scale: f32) -> f32 {
    speed * (angle.cos() - angle.sin().abs() - (position / position_scale).abs())
}

/// Slots aggregated when the outcome of slot `idx` is stored.
///
/// The window ends at `idx` and is clipped at slot 0. Its first slot receives
/// the aggregated priority.
pub fn reward_window(idx: usize, window_len: usize) -> Range<usize> {
    let start = (idx + 1).saturating_sub(window_len);
    start..(idx + 1)
}

/// Reward priority of a window of steps.
pub fn window_reward(speed: &[f32], angle: &[f32], position: &[f32], config: &PriorityConfig) -> f32 {
    debug_assert!(speed.len() == angle.len() && angle.len() == position.len());
    speed
        .iter()
        .zip(angle.iter())
        .zip(position.iter())
        .map(|((&v, &a), &p)| progress(v, a, p, config.reward_position_scale))
        .sum::<f32>()
        / config.reward_speed_scale
}

/// Distance target of a single step.
#[inline]
pub fn distance(speed: f32, angle: f32, position: f32, config: &PriorityConfig) -> f32 {
    progress(speed, angle, position, config.distance_position_scale)
}

/// Unnormalized sampling weight of a reward priority.
///
/// Priorities are shifted by the minimum of the candidate range so that the
/// argument of the log is at least `offset`.
#[inline]
pub fn sampling_weight(reward_priority: f32, min_priority: f32, offset: f32) -> f32 {
    (reward_priority - min_priority + offset).ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_4;

    #[test]
    fn test_progress() {
        // Aligned with the road, on the center line
        assert_eq!(progress(3.0, 0.0, 0.0, 9.0), 3.0);
        // Diagonal heading cancels forward progress
        assert!(progress(3.0, FRAC_PI_4, 0.0, 9.0).abs() < 1e-6);
        // Symmetric in heading and lateral sign
        assert!((progress(2.0, 0.3, 1.5, 9.0) - progress(2.0, -0.3, -1.5, 9.0)).abs() < 1e-6);
        assert!((progress(2.0, 0.0, 4.5, 9.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_reward_window() {
        assert_eq!(reward_window(0, 15), 0..1);
        assert_eq!(reward_window(9, 15), 0..10);
        assert_eq!(reward_window(14, 15), 0..15);
        assert_eq!(reward_window(30, 15), 16..31);
        assert_eq!(reward_window(30, 15).len(), 15);
    }

    #[test]
    fn test_window_reward() {
        let config = PriorityConfig::default();
        let speed = [4.0, 4.0];
        let angle = [0.0, 0.0];
        let position = [0.0, 9.0];
        // (4 + 4 * (1 - 1)) / 40
        assert!((window_reward(&speed, &angle, &position, &config) - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_sampling_weight_is_positive_and_monotone() {
        let w_min = sampling_weight(-3.0, -3.0, 2.0);
        assert!((w_min - 2f32.ln()).abs() < 1e-6);
        assert!(sampling_weight(5.0, -3.0, 2.0) > sampling_weight(4.0, -3.0, 2.0));
    }
}
