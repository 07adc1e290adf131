//! Scaling decision: hysteresis between two queue thresholds.
//!
//! Pure and deterministic: the same queue length, replica count and
//! config always yield the same decision.

use workerscale_core::ScalingConfig;

/// A single-step scaling action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalingDecision {
    pub target_replicas: u32,
    /// Which threshold was crossed, e.g. `queue 6 > 5`.
    pub reason: String,
}

/// Decide whether to move the replica count by one step.
///
/// Scale-up is checked first, so it wins when the thresholds overlap.
pub fn decide(
    queue_length: u64,
    current_replicas: u32,
    config: &ScalingConfig,
) -> Option<ScalingDecision> {
    let up = config.scale_up_threshold();
    let down = config.scale_down_threshold();

    if queue_length > up && current_replicas < config.max_replicas() {
        return Some(ScalingDecision {
            target_replicas: current_replicas.saturating_add(1).min(config.max_replicas()),
            reason: format!("queue {queue_length} > {up}"),
        });
    }

    if queue_length <= down && current_replicas > config.min_replicas() {
        return Some(ScalingDecision {
            target_replicas: (current_replicas - 1).max(config.min_replicas()),
            reason: format!("queue {queue_length} <= {down}"),
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ScalingConfig {
        // up=5, down=0, min=1, max=5
        ScalingConfig::new(1, 5, 5, 0).unwrap()
    }

    #[test]
    fn scale_up_one_step_above_threshold() {
        assert_eq!(
            decide(6, 2, &config()),
            Some(ScalingDecision {
                target_replicas: 3,
                reason: "queue 6 > 5".to_string(),
            })
        );
    }

    #[test]
    fn no_scale_down_below_min() {
        assert_eq!(decide(0, 1, &config()), None);
    }

    #[test]
    fn no_scale_up_at_max() {
        assert_eq!(decide(20, 5, &config()), None);
    }

    #[test]
    fn dead_band_is_quiet() {
        assert_eq!(decide(3, 3, &config()), None);
    }

    #[test]
    fn scale_down_one_step_at_threshold() {
        assert_eq!(
            decide(0, 4, &config()),
            Some(ScalingDecision {
                target_replicas: 3,
                reason: "queue 0 <= 0".to_string(),
            })
        );
    }

    #[test]
    fn huge_backlog_still_moves_one_step() {
        let decision = decide(10_000, 1, &config()).unwrap();
        assert_eq!(decision.target_replicas, 2);
    }

    #[test]
    fn threshold_itself_is_inside_dead_band() {
        // Scale-up needs strictly more than the threshold.
        assert_eq!(decide(5, 2, &config()), None);
    }

    #[test]
    fn targets_stay_within_bounds() {
        let config = ScalingConfig::new(2, 6, 4, 1).unwrap();
        for replicas in 2..=6 {
            for queue in 0..=12 {
                if let Some(d) = decide(queue, replicas, &config) {
                    assert!(d.target_replicas <= 6, "q={queue} r={replicas}");
                    assert!(d.target_replicas >= 2, "q={queue} r={replicas}");
                    assert_eq!(d.target_replicas.abs_diff(replicas), 1);
                }
            }
        }
    }

    #[test]
    fn dead_band_holds_for_every_replica_count() {
        let config = ScalingConfig::new(1, 10, 8, 2).unwrap();
        for replicas in 0..=12 {
            for queue in 3..=8 {
                assert_eq!(decide(queue, replicas, &config), None, "q={queue} r={replicas}");
            }
        }
    }

    #[test]
    fn deterministic() {
        let config = config();
        for queue in [0, 3, 6, 100] {
            for replicas in 1..=5 {
                assert_eq!(
                    decide(queue, replicas, &config),
                    decide(queue, replicas, &config)
                );
            }
        }
    }

    #[test]
    fn overlapping_thresholds_prefer_scale_up() {
        // down (5) >= up (3): queue 4 satisfies both conditions.
        let config = ScalingConfig::new(1, 5, 3, 5).unwrap();
        let decision = decide(4, 3, &config).unwrap();
        assert_eq!(decision.target_replicas, 4);
        assert_eq!(decision.reason, "queue 4 > 3");

        // At max, scale-up is impossible and scale-down applies.
        let decision = decide(4, 5, &config).unwrap();
        assert_eq!(decision.target_replicas, 4);
        assert_eq!(decision.reason, "queue 4 <= 5");
    }

    #[test]
    fn unreadable_replica_count_scales_up_from_zero() {
        // Zero replicas (the counter's fallback) with a backlog asks for one.
        assert_eq!(decide(9, 0, &config()).unwrap().target_replicas, 1);
        // But an empty queue never scales below the bound it is already under.
        assert_eq!(decide(0, 0, &config()), None);
    }

    #[test]
    fn above_max_steps_down_only_when_idle() {
        assert_eq!(decide(0, 7, &config()).unwrap().target_replicas, 6);
        assert_eq!(decide(20, 7, &config()), None);
    }
}
