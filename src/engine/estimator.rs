use crate::backend::BackendKind;
use crate::model::LADDER;

/// Upper bounds on the needed compression ratio for ladder steps 0..=4.
/// Anything at or above the last bound starts at the final step.
const EXTERNAL_THRESHOLDS: [f64; 5] = [3.0, 5.0, 8.0, 12.0, 20.0];
const FALLBACK_THRESHOLDS: [f64; 5] = [1.5, 2.0, 3.0, 4.0, 5.0];

/// Pick the first ladder index worth trying.
///
/// Starting too low wastes attempts that are known to fail; starting too
/// high sacrifices quality. The walk continues upward from here, so an
/// underestimate only costs extra attempts.
pub fn estimate_start(original_size: u64, target_size: u64, kind: BackendKind) -> usize {
    if target_size >= original_size {
        return 0;
    }
    let last = LADDER.len() - 1;
    if target_size == 0 {
        return last;
    }

    let ratio_needed = original_size as f64 / target_size as f64;
    let thresholds = match kind {
        BackendKind::External => &EXTERNAL_THRESHOLDS,
        BackendKind::Fallback => &FALLBACK_THRESHOLDS,
    };

    thresholds
        .iter()
        .position(|&bound| ratio_needed < bound)
        .unwrap_or(last)
}
