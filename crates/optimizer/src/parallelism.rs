//! The parallelism chooser (§4.7): computes a degree-of-parallelism for
//! time-series scans from row count, primary-tag cardinality, row width,
//! available RAM, and CPU count.

/// Tunables bounding the interpolation and the final clamp. Exposed as a
/// struct (rather than free constants) so callers running under different
/// cluster sizes can supply their own without a recompile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParallelismLimits {
    pub low_threshold: usize,
    pub high_threshold: usize,
    pub max_dop_low: usize,
    pub max_dop_high: usize,
}

impl Default for ParallelismLimits {
    fn default() -> Self {
        ParallelismLimits {
            low_threshold: 1_000,
            high_threshold: 1_000_000,
            max_dop_low: 1,
            max_dop_high: 64,
        }
    }
}

/// Inputs to the degree-of-parallelism computation (§4.7).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DopInputs {
    pub row_count: usize,
    pub primary_tag_count: usize,
    pub row_width: usize,
    pub available_free_memory: u64,
    pub cpu_core_count: usize,
}

/// Computes the degree of parallelism per §4.7 steps 1-5, taking the max
/// against `previous_dop` so the chosen value is monotone non-decreasing
/// across repeated calls within one planning pass.
pub fn choose_dop(inputs: DopInputs, limits: &ParallelismLimits, previous_dop: usize) -> usize {
    let dop = if inputs.row_count <= limits.low_threshold {
        limits.max_dop_low
    } else if inputs.row_count < limits.high_threshold {
        interpolate(inputs, limits)
    } else {
        inputs.primary_tag_count.max(1)
    };

    let mem_cap = memory_cap(inputs, dop);
    let final_dop = dop.min(inputs.cpu_core_count.max(1)).min(mem_cap.max(1));
    final_dop.max(previous_dop)
}

fn interpolate(inputs: DopInputs, limits: &ParallelismLimits) -> usize {
    if limits.high_threshold <= limits.low_threshold {
        return 2;
    }
    let span = (limits.high_threshold - limits.low_threshold) as f64;
    let position = (inputs.row_count - limits.low_threshold) as f64 / span;
    let interpolated = 2.0 + position * (inputs.primary_tag_count.max(2) as f64 - 2.0);
    (interpolated.round() as usize)
        .max(2)
        .min(limits.max_dop_high)
}

/// `available-free-memory / ((rowCount / dop) × rowWidth)` (§4.7 step 4).
fn memory_cap(inputs: DopInputs, dop: usize) -> usize {
    if dop == 0 || inputs.row_width == 0 {
        return usize::MAX;
    }
    let rows_per_worker = (inputs.row_count as f64) / (dop as f64);
    let bytes_per_worker = rows_per_worker * inputs.row_width as f64;
    if bytes_per_worker <= 0.0 {
        return usize::MAX;
    }
    ((inputs.available_free_memory as f64) / bytes_per_worker).floor() as usize
}
