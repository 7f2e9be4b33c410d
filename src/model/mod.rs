pub mod result;
pub mod step;

pub use result::{
    format_size, target_bytes, CompressionResult, STEP_ALREADY_UNDER_TARGET, STEP_NONE,
};
pub use step::{step_index, CompressionStep, LADDER};
