/// Checked 256-bit arithmetic, rate multipliers and the fixed-point exponential.
pub mod fixed_point;
/// Newton solvers for `D`, `y` and the marginal price.
pub mod invariant;

#[cfg(test)]
mod proptest_properties;

pub use fixed_point::{CheckedMath, PRECISION, abs_diff, exp_neg_wad, rate_multiplier};
pub use invariant::{A_PRECISION, MAX_ITERATIONS, get_d, get_p, get_y, get_y_d};
