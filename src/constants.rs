// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Useful constants.

All constants *must* be double precision.
 */

/// The first line of every tim file we write.
pub const TIM_FORMAT_MARKER: &str = "FORMAT 1";

/// The clock offset written into tim files unless told otherwise [seconds].
pub const DEFAULT_CLOCK_OFFSET: &str = "+1.0";

/// TOAs with residuals more than this many (trimmed) standard deviations from
/// zero are zapped.
pub const DEFAULT_N_SIGMA: f64 = 6.0;

/// TOAs with uncertainties larger than this are not used in fits \[us\].
pub const DEFAULT_MAX_UNCERTAINTY_US: f64 = 3.0;

/// Below this many TOAs, the trimmed standard deviation used for zapping isn't
/// meaningful and zapping is skipped.
pub const MIN_ZAP_SAMPLE: usize = 10;

/// The fraction of sorted residuals discarded from each end before
/// calculating the robust standard deviation.
pub const ZAP_TRIM_FRACTION: f64 = 0.1;

/// The dispersion constant \[MHz^2 pc^-1 cm^3 s\].
pub const DISPERSION_CONSTANT: f64 = 4.148808e3;

/// The number of seconds in a day.
pub const SECONDS_PER_DAY: f64 = 86400.0;

/// The maximum number of Gauss-Newton iterations the spin fitter will take.
pub const MAX_FIT_ITERATIONS: usize = 20;

/// The spin fitter has converged when the reduced chi-squared changes by less
/// than this (relative) amount.
pub const FIT_CONVERGENCE_TOLERANCE: f64 = 1e-10;
