// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helper functions for averaging.


use std::ops::Range;

/// Calculate the number of subintegrations an observation of duration
/// `total_duration_s` should be averaged into so that each is approximately
/// `target_subint_s` long, while making sure there are at least `min_count`.
///
/// If `target_subint_s` isn't positive, no time averaging was requested and
/// `None` is returned; this is distinct from a plan of one subintegration.
///
/// The count is rounded up, not truncated, so a whole observation is always
/// covered: a 100 s observation split into 30 s pieces is 4 subintegrations.
pub fn plan_num_subints(
    total_duration_s: f64,
    target_subint_s: f64,
    min_count: usize,
) -> Option<usize> {
    if target_subint_s <= 0.0 || target_subint_s.is_nan() {
        return None;
    }

    let mut count = (total_duration_s / target_subint_s).floor() as usize;
    if (count as f64) * target_subint_s < total_duration_s {
        count += 1;
    }

    Some(count.max(min_count))
}

/// Split `num_in` contiguous things into `num_out` contiguous blocks that are
/// as even as possible. Earlier blocks get the spare elements. `num_out` must
/// be in `1..=num_in`.
pub(crate) fn contiguous_blocks(num_in: usize, num_out: usize) -> Vec<Range<usize>> {
    debug_assert!(num_out >= 1 && num_out <= num_in);
    let base = num_in / num_out;
    let extra = num_in % num_out;

    let mut start = 0;
    (0..num_out)
        .map(|i| {
            let len = base + usize::from(i < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}
