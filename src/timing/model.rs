// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use hifitime::Epoch;

/// A fittable model parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Param {
    pub value: f64,

    /// The 1-sigma uncertainty from the last fit (or from the par file).
    pub uncertainty: Option<f64>,

    /// Is this parameter fit for?
    pub free: bool,
}

impl Param {
    pub fn frozen(value: f64) -> Param {
        Param {
            value,
            uncertainty: None,
            free: false,
        }
    }

    pub fn free(value: f64) -> Param {
        Param {
            value,
            uncertainty: None,
            free: true,
        }
    }
}

/// A pulsar spin-down timing model. The pulse phase at a time `t` is
///
/// φ(t) = F0 dt + F1 dt² / 2, where dt = t - PEPOCH.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingModel {
    /// The name of the pulsar.
    pub name: String,

    /// Spin frequency \[Hz\].
    pub f0: Param,

    /// Spin-down \[Hz/s\].
    pub f1: Param,

    /// The epoch the spin parameters are referenced to.
    pub pepoch: Epoch,

    /// Par-file lines that aren't part of the spin model, kept verbatim so
    /// they can be written out again.
    pub other_lines: Vec<String>,
}

/// The parameters of a [`TimingModel`] that can be fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SpinParam {
    F0,
    F1,
}

impl TimingModel {
    pub fn new(name: impl Into<String>, f0: Param, f1: Param, pepoch: Epoch) -> TimingModel {
        TimingModel {
            name: name.into(),
            f0,
            f1,
            pepoch,
            other_lines: vec![],
        }
    }

    /// Mark the spin frequency and spin-down as free. Nothing else changes.
    pub fn thaw_spin(&mut self) {
        self.f0.free = true;
        self.f1.free = true;
    }

    pub fn num_free_params(&self) -> usize {
        self.free_params().len()
    }

    pub(crate) fn free_params(&self) -> Vec<SpinParam> {
        [SpinParam::F0, SpinParam::F1]
            .into_iter()
            .filter(|&p| self.param(p).free)
            .collect()
    }

    pub(crate) fn param(&self, p: SpinParam) -> &Param {
        match p {
            SpinParam::F0 => &self.f0,
            SpinParam::F1 => &self.f1,
        }
    }

    pub(crate) fn param_mut(&mut self, p: SpinParam) -> &mut Param {
        match p {
            SpinParam::F0 => &mut self.f0,
            SpinParam::F1 => &mut self.f1,
        }
    }

    /// Seconds since PEPOCH.
    pub(crate) fn dt(&self, epoch: Epoch) -> f64 {
        (epoch - self.pepoch).to_seconds()
    }

    /// The pulse phase `dt_s` seconds after PEPOCH \[turns\].
    pub(crate) fn phase(&self, dt_s: f64) -> f64 {
        self.f0.value * dt_s + 0.5 * self.f1.value * dt_s * dt_s
    }
}

impl SpinParam {
    /// The derivative of the phase with respect to this parameter.
    pub(crate) fn phase_derivative(self, dt_s: f64) -> f64 {
        match self {
            SpinParam::F0 => dt_s,
            SpinParam::F1 => 0.5 * dt_s * dt_s,
        }
    }
}
