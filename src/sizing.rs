// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Gate-sizing parameters derived from the rise-delay tables.
//!
//! Each cell with a resolved lookup table gets a linear drive model fitted
//! from the corners of its values matrix: a delay-per-load slope and an
//! intrinsic capacitance. The model assumes ascending axes and reads the
//! minimum-transition row only.

use indexmap::IndexMap;

use crate::liberty_parser::{Cell, Library, LuTable};

/// The linear drive model of one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveParams {
    /// Delay per load capacitance, in ps/fF.
    pub load_delay: f64,
    /// Intrinsic (internal) capacitance, in fF.
    pub intrinsic_cap: f64,
    /// Rise time under minimum load, in ps.
    pub min_trans: f64,
}

/// Fit the drive model for one cell, or `None` when the cell has no resolved
/// table, no values matrix, or an axis or matrix too small for the template
/// geometry.
///
/// The capacitance axis is the cell-local override when present, else the
/// template's; the template's axis counts index it and the matrix either way.
pub fn drive_params(tables: &IndexMap<String, LuTable>, cell: &Cell) -> Option<DriveParams> {
    let table = tables.get(cell.table.as_deref()?)?;
    let values = cell.values.as_deref()?;
    let caps = cell.caps.as_deref().unwrap_or(&table.caps);
    let tsize = table.times.len();
    let csize = table.caps.len();
    if tsize == 0 || csize == 0 {
        return None;
    }
    let min_cap = *caps.first()?;
    let max_cap = *caps.get(csize - 1)?;
    // Rise times under minimum and maximum load, both at the smallest
    // transition-time index.
    let min_trise = *values.first()?;
    let max_trise = *values.get((csize - 1) * tsize)?;
    let load_delay = (max_trise - min_trise) / (max_cap - min_cap);
    let intrinsic_cap = (min_trise / load_delay) - min_cap;
    Some(DriveParams {
        load_delay,
        intrinsic_cap,
        min_trans: min_trise,
    })
}

/// Fit and store the drive model on every cell that has one. Cells without
/// a model keep their defaults and are later left out of the sizing output.
pub fn compute_drive_params(lib: &mut Library) {
    let Library { tables, cells, .. } = lib;
    for cell in cells.values_mut() {
        if let Some(params) = drive_params(tables, cell) {
            cell.slope = params.load_delay;
            cell.min_trans = params.min_trans;
        }
    }
}

/// Maximum load capacitance for the pin at `idx`, in fF.
///
/// A declared `max_capacitance` wins; a declared `max_transition` converts
/// through the cell's slope. Otherwise later-declared pins are searched for
/// a `max_capacitance`, then for a `max_transition`, the last usable value
/// winning in each pass. With no information anywhere the fallback is 24
/// times the first declared pin's capacitance, a load of roughly two dozen
/// gates.
pub fn effective_max_cap(cell: &Cell, idx: usize) -> f64 {
    let pin = &cell.pins[idx];
    if pin.max_cap != 0.0 {
        return pin.max_cap;
    }
    if pin.max_trans != 0.0 {
        return pin.max_trans / cell.slope;
    }
    let mut cap = 0.0;
    for later in &cell.pins[idx + 1..] {
        if later.max_cap != 0.0 {
            cap = later.max_cap;
        }
    }
    if cap == 0.0 {
        for later in &cell.pins[idx + 1..] {
            if later.max_trans != 0.0 {
                cap = later.max_trans / cell.slope;
            }
        }
    }
    if cap == 0.0 {
        cap = 24.0 * cell.pins[0].cap;
    }
    cap
}
