// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Writers for the two output files: the gate-sizing configuration and the
//! genlib-style technology library.
//!
//! Both walk the cell registry in declaration order. Eligibility differs:
//! the sizing output wants a fitted drive model, the technology output wants
//! a Boolean function. Values print in their natural shortest form.

use std::io::{self, Write};

use crate::liberty_parser::{Library, PinDirection};
use crate::sizing::{drive_params, effective_max_cap};

const RULE: &str = "#----------------------------------------------------------------";

/// Match a cell name against a filter pattern: leading `^` anchors at the
/// start, trailing `$` at the end, both mean exact equality, neither means
/// substring containment.
pub fn pattern_match(name: &str, pattern: &str) -> bool {
    if let Some(p) = pattern.strip_prefix('^') {
        if let Some(p) = p.strip_suffix('$') {
            name == p
        } else {
            name.starts_with(p)
        }
    } else if let Some(p) = pattern.strip_suffix('$') {
        name.ends_with(p)
    } else {
        name.contains(pattern)
    }
}

/// Write the gate-sizing configuration (gate.cfg format).
///
/// One record per cell with a fitted drive model: name, delay per load,
/// input count, intrinsic capacitance, then the capacitance of every input
/// pin in declaration order.
pub fn write_sizing_config(lib: &Library, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "# comments begin with #")?;
    writeln!(out)?;
    writeln!(out, "# Format is propagation delay with internal and pin capacitances.")?;
    writeln!(out, "# Only format D0 is supported for now.")?;
    writeln!(out, "FORMAT D0")?;
    writeln!(out)?;
    writeln!(out, "{}", RULE)?;
    writeln!(out, "# Gate drive strength information for library {}", lib.name)?;
    writeln!(out, "{}", RULE)?;
    writeln!(out, "# \"delay\" is propagation delay in ps/fF of load capacitance")?;
    writeln!(out, "# \"Cint\", \"Cin1\", ... are all in fF.")?;
    writeln!(out, "{}", RULE)?;
    writeln!(out, "# This file generated by liberty2tech")?;
    writeln!(out)?;
    writeln!(out, "# gatename delay num_inputs Cint Cpin1 Cpin2...")?;
    writeln!(out)?;

    let mut count = 0usize;
    for cell in lib.cells.values() {
        let params = match drive_params(&lib.tables, cell) {
            Some(p) => p,
            None => continue,
        };
        write!(
            out,
            "{}  {} {} {}  ",
            cell.name,
            params.load_delay,
            cell.input_count(),
            params.intrinsic_cap
        )?;
        for pin in &cell.pins {
            if pin.direction == PinDirection::Input {
                write!(out, " {}", pin.cap)?;
            }
        }
        writeln!(out)?;
        count += 1;
    }
    writeln!(out, "# end of gate.cfg")?;
    clilog::info!("wrote {} gate sizing records", count);
    Ok(())
}

/// Write the technology-mapping library (genlib format).
///
/// One `GATE` per cell with a function, each followed by a `PIN` line per
/// input pin. With a pattern only matching cell names are listed; without
/// one, a cell whose function string equals the previously listed cell's is
/// taken for a drive-strength variant and skipped.
pub fn write_techlib(
    lib: &Library,
    out: &mut impl Write,
    pattern: Option<&str>,
) -> io::Result<()> {
    writeln!(out, "# Genlib file created by liberty2tech")?;
    if !lib.name.is_empty() {
        writeln!(out, "# from library {}", lib.name)?;
    }
    writeln!(out)?;

    let mut last_func: Option<&str> = None;
    let mut count = 0usize;
    for cell in lib.cells.values() {
        let func = match cell.function.as_deref() {
            Some(f) => f,
            None => continue,
        };
        match pattern {
            Some(p) => {
                if !pattern_match(&cell.name, p) {
                    continue;
                }
            }
            None => {
                if last_func == Some(func) {
                    continue;
                }
            }
        }
        last_func = Some(func);
        writeln!(out, "GATE {} {} {}", cell.name, cell.area, func)?;
        // Genlib wants pF and ns; rise and fall share the single linear
        // model, so the pair of (transition, slope) columns repeats.
        for (idx, pin) in cell.pins.iter().enumerate() {
            if pin.direction != PinDirection::Input {
                continue;
            }
            let max_cap = effective_max_cap(cell, idx);
            writeln!(
                out,
                "   PIN {} UNKNOWN {} {} {} {} {} {}",
                pin.name,
                pin.cap / 1000.0,
                max_cap / 1000.0,
                cell.min_trans / 1000.0,
                cell.slope,
                cell.min_trans / 1000.0,
                cell.slope
            )?;
        }
        writeln!(out)?;
        count += 1;
    }
    clilog::info!("wrote {} technology gates", count);
    Ok(())
}
