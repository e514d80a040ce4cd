// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! liberty2tech — liberty timing-library to technology-mapping converter.
//!
//! Reads a standard-cell timing library in the liberty (.lib) format and
//! writes the two table files a technology mapper and gate sizer consume: a
//! genlib-style technology library (cell functions plus pin loading) and a
//! gate-sizing configuration (a linear drive model per cell fitted from its
//! rise-delay lookup table).
//!
//! # Pipeline
//!
//! ```text
//! liberty text
//!   → TokenScanner     (lexer — comment- and continuation-aware tokens)
//!   → Library          (liberty_parser — cells, pins, lookup-table templates)
//!   → DriveParams      (sizing — ps/fF slope and intrinsic cap per cell)
//!   → gate.cfg + genlib (emit — the two output writers)
//! ```
//!
//! # Key modules
//!
//! - [`lexer`] — token scanner over line-buffered liberty text
//! - [`liberty_parser`] — state-machine parser building the cell registry
//! - [`function`] — liberty Boolean expressions rewritten into genlib form
//! - [`sizing`] — derived drive parameters and per-pin load limits
//! - [`emit`] — gate-sizing config and technology-library writers

pub mod lexer;

pub mod function;

pub mod liberty_parser;

pub mod sizing;

pub mod emit;
