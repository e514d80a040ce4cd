// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Convert a liberty timing library into a genlib technology library and a
//! gate-sizing configuration table.
//!
//! Usage:
//!   cargo run -r --bin liberty2tech -- <input.lib> <output.genlib> <output.cfg> [pattern]

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::exit;

use liberty2tech::emit::{write_sizing_config, write_techlib};
use liberty2tech::liberty_parser::Library;
use liberty2tech::sizing::compute_drive_params;

#[derive(clap::Parser, Debug)]
#[command(name = "liberty2tech")]
#[command(about = "Convert a liberty timing library to technology-mapping and gate-sizing tables")]
struct Args {
    /// Liberty (.lib) timing library to read.
    liberty: PathBuf,

    /// Technology library (genlib) output path.
    techlib: PathBuf,

    /// Gate-sizing configuration output path.
    config: PathBuf,

    /// Cell name filter for the technology library: leading `^` anchors the
    /// start, trailing `$` the end, otherwise substring containment.
    pattern: Option<String>,
}

fn main() {
    clilog::init_stderr_color_debug();

    let args = match <Args as clap::Parser>::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                e.exit()
            }
            _ => {
                let _ = e.print();
                exit(1);
            }
        },
    };

    let mut lib = match Library::from_file(&args.liberty) {
        Ok(lib) => lib,
        Err(e) => {
            clilog::error!("{}", e);
            exit(1);
        }
    };

    compute_drive_params(&mut lib);

    clilog::info!("writing gate sizing config to {}", args.config.display());
    if let Err(e) = write_output(&args.config, |out| write_sizing_config(&lib, out)) {
        clilog::error!("cannot write {}: {}", args.config.display(), e);
        exit(1);
    }

    clilog::info!("writing technology library to {}", args.techlib.display());
    if let Err(e) = write_output(&args.techlib, |out| {
        write_techlib(&lib, out, args.pattern.as_deref())
    }) {
        clilog::error!("cannot write {}: {}", args.techlib.display(), e);
        exit(1);
    }
}

fn write_output(
    path: &Path,
    write: impl FnOnce(&mut BufWriter<File>) -> io::Result<()>,
) -> io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write(&mut out)?;
    out.flush()
}
