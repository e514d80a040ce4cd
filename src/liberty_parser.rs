// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Liberty (.lib) parser for standard-cell timing libraries.
//!
//! Builds the library → cell → pin entity graph plus the named lookup-table
//! templates that cells reference for their rise-delay tables. The parser is
//! a small state machine over the token stream: it models only the subset
//! needed for technology mapping and gate sizing (cell functions, pin
//! capacitances and limits, the `cell_rise` table of the rise arc) and skips
//! everything else without losing its place in the block structure.
//!
//! Recoverable problems are logged and parsing continues best-effort; only a
//! handful of conditions abort the run (see [`LibertyError`]).

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use indexmap::IndexMap;

use crate::function::translate_function;
use crate::lexer::TokenScanner;

/// Errors that abort a conversion run.
#[derive(Debug)]
pub enum LibertyError {
    /// The input file could not be opened.
    Io(String),
    /// The library declares a delay model other than `table_lookup`.
    UnsupportedDelayModel(String),
    /// The `library(...)` head is not followed by an opening brace.
    MissingLibraryBrace,
    /// The input ended in the middle of a clause the parser was committed to.
    UnexpectedEof,
}

impl fmt::Display for LibertyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibertyError::Io(msg) => write!(f, "{}", msg),
            LibertyError::UnsupportedDelayModel(model) => {
                write!(f, "unsupported delay model \"{}\", only table_lookup is handled", model)
            }
            LibertyError::MissingLibraryBrace => {
                write!(f, "did not find opening brace on library block")
            }
            LibertyError::UnexpectedEof => write!(f, "unexpected end of file"),
        }
    }
}

impl std::error::Error for LibertyError {}

/// Pin direction as declared in the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PinDirection {
    #[default]
    Unknown,
    Input,
    Output,
}

/// A 2-axis lookup-table template (`lu_table_template`).
///
/// One axis holds output-net capacitance, the other input-net transition
/// time. `invert` records which liberty index is which: true when
/// `variable_1` is the capacitance axis. Axis values are stored already
/// scaled to fF and ps; both axes are assumed ascending (never validated).
#[derive(Debug, Clone, Default)]
pub struct LuTable {
    /// Template name, as referenced by `cell_rise(...)`.
    pub name: String,
    /// True when `variable_1` is the capacitance axis.
    pub invert: bool,
    /// Transition-time axis, in ps.
    pub times: Vec<f64>,
    /// Capacitance axis, in fF.
    pub caps: Vec<f64>,
}

/// A single pin of a cell.
#[derive(Debug, Clone, Default)]
pub struct Pin {
    /// Pin name.
    pub name: String,
    /// Declared direction; unknown when absent or unrecognized.
    pub direction: PinDirection,
    /// Pin capacitance in fF (0 when undeclared).
    pub cap: f64,
    /// Maximum transition time in ps (0 when undeclared).
    pub max_trans: f64,
    /// Maximum load capacitance in fF (0 when undeclared).
    pub max_cap: f64,
}

/// A standard cell.
///
/// Pins keep declaration order; the sizing heuristics depend on it. The
/// rise-delay data is the referenced template (by name), the optional
/// cell-local axis overrides, and the flattened values matrix, stored
/// row-major with offset `cap_index * time_count + time_index`.
#[derive(Debug, Clone, Default)]
pub struct Cell {
    /// Cell name.
    pub name: String,
    /// Translated Boolean function (`"<out> = <expr>;"`), from the output pin.
    pub function: Option<String>,
    /// Pins in declaration order.
    pub pins: Vec<Pin>,
    /// Cell area; 1 when undeclared.
    pub area: f64,
    /// Derived delay per load in ps/fF; 1 until computed.
    pub slope: f64,
    /// Derived minimum transition time in ps; 0 until computed.
    pub min_trans: f64,
    /// Name of the referenced lookup-table template, if one resolved.
    pub table: Option<String>,
    /// Cell-local override of the transition-time axis, in ps.
    pub times: Option<Vec<f64>>,
    /// Cell-local override of the capacitance axis, in fF.
    pub caps: Option<Vec<f64>>,
    /// Rise-delay values matrix in ps, row-major `[cap][time]`.
    pub values: Option<Vec<f64>>,
}

impl Cell {
    fn new(name: String) -> Self {
        Cell {
            name,
            area: 1.0,
            slope: 1.0,
            ..Cell::default()
        }
    }

    /// Number of input pins.
    pub fn input_count(&self) -> usize {
        self.pins
            .iter()
            .filter(|p| p.direction == PinDirection::Input)
            .count()
    }
}

/// A parsed timing library: the unit multipliers, the lookup-table templates
/// and the cells, both in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Library {
    /// Library name (may be empty when the head was malformed).
    pub name: String,
    /// Multiplier taking declared time values to ps.
    pub time_unit: f64,
    /// Multiplier taking declared capacitance values to fF.
    pub cap_unit: f64,
    /// Lookup-table templates, keyed by name.
    pub tables: IndexMap<String, LuTable>,
    /// Cells, keyed by name.
    pub cells: IndexMap<String, Cell>,
}

impl Library {
    /// Parse a liberty library from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LibertyError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| LibertyError::Io(format!("cannot open {}: {}", path.display(), e)))?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parse a liberty library from in-memory text.
    pub fn parse(content: &str) -> Result<Self, LibertyError> {
        Self::from_reader(content.as_bytes())
    }

    /// Parse a liberty library from any buffered reader.
    pub fn from_reader(source: impl BufRead) -> Result<Self, LibertyError> {
        LibertyParser::new(source).run()
    }
}

/// Parser state: which block of the hierarchy the cursor is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Init,
    LibraryBlock,
    CellDef,
    PinDef,
    TimingBlock,
}

struct LibertyParser<R> {
    scan: TokenScanner<R>,
    name: String,
    time_unit: f64,
    cap_unit: f64,
    tables: IndexMap<String, LuTable>,
    cells: IndexMap<String, Cell>,
    cur_cell: Option<Cell>,
    cur_pin: Option<Pin>,
}

impl<R: BufRead> LibertyParser<R> {
    fn new(source: R) -> Self {
        LibertyParser {
            scan: TokenScanner::new(source),
            name: String::new(),
            time_unit: 1.0,
            cap_unit: 1.0,
            tables: IndexMap::new(),
            cells: IndexMap::new(),
            cur_cell: None,
            cur_pin: None,
        }
    }

    fn run(mut self) -> Result<Library, LibertyError> {
        let mut state = ParseState::Init;
        while let Some(token) = self.scan.next_token(None) {
            state = match state {
                ParseState::Init => self.handle_init(&token)?,
                ParseState::LibraryBlock => self.handle_library(&token)?,
                ParseState::CellDef => self.handle_cell(&token)?,
                ParseState::PinDef => self.handle_pin(&token)?,
                ParseState::TimingBlock => self.handle_timing(&token)?,
            };
        }
        // A truncated file still yields whatever was parsed so far.
        self.finish_cell();
        clilog::info!("processed {} liberty lines", self.scan.line_no());
        Ok(Library {
            name: self.name,
            time_unit: self.time_unit,
            cap_unit: self.cap_unit,
            tables: self.tables,
            cells: self.cells,
        })
    }

    /// Next token, or a fatal error: used inside clauses whose shape the
    /// parser has committed to.
    fn tok(&mut self) -> Result<String, LibertyError> {
        self.scan.next_token(None).ok_or(LibertyError::UnexpectedEof)
    }

    fn tok_delim(&mut self, delimiter: char) -> Result<String, LibertyError> {
        self.scan
            .next_token(Some(delimiter))
            .ok_or(LibertyError::UnexpectedEof)
    }

    /// Read the token expected to be `:`, diagnosing anything else.
    fn expect_colon(&mut self) -> Result<(), LibertyError> {
        let t = self.tok()?;
        if t != ":" {
            clilog::warn!(
                "line {}: expected ':', got \"{}\"",
                self.scan.line_no(),
                t
            );
        }
        Ok(())
    }

    /// Consume the remainder of the current statement through its `;`.
    fn consume_statement(&mut self) -> Result<(), LibertyError> {
        self.tok_delim(';').map(|_| ())
    }

    /// Skip an unmodeled construct: tokens through the statement terminator,
    /// or a whole block when an opener shows up first. Quoted strings are
    /// consumed opaquely; end of input just ends the skip.
    fn generic_skip(&mut self) -> Result<(), LibertyError> {
        loop {
            let t = match self.scan.next_token(None) {
                Some(t) => t,
                None => return Ok(()),
            };
            if t == ";" {
                return Ok(());
            }
            if t == "\"" {
                if self.scan.next_token(Some('"')).is_none() {
                    return Ok(());
                }
                continue;
            }
            if t == "{" {
                let _ = self.scan.next_token(Some('}'));
                return Ok(());
            }
        }
    }

    fn handle_init(&mut self, token: &str) -> Result<ParseState, LibertyError> {
        if !token.eq_ignore_ascii_case("library") {
            clilog::warn!(
                "line {}: unknown input \"{}\", looking for \"library\"",
                self.scan.line_no(),
                token
            );
            return Ok(ParseState::Init);
        }
        let mut name = self.tok()?;
        if name == "(" {
            name = self.tok_delim(')')?;
        } else {
            clilog::warn!(
                "line {}: library keyword not followed by a name",
                self.scan.line_no()
            );
        }
        clilog::info!("parsing library \"{}\"", name);
        let brace = self.tok()?;
        if brace != "{" {
            return Err(LibertyError::MissingLibraryBrace);
        }
        self.name = name;
        Ok(ParseState::LibraryBlock)
    }

    fn handle_library(&mut self, token: &str) -> Result<ParseState, LibertyError> {
        if token == "}" {
            clilog::info!("end of library at line {}", self.scan.line_no());
            return Ok(ParseState::Init);
        }
        if token.eq_ignore_ascii_case("delay_model") {
            self.expect_colon()?;
            let model = self.tok_delim(';')?;
            if !model.eq_ignore_ascii_case("table_lookup") {
                return Err(LibertyError::UnsupportedDelayModel(model));
            }
        } else if token.eq_ignore_ascii_case("lu_table_template") {
            self.parse_template()?;
        } else if token.eq_ignore_ascii_case("cell") {
            return self.start_cell();
        } else if token.eq_ignore_ascii_case("time_unit") {
            self.parse_time_unit()?;
        } else if token.eq_ignore_ascii_case("capacitive_load_unit") {
            self.parse_cap_unit()?;
        } else {
            self.generic_skip()?;
        }
        Ok(ParseState::LibraryBlock)
    }

    /// Parse `lu_table_template(name) { variable_1/2, index_1/2 }` and
    /// register it. The first template under a given name wins.
    fn parse_template(&mut self) -> Result<(), LibertyError> {
        let mut tok = self.tok()?;
        if tok == "(" {
            tok = self.tok_delim(')')?;
        } else {
            clilog::warn!(
                "line {}: lu_table_template missing open parenthesis",
                self.scan.line_no()
            );
        }
        let mut table = LuTable {
            name: tok,
            ..LuTable::default()
        };
        loop {
            let t = self.tok()?;
            if t == "}" {
                break;
            }
            if t.eq_ignore_ascii_case("variable_1") {
                self.expect_colon()?;
                let var = self.tok_delim(';')?;
                if var.contains("capacitance") {
                    table.invert = true;
                }
            } else if t.eq_ignore_ascii_case("variable_2") {
                self.expect_colon()?;
                let var = self.tok_delim(';')?;
                if var.contains("transition") {
                    table.invert = true;
                }
            } else if t.eq_ignore_ascii_case("index_1") {
                let list = self.read_paren_list()?;
                let line = self.scan.line_no();
                if table.invert {
                    table.caps = parse_axis_list(&list, self.cap_unit, line);
                } else {
                    table.times = parse_axis_list(&list, self.time_unit, line);
                }
            } else if t.eq_ignore_ascii_case("index_2") {
                let list = self.read_paren_list()?;
                let line = self.scan.line_no();
                if table.invert {
                    table.times = parse_axis_list(&list, self.time_unit, line);
                } else {
                    table.caps = parse_axis_list(&list, self.cap_unit, line);
                }
            } else if t == "\"" {
                // Quoted text inside an unmodeled attribute.
                self.tok_delim('"')?;
            }
        }
        if self.tables.contains_key(&table.name) {
            clilog::warn!(
                "line {}: duplicate lu_table_template \"{}\" ignored",
                self.scan.line_no(),
                table.name
            );
        } else {
            self.tables.insert(table.name.clone(), table);
        }
        Ok(())
    }

    /// Read the `("v, v, ...")` argument of an `index_*` attribute and
    /// consume the rest of the statement. The list may be unquoted, in which
    /// case the next token stands as the list.
    fn read_paren_list(&mut self) -> Result<String, LibertyError> {
        let open = self.tok()?;
        if open != "(" {
            clilog::warn!(
                "line {}: index list missing open parenthesis",
                self.scan.line_no()
            );
        }
        let mut t = self.tok()?;
        if t == "\"" {
            t = self.tok_delim('"')?;
        }
        self.consume_statement()?;
        Ok(t)
    }

    fn parse_time_unit(&mut self) -> Result<(), LibertyError> {
        let mut tok = self.tok()?;
        if tok == ":" {
            tok = self.tok()?;
        }
        if tok == "\"" {
            tok = self.tok_delim('"')?;
        }
        match parse_float_prefix(&tok) {
            Some((value, rest)) => {
                let rest = rest.trim();
                let suffix = if !rest.is_empty() {
                    rest.to_string()
                } else {
                    let t = self.tok()?;
                    if t == ";" {
                        self.time_unit = value;
                        return Ok(());
                    }
                    t
                };
                let scale = match suffix.as_str() {
                    "ps" => 1.0,
                    "ns" => 1e3,
                    "us" => 1e6,
                    "fs" => 1e-3,
                    _ => {
                        clilog::warn!(
                            "line {}: don't understand time unit \"{}\"",
                            self.scan.line_no(),
                            tok
                        );
                        1.0
                    }
                };
                self.time_unit = value * scale;
            }
            None => {
                clilog::warn!(
                    "line {}: bad time_unit value \"{}\"",
                    self.scan.line_no(),
                    tok
                );
            }
        }
        self.consume_statement()
    }

    fn parse_cap_unit(&mut self) -> Result<(), LibertyError> {
        let mut tok = self.tok()?;
        if tok == "(" {
            tok = self.tok_delim(')')?;
        } else if tok == ":" {
            tok = self.tok()?;
            if tok == "\"" {
                tok = self.tok_delim('"')?;
            }
        }
        match parse_float_prefix(&tok) {
            Some((value, rest)) => {
                // The parenthesized form separates value and unit with a comma.
                let mut rest = rest.trim();
                if let Some(r) = rest.strip_prefix(',') {
                    rest = r.trim();
                }
                let suffix = if !rest.is_empty() {
                    rest.to_string()
                } else {
                    let t = self.tok()?;
                    if t == ";" {
                        self.cap_unit = value;
                        return Ok(());
                    }
                    t
                };
                let scale = if suffix.eq_ignore_ascii_case("ff") {
                    1.0
                } else if suffix.eq_ignore_ascii_case("af") {
                    1e-3
                } else if suffix.eq_ignore_ascii_case("pf") {
                    1e3
                } else if suffix.eq_ignore_ascii_case("nf") {
                    1e6
                } else if suffix.eq_ignore_ascii_case("uf") {
                    1e9
                } else {
                    clilog::warn!(
                        "line {}: don't understand capacitive unit \"{}\"",
                        self.scan.line_no(),
                        tok
                    );
                    1.0
                };
                self.cap_unit = value * scale;
            }
            None => {
                clilog::warn!(
                    "line {}: bad capacitive_load_unit value \"{}\"",
                    self.scan.line_no(),
                    tok
                );
            }
        }
        self.consume_statement()
    }

    fn start_cell(&mut self) -> Result<ParseState, LibertyError> {
        let mut tok = self.tok()?;
        if tok == "(" {
            tok = self.tok_delim(')')?;
        } else {
            clilog::warn!(
                "line {}: cell missing open parenthesis",
                self.scan.line_no()
            );
        }
        let brace = self.tok()?;
        if brace != "{" {
            clilog::warn!(
                "line {}: cell \"{}\" missing start of block",
                self.scan.line_no(),
                tok
            );
        }
        self.cur_cell = Some(Cell::new(tok));
        Ok(ParseState::CellDef)
    }

    fn handle_cell(&mut self, token: &str) -> Result<ParseState, LibertyError> {
        if token == "}" {
            self.finish_cell();
            return Ok(ParseState::LibraryBlock);
        }
        if token.eq_ignore_ascii_case("pin") {
            return self.start_pin();
        }
        if token.eq_ignore_ascii_case("area") {
            self.expect_colon()?;
            let value = self.tok_delim(';')?;
            match parse_float_prefix(&value) {
                Some((area, _)) => {
                    if let Some(cell) = self.cur_cell.as_mut() {
                        cell.area = area;
                    }
                }
                None => {
                    clilog::warn!(
                        "line {}: bad area value \"{}\"",
                        self.scan.line_no(),
                        value
                    );
                }
            }
        } else {
            self.generic_skip()?;
        }
        Ok(ParseState::CellDef)
    }

    fn start_pin(&mut self) -> Result<ParseState, LibertyError> {
        let mut tok = self.tok()?;
        if tok == "(" {
            tok = self.tok_delim(')')?;
        } else {
            clilog::warn!(
                "line {}: pin missing open parenthesis",
                self.scan.line_no()
            );
        }
        let brace = self.tok()?;
        if brace != "{" {
            clilog::warn!(
                "line {}: pin \"{}\" missing start of block",
                self.scan.line_no(),
                tok
            );
        }
        self.cur_pin = Some(Pin {
            name: tok,
            ..Pin::default()
        });
        Ok(ParseState::PinDef)
    }

    fn handle_pin(&mut self, token: &str) -> Result<ParseState, LibertyError> {
        if token == "}" {
            self.finish_pin();
            return Ok(ParseState::CellDef);
        }
        if token.eq_ignore_ascii_case("capacitance") {
            let value = self.numeric_field()?;
            if let (Some(v), Some(pin)) = (value, self.cur_pin.as_mut()) {
                pin.cap = v * self.cap_unit;
            }
        } else if token.eq_ignore_ascii_case("max_transition") {
            let value = self.numeric_field()?;
            if let (Some(v), Some(pin)) = (value, self.cur_pin.as_mut()) {
                pin.max_trans = v * self.time_unit;
            }
        } else if token.eq_ignore_ascii_case("max_capacitance") {
            let value = self.numeric_field()?;
            if let (Some(v), Some(pin)) = (value, self.cur_pin.as_mut()) {
                pin.max_cap = v * self.cap_unit;
            }
        } else if token.eq_ignore_ascii_case("direction") {
            self.expect_colon()?;
            let dir = self.tok_delim(';')?;
            if let Some(pin) = self.cur_pin.as_mut() {
                if dir.eq_ignore_ascii_case("input") {
                    pin.direction = PinDirection::Input;
                } else if dir.eq_ignore_ascii_case("output") {
                    pin.direction = PinDirection::Output;
                }
            }
        } else if token.eq_ignore_ascii_case("function") {
            self.parse_pin_function()?;
        } else if token.eq_ignore_ascii_case("timing") {
            let open = self.tok()?;
            if open == "(" {
                // Arguments, if any, are ignored.
                self.tok_delim(')')?;
            } else {
                clilog::warn!(
                    "line {}: timing missing open parenthesis",
                    self.scan.line_no()
                );
            }
            let brace = self.tok()?;
            if brace != "{" {
                clilog::warn!(
                    "line {}: timing missing start of block",
                    self.scan.line_no()
                );
            }
            return Ok(ParseState::TimingBlock);
        } else {
            self.generic_skip()?;
        }
        Ok(ParseState::PinDef)
    }

    /// Read a `: N ;` tail and return the numeric value, if one parses.
    fn numeric_field(&mut self) -> Result<Option<f64>, LibertyError> {
        self.expect_colon()?;
        let value = self.tok_delim(';')?;
        match parse_float_prefix(&value) {
            Some((v, _)) => Ok(Some(v)),
            None => {
                clilog::warn!(
                    "line {}: bad numeric value \"{}\"",
                    self.scan.line_no(),
                    value
                );
                Ok(None)
            }
        }
    }

    /// Parse `function : "expr" ;`. Only an output pin's function is kept,
    /// translated and attached to the owning cell; a later output pin
    /// overwrites an earlier one.
    fn parse_pin_function(&mut self) -> Result<(), LibertyError> {
        self.expect_colon()?;
        let mut expr = self.tok()?;
        if expr == "\"" {
            expr = self.tok_delim('"')?;
        }
        let translated = match self.cur_pin.as_ref() {
            Some(pin) if pin.direction == PinDirection::Output => {
                Some(translate_function(&pin.name, &expr))
            }
            _ => None,
        };
        if let (Some(func), Some(cell)) = (translated, self.cur_cell.as_mut()) {
            cell.function = Some(func);
        }
        let t = self.tok()?;
        if t != ";" {
            clilog::warn!("line {}: expected end of statement", self.scan.line_no());
        }
        Ok(())
    }

    fn handle_timing(&mut self, token: &str) -> Result<ParseState, LibertyError> {
        if token == "}" {
            return Ok(ParseState::PinDef);
        }
        if token.eq_ignore_ascii_case("cell_rise") {
            self.parse_cell_rise()?;
        } else {
            self.generic_skip()?;
        }
        Ok(ParseState::TimingBlock)
    }

    /// Parse a `cell_rise(template) { index_1/2, values }` block.
    ///
    /// The template resolved here governs the axis roles and sizes for this
    /// block's clauses; the cell keeps the first template that resolves. A
    /// literal `scalar` argument means no table, and the block's data
    /// clauses are consumed without being stored.
    fn parse_cell_rise(&mut self) -> Result<(), LibertyError> {
        let mut tok = self.tok()?;
        if tok == "(" {
            tok = self.tok_delim(')')?;
        }
        let mut current: Option<(bool, usize, usize)> = None;
        if !tok.eq_ignore_ascii_case("scalar") {
            match self
                .tables
                .get(&tok)
                .map(|t| (t.invert, t.times.len(), t.caps.len()))
            {
                Some(info) => {
                    current = Some(info);
                    if let Some(cell) = self.cur_cell.as_mut() {
                        if cell.table.is_none() {
                            cell.table = Some(tok.clone());
                        }
                    }
                }
                None => {
                    clilog::warn!(
                        "line {}: failed to find a valid table \"{}\"",
                        self.scan.line_no(),
                        tok
                    );
                }
            }
        }
        let brace = self.tok()?;
        if brace != "{" {
            clilog::warn!(
                "line {}: missing start of cell_rise block",
                self.scan.line_no()
            );
        }
        loop {
            let t = self.tok()?;
            if t == "}" {
                break;
            }
            if t.eq_ignore_ascii_case("index_1") {
                let list = self.read_paren_list()?;
                let line = self.scan.line_no();
                if let Some((invert, _, _)) = current {
                    let axis = if invert {
                        parse_axis_list(&list, self.cap_unit, line)
                    } else {
                        parse_axis_list(&list, self.time_unit, line)
                    };
                    if let Some(cell) = self.cur_cell.as_mut() {
                        if invert {
                            cell.caps = Some(axis);
                        } else {
                            cell.times = Some(axis);
                        }
                    }
                }
            } else if t.eq_ignore_ascii_case("index_2") {
                let list = self.read_paren_list()?;
                let line = self.scan.line_no();
                if let Some((invert, _, _)) = current {
                    let axis = if invert {
                        parse_axis_list(&list, self.time_unit, line)
                    } else {
                        parse_axis_list(&list, self.cap_unit, line)
                    };
                    if let Some(cell) = self.cur_cell.as_mut() {
                        if invert {
                            cell.times = Some(axis);
                        } else {
                            cell.caps = Some(axis);
                        }
                    }
                }
            } else if t.eq_ignore_ascii_case("values") {
                let open = self.tok()?;
                if open != "(" {
                    clilog::warn!(
                        "line {}: failed to find start of value table",
                        self.scan.line_no()
                    );
                }
                let body = self.tok_delim(')')?;
                let line = self.scan.line_no();
                if let Some((invert, tsize, csize)) = current {
                    if tsize > 0 && csize > 0 {
                        let values =
                            parse_values(&body, invert, tsize, csize, self.time_unit, line);
                        if let Some(cell) = self.cur_cell.as_mut() {
                            cell.values = Some(values);
                        }
                    }
                }
                let semi = self.tok()?;
                if semi != ";" {
                    clilog::warn!(
                        "line {}: failed to find end of value table",
                        self.scan.line_no()
                    );
                }
            } else {
                self.generic_skip()?;
            }
        }
        Ok(())
    }

    fn finish_pin(&mut self) {
        if let Some(pin) = self.cur_pin.take() {
            if let Some(cell) = self.cur_cell.as_mut() {
                cell.pins.push(pin);
            }
        }
    }

    fn finish_cell(&mut self) {
        self.finish_pin();
        if let Some(cell) = self.cur_cell.take() {
            self.cells.insert(cell.name.clone(), cell);
        }
    }
}

/// Split the longest leading float off a token, strtod-style: `"1ns"` gives
/// `(1.0, "ns")`. Returns `None` when no prefix parses.
pub(crate) fn parse_float_prefix(s: &str) -> Option<(f64, &str)> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    while end < bytes.len()
        && matches!(bytes[end], b'0'..=b'9' | b'+' | b'-' | b'.' | b'e' | b'E')
    {
        end += 1;
    }
    while end > 0 {
        if let Ok(v) = s[..end].parse::<f64>() {
            return Some((v, &s[end..]));
        }
        end -= 1;
    }
    None
}

/// Parse a comma-separated axis list, scaling every entry by `unit`. The
/// comma count sizes the array; entries that fail to parse are diagnosed and
/// stored as 0.
fn parse_axis_list(list: &str, unit: f64, line: usize) -> Vec<f64> {
    let mut out = Vec::new();
    for entry in list.split(',') {
        let entry = entry.trim();
        match entry.parse::<f64>() {
            Ok(v) => out.push(v * unit),
            Err(_) => {
                clilog::warn!("line {}: bad axis entry \"{}\"", line, entry);
                out.push(0.0);
            }
        }
    }
    out
}

/// Fill a `csize x tsize` values matrix from the flattened string inside
/// `values(...)`. The traversal order of the incoming numbers follows the
/// template's orientation (outer loop over time when inverted, capacitance
/// otherwise), but the storage offset is always `cap * tsize + time`.
fn parse_values(
    body: &str,
    invert: bool,
    tsize: usize,
    csize: usize,
    time_unit: f64,
    line: usize,
) -> Vec<f64> {
    let mut values = vec![0.0; csize * tsize];
    let mut nums = body
        .split(|c: char| c.is_whitespace() || c == '"' || c == ',')
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<f64>().ok());
    let mut filled = 0usize;
    if invert {
        'outer: for t in 0..tsize {
            for c in 0..csize {
                match nums.next() {
                    Some(v) => values[c * tsize + t] = v * time_unit,
                    None => break 'outer,
                }
                filled += 1;
            }
        }
    } else {
        'outer: for c in 0..csize {
            for t in 0..tsize {
                match nums.next() {
                    Some(v) => values[c * tsize + t] = v * time_unit,
                    None => break 'outer,
                }
                filled += 1;
            }
        }
    }
    if filled < csize * tsize {
        clilog::warn!(
            "line {}: value table has {} entries, expected {}",
            line,
            filled,
            csize * tsize
        );
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL_LIB: &str = r#"
library(testlib) {
  delay_model : table_lookup;
  time_unit : "1ps";
  capacitive_load_unit (1,ff);

  lu_table_template(delay_template_2x2) {
    variable_1 : input_net_transition;
    variable_2 : total_output_net_capacitance;
    index_1("10, 40");
    index_2("1, 4");
  }

  cell(INV_X1) {
    area : 1.5;
    pin(A) {
      direction : input;
      capacitance : 1.2;
    }
    pin(Y) {
      direction : output;
      max_capacitance : 48;
      function : "A'";
      timing() {
        related_pin : "A";
        cell_rise(delay_template_2x2) {
          values("10, 40", "12, 44");
        }
      }
    }
  }
}
"#;

    #[test]
    fn parses_library_head_and_units() {
        let lib = Library::parse(SMALL_LIB).unwrap();
        assert_eq!(lib.name, "testlib");
        assert_eq!(lib.time_unit, 1.0);
        assert_eq!(lib.cap_unit, 1.0);
    }

    #[test]
    fn parses_template_axes() {
        let lib = Library::parse(SMALL_LIB).unwrap();
        let table = &lib.tables["delay_template_2x2"];
        assert!(!table.invert);
        assert_eq!(table.times, vec![10.0, 40.0]);
        assert_eq!(table.caps, vec![1.0, 4.0]);
    }

    #[test]
    fn parses_cell_pins_and_function() {
        let lib = Library::parse(SMALL_LIB).unwrap();
        let cell = &lib.cells["INV_X1"];
        assert_eq!(cell.area, 1.5);
        assert_eq!(cell.pins.len(), 2);
        assert_eq!(cell.pins[0].name, "A");
        assert_eq!(cell.pins[0].direction, PinDirection::Input);
        assert_eq!(cell.pins[0].cap, 1.2);
        assert_eq!(cell.pins[1].direction, PinDirection::Output);
        assert_eq!(cell.pins[1].max_cap, 48.0);
        assert_eq!(cell.function.as_deref(), Some("Y = !A;"));
        assert_eq!(cell.input_count(), 1);
    }

    #[test]
    fn values_matrix_is_stored_cap_major() {
        let lib = Library::parse(SMALL_LIB).unwrap();
        let cell = &lib.cells["INV_X1"];
        assert_eq!(cell.table.as_deref(), Some("delay_template_2x2"));
        // variable_1 is transition, so incoming rows iterate over time and
        // the matrix lands at cap*tsize + time.
        assert_eq!(cell.values.as_deref(), Some(&[10.0, 40.0, 12.0, 44.0][..]));
    }

    #[test]
    fn inverted_template_swaps_axis_roles() {
        let lib = Library::parse(
            r#"
library(l) {
  delay_model : table_lookup;
  lu_table_template(t) {
    variable_1 : total_output_net_capacitance;
    variable_2 : input_net_transition;
    index_1("1, 4");
    index_2("10, 40");
  }
  cell(c) {
    pin(Y) {
      direction : output;
      timing() {
        cell_rise(t) {
          values("10, 40", "12, 44");
        }
      }
    }
  }
}
"#,
        )
        .unwrap();
        let table = &lib.tables["t"];
        assert!(table.invert);
        assert_eq!(table.caps, vec![1.0, 4.0]);
        assert_eq!(table.times, vec![10.0, 40.0]);
        // Inverted: numbers arrive capacitance-fastest, so row k of the
        // incoming data scatters across the stored capacitance rows.
        let cell = &lib.cells["c"];
        assert_eq!(cell.values.as_deref(), Some(&[10.0, 12.0, 40.0, 44.0][..]));
    }

    #[test]
    fn time_unit_scales_subsequent_numerics() {
        let lib = Library::parse(
            r#"
library(l) {
  delay_model : table_lookup;
  time_unit : 1 ns;
  cell(c) {
    pin(A) {
      direction : input;
      max_transition : 2;
    }
  }
}
"#,
        )
        .unwrap();
        assert_eq!(lib.time_unit, 1000.0);
        assert_eq!(lib.cells["c"].pins[0].max_trans, 2000.0);
    }

    #[test]
    fn quoted_time_unit_is_understood() {
        let lib = Library::parse(
            "library(l) {\n delay_model : table_lookup;\n time_unit : \"1ns\";\n}\n",
        )
        .unwrap();
        assert_eq!(lib.time_unit, 1000.0);
    }

    #[test]
    fn cap_unit_scales_pin_capacitance() {
        let lib = Library::parse(
            r#"
library(l) {
  delay_model : table_lookup;
  capacitive_load_unit (1,pf);
  cell(c) {
    pin(A) {
      direction : input;
      capacitance : 0.005;
    }
  }
}
"#,
        )
        .unwrap();
        assert_eq!(lib.cap_unit, 1000.0);
        assert_eq!(lib.cells["c"].pins[0].cap, 5.0);
    }

    #[test]
    fn cell_local_indexes_override_template() {
        let lib = Library::parse(
            r#"
library(l) {
  delay_model : table_lookup;
  lu_table_template(t) {
    variable_1 : input_net_transition;
    variable_2 : total_output_net_capacitance;
    index_1("10, 40");
    index_2("1, 4");
  }
  cell(c) {
    pin(Y) {
      direction : output;
      timing() {
        cell_rise(t) {
          index_1("20, 80");
          index_2("2, 8");
          values("1, 2", "3, 4");
        }
      }
    }
  }
}
"#,
        )
        .unwrap();
        let cell = &lib.cells["c"];
        assert_eq!(cell.times.as_deref(), Some(&[20.0, 80.0][..]));
        assert_eq!(cell.caps.as_deref(), Some(&[2.0, 8.0][..]));
        // The template axes are untouched.
        assert_eq!(lib.tables["t"].times, vec![10.0, 40.0]);
    }

    #[test]
    fn scalar_rise_table_is_skipped() {
        let lib = Library::parse(
            r#"
library(l) {
  delay_model : table_lookup;
  cell(c) {
    pin(Y) {
      direction : output;
      timing() {
        cell_rise(scalar) {
          values("0.1");
        }
      }
    }
  }
}
"#,
        )
        .unwrap();
        let cell = &lib.cells["c"];
        assert!(cell.table.is_none());
        assert!(cell.values.is_none());
    }

    #[test]
    fn unresolved_table_reference_is_diagnosed_not_fatal() {
        let lib = Library::parse(
            r#"
library(l) {
  delay_model : table_lookup;
  cell(c) {
    pin(Y) {
      direction : output;
      function : "A";
      timing() {
        cell_rise(no_such_template) {
          values("0.1, 0.2");
        }
      }
    }
  }
}
"#,
        )
        .unwrap();
        let cell = &lib.cells["c"];
        assert!(cell.table.is_none());
        assert!(cell.values.is_none());
        assert!(cell.function.is_some());
    }

    #[test]
    fn unknown_constructs_are_skipped_wholesale() {
        let lib = Library::parse(
            r#"
library(l) {
  delay_model : table_lookup;
  operating_conditions(typical) {
    process : 1;
    nested { deeper { x : 1; } }
  }
  wire_load("small") {
    fanout_length(1, 0.5);
  }
  cell(c) {
    ff(IQ, IQN) { next_state : "D"; clocked_on : "CK"; }
    dont_touch : true;
    pin(A) {
      direction : input;
      internal_power() { rise_power("x") { values("1"); } }
      capacitance : 2;
    }
  }
}
"#,
        )
        .unwrap();
        let cell = &lib.cells["c"];
        assert_eq!(cell.pins.len(), 1);
        assert_eq!(cell.pins[0].cap, 2.0);
    }

    #[test]
    fn function_on_input_pin_is_ignored() {
        let lib = Library::parse(
            r#"
library(l) {
  delay_model : table_lookup;
  cell(c) {
    pin(A) {
      direction : input;
      function : "B";
    }
  }
}
"#,
        )
        .unwrap();
        assert!(lib.cells["c"].function.is_none());
    }

    #[test]
    fn later_output_function_overwrites_earlier() {
        let lib = Library::parse(
            r#"
library(l) {
  delay_model : table_lookup;
  cell(c) {
    pin(Y) { direction : output; function : "A"; }
    pin(Z) { direction : output; function : "B"; }
  }
}
"#,
        )
        .unwrap();
        assert_eq!(lib.cells["c"].function.as_deref(), Some("Z = B;"));
    }

    #[test]
    fn first_resolved_rise_table_wins() {
        let lib = Library::parse(
            r#"
library(l) {
  delay_model : table_lookup;
  lu_table_template(t1) {
    variable_1 : input_net_transition;
    variable_2 : total_output_net_capacitance;
    index_1("10");
    index_2("1");
  }
  lu_table_template(t2) {
    variable_1 : input_net_transition;
    variable_2 : total_output_net_capacitance;
    index_1("20");
    index_2("2");
  }
  cell(c) {
    pin(Y) {
      direction : output;
      timing() {
        cell_rise(t1) { values("5"); }
      }
      timing() {
        cell_rise(t2) { values("7"); }
      }
    }
  }
}
"#,
        )
        .unwrap();
        assert_eq!(lib.cells["c"].table.as_deref(), Some("t1"));
    }

    #[test]
    fn unsupported_delay_model_is_fatal() {
        let err = Library::parse("library(l) { delay_model : cmos2; }").unwrap_err();
        assert!(matches!(err, LibertyError::UnsupportedDelayModel(m) if m == "cmos2"));
    }

    #[test]
    fn missing_library_brace_is_fatal() {
        let err = Library::parse("library(l)\ndelay_model : table_lookup;").unwrap_err();
        assert!(matches!(err, LibertyError::MissingLibraryBrace));
    }

    #[test]
    fn truncated_input_keeps_parsed_cells() {
        let lib = Library::parse(
            "library(l) {\n delay_model : table_lookup;\n cell(c) {\n pin(A) { direction : input;\n",
        )
        .unwrap();
        assert_eq!(lib.cells["c"].pins.len(), 1);
        assert_eq!(lib.cells["c"].pins[0].direction, PinDirection::Input);
    }

    #[test]
    fn float_prefix_splits_value_and_suffix() {
        assert_eq!(parse_float_prefix("1ns"), Some((1.0, "ns")));
        assert_eq!(parse_float_prefix("0.5"), Some((0.5, "")));
        assert_eq!(parse_float_prefix("2.5e-2x"), Some((0.025, "x")));
        assert_eq!(parse_float_prefix("ns"), None);
    }
}
