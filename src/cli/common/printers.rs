// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Pretty printers for reporting information.

use std::{borrow::Cow, sync::Mutex};

use log::Level;

const VERTICAL: char = '│';
const UP_AND_RIGHT: char = '└';
const VERTICAL_AND_RIGHT: char = '├';

lazy_static::lazy_static! {
    static ref WARNING_PRINTER: Mutex<WarningPrinter> = Mutex::new(WarningPrinter::default());
}

/// Collects lines and blocks of lines under a title, and logs them as a tree.
pub(crate) struct InfoPrinter {
    title: Cow<'static, str>,
    blocks: Vec<Vec<Cow<'static, str>>>,
}

impl InfoPrinter {
    pub(crate) fn new(title: Cow<'static, str>) -> Self {
        Self {
            title,
            blocks: vec![],
        }
    }

    pub(crate) fn push_line(&mut self, line: Cow<'static, str>) {
        self.blocks.push(vec![line]);
    }

    pub(crate) fn push_block(&mut self, block: Vec<Cow<'static, str>>) {
        self.blocks.push(block);
    }

    pub(crate) fn display(self) {
        log::info!("{}", console::style(self.title).bold());
        log_blocks(&self.blocks, Level::Info);
    }
}

#[derive(Default)]
struct WarningPrinter {
    blocks: Vec<Vec<Cow<'static, str>>>,
}

impl WarningPrinter {
    fn push_line(&mut self, line: Cow<'static, str>) {
        self.blocks.push(vec![line]);
    }

    fn push_block(&mut self, block: Vec<Cow<'static, str>>) {
        self.blocks.push(block);
    }

    fn display(&mut self) {
        log::debug!("Displaying warnings");
        if self.blocks.is_empty() {
            return;
        }

        log::warn!("{}", console::style("Warnings").bold());
        log_blocks(&self.blocks, Level::Warn);
        self.blocks.clear();
    }
}

/// The first line of each block gets a branch symbol; the rest hang off a
/// vertical line.
fn block_symbol(i_line: usize, last_line: bool, last_block: bool) -> char {
    match (i_line, last_line, last_block) {
        (0, false, _) => VERTICAL_AND_RIGHT,
        (0, _, false) => VERTICAL_AND_RIGHT,
        (0, true, true) => UP_AND_RIGHT,
        _ => VERTICAL,
    }
}

fn log_blocks(blocks: &[Vec<Cow<'static, str>>], level: Level) {
    let num_blocks = blocks.len();
    for (i_block, block) in blocks.iter().enumerate() {
        let num_lines = block.len();
        for (i_line, line) in block.iter().enumerate() {
            let symbol = block_symbol(i_line, i_line + 1 == num_lines, i_block + 1 == num_blocks);
            log::log!(level, "{symbol} {line}");
        }
    }
    log::log!(level, "");
}

/// Anything that can be shown to the user as a warning. Warnings are held
/// until [`display_warnings`] is called.
pub(crate) trait Warn {
    fn warn(self);
}

// A poisoned lock only means another thread panicked while pushing; the
// warnings that made it in are still worth showing.
fn with_printer(f: impl FnOnce(&mut WarningPrinter)) {
    let mut printer = match WARNING_PRINTER.lock() {
        Ok(p) => p,
        Err(poisoned) => poisoned.into_inner(),
    };
    f(&mut printer);
}

impl Warn for &'static str {
    fn warn(self) {
        with_printer(|p| p.push_line(self.into()));
    }
}

impl Warn for String {
    fn warn(self) {
        with_printer(|p| p.push_line(self.into()));
    }
}

impl Warn for Cow<'static, str> {
    fn warn(self) {
        with_printer(|p| p.push_line(self));
    }
}

impl Warn for Vec<Cow<'static, str>> {
    fn warn(self) {
        with_printer(|p| p.push_block(self));
    }
}

impl<const N: usize> Warn for [Cow<'static, str>; N] {
    fn warn(self) {
        with_printer(|p| p.push_block(self.to_vec()));
    }
}

/// Print out any warnings that have been collected. The collection is emptied,
/// so warnings raised later are shown by the next call.
pub(crate) fn display_warnings() {
    with_printer(|p| p.display());
}

#[cfg(test)]
pub(super) fn block_symbols(num_lines_per_block: &[usize]) -> Vec<char> {
    let num_blocks = num_lines_per_block.len();
    num_lines_per_block
        .iter()
        .enumerate()
        .flat_map(|(i_block, &num_lines)| {
            (0..num_lines)
                .map(move |i_line| block_symbol(i_line, i_line + 1 == num_lines, i_block + 1 == num_blocks))
        })
        .collect()
}
