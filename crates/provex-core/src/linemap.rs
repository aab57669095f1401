//! Line-number remapping
//!
//! Source transforms may insert lines. Witness edges must refer to lines in
//! the original file, so every transform returns a `LineMap` from its output
//! lines back to its input lines; the controller composes the maps in
//! transform order and the witness encoder applies the composition.

use serde::{Deserialize, Serialize};

/// Maps line numbers of a transformed file back to its input file.
///
/// Lines are 1-based. Inserted lines map to the nearest preceding original
/// line (0 when inserted before any original content).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineMap {
    /// `map[i]` is the input line for output line `i + 1`
    map: Vec<u32>,
}

impl LineMap {
    /// Identity map over `lines` output lines
    pub fn identity(lines: u32) -> Self {
        LineMap {
            map: (1..=lines).collect(),
        }
    }

    /// Build from an explicit output-line → input-line table
    pub fn from_table(map: Vec<u32>) -> Self {
        LineMap { map }
    }

    /// Number of output lines covered
    pub fn len(&self) -> u32 {
        self.map.len() as u32
    }

    /// True when the map covers no lines
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Input line for an output line. Lines past the covered range map to
    /// themselves so a stale map degrades to identity rather than garbage.
    pub fn input_line(&self, output_line: u32) -> u32 {
        if output_line == 0 {
            return 0;
        }
        self.map
            .get(output_line as usize - 1)
            .copied()
            .unwrap_or(output_line)
    }

    /// Compose with the map of a later transform: `self` maps stage N output
    /// to stage N input, `later` maps stage N+1 output to stage N output.
    /// The result maps stage N+1 output to stage N input.
    pub fn compose(&self, later: &LineMap) -> LineMap {
        let map = (1..=later.len())
            .map(|line| self.input_line(later.input_line(line)))
            .collect();
        LineMap { map }
    }
}
