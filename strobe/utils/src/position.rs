//! Source position tracking for diagnostics.
//!
//! Positions are interned into a process-wide, append-only table so that IR
//! nodes can carry a `Copy` handle ([GPosIdx]) instead of spans.
use std::sync::LazyLock;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
/// Handle to a file in the global table.
pub struct FileIdx(u32);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
/// Handle to a position in the global table.
pub struct PosIdx(u32);

struct PosData {
    file: FileIdx,
    line: u32,
    col: u32,
}

/// Append-only table of files and positions.
pub struct GlobalPositionTable {
    files: boxcar::Vec<String>,
    positions: boxcar::Vec<PosData>,
}

static TABLE: LazyLock<GlobalPositionTable> = LazyLock::new(|| {
    let table = GlobalPositionTable {
        files: boxcar::Vec::new(),
        positions: boxcar::Vec::new(),
    };
    let file = table.files.push("unknown".to_string());
    table.positions.push(PosData {
        file: FileIdx(file as u32),
        line: 0,
        col: 0,
    });
    table
});

impl GlobalPositionTable {
    /// Register a source file by name.
    pub fn add_file<S: ToString>(name: S) -> FileIdx {
        FileIdx(TABLE.files.push(name.to_string()) as u32)
    }

    /// Register a position inside `file`.
    pub fn add_pos(file: FileIdx, line: u32, col: u32) -> GPosIdx {
        let idx = TABLE.positions.push(PosData { file, line, col });
        GPosIdx(PosIdx(idx as u32))
    }

    fn get(pos: PosIdx) -> Option<(&'static str, u32, u32)> {
        let data = TABLE.positions.get(pos.0 as usize)?;
        let file = TABLE.files.get(data.file.0 as usize)?;
        Some((file.as_str(), data.line, data.col))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
/// A position index backed by the [GlobalPositionTable].
pub struct GPosIdx(pub PosIdx);

impl Default for GPosIdx {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl GPosIdx {
    /// Symbol for the unknown position
    pub const UNKNOWN: GPosIdx = GPosIdx(PosIdx(0));

    /// Returns `None` if this is the unknown position.
    pub fn into_option(self) -> Option<Self> {
        if self == Self::UNKNOWN {
            None
        } else {
            Some(self)
        }
    }

    /// File name, line, and column of this position.
    pub fn get_location(&self) -> (&'static str, u32, u32) {
        GlobalPositionTable::get(self.0).unwrap_or(("unknown", 0, 0))
    }

    /// Prefix `msg` with the location of this position.
    pub fn format<S: AsRef<str>>(&self, msg: S) -> String {
        let (file, line, col) = self.get_location();
        format!("{file}:{line}:{col}: {}", msg.as_ref())
    }
}

/// An IR node that may contain position information.
pub trait WithPos {
    /// Copy the span associated with this node.
    fn copy_span(&self) -> GPosIdx;
}

impl WithPos for GPosIdx {
    fn copy_span(&self) -> GPosIdx {
        *self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_resolve() {
        let file = GlobalPositionTable::add_file("top.sv");
        let pos = GlobalPositionTable::add_pos(file, 12, 4);
        assert_eq!(pos.get_location(), ("top.sv", 12, 4));
        assert_eq!(pos.format("oops"), "top.sv:12:4: oops");
        assert!(GPosIdx::UNKNOWN.into_option().is_none());
    }
}
