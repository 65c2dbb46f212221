//! Packed LR parser tables and their persisted form.
//!
//! Every table is a list of rows of `i16`. Action and reduce rows are sorted
//! `(symbol, value)` pairs closed by a `(-1, default)` pair; production rows
//! are `[lhs, rhs_len]`. Action values encode `state + 1` for a shift,
//! `-(production + 1)` for a reduce and `0` for an error.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::TableError;

pub const START_STATE: usize = 0;

/// Rows shorter than this are scanned linearly.
const LINEAR_SCAN_LIMIT: usize = 20;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Action,
    Reduce,
    Production,
}

impl TableKind {
    pub const ALL: [Self; 3] = [Self::Action, Self::Reduce, Self::Production];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Action => "ActionTable",
            Self::Reduce => "ReduceTable",
            Self::Production => "ProductionTable",
        }
    }
}

/// Name of a persisted table inside a resource directory.
pub fn resource_name(namespace: &str, table: TableKind) -> String {
    format!("{namespace}/Parser${}.data", table.name())
}

/// Looks `symbol` up in a packed row, falling back to the row's trailing
/// default.
fn sparse_lookup(row: &[i16], symbol: i16, missing: i16) -> i16 {
    if row.len() < LINEAR_SCAN_LIMIT {
        for pair in row.chunks_exact(2) {
            match *pair {
                [tag, value] if tag == symbol || tag == -1 => return value,
                _ => {}
            }
        }
        return missing;
    }
    let pair = |i: usize| {
        let at = i.saturating_mul(2);
        row.get(at..at.saturating_add(2))
    };
    // The trailing default pair is not part of the sorted run.
    let (mut first, mut last) = (0usize, (row.len() / 2).saturating_sub(1));
    while first < last {
        let probe = first.saturating_add(last.saturating_sub(first) / 2);
        let Some(&[tag, value]) = pair(probe) else {
            break;
        };
        match symbol.cmp(&tag) {
            std::cmp::Ordering::Equal => return value,
            std::cmp::Ordering::Greater => first = probe.saturating_add(1),
            std::cmp::Ordering::Less => last = probe,
        }
    }
    row.last().copied().unwrap_or(missing)
}

/// Packs sorted `(symbol, value)` pairs into a row closed by `default`.
pub fn pack_row<I>(pairs: I, default: i16) -> Vec<i16>
where
    I: IntoIterator<Item = (i16, i16)>,
{
    let mut row: Vec<i16> = pairs.into_iter().flat_map(|(s, v)| [s, v]).collect();
    row.extend([-1, default]);
    row
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParserTables {
    action: Vec<Vec<i16>>,
    reduce: Vec<Vec<i16>>,
    production: Vec<Vec<i16>>,
}

impl ParserTables {
    pub const fn new(action: Vec<Vec<i16>>, reduce: Vec<Vec<i16>>, production: Vec<Vec<i16>>) -> Self {
        Self {
            action,
            reduce,
            production,
        }
    }

    pub fn states(&self) -> usize {
        self.action.len()
    }

    pub fn productions(&self) -> usize {
        self.production.len()
    }

    /// The action for `state` on terminal `symbol`, `0` when there is none.
    pub fn action(&self, state: usize, symbol: usize) -> i16 {
        match (self.action.get(state), i16::try_from(symbol)) {
            (Some(row), Ok(symbol)) => sparse_lookup(row, symbol, 0),
            _ => 0,
        }
    }

    /// The state reached from `state` over non-terminal `symbol`, `-1` when
    /// there is none.
    pub fn goto(&self, state: usize, symbol: usize) -> i16 {
        match (self.reduce.get(state), i16::try_from(symbol)) {
            (Some(row), Ok(symbol)) => sparse_lookup(row, symbol, -1),
            _ => -1,
        }
    }

    /// `(lhs, rhs_len)` of a production.
    pub fn production(&self, production: usize) -> Option<(usize, usize)> {
        let row = self.production.get(production)?;
        match row.as_slice() {
            [lhs, len] => Some((usize::try_from(*lhs).ok()?, usize::try_from(*len).ok()?)),
            _ => None,
        }
    }

    fn table(&self, kind: TableKind) -> &[Vec<i16>] {
        match kind {
            TableKind::Action => &self.action,
            TableKind::Reduce => &self.reduce,
            TableKind::Production => &self.production,
        }
    }

    /// Writes the three tables under `<dir>/<namespace>/`.
    pub fn store(&self, dir: &Path, namespace: &str) -> Result<(), TableError> {
        let parent = dir.join(namespace);
        fs::create_dir_all(&parent).map_err(|source| TableError::Io {
            path: parent.clone(),
            source,
        })?;
        for kind in TableKind::ALL {
            let path = dir.join(resource_name(namespace, kind));
            fs::write(&path, encode_table(self.table(kind))).map_err(|source| TableError::Io {
                path: path.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Reads tables written by [`ParserTables::store`].
    pub fn load(dir: &Path, namespace: &str) -> Result<Self, TableError> {
        Self::read_with(namespace, |name| {
            let path: PathBuf = dir.join(name);
            fs::read(&path).map_err(|source| TableError::Io { path, source })
        })
    }

    /// Decodes tables from in-memory resources looked up by their
    /// [`resource_name`].
    pub fn from_resources<'r, F>(namespace: &str, mut resource: F) -> Result<Self, TableError>
    where
        F: FnMut(&str) -> Option<&'r [u8]>,
    {
        Self::read_with(namespace, |name| {
            resource(name).ok_or_else(|| TableError::MissingResource {
                name: name.to_owned(),
            })
        })
    }

    fn read_with<B, F>(namespace: &str, mut read: F) -> Result<Self, TableError>
    where
        B: AsRef<[u8]>,
        F: FnMut(&str) -> Result<B, TableError>,
    {
        let mut table = |kind: TableKind| -> Result<Vec<Vec<i16>>, TableError> {
            let bytes = read(&resource_name(namespace, kind))?;
            decode_table(kind, bytes.as_ref())
        };
        let tables = Self::new(
            table(TableKind::Action)?,
            table(TableKind::Reduce)?,
            table(TableKind::Production)?,
        );
        tables.validate()?;
        Ok(tables)
    }

    fn validate(&self) -> Result<(), TableError> {
        let malformed = |table: TableKind, reason: String| TableError::Malformed {
            table: table.name(),
            reason,
        };
        for kind in [TableKind::Action, TableKind::Reduce] {
            if let Some(i) = self.table(kind).iter().position(|row| row.len() < 2 || row.len() % 2 != 0) {
                return Err(malformed(kind, format!("row {i} is not a list of pairs")));
            }
        }
        if self.action.len() != self.reduce.len() {
            return Err(malformed(
                TableKind::Reduce,
                format!("{} rows for {} states", self.reduce.len(), self.action.len()),
            ));
        }
        if let Some(i) = self.production.iter().position(|row| row.len() != 2) {
            return Err(malformed(TableKind::Production, format!("row {i} is not [lhs, len]")));
        }
        Ok(())
    }
}

/// Row-counted little-endian encoding: `u32` row count, then per row a `u32`
/// length and that many `i16` values.
pub fn encode_table(rows: &[Vec<i16>]) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend((rows.len() as u32).to_le_bytes());
    for row in rows {
        bytes.extend((row.len() as u32).to_le_bytes());
        for value in row {
            bytes.extend(value.to_le_bytes());
        }
    }
    bytes
}

pub fn decode_table(kind: TableKind, bytes: &[u8]) -> Result<Vec<Vec<i16>>, TableError> {
    let truncated = || TableError::Malformed {
        table: kind.name(),
        reason: "unexpected end of data".to_owned(),
    };
    let mut rest = bytes;
    let read_u32 = |rest: &mut &[u8]| -> Result<usize, TableError> {
        let (head, tail) = rest.split_first_chunk::<4>().ok_or_else(truncated)?;
        *rest = tail;
        Ok(u32::from_le_bytes(*head) as usize)
    };
    let count = read_u32(&mut rest)?;
    let mut rows = Vec::with_capacity(count.min(bytes.len() / 4));
    for _ in 0..count {
        let len = read_u32(&mut rest)?;
        let mut row = Vec::with_capacity(len.min(rest.len() / 2));
        for _ in 0..len {
            let (value, tail) = rest.split_first_chunk::<2>().ok_or_else(truncated)?;
            row.push(i16::from_le_bytes(*value));
            rest = tail;
        }
        rows.push(row);
    }
    if !rest.is_empty() {
        return Err(TableError::Malformed {
            table: kind.name(),
            reason: format!("{} trailing bytes", rest.len()),
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ParserTables {
        ParserTables::new(
            vec![pack_row([(0, 2), (3, -1)], 0), pack_row([], 0)],
            vec![pack_row([(5, 1)], -1), pack_row([], -1)],
            vec![vec![5, 2]],
        )
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_short_row_lookup() {
        let tables = sample();
        assert_eq!(tables.action(0, 0), 2);
        assert_eq!(tables.action(0, 3), -1);
        assert_eq!(tables.action(0, 1), 0);
        assert_eq!(tables.action(7, 0), 0);
        assert_eq!(tables.goto(0, 5), 1);
        assert_eq!(tables.goto(1, 5), -1);
        assert_eq!(tables.production(0), Some((5, 2)));
        assert_eq!(tables.production(1), None);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_long_row_binary_search_matches_linear() {
        let pairs: Vec<(i16, i16)> = (0..30).map(|s| (s * 3, s + 100)).collect();
        let row = pack_row(pairs.iter().copied(), 7);
        assert!(row.len() >= LINEAR_SCAN_LIMIT);
        for symbol in 0..100 {
            let expected = pairs
                .iter()
                .find(|(s, _)| *s == symbol)
                .map_or(7, |(_, v)| *v);
            assert_eq!(sparse_lookup(&row, symbol, 0), expected, "symbol {symbol}");
        }
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_resource_name() {
        assert_eq!(
            resource_name("scriptlate", TableKind::Action),
            "scriptlate/Parser$ActionTable.data"
        );
        assert_eq!(
            resource_name("a/b", TableKind::Production),
            "a/b/Parser$ProductionTable.data"
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_decode_rejects_truncated_data() {
        let mut bytes = encode_table(&[vec![1, 2, 3]]);
        bytes.pop();
        assert!(matches!(
            decode_table(TableKind::Action, &bytes),
            Err(TableError::Malformed { table: "ActionTable", .. })
        ));
        assert!(decode_table(TableKind::Action, &[]).is_err());
    }

    #[test]
    #[ntest::timeout(1000)]
    fn test_store_and_load() {
        let dir = std::env::temp_dir().join(format!("scriptlate-tables-{}", rand::random::<u64>()));
        let tables = sample();
        tables.store(&dir, "demo").unwrap();
        assert!(dir.join("demo").join("Parser$ReduceTable.data").is_file());
        assert_eq!(ParserTables::load(&dir, "demo").unwrap(), tables);
        assert!(matches!(
            ParserTables::load(&dir, "missing"),
            Err(TableError::Io { .. })
        ));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    #[ntest::timeout(1000)]
    fn test_from_resources() {
        let tables = sample();
        let blobs: Vec<(String, Vec<u8>)> = TableKind::ALL
            .iter()
            .map(|kind| (resource_name("demo", *kind), encode_table(tables.table(*kind))))
            .collect();
        let find = |name: &str| {
            blobs
                .iter()
                .find(|(resource, _)| resource == name)
                .map(|(_, bytes)| bytes.as_slice())
        };
        assert_eq!(ParserTables::from_resources("demo", find).unwrap(), tables);
        assert!(matches!(
            ParserTables::from_resources("other", find),
            Err(TableError::MissingResource { name }) if name == "other/Parser$ActionTable.data"
        ));
    }
}
