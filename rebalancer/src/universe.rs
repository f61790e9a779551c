//! Instrument universe: the symbols the cascade ranks each cycle.

use std::path::Path;

use log::warn;
use rustc_hash::FxHashSet;
use trendbook::Symbol;

use crate::config::UniverseConfig;
use crate::error::{Error, Result};

/// Ordered, duplicate-free list of instruments. Order is preserved because
/// ranking ties fall back to universe order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Universe {
    symbols: Vec<Symbol>,
}

impl Universe {
    /// Inline symbols first, then the file (if any).
    pub fn load(config: &UniverseConfig) -> Result<Self> {
        let mut raw: Vec<String> = config.symbols.clone();
        if let Some(path) = &config.file {
            raw.extend(read_symbol_file(path)?);
        }
        Self::from_names(raw.iter().map(String::as_str))
    }

    /// Parse, uppercase and deduplicate. Errors on an invalid or empty result.
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut seen = FxHashSet::default();
        let mut symbols = Vec::new();

        for name in names {
            let name = name.trim().to_uppercase();
            if name.is_empty() {
                continue;
            }
            if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-') {
                return Err(Error::Universe(format!("invalid symbol '{name}'")));
            }
            let symbol = Symbol::try_new(&name)
                .ok_or_else(|| Error::Universe(format!("symbol '{name}' is too long")))?;
            if !seen.insert(symbol) {
                warn!("Duplicate symbol {symbol} in universe, ignoring");
                continue;
            }
            symbols.push(symbol);
        }

        if symbols.is_empty() {
            return Err(Error::Universe("universe is empty".into()));
        }
        Ok(Self { symbols })
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// One symbol per line; blank lines and `#` comments are skipped.
fn read_symbol_file(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path).map_err(|e| Error::UniverseRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(contents
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uppercases_and_dedupes() {
        let u = Universe::from_names(["aapl", " MSFT ", "AAPL", "brk.b"]).unwrap();
        let names: Vec<&str> = u.symbols().iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["AAPL", "MSFT", "BRK.B"]);
    }

    #[test]
    fn rejects_bad_symbols() {
        assert!(Universe::from_names(["AA PL"]).is_err());
        assert!(Universe::from_names(["TOOLONGNAME"]).is_err());
    }

    #[test]
    fn empty_universe_is_error() {
        assert!(matches!(
            Universe::from_names(["", "  "]),
            Err(Error::Universe(_))
        ));
    }

    #[test]
    fn load_merges_inline_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("universe.txt");
        std::fs::write(&path, "# S&P sample\nnvda\nmsft  # dup of inline\n\nAMZN\n").unwrap();

        let config = UniverseConfig {
            symbols: vec!["MSFT".into()],
            file: Some(path),
        };
        let u = Universe::load(&config).unwrap();
        let names: Vec<&str> = u.symbols().iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["MSFT", "NVDA", "AMZN"]);
    }

    #[test]
    fn missing_file_is_read_error() {
        let config = UniverseConfig {
            symbols: vec![],
            file: Some("/nonexistent/universe.txt".into()),
        };
        assert!(matches!(
            Universe::load(&config),
            Err(Error::UniverseRead { .. })
        ));
    }
}
