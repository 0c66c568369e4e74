//! Import-table extraction for PE images
//!
//! Walks the import directory of a PE image and collects the names of every
//! function imported by name, expanded with their ANSI/Wide counterparts.

use std::collections::BTreeSet;

use goblin::pe::import::SyntheticImportLookupTableEntry;
use goblin::pe::PE;

use crate::error::{Error, Result};

/// Parse a PE image and collect the candidate set of API names to look up.
///
/// Only imports resolved by name contribute; ordinal-only imports carry no
/// symbol text and are skipped. Every collected name ending in `A` or `W`
/// also contributes the counterpart spelling, whether or not the counterpart
/// is actually imported.
///
/// An image without an import directory (or with no named imports) yields an
/// empty set. Bytes that do not parse as a PE image at all are
/// [`Error::InvalidImage`].
pub fn extract_candidates(data: &[u8]) -> Result<BTreeSet<String>> {
    let pe = PE::parse(data).map_err(|e| Error::InvalidImage(e.to_string()))?;

    let mut names = BTreeSet::new();
    let Some(import_data) = pe.import_data.as_ref() else {
        return Ok(names);
    };

    for module in &import_data.import_data {
        let Some(table) = module.import_lookup_table.as_ref() else {
            continue;
        };
        for entry in table {
            if let SyntheticImportLookupTableEntry::HintNameTableRVA((_, hint_entry)) = entry {
                let name = hint_entry.name.trim();
                if name.is_empty() {
                    continue;
                }
                if let Some(counterpart) = counterpart_name(name) {
                    names.insert(counterpart);
                }
                names.insert(name.to_string());
            }
        }
    }

    tracing::debug!(candidates = names.len(), "import extraction complete");
    Ok(names)
}

/// ANSI/Wide counterpart of a Windows API name.
///
/// `CreateFileW` -> `CreateFileA` and vice versa. Purely textual: the suffix
/// is swapped without consulting the import table for the counterpart. A name
/// that is nothing but the suffix letter has no counterpart.
fn counterpart_name(name: &str) -> Option<String> {
    if let Some(stem) = name.strip_suffix('W') {
        if !stem.is_empty() {
            return Some(format!("{stem}A"));
        }
    } else if let Some(stem) = name.strip_suffix('A') {
        if !stem.is_empty() {
            return Some(format!("{stem}W"));
        }
    }
    None
}
