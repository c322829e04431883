//! The file-ID-addressed container the build feeds into.
//!
//! The game's filesystem is keyed by integer file IDs, with a parallel table
//! of display names over the same key space. [`Archive`] models exactly that
//! mapping while a build accumulates blobs; serializing it back into the
//! cartridge image is the job of the surrounding tooling, which this module
//! only supports with an atomic-replace file writer.

use crate::errors::PakError;
use byteorder::{ByteOrder, LittleEndian};
use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::Path,
};

/// An in-memory file-ID to blob mapping with associated display names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Archive {
    files: BTreeMap<u16, Vec<u8>>,
    names: BTreeMap<u16, String>,
}

impl Archive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `data` at `id` under `name`, replacing any previous blob.
    ///
    /// The container is format-agnostic; nothing about `data` is validated.
    pub fn insert(&mut self, id: u16, name: &str, data: Vec<u8>) {
        self.files.insert(id, data);
        self.names.insert(id, name.to_owned());
    }

    pub fn get(&self, id: u16) -> Option<&[u8]> {
        self.files.get(&id).map(Vec::as_slice)
    }

    pub fn name(&self, id: u16) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    pub fn contains(&self, id: u16) -> bool {
        self.files.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = u16> + '_ {
        self.files.keys().copied()
    }

    /// Check that every ID in `ids` has a blob, before anything is persisted.
    pub fn verify_ids<I: IntoIterator<Item = u16>>(&self, ids: I) -> Result<(), PakError> {
        for id in ids {
            if !self.contains(id) {
                return Err(PakError::MissingAsset(id));
            }
        }
        Ok(())
    }
}

/// Build the slot -> file-ID lookup table for the game code.
///
/// The table is a dense little endian `u16` array with two entries per
/// logical slot, indexed by `2 * slot`. Slots without an asset stay zero;
/// file ID 0 is never allocated to a real asset, so zero doubles as the
/// "no asset" sentinel.
pub fn build_index_table(assets: &BTreeMap<u16, (u16, u16)>) -> Vec<u8> {
    let slots = assets.keys().next_back().map_or(0, |&max| max as usize + 1);
    let mut entries = vec![0u16; 2 * slots];

    for (&slot, &(main_id, aux_id)) in assets {
        entries[2 * slot as usize] = main_id;
        entries[2 * slot as usize + 1] = aux_id;
    }

    let mut out = vec![0u8; 2 * entries.len()];
    for (i, entry) in entries.iter().enumerate() {
        LittleEndian::write_u16(&mut out[2 * i..], *entry);
    }
    out
}

/// Write `bytes` to `path` via a temporary sibling file and an atomic
/// rename, so an aborted build never leaves a half-written archive behind.
pub fn persist_atomic<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<(), PakError> {
    let path = path.as_ref();
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");

    let mut file = fs::File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;

    Ok(())
}
