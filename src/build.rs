//! Build-wide state for assembling a preview archive.
//!
//! One [`BuildContext`] is owned by the top-level build driver and threaded
//! through the pipeline: it hands out file IDs, stores the compressed image
//! pairs, and finally emits the slot lookup table. Nothing touches disk
//! until [`finish`] has produced a complete archive, so a failed build
//! leaves no partial output.
//!
//! [`finish`]: BuildContext::finish

use crate::{
    archive::{build_index_table, Archive},
    encode::compress,
    enpg::Enpg,
    errors::PakError,
};
use std::collections::BTreeMap;

/// Accumulates a preview archive: an even-stepping file-ID allocator, the
/// archive under construction, and the slot -> file-ID registrations that
/// become the index table.
#[derive(Debug)]
pub struct BuildContext {
    archive: Archive,
    index_file_id: u16,
    next_file_id: u16,
    assets: BTreeMap<u16, (u16, u16)>,
}

impl BuildContext {
    /// Start a build whose index table lands at `index_file_id` and whose
    /// image pairs are numbered from `first_pair_id` upward, two IDs per
    /// pair.
    ///
    /// `first_pair_id` must be nonzero: ID 0 is the index table's "no
    /// asset" sentinel.
    pub fn new(index_file_id: u16, first_pair_id: u16) -> Self {
        assert!(first_pair_id > 0, "file ID 0 is reserved");

        Self {
            archive: Archive::new(),
            index_file_id,
            next_file_id: first_pair_id,
            assets: BTreeMap::new(),
        }
    }

    /// The archive as assembled so far.
    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    /// Reserve the next main/aux file-ID pair.
    pub fn alloc_pair(&mut self) -> (u16, u16) {
        let id = self.next_file_id;
        self.next_file_id += 2;
        (id, id + 1)
    }

    /// Compress a main/aux image pair and store both under freshly
    /// allocated IDs, returning those IDs.
    pub fn write_pair(
        &mut self,
        name: &str,
        main: &Enpg,
        aux: &Enpg,
    ) -> Result<(u16, u16), PakError> {
        let (main_id, aux_id) = self.alloc_pair();

        let blob = compress(main.to_bytes().as_slice())?;
        self.archive
            .insert(main_id, &format!("{}_{}_main.enpg", main_id, name), blob);

        let blob = compress(aux.to_bytes().as_slice())?;
        self.archive
            .insert(aux_id, &format!("{}_{}_aux.enpg", aux_id, name), blob);

        Ok((main_id, aux_id))
    }

    /// Record which two file IDs belong to logical slot `slot`.
    ///
    /// Registering the same slot twice means two assets were assigned the
    /// same position, which is a bug in the build script, so this panics
    /// rather than returning an error.
    pub fn register(&mut self, slot: u16, ids: (u16, u16)) {
        let previous = self.assets.insert(slot, ids);
        assert!(
            previous.is_none(),
            "slot {} assigned twice: {:?} then {:?}",
            slot,
            previous.unwrap(),
            ids
        );
    }

    /// Build and compress the index table, store it at the index file ID,
    /// and hand back the finished archive.
    ///
    /// Fails with [`PakError::MissingAsset`] if a registered slot points at
    /// a file ID that was never written.
    pub fn finish(mut self) -> Result<Archive, PakError> {
        self.archive.verify_ids(
            self.assets
                .values()
                .flat_map(|&(main_id, aux_id)| [main_id, aux_id]),
        )?;

        let table = compress(build_index_table(&self.assets).as_slice())?;
        self.archive.insert(
            self.index_file_id,
            &format!("{} fileIDs.nerds", self.index_file_id),
            table,
        );

        Ok(self.archive)
    }
}
