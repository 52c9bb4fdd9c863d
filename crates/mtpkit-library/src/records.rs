//! In-memory records for artists, albums, and tracks.

use mtpkit_core::ids::ObjectId;
use std::collections::BTreeSet;

/// Opaque index into the library's artist table. Albums refer to their
/// artist through this, never through a cycle-forming handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtistRef(pub(crate) usize);

/// Opaque index into the library's album table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlbumRef(pub(crate) usize);

/// An artist known to the library.
#[derive(Debug, Clone)]
pub struct ArtistRecord {
    /// Metadata object id; `ObjectId::ROOT` when the device has no artist
    /// object support and the artist exists only as folders and strings.
    pub object: ObjectId,
    /// Directory `Music/<artist>`.
    pub music_folder: ObjectId,
    pub name: String,
    /// 16-byte wire GUID for firmwares that bind metadata by GUID.
    pub guid: Option<[u8; 16]>,
}

/// An album known to the library.
#[derive(Debug, Clone)]
pub struct AlbumRecord {
    pub object: ObjectId,
    /// Directory `Music/<artist>/<album>` that owns the track payloads.
    pub music_folder: ObjectId,
    pub artist: ArtistRef,
    pub name: String,
    pub year: i32,
    pub(crate) refs_loaded: bool,
    /// Track object ids referenced by the album, mirroring the device's
    /// object references.
    pub(crate) refs: BTreeSet<ObjectId>,
    /// Track name/index pairs; names may repeat across indexes.
    pub(crate) tracks: Vec<(String, u16)>,
}

impl AlbumRecord {
    /// Track ids currently referenced (call `Library::load_refs` first for
    /// device-authoritative contents).
    pub fn track_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.refs.iter().copied()
    }

    pub(crate) fn invalidate(&mut self) {
        self.refs_loaded = false;
        self.refs.clear();
        self.tracks.clear();
    }
}

/// A freshly created track, to be fed to `Library::add_track` once its
/// payload bytes have been sent.
#[derive(Debug, Clone)]
pub struct NewTrack {
    pub object: ObjectId,
    pub name: String,
    pub index: u16,
}
