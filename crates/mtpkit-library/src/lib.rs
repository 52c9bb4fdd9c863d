//! # mtpkit-library
//!
//! The device media library: a cache mapping artist and album names to
//! persistent object ids, plus the object-tree bookkeeping audio-capable
//! firmwares require (well-known folders, artist metadata objects, album
//! references, cover art).
//!
//! The cache is hydrated once from the device at construction and treated as
//! authoritative for entries it created or loaded; a failed mutation
//! invalidates the affected entry so the next read goes back to the device.

mod guid;
mod records;

pub use guid::parse_guid;
pub use records::{AlbumRecord, AlbumRef, ArtistRecord, ArtistRef, NewTrack};

use mtpkit_core::codes::{ObjectFormat, ObjectPropertyCode, OperationCode};
use mtpkit_core::ids::{ObjectId, StorageId};
use mtpkit_core::stream::VecSource;
use mtpkit_core::{Error, Result};
use mtpkit_ptp::proplist::{self, PropertyListBuilder};
use mtpkit_ptp::wire::format_year;
use mtpkit_ptp::{SharedSession, Session};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Stand-in for tracks with no artist metadata.
pub const UNKNOWN_ARTIST: &str = "UnknownArtist";
/// Stand-in for tracks with no album metadata.
pub const UNKNOWN_ALBUM: &str = "UnknownAlbum";

const MUSIC_FOLDER: &str = "Music";
const ALBUMS_FOLDER: &str = "Albums";
const ARTISTS_FOLDER: &str = "Artists";

/// Media library bound to one session.
pub struct Library {
    session: SharedSession,
    storage: StorageId,
    music_folder: ObjectId,
    albums_folder: ObjectId,
    artists_folder: Option<ObjectId>,
    artist_supported: bool,
    album_date_supported: bool,
    album_cover_supported: bool,
    artists: Vec<ArtistRecord>,
    artists_by_name: HashMap<String, ArtistRef>,
    albums: Vec<AlbumRecord>,
    albums_by_key: HashMap<(ArtistRef, String), AlbumRef>,
}

impl Library {
    /// Whether the device exposes everything the library needs.
    pub async fn supported(session: &SharedSession) -> bool {
        let session = session.lock().await;
        let info = session.device_info();
        info.supports_operation(OperationCode::GetObjectPropList)
            && info.supports_operation(OperationCode::SendObjectPropList)
            && info.supports_operation(OperationCode::SetObjectReferences)
            && info.supports_format(ObjectFormat::AbstractAudioAlbum)
    }

    /// Hydrate the library from the device: discover or create the
    /// well-known folders, then pull the existing artist and album lists.
    pub async fn open(shared: SharedSession) -> Result<Self> {
        let mut session = shared.lock().await;

        let storages = session.get_storage_ids().await?;
        // Legacy firmwares refuse artist/album creation without an explicit
        // storage id, so everything the library writes targets the first one.
        let storage = *storages
            .first()
            .ok_or_else(|| Error::NotFound("no storages on device".into()))?;

        let artist_supported = session.device_info().supports_format(ObjectFormat::Artist);
        debug!(artist_supported, "artist object support");

        let album_props = session
            .get_object_props_supported(ObjectFormat::AbstractAudioAlbum)
            .await?;
        let album_date_supported = album_props.contains(&ObjectPropertyCode::DateAuthored);
        let album_cover_supported =
            album_props.contains(&ObjectPropertyCode::RepresentativeSampleData);
        debug!(album_date_supported, album_cover_supported, "album property support");

        // Well-known folders under the device root.
        let root_folders = list_associations(&mut session, ObjectId::ROOT).await?;
        let mut music_folder = root_folders.get(MUSIC_FOLDER).copied();
        let mut albums_folder = root_folders.get(ALBUMS_FOLDER).copied();
        let mut artists_folder = root_folders.get(ARTISTS_FOLDER).copied();

        if artist_supported && artists_folder.is_none() {
            artists_folder =
                Some(session.create_directory(ARTISTS_FOLDER, ObjectId::ROOT, storage).await?);
        }
        if albums_folder.is_none() {
            albums_folder =
                Some(session.create_directory(ALBUMS_FOLDER, ObjectId::ROOT, storage).await?);
        }
        if music_folder.is_none() {
            music_folder =
                Some(session.create_directory(MUSIC_FOLDER, ObjectId::ROOT, storage).await?);
        }
        let music_folder = music_folder.expect("created above");
        let albums_folder = albums_folder.expect("created above");

        let mut library = Self {
            storage,
            music_folder,
            albums_folder,
            artists_folder,
            artist_supported,
            album_date_supported,
            album_cover_supported,
            artists: Vec::new(),
            artists_by_name: HashMap::new(),
            albums: Vec::new(),
            albums_by_key: HashMap::new(),
            session: shared.clone(),
        };

        let music_folders = list_associations(&mut session, music_folder).await?;

        if artist_supported {
            library
                .hydrate_artists(&mut session, &music_folders)
                .await?;
        }
        library.hydrate_albums(&mut session).await?;
        drop(session);

        info!(
            artists = library.artists.len(),
            albums = library.albums.len(),
            "library loaded"
        );
        Ok(library)
    }

    async fn hydrate_artists(
        &mut self,
        session: &mut Session,
        music_folders: &HashMap<String, ObjectId>,
    ) -> Result<()> {
        let data = session
            .get_object_prop_list(
                ObjectId::ROOT,
                Some(ObjectFormat::Artist),
                ObjectPropertyCode::Name.to_u16() as u32,
                0,
                1,
            )
            .await?;
        for entry in proplist::parse(&data)? {
            let Some(name) = entry.value.as_str() else { continue };
            let name = name.to_string();
            debug!(artist = %name, object = %entry.object, "known artist");

            let music_folder = match music_folders.get(&name) {
                Some(id) => *id,
                None => {
                    session
                        .create_directory(&name, self.music_folder, self.storage)
                        .await?
                }
            };

            // GUID property is absent on most artists; ignore failures.
            let guid = match session
                .get_object_prop_value(entry.object, ObjectPropertyCode::ZuneGuid)
                .await
            {
                Ok(raw) if raw.len() >= 16 => {
                    let mut guid = [0u8; 16];
                    guid.copy_from_slice(&raw[..16]);
                    Some(guid)
                }
                _ => None,
            };

            let record = ArtistRecord { object: entry.object, music_folder, name: name.clone(), guid };
            let artist_ref = ArtistRef(self.artists.len());
            self.artists.push(record);
            self.artists_by_name.insert(name, artist_ref);
        }
        Ok(())
    }

    async fn hydrate_albums(&mut self, session: &mut Session) -> Result<()> {
        let data = session
            .get_object_prop_list(
                ObjectId::ROOT,
                Some(ObjectFormat::AbstractAudioAlbum),
                ObjectPropertyCode::Name.to_u16() as u32,
                0,
                1,
            )
            .await?;
        let mut album_folders: HashMap<ArtistRef, HashMap<String, ObjectId>> = HashMap::new();

        for entry in proplist::parse(&data)? {
            let Some(name) = entry.value.as_str() else { continue };
            let name = name.to_string();

            let artist_name = session
                .get_object_string_property(entry.object, ObjectPropertyCode::Artist)
                .await
                .unwrap_or_default();
            let year = if self.album_date_supported {
                session
                    .get_object_string_property(entry.object, ObjectPropertyCode::DateAuthored)
                    .await
                    .ok()
                    .and_then(|date| mtpkit_ptp::wire::parse_year(&date))
                    .unwrap_or(0)
            } else {
                0
            };
            debug!(album = %name, artist = %artist_name, year, "known album");

            let artist = match self.find_artist(&artist_name) {
                Some(artist) => artist,
                None => self.create_artist_on(session, &artist_name, None).await?,
            };

            if !album_folders.contains_key(&artist) {
                let folders =
                    list_associations(session, self.artists[artist.0].music_folder).await?;
                album_folders.insert(artist, folders);
            }
            let folders = album_folders.get(&artist).expect("inserted above");
            let music_folder = match folders.get(&name) {
                Some(id) => *id,
                None => {
                    session
                        .create_directory(&name, self.artists[artist.0].music_folder, self.storage)
                        .await?
                }
            };

            let record = AlbumRecord {
                object: entry.object,
                music_folder,
                artist,
                name: name.clone(),
                year,
                refs_loaded: false,
                refs: Default::default(),
                tracks: Vec::new(),
            };
            let album_ref = AlbumRef(self.albums.len());
            self.albums.push(record);
            self.albums_by_key.insert((artist, name), album_ref);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    pub fn storage(&self) -> StorageId {
        self.storage
    }

    pub fn cover_art_supported(&self) -> bool {
        self.album_cover_supported
    }

    pub fn artist(&self, artist: ArtistRef) -> &ArtistRecord {
        &self.artists[artist.0]
    }

    pub fn album(&self, album: AlbumRef) -> &AlbumRecord {
        &self.albums[album.0]
    }

    pub fn find_artist(&self, name: &str) -> Option<ArtistRef> {
        self.artists_by_name.get(normalise(name, UNKNOWN_ARTIST)).copied()
    }

    pub fn find_album(&self, artist: ArtistRef, name: &str) -> Option<AlbumRef> {
        let name = normalise(name, UNKNOWN_ALBUM);
        self.albums_by_key.get(&(artist, name.to_string())).copied()
    }

    pub fn albums_by_artist(&self, artist: ArtistRef) -> Vec<AlbumRef> {
        self.albums
            .iter()
            .enumerate()
            .filter(|(_, album)| album.artist == artist)
            .map(|(i, _)| AlbumRef(i))
            .collect()
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Create an artist, or return the existing record of the same name.
    pub async fn create_artist(&mut self, name: &str, guid: Option<&str>) -> Result<ArtistRef> {
        if let Some(existing) = self.find_artist(name) {
            return Ok(existing);
        }
        let session = self.session.clone();
        let mut session = session.lock().await;
        self.create_artist_on(&mut session, name, guid).await
    }

    async fn create_artist_on(
        &mut self,
        session: &mut Session,
        name: &str,
        guid: Option<&str>,
    ) -> Result<ArtistRef> {
        let name = normalise(name, UNKNOWN_ARTIST).to_string();
        if let Some(existing) = self.artists_by_name.get(&name) {
            return Ok(*existing);
        }

        let music_folder = get_or_create(session, &name, self.music_folder, self.storage).await?;
        let guid_bytes = guid.and_then(parse_guid);

        let object = if self.artist_supported {
            let artists_folder = self
                .artists_folder
                .ok_or_else(|| Error::NotFound("artists folder missing".into()))?;

            let mut props = PropertyListBuilder::new();
            if let Some(guid_bytes) = &guid_bytes {
                // GUID-bound firmwares want the four-property metadata form
                // followed by an empty data phase.
                props.u8(ObjectPropertyCode::ZuneCollectionId, 0);
                props.string(ObjectPropertyCode::ObjectFilename, &format!("{name}.art"))?;
                props.u128(ObjectPropertyCode::ZuneGuid, guid_bytes);
                props.string(ObjectPropertyCode::Name, &name)?;

                for prop in [
                    ObjectPropertyCode::ZuneCollectionId,
                    ObjectPropertyCode::ObjectFilename,
                    ObjectPropertyCode::ZuneGuid,
                    ObjectPropertyCode::Name,
                ] {
                    // Descriptor queries mirror the vendor sync client; some
                    // firmwares refuse them, which is harmless.
                    let _ = session.get_object_prop_desc(prop, ObjectFormat::Artist).await;
                }
            } else {
                props.string(ObjectPropertyCode::Name, &name)?;
                props.string(ObjectPropertyCode::ObjectFilename, &format!("{name}.art"))?;
            }

            let outcome = session
                .send_object_prop_list(
                    self.storage,
                    artists_folder,
                    ObjectFormat::Artist,
                    0,
                    &props.build(),
                )
                .await?;
            if guid_bytes.is_some() {
                let mut empty = VecSource::new(Vec::new());
                session.send_object(&mut empty).await?;
            }
            info!(artist = %name, object = %outcome.object, "created artist object");
            outcome.object
        } else {
            ObjectId::ROOT
        };

        let record = ArtistRecord { object, music_folder, name: name.clone(), guid: guid_bytes };
        let artist_ref = ArtistRef(self.artists.len());
        self.artists.push(record);
        self.artists_by_name.insert(name, artist_ref);
        Ok(artist_ref)
    }

    /// Attach a GUID to an artist record (cache only; the device object is
    /// written at creation time).
    pub fn update_artist_guid(&mut self, artist: ArtistRef, guid: &str) {
        match parse_guid(guid) {
            Some(bytes) => self.artists[artist.0].guid = Some(bytes),
            None => warn!(guid, "ignoring malformed artist GUID"),
        }
    }

    /// Create an album under an artist, or return the existing record.
    pub async fn create_album(
        &mut self,
        artist: ArtistRef,
        name: &str,
        year: i32,
    ) -> Result<AlbumRef> {
        let name = normalise(name, UNKNOWN_ALBUM).to_string();
        if let Some(existing) = self.albums_by_key.get(&(artist, name.clone())) {
            return Ok(*existing);
        }

        let session = self.session.clone();
        let mut session = session.lock().await;

        let artist_record = &self.artists[artist.0];
        let mut props = PropertyListBuilder::new();
        self.push_artist_reference(&mut props, artist)?;
        props.string(ObjectPropertyCode::Name, &name)?;
        props.string(
            ObjectPropertyCode::ObjectFilename,
            &format!("{}--{}.alb", artist_record.name, name),
        )?;
        let send_year = year != 0 && self.album_date_supported;
        if send_year {
            props.string(ObjectPropertyCode::DateAuthored, &format_year(year))?;
        }

        let music_folder =
            get_or_create(&mut session, &name, artist_record.music_folder, self.storage).await?;

        let outcome = session
            .send_object_prop_list(
                self.storage,
                self.albums_folder,
                ObjectFormat::AbstractAudioAlbum,
                0,
                &props.build(),
            )
            .await?;
        info!(album = %name, object = %outcome.object, "created album object");

        let record = AlbumRecord {
            object: outcome.object,
            music_folder,
            artist,
            name: name.clone(),
            year,
            refs_loaded: false,
            refs: Default::default(),
            tracks: Vec::new(),
        };
        let album_ref = AlbumRef(self.albums.len());
        self.albums.push(record);
        self.albums_by_key.insert((artist, name), album_ref);
        Ok(album_ref)
    }

    /// Announce a track object under the album's music folder. The caller
    /// sends the payload bytes with `Session::send_object` afterwards, then
    /// registers the track with [`Library::add_track`].
    #[allow(clippy::too_many_arguments)]
    pub async fn create_track(
        &mut self,
        artist: ArtistRef,
        album: AlbumRef,
        format: ObjectFormat,
        name: &str,
        genre: &str,
        track_index: u16,
        filename: &str,
        size: u64,
    ) -> Result<NewTrack> {
        let mut props = PropertyListBuilder::new();
        self.push_artist_reference(&mut props, artist)?;
        props.string(ObjectPropertyCode::Name, name)?;
        if track_index != 0 {
            props.u16(ObjectPropertyCode::Track, track_index);
        }
        if !genre.is_empty() {
            props.string(ObjectPropertyCode::Genre, genre)?;
        }
        props.string(ObjectPropertyCode::ObjectFilename, filename)?;

        let music_folder = self.albums[album.0].music_folder;
        let session = self.session.clone();
        let mut session = session.lock().await;
        let outcome = session
            .send_object_prop_list(self.storage, music_folder, format, size, &props.build())
            .await?;

        Ok(NewTrack { object: outcome.object, name: name.to_string(), index: track_index })
    }

    /// ArtistId reference when artist objects exist, artist name string
    /// otherwise.
    fn push_artist_reference(
        &self,
        props: &mut PropertyListBuilder,
        artist: ArtistRef,
    ) -> Result<()> {
        let record = &self.artists[artist.0];
        if self.artist_supported {
            props.u32(ObjectPropertyCode::ArtistId, record.object.raw());
        } else {
            props.string(ObjectPropertyCode::Artist, &record.name)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Track references
    // ------------------------------------------------------------------

    /// Pull an album's reference list and per-track names once.
    pub async fn load_refs(&mut self, album: AlbumRef) -> Result<()> {
        if self.albums[album.0].refs_loaded {
            return Ok(());
        }
        let object = self.albums[album.0].object;
        let session = self.session.clone();
        let mut session = session.lock().await;

        let refs = session.get_object_references(object).await?;
        let mut tracks = Vec::with_capacity(refs.len());
        for track in &refs {
            let name = session
                .get_object_string_property(*track, ObjectPropertyCode::Name)
                .await?;
            let index = session
                .get_object_integer_property(*track, ObjectPropertyCode::Track)
                .await
                .unwrap_or(0) as u16;
            debug!(track = %name, index, "album reference");
            tracks.push((name, index));
        }

        let record = &mut self.albums[album.0];
        record.refs = refs.into_iter().collect();
        record.tracks = tracks;
        record.refs_loaded = true;
        Ok(())
    }

    /// Whether the album already references a track of this name and index.
    pub async fn has_track(&mut self, album: AlbumRef, name: &str, index: u16) -> Result<bool> {
        self.load_refs(album).await?;
        Ok(self.albums[album.0]
            .tracks
            .iter()
            .any(|(n, i)| n == name && *i == index))
    }

    /// Register a created track in the album's reference list.
    pub async fn add_track(&mut self, album: AlbumRef, track: &NewTrack) -> Result<()> {
        self.load_refs(album).await?;

        let record = &self.albums[album.0];
        let mut refs: Vec<ObjectId> = record.refs.iter().copied().collect();
        refs.push(track.object);

        let object = record.object;
        let session = self.session.clone();
        let mut session = session.lock().await;
        if let Err(e) = session.set_object_references(object, &refs).await {
            // Stale cache until the next load_refs round-trip.
            self.albums[album.0].invalidate();
            return Err(e);
        }
        drop(session);

        let record = &mut self.albums[album.0];
        record.refs.insert(track.object);
        record.tracks.push((track.name.clone(), track.index));
        Ok(())
    }

    /// Device-authoritative track list for an album.
    pub async fn tracks_for_album(&mut self, album: AlbumRef) -> Result<Vec<ObjectId>> {
        self.load_refs(album).await?;
        Ok(self.albums[album.0].refs.iter().copied().collect())
    }

    // ------------------------------------------------------------------
    // Covers and retrofits
    // ------------------------------------------------------------------

    /// Attach cover art to an album.
    pub async fn add_cover(&mut self, album: AlbumRef, data: &[u8]) -> Result<()> {
        if !self.album_cover_supported {
            return Err(Error::NotSupported("cover art on this device"));
        }
        let object = self.albums[album.0].object;
        debug!(bytes = data.len(), %object, "sending album cover");
        let session = self.session.clone();
        let mut session = session.lock().await;
        session
            .set_object_property_as_array(object, ObjectPropertyCode::RepresentativeSampleData, data)
            .await
    }

    /// Re-point an album at a different artist, on the device and in the
    /// cache.
    pub async fn update_album_artist(&mut self, album: AlbumRef, new_artist: ArtistRef) -> Result<()> {
        let object = self.albums[album.0].object;
        self.write_artist_reference(object, new_artist).await?;

        let old_key = (self.albums[album.0].artist, self.albums[album.0].name.clone());
        self.albums_by_key.remove(&old_key);
        self.albums[album.0].artist = new_artist;
        self.albums_by_key
            .insert((new_artist, self.albums[album.0].name.clone()), album);
        Ok(())
    }

    /// Re-point a single track at a different artist.
    pub async fn update_track_artist(&mut self, track: ObjectId, new_artist: ArtistRef) -> Result<()> {
        self.write_artist_reference(track, new_artist).await
    }

    async fn write_artist_reference(&self, object: ObjectId, artist: ArtistRef) -> Result<()> {
        let record = &self.artists[artist.0];
        let session = self.session.clone();
        let mut session = session.lock().await;
        if self.artist_supported {
            session
                .set_object_u32_property(object, ObjectPropertyCode::ArtistId, record.object.raw())
                .await
        } else {
            session
                .set_object_string_property(object, ObjectPropertyCode::Artist, &record.name)
                .await
        }
    }
}

fn normalise<'a>(name: &'a str, fallback: &'static str) -> &'a str {
    if name.trim().is_empty() {
        fallback
    } else {
        name
    }
}

/// Map of association name to object id under `parent`.
async fn list_associations(
    session: &mut Session,
    parent: ObjectId,
) -> Result<HashMap<String, ObjectId>> {
    let data = session
        .get_object_prop_list(
            parent,
            Some(ObjectFormat::Association),
            ObjectPropertyCode::ObjectFilename.to_u16() as u32,
            0,
            1,
        )
        .await?;
    let mut out = HashMap::new();
    for entry in proplist::parse(&data)? {
        if let Some(name) = entry.value.as_str() {
            out.insert(name.to_string(), entry.object);
        }
    }
    Ok(out)
}

/// Find a child association by name, creating it when absent.
async fn get_or_create(
    session: &mut Session,
    name: &str,
    parent: ObjectId,
    storage: StorageId,
) -> Result<ObjectId> {
    let children = session
        .get_object_handles(storage, Some(ObjectFormat::Association), parent)
        .await?;
    for child in children {
        let child_name = session
            .get_object_string_property(child, ObjectPropertyCode::ObjectFilename)
            .await?;
        if child_name == name {
            return Ok(child);
        }
    }
    session.create_directory(name, parent, storage).await
}
