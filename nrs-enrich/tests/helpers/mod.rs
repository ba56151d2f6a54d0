// Test helpers: in-process transport and adapters
//
// Nothing here touches the network. `CannedTransport` serves fixed JSON
// bodies by URL; the adapters on top of it exercise the real fetch layer,
// response cache, credentials and track accessors.

#![allow(dead_code)]

use async_trait::async_trait;
use nrs_common::human_time::parse_track_length;
use nrs_enrich::error::{AdapterError, AdapterResult, FetchError};
use nrs_enrich::services::credentials::CredentialStore;
use nrs_enrich::services::fetch::{
    build_url, FetchRequest, FetchedResponse, Fetcher, MemoryCache, Transport,
};
use nrs_enrich::services::tracks::{PageFetcher, Paginator, StaticTracks};
use nrs_enrich::catalog::id::AnimeDatabase;
use nrs_enrich::services::{Adapter, AnimeLookup};
use nrs_enrich::types::{
    locate_track, pick_title, AlbumRecord, AnimeIds, ArtistRecord, Disc, Reference,
    ServiceRecord, TrackAccessor, TrackRecord,
};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ================================================================================================
// Transport
// ================================================================================================

/// Serves canned bodies by exact URL; anything else is a 404
#[derive(Default)]
pub struct CannedTransport {
    responses: Mutex<HashMap<String, String>>,
    requests: Mutex<Vec<(String, Option<String>)>>,
}

impl CannedTransport {
    pub fn with(self, url: &str, body: serde_json::Value) -> Self {
        self.with_raw(url, &body.to_string())
    }

    pub fn with_raw(self, url: &str, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), body.to_string());
        self
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(requested, _)| requested == url)
            .count()
    }

    pub fn bearer_tokens(&self) -> Vec<Option<String>> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, bearer)| bearer.clone())
            .collect()
    }
}

#[async_trait]
impl Transport for CannedTransport {
    async fn send(&self, request: &FetchRequest) -> Result<FetchedResponse, FetchError> {
        self.requests
            .lock()
            .unwrap()
            .push((request.url.clone(), request.bearer.clone()));

        match self.responses.lock().unwrap().get(&request.url) {
            Some(text) => Ok(FetchedResponse {
                text: text.clone(),
                url: request.url.clone(),
                redirected: false,
            }),
            None => Err(FetchError::Status {
                url: request.url.clone(),
                status: 404,
            }),
        }
    }
}

pub fn fetcher(transport: &Arc<CannedTransport>) -> Fetcher {
    Fetcher::new(transport.clone(), Arc::new(MemoryCache::new()))
}

fn into_adapter_error(error: FetchError) -> AdapterError {
    match error {
        FetchError::Decode { message, .. } => AdapterError::UpstreamShape(message),
        other => AdapterError::Network(other),
    }
}

// ================================================================================================
// Release database adapter (vgmdb-shaped)
// ================================================================================================

pub const DB_API: &str = "https://db.test/api";

#[derive(Debug, Deserialize)]
struct DbEntity {
    names: BTreeMap<String, String>,
    #[serde(default)]
    discs: Vec<DbDisc>,
    #[serde(default)]
    links: Vec<DbLink>,
}

#[derive(Debug, Deserialize)]
struct DbDisc {
    name: String,
    tracks: Vec<DbTrack>,
}

#[derive(Debug, Deserialize)]
struct DbTrack {
    names: BTreeMap<String, String>,
    track_length: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DbLink {
    name: String,
    link: String,
}

pub struct DbUrl {
    kind: String,
    api_url: String,
    track_index: Option<usize>,
}

/// Understands `https://vgmdb.net/{album,artist}/<n>[?trackindex=<i>]`
pub struct DbAdapter {
    fetcher: Fetcher,
}

impl DbAdapter {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Adapter for DbAdapter {
    type Url = DbUrl;

    async fn parse_url(&self, raw: &str) -> AdapterResult<Option<DbUrl>> {
        let Some(rest) = raw.strip_prefix("https://vgmdb.net/") else {
            return Ok(None);
        };
        let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
        let Some((kind, id)) = path.split_once('/') else {
            return Ok(None);
        };
        if kind != "album" && kind != "artist" {
            return Ok(None);
        }

        Ok(Some(DbUrl {
            kind: kind.to_string(),
            api_url: format!("{}/{}/{}", DB_API, kind, id),
            track_index: query
                .strip_prefix("trackindex=")
                .and_then(|index| index.parse().ok()),
        }))
    }

    async fn load(&self, url: &DbUrl) -> AdapterResult<Option<ServiceRecord>> {
        let entity: DbEntity = match self.fetcher.fetch_json(&url.api_url, None).await {
            Ok(entity) => entity,
            Err(FetchError::Status { status: 404, .. }) => return Ok(None),
            Err(e) => return Err(into_adapter_error(e)),
        };

        let references: Vec<Reference> = entity
            .links
            .iter()
            .map(|link| Reference::new(link.name.as_str(), link.link.as_str()))
            .collect();

        if url.kind == "artist" {
            return Ok(Some(ServiceRecord::Artist(ArtistRecord {
                title: pick_title(&entity.names),
                references,
            })));
        }

        let discs: Vec<Disc> = entity
            .discs
            .iter()
            .map(|disc| Disc {
                name: disc.name.clone(),
                track_count: disc.tracks.len(),
            })
            .collect();
        let tracks: Vec<TrackRecord> = entity
            .discs
            .iter()
            .flat_map(|disc| disc.tracks.iter())
            .map(|track| TrackRecord {
                title: pick_title(&track.names),
                length: track.track_length.as_deref().and_then(parse_track_length),
                ..Default::default()
            })
            .collect();

        if let Some(index) = url.track_index {
            if locate_track(&discs, index).is_none() {
                return Ok(None);
            }
            return Ok(tracks.get(index).cloned().map(ServiceRecord::Track));
        }

        Ok(Some(ServiceRecord::Album(AlbumRecord {
            title: pick_title(&entity.names),
            artists: None,
            discs: Some(discs),
            tracks: Some(TrackAccessor::new(StaticTracks::new(tracks))),
            references,
        })))
    }
}

// ================================================================================================
// Music store adapter (spotify-shaped, paged tracks, bearer auth)
// ================================================================================================

pub const STORE_API: &str = "https://store.test/v1";
pub const STORE_PAGE_SIZE: usize = 25;

#[derive(Debug, Deserialize)]
struct StoreAlbum {
    name: String,
    #[serde(default)]
    artists: Vec<String>,
    #[serde(default)]
    external_links: Vec<DbLink>,
}

#[derive(Debug, Deserialize)]
struct StorePage {
    items: Vec<StoreTrack>,
}

#[derive(Debug, Deserialize)]
struct StoreTrack {
    name: String,
    duration_ms: u64,
    url: String,
}

struct StorePages {
    fetcher: Fetcher,
    album_id: String,
    token: String,
}

#[async_trait]
impl PageFetcher for StorePages {
    async fn fetch_page(&self, page: usize, page_size: usize) -> AdapterResult<Vec<TrackRecord>> {
        let offset = (page * page_size).to_string();
        let limit = page_size.to_string();
        let url = build_url(
            &format!("{}/albums/{}/tracks", STORE_API, self.album_id),
            &[("offset", Some(offset.as_str())), ("limit", Some(limit.as_str()))],
        )?;

        let page: StorePage = self
            .fetcher
            .fetch_json(&url, Some(self.token.as_str()))
            .await
            .map_err(into_adapter_error)?;
        Ok(page
            .items
            .into_iter()
            .map(|track| TrackRecord {
                title: Some(track.name),
                length: Some(Duration::from_millis(track.duration_ms)),
                references: vec![Reference::new("spotify", track.url)],
                ..Default::default()
            })
            .collect())
    }
}

/// Understands `https://open.spotify.com/album/<id>`
pub struct StoreAdapter {
    fetcher: Fetcher,
    credentials: Arc<CredentialStore>,
}

impl StoreAdapter {
    pub fn new(fetcher: Fetcher, credentials: Arc<CredentialStore>) -> Self {
        Self {
            fetcher,
            credentials,
        }
    }
}

#[async_trait]
impl Adapter for StoreAdapter {
    type Url = String;

    async fn parse_url(&self, raw: &str) -> AdapterResult<Option<String>> {
        Ok(raw
            .strip_prefix("https://open.spotify.com/album/")
            .map(|id| id.trim_end_matches('/').to_string()))
    }

    async fn load(&self, album_id: &String) -> AdapterResult<Option<ServiceRecord>> {
        let token = self.credentials.bearer_token("spotify").await?.to_string();
        let url = format!("{}/albums/{}", STORE_API, album_id);
        let album: StoreAlbum = match self.fetcher.fetch_json(&url, Some(token.as_str())).await {
            Ok(album) => album,
            Err(FetchError::Status { status: 404, .. }) => return Ok(None),
            Err(e) => return Err(into_adapter_error(e)),
        };

        let pages = StorePages {
            fetcher: self.fetcher.clone(),
            album_id: album_id.clone(),
            token,
        };
        Ok(Some(ServiceRecord::Album(AlbumRecord {
            title: Some(album.name),
            artists: Some(album.artists),
            discs: None,
            tracks: Some(TrackAccessor::new(Paginator::new(STORE_PAGE_SIZE, pages))),
            references: album
                .external_links
                .into_iter()
                .map(|link| Reference::new(link.name, link.link))
                .collect(),
        })))
    }
}

// ================================================================================================
// Anime lookup (title database + id relation service)
// ================================================================================================

pub const ANIME_API: &str = "https://anime.test/v4";
pub const RELATIONS_API: &str = "https://relations.test/api/v2";

#[derive(Debug, Deserialize)]
struct AnimeTitles {
    titles: Vec<AnimeTitle>,
}

#[derive(Debug, Deserialize)]
struct AnimeTitle {
    #[serde(rename = "type")]
    kind: String,
    title: String,
}

#[derive(Debug, Deserialize)]
struct Relations {
    myanimelist: Option<u64>,
    anilist: Option<u64>,
    kitsu: Option<u64>,
    anidb: Option<u64>,
}

/// Titles for `A-MAL-*` ids only; cross ids from the relation service
pub struct RelationLookup {
    fetcher: Fetcher,
}

impl RelationLookup {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl AnimeLookup for RelationLookup {
    async fn title(&self, entry_id: &str) -> AdapterResult<Option<String>> {
        let Some(number) = entry_id.strip_prefix("A-MAL-") else {
            return Ok(None);
        };
        let url = format!("{}/anime/{}", ANIME_API, number);
        let titles: AnimeTitles = match self.fetcher.fetch_json(&url, None).await {
            Ok(titles) => titles,
            Err(FetchError::Status { status: 404, .. }) => return Ok(None),
            Err(e) => return Err(into_adapter_error(e)),
        };
        Ok(pick_title(
            titles
                .titles
                .iter()
                .map(|t| (t.kind.as_str(), t.title.as_str())),
        ))
    }

    async fn cross_ids(&self, database: AnimeDatabase, id: &str) -> AdapterResult<Option<AnimeIds>> {
        let url = build_url(
            &format!("{}/ids", RELATIONS_API),
            &[("source", Some(database.relation_name())), ("id", Some(id))],
        )?;
        let relations: Relations = self
            .fetcher
            .fetch_json(&url, None)
            .await
            .map_err(into_adapter_error)?;
        let id = |n: Option<u64>| n.map(|n| n.to_string());
        Ok(Some(AnimeIds {
            mal: id(relations.myanimelist),
            anilist: id(relations.anilist),
            kitsu: id(relations.kitsu),
            anidb: id(relations.anidb),
        }))
    }
}

// ================================================================================================
// Scripted adapter
// ================================================================================================

#[derive(Clone)]
pub enum Scripted {
    Record(ServiceRecord),
    Fail(String),
}

/// Answers from a URL → outcome script and logs every load. URLs not in
/// the script are "no data"; references not starting with `https://` are
/// unrecognized.
#[derive(Clone, Default)]
pub struct ScriptedAdapter {
    scripts: HashMap<String, Scripted>,
    loads: Arc<Mutex<Vec<String>>>,
}

impl ScriptedAdapter {
    pub fn record(mut self, url: &str, record: ServiceRecord) -> Self {
        self.scripts.insert(url.to_string(), Scripted::Record(record));
        self
    }

    pub fn fail(mut self, url: &str, message: &str) -> Self {
        self.scripts
            .insert(url.to_string(), Scripted::Fail(message.to_string()));
        self
    }

    /// Shared load log, still readable after the adapter moves into a registry
    pub fn loads(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.loads)
    }
}

#[async_trait]
impl Adapter for ScriptedAdapter {
    type Url = String;

    async fn parse_url(&self, raw: &str) -> AdapterResult<Option<String>> {
        Ok(raw.starts_with("https://").then(|| raw.to_string()))
    }

    async fn load(&self, url: &String) -> AdapterResult<Option<ServiceRecord>> {
        self.loads.lock().unwrap().push(url.clone());
        match self.scripts.get(url) {
            Some(Scripted::Record(record)) => Ok(Some(record.clone())),
            Some(Scripted::Fail(message)) => Err(AdapterError::UpstreamShape(message.clone())),
            None => Ok(None),
        }
    }
}

pub fn album(title: &str, references: Vec<Reference>) -> ServiceRecord {
    ServiceRecord::Album(AlbumRecord {
        title: Some(title.to_string()),
        references,
        ..Default::default()
    })
}
