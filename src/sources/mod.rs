pub mod youtube;

use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use url::Url;

use crate::audio::track::{Resolved, Track, TrackOrigin};

pub use youtube::YtDlp;

/// Fallos al resolver una consulta
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResolutionError {
    #[error("no results for `{0}`")]
    NotFound(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Convierte la consulta de un usuario en tracks reproducibles
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackResolver: Send + Sync {
    async fn resolve(&self, query: &str) -> Result<Resolved, ResolutionError>;
}

/// Metadata devuelta por el extractor para un único medio
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaInfo {
    pub title: Option<String>,
    pub locator: String,
    pub thumbnail: Option<String>,
    pub duration_secs: Option<f64>,
}

impl MediaInfo {
    fn into_track(self, origin: TrackOrigin) -> Track {
        let mut track = Track::new(self.title.unwrap_or_default(), self.locator, origin);

        if let Some(secs) = self.duration_secs.filter(|s| s.is_finite() && *s > 0.0) {
            track = track.with_duration(Duration::from_secs_f64(secs));
        }

        if let Some(thumbnail) = self.thumbnail {
            track = track.with_thumbnail(thumbnail);
        }

        track
    }
}

/// Miembros de una playlist, en el orden de la fuente
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaylistListing {
    pub title: Option<String>,
    pub entries: Vec<String>,
}

/// Motor de búsqueda/extracción detrás del resolver
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Metadata for one navigable address
    async fn probe(&self, locator: &str) -> Result<MediaInfo, ResolutionError>;

    /// Best match for free text
    async fn search_first(&self, text: &str) -> Result<MediaInfo, ResolutionError>;

    /// Member addresses of a playlist, at most `limit`
    async fn list_playlist(&self, url: &str, limit: usize) -> Result<PlaylistListing, ResolutionError>;
}

/// Clasificación de una consulta
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind<'a> {
    Direct(&'a str),
    Playlist(&'a str),
    Search(&'a str),
}

impl<'a> QueryKind<'a> {
    /// `None` for a blank query.
    pub fn classify(query: &'a str) -> Option<Self> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }

        let Ok(url) = Url::parse(query) else {
            return Some(QueryKind::Search(query));
        };

        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Some(QueryKind::Search(query));
        }

        let has_list_marker = url.query_pairs().any(|(key, _)| key == "list");
        let path = url.path();
        if has_list_marker || path.starts_with("/playlist") || path.contains("/sets/") {
            Some(QueryKind::Playlist(query))
        } else {
            Some(QueryKind::Direct(query))
        }
    }
}

/// Resolver concreto sobre un [`MediaExtractor`].
///
/// Every extractor call takes a permit from a bounded pool, so a burst of
/// requests across guilds never spawns more than `workers` extractions.
pub struct QueryResolver<E> {
    extractor: Arc<E>,
    workers: Arc<Semaphore>,
    max_playlist_size: usize,
}

impl<E: MediaExtractor> QueryResolver<E> {
    pub fn new(extractor: E, workers: usize, max_playlist_size: usize) -> Self {
        Self {
            extractor: Arc::new(extractor),
            workers: Arc::new(Semaphore::new(workers.max(1))),
            max_playlist_size,
        }
    }

    async fn probe(&self, locator: &str) -> Result<MediaInfo, ResolutionError> {
        let _permit = self.acquire().await?;
        self.extractor.probe(locator).await
    }

    async fn acquire(&self) -> Result<tokio::sync::SemaphorePermit<'_>, ResolutionError> {
        self.workers
            .acquire()
            .await
            .map_err(|_| ResolutionError::Network("resolver pool closed".into()))
    }

    async fn resolve_playlist(&self, url: &str) -> Result<Resolved, ResolutionError> {
        let listing = {
            let _permit = self.acquire().await?;
            self.extractor
                .list_playlist(url, self.max_playlist_size)
                .await?
        };

        info!("📋 Playlist con {} miembros: {}", listing.entries.len(), url);

        let probes = listing
            .entries
            .iter()
            .take(self.max_playlist_size)
            .map(|member| self.probe(member));
        let results = futures::future::join_all(probes).await;

        let mut tracks = Vec::with_capacity(results.len());
        for (index, (member, result)) in listing.entries.iter().zip(results).enumerate() {
            match result {
                Ok(info) => tracks.push(info.into_track(TrackOrigin::PlaylistMember { index })),
                Err(e) => warn!("⏭️ Miembro {} de playlist omitido ({}): {}", index, member, e),
            }
        }

        if tracks.is_empty() {
            return Err(ResolutionError::NotFound(url.to_string()));
        }

        Ok(Resolved::Playlist {
            title: listing.title,
            tracks,
        })
    }
}

#[async_trait]
impl<E: MediaExtractor> TrackResolver for QueryResolver<E> {
    async fn resolve(&self, query: &str) -> Result<Resolved, ResolutionError> {
        let kind =
            QueryKind::classify(query).ok_or_else(|| ResolutionError::NotFound(query.to_string()))?;
        debug!("🔍 Resolviendo {:?}", kind);

        match kind {
            QueryKind::Direct(url) => {
                let info = self.probe(url).await?;
                Ok(Resolved::Single(info.into_track(TrackOrigin::DirectUrl)))
            }
            QueryKind::Playlist(url) => self.resolve_playlist(url).await,
            QueryKind::Search(text) => {
                let info = {
                    let _permit = self.acquire().await?;
                    self.extractor.search_first(text).await?
                };
                Ok(Resolved::Single(info.into_track(TrackOrigin::Search)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    struct FakeExtractor {
        members: Vec<String>,
        broken: HashSet<String>,
    }

    impl FakeExtractor {
        fn with_members(count: usize, broken: &[usize]) -> Self {
            let members: Vec<String> = (0..count)
                .map(|i| format!("https://www.youtube.com/watch?v=m{i}"))
                .collect();
            let broken = broken.iter().map(|i| members[*i].clone()).collect();
            Self { members, broken }
        }
    }

    #[async_trait]
    impl MediaExtractor for FakeExtractor {
        async fn probe(&self, locator: &str) -> Result<MediaInfo, ResolutionError> {
            if self.broken.contains(locator) {
                return Err(ResolutionError::NotFound(locator.to_string()));
            }
            let id = locator.rsplit('=').next().unwrap_or_default();
            Ok(MediaInfo {
                title: Some(format!("title {id}")),
                locator: locator.to_string(),
                thumbnail: None,
                duration_secs: Some(60.0),
            })
        }

        async fn search_first(&self, text: &str) -> Result<MediaInfo, ResolutionError> {
            if text == "nada" {
                return Err(ResolutionError::NotFound(text.to_string()));
            }
            Ok(MediaInfo {
                title: Some(text.to_uppercase()),
                locator: format!("https://www.youtube.com/watch?v={text}"),
                thumbnail: Some("https://i.ytimg.com/x.jpg".into()),
                duration_secs: None,
            })
        }

        async fn list_playlist(&self, _url: &str, limit: usize) -> Result<PlaylistListing, ResolutionError> {
            Ok(PlaylistListing {
                title: Some("mix".into()),
                entries: self.members.iter().take(limit).cloned().collect(),
            })
        }
    }

    #[test]
    fn test_query_classification() {
        assert_eq!(
            QueryKind::classify("https://youtu.be/dQw4w9WgXcQ"),
            Some(QueryKind::Direct("https://youtu.be/dQw4w9WgXcQ"))
        );
        assert_eq!(
            QueryKind::classify("https://www.youtube.com/playlist?list=PL123"),
            Some(QueryKind::Playlist("https://www.youtube.com/playlist?list=PL123"))
        );
        assert_eq!(
            QueryKind::classify("https://www.youtube.com/watch?v=abc&list=PL123"),
            Some(QueryKind::Playlist("https://www.youtube.com/watch?v=abc&list=PL123"))
        );
        assert_eq!(
            QueryKind::classify("https://soundcloud.com/artist/sets/album"),
            Some(QueryKind::Playlist("https://soundcloud.com/artist/sets/album"))
        );
        assert_eq!(
            QueryKind::classify("  never gonna give you up "),
            Some(QueryKind::Search("never gonna give you up"))
        );
        assert_eq!(QueryKind::classify("mailto:someone"), Some(QueryKind::Search("mailto:someone")));
        assert_eq!(QueryKind::classify("   "), None);
    }

    #[tokio::test]
    async fn test_playlist_skips_failed_member_and_keeps_order() {
        let resolver = QueryResolver::new(FakeExtractor::with_members(5, &[2]), 2, 100);

        let resolved = resolver
            .resolve("https://www.youtube.com/playlist?list=PL1")
            .await
            .unwrap();

        let tracks = resolved.into_tracks();
        let titles: Vec<_> = tracks.iter().map(Track::title).collect();
        assert_eq!(titles, vec!["title m0", "title m1", "title m3", "title m4"]);
        assert_eq!(tracks[2].origin(), TrackOrigin::PlaylistMember { index: 3 });
    }

    #[tokio::test]
    async fn test_playlist_respects_size_limit() {
        let resolver = QueryResolver::new(FakeExtractor::with_members(10, &[]), 4, 3);
        let resolved = resolver
            .resolve("https://www.youtube.com/playlist?list=PL1")
            .await
            .unwrap();
        assert_eq!(resolved.len(), 3);
    }

    #[tokio::test]
    async fn test_playlist_with_no_playable_member_is_not_found() {
        let resolver = QueryResolver::new(FakeExtractor::with_members(2, &[0, 1]), 2, 100);
        let err = resolver
            .resolve("https://www.youtube.com/playlist?list=PL1")
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_search_resolves_first_match() {
        let resolver = QueryResolver::new(FakeExtractor::with_members(0, &[]), 1, 100);

        let Resolved::Single(track) = resolver.resolve("lofi").await.unwrap() else {
            panic!("expected a single track");
        };
        assert_eq!(track.title(), "LOFI");
        assert_eq!(track.origin(), TrackOrigin::Search);
        assert!(!track.has_known_duration());
        assert_eq!(track.thumbnail(), Some("https://i.ytimg.com/x.jpg"));

        assert_eq!(
            resolver.resolve("nada").await,
            Err(ResolutionError::NotFound("nada".into()))
        );
        assert!(resolver.resolve("").await.is_err());
    }

    #[tokio::test]
    async fn test_direct_url_probe() {
        let resolver = QueryResolver::new(FakeExtractor::with_members(0, &[]), 1, 100);
        let resolved = resolver
            .resolve("https://www.youtube.com/watch?v=solo")
            .await
            .unwrap();

        let Resolved::Single(track) = resolved else {
            panic!("expected a single track");
        };
        assert_eq!(track.origin(), TrackOrigin::DirectUrl);
        assert_eq!(track.duration(), Duration::from_secs(60));
    }
}
