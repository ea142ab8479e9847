use serenity::model::id::UserId;
use std::time::Duration;

/// De dónde salió un track resuelto
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOrigin {
    Search,
    DirectUrl,
    /// Posición del miembro dentro de la playlist original
    PlaylistMember { index: usize },
}

impl TrackOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackOrigin::Search => "search",
            TrackOrigin::DirectUrl => "direct",
            TrackOrigin::PlaylistMember { .. } => "playlist",
        }
    }
}

/// Unidad inmutable de audio reproducible.
///
/// `duration == Duration::ZERO` means the extractor did not report a length.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    title: String,
    locator: String,
    thumbnail: Option<String>,
    duration: Duration,
    origin: TrackOrigin,
    requested_by: Option<UserId>,
}

impl Track {
    pub fn new(title: String, locator: String, origin: TrackOrigin) -> Self {
        Self {
            title,
            locator,
            thumbnail: None,
            duration: Duration::ZERO,
            origin,
            requested_by: None,
        }
    }

    // Getters
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn locator(&self) -> &str {
        &self.locator
    }
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }
    pub fn duration(&self) -> Duration {
        self.duration
    }
    pub fn origin(&self) -> TrackOrigin {
        self.origin
    }
    pub fn requested_by(&self) -> Option<UserId> {
        self.requested_by
    }

    pub fn has_known_duration(&self) -> bool {
        !self.duration.is_zero()
    }

    // Builders
    pub fn with_thumbnail(mut self, thumbnail: String) -> Self {
        self.thumbnail = Some(thumbnail);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_origin(mut self, origin: TrackOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_requested_by(mut self, user_id: UserId) -> Self {
        self.requested_by = Some(user_id);
        self
    }
}

/// Resultado de resolver una consulta
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Single(Track),
    Playlist {
        title: Option<String>,
        tracks: Vec<Track>,
    },
}

impl Resolved {
    /// Tracks en el orden devuelto por la fuente
    pub fn into_tracks(self) -> Vec<Track> {
        match self {
            Resolved::Single(track) => vec![track],
            Resolved::Playlist { tracks, .. } => tracks,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Resolved::Single(_) => 1,
            Resolved::Playlist { tracks, .. } => tracks.len(),
        }
    }

    /// Stamps every track with the requesting user.
    pub fn requested_by(self, user_id: UserId) -> Self {
        match self {
            Resolved::Single(track) => Resolved::Single(track.with_requested_by(user_id)),
            Resolved::Playlist { title, tracks } => Resolved::Playlist {
                title,
                tracks: tracks
                    .into_iter()
                    .map(|t| t.with_requested_by(user_id))
                    .collect(),
            },
        }
    }
}
