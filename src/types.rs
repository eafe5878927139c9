//! Core types for article-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Category of a binary resource referenced by an article
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// Inline `<img>` or gallery picture
    Image,
    /// CSS `background[-image]: url(...)`
    Background,
    /// Video stream (selected rendition)
    Video,
    /// Audio stream of an audio widget
    Audio,
    /// Cover/poster image of an audio or video card
    Card,
}

impl AssetKind {
    /// Stable lowercase name, used in logs and events
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Image => "image",
            AssetKind::Background => "background",
            AssetKind::Video => "video",
            AssetKind::Audio => "audio",
            AssetKind::Card => "card",
        }
    }
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layout variant of an article document, decided from its marker elements
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleShape {
    /// Regular article body
    #[default]
    Plain,
    /// Picture gallery post
    ImageShare,
    /// Single video post
    VideoShare,
    /// Forwarded card pointing at another article
    CardForward,
}

/// Terminal state of one asset reference after its batch ran
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AssetOutcome {
    /// Bytes written and the document now points at the local path
    Saved {
        /// Path relative to the archive directory (`./assets/<id>.<ext>`)
        path: String,
    },
    /// Fetch or patch failed; the document keeps the origin URL
    Skipped {
        /// Why the asset was not saved
        reason: String,
    },
}

/// Ledger entry for one asset reference
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Asset category
    pub kind: AssetKind,
    /// Origin URL as found in the document
    pub url: String,
    /// Terminal state
    pub outcome: AssetOutcome,
}

impl AssetRecord {
    /// Whether the asset was saved locally
    pub fn is_saved(&self) -> bool {
        matches!(self.outcome, AssetOutcome::Saved { .. })
    }
}

/// Event emitted by the downloader
///
/// Events are broadcast to all subscribers and can be used to track progress,
/// update UIs, or trigger external actions.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Article document fetched and checked for availability
    ArticleFetched {
        /// Article URL
        url: String,
        /// Size of the document in bytes
        bytes: usize,
    },

    /// An archive already exists for the article; nothing was fetched
    ArticleSkipped {
        /// Archive directory that already holds an index document
        dir: PathBuf,
    },

    /// The article was deleted by its author
    ArticleDeleted {
        /// Article URL
        url: String,
    },

    /// Acquiring the article failed
    ArticleFailed {
        /// Article URL
        url: String,
        /// Error message
        error: String,
    },

    /// Asset bytes saved and reference rewritten
    AssetSaved {
        /// Asset category
        kind: AssetKind,
        /// Origin URL
        url: String,
        /// Local relative path
        path: String,
    },

    /// Asset could not be saved; the origin URL stays in the document
    AssetSkipped {
        /// Asset category
        kind: AssetKind,
        /// Origin URL
        url: String,
        /// Reason
        reason: String,
    },

    /// All tasks of one category batch finished
    BatchComplete {
        /// Batch category
        kind: AssetKind,
        /// Tasks that saved their asset
        saved: usize,
        /// Tasks that were skipped
        skipped: usize,
    },

    /// The index document was written
    ArchiveWritten {
        /// Path of the written index document
        index: PathBuf,
        /// Number of saved assets
        saved: usize,
        /// Number of skipped assets
        skipped: usize,
    },

    /// Recompressing a saved image failed (the original file is kept)
    CompressionFailed {
        /// File that could not be recompressed
        path: PathBuf,
        /// Error message
        error: String,
    },
}
