//! Read-only segment serving against the registry and filesystem.

use bytes::Bytes;

use super::registry::SessionRegistry;
use super::session::SessionStatus;
use super::{MANIFEST_NAME, StreamError, StreamResult};

/// Live playlists must never be cached by an intermediary; they change
/// every few seconds.
const PLAYLIST_CACHE: &str = "no-cache, no-store, must-revalidate";
/// Segments are immutable once written.
const SEGMENT_CACHE: &str = "public, max-age=31536000, immutable";

/// File content plus the transport headers it must be served with.
#[derive(Debug)]
pub struct SegmentData {
    pub bytes: Bytes,
    pub content_type: &'static str,
    pub cache_control: &'static str,
}

/// Resolves a (session id, filename) request.
///
/// The registry, never the filesystem, decides session existence: stale
/// requests against a removed session return `SessionNotFound` even while
/// the working directory still awaits its delayed deletion.
///
/// # Errors
/// - `StreamError::SessionNotFound` - unknown session id
/// - `StreamError::NotReady` - manifest requested while still `starting`
/// - `StreamError::FileNotFound` - absent or not-yet-written file
pub async fn serve_segment(
    registry: &SessionRegistry,
    id: &str,
    filename: &str,
) -> StreamResult<SegmentData> {
    let Some((dir, status)) = registry
        .with_session(id, |session| (session.dir.clone(), session.status))
        .await
    else {
        return Err(StreamError::SessionNotFound { id: id.to_string() });
    };

    if !is_safe_filename(filename) {
        return Err(StreamError::FileNotFound {
            name: filename.to_string(),
        });
    }

    let path = dir.join(filename);
    let metadata = match tokio::fs::metadata(&path).await {
        Ok(metadata) => metadata,
        Err(_) => {
            // The manifest is expected to be late while starting; tell the
            // client to retry instead of giving up.
            if filename == MANIFEST_NAME && status == SessionStatus::Starting {
                return Err(StreamError::NotReady { id: id.to_string() });
            }
            return Err(StreamError::FileNotFound {
                name: filename.to_string(),
            });
        }
    };

    // Zero-length means mid-write; serving a half-written manifest breaks
    // players in confusing ways.
    if metadata.len() == 0 {
        return Err(StreamError::FileNotFound {
            name: filename.to_string(),
        });
    }

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| StreamError::Io {
            operation: format!("read {filename}"),
            source: e,
        })?;

    let (content_type, cache_control) = if filename.ends_with(".m3u8") {
        ("application/vnd.apple.mpegurl", PLAYLIST_CACHE)
    } else if filename.ends_with(".ts") {
        ("video/mp2t", SEGMENT_CACHE)
    } else {
        ("application/octet-stream", PLAYLIST_CACHE)
    };

    Ok(SegmentData {
        bytes: Bytes::from(bytes),
        content_type,
        cache_control,
    })
}

/// Rejects path traversal; session directories hold flat filenames only.
fn is_safe_filename(name: &str) -> bool {
    !name.is_empty()
        && !name.contains('/')
        && !name.contains('\\')
        && name != "."
        && name != ".."
        && !name.starts_with('.')
}
