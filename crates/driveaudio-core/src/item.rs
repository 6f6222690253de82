//! Remote tree types.
//!
//! This module provides the provider-agnostic view of a Drive folder tree:
//! - [`DriveItem`]: A node in the remote tree (folder, audio file, or other)
//! - [`MimeClass`]: The coarse classification derived from a MIME type string
//! - [`PageResult`]: One page of children under a folder
//! - [`DownloadTask`]: A unit of work handed to the download pool

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Coarse classification of a remote item's MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MimeClass {
    /// A container node (`application/vnd.google-apps.folder`).
    Folder,
    /// Any `audio/*` media.
    Audio,
    /// Everything else; skipped by the walker.
    Other,
}

impl MimeClass {
    /// Classifies a MIME type string.
    ///
    /// Matching is by substring, so `application/vnd.google-apps.folder`
    /// is a folder and `audio/x-wav` is audio. Folder wins over audio.
    pub fn from_mime(mime_type: &str) -> Self {
        if mime_type.contains("folder") {
            Self::Folder
        } else if mime_type.contains("audio") {
            Self::Audio
        } else {
            Self::Other
        }
    }

    /// Returns a short lowercase name for log output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Folder => "folder",
            Self::Audio => "audio",
            Self::Other => "other",
        }
    }
}

/// A node in the remote Drive tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveItem {
    /// Unique remote identity.
    pub id: String,
    /// Display name, used as the local file or directory name.
    pub title: String,
    /// The raw MIME type reported by the remote side.
    pub mime_type: String,
    /// Identities of the parent folders.
    #[serde(default)]
    pub parents: Vec<String>,
}

impl DriveItem {
    /// Creates a new item with no parents.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            mime_type: mime_type.into(),
            parents: Vec::new(),
        }
    }

    /// Builder method to set the parent folders.
    pub fn with_parents(mut self, parents: Vec<String>) -> Self {
        self.parents = parents;
        self
    }

    /// Returns the classification of this item.
    pub fn class(&self) -> MimeClass {
        MimeClass::from_mime(&self.mime_type)
    }

    /// Returns true if this item is a folder.
    pub fn is_folder(&self) -> bool {
        self.class() == MimeClass::Folder
    }

    /// Returns true if this item is an audio file.
    pub fn is_audio(&self) -> bool {
        self.class() == MimeClass::Audio
    }

    /// Returns the title as a single local path component.
    ///
    /// Leading separators are stripped and inner ones become `_`, so the
    /// name always stays inside the directory it is joined onto. Returns
    /// `None` for titles that are empty, `.` or `..` after that.
    pub fn local_name(&self) -> Option<String> {
        let name: String = self
            .title
            .trim_start_matches(['/', '\\'])
            .chars()
            .map(|c| match c {
                '/' | '\\' | '\0' => '_',
                c => c,
            })
            .collect();

        let mut components = Path::new(&name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Some(name),
            _ => None,
        }
    }
}

/// One page of child identities under a folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageResult {
    /// The folder whose children were listed.
    pub folder_id: String,
    /// Child identities on this page, in remote order (folders first).
    pub child_ids: Vec<String>,
    /// Cursor for the next page, if more children exist.
    pub next_page_token: Option<String>,
}

impl PageResult {
    /// Creates a page with the given children and no continuation.
    pub fn new(folder_id: impl Into<String>, child_ids: Vec<String>) -> Self {
        Self {
            folder_id: folder_id.into(),
            child_ids,
            next_page_token: None,
        }
    }

    /// Creates an empty page.
    pub fn empty(folder_id: impl Into<String>) -> Self {
        Self::new(folder_id, Vec::new())
    }

    /// Builder method to set the continuation token.
    pub fn with_next_page_token(mut self, token: impl Into<String>) -> Self {
        self.next_page_token = Some(token.into());
        self
    }

    /// Returns true if the page holds no children.
    pub fn is_empty(&self) -> bool {
        self.child_ids.is_empty()
    }

    /// Returns true if another page follows.
    pub fn has_more(&self) -> bool {
        self.next_page_token.is_some()
    }
}

/// A single file download, immutable once dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    /// Remote identity of the file.
    pub file_id: String,
    /// Local directory the file is written into.
    pub destination: PathBuf,
    /// Local filename (the remote title).
    pub filename: String,
}

impl DownloadTask {
    /// Creates a new download task.
    pub fn new(
        file_id: impl Into<String>,
        destination: impl Into<PathBuf>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            file_id: file_id.into(),
            destination: destination.into(),
            filename: filename.into(),
        }
    }

    /// Returns the full local path the file is written to.
    pub fn target_path(&self) -> PathBuf {
        self.destination.join(&self.filename)
    }

    /// Returns the destination directory.
    pub fn destination(&self) -> &Path {
        &self.destination
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_folder() {
        assert_eq!(
            MimeClass::from_mime("application/vnd.google-apps.folder"),
            MimeClass::Folder
        );
    }

    #[test]
    fn classify_audio() {
        assert_eq!(MimeClass::from_mime("audio/x-wav"), MimeClass::Audio);
        assert_eq!(MimeClass::from_mime("audio/mpeg"), MimeClass::Audio);
    }

    #[test]
    fn classify_other() {
        assert_eq!(MimeClass::from_mime("application/pdf"), MimeClass::Other);
        assert_eq!(MimeClass::from_mime(""), MimeClass::Other);
    }

    #[test]
    fn item_class_helpers() {
        let folder = DriveItem::new("f1", "Session 1", "application/vnd.google-apps.folder");
        assert!(folder.is_folder());
        assert!(!folder.is_audio());

        let take = DriveItem::new("a1", "take1.wav", "audio/wav").with_parents(vec!["f1".into()]);
        assert!(take.is_audio());
        assert_eq!(take.parents, vec!["f1".to_string()]);
    }

    #[test]
    fn local_name_keeps_plain_titles() {
        let item = DriveItem::new("a1", "Track 01 (live).mp3", "audio/mpeg");
        assert_eq!(item.local_name().as_deref(), Some("Track 01 (live).mp3"));

        let dotted = DriveItem::new("a2", "...mp3", "audio/mpeg");
        assert_eq!(dotted.local_name().as_deref(), Some("...mp3"));
    }

    #[test]
    fn local_name_flattens_separators() {
        let absolute = DriveItem::new("f1", "/etc/cron.d", "application/vnd.google-apps.folder");
        assert_eq!(absolute.local_name().as_deref(), Some("etc_cron.d"));

        let nested = DriveItem::new("f2", "a/b\\c", "application/vnd.google-apps.folder");
        assert_eq!(nested.local_name().as_deref(), Some("a_b_c"));

        let upward = DriveItem::new("f3", "../escape", "application/vnd.google-apps.folder");
        assert_eq!(upward.local_name().as_deref(), Some(".._escape"));
    }

    #[test]
    fn local_name_rejects_unusable_titles() {
        for title in ["", ".", "..", "/", "//..", "\\."] {
            let item = DriveItem::new("x", title, "audio/mpeg");
            assert_eq!(item.local_name(), None, "title {:?}", title);
        }
    }

    #[test]
    fn page_result_continuation() {
        let page = PageResult::new("root", vec!["c1".into()]).with_next_page_token("tok");
        assert!(!page.is_empty());
        assert!(page.has_more());

        let empty = PageResult::empty("root");
        assert!(empty.is_empty());
        assert!(!empty.has_more());
    }

    #[test]
    fn download_task_target_path() {
        let task = DownloadTask::new("a1", "/music/Session 1", "take1.wav");
        assert_eq!(
            task.target_path(),
            PathBuf::from("/music/Session 1/take1.wav")
        );
        assert_eq!(task.destination(), Path::new("/music/Session 1"));
    }

    #[test]
    fn mime_class_serializes_snake_case() {
        let json = serde_json::to_string(&MimeClass::Audio).unwrap();
        assert_eq!(json, "\"audio\"");
    }
}
