//! Google Drive v2 API client.
//!
//! Each [`DriveApi`] method maps to exactly one HTTP request. Non-success
//! statuses become [`ProviderError::from_status`] so the retry layer can
//! treat every HTTP failure alike. The bearer token is fetched from an
//! [`AccessTokenSource`] for every request, so an expired token is refreshed
//! before it is sent.

use std::fmt;
use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::header::{CONTENT_RANGE, RANGE};
use serde::Deserialize;
use tracing::{debug, trace};

use driveaudio_core::{DriveItem, PageResult};

use crate::api::{BoxFuture, DriveApi, MediaChunk};
use crate::error::{ProviderError, ProviderResult};

use super::config::DriveConfig;
use super::credentials::AccessTokenSource;

/// Base URL for Google Drive API v2.
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v2";

/// Children listed per page.
const PAGE_SIZE: &str = "1";

/// HTTP client for the Drive endpoints the walker and downloader use.
#[derive(Clone)]
pub struct DriveClient {
    http_client: reqwest::Client,
    tokens: Arc<dyn AccessTokenSource>,
    config: DriveConfig,
}

impl DriveClient {
    /// Creates a client authorized by `tokens`.
    ///
    /// The configured timeout bounds connection setup and metadata calls.
    /// Media requests are only bounded at connect time since a single chunk
    /// can be large.
    pub fn new(tokens: Arc<dyn AccessTokenSource>, config: DriveConfig) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ProviderError::internal(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            tokens,
            config,
        })
    }

    async fn authorized(
        &self,
        request: reqwest::RequestBuilder,
    ) -> ProviderResult<reqwest::RequestBuilder> {
        let token = self.tokens.access_token().await?;
        Ok(request.bearer_auth(token))
    }

    fn file_url(file_id: &str) -> String {
        format!("{}/files/{}", DRIVE_API_BASE, urlencoding::encode(file_id))
    }

    async fn get_json<T>(&self, request: reqwest::RequestBuilder) -> ProviderResult<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let response = self
            .authorized(request)
            .await?
            .timeout(self.config.timeout)
            .send()
            .await?;
        let response = check_status(response).await?;

        let body = response.text().await.map_err(|e| {
            ProviderError::network(format!("failed to read response: {}", e)).with_source(e)
        })?;

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("failed to parse response: {}", e))
        })
    }

    async fn list_children_page(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> ProviderResult<PageResult> {
        let url = format!(
            "{}/files/{}/children",
            DRIVE_API_BASE,
            urlencoding::encode(folder_id)
        );

        let mut request = self
            .http_client
            .get(&url)
            .query(&[("maxResults", PAGE_SIZE), ("orderBy", "folder")]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let list: ChildListResponse = self.get_json(request).await?;
        trace!(folder_id, children = list.items.len(), "listed children");
        Ok(list.into_page(folder_id))
    }

    async fn get_file(&self, item_id: &str) -> ProviderResult<DriveItem> {
        let request = self
            .http_client
            .get(Self::file_url(item_id))
            .query(&[("supportsAllDrives", "true")]);

        let file: FileResource = self.get_json(request).await?;
        Ok(file.into())
    }

    async fn get_media_range(
        &self,
        file_id: &str,
        offset: u64,
        len: u64,
    ) -> ProviderResult<MediaChunk> {
        let end = offset + len.max(1) - 1;
        let request = self
            .http_client
            .get(Self::file_url(file_id))
            .query(&[("alt", "media"), ("supportsAllDrives", "true")])
            .header(RANGE, format!("bytes={}-{}", offset, end));
        let response = self.authorized(request).await?.send().await?;

        let status = response.status();
        if status == StatusCode::RANGE_NOT_SATISFIABLE {
            debug!(file_id, offset, "range past end of file");
            return media_chunk(file_id, status, None, Vec::new(), offset, len);
        }

        let response = check_status(response).await?;
        let content_range = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let data = response
            .bytes()
            .await
            .map_err(|e| {
                ProviderError::network(format!("failed to read media: {}", e)).with_source(e)
            })?
            .to_vec();

        media_chunk(file_id, status, content_range.as_deref(), data, offset, len)
    }
}

impl fmt::Debug for DriveClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriveClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DriveApi for DriveClient {
    fn list_children<'a>(
        &'a self,
        folder_id: &'a str,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, ProviderResult<PageResult>> {
        Box::pin(self.list_children_page(folder_id, page_token))
    }

    fn get_item<'a>(&'a self, item_id: &'a str) -> BoxFuture<'a, ProviderResult<DriveItem>> {
        Box::pin(self.get_file(item_id))
    }

    fn fetch_media_chunk<'a>(
        &'a self,
        file_id: &'a str,
        offset: u64,
        len: u64,
    ) -> BoxFuture<'a, ProviderResult<MediaChunk>> {
        Box::pin(self.get_media_range(file_id, offset, len))
    }
}

/// Turns a non-success response into an error carrying its status.
async fn check_status(response: reqwest::Response) -> ProviderResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::from_status(
        status.as_u16(),
        format!("Drive API error ({}): {}", status, body.trim()),
    ))
}

/// Turns a successful (or 416) ranged media response into a chunk.
///
/// - 416: the range starts past the end, so the file ends at `offset`.
/// - 206: `content_range` must start at `offset`. Without a total, a short
///   chunk ends the file and a full one asks for more.
/// - 200: the server ignored the range and sent the whole file, which is
///   only usable for a request at offset 0.
fn media_chunk(
    file_id: &str,
    status: StatusCode,
    content_range: Option<&str>,
    data: Vec<u8>,
    offset: u64,
    len: u64,
) -> ProviderResult<MediaChunk> {
    let received = data.len() as u64;
    match status {
        StatusCode::RANGE_NOT_SATISFIABLE => Ok(MediaChunk::new(Vec::new(), Some(offset))),
        StatusCode::PARTIAL_CONTENT => {
            let range = content_range.and_then(parse_content_range);
            if let Some(range) = range.filter(|r| r.start != offset) {
                return Err(ProviderError::invalid_response(format!(
                    "requested bytes from {} of {} but got a range starting at {}",
                    offset, file_id, range.start
                )));
            }
            let total = match range.and_then(|r| r.total) {
                Some(total) => total,
                None if received < len => offset + received,
                None => offset + received + 1,
            };
            trace!(file_id, offset, received, total, "received media chunk");
            Ok(MediaChunk::new(data, Some(total)))
        }
        StatusCode::OK if offset == 0 => Ok(MediaChunk::new(data, None)),
        StatusCode::OK => Err(ProviderError::invalid_response(format!(
            "server ignored range request at offset {} for {}",
            offset, file_id
        ))),
        other => Err(ProviderError::invalid_response(format!(
            "unexpected status {} for media of {}",
            other, file_id
        ))),
    }
}

/// A parsed `Content-Range: bytes start-end/total` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ContentRange {
    start: u64,
    total: Option<u64>,
}

fn parse_content_range(value: &str) -> Option<ContentRange> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    let (range, total) = rest.split_once('/')?;
    let (start, end) = range.split_once('-')?;
    end.trim().parse::<u64>().ok()?;

    let total = match total.trim() {
        "*" => None,
        t => Some(t.parse().ok()?),
    };

    Some(ContentRange {
        start: start.trim().parse().ok()?,
        total,
    })
}

/// Response from the children.list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChildListResponse {
    #[serde(default)]
    items: Vec<ChildReference>,
    next_page_token: Option<String>,
}

impl ChildListResponse {
    fn into_page(self, folder_id: &str) -> PageResult {
        let page = PageResult::new(
            folder_id,
            self.items.into_iter().map(|child| child.id).collect(),
        );
        match self.next_page_token.filter(|t| !t.is_empty()) {
            Some(token) => page.with_next_page_token(token),
            None => page,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChildReference {
    id: String,
}

/// A file resource from the files.get endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    parents: Vec<ParentReference>,
}

#[derive(Debug, Deserialize)]
struct ParentReference {
    id: String,
}

impl From<FileResource> for DriveItem {
    fn from(file: FileResource) -> Self {
        DriveItem::new(file.id, file.title, file.mime_type)
            .with_parents(file.parents.into_iter().map(|p| p.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use driveaudio_core::MimeClass;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn parse_child_list_with_next_page() {
        let json = r#"{
            "kind": "drive#childList",
            "items": [
                { "kind": "drive#childReference", "id": "child-1" }
            ],
            "nextPageToken": "token-2"
        }"#;

        let response: ChildListResponse = serde_json::from_str(json).unwrap();
        let page = response.into_page("root-folder");
        assert_eq!(page.folder_id, "root-folder");
        assert_eq!(page.child_ids, vec!["child-1".to_string()]);
        assert_eq!(page.next_page_token.as_deref(), Some("token-2"));
    }

    #[test]
    fn parse_empty_child_list() {
        let response: ChildListResponse = serde_json::from_str(r#"{"items": []}"#).unwrap();
        let page = response.into_page("f");
        assert!(page.is_empty());
        assert!(!page.has_more());

        let response: ChildListResponse = serde_json::from_str("{}").unwrap();
        assert!(response.into_page("f").is_empty());
    }

    #[test]
    fn blank_page_token_ends_pagination() {
        let json = r#"{"items": [{"id": "a"}], "nextPageToken": ""}"#;
        let response: ChildListResponse = serde_json::from_str(json).unwrap();
        assert!(!response.into_page("f").has_more());
    }

    #[test]
    fn parse_file_resource() {
        let json = r#"{
            "kind": "drive#file",
            "id": "file-1",
            "title": "Track 01.mp3",
            "mimeType": "audio/mpeg",
            "parents": [{ "kind": "drive#parentReference", "id": "folder-a" }]
        }"#;

        let file: FileResource = serde_json::from_str(json).unwrap();
        let item = DriveItem::from(file);
        assert_eq!(item.id, "file-1");
        assert_eq!(item.title, "Track 01.mp3");
        assert_eq!(item.class(), MimeClass::Audio);
        assert_eq!(item.parents, vec!["folder-a".to_string()]);
    }

    #[test]
    fn parse_folder_resource() {
        let json = r#"{
            "id": "folder-1",
            "title": "Albums",
            "mimeType": "application/vnd.google-apps.folder"
        }"#;

        let item = DriveItem::from(serde_json::from_str::<FileResource>(json).unwrap());
        assert!(item.is_folder());
        assert!(item.parents.is_empty());
    }

    #[test]
    fn content_range_with_total() {
        assert_eq!(
            parse_content_range("bytes 0-99/1234"),
            Some(ContentRange {
                start: 0,
                total: Some(1234)
            })
        );
    }

    #[test]
    fn content_range_with_unknown_total() {
        let range = parse_content_range("bytes 100-199/*").unwrap();
        assert_eq!(range.start, 100);
        assert_eq!(range.total, None);
    }

    #[test]
    fn content_range_malformed() {
        assert_eq!(parse_content_range("items 0-1/2"), None);
        assert_eq!(parse_content_range("bytes 0-99"), None);
        assert_eq!(parse_content_range("bytes a-b/10"), None);
        assert_eq!(parse_content_range("bytes 0-9/ten"), None);
    }

    #[test]
    fn file_url_encodes_id() {
        assert_eq!(
            DriveClient::file_url("a/b c"),
            "https://www.googleapis.com/drive/v2/files/a%2Fb%20c"
        );
    }

    /// Hands out `token-1`, `token-2`, ... and counts the requests.
    #[derive(Default)]
    struct CountingTokens {
        calls: AtomicU32,
    }

    impl AccessTokenSource for CountingTokens {
        fn access_token(&self) -> BoxFuture<'_, ProviderResult<String>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Box::pin(async move { Ok(format!("token-{}", n)) })
        }
    }

    fn client(tokens: Arc<dyn AccessTokenSource>) -> DriveClient {
        DriveClient::new(tokens, DriveConfig::default()).unwrap()
    }

    #[test]
    fn client_builds_from_default_config() {
        let client = client(Arc::new(CountingTokens::default()));
        assert!(format!("{:?}", client).starts_with("DriveClient"));
    }

    #[tokio::test]
    async fn every_request_asks_for_a_current_token() {
        let tokens = Arc::new(CountingTokens::default());
        let client = client(tokens.clone());

        for expected in ["Bearer token-1", "Bearer token-2"] {
            let request = client
                .authorized(client.http_client.get(DriveClient::file_url("f")))
                .await
                .unwrap()
                .build()
                .unwrap();
            assert_eq!(request.headers()["authorization"], expected);
        }
        assert_eq!(tokens.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn range_past_end_is_an_empty_final_chunk() {
        let chunk = media_chunk(
            "f",
            StatusCode::RANGE_NOT_SATISFIABLE,
            None,
            Vec::new(),
            300,
            100,
        )
        .unwrap();
        assert!(chunk.data.is_empty());
        assert_eq!(chunk.total_size, Some(300));
        assert!(chunk.is_last(300));
    }

    #[test]
    fn partial_content_with_total() {
        let chunk = media_chunk(
            "f",
            StatusCode::PARTIAL_CONTENT,
            Some("bytes 100-199/250"),
            vec![0; 100],
            100,
            100,
        )
        .unwrap();
        assert_eq!(chunk.total_size, Some(250));
        assert!(!chunk.is_last(200));
    }

    #[test]
    fn partial_content_starting_elsewhere_is_rejected() {
        let err = media_chunk(
            "f",
            StatusCode::PARTIAL_CONTENT,
            Some("bytes 0-99/250"),
            vec![0; 100],
            100,
            100,
        )
        .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::InvalidResponse);
    }

    #[test]
    fn partial_content_with_unknown_total() {
        let short = media_chunk(
            "f",
            StatusCode::PARTIAL_CONTENT,
            Some("bytes 100-139/*"),
            vec![0; 40],
            100,
            100,
        )
        .unwrap();
        assert_eq!(short.total_size, Some(140));
        assert!(short.is_last(140));

        let full = media_chunk(
            "f",
            StatusCode::PARTIAL_CONTENT,
            None,
            vec![0; 100],
            0,
            100,
        )
        .unwrap();
        assert_eq!(full.total_size, Some(101));
        assert!(!full.is_last(100));
    }

    #[test]
    fn whole_file_accepted_only_at_offset_zero() {
        let chunk = media_chunk("f", StatusCode::OK, None, vec![1, 2, 3], 0, 100).unwrap();
        assert_eq!(chunk.data, vec![1, 2, 3]);
        assert_eq!(chunk.total_size, None);

        let err = media_chunk("f", StatusCode::OK, None, vec![1, 2, 3], 100, 100).unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::InvalidResponse);
    }

    #[test]
    fn other_success_status_is_rejected() {
        let err = media_chunk("f", StatusCode::NO_CONTENT, None, Vec::new(), 0, 100).unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::InvalidResponse);
    }
}
