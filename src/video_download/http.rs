//! HTTP video downloader
//!
//! Follows an episode page to the media it embeds and streams the video to
//! disk. Downloads go to a partial file first and are renamed into place
//! only once the content has been verified to be a video.

use super::{DownloadRequest, DownloadedFile, VideoDownloadError, VideoDownloader};
use crate::temp::create_partial_file;
use reqwest::Url;
use reqwest::blocking::{Client, Response};
use reqwest::header::{CONTENT_TYPE, REFERER, USER_AGENT};
use scraper::{Html, Selector};
use std::io::{Read, Write};
use std::time::Duration;

/// How many embedded pages (player iframes) are followed at most
const MAX_HOPS: usize = 3;

/// Number of leading bytes inspected to decide whether content is a video
const SNIFF_SIZE: usize = 8192;

/// Selectors tried in order to find the media behind an episode page
const MEDIA_SELECTORS: &[&str] = &["video source[src]", "video[src]", "source[src]", "iframe[src]"];

/// Downloads videos over plain HTTP(S)
pub struct HttpVideoDownloader {
    client: Client,
}

impl HttpVideoDownloader {
    /// Creates a downloader whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, VideoDownloadError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(VideoDownloadError::ClientSetup)?;

        Ok(Self { client })
    }

    /// Follows the episode page until a response carrying video content is found
    ///
    /// Only responses declared as HTML are read as pages right away. Anything
    /// else is identified by its first bytes, so videos served without a
    /// proper content type are still recognized.
    fn resolve_media(&self, url: &str, user_agent: &str) -> Result<MediaStream, VideoDownloadError> {
        let mut current = Url::parse(url).map_err(|e| VideoDownloadError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let mut referer: Option<Url> = None;

        for hop in 0..=MAX_HOPS {
            tracing::debug!(hop, url = %current, "Requesting");

            let mut request = self.client.get(current.clone()).header(USER_AGENT, user_agent);
            if let Some(referer) = &referer {
                request = request.header(REFERER, referer.as_str());
            }

            let mut response = request
                .send()
                .map_err(|e| VideoDownloadError::RequestFailed {
                    url: current.to_string(),
                    source: e,
                })?;

            if !response.status().is_success() {
                return Err(VideoDownloadError::HttpStatus {
                    url: current.to_string(),
                    status: response.status().as_u16(),
                });
            }

            let mime = mime_type(&response);

            let page = if is_html(&mime) {
                response.text().map_err(|e| VideoDownloadError::RequestFailed {
                    url: current.to_string(),
                    source: e,
                })?
            } else {
                let expected_len = response.content_length();
                let head = read_head(&mut response, &current)?;

                if head.is_empty() {
                    return Err(VideoDownloadError::EmptyResponse(current.to_string()));
                }

                if infer::is_video(&head) {
                    return Ok(MediaStream {
                        url: current,
                        head,
                        expected_len,
                        response,
                    });
                }

                if is_media(&mime) {
                    return Err(VideoDownloadError::NotAVideo(current.to_string()));
                }

                tracing::debug!(url = %current, mime, "Unlabelled response is not a video, reading it as a page");
                let mut body = head;
                response
                    .read_to_end(&mut body)
                    .map_err(|e| VideoDownloadError::ReadFailed {
                        url: current.to_string(),
                        source: e,
                    })?;
                String::from_utf8_lossy(&body).into_owned()
            };

            let next = find_media_source(&page, &current)
                .ok_or_else(|| VideoDownloadError::NoVideoSource(current.to_string()))?;

            referer = Some(current);
            current = next;
        }

        Err(VideoDownloadError::TooManyHops {
            url: url.to_string(),
            hops: MAX_HOPS,
        })
    }
}

/// A video response whose first bytes were already read for identification
struct MediaStream {
    url: Url,
    head: Vec<u8>,
    /// Announced body length, taken before any of the body was read
    expected_len: Option<u64>,
    response: Response,
}

impl VideoDownloader for HttpVideoDownloader {
    fn download(&self, request: &DownloadRequest<'_>) -> Result<DownloadedFile, VideoDownloadError> {
        let MediaStream {
            url,
            head,
            expected_len,
            mut response,
        } = self.resolve_media(request.url, request.user_agent)?;

        let target_path = request
            .directory
            .join(format!("{}.{}", request.file_stem, self.extension()));

        let (mut file, temp) = create_partial_file(request.directory, request.file_stem)
            .map_err(|e| VideoDownloadError::WriteFailed {
                path: request.directory.to_path_buf(),
                source: e,
            })?;

        let write_error = |e| VideoDownloadError::WriteFailed {
            path: temp.path().to_path_buf(),
            source: e,
        };

        file.write_all(&head).map_err(write_error)?;
        let mut downloaded = head.len() as u64;
        let mut buffer = [0; 8192];

        loop {
            let bytes_read = response
                .read(&mut buffer)
                .map_err(|e| VideoDownloadError::ReadFailed {
                    url: url.to_string(),
                    source: e,
                })?;

            if bytes_read == 0 {
                break;
            }

            file.write_all(&buffer[..bytes_read]).map_err(write_error)?;
            downloaded += bytes_read as u64;
        }

        if let Some(expected) = expected_len {
            if downloaded < expected {
                return Err(VideoDownloadError::Truncated {
                    url: url.to_string(),
                    received: downloaded,
                    expected,
                });
            }
        }

        file.flush().map_err(write_error)?;
        file.sync_all().map_err(write_error)?;
        drop(file);

        temp.persist(&target_path)
            .map_err(|e| VideoDownloadError::WriteFailed {
                path: target_path.clone(),
                source: e,
            })?;

        tracing::debug!(path = %target_path.display(), bytes = downloaded, "Video written");

        Ok(DownloadedFile {
            path: target_path,
            bytes: downloaded,
        })
    }
}

/// Reads up to [`SNIFF_SIZE`] bytes from the start of the body
fn read_head(response: &mut Response, url: &Url) -> Result<Vec<u8>, VideoDownloadError> {
    let mut head = Vec::with_capacity(SNIFF_SIZE);

    response
        .by_ref()
        .take(SNIFF_SIZE as u64)
        .read_to_end(&mut head)
        .map_err(|e| VideoDownloadError::ReadFailed {
            url: url.to_string(),
            source: e,
        })?;

    Ok(head)
}

/// The lowercased MIME type of a response, without parameters
fn mime_type(response: &Response) -> String {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

fn is_html(mime: &str) -> bool {
    mime == "text/html" || mime == "application/xhtml+xml"
}

/// Returns true for content types that claim to carry the video itself
fn is_media(mime: &str) -> bool {
    mime.starts_with("video/") || mime == "application/octet-stream" || mime == "binary/octet-stream"
}

/// Finds the first media or player URL embedded in an HTML page
///
/// Relative references are resolved against the page URL.
fn find_media_source(html: &str, page_url: &Url) -> Option<Url> {
    let document = Html::parse_document(html);

    MEDIA_SELECTORS.iter().find_map(|selector_str| {
        let selector = Selector::parse(selector_str).ok()?;
        document
            .select(&selector)
            .filter_map(|element| element.value().attr("src"))
            .map(str::trim)
            .find(|src| !src.is_empty())
            .and_then(|src| page_url.join(src).ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::path::Path;
    use std::thread;
    use tempfile::TempDir;

    /// Answers one connection per canned response, in order
    fn serve(responses: Vec<Vec<u8>>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();

        thread::spawn(move || {
            for response in responses {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };

                {
                    let mut reader = BufReader::new(&stream);
                    let mut line = String::new();
                    while reader.read_line(&mut line).is_ok_and(|n| n > 2) {
                        line.clear();
                    }
                }

                let _ = stream.write_all(&response);
            }
        });

        format!("http://{address}/show/episode-1")
    }

    fn http_response(content_type: Option<&str>, content_length: usize, body: &[u8]) -> Vec<u8> {
        let mut head = format!("HTTP/1.1 200 OK\r\nContent-Length: {content_length}\r\nConnection: close\r\n");
        if let Some(content_type) = content_type {
            head.push_str(&format!("Content-Type: {content_type}\r\n"));
        }
        head.push_str("\r\n");

        let mut response = head.into_bytes();
        response.extend_from_slice(body);
        response
    }

    fn mp4_body(len: usize) -> Vec<u8> {
        let mut body = vec![0u8; len];
        body[..12].copy_from_slice(b"\x00\x00\x00\x18ftypisom");
        body
    }

    fn fetch(url: &str, dir: &Path) -> Result<DownloadedFile, VideoDownloadError> {
        let downloader = HttpVideoDownloader::new(Duration::from_secs(10)).unwrap();
        downloader.download(&DownloadRequest {
            url,
            file_stem: "S1E01",
            directory: dir,
            user_agent: "agent",
        })
    }

    fn files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn page() -> Url {
        Url::parse("https://www.example.com/show/episode-1").unwrap()
    }

    #[test]
    fn test_content_type_classes() {
        assert!(is_media("video/mp4"));
        assert!(is_media("application/octet-stream"));
        assert!(!is_media("text/plain"));
        assert!(!is_media(""));
        assert!(is_html("text/html"));
        assert!(is_html("application/xhtml+xml"));
        assert!(!is_html("text/plain"));
    }

    #[test]
    fn test_find_media_source_prefers_video_tags() {
        let html = r#"
            <html><body>
              <iframe src="/player?id=1"></iframe>
              <video><source src="https://cdn.example.com/ep1.mp4" type="video/mp4"></video>
            </body></html>
        "#;
        assert_eq!(
            find_media_source(html, &page()).unwrap().as_str(),
            "https://cdn.example.com/ep1.mp4"
        );
    }

    #[test]
    fn test_find_media_source_follows_iframe_relative() {
        let html = r#"<div><iframe src="  "></iframe><iframe src="embed/player.php?file=ep1"></iframe></div>"#;
        assert_eq!(
            find_media_source(html, &page()).unwrap().as_str(),
            "https://www.example.com/show/embed/player.php?file=ep1"
        );
    }

    #[test]
    fn test_find_media_source_none() {
        assert!(find_media_source("<html><body><p>Nothing</p></body></html>", &page()).is_none());
    }

    #[test]
    fn test_invalid_url_is_rejected_without_request() {
        let downloader = HttpVideoDownloader::new(Duration::from_secs(1)).unwrap();
        let dir = tempfile::TempDir::new().unwrap();
        let request = DownloadRequest {
            url: "not a url",
            file_stem: "S1E01",
            directory: dir.path(),
            user_agent: "agent",
        };

        let result = downloader.download(&request);
        assert!(matches!(result, Err(VideoDownloadError::InvalidUrl { .. })));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_video_is_streamed_to_final_name() {
        let dir = TempDir::new().unwrap();
        let body = mp4_body(20_000);
        let url = serve(vec![http_response(Some("video/mp4"), body.len(), &body)]);

        let downloaded = fetch(&url, dir.path()).unwrap();

        assert_eq!(downloaded.bytes, 20_000);
        assert_eq!(downloaded.path, dir.path().join("S1E01.mp4"));
        assert_eq!(files(dir.path()), vec!["S1E01.mp4"]);
        assert_eq!(std::fs::read(&downloaded.path).unwrap(), body);
    }

    #[test]
    fn test_video_without_proper_content_type_is_recognized() {
        for content_type in [None, Some("text/plain")] {
            let dir = TempDir::new().unwrap();
            let body = mp4_body(18_000);
            let url = serve(vec![http_response(content_type, body.len(), &body)]);

            let downloaded = fetch(&url, dir.path()).unwrap();

            assert_eq!(downloaded.bytes, 18_000, "content type {content_type:?}");
            assert_eq!(files(dir.path()), vec!["S1E01.mp4"]);
        }
    }

    #[test]
    fn test_episode_page_leads_to_video() {
        let page = br#"<html><body><video src="/media/ep1.mp4"></video></body></html>"#;

        for content_type in [Some("text/html; charset=UTF-8"), None] {
            let dir = TempDir::new().unwrap();
            let body = mp4_body(9_000);
            let url = serve(vec![
                http_response(content_type, page.len(), page),
                http_response(Some("video/mp4"), body.len(), &body),
            ]);

            let downloaded = fetch(&url, dir.path()).unwrap();

            assert_eq!(downloaded.bytes, 9_000, "content type {content_type:?}");
            assert_eq!(files(dir.path()), vec!["S1E01.mp4"]);
        }
    }

    #[test]
    fn test_non_video_body_is_rejected() {
        let dir = TempDir::new().unwrap();
        let body = b"<html><body>File not found</body></html>";
        let url = serve(vec![http_response(Some("video/mp4"), body.len(), body)]);

        let result = fetch(&url, dir.path());

        assert!(matches!(result, Err(VideoDownloadError::NotAVideo(_))));
        assert!(files(dir.path()).is_empty());
    }

    #[test]
    fn test_truncated_body_leaves_nothing_behind() {
        let dir = TempDir::new().unwrap();
        let body = mp4_body(20_000);
        let url = serve(vec![http_response(Some("video/mp4"), 40_000, &body)]);

        let result = fetch(&url, dir.path());

        assert!(matches!(
            result,
            Err(VideoDownloadError::ReadFailed { .. } | VideoDownloadError::Truncated { .. })
        ));
        assert!(files(dir.path()).is_empty());
    }
}
