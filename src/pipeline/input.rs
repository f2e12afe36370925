//! Input resolution: turn an upload form into validated image bytes.
//!
//! An upload names its image either directly (`file` field) or as a remote
//! URL (`firebase_url` field, e.g. a Firebase Storage download link). The
//! URL wins when both are present. Either way the bytes are size-checked
//! before any decoding happens.

use crate::error::InvoiceError;
use std::time::Duration;
use tracing::{debug, info};

/// Extensions accepted for direct uploads.
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// The image-bearing fields of an upload form.
#[derive(Debug, Default, Clone)]
pub struct UploadForm {
    /// `file` field: original filename and content.
    pub file: Option<(String, Vec<u8>)>,
    /// `firebase_url` field.
    pub image_url: Option<String>,
}

/// Where the image bytes came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Upload { filename: String },
    Remote { url: String },
}

/// Validated image bytes plus their origin.
#[derive(Debug, Clone)]
pub struct ResolvedImage {
    pub source: ImageSource,
    pub bytes: Vec<u8>,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// True when `filename` has an allowed image extension.
pub fn allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| {
            ALLOWED_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

/// Reject payloads above `max_bytes`.
pub fn check_size(len: usize, max_bytes: usize) -> Result<(), InvoiceError> {
    if len > max_bytes {
        return Err(InvoiceError::FileTooLarge {
            size_kb: len as f64 / 1024.0,
            limit_kb: max_bytes as f64 / 1024.0,
        });
    }
    Ok(())
}

/// Resolve an upload form to image bytes.
pub async fn resolve_upload(
    form: UploadForm,
    client: &reqwest::Client,
    timeout_secs: u64,
    max_bytes: usize,
) -> Result<ResolvedImage, InvoiceError> {
    let resolved = if let Some(url) = form.image_url {
        let bytes = download_image(client, &url, timeout_secs, max_bytes).await?;
        ResolvedImage {
            source: ImageSource::Remote { url },
            bytes,
        }
    } else if let Some((filename, bytes)) = form.file {
        if filename.is_empty() {
            return Err(InvoiceError::EmptyFilename);
        }
        if !allowed_file(&filename) {
            return Err(InvoiceError::FileTypeNotAllowed { filename });
        }
        ResolvedImage {
            source: ImageSource::Upload { filename },
            bytes,
        }
    } else {
        return Err(InvoiceError::MissingFile);
    };

    info!(
        "Processing file size: {:.2}KB from {:?}",
        resolved.bytes.len() as f64 / 1024.0,
        resolved.source
    );
    check_size(resolved.bytes.len(), max_bytes)?;
    Ok(resolved)
}

/// Download a remote image, never buffering more than `max_bytes`.
async fn download_image(
    client: &reqwest::Client,
    url: &str,
    timeout_secs: u64,
    max_bytes: usize,
) -> Result<Vec<u8>, InvoiceError> {
    if !is_url(url) {
        return Err(InvoiceError::InvalidUrl {
            url: url.to_string(),
        });
    }
    info!("Downloading image from: {}", url);

    let map_send_err = |e: reqwest::Error| {
        if e.is_timeout() {
            InvoiceError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            InvoiceError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let mut response = client
        .get(url)
        .timeout(Duration::from_secs(timeout_secs))
        .send()
        .await
        .map_err(&map_send_err)?;

    if !response.status().is_success() {
        return Err(InvoiceError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    if let Some(declared) = response.content_length() {
        check_size(usize::try_from(declared).unwrap_or(usize::MAX), max_bytes)?;
    }

    let mut bytes = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(&map_send_err)? {
        bytes.extend_from_slice(&chunk);
        check_size(bytes.len(), max_bytes)?;
    }
    debug!("Downloaded {} bytes from {}", bytes.len(), url);
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn client() -> reqwest::Client {
        reqwest::Client::builder()
            .no_proxy()
            .build()
            .expect("client")
    }

    /// Serve one raw HTTP response on a local port and return its URL.
    async fn serve_once(head: &str, body: Vec<u8>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        let head = head.to_string();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&body).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{addr}/invoice.png")
    }

    fn remote(url: String) -> UploadForm {
        UploadForm {
            file: None,
            image_url: Some(url),
        }
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://firebasestorage.googleapis.com/v0/b/x/o/inv.jpg"));
        assert!(is_url("http://localhost/inv.png"));
        assert!(!is_url("/tmp/inv.png"));
        assert!(!is_url("ftp://host/inv.png"));
        assert!(!is_url(""));
    }

    #[test]
    fn test_allowed_file() {
        assert!(allowed_file("invoice.png"));
        assert!(allowed_file("scan.JPG"));
        assert!(allowed_file("a.b.jpeg"));
        assert!(!allowed_file("invoice.pdf"));
        assert!(!allowed_file("jpeg"));
        assert!(!allowed_file("invoice."));
    }

    #[test]
    fn test_check_size() {
        assert!(check_size(10, 10).is_ok());
        assert!(matches!(
            check_size(11, 10),
            Err(InvoiceError::FileTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn missing_fields() {
        let err = resolve_upload(UploadForm::default(), &client(), 5, 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, InvoiceError::MissingFile));
    }

    #[tokio::test]
    async fn empty_filename() {
        let form = UploadForm {
            file: Some((String::new(), vec![1, 2, 3])),
            image_url: None,
        };
        let err = resolve_upload(form, &client(), 5, 1024).await.unwrap_err();
        assert!(matches!(err, InvoiceError::EmptyFilename));
    }

    #[tokio::test]
    async fn disallowed_extension() {
        let form = UploadForm {
            file: Some(("invoice.gif".into(), vec![1, 2, 3])),
            image_url: None,
        };
        let err = resolve_upload(form, &client(), 5, 1024).await.unwrap_err();
        assert!(matches!(err, InvoiceError::FileTypeNotAllowed { .. }));
    }

    #[tokio::test]
    async fn oversized_upload() {
        let form = UploadForm {
            file: Some(("invoice.jpg".into(), vec![0; 2048])),
            image_url: None,
        };
        let err = resolve_upload(form, &client(), 5, 1024).await.unwrap_err();
        assert!(matches!(err, InvoiceError::FileTooLarge { .. }));
    }

    #[tokio::test]
    async fn accepted_upload() {
        let form = UploadForm {
            file: Some(("invoice.jpeg".into(), vec![7; 16])),
            image_url: None,
        };
        let resolved = resolve_upload(form, &client(), 5, 1024).await.unwrap();
        assert_eq!(
            resolved.source,
            ImageSource::Upload {
                filename: "invoice.jpeg".into()
            }
        );
        assert_eq!(resolved.bytes.len(), 16);
    }

    #[tokio::test]
    async fn url_takes_precedence_and_is_validated() {
        let form = UploadForm {
            file: Some(("invoice.jpg".into(), vec![7; 16])),
            image_url: Some("file:///etc/passwd".into()),
        };
        let err = resolve_upload(form, &client(), 5, 1024).await.unwrap_err();
        assert!(matches!(err, InvoiceError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn downloads_remote_image() {
        let url = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Length: 16\r\nConnection: close\r\n\r\n",
            vec![7; 16],
        )
        .await;
        let resolved = resolve_upload(remote(url.clone()), &client(), 5, 1024)
            .await
            .expect("download");
        assert_eq!(resolved.source, ImageSource::Remote { url });
        assert_eq!(resolved.bytes, vec![7; 16]);
    }

    #[tokio::test]
    async fn declared_oversize_is_rejected_before_reading() {
        let url = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Length: 41943040\r\nConnection: close\r\n\r\n",
            Vec::new(),
        )
        .await;
        let err = resolve_upload(remote(url), &client(), 5, 1024)
            .await
            .unwrap_err();
        match err {
            InvoiceError::FileTooLarge { size_kb, limit_kb } => {
                assert_eq!(size_kb, 40960.0);
                assert_eq!(limit_kb, 1.0);
            }
            other => panic!("expected FileTooLarge, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn undeclared_oversize_stops_at_cap() {
        let url = serve_once(
            "HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n",
            vec![0; 4 * 1024 * 1024],
        )
        .await;
        let err = resolve_upload(remote(url), &client(), 5, 1024)
            .await
            .unwrap_err();
        match err {
            InvoiceError::FileTooLarge { size_kb, .. } => assert!(size_kb < 4096.0),
            other => panic!("expected FileTooLarge, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn remote_error_status_is_reported() {
        let url = serve_once(
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            Vec::new(),
        )
        .await;
        let err = resolve_upload(remote(url), &client(), 5, 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, InvoiceError::DownloadFailed { .. }));
    }
}
