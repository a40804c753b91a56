// HTTP transport for the conversion endpoint
//
// The transport only moves bytes: it builds the multipart body and hands back status, content type
// and raw text. Interpreting the body is the client's job.

use crate::config::Settings;
use crate::error::Result;
use crate::models::requests::ConversionRequest;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use url::Url;

pub const CORRELATION_HEADER: &str = "X-Correlation-Id";

/// Undecoded response from the conversion endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn submit(&self, request: &ConversionRequest, correlation_id: &str)
        -> Result<RawResponse>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpTransport {
    pub fn new(settings: &Settings) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = settings.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            client: builder.build()?,
            endpoint: settings.endpoint()?,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn submit(
        &self,
        request: &ConversionRequest,
        correlation_id: &str,
    ) -> Result<RawResponse> {
        let mut form = Form::new();
        for (name, value) in request.form_fields() {
            form = form.text(name, value);
        }

        let mut part =
            Part::bytes(request.file.bytes.clone()).file_name(request.file.name.clone());
        if let Some(mime) = request.file.mime.as_deref() {
            part = part.mime_str(mime)?;
        }
        form = form.part("file", part);

        let resp = self
            .client
            .post(self.endpoint.clone())
            .header(CORRELATION_HEADER, correlation_id)
            .multipart(form)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let body = resp.text().await?;

        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::state::SelectedFile;
    use crate::wizard::file_check::XLSX_MIME;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Accept one connection, capture the full request and answer with `body` as JSON.
    async fn serve_once(listener: TcpListener, body: &'static str) -> String {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.expect("read request");
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if request_complete(&buf) {
                break;
            }
        }
        let reply = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\
             Connection: close\r\n\r\n{}",
            body.len(),
            body
        );
        socket.write_all(reply.as_bytes()).await.expect("write reply");
        socket.shutdown().await.ok();
        String::from_utf8_lossy(&buf).to_string()
    }

    fn request_complete(buf: &[u8]) -> bool {
        let text = String::from_utf8_lossy(buf);
        let Some(split) = text.find("\r\n\r\n") else {
            return false;
        };
        let head = text[..split].to_ascii_lowercase();
        let body_len = buf.len() - (split + 4);
        match head
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
        {
            Some(len) => body_len >= len,
            None => text.ends_with("0\r\n\r\n"),
        }
    }

    #[tokio::test]
    async fn submit_sends_multipart_form_with_correlation_id() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let server = tokio::spawn(serve_once(listener, r#"{"rows":[]}"#));

        let settings = Settings {
            server_url: format!("http://{}", addr),
            request_timeout_secs: Some(10),
            ..Settings::default()
        };
        let transport = HttpTransport::new(&settings).expect("transport should build");
        let file = SelectedFile::new(
            "sales.xlsx",
            Some(XLSX_MIME.to_string()),
            b"PK\x03\x04xl/workbook.xml".to_vec(),
        );
        let request = ConversionRequest::get_preview(Arc::new(file));
        let raw = transport
            .submit(&request, "abc123")
            .await
            .expect("submit should succeed");

        assert_eq!(raw.status, 200);
        assert_eq!(raw.content_type.as_deref(), Some("application/json"));
        assert_eq!(raw.body, r#"{"rows":[]}"#);

        let captured = server.await.expect("server task");
        let lowered = captured.to_ascii_lowercase();
        assert!(lowered.starts_with("post /api/convert "));
        assert!(lowered.contains("x-correlation-id: abc123"));
        assert!(captured.contains("name=\"action\"\r\n\r\nget_preview"));
        assert!(captured.contains("name=\"file\"; filename=\"sales.xlsx\""));
        assert!(captured.contains(XLSX_MIME));
        assert!(captured.contains("xl/workbook.xml"));
    }

    #[test]
    fn http_transport_targets_the_convert_endpoint() {
        let settings = Settings {
            server_url: "http://localhost:8080/".to_string(),
            ..Settings::default()
        };
        let transport = HttpTransport::new(&settings).expect("transport should build");
        assert_eq!(
            transport.endpoint().as_str(),
            "http://localhost:8080/api/convert"
        );
    }

    #[test]
    fn http_transport_rejects_invalid_server_url() {
        let settings = Settings {
            server_url: "not a url".to_string(),
            ..Settings::default()
        };
        assert!(HttpTransport::new(&settings).is_err());
    }
}
