use std::time::Duration;

use anyhow::{Context, Result};

/// 監視対象ページの取得。リトライはしない（再実行は外部スケジューラの責務）。
pub struct Fetcher {
    client: reqwest::blocking::Client,
}

impl Fetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("mlitwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("HTTPクライアントの作成に失敗しました")?;
        Ok(Self { client })
    }

    pub fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("ページの取得に失敗しました: {url}"))?;
        let response = response
            .error_for_status()
            .with_context(|| format!("ページの取得で異常なステータスが返されました: {url}"))?;
        response
            .text()
            .with_context(|| format!("ページ本文の読み取りに失敗しました: {url}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("local addr");
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0_u8; 4096];
                let _ = stream.read(&mut buf);
                let response = format!(
                    "{status_line}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{addr}/")
    }

    #[test]
    fn fetch_returns_body_on_success() {
        let url = serve_once("HTTP/1.1 200 OK", "PAGE_V1");
        let fetcher = Fetcher::new(Duration::from_secs(5)).expect("fetcher");
        let body = fetcher.fetch(&url).expect("fetch");
        assert_eq!(body, "PAGE_V1");
    }

    #[test]
    fn fetch_fails_on_non_success_status() {
        let url = serve_once("HTTP/1.1 404 Not Found", "");
        let fetcher = Fetcher::new(Duration::from_secs(5)).expect("fetcher");
        assert!(fetcher.fetch(&url).is_err());
    }

    #[test]
    fn fetch_fails_on_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);

        let fetcher = Fetcher::new(Duration::from_secs(5)).expect("fetcher");
        assert!(fetcher.fetch(&format!("http://{addr}/")).is_err());
    }
}
