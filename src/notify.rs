use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct SlackPayload<'a> {
    text: &'a str,
}

/// Slack Incoming Webhook への通知。失敗しても呼び出し側で握りつぶす前提の
/// ベストエフォート送信で、実行全体を失敗させてはならない。
pub fn send_slack(webhook_url: &str, summary: &str, target_url: &str) -> Result<()> {
    let text = format!("🚨 物流効率化法サイト更新\n\n{summary}\n\n詳細: {target_url}");

    let client = reqwest::blocking::Client::builder()
        .timeout(NOTIFY_TIMEOUT)
        .build()
        .context("通知用HTTPクライアントの作成に失敗しました")?;

    let response = client
        .post(webhook_url)
        .json(&SlackPayload { text: &text })
        .send()
        .context("Slack通知の送信に失敗しました")?;
    response
        .error_for_status()
        .context("Slack通知で異常なステータスが返されました")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;

    fn serve_once(status_line: &'static str) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = Vec::new();
                let mut chunk = [0_u8; 4096];
                loop {
                    match stream.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(n) => {
                            buf.extend_from_slice(&chunk[..n]);
                            let text = String::from_utf8_lossy(&buf);
                            if let Some(header_end) = text.find("\r\n\r\n") {
                                let content_length = text
                                    .lines()
                                    .find_map(|line| {
                                        let (name, value) = line.split_once(':')?;
                                        name.eq_ignore_ascii_case("content-length")
                                            .then(|| value.trim().parse::<usize>().ok())?
                                    })
                                    .unwrap_or(0);
                                if buf.len() >= header_end + 4 + content_length {
                                    break;
                                }
                            }
                        }
                        Err(_) => break,
                    }
                }
                let response =
                    format!("{status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
                let _ = stream.write_all(response.as_bytes());
                let _ = tx.send(String::from_utf8_lossy(&buf).to_string());
            }
        });
        (format!("http://{addr}/hook"), rx)
    }

    #[test]
    fn send_slack_posts_summary_and_target_url() {
        let (url, rx) = serve_once("HTTP/1.1 200 OK");
        send_slack(&url, "省令が公布されました", "https://example.invalid/page")
            .expect("send notification");

        let request = rx.recv().expect("request captured");
        assert!(request.starts_with("POST /hook"));
        assert!(request.contains("省令が公布されました"));
        assert!(request.contains("https://example.invalid/page"));
    }

    #[test]
    fn send_slack_fails_on_error_status() {
        let (url, _rx) = serve_once("HTTP/1.1 500 Internal Server Error");
        assert!(send_slack(&url, "summary", "https://example.invalid/page").is_err());
    }

    #[test]
    fn send_slack_fails_on_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);

        let url = format!("http://{addr}/hook");
        assert!(send_slack(&url, "summary", "https://example.invalid/page").is_err());
    }
}
