use sha2::{Digest, Sha256};

/// ページ本文のUTF-8バイト列に対するSHA-256指紋（小文字16進）。
/// 同一入力は常に同一出力になる（プラットフォーム非依存）。
pub fn fingerprint(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
