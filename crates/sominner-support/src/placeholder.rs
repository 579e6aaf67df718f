//! Generated emails for visitors who did not give one.

use rand::Rng;

/// Random 128-bit token, hex encoded (32 lowercase chars).
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    hex::encode(bytes)
}

/// Lowercase letters and digits of the trimmed name, or `"guest"`.
pub fn sanitize_local_part(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect();
    if sanitized.is_empty() {
        "guest".to_string()
    } else {
        sanitized
    }
}

/// `<sanitized-name>-<token>@<domain>`.
pub fn placeholder_email(name: &str, domain: &str) -> String {
    format!("{}-{}@{}", sanitize_local_part(name), generate_token(), domain)
}
