//! Pickup-token codec.
//!
//! Every order carries an opaque pickup token of the form `CE-<order_id>-<millis>-<hex16>` plus a
//! rendered QR image the customer shows at the counter. The token is *not* signed: authenticity
//! comes from an exact-match lookup against the stored token, so a crafted token with a guessed
//! order id but a fabricated suffix matches nothing. Parsing here is purely structural and never
//! touches the database.
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use qrcode::{render::svg, QrCode};
use thiserror::Error;

pub const QR_PREFIX: &str = "CE";
const QR_FIELD_COUNT: usize = 4;
const QR_IMAGE_SIZE: u32 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QrError {
    #[error("The pickup code is not in the expected format")]
    InvalidToken,
    #[error("Could not render the pickup code image: {0}")]
    RenderFailed(String),
}

/// The structural fields of a well-formed pickup token. The embedded order id is a hint for
/// debugging and display; the stored association is authoritative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQr {
    pub order_id: i64,
    pub issued_at_millis: i64,
    pub suffix: String,
}

/// Issues a fresh token for the given order. Each call produces a distinct token; the random
/// suffix is what makes guessing stored tokens impractical.
pub fn issue_token(order_id: i64) -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix = format!("{:016x}", rand::random::<u64>());
    format!("{QR_PREFIX}-{order_id}-{millis}-{suffix}")
}

/// Structurally validates a token and extracts its fields. Rejects anything with the wrong
/// prefix, field count, or non-numeric id/timestamp.
pub fn parse_token(token: &str) -> Result<ParsedQr, QrError> {
    let parts: Vec<&str> = token.split('-').collect();
    if parts.len() != QR_FIELD_COUNT || parts[0] != QR_PREFIX {
        return Err(QrError::InvalidToken);
    }
    let order_id = parts[1].parse::<i64>().map_err(|_| QrError::InvalidToken)?;
    let issued_at_millis = parts[2].parse::<i64>().map_err(|_| QrError::InvalidToken)?;
    let suffix = parts[3];
    if suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(QrError::InvalidToken);
    }
    Ok(ParsedQr { order_id, issued_at_millis, suffix: suffix.to_string() })
}

/// Renders the token as an SVG data URL suitable for embedding straight into a client response.
pub fn render_image_data_url(token: &str) -> Result<String, QrError> {
    let code = QrCode::new(token.as_bytes()).map_err(|e| QrError::RenderFailed(e.to_string()))?;
    let image = code
        .render::<svg::Color>()
        .min_dimensions(QR_IMAGE_SIZE, QR_IMAGE_SIZE)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build();
    Ok(format!("data:image/svg+xml;base64,{}", BASE64.encode(image.as_bytes())))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn issued_tokens_parse_back() {
        let token = issue_token(42);
        let parsed = parse_token(&token).unwrap();
        assert_eq!(parsed.order_id, 42);
        assert_eq!(parsed.suffix.len(), 16);
    }

    #[test]
    fn issued_tokens_are_unique() {
        assert_ne!(issue_token(7), issue_token(7));
    }

    #[test]
    fn rejects_wrong_prefix() {
        assert_eq!(parse_token("XX-42-1700000000000-deadbeefdeadbeef"), Err(QrError::InvalidToken));
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert_eq!(parse_token("CE-42-1700000000000"), Err(QrError::InvalidToken));
        assert_eq!(parse_token("CE-42-1700000000000-aa-bb"), Err(QrError::InvalidToken));
        assert_eq!(parse_token(""), Err(QrError::InvalidToken));
    }

    #[test]
    fn rejects_non_numeric_fields() {
        assert_eq!(parse_token("CE-fortytwo-1700000000000-deadbeef"), Err(QrError::InvalidToken));
        assert_eq!(parse_token("CE-42-yesterday-deadbeef"), Err(QrError::InvalidToken));
        assert_eq!(parse_token("CE-42-1700000000000-nothexy!"), Err(QrError::InvalidToken));
    }

    #[test]
    fn renders_an_svg_data_url() {
        let url = render_image_data_url(&issue_token(1)).unwrap();
        assert!(url.starts_with("data:image/svg+xml;base64,"));
        assert!(url.len() > 100);
    }
}
