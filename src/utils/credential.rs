use rand::Rng;
use regex::Regex;
use std::sync::OnceLock;

pub const TOKEN_LEN: usize = 32;

/// Parsed form of a QR credential `SNOO-E{event}-R{registration}-{token}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrCredential {
    pub event_id: i64,
    pub registration_id: i64,
    pub token: String,
}

fn credential_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^SNOO-E(\d+)-R(\d+)-([0-9a-f]{32})$").expect("valid regex"))
}

/// Random lowercase-hex secret token for a new registration.
pub fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    (0..TOKEN_LEN)
        .map(|_| {
            let n: u8 = rng.gen_range(0..16);
            char::from_digit(u32::from(n), 16).unwrap_or('0')
        })
        .collect()
}

pub fn format_credential(event_id: i64, registration_id: i64, token: &str) -> String {
    format!("SNOO-E{event_id}-R{registration_id}-{token}")
}

/// Parse a scanned credential. Any deviation from the fixed grammar is `None`;
/// the caller maps that to an invalid-credential rejection.
pub fn parse_credential(qr_data: &str) -> Option<QrCredential> {
    let caps = credential_re().captures(qr_data.trim())?;
    let event_id = caps.get(1)?.as_str().parse().ok()?;
    let registration_id = caps.get(2)?.as_str().parse().ok()?;
    let token = caps.get(3)?.as_str().to_string();

    Some(QrCredential {
        event_id,
        registration_id,
        token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_fixed_length_hex() {
        let token = generate_token();
        assert_eq!(token.len(), TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn round_trips_through_format_and_parse() {
        let token = generate_token();
        let credential = format_credential(12, 345, &token);
        let parsed = parse_credential(&credential).unwrap();
        assert_eq!(parsed.event_id, 12);
        assert_eq!(parsed.registration_id, 345);
        assert_eq!(parsed.token, token);
    }

    #[test]
    fn rejects_malformed_credentials() {
        assert!(parse_credential("").is_none());
        assert!(parse_credential("SNOO-E12-R345").is_none());
        assert!(parse_credential("SNOO-E12-R345-zzzz").is_none());
        assert!(parse_credential("SNOO-Ex-R345-0123456789abcdef0123456789abcdef").is_none());
        // Uppercase hex is outside the grammar.
        assert!(parse_credential("SNOO-E12-R345-0123456789ABCDEF0123456789ABCDEF").is_none());
        // Trailing garbage.
        assert!(
            parse_credential("SNOO-E12-R345-0123456789abcdef0123456789abcdef-extra").is_none()
        );
    }
}
