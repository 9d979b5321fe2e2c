//! AUTH LOGIN framing.
//!
//! The server prompts with base64 `Username:` / `Password:` in 334
//! replies and expects each answer base64-encoded on its own line.

use base64::Engine;

/// What a 334 challenge asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginPrompt {
    Username,
    Password,
    /// Decoded to something else, or not base64 at all.
    Other(String),
}

/// Decode the text of a 334 reply into a [`LoginPrompt`].
pub fn decode_prompt(challenge: &str) -> LoginPrompt {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(challenge.trim().as_bytes())
        .ok()
        .and_then(|raw| String::from_utf8(raw).ok());
    match decoded {
        Some(text) => match text.trim().to_ascii_lowercase().as_str() {
            "username:" => LoginPrompt::Username,
            "password:" => LoginPrompt::Password,
            _ => LoginPrompt::Other(text),
        },
        None => LoginPrompt::Other(challenge.to_string()),
    }
}

/// Base64 answer line for a LOGIN prompt, CRLF included.
pub fn login_response(secret: &str) -> Vec<u8> {
    let mut line = base64::engine::general_purpose::STANDARD
        .encode(secret.as_bytes())
        .into_bytes();
    line.extend_from_slice(b"\r\n");
    line
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_standard_prompts() {
        assert_eq!(decode_prompt("VXNlcm5hbWU6"), LoginPrompt::Username);
        assert_eq!(decode_prompt("UGFzc3dvcmQ6"), LoginPrompt::Password);
    }

    #[test]
    fn prompt_match_ignores_case() {
        // base64("username:")
        assert_eq!(decode_prompt("dXNlcm5hbWU6"), LoginPrompt::Username);
    }

    #[test]
    fn unknown_prompt_is_reported() {
        // base64("Token:")
        assert_eq!(decode_prompt("VG9rZW46"), LoginPrompt::Other("Token:".into()));
        assert!(matches!(decode_prompt("not base64!"), LoginPrompt::Other(_)));
    }

    #[test]
    fn login_response_is_base64_line() {
        let line = login_response("mailer@example.com");
        assert!(line.ends_with(b"\r\n"));
        let body = std::str::from_utf8(&line[..line.len() - 2]).unwrap();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(body.as_bytes())
            .unwrap();
        assert_eq!(decoded, b"mailer@example.com");
    }
}
