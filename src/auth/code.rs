use std::io::Cursor;

use time::OffsetDateTime;

/// Derives the confirmation code from identity fields, the rotating
/// `updated_at` nonce and the application secret.
///
/// The code is never stored: validation recomputes it and compares, so its
/// lifetime is implicitly bounded by the `updated_at` value it was derived
/// from. A 32-bit MurmurHash3 rendered as the absolute value in decimal.
/// Deliberately low-assurance: each code is single-use and email delivery is
/// the actual secrecy boundary.
pub fn generate_code(
    username: &str,
    email: &str,
    updated_at: OffsetDateTime,
    secret: &str,
) -> anyhow::Result<String> {
    let input = format!(
        "{username}{email}{}{secret}",
        updated_at.unix_timestamp_nanos()
    );
    let hash = murmur3::murmur3_32(&mut Cursor::new(input.as_bytes()), 0)?;
    Ok((hash as i32).unsigned_abs().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn ts() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        let a = generate_code("neo", "neo@matrix.io", ts(), "secret").unwrap();
        let b = generate_code("neo", "neo@matrix.io", ts(), "secret").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn output_is_a_decimal_string() {
        let code = generate_code("neo", "neo@matrix.io", ts(), "secret").unwrap();
        assert!(!code.is_empty());
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn changing_any_input_changes_the_code() {
        let base = generate_code("neo", "neo@matrix.io", ts(), "secret").unwrap();
        let by_username = generate_code("trinity", "neo@matrix.io", ts(), "secret").unwrap();
        let by_email = generate_code("neo", "trinity@matrix.io", ts(), "secret").unwrap();
        let by_nonce =
            generate_code("neo", "neo@matrix.io", ts() + Duration::seconds(1), "secret").unwrap();
        let by_secret = generate_code("neo", "neo@matrix.io", ts(), "other").unwrap();
        assert_ne!(base, by_username);
        assert_ne!(base, by_email);
        assert_ne!(base, by_nonce);
        assert_ne!(base, by_secret);
    }
}
