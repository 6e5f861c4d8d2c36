use std::fmt::Display;

use validator::validate_email;

/// Represents a valid, normalised email of a subscriber.
///
/// Surrounding whitespace is trimmed and the address is lower-cased, so two
/// spellings of the same mailbox map to the same subscriber row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriberEmail(String);

impl SubscriberEmail {
    pub fn parse(s: String) -> Result<Self, String> {
        let normalised = s.trim().to_lowercase();
        if validate_email(&normalised) {
            Ok(Self(normalised))
        } else {
            Err(format!("{s} is not a valid subscriber email."))
        }
    }

    /// The part before the `@`, used as a display name in emails.
    pub fn local_part(&self) -> &str {
        self.0.split('@').next().unwrap_or(&self.0)
    }
}

impl Display for SubscriberEmail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for SubscriberEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
