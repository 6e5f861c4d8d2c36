use std::fmt::Display;

/// Where a subscriber is in the double opt-in lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Waiting for the subscriber to click the confirmation link.
    Pending,
    Subscribed,
    Unsubscribed,
}

impl SubscriptionState {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s {
            "pending" => Ok(Self::Pending),
            "subscribed" => Ok(Self::Subscribed),
            "unsubscribed" => Ok(Self::Unsubscribed),
            other => Err(format!("{other} is not a valid subscription state.")),
        }
    }

    /// Whether unsubscribing from this state changes anything.
    pub fn can_unsubscribe(&self) -> bool {
        matches!(self, Self::Pending | Self::Subscribed)
    }
}

impl AsRef<str> for SubscriptionState {
    fn as_ref(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Subscribed => "subscribed",
            Self::Unsubscribed => "unsubscribed",
        }
    }
}

impl Display for SubscriptionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}
