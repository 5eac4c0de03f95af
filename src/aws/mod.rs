use aws_smithy_types::DateTime;
use chrono::{DateTime as ChronoDateTime, Local, Utc};

pub mod credentials;
pub mod sso;

/// AWS temporary credentials structure
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: DateTime,
}

impl Credentials {
    /// Expiration converted to the machine's local time zone.
    pub fn expiration_local(&self) -> Option<ChronoDateTime<Local>> {
        ChronoDateTime::<Utc>::from_timestamp(
            self.expiration.secs(),
            self.expiration.subsec_nanos(),
        )
        .map(|utc| utc.with_timezone(&Local))
    }
}

pub use sso::{RoleCredentialsExchange, SsoPortal};
