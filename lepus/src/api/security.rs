//! Credentials and SASL mechanism selection for opening a connection.

use bytes::BytesMut;
use lepus_serde::to_buffer;
use lepus_serde::types::{LongStr, ShortStr};

/// Credentials used to open a connection.
#[derive(Clone)]
pub struct SecurityCredentials {
    username: String,
    password: String,
    mechanism: AuthenticationMechanism,
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone)]
#[non_exhaustive]
enum AuthenticationMechanism {
    PLAIN,
    AMQPLAIN,
    EXTERNAL,
}

impl SecurityCredentials {
    /// SASL/PLAIN credential with the given `username` and `password`.
    ///
    /// See [RabbitMQ access control](https://www.rabbitmq.com/access-control.html#mechanisms).
    pub fn new_plain(username: &str, password: &str) -> Self {
        Self {
            username: username.to_owned(),
            password: password.to_owned(),
            mechanism: AuthenticationMechanism::PLAIN,
        }
    }

    /// AMQPLAIN credential with the given `username` and `password`.
    pub fn new_amqplain(username: &str, password: &str) -> Self {
        Self {
            username: username.to_owned(),
            password: password.to_owned(),
            mechanism: AuthenticationMechanism::AMQPLAIN,
        }
    }

    /// EXTERNAL, carrying no credentials; pair with mutual TLS.
    pub fn new_external() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            mechanism: AuthenticationMechanism::EXTERNAL,
        }
    }

    pub(crate) fn mechanism_name(&self) -> &str {
        match self.mechanism {
            AuthenticationMechanism::PLAIN => "PLAIN",
            AuthenticationMechanism::AMQPLAIN => "AMQPLAIN",
            AuthenticationMechanism::EXTERNAL => "EXTERNAL",
        }
    }

    /// The challenge response sent in `start-ok` (and `secure-ok`).
    pub(crate) fn response(&self) -> String {
        match self.mechanism {
            AuthenticationMechanism::PLAIN => format!("\0{}\0{}", self.username, self.password),
            AuthenticationMechanism::AMQPLAIN => {
                // an AMQP field-table body without the length prefix:
                // LOGIN and PASSWORD as long strings
                let mut buf = BytesMut::new();
                let mut put = |key: &str, value: &str| {
                    let key: ShortStr = key.try_into().expect("literal key fits");
                    let value: LongStr = value.try_into().expect("credential fits a long string");
                    to_buffer(&key, &mut buf).expect("buffer write");
                    to_buffer(&'S', &mut buf).expect("buffer write");
                    to_buffer(&value, &mut buf).expect("buffer write");
                };
                put("LOGIN", &self.username);
                put("PASSWORD", &self.password);
                String::from_utf8_lossy(&buf).into_owned()
            }
            AuthenticationMechanism::EXTERNAL => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SecurityCredentials;

    #[test]
    fn plain_response_layout() {
        let creds = SecurityCredentials::new_plain("guest", "guest");
        assert_eq!("PLAIN", creds.mechanism_name());
        assert_eq!("\0guest\0guest", creds.response());
    }

    #[test]
    fn amqplain_response_layout() {
        let creds = SecurityCredentials::new_amqplain("user", "pw");
        let response = creds.response();
        let bytes = response.as_bytes();
        assert_eq!(b'\x05', bytes[0]);
        assert_eq!(b"LOGIN", &bytes[1..6]);
        assert_eq!(b'S', bytes[6]);
        assert_eq!([0, 0, 0, 4], bytes[7..11]);
        assert_eq!(b"user", &bytes[11..15]);
    }
}
