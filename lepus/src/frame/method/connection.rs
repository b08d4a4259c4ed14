use std::fmt;

use lepus_serde::constants::REPLY_SUCCESS;
use lepus_serde::types::{
    AmqpPeerProperties, Bit, LongStr, LongUint, Octect, ShortStr, ShortUint,
};
use serde::{Deserialize, Serialize};

/// `connection.start`, sent by the server to begin the handshake.
#[derive(Debug, Serialize, Deserialize)]
pub struct Start {
    version_major: Octect,
    version_minor: Octect,
    server_properties: AmqpPeerProperties,
    mechanisms: LongStr,
    locales: LongStr,
}

impl Start {
    pub fn version_major(&self) -> u8 {
        self.version_major
    }

    pub fn version_minor(&self) -> u8 {
        self.version_minor
    }

    pub fn server_properties(&self) -> &AmqpPeerProperties {
        &self.server_properties
    }

    pub fn mechanisms(&self) -> &String {
        self.mechanisms.as_ref()
    }

    pub fn locales(&self) -> &String {
        self.locales.as_ref()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartOk {
    client_properties: AmqpPeerProperties,
    mechanism: ShortStr,
    response: LongStr,
    locale: ShortStr,
}

impl StartOk {
    pub fn new(
        client_properties: AmqpPeerProperties,
        mechanism: ShortStr,
        response: LongStr,
        locale: ShortStr,
    ) -> Self {
        Self {
            client_properties,
            mechanism,
            response,
            locale,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Secure {
    challenge: LongStr,
}

impl Secure {
    pub fn challenge(&self) -> &String {
        self.challenge.as_ref()
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct SecureOk {
    response: LongStr,
}

impl SecureOk {
    pub fn new(response: LongStr) -> Self {
        Self { response }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Tune {
    channel_max: ShortUint,
    frame_max: LongUint,
    heartbeat: ShortUint,
}

impl Tune {
    pub fn channel_max(&self) -> u16 {
        self.channel_max
    }

    pub fn frame_max(&self) -> u32 {
        self.frame_max
    }

    pub fn heartbeat(&self) -> u16 {
        self.heartbeat
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct TuneOk {
    channel_max: ShortUint,
    frame_max: LongUint,
    heartbeat: ShortUint,
}

impl TuneOk {
    pub fn new(channel_max: ShortUint, frame_max: LongUint, heartbeat: ShortUint) -> Self {
        Self {
            channel_max,
            frame_max,
            heartbeat,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Open {
    virtual_host: ShortStr,
    /// Deprecated "capabilities", must be empty.
    capabilities: ShortStr,
    /// Deprecated "insist", must be zero.
    insist: Bit,
}

impl Open {
    pub fn new(virtual_host: ShortStr) -> Self {
        Self {
            virtual_host,
            capabilities: ShortStr::default(),
            insist: 0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OpenOk {
    /// Deprecated "known-hosts", must be empty.
    known_hosts: ShortStr,
}

/// `connection.close`, sent by either peer to begin the close handshake.
///
/// When the close is caused by a failing method, `class_id`/`method_id`
/// identify it; both are zero on a clean shutdown.
#[derive(Debug, Serialize, Deserialize)]
pub struct Close {
    reply_code: ShortUint,
    reply_text: ShortStr,
    class_id: ShortUint,
    method_id: ShortUint,
}

impl Close {
    pub fn new(
        reply_code: ShortUint,
        reply_text: ShortStr,
        class_id: ShortUint,
        method_id: ShortUint,
    ) -> Self {
        Self {
            reply_code,
            reply_text,
            class_id,
            method_id,
        }
    }

    pub fn reply_code(&self) -> u16 {
        self.reply_code
    }

    pub fn reply_text(&self) -> &String {
        self.reply_text.as_ref()
    }

    pub fn class_id(&self) -> u16 {
        self.class_id
    }

    pub fn method_id(&self) -> u16 {
        self.method_id
    }
}

impl Default for Close {
    fn default() -> Self {
        Self {
            reply_code: REPLY_SUCCESS,
            reply_text: ShortStr::default(),
            class_id: 0,
            method_id: 0,
        }
    }
}

impl fmt::Display for Close {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "connection closed, '{}: {}' (class_id = {}, method_id = {})",
            self.reply_code, self.reply_text, self.class_id, self.method_id
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct CloseOk;

/// `connection.blocked` (RabbitMQ extension): the server stopped reading
/// from the connection, typically due to a resource alarm.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Blocked {
    reason: ShortStr,
}

impl Blocked {
    pub fn reason(&self) -> &String {
        self.reason.as_ref()
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Unblocked;
