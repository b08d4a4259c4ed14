use std::fmt;

use lepus_serde::constants::REPLY_SUCCESS;
use lepus_serde::types::{Boolean, LongStr, ShortStr, ShortUint};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct OpenChannel {
    /// Deprecated "out-of-band", must be empty.
    out_of_band: ShortStr,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct OpenChannelOk {
    /// Deprecated "channel-id", must be empty.
    channel_id: LongStr,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Flow {
    active: Boolean,
}

impl Flow {
    pub fn new(active: bool) -> Self {
        Self {
            active: active as Boolean,
        }
    }

    pub fn active(&self) -> bool {
        self.active != 0
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct FlowOk {
    active: Boolean,
}

impl FlowOk {
    pub fn new(active: bool) -> Self {
        Self {
            active: active as Boolean,
        }
    }

    pub fn active(&self) -> bool {
        self.active != 0
    }
}

/// `channel.close`, sent by either peer to tear down one channel.
#[derive(Debug, Serialize, Deserialize)]
pub struct CloseChannel {
    reply_code: ShortUint,
    reply_text: ShortStr,
    class_id: ShortUint,
    method_id: ShortUint,
}

impl CloseChannel {
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

impl Default for CloseChannel {
    fn default() -> Self {
        Self {
            reply_code: REPLY_SUCCESS,
            reply_text: ShortStr::default(),
            class_id: 0,
            method_id: 0,
        }
    }
}

impl fmt::Display for CloseChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "channel closed, '{}: {}' (class_id = {}, method_id = {})",
            self.reply_code, self.reply_text, self.class_id, self.method_id
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct CloseChannelOk;
