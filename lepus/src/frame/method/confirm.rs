use lepus_serde::types::Boolean;
use serde::{Deserialize, Serialize};

/// `confirm.select` (RabbitMQ extension): put the channel into publisher
/// confirm mode.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Select {
    nowait: Boolean,
}

impl Select {
    pub fn new(nowait: bool) -> Self {
        Self {
            nowait: nowait as Boolean,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct SelectOk;
