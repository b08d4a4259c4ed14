use lepus_serde::types::Octect;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
struct ProtocolName(Octect, Octect, Octect, Octect);

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
struct ProtocolVersion {
    major: Octect,
    minor: Octect,
    revision: Octect,
}

/// The eight literal bytes `AMQP\x00\x00\x09\x01` a client writes before
/// anything else. Not a frame; it has no header and no end marker.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProtocolHeader {
    name: ProtocolName,
    id: Octect,
    version: ProtocolVersion,
}

impl Default for ProtocolHeader {
    fn default() -> Self {
        Self {
            name: ProtocolName(b'A', b'M', b'Q', b'P'),
            id: 0,
            version: ProtocolVersion {
                major: 0,
                minor: 9,
                revision: 1,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use lepus_serde::{from_bytes, to_bytes};

    use super::ProtocolHeader;

    #[test]
    fn wire_bytes() {
        let header = ProtocolHeader::default();
        assert_eq!(
            vec![0x41, 0x4D, 0x51, 0x50, 0x00, 0x00, 0x09, 0x01],
            to_bytes(&header).unwrap()
        );
    }

    #[test]
    fn round_trip() {
        let data = [65, 77, 81, 80, 0, 0, 9, 1];
        let header: ProtocolHeader = from_bytes(&data).unwrap();
        assert_eq!(ProtocolHeader::default(), header);
    }
}
