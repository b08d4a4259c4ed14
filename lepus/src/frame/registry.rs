//! Static description of every method in the protocol.
//!
//! The table mirrors the AMQP 0-9-1 specification XML (with the RabbitMQ
//! extensions) and drives RPC reply matching; the unit tests cross-check
//! it against the typed frame union.

use lepus_serde::types::{AmqpClassId, AmqpMethodId};

#[derive(Debug)]
pub struct MethodInfo {
    pub class_id: AmqpClassId,
    pub method_id: AmqpMethodId,
    pub name: &'static str,
    /// A header frame plus body frames follow this method.
    pub has_content: bool,
    /// The sender blocks until one of `replies` arrives.
    pub is_synchronous: bool,
    pub replies: &'static [(AmqpClassId, AmqpMethodId)],
}

const fn info(
    class_id: AmqpClassId,
    method_id: AmqpMethodId,
    name: &'static str,
    has_content: bool,
    is_synchronous: bool,
    replies: &'static [(AmqpClassId, AmqpMethodId)],
) -> MethodInfo {
    MethodInfo {
        class_id,
        method_id,
        name,
        has_content,
        is_synchronous,
        replies,
    }
}

#[rustfmt::skip]
pub static METHODS: &[MethodInfo] = &[
    // connection, class 10
    info(10, 10, "connection.start", false, true, &[(10, 11)]),
    info(10, 11, "connection.start-ok", false, false, &[]),
    info(10, 20, "connection.secure", false, true, &[(10, 21)]),
    info(10, 21, "connection.secure-ok", false, false, &[]),
    info(10, 30, "connection.tune", false, true, &[(10, 31)]),
    info(10, 31, "connection.tune-ok", false, false, &[]),
    info(10, 40, "connection.open", false, true, &[(10, 41)]),
    info(10, 41, "connection.open-ok", false, false, &[]),
    info(10, 50, "connection.close", false, true, &[(10, 51)]),
    info(10, 51, "connection.close-ok", false, false, &[]),
    info(10, 60, "connection.blocked", false, false, &[]),
    info(10, 61, "connection.unblocked", false, false, &[]),
    // channel, class 20
    info(20, 10, "channel.open", false, true, &[(20, 11)]),
    info(20, 11, "channel.open-ok", false, false, &[]),
    info(20, 20, "channel.flow", false, true, &[(20, 21)]),
    info(20, 21, "channel.flow-ok", false, false, &[]),
    info(20, 40, "channel.close", false, true, &[(20, 41)]),
    info(20, 41, "channel.close-ok", false, false, &[]),
    // exchange, class 40
    info(40, 10, "exchange.declare", false, true, &[(40, 11)]),
    info(40, 11, "exchange.declare-ok", false, false, &[]),
    info(40, 20, "exchange.delete", false, true, &[(40, 21)]),
    info(40, 21, "exchange.delete-ok", false, false, &[]),
    info(40, 30, "exchange.bind", false, true, &[(40, 31)]),
    info(40, 31, "exchange.bind-ok", false, false, &[]),
    info(40, 40, "exchange.unbind", false, true, &[(40, 51)]),
    info(40, 51, "exchange.unbind-ok", false, false, &[]),
    // queue, class 50
    info(50, 10, "queue.declare", false, true, &[(50, 11)]),
    info(50, 11, "queue.declare-ok", false, false, &[]),
    info(50, 20, "queue.bind", false, true, &[(50, 21)]),
    info(50, 21, "queue.bind-ok", false, false, &[]),
    info(50, 30, "queue.purge", false, true, &[(50, 31)]),
    info(50, 31, "queue.purge-ok", false, false, &[]),
    info(50, 40, "queue.delete", false, true, &[(50, 41)]),
    info(50, 41, "queue.delete-ok", false, false, &[]),
    info(50, 50, "queue.unbind", false, true, &[(50, 51)]),
    info(50, 51, "queue.unbind-ok", false, false, &[]),
    // basic, class 60
    info(60, 10, "basic.qos", false, true, &[(60, 11)]),
    info(60, 11, "basic.qos-ok", false, false, &[]),
    info(60, 20, "basic.consume", false, true, &[(60, 21)]),
    info(60, 21, "basic.consume-ok", false, false, &[]),
    info(60, 30, "basic.cancel", false, true, &[(60, 31)]),
    info(60, 31, "basic.cancel-ok", false, false, &[]),
    info(60, 40, "basic.publish", true, false, &[]),
    info(60, 50, "basic.return", true, false, &[]),
    info(60, 60, "basic.deliver", true, false, &[]),
    info(60, 70, "basic.get", false, true, &[(60, 71), (60, 72)]),
    info(60, 71, "basic.get-ok", true, false, &[]),
    info(60, 72, "basic.get-empty", false, false, &[]),
    info(60, 80, "basic.ack", false, false, &[]),
    info(60, 90, "basic.reject", false, false, &[]),
    info(60, 100, "basic.recover-async", false, false, &[]),
    info(60, 110, "basic.recover", false, true, &[(60, 111)]),
    info(60, 111, "basic.recover-ok", false, false, &[]),
    info(60, 120, "basic.nack", false, false, &[]),
    // confirm, class 85 (RabbitMQ extension)
    info(85, 10, "confirm.select", false, true, &[(85, 11)]),
    info(85, 11, "confirm.select-ok", false, false, &[]),
    // tx, class 90
    info(90, 10, "tx.select", false, true, &[(90, 11)]),
    info(90, 11, "tx.select-ok", false, false, &[]),
    info(90, 20, "tx.commit", false, true, &[(90, 21)]),
    info(90, 21, "tx.commit-ok", false, false, &[]),
    info(90, 30, "tx.rollback", false, true, &[(90, 31)]),
    info(90, 31, "tx.rollback-ok", false, false, &[]),
];

pub fn lookup(class_id: AmqpClassId, method_id: AmqpMethodId) -> Option<&'static MethodInfo> {
    METHODS
        .iter()
        .find(|info| info.class_id == class_id && info.method_id == method_id)
}

/// Reply set of a synchronous method; empty for asynchronous methods.
pub fn replies_of(class_id: AmqpClassId, method_id: AmqpMethodId) -> &'static [(u16, u16)] {
    lookup(class_id, method_id).map_or(&[], |info| info.replies)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn ids_are_unique() {
        let mut seen = HashSet::new();
        for info in METHODS {
            assert!(
                seen.insert((info.class_id, info.method_id)),
                "duplicate entry for {}",
                info.name
            );
        }
    }

    #[test]
    fn content_methods() {
        let content: HashSet<_> = METHODS
            .iter()
            .filter(|info| info.has_content)
            .map(|info| (info.class_id, info.method_id))
            .collect();
        let expected: HashSet<_> = [(60, 40), (60, 50), (60, 60), (60, 71)].into();
        assert_eq!(expected, content);
    }

    #[test]
    fn synchronous_methods_pair_with_their_replies() {
        for info in METHODS {
            assert_eq!(
                info.is_synchronous,
                !info.replies.is_empty(),
                "{} reply set disagrees with its synchronous flag",
                info.name
            );
            for (class_id, method_id) in info.replies {
                let reply = lookup(*class_id, *method_id)
                    .unwrap_or_else(|| panic!("{} reply is not in the table", info.name));
                assert_eq!(info.class_id, reply.class_id);
                assert!(!reply.is_synchronous, "{} reply awaits a reply", info.name);
            }
        }
    }

    #[test]
    fn every_frame_variant_is_registered() {
        use crate::frame::*;

        // spot-check the union against the table through each class
        for header in [
            Start::header(),
            OpenChannel::header(),
            Declare::header(),
            DeclareQueue::header(),
            Publish::header(),
            Select::header(),
            SelectTx::header(),
            Nack::header(),
        ] {
            assert!(lookup(header.class_id(), header.method_id()).is_some());
        }
    }
}
