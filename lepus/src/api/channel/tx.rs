use crate::frame::{Commit, Frame, Rollback, SelectTx};

use super::super::error::{Error, Result};
use super::Channel;

/// APIs for the AMQP tx class: standard transactions over publishes and
/// acks. Mutually exclusive with publisher-confirm mode on one channel.
impl Channel {
    /// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#tx.select)
    ///
    /// # Errors
    ///
    /// Returns an error on communication failure.
    pub fn tx_select(&self) -> Result<()> {
        self.check_open()?;
        match self.rpc_call(SelectTx.into_frame())?.frame {
            Frame::SelectTxOk(..) => Ok(()),
            other => Err(Error::UnexpectedFrame(format!(
                "{} in reply to tx.select",
                other
            ))),
        }
    }

    /// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#tx.commit)
    ///
    /// # Errors
    ///
    /// Returns an error on communication failure.
    pub fn tx_commit(&self) -> Result<()> {
        self.check_open()?;
        match self.rpc_call(Commit.into_frame())?.frame {
            Frame::CommitOk(..) => Ok(()),
            other => Err(Error::UnexpectedFrame(format!(
                "{} in reply to tx.commit",
                other
            ))),
        }
    }

    /// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#tx.rollback)
    ///
    /// # Errors
    ///
    /// Returns an error on communication failure.
    pub fn tx_rollback(&self) -> Result<()> {
        self.check_open()?;
        match self.rpc_call(Rollback.into_frame())?.frame {
            Frame::RollbackOk(..) => Ok(()),
            other => Err(Error::UnexpectedFrame(format!(
                "{} in reply to tx.rollback",
                other
            ))),
        }
    }
}
