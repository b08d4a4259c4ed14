use crate::frame::{Frame, Select};

use super::super::error::{Error, Result};
use super::super::impl_chainable_setter;
use super::Channel;

/// Arguments for [`confirm_select`]
///
/// See [RabbitMQ confirms](https://www.rabbitmq.com/confirms.html#publisher-confirms).
///
/// [`confirm_select`]: struct.Channel.html#method.confirm_select
#[derive(Debug, Clone, Default)]
pub struct ConfirmSelectArguments {
    /// Default: `false`.
    pub no_wait: bool,
}

impl ConfirmSelectArguments {
    /// Create new arguments with defaults.
    pub fn new(no_wait: bool) -> Self {
        Self { no_wait }
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        no_wait, bool
    }
    /// Finish chained configuration and return new arguments.
    pub fn finish(&mut self) -> Self {
        self.clone()
    }
}

/// APIs for the RabbitMQ confirm class.
impl Channel {
    /// Put the channel in publisher-confirm mode; subsequent publishes
    /// are assigned sequence numbers 1, 2, 3, ... and the broker
    /// acknowledges each one back.
    ///
    /// Register a [`ChannelCallback`] to observe the acks, or publish
    /// with [`basic_publish_confirm`] to block per message.
    ///
    /// See [RabbitMQ confirms](https://www.rabbitmq.com/confirms.html#publisher-confirms).
    ///
    /// # Errors
    ///
    /// Returns an error on communication failure.
    ///
    /// [`ChannelCallback`]: ../callbacks/trait.ChannelCallback.html
    /// [`basic_publish_confirm`]: struct.Channel.html#method.basic_publish_confirm
    pub fn confirm_select(&self, args: ConfirmSelectArguments) -> Result<()> {
        self.check_open()?;
        if args.no_wait {
            self.conn
                .send_frame(self.core.id(), Select::new(true).into_frame())?;
        } else {
            match self.rpc_call(Select::new(false).into_frame())?.frame {
                Frame::SelectOk(..) => {}
                other => {
                    return Err(Error::UnexpectedFrame(format!(
                        "{} in reply to confirm.select",
                        other
                    )))
                }
            }
        }
        self.core.confirm.lock().expect("confirm state lock").enabled = true;
        Ok(())
    }
}
