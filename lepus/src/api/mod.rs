pub mod callbacks;
pub mod channel;
pub mod connection;
pub mod consumer;
pub mod error;
pub mod message;
pub mod security;
#[cfg(feature = "tls")]
pub mod tls;

mod macros {
    /// Generates a chainable setter for one argument-struct field.
    macro_rules! impl_chainable_setter {
        ($(#[$meta:meta])* $field:ident, $typ:ty) => {
            $(#[$meta])*
            pub fn $field(&mut self, value: $typ) -> &mut Self {
                self.$field = value;
                self
            }
        };
    }
    pub(crate) use impl_chainable_setter;
}
pub(crate) use macros::impl_chainable_setter;
