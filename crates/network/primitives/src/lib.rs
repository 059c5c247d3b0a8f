//! Wire types shared by everything that speaks the block exchange protocol.

pub mod messages;
pub mod stream;
