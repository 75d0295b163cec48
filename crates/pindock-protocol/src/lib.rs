pub mod codec;
pub mod command;
pub mod frame;

pub use codec::LinkCodec;
pub use command::{Command, PinMode};
pub use frame::{CommandFrame, ReplyFrame};
