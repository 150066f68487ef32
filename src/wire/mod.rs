//! Wire framing and opcode messages.

pub mod header;
pub mod message;
pub mod op_crud;
pub mod op_get_more;
pub mod op_kill_cursors;
pub mod op_msg;
pub mod op_reply;
pub mod opcode;

pub use header::{MessageHeader, HEADER_SIZE};
pub use message::Message;
pub use op_msg::OpMsg;
pub use op_reply::OpReply;
