/// Business logic layer for message-hub
pub mod attachments;
pub mod frames;
pub mod mention_parser;
pub mod messages;
pub mod orientation;
pub mod sniff;

pub use attachments::AttachmentProcessor;
pub use frames::{FfmpegFrameExtractor, FrameExtractor};
pub use mention_parser::extract_mentions;
pub use messages::{MessageEdit, MessageService, NewMessage};
