// ABOUTME: Type-safe keys shared across the pipeline.
// ABOUTME: Uses phantom types to tie attachment names to their value types.

mod attachment;

pub use attachment::{AttachmentKey, Attachments};
