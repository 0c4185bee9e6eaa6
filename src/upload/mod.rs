//! Upload engine: one session at a time, written chunk by chunk into a sink.

pub mod driver;
pub mod flash;
pub mod multipart;
pub mod receiver;
pub mod sink;

pub use driver::{ReceiverDriver, UPLOAD_SIZE_HEADER};
pub use flash::{usable_space, FirmwareSink, FlashWriter, ImageFlash};
pub use multipart::{parse_boundary, MultipartReader, PartVisitor};
pub use receiver::{SessionId, UploadMeta, UploadReceiver, UploadStatus};
pub use sink::{FileSink, UploadSink, MAX_FILE_NAME_LEN};
