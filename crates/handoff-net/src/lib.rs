/// Network handoff: the HTTP analog of the filesystem handoff.
///
/// The sender uploads a random payload to `POST /upload`; the receiver
/// answers with the length and SHA-256 it actually received so the sender
/// can verify integrity without a second round trip.

pub mod receiver;
pub mod sender;

pub use receiver::{UPLOAD_PATH, read_body, router, serve};
pub use sender::{NetSender, verify_receipt};
