use serde::{Deserialize, Serialize};

use crate::payload::sha256_hex;

/// Success body of `POST /upload`: what the receiver actually got.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub len: u64,
    pub sha256: String,
}

impl UploadReceipt {
    pub fn for_payload(body: &[u8]) -> Self {
        Self {
            len: body.len() as u64,
            sha256: sha256_hex(body),
        }
    }
}

/// Error body for 404 and 500 responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_json_shape() {
        let receipt = UploadReceipt::for_payload(b"abc");
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["len"], 3);
        assert_eq!(
            json["sha256"],
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
