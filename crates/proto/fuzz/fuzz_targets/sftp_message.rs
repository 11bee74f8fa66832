//! Fuzz target for SFTP message parsing.
//!
//! Feeds random frames through the message, request and response parsers to
//! find:
//! - Panics on truncated or oversized fields
//! - Inconsistent re-encoding
//!
//! Run with:
//! ```bash
//! cd crates/proto
//! cargo +nightly fuzz run sftp_message -- -max_total_time=300
//! ```

#![no_main]
use libfuzzer_sys::fuzz_target;
use skein_proto::sftp::{FileAttributes, SftpMessage, SftpRequest, SftpResponse};

fuzz_target!(|data: &[u8]| {
    let _ = FileAttributes::from_bytes(data);

    let Ok(msg) = SftpMessage::from_bytes(data) else {
        return;
    };

    // Frame round trip must be exact
    let reparsed = SftpMessage::from_bytes(&msg.to_bytes()).expect("Re-encoded frame must parse");
    assert_eq!(msg, reparsed);

    if let Ok(request) = SftpRequest::from_message(&msg) {
        let again = SftpRequest::from_message(&request.to_message())
            .expect("Re-encoded request must parse");
        assert_eq!(request, again);
    }

    if let Ok(response) = SftpResponse::from_message(&msg) {
        let again = SftpResponse::from_message(&response.to_message())
            .expect("Re-encoded response must parse");
        assert_eq!(response.id(), again.id());
    }
});
