//! Subject/channel names used on the dispatch fabric, reusing the detail-type
//! strings normative in §4.6 and §6 — both NATS subjects and the in-memory
//! client's recorded tags use these verbatim.

pub use conduit_protocol::events::{DETAIL_TYPE_COMPLETED, DETAIL_TYPE_FAILED, DETAIL_TYPE_RECEIVED};
