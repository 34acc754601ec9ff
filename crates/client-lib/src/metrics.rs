// ==============
// crates/client-lib/src/metrics.rs

//! Central place for metric keys
pub const SESSION_RESTORED: &str = "session.restored";
pub const SESSION_LOGIN: &str = "session.login";
pub const SESSION_LOGOUT: &str = "session.logout";
pub const TOKEN_REFRESH: &str = "session.token_refresh";
pub const TOKEN_REFRESH_FAILED: &str = "session.token_refresh_failed";
pub const REALTIME_CONNECTED: &str = "realtime.connected";
pub const REALTIME_DISCONNECTED: &str = "realtime.disconnected";
pub const REALTIME_EVENT_BUFFERED: &str = "realtime.event_buffered";
pub const REALTIME_EVENT_DROPPED: &str = "realtime.event_dropped";
pub const LOCATION_SAMPLE: &str = "location.sample";
pub const LOCATION_UPLOADED: &str = "location.uploaded";
pub const LOCATION_UPLOAD_FAILED: &str = "location.upload_failed";
