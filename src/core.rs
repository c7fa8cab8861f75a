use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use time::{OffsetDateTime, format_description::well_known::Rfc3339};

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Client-side document/file id: hex seconds, hex millis, hex sequence.
/// Always 20 lowercase hex chars, so it is a valid remote id.
pub fn unique_id() -> String {
	let now = OffsetDateTime::now_utc();
	let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed) ^ (u64::from(std::process::id()) << 12);
	format!(
		"{:08x}{:05x}{:07x}",
		now.unix_timestamp() & 0xffff_ffff,
		now.millisecond(),
		seq & 0x0fff_ffff
	)
}

pub fn now_millis() -> i128 {
	OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000
}

pub fn timestamp() -> String {
	let now = OffsetDateTime::now_utc();
	now.format(&Rfc3339)
		.unwrap_or_else(|_| now.unix_timestamp().to_string())
}

pub fn display(p: &Path) -> String {
	p.to_string_lossy().into_owned()
}
