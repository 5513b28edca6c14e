use std::time::Duration;

/// Fixed 8-byte XOR seed for uuid masking and wire-level obfuscation.
/// Deployments that must interoperate need the same seed and salt.
pub const MASK_SEED: [u8; 8] = [0x5a, 0x1c, 0x83, 0x27, 0xd9, 0x4e, 0x6b, 0xf0];

/// Upper bound on the textual length of a node string.
pub const NODE_MAX_SIZE: usize = 24;

/// Grace window between stream open and a successful AUTH or PING.
pub const AUTH_GRACE: Duration = Duration::from_secs(3);

/// How often the expiry reaper scans for unauthenticated connections.
pub const REAPER_PERIOD: Duration = Duration::from_secs(5);

/// Retry budget of the admission controller.
pub const ADMIT_RETRIES: u32 = 100;

/// Sleep before each admission retry; 100 retries bound the wait at ~1s.
pub const ADMIT_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Default listening port.
pub const DEFAULT_PORT: u16 = 5081;

/// Default cap on in-flight data-plane handlers.
pub const DEFAULT_TASK_LIMIT: i64 = 65_536;

/// Default cap on concurrent streaming connections.
pub const DEFAULT_CONNECT_LIMIT: usize = 65_536;

/// Default per-frame size cap (10 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Default per-connection frame frequency cap, in frames per second.
pub const DEFAULT_HERTZ: f64 = 100.0;
