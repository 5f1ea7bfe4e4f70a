//! Diagnostics sender: ships per-frame metrics to `spritegl-telemetry` over UDP.
//!
//! Enabled by the `diagnostics` feature flag. The window loop owns a
//! [`DiagSender`] and calls [`send`](DiagSender::send) once per frame; sends
//! are throttled to 10 Hz and serialized as one JSON datagram to
//! `127.0.0.1:9100`. Nothing blocks: if no TUI is listening the datagram is
//! dropped.

use std::net::{ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::demo::FrameStats;
use crate::time::FrameTimer;

/// Where `spritegl-telemetry` listens.
pub const TELEMETRY_ADDR: &str = "127.0.0.1:9100";
const SEND_INTERVAL: Duration = Duration::from_millis(100);

// ── Snapshot (wire format) ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct DiagSnapshot {
    pub fps: f32,
    pub smoothed_fps: f32,
    pub delta_ms: f32,
    pub frame_count: u64,
    pub elapsed_secs: f32,
    pub sprites: usize,
    pub draw_calls: u32,
    pub instances: u32,
    pub capacity: usize,
}

impl DiagSnapshot {
    pub fn capture(timer: &FrameTimer, stats: &FrameStats, capacity: usize) -> Self {
        Self {
            fps: timer.fps(),
            smoothed_fps: timer.smoothed_fps(),
            delta_ms: timer.delta_ms(),
            frame_count: timer.frame_count(),
            elapsed_secs: timer.elapsed_secs(),
            sprites: stats.sprites,
            draw_calls: stats.draw_calls,
            instances: stats.instances,
            capacity,
        }
    }
}

// ── DiagSender ──────────────────────────────────────────────────────────

/// Owns the outbound UDP socket and throttling state.
pub struct DiagSender {
    socket: UdpSocket,
    last_send: Option<Instant>,
}

impl DiagSender {
    /// Connect to [`TELEMETRY_ADDR`]. `None` if no local socket could be bound.
    pub fn new() -> Option<Self> {
        Self::connect(TELEMETRY_ADDR)
    }

    pub fn connect(addr: impl ToSocketAddrs) -> Option<Self> {
        let socket = UdpSocket::bind("127.0.0.1:0").ok()?;
        socket.connect(addr).ok()?;
        socket.set_nonblocking(true).ok()?;
        log::debug!("diagnostics sender bound to {:?}", socket.local_addr().ok());
        Some(Self { socket, last_send: None })
    }

    /// Send a snapshot unless one went out less than 100 ms ago.
    /// Returns whether a datagram was sent.
    pub fn send(&mut self, timer: &FrameTimer, stats: &FrameStats, capacity: usize) -> bool {
        let now = Instant::now();
        if self.last_send.is_some_and(|last| now.duration_since(last) < SEND_INTERVAL) {
            return false;
        }
        self.last_send = Some(now);

        let snapshot = DiagSnapshot::capture(timer, stats, capacity);
        match serde_json::to_vec(&snapshot) {
            // Errors (e.g. ECONNREFUSED with no listener) are expected and ignored.
            Ok(bytes) => self.socket.send(&bytes).is_ok(),
            Err(e) => {
                log::warn!("diagnostics snapshot failed to serialize: {e}");
                false
            }
        }
    }
}
