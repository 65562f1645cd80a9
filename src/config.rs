// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

/// Configuration for the SFU signaling hub.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "sfu-hub", version, about = "SFU signaling coordination hub")]
pub struct HubConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "SFU_HUB_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 9800, env = "SFU_HUB_PORT")]
    pub port: u16,

    /// Bearer/query token clients must present to join. If unset, auth is
    /// disabled (suitable for local development only).
    #[arg(long, env = "SFU_HUB_AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// Quality evaluation tick interval in milliseconds (§4.9).
    #[arg(long, default_value_t = 5000, env = "SFU_HUB_QUALITY_EVAL_MS")]
    pub quality_eval_ms: u64,

    /// ACK summary tick interval in milliseconds (§4.4/§4.9).
    #[arg(long, default_value_t = 2000, env = "SFU_HUB_ACK_SUMMARY_MS")]
    pub ack_summary_ms: u64,

    /// Fingerprint TTL sweep interval in milliseconds (§4.3/§4.9).
    #[arg(long, default_value_t = 5000, env = "SFU_HUB_FINGERPRINT_SWEEP_MS")]
    pub fingerprint_sweep_ms: u64,

    /// Fingerprint entry TTL in milliseconds (§4.3).
    #[arg(long, default_value_t = 15000, env = "SFU_HUB_FINGERPRINT_TTL_MS")]
    pub fingerprint_ttl_ms: u64,

    /// Low loss threshold for the quality controller (§4.5).
    #[arg(long, default_value_t = 0.02, env = "SFU_HUB_LOW_THRESH")]
    pub low_thresh: f64,

    /// Medium loss threshold for the quality controller (§4.5).
    #[arg(long, default_value_t = 0.05, env = "SFU_HUB_MED_THRESH")]
    pub med_thresh: f64,

    /// Hysteresis guard band for the quality controller (§4.5).
    #[arg(long, default_value_t = 0.02, env = "SFU_HUB_HYSTERESIS")]
    pub hysteresis: f64,

    /// Consecutive send-channel drops before a session is closed with
    /// `error{503}` (§7 Overload).
    #[arg(long, default_value_t = 64, env = "SFU_HUB_MAX_SEND_DROPS")]
    pub max_send_drops: u32,

    /// Grace window in milliseconds for abandoning outstanding engine
    /// calls on disconnect (§5 Cancellation).
    #[arg(long, default_value_t = 2000, env = "SFU_HUB_DISCONNECT_GRACE_MS")]
    pub disconnect_grace_ms: u64,
}

impl HubConfig {
    pub fn quality_eval_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.quality_eval_ms)
    }

    pub fn ack_summary_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.ack_summary_ms)
    }

    pub fn fingerprint_sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.fingerprint_sweep_ms)
    }

    pub fn fingerprint_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.fingerprint_ttl_ms)
    }

    pub fn disconnect_grace(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.disconnect_grace_ms)
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 9800,
            auth_token: None,
            quality_eval_ms: 5000,
            ack_summary_ms: 2000,
            fingerprint_sweep_ms: 5000,
            fingerprint_ttl_ms: 15000,
            low_thresh: 0.02,
            med_thresh: 0.05,
            hysteresis: 0.02,
            max_send_drops: 64,
            disconnect_grace_ms: 2000,
        }
    }
}
