// MIT License
//
// Copyright (c) 2025 Takatoshi Kondo
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use std::time::Duration;

use derive_builder::Builder;

/// Recognized broker configuration options, defaults per the wire interface
/// table. `Broker::new` rejects a zero-valued capacity rather than silently
/// accepting one a real deployment could never make progress with.
#[derive(Debug, Clone, Builder)]
#[builder(default, build_fn(validate = "Self::validate"))]
pub struct BrokerConfig {
    pub max_clients: usize,
    pub event_queue_capacity: usize,
    pub deletion_queue_capacity: usize,
    pub outbox_capacity: usize,
    pub keepalive_check_interval_ms: u64,
    pub idle_sleep_ms: u64,
    pub worker_batch_size: usize,
}

impl BrokerConfig {
    pub fn keepalive_check_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_check_interval_ms)
    }

    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            max_clients: 16,
            event_queue_capacity: 50,
            deletion_queue_capacity: 20,
            outbox_capacity: 50,
            keepalive_check_interval_ms: 100,
            idle_sleep_ms: 10,
            worker_batch_size: 10,
        }
    }
}

impl BrokerConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("max_clients", self.max_clients),
            ("event_queue_capacity", self.event_queue_capacity),
            ("deletion_queue_capacity", self.deletion_queue_capacity),
            ("outbox_capacity", self.outbox_capacity),
        ] {
            if value == Some(0) {
                return Err(format!("{name} must be non-zero"));
            }
        }
        Ok(())
    }
}
