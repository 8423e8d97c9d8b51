//! Producer-side collaborator of the validation protocol.
//!
//! The producer answers Interests under its prefix with generated Data and
//! keeps a content-timestamp store recording when each name last changed.
//! A probe Interest is answered with a reply that mirrors the probe's
//! `node_index` and `pit_list` and carries `expiration_flag = 0` when the
//! probe's timestamp still matches the store, `1` otherwise. Content
//! updates happen on a coarse once-per-second tick.

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_fvdn_common::ndn::{Data, Interest, Name};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Recognized producer options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    /// Prefix the producer has data for.
    pub prefix: String,
    /// Virtual payload size for content packets, in bytes.
    pub payload_size: usize,
    /// Freshness of data packets in milliseconds; 0 is allowed.
    pub freshness_ms: u64,
    /// Fake signature value; 0 means valid.
    pub signature: u32,
    /// Name used for the key locator; unset disables it.
    pub key_locator: Option<String>,
    /// Average seconds between content updates at the origin.
    pub average_update_time_s: u64,
    /// Bound on the content-timestamp store.
    pub max_store_size: usize,
    /// Experiment duration in seconds, consumed by the host.
    pub experiment_time_s: u64,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            prefix: "/".to_string(),
            payload_size: 1024,
            freshness_ms: 0,
            signature: 0,
            key_locator: None,
            average_update_time_s: 10,
            max_store_size: 10_000,
            experiment_time_s: 100,
        }
    }
}

/// One name's update state at the origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTimestampEntry {
    pub name: Name,
    /// Seconds between updates of this content.
    pub update_time_s: u64,
    /// Second at which this content last changed.
    pub last_update_time_s: u64,
}

pub struct Producer {
    config: ProducerConfig,
    prefix: Name,
    key_locator: Option<Name>,
    store: VecDeque<ContentTimestampEntry>,
    rng: StdRng,
}

impl Producer {
    pub fn new(config: ProducerConfig) -> Self {
        let rng = StdRng::from_entropy();
        Self::with_rng(config, rng)
    }

    /// Deterministic store seeding, for reproducible hosts and tests.
    pub fn with_seed(config: ProducerConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: ProducerConfig, rng: StdRng) -> Self {
        let prefix = Name::from_string(&config.prefix);
        let key_locator = config.key_locator.as_deref().map(Name::from_string);
        Self {
            config,
            prefix,
            key_locator,
            store: VecDeque::new(),
            rng,
        }
    }

    pub fn prefix(&self) -> &Name {
        &self.prefix
    }

    pub fn config(&self) -> &ProducerConfig {
        &self.config
    }

    pub fn store_len(&self) -> usize {
        self.store.len()
    }

    /// Coarse update clock: advances `last_update_time` for every content
    /// whose update period has elapsed. The host calls this once per
    /// second.
    pub fn tick(&mut self, now_s: u64) {
        for entry in &mut self.store {
            if now_s.saturating_sub(entry.last_update_time_s) >= entry.update_time_s {
                entry.last_update_time_s = now_s;
            }
        }
    }

    /// Answers one Interest, probe or plain.
    pub fn on_interest(&mut self, interest: &Interest, now_s: u64) -> Data {
        if interest.signal_flag {
            let (expired, timestamp) = self.check_expiration(interest, now_s);
            debug!(
                "producer probe interest={} timestamp={} expired={}",
                interest.name, interest.timestamp, expired
            );
            let mut data = self.generate_data(&interest.name);
            data.signal_flag = true;
            data.node_index = interest.node_index;
            data.pit_list = interest.pit_list.clone();
            data.expiration_flag = expired;
            data.timestamp = timestamp;
            data
        } else {
            let timestamp = self.timestamp_for(&interest.name, now_s);
            debug!(
                "producer responding interest={} timestamp={}",
                interest.name, timestamp
            );
            let mut data = self.generate_data(&interest.name);
            data.timestamp = timestamp;
            data
        }
    }

    /// The store's timestamp for `name`, seeding a new entry on first use:
    /// the update period is drawn uniformly around the configured average,
    /// and the last update falls within one period of now.
    fn timestamp_for(&mut self, name: &Name, now_s: u64) -> u64 {
        if let Some(entry) = self.store.iter().find(|e| &e.name == name) {
            return entry.last_update_time_s;
        }

        let average = self.config.average_update_time_s.max(1);
        let update_time_s = self.rng.gen_range(1..=(2 * average).saturating_sub(1));
        let earliest = now_s.saturating_sub(update_time_s - 1);
        let last_update_time_s = self.rng.gen_range(earliest..=now_s);

        if self.store.len() >= self.config.max_store_size.max(1) {
            self.store.pop_front();
        }
        self.store.push_back(ContentTimestampEntry {
            name: name.clone(),
            update_time_s,
            last_update_time_s,
        });
        last_update_time_s
    }

    /// A probe validates iff its timestamp equals the store's last update
    /// time. An unknown name is treated as expired with the current time,
    /// so it degrades to a normal fetch.
    fn check_expiration(&self, interest: &Interest, now_s: u64) -> (bool, u64) {
        match self.store.iter().find(|e| e.name == interest.name) {
            Some(entry) => (
                interest.timestamp != entry.last_update_time_s,
                entry.last_update_time_s,
            ),
            None => (true, now_s),
        }
    }

    fn generate_data(&self, name: &Name) -> Data {
        let mut data = Data::new(name.clone(), vec![0u8; self.config.payload_size])
            .with_freshness_period_ms(self.config.freshness_ms);
        data.signature_value = self.config.signature;
        data.key_locator = self.key_locator.clone();
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(average: u64) -> ProducerConfig {
        ProducerConfig {
            prefix: "/video".to_string(),
            payload_size: 64,
            freshness_ms: 1000,
            average_update_time_s: average,
            ..ProducerConfig::default()
        }
    }

    #[test]
    fn plain_interest_seeds_store_within_bounds() {
        let mut producer = Producer::with_seed(config(10), 42);
        let interest = Interest::new(Name::from_string("/video/a")).with_nonce(1);

        let data = producer.on_interest(&interest, 100);
        assert_eq!(data.name, Name::from_string("/video/a"));
        assert_eq!(data.content.len(), 64);
        assert_eq!(data.freshness_period_ms, Some(1000));
        assert!(!data.signal_flag);

        assert_eq!(producer.store_len(), 1);
        let ts = data.timestamp;
        assert!(ts <= 100);
        assert!(ts >= 100 - (2 * 10 - 2)); // now - (update_time - 1) at worst

        // a second request for the same name reuses the entry
        let again = producer.on_interest(&interest, 105);
        assert_eq!(again.timestamp, ts);
        assert_eq!(producer.store_len(), 1);
    }

    #[test]
    fn probe_with_matching_timestamp_is_not_expired() {
        let mut producer = Producer::with_seed(config(10), 7);
        let plain = Interest::new(Name::from_string("/video/a")).with_nonce(1);
        let ts = producer.on_interest(&plain, 50).timestamp;

        let mut probe = Interest::new(Name::from_string("/video/a")).with_nonce(2);
        probe.signal_flag = true;
        probe.timestamp = ts;
        probe.node_index = 3;
        probe.pit_list = vec![
            rust_fvdn_common::types::FaceId(256),
            rust_fvdn_common::types::FaceId(301),
        ];

        let reply = producer.on_interest(&probe, 51);
        assert!(reply.signal_flag);
        assert!(!reply.expiration_flag);
        assert_eq!(reply.timestamp, ts);
        assert_eq!(reply.node_index, 3);
        assert_eq!(reply.pit_list, probe.pit_list);
    }

    #[test]
    fn probe_with_stale_timestamp_is_expired() {
        let mut producer = Producer::with_seed(config(10), 7);
        let plain = Interest::new(Name::from_string("/video/a")).with_nonce(1);
        let ts = producer.on_interest(&plain, 50).timestamp;

        let mut probe = Interest::new(Name::from_string("/video/a")).with_nonce(2);
        probe.signal_flag = true;
        probe.timestamp = ts.wrapping_sub(1);

        let reply = producer.on_interest(&probe, 51);
        assert!(reply.expiration_flag);
        assert_eq!(reply.timestamp, ts);
    }

    #[test]
    fn probe_for_unknown_name_is_expired_with_now() {
        let mut producer = Producer::with_seed(config(10), 7);
        let mut probe = Interest::new(Name::from_string("/video/never-served")).with_nonce(2);
        probe.signal_flag = true;
        probe.timestamp = 12;

        let reply = producer.on_interest(&probe, 99);
        assert!(reply.expiration_flag);
        assert_eq!(reply.timestamp, 99);
    }

    #[test]
    fn tick_advances_due_entries() {
        let mut producer = Producer::with_seed(config(5), 1);
        let plain = Interest::new(Name::from_string("/video/a")).with_nonce(1);
        producer.on_interest(&plain, 20);
        let entry = producer.store.front().unwrap().clone();

        // before the period elapses nothing moves
        let not_due = entry.last_update_time_s + entry.update_time_s - 1;
        producer.tick(not_due);
        assert_eq!(
            producer.store.front().unwrap().last_update_time_s,
            entry.last_update_time_s
        );

        let due = entry.last_update_time_s + entry.update_time_s;
        producer.tick(due);
        assert_eq!(producer.store.front().unwrap().last_update_time_s, due);
    }

    #[test]
    fn store_is_bounded() {
        let mut cfg = config(10);
        cfg.max_store_size = 2;
        let mut producer = Producer::with_seed(cfg, 1);

        for i in 0..4 {
            let interest =
                Interest::new(Name::from_string(&format!("/video/{}", i))).with_nonce(i);
            producer.on_interest(&interest, 100);
        }
        assert_eq!(producer.store_len(), 2);
        // the oldest entries were evicted
        assert!(producer
            .store
            .iter()
            .all(|e| e.name != Name::from_string("/video/0")));
    }

    #[test]
    fn key_locator_and_signature_are_attached() {
        let mut cfg = config(10);
        cfg.signature = 9;
        cfg.key_locator = Some("/keys/site".to_string());
        let mut producer = Producer::with_seed(cfg, 1);

        let interest = Interest::new(Name::from_string("/video/a")).with_nonce(1);
        let data = producer.on_interest(&interest, 10);
        assert_eq!(data.signature_value, 9);
        assert_eq!(data.key_locator, Some(Name::from_string("/keys/site")));
    }
}
