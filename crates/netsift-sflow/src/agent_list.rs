//! Registry of sFlow agents keyed by (agent address, sub-agent id).

use crate::agent::{SflowAgentItem, SflowAgentSnapshot};
use crate::config::SflowConfig;
use crate::error::ConfigError;
use crate::packet::SflowPacket;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Map key for an agent: address in the high 32 bits, sub-agent id in the low.
pub fn agent_key(agent_addr: u32, sub_agent_id: u32) -> u64 {
    (u64::from(agent_addr) << 32) | u64::from(sub_agent_id)
}

/// Thread-safe set of [`SflowAgentItem`]s.
///
/// Agents are created on their first legal datagram. The list lock is
/// always taken before an item lock.
#[derive(Debug)]
pub struct SflowAgentList {
    config: SflowConfig,
    agents: RwLock<HashMap<u64, Arc<SflowAgentItem>>>,
}

impl Default for SflowAgentList {
    fn default() -> Self {
        Self {
            config: SflowConfig::default(),
            agents: RwLock::new(HashMap::new()),
        }
    }
}

impl SflowAgentList {
    pub fn new(config: SflowConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            agents: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &SflowConfig {
        &self.config
    }

    /// Decodes a datagram with this list's settings and records it when legal.
    pub fn ingest(&self, datagram: &[u8], payload_offset: usize, payload_len: usize) -> SflowPacket {
        let packet =
            SflowPacket::parse_with_config(datagram, payload_offset, payload_len, &self.config);
        self.add_packet(&packet);
        packet
    }

    pub fn add_packet(&self, packet: &SflowPacket) -> bool {
        self.add_packet_at(packet, Instant::now())
    }

    /// Routes a legal datagram to its agent, creating the agent if needed.
    pub fn add_packet_at(&self, packet: &SflowPacket, now: Instant) -> bool {
        if !packet.is_legal() {
            return false;
        }
        let key = agent_key(packet.agent_addr(), packet.sub_agent_id());

        {
            let agents = self.agents.read();
            if let Some(item) = agents.get(&key) {
                return item.add_packet_at(packet, now);
            }
        }

        let mut agents = self.agents.write();
        let item = agents.entry(key).or_insert_with(|| {
            info!(
                agent = ?packet.agent_ip(),
                sub_agent_id = packet.sub_agent_id(),
                downstream = packet.is_dir_downstream(),
                "new sflow agent"
            );
            Arc::new(SflowAgentItem::new(packet, &self.config, now))
        });
        item.add_packet_at(packet, now)
    }

    pub fn get(&self, key: u64) -> Option<Arc<SflowAgentItem>> {
        self.agents.read().get(&key).cloned()
    }

    pub fn get_agent(&self, agent_addr: u32, sub_agent_id: u32) -> Option<Arc<SflowAgentItem>> {
        self.get(agent_key(agent_addr, sub_agent_id))
    }

    /// Agent keys in ascending order.
    pub fn keys(&self) -> Vec<u64> {
        let mut keys: Vec<u64> = self.agents.read().keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.agents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.read().is_empty()
    }

    /// Snapshots of every agent, ordered by key.
    pub fn snapshot(&self) -> Vec<SflowAgentSnapshot> {
        let agents = self.agents.read();
        let mut snapshots: Vec<SflowAgentSnapshot> =
            agents.values().map(|item| item.snapshot()).collect();
        snapshots.sort_unstable_by_key(|snapshot| snapshot.key);
        snapshots
    }

    /// Drops agents idle for longer than `agent_idle_timeout_secs`.
    ///
    /// Does nothing when no timeout is configured. Returns the number of
    /// agents removed.
    pub fn evict_idle(&self, now: Instant) -> usize {
        let Some(timeout) = self.config.idle_timeout() else {
            return 0;
        };
        let mut agents = self.agents.write();
        let before = agents.len();
        agents.retain(|_, item| {
            let idle = item.idle_for(now);
            if idle > timeout {
                info!(
                    agent = ?item.agent(),
                    sub_agent_id = item.sub_agent_id(),
                    idle_secs = idle.as_secs(),
                    "evicting idle sflow agent"
                );
                return false;
            }
            true
        });
        before - agents.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DownstreamParity;
    use pretty_assertions::assert_eq;
    use std::thread;
    use std::time::Duration;

    fn push(out: &mut Vec<u8>, value: u32) {
        out.extend_from_slice(&value.to_be_bytes());
    }

    fn datagram(agent: u32, sub_agent_id: u32, sequence: u32) -> Vec<u8> {
        let mut out = Vec::new();
        for value in [5, 1, agent, sub_agent_id, sequence, 0, 0] {
            push(&mut out, value);
        }
        out
    }

    fn packet(agent: u32, sub_agent_id: u32, sequence: u32) -> SflowPacket {
        let bytes = datagram(agent, sub_agent_id, sequence);
        SflowPacket::parse(&bytes, 0, bytes.len(), DownstreamParity::Odd)
    }

    #[test]
    fn test_agent_key_layout() {
        assert_eq!(agent_key(0x0a00_0001, 3), 0x0a00_0001_0000_0003);
        assert_eq!(agent_key(u32::MAX, u32::MAX), u64::MAX);
    }

    #[test]
    fn test_agents_created_per_address_and_sub_agent() {
        let list = SflowAgentList::default();
        assert!(list.add_packet(&packet(1, 0, 1)));
        assert!(list.add_packet(&packet(1, 0, 2)));
        assert!(list.add_packet(&packet(1, 1, 1)));
        assert!(list.add_packet(&packet(2, 0, 1)));
        assert_eq!(list.len(), 3);
        assert_eq!(
            list.keys(),
            vec![agent_key(1, 0), agent_key(1, 1), agent_key(2, 0)]
        );
        let item = list.get_agent(1, 0).unwrap();
        assert_eq!(item.counters().datagrams, 2);
        assert!(list.get_agent(3, 0).is_none());
    }

    #[test]
    fn test_illegal_packets_do_not_create_agents() {
        let list = SflowAgentList::default();
        let illegal = SflowPacket::parse(&[0, 0, 0, 5], 0, 4, DownstreamParity::Odd);
        assert!(!list.add_packet(&illegal));
        assert!(list.is_empty());
    }

    #[test]
    fn test_ingest_uses_config() {
        let list = SflowAgentList::new(SflowConfig {
            downstream_parity: DownstreamParity::Even,
            ..Default::default()
        })
        .unwrap();
        let bytes = datagram(7, 2, 1);
        let packet = list.ingest(&bytes, 0, bytes.len());
        assert!(packet.is_dir_downstream());
        assert!(list.get_agent(7, 2).unwrap().is_downstream());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = SflowConfig {
            window_secs: 0,
            ..Default::default()
        };
        assert_eq!(
            SflowAgentList::new(config).unwrap_err(),
            ConfigError::ZeroWindow
        );
    }

    #[test]
    fn test_eviction_is_opt_in() {
        let start = Instant::now();
        let list = SflowAgentList::default();
        list.add_packet_at(&packet(1, 0, 1), start);
        assert_eq!(list.evict_idle(start + Duration::from_secs(86_400)), 0);
        assert_eq!(list.len(), 1);

        let list = SflowAgentList::new(SflowConfig {
            agent_idle_timeout_secs: Some(60),
            ..Default::default()
        })
        .unwrap();
        list.add_packet_at(&packet(1, 0, 1), start);
        list.add_packet_at(&packet(2, 0, 1), start + Duration::from_secs(50));
        assert_eq!(list.evict_idle(start + Duration::from_secs(60)), 0);
        assert_eq!(list.evict_idle(start + Duration::from_secs(61)), 1);
        assert_eq!(list.keys(), vec![agent_key(2, 0)]);
    }

    #[test]
    fn test_snapshot_is_ordered() {
        let list = SflowAgentList::default();
        list.add_packet(&packet(9, 0, 1));
        list.add_packet(&packet(3, 1, 1));
        let keys: Vec<u64> = list.snapshot().iter().map(|s| s.key).collect();
        assert_eq!(keys, vec![agent_key(3, 1), agent_key(9, 0)]);
    }

    #[test]
    fn test_concurrent_add_packet() {
        let list = Arc::new(SflowAgentList::default());
        let handles: Vec<_> = (0..4u32)
            .map(|worker| {
                let list = Arc::clone(&list);
                thread::spawn(move || {
                    for seq in 0..100 {
                        list.add_packet(&packet(worker % 2, 0, seq));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(list.len(), 2);
        let total: u64 = list
            .snapshot()
            .iter()
            .map(|s| s.counters.datagrams)
            .sum();
        assert_eq!(total, 400);
    }
}
