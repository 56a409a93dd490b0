//! Per-agent traffic counters and windowed rate history.

use crate::config::SflowConfig;
use crate::packet::SflowPacket;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::net::IpAddr;
use std::time::{Duration, Instant};

/// Packet and bit rate estimated over one closed window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RateSample {
    pub pps: u64,
    pub bps: u64,
}

/// Running totals for one agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AgentCounters {
    pub datagrams: u64,
    pub samples: u64,
    /// Sum of original frame lengths of the sampled frames
    pub sampled_bytes: u64,
    /// Sampled frames scaled by their sampling rate
    pub estimated_packets: u64,
    pub estimated_bytes: u64,
    pub last_sequence: u32,
    pub last_uptime: u32,
    /// Datagrams whose sequence number did not follow the previous one
    pub sequence_gaps: u64,
}

/// Serializable view of an agent for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SflowAgentSnapshot {
    pub key: u64,
    pub agent: Option<IpAddr>,
    pub sub_agent_id: u32,
    pub downstream: bool,
    pub counters: AgentCounters,
    pub history: Vec<RateSample>,
}

#[derive(Debug)]
struct AgentState {
    counters: AgentCounters,
    window_start: Instant,
    window_packets: u64,
    window_bytes: u64,
    history: VecDeque<RateSample>,
    last_seen: Instant,
}

/// Aggregates the datagrams of one (agent address, sub-agent id) pair.
///
/// Rate windows are closed lazily when a datagram arrives after the current
/// window has elapsed; windows in which nothing arrived are recorded as zero
/// rates. The history holds at most `history_capacity` samples, oldest
/// first.
#[derive(Debug)]
pub struct SflowAgentItem {
    key: u64,
    agent: Option<IpAddr>,
    sub_agent_id: u32,
    downstream: bool,
    window: Duration,
    capacity: usize,
    state: Mutex<AgentState>,
}

impl SflowAgentItem {
    pub fn new(packet: &SflowPacket, config: &SflowConfig, now: Instant) -> Self {
        let capacity = config.history_capacity.max(1);
        SflowAgentItem {
            key: crate::agent_key(packet.agent_addr(), packet.sub_agent_id()),
            agent: packet.agent_ip(),
            sub_agent_id: packet.sub_agent_id(),
            downstream: packet.is_dir_downstream(),
            window: config.window().max(Duration::from_secs(1)),
            capacity,
            state: Mutex::new(AgentState {
                counters: AgentCounters::default(),
                window_start: now,
                window_packets: 0,
                window_bytes: 0,
                history: VecDeque::with_capacity(capacity.min(64)),
                last_seen: now,
            }),
        }
    }

    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn agent(&self) -> Option<IpAddr> {
        self.agent
    }

    pub fn sub_agent_id(&self) -> u32 {
        self.sub_agent_id
    }

    pub fn is_downstream(&self) -> bool {
        self.downstream
    }

    pub fn add_packet(&self, packet: &SflowPacket) -> bool {
        self.add_packet_at(packet, Instant::now())
    }

    /// Folds one datagram into the counters as if it arrived at `now`.
    ///
    /// Illegal datagrams are ignored and return false.
    pub fn add_packet_at(&self, packet: &SflowPacket, now: Instant) -> bool {
        if !packet.is_legal() {
            return false;
        }
        let mut state = self.state.lock();
        self.close_windows(&mut state, now);

        let counters = &mut state.counters;
        if counters.datagrams > 0 && packet.sequence() != counters.last_sequence.wrapping_add(1) {
            counters.sequence_gaps += 1;
        }
        counters.datagrams += 1;
        counters.last_sequence = packet.sequence();
        counters.last_uptime = packet.uptime();

        let mut packets = 0u64;
        let mut bytes = 0u64;
        for sample in packet.samples() {
            let rate = u64::from(sample.sampling_rate().max(1));
            let frame_length = u64::from(sample.frame_length());
            counters.samples += 1;
            counters.sampled_bytes += frame_length;
            packets += rate;
            bytes += frame_length * rate;
        }
        counters.estimated_packets += packets;
        counters.estimated_bytes += bytes;

        state.window_packets += packets;
        state.window_bytes += bytes;
        state.last_seen = now;
        true
    }

    fn close_windows(&self, state: &mut AgentState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.window_start);
        let closed = elapsed.as_nanos() / self.window.as_nanos();
        if closed == 0 {
            return;
        }

        let secs = self.window.as_secs().max(1);
        let first = RateSample {
            pps: state.window_packets / secs,
            bps: state.window_bytes.saturating_mul(8) / secs,
        };
        self.push_history(state, first);
        let idle = (closed - 1).min(self.capacity as u128);
        for _ in 0..idle {
            self.push_history(state, RateSample::default());
        }

        let advance = u32::try_from(closed).unwrap_or(u32::MAX);
        state.window_start = self
            .window
            .checked_mul(advance)
            .and_then(|span| state.window_start.checked_add(span))
            .unwrap_or(now);
        state.window_packets = 0;
        state.window_bytes = 0;
    }

    fn push_history(&self, state: &mut AgentState, sample: RateSample) {
        if state.history.len() == self.capacity {
            state.history.pop_front();
        }
        state.history.push_back(sample);
    }

    pub fn counters(&self) -> AgentCounters {
        self.state.lock().counters.clone()
    }

    /// Closed-window rates, oldest first.
    pub fn history(&self) -> Vec<RateSample> {
        self.state.lock().history.iter().copied().collect()
    }

    /// Most recent closed-window rate.
    pub fn latest_rate(&self) -> Option<RateSample> {
        self.state.lock().history.back().copied()
    }

    /// Time since the last datagram, relative to `now`.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.state.lock().last_seen)
    }

    pub fn snapshot(&self) -> SflowAgentSnapshot {
        let state = self.state.lock();
        SflowAgentSnapshot {
            key: self.key,
            agent: self.agent,
            sub_agent_id: self.sub_agent_id,
            downstream: self.downstream,
            counters: state.counters.clone(),
            history: state.history.iter().copied().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DownstreamParity;
    use pretty_assertions::assert_eq;

    fn push(out: &mut Vec<u8>, value: u32) {
        out.extend_from_slice(&value.to_be_bytes());
    }

    /// Legal datagram with one flow sample (rate 100, frame length 1000).
    fn packet(sequence: u32) -> SflowPacket {
        let header = [0u8; 16];
        let mut body = Vec::new();
        for value in [1, 3, 100, 1000, 0, 3, 4, 1, 1, 32, 1, 1000, 0, 16] {
            push(&mut body, value);
        }
        body.extend_from_slice(&header);

        let mut out = Vec::new();
        for value in [5, 1, 0x0a00_0001, 1, sequence, 1000, 1, 1] {
            push(&mut out, value);
        }
        push(&mut out, body.len() as u32);
        out.extend(body);
        SflowPacket::parse(&out, 0, out.len(), DownstreamParity::Odd)
    }

    fn item(capacity: usize) -> (SflowAgentItem, Instant) {
        let config = SflowConfig {
            history_capacity: capacity,
            ..Default::default()
        };
        let now = Instant::now();
        (SflowAgentItem::new(&packet(1), &config, now), now)
    }

    #[test]
    fn test_counters_scale_by_sampling_rate() {
        let (agent, start) = item(10);
        assert!(agent.add_packet_at(&packet(1), start));
        assert!(agent.add_packet_at(&packet(2), start));
        let counters = agent.counters();
        assert_eq!(counters.datagrams, 2);
        assert_eq!(counters.samples, 2);
        assert_eq!(counters.sampled_bytes, 2000);
        assert_eq!(counters.estimated_packets, 200);
        assert_eq!(counters.estimated_bytes, 200_000);
        assert_eq!(counters.last_sequence, 2);
        assert_eq!(counters.sequence_gaps, 0);
        assert_eq!(agent.key(), 0x0a00_0001_0000_0001);
        assert!(agent.is_downstream());
    }

    #[test]
    fn test_sequence_gap_is_counted() {
        let (agent, start) = item(10);
        agent.add_packet_at(&packet(1), start);
        agent.add_packet_at(&packet(5), start);
        assert_eq!(agent.counters().sequence_gaps, 1);
    }

    #[test]
    fn test_window_closes_lazily_on_arrival() {
        let (agent, start) = item(10);
        agent.add_packet_at(&packet(1), start);
        assert!(agent.history().is_empty());

        agent.add_packet_at(&packet(2), start + Duration::from_secs(4));
        assert!(agent.history().is_empty());

        agent.add_packet_at(&packet(3), start + Duration::from_secs(5));
        // 2 samples * 100 over 5s; 200_000 bytes * 8 over 5s
        assert_eq!(
            agent.history(),
            vec![RateSample {
                pps: 40,
                bps: 320_000
            }]
        );
    }

    #[test]
    fn test_idle_windows_record_zero_rates() {
        let (agent, start) = item(10);
        agent.add_packet_at(&packet(1), start);
        agent.add_packet_at(&packet(2), start + Duration::from_secs(16));
        let history = agent.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].pps, 20);
        assert_eq!(history[1], RateSample::default());
        assert_eq!(history[2], RateSample::default());
        assert_eq!(agent.latest_rate(), Some(RateSample::default()));
    }

    #[test]
    fn test_history_is_bounded() {
        let (agent, start) = item(3);
        for i in 0..10u32 {
            agent.add_packet_at(&packet(i + 1), start + Duration::from_secs(5 * u64::from(i)));
        }
        assert_eq!(agent.history().len(), 3);

        agent.add_packet_at(&packet(11), start + Duration::from_secs(10_000));
        assert_eq!(agent.history().len(), 3);
        assert_eq!(agent.latest_rate(), Some(RateSample::default()));
    }

    #[test]
    fn test_illegal_packet_is_ignored() {
        let (agent, start) = item(3);
        let illegal = SflowPacket::parse(&[0, 0, 0, 4], 0, 4, DownstreamParity::Odd);
        assert!(!agent.add_packet_at(&illegal, start));
        assert_eq!(agent.counters().datagrams, 0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let (agent, start) = item(3);
        agent.add_packet_at(&packet(1), start);
        let json = serde_json::to_value(agent.snapshot()).unwrap();
        assert_eq!(json["agent"], "10.0.0.1");
        assert_eq!(json["sub_agent_id"], 1);
        assert_eq!(json["counters"]["estimated_packets"], 100);
        assert_eq!(json["history"], serde_json::json!([]));
    }
}
