use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Raw per-flow counters as collected by the traffic stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowStats {
    pub source_address: Ipv4Addr,
    pub destination_address: Ipv4Addr,
    pub tx_packets: u64,
    pub tx_bytes: u64,
    pub rx_packets: u64,
    pub rx_bytes: u64,
    pub first_tx_ms: Option<u64>,
    pub last_tx_ms: Option<u64>,
    pub first_rx_ms: Option<u64>,
    pub last_rx_ms: Option<u64>,
    /// Sum of one-way delays of received packets, in seconds.
    pub delay_sum_s: f64,
    /// Sum of absolute delay differences between consecutive received packets, in seconds.
    pub jitter_sum_s: f64,
}

impl FlowStats {
    pub fn new(source_address: Ipv4Addr, destination_address: Ipv4Addr) -> Self {
        Self {
            source_address,
            destination_address,
            tx_packets: 0,
            tx_bytes: 0,
            rx_packets: 0,
            rx_bytes: 0,
            first_tx_ms: None,
            last_tx_ms: None,
            first_rx_ms: None,
            last_rx_ms: None,
            delay_sum_s: 0.0,
            jitter_sum_s: 0.0,
        }
    }

    pub fn tx_span_s(&self) -> f64 {
        span_s(self.first_tx_ms, self.last_tx_ms)
    }

    pub fn rx_span_s(&self) -> f64 {
        span_s(self.first_rx_ms, self.last_rx_ms)
    }
}

fn span_s(first: Option<u64>, last: Option<u64>) -> f64 {
    match (first, last) {
        (Some(first), Some(last)) if last > first => (last - first) as f64 / 1000.0,
        _ => 0.0,
    }
}

/// One entry of the flow report, derived once at teardown.
/// Field order is the order of the serialized JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    #[serde(rename = "Flow ID")]
    pub flow_id: u32,
    #[serde(rename = "Source Address")]
    pub source_address: Ipv4Addr,
    #[serde(rename = "Destination Address")]
    pub destination_address: Ipv4Addr,
    #[serde(rename = "Tx Packets")]
    pub tx_packets: u64,
    #[serde(rename = "Tx Bytes")]
    pub tx_bytes: u64,
    #[serde(rename = "Tx Offered (Mbps)")]
    pub tx_offered_mbps: f64,
    #[serde(rename = "Rx Packets")]
    pub rx_packets: u64,
    #[serde(rename = "Rx Bytes")]
    pub rx_bytes: u64,
    #[serde(rename = "Mean Delay (ms)")]
    pub mean_delay_ms: f64,
    #[serde(rename = "Mean Jitter (ms)")]
    pub mean_jitter_ms: f64,
    #[serde(rename = "Throughput (Mbps)")]
    pub throughput_mbps: f64,
    #[serde(rename = "Packet Loss Ratio (%)")]
    pub packet_loss_ratio_pct: f64,
}

impl FlowRecord {
    /// Derive the reported figures. Every ratio with a zero denominator reports 0.
    pub fn from_stats(flow_id: u32, stats: &FlowStats) -> Self {
        let tx_span = stats.tx_span_s();
        let rx_span = stats.rx_span_s();

        let tx_offered_mbps = if tx_span > 0.0 {
            stats.tx_bytes as f64 * 8.0 / tx_span / 1e6
        } else {
            0.0
        };
        let throughput_mbps = if rx_span > 0.0 {
            stats.rx_bytes as f64 * 8.0 / rx_span / 1e6
        } else {
            0.0
        };
        let (mean_delay_ms, mean_jitter_ms) = if stats.rx_packets > 0 {
            (
                1000.0 * stats.delay_sum_s / stats.rx_packets as f64,
                1000.0 * stats.jitter_sum_s / stats.rx_packets as f64,
            )
        } else {
            (0.0, 0.0)
        };
        let packet_loss_ratio_pct = if stats.tx_packets > 0 {
            stats.tx_packets.saturating_sub(stats.rx_packets) as f64 / stats.tx_packets as f64
                * 100.0
        } else {
            0.0
        };

        Self {
            flow_id,
            source_address: stats.source_address,
            destination_address: stats.destination_address,
            tx_packets: stats.tx_packets,
            tx_bytes: stats.tx_bytes,
            tx_offered_mbps,
            rx_packets: stats.rx_packets,
            rx_bytes: stats.rx_bytes,
            mean_delay_ms,
            mean_jitter_ms,
            throughput_mbps,
            packet_loss_ratio_pct,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> FlowStats {
        let mut stats = FlowStats::new(Ipv4Addr::new(1, 0, 0, 2), Ipv4Addr::new(7, 0, 0, 2));
        stats.tx_packets = 100;
        stats.tx_bytes = 125_000;
        stats.rx_packets = 80;
        stats.rx_bytes = 100_000;
        stats.first_tx_ms = Some(1000);
        stats.last_tx_ms = Some(2000);
        stats.first_rx_ms = Some(1010);
        stats.last_rx_ms = Some(1510);
        stats.delay_sum_s = 0.8;
        stats.jitter_sum_s = 0.08;
        stats
    }

    #[test]
    fn derives_rates_and_ratios() {
        let record = FlowRecord::from_stats(1, &stats());
        assert_eq!(record.tx_offered_mbps, 1.0);
        assert_eq!(record.throughput_mbps, 1.6);
        assert!((record.mean_delay_ms - 10.0).abs() < 1e-9);
        assert!((record.mean_jitter_ms - 1.0).abs() < 1e-9);
        assert_eq!(record.packet_loss_ratio_pct, 20.0);
    }

    #[test]
    fn empty_flow_reports_zeroes() {
        let empty = FlowStats::new(Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST);
        let record = FlowRecord::from_stats(7, &empty);
        assert_eq!(record.flow_id, 7);
        assert_eq!(record.tx_offered_mbps, 0.0);
        assert_eq!(record.throughput_mbps, 0.0);
        assert_eq!(record.mean_delay_ms, 0.0);
        assert_eq!(record.packet_loss_ratio_pct, 0.0);
    }

    #[test]
    fn serializes_with_report_field_names_in_order() {
        let record = FlowRecord::from_stats(1, &stats());
        let json = serde_json::to_string(&record).unwrap();
        let keys = [
            "\"Flow ID\"",
            "\"Source Address\"",
            "\"Destination Address\"",
            "\"Tx Packets\"",
            "\"Tx Bytes\"",
            "\"Tx Offered (Mbps)\"",
            "\"Rx Packets\"",
            "\"Rx Bytes\"",
            "\"Mean Delay (ms)\"",
            "\"Mean Jitter (ms)\"",
            "\"Throughput (Mbps)\"",
            "\"Packet Loss Ratio (%)\"",
        ];
        let positions: Vec<usize> = keys.iter().map(|k| json.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(json.contains("\"Source Address\":\"1.0.0.2\""));
    }
}
