use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use replica_abstract::{
    Direction, FlowStats, LinkConfig, LinkContext, Role, TrafficMode, TrafficSource,
};
use std::collections::HashMap;
use std::net::Ipv4Addr;

pub const UE_ADDRESS: Ipv4Addr = Ipv4Addr::new(7, 0, 0, 2);
pub const REMOTE_HOST_ADDRESS: Ipv4Addr = Ipv4Addr::new(1, 0, 0, 2);

const TICK_TIMER: u32 = 0;
const TICK_MS: u64 = 1;

struct DirectionalFlow {
    direction: Direction,
    stats: FlowStats,
    /// Bytes owed to the link but not yet sent as whole packets.
    credit: f64,
    last_delay_ms: Option<u64>,
}

struct InFlight {
    flow: usize,
    packets: u64,
    delay_ms: u64,
}

/// Saturating constant-bit-rate traffic over a lossy, jittery link. Every
/// millisecond each active direction sends the whole packets its rate allows;
/// surviving packets of a burst arrive together after one latency draw.
pub struct ConstantRateSource {
    packet_size: u32,
    bytes_per_tick: f64,
    start_ms: u64,
    link: LinkConfig,
    rng: StdRng,
    flows: Vec<DirectionalFlow>,
    in_flight: HashMap<u32, InFlight>,
    next_timer_id: u32,
}

impl ConstantRateSource {
    pub fn new(
        mode: TrafficMode,
        data_rate_bps: u64,
        packet_size: u32,
        start_ms: u64,
        link: LinkConfig,
    ) -> Self {
        let mut flows = Vec::new();
        if mode.has_uplink() {
            flows.push(DirectionalFlow::new(
                Direction::Uplink,
                UE_ADDRESS,
                REMOTE_HOST_ADDRESS,
            ));
        }
        if mode.has_downlink() {
            flows.push(DirectionalFlow::new(
                Direction::Downlink,
                REMOTE_HOST_ADDRESS,
                UE_ADDRESS,
            ));
        }

        Self {
            packet_size: packet_size.max(1),
            bytes_per_tick: data_rate_bps as f64 / 8.0 * TICK_MS as f64 / 1000.0,
            start_ms,
            rng: StdRng::seed_from_u64(link.seed),
            link,
            flows,
            in_flight: HashMap::new(),
            next_timer_id: TICK_TIMER,
        }
    }

    fn send_tick(&mut self, ctx: &mut dyn LinkContext) {
        let now = ctx.now();
        let size = u64::from(self.packet_size);

        for index in 0..self.flows.len() {
            let flow = &mut self.flows[index];
            flow.credit += self.bytes_per_tick;
            let packets = (flow.credit / size as f64).floor() as u64;
            if packets == 0 {
                continue;
            }
            flow.credit -= (packets * size) as f64;

            let direction = flow.direction;
            ctx.record_bytes(direction, Role::Tx, packets * size);
            flow.stats.tx_packets += packets;
            flow.stats.tx_bytes += packets * size;
            flow.stats.first_tx_ms.get_or_insert(now);
            flow.stats.last_tx_ms = Some(now);

            let survivors = (0..packets)
                .filter(|_| self.rng.random::<f64>() >= self.link.loss_rate)
                .count() as u64;
            if survivors == 0 {
                continue;
            }

            let latency = self
                .rng
                .random_range(self.link.min_latency..=self.link.max_latency);
            let timer_id = self.allocate_timer_id();
            self.in_flight.insert(
                timer_id,
                InFlight {
                    flow: index,
                    packets: survivors,
                    delay_ms: latency,
                },
            );
            ctx.start_timer(latency, timer_id);
        }
    }

    fn deliver(&mut self, ctx: &mut dyn LinkContext, in_flight: InFlight) {
        let now = ctx.now();
        let bytes = in_flight.packets * u64::from(self.packet_size);
        let flow = &mut self.flows[in_flight.flow];

        ctx.record_bytes(flow.direction, Role::Rx, bytes);
        flow.stats.rx_packets += in_flight.packets;
        flow.stats.rx_bytes += bytes;
        flow.stats.first_rx_ms.get_or_insert(now);
        flow.stats.last_rx_ms = Some(now);

        let delay_s = in_flight.delay_ms as f64 / 1000.0;
        flow.stats.delay_sum_s += delay_s * in_flight.packets as f64;
        if let Some(previous) = flow.last_delay_ms {
            flow.stats.jitter_sum_s += previous.abs_diff(in_flight.delay_ms) as f64 / 1000.0;
        }
        flow.last_delay_ms = Some(in_flight.delay_ms);
    }

    fn allocate_timer_id(&mut self) -> u32 {
        loop {
            self.next_timer_id = self.next_timer_id.wrapping_add(1);
            if self.next_timer_id != TICK_TIMER && !self.in_flight.contains_key(&self.next_timer_id)
            {
                return self.next_timer_id;
            }
        }
    }
}

impl DirectionalFlow {
    fn new(direction: Direction, source: Ipv4Addr, destination: Ipv4Addr) -> Self {
        Self {
            direction,
            stats: FlowStats::new(source, destination),
            credit: 0.0,
            last_delay_ms: None,
        }
    }
}

impl TrafficSource for ConstantRateSource {
    fn init(&mut self, ctx: &mut dyn LinkContext) {
        ctx.log(&format!(
            "constant-rate traffic on {} flow(s), {} B packets from {} ms",
            self.flows.len(),
            self.packet_size,
            self.start_ms
        ));
        ctx.start_timer(self.start_ms.saturating_sub(ctx.now()), TICK_TIMER);
    }

    fn on_timer(&mut self, ctx: &mut dyn LinkContext, timer_id: u32) {
        if timer_id == TICK_TIMER {
            self.send_tick(ctx);
            ctx.start_timer(TICK_MS, TICK_TIMER);
        } else if let Some(in_flight) = self.in_flight.remove(&timer_id) {
            self.deliver(ctx, in_flight);
        }
    }

    fn flow_stats(&self) -> Vec<FlowStats> {
        self.flows.iter().map(|f| f.stats.clone()).collect()
    }
}
