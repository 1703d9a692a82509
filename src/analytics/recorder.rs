//! Click recorder.
//!
//! The hot-path cost of `record` is one lock-free counter bump; the
//! ClickEvent (with best-effort geo enrichment) is assembled in a
//! spawned task and queued for the periodic flush. Recording failures
//! are swallowed - telemetry never breaks a redirect - but every drop
//! and failed flush is metered.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use crossbeam_channel::{Receiver, Sender, bounded};
use dashmap::DashMap;
use tokio::time::{Duration, sleep};
use tracing::debug;

use super::sink::ClickSink;
use crate::metrics_core::MetricsRecorder;
use crate::routing::RequestContext;
use crate::services::geoip::GeoIpProvider;
use crate::storage::{ClickEvent, ClickGeo};
use crate::utils::ip::is_private_or_local;

/// Upper bound on queued events between flushes; beyond it events are
/// dropped (and counted), counters are never lost.
const EVENT_QUEUE_CAPACITY: usize = 8192;

pub struct ClickRecorder {
    buffer: DashMap<i64, u64>,
    event_tx: Sender<ClickEvent>,
    event_rx: Receiver<ClickEvent>,
    sink: Arc<dyn ClickSink>,
    geoip: GeoIpProvider,
    metrics: Arc<dyn MetricsRecorder>,
    detailed_events: bool,
    flush_interval: Duration,
    flush_in_progress: AtomicBool,
}

impl ClickRecorder {
    pub fn new(
        sink: Arc<dyn ClickSink>,
        geoip: GeoIpProvider,
        metrics: Arc<dyn MetricsRecorder>,
        detailed_events: bool,
        flush_interval: Duration,
    ) -> Self {
        let (event_tx, event_rx) = bounded(EVENT_QUEUE_CAPACITY);
        Self {
            buffer: DashMap::new(),
            event_tx,
            event_rx,
            sink,
            geoip,
            metrics,
            detailed_events,
            flush_interval,
            flush_in_progress: AtomicBool::new(false),
        }
    }

    /// Record one resolved redirect. Returns immediately; geo lookup and
    /// persistence happen off the request path.
    pub fn record(self: &Arc<Self>, link_id: i64, ctx: &RequestContext, destination: &str) {
        *self.buffer.entry(link_id).or_insert(0) += 1;

        if !self.detailed_events {
            return;
        }

        let recorder = Arc::clone(self);
        let ip = ctx.ip;
        let user_agent = ctx.user_agent.clone();
        let referer = ctx.referer.clone();
        let destination = destination.to_string();

        tokio::spawn(async move {
            let mut geo = ClickGeo::default();
            if let Some(ip) = ip {
                // Private/local addresses carry no useful geo signal
                if !is_private_or_local(&ip) {
                    if let Some(info) = recorder.geoip.lookup(ip).await {
                        geo.country = info.country;
                        geo.region = info.region;
                        geo.city = info.city;
                        geo.latitude = info.latitude;
                        geo.longitude = info.longitude;
                    }
                }
            }

            let event = ClickEvent {
                link_id,
                ip: ip.map(|i| i.to_string()),
                user_agent,
                referer,
                geo,
                destination,
                timestamp: Utc::now(),
            };

            if recorder.event_tx.try_send(event).is_err() {
                recorder.metrics.inc_clicks_dropped("queue_full");
            }
        });
    }

    /// Periodic flush loop; spawn once at startup.
    pub async fn run(self: Arc<Self>) {
        loop {
            sleep(self.flush_interval).await;
            self.flush_inner("interval").await;
        }
    }

    /// Manual flush (shutdown and tests).
    pub async fn flush(&self) {
        self.flush_inner("manual").await;
    }

    async fn flush_inner(&self, trigger: &str) {
        if self.flush_in_progress.swap(true, Ordering::SeqCst) {
            debug!("ClickRecorder: flush already in progress, skipping");
            return;
        }

        // Remove entries one by one so an increment racing the flush
        // either lands in this batch or survives into the next; a
        // snapshot-then-clear would wipe it unflushed
        let keys: Vec<i64> = self.buffer.iter().map(|entry| *entry.key()).collect();
        let mut updates: Vec<(i64, u64)> = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some((link_id, count)) = self.buffer.remove(&key) {
                updates.push((link_id, count));
            }
        }
        self.metrics
            .set_clicks_buffer_entries(self.buffer.len() as f64);

        let events: Vec<ClickEvent> = self.event_rx.try_iter().collect();

        let mut status = "ok";
        if !updates.is_empty() {
            if let Err(e) = self.sink.flush_clicks(updates).await {
                debug!("ClickRecorder: counter flush failed: {}", e);
                status = "error";
            }
        }
        if !events.is_empty() {
            if let Err(e) = self.sink.append_events(events).await {
                debug!("ClickRecorder: event append failed: {}", e);
                self.metrics.inc_clicks_dropped("sink_error");
                status = "error";
            }
        }

        self.metrics.inc_clicks_flush(trigger, status);
        self.flush_in_progress.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics_core::NoopMetrics;
    use crate::services::geoip::{GeoInfo, GeoIpLookup};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct CapturingSink {
        clicks: Mutex<Vec<(i64, u64)>>,
        events: Mutex<Vec<ClickEvent>>,
    }

    #[async_trait::async_trait]
    impl ClickSink for CapturingSink {
        async fn flush_clicks(&self, updates: Vec<(i64, u64)>) -> anyhow::Result<()> {
            self.clicks.lock().extend(updates);
            Ok(())
        }

        async fn append_events(&self, events: Vec<ClickEvent>) -> anyhow::Result<()> {
            self.events.lock().extend(events);
            Ok(())
        }
    }

    struct FixedGeo;

    #[async_trait::async_trait]
    impl GeoIpLookup for FixedGeo {
        async fn lookup(&self, _ip: std::net::IpAddr) -> Option<GeoInfo> {
            Some(GeoInfo {
                country: Some("FR".into()),
                ..GeoInfo::default()
            })
        }

        fn name(&self) -> &'static str {
            "Fixed"
        }
    }

    fn recorder(sink: Arc<CapturingSink>, detailed: bool) -> Arc<ClickRecorder> {
        Arc::new(ClickRecorder::new(
            sink,
            GeoIpProvider::from_lookup(Arc::new(FixedGeo)),
            NoopMetrics::arc(),
            detailed,
            Duration::from_secs(3600),
        ))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_records_lose_no_counts() {
        let sink = Arc::new(CapturingSink::default());
        let recorder = recorder(sink.clone(), false);

        let mut handles = Vec::new();
        for _ in 0..100 {
            let recorder = Arc::clone(&recorder);
            handles.push(tokio::spawn(async move {
                let ctx = RequestContext::new(Utc::now());
                recorder.record(7, &ctx, "https://example.com/");
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        recorder.flush().await;
        let total: u64 = sink
            .clicks
            .lock()
            .iter()
            .filter(|(id, _)| *id == 7)
            .map(|(_, n)| n)
            .sum();
        assert_eq!(total, 100);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn flush_racing_records_loses_no_counts() {
        let sink = Arc::new(CapturingSink::default());
        let recorder = recorder(sink.clone(), false);

        // Writer and flusher race; every increment must end up in some
        // flush batch
        let writer = {
            let recorder = Arc::clone(&recorder);
            tokio::spawn(async move {
                for _ in 0..1000 {
                    let ctx = RequestContext::new(Utc::now());
                    recorder.record(7, &ctx, "https://example.com/");
                    tokio::task::yield_now().await;
                }
            })
        };
        let flusher = {
            let recorder = Arc::clone(&recorder);
            tokio::spawn(async move {
                for _ in 0..50 {
                    recorder.flush().await;
                    tokio::task::yield_now().await;
                }
            })
        };

        writer.await.unwrap();
        flusher.await.unwrap();
        recorder.flush().await;

        let total: u64 = sink
            .clicks
            .lock()
            .iter()
            .filter(|(id, _)| *id == 7)
            .map(|(_, n)| n)
            .sum();
        assert_eq!(total, 1000);
    }

    #[tokio::test]
    async fn detailed_events_carry_geo_enrichment() {
        let sink = Arc::new(CapturingSink::default());
        let recorder = recorder(sink.clone(), true);

        let mut ctx = RequestContext::new(Utc::now());
        ctx.ip = Some("203.0.113.5".parse().unwrap());
        recorder.record(1, &ctx, "https://fr.example/");

        // Event assembly happens in a spawned task
        tokio::time::sleep(Duration::from_millis(50)).await;
        recorder.flush().await;

        let events = sink.events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].geo.country.as_deref(), Some("FR"));
        assert_eq!(events[0].destination, "https://fr.example/");
    }

    #[tokio::test]
    async fn private_ips_skip_geo_lookup() {
        let sink = Arc::new(CapturingSink::default());
        let recorder = recorder(sink.clone(), true);

        let mut ctx = RequestContext::new(Utc::now());
        ctx.ip = Some("192.168.1.10".parse().unwrap());
        recorder.record(1, &ctx, "https://example.com/");

        tokio::time::sleep(Duration::from_millis(50)).await;
        recorder.flush().await;

        let events = sink.events.lock();
        assert_eq!(events.len(), 1);
        assert!(events[0].geo.country.is_none());
    }
}
