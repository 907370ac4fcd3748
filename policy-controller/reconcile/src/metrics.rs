use crate::WorkQueue;
use netpol_controller_core::PolicyKey;
use prometheus_client::{
    collector::Collector,
    encoding::{DescriptorEncoder, EncodeLabelSet, EncodeMetric},
    metrics::{counter::Counter, family::Family, gauge::ConstGauge, MetricType},
    registry::Registry,
};

#[derive(Clone, Debug, Default)]
pub struct ControllerMetrics {
    reconciles: Family<ReconcileLabels, Counter>,
    requeues: Family<QueueLabels, Counter>,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct ReconcileLabels {
    queue: &'static str,
    result: &'static str,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct QueueLabels {
    queue: &'static str,
}

#[derive(Debug)]
struct QueueDepth(Vec<WorkQueue<PolicyKey>>);

// === impl ControllerMetrics ===

impl ControllerMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let reconciles = Family::<ReconcileLabels, Counter>::default();
        reg.register(
            "reconcile",
            "Count of reconciliation passes by queue and result",
            reconciles.clone(),
        );

        let requeues = Family::<QueueLabels, Counter>::default();
        reg.register(
            "requeue",
            "Count of keys requeued with backoff after a failed pass",
            requeues.clone(),
        );

        Self {
            reconciles,
            requeues,
        }
    }

    pub(crate) fn reconciled(&self, queue: &'static str, result: &'static str) {
        self.reconciles
            .get_or_create(&ReconcileLabels { queue, result })
            .inc();
    }

    pub(crate) fn requeued(&self, queue: &'static str) {
        self.requeues.get_or_create(&QueueLabels { queue }).inc();
    }
}

/// Registers a gauge reporting the number of keys waiting in each queue.
pub fn register_queues(reg: &mut Registry, queues: Vec<WorkQueue<PolicyKey>>) {
    reg.register_collector(Box::new(QueueDepth(queues)));
}

impl Collector for QueueDepth {
    fn encode(&self, mut encoder: DescriptorEncoder<'_>) -> Result<(), std::fmt::Error> {
        let mut depth_encoder = encoder.encode_descriptor(
            "queue_depth",
            "The number of keys waiting to be processed",
            None,
            MetricType::Gauge,
        )?;
        for queue in &self.0 {
            let labels = [("queue", queue.name())];
            let depth = ConstGauge::new(queue.len() as i64);
            let depth_encoder = depth_encoder.encode_family(&labels)?;
            depth.encode(depth_encoder)?;
        }
        Ok(())
    }
}
