use super::SharedIndex;
use prometheus_client::{
    collector::Collector,
    encoding::{DescriptorEncoder, EncodeMetric},
    metrics::{gauge::ConstGauge, MetricType},
    registry::Registry,
};

#[derive(Debug)]
struct Instrumented(SharedIndex);

pub fn register(reg: &mut Registry, index: SharedIndex) {
    reg.register_collector(Box::new(Instrumented(index)));
}

impl Collector for Instrumented {
    fn encode(&self, mut encoder: DescriptorEncoder<'_>) -> Result<(), std::fmt::Error> {
        let this = self.0.read();

        let mut policies_encoder = encoder.encode_descriptor(
            "network_policy_index_size",
            "The number of NetworkPolicies in index",
            None,
            MetricType::Gauge,
        )?;
        for (ns, policies) in &this.policies {
            let labels = [("namespace", ns.as_str())];
            let policies = ConstGauge::new(policies.len() as i64);
            let policies_encoder = policies_encoder.encode_family(&labels)?;
            policies.encode(policies_encoder)?;
        }

        let mut pods_encoder = encoder.encode_descriptor(
            "pod_index_size",
            "The number of pods in index",
            None,
            MetricType::Gauge,
        )?;
        for (ns, pods) in &this.workloads {
            let labels = [("namespace", ns.as_str())];
            let pods = ConstGauge::new(pods.len() as i64);
            let pods_encoder = pods_encoder.encode_family(&labels)?;
            pods.encode(pods_encoder)?;
        }

        let namespaces_encoder = encoder.encode_descriptor(
            "namespace_index_size",
            "The number of namespaces in index",
            None,
            MetricType::Gauge,
        )?;
        ConstGauge::new(this.namespaces.len() as i64).encode(namespaces_encoder)?;

        Ok(())
    }
}
