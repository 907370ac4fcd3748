use crate::{
    core::PolicyKey,
    index::{self, Index},
    k8s, lease,
    reconcile::{self, Backoff, Controller, ControllerMetrics, Notifier, Reconciler, WorkQueue},
    KubeEventRecorder, LogBackend,
};
use anyhow::{bail, Context, Result};
use clap::Parser;
use kube::runtime::watcher;
use prometheus_client::registry::Registry;
use std::{num::NonZeroUsize, sync::Arc};
use tokio::{sync::mpsc, task::JoinSet, time::Duration};
use tracing::{debug, info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(name = "netpol", about = "A NetworkPolicy controller")]
pub struct Args {
    #[clap(long, default_value = "netpol=info,warn", env = "NETPOL_CONTROLLER_LOG")]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// The namespace of the controller's deployment, where the write Lease is held.
    #[clap(long, default_value = "kube-system")]
    controller_namespace: String,

    #[clap(long, default_value = "kube-ovn-controller")]
    controller_deployment_name: String,

    /// The number of workers reconciling NetworkPolicy updates.
    #[clap(long, default_value = "1")]
    update_workers: NonZeroUsize,

    /// The number of workers cleaning up after deleted NetworkPolicies.
    #[clap(long, default_value = "1")]
    delete_workers: NonZeroUsize,

    /// The delay before a failed key is first retried. Doubles with each consecutive failure.
    #[clap(long, default_value = "5")]
    retry_base_delay_ms: u64,

    #[clap(long, default_value = "1000")]
    retry_max_delay_secs: u64,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            controller_namespace,
            controller_deployment_name,
            update_workers,
            delete_workers,
            retry_base_delay_ms,
            retry_max_delay_secs,
        } = self;

        let backoff = Backoff {
            base: Duration::from_millis(retry_base_delay_ms),
            max: Duration::from_secs(retry_max_delay_secs),
        };
        if backoff.base > backoff.max {
            bail!("--retry-base-delay-ms must not exceed --retry-max-delay-secs");
        }

        // The index publishes policy events to the notifier, which feeds the work queues.
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let index = Index::shared(events_tx);
        let updates = WorkQueue::new("update", backoff);
        let deletes = WorkQueue::new("delete", backoff);

        let mut prom = <Registry>::default();
        let netpol = prom.sub_registry_with_prefix("netpol");
        let metrics = ControllerMetrics::register(netpol);
        reconcile::metrics::register_queues(netpol, vec![updates.clone(), deletes.clone()]);
        index::metrics::register(netpol, index.clone());
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        let hostname =
            std::env::var("HOSTNAME").context("Failed to fetch `HOSTNAME` environment variable")?;

        let claims = lease::init(
            &runtime,
            &controller_namespace,
            &controller_deployment_name,
            &hostname,
        )
        .await?;

        // Spawn resource watches.

        let policies = runtime.watch_all::<k8s::NetworkPolicy>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(index.clone(), policies)
                .instrument(info_span!("networkpolicies")),
        );

        let pods = runtime.watch_all::<k8s::Pod>(watcher::Config::default());
        tokio::spawn(kubert::index::namespaced(index.clone(), pods).instrument(info_span!("pods")));

        let namespaces = runtime.watch_all::<k8s::Namespace>(watcher::Config::default());
        tokio::spawn(
            kubert::index::cluster(index.clone(), namespaces).instrument(info_span!("namespaces")),
        );

        let notifier = Notifier::new(&hostname, claims, updates.clone(), deletes.clone());
        tokio::spawn(
            notifier
                .run(events_rx, index.clone())
                .instrument(info_span!("notifier")),
        );

        // Spawn the reconciliation workers.
        let reconciler = Reconciler::new(
            index,
            Arc::new(LogBackend::default()),
            Arc::new(KubeEventRecorder::new(runtime.client(), Some(hostname))),
        );
        let controller = Controller::new(reconciler, updates.clone(), deletes.clone(), metrics);
        let mut workers = JoinSet::new();
        for worker in 0..update_workers.get() {
            workers.spawn(
                controller
                    .clone()
                    .run_update_worker()
                    .instrument(info_span!("update", worker)),
            );
        }
        for worker in 0..delete_workers.get() {
            workers.spawn(
                controller
                    .clone()
                    .run_delete_worker()
                    .instrument(info_span!("delete", worker)),
            );
        }
        info!(
            update_workers = update_workers.get(),
            delete_workers = delete_workers.get(),
            "Started workers"
        );

        tokio::spawn(
            drain_workers(runtime.shutdown_handle(), workers, updates, deletes)
                .instrument(info_span!("shutdown")),
        );

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

/// Stops handing out work once shutdown is signaled and holds the shutdown open until in-flight
/// passes finish.
async fn drain_workers(
    drain: drain::Watch,
    mut workers: JoinSet<()>,
    updates: WorkQueue<PolicyKey>,
    deletes: WorkQueue<PolicyKey>,
) {
    let release = drain.signaled().await;
    debug!("Shutting down work queues");
    updates.shut_down();
    deletes.shut_down();
    release
        .release_after(async move { while workers.join_next().await.is_some() {} })
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn shutdown_stops_queues_and_waits_for_workers() {
        let updates = WorkQueue::new("update", Backoff::default());
        let deletes = WorkQueue::new("delete", Backoff::default());

        let (finish_tx, finish_rx) = oneshot::channel::<()>();
        let mut workers = JoinSet::new();
        workers.spawn(async move {
            let _ = finish_rx.await;
        });

        let (signal, watch) = drain::channel();
        let task = tokio::spawn(drain_workers(watch, workers, updates.clone(), deletes.clone()));
        assert!(!updates.is_shutting_down());

        let drained = tokio::spawn(signal.drain());
        for _ in 0..100 {
            if updates.is_shutting_down() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(updates.is_shutting_down());
        assert!(deletes.is_shutting_down());

        // Shutdown is held open while a worker is still running.
        tokio::task::yield_now().await;
        assert!(!drained.is_finished());

        finish_tx.send(()).unwrap();
        drained.await.unwrap();
        task.await.unwrap();
    }
}
