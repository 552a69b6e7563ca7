//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::time::Duration;

use gdtp::core::{Addr, DEFAULT_BELOW_PORT_ID};
use gdtp::{Gdtp, SchedulerType};

/// Install a tracing subscriber once. Set `RUST_LOG=gdtp=trace` to see logs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// An initialised node at `src` that sends to `dest`.
pub async fn node(src: Addr, dest: Addr) -> Gdtp {
    node_with_scheduler(src, dest, SchedulerType::Fifo).await
}

/// Like [`node`] with a specific scheduler on the default port.
pub async fn node_with_scheduler(src: Addr, dest: Addr, scheduler: SchedulerType) -> Gdtp {
    init_tracing();
    let gdtp = Gdtp::with_config(
        Gdtp::builder()
            .source_address(src)
            .destination_address(dest)
            .scheduler(scheduler)
            .id_seed(src)
            .build(),
    );
    gdtp.initialize().await;
    gdtp
}

/// Take the next frame from `node` and confirm its transmission.
pub async fn send(node: &Gdtp) -> bytes::Bytes {
    let frame = node
        .get_data_for_below(DEFAULT_BELOW_PORT_ID)
        .await
        .expect("frame for below");
    node.set_data_transmitted(DEFAULT_BELOW_PORT_ID)
        .await
        .expect("transmitted");
    frame
}

/// Move one frame from `from` to `to`; returns the PDUs `to` accepted.
pub async fn relay(from: &Gdtp, to: &Gdtp) -> usize {
    let frame = send(from).await;
    to.handle_data_from_below(DEFAULT_BELOW_PORT_ID, &frame)
        .await
        .expect("frame from below")
}

/// Whether `node` has a frame waiting.
pub async fn pending(node: &Gdtp) -> bool {
    node.has_data_for_below(DEFAULT_BELOW_PORT_ID)
        .await
        .expect("default port")
}

/// Let worker tasks run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
