use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};
use tracing_tree::HierarchicalLayer;

const DEFAULT_FILTER: &str = "stratum_nav=info,stratum=info";

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` overrides the default filter. Calling this more than once is
/// harmless; later calls leave the first subscriber in place.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let tree = HierarchicalLayer::new(2)
        .with_indent_lines(true)
        .with_targets(true)
        .with_writer(std::io::stderr);

    let _ = Registry::default().with(filter).with(tree).try_init();
}
