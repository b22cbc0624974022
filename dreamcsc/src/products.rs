//! Data product handling
//!
//! Announced products are passed to a `DataProductSink`, which stands in for
//! the observatory's archiving system.

use log::info;

use dreamproto::{DataProductAnnouncement, DataProductMetadata, DreamResult, ServerId};

/// Receives data products ready for archiving
pub trait DataProductSink: Send {
    /// Archive `products` announced by `server`. An error leaves the
    /// products unacknowledged.
    fn archive(&mut self, server: ServerId, products: &[DataProductMetadata]) -> DreamResult<()>;
}

/// Sink that records each product in the log
#[derive(Debug, Default)]
pub struct LoggingSink {
    archived: u64,
}

impl LoggingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn archived(&self) -> u64 {
        self.archived
    }
}

impl DataProductSink for LoggingSink {
    fn archive(&mut self, server: ServerId, products: &[DataProductMetadata]) -> DreamResult<()> {
        for product in products {
            info!(
                "Server {}: data product {} at {} ({})",
                server, product.name, product.location, product.timestamp
            );
        }
        self.archived += products.len() as u64;
        Ok(())
    }
}

/// Split an announcement into the products to archive and the number skipped
/// because they are still under /tmpdata/
pub fn filter_products(
    announcement: &DataProductAnnouncement,
    skip_tmpdata: bool,
) -> (Vec<DataProductMetadata>, usize) {
    let forwarded: Vec<DataProductMetadata> = announcement
        .metadata
        .iter()
        .filter(|product| !(skip_tmpdata && product.is_tmpdata()))
        .cloned()
        .collect();
    let skipped = announcement.metadata.len() - forwarded.len();
    (forwarded, skipped)
}
