//! Order submission against the producer service
//!
//! Orders are sent as `POST /api/orders?orderId=..&product=..&price=..`. A 2xx
//! answer is the only success signal; the body is not interpreted.

use std::time::Duration;

use anyhow::{Context, Result};
use rand::{Rng, thread_rng};
use serde::{Deserialize, Serialize};
use tracing::{instrument, trace};

use crate::error::{FetchFailure, FetchResult};
use crate::util::join_url;

pub const ORDERS_PATH: &str = "/api/orders";

/// Pause between two orders of a batch
pub const BATCH_SPACING: Duration = Duration::from_millis(200);

pub const PRODUCT_CATALOGUE: &[&str] = &[
    "Laptop",
    "Mouse",
    "Keyboard",
    "Monitor",
    "Headphones",
    "Webcam",
    "Speaker",
    "Microphone",
    "USB Cable",
    "Router",
];

/// A validated order waiting to be submitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub order_id: String,
    pub product: String,
    pub price: f64,
}

impl OrderRequest {
    pub fn new(order_id: impl Into<String>, product: impl Into<String>, price: f64) -> Result<Self> {
        let order_id = order_id.into().trim().to_string();
        let product = product.into().trim().to_string();

        if order_id.is_empty() {
            anyhow::bail!("order id must not be empty");
        }
        if product.is_empty() {
            anyhow::bail!("product must not be empty");
        }
        if !price.is_finite() || price < 0.0 {
            anyhow::bail!("price must be a non-negative number, got {price}");
        }

        Ok(Self {
            order_id,
            product,
            price,
        })
    }

    /// A random order from the product catalogue
    pub fn random() -> Self {
        let mut rng = thread_rng();
        Self {
            order_id: format!("ORD{}", rng.gen_range(0..100_000)),
            product: random_product(&mut rng),
            price: random_price(&mut rng),
        }
    }

    /// `count` random orders with ids `BATCH<stamp>-<i>`, generated on demand
    pub fn batch(count: usize, stamp: i64) -> impl Iterator<Item = Self> + Send {
        (0..count).map(move |i| {
            let mut rng = thread_rng();
            Self {
                order_id: format!("BATCH{stamp}-{i}"),
                product: random_product(&mut rng),
                price: random_price(&mut rng),
            }
        })
    }
}

fn random_product(rng: &mut impl Rng) -> String {
    PRODUCT_CATALOGUE[rng.gen_range(0..PRODUCT_CATALOGUE.len())].to_string()
}

/// Uniform in [10, 510), rounded to cents
fn random_price(rng: &mut impl Rng) -> f64 {
    (rng.gen_range(10.0..510.0_f64) * 100.0).round() / 100.0
}

/// Outcome counts of a batch submission
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Sends orders to the producer service
#[derive(Debug, Clone)]
pub struct OrderSubmitter {
    client: reqwest::Client,
    url: String,
}

impl OrderSubmitter {
    pub fn new(producer_base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build order HTTP client")?;

        Ok(Self {
            client,
            url: join_url(producer_base_url, ORDERS_PATH),
        })
    }

    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn submit(&self, request: &OrderRequest) -> FetchResult<()> {
        trace!("submitting order to {}", self.url);

        let price = request.price.to_string();
        let response = self
            .client
            .post(&self.url)
            .query(&[
                ("orderId", request.order_id.as_str()),
                ("product", request.product.as_str()),
                ("price", price.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchFailure::Protocol {
                status: response.status().as_u16(),
            });
        }

        Ok(())
    }
}
