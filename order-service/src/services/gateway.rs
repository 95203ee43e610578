//! Payment authorization gateways.
//!
//! Both gateways are mocks: they mint the external reference that the
//! provider's webhook will later quote back, and the QR gateway renders the
//! payment payload the customer scans.

use crate::models::{PaymentDraft, PaymentMethod};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, Luma};
use qrcode::QrCode;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to render QR code: {0}")]
    QrRender(String),

    #[error("gateway rejected the payment: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn method(&self) -> PaymentMethod;

    /// Authorize `draft`, setting its external reference and any provider
    /// payload. The draft is left untouched on failure.
    async fn authorize(&self, draft: &mut PaymentDraft) -> Result<(), GatewayError>;
}

fn mint_reference() -> String {
    Uuid::new_v4().to_string()
}

/// Render `data` as a base64-encoded PNG QR code.
pub fn render_qr_base64(data: &str) -> Result<String, GatewayError> {
    let code = QrCode::new(data).map_err(|e| GatewayError::QrRender(e.to_string()))?;
    let image = code.render::<Luma<u8>>().build();

    let dynamic_image = DynamicImage::ImageLuma8(image);
    let mut buffer = Cursor::new(Vec::new());
    dynamic_image
        .write_to(&mut buffer, image::ImageOutputFormat::Png)
        .map_err(|e| GatewayError::QrRender(e.to_string()))?;

    Ok(general_purpose::STANDARD.encode(buffer.get_ref()))
}

pub struct QrCodeGateway {
    merchant_url: String,
}

impl QrCodeGateway {
    pub fn new(merchant_url: impl Into<String>) -> Self {
        Self {
            merchant_url: merchant_url.into(),
        }
    }

    fn payment_link(&self, reference: &str, draft: &PaymentDraft) -> String {
        format!(
            "{}?reference={}&amount={:.2}",
            self.merchant_url, reference, draft.amount
        )
    }
}

#[async_trait]
impl PaymentGateway for QrCodeGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::QrCode
    }

    #[instrument(skip(self, draft), fields(amount = %draft.amount))]
    async fn authorize(&self, draft: &mut PaymentDraft) -> Result<(), GatewayError> {
        let reference = mint_reference();
        let link = self.payment_link(&reference, draft);
        let qr = render_qr_base64(&link)?;

        debug!(external_reference = %reference, "QR payment authorized");
        draft.external_reference = Some(reference);
        draft.provider_payload = Some(qr);
        Ok(())
    }
}

#[derive(Default)]
pub struct CreditCardGateway;

#[async_trait]
impl PaymentGateway for CreditCardGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::CreditCard
    }

    #[instrument(skip(self, draft), fields(amount = %draft.amount))]
    async fn authorize(&self, draft: &mut PaymentDraft) -> Result<(), GatewayError> {
        let reference = mint_reference();
        debug!(external_reference = %reference, "Card payment authorized");
        draft.external_reference = Some(reference);
        Ok(())
    }
}

/// Gateways by payment method, assembled once at startup.
#[derive(Clone, Default)]
pub struct GatewayRegistry {
    gateways: HashMap<PaymentMethod, Arc<dyn PaymentGateway>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateways.insert(gateway.method(), gateway);
        self
    }

    /// The mock gateways this service ships with.
    pub fn standard(qr_merchant_url: &str) -> Self {
        Self::new()
            .with_gateway(Arc::new(QrCodeGateway::new(qr_merchant_url)))
            .with_gateway(Arc::new(CreditCardGateway))
    }

    pub fn resolve(&self, method: PaymentMethod) -> Option<Arc<dyn PaymentGateway>> {
        self.gateways.get(&method).cloned()
    }
}
