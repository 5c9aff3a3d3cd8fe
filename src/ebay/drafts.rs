use crate::ebay::config::ROOT;
use crate::http::build_client;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use urlencoding::encode;

#[derive(Debug, Error)]
pub enum EbayDraftError {
    #[error("draft request failed: {0}")]
    Request(String),
}

/// Everything needed to stand up an unpublished offer (a seller-hub draft):
/// inventory item first, then the offer referencing it. The offer is never
/// published by this service.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftListingRequest {
    pub sku: String,
    pub marketplace_id: String,
    pub category_id: String,
    pub title: String,
    pub description: String,
    pub condition: String,
    pub price_value: String,
    pub currency: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub aspects: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub image_urls: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DraftReceipt {
    pub offer_id: String,
    pub sku: String,
    pub status: &'static str,
}

pub async fn create_draft(
    request: &DraftListingRequest,
    access_token: &str,
) -> Result<DraftReceipt, EbayDraftError> {
    upsert_inventory_item(request, access_token).await?;
    let offer_id = create_unpublished_offer(request, access_token).await?;
    Ok(DraftReceipt {
        offer_id,
        sku: request.sku.clone(),
        status: "DRAFT",
    })
}

async fn upsert_inventory_item(
    request: &DraftListingRequest,
    access_token: &str,
) -> Result<(), EbayDraftError> {
    let client = build_client();
    let encoded_sku = encode(&request.sku);
    let url = format!("{}/sell/inventory/v1/inventory_item/{}", *ROOT, encoded_sku);

    let aspects = if request.aspects.is_empty() {
        None
    } else {
        Some(&request.aspects)
    };
    let payload = serde_json::json!({
        "availability": { "shipToLocationAvailability": { "quantity": 1 } },
        "condition": request.condition,
        "product": {
            "title": request.title,
            "description": request.description,
            "aspects": aspects,
            "imageUrls": request.image_urls,
        },
    });

    let response = client
        .put(url)
        .bearer_auth(access_token)
        .header("Content-Language", "en-US")
        .json(&payload)
        .send()
        .await
        .map_err(|err| EbayDraftError::Request(err.to_string()))?;

    if !response.status().is_success() {
        return Err(EbayDraftError::Request(format!(
            "HTTP {}",
            response.status()
        )));
    }
    Ok(())
}

async fn create_unpublished_offer(
    request: &DraftListingRequest,
    access_token: &str,
) -> Result<String, EbayDraftError> {
    let client = build_client();
    let url = format!("{}/sell/inventory/v1/offer", *ROOT);
    let payload = serde_json::json!({
        "sku": request.sku,
        "marketplaceId": request.marketplace_id,
        "format": "FIXED_PRICE",
        "categoryId": request.category_id,
        "listingDescription": request.description,
        "availableQuantity": 1,
        "pricingSummary": {
            "price": { "value": request.price_value, "currency": request.currency },
        },
    });

    let response = client
        .post(url)
        .bearer_auth(access_token)
        .json(&payload)
        .send()
        .await
        .map_err(|err| EbayDraftError::Request(err.to_string()))?;

    if !response.status().is_success() {
        return Err(EbayDraftError::Request(format!(
            "HTTP {}",
            response.status()
        )));
    }

    #[derive(serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct OfferResponse {
        offer_id: String,
    }
    let payload: OfferResponse = response
        .json()
        .await
        .map_err(|err| EbayDraftError::Request(err.to_string()))?;
    Ok(payload.offer_id)
}
