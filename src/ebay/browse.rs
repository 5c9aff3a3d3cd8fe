use crate::ebay::config::ROOT;
use crate::http::build_client;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EbayBrowseError {
    #[error("browse request failed: {0}")]
    Request(String),
}

/// One completed sale used as pricing signal.
#[derive(Debug, Clone)]
pub struct SoldComp {
    pub price: f64,
    pub title: String,
    pub end_date: Option<String>,
}

/// Search recently sold items matching a part number or name. Empty results
/// and HTTP failures are both expected; the pricing layer treats them
/// identically.
pub async fn search_sold_comps(
    query: &str,
    access_token: &str,
    limit: usize,
) -> Result<Vec<SoldComp>, EbayBrowseError> {
    let client = build_client();
    let url = format!("{}/buy/browse/v1/item_summary/search", *ROOT);
    let response = client
        .get(url)
        .bearer_auth(access_token)
        .query(&[
            ("q", query),
            ("filter", "soldItemsOnly:true"),
            ("limit", &limit.to_string()),
        ])
        .send()
        .await
        .map_err(|err| EbayBrowseError::Request(err.to_string()))?;

    if !response.status().is_success() {
        return Err(EbayBrowseError::Request(format!(
            "HTTP {}",
            response.status()
        )));
    }

    let payload: SearchResponse = response
        .json()
        .await
        .map_err(|err| EbayBrowseError::Request(err.to_string()))?;

    Ok(payload
        .item_summaries
        .unwrap_or_default()
        .into_iter()
        .filter_map(|item| {
            let price = item.price?.value.parse::<f64>().ok()?;
            Some(SoldComp {
                price,
                title: item.title.unwrap_or_default(),
                end_date: item.item_end_date,
            })
        })
        .collect())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    item_summaries: Option<Vec<ItemSummary>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemSummary {
    title: Option<String>,
    price: Option<ItemPrice>,
    item_end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemPrice {
    value: String,
}
