use std::sync::Arc;
use std::time::Duration;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::runtime::Handle;

use super::discounts::{DiscountError, DiscountIssuer, DiscountKind, DiscountRequest, IssuedCode};
use super::repository::InstallationRepository;
use crate::config::ShopifyConfig;

const DISCOUNT_CODE_BASIC_CREATE: &str = r#"
mutation discountCodeBasicCreate($basicCodeDiscount: DiscountCodeBasicInput!) {
  discountCodeBasicCreate(basicCodeDiscount: $basicCodeDiscount) {
    codeDiscountNode {
      id
      codeDiscount {
        ... on DiscountCodeBasic {
          codes(first: 1) { nodes { id code } }
        }
      }
    }
    userErrors { field message }
  }
}
"#;

/// Admin GraphQL client minting single-use codes. Synchronous callers drive the async
/// request on the supplied runtime handle, so it must not be called from a runtime worker
/// thread directly (use `spawn_blocking`).
pub struct ShopifyDiscountClient {
    http: reqwest::Client,
    runtime: Handle,
    api_version: String,
    timeout: Duration,
    installations: Arc<dyn InstallationRepository>,
}

impl ShopifyDiscountClient {
    pub fn new(
        config: &ShopifyConfig,
        runtime: Handle,
        installations: Arc<dyn InstallationRepository>,
    ) -> Result<Self, DiscountError> {
        let http = reqwest::Client::builder()
            .timeout(config.mint_timeout)
            .build()
            .map_err(|err| DiscountError::Transport(err.to_string()))?;
        Ok(Self {
            http,
            runtime,
            api_version: config.api_version.clone(),
            timeout: config.mint_timeout,
            installations,
        })
    }

    fn endpoint(&self, shop_domain: &str) -> String {
        format!(
            "https://{shop_domain}/admin/api/{}/graphql.json",
            self.api_version
        )
    }

    fn map_error(&self, err: reqwest::Error) -> DiscountError {
        if err.is_timeout() {
            DiscountError::Timeout(self.timeout)
        } else {
            DiscountError::Transport(err.to_string())
        }
    }
}

impl std::fmt::Debug for ShopifyDiscountClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyDiscountClient")
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

impl DiscountIssuer for ShopifyDiscountClient {
    fn mint(&self, request: &DiscountRequest) -> Result<IssuedCode, DiscountError> {
        let token = self
            .installations
            .fetch(&request.shop_domain)
            .map_err(|err| DiscountError::Transport(err.to_string()))?
            .and_then(|installation| installation.access_token)
            .ok_or_else(|| DiscountError::MissingCredentials(request.shop_domain.clone()))?;

        let input = discount_input(request)?;
        let body = json!({
            "query": DISCOUNT_CODE_BASIC_CREATE,
            "variables": { "basicCodeDiscount": input },
        });
        let url = self.endpoint(&request.shop_domain);

        let response: GraphqlResponse = self.runtime.block_on(async {
            let response = self
                .http
                .post(&url)
                .header("X-Shopify-Access-Token", token)
                .json(&body)
                .send()
                .await
                .map_err(|err| self.map_error(err))?
                .error_for_status()
                .map_err(|err| self.map_error(err))?;
            response
                .json::<GraphqlResponse>()
                .await
                .map_err(|err| self.map_error(err))
        })?;

        issued_code(request, response)
    }
}

fn discount_input(request: &DiscountRequest) -> Result<Value, DiscountError> {
    let (value, items) = match &request.kind {
        DiscountKind::Percentage(percent) => (
            json!({ "percentage": fraction(*percent)? }),
            json!({ "all": true }),
        ),
        DiscountKind::FixedAmount(amount) => (
            json!({
                "discountAmount": {
                    "amount": amount.round_dp(2).to_string(),
                    "appliesOnEachItem": false,
                }
            }),
            json!({ "all": true }),
        ),
        DiscountKind::FreeProduct(product) => (
            json!({ "percentage": 1.0 }),
            json!({ "products": { "productsToAdd": [product.product_id] } }),
        ),
    };

    Ok(json!({
        "title": request.title,
        "code": request.code,
        "startsAt": request.starts_at.to_rfc3339(),
        "endsAt": request.expires_at.to_rfc3339(),
        "usageLimit": request.usage_limit,
        "appliesOncePerCustomer": true,
        "customerSelection": { "all": true },
        "customerGets": { "value": value, "items": items },
    }))
}

/// Shopify expects percentages as a fraction in `0.0..=1.0`.
fn fraction(percent: Decimal) -> Result<f64, DiscountError> {
    let out_of_range = || DiscountError::Rejected(format!("percentage {percent} is outside 0-100"));
    if percent <= Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
        return Err(out_of_range());
    }
    (percent / Decimal::ONE_HUNDRED)
        .to_f64()
        .ok_or_else(out_of_range)
}

fn issued_code(
    request: &DiscountRequest,
    response: GraphqlResponse,
) -> Result<IssuedCode, DiscountError> {
    if let Some(errors) = response.errors.filter(|errors| !errors.is_empty()) {
        let messages: Vec<String> = errors.into_iter().map(|error| error.message).collect();
        return Err(DiscountError::Rejected(messages.join("; ")));
    }

    let payload = response
        .data
        .and_then(|data| data.discount_code_basic_create)
        .ok_or_else(|| DiscountError::Rejected("empty response payload".to_string()))?;

    if !payload.user_errors.is_empty() {
        let messages: Vec<String> = payload
            .user_errors
            .into_iter()
            .map(|error| error.message)
            .collect();
        return Err(DiscountError::Rejected(messages.join("; ")));
    }

    let node = payload
        .code_discount_node
        .ok_or_else(|| DiscountError::Rejected("no discount node returned".to_string()))?;
    let code_node = node
        .code_discount
        .and_then(|discount| discount.codes)
        .and_then(|codes| codes.nodes.into_iter().next());

    Ok(IssuedCode {
        code: code_node
            .as_ref()
            .map(|code| code.code.clone())
            .unwrap_or_else(|| request.code.clone()),
        expires_at: request.expires_at,
        price_rule_id: Some(node.id),
        discount_code_id: code_node.map(|code| code.id),
    })
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<GraphqlData>,
    errors: Option<Vec<GraphqlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphqlData {
    discount_code_basic_create: Option<DiscountCodeBasicCreatePayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiscountCodeBasicCreatePayload {
    code_discount_node: Option<CodeDiscountNode>,
    #[serde(default)]
    user_errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CodeDiscountNode {
    id: String,
    code_discount: Option<CodeDiscount>,
}

#[derive(Debug, Deserialize)]
struct CodeDiscount {
    codes: Option<CodeConnection>,
}

#[derive(Debug, Deserialize)]
struct CodeConnection {
    nodes: Vec<CodeNode>,
}

#[derive(Debug, Deserialize)]
struct CodeNode {
    id: String,
    code: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::campaigns::domain::RewardProduct;
    use chrono::{TimeZone, Utc};

    fn request(kind: DiscountKind) -> DiscountRequest {
        let now = Utc.with_ymd_and_hms(2026, 5, 4, 9, 30, 0).unwrap();
        DiscountRequest::new("demo.myshopify.com", kind, "sam@example.com", now)
    }

    #[test]
    fn percentage_input_uses_fraction() {
        let input = discount_input(&request(DiscountKind::Percentage(Decimal::new(20, 0))))
            .expect("input builds");
        assert_eq!(input["customerGets"]["value"]["percentage"], json!(0.2));
        assert_eq!(input["usageLimit"], json!(1));
        assert_eq!(input["customerGets"]["items"]["all"], json!(true));
    }

    #[test]
    fn percentages_outside_the_valid_range_are_not_minted() {
        for percent in [Decimal::ZERO, Decimal::new(1505, 1)] {
            match discount_input(&request(DiscountKind::Percentage(percent))) {
                Err(DiscountError::Rejected(message)) => assert!(message.contains("outside")),
                other => panic!("expected rejection, got {other:?}"),
            }
        }
        let input = discount_input(&request(DiscountKind::Percentage(Decimal::new(125, 1))))
            .expect("input builds");
        assert_eq!(input["customerGets"]["value"]["percentage"], json!(0.125));
    }

    #[test]
    fn free_product_input_targets_the_product() {
        let product = RewardProduct {
            product_id: "gid://shopify/Product/7".to_string(),
            handle: None,
            title: Some("Canvas tote".to_string()),
            image_url: None,
            price: None,
        };
        let input =
            discount_input(&request(DiscountKind::FreeProduct(product))).expect("input builds");
        assert_eq!(input["customerGets"]["value"]["percentage"], json!(1.0));
        assert_eq!(
            input["customerGets"]["items"]["products"]["productsToAdd"][0],
            json!("gid://shopify/Product/7")
        );
    }

    #[test]
    fn user_errors_become_rejections() {
        let response: GraphqlResponse = serde_json::from_value(json!({
            "data": {
                "discountCodeBasicCreate": {
                    "codeDiscountNode": null,
                    "userErrors": [{ "field": ["code"], "message": "Code must be unique" }]
                }
            }
        }))
        .expect("response parses");

        let request = request(DiscountKind::FixedAmount(Decimal::new(1000, 2)));
        match issued_code(&request, response) {
            Err(DiscountError::Rejected(message)) => assert!(message.contains("unique")),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn successful_payload_returns_platform_ids() {
        let request = request(DiscountKind::Percentage(Decimal::new(15, 0)));
        let response: GraphqlResponse = serde_json::from_value(json!({
            "data": {
                "discountCodeBasicCreate": {
                    "codeDiscountNode": {
                        "id": "gid://shopify/DiscountCodeNode/1",
                        "codeDiscount": {
                            "codes": { "nodes": [{ "id": "gid://shopify/DiscountRedeemCode/9", "code": request.code }] }
                        }
                    },
                    "userErrors": []
                }
            }
        }))
        .expect("response parses");

        let issued = issued_code(&request, response).expect("issued");
        assert_eq!(issued.code, request.code);
        assert_eq!(
            issued.price_rule_id.as_deref(),
            Some("gid://shopify/DiscountCodeNode/1")
        );
        assert_eq!(
            issued.discount_code_id.as_deref(),
            Some("gid://shopify/DiscountRedeemCode/9")
        );
        assert_eq!(issued.expires_at, request.expires_at);
    }
}
