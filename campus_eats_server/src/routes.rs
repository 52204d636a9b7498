//! Request handler definitions
//!
//! Define each route and its handler here. Handlers that are more than a line or two MUST go into
//! a separate module. Keep this module neat and tidy 🙏
//!
//! Handlers are generic over the backend (and gateway) traits; `server.rs` instantiates them with
//! the concrete `SqliteDatabase`/`ChapaGateway` when registering routes. Role checks live in the
//! engine APIs; handlers only translate the wire format and pass the authenticated principal
//! through.
use std::str::FromStr;

use actix_web::{web, HttpRequest, HttpResponse, Responder};
use campus_eats_engine::{
    db_types::{OrderStatusType, PaymentMethod, PaymentStatus, PaymentType},
    order_objects::{NewOrderRequest, OrderItemRequest, OrderQueryFilter, PaymentQueryFilter},
    traits::ReconcileOutcome,
    ContractApi,
    MarketplaceDatabase,
    MarketplaceError,
    OrderFlowApi,
    PaymentApi,
    PaymentGateway,
};
use ce_common::Birr;
use log::*;
use serde_json::json;

use crate::{
    auth::JwtClaims,
    config::ServerConfig,
    data_objects::{
        ChapaWebhookPayload,
        CreateContractParams,
        CreateOrderParams,
        InitializePaymentParams,
        OrderQueryParams,
        PaymentQueryParams,
        RenewContractParams,
        UpdateStatusParams,
        VerifyQrParams,
    },
    errors::ServerError,
    helpers::signature_matches,
};

pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

//----------------------------------------------   Orders  ----------------------------------------------------

pub async fn create_order<B: MarketplaceDatabase>(
    claims: JwtClaims,
    body: web::Json<CreateOrderParams>,
    api: web::Data<OrderFlowApi<B>>,
    config: web::Data<ServerConfig>,
) -> Result<HttpResponse, ServerError> {
    let params = body.into_inner();
    debug!("💻️ POST order for user #{} at lounge #{}", claims.sub, params.lounge_id);
    let method = PaymentMethod::from_request(&params.payment_method)
        .ok_or(MarketplaceError::InvalidPaymentMethod(params.payment_method.clone()))?;
    let request = NewOrderRequest {
        lounge_id: params.lounge_id,
        items: params
            .items
            .into_iter()
            .map(|i| OrderItemRequest { food_id: i.food_id, quantity: i.quantity })
            .collect(),
        method,
        contract_id: params.contract_id,
    };
    let placed = api.place_order(&claims.principal(), request, config.commission_rate).await?;
    Ok(HttpResponse::Created().json(placed))
}

pub async fn get_order<B: MarketplaceDatabase>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET order [{order_id}] for user #{}", claims.sub);
    let order = api.order_with_items(&claims.principal(), order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

pub async fn my_orders<B: MarketplaceDatabase>(
    claims: JwtClaims,
    query: web::Query<OrderQueryParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET my orders for user #{}", claims.sub);
    let filter = order_filter(&query)?;
    let orders = api.my_orders(&claims.principal(), filter).await?;
    Ok(HttpResponse::Ok().json(orders))
}

pub async fn lounge_orders<B: MarketplaceDatabase>(
    claims: JwtClaims,
    path: web::Path<i64>,
    query: web::Query<OrderQueryParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let lounge_id = path.into_inner();
    debug!("💻️ GET orders for lounge #{lounge_id}");
    let filter = order_filter(&query)?;
    let orders = api.lounge_orders(&claims.principal(), lounge_id, filter).await?;
    Ok(HttpResponse::Ok().json(orders))
}

pub async fn update_order_status<B: MarketplaceDatabase>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<UpdateStatusParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let status = parse_wire::<OrderStatusType>(&body.status, "order status")?;
    debug!("💻️ PATCH order [{order_id}] status to {status}");
    let order = api.update_status(&claims.principal(), order_id, status).await?;
    Ok(HttpResponse::Ok().json(order))
}

pub async fn verify_qr<B: MarketplaceDatabase>(
    claims: JwtClaims,
    body: web::Json<VerifyQrParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST verify pickup code by user #{}", claims.sub);
    let order = api.verify_pickup(&claims.principal(), &body.qr_token).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------  Contracts ----------------------------------------------------

pub async fn create_contract<B: MarketplaceDatabase>(
    claims: JwtClaims,
    body: web::Json<CreateContractParams>,
    api: web::Data<ContractApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let params = body.into_inner();
    debug!("💻️ POST contract for user #{} at lounge #{}", claims.sub, params.lounge_id);
    let (contract, payment) = api
        .create_contract(&claims.principal(), params.lounge_id, Birr::from_cents(params.amount), params.duration_days)
        .await?;
    Ok(HttpResponse::Created().json(json!({
        "contract": contract,
        "payment": payment,
        "message": "Contract created. Complete payment to activate.",
    })))
}

pub async fn renew_contract<B: MarketplaceDatabase>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<RenewContractParams>,
    api: web::Data<ContractApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let contract_id = path.into_inner();
    let params = body.into_inner();
    debug!("💻️ POST renew contract [{contract_id}]");
    let (contract, payment) = api
        .renew_contract(&claims.principal(), contract_id, Birr::from_cents(params.amount), params.duration_days)
        .await?;
    Ok(HttpResponse::Ok().json(json!({
        "contract": contract,
        "payment": payment,
        "message": "Contract renewal initiated. Complete payment to settle.",
    })))
}

pub async fn my_contracts<B: MarketplaceDatabase>(
    claims: JwtClaims,
    api: web::Data<ContractApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET contracts for user #{}", claims.sub);
    let contracts = api.my_contracts(&claims.principal()).await?;
    Ok(HttpResponse::Ok().json(contracts))
}

pub async fn contract_by_id<B: MarketplaceDatabase>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<ContractApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let contract_id = path.into_inner();
    debug!("💻️ GET contract [{contract_id}]");
    let contract = api.contract_by_id(&claims.principal(), contract_id).await?;
    Ok(HttpResponse::Ok().json(contract))
}

pub async fn lounge_contract<B: MarketplaceDatabase>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<ContractApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let lounge_id = path.into_inner();
    debug!("💻️ GET active contract with lounge #{lounge_id} for user #{}", claims.sub);
    match api.active_contract_for_lounge(&claims.principal(), lounge_id).await? {
        Some(contract) => Ok(HttpResponse::Ok().json(contract)),
        None => Err(MarketplaceError::ContractNotFound.into()),
    }
}

//----------------------------------------------  Payments  ----------------------------------------------------

pub async fn initialize_payment<B, G>(
    claims: JwtClaims,
    body: web::Json<InitializePaymentParams>,
    api: web::Data<PaymentApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    G: PaymentGateway,
{
    let params = body.into_inner();
    debug!("💻️ POST initialize payment [{}] for user #{}", params.payment_id, claims.sub);
    let handle = api
        .initialize_checkout(&claims.principal(), params.payment_id, claims.payer_info(), params.return_url)
        .await?;
    Ok(HttpResponse::Ok().json(handle))
}

/// The gateway's webhook. Unauthenticated, but the raw body must carry a valid HMAC signature
/// when a webhook secret is configured; the signature is checked before the body is even parsed.
pub async fn payment_webhook<B, G>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<PaymentApi<B, G>>,
    config: web::Data<ServerConfig>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    G: PaymentGateway,
{
    let secret = &config.chapa.webhook_secret;
    if !secret.reveal().is_empty() {
        let signature = req
            .headers()
            .get("Chapa-Signature")
            .or_else(|| req.headers().get("x-chapa-signature"))
            .and_then(|v| v.to_str().ok())
            .ok_or(ServerError::InvalidWebhookSignature)?;
        if !signature_matches(secret, &body, signature) {
            warn!("💻️ Webhook rejected: signature mismatch");
            return Err(ServerError::InvalidWebhookSignature);
        }
    }
    let payload: ChapaWebhookPayload =
        serde_json::from_slice(&body).map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
    info!("💻️ Webhook received for reference {}", payload.tx_ref);
    let outcome = api.handle_webhook(payload.into()).await?;
    let message = match &outcome {
        ReconcileOutcome::AlreadyCompleted(_) => "Payment already processed",
        ReconcileOutcome::Completed { .. } => "Payment processed",
        ReconcileOutcome::Failed(_) => "Payment verification failed",
    };
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": message })))
}

pub async fn poll_payment<B, G>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<PaymentApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    G: PaymentGateway,
{
    let payment_id = path.into_inner();
    debug!("💻️ GET verify payment [{payment_id}] for user #{}", claims.sub);
    let payment = api.poll_payment(&claims.principal(), payment_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": payment.status, "payment": payment })))
}

pub async fn my_payments<B, G>(
    claims: JwtClaims,
    query: web::Query<PaymentQueryParams>,
    api: web::Data<PaymentApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    G: PaymentGateway,
{
    debug!("💻️ GET payments for user #{}", claims.sub);
    let filter = PaymentQueryFilter {
        payment_type: query.payment_type.as_deref().map(|s| parse_wire::<PaymentType>(s, "payment type")).transpose()?,
        status: query.status.as_deref().map(|s| parse_wire::<PaymentStatus>(s, "payment status")).transpose()?,
    };
    let payments = api.my_payments(&claims.principal(), filter).await?;
    Ok(HttpResponse::Ok().json(payments))
}

//----------------------------------------------  Helpers  ----------------------------------------------------

fn order_filter(query: &OrderQueryParams) -> Result<OrderQueryFilter, ServerError> {
    let status =
        query.status.as_deref().map(|s| parse_wire::<OrderStatusType>(s, "order status")).transpose()?;
    Ok(OrderQueryFilter { status, ..Default::default() })
}

/// Clients send lowercase names (`"preparing"`); storage uses capitalized variant names. Accept
/// either.
fn parse_wire<T: FromStr>(s: &str, what: &str) -> Result<T, ServerError> {
    let mut chars = s.trim().chars();
    let normalized = match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
        None => String::new(),
    };
    normalized
        .parse::<T>()
        .or_else(|_| s.trim().parse::<T>())
        .map_err(|_| ServerError::InvalidRequestBody(format!("unknown {what} '{s}'")))
}
