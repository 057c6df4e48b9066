//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests:
//! ```nocompile
//!     fn my_handler() -> impl Responder {
//!         std::thread::sleep(Duration::from_secs(5)); // <-- Bad practice! Will cause the current worker thread to
//! hang!
//!     }
//! ```
//! For this reason, any long, non-cpu-bound operation (e.g. I/O, database operations, etc.) should be expressed as
//! futures or asynchronous functions. Async handlers get executed concurrently by worker threads and thus don’t block
//! execution.
//!
//! Every `/api` handler resolves the caller with [`IdentityResolver`] before it touches any data.
use std::str::FromStr;

use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use gateway_tools::helpers::CALLBACK_SIGNATURE_HEADER;
use log::*;
use spg_engine::{
    db_types::{OrderNumber, OrderStatus, PaymentMethod},
    AccountDirectory,
    NotificationDispatcher,
    NotificationStore,
    OrderStore,
    PaymentGateway,
    ReconcileOutcome,
    ReconciliationApi,
    ReconciliationError,
};

use crate::{
    auth::IdentityResolver,
    config::ServerOptions,
    data_objects::{PayRequest, PaymentResponse, StatusCheckResponse, StatusUpdateRequest, WebhookAck},
    errors::ServerError,
};

/// Everything the HTTP layer needs from storage.
pub trait Backend: OrderStore + NotificationStore + AccountDirectory + 'static {}

impl<T> Backend for T where T: OrderStore + NotificationStore + AccountDirectory + 'static {}

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

/// Registers every route against the given backend and gateway types. The caller supplies the `app_data`.
pub fn configure_routes<B, G>(cfg: &mut web::ServiceConfig)
where
    B: Backend,
    G: PaymentGateway + 'static,
{
    cfg.service(health).service(PaymentWebhookRoute::<B, G>::new()).service(
        web::scope("/api")
            .service(CheckStatusRoute::<B, G>::new())
            .service(PayForOrderRoute::<B, G>::new())
            .service(OrderHistoryRoute::<B, G>::new())
            .service(OrderByIdRoute::<B, G>::new())
            .service(AdminSetStatusRoute::<B, G>::new())
            .service(MyNotificationsRoute::<B>::new())
            .service(MarkNotificationReadRoute::<B>::new()),
    );
}

fn order_number_from_path(path: web::Path<String>) -> Result<OrderNumber, ServerError> {
    OrderNumber::from_str(&path.into_inner()).map_err(|e| ServerError::InvalidRequestPath(e.to_string()))
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Webhook  ----------------------------------------------------
route!(payment_webhook => Post "/webhook/payment" impl Backend, PaymentGateway);
/// Route handler for payment provider callbacks.
///
/// The provider signs the raw body; the signature arrives in the `X-Callback-Signature` header. An invalid signature
/// is answered with 401 and changes nothing.
///
/// Every other outcome is acknowledged with 200, so that the provider does not hammer us with retries for reports we
/// have already dealt with (or cannot deal with until the poll catches up). If processing takes longer than the
/// configured webhook timeout, we acknowledge anyway and let it finish in the background. The per-order lock and the
/// conditional write in the engine make that safe.
pub async fn payment_webhook<B, G>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<ReconciliationApi<B, G>>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError>
where
    B: Backend,
    G: PaymentGateway + 'static,
{
    trace!("🪝️ Received payment callback");
    let signature = req
        .headers()
        .get(CALLBACK_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let api = api.get_ref().clone();
    let job = actix_web::rt::spawn(async move { api.process_webhook(&body, &signature).await });
    let ack = match tokio::time::timeout(options.webhook_timeout, job).await {
        Err(_) => {
            warn!(
                "🪝️ Callback processing took longer than {}ms. Acknowledging it now, it will finish in the background.",
                options.webhook_timeout.as_millis()
            );
            WebhookAck::new("Received")
        },
        Ok(Err(e)) => {
            error!("🪝️ The callback processing task failed. {e}");
            WebhookAck::new("Received")
        },
        Ok(Ok(Err(ReconciliationError::GatewaySignatureInvalid))) => return Err(ServerError::InvalidSignature),
        Ok(Ok(Err(e))) => {
            warn!("🪝️ Callback was accepted, but could not be applied. {e}");
            WebhookAck::new("Received")
        },
        Ok(Ok(Ok(outcome))) => {
            debug!("🪝️ Callback for order {} left it {}", outcome.order().order_number, outcome.status());
            WebhookAck::new(format!("Order is {}", outcome.status()))
        },
    };
    Ok(HttpResponse::Ok().json(ack))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(check_status => Post "/orders/{order_number}/check-status" impl Backend, PaymentGateway);
/// Asks the provider for the latest on the order's payment and applies it.
///
/// If the provider cannot be reached, or no payment has been started yet, the order is left as it is and the response
/// says so. This is never an error from the user's point of view: they can simply try again.
pub async fn check_status<B, G>(
    req: HttpRequest,
    path: web::Path<String>,
    api: web::Data<ReconciliationApi<B, G>>,
    auth: web::Data<IdentityResolver<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: Backend,
    G: PaymentGateway + 'static,
{
    let identity = auth.require_auth(&req).await?;
    let order_number = order_number_from_path(path)?;
    debug!("💻️ POST check-status for {order_number} by {}", identity.subject_id);
    let response = match api.check_status(&identity, &order_number).await {
        Ok(outcome) => StatusCheckResponse::from_outcome(&outcome),
        Err(e) if e.is_transient() || matches!(e, ReconciliationError::NoPaymentAttempt(_)) => {
            info!("💻️ Status check for {order_number} could not reach a verdict. {e}");
            let order = api.fetch_order(&identity, &order_number).await?;
            StatusCheckResponse::unchanged(&order)
        },
        Err(e) => return Err(e.into()),
    };
    Ok(HttpResponse::Ok().json(response))
}

route!(pay_for_order => Post "/orders/{order_number}/pay" impl Backend, PaymentGateway);
/// Opens a payment at the provider for the order, using the payment method in the body.
pub async fn pay_for_order<B, G>(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<PayRequest>,
    api: web::Data<ReconciliationApi<B, G>>,
    auth: web::Data<IdentityResolver<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: Backend,
    G: PaymentGateway + 'static,
{
    let identity = auth.require_auth(&req).await?;
    let order_number = order_number_from_path(path)?;
    let method =
        PaymentMethod::from_str(&body.method).map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
    debug!("💻️ POST pay for {order_number} via {method} by {}", identity.subject_id);
    let outcome = api.create_payment(&identity, &order_number, method).await?;
    Ok(HttpResponse::Ok().json(PaymentResponse::from(outcome)))
}

route!(order_by_id => Get "/orders/{order_number}" impl Backend, PaymentGateway);
pub async fn order_by_id<B, G>(
    req: HttpRequest,
    path: web::Path<String>,
    api: web::Data<ReconciliationApi<B, G>>,
    auth: web::Data<IdentityResolver<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: Backend,
    G: PaymentGateway + 'static,
{
    let identity = auth.require_auth(&req).await?;
    let order_number = order_number_from_path(path)?;
    trace!("💻️ GET order {order_number}");
    let order = api.fetch_order(&identity, &order_number).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(order_history => Get "/orders/{order_number}/history" impl Backend, PaymentGateway);
/// The order's status changes, oldest first, with the trigger that caused each one.
pub async fn order_history<B, G>(
    req: HttpRequest,
    path: web::Path<String>,
    api: web::Data<ReconciliationApi<B, G>>,
    auth: web::Data<IdentityResolver<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: Backend,
    G: PaymentGateway + 'static,
{
    let identity = auth.require_auth(&req).await?;
    let order_number = order_number_from_path(path)?;
    trace!("💻️ GET history for {order_number}");
    let history = api.order_history(&identity, &order_number).await?;
    Ok(HttpResponse::Ok().json(history))
}

//----------------------------------------------   Admin  ----------------------------------------------------
route!(admin_set_status => Post "/admin/orders/{order_number}/status" impl Backend, PaymentGateway);
/// Moves an order along the fulfilment path (or cancels it). Admin only, and the usual transition rules apply: a
/// cancelled order stays cancelled.
pub async fn admin_set_status<B, G>(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<StatusUpdateRequest>,
    api: web::Data<ReconciliationApi<B, G>>,
    auth: web::Data<IdentityResolver<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: Backend,
    G: PaymentGateway + 'static,
{
    let identity = auth.require_admin(&req).await?;
    let order_number = order_number_from_path(path)?;
    let status = OrderStatus::from_str(&body.status).map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
    info!("💻️ Admin {} set order {order_number} to {status}", identity.subject_id);
    let outcome = api.admin_override(&identity, &order_number, status).await?;
    if let ReconcileOutcome::RaceLost { order } = &outcome {
        debug!("💻️ Admin update to {order_number} lost a race. The order is now {}", order.status);
    }
    Ok(HttpResponse::Ok().json(StatusCheckResponse::from_outcome(&outcome)))
}

//----------------------------------------------   Notifications  ----------------------------------------------------
route!(my_notifications => Get "/notifications" impl Backend);
/// The caller's notifications, newest first.
pub async fn my_notifications<B: Backend>(
    req: HttpRequest,
    notifications: web::Data<NotificationDispatcher<B>>,
    auth: web::Data<IdentityResolver<B>>,
) -> Result<HttpResponse, ServerError> {
    let identity = auth.require_auth(&req).await?;
    trace!("💻️ GET notifications for {}", identity.subject_id);
    let result = notifications.notifications_for(&identity).await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(mark_notification_read => Post "/notifications/{id}/read" impl Backend);
pub async fn mark_notification_read<B: Backend>(
    req: HttpRequest,
    path: web::Path<i64>,
    notifications: web::Data<NotificationDispatcher<B>>,
    auth: web::Data<IdentityResolver<B>>,
) -> Result<HttpResponse, ServerError> {
    let identity = auth.require_auth(&req).await?;
    let id = path.into_inner();
    trace!("💻️ POST read notification #{id} for {}", identity.subject_id);
    let notification = notifications.mark_read(&identity, id).await?;
    Ok(HttpResponse::Ok().json(notification))
}
