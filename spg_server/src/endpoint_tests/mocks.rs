use mockall::mock;
use spg_engine::{
    db_types::{Order, OrderNumber, PaymentMethod},
    gateway::{GatewayError, PaymentGateway, TransactionInstructions, TransactionStatus},
};

mock! {
    pub Gateway {}
    impl Clone for Gateway {
        fn clone(&self) -> Self;
    }
    impl PaymentGateway for Gateway {
        async fn create_transaction(&self, order: &Order, method: PaymentMethod, customer_email: &str) -> Result<TransactionInstructions, GatewayError>;
        async fn query_status(&self, reference: &str) -> Result<TransactionStatus, GatewayError>;
        async fn query_status_for_order(&self, order_number: &OrderNumber) -> Result<TransactionStatus, GatewayError>;
        fn verify_callback(&self, body: &[u8], signature: &str) -> bool;
        fn parse_callback(&self, body: &[u8]) -> Result<TransactionStatus, GatewayError>;
    }
}
