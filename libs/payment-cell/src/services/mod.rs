pub mod gateway;
pub mod razorpay;

pub use gateway::{PaymentGateway, RazorpayGateway};
pub use razorpay::RazorpayClient;
