pub mod payu;
pub mod phonepe;

pub use payu::{PayuAdapter, PayuConfig};
pub use phonepe::{PhonepeAdapter, PhonepeConfig};
