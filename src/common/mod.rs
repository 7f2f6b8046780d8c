pub mod clock;
pub mod http;

pub use clock::{Clock, SystemClock};
pub use http::{HttpClient, HttpRequest, HttpResponse, HyperHttpClient};
