//! API trait definitions split by API family
//!
//! - [`FindingsApi`] - REST Findings API (paged JSON)
//! - [`XmlApi`] - legacy XML upload API (raw XML bytes)
//!
//! Both are implemented by [`VeracodeClient`](super::VeracodeClient).

mod findings;
mod xml;

pub use findings::FindingsApi;
pub use xml::XmlApi;
