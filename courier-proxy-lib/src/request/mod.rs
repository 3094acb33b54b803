//! Request normalisation: turns the first chunk a client sends into the exact
//! bytes that are written to the origin server.

mod headers;
mod parser;

pub use headers::{Header, HeaderList};
pub use parser::{parse, ParsedRequest, Scheme};
